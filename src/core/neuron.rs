//! Graph nodes: receptors recognize sensor patterns, motors emit responses,
//! mediators predict an effect from causes and intermediate events.

use crate::config::MonaConfig;
use crate::enabling::{EnablingSet, Outcome, PendingEnabling, WagerHistory};
use crate::values::{Enablement, GoalValue, Motive, MotiveAccum, NeuronId, Response, Sensor, Time, Weight, DONT_CARE};

/// Role of an event within a mediator, used when attaching events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Cause,
    Intermediate,
    Effect,
}

/// Where a listening mediator holds a neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSlot {
    Effect,
    Intermediate(usize),
    Cause(usize),
}

impl EventSlot {
    fn rank(self) -> u8 {
        match self {
            EventSlot::Effect => 0,
            EventSlot::Intermediate(_) => 1,
            EventSlot::Cause(_) => 2,
        }
    }

    pub fn kind(self) -> EventKind {
        match self {
            EventSlot::Effect => EventKind::Effect,
            EventSlot::Intermediate(_) => EventKind::Intermediate,
            EventSlot::Cause(_) => EventKind::Cause,
        }
    }
}

/// Back-reference from an event neuron to a mediator that listens to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notify {
    pub mediator: NeuronId,
    pub slot: EventSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receptor {
    pub sensor_mask: Vec<Sensor>,
}

impl Receptor {
    /// Fraction of exactly matched slots; zero on any specific mismatch.
    pub fn sense(&self, sensors: &[Sensor]) -> f64 {
        let n = self.sensor_mask.len();
        if n == 0 {
            return 0.0;
        }
        let mut strength = 0.0;
        for (m, s) in self.sensor_mask.iter().zip(sensors) {
            if *m == DONT_CARE {
                continue;
            }
            if m != s {
                return 0.0;
            }
            strength += 1.0 / n as f64;
        }
        strength
    }

    pub fn is_duplicate(&self, other: &Receptor) -> bool {
        self.sensor_mask == other.sensor_mask
    }

    /// True if `self` differs from `other` only by wildcards where `other` is specific.
    pub fn subsumes(&self, other: &Receptor) -> bool {
        let mut differs = false;
        for (a, b) in self.sensor_mask.iter().zip(&other.sensor_mask) {
            if a == b {
                continue;
            }
            if *a != DONT_CARE || *b == DONT_CARE {
                return false;
            }
            differs = true;
        }
        differs
    }

    pub fn specific_slots(&self) -> usize {
        self.sensor_mask.iter().filter(|s| **s != DONT_CARE).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motor {
    pub response: Response,
}

/// Which enablement figures a reinforcement rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReinforceScope {
    /// Every intermediate slot and the effect.
    All,
    /// Intermediate slots `0..=i`.
    UpTo(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mediator {
    pub causes: Vec<NeuronId>,
    pub intermediates: Vec<NeuronId>,
    pub effect: Option<NeuronId>,
    pub enabler: bool,
    pub instinct: bool,
    pub level: usize,
    pub utility: f64,
    pub cause_begin: Time,

    pub base_enablement: Enablement,
    pub intermediate_enablements: Vec<Enablement>,
    pub effect_enablement: Enablement,

    pub intermediate_enablings: Vec<EnablingSet>,
    pub effect_enablings: EnablingSet,
    pub wagered_enablings: EnablingSet,
    pub pending_enablings: Vec<Vec<PendingEnabling>>,

    pub timed_wager_weights: Vec<Weight>,
    pub wager_history: WagerHistory,
}

impl Mediator {
    pub fn new(base_enablement: Enablement, enabler: bool, utility: f64, num_event_timers: usize) -> Self {
        let timers = num_event_timers.max(1);
        Self {
            causes: Vec::new(),
            intermediates: Vec::new(),
            effect: None,
            enabler,
            instinct: false,
            level: 0,
            utility,
            cause_begin: 0,
            base_enablement,
            intermediate_enablements: Vec::new(),
            effect_enablement: base_enablement,
            intermediate_enablings: Vec::new(),
            effect_enablings: EnablingSet::new(),
            wagered_enablings: EnablingSet::new(),
            pending_enablings: Vec::new(),
            timed_wager_weights: vec![1.0 / timers as f64; timers],
            wager_history: WagerHistory::default(),
        }
    }

    /// Enablement currently committed to enablings.
    pub fn outstanding_enablement(&self) -> Enablement {
        self.intermediate_enablings.iter().map(EnablingSet::value).sum::<Enablement>()
            + self.effect_enablings.value()
            + self.wagered_enablings.value()
    }

    /// Base plus everything currently wagered out.
    pub fn total_enablement(&self) -> Enablement {
        self.base_enablement + self.outstanding_enablement()
    }

    /// Signed confidence: positive for enablers, negative for disablers.
    pub fn enablement(&self) -> Enablement {
        if self.enabler {
            self.total_enablement()
        } else {
            -self.total_enablement()
        }
    }

    /// Enablings that advance when the first cause conjunction completes.
    pub fn first_stage(&self) -> &EnablingSet {
        self.intermediate_enablings.first().unwrap_or(&self.effect_enablings)
    }

    /// Enablings that advance after intermediate `i` fires.
    pub fn stage_after(&self, i: usize) -> &EnablingSet {
        self.intermediate_enablings.get(i + 1).unwrap_or(&self.effect_enablings)
    }

    pub fn clear_flags(&mut self) {
        for set in &mut self.intermediate_enablings {
            set.clear_flags();
        }
        self.effect_enablings.clear_flags();
        self.wagered_enablings.clear_flags();
    }

    /// Feed an outcome through the wager history and rewrite the enablement
    /// figures so the total matches the updated estimate.
    pub(crate) fn reinforce(
        &mut self,
        outcome: Outcome,
        weight: Weight,
        scope: ReinforceScope,
        cfg: &MonaConfig,
    ) {
        let total = self.total_enablement();
        let updated = self.wager_history.enablement(outcome, total, weight, cfg);
        self.base_enablement = (updated - self.outstanding_enablement()).max(0.0);
        match scope {
            ReinforceScope::All => {
                for e in &mut self.intermediate_enablements {
                    *e = updated;
                }
                self.effect_enablement = updated;
            }
            ReinforceScope::UpTo(i) => {
                for e in self.intermediate_enablements.iter_mut().take(i + 1) {
                    *e = updated;
                }
            }
        }
    }

    /// Structural identity: polarity, unordered causes, ordered intermediates, effect.
    pub fn same_shape(
        &self,
        enabler: bool,
        causes: &[NeuronId],
        intermediates: &[NeuronId],
        effect: Option<NeuronId>,
    ) -> bool {
        self.enabler == enabler
            && self.effect == effect
            && self.intermediates == intermediates
            && self.causes.len() == causes.len()
            && self.causes.iter().all(|c| causes.contains(c))
            && causes.iter().all(|c| self.causes.contains(c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NeuronKind {
    Receptor(Receptor),
    Motor(Motor),
    Mediator(Box<Mediator>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
    pub id: NeuronId,
    pub description: String,
    pub firing_strength: f64,
    pub goals: GoalValue,
    pub motive: Motive,
    /// Drive accumulators `[enabling, disabling]` and whether each was reached this pass.
    pub(crate) motive_valid: [bool; 2],
    pub(crate) accum: [MotiveAccum; 2],
    pub enabling_accum: Enablement,
    pub disabling_accum: Enablement,
    pub(crate) notify: Vec<Notify>,
    pub kind: NeuronKind,
}

impl Neuron {
    pub(crate) fn new(id: NeuronId, description: String, kind: NeuronKind, cfg: &MonaConfig) -> Self {
        let accum = MotiveAccum::new(&vec![0.0; cfg.num_needs], cfg.max_need);
        Self {
            id,
            description,
            firing_strength: 0.0,
            goals: GoalValue::new(cfg.num_needs),
            motive: 0.0,
            motive_valid: [false; 2],
            accum: [accum.clone(), accum],
            enabling_accum: 0.0,
            disabling_accum: 0.0,
            notify: Vec::new(),
            kind,
        }
    }

    pub fn is_receptor(&self) -> bool {
        matches!(self.kind, NeuronKind::Receptor(_))
    }

    pub fn is_motor(&self) -> bool {
        matches!(self.kind, NeuronKind::Motor(_))
    }

    pub fn is_mediator(&self) -> bool {
        matches!(self.kind, NeuronKind::Mediator(_))
    }

    pub fn as_receptor(&self) -> Option<&Receptor> {
        match &self.kind {
            NeuronKind::Receptor(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_mediator(&self) -> Option<&Mediator> {
        match &self.kind {
            NeuronKind::Mediator(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mediator_mut(&mut self) -> Option<&mut Mediator> {
        match &mut self.kind {
            NeuronKind::Mediator(m) => Some(m),
            _ => None,
        }
    }

    pub fn motor_response(&self) -> Option<Response> {
        match &self.kind {
            NeuronKind::Motor(m) => Some(m.response),
            _ => None,
        }
    }

    /// Timeline level this neuron's learning events are filed under.
    pub fn timeline_level(&self) -> usize {
        match &self.kind {
            NeuronKind::Mediator(m) => m.level + 1,
            _ => 0,
        }
    }

    /// Composition level contributed to a mediator built on this neuron.
    pub(crate) fn parent_level(&self) -> usize {
        self.timeline_level()
    }

    pub fn notify_list(&self) -> &[Notify] {
        &self.notify
    }

    /// Keep effect listeners ahead of intermediate listeners ahead of cause listeners.
    pub(crate) fn add_notify(&mut self, notify: Notify) {
        self.notify.push(notify);
        self.notify.sort_by_key(|n| n.slot.rank());
    }

    pub(crate) fn remove_notify_for(&mut self, mediator: NeuronId) {
        self.notify.retain(|n| n.mediator != mediator);
    }
}
