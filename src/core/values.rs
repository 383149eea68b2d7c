//! Scalar aliases and the bounded need/goal accumulators.

use hashbrown::HashSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type NeuronId = u32;
pub type Sensor = i32;
pub type Response = usize;
pub type Need = f64;
pub type Motive = f64;
pub type Enablement = f64;
pub type Weight = f64;
pub type Time = u64;

/// Wildcard sensor slot in a receptor mask.
pub const DONT_CARE: Sensor = -1;

/// Values closer than this are treated as equal (utility ties, residual enablement).
pub const NEARLY_ZERO: f64 = 0.00001;

/// One observed need change attributed to a neuron.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GoalEvent {
    pub need_before: Vec<Need>,
    pub need_after: Vec<Need>,
    pub weight: Weight,
}

/// Running estimate of how much a neuron's firing reduces each need.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GoalValue {
    goals: Vec<Need>,
    weight: Weight,
    events: Vec<GoalEvent>,
}

impl GoalValue {
    pub fn new(num_needs: usize) -> Self {
        Self {
            goals: vec![0.0; num_needs],
            weight: 0.0,
            events: Vec::new(),
        }
    }

    pub fn value(&self) -> Need {
        self.goals.iter().sum()
    }

    pub fn goals(&self) -> &[Need] {
        &self.goals
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn events(&self) -> &[GoalEvent] {
        &self.events
    }

    /// Replace the goal vector and reset the history to a single synthetic event.
    pub fn set_goals(&mut self, goals: &[Need], weight: Weight) {
        let n = self.goals.len();
        self.goals.clear();
        self.goals.extend(goals.iter().copied().take(n));
        self.goals.resize(n, 0.0);
        self.weight = weight;
        self.events.clear();
        self.events.push(GoalEvent {
            need_before: self.goals.clone(),
            need_after: vec![0.0; n],
            weight: 1.0,
        });
    }

    /// Record a need change observed while this neuron fired with `weight`,
    /// then re-estimate goals as the weighted mean reduction over the history.
    pub fn update(&mut self, need_before: &[Need], need_after: &[Need], weight: Weight, max_events: usize) {
        if weight == 0.0 {
            return;
        }
        self.events.push(GoalEvent {
            need_before: need_before.to_vec(),
            need_after: need_after.to_vec(),
            weight,
        });
        if self.events.len() > max_events {
            let excess = self.events.len() - max_events;
            self.events.drain(..excess);
        }

        let total: Weight = self.events.iter().map(|e| e.weight).sum();
        if total <= 0.0 {
            return;
        }
        for (i, goal) in self.goals.iter_mut().enumerate() {
            let delta: Need = self
                .events
                .iter()
                .map(|e| {
                    let before = e.need_before.get(i).copied().unwrap_or(0.0);
                    let after = e.need_after.get(i).copied().unwrap_or(0.0);
                    (before - after) * e.weight
                })
                .sum();
            *goal = delta / total;
        }
    }

    pub(crate) fn from_parts(goals: Vec<Need>, weight: Weight, events: Vec<GoalEvent>) -> Self {
        Self {
            goals,
            weight,
            events,
        }
    }
}

/// Need-change accumulator pushed backward through the network during drive.
#[derive(Debug, Clone, PartialEq)]
pub struct MotiveAccum {
    base: Vec<Need>,
    delta: Vec<Need>,
    max_need: Need,
    pub weight: Weight,
    pub enabler: bool,
    tracker: HashSet<NeuronId>,
}

impl MotiveAccum {
    pub fn new(needs: &[Need], max_need: Need) -> Self {
        Self {
            base: needs.to_vec(),
            delta: vec![0.0; needs.len()],
            max_need,
            weight: 1.0,
            enabler: true,
            tracker: HashSet::new(),
        }
    }

    /// Net need reduction this accumulator represents, with the deltas
    /// truncated so no need leaves `[0, max_need]`.
    pub fn value(&self) -> Motive {
        let mut v = 0.0;
        for (b, d) in self.base.iter().zip(&self.delta) {
            let (b, d) = (*b, *d);
            if d < 0.0 {
                if b + d < 0.0 {
                    v += b;
                } else {
                    v -= d;
                }
            } else if b + d > self.max_need {
                v -= self.max_need - b;
            } else {
                v -= d;
            }
        }
        v
    }

    /// Copy of `self` scaled by `weight` for the next propagation hop.
    pub fn attenuated(&self, weight: Weight) -> Self {
        Self {
            base: self.base.clone(),
            delta: self.delta.iter().map(|d| d * weight).collect(),
            max_need: self.max_need,
            weight: self.weight * weight,
            enabler: self.enabler,
            tracker: self.tracker.clone(),
        }
    }

    pub fn accum_goals(&mut self, goals: &GoalValue) {
        for (d, g) in self.delta.iter_mut().zip(goals.goals()) {
            *d -= g * self.weight;
        }
    }

    /// Adopt another accumulator's state (keeps the larger-motive path).
    pub fn load_from(&mut self, other: &MotiveAccum) {
        self.base.clone_from(&other.base);
        self.delta.clone_from(&other.delta);
        self.max_need = other.max_need;
        self.weight = other.weight;
        self.enabler = other.enabler;
    }

    pub fn reset(&mut self, needs: &[Need], max_need: Need) {
        self.base.clear();
        self.base.extend_from_slice(needs);
        self.delta.clear();
        self.delta.resize(needs.len(), 0.0);
        self.max_need = max_need;
        self.weight = 1.0;
        self.enabler = true;
        self.tracker.clear();
    }

    /// Returns false if `id` is already on this propagation path.
    pub fn add_tracker(&mut self, id: NeuronId) -> bool {
        self.tracker.insert(id)
    }
}
