//! The engine: owns the network, needs, timers, timeline and RNG, and runs
//! the per-tick `sense -> enable -> learn -> drive -> respond` cycle.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::MonaConfig;
use crate::error::MonaError;
use crate::network::Network;
use crate::neuron::{EventKind, Motor, Neuron, NeuronKind, Receptor};
use crate::prng::Prng;
use crate::timeline::{LearningEvent, Timeline};
use crate::values::{Enablement, Need, NeuronId, Response, Sensor, Time, Weight, NEARLY_ZERO};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub receptor_count: usize,
    pub motor_count: usize,
    pub mediator_count: usize,
    pub max_mediator_level: usize,
    pub event_clock: Time,
    pub timeline_events: usize,
    pub base_enablement: Enablement,
    pub outstanding_enablement: Enablement,
    pub parasitic_wagers: usize,
}

#[derive(Debug, Clone)]
pub struct Mona {
    pub(crate) cfg: MonaConfig,
    pub(crate) rng: Prng,
    pub(crate) net: Network,

    pub(crate) sensors: Vec<Sensor>,
    pub(crate) response: Response,
    pub(crate) response_randomness: f64,
    pub(crate) response_override: Option<Response>,
    pub(crate) override_potentials: Vec<f64>,
    pub(crate) inhibitors: Vec<bool>,
    pub(crate) response_potentials: Vec<f64>,

    pub(crate) needs: Vec<Need>,
    pub(crate) old_needs: Vec<Need>,
    pub(crate) need_descriptions: Vec<String>,

    /// `event_timers[level][i]`: how long a wager in bucket `i` may stay outstanding.
    pub(crate) event_timers: Vec<Vec<Time>>,
    pub(crate) event_clock: Time,
    pub(crate) timeline: Timeline,
}

/// Duration of timer `index` at `level`, clamped into the table.
pub(crate) fn timer_at(timers: &[Vec<Time>], level: usize, index: usize) -> Time {
    let Some(row) = timers.get(level.min(timers.len().saturating_sub(1))) else {
        return 0;
    };
    row.get(index.min(row.len().saturating_sub(1)))
        .copied()
        .unwrap_or(0)
}

/// Longest timer at `level`.
pub(crate) fn longest_timer(timers: &[Vec<Time>], level: usize) -> Time {
    timer_at(timers, level, usize::MAX)
}

/// Share of `enablement` a firing of `strength` moves on.
pub(crate) fn transfer_fraction(strength: f64, enablement: Enablement, max: Enablement) -> Weight {
    if strength >= enablement / max {
        1.0
    } else if enablement > 0.0 {
        max * strength / enablement
    } else {
        0.0
    }
}

impl Mona {
    pub fn new(
        num_sensors: usize,
        max_response: usize,
        num_needs: usize,
        seed: u64,
    ) -> Result<Self, MonaError> {
        Self::from_config(MonaConfig::with_size(num_sensors, max_response, num_needs).with_seed(seed))
    }

    pub fn with_event_timers(
        num_sensors: usize,
        max_response: usize,
        num_needs: usize,
        num_event_timers: usize,
        seed: u64,
    ) -> Result<Self, MonaError> {
        Self::from_config(
            MonaConfig::with_size(num_sensors, max_response, num_needs)
                .with_event_timers(num_event_timers)
                .with_seed(seed),
        )
    }

    pub fn from_config(cfg: MonaConfig) -> Result<Self, MonaError> {
        cfg.validate()?;
        let responses = cfg.max_response + 1;
        let event_timers = (0..=cfg.max_mediator_level)
            .map(|level| vec![1u64 << level.min(62); cfg.num_event_timers])
            .collect();
        Ok(Self {
            rng: Prng::new(cfg.seed),
            net: Network::new(),
            sensors: vec![0; cfg.num_sensors],
            response: 0,
            response_randomness: cfg.residual_response_randomness,
            response_override: None,
            override_potentials: vec![0.0; responses],
            inhibitors: vec![false; responses],
            response_potentials: vec![0.0; responses],
            needs: vec![0.0; cfg.num_needs],
            old_needs: vec![0.0; cfg.num_needs],
            need_descriptions: vec![String::new(); cfg.num_needs],
            event_timers,
            event_clock: 0,
            timeline: Timeline::new(cfg.timeline_levels()),
            cfg,
        })
    }

    // ---------------------------------------------------------------------
    // Needs
    // ---------------------------------------------------------------------

    pub fn init_need(&mut self, index: usize, value: Need, description: &str) -> Result<(), MonaError> {
        self.set_need(index, value)?;
        self.old_needs[index] = self.needs[index];
        self.need_descriptions[index] = description.to_string();
        Ok(())
    }

    /// Set a need, clamped to `[0, max_need]`.
    pub fn set_need(&mut self, index: usize, value: Need) -> Result<(), MonaError> {
        let slot = self.needs.get_mut(index).ok_or(MonaError::NeedIndex(index))?;
        *slot = value.clamp(0.0, self.cfg.max_need);
        Ok(())
    }

    pub fn need(&self, index: usize) -> Result<Need, MonaError> {
        self.needs.get(index).copied().ok_or(MonaError::NeedIndex(index))
    }

    pub fn needs(&self) -> &[Need] {
        &self.needs
    }

    pub fn need_description(&self, index: usize) -> Option<&str> {
        self.need_descriptions.get(index).map(String::as_str)
    }

    // ---------------------------------------------------------------------
    // Network construction
    // ---------------------------------------------------------------------

    pub fn new_receptor(&mut self, sensor_mask: &[Sensor], description: &str) -> Result<NeuronId, MonaError> {
        if sensor_mask.len() != self.cfg.num_sensors {
            return Err(MonaError::SensorCount {
                expected: self.cfg.num_sensors,
                got: sensor_mask.len(),
            });
        }
        let kind = NeuronKind::Receptor(Receptor {
            sensor_mask: sensor_mask.to_vec(),
        });
        Ok(self.net.insert(Neuron::new(0, description.to_string(), kind, &self.cfg)))
    }

    pub fn new_motor(&mut self, response: Response, description: &str) -> Result<NeuronId, MonaError> {
        if response > self.cfg.max_response {
            return Err(MonaError::ResponseOutOfRange(response));
        }
        let kind = NeuronKind::Motor(Motor { response });
        Ok(self.net.insert(Neuron::new(0, description.to_string(), kind, &self.cfg)))
    }

    /// Create an empty mediator; attach its events with [`Mona::add_mediator_event`].
    pub fn new_mediator(
        &mut self,
        base_enablement: Enablement,
        enabler: bool,
        utility: f64,
        description: &str,
    ) -> NeuronId {
        let base = base_enablement.clamp(0.0, self.cfg.max_enablement);
        let med = crate::neuron::Mediator::new(base, enabler, utility, self.cfg.num_event_timers);
        let mut neuron = Neuron::new(
            0,
            description.to_string(),
            NeuronKind::Mediator(Box::new(med)),
            &self.cfg,
        );
        neuron.motive = self.cfg.min_motive;
        self.net.insert(neuron)
    }

    pub fn add_mediator_event(
        &mut self,
        mediator: NeuronId,
        kind: EventKind,
        event: NeuronId,
    ) -> Result<(), MonaError> {
        self.net.add_event(mediator, kind, event, &self.cfg)
    }

    pub fn set_instinct(&mut self, mediator: NeuronId, instinct: bool) -> Result<(), MonaError> {
        let med = self
            .net
            .get_mut(mediator)
            .ok_or(MonaError::UnknownNeuron(mediator))?
            .as_mediator_mut()
            .ok_or(MonaError::NotAMediator(mediator))?;
        med.instinct = instinct;
        Ok(())
    }

    pub fn set_goals(&mut self, neuron: NeuronId, goals: &[Need], weight: Weight) -> Result<(), MonaError> {
        if goals.len() != self.cfg.num_needs {
            return Err(MonaError::NeedIndex(goals.len()));
        }
        let n = self.net.get_mut(neuron).ok_or(MonaError::UnknownNeuron(neuron))?;
        n.goals.set_goals(goals, weight);
        Ok(())
    }

    /// Delete a neuron and every mediator built on it. Returns how many were removed.
    pub fn delete_neuron(&mut self, id: NeuronId) -> Result<usize, MonaError> {
        if !self.net.contains(id) {
            return Err(MonaError::UnknownNeuron(id));
        }
        let removed = self.net.delete(id);
        for r in &removed {
            self.timeline.remove_neuron(*r);
        }
        Ok(removed.len())
    }

    pub fn set_event_timer(&mut self, level: usize, index: usize, duration: Time) -> Result<(), MonaError> {
        let slot = self
            .event_timers
            .get_mut(level)
            .and_then(|row| row.get_mut(index))
            .ok_or(MonaError::EventTimer { level, index })?;
        *slot = duration;
        Ok(())
    }

    pub fn event_timer(&self, level: usize, index: usize) -> Option<Time> {
        self.event_timers.get(level)?.get(index).copied()
    }

    // ---------------------------------------------------------------------
    // Response controls
    // ---------------------------------------------------------------------

    /// Force the next responses (training); `None` restores free choice.
    pub fn set_response_override(&mut self, response: Option<Response>) -> Result<(), MonaError> {
        if let Some(r) = response {
            if r > self.cfg.max_response {
                return Err(MonaError::ResponseOutOfRange(r));
            }
        }
        self.response_override = response;
        Ok(())
    }

    pub fn set_response_override_potential(&mut self, response: Response, potential: f64) -> Result<(), MonaError> {
        let slot = self
            .override_potentials
            .get_mut(response)
            .ok_or(MonaError::ResponseOutOfRange(response))?;
        *slot = potential;
        Ok(())
    }

    pub fn set_response_inhibited(&mut self, response: Response, inhibited: bool) -> Result<(), MonaError> {
        let slot = self
            .inhibitors
            .get_mut(response)
            .ok_or(MonaError::ResponseOutOfRange(response))?;
        *slot = inhibited;
        Ok(())
    }

    pub fn set_response_randomness(&mut self, randomness: f64) {
        self.response_randomness = randomness.clamp(0.0, 1.0);
    }

    // ---------------------------------------------------------------------
    // Cycle
    // ---------------------------------------------------------------------

    /// Advance one tick and return the selected response.
    pub fn cycle(&mut self, sensors: &[Sensor]) -> Result<Response, MonaError> {
        if sensors.len() != self.cfg.num_sensors {
            return Err(MonaError::SensorCount {
                expected: self.cfg.num_sensors,
                got: sensors.len(),
            });
        }
        self.sensors.copy_from_slice(sensors);

        self.sense();
        self.enable();
        self.learn();
        self.drive();
        let response = self.respond();
        self.old_needs.clone_from(&self.needs);

        trace!(
            clock = self.event_clock,
            response,
            mediators = self.net.mediators().len(),
            "cycle"
        );
        Ok(response)
    }

    pub(crate) fn sense(&mut self) {
        for i in 0..self.net.receptors().len() {
            let id = self.net.receptors()[i];
            if let Some(n) = self.net.get_mut(id) {
                if let NeuronKind::Receptor(r) = &n.kind {
                    n.firing_strength = r.sense(&self.sensors);
                }
            }
        }
    }

    /// Pick a response from motor motives and fire its motors.
    pub(crate) fn respond(&mut self) -> Response {
        let inhibit_all = self.inhibitors.iter().all(|x| *x);
        let inhibited = |r: usize, inhibitors: &[bool]| !inhibit_all && inhibitors[r];

        self.response_potentials.iter_mut().for_each(|p| *p = 0.0);
        for id in self.net.motors() {
            let Some(n) = self.net.get(*id) else { continue };
            let Some(r) = n.motor_response() else { continue };
            if !inhibited(r, &self.inhibitors) {
                self.response_potentials[r] += n.motive;
            }
        }
        for (r, p) in self.response_potentials.iter_mut().enumerate() {
            if !inhibited(r, &self.inhibitors) {
                *p += self.override_potentials[r];
            }
        }

        // Shift to non-negative and normalize.
        let min = self
            .response_potentials
            .iter()
            .copied()
            .fold(0.0_f64, f64::min);
        let mut sum = 0.0;
        for p in &mut self.response_potentials {
            *p -= min;
            sum += *p;
        }
        if sum > 0.0 {
            for p in &mut self.response_potentials {
                *p /= sum;
            }
        }

        let randomness = self.response_randomness;
        for r in 0..self.response_potentials.len() {
            if !inhibited(r, &self.inhibitors) {
                let noise = self.rng.next_f64_01();
                let p = &mut self.response_potentials[r];
                *p = *p * (1.0 - randomness) + noise * randomness;
            }
        }

        let mut best: Option<(Response, f64)> = None;
        for (r, p) in self.response_potentials.iter().enumerate() {
            if inhibited(r, &self.inhibitors) {
                continue;
            }
            if best.map_or(true, |(_, b)| *p > b) {
                best = Some((r, *p));
            }
        }
        self.response = self
            .response_override
            .or(best.map(|(r, _)| r))
            .unwrap_or(0);

        let motors = self.net.motors().to_vec();
        for id in motors {
            let Some(n) = self.net.get_mut(id) else { continue };
            if n.motor_response() == Some(self.response) {
                n.firing_strength = 1.0;
            } else {
                n.firing_strength = 0.0;
                self.expire_motor_enablings(id);
            }
        }
        self.response
    }

    /// Reset short-term state, keeping every learned neuron.
    pub fn clear_working_memory(&mut self) {
        for id in self.net.all_ids() {
            let Some(n) = self.net.get_mut(id) else { continue };
            n.firing_strength = 0.0;
            n.motive = self.cfg.min_motive;
            if let Some(m) = n.as_mediator_mut() {
                m.expire_enablings(true, &self.event_timers);
            }
        }
        self.timeline.clear();
        self.event_clock = 0;
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Snapshot a neuron's current activity as learning material.
    pub(crate) fn learning_event(&self, id: NeuronId) -> Option<LearningEvent> {
        let n = self.net.get(id)?;
        let begin = n.as_mediator().map_or(self.event_clock, |m| m.cause_begin);
        Some(LearningEvent {
            neuron: id,
            strength: n.firing_strength,
            enablement: self.mediating_enablement(id, true),
            motive: n.motive,
            begin,
            timestamp: self.event_clock,
        })
    }

    /// Net enablement of mediators waiting on `id` as their effect,
    /// enablers counted positive and disablers negative.
    pub fn mediating_enablement(&self, id: NeuronId, wagered: bool) -> Enablement {
        let Some(n) = self.net.get(id) else { return 0.0 };
        let mut e = 0.0;
        for notify in n.notify_list() {
            if notify.slot != crate::neuron::EventSlot::Effect {
                continue;
            }
            let Some(m) = self.net.mediator(notify.mediator) else { continue };
            let v = if wagered {
                m.wagered_enablings.value()
            } else {
                m.effect_enablings.value()
            };
            e += if m.enabler { v } else { -v };
        }
        let max = self.cfg.max_enablement;
        let e = e.clamp(-max, max);
        if e.abs() <= NEARLY_ZERO {
            0.0
        } else {
            e
        }
    }

    /// Lowest-utility mediator not protected by an instinct; near ties broken at random.
    pub fn worst_mediator(&mut self) -> Option<NeuronId> {
        self.extreme_mediator(false)
    }

    /// Highest-utility mediator; near ties broken at random.
    pub fn best_mediator(&mut self) -> Option<NeuronId> {
        self.extreme_mediator(true)
    }

    fn extreme_mediator(&mut self, best: bool) -> Option<NeuronId> {
        let mut ties: Vec<NeuronId> = Vec::new();
        let mut extreme = 0.0;
        for id in self.net.mediators() {
            if !best && self.net.is_instinct(*id) {
                continue;
            }
            let u = self.net.utility(*id);
            if ties.is_empty() {
                extreme = u;
                ties.push(*id);
                continue;
            }
            if (u - extreme).abs() <= NEARLY_ZERO {
                ties.push(*id);
            } else if (best && u > extreme) || (!best && u < extreme) {
                extreme = u;
                ties.clear();
                ties.push(*id);
            }
        }
        match ties.len() {
            0 => None,
            1 => Some(ties[0]),
            n => Some(ties[self.rng.choice(n)]),
        }
    }

    pub fn config(&self) -> &MonaConfig {
        &self.cfg
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.net.get(id)
    }

    pub fn response(&self) -> Response {
        self.response
    }

    pub fn response_potentials(&self) -> &[f64] {
        &self.response_potentials
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn event_clock(&self) -> Time {
        self.event_clock
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut d = Diagnostics {
            receptor_count: self.net.receptors().len(),
            motor_count: self.net.motors().len(),
            mediator_count: self.net.mediators().len(),
            max_mediator_level: 0,
            event_clock: self.event_clock,
            timeline_events: self.timeline.len(),
            base_enablement: 0.0,
            outstanding_enablement: 0.0,
            parasitic_wagers: 0,
        };
        for id in self.net.mediators() {
            let Some(m) = self.net.mediator(*id) else { continue };
            d.max_mediator_level = d.max_mediator_level.max(m.level);
            d.base_enablement += m.base_enablement;
            d.outstanding_enablement += m.outstanding_enablement();
            d.parasitic_wagers += m.wagered_enablings.iter().filter(|e| e.parasite).count();
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::DONT_CARE;

    fn quiet_config() -> MonaConfig {
        MonaConfig {
            structural_learning: false,
            auto_receptors: false,
            ..MonaConfig::with_size(2, 3, 1)
        }
    }

    /// Receptors for `[1,0]` (cause) and `[0,1]` (effect), one motor per response,
    /// and a hand-built mediator `cause -> effect`.
    fn wager_fixture() -> (Mona, NeuronId, NeuronId, NeuronId) {
        let mut mona = Mona::from_config(quiet_config()).unwrap();
        mona.init_need(0, 1.0, "food").unwrap();
        let cause = mona.new_receptor(&[1, 0], "cause").unwrap();
        let effect = mona.new_receptor(&[0, 1], "effect").unwrap();
        for r in 0..=3 {
            mona.new_motor(r, "motor").unwrap();
        }
        let med = mona.new_mediator(mona.cfg.new_enablement, true, 0.075, "m");
        mona.add_mediator_event(med, EventKind::Cause, cause).unwrap();
        mona.add_mediator_event(med, EventKind::Effect, effect).unwrap();
        (mona, cause, effect, med)
    }

    #[test]
    fn construction_validates_dimensions() {
        assert!(Mona::new(0, 1, 1, 1).is_err());
        assert!(Mona::new(2, 1, 0, 1).is_err());
        let mona = Mona::with_event_timers(2, 1, 1, 3, 1).unwrap();
        assert_eq!(mona.event_timer(0, 2), Some(1));
        assert_eq!(mona.event_timer(1, 0), Some(2));
        assert_eq!(mona.event_timer(2, 0), None);
    }

    #[test]
    fn needs_are_clamped_and_indexed() {
        let mut mona = Mona::new(1, 1, 2, 1).unwrap();
        mona.init_need(1, 3.0, "water").unwrap();
        assert_eq!(mona.need(1).unwrap(), 3.0);
        assert_eq!(mona.need_description(1), Some("water"));
        mona.set_need(0, 50.0).unwrap();
        assert_eq!(mona.need(0).unwrap(), 10.0);
        mona.set_need(0, -1.0).unwrap();
        assert_eq!(mona.need(0).unwrap(), 0.0);
        assert!(matches!(mona.set_need(2, 1.0), Err(MonaError::NeedIndex(2))));
    }

    #[test]
    fn receptor_firing_follows_mask() {
        let mut mona = Mona::from_config(quiet_config()).unwrap();
        let r = mona.new_receptor(&[1, DONT_CARE], "r").unwrap();
        let exact = mona.new_receptor(&[1, 1], "exact").unwrap();
        mona.sensors = vec![1, 7];
        mona.sense();
        assert_eq!(mona.neuron(r).unwrap().firing_strength, 0.5);
        assert_eq!(mona.neuron(exact).unwrap().firing_strength, 0.0);
    }

    #[test]
    fn cycle_rejects_wrong_sensor_count() {
        let mut mona = Mona::from_config(quiet_config()).unwrap();
        assert!(matches!(
            mona.cycle(&[1]),
            Err(MonaError::SensorCount { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn full_wager_on_cause_then_fire_beats_expire() {
        let (mut fired, _, _, med) = wager_fixture();
        let (mut expired, _, _, _) = wager_fixture();
        let new_enablement = fired.cfg.new_enablement;

        fired.cycle(&[1, 0]).unwrap();
        {
            let m = fired.net.mediator(med).unwrap();
            assert_eq!(m.base_enablement, 0.0);
            assert!((m.wagered_enablings.value() - new_enablement).abs() < 1e-12);
        }
        expired.cycle(&[1, 0]).unwrap();

        fired.cycle(&[0, 1]).unwrap();
        expired.cycle(&[0, 0]).unwrap();

        let f = fired.net.mediator(med).unwrap();
        let e = expired.net.mediator(med).unwrap();
        assert!(f.wagered_enablings.is_empty());
        assert!(e.wagered_enablings.is_empty());
        assert!(f.base_enablement > new_enablement);
        assert!(e.base_enablement < new_enablement);
        assert!(f.base_enablement > e.base_enablement);
        assert_eq!(f.wager_history.fires, 1);
        assert_eq!(e.wager_history.expires, 1);
    }

    #[test]
    fn override_forces_response_without_touching_enablement() {
        let (mut forced, _, _, med) = wager_fixture();
        let (mut gated, _, _, _) = wager_fixture();
        forced.set_response_override(Some(2)).unwrap();
        forced.set_response_override_potential(1, 100.0).unwrap();
        for r in [0, 1, 3] {
            gated.set_response_inhibited(r, true).unwrap();
        }

        for sensors in [[1, 0], [0, 1], [1, 0], [0, 0]] {
            assert_eq!(forced.cycle(&sensors).unwrap(), 2);
            assert_eq!(gated.cycle(&sensors).unwrap(), 2);
        }
        let a = forced.net.mediator(med).unwrap();
        let b = gated.net.mediator(med).unwrap();
        assert_eq!(a.base_enablement, b.base_enablement);
        assert_eq!(a.wagered_enablings, b.wagered_enablings);

        assert!(forced.set_response_override(Some(9)).is_err());
        forced.set_response_override(None).unwrap();
    }

    #[test]
    fn all_inhibited_falls_back_to_free_choice() {
        let mut mona = Mona::from_config(quiet_config()).unwrap();
        for r in 0..=3 {
            mona.new_motor(r, "m").unwrap();
            mona.set_response_inhibited(r, true).unwrap();
        }
        let r = mona.cycle(&[0, 0]).unwrap();
        assert!(r <= 3);
    }

    #[test]
    fn same_seed_same_responses() {
        let run = || {
            let mut mona = Mona::new(2, 2, 1, 42).unwrap();
            mona.init_need(0, 5.0, "food").unwrap();
            let goal = mona.new_receptor(&[1, 1], "goal").unwrap();
            mona.set_goals(goal, &[5.0], 1.0).unwrap();
            for r in 0..=2 {
                mona.new_motor(r, "m").unwrap();
            }
            let mut out = Vec::new();
            for t in 0..60 {
                let s = [(t % 3 == 0) as i32, (t % 5 == 0) as i32];
                out.push(mona.cycle(&s).unwrap());
            }
            (out, mona.diagnostics().mediator_count)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn learns_cue_response_goal() {
        const CUE: [Sensor; 2] = [1, 0];
        const GOAL: [Sensor; 2] = [1, 1];
        const BLANK: [Sensor; 2] = [0, 0];

        let mut mona = Mona::new(2, 1, 1, 42).unwrap();
        mona.init_need(0, 5.0, "food").unwrap();
        let goal = mona.new_receptor(&GOAL, "goal").unwrap();
        mona.set_goals(goal, &[5.0], 1.0).unwrap();
        mona.new_motor(0, "wait").unwrap();
        mona.new_motor(1, "go").unwrap();

        // Response 1 on the cue reaches the goal on the next tick.
        let mut correct = Vec::new();
        for _ in 0..1500 {
            let r = mona.cycle(&CUE).unwrap();
            correct.push(r == 1);
            mona.cycle(if r == 1 { &GOAL } else { &BLANK }).unwrap();
        }

        assert!(mona.diagnostics().mediator_count > 0);
        let recent = correct.iter().rev().take(100).filter(|c| **c).count();
        assert!(recent > 75, "chose the goal response on {recent} of the last 100 cues");
    }

    #[test]
    fn clear_working_memory_returns_wagers() {
        let (mut mona, _, _, med) = wager_fixture();
        mona.cycle(&[1, 0]).unwrap();
        mona.clear_working_memory();
        let m = mona.net.mediator(med).unwrap();
        assert!(m.wagered_enablings.is_empty());
        assert!((m.base_enablement - mona.cfg.new_enablement).abs() < 1e-12);
        assert_eq!(mona.event_clock(), 0);
        assert!(mona.timeline().is_empty());
    }

    #[test]
    fn delete_neuron_reports_cascade() {
        let (mut mona, cause, _, med) = wager_fixture();
        mona.cycle(&[1, 0]).unwrap();
        assert_eq!(mona.delete_neuron(cause).unwrap(), 2);
        assert!(mona.neuron(med).is_none());
        assert!(mona
            .timeline()
            .level(0)
            .iter()
            .chain(mona.timeline().level(1))
            .all(|e| e.neuron != cause && e.neuron != med));
        assert!(matches!(mona.delete_neuron(cause), Err(MonaError::UnknownNeuron(_))));
    }

    #[test]
    fn worst_mediator_skips_instincts() {
        let (mut mona, cause, effect, med) = wager_fixture();
        let weak = mona.new_mediator(0.01, true, 0.01, "weak");
        mona.add_mediator_event(weak, EventKind::Cause, effect).unwrap();
        mona.add_mediator_event(weak, EventKind::Effect, cause).unwrap();
        assert_eq!(mona.worst_mediator(), Some(weak));
        assert_eq!(mona.best_mediator(), Some(med));
        mona.set_instinct(weak, true).unwrap();
        assert_eq!(mona.worst_mediator(), Some(med));
        assert!(matches!(mona.set_instinct(cause, true), Err(MonaError::NotAMediator(_))));
    }
}
