//! Learn phase: grow mediators from the learning timeline, settle wagers,
//! and keep the mediator population under its ceiling.

use tracing::debug;

use crate::mona::{longest_timer, timer_at, Mona};
use crate::neuron::{EventSlot, Neuron, Notify};
use crate::network::MediatorShape;
use crate::timeline::LearningEvent;
use crate::values::{Enablement, Motive, NeuronId, Time};

impl Mona {
    pub(crate) fn learn(&mut self) {
        if self.cfg.structural_learning {
            // The top level only holds effects of maximal mediators; nothing builds on them.
            let levels = self.timeline.num_levels();
            for i in 0..levels.saturating_sub(1) {
                let mut j = 0;
                // New mediators append to higher levels while this runs.
                while let Some(event) = self.timeline.level(i).get(j).copied() {
                    j += 1;
                    if event.timestamp != self.event_clock || event.motive <= 0.0 {
                        continue;
                    }
                    if !self.net.contains(event.neuron) || self.net.is_motor(event.neuron) {
                        continue;
                    }
                    self.create_mediator(&event);
                    self.create_conjunction(&event);
                    self.extend_mediator(&event);
                }
            }
        }

        if self.cfg.learn_goal_values {
            self.update_goal_values();
        }

        let mediators = self.net.mediators().to_vec();
        for id in &mediators {
            self.mark_parasitic_wagers(*id);
        }
        for id in &mediators {
            self.pay_wagers(*id);
        }
        for id in &mediators {
            if let Some(m) = self.net.mediator_mut(*id) {
                m.expire_enablings(false, &self.event_timers);
            }
        }

        self.enforce_population_ceiling();
        self.event_clock += 1;
    }

    /// Pair a fired (or predicted but absent) effect with an earlier cause.
    pub(crate) fn create_mediator(&mut self, effect: &LearningEvent) {
        let Some(enabler) = self.effect_polarity(effect) else { return };
        let Some(target) = self.net.get(effect.neuron) else { return };
        let level = target.timeline_level();
        let effect_is_receptor = target.is_receptor();
        let new_enablement = self.cfg.new_enablement;

        for n in self.skew_order(level) {
            let Ok(n) = usize::try_from(n) else { continue };
            let mut j = 0;
            while let Some(cause) = self.timeline.level(n).get(j).copied() {
                j += 1;
                if cause.strength <= 0.0 || cause.timestamp >= effect.begin {
                    continue;
                }
                let Some(cause_neuron) = self.net.get(cause.neuron) else { continue };
                if cause_neuron.is_motor() {
                    continue;
                }
                let k = cause_neuron.timeline_level().max(level);
                if effect.begin - cause.timestamp > longest_timer(&self.event_timers, k) {
                    continue;
                }

                let response = if effect_is_receptor {
                    match self.pick_response(effect.timestamp) {
                        Some(r) => Some(r),
                        None => continue,
                    }
                } else {
                    None
                };
                let shape = MediatorShape {
                    enabler,
                    causes: vec![cause.neuron],
                    intermediates: response.into_iter().collect(),
                    effect: effect.neuron,
                };
                if let Some(id) = self.grow_mediator(&shape, new_enablement, new_enablement) {
                    if enabler {
                        self.publish_mediator(id, &cause, effect);
                    }
                }
            }
        }
    }

    /// Add a cause to a mediator whose outcome just surprised it: an enabler
    /// whose wager expired, or a disabler whose effect fired anyway.
    pub(crate) fn create_conjunction(&mut self, effect: &LearningEvent) {
        let Some(target) = self.net.get(effect.neuron) else { return };
        let level = target.timeline_level();
        let listeners: Vec<Notify> = target.notify.clone();
        let count = listeners.len();
        if count == 0 {
            return;
        }
        let max = self.cfg.max_enablement;
        let levels = self.timeline.num_levels();

        let mut k = self.rng.choice(count);
        for _ in 0..count {
            k = (k + 1) % count;
            let x = listeners[k];
            if x.slot != EventSlot::Effect {
                continue;
            }
            let Some(base) = self.net.mediator(x.mediator) else { continue };
            if base.causes.len() >= self.cfg.max_mediator_causes {
                continue;
            }
            let Some(base_effect) = base.effect else { continue };
            let mut expiring: Enablement = 0.0;
            let mut disablement: Enablement = 0.0;
            for e in &base.wagered_enablings {
                if base.enabler {
                    if e.age >= timer_at(&self.event_timers, base.level, e.timer_index) {
                        expiring += e.value;
                    }
                } else {
                    disablement += e.value;
                }
            }
            let base_level = base.level;
            let base_causes = base.causes.clone();
            let base_intermediates = base.intermediates.clone();
            let base_enablement = base.total_enablement().min(max);
            let base_utility = base.utility;

            let enabler = if effect.strength == 0.0 && effect.enablement > 0.0 && expiring > 0.0 {
                let p = self.motive_odds(effect.motive)
                    * (expiring / max).powf(self.cfg.expiring_enablement_learning_damper);
                if !self.rng.chance(p) {
                    continue;
                }
                true
            } else if effect.strength > 0.0 && effect.enablement < 0.0 && disablement > 0.0 {
                let p = self.motive_odds(effect.motive)
                    * (effect.strength / max).powf(self.cfg.strength_learning_damper)
                    * (disablement / max).powf(self.cfg.enablement_learning_damper);
                if !self.rng.chance(p) {
                    continue;
                }
                false
            } else {
                continue;
            };

            let window = longest_timer(&self.event_timers, base_level);
            for n in self.skew_order(level) {
                let Ok(n) = usize::try_from(n) else { continue };
                if n >= levels || n > base_level {
                    continue;
                }
                let mut j = 0;
                while let Some(cause) = self.timeline.level(n).get(j).copied() {
                    j += 1;
                    if cause.timestamp >= effect.begin || effect.begin - cause.timestamp > window {
                        continue;
                    }
                    let Some(cause_neuron) = self.net.get(cause.neuron) else { continue };
                    if cause_neuron.is_motor() || base_causes.contains(&cause.neuron) {
                        continue;
                    }
                    if let Some(r) = cause_neuron.as_receptor() {
                        let overlaps = base_causes.iter().any(|c| {
                            self.net
                                .get(*c)
                                .and_then(Neuron::as_receptor)
                                .is_some_and(|other| r.subsumes(other) || other.subsumes(r))
                        });
                        if overlaps {
                            continue;
                        }
                    }

                    let mut causes = base_causes.clone();
                    causes.push(cause.neuron);
                    let shape = MediatorShape {
                        enabler,
                        causes,
                        intermediates: base_intermediates.clone(),
                        effect: base_effect,
                    };
                    if self.grow_mediator(&shape, base_enablement, base_utility).is_some() {
                        return;
                    }
                }
            }
        }
    }

    /// Chain mediators: fold this effect onto an earlier enabler as a new
    /// step, or prepend an earlier cause to the mediator that just fired.
    pub(crate) fn extend_mediator(&mut self, effect: &LearningEvent) {
        let Some(enabler) = self.effect_polarity(effect) else { return };
        let Some(target) = self.net.get(effect.neuron) else { return };
        let level = target.timeline_level();
        let effect_is_receptor = target.is_receptor();
        let skew = self.cfg.max_mediator_skew;
        let max_events = self.cfg.max_mediator_events;
        let levels = self.timeline.num_levels();
        let new_enablement = self.cfg.new_enablement;

        // Append: base causes, base intermediates, base effect, [response], effect.
        for n in (level + 1)..=(level + skew + 1) {
            if n >= levels {
                break;
            }
            let window = longest_timer(&self.event_timers, n - 1);
            let mut j = self.timeline.level(n).len();
            while j > 0 {
                j -= 1;
                let Some(cause) = self.timeline.level(n).get(j).copied() else { continue };
                if cause.strength <= 0.0 || cause.timestamp >= effect.begin {
                    continue;
                }
                if effect.begin - cause.timestamp > window {
                    continue;
                }
                let Some(base) = self.net.mediator(cause.neuron) else { continue };
                if !base.enabler {
                    continue;
                }
                let added = if effect_is_receptor { 2 } else { 1 };
                if base.intermediates.len() + added + 2 > max_events {
                    continue;
                }
                let Some(base_effect) = base.effect else { continue };
                let causes = base.causes.clone();
                let mut intermediates = base.intermediates.clone();

                let response = if effect_is_receptor {
                    match self.pick_response(effect.timestamp) {
                        Some(r) => Some(r),
                        None => continue,
                    }
                } else {
                    None
                };
                intermediates.push(base_effect);
                intermediates.extend(response);
                let shape = MediatorShape {
                    enabler,
                    causes,
                    intermediates,
                    effect: effect.neuron,
                };
                if let Some(id) = self.grow_mediator(&shape, new_enablement, new_enablement) {
                    if enabler {
                        self.publish_mediator(id, &cause, effect);
                    }
                    return;
                }
            }
        }

        // Prepend: cause, [response], base cause, base intermediates -> base effect.
        if !enabler {
            return;
        }
        let Some(base) = self.net.mediator(effect.neuron) else { return };
        if base.causes.len() > 1 {
            return;
        }
        let Some(&first_cause) = base.causes.first() else { return };
        let Some(base_effect) = base.effect else { return };
        let base_level = base.level;
        let base_intermediates = base.intermediates.clone();
        let first_is_receptor = self.net.is_receptor(first_cause);
        let window = longest_timer(&self.event_timers, base_level);
        let lowest = (base_level + 1).saturating_sub(skew + 1);

        for n in (lowest..=base_level).rev() {
            let mut j = self.timeline.level(n).len();
            while j > 0 {
                j -= 1;
                let Some(cause) = self.timeline.level(n).get(j).copied() else { continue };
                if self.net.is_motor(cause.neuron) || cause.strength <= 0.0 {
                    continue;
                }
                if cause.timestamp >= effect.begin || effect.begin - cause.timestamp > window {
                    continue;
                }
                let added = if first_is_receptor { 2 } else { 1 };
                if base_intermediates.len() + added + 2 > max_events {
                    continue;
                }

                let response = if first_is_receptor {
                    match self.pick_response(effect.begin) {
                        Some(r) => Some(r),
                        None => continue,
                    }
                } else {
                    None
                };
                let mut intermediates: Vec<NeuronId> = response.into_iter().collect();
                intermediates.push(first_cause);
                intermediates.extend_from_slice(&base_intermediates);
                let shape = MediatorShape {
                    enabler: true,
                    causes: vec![cause.neuron],
                    intermediates,
                    effect: base_effect,
                };
                if self.grow_mediator(&shape, new_enablement, new_enablement).is_some() {
                    return;
                }
            }
        }
    }

    /// Motors and receptors re-estimate goal values from the last need change.
    fn update_goal_values(&mut self) {
        let max_events = self.cfg.max_goal_value_events;
        let ids: Vec<NeuronId> = self
            .net
            .motors()
            .iter()
            .chain(self.net.receptors())
            .copied()
            .collect();
        for id in ids {
            let Some(n) = self.net.get_mut(id) else { continue };
            let firing = n.firing_strength;
            n.goals.update(&self.old_needs, &self.needs, firing, max_events);
        }
    }

    fn enforce_population_ceiling(&mut self) {
        while self.net.mediators().len() > self.cfg.max_mediators {
            let Some(worst) = self.worst_mediator() else { break };
            match self.delete_neuron(worst) {
                Ok(removed) => debug!(mediator = worst, removed, "culled mediator"),
                Err(_) => break,
            }
        }
    }

    /// Validate and build a candidate; duplicates and out-of-bounds shapes are dropped.
    fn grow_mediator(&mut self, shape: &MediatorShape, base: Enablement, utility: f64) -> Option<NeuronId> {
        if !self.net.admits(shape, &self.cfg) {
            return None;
        }
        match self.net.build_mediator(shape, base, utility, &self.cfg) {
            Ok(id) => {
                debug!(
                    mediator = id,
                    enabler = shape.enabler,
                    causes = shape.causes.len(),
                    intermediates = shape.intermediates.len(),
                    "created mediator"
                );
                Some(id)
            }
            Err(err) => {
                debug!(error = %err, "mediator candidate rejected");
                None
            }
        }
    }

    /// Offer a fresh enabler to higher-level learning in this same pass.
    fn publish_mediator(&mut self, id: NeuronId, cause: &LearningEvent, effect: &LearningEvent) {
        let max_level = self.cfg.max_mediator_level;
        let Some(n) = self.net.get_mut(id) else { return };
        let Some(m) = n.as_mediator_mut() else { return };
        if m.level >= max_level {
            return;
        }
        m.cause_begin = cause.begin;
        n.firing_strength = cause.strength * effect.strength;
        let level = n.timeline_level();
        if let Some(event) = self.learning_event(id) {
            self.timeline.push(level, event);
        }
    }

    /// Whether this effect event should seed an enabler (`Some(true)`), a
    /// disabler (`Some(false)`), or nothing this tick.
    fn effect_polarity(&mut self, effect: &LearningEvent) -> Option<bool> {
        let max = self.cfg.max_enablement;
        if effect.strength > 0.0 {
            let p = self.motive_odds(effect.motive)
                * (effect.strength / max).powf(self.cfg.strength_learning_damper);
            self.rng.chance(p).then_some(true)
        } else {
            if effect.enablement <= 0.0 {
                return None;
            }
            let p = self.motive_odds(effect.motive)
                * (effect.enablement / max).powf(self.cfg.enablement_learning_damper);
            self.rng.chance(p).then_some(false)
        }
    }

    fn motive_odds(&self, motive: Motive) -> f64 {
        (motive / self.cfg.max_motive()).powf(self.cfg.motive_learning_damper)
    }

    /// Timeline levels to search for causes, starting at a random offset
    /// within the skew band around `level` and wrapping downward.
    fn skew_order(&mut self, level: usize) -> Vec<i64> {
        let skew = self.cfg.max_mediator_skew as i64;
        let level = level as i64;
        let offset = self.rng.choice(self.cfg.max_mediator_skew + 1) as i64;
        let mut n = if self.rng.coin() { level + offset } else { level - offset };
        let mut order = Vec::with_capacity((2 * skew + 1) as usize);
        for _ in 0..(2 * skew + 1) {
            order.push(n);
            n -= 1;
            if n < level - skew {
                n = level + skew;
            }
        }
        order
    }

    /// A random motor that fired at `at`.
    fn pick_response(&mut self, at: Time) -> Option<NeuronId> {
        let net = &self.net;
        let candidates: Vec<NeuronId> = self
            .timeline
            .level(0)
            .iter()
            .filter(|e| e.strength > 0.0 && e.timestamp == at && net.is_motor(e.neuron))
            .map(|e| e.neuron)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.choice(candidates.len())])
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MonaConfig;
    use crate::enabling::Enabling;
    use crate::mona::Mona;
    use crate::network::MediatorShape;
    use crate::neuron::EventKind;
    use crate::timeline::LearningEvent;
    use crate::values::{NeuronId, Time};

    fn eager() -> Mona {
        let cfg = MonaConfig {
            auto_receptors: false,
            motive_learning_damper: 0.0,
            strength_learning_damper: 0.0,
            enablement_learning_damper: 0.0,
            expiring_enablement_learning_damper: 0.0,
            ..MonaConfig::with_size(2, 1, 1)
        };
        Mona::from_config(cfg).unwrap()
    }

    fn event(neuron: NeuronId, strength: f64, enablement: f64, begin: Time, timestamp: Time) -> LearningEvent {
        LearningEvent {
            neuron,
            strength,
            enablement,
            motive: 0.1,
            begin,
            timestamp,
        }
    }

    #[test]
    fn create_mediator_is_idempotent() {
        let mut mona = eager();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let go = mona.new_motor(0, "go").unwrap();
        mona.event_clock = 5;
        mona.timeline.push(0, event(a, 1.0, 0.0, 4, 4));
        mona.timeline.push(0, event(go, 1.0, 0.0, 5, 5));
        let effect = event(b, 1.0, 0.0, 5, 5);
        mona.timeline.push(0, effect);

        mona.create_mediator(&effect);
        assert_eq!(mona.net.mediators().len(), 1);
        let id = mona.net.mediators()[0];
        let m = mona.net.mediator(id).unwrap();
        assert!(m.enabler);
        assert_eq!(m.causes, vec![a]);
        assert_eq!(m.intermediates, vec![go]);
        assert_eq!(m.effect, Some(b));
        assert_eq!(m.base_enablement, mona.cfg.new_enablement);
        // Offered to the next level with the joint strength.
        assert_eq!(mona.timeline.level(1).len(), 1);
        assert_eq!(mona.timeline.level(1)[0].neuron, id);

        mona.create_mediator(&effect);
        assert_eq!(mona.net.mediators().len(), 1);
        assert_eq!(mona.timeline.level(1).len(), 1);
    }

    #[test]
    fn create_mediator_needs_a_response_for_receptor_effects() {
        let mut mona = eager();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        mona.new_motor(0, "go").unwrap();
        mona.event_clock = 5;
        mona.timeline.push(0, event(a, 1.0, 0.0, 4, 4));
        let effect = event(b, 1.0, 0.0, 5, 5);
        mona.create_mediator(&effect);
        assert!(mona.net.mediators().is_empty());
    }

    #[test]
    fn expired_enabler_grows_a_conjunction() {
        let mut mona = eager();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let c = mona.new_receptor(&[1, 1], "c").unwrap();
        let base = mona.new_mediator(0.1, true, 0.1, "a->b");
        mona.add_mediator_event(base, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(base, EventKind::Effect, b).unwrap();
        mona.net
            .mediator_mut(base)
            .unwrap()
            .wagered_enablings
            .push_raw(Enabling::new(0.2, 0.1, vec![0.0], 1, 0, 4));

        mona.event_clock = 5;
        mona.timeline.push(0, event(a, 1.0, 0.0, 4, 4));
        mona.timeline.push(0, event(c, 1.0, 0.0, 4, 4));
        let effect = event(b, 0.0, 0.2, 5, 5);
        mona.create_conjunction(&effect);

        let shape = MediatorShape {
            enabler: true,
            causes: vec![c, a],
            intermediates: vec![],
            effect: b,
        };
        let id = mona.net.find_duplicate(&shape).expect("conjunction created");
        let m = mona.net.mediator(id).unwrap();
        assert!((m.base_enablement - 0.3).abs() < 1e-12);
        assert_eq!(m.utility, 0.1);
    }

    #[test]
    fn extend_appends_effect_after_earlier_mediator() {
        let mut mona = eager();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let d = mona.new_receptor(&[1, 1], "d").unwrap();
        let go = mona.new_motor(1, "go").unwrap();
        let m = mona.new_mediator(0.1, true, 0.1, "a->b");
        mona.add_mediator_event(m, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(m, EventKind::Effect, b).unwrap();

        mona.event_clock = 5;
        mona.timeline.push(1, event(m, 0.5, 0.0, 3, 4));
        mona.timeline.push(0, event(go, 1.0, 0.0, 5, 5));
        let effect = event(d, 1.0, 0.0, 5, 5);
        mona.extend_mediator(&effect);

        let shape = MediatorShape {
            enabler: true,
            causes: vec![a],
            intermediates: vec![b, go],
            effect: d,
        };
        assert!(mona.net.find_duplicate(&shape).is_some());
    }

    #[test]
    fn population_and_shapes_stay_bounded() {
        let cfg = MonaConfig {
            max_mediators: 6,
            motive_learning_damper: 0.0,
            strength_learning_damper: 0.0,
            ..MonaConfig::with_size(2, 2, 1).with_seed(7)
        };
        let mut mona = Mona::from_config(cfg).unwrap();
        mona.init_need(0, 5.0, "food").unwrap();
        for r in 0..=2 {
            mona.new_motor(r, "m").unwrap();
        }
        let goal = mona.new_receptor(&[1, 1], "goal").unwrap();
        mona.set_goals(goal, &[5.0], 1.0).unwrap();

        let mut peak = 0;
        for t in 0..200u32 {
            let s = [(t % 2) as i32, (t % 3 == 0) as i32];
            mona.cycle(&s).unwrap();
            peak = peak.max(mona.net.mediators().len());
            assert!(mona.net.mediators().len() <= cfg.max_mediators);
            for id in mona.net.mediators() {
                let m = mona.net.mediator(*id).unwrap();
                assert!(m.causes.len() <= cfg.max_mediator_causes);
                assert!(m.level <= cfg.max_mediator_level);
                assert!(m.intermediates.len() + 2 <= cfg.max_mediator_events);
            }
        }
        assert_eq!(mona.event_clock(), 200);
        assert!(peak > 0, "structural learning grew no mediators");
        assert!(!mona.net.mediators().is_empty());
    }
}
