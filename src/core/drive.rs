//! Drive phase: push need reductions from goal-bearing neurons back through
//! the mediator graph to the motors that can bring them about.

use hashbrown::HashSet;

use crate::mona::Mona;
use crate::neuron::EventSlot;
use crate::values::{Enablement, MotiveAccum, NeuronId};

/// The parts of a mediator that motive flows through.
struct Route {
    enabler: bool,
    base: Enablement,
    /// Intermediate events that have enablings waiting on them.
    waiting: Vec<(NeuronId, Enablement)>,
    /// Causes with no firing queued yet.
    unfired: Vec<NeuronId>,
}

impl Mona {
    pub(crate) fn drive(&mut self) {
        let ids = self.net.all_ids();
        let needs = self.needs.clone();
        let max_need = self.cfg.max_need;

        let mut goals = Vec::new();
        for id in &ids {
            let Some(n) = self.net.get_mut(*id) else { continue };
            n.motive = 0.0;
            if n.goals.value() != 0.0 {
                goals.push(*id);
            }
        }

        let mut touched: HashSet<NeuronId> = HashSet::new();
        for goal in goals {
            for id in &ids {
                if let Some(n) = self.net.get_mut(*id) {
                    n.motive_valid = [false; 2];
                    for a in &mut n.accum {
                        a.reset(&needs, max_need);
                    }
                }
            }
            let Some(n) = self.net.get(goal) else { continue };
            let mut accum = MotiveAccum::new(&needs, max_need);
            accum.accum_goals(&n.goals);
            self.drive_neuron(goal, accum);

            for id in &ids {
                let Some(n) = self.net.get_mut(*id) else { continue };
                if !n.motive_valid[0] && !n.motive_valid[1] {
                    continue;
                }
                let mut motive = 0.0;
                if n.motive_valid[0] {
                    motive += n.accum[0].value();
                }
                if n.motive_valid[1] {
                    motive -= n.accum[1].value();
                }
                if touched.insert(*id) || motive > n.motive {
                    n.motive = motive;
                }
            }
        }

        // Receptors and mediators always carry enough motive to be learned from.
        let min_motive = self.cfg.min_motive;
        for id in &ids {
            let Some(n) = self.net.get_mut(*id) else { continue };
            if n.is_motor() {
                continue;
            }
            if n.motive < min_motive {
                n.motive = min_motive;
            }
            let motive = n.motive;
            if let Some(m) = n.as_mediator_mut() {
                let sets = m
                    .intermediate_enablings
                    .iter_mut()
                    .chain([&mut m.effect_enablings, &mut m.wagered_enablings]);
                for set in sets {
                    for e in set.iter_mut() {
                        if e.motive < motive {
                            e.motive = motive;
                        }
                    }
                }
            }
        }
    }

    fn drive_neuron(&mut self, id: NeuronId, mut accum: MotiveAccum) {
        if !accum.add_tracker(id) {
            return;
        }
        let value = accum.value();
        let slot = usize::from(!accum.enabler);
        let Some(n) = self.net.get_mut(id) else { return };
        if n.motive_valid[slot] && value <= n.accum[slot].value() {
            return;
        }
        n.accum[slot].load_from(&accum);
        n.motive_valid[slot] = true;
        if n.is_motor() {
            return;
        }

        let mut producers = Vec::new();
        let mut supers = Vec::new();
        for x in n.notify_list() {
            match x.slot {
                EventSlot::Effect => producers.push(x.mediator),
                EventSlot::Cause(_) | EventSlot::Intermediate(_) => supers.push(x.mediator),
            }
        }
        let route = n.as_mediator().map(|m| Route {
            enabler: m.enabler,
            base: m.base_enablement,
            waiting: m
                .intermediates
                .iter()
                .zip(&m.intermediate_enablings)
                .filter(|(_, set)| set.value() > 0.0)
                .map(|(event, set)| (*event, set.value()))
                .collect(),
            unfired: m
                .causes
                .iter()
                .zip(&m.pending_enablings)
                .filter(|(_, queue)| queue.is_empty())
                .map(|(cause, _)| *cause)
                .collect(),
        });

        // Mediators that would produce this neuron want it as much as it is wanted.
        for p in producers {
            self.drive_neuron(p, accum.clone());
        }

        let Some(route) = route else { return };
        let max = self.cfg.max_enablement;
        let attenuation = self.cfg.drive_attenuation;
        let mut through = accum.clone();
        if !route.enabler {
            through.enabler = !through.enabler;
        }
        for (event, waiting) in route.waiting {
            self.drive_neuron(event, through.attenuated(waiting / max * attenuation));
        }
        let share = (route.base / max).clamp(0.0, 1.0);
        if share > 0.0 {
            for cause in route.unfired {
                self.drive_neuron(cause, through.attenuated(share * attenuation));
            }
        }
        let rest = 1.0 - share;
        if rest > 0.0 {
            for s in supers {
                self.drive_neuron(s, accum.attenuated(rest * attenuation));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MonaConfig;
    use crate::enabling::Enabling;
    use crate::mona::Mona;
    use crate::neuron::EventKind;

    fn engine() -> Mona {
        let cfg = MonaConfig {
            structural_learning: false,
            auto_receptors: false,
            ..MonaConfig::with_size(2, 2, 1)
        };
        let mut mona = Mona::from_config(cfg).unwrap();
        mona.init_need(0, 5.0, "food").unwrap();
        mona
    }

    #[test]
    fn motive_reaches_waiting_motor_and_unfired_cause() {
        let mut mona = engine();
        let c = mona.new_receptor(&[1, 0], "c").unwrap();
        let e = mona.new_receptor(&[0, 1], "e").unwrap();
        let go = mona.new_motor(1, "go").unwrap();
        let idle = mona.new_motor(0, "idle").unwrap();
        let m = mona.new_mediator(0.5, true, 0.5, "c,go->e");
        mona.add_mediator_event(m, EventKind::Cause, c).unwrap();
        mona.add_mediator_event(m, EventKind::Intermediate, go).unwrap();
        mona.add_mediator_event(m, EventKind::Effect, e).unwrap();
        mona.set_goals(e, &[5.0], 1.0).unwrap();
        mona.net.mediator_mut(m).unwrap().intermediate_enablings[0]
            .insert(Enabling::new(0.4, 0.0, vec![5.0], 0, 0, 0));

        mona.drive();
        let motive = |id| mona.neuron(id).unwrap().motive;
        assert!((motive(e) - 5.0).abs() < 1e-9);
        assert!((motive(m) - 5.0).abs() < 1e-9);
        assert!((motive(go) - 5.0 * 0.4 * 0.99).abs() < 1e-9);
        assert!((motive(c) - 5.0 * 0.5 * 0.99).abs() < 1e-9);
        assert_eq!(motive(idle), 0.0);
        // Waiting enablings pick up the mediator's motive.
        let waiting = mona.net.mediator(m).unwrap().intermediate_enablings[0].get(0).unwrap().motive;
        assert!((waiting - 5.0).abs() < 1e-9);
    }

    #[test]
    fn disabler_turns_motive_negative() {
        let mut mona = engine();
        let c = mona.new_receptor(&[1, 0], "c").unwrap();
        let e = mona.new_receptor(&[0, 1], "e").unwrap();
        let go = mona.new_motor(1, "go").unwrap();
        let m = mona.new_mediator(0.5, false, 0.5, "c,go-/->e");
        mona.add_mediator_event(m, EventKind::Cause, c).unwrap();
        mona.add_mediator_event(m, EventKind::Intermediate, go).unwrap();
        mona.add_mediator_event(m, EventKind::Effect, e).unwrap();
        mona.set_goals(e, &[5.0], 1.0).unwrap();
        mona.net.mediator_mut(m).unwrap().intermediate_enablings[0]
            .insert(Enabling::new(0.4, 0.0, vec![5.0], 0, 0, 0));

        mona.drive();
        assert!(mona.neuron(go).unwrap().motive < 0.0);
    }

    #[test]
    fn cyclic_mediators_terminate() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let ab = mona.new_mediator(0.5, true, 0.5, "a->b");
        mona.add_mediator_event(ab, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(ab, EventKind::Effect, b).unwrap();
        let ba = mona.new_mediator(0.5, true, 0.5, "b->a");
        mona.add_mediator_event(ba, EventKind::Cause, b).unwrap();
        mona.add_mediator_event(ba, EventKind::Effect, a).unwrap();
        mona.set_goals(a, &[5.0], 1.0).unwrap();

        mona.drive();
        assert!(mona.neuron(b).unwrap().motive > mona.cfg.min_motive);
        assert!(mona.neuron(ab).unwrap().motive > mona.cfg.min_motive);
    }

    #[test]
    fn without_goals_only_floors_apply() {
        let mut mona = engine();
        let r = mona.new_receptor(&[1, 0], "r").unwrap();
        let go = mona.new_motor(0, "go").unwrap();
        mona.drive();
        assert_eq!(mona.neuron(r).unwrap().motive, mona.cfg.min_motive);
        assert_eq!(mona.neuron(go).unwrap().motive, 0.0);
    }
}
