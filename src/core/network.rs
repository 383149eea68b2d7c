//! Id-indexed arena of neurons.
//!
//! Every relation between neurons (causes, intermediates, effect, notify
//! back-references) is a `NeuronId`. A mediator never outlives an event it
//! references: deleting a neuron removes its dependents first.

use hashbrown::HashSet;
use tracing::debug;

use crate::config::MonaConfig;
use crate::enabling::EnablingSet;
use crate::error::MonaError;
use crate::neuron::{EventKind, EventSlot, Mediator, Neuron, NeuronKind, Notify};
use crate::values::{Enablement, NeuronId};

/// Event structure of a mediator candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediatorShape {
    pub enabler: bool,
    pub causes: Vec<NeuronId>,
    pub intermediates: Vec<NeuronId>,
    pub effect: NeuronId,
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    slots: Vec<Option<Neuron>>,
    receptors: Vec<NeuronId>,
    motors: Vec<NeuronId>,
    mediators: Vec<NeuronId>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NeuronId) -> Option<&Neuron> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NeuronId) -> Option<&mut Neuron> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub fn mediator(&self, id: NeuronId) -> Option<&Mediator> {
        self.get(id).and_then(Neuron::as_mediator)
    }

    pub fn mediator_mut(&mut self, id: NeuronId) -> Option<&mut Mediator> {
        self.get_mut(id).and_then(Neuron::as_mediator_mut)
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_motor(&self, id: NeuronId) -> bool {
        self.get(id).is_some_and(Neuron::is_motor)
    }

    pub fn is_receptor(&self, id: NeuronId) -> bool {
        self.get(id).is_some_and(Neuron::is_receptor)
    }

    pub fn is_mediator(&self, id: NeuronId) -> bool {
        self.get(id).is_some_and(Neuron::is_mediator)
    }

    pub fn receptors(&self) -> &[NeuronId] {
        &self.receptors
    }

    pub fn motors(&self) -> &[NeuronId] {
        &self.motors
    }

    pub fn mediators(&self) -> &[NeuronId] {
        &self.mediators
    }

    pub fn len(&self) -> usize {
        self.receptors.len() + self.motors.len() + self.mediators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id the next inserted neuron receives.
    pub fn next_id(&self) -> NeuronId {
        self.slots.len() as NeuronId
    }

    /// All live neurons in receptor, motor, mediator order.
    pub fn iter(&self) -> impl Iterator<Item = &Neuron> + '_ {
        self.receptors
            .iter()
            .chain(&self.motors)
            .chain(&self.mediators)
            .filter_map(|id| self.get(*id))
    }

    /// Snapshot of every live id in the canonical visiting order.
    pub(crate) fn all_ids(&self) -> Vec<NeuronId> {
        self.receptors
            .iter()
            .chain(&self.motors)
            .chain(&self.mediators)
            .copied()
            .collect()
    }

    pub(crate) fn insert(&mut self, mut neuron: Neuron) -> NeuronId {
        let id = self.next_id();
        neuron.id = id;
        self.slots.push(None);
        self.place(neuron);
        id
    }

    /// Place a neuron under its own id (image loading).
    pub(crate) fn insert_with_id(&mut self, neuron: Neuron) -> Result<(), MonaError> {
        let idx = neuron.id as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].is_some() {
            return Err(MonaError::BadImage("duplicate neuron id"));
        }
        self.place(neuron);
        Ok(())
    }

    /// Reserve ids up to `next_id` so fresh neurons never reuse a saved id.
    pub(crate) fn reserve_ids(&mut self, next_id: NeuronId) {
        if (next_id as usize) > self.slots.len() {
            self.slots.resize_with(next_id as usize, || None);
        }
    }

    fn place(&mut self, neuron: Neuron) {
        let id = neuron.id;
        match neuron.kind {
            NeuronKind::Receptor(_) => self.receptors.push(id),
            NeuronKind::Motor(_) => self.motors.push(id),
            NeuronKind::Mediator(_) => self.mediators.push(id),
        }
        self.slots[id as usize] = Some(neuron);
    }

    /// Attach `event` to `mediator` in the given role, enforcing the structural bounds.
    pub fn add_event(
        &mut self,
        mediator: NeuronId,
        kind: EventKind,
        event: NeuronId,
        cfg: &MonaConfig,
    ) -> Result<(), MonaError> {
        if mediator == event {
            return Err(MonaError::MediatorBounds("mediator cannot reference itself"));
        }
        let event_level = self
            .get(event)
            .ok_or(MonaError::UnknownNeuron(event))?
            .parent_level();

        let med = self
            .get_mut(mediator)
            .ok_or(MonaError::UnknownNeuron(mediator))?
            .as_mediator_mut()
            .ok_or(MonaError::NotAMediator(mediator))?;
        if event_level > cfg.max_mediator_level {
            return Err(MonaError::MediatorBounds("level exceeds max_mediator_level"));
        }

        let slot = match kind {
            EventKind::Cause => {
                if med.causes.len() >= cfg.max_mediator_causes {
                    return Err(MonaError::MediatorBounds("too many causes"));
                }
                if med.causes.contains(&event) {
                    return Err(MonaError::MediatorBounds("duplicate cause"));
                }
                med.causes.push(event);
                med.pending_enablings.push(Vec::new());
                EventSlot::Cause(med.causes.len() - 1)
            }
            EventKind::Intermediate => {
                if med.intermediates.len() + 2 >= cfg.max_mediator_events {
                    return Err(MonaError::MediatorBounds("too many intermediate events"));
                }
                med.intermediates.push(event);
                let base = med.base_enablement;
                med.intermediate_enablements.push(base);
                med.intermediate_enablings.push(EnablingSet::new());
                EventSlot::Intermediate(med.intermediates.len() - 1)
            }
            EventKind::Effect => {
                if med.effect.is_some() {
                    return Err(MonaError::MediatorBounds("effect already set"));
                }
                med.effect = Some(event);
                EventSlot::Effect
            }
        };
        med.level = med.level.max(event_level);

        if let Some(n) = self.get_mut(event) {
            n.add_notify(Notify { mediator, slot });
        }
        Ok(())
    }

    /// Composition level a mediator with this shape would have, if every event exists.
    pub fn shape_level(&self, shape: &MediatorShape) -> Option<usize> {
        let mut level = 0;
        for id in shape
            .causes
            .iter()
            .chain(&shape.intermediates)
            .chain(std::iter::once(&shape.effect))
        {
            level = level.max(self.get(*id)?.parent_level());
        }
        Some(level)
    }

    pub fn find_duplicate(&self, shape: &MediatorShape) -> Option<NeuronId> {
        self.mediators.iter().copied().find(|id| {
            self.mediator(*id).is_some_and(|m| {
                m.same_shape(shape.enabler, &shape.causes, &shape.intermediates, Some(shape.effect))
            })
        })
    }

    /// Whether `shape` may become a mediator: events exist, bounds hold, no duplicate.
    pub fn admits(&self, shape: &MediatorShape, cfg: &MonaConfig) -> bool {
        if shape.causes.is_empty() || shape.causes.len() > cfg.max_mediator_causes {
            return false;
        }
        if shape.intermediates.len() + 2 > cfg.max_mediator_events {
            return false;
        }
        let mut distinct = HashSet::with_capacity(shape.causes.len());
        if !shape.causes.iter().all(|c| distinct.insert(*c)) {
            return false;
        }
        match self.shape_level(shape) {
            Some(level) if level <= cfg.max_mediator_level => {}
            _ => return false,
        }
        self.find_duplicate(shape).is_none()
    }

    /// Build a mediator from an admitted shape.
    pub(crate) fn build_mediator(
        &mut self,
        shape: &MediatorShape,
        base_enablement: Enablement,
        utility: f64,
        cfg: &MonaConfig,
    ) -> Result<NeuronId, MonaError> {
        let id = self.next_id();
        let med = Mediator::new(base_enablement, shape.enabler, utility, cfg.num_event_timers);
        let mut neuron = Neuron::new(
            id,
            format!("Mediator {id}"),
            NeuronKind::Mediator(Box::new(med)),
            cfg,
        );
        neuron.motive = cfg.min_motive;
        self.insert(neuron);

        let events = shape
            .causes
            .iter()
            .map(|c| (EventKind::Cause, *c))
            .chain(shape.intermediates.iter().map(|i| (EventKind::Intermediate, *i)))
            .chain(std::iter::once((EventKind::Effect, shape.effect)));
        for (kind, event) in events {
            if let Err(e) = self.add_event(id, kind, event, cfg) {
                self.delete(id);
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Remove `id` and, first, every mediator that depends on it.
    /// Returns the removed ids, dependents before the target.
    pub fn delete(&mut self, id: NeuronId) -> Vec<NeuronId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut doomed = vec![id];
        let mut seen: HashSet<NeuronId> = HashSet::new();
        seen.insert(id);
        let mut i = 0;
        while i < doomed.len() {
            if let Some(n) = self.get(doomed[i]) {
                for notify in &n.notify {
                    if seen.insert(notify.mediator) {
                        doomed.push(notify.mediator);
                    }
                }
            }
            i += 1;
        }

        // Listeners always sit at a higher level than their events.
        doomed.sort_by_key(|d| {
            std::cmp::Reverse(self.get(*d).map(|n| (n.is_mediator(), n.timeline_level())))
        });
        for d in &doomed {
            self.remove_one(*d);
        }
        debug!(target = id, removed = doomed.len(), "deleted neuron");
        doomed
    }

    fn remove_one(&mut self, id: NeuronId) {
        let Some(neuron) = self.slots.get_mut(id as usize).and_then(Option::take) else {
            return;
        };
        match &neuron.kind {
            NeuronKind::Receptor(_) => self.receptors.retain(|x| *x != id),
            NeuronKind::Motor(_) => self.motors.retain(|x| *x != id),
            NeuronKind::Mediator(m) => {
                for event in m.causes.iter().chain(&m.intermediates).chain(m.effect.iter()) {
                    if let Some(n) = self.get_mut(*event) {
                        n.remove_notify_for(id);
                    }
                }
                self.mediators.retain(|x| *x != id);
            }
        }
    }

    /// True if the mediator, or any mediator built on it, is instinctive.
    pub fn is_instinct(&self, id: NeuronId) -> bool {
        let mut stack = vec![id];
        let mut seen: HashSet<NeuronId> = HashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            let Some(n) = self.get(cur) else { continue };
            if n.as_mediator().is_some_and(|m| m.instinct) {
                return true;
            }
            stack.extend(n.notify.iter().map(|x| x.mediator));
        }
        false
    }

    /// A mediator is as useful as its most useful dependent.
    pub fn utility(&self, id: NeuronId) -> f64 {
        let mut best = f64::NEG_INFINITY;
        let mut stack = vec![id];
        let mut seen: HashSet<NeuronId> = HashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            let Some(n) = self.get(cur) else { continue };
            if let Some(m) = n.as_mediator() {
                best = best.max(m.utility);
            }
            stack.extend(n.notify.iter().map(|x| x.mediator));
        }
        best
    }

    /// Exact mask match against an existing receptor.
    pub fn find_receptor(&self, mask: &[crate::values::Sensor]) -> Option<NeuronId> {
        self.receptors.iter().copied().find(|id| {
            self.get(*id)
                .and_then(Neuron::as_receptor)
                .is_some_and(|r| r.sensor_mask == mask)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::{Motor, Receptor};

    fn receptor(net: &mut Network, cfg: &MonaConfig, mask: Vec<i32>) -> NeuronId {
        net.insert(Neuron::new(
            0,
            "r".into(),
            NeuronKind::Receptor(Receptor { sensor_mask: mask }),
            cfg,
        ))
    }

    fn motor(net: &mut Network, cfg: &MonaConfig, response: usize) -> NeuronId {
        net.insert(Neuron::new(0, "m".into(), NeuronKind::Motor(Motor { response }), cfg))
    }

    fn shape(causes: Vec<NeuronId>, intermediates: Vec<NeuronId>, effect: NeuronId) -> MediatorShape {
        MediatorShape {
            enabler: true,
            causes,
            intermediates,
            effect,
        }
    }

    #[test]
    fn duplicate_shapes_are_not_admitted() {
        let cfg = MonaConfig::with_size(2, 1, 1);
        let mut net = Network::new();
        let a = receptor(&mut net, &cfg, vec![1, 0]);
        let b = receptor(&mut net, &cfg, vec![0, 1]);
        let m = motor(&mut net, &cfg, 0);

        let s = shape(vec![a], vec![m], b);
        assert!(net.admits(&s, &cfg));
        let id = net.build_mediator(&s, 0.075, 0.075, &cfg).unwrap();
        assert!(!net.admits(&s, &cfg));
        assert_eq!(net.find_duplicate(&s), Some(id));

        let disabler = MediatorShape {
            enabler: false,
            ..s.clone()
        };
        assert!(net.admits(&disabler, &cfg));
    }

    #[test]
    fn level_ceiling_rejects_deep_shapes() {
        let cfg = MonaConfig {
            max_mediator_level: 1,
            ..MonaConfig::with_size(2, 1, 1)
        };
        let mut net = Network::new();
        let a = receptor(&mut net, &cfg, vec![1, 0]);
        let b = receptor(&mut net, &cfg, vec![0, 1]);
        let m0 = net.build_mediator(&shape(vec![a], vec![], b), 0.075, 0.075, &cfg).unwrap();
        let m1 = net.build_mediator(&shape(vec![m0], vec![], b), 0.075, 0.075, &cfg).unwrap();
        assert_eq!(net.mediator(m1).unwrap().level, 1);
        assert!(!net.admits(&shape(vec![m1], vec![], b), &cfg));
        assert!(net.add_event(m1, EventKind::Cause, m1, &cfg).is_err());
    }

    #[test]
    fn cause_count_is_bounded() {
        let cfg = MonaConfig {
            max_mediator_causes: 2,
            ..MonaConfig::with_size(2, 1, 1)
        };
        let mut net = Network::new();
        let r: Vec<_> = (0..4).map(|i| receptor(&mut net, &cfg, vec![i, 0])).collect();
        let m = net.build_mediator(&shape(vec![r[0], r[1]], vec![], r[3]), 0.075, 0.075, &cfg).unwrap();
        assert!(matches!(
            net.add_event(m, EventKind::Cause, r[2], &cfg),
            Err(MonaError::MediatorBounds(_))
        ));
        assert!(!net.admits(&shape(vec![r[0], r[1], r[2]], vec![], r[3]), &cfg));
    }

    #[test]
    fn delete_cascades_to_dependents() {
        let cfg = MonaConfig::with_size(2, 1, 1);
        let mut net = Network::new();
        let a = receptor(&mut net, &cfg, vec![1, 0]);
        let b = receptor(&mut net, &cfg, vec![0, 1]);
        let c = receptor(&mut net, &cfg, vec![1, 1]);
        let m0 = net.build_mediator(&shape(vec![a], vec![], b), 0.075, 0.075, &cfg).unwrap();
        let m1 = net.build_mediator(&shape(vec![m0], vec![], c), 0.075, 0.075, &cfg).unwrap();
        let other = net.build_mediator(&shape(vec![b], vec![], c), 0.075, 0.075, &cfg).unwrap();

        let removed = net.delete(a);
        assert_eq!(removed.len(), 3);
        assert_eq!(*removed.last().unwrap(), a);
        assert!(!net.contains(m0) && !net.contains(m1));
        assert!(net.contains(other));
        // Back-references to deleted mediators are gone.
        assert!(net.get(b).unwrap().notify_list().iter().all(|n| n.mediator == other));
        assert_eq!(net.get(c).unwrap().notify_list().len(), 1);
        assert_eq!(net.mediators(), &[other]);
    }

    #[test]
    fn instinct_and_utility_flow_down_from_dependents() {
        let cfg = MonaConfig::with_size(2, 1, 1);
        let mut net = Network::new();
        let a = receptor(&mut net, &cfg, vec![1, 0]);
        let b = receptor(&mut net, &cfg, vec![0, 1]);
        let m0 = net.build_mediator(&shape(vec![a], vec![], b), 0.075, 0.1, &cfg).unwrap();
        let m1 = net.build_mediator(&shape(vec![m0], vec![], b), 0.075, 0.4, &cfg).unwrap();
        assert_eq!(net.utility(m0), 0.4);
        assert!(!net.is_instinct(m0));
        net.mediator_mut(m1).unwrap().instinct = true;
        assert!(net.is_instinct(m0));
    }
}
