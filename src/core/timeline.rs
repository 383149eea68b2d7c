//! Per-level rolling history of recent neuron activity.

use crate::values::{Enablement, Motive, NeuronId, Time};

/// Snapshot of one neuron's activity at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningEvent {
    pub neuron: NeuronId,
    pub strength: f64,
    pub enablement: Enablement,
    pub motive: Motive,
    /// Start of the window that produced this event (the cause begin for mediators).
    pub begin: Time,
    pub timestamp: Time,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    levels: Vec<Vec<LearningEvent>>,
}

impl Timeline {
    pub fn new(levels: usize) -> Self {
        Self {
            levels: vec![Vec::new(); levels],
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, i: usize) -> &[LearningEvent] {
        self.levels.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, level: usize, event: LearningEvent) {
        if let Some(l) = self.levels.get_mut(level) {
            l.push(event);
        }
    }

    /// Drop non-firing events and events older than the longest timer of
    /// their level stretched over a full mediator chain.
    pub fn purge(&mut self, clock: Time, event_timers: &[Vec<Time>], max_mediator_events: usize, skew: usize) {
        let last_level = event_timers.len().saturating_sub(1);
        for (i, events) in self.levels.iter_mut().enumerate() {
            let k = (i + skew).min(last_level);
            let longest = event_timers
                .get(k)
                .and_then(|t| t.last())
                .copied()
                .unwrap_or(0);
            let horizon = longest.saturating_mul(max_mediator_events.saturating_sub(1) as Time);
            events.retain(|e| e.strength > 0.0 && clock.saturating_sub(e.timestamp) <= horizon);
        }
    }

    pub fn remove_neuron(&mut self, id: NeuronId) {
        for events in &mut self.levels {
            events.retain(|e| e.neuron != id);
        }
    }

    pub fn clear(&mut self) {
        for events in &mut self.levels {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(neuron: NeuronId, strength: f64, timestamp: Time) -> LearningEvent {
        LearningEvent {
            neuron,
            strength,
            enablement: 0.0,
            motive: 0.001,
            begin: timestamp,
            timestamp,
        }
    }

    #[test]
    fn purge_drops_silent_and_stale_events() {
        let timers = vec![vec![1], vec![2]];
        let mut t = Timeline::new(3);
        t.push(0, ev(1, 1.0, 0));
        t.push(0, ev(2, 0.0, 9));
        t.push(0, ev(3, 1.0, 8));
        t.push(1, ev(4, 1.0, 0));
        t.push(2, ev(5, 1.0, 0));

        // Horizon is timer * 3 with four-event chains.
        t.purge(10, &timers, 4, 0);
        let l0: Vec<_> = t.level(0).iter().map(|e| e.neuron).collect();
        assert_eq!(l0, vec![3]);
        assert!(t.level(1).is_empty());
        assert!(t.level(2).is_empty());

        t.push(2, ev(6, 1.0, 5));
        t.purge(10, &timers, 4, 0);
        assert_eq!(t.level(2).len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut t = Timeline::new(2);
        t.push(0, ev(1, 1.0, 0));
        t.push(1, ev(1, 1.0, 0));
        t.push(1, ev(2, 1.0, 0));
        t.push(7, ev(3, 1.0, 0));
        assert_eq!(t.len(), 3);
        t.remove_neuron(1);
        assert_eq!(t.len(), 1);
        t.clear();
        assert!(t.is_empty());
    }
}
