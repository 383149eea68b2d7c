//! In-flight enablement: wagers, their containers, and pending cause conjunctions.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::MonaConfig;
use crate::values::{Enablement, Motive, Need, NeuronId, Time, Weight};

pub const INVALID_TIME: Time = u64::MAX;

/// A single neuron firing at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElemEvent {
    // Field order gives (timestamp, id) ordering.
    pub timestamp: Time,
    pub id: NeuronId,
}

impl ElemEvent {
    pub fn new(id: NeuronId, timestamp: Time) -> Self {
        Self { timestamp, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fire,
    Expire,
}

/// Enablement committed from a fired cause toward an awaited event.
#[derive(Debug, Clone, PartialEq)]
pub struct Enabling {
    pub value: Enablement,
    pub motive: Motive,
    pub need_save: Vec<Need>,
    pub age: Time,
    pub timer_index: usize,
    pub new_in_set: bool,
    pub effect_wager: bool,
    pub parasite: bool,
    pub cause_begin: Time,
    pub effect_begin: Time,
    pub events: Vec<ElemEvent>,
}

impl Enabling {
    pub fn new(
        value: Enablement,
        motive: Motive,
        need_save: Vec<Need>,
        age: Time,
        timer_index: usize,
        cause_begin: Time,
    ) -> Self {
        Self {
            value,
            motive,
            need_save,
            age,
            timer_index,
            new_in_set: false,
            effect_wager: false,
            parasite: false,
            cause_begin,
            effect_begin: INVALID_TIME,
            events: Vec::new(),
        }
    }

    pub fn clear_flags(&mut self) {
        self.new_in_set = false;
        self.effect_wager = false;
        self.parasite = false;
    }
}

/// Enablings waiting on one event slot of a mediator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnablingSet {
    enablings: Vec<Enabling>,
}

impl EnablingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, flagging the enabling as arrived this tick.
    pub fn insert(&mut self, mut enabling: Enabling) {
        enabling.new_in_set = true;
        self.enablings.push(enabling);
    }

    /// Insert as-is (persistence restores flags verbatim).
    pub(crate) fn push_raw(&mut self, enabling: Enabling) {
        self.enablings.push(enabling);
    }

    pub fn value(&self) -> Enablement {
        self.enablings.iter().map(|e| e.value).sum()
    }

    /// Value of enablings that were already present before this tick.
    pub fn settled_value(&self) -> Enablement {
        self.enablings
            .iter()
            .filter(|e| !e.new_in_set)
            .map(|e| e.value)
            .sum()
    }

    pub fn clear_flags(&mut self) {
        for e in &mut self.enablings {
            e.clear_flags();
        }
    }

    pub fn len(&self) -> usize {
        self.enablings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enablings.is_empty()
    }

    pub fn clear(&mut self) {
        self.enablings.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Enabling> {
        self.enablings.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Enabling> {
        self.enablings.iter_mut()
    }

    pub fn get(&self, i: usize) -> Option<&Enabling> {
        self.enablings.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Enabling> {
        self.enablings.get_mut(i)
    }

    pub fn retain<F: FnMut(&Enabling) -> bool>(&mut self, f: F) {
        self.enablings.retain(f);
    }
}

impl<'a> IntoIterator for &'a EnablingSet {
    type Item = &'a Enabling;
    type IntoIter = std::slice::Iter<'a, Enabling>;

    fn into_iter(self) -> Self::IntoIter {
        self.enablings.iter()
    }
}

/// One cause's firing, held until every cause of the conjunction has fired.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEnabling {
    pub strength: f64,
    pub age: Time,
    pub cause_begin: Time,
    pub events: Vec<ElemEvent>,
}

/// Moves a mediator's enablement toward the maximum on FIRE and toward the
/// minimum on EXPIRE, at a rate proportional to the wager's weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WagerHistory {
    pub fires: u64,
    pub expires: u64,
}

impl WagerHistory {
    pub fn enablement(
        &mut self,
        outcome: Outcome,
        base: Enablement,
        weight: Weight,
        cfg: &MonaConfig,
    ) -> Enablement {
        let w = weight / cfg.max_enablement;
        let target = match outcome {
            Outcome::Fire => {
                self.fires += 1;
                cfg.max_enablement
            }
            Outcome::Expire => {
                self.expires += 1;
                cfg.min_enablement
            }
        };
        let e = base + (target - base) * w * cfg.wager_history_update_velocity;
        e.clamp(0.0, cfg.max_enablement)
    }
}

/// How one event stream relates to another when aligned at their latest events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRelation {
    Mismatch,
    Subset,
    Equal,
    Superset,
}

/// Compare `stream` against `other` from the most recent event backward.
pub fn compare_streams(stream: &[ElemEvent], other: &[ElemEvent]) -> StreamRelation {
    let shared = stream.len().min(other.len());
    let tail = stream[stream.len() - shared..].iter().rev();
    let other_tail = other[other.len() - shared..].iter().rev();
    if tail.zip(other_tail).any(|(a, b)| a != b) {
        return StreamRelation::Mismatch;
    }
    match stream.len().cmp(&other.len()) {
        std::cmp::Ordering::Equal => StreamRelation::Equal,
        std::cmp::Ordering::Less => StreamRelation::Subset,
        std::cmp::Ordering::Greater => StreamRelation::Superset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: NeuronId, t: Time) -> ElemEvent {
        ElemEvent::new(id, t)
    }

    #[test]
    fn set_tracks_new_arrivals() {
        let mut set = EnablingSet::new();
        set.insert(Enabling::new(0.25, 0.0, vec![], 0, 0, 0));
        set.push_raw(Enabling::new(0.5, 0.0, vec![], 0, 0, 0));
        assert_eq!(set.value(), 0.75);
        assert_eq!(set.settled_value(), 0.5);
        set.clear_flags();
        assert_eq!(set.settled_value(), 0.75);
    }

    #[test]
    fn fire_raises_and_expire_lowers_enablement() {
        let cfg = MonaConfig::default();
        let mut h = WagerHistory::default();
        let base = cfg.new_enablement;
        let fired = h.enablement(Outcome::Fire, base, base, &cfg);
        let expired = h.enablement(Outcome::Expire, base, base, &cfg);
        assert!(fired > base);
        assert!(expired < base);
        assert_eq!((h.fires, h.expires), (1, 1));

        let expected = base + (1.0 - base) * base * 0.25;
        assert!((fired - expected).abs() < 1e-12);
    }

    #[test]
    fn stream_comparison_aligns_on_latest_event() {
        let long = [ev(1, 0), ev(2, 1), ev(3, 2)];
        let short = [ev(2, 1), ev(3, 2)];
        assert_eq!(compare_streams(&long, &short), StreamRelation::Superset);
        assert_eq!(compare_streams(&short, &long), StreamRelation::Subset);
        assert_eq!(compare_streams(&short, &short), StreamRelation::Equal);
        assert_eq!(compare_streams(&[ev(9, 2)], &long), StreamRelation::Mismatch);
        assert_eq!(compare_streams(&[], &[]), StreamRelation::Equal);
    }

    #[test]
    fn events_order_by_time_then_id() {
        let mut v = vec![ev(5, 2), ev(1, 3), ev(2, 2)];
        v.sort();
        assert_eq!(v, vec![ev(2, 2), ev(5, 2), ev(1, 3)]);
    }
}
