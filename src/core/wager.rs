//! Credit assignment: parasite marking, wager payment, expiration.

use crate::config::MonaConfig;
use crate::enabling::{compare_streams, ElemEvent, Enabling, EnablingSet, Outcome, StreamRelation, INVALID_TIME};
use crate::mona::{longest_timer, timer_at, Mona};
use crate::network::Network;
use crate::neuron::{EventSlot, Mediator, NeuronKind, ReinforceScope};
use crate::values::{Enablement, Motive, NeuronId, Time};

fn motive_factor(motive: Motive, max_motive: Motive) -> f64 {
    if motive < max_motive {
        motive / max_motive
    } else {
        1.0
    }
}

/// Age every enabling in `set` and remove the ones past their deadline.
/// Returns the enablement released.
fn age_out(set: &mut EnablingSet, force: bool, timers: &[Vec<Time>], level: usize) -> Enablement {
    let mut released = 0.0;
    for e in set.iter_mut() {
        e.age += 1;
    }
    set.retain(|e| {
        if force || e.age > timer_at(timers, level, e.timer_index) {
            released += e.value;
            false
        } else {
            true
        }
    });
    released
}

impl Mediator {
    /// Age enablings and pending causes; timed-out enablement returns to base.
    pub(crate) fn expire_enablings(&mut self, force: bool, timers: &[Vec<Time>]) {
        let level = self.level;
        let mut released = 0.0;
        for set in &mut self.intermediate_enablings {
            released += age_out(set, force, timers, level);
        }
        released += age_out(&mut self.effect_enablings, force, timers, level);
        released += age_out(&mut self.wagered_enablings, force, timers, level);
        self.base_enablement += released;

        let horizon = longest_timer(timers, level);
        for queue in &mut self.pending_enablings {
            for p in queue.iter_mut() {
                p.age += 1;
            }
            queue.retain(|p| !force && p.age <= horizon);
        }
    }

    /// Return `amount` to base and feed the outcome through the wager history.
    fn settle(&mut self, amount: Enablement, outcome: Outcome, weight: f64, scope: ReinforceScope, cfg: &MonaConfig) {
        self.base_enablement += amount;
        self.reinforce(outcome, weight, scope, cfg);
    }

    fn settled_effect_wagers(&self) -> Enablement {
        self.wagered_enablings
            .iter()
            .filter(|e| !e.new_in_set && e.effect_wager)
            .map(|e| e.value)
            .sum()
    }

    fn normalize_wager_weights(&mut self, min_weight: f64) {
        let mut total = 0.0;
        for w in &mut self.timed_wager_weights {
            if *w < min_weight {
                *w = min_weight;
            }
            total += *w;
        }
        if total > 0.0 {
            for w in &mut self.timed_wager_weights {
                *w /= total;
            }
        }
    }
}

/// Bounded search over the notify graph for a stronger wager explaining the same events.
struct ParasiteSearch<'a> {
    net: &'a Network,
    budget: usize,
}

fn joined(head: Option<&Enabling>, tail: &[ElemEvent]) -> Vec<ElemEvent> {
    let mut v = head.map(|e| e.events.clone()).unwrap_or_default();
    v.extend_from_slice(tail);
    v
}

impl<'a> ParasiteSearch<'a> {
    fn spend(&mut self) -> bool {
        if self.budget == 0 {
            return false;
        }
        self.budget -= 1;
        true
    }

    /// Whether `wager` (or the accumulated `events`) is already accounted for
    /// by another mediator along every route upward from `id`.
    fn is_parasite(
        &mut self,
        id: NeuronId,
        wager: Option<&'a Enabling>,
        events: &[ElemEvent],
        true_wager: bool,
    ) -> bool {
        if !self.spend() {
            return false;
        }
        let net = self.net;
        let Some(n) = net.get(id) else { return false };

        if let Some(w) = wager {
            let Some(current) = events.last().or(w.events.last()).map(|e| e.id) else {
                return false;
            };
            if !self.explained_elsewhere(id, w, events, current) {
                return false;
            }
        }

        for x in n.notify_list() {
            let Some(parent) = net.mediator(x.mediator) else { continue };
            if !parent.enabler {
                continue;
            }
            match x.slot {
                EventSlot::Cause(_) => {
                    if true_wager {
                        let Some(w) = wager else { continue };
                        for e in parent.first_stage().iter().filter(|e| !e.new_in_set) {
                            if compare_streams(&e.events, &w.events) == StreamRelation::Equal
                                && !self.is_parasite(x.mediator, Some(e), &[], false)
                            {
                                return false;
                            }
                        }
                    } else if !self.is_parasite(x.mediator, None, &joined(wager, events), false) {
                        return false;
                    }
                }
                EventSlot::Intermediate(k) => {
                    if true_wager {
                        let Some(w) = wager else { continue };
                        for e in parent.stage_after(k).iter().filter(|e| !e.new_in_set) {
                            if compare_streams(&e.events, &w.events) == StreamRelation::Superset
                                && !self.is_parasite(x.mediator, Some(e), &[], false)
                            {
                                return false;
                            }
                        }
                    } else if let Some(set) = parent.intermediate_enablings.get(k) {
                        let accum = joined(wager, events);
                        for e in set.iter().filter(|e| !e.new_in_set) {
                            if !self.is_parasite(x.mediator, Some(e), &accum, false) {
                                return false;
                            }
                        }
                    }
                }
                EventSlot::Effect => {
                    if true_wager {
                        let Some(w) = wager else { continue };
                        for e in parent.wagered_enablings.iter().filter(|e| !e.new_in_set) {
                            if compare_streams(&e.events, &w.events) == StreamRelation::Superset
                                && !self.is_parasite(x.mediator, Some(e), &[], true)
                            {
                                return false;
                            }
                        }
                    } else {
                        let accum = joined(wager, events);
                        for e in parent.effect_enablings.iter().filter(|e| !e.new_in_set) {
                            if !self.is_parasite(x.mediator, Some(e), &accum, false) {
                                return false;
                            }
                        }
                    }
                }
            }
        }
        true
    }

    /// Another enabler predicting the same receptor holds a stronger stream covering `wager`.
    fn explained_elsewhere(
        &mut self,
        id: NeuronId,
        wager: &'a Enabling,
        events: &[ElemEvent],
        current: NeuronId,
    ) -> bool {
        let net = self.net;
        for &other_id in net.mediators() {
            if other_id == id {
                continue;
            }
            let Some(other) = net.mediator(other_id) else { continue };
            if !other.enabler || other.effect != Some(current) || !net.is_receptor(current) {
                continue;
            }
            for set in &other.intermediate_enablings {
                for e in set.iter().filter(|e| !e.new_in_set) {
                    if self.test_stream(id, wager, events, other_id, Some(e), &[], false) {
                        return true;
                    }
                }
            }
            for e in other.effect_enablings.iter().filter(|e| !e.new_in_set) {
                if self.test_stream(id, wager, events, other_id, Some(e), &[], false) {
                    return true;
                }
            }
            for e in other.wagered_enablings.iter().filter(|e| !e.new_in_set) {
                if self.test_stream(id, wager, events, other_id, Some(e), &[], true) {
                    return true;
                }
            }
        }
        false
    }

    /// Does some enabling reachable upward from `target` carry a stronger
    /// stream that contains the source stream?
    #[allow(clippy::too_many_arguments)]
    fn test_stream(
        &mut self,
        origin: NeuronId,
        source: &'a Enabling,
        source_events: &[ElemEvent],
        target: NeuronId,
        target_enabling: Option<&'a Enabling>,
        target_events: &[ElemEvent],
        true_wager: bool,
    ) -> bool {
        if !self.spend() || target == origin {
            return false;
        }
        if let Some(te) = target_enabling {
            if te.value > source.value {
                let src = joined(Some(source), source_events);
                let tgt = joined(Some(te), target_events);
                match compare_streams(&tgt, &src) {
                    StreamRelation::Superset => return true,
                    StreamRelation::Mismatch => return false,
                    _ => {}
                }
            }
        }

        let net = self.net;
        let Some(n) = net.get(target) else { return false };
        for x in n.notify_list() {
            let Some(parent) = net.mediator(x.mediator) else { continue };
            if !parent.enabler {
                continue;
            }
            match x.slot {
                EventSlot::Cause(_) => {
                    if true_wager {
                        for e in parent.first_stage().iter().filter(|e| !e.new_in_set) {
                            if self.test_stream(origin, source, source_events, x.mediator, Some(e), &[], false) {
                                return true;
                            }
                        }
                    } else {
                        let accum = joined(target_enabling, target_events);
                        if self.test_stream(origin, source, source_events, x.mediator, None, &accum, false) {
                            return true;
                        }
                    }
                }
                EventSlot::Intermediate(k) => {
                    if true_wager {
                        for e in parent.stage_after(k).iter().filter(|e| !e.new_in_set) {
                            if self.test_stream(origin, source, source_events, x.mediator, Some(e), &[], false) {
                                return true;
                            }
                        }
                    } else if let Some(set) = parent.intermediate_enablings.get(k) {
                        let accum = joined(target_enabling, target_events);
                        for e in set.iter().filter(|e| !e.new_in_set) {
                            if self.test_stream(origin, source, source_events, x.mediator, Some(e), &accum, false) {
                                return true;
                            }
                        }
                    }
                }
                EventSlot::Effect => {
                    if true_wager {
                        for e in parent.wagered_enablings.iter().filter(|e| !e.new_in_set) {
                            if self.test_stream(origin, source, source_events, x.mediator, Some(e), &[], true) {
                                return true;
                            }
                        }
                    } else {
                        let accum = joined(target_enabling, target_events);
                        for e in parent.effect_enablings.iter().filter(|e| !e.new_in_set) {
                            if self.test_stream(origin, source, source_events, x.mediator, Some(e), &accum, false) {
                                return true;
                            }
                        }
                    }
                }
            }
        }
        false
    }
}

impl Mona {
    /// Flag effect wagers that a stronger, earlier mediator already explains.
    pub(crate) fn mark_parasitic_wagers(&mut self, id: NeuronId) {
        let Some(n) = self.net.get(id) else { return };
        let firing = n.firing_strength;
        let Some(med) = n.as_mediator() else { return };
        if !med.enabler {
            return;
        }
        let wagered = med.settled_effect_wagers();
        let transfer = if firing >= wagered {
            1.0
        } else if wagered > 0.0 {
            firing / wagered
        } else {
            0.0
        };

        let mut verdicts = Vec::new();
        for (i, e) in med.wagered_enablings.iter().enumerate() {
            if e.new_in_set || !e.effect_wager || e.value * transfer <= 0.0 {
                continue;
            }
            verdicts.push((i, self.wager_is_parasite(id, i)));
        }
        if let Some(med) = self.net.mediator_mut(id) {
            for (i, parasite) in verdicts {
                if let Some(e) = med.wagered_enablings.get_mut(i) {
                    e.parasite = parasite;
                }
            }
        }
    }

    fn wager_is_parasite(&self, id: NeuronId, index: usize) -> bool {
        let net = &self.net;
        let Some(med) = net.mediator(id) else { return false };
        let Some(wager) = med.wagered_enablings.get(index) else { return false };
        let Some(effect) = med.effect.and_then(|e| net.get(e)) else { return false };

        // A stronger overlapping enabler that started earlier.
        for x in effect.notify_list() {
            if x.mediator == id {
                continue;
            }
            let Some(other) = net.mediator(x.mediator) else { continue };
            if !other.enabler {
                continue;
            }
            let sets: Vec<&EnablingSet> = match x.slot {
                EventSlot::Intermediate(k) => other.intermediate_enablings.get(k).into_iter().collect(),
                EventSlot::Effect => vec![&other.effect_enablings, &other.wagered_enablings],
                EventSlot::Cause(_) => continue,
            };
            let mut sum = 0.0;
            let mut begin = INVALID_TIME;
            for e in sets.iter().flat_map(|s| s.iter()).filter(|e| !e.new_in_set) {
                sum += e.value;
                begin = begin.min(e.cause_begin);
            }
            if sum > wager.value && begin < wager.cause_begin {
                return true;
            }
        }

        // A stronger stream containing this wager's events.
        let mut search = ParasiteSearch {
            net,
            budget: self.cfg.parasite_search_budget,
        };
        search.is_parasite(id, Some(wager), &[], true)
    }

    /// Resolve this tick's effect wagers and timed-out enablings into reinforcement.
    pub(crate) fn pay_wagers(&mut self, id: NeuronId) {
        let motor_intermediates: Vec<bool> = match self.net.mediator(id) {
            Some(m) => m.intermediates.iter().map(|i| self.net.is_motor(*i)).collect(),
            None => return,
        };
        let cfg = &self.cfg;
        let timers = &self.event_timers;
        let needs = &self.needs;
        let max_motive = cfg.max_motive();

        let Some(n) = self.net.get_mut(id) else { return };
        let firing = n.firing_strength;
        let goals = &mut n.goals;
        let NeuronKind::Mediator(med) = &mut n.kind else { return };
        let level = med.level;

        let wagered = med.settled_effect_wagers();
        let transfer = if firing >= wagered {
            1.0
        } else if wagered > 0.0 {
            firing / wagered
        } else {
            0.0
        };

        let mut earliest: Option<(usize, Enablement)> = None;
        for i in 0..med.wagered_enablings.len() {
            let Some(e) = med.wagered_enablings.get(i) else { continue };
            if e.new_in_set || !e.effect_wager || e.motive <= 0.0 {
                continue;
            }
            let mut factor = motive_factor(e.motive, max_motive);
            let (value, parasite, timer_index) = (e.value, e.parasite, e.timer_index);
            let expired = e.age >= timer_at(timers, level, timer_index);

            if med.enabler {
                if cfg.learn_goal_values {
                    goals.update(&e.need_save, needs, firing * factor, cfg.max_goal_value_events);
                }
                let paid = value * transfer;
                if paid > 0.0 && !parasite {
                    if let Some(e) = med.wagered_enablings.get_mut(i) {
                        e.value -= paid;
                    }
                    if earliest.map_or(true, |(t, _)| timer_index < t) {
                        earliest = Some((timer_index, paid));
                    }
                    med.settle(paid, Outcome::Fire, paid, ReinforceScope::All, cfg);
                }
                let remaining = med.wagered_enablings.get(i).map_or(0.0, |e| e.value);
                if remaining > 0.0 && expired {
                    if let Some(e) = med.wagered_enablings.get_mut(i) {
                        e.value = 0.0;
                    }
                    let weight = remaining * factor * cfg.expiration_weight;
                    med.settle(remaining, Outcome::Expire, weight, ReinforceScope::All, cfg);
                }
            } else {
                // A disabler is right when its effect stays away.
                if factor <= cfg.min_motive {
                    factor = 0.0;
                }
                let paid = value * transfer;
                if paid > 0.0 {
                    if let Some(e) = med.wagered_enablings.get_mut(i) {
                        e.value -= paid;
                    }
                    if earliest.map_or(true, |(t, _)| timer_index < t) {
                        earliest = Some((timer_index, paid));
                    }
                    med.settle(paid, Outcome::Fire, paid * factor, ReinforceScope::All, cfg);
                }
                let remaining = med.wagered_enablings.get(i).map_or(0.0, |e| e.value);
                if remaining > 0.0 && expired {
                    if let Some(e) = med.wagered_enablings.get_mut(i) {
                        e.value = 0.0;
                    }
                    let weight = remaining * cfg.expiration_weight;
                    med.settle(remaining, Outcome::Expire, weight, ReinforceScope::All, cfg);
                }
            }
        }

        // Enablings stuck before an intermediate event that never came.
        for k in 0..med.intermediate_enablings.len() {
            let expiration_weight = if motor_intermediates.get(k).copied().unwrap_or(false) {
                cfg.response_expiration_weight
            } else {
                cfg.expiration_weight
            };
            for j in 0..med.intermediate_enablings[k].len() {
                let Some(e) = med.intermediate_enablings[k].get_mut(j) else { continue };
                if e.new_in_set || e.motive <= 0.0 || e.value <= 0.0 {
                    continue;
                }
                if e.age < timer_at(timers, level, e.timer_index) {
                    continue;
                }
                let factor = motive_factor(e.motive, max_motive);
                let value = std::mem::take(&mut e.value);
                let weight = value * factor * expiration_weight;
                med.settle(value, Outcome::Expire, weight, ReinforceScope::UpTo(k), cfg);
            }
        }

        // Enablings waiting on an effect mediator that never wagered.
        for j in 0..med.effect_enablings.len() {
            let Some(e) = med.effect_enablings.get_mut(j) else { continue };
            if e.new_in_set || e.motive <= 0.0 || e.value <= 0.0 {
                continue;
            }
            if e.age < timer_at(timers, level, e.timer_index) {
                continue;
            }
            let factor = motive_factor(e.motive, max_motive);
            let value = std::mem::take(&mut e.value);
            let weight = value * factor * cfg.expiration_weight;
            med.settle(value, Outcome::Expire, weight, ReinforceScope::All, cfg);
        }

        med.utility = med.total_enablement();

        if let Some((index, amount)) = earliest {
            if let Some(w) = med.timed_wager_weights.get_mut(index) {
                *w += amount;
            }
            med.normalize_wager_weights(cfg.min_wager_weight);
        }
    }

    /// A motor did not fire: enablings waiting on it expire, and so does the
    /// matching share of wagers placed on the mediators that needed it.
    pub(crate) fn expire_motor_enablings(&mut self, motor: NeuronId) {
        let Some(n) = self.net.get(motor) else { return };
        let listeners = n.notify.clone();
        let max_motive = self.cfg.max_motive();
        for x in listeners {
            let EventSlot::Intermediate(k) = x.slot else { continue };
            let cfg = &self.cfg;
            let Some(med) = self.net.mediator_mut(x.mediator) else { continue };
            let Some(set) = med.intermediate_enablings.get_mut(k) else { continue };
            let enablement = set.value();
            if enablement <= 0.0 {
                set.clear();
                continue;
            }
            let expiring: Vec<(Enablement, Motive)> = set.iter().map(|e| (e.value, e.motive)).collect();
            set.clear();
            let total = med.total_enablement() + enablement;
            let strength = if total > 0.0 { enablement / total } else { 0.0 };
            for (value, motive) in expiring {
                if value <= 0.0 {
                    continue;
                }
                let weight = value * motive_factor(motive.max(0.0), max_motive) * cfg.response_expiration_weight;
                med.settle(value, Outcome::Expire, weight, ReinforceScope::UpTo(k), cfg);
            }
            med.utility = med.total_enablement();
            if strength > 0.0 {
                let depth = self.cfg.timeline_levels();
                self.expire_response_wagers(x.mediator, strength, depth);
            }
        }
    }

    /// Expire `strength` of the wagers that super-mediators placed on `id` firing.
    fn expire_response_wagers(&mut self, id: NeuronId, strength: f64, depth: usize) {
        if depth == 0 {
            return;
        }
        let Some(n) = self.net.get(id) else { return };
        let listeners: Vec<NeuronId> = n
            .notify
            .iter()
            .filter(|x| x.slot == EventSlot::Effect)
            .map(|x| x.mediator)
            .collect();
        let max_motive = self.cfg.max_motive();
        for parent in listeners {
            let cfg = &self.cfg;
            let Some(med) = self.net.mediator_mut(parent) else { continue };
            let enablement = med.wagered_enablings.value() * strength;
            let total = med.total_enablement();
            let next_strength = if total > 0.0 { enablement / total } else { 0.0 };
            for j in 0..med.wagered_enablings.len() {
                let Some(e) = med.wagered_enablings.get_mut(j) else { continue };
                if e.value <= 0.0 {
                    continue;
                }
                let amount = e.value * strength;
                e.value -= amount;
                let weight = amount * motive_factor(e.motive.max(0.0), max_motive) * cfg.response_expiration_weight;
                med.settle(amount, Outcome::Expire, weight, ReinforceScope::All, cfg);
            }
            med.utility = med.total_enablement();
            if next_strength > 0.0 {
                self.expire_response_wagers(parent, next_strength, depth - 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::EventKind;

    fn engine() -> Mona {
        let cfg = MonaConfig {
            structural_learning: false,
            auto_receptors: false,
            ..MonaConfig::with_size(2, 1, 1)
        };
        Mona::from_config(cfg).unwrap()
    }

    fn wager(value: Enablement, age: Time) -> Enabling {
        let mut e = Enabling::new(value, 1.0, vec![0.0], age, 0, 0);
        e.effect_wager = true;
        e
    }

    #[test]
    fn expiry_returns_enablement_without_loss() {
        let timers = vec![vec![2]];
        let mut m = Mediator::new(0.1, true, 0.1, 1);
        m.wagered_enablings.push_raw(wager(0.2, 0));
        m.effect_enablings.push_raw(wager(0.05, 2));
        let before = m.total_enablement();

        m.expire_enablings(false, &timers);
        assert!((m.total_enablement() - before).abs() < 1e-12);
        assert_eq!(m.wagered_enablings.len(), 1);
        assert!(m.effect_enablings.is_empty());

        m.expire_enablings(true, &timers);
        assert!(m.wagered_enablings.is_empty());
        assert!((m.base_enablement - before).abs() < 1e-12);
    }

    #[test]
    fn wager_weights_move_toward_paid_timer() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        mona.event_timers = vec![vec![1, 3], vec![2, 4]];
        let id = mona.new_mediator(0.0, true, 0.0, "m");
        mona.add_mediator_event(id, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(id, EventKind::Effect, b).unwrap();
        let med = mona.net.mediator_mut(id).unwrap();
        med.timed_wager_weights = vec![0.5, 0.5];
        med.wagered_enablings.push_raw(Enabling {
            timer_index: 1,
            ..wager(0.3, 1)
        });
        mona.net.get_mut(id).unwrap().firing_strength = 0.3;

        mona.pay_wagers(id);
        let med = mona.net.mediator(id).unwrap();
        assert!(med.timed_wager_weights[1] > med.timed_wager_weights[0]);
        let sum: f64 = med.timed_wager_weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(med.base_enablement > 0.3);
        assert_eq!(med.utility, med.total_enablement());
    }

    #[test]
    fn disabler_is_paid_when_effect_stays_away() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let id = mona.new_mediator(0.0, false, 0.0, "not b");
        mona.add_mediator_event(id, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(id, EventKind::Effect, b).unwrap();
        mona.net
            .mediator_mut(id)
            .unwrap()
            .wagered_enablings
            .push_raw(Enabling::new(0.2, 10.0, vec![0.0], 1, 0, 0));
        let mut absent = mona.clone();

        // Effect present: the disabler does not fire and its wager expires.
        mona.fire_effect_for_test(id, 1.0);
        assert_eq!(mona.net.get(id).unwrap().firing_strength, 0.0);
        mona.pay_wagers(id);
        let lost = mona.net.mediator(id).unwrap().base_enablement;

        // Effect absent: the disabler fires and is paid.
        absent.fire_effect_for_test(id, 0.0);
        assert!(absent.net.get(id).unwrap().firing_strength > 0.0);
        absent.pay_wagers(id);
        let won = absent.net.mediator(id).unwrap().base_enablement;
        assert!(won > lost);
        assert_eq!(absent.net.mediator(id).unwrap().wager_history.fires, 1);
        assert_eq!(mona.net.mediator(id).unwrap().wager_history.expires, 1);
    }

    #[test]
    fn disabler_settles_on_its_deadline_tick() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let id = mona.new_mediator(0.0, false, 0.0, "not b");
        mona.add_mediator_event(id, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(id, EventKind::Effect, b).unwrap();
        mona.net
            .mediator_mut(id)
            .unwrap()
            .wagered_enablings
            .push_raw(Enabling::new(0.2, 1.0, vec![0.0], 0, 0, 0));
        let timers = mona.event_timers.clone();
        assert_eq!(timer_at(&timers, 0, 0), 1);

        // Not yet due.
        mona.fire_effect_for_test(id, 0.0);
        assert_eq!(mona.net.get(id).unwrap().firing_strength, 0.0);

        // One tick later the wager sits exactly at its timer and settles.
        mona.net.mediator_mut(id).unwrap().expire_enablings(false, &timers);
        assert_eq!(mona.net.mediator(id).unwrap().wagered_enablings.len(), 1);
        mona.fire_effect_for_test(id, 0.0);
        assert!(mona.net.get(id).unwrap().firing_strength > 0.0);

        // Past the timer it is gone before the next enable phase.
        mona.net.mediator_mut(id).unwrap().expire_enablings(false, &timers);
        assert!(mona.net.mediator(id).unwrap().wagered_enablings.is_empty());
    }

    #[test]
    fn stronger_earlier_overlap_marks_parasite() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let c = mona.new_receptor(&[1, 1], "c").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let weak = mona.new_mediator(0.0, true, 0.0, "weak");
        mona.add_mediator_event(weak, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(weak, EventKind::Effect, b).unwrap();
        let strong = mona.new_mediator(0.0, true, 0.0, "strong");
        mona.add_mediator_event(strong, EventKind::Cause, c).unwrap();
        mona.add_mediator_event(strong, EventKind::Effect, b).unwrap();

        let mut w = wager(0.1, 1);
        w.cause_begin = 5;
        mona.net.mediator_mut(weak).unwrap().wagered_enablings.push_raw(w);
        let mut s = wager(0.4, 1);
        s.cause_begin = 2;
        mona.net.mediator_mut(strong).unwrap().wagered_enablings.push_raw(s);
        mona.net.get_mut(weak).unwrap().firing_strength = 0.1;
        mona.net.get_mut(strong).unwrap().firing_strength = 0.4;

        mona.mark_parasitic_wagers(weak);
        mona.mark_parasitic_wagers(strong);
        assert!(mona.net.mediator(weak).unwrap().wagered_enablings.get(0).unwrap().parasite);
        assert!(!mona.net.mediator(strong).unwrap().wagered_enablings.get(0).unwrap().parasite);

        // Parasitic wagers are not paid.
        mona.pay_wagers(weak);
        let m = mona.net.mediator(weak).unwrap();
        assert_eq!(m.wager_history.fires, 0);
    }

    #[test]
    fn fresh_overlap_cannot_mark_parasite() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let c = mona.new_receptor(&[1, 1], "c").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let weak = mona.new_mediator(0.0, true, 0.0, "weak");
        mona.add_mediator_event(weak, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(weak, EventKind::Effect, b).unwrap();
        let strong = mona.new_mediator(0.0, true, 0.0, "strong");
        mona.add_mediator_event(strong, EventKind::Cause, c).unwrap();
        mona.add_mediator_event(strong, EventKind::Effect, b).unwrap();

        let mut w = wager(0.1, 1);
        w.cause_begin = 5;
        mona.net.mediator_mut(weak).unwrap().wagered_enablings.push_raw(w);
        // Placed this tick: not yet eligible to outweigh anyone.
        let mut s = wager(0.4, 0);
        s.cause_begin = 2;
        s.new_in_set = true;
        mona.net.mediator_mut(strong).unwrap().wagered_enablings.push_raw(s);
        mona.net.get_mut(weak).unwrap().firing_strength = 0.1;

        mona.mark_parasitic_wagers(weak);
        assert!(!mona.net.mediator(weak).unwrap().wagered_enablings.get(0).unwrap().parasite);
    }

    #[test]
    fn unchosen_motor_expires_waiting_enablings() {
        let mut mona = engine();
        let a = mona.new_receptor(&[1, 0], "a").unwrap();
        let b = mona.new_receptor(&[0, 1], "b").unwrap();
        let go = mona.new_motor(1, "go").unwrap();
        let id = mona.new_mediator(0.1, true, 0.1, "a,go->b");
        mona.add_mediator_event(id, EventKind::Cause, a).unwrap();
        mona.add_mediator_event(id, EventKind::Intermediate, go).unwrap();
        mona.add_mediator_event(id, EventKind::Effect, b).unwrap();
        mona.net.mediator_mut(id).unwrap().intermediate_enablings[0]
            .insert(Enabling::new(0.2, 1.0, vec![0.0], 0, 0, 0));

        mona.expire_motor_enablings(go);
        let m = mona.net.mediator(id).unwrap();
        assert!(m.intermediate_enablings[0].is_empty());
        assert_eq!(m.wager_history.expires, 1);
        assert!(m.base_enablement < 0.3);
        assert!(m.intermediate_enablements[0] < 0.3);
    }

    impl Mona {
        fn fire_effect_for_test(&mut self, id: NeuronId, strength: f64) {
            self.event_firing(id, crate::enable::Signal::Effect, strength, self.event_clock, &[]);
        }
    }
}
