//! Enable phase: propagate this tick's firings into mediators, complete
//! cause conjunctions, place wagers, and record learning material.

use crate::enabling::{ElemEvent, Enabling, PendingEnabling};
use crate::mona::{timer_at, transfer_fraction, Mona};
use crate::neuron::{EventSlot, Notify};
use crate::values::{NeuronId, Time};

/// What a mediator is told about one of its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Cause(usize),
    Intermediate(usize),
    Effect,
    /// The mediator this one names as its effect has just wagered.
    Wager,
}

impl From<EventSlot> for Signal {
    fn from(slot: EventSlot) -> Self {
        match slot {
            EventSlot::Cause(i) => Signal::Cause(i),
            EventSlot::Intermediate(i) => Signal::Intermediate(i),
            EventSlot::Effect => Signal::Effect,
        }
    }
}

impl Mona {
    pub(crate) fn enable(&mut self) {
        for i in 0..self.net.mediators().len() {
            let id = self.net.mediators()[i];
            if let Some(n) = self.net.get_mut(id) {
                n.firing_strength = 0.0;
                if let Some(m) = n.as_mediator_mut() {
                    m.clear_flags();
                }
            }
        }

        let clock = self.event_clock;
        for id in self.net.motors().to_vec() {
            let Some(n) = self.net.get(id) else { continue };
            let strength = n.firing_strength;
            if strength <= 0.0 {
                continue;
            }
            let notify = n.notify.clone();
            let events = [ElemEvent::new(id, clock)];
            for x in notify {
                self.event_firing(x.mediator, x.slot.into(), strength, clock, &events);
            }
        }
        for id in self.net.receptors().to_vec() {
            let Some(n) = self.net.get(id) else { continue };
            let strength = n.firing_strength;
            let notify = n.notify.clone();
            let events = if strength > 0.0 {
                vec![ElemEvent::new(id, clock)]
            } else {
                Vec::new()
            };
            for x in notify {
                if x.slot == EventSlot::Effect || strength > 0.0 {
                    self.event_firing(x.mediator, x.slot.into(), strength, clock, &events);
                }
            }
        }

        self.timeline.purge(
            clock,
            &self.event_timers,
            self.cfg.max_mediator_events,
            self.cfg.max_mediator_skew,
        );
        if self.cfg.auto_receptors {
            self.learn_receptor();
        }
        self.record_learning_events();
        self.accumulate_enablings();
    }

    /// Add a receptor for the current sensor vector unless one already matches it exactly.
    fn learn_receptor(&mut self) {
        if self.net.find_receptor(&self.sensors).is_some() {
            return;
        }
        let specific = self.sensors.iter().filter(|s| **s != crate::values::DONT_CARE).count();
        if specific == 0 {
            return;
        }
        let description = format!("Receptor {}", self.net.next_id());
        let mask = self.sensors.clone();
        if let Ok(id) = self.new_receptor(&mask, &description) {
            if let Some(n) = self.net.get_mut(id) {
                n.motive = self.cfg.min_motive;
                n.firing_strength = specific as f64 / self.cfg.num_sensors as f64;
            }
        }
    }

    fn record_learning_events(&mut self) {
        for id in self.net.all_ids() {
            let Some(n) = self.net.get(id) else { continue };
            if n.motive <= 0.0 && n.firing_strength <= 0.0 {
                continue;
            }
            let level = n.timeline_level();
            if let Some(event) = self.learning_event(id) {
                self.timeline.push(level, event);
            }
        }
    }

    fn accumulate_enablings(&mut self) {
        for id in self.net.all_ids() {
            let Some(n) = self.net.get(id) else { continue };
            if n.is_motor() {
                continue;
            }
            let (mut enabling, mut disabling) = (0.0, 0.0);
            for x in n.notify_list() {
                if x.slot != EventSlot::Effect {
                    continue;
                }
                if let Some(m) = self.net.mediator(x.mediator) {
                    if m.enabler {
                        enabling += m.wagered_enablings.value();
                    } else {
                        disabling += m.wagered_enablings.value();
                    }
                }
            }
            if let Some(n) = self.net.get_mut(id) {
                n.enabling_accum = enabling;
                n.disabling_accum = disabling;
            }
        }
    }

    pub(crate) fn event_firing(
        &mut self,
        mediator: NeuronId,
        signal: Signal,
        strength: f64,
        event_begin: Time,
        events: &[ElemEvent],
    ) {
        match signal {
            Signal::Cause(i) => self.enable_event(mediator, i, strength, event_begin, events),
            Signal::Intermediate(i) => self.fire_intermediate(mediator, i, strength, events),
            Signal::Wager => self.fire_wager(mediator, strength, event_begin),
            Signal::Effect => self.fire_effect(mediator, strength, events),
        }
    }

    /// Queue a cause firing; once every cause has fired, wager on every combination.
    fn enable_event(
        &mut self,
        mediator: NeuronId,
        cause: usize,
        strength: f64,
        cause_begin: Time,
        events: &[ElemEvent],
    ) {
        let Some(med) = self.net.mediator_mut(mediator) else { return };
        let Some(queue) = med.pending_enablings.get_mut(cause) else { return };
        queue.push(PendingEnabling {
            strength,
            age: 0,
            cause_begin,
            events: events.to_vec(),
        });
        if med.pending_enablings.iter().any(Vec::is_empty) {
            return;
        }

        // Odometer over one pending entry per cause.
        let sizes: Vec<usize> = med.pending_enablings.iter().map(Vec::len).collect();
        let mut combo = vec![0usize; sizes.len()];
        'combos: loop {
            self.attach_enabling(mediator, &combo);
            let mut k = 0;
            loop {
                if k == combo.len() {
                    break 'combos;
                }
                combo[k] += 1;
                if combo[k] < sizes[k] {
                    break;
                }
                combo[k] = 0;
                k += 1;
            }
        }

        if let Some(med) = self.net.mediator_mut(mediator) {
            for queue in &mut med.pending_enablings {
                queue.retain(|p| p.strength > 0.0);
            }
        }
    }

    /// Wager enablement for one completed cause conjunction.
    fn attach_enabling(&mut self, mediator: NeuronId, combo: &[usize]) {
        let clock = self.event_clock;
        let max = self.cfg.max_enablement;
        let Some(n) = self.net.get(mediator) else { return };
        let motive = n.motive;
        let Some(med) = n.as_mediator() else { return };
        let Some(effect) = med.effect else { return };
        let effect_is_mediator = self.net.is_mediator(effect);

        let Some(med) = self.net.mediator_mut(mediator) else { return };
        let mut strength = 0.0;
        let mut age: Time = 0;
        let mut cause_begin = clock;
        let mut events: Vec<ElemEvent> = Vec::new();
        for (queue, &i) in med.pending_enablings.iter().zip(combo) {
            let Some(p) = queue.get(i) else { return };
            if p.strength <= 0.0 {
                return;
            }
            strength += p.strength;
            age = age.max(p.age);
            cause_begin = cause_begin.min(p.cause_begin);
            events.extend_from_slice(&p.events);
        }
        strength /= combo.len() as f64;
        for (queue, &i) in med.pending_enablings.iter_mut().zip(combo) {
            if let Some(p) = queue.get_mut(i) {
                p.strength = (p.strength - strength).max(0.0);
            }
        }
        events.sort();

        let total = med.total_enablement();
        let delta = if strength >= med.base_enablement / max {
            med.base_enablement
        } else {
            max * strength
        };
        let notify_strength = if total > 0.0 { delta / total } else { 0.0 };
        med.base_enablement -= delta;

        let level = med.level;
        if delta > 0.0 {
            for i in 0..med.timed_wager_weights.len() {
                let enablement = delta * med.timed_wager_weights[i];
                if age >= timer_at(&self.event_timers, level, i) {
                    med.base_enablement += enablement;
                    continue;
                }
                let mut enabling = Enabling::new(enablement, motive, self.needs.clone(), age, i, cause_begin);
                enabling.events.clone_from(&events);
                if let Some(first) = med.intermediate_enablings.first_mut() {
                    first.insert(enabling);
                } else if effect_is_mediator {
                    med.effect_enablings.insert(enabling);
                } else {
                    enabling.effect_begin = clock;
                    med.wagered_enablings.insert(enabling);
                }
            }
        }

        if notify_strength > 0.0 {
            let listeners: Vec<Notify> = self
                .net
                .get(mediator)
                .map(|n| n.notify.iter().filter(|x| x.slot == EventSlot::Effect).copied().collect())
                .unwrap_or_default();
            for x in listeners {
                self.event_firing(x.mediator, Signal::Wager, notify_strength, cause_begin, &[]);
            }
        }
    }

    /// Advance enablings past intermediate `idx`.
    fn fire_intermediate(&mut self, mediator: NeuronId, idx: usize, strength: f64, events: &[ElemEvent]) {
        let clock = self.event_clock;
        let max = self.cfg.max_enablement;
        let Some(med) = self.net.mediator(mediator) else { return };
        let Some(&inter) = med.intermediates.get(idx) else { return };
        let last = idx + 1 == med.intermediates.len();
        let effect_is_mediator = med.effect.is_some_and(|e| self.net.is_mediator(e));
        let inter_is_motor = self.net.is_motor(inter);

        let Some(med) = self.net.mediator_mut(mediator) else { return };
        let enablement = med.intermediate_enablings[idx].settled_value();
        let transfer = transfer_fraction(strength, enablement, max);
        if transfer <= 0.0 || enablement <= 0.0 {
            return;
        }
        let mut moved = Vec::new();
        for e in med.intermediate_enablings[idx].iter_mut() {
            if e.new_in_set || e.value == 0.0 {
                continue;
            }
            let mut next = e.clone();
            next.events.extend_from_slice(events);
            next.age = if inter_is_motor { 1 } else { 0 };
            next.value = e.value * transfer;
            e.value -= next.value;
            moved.push(next);
        }
        for mut next in moved {
            let set = if !last {
                &mut med.intermediate_enablings[idx + 1]
            } else if effect_is_mediator {
                &mut med.effect_enablings
            } else {
                next.effect_begin = clock;
                &mut med.wagered_enablings
            };
            // Motor-advanced enablings are usable by events later in this same pass.
            if inter_is_motor {
                next.new_in_set = false;
                set.push_raw(next);
            } else {
                set.insert(next);
            }
        }
    }

    /// The effect mediator wagered: expire part of the old wagers, then
    /// promote waiting effect enablings into wagers.
    fn fire_wager(&mut self, mediator: NeuronId, strength: f64, event_begin: Time) {
        let max = self.cfg.max_enablement;
        let timers = &self.event_timers;
        let Some(med) = self.net.mediator_mut(mediator) else { return };
        let level = med.level;

        let enablement = med.wagered_enablings.settled_value();
        let transfer = transfer_fraction(strength, enablement, max);
        if transfer > 0.0 && enablement > 0.0 {
            let mut timed_out = Vec::new();
            for e in med.wagered_enablings.iter_mut() {
                if e.new_in_set || e.value == 0.0 {
                    continue;
                }
                let mut x = e.clone();
                x.value = e.value * transfer;
                e.value -= x.value;
                x.age = timer_at(timers, level, x.timer_index);
                x.new_in_set = false;
                timed_out.push(x);
            }
            for x in timed_out {
                med.wagered_enablings.push_raw(x);
            }
        }

        let enablement = med.effect_enablings.settled_value();
        let transfer = transfer_fraction(strength, enablement, max);
        if transfer > 0.0 && enablement > 0.0 {
            let mut promoted = Vec::new();
            for e in med.effect_enablings.iter_mut() {
                if e.new_in_set || e.value == 0.0 {
                    continue;
                }
                let mut x = e.clone();
                x.value = e.value * transfer;
                e.value -= x.value;
                x.effect_begin = event_begin;
                promoted.push(x);
            }
            for x in promoted {
                med.wagered_enablings.insert(x);
            }
        }
    }

    /// The effect event was evaluated: decide how strongly this mediator fires.
    fn fire_effect(&mut self, mediator: NeuronId, strength: f64, events: &[ElemEvent]) {
        let max = self.cfg.max_enablement;
        let timers = &self.event_timers;
        let Some(n) = self.net.get_mut(mediator) else { return };
        let Some(med) = n.as_mediator_mut() else { return };
        let level = med.level;

        let mut enablement = 0.0;
        let mut cause_begin: Time = 0;
        let mut stream: Vec<ElemEvent> = Vec::new();
        let firing = if med.enabler {
            // Strongest settled wager, plus any wager sharing its event stream.
            let mut best: Option<usize> = None;
            for (i, e) in med.wagered_enablings.iter().enumerate() {
                if !e.new_in_set && e.value > enablement {
                    enablement = e.value;
                    best = Some(i);
                }
            }
            if let Some(b) = best {
                let common = med.wagered_enablings.get(b).map(|e| e.events.clone()).unwrap_or_default();
                for (i, e) in med.wagered_enablings.iter_mut().enumerate() {
                    if e.new_in_set {
                        continue;
                    }
                    if i == b {
                        cause_begin = e.cause_begin;
                    } else if e.events == common {
                        enablement += e.value;
                    } else {
                        continue;
                    }
                    e.effect_wager = true;
                    e.events.extend_from_slice(events);
                }
                stream = med.wagered_enablings.get(b).map(|e| e.events.clone()).unwrap_or_default();
            }
            transfer_fraction(strength, enablement, max) * enablement
        } else {
            // Wagers that reached their deadline; the latest-starting one speaks for them.
            // Settles at `age == timer`: the learn phase drops anything older before the
            // next enable phase can see it.
            let mut chosen: Option<usize> = None;
            for (i, e) in med.wagered_enablings.iter_mut().enumerate() {
                if e.new_in_set || e.age < timer_at(timers, level, e.timer_index) {
                    continue;
                }
                enablement += e.value;
                e.effect_wager = true;
                e.events.extend_from_slice(events);
                if chosen.is_none() || cause_begin < e.cause_begin {
                    chosen = Some(i);
                    cause_begin = e.cause_begin;
                }
            }
            if let Some(c) = chosen {
                stream = med.wagered_enablings.get(c).map(|e| e.events.clone()).unwrap_or_default();
            }
            transfer_fraction(1.0 - strength, enablement, max) * enablement
        };

        let total = med.total_enablement();
        let notify_strength = if total > 0.0 { firing / total } else { 0.0 };
        n.firing_strength = firing;

        let listeners = n.notify.clone();
        for x in listeners {
            if x.slot == EventSlot::Effect || firing > 0.0 {
                self.event_firing(x.mediator, x.slot.into(), notify_strength, cause_begin, &stream);
            }
        }
    }
}
