//! Engine images.
//!
//! An image is [`MAGIC`], a u32 version, then LZ4 chunks in any order:
//!
//! - `CFG0` configuration
//! - `PRNG` generator state
//! - `IOST` sensors, last response and the response controls
//! - `NEED` current and previous needs with their descriptions
//! - `TIMR` event timer table
//! - `CLCK` event clock
//! - `LEVT` learning timeline
//! - `NEUR` every neuron, relations stored as ids
//!
//! Unknown chunks are skipped. Loading always builds a fresh engine and
//! checks that every stored id resolves before handing it out.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use tracing::info;

use crate::config::MonaConfig;
use crate::enabling::{ElemEvent, Enabling, EnablingSet, PendingEnabling, WagerHistory};
use crate::error::MonaError;
use crate::mona::Mona;
use crate::network::Network;
use crate::neuron::{EventSlot, Mediator, Motor, Neuron, NeuronKind, Notify, Receptor};
use crate::prng::Prng;
use crate::storage::{
    next_chunk_header, read_bool, read_chunk_payload, read_f64_le, read_f64_vec, read_i32_le,
    read_len, read_string, read_u32_le, read_u64_le, write_bool, write_chunk_lz4, write_f64_le,
    write_f64_slice, write_i32_le, write_len, write_string, write_u32_le, write_u64_le,
    CountingWriter, MAGIC, VERSION_CURRENT,
};
use crate::timeline::{LearningEvent, Timeline};
use crate::values::{GoalEvent, GoalValue, NeuronId};

const KIND_RECEPTOR: u8 = 0;
const KIND_MOTOR: u8 = 1;
const KIND_MEDIATOR: u8 = 2;

const SLOT_EFFECT: u8 = 0;
const SLOT_INTERMEDIATE: u8 = 1;
const SLOT_CAUSE: u8 = 2;

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn write_list<W: Write, T>(
    w: &mut W,
    items: &[T],
    mut item: impl FnMut(&mut W, &T) -> io::Result<()>,
) -> io::Result<()> {
    write_len(w, items.len())?;
    for x in items {
        item(w, x)?;
    }
    Ok(())
}

fn read_list<R: Read, T>(r: &mut R, mut item: impl FnMut(&mut R) -> io::Result<T>) -> io::Result<Vec<T>> {
    let n = read_len(r)?;
    let mut out = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        out.push(item(r)?);
    }
    Ok(out)
}

fn write_ids<W: Write>(w: &mut W, ids: &[NeuronId]) -> io::Result<()> {
    write_list(w, ids, |w, id| write_u32_le(w, *id))
}

fn read_ids<R: Read>(r: &mut R) -> io::Result<Vec<NeuronId>> {
    read_list(r, read_u32_le)
}

// ---------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------

fn write_config<W: Write>(w: &mut W, cfg: &MonaConfig) -> io::Result<()> {
    for n in [
        cfg.num_sensors,
        cfg.max_response,
        cfg.num_needs,
        cfg.num_event_timers,
        cfg.max_goal_value_events,
        cfg.max_mediators,
        cfg.max_mediator_level,
        cfg.max_mediator_causes,
        cfg.max_mediator_events,
        cfg.max_mediator_skew,
        cfg.parasite_search_budget,
    ] {
        write_len(w, n)?;
    }
    write_u64_le(w, cfg.seed)?;
    for v in [
        cfg.max_need,
        cfg.min_motive,
        cfg.max_enablement,
        cfg.min_enablement,
        cfg.new_enablement,
        cfg.drive_attenuation,
        cfg.wager_history_update_velocity,
        cfg.min_wager_weight,
        cfg.motive_learning_damper,
        cfg.strength_learning_damper,
        cfg.enablement_learning_damper,
        cfg.expiring_enablement_learning_damper,
        cfg.expiration_weight,
        cfg.response_expiration_weight,
        cfg.residual_response_randomness,
    ] {
        write_f64_le(w, v)?;
    }
    for b in [cfg.structural_learning, cfg.auto_receptors, cfg.learn_goal_values] {
        write_bool(w, b)?;
    }
    Ok(())
}

fn read_config<R: Read>(r: &mut R) -> io::Result<MonaConfig> {
    let mut cfg = MonaConfig::default();
    for slot in [
        &mut cfg.num_sensors,
        &mut cfg.max_response,
        &mut cfg.num_needs,
        &mut cfg.num_event_timers,
        &mut cfg.max_goal_value_events,
        &mut cfg.max_mediators,
        &mut cfg.max_mediator_level,
        &mut cfg.max_mediator_causes,
        &mut cfg.max_mediator_events,
        &mut cfg.max_mediator_skew,
        &mut cfg.parasite_search_budget,
    ] {
        *slot = read_len(r)?;
    }
    cfg.seed = read_u64_le(r)?;
    for slot in [
        &mut cfg.max_need,
        &mut cfg.min_motive,
        &mut cfg.max_enablement,
        &mut cfg.min_enablement,
        &mut cfg.new_enablement,
        &mut cfg.drive_attenuation,
        &mut cfg.wager_history_update_velocity,
        &mut cfg.min_wager_weight,
        &mut cfg.motive_learning_damper,
        &mut cfg.strength_learning_damper,
        &mut cfg.enablement_learning_damper,
        &mut cfg.expiring_enablement_learning_damper,
        &mut cfg.expiration_weight,
        &mut cfg.response_expiration_weight,
        &mut cfg.residual_response_randomness,
    ] {
        *slot = read_f64_le(r)?;
    }
    for slot in [
        &mut cfg.structural_learning,
        &mut cfg.auto_receptors,
        &mut cfg.learn_goal_values,
    ] {
        *slot = read_bool(r)?;
    }
    Ok(cfg)
}

// ---------------------------------------------------------------------
// Enablings
// ---------------------------------------------------------------------

fn write_events<W: Write>(w: &mut W, events: &[ElemEvent]) -> io::Result<()> {
    write_list(w, events, |w, e| {
        write_u32_le(w, e.id)?;
        write_u64_le(w, e.timestamp)
    })
}

fn read_events<R: Read>(r: &mut R) -> io::Result<Vec<ElemEvent>> {
    read_list(r, |r| {
        let id = read_u32_le(r)?;
        Ok(ElemEvent::new(id, read_u64_le(r)?))
    })
}

fn write_enabling<W: Write>(w: &mut W, e: &Enabling) -> io::Result<()> {
    write_f64_le(w, e.value)?;
    write_f64_le(w, e.motive)?;
    write_f64_slice(w, &e.need_save)?;
    write_u64_le(w, e.age)?;
    write_len(w, e.timer_index)?;
    write_bool(w, e.new_in_set)?;
    write_bool(w, e.effect_wager)?;
    write_bool(w, e.parasite)?;
    write_u64_le(w, e.cause_begin)?;
    write_u64_le(w, e.effect_begin)?;
    write_events(w, &e.events)
}

fn read_enabling<R: Read>(r: &mut R) -> io::Result<Enabling> {
    let value = read_f64_le(r)?;
    let motive = read_f64_le(r)?;
    let need_save = read_f64_vec(r)?;
    let age = read_u64_le(r)?;
    let timer_index = read_len(r)?;
    let mut e = Enabling::new(value, motive, need_save, age, timer_index, 0);
    e.new_in_set = read_bool(r)?;
    e.effect_wager = read_bool(r)?;
    e.parasite = read_bool(r)?;
    e.cause_begin = read_u64_le(r)?;
    e.effect_begin = read_u64_le(r)?;
    e.events = read_events(r)?;
    Ok(e)
}

fn write_set<W: Write>(w: &mut W, set: &EnablingSet) -> io::Result<()> {
    write_len(w, set.len())?;
    for e in set {
        write_enabling(w, e)?;
    }
    Ok(())
}

fn read_set<R: Read>(r: &mut R) -> io::Result<EnablingSet> {
    let mut set = EnablingSet::new();
    for e in read_list(r, read_enabling)? {
        set.push_raw(e);
    }
    Ok(set)
}

fn write_pending<W: Write>(w: &mut W, p: &PendingEnabling) -> io::Result<()> {
    write_f64_le(w, p.strength)?;
    write_u64_le(w, p.age)?;
    write_u64_le(w, p.cause_begin)?;
    write_events(w, &p.events)
}

fn read_pending<R: Read>(r: &mut R) -> io::Result<PendingEnabling> {
    Ok(PendingEnabling {
        strength: read_f64_le(r)?,
        age: read_u64_le(r)?,
        cause_begin: read_u64_le(r)?,
        events: read_events(r)?,
    })
}

// ---------------------------------------------------------------------
// Neurons
// ---------------------------------------------------------------------

fn write_goals<W: Write>(w: &mut W, g: &GoalValue) -> io::Result<()> {
    write_f64_slice(w, g.goals())?;
    write_f64_le(w, g.weight())?;
    write_list(w, g.events(), |w, e| {
        write_f64_slice(w, &e.need_before)?;
        write_f64_slice(w, &e.need_after)?;
        write_f64_le(w, e.weight)
    })
}

fn read_goals<R: Read>(r: &mut R) -> io::Result<GoalValue> {
    let goals = read_f64_vec(r)?;
    let weight = read_f64_le(r)?;
    let events = read_list(r, |r| {
        Ok(GoalEvent {
            need_before: read_f64_vec(r)?,
            need_after: read_f64_vec(r)?,
            weight: read_f64_le(r)?,
        })
    })?;
    Ok(GoalValue::from_parts(goals, weight, events))
}

fn write_slot<W: Write>(w: &mut W, slot: EventSlot) -> io::Result<()> {
    match slot {
        EventSlot::Effect => w.write_all(&[SLOT_EFFECT]),
        EventSlot::Intermediate(i) => {
            w.write_all(&[SLOT_INTERMEDIATE])?;
            write_len(w, i)
        }
        EventSlot::Cause(i) => {
            w.write_all(&[SLOT_CAUSE])?;
            write_len(w, i)
        }
    }
}

fn read_slot<R: Read>(r: &mut R) -> io::Result<EventSlot> {
    let mut tag = [0u8; 1];
    r.read_exact(&mut tag)?;
    match tag[0] {
        SLOT_EFFECT => Ok(EventSlot::Effect),
        SLOT_INTERMEDIATE => Ok(EventSlot::Intermediate(read_len(r)?)),
        SLOT_CAUSE => Ok(EventSlot::Cause(read_len(r)?)),
        _ => Err(invalid("unknown event slot")),
    }
}

fn write_mediator<W: Write>(w: &mut W, m: &Mediator) -> io::Result<()> {
    write_ids(w, &m.causes)?;
    write_ids(w, &m.intermediates)?;
    write_bool(w, m.effect.is_some())?;
    write_u32_le(w, m.effect.unwrap_or(0))?;
    write_bool(w, m.enabler)?;
    write_bool(w, m.instinct)?;
    write_len(w, m.level)?;
    write_f64_le(w, m.utility)?;
    write_u64_le(w, m.cause_begin)?;

    write_f64_le(w, m.base_enablement)?;
    write_f64_slice(w, &m.intermediate_enablements)?;
    write_f64_le(w, m.effect_enablement)?;

    write_list(w, &m.intermediate_enablings, write_set)?;
    write_set(w, &m.effect_enablings)?;
    write_set(w, &m.wagered_enablings)?;
    write_list(w, &m.pending_enablings, |w, queue| write_list(w, queue, write_pending))?;

    write_f64_slice(w, &m.timed_wager_weights)?;
    write_u64_le(w, m.wager_history.fires)?;
    write_u64_le(w, m.wager_history.expires)
}

fn read_mediator<R: Read>(r: &mut R, cfg: &MonaConfig) -> io::Result<Mediator> {
    let causes = read_ids(r)?;
    let intermediates = read_ids(r)?;
    let has_effect = read_bool(r)?;
    let effect = read_u32_le(r)?;
    let enabler = read_bool(r)?;
    let instinct = read_bool(r)?;
    let level = read_len(r)?;
    let utility = read_f64_le(r)?;
    let cause_begin = read_u64_le(r)?;
    let base_enablement = read_f64_le(r)?;

    let mut m = Mediator::new(base_enablement, enabler, utility, cfg.num_event_timers);
    m.causes = causes;
    m.intermediates = intermediates;
    m.effect = has_effect.then_some(effect);
    m.instinct = instinct;
    m.level = level;
    m.cause_begin = cause_begin;
    m.intermediate_enablements = read_f64_vec(r)?;
    m.effect_enablement = read_f64_le(r)?;
    m.intermediate_enablings = read_list(r, read_set)?;
    m.effect_enablings = read_set(r)?;
    m.wagered_enablings = read_set(r)?;
    m.pending_enablings = read_list(r, |r| read_list(r, read_pending))?;
    m.timed_wager_weights = read_f64_vec(r)?;
    m.wager_history = WagerHistory {
        fires: read_u64_le(r)?,
        expires: read_u64_le(r)?,
    };
    Ok(m)
}

fn write_neuron<W: Write>(w: &mut W, n: &Neuron) -> io::Result<()> {
    write_u32_le(w, n.id)?;
    let tag = match &n.kind {
        NeuronKind::Receptor(_) => KIND_RECEPTOR,
        NeuronKind::Motor(_) => KIND_MOTOR,
        NeuronKind::Mediator(_) => KIND_MEDIATOR,
    };
    w.write_all(&[tag])?;
    write_string(w, &n.description)?;
    write_f64_le(w, n.firing_strength)?;
    write_f64_le(w, n.motive)?;
    write_f64_le(w, n.enabling_accum)?;
    write_f64_le(w, n.disabling_accum)?;
    write_goals(w, &n.goals)?;
    write_list(w, &n.notify, |w, x| {
        write_u32_le(w, x.mediator)?;
        write_slot(w, x.slot)
    })?;
    match &n.kind {
        NeuronKind::Receptor(r) => write_list(w, &r.sensor_mask, |w, s| write_i32_le(w, *s)),
        NeuronKind::Motor(m) => write_len(w, m.response),
        NeuronKind::Mediator(m) => write_mediator(w, m),
    }
}

fn read_neuron<R: Read>(r: &mut R, cfg: &MonaConfig) -> io::Result<Neuron> {
    let id = read_u32_le(r)?;
    let mut tag = [0u8; 1];
    r.read_exact(&mut tag)?;
    let description = read_string(r)?;
    let firing_strength = read_f64_le(r)?;
    let motive = read_f64_le(r)?;
    let enabling_accum = read_f64_le(r)?;
    let disabling_accum = read_f64_le(r)?;
    let goals = read_goals(r)?;
    let notify = read_list(r, |r| {
        let mediator = read_u32_le(r)?;
        Ok(Notify {
            mediator,
            slot: read_slot(r)?,
        })
    })?;
    let kind = match tag[0] {
        KIND_RECEPTOR => NeuronKind::Receptor(Receptor {
            sensor_mask: read_list(r, read_i32_le)?,
        }),
        KIND_MOTOR => NeuronKind::Motor(Motor {
            response: read_len(r)?,
        }),
        KIND_MEDIATOR => NeuronKind::Mediator(Box::new(read_mediator(r, cfg)?)),
        _ => return Err(invalid("unknown neuron kind")),
    };

    let mut n = Neuron::new(id, description, kind, cfg);
    n.firing_strength = firing_strength;
    n.motive = motive;
    n.enabling_accum = enabling_accum;
    n.disabling_accum = disabling_accum;
    n.goals = goals;
    n.notify = notify;
    Ok(n)
}

// ---------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------

/// Check that every stored relation names a live neuron of the right kind
/// and that per-neuron vectors match the configured dimensions.
fn resolve(net: &Network, timeline: &Timeline, cfg: &MonaConfig) -> Result<(), MonaError> {
    let bad = |msg| Err(MonaError::BadImage(msg));
    for n in net.iter() {
        if n.goals.goals().len() != cfg.num_needs {
            return bad("goal vector length");
        }
        for x in n.notify_list() {
            let listener = net
                .get(x.mediator)
                .ok_or(MonaError::UnresolvedId(x.mediator))?
                .as_mediator()
                .ok_or(MonaError::NotAMediator(x.mediator))?;
            let held = match x.slot {
                EventSlot::Effect => listener.effect,
                EventSlot::Intermediate(i) => listener.intermediates.get(i).copied(),
                EventSlot::Cause(i) => listener.causes.get(i).copied(),
            };
            if held != Some(n.id) {
                return bad("notify slot does not match listener");
            }
        }
        match &n.kind {
            NeuronKind::Receptor(r) if r.sensor_mask.len() != cfg.num_sensors => {
                return bad("receptor mask length");
            }
            NeuronKind::Motor(m) if m.response > cfg.max_response => {
                return bad("motor response out of range");
            }
            NeuronKind::Mediator(m) => {
                for event in m.causes.iter().chain(&m.intermediates).chain(m.effect.iter()) {
                    let target = net.get(*event).ok_or(MonaError::UnresolvedId(*event))?;
                    if !target.notify_list().iter().any(|x| x.mediator == n.id) {
                        return bad("event is missing its back-reference");
                    }
                }
                if m.pending_enablings.len() != m.causes.len()
                    || m.intermediate_enablings.len() != m.intermediates.len()
                    || m.intermediate_enablements.len() != m.intermediates.len()
                    || m.timed_wager_weights.len() != cfg.num_event_timers
                {
                    return bad("mediator slot counts disagree");
                }
            }
            _ => {}
        }
    }
    for level in 0..timeline.num_levels() {
        for e in timeline.level(level) {
            if !net.contains(e.neuron) {
                return Err(MonaError::UnresolvedId(e.neuron));
            }
        }
    }
    Ok(())
}

fn expect_len<T>(v: &[T], n: usize, what: &'static str) -> Result<(), MonaError> {
    if v.len() == n {
        Ok(())
    } else {
        Err(MonaError::BadImage(what))
    }
}

// ---------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------

impl Mona {
    /// Write a complete image of this engine.
    pub fn save_to<W: Write>(&self, w: &mut W) -> Result<(), MonaError> {
        w.write_all(MAGIC)?;
        write_u32_le(w, VERSION_CURRENT)?;

        let mut buf = Vec::new();
        write_config(&mut buf, &self.cfg)?;
        write_chunk_lz4(w, *b"CFG0", &buf)?;

        buf.clear();
        write_u64_le(&mut buf, self.rng.state())?;
        write_chunk_lz4(w, *b"PRNG", &buf)?;

        buf.clear();
        write_list(&mut buf, &self.sensors, |w, s| write_i32_le(w, *s))?;
        write_len(&mut buf, self.response)?;
        write_f64_le(&mut buf, self.response_randomness)?;
        write_bool(&mut buf, self.response_override.is_some())?;
        write_len(&mut buf, self.response_override.unwrap_or(0))?;
        write_f64_slice(&mut buf, &self.override_potentials)?;
        write_list(&mut buf, &self.inhibitors, |w, b| write_bool(w, *b))?;
        write_f64_slice(&mut buf, &self.response_potentials)?;
        write_chunk_lz4(w, *b"IOST", &buf)?;

        buf.clear();
        write_f64_slice(&mut buf, &self.needs)?;
        write_f64_slice(&mut buf, &self.old_needs)?;
        write_list(&mut buf, &self.need_descriptions, |w, s| write_string(w, s))?;
        write_chunk_lz4(w, *b"NEED", &buf)?;

        buf.clear();
        write_list(&mut buf, &self.event_timers, |w, row| {
            write_list(w, row, |w, t| write_u64_le(w, *t))
        })?;
        write_chunk_lz4(w, *b"TIMR", &buf)?;

        buf.clear();
        write_u64_le(&mut buf, self.event_clock)?;
        write_chunk_lz4(w, *b"CLCK", &buf)?;

        buf.clear();
        write_len(&mut buf, self.timeline.num_levels())?;
        for level in 0..self.timeline.num_levels() {
            write_list(&mut buf, self.timeline.level(level), |w, e| {
                write_u32_le(w, e.neuron)?;
                write_f64_le(w, e.strength)?;
                write_f64_le(w, e.enablement)?;
                write_f64_le(w, e.motive)?;
                write_u64_le(w, e.begin)?;
                write_u64_le(w, e.timestamp)
            })?;
        }
        write_chunk_lz4(w, *b"LEVT", &buf)?;

        buf.clear();
        write_u32_le(&mut buf, self.net.next_id())?;
        write_len(&mut buf, self.net.len())?;
        for n in self.net.iter() {
            write_neuron(&mut buf, n)?;
        }
        write_chunk_lz4(w, *b"NEUR", &buf)?;
        Ok(())
    }

    /// Read an image into a new engine. Nothing is returned unless every
    /// chunk parses and every stored id resolves.
    pub fn load_from<R: Read>(r: &mut R) -> Result<Mona, MonaError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(MonaError::BadImage("bad magic"));
        }
        let version = read_u32_le(r)?;
        if version != VERSION_CURRENT {
            return Err(MonaError::BadImage("unsupported image version"));
        }

        let mut cfg_chunk = None;
        let mut prng_chunk = None;
        let mut io_chunk = None;
        let mut need_chunk = None;
        let mut timer_chunk = None;
        let mut clock_chunk = None;
        let mut timeline_chunk = None;
        let mut neuron_chunk = None;
        while let Some((tag, len)) = next_chunk_header(r)? {
            let payload = read_chunk_payload(r, len)?;
            match &tag {
                b"CFG0" => cfg_chunk = Some(payload),
                b"PRNG" => prng_chunk = Some(payload),
                b"IOST" => io_chunk = Some(payload),
                b"NEED" => need_chunk = Some(payload),
                b"TIMR" => timer_chunk = Some(payload),
                b"CLCK" => clock_chunk = Some(payload),
                b"LEVT" => timeline_chunk = Some(payload),
                b"NEUR" => neuron_chunk = Some(payload),
                _ => {}
            }
        }
        let missing = |msg| MonaError::BadImage(msg);

        let cfg = read_config(&mut Cursor::new(cfg_chunk.ok_or(missing("missing CFG0"))?))?;
        let mut mona = Mona::from_config(cfg)?;
        let responses = cfg.max_response + 1;

        let mut c = Cursor::new(prng_chunk.ok_or(missing("missing PRNG"))?);
        mona.rng = Prng::from_state(read_u64_le(&mut c)?);

        let mut c = Cursor::new(io_chunk.ok_or(missing("missing IOST"))?);
        mona.sensors = read_list(&mut c, read_i32_le)?;
        mona.response = read_len(&mut c)?;
        mona.response_randomness = read_f64_le(&mut c)?;
        let has_override = read_bool(&mut c)?;
        let response_override = read_len(&mut c)?;
        mona.response_override = has_override.then_some(response_override);
        mona.override_potentials = read_f64_vec(&mut c)?;
        mona.inhibitors = read_list(&mut c, read_bool)?;
        mona.response_potentials = read_f64_vec(&mut c)?;
        expect_len(&mona.sensors, cfg.num_sensors, "sensor vector length")?;
        expect_len(&mona.override_potentials, responses, "override potential length")?;
        expect_len(&mona.inhibitors, responses, "inhibitor length")?;
        expect_len(&mona.response_potentials, responses, "response potential length")?;
        if mona.response > cfg.max_response || response_override > cfg.max_response {
            return Err(MonaError::BadImage("response out of range"));
        }

        let mut c = Cursor::new(need_chunk.ok_or(missing("missing NEED"))?);
        mona.needs = read_f64_vec(&mut c)?;
        mona.old_needs = read_f64_vec(&mut c)?;
        mona.need_descriptions = read_list(&mut c, read_string)?;
        expect_len(&mona.needs, cfg.num_needs, "need vector length")?;
        expect_len(&mona.old_needs, cfg.num_needs, "need vector length")?;
        expect_len(&mona.need_descriptions, cfg.num_needs, "need description count")?;

        let mut c = Cursor::new(timer_chunk.ok_or(missing("missing TIMR"))?);
        mona.event_timers = read_list(&mut c, |r| read_list(r, read_u64_le))?;
        expect_len(&mona.event_timers, cfg.max_mediator_level + 1, "event timer levels")?;
        for row in &mona.event_timers {
            expect_len(row, cfg.num_event_timers, "event timer count")?;
        }

        let mut c = Cursor::new(clock_chunk.ok_or(missing("missing CLCK"))?);
        mona.event_clock = read_u64_le(&mut c)?;

        let mut c = Cursor::new(timeline_chunk.ok_or(missing("missing LEVT"))?);
        let levels = read_len(&mut c)?;
        if levels != cfg.timeline_levels() {
            return Err(MonaError::BadImage("timeline level count"));
        }
        let mut timeline = Timeline::new(levels);
        for level in 0..levels {
            let events = read_list(&mut c, |r| {
                Ok(LearningEvent {
                    neuron: read_u32_le(r)?,
                    strength: read_f64_le(r)?,
                    enablement: read_f64_le(r)?,
                    motive: read_f64_le(r)?,
                    begin: read_u64_le(r)?,
                    timestamp: read_u64_le(r)?,
                })
            })?;
            for e in events {
                timeline.push(level, e);
            }
        }

        let mut c = Cursor::new(neuron_chunk.ok_or(missing("missing NEUR"))?);
        let next_id = read_u32_le(&mut c)?;
        let neurons = read_list(&mut c, |r| read_neuron(r, &cfg))?;
        let mut net = Network::new();
        for n in neurons {
            if n.id >= next_id {
                return Err(MonaError::BadImage("neuron id beyond next id"));
            }
            net.insert_with_id(n)?;
        }
        net.reserve_ids(next_id);

        resolve(&net, &timeline, &cfg)?;
        mona.net = net;
        mona.timeline = timeline;

        info!(
            neurons = mona.net.len(),
            mediators = mona.net.mediators().len(),
            clock = mona.event_clock,
            "loaded mona image"
        );
        Ok(mona)
    }

    pub fn save_bytes(&self) -> Result<Vec<u8>, MonaError> {
        let mut out = Vec::new();
        self.save_to(&mut out)?;
        Ok(out)
    }

    pub fn load_bytes(bytes: &[u8]) -> Result<Mona, MonaError> {
        Self::load_from(&mut Cursor::new(bytes))
    }

    pub fn save_path(&self, path: impl AsRef<Path>) -> Result<(), MonaError> {
        let path = path.as_ref();
        let mut w = BufWriter::new(File::create(path)?);
        self.save_to(&mut w)?;
        w.flush()?;
        info!(path = %path.display(), neurons = self.net.len(), "saved mona image");
        Ok(())
    }

    pub fn load_path(path: impl AsRef<Path>) -> Result<Mona, MonaError> {
        let mut r = BufReader::new(File::open(path.as_ref())?);
        Self::load_from(&mut r)
    }

    /// Size of the image [`Mona::save_to`] would write.
    pub fn image_size_bytes(&self) -> Result<usize, MonaError> {
        let mut w = CountingWriter::new();
        self.save_to(&mut w)?;
        Ok(w.written())
    }
}
