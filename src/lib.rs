//! # mona
//!
//! An adaptive goal-seeking engine. Receptors recognize sensor patterns,
//! motors emit responses, and mediators learn which causes, followed by which
//! intermediate events, bring about which effects.
//!
//! Each [`Mona::cycle`](mona::Mona::cycle) runs five phases:
//! sense, enable (wager enablement on predicted effects), learn (grow new
//! mediators and settle wagers), drive (push need reductions back toward
//! motors) and respond.
//!
//! ## Quick Start
//!
//! ```
//! use mona::prelude::*;
//!
//! let mut mona = Mona::new(2, 1, 1, 42).unwrap();
//! mona.init_need(0, 5.0, "food").unwrap();
//!
//! let food = mona.new_receptor(&[1, 1], "food").unwrap();
//! mona.set_goals(food, &[5.0], 1.0).unwrap();
//! mona.new_motor(0, "wait").unwrap();
//! mona.new_motor(1, "eat").unwrap();
//!
//! let response = mona.cycle(&[1, 0]).unwrap();
//! assert!(response <= 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): image persistence to streams, byte buffers and files
//! - `serde`: serialization of configs and observer snapshots
//!
//! ## Modules
//!
//! - [`mona`]: the engine and its cycle
//! - [`network`]: id-indexed neuron arena
//! - [`persist`]: binary save and load
//! - [`observer`]: read-only snapshots

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/values.rs"]
pub mod values;

#[path = "core/enabling.rs"]
pub mod enabling;

#[path = "core/neuron.rs"]
pub mod neuron;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/timeline.rs"]
pub mod timeline;

#[path = "core/mona.rs"]
pub mod mona;

#[path = "core/enable.rs"]
mod enable;

#[path = "core/wager.rs"]
mod wager;

#[path = "core/learn.rs"]
mod learn;

#[path = "core/drive.rs"]
mod drive;

#[cfg(feature = "std")]
#[path = "core/storage.rs"]
pub mod storage;

#[cfg(feature = "std")]
#[path = "core/persist.rs"]
pub mod persist;

pub mod observer;

pub mod prelude {
    pub use crate::config::MonaConfig;
    pub use crate::enabling::{ElemEvent, Enabling, EnablingSet, Outcome};
    pub use crate::error::MonaError;
    pub use crate::mona::{Diagnostics, Mona};
    pub use crate::network::{MediatorShape, Network};
    pub use crate::neuron::{EventKind, Mediator, Neuron, NeuronKind};
    pub use crate::observer::{MonaAdapter, NetworkSnapshot};
    pub use crate::values::{
        Enablement, GoalValue, Motive, Need, NeuronId, Response, Sensor, Time, DONT_CARE,
    };
}
