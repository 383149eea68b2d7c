use thiserror::Error;

use crate::values::NeuronId;

/// Errors surfaced by construction, graph editing, and persistence.
///
/// The per-tick cycle only fails on a malformed sensor vector; structural
/// learning discards rejected candidates instead of reporting them.
#[derive(Debug, Error)]
pub enum MonaError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error("expected {expected} sensor values, got {got}")]
    SensorCount { expected: usize, got: usize },

    #[error("need index {0} out of range")]
    NeedIndex(usize),

    #[error("response {0} out of range")]
    ResponseOutOfRange(usize),

    #[error("no neuron with id {0}")]
    UnknownNeuron(NeuronId),

    #[error("neuron {0} is not a mediator")]
    NotAMediator(NeuronId),

    #[error("mediator bounds exceeded: {0}")]
    MediatorBounds(&'static str),

    #[error("no event timer at level {level}, index {index}")]
    EventTimer { level: usize, index: usize },

    #[error("image i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt image: {0}")]
    BadImage(&'static str),

    #[error("image references unknown neuron id {0}")]
    UnresolvedId(NeuronId),

    #[cfg(feature = "serde")]
    #[error("invalid config json: {0}")]
    ConfigJson(#[from] serde_json::Error),
}
