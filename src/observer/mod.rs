#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mona::{Diagnostics, Mona};
use crate::neuron::{Neuron, NeuronKind};
use crate::values::{Enablement, Need, NeuronId, Response, Sensor, Time};

/// A read-only snapshot of an engine's network.
///
/// Design intent:
/// - Observers cannot mutate or steer the engine.
/// - Snapshotting is *on-demand* and allocates; the cycle itself is unchanged.
/// - Rendering (text dumps, Graphviz) belongs to the consumer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSnapshot {
    pub event_clock: Time,
    pub sensors: Vec<Sensor>,
    pub response: Response,
    pub response_potentials: Vec<f64>,
    pub needs: Vec<Need>,
    pub diagnostics: Diagnostics,
    pub neurons: Vec<NeuronSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuronSnapshot {
    pub id: NeuronId,
    pub description: String,
    pub firing_strength: f64,
    pub motive: f64,
    pub goal_value: Need,
    pub kind: NeuronKindSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeuronKindSnapshot {
    Receptor { sensor_mask: Vec<Sensor> },
    Motor { response: Response },
    Mediator(MediatorSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MediatorSnapshot {
    pub enabler: bool,
    pub instinct: bool,
    pub level: usize,
    pub causes: Vec<NeuronId>,
    pub intermediates: Vec<NeuronId>,
    pub effect: Option<NeuronId>,
    pub base_enablement: Enablement,
    pub outstanding_enablement: Enablement,
    /// Own utility and the utility inherited from dependents.
    pub utility: f64,
    pub effective_utility: f64,
    pub wagers: usize,
    pub parasitic_wagers: usize,
    pub fires: u64,
    pub expires: u64,
}

pub struct MonaAdapter<'a> {
    mona: &'a Mona,
}

impl<'a> MonaAdapter<'a> {
    pub fn new(mona: &'a Mona) -> Self {
        Self { mona }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            event_clock: self.mona.event_clock(),
            sensors: self.mona.sensors().to_vec(),
            response: self.mona.response(),
            response_potentials: self.mona.response_potentials().to_vec(),
            needs: self.mona.needs().to_vec(),
            diagnostics: self.mona.diagnostics(),
            neurons: self.mona.network().iter().map(|n| self.neuron(n)).collect(),
        }
    }

    /// Snapshot of one neuron, if it exists.
    pub fn neuron_snapshot(&self, id: NeuronId) -> Option<NeuronSnapshot> {
        self.mona.neuron(id).map(|n| self.neuron(n))
    }

    fn neuron(&self, n: &Neuron) -> NeuronSnapshot {
        let kind = match &n.kind {
            NeuronKind::Receptor(r) => NeuronKindSnapshot::Receptor {
                sensor_mask: r.sensor_mask.clone(),
            },
            NeuronKind::Motor(m) => NeuronKindSnapshot::Motor {
                response: m.response,
            },
            NeuronKind::Mediator(m) => NeuronKindSnapshot::Mediator(MediatorSnapshot {
                enabler: m.enabler,
                instinct: m.instinct,
                level: m.level,
                causes: m.causes.clone(),
                intermediates: m.intermediates.clone(),
                effect: m.effect,
                base_enablement: m.base_enablement,
                outstanding_enablement: m.outstanding_enablement(),
                utility: m.utility,
                effective_utility: self.mona.network().utility(n.id),
                wagers: m.wagered_enablings.len(),
                parasitic_wagers: m.wagered_enablings.iter().filter(|e| e.parasite).count(),
                fires: m.wager_history.fires,
                expires: m.wager_history.expires,
            }),
        };
        NeuronSnapshot {
            id: n.id,
            description: n.description.clone(),
            firing_strength: n.firing_strength,
            motive: n.motive,
            goal_value: n.goals.value(),
            kind,
        }
    }
}
