#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::MonaError;
use crate::values::{Enablement, Need, Weight};

/// Dimensions and tunables of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MonaConfig {
    pub num_sensors: usize,
    /// Responses are `0..=max_response`.
    pub max_response: usize,
    pub num_needs: usize,
    /// Duration buckets a wager can be placed in.
    pub num_event_timers: usize,
    pub seed: u64,

    pub max_need: Need,
    pub min_motive: f64,
    pub max_goal_value_events: usize,

    pub max_enablement: Enablement,
    pub min_enablement: Enablement,
    pub new_enablement: Enablement,
    pub drive_attenuation: Weight,
    pub wager_history_update_velocity: Weight,
    pub min_wager_weight: Weight,

    pub max_mediators: usize,
    pub max_mediator_level: usize,
    pub max_mediator_causes: usize,
    /// Causes + intermediates + effect; bounds chain extension.
    pub max_mediator_events: usize,
    /// How many levels away from the effect a cause may be drawn.
    pub max_mediator_skew: usize,

    // Acceptance probability exponents for structural learning.
    pub motive_learning_damper: f64,
    pub strength_learning_damper: f64,
    pub enablement_learning_damper: f64,
    pub expiring_enablement_learning_damper: f64,

    pub expiration_weight: Weight,
    pub response_expiration_weight: Weight,
    pub residual_response_randomness: f64,

    /// Grow new mediators from the learning timeline.
    pub structural_learning: bool,
    /// Create a receptor for every sensor vector not already matched exactly.
    pub auto_receptors: bool,
    /// Re-estimate goal values from observed need changes.
    pub learn_goal_values: bool,
    /// Node visits allowed per parasite check.
    pub parasite_search_budget: usize,
}

impl Default for MonaConfig {
    fn default() -> Self {
        Self {
            num_sensors: 1,
            max_response: 0,
            num_needs: 1,
            num_event_timers: 1,
            seed: Self::DEFAULT_SEED,

            max_need: 10.0,
            min_motive: 0.001,
            max_goal_value_events: 20,

            max_enablement: 1.0,
            min_enablement: 0.05,
            new_enablement: 0.075,
            drive_attenuation: 0.99,
            wager_history_update_velocity: 0.25,
            min_wager_weight: 0.01,

            max_mediators: 400,
            max_mediator_level: 1,
            max_mediator_causes: 3,
            max_mediator_events: 40,
            max_mediator_skew: 0,

            motive_learning_damper: 0.001,
            strength_learning_damper: 0.1,
            enablement_learning_damper: 0.1,
            expiring_enablement_learning_damper: 1.0,

            expiration_weight: 1.0,
            response_expiration_weight: 1.0,
            residual_response_randomness: 0.001,

            structural_learning: true,
            auto_receptors: true,
            learn_goal_values: false,
            parasite_search_budget: 4096,
        }
    }
}

impl MonaConfig {
    pub const DEFAULT_SEED: u64 = 4517;

    pub fn with_size(num_sensors: usize, max_response: usize, num_needs: usize) -> Self {
        Self {
            num_sensors,
            max_response,
            num_needs,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_event_timers(mut self, num_event_timers: usize) -> Self {
        self.num_event_timers = num_event_timers;
        self
    }

    pub fn with_max_mediators(mut self, max_mediators: usize) -> Self {
        self.max_mediators = max_mediators;
        self
    }

    /// Parse a JSON object of overrides; absent fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, MonaError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), MonaError> {
        let bad = |msg| Err(MonaError::InvalidConfig(msg));
        if self.num_sensors == 0 {
            return bad("num_sensors must be >= 1");
        }
        if self.num_needs == 0 {
            return bad("num_needs must be >= 1");
        }
        if self.num_event_timers == 0 {
            return bad("num_event_timers must be >= 1");
        }
        if !self.max_need.is_finite() || self.max_need <= 0.0 {
            return bad("max_need must be finite and > 0");
        }
        if !self.max_enablement.is_finite() || self.max_enablement <= 0.0 {
            return bad("max_enablement must be finite and > 0");
        }
        if self.min_enablement < 0.0 || self.min_enablement > self.max_enablement {
            return bad("min_enablement must be in [0, max_enablement]");
        }
        if self.new_enablement < 0.0 || self.new_enablement > self.max_enablement {
            return bad("new_enablement must be in [0, max_enablement]");
        }
        if self.min_motive <= 0.0 {
            return bad("min_motive must be > 0");
        }
        if !(0.0..=1.0).contains(&self.drive_attenuation) {
            return bad("drive_attenuation must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.wager_history_update_velocity) {
            return bad("wager_history_update_velocity must be in [0, 1]");
        }
        if self.min_wager_weight <= 0.0 || self.min_wager_weight * self.num_event_timers as f64 > 1.0 {
            return bad("min_wager_weight must be > 0 and leave room for every timer");
        }
        if self.max_mediator_causes == 0 {
            return bad("max_mediator_causes must be >= 1");
        }
        if self.max_mediator_events < 2 {
            return bad("max_mediator_events must be >= 2");
        }
        if self.motive_learning_damper < 0.0
            || self.strength_learning_damper < 0.0
            || self.enablement_learning_damper < 0.0
            || self.expiring_enablement_learning_damper < 0.0
        {
            return bad("learning dampers must be >= 0");
        }
        if self.expiration_weight < 0.0 || self.response_expiration_weight < 0.0 {
            return bad("expiration weights must be >= 0");
        }
        if !(0.0..=1.0).contains(&self.residual_response_randomness) {
            return bad("residual_response_randomness must be in [0, 1]");
        }
        if self.max_goal_value_events == 0 {
            return bad("max_goal_value_events must be >= 1");
        }
        Ok(())
    }

    /// Upper bound of any motive: every need fully satisfied.
    pub fn max_motive(&self) -> f64 {
        self.num_needs as f64 * self.max_need
    }

    /// Number of learning-event timeline levels.
    pub fn timeline_levels(&self) -> usize {
        self.max_mediator_level + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = MonaConfig::with_size(4, 3, 1);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_motive(), 10.0);
        assert_eq!(cfg.timeline_levels(), 3);
    }

    #[test]
    fn rejects_zero_dimensions() {
        let cfg = MonaConfig {
            num_sensors: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(MonaError::InvalidConfig(_))));

        let cfg = MonaConfig::with_size(2, 1, 1).with_event_timers(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_enablement_out_of_range() {
        let cfg = MonaConfig {
            new_enablement: 2.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_overrides_keep_defaults() {
        let cfg = MonaConfig::from_json_str(r#"{"num_sensors": 3, "max_mediators": 50}"#)
            .expect("valid json config");
        assert_eq!(cfg.num_sensors, 3);
        assert_eq!(cfg.max_mediators, 50);
        assert_eq!(cfg.seed, MonaConfig::DEFAULT_SEED);

        assert!(MonaConfig::from_json_str(r#"{"num_needs": 0}"#).is_err());
        assert!(MonaConfig::from_json_str("not json").is_err());
    }
}
