//! Start-condition profiles.
//!
//! A profile sets the material starting point of a run: base development
//! and its jitter, per-good endowment multipliers, the default economic
//! system, and the log-normal wealth / normal productivity parameters
//! used when bootstrapping agents.

use crate::core::config::StartCondition;
use crate::core::types::GoodVec;
use crate::economy::systems::SystemKind;

#[derive(Debug, Clone)]
pub struct StartProfile {
    pub name: &'static str,
    pub base_development: f64,
    pub development_jitter: f64,
    pub endowment_multipliers: GoodVec,
    pub default_system: SystemKind,
    pub wealth_log_mean: f64,
    pub wealth_log_std: f64,
    pub productivity_mean: f64,
    pub productivity_std: f64,
}

impl StartProfile {
    pub fn resolve(condition: StartCondition) -> StartProfile {
        match condition {
            StartCondition::Baseline => StartProfile {
                name: "baseline",
                base_development: 0.8,
                development_jitter: 0.25,
                endowment_multipliers: [1.0, 1.0, 1.0, 0.85, 0.95],
                default_system: SystemKind::Mixed,
                wealth_log_mean: 0.1,
                wealth_log_std: 0.65,
                productivity_mean: 1.0,
                productivity_std: 0.25,
            },
            StartCondition::PostScarcity => StartProfile {
                name: "postscarcity",
                base_development: 2.4,
                development_jitter: 0.15,
                endowment_multipliers: [1.2, 1.1, 1.05, 1.35, 1.45],
                default_system: SystemKind::Cooperative,
                wealth_log_mean: 0.3,
                wealth_log_std: 0.35,
                productivity_mean: 1.2,
                productivity_std: 0.2,
            },
            StartCondition::Feudal => StartProfile {
                name: "feudal",
                base_development: 0.35,
                development_jitter: 0.08,
                endowment_multipliers: [1.4, 0.6, 0.4, 0.2, 0.25],
                default_system: SystemKind::Feudal,
                wealth_log_mean: -0.7,
                wealth_log_std: 1.05,
                productivity_mean: 0.75,
                productivity_std: 0.35,
            },
            StartCondition::Industrial => StartProfile {
                name: "industrial",
                base_development: 1.4,
                development_jitter: 0.30,
                endowment_multipliers: [0.9, 1.25, 1.35, 0.9, 0.95],
                default_system: SystemKind::Market,
                wealth_log_mean: 0.15,
                wealth_log_std: 0.55,
                productivity_mean: 1.1,
                productivity_std: 0.35,
            },
            StartCondition::Crisis => StartProfile {
                name: "crisis",
                base_development: 0.6,
                development_jitter: 0.2,
                endowment_multipliers: [0.65, 0.7, 0.75, 0.55, 0.6],
                default_system: SystemKind::Mixed,
                wealth_log_mean: -0.2,
                wealth_log_std: 0.9,
                productivity_mean: 0.9,
                productivity_std: 0.4,
            },
        }
    }
}
