//! Simulation configuration with documented defaults.
//!
//! Validation happens once at kernel construction; a bad field is fatal
//! and names itself. Everything downstream may assume a valid config.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// Kernel configuration.
///
/// Defaults reproduce the reference scenario: 50 000 agents over 200
/// regions on a small-world graph with k=8 and 5% rewiring, seed 42.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of agents (≥ 1).
    pub population: u32,

    /// Number of regions in the grid (≥ 1).
    pub regions: u32,

    /// Mean connections per agent for the ring lattice. Rounded up to
    /// even during the network build.
    pub avg_connections: u32,

    /// Watts–Strogatz rewiring probability in [0, 1].
    pub rewire_prob: f64,

    /// Global belief adaptation coefficient.
    pub step_size: f64,

    /// Minimum similarity gate for the legacy pairwise belief mode.
    pub sim_floor: f64,

    /// Selects the belief backend: hybrid neighbor + regional-field
    /// influence (true, normative) or the legacy pairwise update (false).
    pub use_mean_field: bool,

    /// Master RNG seed. Two kernels with identical configs step
    /// identically.
    pub seed: u64,

    /// Economic starting profile. Unknown names warn and fall back to
    /// baseline.
    pub start_condition: String,

    /// Ticks per simulated year; ages increment on year boundaries.
    pub ticks_per_year: u32,

    /// Hard cap on lifespan in years.
    pub max_age_years: u32,

    /// Soft per-region population target used by migration crowding and
    /// fertility pressure.
    pub region_capacity: f64,

    /// Toggles demography, migration, and language phases.
    pub demography_enabled: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            population: 50_000,
            regions: 200,
            avg_connections: 8,
            rewire_prob: 0.05,
            step_size: 0.15,
            sim_floor: 0.05,
            use_mean_field: true,
            seed: 42,
            start_condition: "baseline".to_string(),
            ticks_per_year: 10,
            max_age_years: 90,
            region_capacity: 500.0,
            demography_enabled: true,
        }
    }
}

impl SimConfig {
    /// Validate for internal consistency. Called by the kernel at init;
    /// failure is fatal to the run.
    pub fn validate(&self) -> Result<()> {
        fn fail(field: &'static str, requirement: &'static str, value: String) -> SimError {
            SimError::InvalidConfig {
                field,
                requirement,
                value,
            }
        }

        if self.population == 0 {
            return Err(fail("population", "> 0", self.population.to_string()));
        }
        if self.regions == 0 {
            return Err(fail("regions", "> 0", self.regions.to_string()));
        }
        if !(0.0..=1.0).contains(&self.rewire_prob) {
            return Err(fail("rewire_prob", "in [0, 1]", self.rewire_prob.to_string()));
        }
        if self.ticks_per_year == 0 {
            return Err(fail("ticks_per_year", "> 0", self.ticks_per_year.to_string()));
        }
        if self.max_age_years == 0 {
            return Err(fail("max_age_years", "> 0", self.max_age_years.to_string()));
        }
        if self.region_capacity <= 0.0 {
            return Err(fail(
                "region_capacity",
                "> 0",
                self.region_capacity.to_string(),
            ));
        }
        Ok(())
    }
}

/// Named economic starting profile.
///
/// Accepts the canonical names plus the aliases users actually type;
/// anything else resolves to `Baseline` (the caller warns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartCondition {
    Baseline,
    PostScarcity,
    Feudal,
    Industrial,
    Crisis,
}

impl StartCondition {
    /// Parse a profile name, normalizing case and punctuation.
    /// Returns `None` for unrecognized names so the caller can warn
    /// before falling back to baseline.
    pub fn parse(raw: &str) -> Option<StartCondition> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "" | "baseline" => Some(StartCondition::Baseline),
            "postscarcity" | "abundance" | "utopia" => Some(StartCondition::PostScarcity),
            "feudal" | "agrarian" | "lowtech" => Some(StartCondition::Feudal),
            "industrial" | "industrializing" | "boom" => Some(StartCondition::Industrial),
            "crisis" | "collapse" | "depression" => Some(StartCondition::Crisis),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StartCondition::Baseline => "baseline",
            StartCondition::PostScarcity => "postscarcity",
            StartCondition::Feudal => "feudal",
            StartCondition::Industrial => "industrial",
            StartCondition::Crisis => "crisis",
        }
    }
}
