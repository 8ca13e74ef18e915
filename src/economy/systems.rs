//! Emergent economic systems.
//!
//! Each region carries a small state machine: beliefs and material
//! conditions classify an *ideal* system, and sustained pressure — not a
//! single threshold crossing — moves the region there. Institutional
//! inertia damps both accumulation and contraction of the pressure
//! counter, so transitions debounce instead of snapping.

use serde::{Deserialize, Serialize};

use crate::core::types::{BeliefVec, BELIEF_DIMS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    Market,
    Planned,
    Mixed,
    Feudal,
    Cooperative,
}

impl SystemKind {
    pub fn name(self) -> &'static str {
        match self {
            SystemKind::Market => "market",
            SystemKind::Planned => "planned",
            SystemKind::Mixed => "mixed",
            SystemKind::Feudal => "feudal",
            SystemKind::Cooperative => "cooperative",
        }
    }

    /// Ideological pull a system exerts on its residents' beliefs,
    /// applied by the kernel's economic-feedback pass.
    pub fn belief_drift(self) -> BeliefVec {
        match self {
            SystemKind::Market => [-0.3, 0.0, 0.2, 0.0],
            SystemKind::Planned => [0.3, 0.0, -0.3, 0.0],
            SystemKind::Feudal => [0.0, 0.4, 0.4, 0.0],
            SystemKind::Cooperative => [-0.2, 0.0, -0.3, 0.0],
            SystemKind::Mixed => [0.0; BELIEF_DIMS],
        }
    }
}

/// Per-dimension dominant-pole profile of a population's beliefs.
///
/// A plain mean cancels opposing factions; system selection instead
/// listens to the louder side. For each dimension, members above +0.1
/// and below −0.1 are averaged separately; the side whose count·|mean|
/// is at least 20% larger wins and contributes its signed mean. When
/// neither side dominates, the overall mean stands.
pub fn dominant_pole_profile<'a, I>(beliefs: I) -> BeliefVec
where
    I: Iterator<Item = &'a BeliefVec>,
{
    let mut pos_sum = [0.0f64; BELIEF_DIMS];
    let mut pos_count = [0u32; BELIEF_DIMS];
    let mut neg_sum = [0.0f64; BELIEF_DIMS];
    let mut neg_count = [0u32; BELIEF_DIMS];
    let mut all_sum = [0.0f64; BELIEF_DIMS];
    let mut total = 0u32;

    for b in beliefs {
        total += 1;
        for d in 0..BELIEF_DIMS {
            all_sum[d] += b[d];
            if b[d] > 0.1 {
                pos_sum[d] += b[d];
                pos_count[d] += 1;
            } else if b[d] < -0.1 {
                neg_sum[d] += b[d];
                neg_count[d] += 1;
            }
        }
    }

    let mut profile = [0.0f64; BELIEF_DIMS];
    if total == 0 {
        return profile;
    }

    for d in 0..BELIEF_DIMS {
        // count·|mean| reduces to |sum|.
        let pos_mass = pos_sum[d].abs();
        let neg_mass = neg_sum[d].abs();
        profile[d] = if pos_mass >= neg_mass * 1.2 && pos_count[d] > 0 {
            pos_sum[d] / pos_count[d] as f64
        } else if neg_mass >= pos_mass * 1.2 && neg_count[d] > 0 {
            neg_sum[d] / neg_count[d] as f64
        } else {
            all_sum[d] / total as f64
        };
    }
    profile
}

/// Map a belief profile and material conditions to the system the region
/// is drifting toward.
pub fn classify_ideal_system(
    profile: &BeliefVec,
    development: f64,
    hardship: f64,
    inequality: f64,
) -> SystemKind {
    let authority = profile[0];
    let hierarchy = profile[2];

    // Subsistence economies organize around tradition or commons.
    if development < 0.5 {
        if hierarchy > 0.3 && authority > 0.2 {
            return SystemKind::Feudal;
        }
        return SystemKind::Cooperative;
    }

    // Misery plus egalitarian beliefs demands central redistribution.
    if hardship > 0.5 && inequality > 0.4 && hierarchy < -0.2 {
        return SystemKind::Planned;
    }

    if development > 1.5 && authority < -0.3 && hierarchy < -0.3 {
        return SystemKind::Cooperative;
    }
    if development > 1.0 && authority < -0.2 && hierarchy > 0.1 {
        return SystemKind::Market;
    }
    if development > 1.0 && authority > 0.3 && hierarchy < 0.0 {
        return SystemKind::Planned;
    }

    SystemKind::Mixed
}

/// Inputs the pressure model reads each economy pass.
#[derive(Debug, Clone, Copy)]
pub struct PressureInputs {
    pub hardship: f64,
    pub welfare: f64,
    pub inequality: f64,
}

/// Per-region hysteresis state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemState {
    pub current: SystemKind,
    pub pending: Option<SystemKind>,
    pub pressure_ticks: f64,
    pub years_in_current: f64,
    pub inertia: f64,
    pub stability: f64,
}

impl SystemState {
    pub fn new(initial: SystemKind) -> Self {
        Self {
            current: initial,
            pending: None,
            pressure_ticks: 0.0,
            years_in_current: 0.0,
            inertia: 0.5,
            stability: 1.0,
        }
    }

    /// Pressure-tick threshold grows with tenure: entrenched systems
    /// take longer to displace, capped at 200.
    pub fn switch_threshold(&self) -> f64 {
        (50.0 + 0.5 * self.years_in_current).min(200.0)
    }

    /// Advance the state machine by `ticks` simulation ticks toward
    /// `ideal`. Returns true when the region switches systems.
    pub fn advance(
        &mut self,
        ideal: SystemKind,
        inputs: PressureInputs,
        ticks: f64,
        years: f64,
    ) -> bool {
        self.years_in_current += years;

        if ideal == self.current {
            self.pending = None;
            self.stability = (self.stability + 0.02 * ticks).min(1.0);
            self.pressure_ticks = (self.pressure_ticks - ticks).max(0.0);
            self.inertia = (self.inertia + 0.002).min(1.0);
            return false;
        }

        if self.pending != Some(ideal) {
            if self.pending.is_some() {
                // The push changed direction: accumulated pressure for
                // the old target bleeds off, slower in rigid regions.
                self.pressure_ticks *= 0.5 + 0.5 * self.inertia;
            }
            self.pending = Some(ideal);
        }

        let pressure = (inputs.hardship - 0.3).max(0.0)
            + (inputs.welfare - 0.8).max(0.0)
            + (1.0 - self.stability).max(0.0)
            + (inputs.inequality - 0.4).max(0.0);

        let per_tick = if pressure > 0.5 {
            2.0
        } else if pressure > 0.2 {
            1.0
        } else {
            0.0
        };
        self.pressure_ticks += per_tick * ticks * (1.0 - self.inertia);

        if self.pressure_ticks >= self.switch_threshold() {
            self.current = ideal;
            self.pending = None;
            self.pressure_ticks = 0.0;
            self.years_in_current = 0.0;
            self.inertia *= 0.5;
            self.stability = 0.3;
            return true;
        }
        false
    }
}
