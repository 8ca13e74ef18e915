//! Belief dynamics.
//!
//! Two backends share the same contract: given the current snapshot of
//! all agents, produce each alive agent's next internal state. Deltas are
//! computed against the snapshot first and applied in a second pass, so
//! the result is invariant to how the delta pass is partitioned across
//! threads.
//!
//! The hybrid backend blends neighbor influence with a regional mean
//! field, keeping the update O(N + R) in influence lookups while
//! retaining local structure. The pairwise backend is the legacy
//! similarity-gated update kept for validation runs.

use rayon::prelude::*;

use crate::agent::store::{AgentStore, AgentView};
use crate::agent::Agent;
use crate::core::config::SimConfig;
use crate::core::types::{cosine_similarity, fast_tanh, BeliefVec, BELIEF_DIMS};

/// Below this population the delta pass runs sequentially; thread
/// fan-out costs more than it saves on small worlds.
const PARALLEL_THRESHOLD: usize = 1000;

/// Per-region mean belief field.
///
/// Field strength grows logarithmically with population and saturates at
/// 100 residents: small groups are noisy, large groups project a stable
/// field. Empty regions have a zero field and zero strength.
#[derive(Debug, Default)]
pub struct RegionalFields {
    fields: Vec<BeliefVec>,
    strengths: Vec<f64>,
    populations: Vec<u32>,
}

impl RegionalFields {
    pub fn new(regions: usize) -> Self {
        Self {
            fields: vec![[0.0; BELIEF_DIMS]; regions],
            strengths: vec![0.0; regions],
            populations: vec![0; regions],
        }
    }

    /// Rebuild all fields from the region index. Serial: the accumulation
    /// is O(N) adds and keeps the tick bitwise deterministic.
    pub fn compute(&mut self, agents: &[Agent], region_index: &[Vec<u32>]) {
        let regions = self.fields.len();
        for field in &mut self.fields {
            *field = [0.0; BELIEF_DIMS];
        }
        self.populations.iter_mut().for_each(|p| *p = 0);

        for (r, members) in region_index.iter().enumerate().take(regions) {
            for &id in members {
                let Some(agent) = agents.get(id as usize) else {
                    continue;
                };
                if !agent.alive {
                    continue;
                }
                for d in 0..BELIEF_DIMS {
                    self.fields[r][d] += agent.b[d];
                }
                self.populations[r] += 1;
            }
        }

        for r in 0..regions {
            let pop = self.populations[r];
            if pop > 0 {
                let inv = 1.0 / pop as f64;
                for d in 0..BELIEF_DIMS {
                    self.fields[r][d] *= inv;
                }
                self.strengths[r] = (((pop as f64) + 1.0).ln() / 100f64.ln()).min(1.0);
            } else {
                self.fields[r] = [0.0; BELIEF_DIMS];
                self.strengths[r] = 0.0;
            }
        }
    }

    #[inline]
    pub fn field(&self, region: u32) -> BeliefVec {
        self.fields
            .get(region as usize)
            .copied()
            .unwrap_or([0.0; BELIEF_DIMS])
    }

    #[inline]
    pub fn strength(&self, region: u32) -> f64 {
        self.strengths.get(region as usize).copied().unwrap_or(0.0)
    }

    pub fn population(&self, region: u32) -> u32 {
        self.populations.get(region as usize).copied().unwrap_or(0)
    }
}

/// Counters for locally recovered faults, reported once per tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct BeliefFaults {
    /// Agents whose internal state went non-finite and was reset.
    pub numeric_resets: u64,
    /// Agents skipped for an out-of-range region index.
    pub region_skips: u64,
}

pub struct BeliefEngine {
    step_size: f64,
    sim_floor: f64,
    hybrid: bool,
    fields: RegionalFields,
    faults: BeliefFaults,
}

impl BeliefEngine {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            step_size: cfg.step_size,
            sim_floor: cfg.sim_floor,
            hybrid: cfg.use_mean_field,
            fields: RegionalFields::new(cfg.regions as usize),
            faults: BeliefFaults::default(),
        }
    }

    pub fn faults(&self) -> BeliefFaults {
        self.faults
    }

    pub fn fields(&self) -> &RegionalFields {
        &self.fields
    }

    /// Advance every alive agent's beliefs by one step.
    ///
    /// The SoA store is refreshed from canonical state, the delta pass
    /// runs over its view, and new state is written back to the agents
    /// (and mirrored into the store again) before returning.
    pub fn update(
        &mut self,
        agents: &mut [Agent],
        store: &mut AgentStore,
        region_index: &[Vec<u32>],
    ) {
        store.sync_from_agents(agents);
        let deltas = {
            let view = store.view();
            if self.hybrid {
                self.fields.compute(agents, region_index);
                self.hybrid_deltas(&view)
            } else {
                self.pairwise_deltas(&view)
            }
        };
        self.apply(agents, &deltas);
        store.sync_from_agents(agents);
    }

    /// Hybrid influence: per-neighbor weighted mean blended with the
    /// regional field by a conformity-derived weight.
    fn hybrid_deltas(&mut self, view: &AgentView<'_>) -> Vec<BeliefVec> {
        let n = view.count;
        let step_size = self.step_size;
        let fields = &self.fields;

        let per_agent = |i: usize| -> BeliefVec {
            if !view.is_alive(i) {
                return [0.0; BELIEF_DIMS];
            }
            let region = view.region[i];
            if region as usize >= fields.fields.len() {
                return [f64::NAN; BELIEF_DIMS]; // flagged as skip in apply
            }

            let my_b = view.beliefs_of(i);
            let my_norm_sq: f64 = my_b.iter().map(|v| v * v).sum();
            let my_lang = view.primary_lang[i];

            let mut weighted_sum = [0.0f64; BELIEF_DIMS];
            let mut total_weight = 0.0f64;
            let mut alive_neighbors = 0u32;

            for &j in view.neighbors(i) {
                let j = j as usize;
                if j >= n || !view.is_alive(j) {
                    continue;
                }
                let nb = view.beliefs_of(j);
                let nb_norm_sq: f64 = nb.iter().map(|v| v * v).sum();
                let sim = cosine_similarity(&my_b, my_norm_sq, &nb, nb_norm_sq);
                let lang_bonus = if view.primary_lang[j] == my_lang { 1.3 } else { 1.0 };
                let w = lang_bonus * (0.5 + 0.5 * sim);
                for d in 0..BELIEF_DIMS {
                    weighted_sum[d] += w * nb[d];
                }
                total_weight += w;
                alive_neighbors += 1;
            }

            let field = fields.fields[region as usize];
            let strength = fields.strengths[region as usize];
            let field_pull = [
                field[0] * strength,
                field[1] * strength,
                field[2] * strength,
                field[3] * strength,
            ];

            // Conformists weight the regional field over their immediate
            // circle; thin circles (< 2 alive neighbors) always do.
            let mut alpha = (0.6 - 0.2 * view.conformity[i]).clamp(0.2, 0.8);
            if alive_neighbors < 2 {
                alpha = 0.2;
            }

            let mut influence = [0.0f64; BELIEF_DIMS];
            for d in 0..BELIEF_DIMS {
                let neighbor_term = if total_weight > 0.0 {
                    weighted_sum[d] / total_weight
                } else {
                    field_pull[d]
                };
                influence[d] = alpha * neighbor_term + (1.0 - alpha) * field_pull[d];
            }

            let rate = step_size
                * view.comm[i]
                * view.susceptibility[i]
                * (0.7 + 0.6 * view.openness[i]);

            let mut dx = [0.0f64; BELIEF_DIMS];
            for d in 0..BELIEF_DIMS {
                dx[d] = rate * fast_tanh(influence[d] - my_b[d]);
            }
            dx
        };

        if n >= PARALLEL_THRESHOLD {
            (0..n).into_par_iter().map(per_agent).collect()
        } else {
            (0..n).map(per_agent).collect()
        }
    }

    /// Legacy pairwise update: similarity-gated, language-attenuated
    /// diffusion along edges.
    fn pairwise_deltas(&self, view: &AgentView<'_>) -> Vec<BeliefVec> {
        let n = view.count;
        let step_size = self.step_size;
        let sim_floor = self.sim_floor;

        let per_agent = |i: usize| -> BeliefVec {
            if !view.is_alive(i) {
                return [0.0; BELIEF_DIMS];
            }
            let my_b = view.beliefs_of(i);
            let my_norm_sq: f64 = my_b.iter().map(|v| v * v).sum();
            let my_lang = view.primary_lang[i];
            let my_comm = view.comm[i];
            let my_susceptibility = view.susceptibility[i];
            let my_fluency = view.fluency[i];

            let mut acc = [0.0f64; BELIEF_DIMS];
            for &j in view.neighbors(i) {
                let j = j as usize;
                if j >= n || !view.is_alive(j) {
                    continue;
                }
                let nb = view.beliefs_of(j);
                let nb_norm_sq: f64 = nb.iter().map(|v| v * v).sum();
                let sim = cosine_similarity(&my_b, my_norm_sq, &nb, nb_norm_sq);
                let gate = ((sim - sim_floor) / (1.0 - sim_floor)).max(0.0);
                if gate <= 0.0 {
                    continue;
                }
                let lang_quality = if view.primary_lang[j] == my_lang {
                    0.5 * (my_fluency + view.fluency[j])
                } else {
                    0.1
                };
                let comm = 0.5 * (my_comm + view.comm[j]);
                let weight = step_size * gate * lang_quality * comm * my_susceptibility;
                for d in 0..BELIEF_DIMS {
                    acc[d] += weight * fast_tanh(nb[d] - my_b[d]);
                }
            }
            acc
        };

        if n >= PARALLEL_THRESHOLD {
            (0..n).into_par_iter().map(per_agent).collect()
        } else {
            (0..n).map(per_agent).collect()
        }
    }

    /// Second pass: fold deltas into internal state and re-derive the
    /// observable vector. Non-finite results reset the agent to neutral.
    fn apply(&mut self, agents: &mut [Agent], deltas: &[BeliefVec]) {
        let mut numeric_resets = 0u64;
        let mut region_skips = 0u64;

        for (agent, dx) in agents.iter_mut().zip(deltas) {
            if !agent.alive {
                continue;
            }
            if dx[0].is_nan() {
                // Out-of-range region flagged by the delta pass.
                region_skips += 1;
                continue;
            }
            for d in 0..BELIEF_DIMS {
                agent.x[d] += dx[d];
                agent.b[d] = fast_tanh(agent.x[d]);
            }
            agent.refresh_norm();

            let finite = agent.x.iter().all(|v| v.is_finite()) && agent.b_norm_sq.is_finite();
            if !finite {
                agent.reset_beliefs();
                numeric_resets += 1;
            }
        }

        if numeric_resets > 0 {
            tracing::warn!(count = numeric_resets, "reset non-finite belief state");
        }
        self.faults.numeric_resets += numeric_resets;
        self.faults.region_skips += region_skips;
    }
}
