//! Migration: hardship pushes, attractive regions pull, and movers keep
//! only the slice of their network worth carrying.
//!
//! Attractiveness is refreshed at most every 50 ticks. Candidates are
//! filtered by effective mobility (age and network embeddedness damp the
//! base multiplier); destinations are sampled from the top of the
//! ranking and accepted only when the gain clears a personality-derived
//! threshold.

use rand::Rng;

use crate::agent::Agent;
use crate::core::types::{cosine_similarity, AgentId, RegionId};
use crate::economy::EconomyEngine;
use crate::kernel::aggregates::RegionalAggregates;

const ATTRACTIVENESS_REFRESH_TICKS: u64 = 50;
const TOP_DESTINATIONS: usize = 10;
const DESTINATION_SAMPLES: usize = 3;
const MIGRATION_BASE_RATE: f64 = 0.01;
const MOBILITY_FLOOR: f64 = 0.3;

pub struct MigrationEngine {
    region_capacity: f64,
    attractiveness: Vec<f64>,
    ranked: Vec<RegionId>,
    last_refresh: Option<u64>,
    total_migrations: u64,
}

impl MigrationEngine {
    pub fn new(regions: usize, region_capacity: f64) -> Self {
        Self {
            region_capacity,
            attractiveness: vec![0.0; regions],
            ranked: Vec::new(),
            last_refresh: None,
            total_migrations: 0,
        }
    }

    pub fn total_migrations(&self) -> u64 {
        self.total_migrations
    }

    pub fn attractiveness(&self, region: RegionId) -> f64 {
        self.attractiveness
            .get(region as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// welfare − 2·hardship + 0.2·development − crowding penalty.
    fn refresh_attractiveness(
        &mut self,
        generation: u64,
        aggregates: &RegionalAggregates,
        economy: &EconomyEngine,
    ) {
        if let Some(last) = self.last_refresh {
            if generation.saturating_sub(last) < ATTRACTIVENESS_REFRESH_TICKS {
                return;
            }
        }
        self.last_refresh = Some(generation);

        for r in 0..self.attractiveness.len() {
            let econ = economy.region(r as RegionId);
            let pop = aggregates.population(r as RegionId) as f64;
            let crowding = (pop / self.region_capacity - 1.0).max(0.0) * 0.5;
            self.attractiveness[r] =
                econ.welfare - 2.0 * econ.hardship + 0.2 * econ.development - crowding;
        }

        self.ranked = (0..self.attractiveness.len() as RegionId).collect();
        self.ranked.sort_by(|&a, &b| {
            self.attractiveness[b as usize]
                .partial_cmp(&self.attractiveness[a as usize])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Mobility after age and embeddedness discounts.
    pub fn effective_mobility(agent: &Agent) -> f64 {
        let age_modifier = if agent.age < 18 {
            0.1 + 0.05 * agent.age as f64
        } else if agent.age > 60 {
            (1.0 - 0.02 * (agent.age - 60) as f64).max(0.1)
        } else {
            1.0
        };
        let network_modifier = 1.0 - (0.02 * agent.neighbors.len() as f64).min(0.5);
        agent.m_mobility * age_modifier * network_modifier
    }

    /// Personal gain bar: closed-minded conformists demand more, and
    /// desperation lowers everyone's standards.
    fn move_threshold(agent: &Agent, hardship: f64) -> f64 {
        (0.1 + 0.3 * (1.0 - agent.openness) + 0.2 * agent.conformity) * (1.0 - 0.5 * hardship)
    }

    /// One migration pass. Returns the number of executed moves.
    pub fn step<R: Rng>(
        &mut self,
        generation: u64,
        agents: &mut [Agent],
        region_index: &mut [Vec<AgentId>],
        aggregates: &mut RegionalAggregates,
        economy: &EconomyEngine,
        rng: &mut R,
    ) -> u32 {
        self.refresh_attractiveness(generation, aggregates, economy);
        if self.ranked.is_empty() {
            return 0;
        }
        let top = &self.ranked[..self.ranked.len().min(TOP_DESTINATIONS)];
        let mut moves = 0u32;

        for i in 0..agents.len() {
            if !agents[i].alive {
                continue;
            }
            if Self::effective_mobility(&agents[i]) <= MOBILITY_FLOOR {
                continue;
            }

            let hardship = economy
                .agent_opt(agents[i].id)
                .map(|e| e.hardship)
                .unwrap_or(0.0);
            let probability = MIGRATION_BASE_RATE * hardship * agents[i].m_mobility;
            if rng.gen_range(0.0..1.0) >= probability {
                continue;
            }

            let origin = agents[i].region;
            if origin as usize >= self.attractiveness.len() {
                continue;
            }
            let origin_score = self.attractiveness[origin as usize];

            // Sample a few of the best regions; keep the biggest gain.
            let mut best: Option<(RegionId, f64)> = None;
            for _ in 0..DESTINATION_SAMPLES {
                let candidate = top[rng.gen_range(0..top.len())];
                if candidate == origin {
                    continue;
                }
                let gain = self.attractiveness[candidate as usize] - origin_score;
                if best.map(|(_, g)| gain > g).unwrap_or(true) {
                    best = Some((candidate, gain));
                }
            }
            let Some((destination, gain)) = best else {
                continue;
            };
            if gain <= Self::move_threshold(&agents[i], hardship) {
                continue;
            }

            self.execute_move(i, origin, destination, agents, region_index, aggregates);
            moves += 1;
        }

        self.total_migrations += moves as u64;
        moves
    }

    fn execute_move(
        &self,
        idx: usize,
        origin: RegionId,
        destination: RegionId,
        agents: &mut [Agent],
        region_index: &mut [Vec<AgentId>],
        aggregates: &mut RegionalAggregates,
    ) {
        let id = agents[idx].id;
        region_index[origin as usize].retain(|&a| a != id);
        region_index[destination as usize].push(id);
        let beliefs = agents[idx].b;
        aggregates.move_agent(origin, destination, &beliefs);
        agents[idx].region = destination;

        self.retain_network(idx, origin, destination, agents);
    }

    /// Keep the top-scoring fraction of the migrant's ties; distance and
    /// low sociality shrink what survives the move. At least one tie is
    /// always kept. Dropped edges are removed from both sides.
    fn retain_network(
        &self,
        idx: usize,
        origin: RegionId,
        destination: RegionId,
        agents: &mut [Agent],
    ) {
        let neighbor_ids = agents[idx].neighbors.clone();
        if neighbor_ids.len() <= 1 {
            return;
        }

        let mover = &agents[idx];
        let mut scored: Vec<(f64, AgentId)> = neighbor_ids
            .iter()
            .filter_map(|&nid| {
                let nb = agents.get(nid as usize)?;
                let cos =
                    cosine_similarity(&mover.b, mover.b_norm_sq, &nb.b, nb.b_norm_sq);
                let same_lang = if nb.primary_lang == mover.primary_lang {
                    0.2
                } else {
                    0.0
                };
                let location = if nb.region == destination {
                    0.3
                } else if nb.region == origin {
                    -0.1
                } else {
                    0.0
                };
                Some((0.5 * cos + same_lang + location + 0.2 * nb.sociality, nid))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let regions = self.attractiveness.len().max(1) as f64;
        let distance = (destination as f64 - origin as f64).abs() / regions;
        let fraction =
            (0.3 + 0.4 * agents[idx].sociality - 0.2 * distance).clamp(0.15, 0.85);
        let keep = ((scored.len() as f64 * fraction).floor() as usize).max(1);

        let dropped: Vec<AgentId> = scored[keep..].iter().map(|&(_, nid)| nid).collect();
        let mover_id = agents[idx].id;
        for nid in dropped {
            agents[idx].neighbors.retain(|&x| x != nid);
            if let Some(nb) = agents.get_mut(nid as usize) {
                nb.neighbors.retain(|&x| x != mover_id);
            }
        }
    }
}
