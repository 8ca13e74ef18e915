//! Births, deaths, aging, and dead-agent compaction.
//!
//! Mortality and fertility are annual curves converted to per-tick
//! probabilities, both modulated by regional conditions: development and
//! welfare suppress mortality; tradition raises fertility while
//! development, wealth, and crowding suppress it. Children inherit
//! traits and beliefs from their parents with Gaussian mutation and are
//! wired into their mother's corner of the network.

use rand::Rng;

use crate::agent::Agent;
use crate::core::rand_util;
use crate::core::types::{AgentId, BeliefVec, RegionId, BELIEF_DIMS};
use crate::economy::{EconomyEngine, RegionalEconomy};
use crate::health::HealthModule;
use crate::kernel::aggregates::RegionalAggregates;
use crate::psychology::PsychologyModule;

/// Annual fertility never exceeds this; anything higher is biologically
/// implausible.
const FERTILITY_ANNUAL_CAP: f64 = 0.15;

/// Counts for one demography step.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemographyReport {
    pub births: u32,
    pub deaths: u32,
}

pub struct DemographyEngine {
    ticks_per_year: u32,
    max_age_years: i32,
    region_capacity: f64,
    total_births: u64,
    total_deaths: u64,
}

impl DemographyEngine {
    pub fn new(ticks_per_year: u32, max_age_years: u32, region_capacity: f64) -> Self {
        Self {
            ticks_per_year,
            max_age_years: max_age_years as i32,
            region_capacity,
            total_births: 0,
            total_deaths: 0,
        }
    }

    pub fn total_births(&self) -> u64 {
        self.total_births
    }

    pub fn total_deaths(&self) -> u64 {
        self.total_deaths
    }

    /// Base annual mortality by age band.
    pub fn mortality_annual(age: i32) -> f64 {
        if age < 5 {
            0.01
        } else if age < 15 {
            0.001
        } else if age < 50 {
            0.002
        } else if age < 70 {
            0.01
        } else if age < 85 {
            0.05
        } else {
            0.15
        }
    }

    /// Base annual fertility for females by age.
    pub fn fertility_annual(age: i32) -> f64 {
        if age < 15 {
            0.0
        } else if age < 20 {
            0.05
        } else if age < 30 {
            0.12
        } else if age < 35 {
            0.10
        } else if age < 40 {
            0.05
        } else if age < 45 {
            0.02
        } else {
            0.0
        }
    }

    fn annual_to_tick(&self, annual: f64) -> f64 {
        1.0 - (1.0 - annual).powf(1.0 / self.ticks_per_year as f64)
    }

    /// Region-adjusted per-tick death probability. Development and
    /// welfare both push mortality down; infants gain twice the
    /// development benefit.
    pub fn mortality_per_tick(&self, age: i32, region: &RegionalEconomy) -> f64 {
        let base = Self::mortality_annual(age);
        let dev_scale = if age < 5 { 0.3 } else { 0.15 };
        let development_factor = 1.0 / (1.0 + region.development * dev_scale);
        let welfare_factor = 1.0 / region.welfare.max(0.5);
        let adjusted = (base * development_factor * welfare_factor).clamp(1e-4, 0.5);
        self.annual_to_tick(adjusted)
    }

    /// Region- and agent-adjusted per-tick birth probability.
    pub fn fertility_per_tick(
        &self,
        age: i32,
        region: &RegionalEconomy,
        wealth: f64,
        regional_tradition: f64,
        region_population: u32,
    ) -> f64 {
        let base = Self::fertility_annual(age);
        if base == 0.0 {
            return 0.0;
        }

        let tradition_factor = 1.0 + 0.2 * regional_tradition;
        let development_factor = 1.0 / (1.0 + 0.2 * region.development);

        // Demographic transition: in developed regions wealthier agents
        // trade quantity for quality.
        let wealth_factor = if region.development > 0.5 {
            let relative = (wealth / 1.0).clamp(0.5, 3.0);
            (1.5 / relative).sqrt()
        } else {
            1.0
        };

        // Delayed childbearing where development is high.
        let age_shift = if region.development > 1.0 && age < 25 {
            0.5 + 0.5 * (age as f64 / 25.0)
        } else {
            1.0
        };

        let annual = (base * tradition_factor * development_factor * wealth_factor * age_shift)
            .clamp(0.0, FERTILITY_ANNUAL_CAP);
        let mut per_tick = self.annual_to_tick(annual);

        per_tick *= 0.7 + 0.3 * (1.0 - region.hardship);

        let pop = region_population as f64;
        if pop > self.region_capacity {
            per_tick /= pop / self.region_capacity;
        }
        per_tick
    }

    /// One demography pass: age increments on year boundaries, mortality
    /// and fertility draws for everyone alive, then queued births are
    /// applied.
    #[allow(clippy::too_many_arguments)]
    pub fn step<R: Rng>(
        &mut self,
        generation: u64,
        agents: &mut Vec<Agent>,
        region_index: &mut [Vec<AgentId>],
        aggregates: &mut RegionalAggregates,
        economy: &mut EconomyEngine,
        health: &HealthModule,
        psychology: &PsychologyModule,
        region_base_dialects: &[u8],
        rng: &mut R,
    ) -> DemographyReport {
        let year_boundary = generation % self.ticks_per_year as u64 == 0;
        let mut report = DemographyReport::default();
        let mut birth_queue: Vec<AgentId> = Vec::new();

        for i in 0..agents.len() {
            if !agents[i].alive {
                continue;
            }

            if year_boundary {
                agents[i].age += 1;
                if agents[i].age > self.max_age_years {
                    self.kill(agents, i, aggregates);
                    report.deaths += 1;
                    continue;
                }
            }

            let region_id = agents[i].region;
            if region_id as usize >= region_index.len() {
                continue;
            }
            let region = economy.region(region_id);

            let p_death = self.mortality_per_tick(agents[i].age, region);
            if rng.gen_range(0.0..1.0) < p_death {
                self.kill(agents, i, aggregates);
                report.deaths += 1;
                continue;
            }

            if agents[i].female {
                let tradition = aggregates.centroid(region_id)[1];
                let wealth = economy
                    .agent_opt(agents[i].id)
                    .map(|e| e.wealth)
                    .unwrap_or(1.0);
                let p_birth = self.fertility_per_tick(
                    agents[i].age,
                    region,
                    wealth,
                    tradition,
                    aggregates.population(region_id),
                );
                if rng.gen_range(0.0..1.0) < p_birth {
                    birth_queue.push(i as AgentId);
                }
            }
        }

        for mother_id in birth_queue {
            self.create_child(
                mother_id,
                agents,
                region_index,
                aggregates,
                economy,
                health,
                psychology,
                region_base_dialects,
                rng,
            );
            report.births += 1;
        }

        self.total_births += report.births as u64;
        self.total_deaths += report.deaths as u64;
        report
    }

    fn kill(&self, agents: &mut [Agent], i: usize, aggregates: &mut RegionalAggregates) {
        let region = agents[i].region;
        let beliefs = agents[i].b;
        agents[i].alive = false;
        aggregates.remove_agent(region, &beliefs);
    }

    #[allow(clippy::too_many_arguments)]
    fn create_child<R: Rng>(
        &self,
        mother_id: AgentId,
        agents: &mut Vec<Agent>,
        region_index: &mut [Vec<AgentId>],
        aggregates: &mut RegionalAggregates,
        economy: &mut EconomyEngine,
        health: &HealthModule,
        psychology: &PsychologyModule,
        region_base_dialects: &[u8],
        rng: &mut R,
    ) {
        let mother_idx = mother_id as usize;
        if mother_idx >= agents.len() || !agents[mother_idx].alive {
            return;
        }

        let child_id = agents.len() as AgentId;
        let region: RegionId;
        let father_id: i32;
        let (mother_traits, mother_beliefs, mother_lang, mother_dialect, lineage);
        {
            let mother = &agents[mother_idx];
            region = mother.region;
            mother_traits = [
                mother.openness,
                mother.conformity,
                mother.assertiveness,
                mother.sociality,
            ];
            mother_beliefs = mother.b;
            mother_lang = mother.primary_lang;
            mother_dialect = mother.dialect;
            lineage = mother.lineage_id;

            father_id = if mother.neighbors.is_empty() {
                -1
            } else {
                let pick = mother.neighbors[rng.gen_range(0..mother.neighbors.len())];
                match agents.get(pick as usize) {
                    Some(candidate) if candidate.alive && !candidate.female => pick as i32,
                    _ => -1,
                }
            };
        }

        let father = if father_id >= 0 {
            agents.get(father_id as usize).cloned()
        } else {
            None
        };

        let mut child = Agent::blank(child_id, region);
        child.female = rng.gen_range(0.0..1.0) < 0.5;
        child.parent_a = mother_id as i32;
        child.parent_b = father_id;
        child.lineage_id = lineage;

        // Language: mother's family; dialect occasionally drifts toward
        // the regional baseline as the child grows up outside the home.
        child.primary_lang = mother_lang;
        child.dialect = if rng.gen_range(0.0..1.0) < 0.2 {
            region_base_dialects
                .get(region as usize)
                .copied()
                .unwrap_or(mother_dialect)
        } else {
            mother_dialect
        };
        child.fluency = 0.5;

        let father_traits = father
            .as_ref()
            .map(|f| [f.openness, f.conformity, f.assertiveness, f.sociality]);
        let inherit_trait = |rng: &mut R, m: f64, f: Option<f64>| {
            let base = match f {
                Some(ft) => 0.5 * (m + ft),
                None => m,
            };
            rand_util::normal_clamped(rng, base, 0.05, 0.0, 1.0)
        };
        child.openness = inherit_trait(rng, mother_traits[0], father_traits.map(|t| t[0]));
        child.conformity = inherit_trait(rng, mother_traits[1], father_traits.map(|t| t[1]));
        child.assertiveness = inherit_trait(rng, mother_traits[2], father_traits.map(|t| t[2]));
        child.sociality = inherit_trait(rng, mother_traits[3], father_traits.map(|t| t[3]));

        let mut beliefs: BeliefVec = [0.0; BELIEF_DIMS];
        for d in 0..BELIEF_DIMS {
            let base = match &father {
                Some(f) => 0.5 * (mother_beliefs[d] + f.b[d]),
                None => mother_beliefs[d],
            };
            beliefs[d] = (base + rand_util::normal(rng, 0.0, 0.2)).clamp(-1.0, 1.0);
        }
        child.set_beliefs_observable(beliefs);

        child.m_comm = 1.0;
        child.m_susceptibility = Agent::base_susceptibility(child.openness);
        child.m_mobility = Agent::base_mobility(child.sociality);
        health.init_agent(&mut child, rng);
        psychology.init_agent(&mut child, rng);

        // Family network: mother plus 1–3 of her circle, reciprocal.
        child.neighbors.push(mother_id);
        agents[mother_idx].neighbors.push(child_id);

        let mother_neighbors = agents[mother_idx].neighbors.clone();
        let inherited = rng.gen_range(1..=3).min(mother_neighbors.len());
        for _ in 0..inherited {
            let pick = mother_neighbors[rng.gen_range(0..mother_neighbors.len())];
            if pick != child_id
                && pick != mother_id
                && (pick as usize) < agents.len()
                && !child.neighbors.contains(&pick)
            {
                child.neighbors.push(pick);
                agents[pick as usize].neighbors.push(child_id);
            }
        }

        aggregates.add_agent(region, &child.b);
        region_index[region as usize].push(child_id);
        economy.add_agent(child_id, rng);
        agents.push(child);
    }

    /// Strip dead ids out of the region index and every neighbor list.
    /// Slots are preserved; only references disappear.
    pub fn compact_dead(agents: &mut [Agent], region_index: &mut [Vec<AgentId>]) {
        let alive: Vec<bool> = agents.iter().map(|a| a.alive).collect();
        for members in region_index.iter_mut() {
            members.retain(|&id| alive.get(id as usize).copied().unwrap_or(false));
        }
        for agent in agents.iter_mut() {
            if !agent.alive {
                continue;
            }
            agent
                .neighbors
                .retain(|&id| alive.get(id as usize).copied().unwrap_or(false));
        }
    }
}
