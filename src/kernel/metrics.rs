//! Global metrics and the detailed statistics snapshot.

use serde::Serialize;

use crate::agent::Agent;
use crate::core::types::{dist, AgentId, BeliefVec, BELIEF_DIMS};
use crate::economy::EconomyEngine;
use crate::language::LANGUAGE_FAMILIES;

/// Lightweight per-tick metrics, cheap enough for CSV logging.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    pub polarization_mean: f64,
    pub polarization_std: f64,
    pub avg_openness: f64,
    pub avg_conformity: f64,
    pub global_welfare: f64,
    pub global_inequality: f64,
    pub global_hardship: f64,
}

/// Detailed snapshot for the `stats` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total_agents: u32,
    pub alive_agents: u32,

    // Age buckets
    pub children: u32,     // 0-14
    pub young_adults: u32, // 15-29
    pub middle_age: u32,   // 30-49
    pub mature: u32,       // 50-69
    pub elderly: u32,      // 70+
    pub avg_age: f64,
    pub min_age: i32,
    pub max_age: i32,

    pub males: u32,
    pub females: u32,

    pub avg_connections: f64,
    pub isolated_agents: u32,

    pub polarization_mean: f64,
    pub polarization_std: f64,
    pub avg_beliefs: BeliefVec,

    pub occupied_regions: u32,
    pub avg_region_population: f64,
    pub min_region_population: u32,
    pub max_region_population: u32,

    pub global_welfare: f64,
    pub global_inequality: f64,
    pub avg_income: f64,

    pub lang_counts: [u32; LANGUAGE_FAMILIES],
}

/// Mean and standard deviation of pairwise distances between non-empty
/// regional belief centroids.
pub fn polarization(agents: &[Agent], region_index: &[Vec<AgentId>]) -> (f64, f64) {
    let mut centroids: Vec<BeliefVec> = Vec::new();
    for members in region_index {
        let mut sum = [0.0f64; BELIEF_DIMS];
        let mut count = 0usize;
        for &id in members {
            let Some(agent) = agents.get(id as usize) else {
                continue;
            };
            if !agent.alive {
                continue;
            }
            for d in 0..BELIEF_DIMS {
                sum[d] += agent.b[d];
            }
            count += 1;
        }
        if count > 0 {
            let inv = 1.0 / count as f64;
            for v in &mut sum {
                *v *= inv;
            }
            centroids.push(sum);
        }
    }

    if centroids.len() < 2 {
        return (0.0, 0.0);
    }

    let mut dists = Vec::with_capacity(centroids.len() * (centroids.len() - 1) / 2);
    for i in 0..centroids.len() {
        for j in (i + 1)..centroids.len() {
            dists.push(dist(&centroids[i], &centroids[j]));
        }
    }

    let n = dists.len() as f64;
    let mean = dists.iter().sum::<f64>() / n;
    let variance = dists.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

pub fn compute_metrics(
    agents: &[Agent],
    region_index: &[Vec<AgentId>],
    economy: &EconomyEngine,
) -> Metrics {
    let (polarization_mean, polarization_std) = polarization(agents, region_index);

    let mut openness = 0.0;
    let mut conformity = 0.0;
    let mut alive = 0usize;
    for agent in agents.iter().filter(|a| a.alive) {
        openness += agent.openness;
        conformity += agent.conformity;
        alive += 1;
    }
    if alive > 0 {
        openness /= alive as f64;
        conformity /= alive as f64;
    }

    Metrics {
        polarization_mean,
        polarization_std,
        avg_openness: openness,
        avg_conformity: conformity,
        global_welfare: economy.global_welfare(),
        global_inequality: economy.global_inequality(),
        global_hardship: economy.global_hardship(),
    }
}

pub fn compute_statistics(
    agents: &[Agent],
    region_index: &[Vec<AgentId>],
    economy: &EconomyEngine,
) -> Statistics {
    let mut stats = Statistics {
        total_agents: agents.len() as u32,
        min_age: i32::MAX,
        ..Statistics::default()
    };

    let mut age_sum: i64 = 0;
    let mut connection_sum: u64 = 0;
    let mut belief_sum = [0.0f64; BELIEF_DIMS];
    let mut income_sum = 0.0;
    let mut region_pops = vec![0u32; region_index.len()];

    for agent in agents.iter().filter(|a| a.alive) {
        stats.alive_agents += 1;

        age_sum += agent.age as i64;
        stats.min_age = stats.min_age.min(agent.age);
        stats.max_age = stats.max_age.max(agent.age);
        match agent.age {
            0..=14 => stats.children += 1,
            15..=29 => stats.young_adults += 1,
            30..=49 => stats.middle_age += 1,
            50..=69 => stats.mature += 1,
            _ => stats.elderly += 1,
        }

        if agent.female {
            stats.females += 1;
        } else {
            stats.males += 1;
        }

        connection_sum += agent.neighbors.len() as u64;
        if agent.neighbors.is_empty() {
            stats.isolated_agents += 1;
        }

        for d in 0..BELIEF_DIMS {
            belief_sum[d] += agent.b[d];
        }

        if (agent.region as usize) < region_pops.len() {
            region_pops[agent.region as usize] += 1;
        }
        stats.lang_counts[(agent.primary_lang as usize).min(LANGUAGE_FAMILIES - 1)] += 1;

        if let Some(econ) = economy.agent_opt(agent.id) {
            income_sum += econ.income;
        }
    }

    if stats.alive_agents > 0 {
        let alive = stats.alive_agents as f64;
        stats.avg_age = age_sum as f64 / alive;
        stats.avg_connections = connection_sum as f64 / alive;
        for d in 0..BELIEF_DIMS {
            stats.avg_beliefs[d] = belief_sum[d] / alive;
        }
        stats.avg_income = income_sum / alive;
    } else {
        stats.min_age = 0;
    }

    let (pol_mean, pol_std) = polarization(agents, region_index);
    stats.polarization_mean = pol_mean;
    stats.polarization_std = pol_std;

    let mut min_pop = u32::MAX;
    let mut max_pop = 0u32;
    for &pop in &region_pops {
        if pop > 0 {
            stats.occupied_regions += 1;
            min_pop = min_pop.min(pop);
            max_pop = max_pop.max(pop);
        }
    }
    if stats.occupied_regions > 0 {
        stats.avg_region_population =
            stats.alive_agents as f64 / stats.occupied_regions as f64;
        stats.min_region_population = min_pop;
        stats.max_region_population = max_pop;
    }

    stats.global_welfare = economy.global_welfare();
    stats.global_inequality = economy.global_inequality();

    stats
}
