//! Physical health: nutrition, infection, immunity.
//!
//! Regions expose a per-tick snapshot (nutrition from food production,
//! healthcare from welfare and services tech, infection pressure from
//! economic stress) and agents integrate against it. Infection is a
//! simple SIS process with waning immunity.

use rand::Rng;

use crate::agent::Agent;
use crate::core::types::{clamp01, Good, RegionId};
use crate::economy::EconomyEngine;

/// Baseline endemic disease parameters.
#[derive(Debug, Clone, Copy)]
pub struct Disease {
    pub infectivity: f64,
    pub mortality: f64,
    pub recovery: f64,
    pub immunity_boost: f64,
}

impl Default for Disease {
    fn default() -> Self {
        Self {
            infectivity: 0.25,
            mortality: 0.03,
            recovery: 0.04,
            immunity_boost: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegionalHealthSnapshot {
    pub nutrition: f64,
    pub healthcare: f64,
    pub infection_pressure: f64,
    pub avg_health: f64,
}

impl Default for RegionalHealthSnapshot {
    fn default() -> Self {
        Self {
            nutrition: 1.0,
            healthcare: 0.5,
            infection_pressure: 0.0,
            avg_health: 1.0,
        }
    }
}

pub struct HealthModule {
    snapshots: Vec<RegionalHealthSnapshot>,
    disease: Disease,
}

impl HealthModule {
    pub fn new(regions: u32) -> Self {
        Self {
            snapshots: vec![RegionalHealthSnapshot::default(); regions as usize],
            disease: Disease::default(),
        }
    }

    pub fn snapshot(&self, region: RegionId) -> RegionalHealthSnapshot {
        self.snapshots
            .get(region as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Seed an agent's health substate from its personality.
    pub fn init_agent<R: Rng>(&self, agent: &mut Agent, rng: &mut R) {
        let mut noise = |rng: &mut R| rng.gen_range(-0.05..0.05);
        agent.health.physical_health =
            clamp01(0.8 + 0.2 * agent.openness - 0.1 * agent.conformity + noise(rng));
        agent.health.nutrition = clamp01(0.8 + noise(rng));
        agent.health.age_decay = clamp01(0.2 + 0.6 * noise(rng));
        agent.health.infected = false;
        agent.health.immunity = clamp01(0.1 + 0.2 * agent.sociality + noise(rng));
    }

    pub fn init_all<R: Rng>(&self, agents: &mut [Agent], rng: &mut R) {
        for agent in agents.iter_mut() {
            self.init_agent(agent, rng);
        }
    }

    fn age_decay_rate(age_decay: f64) -> f64 {
        (0.005 + 0.01 * age_decay).clamp(0.0, 0.2)
    }

    /// Refresh the regional snapshots, then advance every alive agent's
    /// physical state one tick.
    pub fn update<R: Rng>(
        &mut self,
        agents: &mut [Agent],
        economy: &EconomyEngine,
        rng: &mut R,
    ) {
        let regions = self.snapshots.len();

        for r in 0..regions {
            let econ = economy.region(r as RegionId);
            let population = econ.population.max(1) as f64;
            let snapshot = &mut self.snapshots[r];

            snapshot.nutrition =
                clamp01(econ.production[Good::Food.index()] / population);
            snapshot.healthcare = clamp01(
                0.5 * econ.welfare + 0.5 * econ.tech_multipliers[Good::Services.index()],
            );

            // Infection-pressure weights shift with what a region is:
            // poor regions suffer hardship most, developed ones lean on
            // welfare, dense ones on sanitation (efficiency).
            let density = population / 500.0;
            let urbanization = density.min(1.0);
            let mut hardship_weight = (0.3 + 0.2 * (1.0 - econ.development)).max(0.05);
            let mut welfare_weight = (0.2 + 0.2 * econ.development).max(0.05);
            let mut efficiency_weight = (0.2 + 0.2 * urbanization).max(0.05);
            let total = hardship_weight + welfare_weight + efficiency_weight;
            hardship_weight /= total;
            welfare_weight /= total;
            efficiency_weight /= total;

            snapshot.infection_pressure = clamp01(
                hardship_weight * econ.hardship
                    + welfare_weight * (1.0 - econ.welfare)
                    + efficiency_weight * (1.0 - econ.efficiency),
            );
            snapshot.avg_health = 0.0;
        }

        let mut region_counts = vec![0u32; regions];

        for agent in agents.iter_mut() {
            if !agent.alive {
                continue;
            }
            let r = agent.region as usize;
            if r >= regions {
                continue;
            }
            let snapshot = self.snapshots[r];
            region_counts[r] += 1;

            let health = &mut agent.health;
            health.nutrition = 0.7 * health.nutrition + 0.3 * snapshot.nutrition;

            let decay = Self::age_decay_rate(health.age_decay);
            let disease_mortality = if health.infected {
                self.disease.mortality
            } else {
                0.0
            };
            let intervention = 0.02 + 0.1 * snapshot.healthcare;
            health.physical_health = clamp01(
                health.physical_health
                    * health.nutrition
                    * (1.0 - decay - disease_mortality)
                    + intervention,
            );

            if !health.infected {
                let p_infect = snapshot.infection_pressure
                    * (1.0 - health.physical_health)
                    * (1.0 - health.immunity);
                if rng.gen_range(0.0..1.0) < p_infect {
                    health.infected = true;
                }
            } else {
                let p_recover =
                    self.disease.recovery * (health.physical_health + snapshot.healthcare);
                if rng.gen_range(0.0..1.0) < p_recover {
                    health.infected = false;
                    health.immunity = clamp01(health.immunity + self.disease.immunity_boost);
                }
            }

            health.immunity = clamp01(health.immunity * 0.995);
            self.snapshots[r].avg_health += health.physical_health;
        }

        for (snapshot, &count) in self.snapshots.iter_mut().zip(&region_counts) {
            if count > 0 {
                snapshot.avg_health /= count as f64;
            } else {
                snapshot.avg_health = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StartCondition;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(n: u32, regions: u32) -> (Vec<Agent>, EconomyEngine, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        let agents: Vec<Agent> = (0..n).map(|i| Agent::blank(i, i % regions)).collect();
        let economy = EconomyEngine::new(regions, n, StartCondition::Baseline, &mut rng);
        (agents, economy, rng)
    }

    #[test]
    fn init_keeps_everything_in_unit_range() {
        let (mut agents, _, mut rng) = setup(500, 5);
        let module = HealthModule::new(5);
        module.init_all(&mut agents, &mut rng);
        for a in &agents {
            assert!((0.0..=1.0).contains(&a.health.physical_health));
            assert!((0.0..=1.0).contains(&a.health.nutrition));
            assert!((0.0..=1.0).contains(&a.health.immunity));
            assert!((0.0..=1.0).contains(&a.health.age_decay));
            assert!(!a.health.infected);
        }
    }

    #[test]
    fn update_preserves_unit_ranges() {
        let (mut agents, economy, mut rng) = setup(300, 3);
        let mut module = HealthModule::new(3);
        module.init_all(&mut agents, &mut rng);
        for _ in 0..100 {
            module.update(&mut agents, &economy, &mut rng);
        }
        for a in &agents {
            assert!((0.0..=1.0).contains(&a.health.physical_health));
            assert!((0.0..=1.0).contains(&a.health.nutrition));
            assert!((0.0..=1.0).contains(&a.health.immunity));
        }
    }

    #[test]
    fn high_pressure_region_sees_infections() {
        let (mut agents, mut economy, mut rng) = setup(400, 1);
        economy.region_mut(0).hardship = 1.0;
        economy.region_mut(0).welfare = 0.0;
        economy.region_mut(0).efficiency = 0.3;
        economy.region_mut(0).population = 400;
        // Fragile hosts.
        let mut module = HealthModule::new(1);
        module.init_all(&mut agents, &mut rng);
        for a in agents.iter_mut() {
            a.health.physical_health = 0.2;
            a.health.immunity = 0.0;
        }

        for _ in 0..50 {
            module.update(&mut agents, &economy, &mut rng);
        }
        let infected = agents.iter().filter(|a| a.health.infected).count();
        assert!(infected > 0, "pressure {} produced no infections",
            module.snapshot(0).infection_pressure);
    }

    #[test]
    fn recovery_grants_immunity() {
        let (mut agents, mut economy, mut rng) = setup(200, 1);
        economy.region_mut(0).welfare = 1.5;
        economy.region_mut(0).population = 200;
        let mut module = HealthModule::new(1);
        module.init_all(&mut agents, &mut rng);
        for a in agents.iter_mut() {
            a.health.infected = true;
            a.health.immunity = 0.0;
            a.health.physical_health = 0.9;
        }

        for _ in 0..200 {
            module.update(&mut agents, &economy, &mut rng);
        }
        let recovered_with_immunity = agents
            .iter()
            .filter(|a| !a.health.infected && a.health.immunity > 0.0)
            .count();
        assert!(recovered_with_immunity > 0);
    }

    #[test]
    fn immunity_wanes_without_exposure() {
        let (mut agents, mut economy, mut rng) = setup(10, 1);
        economy.region_mut(0).hardship = 0.0;
        economy.region_mut(0).welfare = 2.0;
        economy.region_mut(0).efficiency = 1.0;
        let mut module = HealthModule::new(1);
        module.init_all(&mut agents, &mut rng);
        for a in agents.iter_mut() {
            a.health.immunity = 1.0;
        }
        for _ in 0..300 {
            module.update(&mut agents, &economy, &mut rng);
        }
        for a in &agents {
            assert!(a.health.immunity < 0.5, "immunity {} did not decay", a.health.immunity);
        }
    }

    #[test]
    fn empty_region_snapshot_is_benign() {
        let (mut agents, economy, mut rng) = setup(10, 2);
        for a in agents.iter_mut() {
            a.region = 0;
        }
        let mut module = HealthModule::new(2);
        module.update(&mut agents, &economy, &mut rng);
        let empty = module.snapshot(1);
        assert_eq!(empty.avg_health, 1.0);
        assert!(empty.infection_pressure.is_finite());
    }
}
