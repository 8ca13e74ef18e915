//! The simulation kernel: owner of all state, driver of the tick loop.
//!
//! One tick runs a fixed phase sequence; every phase completes before
//! the next begins, and all stochastic phases draw from one master RNG
//! so a seed fully determines a run. External observers read state only
//! between ticks.

pub mod aggregates;
pub mod metrics;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::agent::store::AgentStore;
use crate::agent::{drift_belief, Agent};
use crate::belief::BeliefEngine;
use crate::core::config::{SimConfig, StartCondition};
use crate::core::error::Result;
use crate::core::rand_util;
use crate::core::types::{fast_tanh, AgentId, BeliefVec, BELIEF_DIMS};
use crate::demography::DemographyEngine;
use crate::economy::systems::dominant_pole_profile;
use crate::economy::EconomyEngine;
use crate::health::HealthModule;
use crate::kernel::aggregates::RegionalAggregates;
use crate::kernel::metrics::{compute_metrics, compute_statistics, Metrics, Statistics};
use crate::language::LanguageEngine;
use crate::migration::MigrationEngine;
use crate::network;
use crate::psychology::PsychologyModule;

const MIGRATION_INTERVAL: u64 = 10;
const RECONNECT_INTERVAL: u64 = 20;
const COMPACTION_INTERVAL: u64 = 25;
const LANGUAGE_INTERVAL: u64 = 50;
const ECONOMY_INTERVAL: u64 = 10;

/// Gentle per-pass drift economic conditions exert on beliefs.
const ECONOMIC_PRESSURE: f64 = 0.001;

pub struct Kernel {
    cfg: SimConfig,
    start_condition: StartCondition,
    generation: u64,
    rng: ChaCha8Rng,

    agents: Vec<Agent>,
    region_index: Vec<Vec<AgentId>>,
    store: AgentStore,

    beliefs: BeliefEngine,
    aggregates: RegionalAggregates,
    economy: EconomyEngine,
    demography: DemographyEngine,
    migration: MigrationEngine,
    language: LanguageEngine,
    health: HealthModule,
    psychology: PsychologyModule,
}

impl Kernel {
    pub fn new(cfg: SimConfig) -> Result<Self> {
        cfg.validate()?;
        let start_condition = resolve_start_condition(&cfg.start_condition);
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let economy = EconomyEngine::new(cfg.regions, cfg.population, start_condition, &mut rng);

        let mut kernel = Self {
            beliefs: BeliefEngine::new(&cfg),
            aggregates: RegionalAggregates::new(cfg.regions as usize),
            demography: DemographyEngine::new(
                cfg.ticks_per_year,
                cfg.max_age_years,
                cfg.region_capacity,
            ),
            migration: MigrationEngine::new(cfg.regions as usize, cfg.region_capacity),
            language: LanguageEngine::new(cfg.regions as usize),
            health: HealthModule::new(cfg.regions),
            psychology: PsychologyModule::new(cfg.regions),
            store: AgentStore::new(),
            agents: Vec::new(),
            region_index: vec![Vec::new(); cfg.regions as usize],
            generation: 0,
            start_condition,
            economy,
            rng,
            cfg,
        };
        kernel.populate();
        Ok(kernel)
    }

    /// Re-initialize with a new configuration. Identical configurations
    /// produce identical initial state.
    pub fn reset(&mut self, cfg: SimConfig) -> Result<()> {
        *self = Kernel::new(cfg)?;
        Ok(())
    }

    fn populate(&mut self) {
        let n = self.cfg.population;
        self.agents.clear();
        self.agents.reserve(n as usize);
        for members in &mut self.region_index {
            members.clear();
        }

        let age_boundaries = [0.0, 15.0, 30.0, 50.0, 70.0, 90.0];
        let age_weights = [0.20, 0.28, 0.26, 0.18, 0.08];

        for i in 0..n {
            let region = self.rng.gen_range(0..self.cfg.regions);
            let mut agent = Agent::blank(i, region);

            agent.age =
                rand_util::piecewise_constant(&mut self.rng, &age_boundaries, &age_weights)
                    as i32;
            agent.female = self.rng.gen_range(0.0..1.0) < 0.5;
            agent.fluency = 0.7 + 0.3 * (self.rng.gen_range(0.0..1.0) - 0.5);

            agent.openness = rand_util::normal_clamped(&mut self.rng, 0.5, 0.15, 0.0, 1.0);
            agent.conformity = rand_util::normal_clamped(&mut self.rng, 0.5, 0.15, 0.0, 1.0);
            agent.assertiveness =
                rand_util::normal_clamped(&mut self.rng, 0.5, 0.15, 0.0, 1.0);
            agent.sociality = rand_util::normal_clamped(&mut self.rng, 0.5, 0.15, 0.0, 1.0);

            // A thin seam of charismatic figures for movements to form
            // around.
            if i % 100 == 0 {
                agent.assertiveness = self.rng.gen_range(0.8..0.95);
            }

            for d in 0..BELIEF_DIMS {
                agent.x[d] = rand_util::normal(&mut self.rng, 0.0, 0.75);
                agent.b[d] = fast_tanh(agent.x[d]);
            }
            agent.refresh_norm();

            agent.m_comm = 1.0;
            agent.m_susceptibility = Agent::base_susceptibility(agent.openness);
            agent.m_mobility = Agent::base_mobility(agent.sociality);

            self.region_index[region as usize].push(i);
            self.agents.push(agent);
        }

        network::build_small_world(
            &mut self.agents,
            self.cfg.avg_connections,
            self.cfg.rewire_prob,
            &mut self.rng,
        );
        self.language
            .assign_by_geography(&mut self.agents, &self.economy, &mut self.rng);
        self.health.init_all(&mut self.agents, &mut self.rng);
        self.psychology.init_all(&mut self.agents, &mut self.rng);
        self.aggregates.rebuild(&self.agents);

        tracing::debug!(
            population = self.agents.len(),
            regions = self.cfg.regions,
            start = self.start_condition.name(),
            "kernel initialized"
        );
    }

    /// Advance the simulation one tick.
    pub fn step(&mut self) {
        // 1. Belief dynamics over the SoA snapshot.
        self.beliefs
            .update(&mut self.agents, &mut self.store, &self.region_index);

        // 2. Time advances.
        self.generation += 1;

        // 3. Demography.
        if self.cfg.demography_enabled {
            self.demography.step(
                self.generation,
                &mut self.agents,
                &mut self.region_index,
                &mut self.aggregates,
                &mut self.economy,
                &self.health,
                &self.psychology,
                self.language.region_base_dialects(),
                &mut self.rng,
            );

            // 4. Migration and network maintenance.
            if self.generation % MIGRATION_INTERVAL == 0 {
                self.migration.step(
                    self.generation,
                    &mut self.agents,
                    &mut self.region_index,
                    &mut self.aggregates,
                    &self.economy,
                    &mut self.rng,
                );
            }
            if self.generation % RECONNECT_INTERVAL == 0 {
                network::reconnect_isolated(
                    &mut self.agents,
                    &self.region_index,
                    &mut self.rng,
                );
            }

            // 5. Language dynamics.
            if self.generation % LANGUAGE_INTERVAL == 0 {
                self.language.update_prestige(
                    &mut self.agents,
                    &self.region_index,
                    &self.economy,
                    &mut self.rng,
                );
            }
        }

        // 6. Economy on refreshed aggregates, then its feedback.
        if self.generation % ECONOMY_INTERVAL == 0 {
            self.aggregates.rebuild(&self.agents);
            let profiles = self.regional_belief_profiles();
            let populations = self.aggregates.populations().to_vec();
            self.economy.update(
                &populations,
                &profiles,
                &self.agents,
                ECONOMY_INTERVAL as f64,
                self.cfg.ticks_per_year,
            );
            self.apply_economic_feedback();
        }

        // 7. Health, then psychology reading the fresh health state.
        self.health
            .update(&mut self.agents, &self.economy, &mut self.rng);
        self.psychology.update(&mut self.agents, &self.economy);

        // 8. Compaction.
        if self.generation % COMPACTION_INTERVAL == 0 {
            DemographyEngine::compact_dead(&mut self.agents, &mut self.region_index);
        }
    }

    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Dominant-pole belief profile per region, over alive residents.
    fn regional_belief_profiles(&self) -> Vec<BeliefVec> {
        self.region_index
            .iter()
            .map(|members| {
                dominant_pole_profile(
                    members
                        .iter()
                        .filter_map(|&id| self.agents.get(id as usize))
                        .filter(|a| a.alive)
                        .map(|a| &a.b),
                )
            })
            .collect()
    }

    /// Economic conditions bend beliefs and susceptibility: hardship
    /// radicalizes, inequality pushes toward equality, wealth defends
    /// hierarchy, and each economic system pulls ideology its own way.
    fn apply_economic_feedback(&mut self) {
        for agent in self.agents.iter_mut() {
            if !agent.alive {
                continue;
            }
            let region_id = agent.region;
            if region_id >= self.cfg.regions {
                continue;
            }
            let region = self.economy.region(region_id);
            let Some(econ) = self.economy.agent_opt(agent.id) else {
                continue;
            };

            agent.m_susceptibility = (Agent::base_susceptibility(agent.openness)
                * (1.0 + region.hardship))
                .clamp(0.4, 2.0);

            if econ.hardship > 0.5 {
                drift_belief(&mut agent.b[0], -ECONOMIC_PRESSURE * econ.hardship);
                drift_belief(&mut agent.b[2], -ECONOMIC_PRESSURE * econ.hardship);
            }
            if region.inequality > 0.4 {
                drift_belief(&mut agent.b[2], -ECONOMIC_PRESSURE * region.inequality);
            }
            if econ.wealth > 2.0 {
                drift_belief(&mut agent.b[0], ECONOMIC_PRESSURE * 0.5);
                drift_belief(&mut agent.b[2], ECONOMIC_PRESSURE * 0.5);
            }

            let system_pull = region.system.current.belief_drift();
            for d in 0..BELIEF_DIMS {
                drift_belief(&mut agent.b[d], ECONOMIC_PRESSURE * system_pull[d]);
            }

            if region.welfare < 0.5 {
                drift_belief(
                    &mut agent.b[1],
                    -ECONOMIC_PRESSURE * (0.5 - region.welfare),
                );
            }

            agent.refresh_norm();
        }
    }

    // ----- observation surface (read between ticks) -----

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn start_condition(&self) -> StartCondition {
        self.start_condition
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn region_index(&self) -> &[Vec<AgentId>] {
        &self.region_index
    }

    pub fn economy(&self) -> &EconomyEngine {
        &self.economy
    }

    pub fn economy_mut(&mut self) -> &mut EconomyEngine {
        &mut self.economy
    }

    pub fn language(&self) -> &LanguageEngine {
        &self.language
    }

    pub fn aggregates(&self) -> &RegionalAggregates {
        &self.aggregates
    }

    pub fn alive_count(&self) -> u32 {
        self.agents.iter().filter(|a| a.alive).count() as u32
    }

    /// Run a between-tick analysis that needs both the agent snapshot
    /// and the master RNG stream (e.g. clustering seeds).
    pub fn with_snapshot<T>(
        &mut self,
        f: impl FnOnce(&[Agent], u64, &mut ChaCha8Rng) -> T,
    ) -> T {
        f(&self.agents, self.generation, &mut self.rng)
    }

    pub fn compute_metrics(&self) -> Metrics {
        compute_metrics(&self.agents, &self.region_index, &self.economy)
    }

    pub fn statistics(&self) -> Statistics {
        compute_statistics(&self.agents, &self.region_index, &self.economy)
    }
}

fn resolve_start_condition(raw: &str) -> StartCondition {
    match StartCondition::parse(raw) {
        Some(condition) => condition,
        None => {
            tracing::warn!(name = raw, "unknown start condition, using baseline");
            StartCondition::Baseline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimConfig {
        SimConfig {
            population: 400,
            regions: 8,
            avg_connections: 6,
            seed: 7,
            ..SimConfig::default()
        }
    }

    #[test]
    fn invalid_config_fails_construction() {
        let cfg = SimConfig {
            population: 0,
            ..SimConfig::default()
        };
        assert!(Kernel::new(cfg).is_err());
    }

    #[test]
    fn region_index_partitions_alive_agents() {
        let mut kernel = Kernel::new(small_config()).unwrap();
        kernel.step_n(30);

        let mut seen = vec![0u32; kernel.agents().len()];
        for (r, members) in kernel.region_index().iter().enumerate() {
            for &id in members {
                let agent = &kernel.agents()[id as usize];
                assert_eq!(agent.region as usize, r);
                seen[id as usize] += 1;
            }
        }
        for agent in kernel.agents() {
            if agent.alive {
                assert_eq!(
                    seen[agent.id as usize], 1,
                    "agent {} appears {} times in the index",
                    agent.id, seen[agent.id as usize]
                );
            }
        }
    }

    #[test]
    fn beliefs_and_norms_hold_invariants_over_time() {
        let mut kernel = Kernel::new(small_config()).unwrap();
        kernel.step_n(60);
        for agent in kernel.agents().iter().filter(|a| a.alive) {
            let mut norm = 0.0;
            for d in 0..BELIEF_DIMS {
                assert!((-1.0..=1.0).contains(&agent.b[d]));
                assert!(agent.x[d].is_finite());
                norm += agent.b[d] * agent.b[d];
            }
            assert!((agent.b_norm_sq - norm).abs() < 1e-9);
        }
    }

    #[test]
    fn neighbor_lists_stay_sets_after_compaction() {
        let mut kernel = Kernel::new(small_config()).unwrap();
        kernel.step_n(50); // two compaction passes
        let n = kernel.agents().len();
        for agent in kernel.agents().iter().filter(|a| a.alive) {
            let mut seen = std::collections::HashSet::new();
            for &nid in &agent.neighbors {
                assert!((nid as usize) < n);
                assert_ne!(nid, agent.id);
                assert!(seen.insert(nid), "duplicate neighbor on {}", agent.id);
            }
        }
    }

    #[test]
    fn identical_seeds_stay_bitwise_identical() {
        let mut a = Kernel::new(small_config()).unwrap();
        let mut b = Kernel::new(small_config()).unwrap();
        a.step_n(35);
        b.step_n(35);

        assert_eq!(a.generation(), b.generation());
        assert_eq!(a.agents().len(), b.agents().len());
        for (x, y) in a.agents().iter().zip(b.agents()) {
            assert_eq!(x.alive, y.alive);
            assert_eq!(x.b, y.b);
            assert_eq!(x.x, y.x);
            assert_eq!(x.region, y.region);
            assert_eq!(x.neighbors, y.neighbors);
        }
        let ma = a.compute_metrics();
        let mb = b.compute_metrics();
        assert_eq!(ma.polarization_mean, mb.polarization_mean);
        assert_eq!(ma.global_welfare, mb.global_welfare);
    }

    #[test]
    fn reset_reproduces_initial_state() {
        let kernel_a = Kernel::new(small_config()).unwrap();
        let mut kernel_b = Kernel::new(small_config()).unwrap();
        kernel_b.step_n(10);
        kernel_b.reset(small_config()).unwrap();

        assert_eq!(kernel_b.generation(), 0);
        for (x, y) in kernel_a.agents().iter().zip(kernel_b.agents()) {
            assert_eq!(x.b, y.b);
            assert_eq!(x.neighbors, y.neighbors);
            assert_eq!(x.age, y.age);
        }
    }

    #[test]
    fn disabling_demography_freezes_population() {
        let cfg = SimConfig {
            demography_enabled: false,
            ..small_config()
        };
        let mut kernel = Kernel::new(cfg).unwrap();
        let before = kernel.agents().len();
        kernel.step_n(60);
        assert_eq!(kernel.agents().len(), before);
        assert!(kernel.agents().iter().all(|a| a.alive));
        // Ages never advance without the demography phase.
        assert!(kernel.agents().iter().all(|a| a.age <= 90));
    }

    #[test]
    fn susceptibility_stays_in_feedback_bounds() {
        let mut kernel = Kernel::new(small_config()).unwrap();
        kernel.step_n(20);
        for agent in kernel.agents().iter().filter(|a| a.alive) {
            assert!((0.4..=2.0).contains(&agent.m_susceptibility));
        }
    }

    #[test]
    fn metrics_ranges_are_sane() {
        let mut kernel = Kernel::new(small_config()).unwrap();
        kernel.step_n(40);
        let m = kernel.compute_metrics();
        assert!(m.polarization_mean >= 0.0);
        assert!(m.global_welfare >= 0.0);
        assert!((0.0..=1.0).contains(&m.global_inequality));
        assert!((0.0..=1.0).contains(&m.global_hardship));
        assert!((0.0..=1.0).contains(&m.avg_openness));

        let prices_ok = kernel.economy().regions().iter().all(|r| {
            r.prices.iter().all(|&p| (0.01..=100.0).contains(&p))
        });
        assert!(prices_ok);
    }
}
