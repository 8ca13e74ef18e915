//! Regional economy: endowments, production, trade, prices, income
//! distribution, inequality, and emergent economic systems.
//!
//! The engine runs a fixed pipeline every economy pass:
//! specialization → development → systems → production → trade →
//! consumption → prices → income → welfare → inequality → hardship.
//! Regions are grid-placed economic units with heavily skewed endowments
//! so no region is self-sufficient; agents carry wealth, productivity,
//! and a production sector.

pub mod profiles;
pub mod systems;
pub mod trade;

use rand::Rng;

use crate::agent::Agent;
use crate::core::config::StartCondition;
use crate::core::rand_util;
use crate::core::types::{BeliefVec, Good, GoodVec, RegionId, GOOD_COUNT};
use crate::economy::profiles::StartProfile;
use crate::economy::systems::{
    classify_ideal_system, PressureInputs, SystemKind, SystemState,
};
use crate::economy::trade::TradeNetwork;

const SPECIALIZATION_RATE: f64 = 0.001;
const DEVELOPMENT_GROWTH_RATE: f64 = 0.01;
const DEVELOPMENT_DECAY_RATE: f64 = 0.005;
const TRADE_DIFFUSION_RATE: f64 = 0.15;
const WEALTH_FLOOR: f64 = 0.01;

/// Per-agent economic record, indexed by agent id.
#[derive(Debug, Clone)]
pub struct AgentEconomy {
    pub wealth: f64,
    pub income: f64,
    pub productivity: f64,
    pub sector: usize,
    pub hardship: f64,
}

impl Default for AgentEconomy {
    fn default() -> Self {
        Self {
            wealth: 1.0,
            income: 1.0,
            productivity: 1.0,
            sector: 0,
            hardship: 0.0,
        }
    }
}

/// Subsistence needs per capita, derived from geography and development.
#[derive(Debug, Clone, Copy)]
pub struct RegionalNeeds {
    pub food: f64,
    pub energy: f64,
    pub tools: f64,
    pub luxury: f64,
    pub services: f64,
}

impl RegionalNeeds {
    pub fn for_good(&self, good: Good) -> f64 {
        match good {
            Good::Food => self.food,
            Good::Energy => self.energy,
            Good::Tools => self.tools,
            Good::Luxury => self.luxury,
            Good::Services => self.services,
        }
    }

    /// Needs vary with place: cold latitudes eat and heat more,
    /// developed regions lean on tools and services, dense regions on
    /// services and status goods.
    pub fn compute(x: f64, y: f64, development: f64, density: f64) -> RegionalNeeds {
        let _ = x;
        let climate = (y - 0.5).abs() * 2.0;
        RegionalNeeds {
            food: 0.7 * (1.0 + climate * 0.3),
            energy: 0.35 * (1.0 + climate * 0.5),
            tools: 0.2 * (0.8 + development * 0.4),
            luxury: development * 0.15 + density * 0.05,
            services: 0.15 * (0.7 + density * 0.6),
        }
    }
}

/// One region's economic state.
#[derive(Debug, Clone)]
pub struct RegionalEconomy {
    pub id: RegionId,
    /// Normalized grid coordinates in [0, 1]².
    pub x: f64,
    pub y: f64,

    pub endowments: GoodVec,
    pub specialization: GoodVec,
    pub production: GoodVec,
    pub consumption: GoodVec,
    pub prices: GoodVec,
    pub trade_balance: GoodVec,
    pub tech_multipliers: GoodVec,

    pub population: u32,
    pub welfare: f64,
    pub inequality: f64,
    pub hardship: f64,
    pub development: f64,
    pub efficiency: f64,
    pub wealth_top_10: f64,
    pub wealth_bottom_50: f64,
    pub avg_wealth: f64,

    pub system: SystemState,
    pub trade_partners: Vec<RegionId>,
}

impl RegionalEconomy {
    fn new(id: RegionId, default_system: SystemKind) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            endowments: [1.0, 1.0, 1.0, 0.5, 0.5],
            specialization: [0.0; GOOD_COUNT],
            production: [0.0; GOOD_COUNT],
            consumption: [0.0; GOOD_COUNT],
            prices: [1.0; GOOD_COUNT],
            trade_balance: [0.0; GOOD_COUNT],
            tech_multipliers: [1.0; GOOD_COUNT],
            population: 0,
            welfare: 1.0,
            inequality: 0.0,
            hardship: 0.0,
            development: 0.0,
            efficiency: 1.0,
            wealth_top_10: 0.0,
            wealth_bottom_50: 0.0,
            avg_wealth: 1.0,
            system: SystemState::new(default_system),
            trade_partners: Vec::new(),
        }
    }

    pub fn needs(&self) -> RegionalNeeds {
        let density = self.population as f64 / 500.0;
        RegionalNeeds::compute(self.x, self.y, self.development, density)
    }

    /// Cost of the survival basket (food + energy) at local prices.
    pub fn essential_cost(&self) -> f64 {
        let needs = self.needs();
        needs.food * self.prices[Good::Food.index()]
            + needs.energy * self.prices[Good::Energy.index()]
    }
}

pub struct EconomyEngine {
    regions: Vec<RegionalEconomy>,
    agents: Vec<AgentEconomy>,
    trade: TradeNetwork,
    profile: StartProfile,
    war_allocation: f64,
    forced_model: Option<SystemKind>,
}

impl EconomyEngine {
    pub fn new<R: Rng>(
        num_regions: u32,
        num_agents: u32,
        condition: StartCondition,
        rng: &mut R,
    ) -> Self {
        let profile = StartProfile::resolve(condition);
        let mut engine = Self {
            regions: Vec::with_capacity(num_regions as usize),
            agents: Vec::with_capacity(num_agents as usize),
            trade: TradeNetwork::new(num_regions as usize),
            profile,
            war_allocation: 0.0,
            forced_model: None,
        };
        engine.init_regions(num_regions, rng);
        engine.init_endowments(rng);
        engine.init_trade_network();
        engine.init_agents(num_agents, rng);
        engine
    }

    fn init_regions<R: Rng>(&mut self, num_regions: u32, rng: &mut R) {
        let grid = (num_regions as f64).sqrt().ceil() as u32;
        for i in 0..num_regions {
            let mut region = RegionalEconomy::new(i, self.profile.default_system);
            let gx = i % grid;
            let gy = i / grid;
            let jitter_x: f64 = rng.gen_range(-0.3..0.3);
            let jitter_y: f64 = rng.gen_range(-0.3..0.3);
            region.x = ((gx as f64 + 0.5 + jitter_x * 0.5) / grid as f64).clamp(0.0, 1.0);
            region.y = ((gy as f64 + 0.5 + jitter_y * 0.5) / grid as f64).clamp(0.0, 1.0);

            let dev = self.profile.base_development
                + rand_util::normal(rng, 0.0, self.profile.development_jitter);
            region.development = dev.clamp(0.02, 5.0);
            self.regions.push(region);
        }
    }

    /// Skewed endowments: one abundant primary, one adequate secondary,
    /// 1–2 desperately scarce goods, with a chance to inherit a
    /// predecessor's abundance (resource zones cluster).
    fn init_endowments<R: Rng>(&mut self, rng: &mut R) {
        let n = self.regions.len();
        let mut primary = vec![0usize; n];
        let mut secondary = vec![0usize; n];
        for i in 0..n {
            primary[i] = rng.gen_range(0..GOOD_COUNT);
            loop {
                secondary[i] = rng.gen_range(0..GOOD_COUNT);
                if secondary[i] != primary[i] {
                    break;
                }
            }
        }

        for i in 0..n {
            for g in 0..GOOD_COUNT {
                self.regions[i].endowments[g] = 0.2 + rng.gen_range(0.0..1.0) * 0.2;
            }
            self.regions[i].endowments[primary[i]] = 2.0 + rng.gen_range(0.0..1.0) * 2.0;
            self.regions[i].endowments[secondary[i]] = 0.8 + rng.gen_range(0.0..1.0) * 0.8;

            if i > 0 && rng.gen_range(0.0..1.0) < 0.3 {
                let prev = self.regions[i - 1].endowments;
                for g in 0..GOOD_COUNT {
                    if prev[g] > 1.5 {
                        let inherited = prev[g] * (0.6 + rng.gen_range(0.0..1.0) * 0.3);
                        let e = &mut self.regions[i].endowments[g];
                        *e = e.max(inherited);
                    }
                }
            }

            let num_scarce = rng.gen_range(1..=2);
            let mut placed = 0;
            while placed < num_scarce {
                let g = rng.gen_range(0..GOOD_COUNT);
                if g == primary[i] || g == secondary[i] {
                    continue;
                }
                self.regions[i].endowments[g] = 0.05 + rng.gen_range(0.0..1.0) * 0.10;
                placed += 1;
            }

            for g in 0..GOOD_COUNT {
                self.regions[i].endowments[g] *= self.profile.endowment_multipliers[g];
                self.regions[i].specialization[g] = 0.0;
            }
        }
    }

    /// Partner lists by effective distance: central and developed
    /// regions carry more connections; endowment skew perturbs distances
    /// the way terrain and historical routes would.
    fn init_trade_network(&mut self) {
        let n = self.regions.len();
        let grid = (n as f64).sqrt().ceil();

        let mut partner_lists: Vec<Vec<RegionId>> = vec![Vec::new(); n];
        for i in 0..n {
            let row_i = (i as f64 / grid).floor();
            let col_i = i as f64 % grid;
            let centrality =
                1.0 - ((row_i - grid / 2.0).abs() + (col_i - grid / 2.0).abs()) / grid;

            let base_partners = 2 + (centrality * 8.0) as usize;
            let dev_bonus = (self.regions[i].development * 5.0) as usize;
            let max_partners = (base_partners + dev_bonus).min(n.saturating_sub(1));

            let mut by_distance: Vec<(f64, RegionId)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let row_j = (j as f64 / grid).floor();
                    let col_j = j as f64 % grid;
                    let dr = row_i - row_j;
                    let dc = col_i - col_j;
                    let mut dist = (dr * dr + dc * dc).sqrt();
                    dist *= 0.8 + self.regions[j].endowments[Good::Food.index()] * 0.4;
                    (dist, j as RegionId)
                })
                .collect();
            by_distance
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            partner_lists[i] = by_distance
                .into_iter()
                .take(max_partners)
                .map(|(_, j)| j)
                .collect();
            self.regions[i].trade_partners = partner_lists[i].clone();
        }

        self.trade.build_topology(&partner_lists);
    }

    fn init_agents<R: Rng>(&mut self, num_agents: u32, rng: &mut R) {
        for _ in 0..num_agents {
            let wealth = rand_util::log_normal(
                rng,
                self.profile.wealth_log_mean,
                self.profile.wealth_log_std,
            )
            .max(0.05);
            let productivity = rand_util::normal(
                rng,
                self.profile.productivity_mean,
                self.profile.productivity_std,
            )
            .clamp(0.2, 3.0);
            self.agents.push(AgentEconomy {
                wealth,
                income: 1.0,
                productivity,
                sector: rng.gen_range(0..GOOD_COUNT),
                hardship: 0.0,
            });
        }
    }

    /// Register a newborn. Children start with modest uniform wealth
    /// rather than the profile's log-normal draw.
    pub fn add_agent<R: Rng>(&mut self, agent_id: u32, rng: &mut R) {
        let id = agent_id as usize;
        if id >= self.agents.len() {
            self.agents.resize(id + 1, AgentEconomy::default());
        }
        self.agents[id] = AgentEconomy {
            wealth: rng.gen_range(0.5..1.5),
            income: 1.0,
            productivity: 1.0,
            sector: rng.gen_range(0..GOOD_COUNT),
            hardship: 0.0,
        };
    }

    /// Run one full economy pass.
    ///
    /// `belief_profiles` carries one dominant-pole profile per region;
    /// `interval_ticks` is the number of simulation ticks since the last
    /// pass (pressure and stability are per-tick rates).
    pub fn update(
        &mut self,
        region_populations: &[u32],
        belief_profiles: &[BeliefVec],
        agents: &[Agent],
        interval_ticks: f64,
        ticks_per_year: u32,
    ) {
        for (region, &pop) in self.regions.iter_mut().zip(region_populations) {
            region.population = pop;
        }

        self.evolve_specialization();
        self.evolve_development();
        self.evolve_systems(belief_profiles, interval_ticks, ticks_per_year);
        self.compute_production();
        self.compute_trade();
        self.compute_consumption();
        self.update_prices();
        self.distribute_income(agents);
        self.compute_welfare();
        self.compute_inequality(agents);
        self.compute_hardship();
    }

    /// Specialization drifts toward the best-endowed good; everything
    /// else erodes at half the rate.
    fn evolve_specialization(&mut self) {
        for region in &mut self.regions {
            let mut best = 0usize;
            for g in 1..GOOD_COUNT {
                if region.endowments[g] > region.endowments[best] {
                    best = g;
                }
            }
            for g in 0..GOOD_COUNT {
                if g == best {
                    region.specialization[g] =
                        (region.specialization[g] + SPECIALIZATION_RATE).min(2.0);
                } else {
                    region.specialization[g] =
                        (region.specialization[g] - SPECIALIZATION_RATE * 0.5).max(-0.5);
                }
            }
        }
    }

    fn evolve_development(&mut self) {
        for region in &mut self.regions {
            if region.population == 0 {
                continue;
            }
            if region.hardship < 0.3 && region.welfare > 1.2 {
                region.development += DEVELOPMENT_GROWTH_RATE * (region.welfare - 1.0);
            } else if region.hardship > 0.5 {
                region.development -= DEVELOPMENT_DECAY_RATE * region.hardship;
            }
            region.development = region.development.clamp(0.0, 10.0);
        }
    }

    fn evolve_systems(
        &mut self,
        belief_profiles: &[BeliefVec],
        interval_ticks: f64,
        ticks_per_year: u32,
    ) {
        let years = interval_ticks / ticks_per_year.max(1) as f64;

        for (i, region) in self.regions.iter_mut().enumerate() {
            if let Some(forced) = self.forced_model {
                region.system.current = forced;
                region.system.pending = None;
                region.system.stability = 0.5;
            } else {
                let profile = belief_profiles.get(i).copied().unwrap_or([0.0; 4]);
                let ideal = classify_ideal_system(
                    &profile,
                    region.development,
                    region.hardship,
                    region.inequality,
                );
                region.system.advance(
                    ideal,
                    PressureInputs {
                        hardship: region.hardship,
                        welfare: region.welfare,
                        inequality: region.inequality,
                    },
                    interval_ticks,
                    years,
                );
            }

            // Efficiency re-emerges from how well consumption is covered,
            // plus stability and development.
            let production_total: f64 = region.production.iter().sum();
            let consumption_total: f64 = region.consumption.iter().sum();
            let coverage = if consumption_total > 0.0 {
                (production_total / (consumption_total + 1.0)).min(1.0)
            } else {
                0.5
            };
            region.efficiency = (0.5
                + coverage * 0.3
                + region.system.stability * 0.2
                + (region.development * 0.04).min(0.2))
            .clamp(0.3, 1.0);
        }
    }

    fn compute_production(&mut self) {
        for region in &mut self.regions {
            for g in 0..GOOD_COUNT {
                region.production[g] = region.endowments[g]
                    * region.population as f64
                    * (1.0 + region.specialization[g])
                    * region.tech_multipliers[g]
                    * region.efficiency
                    * (1.0 + 0.2 * region.development)
                    * (1.0 - self.war_allocation);
            }
        }
    }

    fn compute_trade(&mut self) {
        let n = self.regions.len();
        let mut production = vec![[0.0; GOOD_COUNT]; n];
        let mut demand = vec![[0.0; GOOD_COUNT]; n];
        let weights = [0.2, 0.3, 0.2, 0.5, 0.4];

        for (i, region) in self.regions.iter().enumerate() {
            production[i] = region.production;
            if region.population == 0 {
                continue;
            }
            let needs = region.needs();
            for (g, good) in Good::ALL.iter().enumerate() {
                demand[i][g] =
                    region.population as f64 * (needs.for_good(*good) + region.welfare * weights[g]);
            }
        }

        let balances = self.trade.compute_flows(&production, &demand, TRADE_DIFFUSION_RATE);
        for (region, balance) in self.regions.iter_mut().zip(balances) {
            region.trade_balance = balance;
        }
    }

    fn compute_consumption(&mut self) {
        for region in &mut self.regions {
            for g in 0..GOOD_COUNT {
                region.consumption[g] =
                    (region.production[g] + region.trade_balance[g]).max(0.0);
            }
        }
    }

    fn update_prices(&mut self) {
        for region in &mut self.regions {
            if region.population == 0 {
                continue;
            }
            let needs = region.needs();
            for (g, good) in Good::ALL.iter().enumerate() {
                let supply = region.production[g];
                let demand =
                    region.population as f64 * (needs.for_good(*good) + region.welfare * 0.5);
                let ratio = if demand > 0.0 { supply / demand } else { 1.0 };

                if ratio < 0.8 {
                    region.prices[g] *= 1.05;
                } else if ratio > 1.2 {
                    region.prices[g] *= 0.975;
                }

                // Soft re-anchoring at the numerical-stability bounds.
                let price = region.prices[g];
                if price < 0.01 {
                    region.prices[g] = 0.01 + ratio * 0.05;
                } else if price > 100.0 {
                    region.prices[g] = 100.0 * (1.0 - (price - 100.0) / price * 0.1);
                }
                region.prices[g] = region.prices[g].clamp(0.01, 100.0);
            }
        }
    }

    fn distribute_income(&mut self, agents: &[Agent]) {
        let n_regions = self.regions.len();
        let mut total_productivity = vec![0.0f64; n_regions];
        let mut wealth_sum = vec![0.0f64; n_regions];
        let mut alive_count = vec![0u32; n_regions];

        for agent in agents {
            if !agent.alive {
                continue;
            }
            let r = agent.region as usize;
            if r >= n_regions {
                continue;
            }
            let Some(econ) = self.agents.get(agent.id as usize) else {
                continue;
            };
            total_productivity[r] += econ.productivity;
            wealth_sum[r] += econ.wealth;
            alive_count[r] += 1;
        }

        for r in 0..n_regions {
            self.regions[r].avg_wealth = if alive_count[r] > 0 {
                wealth_sum[r] / alive_count[r] as f64
            } else {
                1.0
            };
        }

        for agent in agents {
            if !agent.alive {
                continue;
            }
            let r = agent.region as usize;
            if r >= n_regions {
                continue;
            }
            let region = &self.regions[r];
            let Some(econ) = self.agents.get_mut(agent.id as usize) else {
                continue;
            };

            if total_productivity[r] <= 0.0 {
                econ.income = 0.0;
                econ.hardship = 1.0;
                continue;
            }

            let share = econ.productivity / total_productivity[r];
            let mut income =
                share * region.production[econ.sector] * region.prices[econ.sector]
                    * (0.8 + 0.4 * region.efficiency);

            // Capital returns with diminishing scale.
            income += (1.0 + econ.wealth).ln() * 0.01;

            // Matthew effect: position relative to the regional average
            // nudges income by up to ±10%.
            let relative = econ.wealth / region.avg_wealth.max(0.1);
            if relative > 2.0 {
                income *= 1.0 + 0.1 * (relative - 2.0).min(1.0);
            } else if relative < 0.5 {
                income *= 0.9 + 0.2 * relative;
            }
            econ.income = income;

            // Three-case budget: save when comfortable, split the
            // surplus at break-even, draw down wealth in deficit.
            let cost = region.essential_cost().max(1e-6);
            if income >= 1.5 * cost {
                econ.wealth += 0.2 * income;
            } else if income >= cost {
                econ.wealth += 0.5 * (income - cost);
            } else {
                let draw = (cost - income).min(0.05 * econ.wealth);
                econ.wealth -= draw;
            }
            econ.wealth = econ.wealth.max(WEALTH_FLOOR);

            if econ.productivity < 3.0 {
                econ.productivity += 0.0003 * (1.0 + 0.1 * region.avg_wealth);
            }
            econ.productivity = (econ.productivity * 0.9999).max(0.2);

            econ.hardship = (1.0 - income / cost).clamp(0.0, 1.0);
        }

        self.update_wealth_shares(agents);
    }

    fn update_wealth_shares(&mut self, agents: &[Agent]) {
        let n_regions = self.regions.len();
        let mut per_region: Vec<Vec<f64>> = vec![Vec::new(); n_regions];
        for agent in agents {
            if !agent.alive {
                continue;
            }
            let r = agent.region as usize;
            if r >= n_regions {
                continue;
            }
            if let Some(econ) = self.agents.get(agent.id as usize) {
                per_region[r].push(econ.wealth);
            }
        }

        for (region, wealths) in self.regions.iter_mut().zip(per_region.iter_mut()) {
            if wealths.is_empty() {
                continue;
            }
            wealths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let total: f64 = wealths.iter().sum();
            if total <= 0.0 {
                continue;
            }
            let top_start = wealths.len() * 9 / 10;
            let bottom_end = wealths.len() / 2;
            region.wealth_top_10 = wealths[top_start..].iter().sum::<f64>() / total;
            region.wealth_bottom_50 = wealths[..bottom_end].iter().sum::<f64>() / total;
        }
    }

    fn compute_welfare(&mut self) {
        for region in &mut self.regions {
            if region.population == 0 {
                region.welfare = 1.0;
                continue;
            }
            let c = &region.consumption;
            let weighted = c[Good::Food.index()] * 2.0
                + c[Good::Energy.index()] * 1.5
                + c[Good::Tools.index()] * 1.0
                + c[Good::Services.index()] * 1.2
                + c[Good::Luxury.index()] * 0.5;
            region.welfare = (weighted / 6.2) / region.population as f64;
        }
    }

    fn compute_inequality(&mut self, agents: &[Agent]) {
        let ginis: Vec<f64> = (0..self.regions.len())
            .map(|r| self.region_gini(r as RegionId, agents))
            .collect();
        for (region, gini) in self.regions.iter_mut().zip(ginis) {
            region.inequality = if region.population == 0 { 0.0 } else { gini };
        }
    }

    /// Gini from the sorted-index formula, O(n log n).
    pub fn region_gini(&self, region_id: RegionId, agents: &[Agent]) -> f64 {
        let mut wealths: Vec<f64> = agents
            .iter()
            .filter(|a| a.alive && a.region == region_id)
            .filter_map(|a| self.agents.get(a.id as usize).map(|e| e.wealth))
            .collect();
        if wealths.len() < 2 {
            return 0.0;
        }
        wealths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = wealths.len() as f64;
        let mut weighted_sum = 0.0;
        let mut total = 0.0;
        for (i, w) in wealths.iter().enumerate() {
            weighted_sum += (i + 1) as f64 * w;
            total += w;
        }
        if total <= 0.0 {
            return 0.0;
        }
        ((2.0 * weighted_sum) / (n * total) - (n + 1.0) / n).clamp(0.0, 1.0)
    }

    /// Regional hardship: deficit of consumption against needs, with
    /// weights that shift from survival goods toward tools and services
    /// as development rises.
    fn compute_hardship(&mut self) {
        for region in &mut self.regions {
            if region.population == 0 {
                region.hardship = 0.0;
                continue;
            }
            let pop = region.population as f64;
            let needs = region.needs();

            let per_capita = |g: Good| region.consumption[g.index()] / pop;
            let deficit = |need: f64, actual: f64| {
                if need <= 0.01 {
                    (need - actual).max(0.0) / 0.01
                } else {
                    (need - actual).max(0.0) / need
                }
            };

            let food_deficit = deficit(needs.food, per_capita(Good::Food));
            let energy_deficit = deficit(needs.energy, per_capita(Good::Energy));
            let tools_deficit = deficit(needs.tools, per_capita(Good::Tools));
            let services_deficit = deficit(needs.services, per_capita(Good::Services));

            let dev = region.development;
            let hardship = food_deficit * (0.5 - dev * 0.15).max(0.0)
                + energy_deficit * (0.3 - dev * 0.05).max(0.0)
                + tools_deficit * (0.1 + dev * 0.10)
                + services_deficit * (0.1 + dev * 0.10);
            region.hardship = hardship.clamp(0.0, 1.0);
        }
    }

    // ----- accessors -----

    pub fn region(&self, id: RegionId) -> &RegionalEconomy {
        &self.regions[id as usize]
    }

    pub fn region_mut(&mut self, id: RegionId) -> &mut RegionalEconomy {
        &mut self.regions[id as usize]
    }

    pub fn regions(&self) -> &[RegionalEconomy] {
        &self.regions
    }

    pub fn agent(&self, id: u32) -> &AgentEconomy {
        &self.agents[id as usize]
    }

    pub fn agent_opt(&self, id: u32) -> Option<&AgentEconomy> {
        self.agents.get(id as usize)
    }

    pub fn agent_economies(&self) -> &[AgentEconomy] {
        &self.agents
    }

    pub fn profile_name(&self) -> &'static str {
        self.profile.name
    }

    /// Force every region onto one system (policy lever); `None`
    /// restores emergent selection.
    pub fn set_forced_model(&mut self, model: Option<SystemKind>) {
        self.forced_model = model;
    }

    /// Divert a fraction of all production to war effort.
    pub fn reallocate_to_war(&mut self, fraction: f64) {
        self.war_allocation = fraction.clamp(0.0, 1.0);
    }

    fn population_weighted(&self, value: impl Fn(&RegionalEconomy) -> f64, empty: f64) -> f64 {
        let mut weighted = 0.0;
        let mut population = 0u64;
        for region in &self.regions {
            weighted += value(region) * region.population as f64;
            population += region.population as u64;
        }
        if population > 0 {
            weighted / population as f64
        } else {
            empty
        }
    }

    pub fn global_welfare(&self) -> f64 {
        self.population_weighted(|r| r.welfare, 1.0)
    }

    pub fn global_inequality(&self) -> f64 {
        self.population_weighted(|r| r.inequality, 0.0)
    }

    pub fn global_hardship(&self) -> f64 {
        self.population_weighted(|r| r.hardship, 0.0)
    }

    pub fn global_development(&self) -> f64 {
        self.population_weighted(|r| r.development, 0.0)
    }

    /// Total traded volume; each unit appears once as export and once as
    /// import, so halve the absolute sum.
    pub fn total_trade(&self) -> f64 {
        let volume: f64 = self
            .regions
            .iter()
            .map(|r| r.trade_balance.iter().map(|b| b.abs()).sum::<f64>())
            .sum();
        volume / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn make_agents(n: u32, regions: u32) -> Vec<Agent> {
        (0..n)
            .map(|i| Agent::blank(i, i % regions))
            .collect()
    }

    fn run_updates(
        engine: &mut EconomyEngine,
        agents: &[Agent],
        regions: u32,
        passes: usize,
    ) {
        let mut populations = vec![0u32; regions as usize];
        for a in agents {
            if a.alive {
                populations[a.region as usize] += 1;
            }
        }
        let profiles = vec![[0.0f64; 4]; regions as usize];
        for _ in 0..passes {
            engine.update(&populations, &profiles, agents, 10.0, 10);
        }
    }

    #[test]
    fn endowments_are_skewed() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let engine = EconomyEngine::new(50, 100, StartCondition::Baseline, &mut rng);
        let mut scarce_regions = 0;
        for region in engine.regions() {
            let max = region.endowments.iter().cloned().fold(0.0, f64::max);
            let min = region.endowments.iter().cloned().fold(f64::MAX, f64::min);
            assert!(max > min, "flat endowments in region {}", region.id);
            if min < 0.2 {
                scarce_regions += 1;
            }
        }
        // Most regions should be desperately poor in something.
        assert!(scarce_regions > 25, "only {} scarce regions", scarce_regions);
    }

    #[test]
    fn regions_have_trade_partners_sorted_by_distance() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let engine = EconomyEngine::new(25, 100, StartCondition::Baseline, &mut rng);
        for region in engine.regions() {
            assert!(
                region.trade_partners.len() >= 2,
                "region {} has {} partners",
                region.id,
                region.trade_partners.len()
            );
        }
    }

    #[test]
    fn prices_stay_bounded_under_pressure() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut engine = EconomyEngine::new(10, 200, StartCondition::Crisis, &mut rng);
        let agents = make_agents(200, 10);
        run_updates(&mut engine, &agents, 10, 200);
        for region in engine.regions() {
            for g in 0..GOOD_COUNT {
                assert!(
                    (0.01..=100.0).contains(&region.prices[g]),
                    "price out of bounds: {}",
                    region.prices[g]
                );
            }
        }
    }

    #[test]
    fn trade_balances_conserve_globally() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut engine = EconomyEngine::new(20, 400, StartCondition::Baseline, &mut rng);
        let agents = make_agents(400, 20);
        run_updates(&mut engine, &agents, 20, 5);
        for g in 0..GOOD_COUNT {
            let total: f64 = engine.regions().iter().map(|r| r.trade_balance[g]).sum();
            assert!(total.abs() < 1e-6, "good {} residual {}", g, total);
        }
    }

    #[test]
    fn income_distribution_produces_inequality() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut engine = EconomyEngine::new(5, 500, StartCondition::Baseline, &mut rng);
        let agents = make_agents(500, 5);
        run_updates(&mut engine, &agents, 5, 30);

        let gini = engine.global_inequality();
        assert!((0.0..=1.0).contains(&gini));
        assert!(gini > 0.05, "log-normal wealth should show up in Gini, got {}", gini);
    }

    #[test]
    fn gini_of_identical_wealth_is_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut engine = EconomyEngine::new(2, 10, StartCondition::Baseline, &mut rng);
        for econ in engine.agents.iter_mut() {
            econ.wealth = 1.0;
        }
        let agents = make_agents(10, 1);
        let gini = engine.region_gini(0, &agents);
        assert!(gini.abs() < 1e-9);
    }

    #[test]
    fn specialization_clamps_and_favors_best_endowment() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut engine = EconomyEngine::new(4, 40, StartCondition::Baseline, &mut rng);
        let agents = make_agents(40, 4);
        run_updates(&mut engine, &agents, 4, 100);

        for region in engine.regions() {
            let mut best = 0;
            for g in 1..GOOD_COUNT {
                if region.endowments[g] > region.endowments[best] {
                    best = g;
                }
            }
            for g in 0..GOOD_COUNT {
                assert!((-0.5..=2.0).contains(&region.specialization[g]));
            }
            let best_spec = region.specialization[best];
            for g in 0..GOOD_COUNT {
                if g != best {
                    assert!(best_spec >= region.specialization[g]);
                }
            }
        }
    }

    #[test]
    fn war_allocation_cuts_production() {
        let mut rng = ChaCha8Rng::seed_from_u64(19);
        let mut engine = EconomyEngine::new(3, 60, StartCondition::Baseline, &mut rng);
        let agents = make_agents(60, 3);
        run_updates(&mut engine, &agents, 3, 2);
        let peacetime: f64 = engine.regions().iter().map(|r| r.production[0]).sum();

        engine.reallocate_to_war(0.5);
        run_updates(&mut engine, &agents, 3, 1);
        let wartime: f64 = engine.regions().iter().map(|r| r.production[0]).sum();
        assert!(wartime < peacetime * 0.7);
    }

    #[test]
    fn forced_model_overrides_every_region() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut engine = EconomyEngine::new(6, 60, StartCondition::Baseline, &mut rng);
        engine.set_forced_model(Some(SystemKind::Planned));
        let agents = make_agents(60, 6);
        run_updates(&mut engine, &agents, 6, 1);
        for region in engine.regions() {
            assert_eq!(region.system.current, SystemKind::Planned);
        }
    }

    #[test]
    fn wealth_has_positive_floor() {
        let mut rng = ChaCha8Rng::seed_from_u64(29);
        let mut engine = EconomyEngine::new(2, 50, StartCondition::Crisis, &mut rng);
        let agents = make_agents(50, 2);
        run_updates(&mut engine, &agents, 2, 300);
        for econ in engine.agent_economies() {
            assert!(econ.wealth >= WEALTH_FLOOR);
        }
    }

    #[test]
    fn empty_region_has_neutral_indicators() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let mut engine = EconomyEngine::new(3, 30, StartCondition::Baseline, &mut rng);
        // Everyone in region 0; regions 1-2 empty.
        let agents = make_agents(30, 1);
        run_updates(&mut engine, &agents, 3, 3);
        for r in 1..3 {
            let region = engine.region(r);
            assert_eq!(region.hardship, 0.0);
            assert_eq!(region.inequality, 0.0);
            assert_eq!(region.welfare, 1.0);
        }
    }
}
