//! Psychological state driven by economic and health signals.
//!
//! Each region exposes a stress profile (hardship, inequality, welfare,
//! institutional support, media negativity); each agent converts it
//! through personality-derived sensitivities into a stress shock, then
//! integrates stress and mental health. The module writes its results
//! back into the communication and mobility multipliers the rest of the
//! kernel reads.

use rand::Rng;

use crate::agent::{Agent, StressSource};
use crate::core::types::{clamp01, RegionId};
use crate::economy::EconomyEngine;

const SHOCK_FLOOR: f64 = 0.05;
const SHOCK_CEIL: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct RegionalStressProfile {
    pub hardship: f64,
    pub inequality: f64,
    pub welfare: f64,
    pub institutional_support: f64,
    pub media_negativity: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegionalPsychMetrics {
    pub avg_stress: f64,
    pub avg_mental_health: f64,
    pub low_mental_health_share: f64,
}

/// How strongly each stressor lands, derived from personality.
#[derive(Debug, Clone, Copy)]
struct StressSensitivity {
    economic: f64,
    media: f64,
    institutional: f64,
    disease: f64,
}

impl StressSensitivity {
    fn of(agent: &Agent) -> Self {
        Self {
            // Low openness clings to material security; conformists
            // worry about their standing.
            economic: 0.4 + 0.4 * (1.0 - agent.openness) + 0.2 * agent.conformity,
            media: 0.2 + 0.5 * agent.conformity - 0.2 * agent.assertiveness,
            institutional: 0.3 + 0.4 * (1.0 - agent.conformity) + 0.2 * agent.assertiveness,
            disease: 0.2 + 0.3 * agent.sociality + 0.2 * (1.0 - agent.openness),
        }
    }
}

pub struct PsychologyModule {
    profiles: Vec<RegionalStressProfile>,
    metrics: Vec<RegionalPsychMetrics>,
}

impl PsychologyModule {
    pub fn new(regions: u32) -> Self {
        Self {
            profiles: vec![RegionalStressProfile::default(); regions as usize],
            metrics: vec![RegionalPsychMetrics::default(); regions as usize],
        }
    }

    pub fn profile(&self, region: RegionId) -> RegionalStressProfile {
        self.profiles
            .get(region as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn metrics(&self, region: RegionId) -> RegionalPsychMetrics {
        self.metrics
            .get(region as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Seed psychological state from personality.
    pub fn init_agent<R: Rng>(&self, agent: &mut Agent, rng: &mut R) {
        let mut noise = |rng: &mut R| rng.gen_range(-0.05..0.05);
        let psych = &mut agent.psych;
        psych.resilience = clamp01(
            0.35 + 0.25 * agent.conformity
                + 0.2 * agent.sociality
                + 0.1 * agent.openness
                + noise(rng),
        );
        psych.mental_health =
            clamp01(psych.resilience + 0.2 * (agent.sociality - 0.5) + noise(rng));
        psych.stress = clamp01(0.2 + 0.1 * (1.0 - psych.resilience) + noise(rng));
        psych.cognitive_bias =
            (1.0 + 0.2 * (agent.assertiveness - agent.conformity)).clamp(0.25, 2.0);
        psych.stressors = [0.0; crate::agent::STRESS_SOURCES];
        psych.recovery_memory = 0.0;
    }

    pub fn init_all<R: Rng>(&self, agents: &mut [Agent], rng: &mut R) {
        for agent in agents.iter_mut() {
            self.init_agent(agent, rng);
        }
    }

    /// One psychology tick. Reads health state written earlier in the
    /// same tick; writes m_comm and m_mobility.
    pub fn update(&mut self, agents: &mut [Agent], economy: &EconomyEngine) {
        let regions = self.profiles.len();

        for r in 0..regions {
            let econ = economy.region(r as RegionId);
            self.profiles[r] = RegionalStressProfile {
                hardship: clamp01(econ.hardship),
                inequality: clamp01(econ.inequality),
                welfare: clamp01(econ.welfare),
                institutional_support: clamp01(econ.efficiency),
                media_negativity: clamp01(1.0 - econ.system.stability),
            };
            self.metrics[r] = RegionalPsychMetrics::default();
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
            let profile = self.profiles[r];
            region_counts[r] += 1;

            let personal_hardship = economy
                .agent_opt(agent.id)
                .map(|e| e.hardship)
                .unwrap_or(0.0);

            let sens = StressSensitivity::of(agent);
            let economic =
                sens.economic * (0.6 * personal_hardship + 0.4 * profile.hardship);
            let media = sens.media * profile.media_negativity;
            let institutional =
                sens.institutional * (1.0 - profile.institutional_support);
            let disease = sens.disease * f64::from(u8::from(agent.health.infected));

            let psych = &mut agent.psych;
            psych.stressors[StressSource::EconomicHardship as usize] = economic;
            psych.stressors[StressSource::MediaNegativity as usize] = media;
            psych.stressors[StressSource::InstitutionalRigidity as usize] = institutional;
            psych.stressors[StressSource::DiseaseImpact as usize] = disease;

            let mut shock = (economic + media + institutional + disease)
                .clamp(SHOCK_FLOOR, SHOCK_CEIL);
            shock *= 1.0 - psych.resilience;

            let social_support = clamp01(0.5 + 0.5 * (1.0 - profile.inequality));
            let recovery = 0.05 + 0.3 * profile.welfare + 0.2 * social_support;
            let decay = psych.stress * psych.stress * (1.0 - social_support);

            psych.stress =
                clamp01(psych.stress + shock - recovery * (0.5 + psych.mental_health));
            psych.mental_health = clamp01(
                psych.mental_health * (1.0 - decay)
                    + psych.resilience * (profile.welfare + social_support) * 0.25,
            );
            psych.recovery_memory = 0.9 * psych.recovery_memory + 0.1 * recovery;
            psych.cognitive_bias = (1.0
                + 0.5 * (psych.stress - 0.5)
                + 0.3 * (agent.assertiveness - agent.conformity))
                .clamp(0.25, 2.0);

            // Writeback: stress narrows reach, good mental health and
            // sociality widen it and keep people willing to move.
            agent.m_comm = clamp01(1.0 - 0.4 * psych.stress + 0.3 * psych.mental_health);
            agent.m_mobility = (0.8 + 0.4 * agent.sociality
                + 0.3 * (psych.mental_health - 0.5)
                - 0.2 * psych.stress)
                .clamp(0.1, 1.5);

            let metrics = &mut self.metrics[r];
            metrics.avg_stress += psych.stress;
            metrics.avg_mental_health += psych.mental_health;
            if psych.mental_health < 0.3 {
                metrics.low_mental_health_share += 1.0;
            }
        }

        for (metrics, &count) in self.metrics.iter_mut().zip(&region_counts) {
            if count > 0 {
                let inv = 1.0 / count as f64;
                metrics.avg_stress *= inv;
                metrics.avg_mental_health *= inv;
                metrics.low_mental_health_share *= inv;
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
        let mut rng = ChaCha8Rng::seed_from_u64(555);
        let agents: Vec<Agent> = (0..n).map(|i| Agent::blank(i, i % regions)).collect();
        let economy = EconomyEngine::new(regions, n, StartCondition::Baseline, &mut rng);
        (agents, economy, rng)
    }

    #[test]
    fn init_produces_sane_state() {
        let (mut agents, _, mut rng) = setup(300, 3);
        let module = PsychologyModule::new(3);
        module.init_all(&mut agents, &mut rng);
        for a in &agents {
            assert!((0.0..=1.0).contains(&a.psych.stress));
            assert!((0.0..=1.0).contains(&a.psych.resilience));
            assert!((0.0..=1.0).contains(&a.psych.mental_health));
            assert!((0.25..=2.0).contains(&a.psych.cognitive_bias));
        }
    }

    #[test]
    fn update_keeps_state_bounded() {
        let (mut agents, economy, mut rng) = setup(200, 2);
        let mut module = PsychologyModule::new(2);
        module.init_all(&mut agents, &mut rng);
        for _ in 0..200 {
            module.update(&mut agents, &economy);
        }
        for a in &agents {
            assert!((0.0..=1.0).contains(&a.psych.stress));
            assert!((0.0..=1.0).contains(&a.psych.mental_health));
            assert!((0.25..=2.0).contains(&a.psych.cognitive_bias));
            assert!((0.0..=1.0).contains(&a.m_comm));
            assert!((0.1..=1.5).contains(&a.m_mobility));
        }
    }

    #[test]
    fn economic_misery_raises_stress() {
        let (mut agents, mut economy, mut rng) = setup(200, 2);
        let mut module = PsychologyModule::new(2);
        module.init_all(&mut agents, &mut rng);

        // Region 0 collapses, region 1 thrives.
        economy.region_mut(0).hardship = 1.0;
        economy.region_mut(0).welfare = 0.1;
        economy.region_mut(0).efficiency = 0.3;
        economy.region_mut(0).inequality = 0.8;
        economy.region_mut(0).system.stability = 0.1;
        economy.region_mut(1).hardship = 0.0;
        economy.region_mut(1).welfare = 1.5;
        economy.region_mut(1).efficiency = 1.0;
        economy.region_mut(1).system.stability = 1.0;

        for _ in 0..50 {
            module.update(&mut agents, &economy);
        }

        let avg = |region: u32| {
            let members: Vec<&Agent> =
                agents.iter().filter(|a| a.region == region).collect();
            members.iter().map(|a| a.psych.stress).sum::<f64>() / members.len() as f64
        };
        assert!(
            avg(0) > avg(1) + 0.1,
            "collapsed region stress {} vs thriving {}",
            avg(0),
            avg(1)
        );
    }

    #[test]
    fn stress_suppresses_communication_reach() {
        let (mut agents, mut economy, mut rng) = setup(100, 1);
        let mut module = PsychologyModule::new(1);
        module.init_all(&mut agents, &mut rng);
        economy.region_mut(0).hardship = 1.0;
        economy.region_mut(0).welfare = 0.1;
        economy.region_mut(0).system.stability = 0.0;
        economy.region_mut(0).efficiency = 0.3;

        for _ in 0..100 {
            module.update(&mut agents, &economy);
        }
        let avg_comm: f64 =
            agents.iter().map(|a| a.m_comm).sum::<f64>() / agents.len() as f64;
        assert!(avg_comm < 0.9, "stressed population keeps full reach: {}", avg_comm);
    }

    #[test]
    fn infection_feeds_the_disease_stressor() {
        let (mut agents, economy, mut rng) = setup(2, 1);
        let mut module = PsychologyModule::new(1);
        module.init_all(&mut agents, &mut rng);
        agents[0].health.infected = true;
        agents[1].health.infected = false;
        module.update(&mut agents, &economy);
        let sick = agents[0].psych.stressors[StressSource::DiseaseImpact as usize];
        let healthy = agents[1].psych.stressors[StressSource::DiseaseImpact as usize];
        assert!(sick > 0.0);
        assert_eq!(healthy, 0.0);
    }

    #[test]
    fn regional_metrics_average_over_members() {
        let (mut agents, economy, mut rng) = setup(50, 1);
        let mut module = PsychologyModule::new(1);
        module.init_all(&mut agents, &mut rng);
        module.update(&mut agents, &economy);
        let metrics = module.metrics(0);
        assert!((0.0..=1.0).contains(&metrics.avg_stress));
        assert!((0.0..=1.0).contains(&metrics.avg_mental_health));
        assert!((0.0..=1.0).contains(&metrics.low_mental_health_share));
    }
}
