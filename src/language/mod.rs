//! Language families, dialects, and prestige-driven shift.
//!
//! Four families sit in the four quadrants of the map; each region's
//! dominant family is the nearest (jittered) center and most residents
//! speak it. Every 50 ticks, prestige per region follows speaker counts
//! and speaker wealth, and young agents drift toward the locally
//! prestigious language, blending their dialect as they go.

use rand::Rng;

use crate::agent::{axis_normalized, Agent};
use crate::core::types::{AgentId, RegionId};
use crate::economy::EconomyEngine;

pub const LANGUAGE_FAMILIES: usize = 4;
pub const DIALECT_COUNT: u8 = 10;

/// Quadrant naming used by the driver: NW=Western, NE=Eastern,
/// SW=Northern, SE=Southern.
pub const FAMILY_NAMES: [&str; LANGUAGE_FAMILIES] = ["Western", "Eastern", "Northern", "Southern"];

/// Soft quadrant centers the family zones are anchored to.
const FAMILY_ANCHORS: [(f64, f64); LANGUAGE_FAMILIES] = [
    (0.25, 0.75), // Western, northwest
    (0.75, 0.75), // Eastern, northeast
    (0.25, 0.25), // Northern, southwest
    (0.75, 0.25), // Southern, southeast
];

pub struct LanguageEngine {
    region_dominant: Vec<u8>,
    region_strength: Vec<f64>,
    region_base_dialect: Vec<u8>,
    /// Per region, per family; smoothed across updates.
    prestige: Vec<[f64; LANGUAGE_FAMILIES]>,
    total_shifts: u64,
}

impl LanguageEngine {
    pub fn new(regions: usize) -> Self {
        Self {
            region_dominant: vec![0; regions],
            region_strength: vec![0.3; regions],
            region_base_dialect: vec![0; regions],
            prestige: vec![[0.25; LANGUAGE_FAMILIES]; regions],
            total_shifts: 0,
        }
    }

    pub fn region_dominant(&self, region: RegionId) -> u8 {
        self.region_dominant.get(region as usize).copied().unwrap_or(0)
    }

    pub fn region_strength(&self, region: RegionId) -> f64 {
        self.region_strength.get(region as usize).copied().unwrap_or(0.3)
    }

    pub fn region_base_dialects(&self) -> &[u8] {
        &self.region_base_dialect
    }

    pub fn prestige(&self, region: RegionId) -> [f64; LANGUAGE_FAMILIES] {
        self.prestige
            .get(region as usize)
            .copied()
            .unwrap_or([0.25; LANGUAGE_FAMILIES])
    }

    pub fn total_shifts(&self) -> u64 {
        self.total_shifts
    }

    /// Every family keeps a home dialect its shifters blend toward.
    pub fn canonical_dialect(family: u8) -> u8 {
        (family * 3) % DIALECT_COUNT
    }

    /// Assign every region a dominant family by distance to jittered
    /// quadrant centers, then give each agent a language consistent with
    /// where it lives.
    pub fn assign_by_geography<R: Rng>(
        &mut self,
        agents: &mut [Agent],
        economy: &EconomyEngine,
        rng: &mut R,
    ) {
        let regions = self.region_dominant.len();

        // Jitter the anchors once per reset so zone borders vary run to
        // run but stay anchored to their quadrants.
        let centers: Vec<(f64, f64)> = FAMILY_ANCHORS
            .iter()
            .map(|&(x, y)| {
                (
                    x + rng.gen_range(-0.1..0.1),
                    y + rng.gen_range(-0.1..0.1),
                )
            })
            .collect();

        for r in 0..regions {
            let econ = economy.region(r as RegionId);
            let mut best = 0usize;
            let mut best_dist = f64::MAX;
            for (family, &(cx, cy)) in centers.iter().enumerate() {
                let dx = econ.x - cx;
                let dy = econ.y - cy;
                let dist = (dx * dx + dy * dy).sqrt() + rng.gen_range(-0.05..0.05);
                if dist < best_dist {
                    best_dist = dist;
                    best = family;
                }
            }
            self.region_dominant[r] = best as u8;
            self.region_strength[r] = (1.0 - 1.5 * best_dist.max(0.0)).max(0.3);
            self.region_base_dialect[r] =
                (((econ.x * 10.0) as u32 + (econ.y * 10.0) as u32 * 7) % DIALECT_COUNT as u32)
                    as u8;
            self.prestige[r] = [0.25; LANGUAGE_FAMILIES];
        }

        for agent in agents.iter_mut() {
            let r = agent.region as usize;
            if r >= regions {
                continue;
            }
            let strength = self.region_strength[r];
            let minority_chance = ((1.0 - strength) * 0.3
                + 0.05 * (agent.m_mobility + agent.openness))
                .min(0.4);

            agent.primary_lang = if rng.gen_range(0.0..1.0) < minority_chance {
                rng.gen_range(0..LANGUAGE_FAMILIES as u8)
            } else {
                self.region_dominant[r]
            };

            // Dialect: regional baseline plus integer variation that
            // widens where the dominant family's grip is weak.
            let variation =
                (rng.gen_range(0..3) as f64 * (1.0 - strength / 2.0)).round() as u32;
            agent.dialect =
                ((self.region_base_dialect[r] as u32 + variation) % DIALECT_COUNT as u32) as u8;
        }
    }

    /// Prestige update and shift pass. Returns how many agents switched
    /// family this pass.
    pub fn update_prestige<R: Rng>(
        &mut self,
        agents: &mut [Agent],
        region_index: &[Vec<AgentId>],
        economy: &EconomyEngine,
        rng: &mut R,
    ) -> u32 {
        let mut shifts = 0u32;

        for (r, members) in region_index.iter().enumerate() {
            if r >= self.prestige.len() || members.is_empty() {
                continue;
            }

            let mut speakers = [0u32; LANGUAGE_FAMILIES];
            let mut wealth = [0.0f64; LANGUAGE_FAMILIES];
            let mut population = 0u32;
            let mut total_wealth = 0.0f64;

            for &id in members {
                let Some(agent) = agents.get(id as usize) else {
                    continue;
                };
                if !agent.alive {
                    continue;
                }
                let lang = (agent.primary_lang as usize).min(LANGUAGE_FAMILIES - 1);
                let w = economy.agent_opt(agent.id).map(|e| e.wealth).unwrap_or(1.0);
                speakers[lang] += 1;
                wealth[lang] += w;
                population += 1;
                total_wealth += w;
            }
            if population == 0 {
                continue;
            }

            for l in 0..LANGUAGE_FAMILIES {
                let pop_share = speakers[l] as f64 / population as f64;
                let wealth_share = if total_wealth > 0.0 {
                    wealth[l] / total_wealth
                } else {
                    pop_share
                };
                let target = 0.4 * pop_share + 0.6 * wealth_share;
                self.prestige[r][l] = 0.9 * self.prestige[r][l] + 0.1 * target;
            }

            let dominant = (0..LANGUAGE_FAMILIES)
                .max_by(|&a, &b| {
                    self.prestige[r][a]
                        .partial_cmp(&self.prestige[r][b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0) as u8;

            // Only the young shift; the probability scales with the
            // prestige gap and the agent's openness and conformity, and
            // traditionalists resist.
            for &id in members {
                let Some(agent) = agents.get_mut(id as usize) else {
                    continue;
                };
                if !agent.alive || agent.age > 25 || agent.primary_lang == dominant {
                    continue;
                }
                let own = (agent.primary_lang as usize).min(LANGUAGE_FAMILIES - 1);
                let gap = self.prestige[r][dominant as usize] - self.prestige[r][own];
                if gap <= 0.05 {
                    continue;
                }
                let tradition = axis_normalized(agent.b[1]);
                let probability = 0.3
                    * gap
                    * (0.5 + 0.5 * agent.openness)
                    * (0.5 + 0.5 * agent.conformity)
                    * (1.0 - 0.5 * tradition);
                if rng.gen_range(0.0..1.0) < probability {
                    agent.primary_lang = dominant;
                    let blended = 0.7 * agent.dialect as f64
                        + 0.3 * Self::canonical_dialect(dominant) as f64;
                    agent.dialect = (blended.round() as u32 % DIALECT_COUNT as u32) as u8;
                    shifts += 1;
                }
            }
        }

        self.total_shifts += shifts as u64;
        shifts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StartCondition;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(n: u32, regions: u32) -> (Vec<Agent>, EconomyEngine, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let agents: Vec<Agent> = (0..n).map(|i| Agent::blank(i, i % regions)).collect();
        let economy = EconomyEngine::new(regions, n, StartCondition::Baseline, &mut rng);
        (agents, economy, rng)
    }

    #[test]
    fn assignment_uses_all_valid_ranges() {
        let (mut agents, economy, mut rng) = setup(2000, 36);
        let mut engine = LanguageEngine::new(36);
        engine.assign_by_geography(&mut agents, &economy, &mut rng);

        for agent in &agents {
            assert!((agent.primary_lang as usize) < LANGUAGE_FAMILIES);
            assert!(agent.dialect < DIALECT_COUNT);
        }
        // A 6x6 grid spans all quadrants, so multiple families appear.
        let mut families: Vec<u8> = agents.iter().map(|a| a.primary_lang).collect();
        families.sort_unstable();
        families.dedup();
        assert!(families.len() >= 3, "expected spread, got {:?}", families);
    }

    #[test]
    fn dominant_family_holds_majority_in_strong_regions() {
        let (mut agents, economy, mut rng) = setup(5000, 25);
        let mut engine = LanguageEngine::new(25);
        engine.assign_by_geography(&mut agents, &economy, &mut rng);

        for r in 0..25u32 {
            if engine.region_strength(r) < 0.6 {
                continue;
            }
            let members: Vec<&Agent> = agents.iter().filter(|a| a.region == r).collect();
            if members.len() < 30 {
                continue;
            }
            let dominant = engine.region_dominant(r);
            let dominant_speakers =
                members.iter().filter(|a| a.primary_lang == dominant).count();
            assert!(
                dominant_speakers * 2 > members.len(),
                "region {} dominant {} has {}/{}",
                r,
                dominant,
                dominant_speakers,
                members.len()
            );
        }
    }

    #[test]
    fn strength_never_drops_below_floor() {
        let (mut agents, economy, mut rng) = setup(100, 9);
        let mut engine = LanguageEngine::new(9);
        engine.assign_by_geography(&mut agents, &economy, &mut rng);
        for r in 0..9u32 {
            assert!(engine.region_strength(r) >= 0.3);
            assert!(engine.region_strength(r) <= 1.0);
        }
    }

    #[test]
    fn prestige_follows_population_and_wealth() {
        let (mut agents, economy, mut rng) = setup(100, 1);
        // 80 speakers of family 0, 20 of family 1.
        for (i, a) in agents.iter_mut().enumerate() {
            a.primary_lang = if i < 80 { 0 } else { 1 };
            a.age = 40; // nobody shifts, prestige only
        }
        let region_index: Vec<Vec<AgentId>> = vec![(0..100).collect()];
        let mut engine = LanguageEngine::new(1);
        for _ in 0..30 {
            engine.update_prestige(&mut agents, &region_index, &economy, &mut rng);
        }
        let prestige = engine.prestige(0);
        assert!(
            prestige[0] > prestige[1],
            "majority language should carry prestige: {:?}",
            prestige
        );
    }

    #[test]
    fn young_agents_shift_toward_prestige() {
        let (mut agents, economy, mut rng) = setup(200, 1);
        for (i, a) in agents.iter_mut().enumerate() {
            a.primary_lang = if i < 180 { 0 } else { 1 };
            a.age = if i < 180 { 40 } else { 20 };
            a.openness = 0.9;
            a.conformity = 0.9;
            a.b[1] = -0.8; // progressive: low shift resistance
        }
        let region_index: Vec<Vec<AgentId>> = vec![(0..200).collect()];
        let mut engine = LanguageEngine::new(1);
        let mut shifted = 0;
        for _ in 0..60 {
            shifted += engine.update_prestige(&mut agents, &region_index, &economy, &mut rng);
        }
        assert!(shifted > 0, "young minority speakers should drift");
        assert!(engine.total_shifts() >= shifted as u64);
        let remaining = agents.iter().filter(|a| a.primary_lang == 1).count();
        assert!(remaining < 20);
    }

    #[test]
    fn elders_never_shift() {
        let (mut agents, economy, mut rng) = setup(100, 1);
        for (i, a) in agents.iter_mut().enumerate() {
            a.primary_lang = if i < 90 { 0 } else { 1 };
            a.age = 50;
        }
        let region_index: Vec<Vec<AgentId>> = vec![(0..100).collect()];
        let mut engine = LanguageEngine::new(1);
        for _ in 0..50 {
            let shifts = engine.update_prestige(&mut agents, &region_index, &economy, &mut rng);
            assert_eq!(shifts, 0);
        }
    }

    #[test]
    fn canonical_dialects_are_distinct_and_in_range() {
        let mut seen = std::collections::HashSet::new();
        for family in 0..LANGUAGE_FAMILIES as u8 {
            let d = LanguageEngine::canonical_dialect(family);
            assert!(d < DIALECT_COUNT);
            seen.insert(d);
        }
        assert_eq!(seen.len(), LANGUAGE_FAMILIES);
    }
}
