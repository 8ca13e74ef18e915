//! Social graph construction and maintenance.
//!
//! The initial topology is a Watts–Strogatz small world: a ring lattice
//! with k/2 forward edges per node, then per-edge rewiring at probability
//! p. After migrations thin an agent's local circle, a periodic
//! reconnection pass tops agents back up to a sociality-derived minimum
//! using scored candidates from their region.

use ahash::AHashSet;
use rand::Rng;

use crate::agent::Agent;
use crate::core::types::{cosine_similarity, AgentId};

/// Build the initial small-world graph over all agents.
///
/// `k` is rounded up to even. Edges are reciprocal; the final pass strips
/// self-loops and duplicates so every adjacency list is a set.
pub fn build_small_world<R: Rng>(agents: &mut [Agent], k: u32, rewire_prob: f64, rng: &mut R) {
    let n = agents.len();
    if n < 2 {
        return;
    }
    let k = if k % 2 == 1 { k + 1 } else { k };
    let half_k = (k / 2) as usize;

    for agent in agents.iter_mut() {
        agent.neighbors.clear();
        agent.neighbors.reserve(k as usize);
    }

    // Ring lattice: forward edges only, mirrored onto the target.
    for i in 0..n {
        for d in 1..=half_k.min(n - 1) {
            let j = (i + d) % n;
            agents[i].neighbors.push(j as AgentId);
            agents[j].neighbors.push(i as AgentId);
        }
    }

    // Rewire each forward ring edge with probability p. Bounded retries
    // keep pathological dense graphs from spinning.
    let max_attempts = (n * 2) as u32;
    for i in 0..n {
        let mut current: AHashSet<AgentId> = agents[i].neighbors.iter().copied().collect();

        for d in 1..=half_k.min(n - 1) {
            if rng.gen_range(0.0..1.0) >= rewire_prob {
                continue;
            }
            let old_j = ((i + d) % n) as AgentId;
            if !current.contains(&old_j) {
                continue; // already rewired away from the other side
            }

            let mut new_j;
            let mut attempts = 0u32;
            loop {
                new_j = rng.gen_range(0..n as u32);
                attempts += 1;
                if attempts > max_attempts {
                    break;
                }
                if new_j != i as AgentId && !current.contains(&new_j) {
                    break;
                }
            }
            if attempts > max_attempts {
                continue;
            }

            agents[i].neighbors.retain(|&x| x != old_j);
            agents[old_j as usize].neighbors.retain(|&x| x != i as AgentId);
            current.remove(&old_j);

            agents[i].neighbors.push(new_j);
            agents[new_j as usize].neighbors.push(i as AgentId);
            current.insert(new_j);
        }
    }

    // Final cleanup: dedup and strip self-loops.
    for i in 0..n {
        let mut seen = AHashSet::with_capacity(agents[i].neighbors.len());
        let id = agents[i].id;
        agents[i]
            .neighbors
            .retain(|&nid| nid != id && seen.insert(nid));
    }
}

/// At most this share of the population gains new edges per
/// reconnection pass.
const RECONNECT_BUDGET_SHARE: f64 = 0.01;

/// Candidates examined per under-connected agent.
const CANDIDATE_SAMPLE: usize = 50;

/// Top agents back up to their sociality-derived minimum of active local
/// neighbors. Returns how many agents gained edges.
///
/// A neighbor counts as active when it is alive and lives in the same
/// region; migrants therefore read as isolated at their destination even
/// while their long-distance ties persist.
pub fn reconnect_isolated<R: Rng>(
    agents: &mut Vec<Agent>,
    region_index: &[Vec<AgentId>],
    rng: &mut R,
) -> usize {
    let n = agents.len();
    let budget = ((n as f64 * RECONNECT_BUDGET_SHARE).floor() as usize).max(1);
    let mut reconnected = 0usize;

    for i in 0..n {
        if reconnected >= budget {
            break;
        }
        if !agents[i].alive {
            continue;
        }

        let region = agents[i].region as usize;
        if region >= region_index.len() {
            continue;
        }

        let active_local = agents[i]
            .neighbors
            .iter()
            .filter(|&&j| {
                agents
                    .get(j as usize)
                    .map(|nb| nb.alive && nb.region == agents[i].region)
                    .unwrap_or(false)
            })
            .count();

        let target = 2 + (4.0 * agents[i].sociality).floor() as usize;
        if active_local >= target {
            continue;
        }
        let wanted = target - active_local;

        let candidates = sample_candidates(&agents[i], &region_index[region], agents, rng);
        if candidates.is_empty() {
            continue;
        }

        let mut scored: Vec<(f64, AgentId)> = candidates
            .into_iter()
            .map(|cid| (score_candidate(&agents[i], &agents[cid as usize], rng), cid))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut added = 0usize;
        for (score, cid) in scored {
            if added >= wanted {
                break;
            }
            if rng.gen_range(0.0..1.0) < 0.3 + 0.5 * score {
                agents[i].neighbors.push(cid);
                agents[cid as usize].neighbors.push(i as AgentId);
                added += 1;
            }
        }
        if added > 0 {
            reconnected += 1;
        }
    }

    reconnected
}

/// Uniform sample (≤ 50) of valid partners from the agent's region:
/// alive, not self, not already connected.
fn sample_candidates<R: Rng>(
    agent: &Agent,
    members: &[AgentId],
    agents: &[Agent],
    rng: &mut R,
) -> Vec<AgentId> {
    let existing: AHashSet<AgentId> = agent.neighbors.iter().copied().collect();
    let valid = |cid: AgentId| {
        cid != agent.id
            && (cid as usize) < agents.len()
            && agents[cid as usize].alive
            && !existing.contains(&cid)
    };

    if members.len() <= CANDIDATE_SAMPLE {
        return members.iter().copied().filter(|&c| valid(c)).collect();
    }

    // Partial Fisher–Yates over a scratch copy.
    let mut pool: Vec<AgentId> = members.to_vec();
    let mut out = Vec::with_capacity(CANDIDATE_SAMPLE);
    let mut end = pool.len();
    while out.len() < CANDIDATE_SAMPLE && end > 0 {
        let pick = rng.gen_range(0..end);
        let cid = pool[pick];
        pool.swap(pick, end - 1);
        end -= 1;
        if valid(cid) {
            out.push(cid);
        }
    }
    out
}

/// Affinity score: belief alignment, shared language, age proximity, and
/// the candidate's own sociality, plus a little noise so ties break
/// differently each pass.
fn score_candidate<R: Rng>(agent: &Agent, candidate: &Agent, rng: &mut R) -> f64 {
    let cos = cosine_similarity(&agent.b, agent.b_norm_sq, &candidate.b, candidate.b_norm_sq);
    let same_lang = if agent.primary_lang == candidate.primary_lang {
        1.0
    } else {
        0.0
    };
    let age_affinity = 0.2 / (1.0 + (agent.age - candidate.age).abs() as f64 / 10.0);
    0.4 * cos + 0.3 * same_lang + age_affinity + 0.1 * candidate.sociality
        + rng.gen_range(-0.05..0.05)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population(n: usize) -> Vec<Agent> {
        (0..n).map(|i| Agent::blank(i as u32, 0)).collect()
    }

    fn assert_valid_graph(agents: &[Agent]) {
        for a in agents {
            let mut seen = AHashSet::new();
            for &nid in &a.neighbors {
                assert_ne!(nid, a.id, "self-loop on {}", a.id);
                assert!((nid as usize) < agents.len(), "dangling edge {}", nid);
                assert!(seen.insert(nid), "duplicate edge {} -> {}", a.id, nid);
            }
        }
    }

    #[test]
    fn ring_lattice_without_rewiring_has_degree_k() {
        let mut agents = population(100);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        build_small_world(&mut agents, 6, 0.0, &mut rng);
        for a in &agents {
            assert_eq!(a.neighbors.len(), 6);
        }
        assert_valid_graph(&agents);
    }

    #[test]
    fn odd_k_rounds_up_to_even() {
        let mut agents = population(50);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        build_small_world(&mut agents, 5, 0.0, &mut rng);
        for a in &agents {
            assert_eq!(a.neighbors.len(), 6);
        }
    }

    #[test]
    fn rewired_graph_stays_valid_and_keeps_edge_count() {
        let mut agents = population(500);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        build_small_world(&mut agents, 8, 0.3, &mut rng);
        assert_valid_graph(&agents);

        // Rewiring moves edges, it does not create or destroy them.
        let total_edges: usize = agents.iter().map(|a| a.neighbors.len()).sum();
        assert_eq!(total_edges, 500 * 8);
    }

    #[test]
    fn rewiring_breaks_pure_ring_structure() {
        let mut agents = population(400);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        build_small_world(&mut agents, 8, 0.5, &mut rng);

        let n = agents.len() as i64;
        let mut long_range = 0usize;
        for a in &agents {
            for &nid in &a.neighbors {
                let dist = (a.id as i64 - nid as i64).rem_euclid(n).min(
                    (nid as i64 - a.id as i64).rem_euclid(n),
                );
                if dist > 4 {
                    long_range += 1;
                }
            }
        }
        assert!(long_range > 100, "expected long-range edges, got {}", long_range);
    }

    #[test]
    fn reconnection_tops_up_an_isolated_agent() {
        let mut agents = population(60);
        // Everyone in region 0; agent 0 has no edges, others form a ring.
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        build_small_world(&mut agents, 4, 0.0, &mut rng);
        let orphan_neighbors = agents[0].neighbors.clone();
        for nid in orphan_neighbors {
            agents[nid as usize].neighbors.retain(|&x| x != 0);
        }
        agents[0].neighbors.clear();
        agents[0].sociality = 1.0; // target = 6

        let region_index: Vec<Vec<AgentId>> = vec![(0..60).collect()];
        let mut gained = 0;
        for _ in 0..20 {
            reconnect_isolated(&mut agents, &region_index, &mut rng);
            gained = agents[0].neighbors.len();
            if gained >= 2 {
                break;
            }
        }
        assert!(gained > 0, "orphan should regain edges");
        assert_valid_graph(&agents);
        // Reciprocity of fresh edges.
        for &nid in &agents[0].neighbors {
            assert!(agents[nid as usize].neighbors.contains(&0));
        }
    }

    #[test]
    fn reconnection_respects_population_budget() {
        let mut agents = population(200);
        for a in agents.iter_mut() {
            a.sociality = 1.0; // everyone wants 6 local neighbors
        }
        let region_index: Vec<Vec<AgentId>> = vec![(0..200).collect()];
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let changed = reconnect_isolated(&mut agents, &region_index, &mut rng);
        assert!(changed <= 2, "budget is 1% of 200 = 2, got {}", changed);
    }
}
