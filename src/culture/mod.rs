//! Culture detection: clustering over the 4-D belief space.
//!
//! K-means (k-means++ seeding, reseed-on-empty) and DBSCAN both operate
//! on a snapshot of alive agents' beliefs and return enriched clusters:
//! centroid, coherence, language composition, and the regions a culture
//! concentrates in. Clusters are transient values owned by the caller.

use ahash::AHashMap;
use rand::Rng;

use crate::agent::Agent;
use crate::core::rand_util;
use crate::core::types::{dist, dist_sq, AgentId, BeliefVec, RegionId, BELIEF_DIMS};
use crate::language::LANGUAGE_FAMILIES;

/// One detected culture.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    pub id: u32,
    pub centroid: BeliefVec,
    pub members: Vec<AgentId>,
    /// 1 − mean intra-cluster belief variance, clamped to [0, 1].
    pub coherence: f64,
    pub language_share: [f64; LANGUAGE_FAMILIES],
    pub dominant_lang: u8,
    pub dominant_dialect: u8,
    /// (Σ share² − 0.25) / 0.75: 0 = uniform across families, 1 = one
    /// family.
    pub linguistic_homogeneity: f64,
    /// Top-5 regions by member share.
    pub top_regions: Vec<(RegionId, f64)>,
    pub birth_tick: u64,
}

/// Aggregate quality metrics over one clustering result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterMetrics {
    pub within_variance: f64,
    pub between_variance: f64,
    pub silhouette: f64,
    /// Shannon entropy over cluster sizes (bits).
    pub diversity: f64,
}

fn alive_indices(agents: &[Agent]) -> Vec<usize> {
    agents
        .iter()
        .enumerate()
        .filter(|(_, a)| a.alive)
        .map(|(i, _)| i)
        .collect()
}

pub struct KMeans {
    k: usize,
    max_iter: usize,
    tolerance: f64,
    iterations_used: usize,
    converged: bool,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self::with_limits(k, 50, 1e-4)
    }

    pub fn with_limits(k: usize, max_iter: usize, tolerance: f64) -> Self {
        Self {
            k: k.max(2),
            max_iter: max_iter.max(1),
            tolerance: tolerance.max(1e-6),
            iterations_used: 0,
            converged: false,
        }
    }

    pub fn iterations_used(&self) -> usize {
        self.iterations_used
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// k-means++ seeding: each next centroid is drawn proportionally to
    /// squared distance from the nearest existing one.
    fn initialize<R: Rng>(
        &self,
        agents: &[Agent],
        alive: &[usize],
        rng: &mut R,
    ) -> Vec<BeliefVec> {
        let mut centroids: Vec<BeliefVec> = Vec::with_capacity(self.k);
        centroids.push(agents[alive[rng.gen_range(0..alive.len())]].b);

        while centroids.len() < self.k {
            let weights: Vec<f64> = alive
                .iter()
                .map(|&i| {
                    centroids
                        .iter()
                        .map(|c| dist_sq(&agents[i].b, c))
                        .fold(f64::MAX, f64::min)
                })
                .collect();
            let pick = rand_util::weighted_index(rng, &weights);
            centroids.push(agents[alive[pick]].b);
        }
        centroids
    }

    fn assign(
        agents: &[Agent],
        alive: &[usize],
        centroids: &[BeliefVec],
        assignment: &mut Vec<usize>,
    ) {
        assignment.clear();
        assignment.extend(alive.iter().map(|&i| {
            let mut best = 0usize;
            let mut best_sq = f64::MAX;
            for (k, c) in centroids.iter().enumerate() {
                let d2 = dist_sq(&agents[i].b, c);
                if d2 < best_sq {
                    best_sq = d2;
                    best = k;
                }
            }
            best
        }));
    }

    fn update_centroids<R: Rng>(
        &self,
        agents: &[Agent],
        alive: &[usize],
        assignment: &[usize],
        centroids: &mut [BeliefVec],
        rng: &mut R,
    ) {
        let mut sums = vec![[0.0f64; BELIEF_DIMS]; self.k];
        let mut counts = vec![0usize; self.k];
        for (pos, &i) in alive.iter().enumerate() {
            let cluster = assignment[pos];
            for d in 0..BELIEF_DIMS {
                sums[cluster][d] += agents[i].b[d];
            }
            counts[cluster] += 1;
        }
        for k in 0..self.k {
            if counts[k] == 0 {
                // Dead centroid: reseed from a random agent.
                centroids[k] = agents[alive[rng.gen_range(0..alive.len())]].b;
            } else {
                for d in 0..BELIEF_DIMS {
                    centroids[k][d] = sums[k][d] / counts[k] as f64;
                }
            }
        }
    }

    fn inertia(
        agents: &[Agent],
        alive: &[usize],
        centroids: &[BeliefVec],
        assignment: &[usize],
    ) -> f64 {
        alive
            .iter()
            .enumerate()
            .map(|(pos, &i)| dist_sq(&agents[i].b, &centroids[assignment[pos]]))
            .sum()
    }

    pub fn run<R: Rng>(
        &mut self,
        agents: &[Agent],
        generation: u64,
        rng: &mut R,
    ) -> Vec<Cluster> {
        let alive = alive_indices(agents);
        if alive.is_empty() {
            return Vec::new();
        }

        let mut centroids = self.initialize(agents, &alive, rng);
        let mut assignment: Vec<usize> = Vec::with_capacity(alive.len());
        let mut prev_inertia = f64::MAX;
        self.converged = false;
        self.iterations_used = 0;

        while self.iterations_used < self.max_iter {
            self.iterations_used += 1;
            Self::assign(agents, &alive, &centroids, &mut assignment);
            self.update_centroids(agents, &alive, &assignment, &mut centroids, rng);
            let current = Self::inertia(agents, &alive, &centroids, &assignment);
            if (prev_inertia - current).abs() < self.tolerance {
                self.converged = true;
                break;
            }
            prev_inertia = current;
        }

        let mut clusters: Vec<Cluster> = (0..self.k)
            .map(|k| Cluster {
                id: k as u32,
                centroid: centroids[k],
                birth_tick: generation,
                ..Cluster::default()
            })
            .collect();
        for (pos, &i) in alive.iter().enumerate() {
            clusters[assignment[pos]].members.push(agents[i].id);
        }

        enrich_clusters(&mut clusters, agents);
        clusters
    }
}

pub struct Dbscan {
    eps: f64,
    min_pts: usize,
    noise_points: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_pts: usize) -> Self {
        Self {
            eps: eps.max(1e-3),
            min_pts: min_pts.max(2),
            noise_points: 0,
        }
    }

    pub fn noise_points(&self) -> usize {
        self.noise_points
    }

    fn region_query(&self, points: &[BeliefVec], idx: usize) -> Vec<usize> {
        let eps_sq = self.eps * self.eps;
        let origin = points[idx];
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| dist_sq(&origin, p) <= eps_sq)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn run(&mut self, agents: &[Agent], generation: u64) -> Vec<Cluster> {
        let alive = alive_indices(agents);
        let points: Vec<BeliefVec> = alive.iter().map(|&i| agents[i].b).collect();

        // 0 = unvisited, -1 = noise, n > 0 = cluster n.
        let mut labels = vec![0i32; points.len()];
        let mut cluster_id = 0i32;
        self.noise_points = 0;

        for i in 0..points.len() {
            if labels[i] != 0 {
                continue;
            }
            let mut neighbors = self.region_query(&points, i);
            if neighbors.len() < self.min_pts {
                labels[i] = -1;
                self.noise_points += 1;
            } else {
                cluster_id += 1;
                labels[i] = cluster_id;
                let mut cursor = 0;
                while cursor < neighbors.len() {
                    let j = neighbors[cursor];
                    cursor += 1;
                    if labels[j] == -1 {
                        labels[j] = cluster_id;
                        self.noise_points -= 1;
                    }
                    if labels[j] != 0 {
                        continue;
                    }
                    labels[j] = cluster_id;
                    let expansion = self.region_query(&points, j);
                    if expansion.len() >= self.min_pts {
                        neighbors.extend(expansion);
                    }
                }
            }
        }

        let mut by_id: AHashMap<i32, Cluster> = AHashMap::new();
        for (pos, &label) in labels.iter().enumerate() {
            if label <= 0 {
                continue;
            }
            let cluster = by_id.entry(label).or_insert_with(|| Cluster {
                id: (label - 1) as u32,
                birth_tick: generation,
                ..Cluster::default()
            });
            cluster.members.push(agents[alive[pos]].id);
        }

        let mut clusters: Vec<Cluster> = by_id.into_values().collect();
        clusters.sort_by_key(|c| c.id);
        enrich_clusters(&mut clusters, agents);
        clusters
    }
}

/// Fill in centroid, coherence, language composition, and top regions
/// for each cluster.
pub fn enrich_clusters(clusters: &mut [Cluster], agents: &[Agent]) {
    for cluster in clusters.iter_mut() {
        if cluster.members.is_empty() {
            continue;
        }
        let n = cluster.members.len() as f64;

        let mut sum = [0.0f64; BELIEF_DIMS];
        let mut sum_sq = [0.0f64; BELIEF_DIMS];
        let mut langs = [0usize; LANGUAGE_FAMILIES];
        let mut region_counts: AHashMap<RegionId, usize> = AHashMap::new();
        let mut dialect_counts: AHashMap<(u8, u8), usize> = AHashMap::new();

        for &id in &cluster.members {
            let Some(agent) = agents.get(id as usize) else {
                continue;
            };
            for d in 0..BELIEF_DIMS {
                sum[d] += agent.b[d];
                sum_sq[d] += agent.b[d] * agent.b[d];
            }
            langs[(agent.primary_lang as usize).min(LANGUAGE_FAMILIES - 1)] += 1;
            *region_counts.entry(agent.region).or_default() += 1;
            *dialect_counts
                .entry((agent.primary_lang, agent.dialect))
                .or_default() += 1;
        }

        for d in 0..BELIEF_DIMS {
            cluster.centroid[d] = sum[d] / n;
        }

        let variance: f64 = (0..BELIEF_DIMS)
            .map(|d| {
                let mean = cluster.centroid[d];
                (sum_sq[d] / n - mean * mean).max(0.0)
            })
            .sum::<f64>()
            / BELIEF_DIMS as f64;
        cluster.coherence = (1.0 - variance).clamp(0.0, 1.0);

        let mut best_lang = 0usize;
        for l in 0..LANGUAGE_FAMILIES {
            cluster.language_share[l] = langs[l] as f64 / n;
            if langs[l] > langs[best_lang] {
                best_lang = l;
            }
        }
        cluster.dominant_lang = best_lang as u8;

        cluster.dominant_dialect = dialect_counts
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(&(_, dialect), _)| dialect)
            .unwrap_or(0);

        let share_sq: f64 = cluster.language_share.iter().map(|s| s * s).sum();
        cluster.linguistic_homogeneity = ((share_sq - 0.25) / 0.75).max(0.0);

        let mut regions: Vec<(RegionId, usize)> = region_counts.into_iter().collect();
        regions.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        cluster.top_regions = regions
            .into_iter()
            .take(5)
            .map(|(r, count)| (r, count as f64 / n))
            .collect();
    }
}

/// Within/between variance, a silhouette approximation, and size
/// diversity over a clustering result.
pub fn compute_cluster_metrics(clusters: &[Cluster], agents: &[Agent]) -> ClusterMetrics {
    let mut metrics = ClusterMetrics::default();
    let alive_count = agents.iter().filter(|a| a.alive).count();
    if alive_count == 0 || clusters.is_empty() {
        return metrics;
    }
    let population = alive_count as f64;

    let mut total_within = 0.0;
    for cluster in clusters {
        for &id in &cluster.members {
            if let Some(agent) = agents.get(id as usize) {
                let d = dist(&agent.b, &cluster.centroid);
                total_within += d * d;
            }
        }
    }
    metrics.within_variance = total_within / population;

    let mut global = [0.0f64; BELIEF_DIMS];
    for agent in agents.iter().filter(|a| a.alive) {
        for d in 0..BELIEF_DIMS {
            global[d] += agent.b[d];
        }
    }
    for g in &mut global {
        *g /= population;
    }

    let mut between = 0.0;
    for cluster in clusters {
        if cluster.members.is_empty() {
            continue;
        }
        let weight = cluster.members.len() as f64 / population;
        let d = dist(&cluster.centroid, &global);
        between += weight * d * d;
    }
    metrics.between_variance = between;

    let denom = metrics.within_variance.max(metrics.between_variance);
    if denom > 0.0 {
        metrics.silhouette = (metrics.between_variance - metrics.within_variance) / denom;
    }

    let mut entropy = 0.0;
    for cluster in clusters {
        if cluster.members.is_empty() {
            continue;
        }
        let p = cluster.members.len() as f64 / population;
        entropy -= p * p.max(1e-12).log2();
    }
    metrics.diversity = entropy;

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population_with_poles() -> Vec<Agent> {
        // Two tight camps at opposite corners of one belief axis.
        let mut agents = Vec::new();
        for i in 0..60u32 {
            let mut a = Agent::blank(i, (i % 3) as RegionId);
            let b = if i < 30 {
                [0.8, 0.7, 0.0, 0.0]
            } else {
                [-0.8, -0.7, 0.0, 0.0]
            };
            a.set_beliefs_observable(b);
            a.primary_lang = if i < 30 { 0 } else { 2 };
            agents.push(a);
        }
        agents
    }

    #[test]
    fn kmeans_separates_two_camps() {
        let agents = population_with_poles();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut km = KMeans::new(2);
        let clusters = km.run(&agents, 0, &mut rng);

        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            assert_eq!(cluster.members.len(), 30);
            assert!(cluster.coherence > 0.9, "coherence {}", cluster.coherence);
            // Camps are linguistically pure.
            assert!(cluster.linguistic_homogeneity > 0.9);
        }
        assert!(km.converged());
    }

    #[test]
    fn kmeans_on_empty_population_returns_nothing() {
        let mut agents = population_with_poles();
        for a in agents.iter_mut() {
            a.alive = false;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let clusters = KMeans::new(3).run(&agents, 0, &mut rng);
        assert!(clusters.is_empty());
    }

    #[test]
    fn kmeans_ignores_dead_agents() {
        let mut agents = population_with_poles();
        // Kill one camp entirely.
        for a in agents.iter_mut().skip(30) {
            a.alive = false;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let clusters = KMeans::new(2).run(&agents, 0, &mut rng);
        let total: usize = clusters.iter().map(|c| c.members.len()).sum();
        assert_eq!(total, 30);
        for cluster in &clusters {
            for &id in &cluster.members {
                assert!(agents[id as usize].alive);
            }
        }
    }

    #[test]
    fn dbscan_finds_dense_camps_and_labels_noise() {
        let mut agents = population_with_poles();
        // A handful of scattered outliers.
        for i in 60..66u32 {
            let mut a = Agent::blank(i, 0);
            let spread = (i as f64 - 62.5) / 5.0;
            a.set_beliefs_observable([spread, -spread, 0.5 * spread, 0.3]);
            agents.push(a);
        }

        let mut db = Dbscan::new(0.3, 5);
        let clusters = db.run(&agents, 0);
        assert!(clusters.len() >= 2, "found {} clusters", clusters.len());
        assert!(db.noise_points() <= 6);

        let clustered: usize = clusters.iter().map(|c| c.members.len()).sum();
        assert!(clustered >= 60);
    }

    #[test]
    fn dbscan_all_noise_when_eps_is_tiny() {
        let mut agents = Vec::new();
        for i in 0..20u32 {
            let mut a = Agent::blank(i, 0);
            let x = i as f64 / 10.0 - 1.0;
            a.set_beliefs_observable([x, -x, x * 0.5, -x * 0.5]);
            agents.push(a);
        }
        let mut db = Dbscan::new(0.001, 5);
        let clusters = db.run(&agents, 0);
        assert!(clusters.is_empty());
        assert_eq!(db.noise_points(), 20);
    }

    #[test]
    fn enrichment_reports_top_regions_by_share() {
        let agents = population_with_poles();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let clusters = KMeans::new(2).run(&agents, 0, &mut rng);
        for cluster in &clusters {
            assert!(!cluster.top_regions.is_empty());
            assert!(cluster.top_regions.len() <= 5);
            let total_share: f64 = cluster.top_regions.iter().map(|(_, s)| s).sum();
            assert!(total_share <= 1.0 + 1e-9);
            // Shares are sorted descending.
            for pair in cluster.top_regions.windows(2) {
                assert!(pair[0].1 >= pair[1].1 - 1e-12);
            }
        }
    }

    #[test]
    fn metrics_reward_separated_clusters() {
        let agents = population_with_poles();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let clusters = KMeans::new(2).run(&agents, 0, &mut rng);
        let metrics = compute_cluster_metrics(&clusters, &agents);
        assert!(metrics.silhouette > 0.0, "silhouette {}", metrics.silhouette);
        assert!(metrics.between_variance > metrics.within_variance);
        // Two equal clusters have one bit of size entropy.
        assert!((metrics.diversity - 1.0).abs() < 0.1);
    }
}
