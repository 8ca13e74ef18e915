//! Clustering over a stepped kernel: culture detection end to end.

use polis::core::config::SimConfig;
use polis::culture::{compute_cluster_metrics, Dbscan, KMeans};
use polis::kernel::Kernel;

fn stepped_kernel() -> Kernel {
    let mut kernel = Kernel::new(SimConfig {
        population: 2000,
        regions: 20,
        avg_connections: 8,
        seed: 42,
        ..SimConfig::default()
    })
    .unwrap();
    kernel.step_n(300);
    kernel
}

#[test]
fn kmeans_five_returns_five_nonempty_clusters() {
    let mut kernel = stepped_kernel();
    let mut km = KMeans::new(5);
    let clusters = kernel.with_snapshot(|agents, generation, rng| km.run(agents, generation, rng));

    assert_eq!(clusters.len(), 5);
    for cluster in &clusters {
        assert!(
            !cluster.members.is_empty(),
            "cluster {} came back empty",
            cluster.id
        );
        assert!((0.0..=1.0).contains(&cluster.coherence));
        assert!((0.0..=1.0).contains(&cluster.linguistic_homogeneity));
    }

    // Clusters partition the alive population.
    let total: usize = clusters.iter().map(|c| c.members.len()).sum();
    assert_eq!(total, kernel.alive_count() as usize);

    let metrics = compute_cluster_metrics(&clusters, kernel.agents());
    assert!(metrics.silhouette > 0.0, "silhouette {}", metrics.silhouette);
}

#[test]
fn dbscan_finds_structure_with_bounded_noise() {
    let mut kernel = stepped_kernel();
    let mut db = Dbscan::new(0.3, 50);
    let clusters =
        kernel.with_snapshot(|agents, generation, _| db.run(agents, generation));

    assert!(!clusters.is_empty(), "no DBSCAN clusters found");
    let alive = kernel.alive_count() as usize;
    assert!(
        db.noise_points() * 2 <= alive,
        "{} of {} agents are noise",
        db.noise_points(),
        alive
    );
}

#[test]
fn cluster_language_enrichment_is_consistent() {
    let mut kernel = stepped_kernel();
    let mut km = KMeans::new(4);
    let clusters = kernel.with_snapshot(|agents, generation, rng| km.run(agents, generation, rng));

    for cluster in &clusters {
        let share_sum: f64 = cluster.language_share.iter().sum();
        assert!((share_sum - 1.0).abs() < 1e-9, "shares sum to {}", share_sum);
        // The dominant language is the arg-max share.
        let dominant_share = cluster.language_share[cluster.dominant_lang as usize];
        for &share in &cluster.language_share {
            assert!(dominant_share >= share - 1e-12);
        }
    }
}

#[test]
fn repeated_clustering_is_deterministic_given_the_stream() {
    let mut a = stepped_kernel();
    let mut b = stepped_kernel();
    let mut km_a = KMeans::new(5);
    let mut km_b = KMeans::new(5);
    let ca = a.with_snapshot(|agents, generation, rng| km_a.run(agents, generation, rng));
    let cb = b.with_snapshot(|agents, generation, rng| km_b.run(agents, generation, rng));

    assert_eq!(ca.len(), cb.len());
    for (x, y) in ca.iter().zip(&cb) {
        assert_eq!(x.members, y.members);
        assert_eq!(x.centroid, y.centroid);
    }
}
