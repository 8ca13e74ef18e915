//! polis - interactive driver
//!
//! Reads line-oriented commands from stdin (or a script file), advances
//! the kernel between commands, and prints snapshots, metrics, and
//! analysis reports. The kernel itself never touches stdout; everything
//! user-facing lives here.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use polis::core::config::SimConfig;
use polis::culture::{compute_cluster_metrics, Cluster, Dbscan, KMeans};
use polis::io::metrics_log::MetricsLog;
use polis::io::snapshot::kernel_to_json;
use polis::kernel::Kernel;
use polis::language::FAMILY_NAMES;

#[derive(Parser)]
#[command(name = "polis", about = "Agent-based social simulator")]
struct Args {
    /// Economic start profile (baseline, postscarcity, feudal,
    /// industrial, crisis). Also honored from SIM_START_CONDITION.
    #[arg(long)]
    start: Option<String>,

    /// Command script to execute instead of reading stdin.
    script: Option<PathBuf>,
}

fn print_help() {
    eprintln!(
        "Commands:\n\
         \x20 step N             # advance N ticks, print JSON snapshot\n\
         \x20 state [traits]     # print JSON snapshot (optionally with traits)\n\
         \x20 metrics            # print current metrics\n\
         \x20 stats              # print detailed statistics\n\
         \x20 reset [N R k p [profile]]  # re-initialize the kernel\n\
         \x20 run T log          # run T ticks, log metrics every 'log' ticks\n\
         \x20 cluster kmeans K   # detect K cultures via k-means\n\
         \x20 cluster dbscan e m # detect cultures via DBSCAN (eps, minPts)\n\
         \x20 cultures           # re-print last detected cultures\n\
         \x20 economy            # global economy summary\n\
         \x20 region R           # one region's economy\n\
         \x20 classes            # emergent wealth-decile x sector classes\n\
         \x20 quit               # exit\n\
         \nOptions: --start=<profile> or SIM_START_CONDITION selects the start profile"
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polis=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut cfg = SimConfig::default();
    if let Some(start) = args
        .start
        .or_else(|| std::env::var("SIM_START_CONDITION").ok())
    {
        cfg.start_condition = start;
    }

    let mut kernel = match Kernel::new(cfg.clone()) {
        Ok(kernel) => kernel,
        Err(err) => {
            eprintln!("fatal: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let reader: Box<dyn BufRead> = match &args.script {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => {
                eprintln!("Running commands from {}", path.display());
                Box::new(io::BufReader::new(file))
            }
            Err(err) => {
                eprintln!("fatal: could not open script {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => {
            print_help();
            Box::new(io::BufReader::new(io::stdin()))
        }
    };

    let mut last_clusters: Vec<Cluster> = Vec::new();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("input error: {}", err);
                break;
            }
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            continue;
        };

        match command {
            "quit" => break,
            "help" => print_help(),
            "step" => {
                let n: u32 = tokens.get(1).and_then(|t| t.parse().ok()).unwrap_or(1).max(1);
                kernel.step_n(n);
                println!("{}", kernel_to_json(&kernel, false));
            }
            "state" => {
                let traits = tokens.get(1) == Some(&"traits");
                println!("{}", kernel_to_json(&kernel, traits));
            }
            "metrics" => print_metrics(&kernel),
            "stats" => print_stats(&kernel),
            "reset" => {
                match parse_reset(&tokens, &cfg) {
                    Some(new_cfg) => match kernel.reset(new_cfg.clone()) {
                        Ok(()) => {
                            cfg = new_cfg;
                            last_clusters.clear();
                            println!(
                                "Reset: {} agents, {} regions (start={})",
                                cfg.population, cfg.regions, cfg.start_condition
                            );
                        }
                        Err(err) => eprintln!("reset failed: {}", err),
                    },
                    None => eprintln!("Usage: reset [N R k p [profile]]"),
                }
            }
            "run" => {
                let (Some(ticks), Some(log_every)) = (
                    tokens.get(1).and_then(|t| t.parse::<u32>().ok()),
                    tokens.get(2).and_then(|t| t.parse::<u32>().ok()),
                ) else {
                    eprintln!("Usage: run T log");
                    continue;
                };
                if let Err(err) = run_logged(&mut kernel, ticks, log_every.max(1)) {
                    eprintln!("run failed: {}", err);
                }
            }
            "cluster" => match tokens.get(1).copied() {
                Some("kmeans") => {
                    let k = tokens
                        .get(2)
                        .and_then(|t| t.parse::<usize>().ok())
                        .unwrap_or(5)
                        .clamp(2, 20);
                    let mut km = KMeans::new(k);
                    last_clusters = kernel
                        .with_snapshot(|agents, generation, rng| km.run(agents, generation, rng));
                    eprintln!(
                        "K-means k={}: {} iterations (converged={})",
                        k,
                        km.iterations_used(),
                        if km.converged() { "yes" } else { "no" }
                    );
                    print_clusters(&last_clusters, &kernel);
                }
                Some("dbscan") => {
                    let eps = tokens
                        .get(2)
                        .and_then(|t| t.parse::<f64>().ok())
                        .unwrap_or(0.3);
                    let min_pts = tokens
                        .get(3)
                        .and_then(|t| t.parse::<usize>().ok())
                        .unwrap_or(50);
                    let mut db = Dbscan::new(eps, min_pts);
                    last_clusters = db.run(kernel.agents(), kernel.generation());
                    eprintln!("DBSCAN eps={} minPts={}: {} noise points", eps, min_pts, db.noise_points());
                    print_clusters(&last_clusters, &kernel);
                }
                _ => eprintln!("Usage: cluster kmeans K | cluster dbscan eps minPts"),
            },
            "cultures" => print_clusters(&last_clusters, &kernel),
            "economy" => print_economy(&kernel),
            "region" => match tokens.get(1).and_then(|t| t.parse::<u32>().ok()) {
                Some(rid) if (rid as usize) < kernel.region_index().len() => {
                    print_region(&kernel, rid)
                }
                _ => println!("Invalid region ID"),
            },
            "classes" => print_classes(&kernel),
            other => {
                eprintln!("Unknown command: {}", other);
                print_help();
            }
        }
        io::stdout().flush().ok();
    }

    ExitCode::SUCCESS
}

fn parse_reset(tokens: &[&str], current: &SimConfig) -> Option<SimConfig> {
    let mut cfg = current.clone();
    if tokens.len() == 1 {
        return Some(cfg);
    }
    cfg.population = tokens.get(1)?.parse().ok()?;
    cfg.regions = tokens.get(2)?.parse().ok()?;
    cfg.avg_connections = tokens.get(3)?.parse().ok()?;
    cfg.rewire_prob = tokens.get(4)?.parse().ok()?;
    if let Some(profile) = tokens.get(5) {
        cfg.start_condition = (*profile).to_string();
    }
    Some(cfg)
}

fn run_logged(kernel: &mut Kernel, ticks: u32, log_every: u32) -> io::Result<()> {
    let mut log = MetricsLog::open(std::path::Path::new("metrics.csv"))?;

    for t in 0..ticks {
        kernel.step();
        if (t + 1) % 100 == 0 || t + 1 == ticks {
            eprint!("Tick {}/{}\r", t + 1, ticks);
        }
        if t % log_every == 0 || t + 1 == ticks {
            let metrics = kernel.compute_metrics();
            log.append(kernel.generation(), &metrics)?;
            println!(
                "Tick {}: Pop={}, Pol={:.3}, Welfare={:.3}, Ineq={:.3}, Hard={:.3}, Trade={}",
                t + 1,
                kernel.alive_count(),
                metrics.polarization_mean,
                metrics.global_welfare,
                metrics.global_inequality,
                metrics.global_hardship,
                kernel.economy().total_trade() as i64
            );
        }
    }
    eprintln!();
    println!("Completed {} ticks. Metrics appended to metrics.csv", ticks);
    Ok(())
}

fn print_metrics(kernel: &Kernel) {
    let m = kernel.compute_metrics();
    println!("Generation: {}", kernel.generation());
    println!("Polarization: {:.4} (±{:.4})", m.polarization_mean, m.polarization_std);
    println!("Avg Openness: {:.4}", m.avg_openness);
    println!("Avg Conformity: {:.4}", m.avg_conformity);
    println!("Global Welfare: {:.4}", m.global_welfare);
    println!("Global Inequality: {:.4}", m.global_inequality);
    println!("Global Hardship: {:.4}", m.global_hardship);
}

fn print_stats(kernel: &Kernel) {
    let stats = kernel.statistics();
    println!("\n=== SIMULATION STATISTICS (Generation {}) ===\n", kernel.generation());

    if stats.alive_agents == 0 {
        println!("No alive agents!");
        return;
    }
    let alive = stats.alive_agents as f64;
    let pct = |n: u32| 100.0 * n as f64 / alive;

    println!("--- POPULATION ---");
    println!("Total agents: {}", stats.total_agents);
    println!("Alive agents: {}", stats.alive_agents);
    println!("Age range: {} - {} years", stats.min_age, stats.max_age);
    println!("Average age: {:.1} years\n", stats.avg_age);

    println!("--- AGE DISTRIBUTION ---");
    println!("Children (0-14):      {:6} ({:.1}%)", stats.children, pct(stats.children));
    println!("Young Adults (15-29): {:6} ({:.1}%)", stats.young_adults, pct(stats.young_adults));
    println!("Middle Age (30-49):   {:6} ({:.1}%)", stats.middle_age, pct(stats.middle_age));
    println!("Mature (50-69):       {:6} ({:.1}%)", stats.mature, pct(stats.mature));
    println!("Elderly (70+):        {:6} ({:.1}%)\n", stats.elderly, pct(stats.elderly));

    println!("--- GENDER ---");
    println!("Males:   {:6} ({:.1}%)", stats.males, pct(stats.males));
    println!("Females: {:6} ({:.1}%)\n", stats.females, pct(stats.females));

    println!("--- SOCIAL NETWORK ---");
    println!("Avg connections: {:.2}", stats.avg_connections);
    println!("Isolated agents: {} ({:.1}%)\n", stats.isolated_agents, pct(stats.isolated_agents));

    println!("--- BELIEFS ---");
    println!("Polarization: {:.4} (±{:.4})", stats.polarization_mean, stats.polarization_std);
    println!("Average beliefs:");
    println!("  Authority-Liberty:  {:.3}", stats.avg_beliefs[0]);
    println!("  Tradition-Progress: {:.3}", stats.avg_beliefs[1]);
    println!("  Hierarchy-Equality: {:.3}", stats.avg_beliefs[2]);
    println!("  Isolation-Unity:    {:.3}\n", stats.avg_beliefs[3]);

    println!("--- REGIONAL DISTRIBUTION ---");
    println!("Occupied regions: {} / {}", stats.occupied_regions, kernel.config().regions);
    println!("Avg population per region: {:.1}", stats.avg_region_population);
    println!("Min region population: {}", stats.min_region_population);
    println!("Max region population: {}\n", stats.max_region_population);

    println!("--- ECONOMY ---");
    println!("Global welfare: {:.3}", stats.global_welfare);
    println!("Global inequality: {:.3}", stats.global_inequality);
    println!("Average income: {:.2}\n", stats.avg_income);

    println!("--- LANGUAGES ---");
    for (family, &count) in stats.lang_counts.iter().enumerate() {
        if count > 0 {
            println!(
                "  {}: {} speakers ({:.1}%)",
                FAMILY_NAMES[family],
                count,
                pct(count)
            );
        }
    }
    println!("  (Geographic zones: NW=Western, NE=Eastern, SW=Northern, SE=Southern)\n");
}

fn print_clusters(clusters: &[Cluster], kernel: &Kernel) {
    if clusters.is_empty() {
        println!("No cultures detected. Run a 'cluster' command first.");
        return;
    }

    let metrics = compute_cluster_metrics(clusters, kernel.agents());
    println!("\n=== Cultural Clusters (generation {}) ===", kernel.generation());
    println!("Total clusters: {}", clusters.len());
    println!("Within variance: {:.4}", metrics.within_variance);
    println!("Between variance: {:.4}", metrics.between_variance);
    println!("Silhouette: {:.4}", metrics.silhouette);
    println!("Diversity: {:.4}\n", metrics.diversity);

    for cluster in clusters {
        println!(
            "Cluster {} [{} agents, coherence={:.2}]",
            cluster.id,
            cluster.members.len(),
            cluster.coherence
        );
        println!(
            "  Centroid: [{:.3}, {:.3}, {:.3}, {:.3}]",
            cluster.centroid[0], cluster.centroid[1], cluster.centroid[2], cluster.centroid[3]
        );
        println!(
            "  Dominant language: {} (dialect {}), homogeneity={:.1}%",
            FAMILY_NAMES[cluster.dominant_lang as usize],
            cluster.dominant_dialect,
            cluster.linguistic_homogeneity * 100.0
        );

        print!("  Language mix: ");
        let mut any = false;
        for (family, &share) in cluster.language_share.iter().enumerate() {
            if share > 0.01 {
                any = true;
                print!("{}={:.1}% ", FAMILY_NAMES[family], share * 100.0);
            }
        }
        if !any {
            print!("n/a");
        }
        println!();

        print!("  Top regions: ");
        if cluster.top_regions.is_empty() {
            print!("n/a");
        } else {
            for (region, share) in &cluster.top_regions {
                print!("R{}={:.1}% ", region, share * 100.0);
            }
        }
        println!("\n");
    }
}

fn print_economy(kernel: &Kernel) {
    let economy = kernel.economy();
    println!("\n=== Global Economy (Generation {}) ===", kernel.generation());
    println!("Global Development: {:.3}", economy.global_development());
    println!("Total Trade Volume: {:.3}", economy.total_trade());
    println!("Welfare: {:.3}", economy.global_welfare());
    println!("Inequality (Gini): {:.3}", economy.global_inequality());
    println!("Hardship: {:.3}", economy.global_hardship());

    let mut system_counts: std::collections::BTreeMap<&str, u32> = Default::default();
    for region in economy.regions() {
        if region.population > 0 {
            *system_counts.entry(region.system.current.name()).or_default() += 1;
        }
    }
    println!("\nEconomic Systems:");
    for (system, count) in system_counts {
        println!("  {}: {} regions", system, count);
    }
    println!();
}

fn print_region(kernel: &Kernel, rid: u32) {
    let region = kernel.economy().region(rid);
    println!("\n=== Region {} ===", rid);

    let quadrant = match (region.x < 0.5, region.y >= 0.5) {
        (true, true) => "Northwest (Western)",
        (false, true) => "Northeast (Eastern)",
        (true, false) => "Southwest (Northern)",
        (false, false) => "Southeast (Southern)",
    };
    println!("Location: ({:.3}, {:.3}) - {}\n", region.x, region.y, quadrant);

    println!("Population: {}", region.population);
    println!("Economic System: {}", region.system.current.name());
    println!("System Stability: {:.3}", region.system.stability);
    println!("Development: {:.3}", region.development);
    println!("Efficiency: {:.3}\n", region.efficiency);

    let row = |label: &str, values: &[f64; 5]| {
        println!(
            "{}: Food={:.3}, Energy={:.3}, Tools={:.3}, Luxury={:.3}, Services={:.3}",
            label, values[0], values[1], values[2], values[3], values[4]
        );
    };
    row("Production", &region.production);
    row("Specialization", &region.specialization);
    row("Consumption", &region.consumption);
    row("Trade balance", &region.trade_balance);
    row("Prices", &region.prices);

    println!("\nWelfare: {:.3}", region.welfare);
    println!("Inequality: {:.3}", region.inequality);
    println!("Hardship: {:.3}", region.hardship);
    println!(
        "Wealth Distribution: Top 10%={:.1}%, Bottom 50%={:.1}%\n",
        region.wealth_top_10 * 100.0,
        region.wealth_bottom_50 * 100.0
    );
}

fn print_classes(kernel: &Kernel) {
    let economies = kernel.economy().agent_economies();
    let mut wealths: Vec<f64> = kernel
        .agents()
        .iter()
        .filter(|a| a.alive)
        .filter_map(|a| economies.get(a.id as usize).map(|e| e.wealth))
        .collect();
    if wealths.is_empty() {
        println!("No alive agents!");
        return;
    }
    wealths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut classes: std::collections::BTreeMap<(usize, usize), u32> = Default::default();
    for agent in kernel.agents().iter().filter(|a| a.alive) {
        let Some(econ) = economies.get(agent.id as usize) else {
            continue;
        };
        let rank = wealths.partition_point(|&w| w < econ.wealth);
        let decile = (rank * 10 / wealths.len()).min(9);
        *classes.entry((decile, econ.sector)).or_default() += 1;
    }

    println!("\n=== Emergent Economic Classes ===");
    println!("Format: Class(wealth_decile, sector): count agents");
    println!("Sectors: 0=Food, 1=Energy, 2=Tools, 3=Luxury, 4=Services\n");
    for ((decile, sector), count) in classes {
        println!("Class({},{}): {} agents", decile, sector, count);
    }
    println!();
}
