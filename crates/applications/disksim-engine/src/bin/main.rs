//! DiskSim CLI
//!
//! Command-line interface for running disk head scheduling simulations
//!
//! ```bash
//! disksim -a FCFS -i 25 -r 7000
//! disksim --compare --seed 7
//! RUST_LOG=disksim_engine=debug disksim -a SCAN -n 20
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disksim_engine::{Algorithm, Monitor, SimConfig, Simulation, SimulationResult};

/// Inter-arrival times (ms) used by the comparison matrix
const COMPARE_INTER_ARRIVALS: [f64; 2] = [150.0, 5.0];

/// Disk speeds (rpm) used by the comparison matrix
const COMPARE_RPMS: [u32; 2] = [10000, 7200];

#[derive(Parser, Debug)]
#[command(name = "disksim")]
#[command(about = "Simulate disk head scheduling algorithms", long_about = None)]
struct Args {
    /// Head scheduling algorithm
    #[arg(short, long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Mean inter-arrival time of requests in ms (gaps are uniform on [0, 2x))
    #[arg(short, long)]
    inter_arrival: Option<f64>,

    /// Disk rotations per minute
    #[arg(short, long)]
    rpm: Option<u32>,

    /// Number of requests to generate
    #[arg(short = 'n', long)]
    requests: Option<usize>,

    /// Virtual time ceiling in ms
    #[arg(long)]
    max_time: Option<f64>,

    /// Random seed (runs with the same seed and settings are identical)
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run every algorithm against the standard inter-arrival/rpm matrix
    #[arg(long)]
    compare: bool,

    /// Print an access-time histogram with this many bins
    #[arg(long, default_value_t = 0)]
    histogram_bins: usize,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SimConfig::default(),
        };

        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(inter_arrival) = self.inter_arrival {
            config.mean_inter_arrival = inter_arrival;
        }
        if let Some(rpm) = self.rpm {
            config.disk_rpm = rpm;
        }
        if let Some(requests) = self.requests {
            config.request_count = requests;
        }
        if let Some(max_time) = self.max_time {
            config.max_virtual_time = max_time;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "disksim=info,disksim_engine=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.to_config()?;

    let results = if args.compare {
        run_comparison(config)?
    } else {
        print_configuration(&config);
        let result = Simulation::from_config(config)?.run()?;
        print_result(&result);
        if args.histogram_bins > 0 {
            print_histogram(&result.stats.access, args.histogram_bins)?;
        }
        vec![result]
    };

    if let Some(output_path) = args.output {
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(&output_path, json)
            .with_context(|| format!("writing results to {}", output_path.display()))?;
        info!(path = %output_path.display(), runs = results.len(), "results saved");
    }

    Ok(())
}

fn print_configuration(config: &SimConfig) {
    println!("Configuration:");
    println!("  Algorithm: {}", config.algorithm);
    println!("  Inter-arrival: {} ms", config.mean_inter_arrival);
    println!("  Disk RPM: {}", config.disk_rpm);
    println!("  Requests: {}", config.request_count);
    if let Some(seed) = config.seed {
        println!("  Seed: {seed}");
    }
    println!();
}

fn print_result(result: &SimulationResult) {
    println!("Average seek time: {:.6} ms", result.average_seek_time);
    println!("Average rotational latency: {:.6} ms", result.average_rotational_latency);
    println!("Average access time: {:.6} ms", result.average_access_time);
    println!(
        "Wait time: average {:.6} ms, max {:.6} ms",
        result.average_wait_time, result.max_wait_time
    );
    println!("Total access time: {:.6} ms", result.total_access_time);
    println!("Total disk arm movement: {} tracks", result.total_arm_movement);
    println!("Average queue length: {:.3}", result.average_queue_length);
    println!("Throughput: {:.6} bytes/ms", result.throughput);
    println!("Total execution time: {:.6} ms", result.elapsed_time);
    if result.unserved_requests > 0 {
        println!(
            "Unserved requests: {} of {}",
            result.unserved_requests,
            result.unserved_requests + result.completed_requests
        );
    }
}

fn print_histogram(monitor: &Monitor, bins: usize) -> anyhow::Result<()> {
    let (Some(low), Some(high)) = (monitor.min(), monitor.max()) else {
        return Ok(());
    };
    // Nudge the upper edge so the maximum lands in the last bin
    let high = if high > low { high + (high - low) * 1e-9 } else { low + 1.0 };
    let histogram = monitor.histogram(low, high, bins)?;

    println!("\n{} histogram:", monitor.name());
    let widest = histogram.bins.iter().copied().max().unwrap_or(0).max(1);
    for (i, count) in histogram.bins.iter().enumerate() {
        let bar = "#".repeat(count * 50 / widest);
        println!("  {:>10.3} | {:>6} {}", histogram.bin_start(i), count, bar);
    }
    Ok(())
}

/// Every algorithm against each inter-arrival/rpm pair, sharing one seed so
/// all runs see the same arrival stream
fn run_comparison(base: SimConfig) -> anyhow::Result<Vec<SimulationResult>> {
    let seed = base.seed.unwrap_or_else(rand::random);
    println!("Running comparison matrix (seed {seed})\n");

    let mut results = Vec::new();
    for inter_arrival in COMPARE_INTER_ARRIVALS {
        for rpm in COMPARE_RPMS {
            for algorithm in Algorithm::ALL {
                let config = SimConfig {
                    algorithm,
                    mean_inter_arrival: inter_arrival,
                    disk_rpm: rpm,
                    seed: Some(seed),
                    ..base.clone()
                };
                results.push(Simulation::from_config(config)?.run()?);
            }
        }
    }

    println!(
        "{:<12} {:<6} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Arrival/RPM", "Alg", "Seek (ms)", "Rot (ms)", "Access (ms)", "Movement", "Throughput"
    );
    println!("{}", "-".repeat(84));
    for result in &results {
        println!(
            "{:<12} {:<6} {:>12.4} {:>12.4} {:>12.4} {:>12} {:>12.4}",
            format!("{}/{}", result.mean_inter_arrival, result.disk_rpm),
            result.algorithm,
            result.average_seek_time,
            result.average_rotational_latency,
            result.average_access_time,
            result.total_arm_movement,
            result.throughput,
        );
    }

    Ok(results)
}
