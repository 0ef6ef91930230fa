//! Batch Experiment Runner
//!
//! Runs every configured method on a series of seeded instances described by a
//! TOML file and writes per-run traces, allocations and an aggregate summary.
//!
//! Usage:
//!   cargo run --release --bin run_experiment -- experiments/uniform_small.toml

use fair_alloc::config::{ExperimentConfig, InstanceSource, OutputSettings};
use fair_alloc::output::{write_experiment_summary, MethodSummary, RunRecord};
use fair_alloc::{Allocation, ConfigError, Method};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Instant;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <experiment_config.toml>", args[0]);
        eprintln!("Example: {} experiments/uniform_small.toml", args[0]);
        std::process::exit(1);
    }

    let config_path = &args[1];
    println!("=== Fair Allocation Experiment Runner ===\n");
    println!("Loading experiment config: {}\n", config_path);

    let config = ExperimentConfig::from_file(config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    println!("Experiment: {}", config.experiment.name);
    if !config.experiment.description.is_empty() {
        println!("Description: {}", config.experiment.description);
    }
    let methods: Vec<String> = config.solver.methods.iter().map(|m| m.to_string()).collect();
    println!(
        "Configuration: {} runs × {} methods ({})\n",
        config.experiment.num_runs,
        methods.len(),
        methods.join(", ")
    );

    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir).unwrap_or_else(|e| {
        eprintln!("Error creating output directory: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = run_experiment(&config, &output_dir) {
        eprintln!("Experiment failed: {}", e);
        std::process::exit(1);
    }
}

fn run_experiment(config: &ExperimentConfig, output_dir: &Path) -> Result<(), ConfigError> {
    let start_time = Instant::now();
    let source = config.instance_source()?;
    if let InstanceSource::Fixed(instance) = &source {
        println!(
            "Instance loaded from file: {} persons × {} items\n",
            instance.valuations.persons(),
            instance.valuations.items()
        );
    }

    let total_runs = config.experiment.num_runs;
    let mut records: BTreeMap<Method, Vec<RunRecord>> = BTreeMap::new();

    for run_idx in 0..total_runs {
        let seed = config.experiment.base_seed + run_idx as u64;
        let mut setup_rng = StdRng::seed_from_u64(seed);
        let instance = source.instance(&mut setup_rng)?;
        let initial = Allocation::random(
            instance.valuations.items(),
            instance.valuations.persons(),
            &mut setup_rng,
        );

        println!("Run {}/{} (seed={})", run_idx + 1, total_runs, seed);

        for (method_idx, &method) in config.solver.methods.iter().enumerate() {
            let params = config.params_for(method);
            let mut rng = StdRng::seed_from_u64(seed + 1000 + method_idx as u64);

            let run_start = Instant::now();
            let outcome = method.run(&instance, params, initial.clone(), &mut rng)?;
            let record = RunRecord::from_outcome(method, seed, params, &outcome);

            let run_dir = output_dir.join(method.name()).join(format!("run_{}", seed));
            save_run_output(&record, &run_dir, &config.output)?;

            println!(
                "  {:<16} ✓ ({:.2}s) objective={:.4} status={} iterations={}",
                method.name(),
                run_start.elapsed().as_secs_f64(),
                record.summary.objective,
                record.summary.status,
                record.summary.iterations
            );

            records.entry(method).or_default().push(record);
        }
    }

    println!("\n=== Aggregating Results ===\n");
    let summaries: Vec<MethodSummary> = config
        .solver
        .methods
        .iter()
        .filter_map(|method| {
            records
                .get(method)
                .map(|runs| MethodSummary::from_records(*method, runs))
        })
        .collect();

    if config.output.save_summary {
        write_experiment_summary(output_dir.join("summary.json"), &summaries)?;
    }

    print_summary_table(&summaries);

    let total_elapsed = start_time.elapsed();
    println!(
        "\n✓ Experiment complete in {:.1}s ({:.2}s per run)",
        total_elapsed.as_secs_f64(),
        total_elapsed.as_secs_f64() / total_runs as f64
    );
    println!("Results saved to: {}", output_dir.display());
    Ok(())
}

/// Write one run's files, honouring the output flags
fn save_run_output(
    record: &RunRecord,
    dir: &Path,
    settings: &OutputSettings,
) -> Result<(), ConfigError> {
    if !(settings.save_traces || settings.save_allocations || settings.save_summary) {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    if settings.save_traces {
        record.write_trace_csv(dir.join("trace.csv"))?;
    }
    if settings.save_allocations {
        record.write_allocation_csv(dir.join("allocation.csv"))?;
    }
    if settings.save_summary {
        record.write_summary_json(dir.join("summary.json"))?;
    }
    Ok(())
}

fn print_summary_table(summaries: &[MethodSummary]) {
    println!(
        "{:<16} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Method", "Mean", "Std", "Min", "Max", "Mean iters"
    );
    println!(
        "{:-<16} {:->12} {:->12} {:->12} {:->12} {:->12}",
        "", "", "", "", "", ""
    );
    for summary in summaries {
        println!(
            "{:<16} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.1}",
            summary.method.name(),
            summary.objective.mean,
            summary.objective.std,
            summary.objective.min,
            summary.objective.max,
            summary.iterations.mean
        );
        if let Some(untargeted) = &summary.untargeted_objective {
            println!(
                "{:<16} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                "  (untargeted)", untargeted.mean, untargeted.std, untargeted.min, untargeted.max
            );
        }
        let counts: Vec<String> = summary
            .status_counts
            .iter()
            .map(|(status, count)| format!("{}: {}", status, count))
            .collect();
        println!("{:<16} {}", "", counts.join(", "));
    }
}
