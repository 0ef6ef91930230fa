//! Fair Allocation - Demonstration Run
//!
//! Draws one random instance and runs every method on it from the same
//! starting allocation, then prints a comparison table.

use fair_alloc::bundle::BundleValueMatrix;
use fair_alloc::objective::{average_value, max_envy, nash_utility, social_inequality};
use fair_alloc::{
    Allocation, Instance, Method, SolverParams, TargetVector, ValuationMatrix,
    ValueDistribution,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("========================================");
    println!("Fair Allocation of Indivisible Items");
    println!("========================================");

    let persons = 4;
    let items = 24;
    let seed = 42;
    let distribution = ValueDistribution::Uniform {
        low: 0.0,
        high: 10.0,
    };

    println!("\nConfiguration:");
    println!("  Persons: {}", persons);
    println!("  Items: {}", items);
    println!("  Valuations: {:?}", distribution);
    println!("  Seed: {}\n", seed);

    let mut setup_rng = StdRng::seed_from_u64(seed);
    let valuations = ValuationMatrix::sample(persons, items, &distribution, &mut setup_rng)
        .unwrap_or_else(|e| {
            eprintln!("Error generating instance: {}", e);
            std::process::exit(1);
        });
    let target = TargetVector::proportional(&valuations);
    let instance = Instance::new(valuations)
        .with_target(target)
        .unwrap_or_else(|e| {
            eprintln!("Error attaching targets: {}", e);
            std::process::exit(1);
        });
    let initial = Allocation::random(items, persons, &mut setup_rng);

    let start = BundleValueMatrix::build(&instance.valuations, &initial);
    println!("Initial allocation:");
    println!("  Max envy: {:.3}", max_envy(&start));
    println!(
        "  Social inequality: {:.3}",
        social_inequality(&start, &average_value(&start))
    );
    println!("  Nash utility: {:.3}\n", nash_utility(&start));

    println!(
        "{:<16} {:>14} {:>22} {:>10}",
        "Method", "Objective", "Status", "Iterations"
    );
    println!("{:-<16} {:->14} {:->22} {:->10}", "", "", "", "");

    for (idx, method) in Method::ALL.into_iter().enumerate() {
        let params = SolverParams::new(5_000, 0.0).with_max_no_improve(500);
        let mut rng = StdRng::seed_from_u64(seed + 1000 + idx as u64);

        match method.run(&instance, params, initial.clone(), &mut rng) {
            Ok(outcome) => {
                println!(
                    "{:<16} {:>14.4} {:>22} {:>10}",
                    method.name(),
                    outcome.objective,
                    outcome.status.to_string(),
                    outcome.iterations
                );
                if let Some(untargeted) = &outcome.untargeted {
                    println!(
                        "{:<16} {:>14.4}",
                        "  (untargeted)", untargeted.objective
                    );
                }
            }
            Err(e) => {
                eprintln!("{} failed: {}", method.name(), e);
                std::process::exit(1);
            }
        }
    }

    println!("\n=== Demonstration Complete ===");
}
