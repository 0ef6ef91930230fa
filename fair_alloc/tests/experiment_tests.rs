// Configuration loading and result export, end to end

use fair_alloc::config::{ExperimentConfig, InstanceSource};
use fair_alloc::output::{write_experiment_summary, MethodSummary, RunRecord};
use fair_alloc::{Allocation, Method, Status};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fair_alloc_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn given_csv_instance_when_loaded_then_paths_resolve_next_to_config() {
    // GIVEN: a config directory holding valuations, weights and the TOML file
    let dir = scratch_dir("csv_instance");
    fs::write(dir.join("values.csv"), "10,0,1\n0,10,1\n").unwrap();
    fs::write(dir.join("weights.csv"), "1,1,1\n2,2,2\n").unwrap();
    fs::write(
        dir.join("experiment.toml"),
        r#"
        [experiment]
        name = "from_csv"

        [instance]
        valuations_csv = "values.csv"
        weights_csv = "weights.csv"
        target = [5.5, 5.5]

        [solver]
        methods = ["envy", "mincov", "mincov_target"]
        max_iterations = 100

        [output]
        dir = "out"
        "#,
    )
    .unwrap();

    // WHEN
    let config = ExperimentConfig::from_file(dir.join("experiment.toml")).unwrap();
    let source = config.instance_source().unwrap();

    // THEN: the instance is fixed and carries both extras
    let instance = match &source {
        InstanceSource::Fixed(instance) => instance.clone(),
        InstanceSource::Sampled { .. } => panic!("expected a fixed instance"),
    };
    assert_eq!(instance.valuations.persons(), 2);
    assert_eq!(instance.valuations.items(), 3);
    assert_eq!(instance.weights.as_ref().map(|w| w.weight(1, 0)), Some(2.0));
    assert_eq!(instance.target.as_ref().map(|t| t.as_slice().to_vec()), Some(vec![5.5, 5.5]));
    assert_eq!(config.output_dir(), dir.join("out").join("from_csv"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn given_weights_of_wrong_shape_then_loading_fails() {
    let dir = scratch_dir("bad_weights");
    fs::write(dir.join("values.csv"), "1,2\n3,4\n").unwrap();
    fs::write(dir.join("weights.csv"), "1,1,1\n").unwrap();
    fs::write(
        dir.join("experiment.toml"),
        r#"
        [experiment]
        name = "bad"

        [instance]
        valuations_csv = "values.csv"
        weights_csv = "weights.csv"

        [solver]
        methods = ["mincov"]
        "#,
    )
    .unwrap();

    let config = ExperimentConfig::from_file(dir.join("experiment.toml")).unwrap();
    assert!(config.instance_source().is_err());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn given_sampled_experiment_when_every_method_runs_then_summaries_are_written() {
    // GIVEN: a small sampled experiment
    let config = ExperimentConfig::from_toml_str(
        r#"
        [experiment]
        name = "all_methods"
        num_runs = 3
        base_seed = 100

        [instance]
        persons = 3
        items = 9
        distribution = { kind = "gamma", shape = 2.0, scale = 1.5 }
        target = "proportional"

        [solver]
        methods = ["envy", "social", "utility", "mincov", "mincov_target",
                   "random_envy", "random_social", "random_utility"]
        max_iterations = 300
        max_no_improve = 50
        "#,
    )
    .unwrap();
    let source = config.instance_source().unwrap();
    let dir = scratch_dir("all_methods");

    // WHEN: each run solves every method from a shared starting allocation
    let mut summaries = Vec::new();
    for &method in &config.solver.methods {
        let mut records = Vec::new();
        for run in 0..config.experiment.num_runs {
            let seed = config.experiment.base_seed + run as u64;
            let mut setup_rng = StdRng::seed_from_u64(seed);
            let instance = source.instance(&mut setup_rng).unwrap();
            let initial = Allocation::random(9, 3, &mut setup_rng);
            let params = config.params_for(method);

            let outcome = method
                .run(&instance, params, initial, &mut StdRng::seed_from_u64(seed + 1000))
                .unwrap();
            if method == Method::MincovTarget {
                assert!(outcome.untargeted.is_some());
            }
            if matches!(method, Method::Utility | Method::RandomUtility) {
                assert_ne!(outcome.status, Status::Converged);
            }
            records.push(RunRecord::from_outcome(method, seed, params, &outcome));
        }
        records[0].write_all(dir.join(method.name())).unwrap();
        summaries.push(MethodSummary::from_records(method, &records));
    }
    write_experiment_summary(dir.join("summary.json"), &summaries).unwrap();

    // THEN: every method directory holds its files and the summary parses back
    for method in Method::ALL {
        let method_dir = dir.join(method.name());
        assert!(method_dir.join("trace.csv").exists(), "{}", method);
        assert!(method_dir.join("allocation.csv").exists(), "{}", method);
        assert!(method_dir.join("summary.json").exists(), "{}", method);
    }
    let json = fs::read_to_string(dir.join("summary.json")).unwrap();
    let parsed: Vec<MethodSummary> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), 8);
    assert!(parsed.iter().all(|s| s.num_runs == 3));
    assert!(parsed
        .iter()
        .find(|s| s.method == Method::MincovTarget)
        .and_then(|s| s.untargeted_objective)
        .is_some());

    fs::remove_dir_all(&dir).unwrap();
}
