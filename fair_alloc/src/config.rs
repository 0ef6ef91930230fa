//! Experiment configuration
//!
//! An experiment is described by a TOML file:
//!
//! ```toml
//! [experiment]
//! name = "uniform_small"
//! description = "Five persons, forty uniform items"
//! num_runs = 10
//! base_seed = 42
//!
//! [instance]
//! persons = 5
//! items = 40
//! distribution = { kind = "uniform", low = 0.0, high = 10.0 }
//!
//! [solver]
//! methods = ["envy", "social", "mincov", "random_envy"]
//! max_iterations = 5000
//! max_no_improve = 500
//! eps = 0.0
//!
//! [output]
//! dir = "results"
//! ```
//!
//! Instead of `persons`/`items`/`distribution`, `[instance]` may point at a
//! headerless CSV of valuations with `valuations_csv`. Relative paths are
//! resolved against the directory holding the TOML file.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::allocation::Allocation;
use crate::error::ConfigError;
use crate::matrix::Matrix;
use crate::objective::{Direction, Objective};
use crate::solver::{
    DirectedAssignmentSolver, RandomBaselineSolver, RandomSwapSolver, SolveOutcome, Solver,
    SolverParams,
};
use crate::valuation::{TargetVector, ValuationMatrix, ValueDistribution, WeightMatrix};

/// Top-level experiment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub experiment: ExperimentMetadata,
    pub instance: InstanceConfig,
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputSettings,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_num_runs")]
    pub num_runs: usize,
    #[serde(default)]
    pub base_seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub valuations_csv: Option<PathBuf>,
    pub persons: Option<usize>,
    pub items: Option<usize>,
    #[serde(default)]
    pub distribution: ValueDistribution,
    /// Recipient weights for the directed solvers; uniform when absent
    pub weights_csv: Option<PathBuf>,
    pub target: Option<TargetSetting>,
}

/// Per-person targets for `mincov_target`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TargetSetting {
    Values(Vec<f64>),
    Rule(TargetRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRule {
    /// Each person's total valuation divided by the number of persons
    Proportional,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    pub methods: Vec<Method>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    pub max_no_improve: Option<usize>,
    #[serde(default)]
    pub eps: f64,
    /// Convergence threshold for the utility methods; unreachable when absent
    pub utility_eps: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub save_traces: bool,
    #[serde(default = "default_true")]
    pub save_allocations: bool,
    #[serde(default = "default_true")]
    pub save_summary: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            dir: default_output_dir(),
            save_traces: true,
            save_allocations: true,
            save_summary: true,
        }
    }
}

fn default_num_runs() -> usize {
    1
}

fn default_max_iterations() -> usize {
    SolverParams::default().max_iterations
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_true() -> bool {
    true
}

/// Every solver the runner can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Envy,
    Social,
    Utility,
    Mincov,
    MincovTarget,
    RandomEnvy,
    RandomSocial,
    RandomUtility,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Envy,
        Method::Social,
        Method::Utility,
        Method::Mincov,
        Method::MincovTarget,
        Method::RandomEnvy,
        Method::RandomSocial,
        Method::RandomUtility,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Envy => "envy",
            Method::Social => "social",
            Method::Utility => "utility",
            Method::Mincov => "mincov",
            Method::MincovTarget => "mincov_target",
            Method::RandomEnvy => "random_envy",
            Method::RandomSocial => "random_social",
            Method::RandomUtility => "random_utility",
        }
    }

    /// Criterion the method reports
    pub fn objective(self) -> Objective {
        match self {
            Method::Envy | Method::RandomEnvy => Objective::MaxEnvy,
            Method::Social | Method::Mincov | Method::MincovTarget | Method::RandomSocial => {
                Objective::SocialInequality
            }
            Method::Utility | Method::RandomUtility => Objective::NashUtility,
        }
    }

    /// Run this method on `instance` starting from `initial`
    pub fn run<R: Rng>(
        self,
        instance: &Instance,
        params: SolverParams,
        initial: Allocation,
        rng: &mut R,
    ) -> Result<SolveOutcome, ConfigError> {
        let valuations = &instance.valuations;
        let outcome = match self {
            Method::Envy | Method::Social | Method::Utility => {
                RandomSwapSolver::new(self.objective(), params).solve(valuations, initial, rng)?
            }
            Method::RandomEnvy | Method::RandomSocial | Method::RandomUtility => {
                RandomBaselineSolver::new(self.objective(), params)
                    .solve(valuations, initial, rng)?
            }
            Method::Mincov => DirectedAssignmentSolver::new(instance.weights(), params)
                .solve(valuations, initial, rng)?,
            Method::MincovTarget => {
                let target = instance.target.clone().ok_or_else(|| {
                    ConfigError::Invalid("mincov_target needs an instance target".to_string())
                })?;
                DirectedAssignmentSolver::new(instance.weights(), params)
                    .with_target(target)
                    .solve(valuations, initial, rng)?
            }
        };
        Ok(outcome)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything a solve reads: valuations plus the optional directed-solver inputs
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub valuations: ValuationMatrix,
    pub weights: Option<WeightMatrix>,
    pub target: Option<TargetVector>,
}

impl Instance {
    pub fn new(valuations: ValuationMatrix) -> Self {
        Instance {
            valuations,
            weights: None,
            target: None,
        }
    }

    pub fn with_weights(mut self, weights: WeightMatrix) -> Result<Self, ConfigError> {
        weights.check_shape(&self.valuations)?;
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn with_target(mut self, target: TargetVector) -> Result<Self, ConfigError> {
        target.check_shape(&self.valuations)?;
        self.target = Some(target);
        Ok(self)
    }

    /// Configured weights, or 1.0 everywhere
    pub fn weights(&self) -> WeightMatrix {
        self.weights.clone().unwrap_or_else(|| {
            WeightMatrix::uniform(self.valuations.persons(), self.valuations.items())
        })
    }
}

/// Where each run's instance comes from
#[derive(Debug, Clone)]
pub enum InstanceSource {
    /// Loaded once from disk and shared by every run
    Fixed(Instance),
    /// Drawn afresh for every run
    Sampled {
        persons: usize,
        items: usize,
        distribution: ValueDistribution,
        weights: Option<WeightMatrix>,
        target: Option<TargetSetting>,
    },
}

impl InstanceSource {
    pub fn instance<R: Rng>(&self, rng: &mut R) -> Result<Instance, ConfigError> {
        match self {
            InstanceSource::Fixed(instance) => Ok(instance.clone()),
            InstanceSource::Sampled {
                persons,
                items,
                distribution,
                weights,
                target,
            } => {
                let valuations = ValuationMatrix::sample(*persons, *items, distribution, rng)?;
                attach_extras(Instance::new(valuations), weights.clone(), target.as_ref())
            }
        }
    }
}

fn attach_extras(
    mut instance: Instance,
    weights: Option<WeightMatrix>,
    target: Option<&TargetSetting>,
) -> Result<Instance, ConfigError> {
    if let Some(weights) = weights {
        instance = instance.with_weights(weights)?;
    }
    if let Some(setting) = target {
        let target = match setting {
            TargetSetting::Values(values) => TargetVector::new(values.clone())?,
            TargetSetting::Rule(TargetRule::Proportional) => {
                TargetVector::proportional(&instance.valuations)
            }
        };
        instance = instance.with_target(target)?;
    }
    Ok(instance)
}

impl ExperimentConfig {
    /// Read and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ExperimentConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.experiment.num_runs == 0 {
            return Err(ConfigError::Invalid("num_runs must be at least 1".to_string()));
        }
        if self.solver.methods.is_empty() {
            return Err(ConfigError::Invalid(
                "solver.methods must list at least one method".to_string(),
            ));
        }

        let instance = &self.instance;
        match (&instance.valuations_csv, instance.persons, instance.items) {
            (Some(_), None, None) => {}
            (Some(_), _, _) => {
                return Err(ConfigError::Invalid(
                    "give either valuations_csv or persons/items, not both".to_string(),
                ))
            }
            (None, Some(0), _) => {
                return Err(ConfigError::Invalid("persons must be at least 1".to_string()))
            }
            (None, Some(_), Some(_)) => {}
            (None, _, _) => {
                return Err(ConfigError::Invalid(
                    "instance needs valuations_csv or both persons and items".to_string(),
                ))
            }
        }

        if self.solver.methods.contains(&Method::MincovTarget) && instance.target.is_none() {
            return Err(ConfigError::Invalid(
                "mincov_target requires instance.target".to_string(),
            ));
        }
        Ok(())
    }

    /// Loop limits for `method`; utility methods converge only when `utility_eps` is set
    pub fn params_for(&self, method: Method) -> SolverParams {
        let maximize_eps = match method.objective().direction() {
            Direction::Maximize => self.solver.utility_eps,
            Direction::Minimize => None,
        };
        SolverParams {
            max_iterations: self.solver.max_iterations,
            max_no_improve: self.solver.max_no_improve,
            eps: self.solver.eps,
            maximize_eps,
        }
    }

    /// Directory this experiment's results go to
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir).join(&self.experiment.name)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Load any files the instance refers to
    pub fn instance_source(&self) -> Result<InstanceSource, ConfigError> {
        let instance = &self.instance;
        let weights = match &instance.weights_csv {
            Some(path) => Some(WeightMatrix::from_matrix(read_matrix_csv(
                self.resolve(path),
            )?)?),
            None => None,
        };

        if let Some(path) = &instance.valuations_csv {
            let valuations = ValuationMatrix::from_matrix(read_matrix_csv(self.resolve(path))?)?;
            let fixed = attach_extras(Instance::new(valuations), weights, instance.target.as_ref())?;
            return Ok(InstanceSource::Fixed(fixed));
        }

        match (instance.persons, instance.items) {
            (Some(persons), Some(items)) => Ok(InstanceSource::Sampled {
                persons,
                items,
                distribution: instance.distribution,
                weights,
                target: instance.target.clone(),
            }),
            _ => Err(ConfigError::Invalid(
                "instance needs valuations_csv or both persons and items".to_string(),
            )),
        }
    }
}

/// Read a headerless numeric CSV, one matrix row per line
pub fn read_matrix_csv<P: AsRef<Path>>(path: P) -> Result<Matrix, ConfigError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let values = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| ConfigError::Parse {
                    path: path.display().to_string(),
                    row,
                    value: field.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(values);
    }
    Ok(Matrix::from_rows(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SAMPLED: &str = r#"
        [experiment]
        name = "small"
        description = "three persons"
        num_runs = 2
        base_seed = 7

        [instance]
        persons = 3
        items = 6
        distribution = { kind = "exponential", rate = 0.5 }
        target = "proportional"

        [solver]
        methods = ["envy", "mincov_target", "random_utility"]
        max_iterations = 200
        max_no_improve = 20
    "#;

    #[test]
    fn test_parse_sampled_config() {
        let config = ExperimentConfig::from_toml_str(SAMPLED).unwrap();
        assert_eq!(config.experiment.num_runs, 2);
        assert_eq!(
            config.solver.methods,
            vec![Method::Envy, Method::MincovTarget, Method::RandomUtility]
        );
        assert_eq!(config.solver.eps, 0.0);
        assert_eq!(
            config.instance.target,
            Some(TargetSetting::Rule(TargetRule::Proportional))
        );
        assert!(config.output.save_traces);
        assert_eq!(config.output_dir(), PathBuf::from("results").join("small"));
    }

    #[test]
    fn test_params_for_utility_uses_utility_eps() {
        let config = ExperimentConfig::from_toml_str(SAMPLED).unwrap();
        let envy = config.params_for(Method::Envy);
        assert_eq!(envy.eps, 0.0);
        assert_eq!(envy.max_no_improve, Some(20));
        assert_eq!(envy.maximize_eps, None);
        assert_eq!(config.params_for(Method::RandomUtility).maximize_eps, None);
    }

    #[test]
    fn test_params_for_utility_with_threshold() {
        let toml = SAMPLED.replace("[solver]\n", "[solver]\nutility_eps = 12.5\n");
        let config = ExperimentConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.params_for(Method::Utility).maximize_eps, Some(12.5));
        assert_eq!(config.params_for(Method::Social).maximize_eps, None);
    }

    #[test]
    fn test_sampled_instance_has_target() {
        let config = ExperimentConfig::from_toml_str(SAMPLED).unwrap();
        let source = config.instance_source().unwrap();
        let instance = source.instance(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(instance.valuations.persons(), 3);
        assert_eq!(instance.valuations.items(), 6);
        assert_eq!(instance.target.as_ref().map(|t| t.len()), Some(3));
        assert!(instance.weights.is_none());
        assert_eq!(instance.weights(), WeightMatrix::uniform(3, 6));
    }

    #[test]
    fn test_explicit_target_values() {
        let text = SAMPLED.replace(r#"target = "proportional""#, "target = [1.0, 2.0, 3.0]");
        let config = ExperimentConfig::from_toml_str(&text).unwrap();
        assert_eq!(
            config.instance.target,
            Some(TargetSetting::Values(vec![1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn test_mincov_target_without_target_is_rejected() {
        let text = SAMPLED.replace(r#"target = "proportional""#, "");
        let err = ExperimentConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_instance_needs_a_source() {
        let text = SAMPLED.replace("items = 6", "");
        assert!(matches!(
            ExperimentConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_method_is_a_toml_error() {
        let text = SAMPLED.replace("\"envy\"", "\"greedy\"");
        assert!(matches!(
            ExperimentConfig::from_toml_str(&text),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_read_matrix_csv() {
        let dir = std::env::temp_dir().join(format!("fair_alloc_csv_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("values.csv");
        fs::write(&path, "1, 2, 3\n4, 5, 6\n").unwrap();

        let m = read_matrix_csv(&path).unwrap();
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);

        fs::write(&path, "1,x\n").unwrap();
        assert!(matches!(
            read_matrix_csv(&path),
            Err(ConfigError::Parse { row: 0, .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_method_run_dispatches() {
        let valuations = ValuationMatrix::new(vec![vec![10.0, 0.0], vec![0.0, 10.0]]).unwrap();
        let instance = Instance::new(valuations);
        let mut rng = StdRng::seed_from_u64(3);

        for method in Method::ALL {
            let initial = Allocation::all_to(0, 2, 2).unwrap();
            let result = method.run(&instance, SolverParams::new(50, 0.0), initial, &mut rng);
            if method == Method::MincovTarget {
                assert!(matches!(result, Err(ConfigError::Invalid(_))));
            } else {
                let outcome = result.unwrap();
                assert_eq!(outcome.allocation.items(), 2);
            }
        }
    }
}
