// Configuration loading and parsing (config/pipeline.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the single pipeline config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "pipeline.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub paths: DataPaths,
    pub ingest: IngestConfig,
    pub model: ModelConfig,
    pub projection: ProjectionConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    paths: DataPaths,
    #[serde(default)]
    ingest: IngestConfig,
    #[serde(default)]
    model: ModelConfig,
    #[serde(default)]
    projection: ProjectionConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Input sources and the directory the stages write their artifacts to.
/// Relative paths are resolved against the base directory at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub stats: PathBuf,
    pub salaries: PathBuf,
    #[serde(default)]
    pub future_salaries: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl DataPaths {
    pub fn canonical_table(&self) -> PathBuf {
        self.output_dir.join("canonical.csv")
    }

    pub fn scored_table(&self) -> PathBuf {
        self.output_dir.join("predictions.csv")
    }

    pub fn model_artifact(&self) -> PathBuf {
        self.output_dir.join("model.json")
    }

    fn resolve_against(mut self, base_dir: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base_dir.join(p) };
        self.stats = resolve(self.stats);
        self.salaries = resolve(self.salaries);
        self.future_salaries = self.future_salaries.map(resolve);
        self.output_dir = resolve(self.output_dir);
        self
    }
}

/// Which row survives when a player appears more than once in the
/// statistics source (mid-season trades).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep the first row in file order.
    #[default]
    FirstOccurrence,
    /// Keep the multi-team aggregate row (`TOT`, `2TM`, ...) if present,
    /// else the last team stint.
    PreferAggregateRow,
    /// Keep the last row in file order.
    LastOccurrence,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub dedup_policy: DedupPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of the features examined at each split.
    pub max_features: f64,
    /// Fraction of players held out for evaluation. 0 trains and scores on
    /// the full dataset.
    pub validation_fraction: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
            validation_fraction: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Header of the season column in the future-salary source.
    pub future_salary_column: String,
    /// Only players strictly older than this appear in the steal/bust lists.
    pub min_age: f64,
    pub top_n: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            future_salary_column: "2025-26".into(),
            min_age: 22.0,
            top_n: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fairshot=info,warn".into(),
            directory: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/pipeline.toml` relative to `base_dir`.
///
/// This does not auto-copy defaults; prefer `load_config()` for that.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: PipelineFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let log_directory = file
        .logging
        .directory
        .map(|d| if d.is_absolute() { d } else { base_dir.join(d) });

    let config = Config {
        paths: file.paths.resolve_against(base_dir),
        ingest: file.ingest,
        model: file.model,
        projection: file.projection,
        logging: LoggingConfig {
            filter: file.logging.filter,
            directory: log_directory,
        },
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or pass --config",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Copy missing defaults into `base_dir/config`, then load from there.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let model = &config.model;
    if model.n_estimators == 0 {
        return Err(invalid("model.n_estimators", "must be greater than 0"));
    }
    if model.min_samples_split < 2 {
        return Err(invalid(
            "model.min_samples_split",
            format!("must be at least 2, got {}", model.min_samples_split),
        ));
    }
    if model.min_samples_leaf == 0 {
        return Err(invalid("model.min_samples_leaf", "must be greater than 0"));
    }
    if model.max_depth == Some(0) {
        return Err(invalid("model.max_depth", "must be greater than 0 when set"));
    }
    let mf = model.max_features;
    if !(mf > 0.0 && mf <= 1.0) {
        return Err(invalid(
            "model.max_features",
            format!("must be in (0.0, 1.0], got {mf}"),
        ));
    }
    let vf = model.validation_fraction;
    if !(0.0..1.0).contains(&vf) {
        return Err(invalid(
            "model.validation_fraction",
            format!("must be in [0.0, 1.0), got {vf}"),
        ));
    }

    let projection = &config.projection;
    if projection.future_salary_column.trim().is_empty() {
        return Err(invalid("projection.future_salary_column", "must not be empty"));
    }
    if projection.top_n == 0 {
        return Err(invalid("projection.top_n", "must be greater than 0"));
    }
    if !projection.min_age.is_finite() {
        return Err(invalid("projection.min_age", "must be a finite number"));
    }

    if config.logging.filter.trim().is_empty() {
        return Err(invalid("logging.filter", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
