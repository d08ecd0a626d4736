use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use survey_subsample::config::{FitConfig, ModelType};
use survey_subsample::degradation::DEFAULT_WORKERS;

/// Settings for one end-to-end run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub infile: PathBuf,
    pub outdir: PathBuf,
    /// Survey item columns. `None` selects every column that is not a
    /// diagnosis or the id column.
    pub features: Option<Vec<String>>,
    /// Diagnosis columns. `None` selects columns starting with
    /// `diagnosis_prefix`.
    pub diagnoses: Option<Vec<String>>,
    pub diagnosis_prefix: String,
    pub id_column: Option<String>,
    /// Minimum positive count for a diagnosis to be kept.
    pub dx_threshold: usize,
    pub number_of_questions: usize,
    pub n_threads: usize,
    pub degrade: bool,
    pub report: bool,
    pub fit: FitConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            infile: PathBuf::new(),
            outdir: PathBuf::from("survey_subsample_results"),
            features: None,
            diagnoses: None,
            diagnosis_prefix: "Diagnosis_".to_string(),
            id_column: None,
            dx_threshold: 150,
            number_of_questions: 20,
            n_threads: DEFAULT_WORKERS,
            degrade: true,
            report: true,
            fit: FitConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Build the configuration for the `run` subcommand: the JSON file given
    /// by `--config` (or the defaults) overridden by explicit flags.
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        if let Some(infile) = matches.get_one::<PathBuf>("infile") {
            config.infile = infile.clone();
        }
        if let Some(outdir) = matches.get_one::<PathBuf>("outdir") {
            config.outdir = outdir.clone();
        }
        if let Some(n) = matches.get_one::<usize>("number_of_questions") {
            config.number_of_questions = *n;
        }
        if let Some(seed) = matches.get_one::<u64>("random_state") {
            config.fit.seed = *seed;
        }
        if let Some(threshold) = matches.get_one::<usize>("dx_threshold") {
            config.dx_threshold = *threshold;
        }
        if let Some(n_threads) = matches.get_one::<usize>("n_threads") {
            config.n_threads = *n_threads;
        }
        if let Some(features) = matches.get_many::<String>("features") {
            config.features = Some(features.cloned().collect());
        }
        if let Some(diagnoses) = matches.get_many::<String>("diagnoses") {
            config.diagnoses = Some(diagnoses.cloned().collect());
        }
        if let Some(model_type) = matches.get_one::<String>("model_type") {
            let n_estimators = config.fit.model.model_type.n_estimators();
            config.fit.model.model_type = ModelType::from_str(model_type)
                .map_err(anyhow::Error::msg)?
                .with_n_estimators(n_estimators);
        }
        if matches.get_flag("no_degrade") {
            config.degrade = false;
        }
        if matches.get_flag("no_report") {
            config.report = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tsv_or_csv_file(&self.infile)?;
        if self.number_of_questions == 0 {
            anyhow::bail!("number_of_questions must be at least 1");
        }
        if self.n_threads == 0 {
            anyhow::bail!("n_threads must be at least 1");
        }
        self.fit.validate().context("Invalid fit configuration")?;
        Ok(())
    }
}

pub fn validate_tsv_or_csv_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") | Some("txt") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path.display()),
    }

    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    Ok(())
}
