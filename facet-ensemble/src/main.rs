//! facet-ensemble - command-line entry point
//!
//! Runs facial signal detectors on an image, compares their outputs, and
//! manages per-person baselines for calibration-relative deltas. All results
//! are printed as pretty JSON on stdout; logs go to stderr (or the configured
//! log file).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facet_common::config::{
    default_config_path, BaselineStorageKind, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use facet_common::logging::init_tracing;
use facet_ensemble::calibration::{BaselineRepository, JsonFileRepository, SqliteRepository};
use facet_ensemble::delta::DeltaReport;
use facet_ensemble::detectors::DetectorRegistry;
use facet_ensemble::ensemble::{parse_detector_names, Ensemble};
use facet_ensemble::{
    CalibrationError, CalibrationStore, DetectorName, DetectorRecord, FacetEngine, DEFAULT_PERSON_ID,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

/// Module name used for the default config file (`<config_dir>/facet/facet-ensemble.toml`)
const MODULE_NAME: &str = "facet-ensemble";

/// Command-line arguments for facet-ensemble
#[derive(Parser, Debug)]
#[command(name = "facet-ensemble")]
#[command(about = "Facial emotion / action unit ensemble with per-person calibration")]
#[command(version)]
struct Args {
    /// Root folder for baseline documents and the database
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML config file (defaults to $FACET_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run detectors on an image and compare their results
    Analyze {
        /// Image to analyze
        image: PathBuf,

        /// Comma-separated detector names (fer, deepface, facs, simplefacs)
        #[arg(short, long, value_delimiter = ',', default_value = "fer,deepface")]
        detectors: Vec<String>,

        /// Person whose baseline the action unit deltas refer to
        #[arg(short, long)]
        person: Option<String>,

        /// Attach baseline deltas for every action unit record
        #[arg(long)]
        with_delta: bool,
    },

    /// Manage per-person baselines
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },

    /// Compare an image against a person's stored baseline
    Delta {
        image: PathBuf,

        #[arg(short, long, default_value = DEFAULT_PERSON_ID)]
        person: String,

        /// Action unit detector (facs or simplefacs)
        #[arg(short, long, default_value = "facs")]
        detector: String,
    },

    /// Show which detectors are configured and reachable
    Detectors,
}

#[derive(Subcommand, Debug)]
enum BaselineAction {
    /// Measure a neutral-expression image and store it as the baseline
    Set {
        image: PathBuf,

        #[arg(short, long, default_value = DEFAULT_PERSON_ID)]
        person: String,

        /// Action unit detector (facs or simplefacs)
        #[arg(short, long, default_value = "facs")]
        detector: String,
    },

    /// Check that a stored baseline can be loaded
    Load {
        #[arg(short, long, default_value = DEFAULT_PERSON_ID)]
        person: String,
    },

    /// Delete a stored baseline
    Clear {
        #[arg(short, long, default_value = DEFAULT_PERSON_ID)]
        person: String,
    },

    /// Show baseline details (age, analyzer, AU count)
    Info {
        #[arg(short, long, default_value = DEFAULT_PERSON_ID)]
        person: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| default_config_path(MODULE_NAME));
    let (config, config_warning) = TomlConfig::load_or_default(config_path.as_deref());
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!("Starting facet-ensemble v{}", env!("CARGO_PKG_VERSION"));
    if let Some(warning) = config_warning {
        warn!("{}", warning);
    }

    // Resolve root folder (CLI > env > TOML > platform default)
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_config_file(config_path)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let engine = build_engine(&config, &initializer).await?;

    match args.command {
        Command::Analyze {
            image,
            detectors,
            person,
            with_delta,
        } => analyze(&engine, &image, &detectors, person, with_delta).await,
        Command::Baseline { action } => baseline(&engine, action).await,
        Command::Delta {
            image,
            person,
            detector,
        } => delta(&engine, &image, &person, &detector).await,
        Command::Detectors => print_json(&engine.ensemble.registry().available().await),
    }
}

/// Wire detectors and baseline storage from configuration
async fn build_engine(config: &TomlConfig, initializer: &RootFolderInitializer) -> Result<FacetEngine> {
    let registry = Arc::new(DetectorRegistry::from_config(config));

    let repository: Arc<dyn BaselineRepository> = match config.baseline_storage {
        BaselineStorageKind::Json => {
            info!("Baseline storage: {}", initializer.baselines_dir().display());
            Arc::new(JsonFileRepository::new(initializer.baselines_dir()))
        }
        BaselineStorageKind::Sqlite => {
            let db_path = initializer.database_path();
            info!("Baseline storage: {}", db_path.display());
            Arc::new(
                SqliteRepository::connect(&db_path)
                    .await
                    .context("Failed to open baseline database")?,
            )
        }
    };

    Ok(FacetEngine::new(
        Ensemble::new(registry),
        CalibrationStore::new(repository),
    ))
}

async fn analyze(
    engine: &FacetEngine,
    image: &Path,
    detectors: &[String],
    person: Option<String>,
    with_delta: bool,
) -> Result<()> {
    let names = parse_detector_names(detectors)?;

    let person = match (person, with_delta) {
        (Some(person), _) => Some(person),
        (None, true) => Some(DEFAULT_PERSON_ID.to_string()),
        (None, false) => None,
    };
    if let Some(person) = &person {
        load_if_stored(engine, person).await?;
    }

    let report = engine
        .analyze(image, &names, person.as_deref())
        .await
        .context("Ensemble run failed")?;
    print_json(&report)
}

async fn baseline(engine: &FacetEngine, action: BaselineAction) -> Result<()> {
    match action {
        BaselineAction::Set {
            image,
            person,
            detector,
        } => {
            let record = run_single(engine, &image, &detector).await?;
            match engine.calibration.set_baseline(&record, &person).await {
                Ok(info) => print_json(&info),
                Err(CalibrationError::InvalidCalibrationTarget(reason)) => {
                    let detail = record.error().unwrap_or("no usable action units");
                    bail!("Cannot set baseline for {}: {} ({})", person, reason, detail)
                }
                Err(e) => Err(e).context("Failed to store baseline"),
            }
        }
        BaselineAction::Load { person } => {
            let info = engine
                .calibration
                .load_baseline(&person)
                .await
                .with_context(|| format!("Failed to load baseline for {}", person))?;
            print_json(&info)
        }
        BaselineAction::Clear { person } => {
            engine
                .calibration
                .clear_baseline(&person)
                .await
                .with_context(|| format!("Failed to clear baseline for {}", person))?;
            print_json(&json!({ "person_id": person, "cleared": true }))
        }
        BaselineAction::Info { person } => {
            load_if_stored(engine, &person).await?;
            match engine.calibration.baseline_info_for(&person).await {
                Some(info) => print_json(&info),
                None => print_json(&json!({ "person_id": person, "has_baseline": false })),
            }
        }
    }
}

async fn delta(engine: &FacetEngine, image: &Path, person: &str, detector: &str) -> Result<()> {
    if !load_if_stored(engine, person).await? {
        return print_json(&DeltaReport::no_baseline());
    }

    let record = run_single(engine, image, detector).await?;
    let report = engine.calibration.calculate_delta_for(person, &record).await;
    print_json(&report)
}

/// Load the stored baseline for `person`; `false` when none exists
async fn load_if_stored(engine: &FacetEngine, person: &str) -> Result<bool> {
    match engine.calibration.load_baseline(person).await {
        Ok(_) => Ok(true),
        Err(CalibrationError::NoBaselineStored(_)) => {
            warn!(person_id = %person, "No stored baseline");
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load baseline for {}", person)),
    }
}

/// Run one action unit detector and return its record
async fn run_single(engine: &FacetEngine, image: &Path, detector: &str) -> Result<DetectorRecord> {
    let name: DetectorName = detector.parse().map_err(anyhow::Error::msg)?;
    let mut report = engine.ensemble.run(image, &[name]).await?;

    report
        .results
        .remove(&name)
        .with_context(|| format!("Detector {} produced no record", name))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", output);
    Ok(())
}
