//! Detox CLI - Command-line interface for Detox Detach
//!
//! Commands:
//! - train: Train the risk-tier classifier from the subject CSV
//! - analyze: Predict a risk tier from screen-time screenshots
//! - predict: Predict a risk tier from an observation JSON file
//! - doctor: Diagnose configuration and model artifacts
//! - features: Print the model's feature order

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use detox_detach::artifacts::ArtifactBundle;
use detox_detach::config::DetoxConfig;
use detox_detach::features::FEATURE_NAMES;
use detox_detach::inference::InferenceAdapter;
use detox_detach::pipeline::TrainingPipeline;
use detox_detach::status::DetoxStatus;
use detox_detach::types::Prediction;
use detox_detach::vision::{GeminiAnalyzer, StagedUploads, RATE_LIMIT_MESSAGE};
use detox_detach::{logging, DetoxError, DETOX_VERSION, PRODUCER_NAME};

/// Folder scanned for screenshots when none are given
const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Detox - phone addiction risk tiers from behavior and screen-time screenshots
#[derive(Parser)]
#[command(name = "detox")]
#[command(version = DETOX_VERSION)]
#[command(about = "Train and run the phone-addiction risk classifier", long_about = None)]
struct Cli {
    /// Config file (defaults to ./detox.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the classifier and write the artifact set
    Train {
        /// Override the training CSV path
        #[arg(long)]
        data: Option<PathBuf>,

        /// Override the artifact output directory
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Print the evaluation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract metrics from screenshots and predict the risk tier
    Analyze {
        /// Screenshot files
        images: Vec<PathBuf>,

        /// Folder of screenshots (.png, .jpg, .jpeg, .webp)
        #[arg(long)]
        uploads: Option<PathBuf>,

        /// Move screenshots out of their folder instead of copying them
        #[arg(long)]
        consume: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Predict the risk tier from an observation JSON file
    Predict {
        /// Observation JSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and model artifacts
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature order used by the model
    Features,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DetoxCliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Train {
            data,
            model_dir,
            json,
        } => {
            let mut config = DetoxConfig::load_or_default(config_path)?;
            if let Some(data) = data {
                config.data.csv_path = data;
            }
            if let Some(model_dir) = model_dir {
                config.output.model_dir = model_dir;
            }
            cmd_train(&config, json)
        }

        Commands::Analyze {
            images,
            uploads,
            consume,
            json,
        } => {
            let config = DetoxConfig::load_or_default(config_path)?;
            cmd_analyze(&config, &images, uploads.as_deref(), consume, json)
        }

        Commands::Predict { input, json } => {
            let config = DetoxConfig::load_or_default(config_path)?;
            cmd_predict(&config, &input, json)
        }

        Commands::Doctor { json } => cmd_doctor(config_path, json),

        Commands::Features => {
            for (slot, name) in FEATURE_NAMES.iter().enumerate() {
                println!("{slot:>2}  {name}");
            }
            Ok(())
        }
    }
}

fn cmd_train(config: &DetoxConfig, json: bool) -> Result<(), DetoxCliError> {
    let outcome = TrainingPipeline::from_config(config).run()?;
    let report = outcome.evaluation();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.bundle.manifest)?);
    } else {
        println!("Model Training Accuracy: {:.2}%", report.accuracy_percent());
        println!(
            "Rows: {} train, {} test, {} dropped",
            report.n_train, report.n_test, report.dropped_rows
        );
        for class in &report.per_class {
            println!(
                "  tier {}: precision {:.3}  recall {:.3}  f1 {:.3}  support {}",
                class.tier, class.precision, class.recall, class.f1, class.support
            );
        }
        println!(
            "Saved bundle {} to {}",
            outcome.bundle.bundle_id(),
            outcome.model_dir.display()
        );
    }
    Ok(())
}

fn cmd_analyze(
    config: &DetoxConfig,
    images: &[PathBuf],
    uploads: Option<&Path>,
    consume: bool,
    json: bool,
) -> Result<(), DetoxCliError> {
    let bundle = ArtifactBundle::load(&config.output.model_dir)?;
    let analyzer = GeminiAnalyzer::from_config(&config.vision)?;
    let adapter = InferenceAdapter::new(Arc::new(bundle), config.placeholders.clone(), analyzer);

    let uploads = match uploads {
        Some(dir) => Some(dir.to_path_buf()),
        None if images.is_empty() && Path::new(DEFAULT_UPLOADS_DIR).is_dir() => {
            Some(PathBuf::from(DEFAULT_UPLOADS_DIR))
        }
        None => None,
    };

    let mut staged = match &uploads {
        Some(dir) => StagedUploads::from_dir(dir, consume)?,
        None => StagedUploads::new()?,
    };
    for image in images {
        staged.add_file(image, consume)?;
    }
    if staged.is_empty() {
        return Err(DetoxCliError::NoScreenshots);
    }

    tracing::info!(screenshots = staged.len(), "analyzing screenshots");
    let prediction = adapter.analyze_staged(staged)?;
    print_prediction(&prediction, json)
}

fn cmd_predict(config: &DetoxConfig, input: &Path, json: bool) -> Result<(), DetoxCliError> {
    let text = if input == Path::new("-") {
        io::read_to_string(io::stdin())?
    } else {
        fs::read_to_string(input)?
    };
    let response: serde_json::Value = serde_json::from_str(&text)?;

    let bundle = ArtifactBundle::load(&config.output.model_dir)?;
    let adapter = InferenceAdapter::without_analyzer(Arc::new(bundle), config.placeholders.clone());
    let prediction = adapter.predict_response(response)?;
    print_prediction(&prediction, json)
}

fn print_prediction(prediction: &Prediction, json: bool) -> Result<(), DetoxCliError> {
    let status = DetoxStatus::for_tier(prediction.tier);

    if json {
        let output = PredictionOutput { prediction, status };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let obs = &prediction.observation;
    println!("{} {}", status.icon, status.title);
    println!("{}", status.message);
    println!();
    println!("Daily usage:      {:.1} h", obs.daily_usage_hours);
    println!("Phone checks:     {}/day", obs.phone_checks_per_day);
    println!("Social media:     {:.1} h", obs.time_on_social_media);
    println!();
    println!("Growth plan:");
    for step in status.growth_plan {
        println!("  - {step}");
    }
    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), DetoxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, DETOX_VERSION),
    });

    let config = match DetoxConfig::load_or_default(config_path) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: match config_path {
                    Some(path) => format!("Loaded {}", path.display()),
                    None => "Using detox.toml or built-in defaults".to_string(),
                },
            });
            config
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            });
            DetoxConfig::default()
        }
    };

    checks.push(if config.data.csv_path.is_file() {
        DoctorCheck {
            name: "training_data".to_string(),
            status: CheckStatus::Ok,
            message: format!("Found {}", config.data.csv_path.display()),
        }
    } else {
        DoctorCheck {
            name: "training_data".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} not found (needed only for training)", config.data.csv_path.display()),
        }
    });

    checks.push(match ArtifactBundle::load(&config.output.model_dir) {
        Ok(bundle) => {
            let manifest = &bundle.manifest;
            DoctorCheck {
                name: "artifacts".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Bundle {} trained {} ({} trees, accuracy {:.2}%)",
                    manifest.bundle_id,
                    manifest.trained_at.format("%Y-%m-%d %H:%M UTC"),
                    bundle.model.trees.len(),
                    manifest.evaluation.accuracy_percent()
                ),
            }
        }
        Err(e) => DoctorCheck {
            name: "artifacts".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let key_set = std::env::var(&config.vision.api_key_env)
        .map(|key| !key.trim().is_empty())
        .unwrap_or(false);
    checks.push(DoctorCheck {
        name: "vision_api_key".to_string(),
        status: if key_set {
            CheckStatus::Ok
        } else {
            CheckStatus::Warning
        },
        message: if key_set {
            format!("{} is set", config.vision.api_key_env)
        } else {
            format!("{} is not set (needed only for analyze)", config.vision.api_key_env)
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DETOX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Detox Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DetoxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum DetoxCliError {
    Detox(DetoxError),
    NoScreenshots,
    DoctorFailed,
}

impl From<DetoxError> for DetoxCliError {
    fn from(e: DetoxError) -> Self {
        DetoxCliError::Detox(e)
    }
}

impl From<io::Error> for DetoxCliError {
    fn from(e: io::Error) -> Self {
        DetoxCliError::Detox(DetoxError::Io(e))
    }
}

impl From<serde_json::Error> for DetoxCliError {
    fn from(e: serde_json::Error) -> Self {
        DetoxCliError::Detox(DetoxError::Json(e))
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DetoxCliError> for CliError {
    fn from(e: DetoxCliError) -> Self {
        match e {
            DetoxCliError::Detox(e) => CliError {
                code: e.code().to_string(),
                hint: hint_for(&e).map(str::to_string),
                message: e.to_string(),
            },
            DetoxCliError::NoScreenshots => CliError {
                code: "NO_SCREENSHOTS".to_string(),
                message: "No screenshots to analyze".to_string(),
                hint: Some(format!(
                    "Pass image paths or put your screenshots in the '{DEFAULT_UPLOADS_DIR}' folder first"
                )),
            },
            DetoxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn hint_for(e: &DetoxError) -> Option<&'static str> {
    match e {
        DetoxError::DataLoad(_) => Some("Check [data] csv_path and the CSV columns"),
        DetoxError::UnseenCategory { .. } => {
            Some("Use a category present in the training data in [placeholders]")
        }
        DetoxError::ArtifactMismatch(_) => Some("Run 'detox train' to rebuild the model artifacts"),
        DetoxError::ExternalExtraction(message) if message == RATE_LIMIT_MESSAGE => {
            Some("Submit fewer screenshots (2-3) and try again later")
        }
        DetoxError::ExternalExtraction(_) => Some("Check the screenshots and the vision API key"),
        DetoxError::Config(_) => Some("Fix the config file and retry"),
        DetoxError::Training(_) => Some("Check the [training] settings"),
        DetoxError::Image(_) => Some("Use PNG, JPEG or WebP screenshots"),
        DetoxError::Io(_) => Some("Check file paths and permissions"),
        DetoxError::Json(_) => Some("Check JSON syntax"),
    }
}

// Report types

#[derive(serde::Serialize)]
struct PredictionOutput<'a> {
    #[serde(flatten)]
    prediction: &'a Prediction,
    status: &'a DetoxStatus,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
