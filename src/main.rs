//! Entry point for the churn prediction HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use churnpredict::config::{self, AppConfig};
use churnpredict::inference::InferenceService;
use churnpredict::{logging, server};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init(logging::SERVER_LOG_PREFIX) {
        eprintln!("Logging disabled: {err}");
    }

    let config = load_config(options.config_path.as_ref())?;
    tracing::info!(
        bind = %config.server.bind,
        model = %config.model.path.display(),
        bounds = ?config.validation.bounds,
        "Configuration loaded"
    );

    let service = InferenceService::load(&config.model.path, config.validation.bounds)
        .map_err(|err| format!("Failed to load model: {err}"))?;
    server::serve(&config.server, Arc::new(service)).map_err(|err| err.to_string())
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, String> {
    let mut config = match path {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("Config file not found: {}", path.display()));
            }
            config::load_from(path)
        }
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    config.apply_env_overrides();
    Ok(config)
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config_path: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "churnpredict",
        "",
        "Serves churn predictions over HTTP from a trained model artifact.",
        "",
        "Usage:",
        "  churnpredict [--config <file>]",
        "",
        "Options:",
        "  --config <file>  TOML config (default: config.toml in the application directory).",
        "",
        "Environment:",
        "  CHURN_MODEL_PATH  Overrides model.path.",
        "  CHURN_BIND        Overrides server.bind.",
        "  CHURN_HOME        Replaces the OS config directory as the application root.",
        "  RUST_LOG          Log filter (default: info).",
    ]
    .join("\n")
}
