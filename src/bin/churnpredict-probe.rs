//! Smoke client that exercises a running churn prediction server.

use std::path::PathBuf;
use std::time::Duration;

use churnpredict::features::FeatureRecord;
use churnpredict::http_client::{RetryConfig, agent, read_response_text, retry_with_backoff};
use serde_json::json;

const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let text = std::fs::read_to_string(&options.payloads)
        .map_err(|err| format!("Failed to read {}: {err}", options.payloads.display()))?;
    let records: Vec<FeatureRecord> = serde_json::from_str(&text)
        .map_err(|err| format!("Invalid payloads in {}: {err}", options.payloads.display()))?;
    let first = records
        .first()
        .ok_or_else(|| "Payload file holds no records".to_string())?;
    let base = options.url.trim_end_matches('/');

    let retry = RetryConfig {
        max_attempts: options.attempts,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(2),
    };
    let health = retry_with_backoff(
        retry,
        || agent().get(&format!("{base}/health")).call(),
        |err| matches!(err, ureq::Error::Transport(_)),
    );
    report("GET /health", health)?;

    let predict = agent()
        .post(&format!("{base}/predict"))
        .send_json(first);
    report("POST /predict", predict)?;

    let batch = agent()
        .post(&format!("{base}/predict_batch"))
        .send_json(json!({ "batch": records }));
    report("POST /predict_batch", batch)?;
    Ok(())
}

/// Print status and body. Error statuses are printed; transport failures abort.
fn report(label: &str, result: Result<ureq::Response, ureq::Error>) -> Result<(), String> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(err) => return Err(format!("{label}: {err}")),
    };
    let status = response.status();
    let body = read_response_text(response, MAX_RESPONSE_BYTES)
        .map_err(|err| format!("{label}: failed to read body: {err}"))?;
    println!("{label} -> {status}");
    println!("{body}");
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    url: String,
    payloads: PathBuf,
    attempts: usize,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut url = "http://127.0.0.1:8000".to_string();
    let mut payloads: Option<PathBuf> = None;
    let mut attempts = 5usize;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--url" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--url requires a value".to_string())?;
                url = value.clone();
            }
            "--payloads" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--payloads requires a value".to_string())?;
                payloads = Some(PathBuf::from(value));
            }
            "--attempts" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--attempts requires a value".to_string())?;
                attempts = value
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| format!("Invalid --attempts value: {value}"))?;
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let payloads = payloads.ok_or_else(help_text)?;
    Ok(CliOptions {
        url,
        payloads,
        attempts,
    })
}

fn help_text() -> String {
    [
        "churnpredict-probe",
        "",
        "Calls /health, /predict and /predict_batch on a running server.",
        "",
        "Usage:",
        "  churnpredict-probe --payloads <file.json> [--url <base>] [--attempts <n>]",
        "",
        "Options:",
        "  --payloads <file>  JSON array of feature records (required).",
        "  --url <base>       Server base URL (default: http://127.0.0.1:8000).",
        "  --attempts <n>     Connection attempts for /health while the server starts (default: 5).",
    ]
    .join("\n")
}
