//! Trains the churn decision tree and writes the serving artifact.

use std::path::PathBuf;

use churnpredict::logging;
use churnpredict::training::{self, TrainingOptions, TrainingReport};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init(logging::TRAINER_LOG_PREFIX) {
        eprintln!("Logging disabled: {err}");
    }
    if !options.data.is_file() {
        return Err(format!("Dataset file not found: {}", options.data.display()));
    }
    let report = training::run_training(&options.data, &options.out, &options.training)
        .map_err(|err| err.to_string())?;
    print_report(&report);
    println!("model written to {}", options.out.display());
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!(
        "rows: {} (dropped {}), stayed={} churned={}",
        report.rows, report.dropped, report.class_counts[0], report.class_counts[1]
    );
    println!(
        "train rows: {} (after SMOTE: {}), test rows: {}",
        report.summary.train_rows, report.summary.resampled_rows, report.summary.test_rows
    );
    println!();
    println!("classification report (test set):");
    print!("{}", report.test_report.render());
    println!();
    println!("confusion matrix (rows=true, cols=pred):");
    print!("{}", report.confusion.render());
    if let Some(cv) = &report.cross_validation {
        println!();
        println!("cross-validation ({} folds, churn class):", cv.folds.len());
        for (idx, fold) in cv.folds.iter().enumerate() {
            println!(
                "  fold {idx}: accuracy={:.3} precision={:.3} recall={:.3} f1={:.3}",
                fold.accuracy, fold.precision, fold.recall, fold.f1
            );
        }
        println!(
            "  mean:   accuracy={:.3} precision={:.3} recall={:.3} f1={:.3}",
            cv.mean.accuracy, cv.mean.precision, cv.mean.recall, cv.mean.f1
        );
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    data: PathBuf,
    out: PathBuf,
    training: TrainingOptions,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data: Option<PathBuf> = None;
    let mut out = training::default_artifact_path();
    let mut training = TrainingOptions::default();

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        match flag {
            "-h" | "--help" => return Err(help_text()),
            "--no-cv" => training.cv_folds = None,
            "--data" => data = Some(PathBuf::from(value(&args, &mut idx, flag)?)),
            "--out" => out = PathBuf::from(value(&args, &mut idx, flag)?),
            "--max-depth" => {
                let depth: usize = parse(value(&args, &mut idx, flag)?, flag)?;
                training.tree.max_depth = (depth > 0).then_some(depth);
            }
            "--min-samples-leaf" => {
                training.tree.min_samples_leaf = parse(value(&args, &mut idx, flag)?, flag)?;
            }
            "--min-samples-split" => {
                training.tree.min_samples_split = parse(value(&args, &mut idx, flag)?, flag)?;
            }
            "--test-size" => training.test_size = parse(value(&args, &mut idx, flag)?, flag)?,
            "--seed" => {
                let seed: u64 = parse(value(&args, &mut idx, flag)?, flag)?;
                training.seed = seed;
                training.smote.seed = seed;
            }
            "--folds" => training.cv_folds = Some(parse(value(&args, &mut idx, flag)?, flag)?),
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let data = data.ok_or_else(help_text)?;
    Ok(CliOptions {
        data,
        out,
        training,
    })
}

fn value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn help_text() -> String {
    [
        "churnpredict-train",
        "",
        "Trains a churn decision tree (SMOTE + CART) from a raw churn export.",
        "",
        "Usage:",
        "  churnpredict-train --data <Churn.xlsx|file.csv|file.jsonl> [--out <artifact.json>] [options]",
        "",
        "Options:",
        "  --data <file>              Raw churn rows; format follows the extension (required).",
        "  --out <file>               Artifact path (default: models/churn_model.json).",
        "  --max-depth <n>            Tree depth limit, 0 for unlimited (default: 5).",
        "  --min-samples-leaf <n>     Minimum rows per leaf (default: 10).",
        "  --min-samples-split <n>    Minimum rows to split a node (default: 20).",
        "  --test-size <f64>          Held-out fraction (default: 0.3).",
        "  --seed <n>                 Seed for split, folds and SMOTE (default: 42).",
        "  --folds <n>                Cross-validation folds (default: 5).",
        "  --no-cv                    Skip cross-validation.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn data_is_required() {
        assert!(parse_args(args(&["--out", "m.json"])).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let options = parse_args(args(&[
            "--data",
            "churn.jsonl",
            "--max-depth",
            "0",
            "--seed",
            "7",
            "--no-cv",
        ]))
        .unwrap();
        assert_eq!(options.data, PathBuf::from("churn.jsonl"));
        assert_eq!(options.training.tree.max_depth, None);
        assert_eq!(options.training.seed, 7);
        assert_eq!(options.training.smote.seed, 7);
        assert!(options.training.cv_folds.is_none());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = parse_args(args(&["--data", "x", "--test-size", "lots"])).unwrap_err();
        assert_eq!(err, "Invalid --test-size value: lots");
    }
}
