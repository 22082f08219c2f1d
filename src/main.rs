// src/main.rs
mod config;
mod pipeline;
use std::fs;
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use log::info;
use config::PipelineConfig;
use pipeline::report::{render_summary_png, ReportStyle};
use pipeline::validate::ValidationSummary;

struct Args {
    dataset_root: Option<PathBuf>,
    config_path: Option<PathBuf>,
    report_path: PathBuf,
    summary_path: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        dataset_root: None,
        config_path: None,
        report_path: PathBuf::from("loso_results.png"),
        summary_path: PathBuf::from("loso_summary.json"),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config_path = Some(iter.next().context("--config needs a path")?.into());
            }
            "--out" => {
                args.report_path = iter.next().context("--out needs a path")?.into();
            }
            "--summary" => {
                args.summary_path = iter.next().context("--summary needs a path")?.into();
            }
            "--help" | "-h" => {
                eprintln!(
                    "usage: mindfold [dataset_root] [--config cfg.json] [--out report.png] [--summary summary.json]"
                );
                std::process::exit(0);
            }
            other if !other.starts_with('-') => {
                args.dataset_root = Some(PathBuf::from(other));
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(root) = &args.dataset_root {
        config.dataset_root = root.clone();
    }
    Ok(config)
}

fn print_summary(summary: &ValidationSummary) {
    let cm = summary.total_confusion;
    println!(
        "\nOverall Mean Accuracy: {:.3} +/- {:.3}",
        summary.mean_accuracy, summary.std_accuracy
    );
    println!("\nRelax Class:");
    println!(
        "  - Recall: {:.3} ({}/{})",
        summary.relax_recall,
        cm[0][0],
        cm[0][0] + cm[0][1]
    );
    println!(
        "  - Precision: {:.3} ({}/{})",
        summary.relax_precision,
        cm[0][0],
        cm[0][0] + cm[1][0]
    );
    println!("\nFocus Class:");
    println!(
        "  - Recall: {:.3} ({}/{})",
        summary.focus_recall,
        cm[1][1],
        cm[1][0] + cm[1][1]
    );
    println!(
        "  - Precision: {:.3} ({}/{})",
        summary.focus_precision,
        cm[1][1],
        cm[0][1] + cm[1][1]
    );
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;
    let config = load_config(&args)?;
    config.validate()?;

    println!("EEG relax/focus classification - leave-one-subject-out validation");
    info!(
        "dataset {}, profile {:?}, window {} samples, stride {}",
        config.dataset_root.display(),
        config.feature_profile,
        config.window_len(),
        config.stride()
    );

    let dataset = pipeline::assemble(&config)?;
    let summary = pipeline::run_loso(&dataset, &config);

    for fold in &summary.folds {
        println!("{}: Accuracy = {:.3}", fold.subject, fold.accuracy);
    }
    print_summary(&summary);

    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&args.summary_path, json)
        .with_context(|| format!("writing {}", args.summary_path.display()))?;
    let png = render_summary_png(&summary, ReportStyle::default())?;
    fs::write(&args.report_path, png)
        .with_context(|| format!("writing {}", args.report_path.display()))?;
    println!(
        "\nResults saved to {} and {}",
        args.report_path.display(),
        args.summary_path.display()
    );
    Ok(())
}
