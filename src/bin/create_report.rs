//! `create-report` — fetch every configured listing engine and write a
//! timestamped CSV report plus an error log.
//!
//! Thin glue over the `listing_report` library: argument parsing, config
//! loading, colored console progress, and the top-level error boundary.

use clap::Parser;
use colored::Colorize;
use listing_report::{Config, Error, ProgressEvent, ReportRunner, cancel_on_signal};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Create a geocoded listing report")]
struct Args {
    /// Path to a JSON config file (defaults used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured page-fetch concurrency
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the report output directory
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let code = match run().await {
        Ok(()) => 0,
        Err(Error::Interrupted) => {
            eprintln!("\n{}", "Interrupted".red());
            130
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> listing_report::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).await?;
    if let Some(concurrency) = args.concurrency {
        config.report.concurrency = concurrency;
    }
    if let Some(report_dir) = args.report_dir {
        config.report.raw_dir = report_dir.join("raws");
        config.report.report_dir = report_dir;
    }

    println!("concurrency={}", config.report.concurrency);
    println!("{}", "Creating report".cyan());

    let runner = ReportRunner::from_config(config)?;
    let cancel = cancel_on_signal();
    let summary = runner.run(&cancel, render_progress).await?;

    println!(
        "Completed with => [total {}] [normalized {}] [unique {}] [errors {}]",
        summary.total.to_string().magenta(),
        summary.normalized.to_string().magenta(),
        summary.unique.to_string().magenta(),
        summary.errors.to_string().magenta(),
    );
    Ok(())
}

async fn load_config(path: Option<&std::path::Path>) -> listing_report::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let body = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&body)?)
}

fn render_progress(event: ProgressEvent<'_>) {
    match event {
        ProgressEvent::PageStarted { engine, page } => {
            print!(
                "\r[{engine:^15}] {}",
                format!("Retrieving data from page {:>4}", page.get()).green()
            );
            std::io::stdout().flush().ok();
        }
        ProgressEvent::EngineFinished { results, errors, .. } => {
            println!(
                " => {}",
                format!("{results:>6} results {errors:>6} errors").magenta()
            );
        }
        ProgressEvent::Normalizing => {
            println!("Normalizing data");
        }
    }
}
