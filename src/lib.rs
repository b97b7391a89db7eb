//! # listing-report
//!
//! Backend library for periodic bulk exports of geocoded listing data.
//!
//! ## Design Philosophy
//!
//! listing-report is designed to be:
//! - **Failure-tolerant** - one bad page never aborts a run; failures become
//!   structured page errors alongside the results
//! - **Bounded** - page fetches run under a configurable concurrency cap
//! - **Library-first** - the bundled `create-report` binary is thin glue over
//!   the same public API
//! - **Schemaless until the end** - records stay as field maps; only the
//!   report stage interprets coordinates, regions, and names
//!
//! ## Quick Start
//!
//! ```no_run
//! use listing_report::{Config, ReportRunner, cancel_on_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: Config = serde_json::from_value(serde_json::json!({
//!         "engines": [
//!             { "name": "listings", "base_url": "https://example.com/api/listings" }
//!         ]
//!     }))?;
//!
//!     let runner = ReportRunner::from_config(config)?;
//!     let cancel = cancel_on_signal();
//!     let summary = runner.run(&cancel, |_| {}).await?;
//!     println!("{} unique records", summary.unique);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Pagination engine with bounded concurrency
pub mod engine;
/// Error types
pub mod error;
/// Page-fetching contract and the HTTP implementation
pub mod fetcher;
/// Geo-coordinate normalization
pub mod normalize;
/// Report assembly and output artifacts
pub mod report;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, EngineConfig, FieldsConfig, ReportConfig, TotalPagesSource};
pub use engine::{MAX_CONCURRENCY, scrape};
pub use error::{Error, FetchError, Result};
pub use fetcher::{HttpListingFetcher, PageFetcher};
pub use normalize::{normalize_geopoint, normalize_record};
pub use report::{ProgressEvent, ReportRunner};
pub use types::{PageCount, PageError, PageId, RawRecord, RunResult, RunSummary};

use tokio_util::sync::CancellationToken;

/// Create a cancellation token that fires on an operator interrupt.
///
/// Spawns a background task waiting for a termination signal and cancels the
/// returned token when one arrives, so in-flight page fetches are abandoned
/// and no further pages are scheduled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Must be called from within a Tokio runtime.
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let signalled = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signalled.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
