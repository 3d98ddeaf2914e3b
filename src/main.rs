use std::time::Duration;

use api_responsiveness::{
    ApiResponsivenessMeasurement, Config, Error, MeasurementConfig, PrometheusClient, Summary,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the run finished but some calls were over budget.
const EXIT_VIOLATION: i32 = 2;
const EXIT_FAILURE: i32 = 1;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    std::process::exit(match run().await {
        Ok(()) => 0,
        Err(err) if err.is_metric_violation() => {
            warn!("{err}");
            EXIT_VIOLATION
        }
        Err(err) => {
            error!("{err}");
            EXIT_FAILURE
        }
    });
}

async fn run() -> Result<(), Error> {
    // ── 1. Configuration ─────────────────────────────────────────
    let config = Config::from_env()?;
    let run_duration = match std::env::var("RUN_DURATION_SECS") {
        Ok(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|e| {
            Error::InvalidArgument(format!("RUN_DURATION_SECS={raw:?}: {e}"))
        })?)),
        Err(_) => None,
    };
    info!(prometheus = %config.prometheus_url, "using metrics backend");

    // ── 2. Build measurement ─────────────────────────────────────
    let client = PrometheusClient::new(&config.prometheus_url)?;
    let measurement = ApiResponsivenessMeasurement::new(client, &config);

    // ── 3. Start, then wait for the test run ─────────────────────
    measurement
        .execute(&MeasurementConfig::with_action("start"))
        .await?;
    match run_duration {
        Some(d) => {
            info!(seconds = d.as_secs(), "waiting for run to finish (Ctrl-C to gather early)");
            tokio::select! {
                _ = tokio::time::sleep(d) => {}
                _ = tokio::signal::ctrl_c() => info!("interrupted, gathering now"),
            }
        }
        None => {
            info!("waiting for Ctrl-C to gather");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C, gathering now");
            }
        }
    }

    // ── 4. Gather & write summary ────────────────────────────────
    let result = measurement
        .execute(&MeasurementConfig::with_action("gather"))
        .await;
    let summaries: Vec<&Summary> = match &result {
        Ok(summaries) => summaries.iter().collect(),
        Err(err) => err.summary().into_iter().collect(),
    };
    for summary in summaries {
        write_summary(summary)?;
    }
    measurement.dispose();

    result.map(|_| ())
}

fn write_summary(summary: &Summary) -> Result<(), Error> {
    let json = summary.to_json_pretty()?;
    match std::env::var("SUMMARY_PATH") {
        Ok(path) => {
            std::fs::write(&path, json)
                .map_err(|e| Error::InvalidArgument(format!("writing {path}: {e}")))?;
            info!(%path, calls = summary.content.len(), "summary written");
        }
        Err(_) => println!("{json}"),
    }
    Ok(())
}
