//! Long-running trigger monitor fed from stdin.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch as shutdown};

use crate::cli::args::OutputFormat;
use crate::error::KioskError;
use crate::sync::{format_flush_report, ConnectivityMonitor, FlushReport, QueueManager, Signal};

/// Run the connectivity monitor until Ctrl-C.
///
/// Stdin feeds signals; once it closes the retry timer keeps running. Reports
/// are printed as they happen; passes that did nothing are not shown.
///
/// # Errors
///
/// Returns an error if the queue store becomes unusable.
pub async fn watch(
    manager: Arc<QueueManager>,
    tick_interval: Duration,
    format: OutputFormat,
) -> Result<String, KioskError> {
    let (signal_tx, signal_rx) = mpsc::channel(32);
    let (stop_tx, stop_rx) = shutdown::channel(false);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
        loop {
            let raw = match lines.next_segment().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed; no further signals");
                    break;
                },
            };
            let Ok(line) = std::str::from_utf8(&raw) else {
                tracing::warn!(bytes = raw.len(), "skipping input that is not UTF-8");
                continue;
            };
            match Signal::parse_line(line) {
                Some(signal) => {
                    if signal_tx.send(signal).await.is_err() {
                        break;
                    }
                },
                None => tracing::debug!(input = %line.trim(), "ignoring unrecognized input"),
            }
        }
        tracing::debug!("signal input ended");
    });

    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = stop_tx.send(true);
            },
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            },
        }
    });

    let monitor = ConnectivityMonitor::new(manager, tick_interval);
    let result = monitor
        .run_with(signal_rx, stop_rx, |report| {
            if let Some(line) = report_line(report, format) {
                println!("{line}");
            }
        })
        .await;

    reader.abort();
    interrupt.abort();
    result?;

    Ok(String::new())
}

fn report_line(report: &FlushReport, format: OutputFormat) -> Option<String> {
    if report.was_skipped() || report.attempted() == 0 {
        return None;
    }
    match format {
        OutputFormat::Json => serde_json::to_string(report).ok(),
        OutputFormat::Pretty => Some(format_flush_report(report)),
    }
}
