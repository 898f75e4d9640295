//! `kdash scan`: scan one or more images through a shared coordinator.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use futures_util::future::join_all;
use std::io::Write;
use std::sync::Arc;

use crate::core::export::{self, ExportFormat};
use crate::core::scanner::{CoordinatorSettings, ScanCoordinator, ScanEntry, TrivyInvoker};
use crate::core::{Config, ScanKey};
use crate::error::KdashError;
use crate::ui::formatters;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Summary,
    Export(ExportFormat),
}

pub fn execute(matches: &ArgMatches, config: &Config) -> Result<()> {
    let images: Vec<String> = matches
        .get_many::<String>("images")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let force_refresh = matches.get_flag("force");
    let show_cache = matches.get_flag("show-cache");
    let invalidate = matches.get_one::<String>("invalidate").cloned();

    let mode = match matches.get_one::<String>("format").map(String::as_str) {
        None | Some("summary") => OutputMode::Summary,
        Some(other) => OutputMode::Export(other.parse()?),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("kdash-scan")
        .build()
        .context("Failed to start async runtime")?;

    let coordinator = ScanCoordinator::new(
        Arc::new(TrivyInvoker::from_config(config)),
        CoordinatorSettings::from(config),
    );

    let failures = runtime.block_on(scan_all(&coordinator, &images, force_refresh, mode))?;

    if let Some(target) = invalidate {
        if target == "all" {
            formatters::print_invalidated(None, coordinator.invalidate(None));
        } else {
            let key = ScanKey::parse(&target)?;
            formatters::print_invalidated(Some(&key), coordinator.invalidate(Some(&key)));
        }
    }

    if show_cache {
        let info = coordinator.cache_info();
        if mode == OutputMode::Export(ExportFormat::Json) {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            formatters::print_cache_info(&info);
        }
    }

    if failures > 0 {
        bail!("{} of {} scan(s) failed", failures, images.len());
    }
    Ok(())
}

/// Run every requested scan concurrently; duplicates share one scan.
/// Returns the number of failed subjects.
async fn scan_all(
    coordinator: &ScanCoordinator,
    images: &[String],
    force_refresh: bool,
    mode: OutputMode,
) -> Result<usize> {
    let scans = images.iter().map(|raw| async move {
        let key = ScanKey::parse(raw)?;
        let cached = !force_refresh && coordinator.get_cached(&key).is_some();
        let entry = coordinator.get_or_scan(&key, force_refresh).await?;
        Ok::<_, KdashError>((entry, cached))
    });
    let outcomes = join_all(scans).await;

    let mut failures = 0;
    let mut succeeded: Vec<Arc<ScanEntry>> = Vec::new();
    for (raw, outcome) in images.iter().zip(outcomes) {
        match outcome {
            Ok((entry, cached)) => {
                write_entry(&entry, cached, mode)?;
                succeeded.push(entry);
            }
            Err(e) => {
                formatters::print_scan_error(raw, &e);
                failures += 1;
            }
        }
    }

    if mode == OutputMode::Summary && succeeded.len() > 1 {
        let fleet = export::summarize_all(succeeded.iter().map(|entry| entry.as_ref()));
        formatters::print_fleet_summary(&fleet);
    }

    Ok(failures)
}

fn write_entry(entry: &ScanEntry, cached: bool, mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Summary => {
            formatters::print_scan_summary(&export::summarize(entry), cached);
        }
        OutputMode::Export(format) => {
            let exported = export::export(entry, format)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&exported.body)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
