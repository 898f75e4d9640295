//! `kdash export`: re-render a saved scan entry as JSON or CSV.

use anyhow::{Context, Result};
use clap::ArgMatches;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::core::export::{self, ExportFormat};
use crate::core::ScanEntry;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .get_one::<PathBuf>("file")
        .context("A scan file is required")?;
    let format: ExportFormat = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("json")
        .parse()?;

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scan file: {:?}", path))?;
    let entry: ScanEntry = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse scan file: {:?}", path))?;

    let exported = export::export(&entry, format)?;
    log::debug!(
        "Exporting {} as {} ({})",
        entry.key,
        exported.file_name,
        exported.content_type
    );

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&exported.body)?;
    if !exported.body.ends_with(b"\n") {
        writeln!(stdout)?;
    }
    Ok(())
}
