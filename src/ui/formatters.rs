use colored::*;
use humansize::{format_size, BINARY};

use crate::core::export::{FleetSummary, ScanSummary};
use crate::core::scanner::{CacheInfo, Severity};
use crate::core::system_monitor::{MetricsSample, MetricsSnapshot};
use crate::core::ScanKey;
use crate::error::KdashError;

const BAR_LENGTH: usize = 30;

pub fn print_section_header(title: &str) {
    println!("\n{}", title.bold().green());
    println!("{}", "-".repeat(title.len()));
}

pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// `[=========      ] 42.0%`, coloured by load.
pub fn percent_bar(percent: f32) -> String {
    let filled = ((percent / 100.0) * BAR_LENGTH as f32).round() as usize;
    let filled = filled.min(BAR_LENGTH);
    let bar = "=".repeat(filled);
    let colored_bar = if percent >= 90.0 {
        bar.red()
    } else if percent >= 75.0 {
        bar.yellow()
    } else {
        bar.green()
    };

    format!(
        "[{}{}] {:>5.1}%",
        colored_bar,
        " ".repeat(BAR_LENGTH - filled),
        percent
    )
}

pub fn severity_label(severity: &Severity) -> ColoredString {
    let label = severity.to_string();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.cyan(),
        Severity::Other(_) => label.dimmed(),
    }
}

pub fn print_scan_summary(summary: &ScanSummary, cached: bool) {
    let status = if summary.has_critical {
        "✗".red().bold()
    } else if summary.has_high {
        "!".yellow().bold()
    } else {
        "✓".green().bold()
    };

    let source = if cached { " (cached)".dimmed() } else { "".normal() };
    println!(
        "{} {}{}  {}",
        status,
        summary.image.to_string().bold(),
        source,
        summary.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );

    let counts = &summary.vulnerabilities;
    println!(
        "    {} {}  {} {}  {} {}  {} {}  total {}",
        severity_label(&Severity::Critical),
        counts.critical,
        severity_label(&Severity::High),
        counts.high,
        severity_label(&Severity::Medium),
        counts.medium,
        severity_label(&Severity::Low),
        counts.low,
        summary.total_vulnerabilities.to_string().bold()
    );
    if counts.unrecognized > 0 {
        println!(
            "    {}",
            format!("{} finding(s) with unrecognized severity", counts.unrecognized).dimmed()
        );
    }
}

pub fn print_fleet_summary(fleet: &FleetSummary) {
    print_section_header("Summary");
    println!("  Subjects: {}", fleet.subjects);
    println!(
        "  Findings: {} ({} critical, {} high)",
        fleet.total_vulnerabilities, fleet.vulnerabilities.critical, fleet.vulnerabilities.high
    );
    println!(
        "  Subjects with critical: {}",
        colorize_count(fleet.subjects_with_critical, true)
    );
    println!(
        "  Subjects with high: {}",
        colorize_count(fleet.subjects_with_high, false)
    );
}

pub fn print_scan_error(key: &str, err: &KdashError) {
    eprintln!(
        "{} {}  {} {}",
        "✗".red().bold(),
        key.bold(),
        format!("[{} {}]", err.http_status(), err.kind()).red(),
        err
    );
}

pub fn print_cache_info(info: &CacheInfo) {
    print_section_header("Scan cache");
    println!(
        "  Entries: {}  TTL: {}s",
        info.total_cached_entries, info.ttl_seconds
    );
    for entry in &info.entries {
        println!(
            "  {:<40} age {:>5}s  expires in {:>5}s",
            entry.key.to_string(),
            entry.age_seconds,
            entry.expires_in_seconds
        );
    }
}

pub fn print_invalidated(key: Option<&ScanKey>, removed: usize) {
    match key {
        Some(key) => println!("{} {} ({} removed)", "Scan cache cleared for".cyan(), key, removed),
        None => println!("{} ({} removed)", "All scan cache cleared".cyan(), removed),
    }
}

pub fn print_metrics(snapshot: &MetricsSnapshot) {
    let sample = &snapshot.sample;
    let details = &snapshot.details;

    print_section_header("Host metrics");
    println!("  CPU    {}", percent_bar(sample.cpu_percent));
    println!("  Memory {}", percent_bar(sample.memory_percent));
    println!("  Disk   {}", percent_bar(sample.disk_percent));

    let frequency = details
        .cpu
        .frequency_mhz
        .map(|f| format!(" @ {} MHz", f))
        .unwrap_or_default();
    println!("  Cores: {}{}", details.cpu.count, frequency);
    if !details.cpu.per_core.is_empty() {
        let cores: Vec<String> = details
            .cpu
            .per_core
            .iter()
            .map(|usage| format!("{:.0}%", usage))
            .collect();
        println!("  Per core: {}", cores.join(" ").dimmed());
    }
    println!(
        "  Memory: {} used of {} ({} available)",
        format_bytes(details.memory.used_bytes),
        format_bytes(details.memory.total_bytes),
        format_bytes(details.memory.available_bytes)
    );
    if !details.disk.mount_point.is_empty() {
        println!(
            "  Disk {}: {} used of {} ({} free)",
            details.disk.mount_point,
            format_bytes(details.disk.used_bytes),
            format_bytes(details.disk.total_bytes),
            format_bytes(details.disk.free_bytes)
        );
    }
}

pub fn print_history(samples: &[MetricsSample], capacity: usize) {
    print_section_header(&format!("History ({}/{})", samples.len(), capacity));
    for sample in samples {
        println!(
            "  {}  cpu {:>5.1}%  mem {:>5.1}%  disk {:>5.1}%",
            sample.timestamp.format("%H:%M:%S").to_string().dimmed(),
            sample.cpu_percent,
            sample.memory_percent,
            sample.disk_percent
        );
    }
}

fn colorize_count(count: usize, critical: bool) -> ColoredString {
    match (count, critical) {
        (0, _) => count.to_string().green(),
        (_, true) => count.to_string().red().bold(),
        (_, false) => count.to_string().yellow(),
    }
}
