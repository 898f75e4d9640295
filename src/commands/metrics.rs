//! `kdash metrics`: sample host metrics through the snapshot cache.

use anyhow::Result;
use clap::ArgMatches;
use std::time::Duration;

use crate::core::system_monitor::{MetricsCache, MetricsCacheSettings, SysinfoSampler};
use crate::core::Config;
use crate::ui::formatters;

pub fn execute(matches: &ArgMatches, config: &Config) -> Result<()> {
    let samples = matches.get_one::<u64>("samples").copied().unwrap_or(1).max(1);
    let interval = matches.get_one::<u64>("interval-ms").copied().unwrap_or(1000);
    let show_history = matches.get_flag("history");
    let json_output = matches.get_flag("json");

    let cache = MetricsCache::new(
        Box::new(SysinfoSampler::new()),
        MetricsCacheSettings::from(config),
    );

    for i in 0..samples {
        let snapshot = cache.get_metrics()?;
        if json_output {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            formatters::print_metrics(&snapshot);
        }

        if i + 1 < samples {
            std::thread::sleep(Duration::from_millis(interval));
        }
    }

    if show_history {
        if json_output {
            println!("{}", serde_json::to_string(&cache.history_series())?);
        } else {
            formatters::print_history(&cache.get_history(), cache.history_capacity());
        }
    }

    Ok(())
}
