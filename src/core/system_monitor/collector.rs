//! Host sampling through `sysinfo`.
//!
//! Each facet (CPU, memory, disk) is read independently; one that cannot be
//! read is reported as `None` rather than failing the whole reading.

use std::path::Path;
use std::time::Instant;

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

use crate::error::{KdashError, Result};

use super::metrics::*;

/// Takes one synchronous reading of host resource state.
pub trait MetricsSampler: Send {
    fn sample(&mut self) -> Result<RawReading>;
}

/// Reads CPU, memory and disk usage through `sysinfo`.
pub struct SysinfoSampler {
    system: System,
    disks: Disks,
    last_cpu_refresh: Option<Instant>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: System::new_with_specifics(refresh_kind),
            disks: Disks::new_with_refreshed_list(),
            last_cpu_refresh: None,
        }
    }

    /// CPU usage is a delta between two refreshes; make sure the previous
    /// one is at least `MINIMUM_CPU_UPDATE_INTERVAL` old.
    fn refresh_cpu(&mut self) {
        match self.last_cpu_refresh {
            None => {
                self.system.refresh_cpu_all();
                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
            Some(at) => {
                let elapsed = at.elapsed();
                if elapsed < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL {
                    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL - elapsed);
                }
            }
        }
        self.system.refresh_cpu_all();
        self.last_cpu_refresh = Some(Instant::now());
    }

    fn collect_cpu(&self) -> (Option<f32>, CpuDetails) {
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return (None, CpuDetails::default());
        }

        let details = CpuDetails {
            count: cpus.len(),
            frequency_mhz: cpus.first().map(|c| c.frequency()).filter(|f| *f > 0),
            per_core: cpus.iter().map(|cpu| cpu.cpu_usage()).collect(),
        };
        (Some(self.system.global_cpu_usage()), details)
    }

    fn collect_memory(&self) -> (Option<f32>, MemoryUsage) {
        let total = self.system.total_memory();
        let used = self.system.used_memory();

        let usage = MemoryUsage {
            total_bytes: total,
            available_bytes: self.system.available_memory(),
            used_bytes: used,
        };
        (percent_of(used, total), usage)
    }

    fn collect_disk(&self) -> (Option<f32>, DiskUsage) {
        let candidates = self.disks.iter().map(|disk| {
            let total = disk.total_space();
            let free = disk.available_space();
            DiskUsage {
                mount_point: disk.mount_point().to_string_lossy().to_string(),
                total_bytes: total,
                used_bytes: total.saturating_sub(free),
                free_bytes: free,
            }
        });

        match pick_disk(candidates) {
            Some(disk) => (percent_of(disk.used_bytes, disk.total_bytes), disk),
            None => (None, DiskUsage::default()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSampler for SysinfoSampler {
    fn sample(&mut self) -> Result<RawReading> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(KdashError::sampling_unavailable(
                "host metrics are not supported on this platform",
            ));
        }

        self.refresh_cpu();
        self.system.refresh_memory();
        self.disks.refresh(true);

        let (cpu_percent, cpu) = self.collect_cpu();
        let (memory_percent, memory) = self.collect_memory();
        let (disk_percent, disk) = self.collect_disk();

        if cpu_percent.is_none() {
            log::warn!("CPU usage unavailable, reporting 0");
        }
        if memory_percent.is_none() {
            log::warn!("Memory usage unavailable, reporting 0");
        }
        if disk_percent.is_none() {
            log::warn!("Disk usage unavailable, reporting 0");
        }

        Ok(RawReading {
            cpu_percent,
            memory_percent,
            disk_percent,
            details: HostDetails {
                cpu,
                memory,
                disk,
                boot_time: System::boot_time(),
            },
        })
    }
}

/// Prefer the root mount; otherwise the largest non-empty disk.
pub fn pick_disk<I>(candidates: I) -> Option<DiskUsage>
where
    I: IntoIterator<Item = DiskUsage>,
{
    let mut largest: Option<DiskUsage> = None;
    for disk in candidates {
        if disk.total_bytes == 0 {
            continue;
        }
        if Path::new(&disk.mount_point) == Path::new("/") {
            return Some(disk);
        }
        if largest
            .as_ref()
            .map_or(true, |current| disk.total_bytes > current.total_bytes)
        {
            largest = Some(disk);
        }
    }
    largest
}
