use kdash::core::system_monitor::{
    MetricsCache, MetricsCacheSettings, MetricsSampler, RawReading, DEFAULT_HISTORY_SIZE,
};
use kdash::{KdashError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Replays readings in order (the last one repeats) and counts calls.
struct ScriptedSampler {
    readings: Vec<RawReading>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedSampler {
    fn new(readings: Vec<RawReading>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sampler = Self {
            readings,
            calls: calls.clone(),
            delay: Duration::ZERO,
        };
        (sampler, calls)
    }
}

impl MetricsSampler for ScriptedSampler {
    fn sample(&mut self) -> Result<RawReading> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.readings
            .get(call)
            .or_else(|| self.readings.last())
            .cloned()
            .ok_or_else(|| KdashError::sampling_unavailable("no readings scripted"))
    }
}

fn reading(cpu: f32) -> RawReading {
    RawReading {
        cpu_percent: Some(cpu),
        memory_percent: Some(40.0),
        disk_percent: Some(70.0),
        ..Default::default()
    }
}

fn uncached(history_limit: usize) -> MetricsCacheSettings {
    MetricsCacheSettings {
        ttl: Duration::ZERO,
        history_limit,
    }
}

#[test]
fn test_history_keeps_newest_samples() {
    let readings = (1..=6).map(|i| reading(i as f32)).collect();
    let (sampler, calls) = ScriptedSampler::new(readings);
    let cache = MetricsCache::new(Box::new(sampler), uncached(5));

    for _ in 0..6 {
        cache.get_metrics().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    let history = cache.get_history();
    assert_eq!(history.len(), 5);
    let cpu: Vec<f32> = history.iter().map(|s| s.cpu_percent).collect();
    assert_eq!(cpu, vec![2.0, 3.0, 4.0, 5.0, 6.0]);

    let series = cache.history_series();
    assert_eq!(series.cpu, cpu);
    assert_eq!(series.timestamp.len(), 5);
}

#[test]
fn test_default_history_size() {
    let (sampler, _) = ScriptedSampler::new(vec![reading(10.0)]);
    let cache = MetricsCache::new(Box::new(sampler), uncached(DEFAULT_HISTORY_SIZE));

    for _ in 0..DEFAULT_HISTORY_SIZE + 1 {
        cache.get_metrics().unwrap();
    }
    assert_eq!(cache.get_history().len(), 100);
    assert_eq!(cache.history_capacity(), 100);
}

#[test]
fn test_values_always_within_bounds() {
    let readings = vec![
        RawReading {
            cpu_percent: Some(-12.5),
            memory_percent: Some(250.0),
            disk_percent: None,
            ..Default::default()
        },
        RawReading {
            cpu_percent: Some(f32::NAN),
            memory_percent: Some(f32::INFINITY),
            disk_percent: Some(100.0),
            ..Default::default()
        },
    ];
    let (sampler, _) = ScriptedSampler::new(readings);
    let cache = MetricsCache::new(Box::new(sampler), uncached(10));

    let first = cache.get_metrics().unwrap();
    assert_eq!(first.sample.cpu_percent, 0.0);
    assert_eq!(first.sample.memory_percent, 100.0);
    assert_eq!(first.sample.disk_percent, 0.0);

    cache.get_metrics().unwrap();
    for sample in cache.get_history() {
        for value in [sample.cpu_percent, sample.memory_percent, sample.disk_percent] {
            assert!((0.0..=100.0).contains(&value), "{} out of range", value);
        }
    }
}

#[test]
fn test_one_facet_failing_keeps_the_others() {
    let (sampler, _) = ScriptedSampler::new(vec![RawReading {
        cpu_percent: Some(33.0),
        memory_percent: None,
        disk_percent: Some(81.5),
        ..Default::default()
    }]);
    let cache = MetricsCache::new(Box::new(sampler), uncached(10));

    let snapshot = cache.get_metrics().unwrap();
    assert_eq!(snapshot.sample.cpu_percent, 33.0);
    assert_eq!(snapshot.sample.memory_percent, 0.0);
    assert_eq!(snapshot.sample.disk_percent, 81.5);
}

#[test]
fn test_sampler_error_is_reported_and_not_recorded() {
    let (sampler, _) = ScriptedSampler::new(Vec::new());
    let cache = MetricsCache::new(Box::new(sampler), uncached(10));

    let err = cache.get_metrics().unwrap_err();
    assert!(matches!(err, KdashError::SamplingUnavailable(_)));
    assert_eq!(err.http_status(), 500);
    assert!(cache.get_history().is_empty());
}

#[test]
fn test_concurrent_readers_share_one_sample() {
    let (mut sampler, calls) = ScriptedSampler::new(vec![reading(55.0)]);
    sampler.delay = Duration::from_millis(100);
    let cache = Arc::new(MetricsCache::new(
        Box::new(sampler),
        MetricsCacheSettings {
            ttl: Duration::from_secs(60),
            history_limit: 10,
        },
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || cache.get_metrics().unwrap())
        })
        .collect();
    let snapshots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(snapshots.iter().all(|s| s == &snapshots[0]));
    assert_eq!(cache.get_history().len(), 1);
}

#[test]
fn test_clear_all_resets_snapshot_and_history() {
    let (sampler, calls) = ScriptedSampler::new(vec![reading(20.0), reading(80.0)]);
    let cache = MetricsCache::new(
        Box::new(sampler),
        MetricsCacheSettings {
            ttl: Duration::from_secs(60),
            history_limit: 10,
        },
    );

    assert_eq!(cache.get_metrics().unwrap().sample.cpu_percent, 20.0);
    cache.clear_all();
    assert!(cache.get_history().is_empty());

    // The cached snapshot went with the history, so this samples again
    assert_eq!(cache.get_metrics().unwrap().sample.cpu_percent, 80.0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get_history().len(), 1);
}

#[test]
fn test_clear_all_under_concurrent_sampling() {
    let (sampler, _) = ScriptedSampler::new(vec![reading(50.0)]);
    let cache = Arc::new(MetricsCache::new(Box::new(sampler), uncached(8)));

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    cache.get_metrics().unwrap();
                }
            })
        })
        .collect();

    for _ in 0..50 {
        cache.clear_all();
        assert!(cache.get_history().len() <= 8);
        thread::yield_now();
    }
    for writer in writers {
        writer.join().unwrap();
    }

    for _ in 0..8 {
        cache.get_metrics().unwrap();
    }
    assert_eq!(cache.get_history().len(), 8);
    cache.clear_all();
    assert!(cache.get_history().is_empty());
}
