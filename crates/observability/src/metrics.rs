//! Beatcast 指标收集模块
//!
//! Prometheus series for the clock tracker and both transports, plus an
//! in-memory aggregator for the end-of-run summary.

use std::collections::HashMap;

use contracts::BatchReport;
use metrics::{counter, gauge, histogram};

/// 记录时钟偏移
pub fn record_clock_offset_ms(offset_ms: f64) {
    counter!("beatcast_clock_syncs_total").increment(1);
    gauge!("beatcast_clock_offset_ms").set(offset_ms);
}

/// 记录操作员请求的数据包
pub fn record_packet_requested(transport: &str) {
    counter!(
        "beatcast_packets_requested_total",
        "transport" => transport.to_string()
    )
    .increment(1);
}

/// 广播重启事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseEvent {
    /// Restart began
    Restart,
    /// Stop failed, restart will be retried
    StopFailure,
    /// Start failed, reported to the caller
    StartFailure,
    /// A superseded completion was dropped
    StaleCompletion,
}

/// 记录广播重启状态机事件
pub fn record_advertise_event(event: AdvertiseEvent) {
    let name = match event {
        AdvertiseEvent::Restart => "beatcast_advertise_restarts_total",
        AdvertiseEvent::StopFailure => "beatcast_advertise_stop_failures_total",
        AdvertiseEvent::StartFailure => "beatcast_advertise_start_failures_total",
        AdvertiseEvent::StaleCompletion => "beatcast_advertise_stale_completions_total",
    };
    counter!(name).increment(1);
}

/// 记录一次分发批次
pub fn record_batch(report: &BatchReport) {
    counter!("beatcast_dispatch_batches_total").increment(1);
    histogram!("beatcast_dispatch_batch_duration_ms")
        .record(report.duration.as_secs_f64() * 1000.0);

    for (_, outcome) in &report.outcomes {
        counter!(
            "beatcast_device_updates_total",
            "outcome" => outcome.label()
        )
        .increment(1);
    }
}

/// 记录已注册设备数
pub fn record_registered_devices(count: usize) {
    gauge!("beatcast_registered_devices").set(count as f64);
}

/// 分发指标聚合器
///
/// 在内存中聚合批次结果，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchAggregator {
    /// 批次总数
    pub total_batches: u64,

    /// 结果计数 (outcome label -> count)
    pub outcome_counts: HashMap<&'static str, u64>,

    /// 各设备失败次数
    pub device_failures: HashMap<String, u64>,

    /// 批次耗时统计 (ms)
    pub batch_duration_stats: RunningStats,
}

impl DispatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &BatchReport) {
        self.total_batches += 1;
        self.batch_duration_stats
            .push(report.duration.as_secs_f64() * 1000.0);

        for (device, outcome) in &report.outcomes {
            *self.outcome_counts.entry(outcome.label()).or_insert(0) += 1;
            if outcome.label() == "failed" {
                *self
                    .device_failures
                    .entry(device.to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DispatchSummary {
        let count = |label: &str| self.outcome_counts.get(label).copied().unwrap_or(0);
        DispatchSummary {
            total_batches: self.total_batches,
            done: count("done"),
            aborted: count("aborted"),
            failed: count("failed"),
            skipped: count("skipped"),
            batch_duration_ms: StatsSummary::from(&self.batch_duration_stats),
            device_failures: self.device_failures.clone(),
        }
    }
}

/// 分发摘要
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub total_batches: u64,
    pub done: u64,
    pub aborted: u64,
    pub failed: u64,
    pub skipped: u64,
    pub batch_duration_ms: StatsSummary,
    pub device_failures: HashMap<String, u64>,
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Batches: {}", self.total_batches)?;
        writeln!(
            f,
            "Device updates: done={} aborted={} failed={} skipped={}",
            self.done, self.aborted, self.failed, self.skipped
        )?;
        writeln!(f, "Batch duration (ms): {}", self.batch_duration_ms)?;

        if !self.device_failures.is_empty() {
            writeln!(f, "Failures per device:")?;
            for (device, count) in &self.device_failures {
                writeln!(f, "  {}: {}", device, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
