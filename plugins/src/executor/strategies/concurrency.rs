use std::sync::Mutex;
use std::time::{Duration, Instant};

use rigup_core::config::ConcurrencyConfig;
use rigup_core::executor::{ConcurrencyContext, ConcurrencyStrategy};

/// Scales the parallel bound with current CPU load.
pub struct AdaptiveConcurrency {
    config: ConcurrencyConfig,
    sampler: Mutex<CpuSampler>,
}

struct CpuSampler {
    sys: sysinfo::System,
    last_refresh: Option<Instant>,
    cached_usage: f32,
}

impl CpuSampler {
    fn new() -> Self {
        Self {
            sys: sysinfo::System::new(),
            last_refresh: None,
            cached_usage: 0.0,
        }
    }

    /// Average CPU usage in percent, refreshed at most once per second.
    fn usage(&mut self) -> f32 {
        let stale = self
            .last_refresh
            .map(|t| t.elapsed() > Duration::from_secs(1))
            .unwrap_or(true);
        if stale {
            self.sys.refresh_cpu();
            let cpus = self.sys.cpus();
            let count = cpus.len().max(1);
            self.cached_usage = cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / count as f32;
            self.last_refresh = Some(Instant::now());
        }
        self.cached_usage
    }
}

impl AdaptiveConcurrency {
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self {
            config,
            sampler: Mutex::new(CpuSampler::new()),
        }
    }

    fn current_usage(&self) -> f32 {
        match self.sampler.lock() {
            Ok(mut sampler) => sampler.usage(),
            Err(poisoned) => poisoned.into_inner().usage(),
        }
    }

    fn decide(&self, context: &ConcurrencyContext, cpu_usage: f32) -> usize {
        let mut desired = context.requested_max.max(1);

        if cpu_usage >= self.config.cpu_threshold_high {
            desired = desired.saturating_div(2).max(self.config.min_concurrency);
        } else if cpu_usage <= self.config.cpu_threshold_low {
            desired = desired.saturating_mul(2).min(self.config.max_concurrency);
        }

        let floor = self.config.min_concurrency.max(1);
        let ceiling = self.config.max_concurrency.max(floor);
        desired = desired.clamp(floor, ceiling);
        desired.clamp(1, context.available_cpus.max(1).min(context.group_size.max(1)))
    }
}

impl ConcurrencyStrategy for AdaptiveConcurrency {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        let usage = self.current_usage();
        let decided = self.decide(context, usage);
        tracing::debug!(cpu_usage = usage, concurrency = decided, "adaptive concurrency");
        decided
    }
}
