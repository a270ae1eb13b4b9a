use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::observer::{BatchEvent, BatchObserver};
use super::types::InstallationStatus;

/// Visual progress for a running batch
///
/// One overall bar counting finished components plus a spinner per component
/// currently installing.
pub struct ProgressMonitor {
    inner: Mutex<ProgressState>,
    enabled: bool,
}

struct ProgressState {
    multi: MultiProgress,
    overall: ProgressBar,
    component_bars: HashMap<String, ProgressBar>,
    total_levels: usize,
}

impl ProgressMonitor {
    /// Create a new progress monitor
    ///
    /// # Arguments
    ///
    /// * `total_components` - Components in the plan
    /// * `enabled` - Whether to draw anything (disabled for jsonl output)
    pub fn new(total_components: usize, enabled: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = if enabled {
            let bar = multi.add(ProgressBar::new(total_components as u64));
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} components {msg}")
            {
                bar.set_style(style.progress_chars("█▓▒░  "));
            }
            bar.set_message("Starting...");
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            inner: Mutex::new(ProgressState {
                multi,
                overall,
                component_bars: HashMap::new(),
                total_levels: 0,
            }),
            enabled,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ProgressState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn start_component(&self, component: &str, attempt: u32) {
        let mut state = self.state();
        let message = if attempt > 1 {
            format!("⏳ {component} (attempt {attempt})")
        } else {
            format!("⏳ {component}")
        };

        if let Some(bar) = state.component_bars.get(component) {
            bar.set_message(message);
            return;
        }

        let bar = state.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        state.component_bars.insert(component.to_string(), bar);
    }

    fn finish_component(&self, component: &str, status: InstallationStatus, duration_ms: u64) {
        let mut state = self.state();
        let icon = match status {
            InstallationStatus::Succeeded => "✅",
            InstallationStatus::Skipped => "⏭",
            InstallationStatus::RolledBack => "↩",
            InstallationStatus::Failed => "❌",
        };
        match state.component_bars.remove(component) {
            Some(bar) => bar.finish_with_message(format!("{icon} {component} ({duration_ms}ms)")),
            None => {
                let _ = state.multi.println(format!("  {icon} {component}"));
            }
        }
        state.overall.inc(1);
    }
}

impl BatchObserver for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_event(&self, event: &BatchEvent) {
        if !self.enabled {
            return;
        }

        match event {
            BatchEvent::Plan { groups, .. } => {
                self.state().total_levels = groups.len();
            }
            BatchEvent::GroupStart { group, .. } => {
                let state = self.state();
                state.overall.set_message(format!(
                    "Level {}/{}",
                    group.level + 1,
                    state.total_levels.max(group.level + 1)
                ));
            }
            BatchEvent::ComponentStart {
                component, attempt, ..
            } => self.start_component(component, *attempt),
            BatchEvent::ComponentEnd { result, .. } => {
                self.finish_component(&result.component, result.status, result.duration_ms)
            }
            BatchEvent::BatchEnd { result, .. } => {
                let msg = if result.overall_success {
                    "✅ All components installed"
                } else {
                    "❌ Batch finished with failures"
                };
                self.state().overall.finish_with_message(msg.to_string());
            }
            BatchEvent::AttemptFailed { .. } | BatchEvent::GroupEnd { .. } => {}
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        // Ensure all spinners are cleaned up
        for (_, bar) in self.state().component_bars.drain() {
            bar.finish_and_clear();
        }
    }
}
