//! Live progress reporting during benchmark execution.

use crate::algorithm::{AlgorithmDescriptor, OperationKind};
use crate::bench::ProgressSink;
use crate::results::printer::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

/// Samples kept for the rolling estimate.
const WINDOW_SIZE: usize = 20;

/// Per-algorithm state, alive between `start` and `finish`.
struct ReporterState {
    progress: ProgressBar,
    recent_samples: VecDeque<Duration>,
    completed: usize,
}

impl ReporterState {
    fn rolling_average(&self) -> Duration {
        if self.recent_samples.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.recent_samples.iter().sum();
        sum / u32::try_from(self.recent_samples.len()).unwrap_or(u32::MAX)
    }
}

/// Manages live terminal output while an algorithm is being timed.
///
/// Example output:
/// ```text
/// Benchmark: KEM / kyber768 (pqc)
///   ⠋ Current estimate: 14.20 ms    ████████░░░░░░░░░░░░  ETA 00:00:02
/// ```
///
/// Uses interior mutability via `RefCell` because the harness only holds a
/// shared reference to its sink.
pub struct LiveProgressReporter {
    color: bool,
    visible: bool,
    state: RefCell<Option<ReporterState>>,
}

impl LiveProgressReporter {
    /// Create a reporter that draws to the terminal.
    pub fn new(color: bool) -> Self {
        Self {
            color,
            visible: true,
            state: RefCell::new(None),
        }
    }

    /// Create a reporter that tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self {
            color: false,
            visible: false,
            state: RefCell::new(None),
        }
    }

    /// Iterations completed for the current algorithm.
    pub fn completed(&self) -> usize {
        self.state.borrow().as_ref().map_or(0, |s| s.completed)
    }

    fn style(&self) -> ProgressStyle {
        let template = if self.color {
            "  {spinner:.cyan} Current estimate: {msg:<12}  {bar:20.cyan/dim} ETA {eta}"
        } else {
            "  {spinner} Current estimate: {msg:<12}  {bar:20} ETA {eta}"
        };
        ProgressStyle::default_bar()
            .template(template)
            .expect("valid template")
            .progress_chars("█▓░")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}

impl ProgressSink for LiveProgressReporter {
    fn start(&self, algorithm: &AlgorithmDescriptor, operation: OperationKind, iterations: usize) {
        let progress = if self.visible {
            let header = if self.color {
                format!(
                    "{}: {} / {} ({})",
                    "Benchmark".bold(),
                    operation.cyan(),
                    algorithm.name(),
                    algorithm.category()
                )
            } else {
                format!("Benchmark: {operation} / {} ({})", algorithm.name(), algorithm.category())
            };
            println!("{header}");

            let progress = ProgressBar::new(iterations as u64);
            progress.set_style(self.style());
            progress.set_message("measuring...");
            progress.enable_steady_tick(Duration::from_millis(100));
            progress
        } else {
            ProgressBar::hidden()
        };

        *self.state.borrow_mut() = Some(ReporterState {
            progress,
            recent_samples: VecDeque::with_capacity(WINDOW_SIZE),
            completed: 0,
        });
    }

    fn iteration(&self, completed: usize, elapsed: Duration) {
        let mut guard = self.state.borrow_mut();
        let Some(state) = guard.as_mut() else {
            return;
        };
        state.completed = completed;
        if state.recent_samples.len() >= WINDOW_SIZE {
            state.recent_samples.pop_front();
        }
        state.recent_samples.push_back(elapsed);

        let estimate = format_duration(state.rolling_average());
        state.progress.set_message(estimate);
        state.progress.set_position(completed as u64);
    }

    fn finish(&self) {
        if let Some(state) = self.state.borrow_mut().take() {
            state.progress.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_reporter_tracks_iterations() {
        let reporter = LiveProgressReporter::hidden();
        let algorithm = AlgorithmDescriptor::rsa(2048);
        reporter.start(&algorithm, OperationKind::Signature, 3);
        for i in 1..=3 {
            reporter.iteration(i, Duration::from_millis(10));
        }
        assert_eq!(reporter.completed(), 3);
        {
            let guard = reporter.state.borrow();
            let state = guard.as_ref().unwrap();
            assert_eq!(state.rolling_average(), Duration::from_millis(10));
        }
        reporter.finish();
        assert_eq!(reporter.completed(), 0);
    }

    #[test]
    fn test_rolling_window_is_bounded() {
        let reporter = LiveProgressReporter::hidden();
        reporter.start(&AlgorithmDescriptor::rsa(2048), OperationKind::Kem, 100);
        for i in 1..=50 {
            reporter.iteration(i, Duration::from_millis(1));
        }
        assert_eq!(reporter.state.borrow().as_ref().unwrap().recent_samples.len(), WINDOW_SIZE);
        reporter.finish();
    }

    #[test]
    fn test_iteration_without_start_is_ignored() {
        let reporter = LiveProgressReporter::hidden();
        reporter.iteration(1, Duration::from_millis(1));
        reporter.finish();
        assert_eq!(reporter.completed(), 0);
    }
}
