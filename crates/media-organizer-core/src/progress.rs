use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::sync::Arc;
use std::time::Instant;

use crate::discovery::ProgressFn;

/// Resolution of the bar; progress fractions are mapped onto it
const STEPS: u64 = 1000;

/// Terminal progress bar fed by the walker's progress callback
pub struct ProgressTracker {
    bar: ProgressBar,
    start_time: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let bar = ProgressBar::new(STEPS);
        let style = ProgressStyle::default_bar()
            .template("{wide_bar} {percent}% [{elapsed_precise}] | {msg}")
            .map(|style| style.progress_chars("█▓▒░ "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message("Scanning...");

        Self {
            bar,
            start_time: Instant::now(),
        }
    }

    /// Tracker that draws nothing, for non-interactive output
    pub fn hidden() -> Self {
        let tracker = Self::new();
        tracker
            .bar
            .set_draw_target(indicatif::ProgressDrawTarget::hidden());
        tracker
    }

    /// Callback that moves the bar; hand it to the walker or organizer
    pub fn callback(&self) -> Arc<ProgressFn> {
        let bar = self.bar.clone();
        Arc::new(move |fraction: f64, current: &str| {
            let position = (fraction.clamp(0.0, 1.0) * STEPS as f64).round() as u64;
            // Siblings finish out of order, never move backwards
            if position > bar.position() {
                bar.set_position(position);
            }
            bar.set_message(current.to_string());
        })
    }

    pub fn position(&self) -> f64 {
        self.bar.position() as f64 / STEPS as f64
    }

    /// Complete the bar with a closing message
    pub fn finish(&self, message: &str) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        info!("{} in {:.1}s", message, elapsed);
        self.bar
            .finish_with_message(format!("{} | {:.1}s elapsed", message, elapsed));
    }
}
