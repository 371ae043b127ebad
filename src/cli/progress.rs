//! Progress bar utilities for CLI output
//!
//! Spinners for directory scans, a bar for signature passes, and the boxed
//! headers and bullet lines used by every command.

use crate::duplicate::SignatureProgress;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Spinner style for scanning operations
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

/// Progress bar style for signature passes
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

// ============================================================================
// Library scan spinner
// ============================================================================

/// Spinner shown while a library directory is walked
pub struct ScanSpinner {
    spinner: ProgressBar,
    start_time: Instant,
}

impl ScanSpinner {
    pub fn new(library: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Scanning {}...", library));

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    /// Finish with a summary message
    pub fn finish(&self, files: usize, undated: usize) {
        self.spinner.finish_with_message(format!(
            "✓ Found {} media files ({} undated) in {}",
            files,
            undated,
            format_duration(self.start_time.elapsed())
        ));
    }

    /// Finish with an error message
    pub fn finish_with_error(&self, msg: &str) {
        self.spinner.finish_with_message(format!("✗ {}", msg));
    }
}

// ============================================================================
// Signature pass progress
// ============================================================================

/// Progress bar fed by a signature pass
///
/// Updates arrive from worker threads; `ProgressBar` is internally
/// synchronized so the callback can be shared as is.
pub struct SignatureProgressBar {
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl SignatureProgressBar {
    pub fn new() -> Self {
        let progress_bar = ProgressBar::new(0);
        progress_bar.set_style(progress_bar_style());
        progress_bar.enable_steady_tick(Duration::from_millis(100));
        progress_bar.set_message("Computing signatures...");

        Self {
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// Callback handed to the duplicate manager
    pub fn update(&self, progress: SignatureProgress) {
        if self.progress_bar.length() != Some(progress.total as u64) {
            self.progress_bar.set_length(progress.total as u64);
        }
        self.progress_bar.set_position(progress.current as u64);
        self.progress_bar.set_message(progress.current_file);
    }

    /// Log a message while suspending the progress display
    pub fn log(&self, msg: &str) {
        self.progress_bar.suspend(|| {
            println!("  {}", msg);
        });
    }

    pub fn finish(&self) {
        self.progress_bar.set_style(completed_style());
        self.progress_bar.finish_with_message(format!(
            "Signatures done in {}",
            format_duration(self.start_time.elapsed())
        ));
    }

    /// Leave the bar where it stopped
    pub fn finish_interrupted(&self) {
        self.progress_bar.abandon_with_message("✗ Interrupted");
    }
}

impl Default for SignatureProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(3 * 1073741824), "3.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42.0s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h 1m");
    }

    #[test]
    fn test_signature_bar_tracks_total() {
        let bar = SignatureProgressBar::new();
        bar.update(SignatureProgress {
            current: 3,
            total: 10,
            current_file: "a.jpg".to_string(),
        });
        assert_eq!(bar.progress_bar.length(), Some(10));
        assert_eq!(bar.progress_bar.position(), 3);
    }
}
