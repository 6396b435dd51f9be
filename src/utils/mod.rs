//! Common utilities and helpers

use std::time::Duration;

pub mod logging;

/// Utility functions for MonoShot
pub struct Utils;

impl Utils {
    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        let milliseconds = duration.subsec_millis();

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }

    /// Size in decimal megabytes (10^6 bytes), rounded to 2 decimals
    pub fn megabytes(size: u64) -> f64 {
        (size as f64 / 1_000_000.0 * 100.0).round() / 100.0
    }

    /// Format file size for display
    pub fn format_file_size(size: u64) -> String {
        format!("{:.2} MB", Self::megabytes(size))
    }
}
