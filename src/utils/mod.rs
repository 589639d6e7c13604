//! Common utilities and helpers

use std::time::Duration;

pub mod logging;

/// Utility functions for Aura Clip
pub struct Utils;

impl Utils {
    /// Elapsed time for console output: `4.218s`, `1:05.250` or `1:02:05.000`
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();

        match (secs / 3600, (secs % 3600) / 60, secs % 60) {
            (0, 0, s) => format!("{}.{:03}s", s, millis),
            (0, m, s) => format!("{}:{:02}.{:03}", m, s, millis),
            (h, m, s) => format!("{}:{:02}:{:02}.{:03}", h, m, s, millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(Utils::format_duration(Duration::from_millis(4_218)), "4.218s");
        assert_eq!(Utils::format_duration(Duration::from_millis(65_250)), "1:05.250");
        assert_eq!(Utils::format_duration(Duration::from_secs(3_725)), "1:02:05.000");
    }
}
