//! Live terminal rendering
//!
//! One `TestRenderer` paints a single run's frame; `TestViewer`
//! coordinates many runs under a single status tree and is then the
//! sole terminal writer.

pub mod frame;
pub mod term;
pub mod viewer;

pub use frame::TestRenderer;
pub use viewer::{RenderId, TestStatus, TestViewer};

use std::time::Duration;

/// Braille spinner cycled by animation ticks
pub(crate) const SPINNER_FRAMES: [&str; 10] =
    ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Elapsed time as `MM:SS`, growing to `HH:MM:SS` past an hour
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let seconds = total % 60;
    let minutes = (total / 60) % 60;
    let hours = total / 3600;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formats_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
        assert_eq!(format_elapsed(Duration::from_secs(75)), "01:15");
        assert_eq!(format_elapsed(Duration::from_secs(3599)), "59:59");
    }

    #[test]
    fn elapsed_grows_to_hours_when_needed() {
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "01:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3600 * 2 + 61)), "02:01:01");
    }
}
