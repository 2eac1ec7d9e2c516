// Unit tests for error module
// Tests the human-readable rendering operators see in logs

use crate::error::MonitorError;

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Tests that errors render with message and source location.
///
/// **WHY THIS MATTERS**: Startup failures surface only through these strings
/// in the log; without the location an operator cannot tell which startup
/// step failed.
///
/// **BUG THIS CATCHES**: Would catch the Display format dropping the message
/// or the location suffix.
#[test]
fn given_monitor_error_when_displayed_then_message_and_location_present() {
    // GIVEN: A MonitorError
    let err = MonitorError::Monitor {
        message: String::from("Failed to create log directory"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Rendering for the log
    let rendered = err.to_string();

    // THEN: Should carry the message and a bracketed file:line:column suffix
    assert!(rendered.starts_with("Monitor Error: "));
    assert!(rendered.contains("Failed to create log directory"));
    assert!(rendered.contains("[") && rendered.contains(":"));
}
