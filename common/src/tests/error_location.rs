// Unit tests for ErrorLocation capture and formatting

use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: ErrorLocation is the foundation of error tracking in
/// every crate of this workspace. If it captures the wrong location, all error
/// messages lose their debugging value.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` stops being
/// propagated correctly, or if line/column capture breaks.
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN/WHEN: Creating ErrorLocation from the current caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should capture file, line, and column
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert_eq!(location.line, 17, "Should capture correct line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies Display produces the "[file:line:column]" format.
///
/// **WHY THIS MATTERS**: Every error message in the workspace embeds this
/// format. If it changes shape, log output becomes inconsistent and grepping
/// for locations breaks.
///
/// **BUG THIS CATCHES**: Would catch a Display implementation that drops the
/// brackets or one of the three components.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting as string
    let formatted = format!("{}", location);

    // THEN: Bracketed file:line:column
    assert!(formatted.starts_with('['), "Should start with bracket");
    assert!(formatted.ends_with(']'), "Should end with bracket");
    assert_eq!(
        formatted.matches(':').count(),
        2,
        "Should contain file, line, and column separated by colons"
    );
    assert!(
        formatted.contains("error_location.rs"),
        "Should contain the file name"
    );
}
