//! Extractors that reject with the crate's HTTP error.

pub mod enhanced_path;
pub mod enhanced_query;

pub use self::enhanced_path::Path;
pub use self::enhanced_query::Query;

/// Sanitizes error messages to prevent information leakage while keeping them useful.
pub(crate) fn sanitize_error_message(message: &str) -> String {
    message
        .lines()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(150)
        .collect()
}

/// Attempts to extract the field name from a serde error message.
///
/// Best effort: recognizes the backtick pattern serde uses for missing and
/// duplicate fields, then a bare `field <name>` pattern.
pub(crate) fn extract_field_name_from_error(error_message: &str) -> Option<&str> {
    if let Some(start) = error_message.find('`')
        && let Some(end) = error_message[start + 1..].find('`')
    {
        return Some(&error_message[start + 1..start + 1 + end]);
    }

    if let Some(start) = error_message.find("field ") {
        let field_part = &error_message[start + 6..];
        if let Some(end) = field_part.find(' ') {
            return Some(&field_part[..end]);
        }
    }

    None
}
