//! User-facing error message formatting.
//!
//! Uses typed error matching (WrangleError, PolarsError variants, io::ErrorKind) rather than
//! string parsing to produce messages that make sense to someone who just uploaded a file.

use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

use crate::wrangle::WrangleError;

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("Column not found: {}.", msg),
        PE::Duplicate(msg) => format!(
            "Duplicate column name: {}. Every header in the file must be unique.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!(
            "Rows have different numbers of fields: {}. Check the file is valid CSV.",
            msg
        ),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::Interrupted => "Operation interrupted.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("No space left") || msg.contains("space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

pub fn user_message_from_wrangle(err: &WrangleError) -> String {
    match err {
        WrangleError::AllMissing { column, kind } => format!(
            "Column '{}' has no {} values at all, so its missing values cannot be filled. \
             Remove the column or add at least one value.",
            column, kind
        ),
    }
}

/// How a failure should be reported over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The uploaded data cannot be processed (malformed CSV, a column with no values).
    BadData,
    /// The referenced file is gone.
    NotFound,
    Internal,
}

/// Classify a report and return a class plus user-facing message. Keeps the chain walk
/// in one place so handlers only pick a status code.
pub fn classify_report(report: &color_eyre::eyre::Report) -> (ErrorClass, String) {
    for cause in report.chain() {
        if let Some(we) = cause.downcast_ref::<WrangleError>() {
            return (ErrorClass::BadData, user_message_from_wrangle(we));
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            let class = match pe {
                PolarsError::IO { error, .. } => io_class(error.as_ref()),
                _ => ErrorClass::BadData,
            };
            return (class, user_message_from_polars(pe));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return (io_class(io_err), user_message_from_io(io_err, None));
        }
    }
    (ErrorClass::Internal, first_line(report))
}

fn io_class(err: &io::Error) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorClass::NotFound,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => ErrorClass::BadData,
        _ => ErrorClass::Internal,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find WrangleError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let (class, msg) = classify_report(report);
    let msg = if class == ErrorClass::Internal {
        first_line(report)
    } else {
        msg
    };
    if let Some(p) = path {
        format!("Failed to load {}: {}", p.display(), msg)
    } else {
        msg
    }
}

// Avoid long tracebacks in pages and terminal output
fn first_line(report: &color_eyre::eyre::Report) -> String {
    let display = report.to_string();
    display
        .lines()
        .next()
        .map(str::trim)
        .unwrap_or("An error occurred")
        .to_string()
}

/// Light cleanup for ComputeError messages: strip Polars-internal hints.
fn simplify_compute_message(msg: &str) -> String {
    let msg = msg.trim();
    let msg = match msg.find("\n\nHint:") {
        Some(pos) => &msg[..pos],
        None => msg,
    };
    if msg.contains("found more fields than defined in 'Schema'") {
        return "A row has more fields than the header. Check the file is valid CSV.".to_string();
    }
    msg.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrangle::ColumnKind;
    use color_eyre::eyre::eyre;

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.contains("not found"),
            "expected 'not found', got: {}",
            msg
        );
    }

    #[test]
    fn test_user_message_from_io_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.to_lowercase().contains("permission"),
            "expected 'permission', got: {}",
            msg
        );
    }

    #[test]
    fn test_user_message_from_polars_column_not_found() {
        let err = PolarsError::ColumnNotFound("foo".into());
        let msg = user_message_from_polars(&err);
        assert!(msg.contains("foo"), "expected 'foo', got: {}", msg);
        assert!(msg.contains("Column not found"), "got: {}", msg);
    }

    #[test]
    fn test_all_missing_column_is_bad_data() {
        let report = eyre!(WrangleError::AllMissing {
            column: "price".to_string(),
            kind: ColumnKind::Float,
        });
        let (class, msg) = classify_report(&report);
        assert_eq!(class, ErrorClass::BadData);
        assert!(msg.contains("'price'"), "got: {}", msg);
    }

    #[test]
    fn test_io_not_found_report_is_not_found() {
        let report = color_eyre::eyre::Report::new(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let (class, _) = classify_report(&report);
        assert_eq!(class, ErrorClass::NotFound);
    }

    #[test]
    fn test_plain_report_is_internal_first_line() {
        let report = eyre!("first line\nsecond line");
        assert_eq!(classify_report(&report), (ErrorClass::Internal, "first line".to_string()));
        assert_eq!(
            user_message_from_report(&report, Some(Path::new("a.csv"))),
            "Failed to load a.csv: first line"
        );
    }
}
