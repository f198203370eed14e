use thiserror::Error;

use crate::metadata::tables::TableId;

macro_rules! unexpected_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Unexpected {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Unexpected {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can
/// potentially return.
///
/// Two tiers of failure exist during emission. Contract violations by the upstream
/// producer (an unknown constant kind, an IL operand outside the known set, a reference
/// that resolves to nothing) are *internal-consistency* failures and abort emission
/// immediately — they are bugs, not user input. Advisory conditions (over-length names)
/// are not errors at all; they are collected as [`crate::metadata::emit::EmitDiagnostic`]
/// values and emission continues.
///
/// # Error Categories
///
/// ## Lifecycle Errors
/// - [`Error::PhaseViolation`] - An operation was attempted in the wrong generation phase
/// - [`Error::Cancelled`] - The caller requested cooperative cancellation
///
/// ## Producer Contract Errors
/// - [`Error::Unexpected`] - The object model handed the encoder a shape it does not know
/// - [`Error::TooManyRows`] - A table outgrew the 24-bit row id space
///
/// ## I/O and External Errors
/// - [`Error::OutOfBounds`] - A fixed-size buffer write would overrun
/// - [`Error::ResourceAcquisition`] - An embedded resource data source failed
/// - [`Error::FileError`] - Filesystem I/O errors from caller-driven flushing
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was attempted in the wrong generation phase.
    ///
    /// Heaps and indices move through an open → indices-closed → streams-closed
    /// lifecycle. Adding a reference row after the indices are closed, or heap
    /// content after the streams are closed, is a programming-contract violation
    /// by the pipeline itself, never a recoverable condition.
    #[error("Phase violation - {0}")]
    PhaseViolation(&'static str),

    /// Emission was aborted by the caller's cancellation flag.
    ///
    /// Cancellation is checked at coarse boundaries (before index creation and
    /// between method bodies); partially-written heaps are never corrupted, the
    /// whole generation is simply abandoned.
    #[error("Emission was cancelled")]
    Cancelled,

    /// The encoder encountered a value shape it does not recognize.
    ///
    /// This indicates a contract violation by the upstream producer of the object
    /// model (e.g. an unexpected runtime constant type or an unknown IL opcode)
    /// and aborts emission immediately. The error includes the source location
    /// where the inconsistency was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the unexpected value
    /// * `file` - Source file in which the inconsistency was detected
    /// * `line` - Source line in which the inconsistency was detected
    #[error("Unexpected - {file}:{line}: {message}")]
    Unexpected {
        /// The message to be printed for the Unexpected error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A metadata table outgrew the 24-bit row id space of its tokens.
    #[error("Too many rows for table {0:?}")]
    TooManyRows(TableId),

    /// An out of bound write was attempted on a fixed-size buffer.
    ///
    /// This error occurs when serializing a table row or patching a token into a
    /// buffer that is smaller than the computed layout requires. It is a safety
    /// check to prevent buffer overruns during serialization.
    #[error("Out of Bound write would have occurred!")]
    OutOfBounds,

    /// Acquiring the data for an embedded resource failed.
    ///
    /// The data source for a manifest resource either returned an error or produced
    /// no data. The failure is surfaced to the caller with the resource name and
    /// underlying cause rather than being silently skipped.
    #[error("Failed to acquire data for resource '{resource}': {cause}")]
    ResourceAcquisition {
        /// Name of the manifest resource whose data source failed
        resource: String,
        /// Description of the underlying failure
        cause: String,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors so that callers flushing the emitted buffers
    /// to disk can use `?` inside a [`crate::Result`]-returning function.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_macro_captures_location() {
        let err = unexpected_error!("bad constant kind {}", 42);
        match err {
            Error::Unexpected { message, file, .. } => {
                assert_eq!(message, "bad constant kind 42");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            Error::PhaseViolation("indices are closed").to_string(),
            "Phase violation - indices are closed"
        );
        assert_eq!(Error::Cancelled.to_string(), "Emission was cancelled");
        let err = Error::ResourceAcquisition {
            resource: "res.bin".into(),
            cause: "stream returned no data".into(),
        };
        assert!(err.to_string().contains("res.bin"));
    }
}
