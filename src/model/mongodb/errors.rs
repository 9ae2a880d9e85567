//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// The server error code carried by a write or command failure, if any.
fn error_code(err: &DbError) -> Option<i32> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => Some(e.code),
        ErrorKind::Command(ref e) => Some(e.code),
        _ => None,
    }
}

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    error_code(err) == Some(DUPLICATE_KEY)
}

/// Return true if the given error means another transaction touched the same
/// documents first. The losing transaction has already been aborted server-side.
///
/// Only the server's WriteConflict code counts. Network failures, stepdowns
/// and shutdowns inside a transaction carry the same transient label but
/// say nothing about competing writers.
pub fn is_write_conflict(err: &DbError) -> bool {
    error_code(err) == Some(WRITE_CONFLICT)
}

#[cfg(test)]
mod tests {
    use mongodb::{
        bson::{doc, from_document},
        error::{CommandError, WriteConcernError, WriteError, TRANSIENT_TRANSACTION_ERROR},
    };

    use super::*;

    fn command_error(code: i32, code_name: &str) -> DbError {
        let err: CommandError = from_document(doc! {
            "code": code,
            "codeName": code_name,
            "errmsg": "test failure",
        })
        .unwrap();
        ErrorKind::Command(err).into()
    }

    fn write_error(code: i32) -> DbError {
        let err: WriteError = from_document(doc! {
            "code": code,
            "errmsg": "test failure",
        })
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteError(err)).into()
    }

    fn labelled_write_concern_error(code: i32, code_name: &str) -> DbError {
        let err: WriteConcernError = from_document(doc! {
            "code": code,
            "codeName": code_name,
            "errmsg": "test failure",
            "errorLabels": [TRANSIENT_TRANSACTION_ERROR],
        })
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteConcernError(err)).into()
    }

    #[test]
    fn write_conflicts_recognised() {
        assert!(is_write_conflict(&command_error(WRITE_CONFLICT, "WriteConflict")));
        assert!(is_write_conflict(&write_error(WRITE_CONFLICT)));
        assert!(!is_duplicate_key_error(&command_error(WRITE_CONFLICT, "WriteConflict")));
    }

    #[test]
    fn transient_storage_failures_are_not_conflicts() {
        let shutdown = labelled_write_concern_error(91, "ShutdownInProgress");
        assert!(shutdown.contains_label(TRANSIENT_TRANSACTION_ERROR));
        assert!(!is_write_conflict(&shutdown));
        assert!(!is_duplicate_key_error(&shutdown));

        let io: DbError = ErrorKind::Io(std::sync::Arc::new(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )))
        .into();
        assert!(!is_write_conflict(&io));

        let stepdown = command_error(189, "PrimarySteppedDown");
        assert!(!is_write_conflict(&stepdown));
    }

    #[test]
    fn duplicate_keys_recognised() {
        assert!(is_duplicate_key_error(&write_error(DUPLICATE_KEY)));
        assert!(is_duplicate_key_error(&command_error(DUPLICATE_KEY, "DuplicateKey")));
        assert!(!is_write_conflict(&write_error(DUPLICATE_KEY)));
    }

    #[test]
    fn other_errors_unclassified() {
        let err = command_error(2, "BadValue");
        assert!(!is_write_conflict(&err));
        assert!(!is_duplicate_key_error(&err));
    }
}
