use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingErrorKind {
    TransientStorage,
    SchemaMissing,
    Privilege,
    Storage,
}

impl RankingErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingErrorKind::TransientStorage => "transient_storage",
            RankingErrorKind::SchemaMissing => "schema_missing",
            RankingErrorKind::Privilege => "privilege",
            RankingErrorKind::Storage => "storage",
        }
    }

    /// Recoverable kinds are retried by the next scheduled tick or the next
    /// read; the others fail the call they happened in.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RankingErrorKind::TransientStorage | RankingErrorKind::SchemaMissing
        )
    }
}

impl std::fmt::Display for RankingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("transient storage failure: {0}")]
    TransientStorage(String),

    #[error("required table is missing: {0}")]
    SchemaMissing(String),

    #[error("insufficient privilege: {0}")]
    Privilege(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl RankingError {
    pub fn kind(&self) -> RankingErrorKind {
        match self {
            RankingError::TransientStorage(_) => RankingErrorKind::TransientStorage,
            RankingError::SchemaMissing(_) => RankingErrorKind::SchemaMissing,
            RankingError::Privilege(_) => RankingErrorKind::Privilege,
            RankingError::Storage(_) => RankingErrorKind::Storage,
        }
    }

    fn message(&self) -> &str {
        match self {
            RankingError::TransientStorage(msg)
            | RankingError::SchemaMissing(msg)
            | RankingError::Privilege(msg)
            | RankingError::Storage(msg) => msg,
        }
    }
}

impl From<rusqlite::Error> for RankingError {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::FileLockingProtocolFailed
                | ErrorCode::DiskFull,
            ) => RankingError::TransientStorage(message),
            Some(
                ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::AuthorizationForStatementDenied,
            ) => RankingError::Privilege(message),
            _ if message.contains("no such table") => RankingError::SchemaMissing(message),
            _ => RankingError::Storage(message),
        }
    }
}

/// Summary of a successful snapshot rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub week_start: NaiveDate,
    pub ranked_songs: usize,
    /// Current-week ratings left out because their song is gone or their
    /// value is out of range.
    pub skipped_ratings: usize,
    pub refreshed_at: DateTime<Utc>,
}

/// Result of one refresh attempt. Failures carry the error kind and message
/// instead of propagating, the caller decides what to log.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Ok(RefreshReport),
    Recoverable(RankingErrorKind, String),
    Fatal(RankingErrorKind, String),
}

impl RefreshOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RefreshOutcome::Ok(_))
    }

    pub fn report(&self) -> Option<&RefreshReport> {
        match self {
            RefreshOutcome::Ok(report) => Some(report),
            _ => None,
        }
    }

    /// Label used by the refresh metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Ok(_) => "ok",
            RefreshOutcome::Recoverable(..) => "recoverable",
            RefreshOutcome::Fatal(..) => "fatal",
        }
    }
}

impl From<Result<RefreshReport, RankingError>> for RefreshOutcome {
    fn from(result: Result<RefreshReport, RankingError>) -> Self {
        match result {
            Ok(report) => RefreshOutcome::Ok(report),
            Err(err) => {
                let kind = err.kind();
                if kind.is_recoverable() {
                    RefreshOutcome::Recoverable(kind, err.message().to_string())
                } else {
                    RefreshOutcome::Fatal(kind, err.message().to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn missing_table_is_schema_missing() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .prepare("SELECT * FROM ratings")
            .map(|_| ())
            .unwrap_err();
        let ranking_err = RankingError::from(err);
        assert_eq!(ranking_err.kind(), RankingErrorKind::SchemaMissing);
        assert!(ranking_err.kind().is_recoverable());
    }

    #[test]
    fn syntax_error_is_fatal_storage() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELEC 1", []).unwrap_err();
        let outcome = RefreshOutcome::from(Err(RankingError::from(err)));
        assert!(matches!(
            outcome,
            RefreshOutcome::Fatal(RankingErrorKind::Storage, _)
        ));
        assert_eq!(outcome.label(), "fatal");
    }

    #[test]
    fn busy_database_is_transient() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let outcome = RefreshOutcome::from(Err(RankingError::from(err)));
        assert!(matches!(
            outcome,
            RefreshOutcome::Recoverable(RankingErrorKind::TransientStorage, _)
        ));
    }

    #[test]
    fn successful_refresh_exposes_its_report() {
        let report = RefreshReport {
            week_start: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            ranked_songs: 3,
            skipped_ratings: 1,
            refreshed_at: Utc::now(),
        };
        let outcome = RefreshOutcome::from(Ok(report.clone()));
        assert!(outcome.is_ok());
        assert_eq!(outcome.label(), "ok");
        assert_eq!(outcome.report(), Some(&report));
    }

    #[test]
    fn read_only_database_is_privilege() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            None,
        );
        assert_eq!(RankingError::from(err).kind(), RankingErrorKind::Privilege);
    }
}
