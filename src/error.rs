use std::time::Duration;

use sea_orm::DbErr;
use sea_orm::SqlErr;
use thiserror::Error;

use crate::types::BannerId;

pub type Result<T, E = BannerError> = std::result::Result<T, E>;

/// Coarse classification of [`BannerError`] for transport adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// HTTP-equivalent status code for the kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict | ErrorKind::Validation => 400,
            ErrorKind::Timeout | ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum BannerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{op} timed out after {}ms", .after.as_millis())]
    Timeout { op: &'static str, after: Duration },

    // The driver error is kept as the source only, callers get the context.
    #[error("{context}")]
    Database {
        context: String,
        #[source]
        source:  DbErr,
    },

    #[error("content serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Database { .. } | Self::Serialization(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    pub fn banner_not_found(banner_id: BannerId) -> Self {
        Self::NotFound(format!("banner {banner_id}"))
    }

    pub fn version_not_found(banner_id: BannerId, version: i32) -> Self {
        Self::NotFound(format!("version {version} of banner {banner_id}"))
    }

    /// Produces a mapper for database errors that records the operation and, if known, the banner it was about.
    /// Unique constraint violations surface as conflicts since they are the result of a lost write race.
    pub fn db(op: &'static str, banner_id: Option<BannerId>) -> impl FnOnce(DbErr) -> BannerError {
        move |source| {
            let context = match banner_id {
                Some(id) => format!("{op} failed for banner {id}"),
                None => format!("{op} failed"),
            };

            if let Some(SqlErr::UniqueConstraintViolation(_)) = source.sql_err() {
                return BannerError::Conflict(format!("{context}: a concurrent write got there first"));
            }
            if is_contention(&source) {
                return BannerError::Conflict(format!("{context}: the database is busy with a concurrent write"));
            }

            BannerError::Database { context, source }
        }
    }
}

// Lock timeouts and serialization failures: the write lost a race against another connection.
#[cfg(any(feature = "sqlite", feature = "pg"))]
fn is_contention(source: &DbErr) -> bool {
    use sea_orm::sqlx;
    use sea_orm::RuntimeErr;

    let (DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(err)))
    | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(err)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(err)))) = source
    else {
        return false;
    };

    match err.code().as_deref() {
        // PostgreSQL serialization_failure and deadlock_detected.
        Some("40001" | "40P01") => true,
        // SQLite reports numeric result codes. SQLITE_BUSY and SQLITE_LOCKED, extended codes included.
        Some(code) if code.len() < 5 => code.parse::<i32>().is_ok_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

#[cfg(not(any(feature = "sqlite", feature = "pg")))]
fn is_contention(_source: &DbErr) -> bool {
    false
}
