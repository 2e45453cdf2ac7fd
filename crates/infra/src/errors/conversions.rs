//! Conversions from external infrastructure errors into domain errors.

use darceo_domain::DarceoError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DarceoError);

impl From<InfraError> for DarceoError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DarceoError> for InfraError {
    fn from(value: DarceoError) -> Self {
        Self(value)
    }
}

trait IntoDarceoError {
    fn into_darceo(self) -> DarceoError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → DarceoError */
/* -------------------------------------------------------------------------- */

impl IntoDarceoError for SqlError {
    fn into_darceo(self) -> DarceoError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => DarceoError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        DarceoError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        DarceoError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => {
                        DarceoError::Config(format!("file is not a SQLite database: {message}"))
                    }
                    _ => DarceoError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => DarceoError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                DarceoError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                DarceoError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => DarceoError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => DarceoError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_darceo())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → DarceoError */
/* -------------------------------------------------------------------------- */

impl IntoDarceoError for r2d2::Error {
    fn into_darceo(self) -> DarceoError {
        DarceoError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(value.into_darceo())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DarceoError */
/* -------------------------------------------------------------------------- */

impl IntoDarceoError for HttpError {
    fn into_darceo(self) -> DarceoError {
        if self.is_timeout() {
            return DarceoError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return DarceoError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => DarceoError::NotFound(message),
                400..=499 if code != 429 => DarceoError::InvalidInput(message),
                _ => DarceoError::Network(message),
            };
        }

        if self.is_decode() {
            return DarceoError::InvalidInput(format!("malformed HTTP response body: {self}"));
        }

        DarceoError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_darceo())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
