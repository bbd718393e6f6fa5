// sqlx error mapping

use waitline_core::error::AppError;

/// Convert sqlx::Error to AppError with structured information
///
/// Every driver failure means the operation was not applied.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::StoreUnavailable(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" | "517" => AppError::StoreUnavailable(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => {
                        AppError::StoreUnavailable(format!("Database full: {}", db_err.message()))
                    }
                    _ => AppError::StoreUnavailable(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::StoreUnavailable(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::PoolTimedOut => {
            AppError::StoreUnavailable("Connection pool timed out".to_string())
        }
        sqlx::Error::ColumnNotFound(col) => {
            AppError::DataCorruption(format!("Column not found: {}", col))
        }
        sqlx::Error::ColumnDecode { index, source } => {
            AppError::DataCorruption(format!("Column {} could not be decoded: {}", index, source))
        }
        _ => AppError::StoreUnavailable(err.to_string()),
    }
}
