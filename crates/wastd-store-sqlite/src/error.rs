//! Error type for `wastd-store-sqlite`.

use thiserror::Error;
use wastd_core::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] wastd_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value no domain type accepts.
  #[error("invalid stored value: {0}")]
  Decode(String),
}

impl StoreError for Error {
  fn as_core(&self) -> Option<&wastd_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
