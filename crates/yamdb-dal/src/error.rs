pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Confirmation code hash error: {0}")]
    CodeHashError(#[from] argon2::password_hash::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] yamdb_types::ValidationError),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("CSV error in {file}: {source}")]
    CsvError {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid timestamp {value}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },

    #[error("Import failed: {0}")]
    ImportError(String),
}

/// Turns unique constraint violation into the error given by `f`, other errors are kept
pub(crate) fn on_unique_violation(err: sqlx::Error, f: impl FnOnce() -> Error) -> Error {
    match &err {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => f(),
        _ => err.into(),
    }
}
