#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database backend error: {0}")]
    BackendError(#[from] sqlx::Error),

    #[error("Internal database error: {message}")]
    InternalError { message: String },
}
