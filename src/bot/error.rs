use crate::dispatch::error::SendError;
use crate::monitor::MonitorError;
use crate::repository::error::DatabaseError;
use crate::service::error::ServiceError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BotError {
    #[error("Invalid argument for {parameter}: {reason}")]
    InvalidCommandArgument { parameter: String, reason: String },

    #[error("ServiceError: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("MonitorError: {0}")]
    MonitorError(#[from] MonitorError),

    #[error("DatabaseError: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("SendError: {0}")]
    SendError(#[from] SendError),
}
