use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("page action failed: {0}")]
    ActionFailed(String),

    #[error("page closed")]
    PageClosed,
}
