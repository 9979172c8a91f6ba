use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Pin unavailable: {0}")]
    PinUnavailable(String),
    #[error("Direction set failed: {0}")]
    DirectionSetFailed(String),
    #[error("Node publish failed: {0}")]
    NodePublishFailed(String),
    #[error("Transfer failed: {0}")]
    TransferFailed(String),
    #[error("Pin not claimed: {0}")]
    NotClaimed(String),
    #[error("Device not writable: {0}")]
    NotWritable(String),
    #[error("No such node: {0}")]
    NoSuchNode(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
}
