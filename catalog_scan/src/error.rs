use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    /// The store rejected or failed a scan call (network, throttling, authorization).
    #[error("Error executing scan: {0}")]
    Transport(String),
    #[error("Field '{0}' is missing on the selected item")]
    MissingField(String),
    #[error("Field '{0}' on the selected item is not text")]
    NotText(String),
}
