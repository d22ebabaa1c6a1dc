//! Error types for buzz-io-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID backend failure (enumeration, read, or write).
    #[error("HID error: {0}")]
    Hid(String),

    /// No matching device is connected.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Permission denied (another process holds the device, or missing udev rule).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Handle acquisition or capability query failed at open time.
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// A report buffer did not have the length fixed at open time.
    #[error("report length mismatch: expected {expected} bytes, got {actual}")]
    ReportLength { expected: usize, actual: usize },

    /// The device handle has already been released.
    #[error("device handle closed")]
    Closed,

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The device is gone (unplugged, path no longer resolves).
    Disconnected,
    /// The OS refused access to the device.
    PermissionDenied,
    /// Anything else.
    Other,
}

impl ErrorClass {
    /// Classify a raw backend error message.
    ///
    /// hidapi reports every failure as a string, so the platform wording is all
    /// there is to go on.
    pub fn from_message(msg: &str) -> Self {
        let lower = msg.to_lowercase();
        if lower.contains("permission")
            || lower.contains("access denied")
            || lower.contains("access is denied")
        {
            Self::PermissionDenied
        } else if lower.contains("disconnect")
            || lower.contains("not found")
            || lower.contains("no such device")
            || lower.contains("not connected")
        {
            Self::Disconnected
        } else {
            Self::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_permission_messages() {
        assert_eq!(
            ErrorClass::from_message("Access is denied."),
            ErrorClass::PermissionDenied
        );
        assert_eq!(
            ErrorClass::from_message("hidraw: Permission denied"),
            ErrorClass::PermissionDenied
        );
    }

    #[test]
    fn classify_disconnect_messages() {
        assert_eq!(
            ErrorClass::from_message("No such device (os error 19)"),
            ErrorClass::Disconnected
        );
        assert_eq!(
            ErrorClass::from_message("The device is not connected."),
            ErrorClass::Disconnected
        );
    }
}
