//! HID platform abstraction.
//!
//! Provides a trait-based backend layer so that real HID devices and mock
//! devices share the same interface. The protocol code never talks to an OS
//! API directly.

use crate::error::Result;
use serde::Serialize;

/// One HID interface as reported by the OS registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceEntry {
    /// Platform device path, `None` if the OS could not resolve one.
    pub path: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// An openable device found by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    /// Opaque platform device path.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Report lengths and product name, queried once when the device is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCapabilities {
    /// Input report length in bytes, including the report-ID slot.
    pub input_report_len: usize,
    /// Output report length in bytes, including the report-ID slot.
    pub output_report_len: usize,
    /// Product string, empty if the device does not provide one.
    pub product: String,
}

/// Abstraction over the OS HID registry.
pub trait HidBackend: Send + Sync {
    /// List every HID interface currently present.
    fn interfaces(&self) -> Result<Vec<InterfaceEntry>>;

    /// Acquire an exclusive read/write handle to `path`.
    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>>;
}

/// An open device handle.
///
/// Reads and writes may be issued from different threads. Implementations
/// may serialise them: the hidapi backend holds one lock around the device,
/// so a write can wait for a pending read of up to `timeout_ms`.
pub trait HidHandle: Send + Sync {
    /// Query report lengths and the product string.
    fn capabilities(&self) -> Result<DeviceCapabilities>;

    /// Read one input report into `buf`, waiting at most `timeout_ms`.
    ///
    /// Returns the number of bytes filled, `0` if nothing arrived in time.
    /// An error means the device is no longer reachable.
    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Write one output report.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Release the OS handle. Calling this more than once is a no-op.
    /// Afterwards every read and write fails with [`Error::Closed`](crate::error::Error::Closed).
    fn close(&self);
}
