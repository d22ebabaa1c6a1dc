//! buzz-io-core: Buzz! report codec, HID device discovery, and the device
//! read channel.
//!
//! This crate provides the platform-independent logic for talking to the
//! four-handset Buzz! quiz controller over USB HID: decoding button reports,
//! encoding light commands, and keeping a low-latency read loop alive for as
//! long as the device stays plugged in.

pub mod channel;
pub mod config;
pub mod controller;
pub mod enumerate;
pub mod error;
pub mod hidapi_backend;
#[cfg(test)]
mod integration_tests;
pub mod report;
pub mod transport;

/// Sony USB Vendor ID.
pub const BUZZ_VID: u16 = 0x054C;

/// Known Buzz! product IDs.
pub mod pids {
    /// Wired four-handset controller.
    pub const BUZZ_WIRED: u16 = 0x1000;
    /// Wireless receiver.
    pub const BUZZ_WIRELESS: u16 = 0x0002;
}
