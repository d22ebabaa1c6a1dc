//! [`HidBackend`] over the `hidapi` crate.
//!
//! hidapi does not expose the HIDP capability block, so report lengths come
//! from configuration. Input reports are normalised to the capability layout:
//! hidapi strips the report-ID byte of unnumbered reports, so byte 0 of every
//! buffer handed upward is the (zero) report-ID slot and the payload starts at
//! byte 1, the same offsets the device reports on Windows.

use crate::config::BuzzConfig;
use crate::error::{Error, ErrorClass, Result};
use crate::transport::{DeviceCapabilities, HidBackend, HidHandle, InterfaceEntry};
use hidapi::{HidApi, HidDevice};
use std::ffi::CString;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Real HID devices through hidapi.
pub struct HidapiBackend {
    api: Mutex<HidApi>,
    input_report_len: usize,
    output_report_len: usize,
}

impl HidapiBackend {
    /// Initialise hidapi with explicit report lengths.
    pub fn new(input_report_len: usize, output_report_len: usize) -> Result<Self> {
        let api = HidApi::new().map_err(|e| Error::Hid(format!("hidapi init: {e}")))?;
        Ok(Self {
            api: Mutex::new(api),
            input_report_len,
            output_report_len,
        })
    }

    /// Initialise hidapi with the report lengths from `config`.
    pub fn from_config(config: &BuzzConfig) -> Result<Self> {
        Self::new(config.input_report_len, config.output_report_len)
    }
}

fn open_error(path: &str, err: hidapi::HidError) -> Error {
    let reason = err.to_string();
    match ErrorClass::from_message(&reason) {
        ErrorClass::PermissionDenied => Error::PermissionDenied(format!("{path}: {reason}")),
        _ => Error::Open {
            path: path.to_string(),
            reason,
        },
    }
}

impl HidBackend for HidapiBackend {
    fn interfaces(&self) -> Result<Vec<InterfaceEntry>> {
        let mut api = self.api.lock().unwrap_or_else(PoisonError::into_inner);
        api.refresh_devices()
            .map_err(|e| Error::Hid(format!("refresh devices: {e}")))?;

        Ok(api
            .device_list()
            .map(|info| InterfaceEntry {
                // Non-UTF-8 paths cannot be handed back to open(); treat them as unresolvable.
                path: info.path().to_str().ok().map(str::to_string),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
            })
            .collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>> {
        let c_path = CString::new(path).map_err(|_| Error::Open {
            path: path.to_string(),
            reason: "path contains an interior NUL byte".into(),
        })?;
        let device = {
            let api = self.api.lock().unwrap_or_else(PoisonError::into_inner);
            api.open_path(&c_path).map_err(|e| open_error(path, e))?
        };
        debug!(path = %path, "hidapi device opened");

        Ok(Box::new(HidapiHandle {
            device: Mutex::new(Some(device)),
            input_report_len: self.input_report_len,
            output_report_len: self.output_report_len,
        }))
    }
}

struct HidapiHandle {
    device: Mutex<Option<HidDevice>>,
    input_report_len: usize,
    output_report_len: usize,
}

impl HidHandle for HidapiHandle {
    fn capabilities(&self) -> Result<DeviceCapabilities> {
        let guard = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let device = guard.as_ref().ok_or(Error::Closed)?;
        let product = match device.get_product_string() {
            Ok(product) => product.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Could not read product string");
                String::new()
            }
        };
        Ok(DeviceCapabilities {
            input_report_len: self.input_report_len,
            output_report_len: self.output_report_len,
            product,
        })
    }

    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let guard = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let device = guard.as_ref().ok_or(Error::Closed)?;
        let Some((report_id, payload)) = buf.split_first_mut() else {
            return Err(Error::ReportLength {
                expected: self.input_report_len,
                actual: 0,
            });
        };

        let n = device
            .read_timeout(payload, timeout_ms)
            .map_err(|e| Error::Hid(format!("read: {e}")))?;
        if n == 0 {
            return Ok(0);
        }
        *report_id = 0;
        Ok(n + 1)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        let guard = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let device = guard.as_ref().ok_or(Error::Closed)?;
        device
            .write(buf)
            .map_err(|e| Error::Hid(format!("write: {e}")))
    }

    fn close(&self) {
        // Dropping the HidDevice closes the OS handle.
        let device = self
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if device.is_some() {
            debug!("hidapi device closed");
        }
    }
}
