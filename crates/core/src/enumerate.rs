//! Device discovery: match HID interfaces against a vendor/product pair.

use crate::error::Result;
use crate::transport::{DeviceDescriptor, HidBackend, InterfaceEntry};
use std::collections::HashSet;
use tracing::{debug, info};

/// Canonical path token for a VID/PID pair, e.g. `vid_054c&pid_1000`.
pub fn search_token(vid: u16, pid: u16) -> String {
    format!("vid_{vid:04x}&pid_{pid:04x}")
}

fn matches(entry: &InterfaceEntry, path: &str, token: &str, vid: u16, pid: u16) -> bool {
    // Windows interface paths embed the token; hidraw and IOKit paths do not,
    // so fall back to the ids the registry reported.
    path.to_lowercase().contains(token) || (entry.vendor_id == vid && entry.product_id == pid)
}

/// Find every connected device matching `vid`/`pid`.
///
/// Entries whose path cannot be resolved are skipped. Results follow the
/// backend's enumeration order. No match is an empty list, not an error; an
/// error only means the registry itself could not be queried.
pub fn find(backend: &dyn HidBackend, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>> {
    let token = search_token(vid, pid);
    debug!(token = %token, "Starting HID interface enumeration");

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for (index, entry) in backend.interfaces()?.into_iter().enumerate() {
        let Some(path) = entry.path.as_deref() else {
            debug!(index, "Skipping HID interface with unresolvable path");
            continue;
        };

        if !matches(&entry, path, &token, vid, pid) || !seen.insert(path.to_string()) {
            continue;
        }

        info!(
            vid = format_args!("0x{:04X}", vid),
            pid = format_args!("0x{:04X}", pid),
            path = %path,
            "Found matching HID device"
        );
        found.push(DeviceDescriptor {
            path: path.to_string(),
            vendor_id: vid,
            product_id: pid,
        });
    }

    debug!(count = found.len(), "HID enumeration complete");
    Ok(found)
}

/// Find the first connected device matching `vid`/`pid`.
pub fn find_first(
    backend: &dyn HidBackend,
    vid: u16,
    pid: u16,
) -> Result<Option<DeviceDescriptor>> {
    Ok(find(backend, vid, pid)?.into_iter().next())
}
