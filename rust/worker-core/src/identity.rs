//! Worker identity.
//!
//! A worker picks its own name once and keeps it for every channel and
//! every retry, so the coordinator never sees two names for one process.
//! The coordinator-assigned identifier is written exactly once.

use std::sync::OnceLock;

use uuid::Uuid;

use crate::error::{Result, WorkerError};
use crate::registration::Assignment;

/// Prefix used when the configuration does not override it.
pub const DEFAULT_NAME_PREFIX: &str = "poneglyph-worker-";

/// Default number of concurrent task slots a worker offers.
pub const DEFAULT_CAPACITY: u32 = 2;

const MAX_HOST_LEN: usize = 32;
const RANDOM_SUFFIX_LEN: usize = 12;

/// Generates `prefix` + `<host>-` + 12 random hex characters.
///
/// The host part is lowercased and reduced to `[a-z0-9-]`; it is left out
/// when the hostname cannot be read. The random part comes from a v4 UUID,
/// so workers started at the same moment on the same host still differ.
pub fn generate_worker_name(prefix: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    let random = &random[..RANDOM_SUFFIX_LEN];

    match local_host_label() {
        Some(host) => format!("{prefix}{host}-{random}"),
        None => format!("{prefix}{random}"),
    }
}

fn local_host_label() -> Option<String> {
    let raw = hostname::get().ok()?;
    let label = sanitize_host(&raw.to_string_lossy());
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

fn sanitize_host(raw: &str) -> String {
    // Keep only the first DNS label.
    let first = raw.split('.').next().unwrap_or_default();
    let mut label: String = first
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    label.truncate(MAX_HOST_LEN);
    label.trim_matches('-').to_string()
}

/// Name, capacity, and (once registered) the coordinator's assignment.
#[derive(Debug)]
pub struct WorkerIdentity {
    name: String,
    capacity: u32,
    assignment: OnceLock<Assignment>,
}

impl WorkerIdentity {
    /// Creates an identity with an explicit name.
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            assignment: OnceLock::new(),
        }
    }

    /// Creates an identity with a freshly generated name.
    pub fn generate(prefix: &str, capacity: u32) -> Self {
        Self::new(generate_worker_name(prefix), capacity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Identifier assigned by the coordinator, if registration succeeded.
    pub fn assigned_id(&self) -> Option<&str> {
        self.assignment.get().map(|a| a.worker_id.as_str())
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.get()
    }

    pub fn is_registered(&self) -> bool {
        self.assignment.get().is_some()
    }

    /// Records the assignment. Fails if one was already recorded.
    pub fn commit(&self, assignment: Assignment) -> Result<()> {
        self.assignment.set(assignment).map_err(|_| {
            WorkerError::AlreadyRegistered {
                worker_id: self.assigned_id().unwrap_or_default().to_string(),
            }
        })
    }
}

mod hostname {
    use std::ffi::OsString;

    pub fn get() -> std::io::Result<OsString> {
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStringExt;
            let mut buf = vec![0u8; 256];
            // SAFETY: buf is valid for buf.len() bytes and gethostname
            // writes at most that many, null-terminated when it fits.
            let ret = unsafe {
                ::libc::gethostname(buf.as_mut_ptr() as *mut ::libc::c_char, buf.len())
            };
            if ret != 0 {
                return Err(std::io::Error::last_os_error());
            }
            let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            buf.truncate(len);
            Ok(OsString::from_vec(buf))
        }

        #[cfg(not(unix))]
        {
            std::env::var_os("COMPUTERNAME")
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no hostname"))
        }
    }
}
