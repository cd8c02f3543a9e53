//! Persistent firmware variables
//!
//! All launcher state lives in 4-byte variables under the platform's public
//! vendor namespace. The store itself is a trait so the engine can run
//! against firmware variable services or an in-memory map.

pub mod counters;

pub use counters::{RootfsVar, Slot, ROOTFS_RETRY_MAX};

use core::fmt;
use uguid::{guid, Guid};

/// Vendor namespace of every launcher variable
pub const PUBLIC_VARIABLE_GUID: Guid = guid!("781e084c-a330-417c-b678-38e696380cb9");

pub const ATTR_NON_VOLATILE: u32 = 0x0000_0001;
pub const ATTR_BOOTSERVICE_ACCESS: u32 = 0x0000_0002;
pub const ATTR_RUNTIME_ACCESS: u32 = 0x0000_0004;

/// Attributes of the persistent failover counters
pub const PERSISTENT_ATTRIBUTES: u32 =
    ATTR_NON_VOLATILE | ATTR_BOOTSERVICE_ACCESS | ATTR_RUNTIME_ACCESS;

/// Attributes of variables that only live until the next reset
pub const VOLATILE_ATTRIBUTES: u32 = ATTR_BOOTSERVICE_ACCESS | ATTR_RUNTIME_ACCESS;

/// Fully qualified variable key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub name: &'static str,
    pub vendor: Guid,
    pub attributes: u32,
}

impl Variable {
    pub const fn new(name: &'static str, attributes: u32) -> Self {
        Self {
            name,
            vendor: PUBLIC_VARIABLE_GUID,
            attributes,
        }
    }
}

/// Boot chain selected by firmware for this boot (read only)
pub const BOOT_CHAIN_FW_CURRENT: Variable =
    Variable::new("BootChainFwCurrent", PERSISTENT_ATTRIBUTES);

/// Boot chain the OS is started from; cleared by every reset
pub const BOOT_CHAIN_OS_CURRENT: Variable =
    Variable::new("BootChainOsCurrent", VOLATILE_ATTRIBUTES);

/// Variable service failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarError {
    /// Stored value is not exactly four bytes
    BadSize(usize),
    /// Firmware returned an error status
    Firmware(usize),
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSize(size) => write!(f, "unexpected variable size {}", size),
            Self::Firmware(status) => write!(f, "firmware status {:#x}", status),
        }
    }
}

/// Get/set/delete over 4-byte variables.
///
/// `get` returns `Ok(None)` when the variable does not exist; that is not
/// an error for the store, callers decide what absence means.
pub trait VariableStore {
    fn get(&mut self, var: &Variable) -> Result<Option<u32>, VarError>;

    fn set(&mut self, var: &Variable, value: u32) -> Result<(), VarError>;

    /// Deleting a variable that does not exist succeeds
    fn delete(&mut self, var: &Variable) -> Result<(), VarError>;
}

/// Read a chain selector variable, accepting only existing values `<= 1`
pub fn read_chain<S: VariableStore + ?Sized>(store: &mut S, var: &Variable) -> Option<u32> {
    match store.get(var) {
        Ok(Some(chain)) if chain <= 1 => Some(chain),
        Ok(Some(chain)) => {
            log::warn!("{} holds out-of-range chain {}", var.name, chain);
            None
        }
        Ok(None) => None,
        Err(err) => {
            log::warn!("Failed to read {}: {}", var.name, err);
            None
        }
    }
}
