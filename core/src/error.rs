//! Error taxonomy shared by the resolver, loader, failover engine and
//! orchestrator.

use core::fmt;

/// Result type for launcher operations
pub type Result<T> = core::result::Result<T, BootError>;

/// Errors surfaced while choosing and loading a boot partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// Slot/chain out of range or otherwise malformed input
    InvalidParameter,

    /// No partition matched the requested base name
    NotFound,

    /// Partition matched but has no usable index, or a disk read failed
    DeviceError,

    /// More than one partition claims the same name category
    DuplicatePartition,

    /// A required persistent variable could not be read
    LoadError,

    /// No valid boot image header at any probed offset
    ParseError,

    /// Buffer allocation failed
    OutOfResources,

    /// The image transfer (kernel start) returned
    TransferError,
}

impl BootError {
    /// Short human-readable description
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid parameter",
            Self::NotFound => "partition not found",
            Self::DeviceError => "device error",
            Self::DuplicatePartition => "duplicate partition name",
            Self::LoadError => "failed to load persistent state",
            Self::ParseError => "boot image header not found",
            Self::OutOfResources => "out of resources",
            Self::TransferError => "image transfer failed",
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
