//! The six failover counters and their metadata

use super::{Variable, PERSISTENT_ATTRIBUTES};

/// Attempts granted to a slot before it is marked unbootable
pub const ROOTFS_RETRY_MAX: u32 = 7;

pub const STATUS_NORMAL: u32 = 0x00;
pub const STATUS_BOOTING: u32 = 0x01;
pub const STATUS_UNBOOTABLE: u32 = 0xFF;

/// Redundant rootfs/firmware instance, numerically the boot chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Slot {
    A = 0,
    B = 1,
}

impl Slot {
    pub const fn from_chain(chain: u32) -> Option<Self> {
        match chain {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    pub const fn chain(self) -> u32 {
        self as u32
    }

    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

/// What loading should do when a counter does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// Loading fails
    Required,
    /// Treated as this value, not dirty
    Default(u32),
}

/// Persistent failover counter.
///
/// Declaration order is the commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootfsVar {
    StatusA,
    StatusB,
    RetryA,
    RetryB,
    FwNext,
    FwStatus,
}

impl RootfsVar {
    pub const COUNT: usize = 6;

    pub const ALL: [RootfsVar; Self::COUNT] = [
        Self::StatusA,
        Self::StatusB,
        Self::RetryA,
        Self::RetryB,
        Self::FwNext,
        Self::FwStatus,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn status(slot: Slot) -> Self {
        match slot {
            Slot::A => Self::StatusA,
            Slot::B => Self::StatusB,
        }
    }

    pub const fn retry(slot: Slot) -> Self {
        match slot {
            Slot::A => Self::RetryA,
            Slot::B => Self::RetryB,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::StatusA => "RootfsStatusSlotA",
            Self::StatusB => "RootfsStatusSlotB",
            Self::RetryA => "RootfsRetrySlotA",
            Self::RetryB => "RootfsRetrySlotB",
            Self::FwNext => "BootChainFwNext",
            Self::FwStatus => "BootChainFwStatus",
        }
    }

    pub const fn absence(self) -> Absence {
        match self {
            Self::StatusA | Self::StatusB => Absence::Required,
            Self::RetryA | Self::RetryB => Absence::Default(ROOTFS_RETRY_MAX),
            Self::FwNext | Self::FwStatus => Absence::Default(0),
        }
    }

    pub const fn variable(self) -> Variable {
        Variable::new(self.name(), PERSISTENT_ATTRIBUTES)
    }
}
