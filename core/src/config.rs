//! Launcher configuration and boot parameters
//!
//! `LauncherConfig` carries the platform constants (signed header size,
//! reset delay, partition names). `LoadOptions` parses the firmware load
//! options string into overrides for `BootParams`.

use alloc::string::String;
use log::error;

/// Size of the detached signature header that may precede an image or DTB
pub const SIGNED_IMAGE_HEADER_SIZE: u64 = 0x1000;

/// Delay between announcing a chain switch and the cold reset
pub const CHAIN_SWITCH_DELAY_US: u64 = 2_000_000;

/// Boot flavour selected for this attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Normal Android-style boot image
    BootImg,
    /// Recovery kernel
    Recovery,
}

/// Mode and chain for this attempt.
///
/// `chain` stays a raw number so out-of-range values can be rejected by the
/// failover engine instead of being silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootParams {
    pub mode: BootMode,
    pub chain: u32,
}

impl Default for BootParams {
    fn default() -> Self {
        Self {
            mode: BootMode::BootImg,
            chain: 0,
        }
    }
}

/// Image partition plus its companion device-tree partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSet {
    pub image: &'static str,
    pub dtb: &'static str,
}

impl PartitionSet {
    pub const BOOT_IMAGE: Self = Self {
        image: "boot",
        dtb: "kernel-dtb",
    };

    pub const RECOVERY: Self = Self {
        image: "recovery",
        dtb: "recovery-dtb",
    };
}

#[derive(Debug, Clone, Copy)]
pub struct LauncherConfig {
    pub signed_header_size: u64,
    pub reset_delay_us: u64,
    pub boot_image: PartitionSet,
    pub recovery: PartitionSet,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            signed_header_size: SIGNED_IMAGE_HEADER_SIZE,
            reset_delay_us: CHAIN_SWITCH_DELAY_US,
            boot_image: PartitionSet::BOOT_IMAGE,
            recovery: PartitionSet::RECOVERY,
        }
    }
}

impl LauncherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signed_header_size(mut self, size: u64) -> Self {
        self.signed_header_size = size;
        self
    }

    pub fn with_reset_delay(mut self, micros: u64) -> Self {
        self.reset_delay_us = micros;
        self
    }

    pub fn with_boot_image(mut self, set: PartitionSet) -> Self {
        self.boot_image = set;
        self
    }

    pub fn with_recovery(mut self, set: PartitionSet) -> Self {
        self.recovery = set;
        self
    }

    /// Partition pair used for `mode`
    pub fn partitions(&self, mode: BootMode) -> PartitionSet {
        match mode {
            BootMode::BootImg => self.boot_image,
            BootMode::Recovery => self.recovery,
        }
    }

    /// Offsets probed for a boot image header or a DTB, in order
    pub fn probe_offsets(&self) -> [u64; 2] {
        [0, self.signed_header_size]
    }
}

const BOOTMODE_BOOTIMG: &str = "bootmode=bootimg";
const BOOTMODE_RECOVERY: &str = "bootmode=recovery";
const BOOTCHAIN: &str = "bootchain=";

/// Overrides extracted from the image load options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub mode: Option<BootMode>,
    pub chain: Option<u32>,
}

impl LoadOptions {
    /// Scan `options` for `bootmode=` and `bootchain=` overrides.
    ///
    /// `bootmode=recovery` wins when both modes are present. A chain value
    /// above 1, without digits or overflowing is logged and ignored.
    pub fn parse(options: &str) -> Self {
        let mut parsed = Self::default();

        if options.contains(BOOTMODE_BOOTIMG) {
            parsed.mode = Some(BootMode::BootImg);
        }
        if options.contains(BOOTMODE_RECOVERY) {
            parsed.mode = Some(BootMode::Recovery);
        }

        if let Some(pos) = options.find(BOOTCHAIN) {
            let value = &options[pos + BOOTCHAIN.len()..];
            match parse_decimal(value) {
                Some(chain) if chain <= 1 => parsed.chain = Some(chain),
                Some(chain) => error!("Boot chain {} specified in load options is invalid", chain),
                None => error!("Unable to parse boot chain from load options"),
            }
        }

        parsed
    }

    /// Apply the overrides on top of `params`
    pub fn apply(&self, params: &mut BootParams) {
        if let Some(mode) = self.mode {
            params.mode = mode;
        }
        if let Some(chain) = self.chain {
            params.chain = chain;
        }
    }
}

/// Leading blanks skipped, then digits up to the first non-digit
fn parse_decimal(s: &str) -> Option<u32> {
    let s = s.trim_start_matches([' ', '\t']);
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}

/// Decode raw UCS-2 load options (little endian, optionally NUL terminated).
///
/// Works on bytes so the firmware buffer may sit at any address. A trailing
/// odd byte is dropped; `None` when nothing is left.
pub fn decode_load_options(raw: &[u8]) -> Option<String> {
    if raw.len() < 2 {
        return None;
    }

    let units = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0);
    Some(
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    )
}
