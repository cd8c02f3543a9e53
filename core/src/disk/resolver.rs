//! A/B partition name resolution
//!
//! For a base name such as `kernel-dtb` and slot A, sibling partitions are
//! classified as:
//!
//! - primary: `kernel-dtb_a`, `A_kernel-dtb` (slot letter, either case)
//! - generic: `kernel-dtb`
//! - alternate: `kernel-dtb_b`, `b_kernel-dtb` (the other slot's letter)
//!
//! and the best category present wins: primary, then generic, then
//! alternate.

use super::{PartitionCandidate, PartitionEnumerator};
use crate::error::{BootError, Result};
use crate::vars::Slot;
use log::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Primary,
    Generic,
    Alternate,
}

impl MatchKind {
    /// Selection order
    pub const PRIORITY: [MatchKind; 3] = [Self::Primary, Self::Generic, Self::Alternate];

    const fn rank(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Generic => 1,
            Self::Alternate => 2,
        }
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<H> {
    pub handle: H,
    /// 1-based GPT partition index
    pub index: u32,
    pub kind: MatchKind,
}

/// Classify one partition name against `base` for `slot`
pub fn classify(name: &str, base: &str, slot: Slot) -> Option<MatchKind> {
    if name == base {
        return Some(MatchKind::Generic);
    }

    let name = name.as_bytes();
    let base = base.as_bytes();
    if base.is_empty() || name.len() != base.len() + 2 {
        return None;
    }

    let letter = if name[1] == b'_' && &name[2..] == base {
        name[0]
    } else if name[base.len()] == b'_' && &name[..base.len()] == base {
        name[base.len() + 1]
    } else {
        return None;
    };

    if letter.eq_ignore_ascii_case(&(slot.letter() as u8)) {
        Some(MatchKind::Primary)
    } else if letter.eq_ignore_ascii_case(&(slot.other().letter() as u8)) {
        Some(MatchKind::Alternate)
    } else {
        None
    }
}

/// Find the partition named after `base_name` for boot chain `chain`
/// among the siblings of `device`.
pub fn resolve<E: PartitionEnumerator>(
    enumerator: &mut E,
    device: E::Handle,
    base_name: &str,
    chain: u32,
) -> Result<Resolved<E::Handle>> {
    let slot = Slot::from_chain(chain).ok_or(BootError::InvalidParameter)?;

    let mut found: [Option<PartitionCandidate<E::Handle>>; 3] = [None, None, None];
    for candidate in enumerator.sibling_partitions(device)? {
        let Some(kind) = classify(&candidate.name, base_name, slot) else {
            continue;
        };

        let slot_entry = &mut found[kind.rank()];
        if slot_entry.is_some() {
            error!(
                "Partition {} duplicates an earlier {:?} match for {}",
                candidate.name, kind, base_name
            );
            return Err(BootError::DuplicatePartition);
        }
        *slot_entry = Some(candidate);
    }

    let (kind, chosen) = MatchKind::PRIORITY
        .iter()
        .find_map(|&kind| found[kind.rank()].as_ref().map(|candidate| (kind, candidate)))
        .ok_or(BootError::NotFound)?;
    let handle = chosen.handle;

    match kind {
        MatchKind::Primary if found[MatchKind::Generic.rank()].is_some() => {
            debug!("Both {} and its slot {} variant exist, using the slot variant", base_name, slot.letter());
        }
        MatchKind::Alternate => warn!(
            "Falling back to alternative boot path {} for {}",
            chosen.name, base_name
        ),
        _ => {}
    }

    let index = enumerator.partition_index(handle);
    if index == 0 {
        error!("Partition for {} has no partition index", base_name);
        return Err(BootError::DeviceError);
    }

    Ok(Resolved {
        handle,
        index,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_suffix_forms() {
        assert_eq!(classify("boot_a", "boot", Slot::A), Some(MatchKind::Primary));
        assert_eq!(classify("boot_B", "boot", Slot::A), Some(MatchKind::Alternate));
        assert_eq!(classify("boot_b", "boot", Slot::B), Some(MatchKind::Primary));
        assert_eq!(classify("boot_a", "boot", Slot::B), Some(MatchKind::Alternate));
    }

    #[test]
    fn test_classify_prefix_forms() {
        assert_eq!(classify("A_kernel-dtb", "kernel-dtb", Slot::A), Some(MatchKind::Primary));
        assert_eq!(classify("b_kernel-dtb", "kernel-dtb", Slot::A), Some(MatchKind::Alternate));
    }

    #[test]
    fn test_classify_generic_and_misses() {
        assert_eq!(classify("boot", "boot", Slot::B), Some(MatchKind::Generic));
        assert_eq!(classify("boot_c", "boot", Slot::A), None);
        assert_eq!(classify("bootxa", "boot", Slot::A), None);
        assert_eq!(classify("boot_aa", "boot", Slot::A), None);
        assert_eq!(classify("recovery", "boot", Slot::A), None);
    }
}
