//! Slot-aware partition name resolution

mod common;

use abboot_core::disk::{resolve, MatchKind};
use abboot_core::error::BootError;
use abboot_core::logger::{self, LogSink};
use common::{FakeDisks, BOOT_DEVICE};
use log::{Level, LevelFilter};

struct Discard;

impl LogSink for Discard {
    fn write_line(&mut self, _level: Level, _line: &str) {}
}

#[test]
fn test_slot_suffixes_pick_matching_slot() {
    let mut disks = FakeDisks::names(&["kernel-dtb_a", "kernel-dtb_b"]);

    let a = resolve(&mut disks, BOOT_DEVICE, "kernel-dtb", 0).unwrap();
    assert_eq!(a.handle, disks.handle_of("kernel-dtb_a"));
    assert_eq!(a.kind, MatchKind::Primary);

    let b = resolve(&mut disks, BOOT_DEVICE, "kernel-dtb", 1).unwrap();
    assert_eq!(b.handle, disks.handle_of("kernel-dtb_b"));
    assert_eq!(b.index, 2);
}

#[test]
fn test_prefix_form_and_case() {
    let mut disks = FakeDisks::names(&["B_boot", "a_boot"]);

    let a = resolve(&mut disks, BOOT_DEVICE, "boot", 0).unwrap();
    assert_eq!(a.handle, disks.handle_of("a_boot"));

    let b = resolve(&mut disks, BOOT_DEVICE, "boot", 1).unwrap();
    assert_eq!(b.handle, disks.handle_of("B_boot"));
}

#[test]
fn test_generic_name_serves_both_slots() {
    let mut disks = FakeDisks::names(&["recovery", "kernel-dtb"]);

    for chain in [0, 1] {
        let resolved = resolve(&mut disks, BOOT_DEVICE, "kernel-dtb", chain).unwrap();
        assert_eq!(resolved.handle, disks.handle_of("kernel-dtb"));
        assert_eq!(resolved.kind, MatchKind::Generic);
    }
}

#[test]
fn test_alternate_slot_is_last_resort() {
    let mut disks = FakeDisks::names(&["kernel-dtb_b"]);

    let resolved = resolve(&mut disks, BOOT_DEVICE, "kernel-dtb", 0).unwrap();
    assert_eq!(resolved.handle, disks.handle_of("kernel-dtb_b"));
    assert_eq!(resolved.kind, MatchKind::Alternate);
}

#[test]
fn test_alternate_fallback_is_logged() {
    let _ = logger::init(Box::leak(Box::new(Discard)), LevelFilter::Debug);
    let mut disks = FakeDisks::names(&["vendor-dtb_a"]);

    let resolved = resolve(&mut disks, BOOT_DEVICE, "vendor-dtb", 1).unwrap();
    assert_eq!(resolved.kind, MatchKind::Alternate);

    let logs = logger::get_logs();
    assert!(
        logs.iter()
            .any(|line| line.starts_with("[WARN]") && line.contains("vendor-dtb_a")),
        "no fallback warning in {:?}",
        logs
    );
    assert!(logger::total_logged() >= logger::log_count());
}

#[test]
fn test_generic_beats_alternate() {
    let mut disks = FakeDisks::names(&["boot_b", "boot"]);

    let resolved = resolve(&mut disks, BOOT_DEVICE, "boot", 0).unwrap();
    assert_eq!(resolved.handle, disks.handle_of("boot"));
}

#[test]
fn test_primary_beats_generic() {
    let mut disks = FakeDisks::names(&["boot", "boot_a"]);

    let resolved = resolve(&mut disks, BOOT_DEVICE, "boot", 0).unwrap();
    assert_eq!(resolved.handle, disks.handle_of("boot_a"));
    assert_eq!(resolved.kind, MatchKind::Primary);
}

#[test]
fn test_duplicate_primary_is_an_error() {
    let mut disks = FakeDisks::names(&["boot_a", "A_boot"]);

    assert_eq!(
        resolve(&mut disks, BOOT_DEVICE, "boot", 0),
        Err(BootError::DuplicatePartition)
    );
}

#[test]
fn test_unrelated_names_not_found() {
    let mut disks = FakeDisks::names(&["bootloader", "boot_c", "xboot"]);

    assert_eq!(
        resolve(&mut disks, BOOT_DEVICE, "boot", 0),
        Err(BootError::NotFound)
    );
}

#[test]
fn test_chain_out_of_range() {
    let mut disks = FakeDisks::names(&["boot"]);

    assert_eq!(
        resolve(&mut disks, BOOT_DEVICE, "boot", 2),
        Err(BootError::InvalidParameter)
    );
}

#[test]
fn test_missing_partition_index_is_device_error() {
    let mut disks = FakeDisks::names(&["boot"]);
    disks.partitions[0].index = 0;

    assert_eq!(
        resolve(&mut disks, BOOT_DEVICE, "boot", 0),
        Err(BootError::DeviceError)
    );
}
