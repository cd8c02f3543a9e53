//! End-to-end boot attempts against in-memory firmware

mod common;

use abboot_core::config::{BootMode, BootParams, LauncherConfig, PartitionSet};
use abboot_core::error::BootError;
use abboot_core::orchestrator::{resolve_boot_params, CHAIN_SWITCH_MESSAGE};
use abboot_core::vars::counters::STATUS_UNBOOTABLE;
use abboot_core::vars::{RootfsVar, BOOT_CHAIN_FW_CURRENT, BOOT_CHAIN_OS_CURRENT};
use abboot_core::Launcher;
use common::{
    fdt_blob, BootImageBuilder, FakeDisks, FakeFirmware, MemoryVariableStore, BOOT_DEVICE,
};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn ab_disks() -> FakeDisks {
    FakeDisks::new()
        .with("boot_a", BootImageBuilder::new().kernel(b"MZ-a").build())
        .with("boot_b", BootImageBuilder::new().kernel(b"MZ-b").build())
        .with("kernel-dtb_a", fdt_blob())
        .with("kernel-dtb_b", fdt_blob())
        .with("recovery", BootImageBuilder::new().kernel(b"MZ-rec").build())
        .with("recovery-dtb", fdt_blob())
}

fn launcher(store: MemoryVariableStore) -> Launcher<MemoryVariableStore, FakeDisks, FakeFirmware> {
    Launcher::new(store, ab_disks(), FakeFirmware::new(), LauncherConfig::default())
}

#[test]
fn test_params_default_to_slot_a_bootimg() {
    let mut store = MemoryVariableStore::new();
    assert_eq!(resolve_boot_params(&mut store, None), BootParams::default());
}

#[test]
fn test_os_chain_overrides_firmware_chain() {
    let mut store = MemoryVariableStore::new();
    store.put(&BOOT_CHAIN_FW_CURRENT, 1);
    assert_eq!(resolve_boot_params(&mut store, None).chain, 1);

    store.put(&BOOT_CHAIN_OS_CURRENT, 0);
    assert_eq!(resolve_boot_params(&mut store, None).chain, 0);
}

#[test]
fn test_out_of_range_chain_variable_ignored() {
    let mut store = MemoryVariableStore::new();
    store.put(&BOOT_CHAIN_FW_CURRENT, 5);
    assert_eq!(resolve_boot_params(&mut store, None).chain, 0);
}

#[test]
fn test_load_options_override_variables() {
    let mut store = MemoryVariableStore::new();
    store.put(&BOOT_CHAIN_OS_CURRENT, 1);

    let params = resolve_boot_params(&mut store, Some("bootmode=recovery bootchain=0"));
    assert_eq!(
        params,
        BootParams {
            mode: BootMode::Recovery,
            chain: 0,
        }
    );
}

#[test]
fn test_bootchain_two_is_rejected() {
    let mut store = MemoryVariableStore::new();
    store.put(&BOOT_CHAIN_FW_CURRENT, 1);

    assert_eq!(resolve_boot_params(&mut store, Some("bootchain=2")).chain, 1);
}

#[test]
fn test_boots_current_slot_and_persists_os_chain() {
    let mut store = MemoryVariableStore::with_slots(Some(7), Some(7));
    store.put(&BOOT_CHAIN_FW_CURRENT, 1);
    let mut launcher = launcher(store);

    launcher.run(BOOT_DEVICE, None).unwrap();

    assert_eq!(launcher.firmware.started.len(), 1);
    assert_eq!(launcher.firmware.started[0].kernel, b"MZ-b");
    assert_eq!(launcher.store.value(&BOOT_CHAIN_OS_CURRENT), Some(1));
    assert_eq!(launcher.store.attributes(&BOOT_CHAIN_OS_CURRENT), Some(0x6));
    assert_eq!(launcher.store.counter(RootfsVar::RetryB), Some(6));
}

#[test]
fn test_recovery_option_boots_recovery_pair() {
    let store = MemoryVariableStore::with_slots(Some(7), Some(7));
    let mut launcher = launcher(store);

    launcher.run(BOOT_DEVICE, Some("bootmode=recovery")).unwrap();

    assert_eq!(launcher.firmware.started[0].kernel, b"MZ-rec");
    // Recovery leaves the counters alone
    assert_eq!(launcher.store.counter(RootfsVar::RetryA), Some(7));
}

#[test]
fn test_dead_end_falls_back_to_recovery() {
    let mut store = MemoryVariableStore::with_slots(Some(0), Some(0));
    store.put(&RootfsVar::StatusA.variable(), STATUS_UNBOOTABLE);
    store.put(&RootfsVar::StatusB.variable(), STATUS_UNBOOTABLE);
    let mut launcher = launcher(store);

    launcher.run(BOOT_DEVICE, None).unwrap();

    assert_eq!(launcher.firmware.started[0].kernel, b"MZ-rec");
    assert!(launcher.firmware.stalls.is_empty());
}

#[test]
fn test_validation_error_still_boots() {
    // No status counters at all
    let store = MemoryVariableStore::new();
    let mut launcher = launcher(store);

    launcher.run(BOOT_DEVICE, None).unwrap();

    assert_eq!(launcher.firmware.started[0].kernel, b"MZ-a");
}

#[test]
fn test_chain_switch_announces_and_resets() {
    let store = MemoryVariableStore::with_slots(Some(0), Some(3));
    let mut launcher = launcher(store);

    let outcome = catch_unwind(AssertUnwindSafe(|| launcher.run(BOOT_DEVICE, None)));

    assert!(outcome.is_err(), "a chain switch must not return");
    assert_eq!(launcher.firmware.announcements, vec![CHAIN_SWITCH_MESSAGE.to_string()]);
    assert_eq!(launcher.firmware.stalls, vec![2_000_000]);
    assert!(launcher.firmware.started.is_empty());
    assert_eq!(launcher.store.counter(RootfsVar::FwNext), Some(1));
}

#[test]
fn test_boot_failure_is_reported() {
    let store = MemoryVariableStore::with_slots(Some(7), Some(7));
    let mut launcher = Launcher::new(
        store,
        FakeDisks::new().with("kernel-dtb", fdt_blob()),
        FakeFirmware::new(),
        LauncherConfig::default(),
    );

    assert_eq!(launcher.run(BOOT_DEVICE, None), Err(BootError::NotFound));
    // Counters were still committed for this attempt
    assert_eq!(launcher.store.counter(RootfsVar::RetryA), Some(6));
}

#[test]
fn test_configured_partitions_and_reset_delay() {
    let config = LauncherConfig::new()
        .with_boot_image(PartitionSet {
            image: "kernel",
            dtb: "dtb",
        })
        .with_recovery(PartitionSet {
            image: "rescue",
            dtb: "rescue-dtb",
        })
        .with_signed_header_size(0x2000)
        .with_reset_delay(500);
    let disks = FakeDisks::new()
        .with(
            "kernel_a",
            BootImageBuilder::new().kernel(b"MZ-k").signed(0x2000).build(),
        )
        .with("dtb_a", fdt_blob())
        .with("rescue", BootImageBuilder::new().kernel(b"MZ-rescue").build())
        .with("rescue-dtb", fdt_blob());

    let store = MemoryVariableStore::with_slots(Some(7), Some(7));
    let mut launcher = Launcher::new(store, disks, FakeFirmware::new(), config);
    launcher.run(BOOT_DEVICE, None).unwrap();
    launcher.run(BOOT_DEVICE, Some("bootmode=recovery")).unwrap();

    assert_eq!(launcher.firmware.started.len(), 2);
    assert_eq!(launcher.firmware.started[0].kernel, b"MZ-k");
    assert_eq!(launcher.firmware.started[1].kernel, b"MZ-rescue");

    // Slot A exhausted, B still has retries: switch after the configured delay
    let mut store = MemoryVariableStore::with_slots(Some(0), Some(3));
    store.put(&BOOT_CHAIN_FW_CURRENT, 0);
    let mut launcher = Launcher::new(store, FakeDisks::new(), FakeFirmware::new(), config);
    let outcome = catch_unwind(AssertUnwindSafe(|| launcher.run(BOOT_DEVICE, None)));

    assert!(outcome.is_err());
    assert_eq!(launcher.firmware.stalls, vec![500]);
}
