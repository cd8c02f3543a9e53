//! Boot attempt driver
//!
//! Picks the boot parameters, lets the failover engine judge them, carries
//! out a requested chain switch and finally boots the selected partition
//! pair. Nothing here retries: a failed slot is dealt with by the engine on
//! the next boot.

use crate::config::{BootParams, LauncherConfig, LoadOptions};
use crate::disk::PartitionReader;
use crate::error::Result;
use crate::failover::{self, Termination, Verdict};
use crate::image::boot_partition_set;
use crate::platform::Firmware;
use crate::vars::{read_chain, Slot, VariableStore, BOOT_CHAIN_FW_CURRENT, BOOT_CHAIN_OS_CURRENT};
use log::{error, info, warn};

pub const CHAIN_SWITCH_MESSAGE: &str = "Switching the bootchain. Resetting the system in 2 seconds.";

/// Initial parameters: firmware chain, then OS chain, then load options
pub fn resolve_boot_params<S: VariableStore + ?Sized>(
    store: &mut S,
    load_options: Option<&str>,
) -> BootParams {
    let mut params = BootParams::default();

    if let Some(chain) = read_chain(store, &BOOT_CHAIN_FW_CURRENT) {
        params.chain = chain;
    }
    // Set by an earlier stage when chain loading
    if let Some(chain) = read_chain(store, &BOOT_CHAIN_OS_CURRENT) {
        params.chain = chain;
    }
    if let Some(options) = load_options.filter(|o| !o.is_empty()) {
        LoadOptions::parse(options).apply(&mut params);
    }

    params
}

/// Everything one boot attempt needs
pub struct Launcher<S, P, F> {
    pub store: S,
    pub disks: P,
    pub firmware: F,
    pub config: LauncherConfig,
}

impl<S, P, F> Launcher<S, P, F>
where
    S: VariableStore,
    P: PartitionReader,
    F: Firmware,
{
    pub fn new(store: S, disks: P, firmware: F, config: LauncherConfig) -> Self {
        Self {
            store,
            disks,
            firmware,
            config,
        }
    }

    /// Run one boot attempt from the partition set on `device`'s disk.
    ///
    /// Returns only if the kernel could not be started or returned; a chain
    /// switch resets the machine.
    pub fn run(&mut self, device: P::Handle, load_options: Option<&str>) -> Result<()> {
        let mut params = resolve_boot_params(&mut self.store, load_options);
        info!("Boot mode {:?}, chain {}", params.mode, params.chain);

        // Visible to later stages even if validation fails
        if let Err(err) = self.store.set(&BOOT_CHAIN_OS_CURRENT, params.chain) {
            warn!("Failed to set {}: {}", BOOT_CHAIN_OS_CURRENT.name, err);
        }

        match failover::validate(&mut self.store, params) {
            Ok(Verdict::Continue(validated)) => params = validated,
            Ok(Verdict::Terminate(Termination::ChainSwitch { next })) => self.switch_chain(next),
            Err(err) => error!("Failed to validate rootfs status: {}", err),
        }

        let set = self.config.partitions(params.mode);
        boot_partition_set(
            &mut self.disks,
            &mut self.firmware,
            &self.config,
            device,
            set,
            params.chain,
        )
        .map_err(|err| {
            error!("Failed to boot {}:{} partition: {}", set.image, params.chain, err);
            err
        })
    }

    fn switch_chain(&mut self, next: Slot) -> ! {
        info!("Next boot chain: {}", next.letter());
        self.firmware.announce(CHAIN_SWITCH_MESSAGE);
        self.firmware.stall(self.config.reset_delay_us);
        self.firmware.reset_cold()
    }
}
