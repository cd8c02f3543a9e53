//! Rootfs A/B failover decision
//!
//! Each boot of a slot costs one retry. A slot out of retries is marked
//! unbootable and the firmware is asked to switch to the other chain; with
//! both slots exhausted the device falls back to recovery.

use super::snapshot::Snapshot;
use crate::config::{BootMode, BootParams};
use crate::error::{BootError, Result};
use crate::vars::counters::{STATUS_BOOTING, STATUS_UNBOOTABLE};
use crate::vars::{RootfsVar, Slot, VariableStore};
use log::{error, info, warn};

/// Why this boot attempt has to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `BootChainFwNext` now names `next`; a cold reset makes firmware
    /// pick it up.
    ChainSwitch { next: Slot },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Boot with these parameters
    Continue(BootParams),
    Terminate(Termination),
}

/// Run the failover state machine for `params` against `store`.
///
/// Recovery requests pass through untouched. Commit failures are logged and
/// do not change the verdict.
pub fn validate<S: VariableStore + ?Sized>(store: &mut S, params: BootParams) -> Result<Verdict> {
    if params.mode == BootMode::Recovery {
        info!("Recovery boot requested, skipping rootfs validation");
        return Ok(Verdict::Continue(params));
    }

    let current = Slot::from_chain(params.chain).ok_or_else(|| {
        error!("Invalid boot chain {}", params.chain);
        BootError::InvalidParameter
    })?;
    let non_current = current.other();

    let mut snapshot = Snapshot::load(store)?;
    let mut params = params;

    if snapshot.is_unbootable(Slot::A) && snapshot.is_unbootable(Slot::B) {
        warn!("Both rootfs slots are unbootable, booting recovery");
        params.mode = BootMode::Recovery;
        return Ok(Verdict::Continue(params));
    }

    let mut switch_to = None;
    if snapshot.is_bootable(current) {
        snapshot.decrement_retry(current)?;
        snapshot.stage(RootfsVar::status(current), STATUS_BOOTING);
    } else {
        warn!("Rootfs slot {} has no retries left", current.letter());
        snapshot.stage(RootfsVar::status(current), STATUS_UNBOOTABLE);

        if snapshot.is_bootable(non_current) {
            snapshot.stage(RootfsVar::FwNext, non_current.chain());
            switch_to = Some(non_current);
        } else {
            warn!("Rootfs slot {} has no retries left, booting recovery", non_current.letter());
            params.mode = BootMode::Recovery;
            snapshot.stage(RootfsVar::status(non_current), STATUS_UNBOOTABLE);
        }
    }

    params.chain = current.chain();

    if let Err(err) = snapshot.commit(store) {
        error!("Failed to save rootfs state: {}", err);
    }

    if let Some(next) = switch_to {
        if let Err(err) = store.delete(&RootfsVar::FwStatus.variable()) {
            error!("Failed to delete {}: {}", RootfsVar::FwStatus.name(), err);
        }
        return Ok(Verdict::Terminate(Termination::ChainSwitch { next }));
    }

    Ok(Verdict::Continue(params))
}
