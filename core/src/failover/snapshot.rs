//! In-memory copy of the failover counters

use crate::error::{BootError, Result};
use crate::vars::counters::{Absence, STATUS_UNBOOTABLE};
use crate::vars::{RootfsVar, Slot, VarError, VariableStore};
use core::fmt;
use log::error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub value: u32,
    /// Written back on commit
    pub dirty: bool,
}

/// First counter that could not be written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitError {
    pub var: RootfsVar,
    pub error: VarError,
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to write {}: {}", self.var.name(), self.error)
    }
}

/// Counters as loaded at the start of this boot plus staged changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    counters: [Counter; RootfsVar::COUNT],
}

impl Snapshot {
    /// Read all six counters.
    ///
    /// Missing status counters and store errors are load errors; other
    /// counters fall back to their defaults without being marked dirty.
    pub fn load<S: VariableStore + ?Sized>(store: &mut S) -> Result<Self> {
        let mut counters = [Counter::default(); RootfsVar::COUNT];

        for var in RootfsVar::ALL {
            let value = match store.get(&var.variable()) {
                Ok(Some(value)) => value,
                Ok(None) => match var.absence() {
                    Absence::Default(value) => value,
                    Absence::Required => {
                        error!("{} is not set", var.name());
                        return Err(BootError::LoadError);
                    }
                },
                Err(err) => {
                    error!("Failed to read {}: {}", var.name(), err);
                    return Err(BootError::LoadError);
                }
            };
            counters[var.index()] = Counter {
                value,
                dirty: false,
            };
        }

        Ok(Self { counters })
    }

    pub fn counter(&self, var: RootfsVar) -> Counter {
        self.counters[var.index()]
    }

    pub fn value(&self, var: RootfsVar) -> u32 {
        self.counters[var.index()].value
    }

    pub fn is_dirty(&self, var: RootfsVar) -> bool {
        self.counters[var.index()].dirty
    }

    /// Set a counter and mark it for write-back
    pub fn stage(&mut self, var: RootfsVar, value: u32) {
        self.counters[var.index()] = Counter { value, dirty: true };
    }

    pub fn status(&self, slot: Slot) -> u32 {
        self.value(RootfsVar::status(slot))
    }

    pub fn retry(&self, slot: Slot) -> u32 {
        self.value(RootfsVar::retry(slot))
    }

    pub fn is_unbootable(&self, slot: Slot) -> bool {
        self.status(slot) == STATUS_UNBOOTABLE
    }

    /// A slot with attempts left
    pub fn is_bootable(&self, slot: Slot) -> bool {
        self.retry(slot) != 0
    }

    pub fn decrement_retry(&mut self, slot: Slot) -> Result<()> {
        let retry = self.retry(slot);
        if retry == 0 {
            error!("Retry count of slot {} is already 0", slot.letter());
            return Err(BootError::InvalidParameter);
        }
        self.stage(RootfsVar::retry(slot), retry - 1);
        Ok(())
    }

    /// Dirty counters in commit order
    pub fn dirty(&self) -> impl Iterator<Item = RootfsVar> + '_ {
        RootfsVar::ALL.into_iter().filter(|&var| self.is_dirty(var))
    }

    /// Write dirty counters back in index order, stopping at the first
    /// failure. Returns how many were written.
    pub fn commit<S: VariableStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> core::result::Result<usize, CommitError> {
        let mut written = 0;
        for var in RootfsVar::ALL {
            let counter = self.counters[var.index()];
            if !counter.dirty {
                continue;
            }
            store
                .set(&var.variable(), counter.value)
                .map_err(|error| CommitError { var, error })?;
            self.counters[var.index()].dirty = false;
            written += 1;
        }
        Ok(written)
    }
}
