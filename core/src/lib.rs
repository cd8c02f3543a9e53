//! abboot core library
//!
//! A/B boot selection for Android-style boot partitions: rootfs failover
//! counters, slot-aware partition lookup, boot image and device tree
//! loading. Firmware access goes through the traits in `vars`, `disk` and
//! `platform`, so everything here runs unchanged on the host.
//!
//! Designed to be no_std compatible.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod config;
pub mod disk;
pub mod error;
pub mod failover;
pub mod image;
pub mod logger;
pub mod orchestrator;
pub mod platform;
pub mod vars;

pub use config::{BootMode, BootParams, LauncherConfig, PartitionSet};
pub use error::{BootError, Result};
pub use orchestrator::Launcher;
