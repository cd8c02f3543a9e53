//! Boot image loading and device tree hand-over

use super::bootimg::{BootImage, BootImageHeader};
use super::fdt::{self, FdtHeader};
use super::probe::{probe_reader, probe_slice};
use crate::config::{LauncherConfig, PartitionSet};
use crate::disk::{resolve, DiskRead, PartitionReader};
use crate::error::{BootError, Result};
use crate::platform::{DeviceTreeRef, Firmware, InstalledTree};
use alloc::vec::Vec;
use log::{debug, error, info, warn};

/// Boot image read from disk, header included
pub struct LoadedImage {
    pub header: BootImageHeader,
    /// Where the header was found on the partition
    pub offset: u64,
    pub data: Vec<u8>,
}

impl LoadedImage {
    pub fn boot_image(&self) -> Option<BootImage<'_>> {
        BootImage::split(&self.header, &self.data)
    }
}

/// A device tree installed for this boot and the one it displaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSwap {
    pub installed: InstalledTree,
    pub previous: Option<DeviceTreeRef>,
}

impl TreeSwap {
    /// Put the displaced tree back and free ours
    pub fn undo<F: Firmware + ?Sized>(self, firmware: &mut F) {
        if let Some(previous) = self.previous {
            if let Err(err) = firmware.restore_device_tree(previous) {
                error!("Failed to restore previous device tree: {}", err);
            }
        }
        firmware.release_device_tree(self.installed);
    }
}

fn zeroed_buffer(len: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| BootError::OutOfResources)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| BootError::OutOfResources)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Locate the boot image header at one of `offsets` and read the image
pub fn load_image<R: DiskRead + ?Sized>(reader: &mut R, offsets: &[u64]) -> Result<LoadedImage> {
    let probed = probe_reader(reader, offsets, BootImageHeader::SIZE, BootImageHeader::parse)?
        .ok_or_else(|| {
            error!("Header not seen at any of offsets {:x?}", offsets);
            BootError::ParseError
        })?;

    let layout = probed.value.layout().ok_or(BootError::ParseError)?;
    let mut data = zeroed_buffer(layout.total_size)?;
    reader.read_at(probed.offset, &mut data)?;

    debug!(
        "Boot image '{}' at offset {:#x}: {} bytes, page size {}",
        probed.value.product_name(),
        probed.offset,
        layout.total_size,
        layout.page_size
    );

    Ok(LoadedImage {
        header: probed.value,
        offset: probed.offset,
        data,
    })
}

/// Publish the companion DTB of the boot partition, when there is one to
/// publish.
///
/// Skipped on ACPI platforms. A corrupt DTB or a failed expansion leaves the
/// firmware tree in place; resolution, read and install failures propagate.
///
/// Firmware without a published tree still gets the partition DTB: the
/// swap is recorded with `previous: None`, so a failed transfer only
/// releases our copy and restores nothing.
pub fn install_companion_dtb<P, F>(
    disks: &mut P,
    firmware: &mut F,
    config: &LauncherConfig,
    device: P::Handle,
    dtb_name: &str,
    chain: u32,
) -> Result<Option<TreeSwap>>
where
    P: PartitionReader,
    F: Firmware,
{
    if firmware.has_acpi_tables() {
        debug!("ACPI tables present, not loading {}", dtb_name);
        return Ok(None);
    }

    let resolved = resolve(disks, device, dtb_name, chain)?;
    let mut reader = disks.open(resolved.handle)?;
    let mut blob = zeroed_buffer(reader.capacity())?;
    reader.read_at(0, &mut blob)?;

    let Some(probed) = probe_slice(&blob, &config.probe_offsets(), FdtHeader::parse) else {
        warn!("DTB on partition was corrupted, attempting to use UEFI DTB");
        return Ok(None);
    };

    let expanded_len = u64::from(probed.value.total_size) * 2;
    let mut expanded = match zeroed_buffer(expanded_len) {
        Ok(buf) => buf,
        Err(_) => {
            warn!("No memory to expand DTB, attempting to use UEFI DTB");
            return Ok(None);
        }
    };

    if let Err(err) = fdt::open_into(&blob[probed.offset as usize..], &mut expanded) {
        warn!("Failed to expand DTB ({}), attempting to use UEFI DTB", err);
        return Ok(None);
    }

    let previous = firmware.active_device_tree();
    if previous.is_none() {
        debug!("No device tree published by firmware");
    }
    let installed = firmware.install_device_tree(&expanded)?;
    info!("Installed DTB from partition {} at offset {:#x}", resolved.index, probed.offset);

    Ok(Some(TreeSwap {
        installed,
        previous,
    }))
}

/// Resolve, load and start the image/DTB pair `set` for boot chain `chain`
pub fn boot_partition_set<P, F>(
    disks: &mut P,
    firmware: &mut F,
    config: &LauncherConfig,
    device: P::Handle,
    set: PartitionSet,
    chain: u32,
) -> Result<()>
where
    P: PartitionReader,
    F: Firmware,
{
    let resolved = resolve(disks, device, set.image, chain)?;
    info!("Loading {} from partition {}", set.image, resolved.index);

    let image = {
        let mut reader = disks.open(resolved.handle)?;
        load_image(&mut reader, &config.probe_offsets())?
    };

    let boot = image.boot_image().ok_or(BootError::ParseError)?;
    debug!("Kernel command line: {}", boot.cmdline);

    let swap = install_companion_dtb(disks, firmware, config, device, set.dtb, chain)?;

    match firmware.start_kernel(&boot) {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("Kernel start failed: {}", err);
            if let Some(swap) = swap {
                swap.undo(firmware);
            }
            Err(BootError::TransferError)
        }
    }
}
