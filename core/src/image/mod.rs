//! Boot image and device tree handling

pub mod bootimg;
pub mod fdt;
pub mod loader;
pub mod probe;

pub use bootimg::{BootImage, BootImageHeader, ImageLayout};
pub use fdt::{FdtError, FdtHeader};
pub use loader::{boot_partition_set, install_companion_dtb, load_image, LoadedImage, TreeSwap};
pub use probe::Probed;
