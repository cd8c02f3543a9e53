//! Flattened device tree header checks and relocation
//!
//! Only the pieces the launcher needs: validating a blob found on a DTB
//! partition and moving it into a larger buffer so firmware and kernel can
//! grow it in place.

use core::fmt;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub const FDT_MAGIC: u32 = 0xd00d_feed;

const FDT_FIRST_SUPPORTED_VERSION: u32 = 0x02;
const FDT_LAST_SUPPORTED_VERSION: u32 = 0x11;
const FDT_LAST_COMPATIBLE_VERSION: u32 = 0x10;

const FDT_V1_SIZE: usize = 7 * 4;
const FDT_V2_SIZE: usize = FDT_V1_SIZE + 4;
const FDT_V3_SIZE: usize = FDT_V2_SIZE + 4;
const FDT_V17_SIZE: usize = FDT_V3_SIZE + 4;

const FDT_RESERVE_ENTRY_SIZE: usize = 16;

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

type Be32 = U32<BigEndian>;

#[repr(C)]
#[derive(FromZeroes, FromBytes, AsBytes, Clone, Copy)]
struct RawHeader {
    magic: Be32,
    totalsize: Be32,
    off_dt_struct: Be32,
    off_dt_strings: Be32,
    off_mem_rsvmap: Be32,
    version: Be32,
    last_comp_version: Be32,
    boot_cpuid_phys: Be32,
    size_dt_strings: Be32,
    size_dt_struct: Be32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    /// Blob shorter than its header or its declared total size
    Truncated,
    BadMagic,
    BadVersion,
    /// A block offset or size points outside the blob
    BadLayout,
    /// Malformed structure block
    BadStructure,
    /// Destination buffer too small
    NoSpace,
}

impl fmt::Display for FdtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Truncated => "truncated device tree",
            Self::BadMagic => "bad device tree magic",
            Self::BadVersion => "unsupported device tree version",
            Self::BadLayout => "device tree block out of bounds",
            Self::BadStructure => "malformed device tree structure block",
            Self::NoSpace => "device tree buffer too small",
        };
        f.write_str(msg)
    }
}

/// Decoded and validated FDT header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    pub total_size: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    /// Zero before version 17
    pub size_dt_struct: u32,
}

fn header_size(version: u32) -> usize {
    match version {
        0..=1 => FDT_V1_SIZE,
        2 => FDT_V2_SIZE,
        3..=16 => FDT_V3_SIZE,
        _ => FDT_V17_SIZE,
    }
}

fn check_off(hdrsize: usize, total: usize, off: usize) -> bool {
    off >= hdrsize && off <= total
}

fn check_block(hdrsize: usize, total: usize, off: usize, size: usize) -> bool {
    check_off(hdrsize, total, off) && off.checked_add(size).is_some_and(|end| end <= total)
}

fn be32_at(bytes: &[u8], pos: usize) -> Option<u32> {
    let raw = bytes.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

const fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Validate the header at the start of `blob`.
///
/// Besides the usual header checks, `blob` must hold `totalsize` bytes.
pub fn check_header(blob: &[u8]) -> Result<FdtHeader, FdtError> {
    if blob.len() < 8 {
        return Err(FdtError::Truncated);
    }

    // Shorter (pre-v17) headers are zero-extended
    let mut raw_bytes = [0u8; FDT_V17_SIZE];
    let n = blob.len().min(FDT_V17_SIZE);
    raw_bytes[..n].copy_from_slice(&blob[..n]);
    let raw = RawHeader::read_from(&raw_bytes[..]).ok_or(FdtError::Truncated)?;

    if raw.magic.get() != FDT_MAGIC {
        return Err(FdtError::BadMagic);
    }

    let version = raw.version.get();
    let last_comp_version = raw.last_comp_version.get();
    if version < FDT_FIRST_SUPPORTED_VERSION
        || last_comp_version > FDT_LAST_SUPPORTED_VERSION
        || version < last_comp_version
    {
        return Err(FdtError::BadVersion);
    }

    let hdrsize = header_size(version);
    let total = raw.totalsize.get() as usize;
    if total < hdrsize || total > i32::MAX as usize || blob.len() < total {
        return Err(FdtError::Truncated);
    }

    let header = FdtHeader {
        total_size: raw.totalsize.get(),
        off_dt_struct: raw.off_dt_struct.get(),
        off_dt_strings: raw.off_dt_strings.get(),
        off_mem_rsvmap: raw.off_mem_rsvmap.get(),
        version,
        last_comp_version,
        boot_cpuid_phys: raw.boot_cpuid_phys.get(),
        size_dt_strings: raw.size_dt_strings.get(),
        size_dt_struct: if version >= 17 { raw.size_dt_struct.get() } else { 0 },
    };

    if !check_off(hdrsize, total, header.off_mem_rsvmap as usize) {
        return Err(FdtError::BadLayout);
    }

    let struct_ok = if version < 17 {
        check_off(hdrsize, total, header.off_dt_struct as usize)
    } else {
        check_block(
            hdrsize,
            total,
            header.off_dt_struct as usize,
            header.size_dt_struct as usize,
        )
    };
    if !struct_ok {
        return Err(FdtError::BadLayout);
    }

    if !check_block(
        hdrsize,
        total,
        header.off_dt_strings as usize,
        header.size_dt_strings as usize,
    ) {
        return Err(FdtError::BadLayout);
    }

    Ok(header)
}

impl FdtHeader {
    /// Validated header or `None`, for offset probing
    pub fn parse(blob: &[u8]) -> Option<Self> {
        check_header(blob).ok()
    }
}

/// Memory reservation map length including its terminating entry
fn rsvmap_size(blob: &[u8], header: &FdtHeader) -> Result<usize, FdtError> {
    let total = header.total_size as usize;
    let mut pos = header.off_mem_rsvmap as usize;
    loop {
        let end = pos + FDT_RESERVE_ENTRY_SIZE;
        if end > total {
            return Err(FdtError::BadLayout);
        }
        if blob[pos..end].iter().all(|&b| b == 0) {
            return Ok(end - header.off_mem_rsvmap as usize);
        }
        pos = end;
    }
}

/// Walk the structure block up to FDT_END (needed before version 17)
fn scan_struct_size(blob: &[u8], header: &FdtHeader) -> Result<usize, FdtError> {
    let start = header.off_dt_struct as usize;
    let limit = &blob[..header.total_size as usize];
    let mut pos = start;

    loop {
        let tag = be32_at(limit, pos).ok_or(FdtError::BadStructure)?;
        pos += 4;
        match tag {
            FDT_BEGIN_NODE => {
                let name_len = limit
                    .get(pos..)
                    .and_then(|rest| rest.iter().position(|&b| b == 0))
                    .ok_or(FdtError::BadStructure)?;
                pos = align4(pos + name_len + 1);
            }
            FDT_PROP => {
                let len = be32_at(limit, pos).ok_or(FdtError::BadStructure)? as usize;
                pos = align4(pos + 8 + len);
            }
            FDT_END_NODE | FDT_NOP => {}
            FDT_END => return Ok(pos - start),
            _ => return Err(FdtError::BadStructure),
        }
        if pos > limit.len() {
            return Err(FdtError::BadStructure);
        }
    }
}

/// Copy `blob` into `dst` in canonical block order.
///
/// The result is a version 17 tree whose `totalsize` is `dst.len()`, leaving
/// the tail of `dst` as free space for later edits.
pub fn open_into(blob: &[u8], dst: &mut [u8]) -> Result<(), FdtError> {
    let header = check_header(blob)?;

    let rsv_len = rsvmap_size(blob, &header)?;
    let struct_len = if header.version >= 17 {
        header.size_dt_struct as usize
    } else {
        scan_struct_size(blob, &header)?
    };
    let strings_len = header.size_dt_strings as usize;

    let rsv_off = FDT_V17_SIZE;
    let struct_off = rsv_off + rsv_len;
    let strings_off = struct_off + struct_len;
    let needed = strings_off + strings_len;

    let total = u32::try_from(dst.len()).map_err(|_| FdtError::NoSpace)?;
    if dst.len() < needed {
        return Err(FdtError::NoSpace);
    }

    dst.fill(0);

    let src_rsv = header.off_mem_rsvmap as usize;
    dst[rsv_off..struct_off].copy_from_slice(&blob[src_rsv..src_rsv + rsv_len]);

    let src_struct = header.off_dt_struct as usize;
    dst[struct_off..strings_off].copy_from_slice(&blob[src_struct..src_struct + struct_len]);

    let src_strings = header.off_dt_strings as usize;
    dst[strings_off..needed].copy_from_slice(&blob[src_strings..src_strings + strings_len]);

    let raw = RawHeader {
        magic: Be32::new(FDT_MAGIC),
        totalsize: Be32::new(total),
        off_dt_struct: Be32::new(struct_off as u32),
        off_dt_strings: Be32::new(strings_off as u32),
        off_mem_rsvmap: Be32::new(rsv_off as u32),
        version: Be32::new(FDT_LAST_SUPPORTED_VERSION),
        last_comp_version: Be32::new(FDT_LAST_COMPATIBLE_VERSION),
        boot_cpuid_phys: Be32::new(header.boot_cpuid_phys),
        size_dt_strings: Be32::new(strings_len as u32),
        size_dt_struct: Be32::new(struct_len as u32),
    };
    dst[..FDT_V17_SIZE].copy_from_slice(raw.as_bytes());

    Ok(())
}
