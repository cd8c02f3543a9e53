//! Ordered offset probing
//!
//! Images and device trees may sit behind a detached signature header, so
//! both are looked for at a list of offsets: read, try to parse, advance.

use crate::disk::DiskRead;
use crate::error::Result;
use alloc::vec;

/// A value found at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probed<T> {
    pub offset: u64,
    pub value: T,
}

/// First offset for which `attempt` yields a value.
///
/// `attempt` returning an error stops the search; `Ok(None)` moves on to the
/// next offset.
pub fn first_match<T, F>(offsets: &[u64], mut attempt: F) -> Result<Option<Probed<T>>>
where
    F: FnMut(u64) -> Result<Option<T>>,
{
    for &offset in offsets {
        if let Some(value) = attempt(offset)? {
            return Ok(Some(Probed { offset, value }));
        }
    }
    Ok(None)
}

/// Read `len` bytes at each offset from `reader` and parse them
pub fn probe_reader<R, T, P>(
    reader: &mut R,
    offsets: &[u64],
    len: usize,
    parse: P,
) -> Result<Option<Probed<T>>>
where
    R: DiskRead + ?Sized,
    P: Fn(&[u8]) -> Option<T>,
{
    let mut buf = vec![0u8; len];
    first_match(offsets, |offset| {
        reader.read_at(offset, &mut buf)?;
        Ok(parse(&buf))
    })
}

/// Parse the tail of an in-memory buffer starting at each offset
pub fn probe_slice<T, P>(bytes: &[u8], offsets: &[u64], parse: P) -> Option<Probed<T>>
where
    P: Fn(&[u8]) -> Option<T>,
{
    offsets.iter().find_map(|&offset| {
        let tail = usize::try_from(offset).ok().and_then(|start| bytes.get(start..))?;
        parse(tail).map(|value| Probed { offset, value })
    })
}
