//! Device path walking
//!
//! A partition's device path is the path of its disk followed by a
//! hard-drive media node. Two partitions sit on the same disk when the
//! nodes before their hard-drive nodes are byte-identical.

use super::{handle_protocol, EfiHandle};
use crate::BootServices;
use core::slice;

pub const EFI_DEVICE_PATH_PROTOCOL_GUID: [u8; 16] = [
    0x91, 0x6e, 0x57, 0x09, 0x3f, 0x6d, 0xd2, 0x11, 0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b,
];

const MEDIA_DEVICE_PATH: u8 = 0x04;
const MEDIA_HARDDRIVE_DP: u8 = 0x01;
const END_DEVICE_PATH_TYPE: u8 = 0x7f;
const NODE_HEADER_LEN: usize = 4;
const MAX_PATH_LEN: usize = 4096;

/// One node: type, subtype and the whole node including its header
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    pub kind: u8,
    pub sub_type: u8,
    pub bytes: &'a [u8],
}

pub struct Nodes<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        if self.rest.len() < NODE_HEADER_LEN || self.rest[0] == END_DEVICE_PATH_TYPE {
            return None;
        }
        let len = u16::from_le_bytes([self.rest[2], self.rest[3]]) as usize;
        if len < NODE_HEADER_LEN || len > self.rest.len() {
            return None;
        }

        let (bytes, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(Node {
            kind: bytes[0],
            sub_type: bytes[1],
            bytes,
        })
    }
}

pub fn nodes(path: &[u8]) -> Nodes<'_> {
    Nodes { rest: path }
}

/// Disk prefix and GPT partition number of a partition's path
pub fn split_hard_drive(path: &[u8]) -> Option<(&[u8], u32)> {
    let mut offset = 0;
    for node in nodes(path) {
        if node.kind == MEDIA_DEVICE_PATH && node.sub_type == MEDIA_HARDDRIVE_DP {
            let number = node.bytes.get(4..8)?;
            let number = u32::from_le_bytes([number[0], number[1], number[2], number[3]]);
            return Some((&path[..offset], number));
        }
        offset += node.bytes.len();
    }
    None
}

/// Device path installed on `handle`, up to and including the end node
pub fn device_path_of<'a>(bs: &'a BootServices, handle: EfiHandle) -> Option<&'a [u8]> {
    let start = handle_protocol::<u8>(bs, handle, &EFI_DEVICE_PATH_PROTOCOL_GUID).ok()? as *const u8;

    // SAFETY: a device path is a sequence of well-formed nodes closed by an
    // end node; each header is read before its body
    let mut len = 0;
    loop {
        let header = unsafe { slice::from_raw_parts(start.add(len), NODE_HEADER_LEN) };
        let node_len = u16::from_le_bytes([header[2], header[3]]) as usize;
        if node_len < NODE_HEADER_LEN || len + node_len > MAX_PATH_LEN {
            return None;
        }
        len += node_len;
        if header[0] == END_DEVICE_PATH_TYPE {
            break;
        }
    }

    Some(unsafe { slice::from_raw_parts(start, len) })
}
