/**********************************************
  > File Name		: mod.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 29 Mar 2021 10:46:17 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * The indexing component provides classes and methods for managing
 * persistent indexes over unordered data records stored in paged files.
 *
 * The indexes are stored in paged files, just like records data themselves.
 * So we use page_management module as a client to manage paged indexes.
 *
 * An index is a B+ tree: index nodes route a key to a child page, leaf
 * nodes keep (key, RID) entries sorted and are linked to their
 * neighbours, which is what scans walk along. Duplicate keys are
 * allowed.
 */

use std::fmt;

use crate::utils;

pub mod file_manager;
pub mod index_handle;
pub mod index_scan;
pub mod node;
pub mod trace;

#[cfg(test)]
mod tests;

pub use file_manager::IndexFileManager;
pub use index_handle::{IndexFileHeader, IndexHandle};
pub use index_scan::IndexScan;
pub use trace::{TraceEvent, TraceSink, WriterTrace};

pub const MAX_STRING_LEN: usize = 255;
pub const INT_KEY_LEN: usize = 4;
//string keys carry a u16 length before their bytes.
pub const STRING_LEN_PREFIX: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttrType {
    INT,
    STRING,
}

impl AttrType {
    pub fn to_u8(self) -> u8 {
        match self {
            AttrType::INT => 0,
            AttrType::STRING => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(AttrType::INT),
            1 => Some(AttrType::STRING),
            _ => None,
        }
    }
}

/*
 * Only naive deletion is implemented. Full deletion (merge and
 * redistribution) can still be recorded in a header, but deleting from
 * such an index fails.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeletePolicy {
    Naive,
    Full,
}

impl DeletePolicy {
    pub fn to_u8(self) -> u8 {
        match self {
            DeletePolicy::Naive => 0,
            DeletePolicy::Full => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DeletePolicy::Naive),
            1 => Some(DeletePolicy::Full),
            _ => None,
        }
    }
}

/*
 * Index key. Keys of one index all have the attr type recorded in its
 * header, so comparing keys of different types never happens in a
 * tree: insert, delete and scan reject them first.
 */
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(i32),
    Str(String),
}

impl Key {
    pub fn attr_type(&self) -> AttrType {
        match self {
            Key::Int(_) => AttrType::INT,
            Key::Str(_) => AttrType::STRING,
        }
    }

    /// Encoded length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Key::Int(_) => INT_KEY_LEN,
            Key::Str(s) => STRING_LEN_PREFIX + s.len(),
        }
    }

    /// Writes exactly `key_length()` bytes at the start of `buf`.
    pub fn encode(&self, buf: &mut [u8]) {
        match self {
            Key::Int(v) => utils::write_i32(buf, 0, *v),
            Key::Str(s) => {
                utils::write_u16(buf, 0, s.len() as u16);
                buf[STRING_LEN_PREFIX..STRING_LEN_PREFIX + s.len()].copy_from_slice(s.as_bytes());
            }
        }
    }

    pub fn decode(attr_type: AttrType, buf: &[u8]) -> Self {
        match attr_type {
            AttrType::INT => Key::Int(utils::read_i32(buf, 0)),
            AttrType::STRING => {
                let len = utils::read_u16(buf, 0) as usize;
                let bytes = &buf[STRING_LEN_PREFIX..STRING_LEN_PREFIX + len];
                Key::Str(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{}", v),
            Key::Str(s) => write!(f, "{}", s),
        }
    }
}
