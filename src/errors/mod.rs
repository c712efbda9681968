/**********************************************
  > File Name		: errors.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue 02 Mar 2021 11:05:17 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Define some erros enum for global usage.
 *
 * Every layer has its own error enum. The indexing layer wraps
 * page layer errors without touching them, so the caller always
 * sees the original failure.
 */

use crate::indexing::AttrType;
use crate::page_management::PageId;

#[derive(Debug, thiserror::Error)]
pub enum PageFileError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("incomplete read of page {0}")]
    IncompleteRead(PageId),
    #[error("incomplete write of page {0}")]
    IncompleteWrite(PageId),
    #[error("page {0} is not a valid page of this file")]
    InvalidPage(PageId),
    //the page to manipulate is not in buffer.
    #[error("page {0} is not in the buffer")]
    PageNotInBuf(PageId),
    //returns when we expect the page to be pinned, but find opposite.
    #[error("page {0} is already unpinned")]
    PageUnpinned(PageId),
    #[error("page {0} is still pinned")]
    PagePinned(PageId),
    //free_page tries to free a page but finds it already freed.
    #[error("page {0} is already freed")]
    PageFreed(PageId),
    #[error("bad magic number {found:#x} in page file header")]
    BadMagic { found: u32 },
    #[error("invalid page size {0}")]
    InvalidPageSize(usize),
    #[error("page file directory is full, cannot add entry {0:?}")]
    DirectoryFull(String),
    #[error("directory entry {0:?} already exists")]
    EntryExist(String),
    #[error("directory entry {0:?} does not exist")]
    NoEntry(String),
    #[error("page {page} has {available} bytes available, {needed} needed")]
    NoSpace {
        page: PageId,
        needed: usize,
        available: usize,
    },
    #[error("slot {slot} out of range on page {page}")]
    OutOfIndex { page: PageId, slot: usize },
    #[error("file {0:?} already exists")]
    FileExist(String),
    #[error("file {0:?} does not exist")]
    FileNotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("key of {size} bytes exceeds the maximum key size {max}")]
    KeySizeExceeded { size: usize, max: usize },
    #[error("key type {found:?} does not match index key type {expected:?}")]
    KeyTypeMismatch { expected: AttrType, found: AttrType },
    #[error("delete policy {0} is not supported")]
    UnsupportedDeletePolicy(u8),
    #[error("page protocol failure: {0}")]
    PageProtocol(#[from] PageFileError),
    #[error("page {page} has malformed node type {tag}")]
    MalformedNode { page: PageId, tag: u8 },
    #[error("index {0:?} not found")]
    NotFound(String),
    #[error("invalid key attribute {attr_type:?} with length {attr_length}")]
    InvalidAttr {
        attr_type: AttrType,
        attr_length: usize,
    },
}
