/**********************************************
  > File Name		: mod.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue 02 Mar 2021 10:31:37 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * The page_management component provides facilities for higher-level
 * components to perform file I/O in terms of pages.
 *
 * A paged file is a file header followed by fixed size pages.
 * Accessing data on a page requires first reading the page into the
 * buffer pool, the page stays "pinned" until the caller releases it.
 */

use std::fmt;

pub mod buffer_manager;
pub mod page_file;
pub mod page_file_handle;
pub mod page_handle;


pub use page_file_handle::{PageFileHandle, PageFileManager};
pub use page_handle::PageHandle;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_BUFFER_FRAMES: usize = 64;
pub const MIN_PAGE_SIZE: usize = 64;
//slot offsets inside a page are u16.
pub const MAX_PAGE_SIZE: usize = u16::MAX as usize;

/*
 * Page number of a page inside a paged file.
 * u32::MAX is reserved for "no page", it's what gets written to disk
 * wherever a page pointer is absent.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u32);

impl PageId {
    pub const INVALID: PageId = PageId(u32::MAX);

    pub fn new(page_num: u32) -> Self {
        PageId(page_num)
    }

    pub fn get_page_num(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Sentinel on disk, `None` in memory.
    pub fn from_raw(raw: u32) -> Option<PageId> {
        let id = PageId(raw);
        if id.is_valid() {
            Some(id)
        } else {
            None
        }
    }

    pub fn to_raw(id: Option<PageId>) -> u32 {
        id.unwrap_or(Self::INVALID).0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "-1")
        }
    }
}

/*
 * Options for opening or creating a paged file.
 * page_size is fixed when the file is created, opening an existing file
 * always uses the page size recorded in its header.
 */
#[derive(Debug, Copy, Clone)]
pub struct PageFileOptions {
    pub page_size: usize,
    pub buffer_frames: usize,
}

impl Default for PageFileOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }
}

impl PageFileOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_frames(mut self, buffer_frames: usize) -> Self {
        self.buffer_frames = buffer_frames;
        self
    }
}
