/**********************************************
  > File Name		: page_handle.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 04:27:24 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * A PageHandle is a pinned page.
 *
 * Whoever holds the handle owns the pin. The page is unpinned exactly
 * once: by release(), which reports unpin errors, or when the handle
 * is dropped on any other exit path.
 */

use std::cell::{Ref, RefMut};
use std::fmt;

use log::error;

use super::buffer_manager::PageData;
use super::page_file_handle::PageFileHandle;
use super::PageId;
use crate::errors::PageFileError;

pub struct PageHandle {
    page: PageId,
    data: PageData,
    pfh: PageFileHandle,
    dirty: bool,
    released: bool,
}

impl PageHandle {
    pub(super) fn new(page: PageId, data: PageData, pfh: PageFileHandle) -> Self {
        Self {
            page,
            data,
            pfh,
            dirty: false,
            released: false,
        }
    }

    pub fn get_page_num(&self) -> PageId {
        self.page
    }

    pub fn get_data(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |d| &**d)
    }

    /// Any mutable access marks the page dirty.
    pub fn get_data_mut(&mut self) -> RefMut<'_, [u8]> {
        self.dirty = true;
        RefMut::map(self.data.borrow_mut(), |d| &mut **d)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn page_file(&self) -> &PageFileHandle {
        &self.pfh
    }

    pub fn release(mut self) -> Result<(), PageFileError> {
        self.released = true;
        self.pfh.unpin_page(self.page, self.dirty)
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pfh.unpin_page(self.page, self.dirty) {
            error!("Unpinning page {} on drop failed: {}", self.page, e);
        }
    }
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("page", &self.page)
            .field("dirty", &self.dirty)
            .finish()
    }
}
