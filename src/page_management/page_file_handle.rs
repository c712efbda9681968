/**********************************************
  > File Name		: page_file_handle.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 04:07:02 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Introduction:
 *
 * The PageFileManager class handles the creation, deletion, opening,
 * and closing of paged files.
 *
 * The PageFileHandle class provides access to the pages of an open
 * file: pin a page, allocate a new one, dispose an old one, and look
 * up named entries in the file directory. A handle is cheap to clone,
 * all clones share the same file and buffer pool.
 */

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use log::{error, info};

use super::buffer_manager::BufferManager;
use super::page_file::PageFile;
use super::page_handle::PageHandle;
use super::{PageFileOptions, PageId};
use crate::errors::PageFileError;

#[derive(Debug)]
struct PageFileInner {
    file: PageFile,
    buffer: BufferManager,
}

impl PageFileInner {
    fn flush(&mut self) -> Result<(), PageFileError> {
        self.buffer.flush_pages(&self.file)?;
        self.file.sync_header()
    }
}

impl Drop for PageFileInner {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("Flushing page file on drop failed: {}", e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageFileHandle {
    inner: Rc<RefCell<PageFileInner>>,
}

impl PageFileHandle {
    fn new(file: PageFile, buffer_frames: usize) -> Self {
        let buffer = BufferManager::new(file.page_size(), buffer_frames);
        Self {
            inner: Rc::new(RefCell::new(PageFileInner { file, buffer })),
        }
    }

    pub fn page_size(&self) -> usize {
        self.inner.borrow().file.page_size()
    }

    pub fn get_page(&self, page: PageId) -> Result<PageHandle, PageFileError> {
        let mut inner = self.inner.borrow_mut();
        let PageFileInner { file, buffer } = &mut *inner;
        let data = buffer.get_page(page, file)?;
        Ok(PageHandle::new(page, data, self.clone()))
    }

    /*
     * Allocate a new page in the file and pin it.
     * The page is zeroed and already marked dirty.
     */
    pub fn allocate_page(&self) -> Result<PageHandle, PageFileError> {
        let mut inner = self.inner.borrow_mut();
        let PageFileInner { file, buffer } = &mut *inner;
        let page = file.allocate_page()?;
        let data = buffer.new_page(page, file)?;
        Ok(PageHandle::new(page, data, self.clone()))
    }

    pub fn unpin_page(&self, page: PageId, dirty: bool) -> Result<(), PageFileError> {
        self.inner.borrow_mut().buffer.unpin(page, dirty)
    }

    /*
     * Give a page back to the file. The page must not be pinned.
     */
    pub fn dispose_page(&self, page: PageId) -> Result<(), PageFileError> {
        let mut inner = self.inner.borrow_mut();
        inner.file.check_page(page)?;
        inner.buffer.discard(page)?;
        inner.file.dispose_page(page)
    }

    pub fn get_file_entry(&self, name: &str) -> Option<PageId> {
        self.inner.borrow().file.get_file_entry(name)
    }

    pub fn add_file_entry(&self, name: &str, page: PageId) -> Result<(), PageFileError> {
        self.inner.borrow_mut().file.add_file_entry(name, page)
    }

    pub fn delete_file_entry(&self, name: &str) -> Result<PageId, PageFileError> {
        self.inner.borrow_mut().file.delete_file_entry(name)
    }

    pub fn flush_pages(&self) -> Result<(), PageFileError> {
        self.inner.borrow_mut().flush()
    }

    pub fn pinned_count(&self) -> usize {
        self.inner.borrow().buffer.pinned_count()
    }

    pub fn is_pinned(&self, page: PageId) -> bool {
        self.inner.borrow().buffer.is_pinned(page)
    }

    pub fn allocated_count(&self) -> usize {
        self.inner.borrow().file.allocated_count()
    }

    /*
     * Write everything back and sync the file. Other clones of this
     * handle stay usable.
     */
    pub fn close(&self) -> Result<(), PageFileError> {
        let mut inner = self.inner.borrow_mut();
        inner.flush()?;
        inner.file.sync_all()
    }
}

#[derive(Debug, Default)]
pub struct PageFileManager {
    options: PageFileOptions,
}

impl PageFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PageFileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> PageFileOptions {
        self.options
    }

    pub fn create_file(&self, path: impl AsRef<Path>) -> Result<PageFileHandle, PageFileError> {
        let file = PageFile::create(path.as_ref(), self.options.page_size)?;
        Ok(PageFileHandle::new(file, self.options.buffer_frames))
    }

    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<PageFileHandle, PageFileError> {
        let file = PageFile::open(path.as_ref())?;
        Ok(PageFileHandle::new(file, self.options.buffer_frames))
    }

    /*
     * Open the file if it exists, create it otherwise.
     */
    pub fn open_or_create(&self, path: impl AsRef<Path>) -> Result<PageFileHandle, PageFileError> {
        if path.as_ref().exists() {
            self.open_file(path)
        } else {
            self.create_file(path)
        }
    }

    pub fn destroy_file(&self, path: impl AsRef<Path>) -> Result<(), PageFileError> {
        let path = path.as_ref();
        std::fs::remove_file(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PageFileError::FileNotFound(path.display().to_string()),
            _ => PageFileError::Io(e),
        })?;
        info!("Destroyed page file {}", path.display());
        Ok(())
    }
}
