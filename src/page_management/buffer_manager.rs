/**********************************************
  > File Name		: buffer_manager.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 07:52:27 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use super::page_file::PageFile;
use super::PageId;
use crate::errors::PageFileError;

/*
 * Memory and References.
 *
 * Page data of a frame is shared between the buffer manager and the
 * PageHandle that pinned it, so it's kept behind Rc<RefCell<..>>.
 * The buffer manager only touches the data of unpinned frames (on
 * eviction or reading a new page in), while handles only touch data of
 * pinned frames, so the two never borrow the same frame at once.
 */
pub type PageData = Rc<RefCell<Box<[u8]>>>;

/*
 * Data structure to represent a page in the buffer pool.
 * Notice that the data structure for a page in main memory
 * is different from it in a file.
 */
#[derive(Debug)]
pub struct BufferPage {
    data: PageData,
    next: Option<usize>,
    prev: Option<usize>,
    dirty: bool,
    pin_count: u32,
    page: Option<PageId>, //None while the frame is on the free list.
}

impl BufferPage {
    pub fn new(page_size: usize) -> Self {
        BufferPage {
            data: Rc::new(RefCell::new(vec![0u8; page_size].into_boxed_slice())),
            next: None,
            prev: None,
            dirty: false,
            pin_count: 0,
            page: None,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/*
 * Accessing data on a page of a file requires first reading
 * the page into a buffer pool in main memory. While a page
 * is in memory and its data is available for manipulation,
 * the page is said to be "pinned". After the manipulation
 * is done, the page is "unpinned". Unpinning a page does
 * not necessarily cause the page to be remove from the buffer.
 * An unpinned page is kept in memory as long as its space in
 * the buffer pool is not needed.
 *
 * Unpinned pages are linked in a list, most recently used first.
 * When a new page is read and no free frame exists, the last page
 * of that list is written back (if dirty) and its frame reused.
 * If every frame is pinned the pool doubles its capacity.
 */
#[derive(Debug)]
pub struct BufferManager {
    buffer_table: Vec<BufferPage>,
    page_size: usize,
    first: Option<usize>, //most recently used unpinned frame.
    last: Option<usize>,  //least recently used unpinned frame.
    free: Option<usize>,  //free frames are linked by their next field.
    page_table: HashMap<PageId, usize>,
}

impl BufferManager {
    pub fn new(page_size: usize, num_frames: usize) -> Self {
        let mut buffer = BufferManager {
            buffer_table: Vec::new(),
            page_size,
            first: None,
            last: None,
            free: None,
            page_table: HashMap::new(),
        };
        buffer.grow(num_frames.max(1));
        debug!("buffer initial length = {}", buffer.buffer_table.len());
        buffer
    }

    pub fn get_pagesize(&self) -> usize {
        self.page_size
    }

    pub fn capacity(&self) -> usize {
        self.buffer_table.len()
    }

    fn grow(&mut self, extra: usize) {
        let start = self.buffer_table.len();
        for i in start..start + extra {
            let mut frame = BufferPage::new(self.page_size);
            frame.next = if i + 1 < start + extra {
                Some(i + 1)
            } else {
                self.free
            };
            self.buffer_table.push(frame);
        }
        self.free = Some(start);
    }

    fn resize_buffer(&mut self) {
        let cap = self.buffer_table.len();
        self.grow(cap);
        info!("Buffer pool new capacity: {}", self.buffer_table.len());
    }

    /*
     * Unlink a frame from the unused list.
     */
    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let page = &self.buffer_table[index];
            (page.prev, page.next)
        };
        match prev {
            None => self.first = next,
            Some(p) => self.buffer_table[p].next = next,
        }
        match next {
            None => self.last = prev,
            Some(n) => self.buffer_table[n].prev = prev,
        }
        let page = &mut self.buffer_table[index];
        page.prev = None;
        page.next = None;
    }

    /*
     * Link a frame at the head of the unused list.
     */
    fn link(&mut self, index: usize) {
        let first = self.first;
        {
            let page = &mut self.buffer_table[index];
            page.prev = None;
            page.next = first;
        }
        if let Some(f) = first {
            self.buffer_table[f].prev = Some(index);
        }
        self.first = Some(index);
        if self.last.is_none() {
            self.last = Some(index);
        }
    }

    fn push_free(&mut self, index: usize) {
        let page = &mut self.buffer_table[index];
        page.page = None;
        page.dirty = false;
        page.pin_count = 0;
        page.prev = None;
        page.next = self.free;
        self.free = Some(index);
    }

    /*
     * Find a frame for a new page: a free one, else evict the least
     * recently used unpinned page, else grow the pool.
     */
    fn take_frame(&mut self, file: &PageFile) -> Result<usize, PageFileError> {
        if self.free.is_none() {
            match self.last {
                Some(victim) => self.evict(victim, file)?,
                None => self.resize_buffer(),
            }
        }
        let index = self.free.ok_or(PageFileError::PageNotInBuf(PageId::INVALID))?;
        self.free = self.buffer_table[index].next;
        self.buffer_table[index].next = None;
        Ok(index)
    }

    fn evict(&mut self, index: usize, file: &PageFile) -> Result<(), PageFileError> {
        let page = self.buffer_table[index]
            .page
            .ok_or(PageFileError::PageNotInBuf(PageId::INVALID))?;
        if self.buffer_table[index].pin_count != 0 {
            return Err(PageFileError::PagePinned(page));
        }
        if self.buffer_table[index].dirty {
            file.write_page(page, &self.buffer_table[index].data.borrow())?;
        }
        debug!("Evicted page {} from frame {}", page, index);
        self.unlink(index);
        self.page_table.remove(&page);
        self.push_free(index);
        Ok(())
    }

    fn install(&mut self, index: usize, page: PageId) -> PageData {
        let frame = &mut self.buffer_table[index];
        frame.page = Some(page);
        frame.pin_count = 1;
        frame.dirty = false;
        frame.prev = None;
        frame.next = None;
        self.page_table.insert(page, index);
        Rc::clone(&frame.data)
    }

    /*
     * Pin a page, reading it from the file if it's not in the
     * buffer yet.
     */
    pub fn get_page(&mut self, page: PageId, file: &PageFile) -> Result<PageData, PageFileError> {
        if let Some(&index) = self.page_table.get(&page) {
            if self.buffer_table[index].pin_count == 0 {
                self.unlink(index);
            }
            self.buffer_table[index].pin_count += 1;
            return Ok(Rc::clone(&self.buffer_table[index].data));
        }

        file.check_page(page)?;
        let index = self.take_frame(file)?;
        let res = file.read_page(page, &mut self.buffer_table[index].data.borrow_mut());
        if let Err(e) = res {
            self.push_free(index);
            return Err(e);
        }
        debug!("Read page {} into frame {}", page, index);
        Ok(self.install(index, page))
    }

    /*
     * Pin a page that was just allocated in the file. Its content is
     * zeroed and it's dirty from the start so it always reaches the disk.
     */
    pub fn new_page(&mut self, page: PageId, file: &PageFile) -> Result<PageData, PageFileError> {
        if self.page_table.contains_key(&page) {
            return Err(PageFileError::PagePinned(page));
        }
        let index = self.take_frame(file)?;
        self.buffer_table[index].data.borrow_mut().fill(0);
        let data = self.install(index, page);
        self.buffer_table[index].mark_dirty();
        Ok(data)
    }

    /*
     * Unpin a page.
     * If the pin count of a page decreases to 0, the page will be
     * linked to the unused list.
     */
    pub fn unpin(&mut self, page: PageId, dirty: bool) -> Result<(), PageFileError> {
        let index = *self
            .page_table
            .get(&page)
            .ok_or(PageFileError::PageNotInBuf(page))?;
        let frame = &mut self.buffer_table[index];
        if frame.pin_count == 0 {
            return Err(PageFileError::PageUnpinned(page));
        }
        if dirty {
            frame.mark_dirty();
        }
        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            self.link(index);
        }
        Ok(())
    }

    /*
     * Drop a page from the buffer without writing it back, the page is
     * about to be disposed. Disposing a pinned page is an error.
     */
    pub fn discard(&mut self, page: PageId) -> Result<(), PageFileError> {
        if let Some(&index) = self.page_table.get(&page) {
            if self.buffer_table[index].pin_count != 0 {
                return Err(PageFileError::PagePinned(page));
            }
            self.unlink(index);
            self.page_table.remove(&page);
            self.push_free(index);
        }
        Ok(())
    }

    /*
     * Write every dirty page back to the file. Pinned pages are
     * written too but stay in the buffer.
     */
    pub fn flush_pages(&mut self, file: &PageFile) -> Result<(), PageFileError> {
        for frame in self.buffer_table.iter_mut() {
            if let (Some(page), true) = (frame.page, frame.dirty) {
                file.write_page(page, &frame.data.borrow())?;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    pub fn pinned_count(&self) -> usize {
        self.buffer_table.iter().filter(|f| f.pin_count > 0).count()
    }

    pub fn is_pinned(&self, page: PageId) -> bool {
        self.page_table
            .get(&page)
            .map(|&index| self.buffer_table[index].pin_count > 0)
            .unwrap_or(false)
    }
}
