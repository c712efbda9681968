/**********************************************
  > File Name		: page_file.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 07:31:48 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Introduction:
 *
 * PageFile is the on-disk part of the page_management component.
 * It knows where a page lives in the file, how to read and write it,
 * which pages are free and which named entries the file contains.
 * It never caches page data, that's the job of the buffer manager.
 *
 * File layout:
 *     | file header (PAGE_FILE_HEADER_SIZE bytes) | page 0 | page 1 | ...
 *
 * File header layout:
 *     magic(4) | page_size(4) | num_pages(4) | first_free(4) |
 *     num_free(4) | num_entries(2) | entries...
 * Every directory entry is name_len(1) | name | page_num(4).
 *
 * Disposed pages are linked together: the first 4 bytes of a free page
 * hold the page number of the next free page.
 */

use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use log::{debug, info};

use super::{PageId, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::errors::PageFileError;
use crate::utils;

pub const PAGE_FILE_HEADER_SIZE: usize = 4096;
pub const PAGE_FILE_MAGIC: u32 = 0x4152_4354;
pub const MAX_ENTRY_NAME_LEN: usize = u8::MAX as usize;

const MAGIC_OFFSET: usize = 0;
const PAGE_SIZE_OFFSET: usize = 4;
const NUM_PAGES_OFFSET: usize = 8;
const FIRST_FREE_OFFSET: usize = 12;
const NUM_FREE_OFFSET: usize = 16;
const NUM_ENTRIES_OFFSET: usize = 20;
const ENTRIES_OFFSET: usize = 22;

#[derive(Debug, Clone)]
pub struct PageFileHeader {
    page_size: usize,
    num_pages: u32,
    first_free: Option<PageId>, //the number of the first free page.
    num_free: u32,
    directory: BTreeMap<String, PageId>,
}

impl PageFileHeader {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            num_pages: 0,
            first_free: None,
            num_free: 0,
            directory: BTreeMap::new(),
        }
    }

    fn encoded_len(&self) -> usize {
        ENTRIES_OFFSET
            + self
                .directory
                .keys()
                .map(|name| 1 + name.len() + 4)
                .sum::<usize>()
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_FILE_HEADER_SIZE];
        utils::write_u32(&mut buf, MAGIC_OFFSET, PAGE_FILE_MAGIC);
        utils::write_u32(&mut buf, PAGE_SIZE_OFFSET, self.page_size as u32);
        utils::write_u32(&mut buf, NUM_PAGES_OFFSET, self.num_pages);
        utils::write_u32(&mut buf, FIRST_FREE_OFFSET, PageId::to_raw(self.first_free));
        utils::write_u32(&mut buf, NUM_FREE_OFFSET, self.num_free);
        utils::write_u16(&mut buf, NUM_ENTRIES_OFFSET, self.directory.len() as u16);
        let mut offset = ENTRIES_OFFSET;
        for (name, page) in self.directory.iter() {
            buf[offset] = name.len() as u8;
            offset += 1;
            buf[offset..offset + name.len()].copy_from_slice(name.as_bytes());
            offset += name.len();
            utils::write_u32(&mut buf, offset, page.get_page_num());
            offset += 4;
        }
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self, PageFileError> {
        let magic = utils::read_u32(buf, MAGIC_OFFSET);
        if magic != PAGE_FILE_MAGIC {
            return Err(PageFileError::BadMagic { found: magic });
        }
        let page_size = utils::read_u32(buf, PAGE_SIZE_OFFSET) as usize;
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PageFileError::InvalidPageSize(page_size));
        }
        let num_entries = utils::read_u16(buf, NUM_ENTRIES_OFFSET) as usize;
        let mut directory = BTreeMap::new();
        let mut offset = ENTRIES_OFFSET;
        for _ in 0..num_entries {
            let len = buf[offset] as usize;
            offset += 1;
            let name = String::from_utf8_lossy(&buf[offset..offset + len]).into_owned();
            offset += len;
            directory.insert(name, PageId::new(utils::read_u32(buf, offset)));
            offset += 4;
        }
        Ok(Self {
            page_size,
            num_pages: utils::read_u32(buf, NUM_PAGES_OFFSET),
            first_free: PageId::from_raw(utils::read_u32(buf, FIRST_FREE_OFFSET)),
            num_free: utils::read_u32(buf, NUM_FREE_OFFSET),
            directory,
        })
    }
}

#[derive(Debug)]
pub struct PageFile {
    fp: File,
    header: PageFileHeader,
    header_changed: bool,
    free_pages: HashSet<PageId>,
}

impl PageFile {
    pub fn create(path: &Path, page_size: usize) -> Result<Self, PageFileError> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PageFileError::InvalidPageSize(page_size));
        }
        let fp = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    PageFileError::FileExist(path.display().to_string())
                }
                _ => PageFileError::Io(e),
            })?;
        let mut pf = Self {
            fp,
            header: PageFileHeader::new(page_size),
            header_changed: true,
            free_pages: HashSet::new(),
        };
        pf.sync_header()?;
        info!("Created page file {} with page size {}", path.display(), page_size);
        Ok(pf)
    }

    pub fn open(path: &Path) -> Result<Self, PageFileError> {
        let fp = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    PageFileError::FileNotFound(path.display().to_string())
                }
                _ => PageFileError::Io(e),
            })?;
        let header = Self::read_header(&fp)?;
        let mut pf = Self {
            fp,
            header,
            header_changed: false,
            free_pages: HashSet::new(),
        };
        pf.load_free_list()?;
        debug!(
            "Opened page file {}: {} pages, {} free, {} entries",
            path.display(),
            pf.header.num_pages,
            pf.header.num_free,
            pf.header.directory.len()
        );
        Ok(pf)
    }

    fn read_header(fp: &File) -> Result<PageFileHeader, PageFileError> {
        let mut buf = vec![0u8; PAGE_FILE_HEADER_SIZE];
        let read_bytes = fp.read_at(&mut buf, 0)?;
        if read_bytes < PAGE_FILE_HEADER_SIZE {
            return Err(PageFileError::IncompleteRead(PageId::INVALID));
        }
        PageFileHeader::decode(&buf)
    }

    fn load_free_list(&mut self) -> Result<(), PageFileError> {
        let mut next = self.header.first_free;
        while let Some(page) = next {
            if page.get_page_num() >= self.header.num_pages || !self.free_pages.insert(page) {
                return Err(PageFileError::InvalidPage(page));
            }
            next = self.read_free_link(page)?;
        }
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.header.page_size
    }

    pub fn num_pages(&self) -> u32 {
        self.header.num_pages
    }

    /// Pages handed out by allocate_page and not disposed yet.
    pub fn allocated_count(&self) -> usize {
        (self.header.num_pages - self.header.num_free) as usize
    }

    fn get_page_offset(&self, page: PageId) -> u64 {
        (PAGE_FILE_HEADER_SIZE + page.get_page_num() as usize * self.header.page_size) as u64
    }

    /*
     * A page is accessible if it was allocated and is not on the
     * free list.
     */
    pub fn check_page(&self, page: PageId) -> Result<(), PageFileError> {
        if !page.is_valid() || page.get_page_num() >= self.header.num_pages {
            return Err(PageFileError::InvalidPage(page));
        }
        if self.free_pages.contains(&page) {
            return Err(PageFileError::PageFreed(page));
        }
        Ok(())
    }

    pub fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<(), PageFileError> {
        let read_bytes = self.fp.read_at(buf, self.get_page_offset(page))?;
        if read_bytes < self.header.page_size {
            return Err(PageFileError::IncompleteRead(page));
        }
        Ok(())
    }

    pub fn write_page(&self, page: PageId, buf: &[u8]) -> Result<(), PageFileError> {
        let write_bytes = self.fp.write_at(buf, self.get_page_offset(page))?;
        if write_bytes < self.header.page_size {
            return Err(PageFileError::IncompleteWrite(page));
        }
        Ok(())
    }

    fn read_free_link(&self, page: PageId) -> Result<Option<PageId>, PageFileError> {
        let mut link = [0u8; 4];
        let read_bytes = self.fp.read_at(&mut link, self.get_page_offset(page))?;
        if read_bytes < link.len() {
            return Err(PageFileError::IncompleteRead(page));
        }
        Ok(PageId::from_raw(u32::from_le_bytes(link)))
    }

    /*
     * Allocate a page in the file, reusing the head of the free list
     * if there is one. The page content is zeroed on disk.
     */
    pub fn allocate_page(&mut self) -> Result<PageId, PageFileError> {
        let page = match self.header.first_free {
            Some(page) => {
                self.header.first_free = self.read_free_link(page)?;
                self.header.num_free -= 1;
                self.free_pages.remove(&page);
                page
            }
            None => {
                let page = PageId::new(self.header.num_pages);
                self.header.num_pages += 1;
                page
            }
        };
        self.header_changed = true;
        let zeroes = vec![0u8; self.header.page_size];
        self.write_page(page, &zeroes)?;
        debug!("Allocated page {}", page);
        Ok(page)
    }

    pub fn dispose_page(&mut self, page: PageId) -> Result<(), PageFileError> {
        self.check_page(page)?;
        let link = PageId::to_raw(self.header.first_free).to_le_bytes();
        let write_bytes = self.fp.write_at(&link, self.get_page_offset(page))?;
        if write_bytes < link.len() {
            return Err(PageFileError::IncompleteWrite(page));
        }
        self.header.first_free = Some(page);
        self.header.num_free += 1;
        self.free_pages.insert(page);
        self.header_changed = true;
        debug!("Disposed page {}", page);
        Ok(())
    }

    pub fn get_file_entry(&self, name: &str) -> Option<PageId> {
        self.header.directory.get(name).copied()
    }

    pub fn add_file_entry(&mut self, name: &str, page: PageId) -> Result<(), PageFileError> {
        if self.header.directory.contains_key(name) {
            return Err(PageFileError::EntryExist(name.to_string()));
        }
        if name.len() > MAX_ENTRY_NAME_LEN
            || self.header.encoded_len() + 1 + name.len() + 4 > PAGE_FILE_HEADER_SIZE
        {
            return Err(PageFileError::DirectoryFull(name.to_string()));
        }
        self.header.directory.insert(name.to_string(), page);
        self.header_changed = true;
        Ok(())
    }

    pub fn delete_file_entry(&mut self, name: &str) -> Result<PageId, PageFileError> {
        let page = self
            .header
            .directory
            .remove(name)
            .ok_or_else(|| PageFileError::NoEntry(name.to_string()))?;
        self.header_changed = true;
        Ok(page)
    }

    pub fn sync_header(&mut self) -> Result<(), PageFileError> {
        if !self.header_changed {
            return Ok(());
        }
        let buf = self.header.encode();
        let write_bytes = self.fp.write_at(&buf, 0)?;
        if write_bytes < buf.len() {
            return Err(PageFileError::IncompleteWrite(PageId::INVALID));
        }
        self.header_changed = false;
        Ok(())
    }

    pub fn sync_all(&mut self) -> Result<(), PageFileError> {
        self.sync_header()?;
        self.fp.sync_all()?;
        Ok(())
    }
}
