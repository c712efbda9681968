/**********************************************
  > File Name		: node.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue Apr  6 10:24:27 2021
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * All indexing entries are stored in pages, while a page
 * is represented by a B+ tree node.
 * The tree nodes are divided into index nodes and leaf nodes.
 *
 * Page/Node layout:
 *     | header | slot directory -> ... free ... <- entries |
 *
 *     header: node type(1) | pad(1) | slot count(2) | free ptr(2) |
 *             pad(2) | prev page(4) | next page(4) | this page(4)
 *     slot:   entry offset(2) | entry length(2)
 *     entry:  key | payload
 *
 * Slots are kept in key order, entry bodies are packed from the end of
 * the page towards the slot directory. Deleting an entry compacts the
 * page so all free space is always between the slot directory and the
 * first entry body.
 *
 * An index node keeps its leftmost child in the prev page field, its
 * entries carry child page numbers. A leaf node keeps its siblings in
 * prev/next, its entries carry RIDs.
 */

use log::debug;

use super::{AttrType, Key};
use crate::errors::{IndexingError, PageFileError};
use crate::page_management::{PageFileHandle, PageHandle, PageId};
use crate::record_management::RID;
use crate::utils;

pub const INDEX_NODE: u8 = 11;
pub const LEAF_NODE: u8 = 12;
pub const HEADER_NODE: u8 = 13;

pub const NODE_HEADER_SIZE: usize = 20;
pub const SLOT_SIZE: usize = 4;

const TYPE_OFFSET: usize = 0;
const SLOT_CNT_OFFSET: usize = 2;
const FREE_PTR_OFFSET: usize = 4;
const PREV_PAGE_OFFSET: usize = 8;
const NEXT_PAGE_OFFSET: usize = 12;
const CUR_PAGE_OFFSET: usize = 16;

const CHILD_SIZE: usize = 4;
const RID_SIZE: usize = crate::record_management::RID_SIZE;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeType {
    Index,
    Leaf,
}

impl NodeType {
    pub fn payload_length(self) -> usize {
        match self {
            NodeType::Index => CHILD_SIZE,
            NodeType::Leaf => RID_SIZE,
        }
    }
}

/// Bytes an entry with this key takes in a node of the given type,
/// not counting its slot.
pub fn key_data_length(key: &Key, node_type: NodeType) -> usize {
    key.key_length() + node_type.payload_length()
}

/*
 * Slotted page with entries sorted by key. IndexPage and LeafPage are
 * built on it and only add the meaning of the payload and the links.
 */
#[derive(Debug)]
pub struct SortedPage {
    ph: PageHandle,
    attr_type: AttrType,
}

impl SortedPage {
    fn init(mut ph: PageHandle, tag: u8, attr_type: AttrType) -> Self {
        let page = ph.get_page_num();
        {
            let mut data = ph.get_data_mut();
            let page_size = data.len();
            data[TYPE_OFFSET] = tag;
            utils::write_u16(&mut data, SLOT_CNT_OFFSET, 0);
            utils::write_u16(&mut data, FREE_PTR_OFFSET, page_size as u16);
            utils::write_u32(&mut data, PREV_PAGE_OFFSET, PageId::INVALID.get_page_num());
            utils::write_u32(&mut data, NEXT_PAGE_OFFSET, PageId::INVALID.get_page_num());
            utils::write_u32(&mut data, CUR_PAGE_OFFSET, page.get_page_num());
        }
        Self { ph, attr_type }
    }

    fn open(ph: PageHandle, attr_type: AttrType) -> Self {
        Self { ph, attr_type }
    }

    pub fn page_id(&self) -> PageId {
        self.ph.get_page_num()
    }

    pub fn node_tag(&self) -> u8 {
        self.ph.get_data()[TYPE_OFFSET]
    }

    pub fn num_slots(&self) -> usize {
        utils::read_u16(&self.ph.get_data(), SLOT_CNT_OFFSET) as usize
    }

    fn free_ptr(&self) -> usize {
        utils::read_u16(&self.ph.get_data(), FREE_PTR_OFFSET) as usize
    }

    /// Bytes between the slot directory and the first entry body.
    pub fn free_space(&self) -> usize {
        self.free_ptr() - (NODE_HEADER_SIZE + self.num_slots() * SLOT_SIZE)
    }

    /// Largest entry that can still be inserted, its slot accounted for.
    pub fn available_space(&self) -> usize {
        self.free_space().saturating_sub(SLOT_SIZE)
    }

    fn slot(&self, i: usize) -> Result<(usize, usize), PageFileError> {
        if i >= self.num_slots() {
            return Err(PageFileError::OutOfIndex {
                page: self.page_id(),
                slot: i,
            });
        }
        let data = self.ph.get_data();
        let pos = NODE_HEADER_SIZE + i * SLOT_SIZE;
        Ok((
            utils::read_u16(&data, pos) as usize,
            utils::read_u16(&data, pos + 2) as usize,
        ))
    }

    pub fn slot_length(&self, i: usize) -> Result<usize, PageFileError> {
        Ok(self.slot(i)?.1)
    }

    pub fn get_key(&self, i: usize) -> Result<Key, PageFileError> {
        let (offset, len) = self.slot(i)?;
        let data = self.ph.get_data();
        Ok(Key::decode(self.attr_type, &data[offset..offset + len]))
    }

    /// Offset of the payload of entry i, payloads sit at the entry end.
    fn payload_offset(&self, i: usize, payload_len: usize) -> Result<usize, PageFileError> {
        let (offset, len) = self.slot(i)?;
        Ok(offset + len - payload_len)
    }

    /*
     * Position of the first slot whose key is greater than key.
     * Inserting there keeps equal keys in their arrival order.
     */
    fn upper_bound(&self, key: &Key) -> Result<usize, PageFileError> {
        let (mut lo, mut hi) = (0, self.num_slots());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.get_key(mid)? <= *key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    fn insert_slot(&mut self, pos: usize, entry: &[u8]) -> Result<(), PageFileError> {
        let page = self.page_id();
        let available = self.available_space();
        if entry.len() > available {
            return Err(PageFileError::NoSpace {
                page,
                needed: entry.len(),
                available,
            });
        }
        let n = self.num_slots();
        if pos > n {
            return Err(PageFileError::OutOfIndex { page, slot: pos });
        }
        let free_ptr = self.free_ptr();
        let offset = free_ptr - entry.len();

        let mut data = self.ph.get_data_mut();
        data[offset..free_ptr].copy_from_slice(entry);
        let start = NODE_HEADER_SIZE + pos * SLOT_SIZE;
        let end = NODE_HEADER_SIZE + n * SLOT_SIZE;
        data.copy_within(start..end, start + SLOT_SIZE);
        utils::write_u16(&mut data, start, offset as u16);
        utils::write_u16(&mut data, start + 2, entry.len() as u16);
        utils::write_u16(&mut data, SLOT_CNT_OFFSET, (n + 1) as u16);
        utils::write_u16(&mut data, FREE_PTR_OFFSET, offset as u16);
        Ok(())
    }

    fn delete_slot(&mut self, pos: usize) -> Result<(), PageFileError> {
        let (offset, len) = self.slot(pos)?;
        let n = self.num_slots();
        let free_ptr = self.free_ptr();

        let mut data = self.ph.get_data_mut();
        data.copy_within(free_ptr..offset, free_ptr + len);
        for i in 0..n {
            let at = NODE_HEADER_SIZE + i * SLOT_SIZE;
            let slot_offset = utils::read_u16(&data, at) as usize;
            if i != pos && slot_offset < offset {
                utils::write_u16(&mut data, at, (slot_offset + len) as u16);
            }
        }
        let start = NODE_HEADER_SIZE + pos * SLOT_SIZE;
        let end = NODE_HEADER_SIZE + n * SLOT_SIZE;
        data.copy_within(start + SLOT_SIZE..end, start);
        utils::write_u16(&mut data, SLOT_CNT_OFFSET, (n - 1) as u16);
        utils::write_u16(&mut data, FREE_PTR_OFFSET, (free_ptr + len) as u16);
        Ok(())
    }

    fn get_link(&self, offset: usize) -> Option<PageId> {
        PageId::from_raw(utils::read_u32(&self.ph.get_data(), offset))
    }

    fn set_link(&mut self, offset: usize, link: Option<PageId>) {
        utils::write_u32(&mut self.ph.get_data_mut(), offset, PageId::to_raw(link));
    }

    fn encode_entry(key: &Key, payload_len: usize) -> Vec<u8> {
        let mut entry = vec![0u8; key.key_length() + payload_len];
        key.encode(&mut entry);
        entry
    }

    pub fn is_dirty(&self) -> bool {
        self.ph.is_dirty()
    }

    pub fn release(self) -> Result<(), PageFileError> {
        self.ph.release()
    }
}

/*
 * Index node: a leftmost child plus (separator key, child) entries.
 * Keys under an entry's child are >= its separator, keys under the
 * leftmost child are < the first separator.
 */
#[derive(Debug)]
pub struct IndexPage {
    page: SortedPage,
}

impl IndexPage {
    pub fn init(ph: PageHandle, attr_type: AttrType) -> Self {
        Self {
            page: SortedPage::init(ph, INDEX_NODE, attr_type),
        }
    }

    pub fn pin(pfh: &PageFileHandle, page: PageId, attr_type: AttrType) -> Result<Self, IndexingError> {
        match Node::pin(pfh, page, attr_type)? {
            Node::Index(index) => Ok(index),
            Node::Leaf(_) => Err(IndexingError::MalformedNode { page, tag: LEAF_NODE }),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn num_entries(&self) -> usize {
        self.page.num_slots()
    }

    pub fn available_space(&self) -> usize {
        self.page.available_space()
    }

    pub fn slot_length(&self, i: usize) -> Result<usize, PageFileError> {
        self.page.slot_length(i)
    }

    pub fn get_left_link(&self) -> PageId {
        self.page
            .get_link(PREV_PAGE_OFFSET)
            .unwrap_or(PageId::INVALID)
    }

    pub fn set_left_link(&mut self, child: PageId) {
        self.page.set_link(PREV_PAGE_OFFSET, Some(child));
    }

    pub fn get_key(&self, i: usize) -> Result<Key, PageFileError> {
        self.page.get_key(i)
    }

    pub fn get_entry(&self, i: usize) -> Result<(Key, PageId), PageFileError> {
        let key = self.page.get_key(i)?;
        let offset = self.page.payload_offset(i, CHILD_SIZE)?;
        let child = utils::read_u32(&self.page.ph.get_data(), offset);
        Ok((key, PageId::new(child)))
    }

    pub fn last_entry(&self) -> Result<Option<(Key, PageId)>, PageFileError> {
        match self.num_entries() {
            0 => Ok(None),
            n => self.get_entry(n - 1).map(Some),
        }
    }

    pub fn insert_key(&mut self, key: &Key, child: PageId) -> Result<(), PageFileError> {
        let mut entry = SortedPage::encode_entry(key, CHILD_SIZE);
        let at = key.key_length();
        utils::write_u32(&mut entry, at, child.get_page_num());
        let pos = self.page.upper_bound(key)?;
        self.page.insert_slot(pos, &entry)
    }

    /// Insert at slot pos, ahead of any equal separators behind it.
    pub fn insert_key_at(&mut self, pos: usize, key: &Key, child: PageId) -> Result<(), PageFileError> {
        let mut entry = SortedPage::encode_entry(key, CHILD_SIZE);
        utils::write_u32(&mut entry, key.key_length(), child.get_page_num());
        self.page.insert_slot(pos, &entry)
    }

    pub fn delete_entry(&mut self, i: usize) -> Result<(), PageFileError> {
        self.page.delete_slot(i)
    }

    /*
     * Child whose key range contains key: the last entry whose
     * separator is <= key, or the leftmost child if there is none.
     */
    pub fn get_page_no_by_key(&self, key: &Key) -> Result<PageId, PageFileError> {
        let pos = self.page.upper_bound(key)?;
        if pos == 0 {
            Ok(self.get_left_link())
        } else {
            Ok(self.get_entry(pos - 1)?.1)
        }
    }

    /// Leftmost child followed by every entry's child, in key order.
    pub fn children(&self) -> Result<Vec<PageId>, PageFileError> {
        let mut children = Vec::with_capacity(self.num_entries() + 1);
        children.push(self.get_left_link());
        for i in 0..self.num_entries() {
            children.push(self.get_entry(i)?.1);
        }
        Ok(children)
    }

    pub fn is_dirty(&self) -> bool {
        self.page.is_dirty()
    }

    pub fn release(self) -> Result<(), PageFileError> {
        self.page.release()
    }
}

/*
 * Leaf node: (key, RID) entries sorted by key, duplicates allowed, and
 * links to the previous and next leaf.
 */
#[derive(Debug)]
pub struct LeafPage {
    page: SortedPage,
}

impl LeafPage {
    /// A fresh leaf has no siblings.
    pub fn init(ph: PageHandle, attr_type: AttrType) -> Self {
        Self {
            page: SortedPage::init(ph, LEAF_NODE, attr_type),
        }
    }

    pub fn pin(pfh: &PageFileHandle, page: PageId, attr_type: AttrType) -> Result<Self, IndexingError> {
        match Node::pin(pfh, page, attr_type)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Index(_) => Err(IndexingError::MalformedNode { page, tag: INDEX_NODE }),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn num_entries(&self) -> usize {
        self.page.num_slots()
    }

    pub fn available_space(&self) -> usize {
        self.page.available_space()
    }

    pub fn prev_page(&self) -> Option<PageId> {
        self.page.get_link(PREV_PAGE_OFFSET)
    }

    pub fn set_prev_page(&mut self, page: Option<PageId>) {
        self.page.set_link(PREV_PAGE_OFFSET, page);
    }

    pub fn next_page(&self) -> Option<PageId> {
        self.page.get_link(NEXT_PAGE_OFFSET)
    }

    pub fn set_next_page(&mut self, page: Option<PageId>) {
        self.page.set_link(NEXT_PAGE_OFFSET, page);
    }

    pub fn get_key(&self, i: usize) -> Result<Key, PageFileError> {
        self.page.get_key(i)
    }

    pub fn get_entry(&self, i: usize) -> Result<(Key, RID), PageFileError> {
        let key = self.page.get_key(i)?;
        let offset = self.page.payload_offset(i, RID_SIZE)?;
        let rid = RID::read_from(&self.page.ph.get_data(), offset);
        Ok((key, rid))
    }

    fn encode(key: &Key, rid: &RID) -> Vec<u8> {
        let mut entry = SortedPage::encode_entry(key, RID_SIZE);
        rid.write_to(&mut entry, key.key_length());
        entry
    }

    /// Inserted after any entries with an equal key.
    pub fn insert_record(&mut self, key: &Key, rid: &RID) -> Result<(), PageFileError> {
        let pos = self.page.upper_bound(key)?;
        self.page.insert_slot(pos, &Self::encode(key, rid))
    }

    /*
     * Insert at a given slot. The caller guarantees the key fits
     * there in order, this is used to put an entry back in front of
     * its equal keys.
     */
    pub fn insert_record_at(&mut self, pos: usize, key: &Key, rid: &RID) -> Result<(), PageFileError> {
        self.page.insert_slot(pos, &Self::encode(key, rid))
    }

    pub fn delete_entry(&mut self, i: usize) -> Result<(), PageFileError> {
        self.page.delete_slot(i)
    }

    /*
     * Delete the entry matching both key and rid, returns whether
     * one was found. The page is left untouched otherwise.
     */
    pub fn del_entry(&mut self, key: &Key, rid: &RID) -> Result<bool, PageFileError> {
        for i in 0..self.num_entries() {
            let (k, r) = self.get_entry(i)?;
            if k == *key && r == *rid {
                self.page.delete_slot(i)?;
                debug!("Deleted ({}, {}) from leaf {}", key, rid, self.page_id());
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn entries(&self) -> Result<Vec<(Key, RID)>, PageFileError> {
        (0..self.num_entries()).map(|i| self.get_entry(i)).collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.page.is_dirty()
    }

    pub fn release(self) -> Result<(), PageFileError> {
        self.page.release()
    }
}

/*
 * A pinned tree node, kind decided once from the tag on its page.
 */
#[derive(Debug)]
pub enum Node {
    Index(IndexPage),
    Leaf(LeafPage),
}

impl Node {
    pub fn from_page(ph: PageHandle, attr_type: AttrType) -> Result<Self, IndexingError> {
        let page = SortedPage::open(ph, attr_type);
        match page.node_tag() {
            INDEX_NODE => Ok(Node::Index(IndexPage { page })),
            LEAF_NODE => Ok(Node::Leaf(LeafPage { page })),
            tag => Err(IndexingError::MalformedNode {
                page: page.page_id(),
                tag,
            }),
        }
    }

    pub fn pin(pfh: &PageFileHandle, page: PageId, attr_type: AttrType) -> Result<Self, IndexingError> {
        Self::from_page(pfh.get_page(page)?, attr_type)
    }

    pub fn page_id(&self) -> PageId {
        match self {
            Node::Index(index) => index.page_id(),
            Node::Leaf(leaf) => leaf.page_id(),
        }
    }

    pub fn release(self) -> Result<(), PageFileError> {
        match self {
            Node::Index(index) => index.release(),
            Node::Leaf(leaf) => leaf.release(),
        }
    }
}
