/**********************************************
  > File Name		: index_handle.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue Apr  6 10:24:27 2021
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * An IndexHandle is an open B+ tree.
 *
 * Every tree has a header page, registered in the page file directory
 * under the tree name. The header keeps the root page, the key type,
 * the max key size and the delete policy. An empty tree has no root.
 *
 * Entry Insertion:
 *  parameters:
 *    key, RID associated with the key.
 *  steps:
 *    1. If the tree is empty, allocate a leaf, insert into it and make
 *       it the root.
 *    2. Otherwise insert into the root recursively. If the root splits,
 *       allocate a new index root whose left link is the old root and
 *       whose only entry points to the new sibling. This is the only
 *       way the tree grows in depth.
 *
 * Insert Into a Node:
 *  If it's an index node, find the child whose range contains the key,
 *  release the node and recurse. If the child did not split we are
 *  done. Otherwise pin the node again and insert the promoted entry,
 *  splitting the node if it has no room.
 *  If it's a leaf node, insert if it fits, split otherwise.
 *
 * Node Split:
 *  Both kinds of split move every entry of the full node to a new node,
 *  then move entries back from the front of the new node until both
 *  halves have about the same free space.
 *    Leaf: the new leaf is linked right after the old one. If the
 *      incoming key is greater than the last moved entry and the old
 *      leaf ended up with less free space, the last move is undone.
 *      The incoming record goes to the new leaf if its key is >= the
 *      last moved key, to the old leaf otherwise. The first key of the
 *      new leaf is promoted.
 *    Index: the last move is undone if it left the old node with less
 *      free space. The promoted entry goes to the new node if its key is
 *      >= the last key of the old node. Otherwise it goes to the old
 *      node and the old node's last entry moves to the front of the new
 *      node. Both the undo and that move insert at slot 0. The
 *      first entry of the new node is then taken out: its key goes up,
 *      its child becomes the new node's left link.
 *
 * Entry Deletion:
 *  Only naive deletion: find the leftmost run of the key, walk the leaf
 *  chain and remove the first entry matching both key and RID. Pages
 *  are never merged or freed, an underfull leaf stays where it is.
 */

use log::{debug, info};

use super::node::{key_data_length, IndexPage, LeafPage, Node, NodeType, HEADER_NODE};
use super::trace::{TraceEvent, TraceSink};
use super::{AttrType, DeletePolicy, IndexScan, Key};
use crate::errors::IndexingError;
use crate::page_management::{PageFileHandle, PageId};
use crate::record_management::RID;
use crate::utils;

pub const INDEX_MAGIC: u32 = 1989;

const TAG_OFFSET: usize = 0;
const MAGIC_OFFSET: usize = 4;
const ROOT_OFFSET: usize = 8;
const KEY_TYPE_OFFSET: usize = 12;
const DELETE_POLICY_OFFSET: usize = 13;
const MAX_KEY_SIZE_OFFSET: usize = 14;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IndexFileHeader {
    pub root: Option<PageId>,
    pub key_type: AttrType,
    pub max_key_size: usize,
    //kept raw, a policy this crate can't run still opens fine.
    pub delete_policy: u8,
}

impl IndexFileHeader {
    pub fn new(key_type: AttrType, max_key_size: usize, delete_policy: DeletePolicy) -> Self {
        Self {
            root: None,
            key_type,
            max_key_size,
            delete_policy: delete_policy.to_u8(),
        }
    }

    pub fn read_from(data: &[u8], page: PageId) -> Result<Self, IndexingError> {
        let tag = data[TAG_OFFSET];
        if tag != HEADER_NODE || utils::read_u32(data, MAGIC_OFFSET) != INDEX_MAGIC {
            return Err(IndexingError::MalformedNode { page, tag });
        }
        let key_type = AttrType::from_u8(data[KEY_TYPE_OFFSET]).ok_or(IndexingError::MalformedNode {
            page,
            tag: data[KEY_TYPE_OFFSET],
        })?;
        Ok(Self {
            root: PageId::from_raw(utils::read_u32(data, ROOT_OFFSET)),
            key_type,
            max_key_size: utils::read_u16(data, MAX_KEY_SIZE_OFFSET) as usize,
            delete_policy: data[DELETE_POLICY_OFFSET],
        })
    }

    pub fn write_to(&self, data: &mut [u8]) {
        data[TAG_OFFSET] = HEADER_NODE;
        utils::write_u32(data, MAGIC_OFFSET, INDEX_MAGIC);
        utils::write_u32(data, ROOT_OFFSET, PageId::to_raw(self.root));
        data[KEY_TYPE_OFFSET] = self.key_type.to_u8();
        data[DELETE_POLICY_OFFSET] = self.delete_policy;
        utils::write_u16(data, MAX_KEY_SIZE_OFFSET, self.max_key_size as u16);
    }
}

/// What an insert into a subtree hands back to its parent.
#[derive(Debug)]
pub enum SplitResult {
    NoSplit,
    Split { separator: Key, new_sibling: PageId },
}

pub struct IndexHandle {
    name: String,
    header: IndexFileHeader,
    header_page: PageId,
    pfh: PageFileHandle,
    trace: Option<Box<dyn TraceSink>>,
}

impl IndexHandle {
    /*
     * Allocate and write the header page of a new empty tree, then
     * register it under name.
     */
    pub(super) fn create(pfh: &PageFileHandle, name: &str, header: IndexFileHeader) -> Result<Self, IndexingError> {
        let mut ph = pfh.allocate_page()?;
        header.write_to(&mut ph.get_data_mut());
        let header_page = ph.get_page_num();
        ph.release()?;
        if let Err(e) = pfh.add_file_entry(name, header_page) {
            pfh.dispose_page(header_page)?;
            return Err(e.into());
        }
        info!("Created index {:?} with header page {}", name, header_page);
        Ok(Self::new(pfh, name, header, header_page))
    }

    pub(super) fn open(pfh: &PageFileHandle, name: &str) -> Result<Self, IndexingError> {
        let header_page = pfh
            .get_file_entry(name)
            .ok_or_else(|| IndexingError::NotFound(name.to_string()))?;
        let ph = pfh.get_page(header_page)?;
        let header = IndexFileHeader::read_from(&ph.get_data(), header_page)?;
        ph.release()?;
        debug!("Opened index {:?}: {:?}", name, header);
        Ok(Self::new(pfh, name, header, header_page))
    }

    fn new(pfh: &PageFileHandle, name: &str, header: IndexFileHeader, header_page: PageId) -> Self {
        Self {
            name: name.to_string(),
            header,
            header_page,
            pfh: pfh.clone(),
            trace: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &IndexFileHeader {
        &self.header
    }

    pub fn root_page(&self) -> Option<PageId> {
        self.header.root
    }

    pub fn key_type(&self) -> AttrType {
        self.header.key_type
    }

    pub fn attach_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    pub fn detach_trace(&mut self) -> Option<Box<dyn TraceSink>> {
        self.trace.take()
    }

    fn check_key_type(&self, key: &Key) -> Result<(), IndexingError> {
        if key.attr_type() != self.header.key_type {
            return Err(IndexingError::KeyTypeMismatch {
                expected: self.header.key_type,
                found: key.attr_type(),
            });
        }
        Ok(())
    }

    fn check_key(&self, key: &Key) -> Result<(), IndexingError> {
        self.check_key_type(key)?;
        if key.key_length() > self.header.max_key_size {
            return Err(IndexingError::KeySizeExceeded {
                size: key.key_length(),
                max: self.header.max_key_size,
            });
        }
        Ok(())
    }

    /// Write-through: the header page always matches the cached header.
    fn update_header(&mut self, root: Option<PageId>) -> Result<(), IndexingError> {
        self.header.root = root;
        let mut ph = self.pfh.get_page(self.header_page)?;
        self.header.write_to(&mut ph.get_data_mut());
        ph.release()?;
        debug!("Index {:?} root is now {:?}", self.name, root);
        Ok(())
    }

    pub fn insert_entry(&mut self, key: &Key, rid: &RID) -> Result<(), IndexingError> {
        self.check_key(key)?;
        trace_event!(self.trace, TraceEvent::Insert { key: key.clone(), rid: *rid });

        let kt = self.header.key_type;
        let root = match self.header.root {
            Some(root) => root,
            None => {
                let mut leaf = LeafPage::init(self.pfh.allocate_page()?, kt);
                leaf.insert_record(key, rid)?;
                let page = leaf.page_id();
                leaf.release()?;
                return self.update_header(Some(page));
            }
        };

        if let SplitResult::Split { separator, new_sibling } = self.insert_into(root, key, rid)? {
            let mut new_root = IndexPage::init(self.pfh.allocate_page()?, kt);
            new_root.set_left_link(root);
            new_root.insert_key(&separator, new_sibling)?;
            let page = new_root.page_id();
            new_root.release()?;
            self.update_header(Some(page))?;
            info!(
                "Index {:?} grew a new root {} over {} and {}",
                self.name, page, root, new_sibling
            );
            self.trace_children(page)?;
        }
        Ok(())
    }

    fn insert_into(&mut self, page: PageId, key: &Key, rid: &RID) -> Result<SplitResult, IndexingError> {
        let kt = self.header.key_type;
        match Node::pin(&self.pfh, page, kt)? {
            Node::Index(index) => {
                let child = index.get_page_no_by_key(key)?;
                index.release()?;

                let (separator, new_child) = match self.insert_into(child, key, rid)? {
                    SplitResult::NoSplit => return Ok(SplitResult::NoSplit),
                    SplitResult::Split { separator, new_sibling } => (separator, new_sibling),
                };

                let mut index = IndexPage::pin(&self.pfh, page, kt)?;
                if index.available_space() >= key_data_length(&separator, NodeType::Index) {
                    index.insert_key(&separator, new_child)?;
                    index.release()?;
                    return Ok(SplitResult::NoSplit);
                }
                self.split_index(index, separator, new_child)
            }
            Node::Leaf(mut leaf) => {
                if leaf.available_space() >= key_data_length(key, NodeType::Leaf) {
                    leaf.insert_record(key, rid)?;
                    leaf.release()?;
                    return Ok(SplitResult::NoSplit);
                }
                self.split_leaf(leaf, key, rid)
            }
        }
    }

    fn split_leaf(&mut self, mut cur: LeafPage, key: &Key, rid: &RID) -> Result<SplitResult, IndexingError> {
        let kt = self.header.key_type;
        let mut new = LeafPage::init(self.pfh.allocate_page()?, kt);
        let (cur_id, new_id) = (cur.page_id(), new.page_id());

        let right = cur.next_page();
        new.set_next_page(right);
        new.set_prev_page(Some(cur_id));
        cur.set_next_page(Some(new_id));
        if let Some(right) = right {
            let mut right_leaf = LeafPage::pin(&self.pfh, right, kt)?;
            right_leaf.set_prev_page(Some(new_id));
            right_leaf.release()?;
        }

        while cur.num_entries() > 0 {
            let (k, r) = cur.get_entry(0)?;
            new.insert_record(&k, &r)?;
            cur.delete_entry(0)?;
        }

        let mut last_moved = None;
        while new.available_space() < cur.available_space() {
            let (k, r) = new.get_entry(0)?;
            cur.insert_record(&k, &r)?;
            new.delete_entry(0)?;
            last_moved = Some((k, r));
        }

        let to_new = match &last_moved {
            Some((undo_key, undo_rid)) => {
                if key > undo_key && cur.available_space() < new.available_space() {
                    new.insert_record_at(0, undo_key, undo_rid)?;
                    cur.delete_entry(cur.num_entries() - 1)?;
                }
                key >= undo_key
            }
            None => false,
        };
        if to_new {
            new.insert_record(key, rid)?;
        } else {
            cur.insert_record(key, rid)?;
        }

        debug!(
            "Split leaf {} ({} entries) and {} ({} entries)",
            cur_id,
            cur.num_entries(),
            new_id,
            new.num_entries()
        );
        cur.release()?;
        let separator = new.get_key(0)?;
        new.release()?;

        self.trace_children(cur_id)?;
        self.trace_children(new_id)?;
        Ok(SplitResult::Split {
            separator,
            new_sibling: new_id,
        })
    }

    fn split_index(&mut self, mut cur: IndexPage, up_key: Key, up_child: PageId) -> Result<SplitResult, IndexingError> {
        let mut new = IndexPage::init(self.pfh.allocate_page()?, self.header.key_type);
        let (cur_id, new_id) = (cur.page_id(), new.page_id());

        while cur.num_entries() > 0 {
            let (k, child) = cur.get_entry(0)?;
            new.insert_key(&k, child)?;
            cur.delete_entry(0)?;
        }

        let mut last_moved = None;
        while cur.available_space() > new.available_space() {
            let (k, child) = new.get_entry(0)?;
            cur.insert_key(&k, child)?;
            new.delete_entry(0)?;
            last_moved = Some((k, child));
        }
        if let Some((k, child)) = &last_moved {
            if cur.available_space() < new.available_space() {
                new.insert_key_at(0, k, *child)?;
                cur.delete_entry(cur.num_entries() - 1)?;
            }
        }

        let to_new = match cur.last_entry()? {
            Some((last_key, _)) => up_key >= last_key,
            None => true,
        };
        if to_new {
            new.insert_key(&up_key, up_child)?;
        } else {
            cur.insert_key(&up_key, up_child)?;
            let last = cur.num_entries() - 1;
            let (k, child) = cur.get_entry(last)?;
            new.insert_key_at(0, &k, child)?;
            cur.delete_entry(last)?;
        }
        cur.release()?;

        let (separator, left_link) = new.get_entry(0)?;
        new.set_left_link(left_link);
        new.delete_entry(0)?;
        debug!(
            "Split index {} and {}, promoting {}",
            cur_id, new_id, separator
        );
        new.release()?;

        self.trace_children(cur_id)?;
        self.trace_children(new_id)?;
        Ok(SplitResult::Split {
            separator,
            new_sibling: new_id,
        })
    }

    /*
     * Leaf and slot of the first entry with key >= lo, or of the very
     * first entry when lo is None. Duplicates are found from their
     * leftmost occurrence on: index nodes go left on ties.
     *
     * The returned leaf is pinned, the caller releases it. None means
     * no such entry, nothing stays pinned then.
     */
    pub(super) fn find_run_start(&mut self, lo: Option<&Key>) -> Result<Option<(LeafPage, usize)>, IndexingError> {
        let kt = self.header.key_type;
        let mut page = match self.header.root {
            Some(root) => root,
            None => return Ok(None),
        };
        trace_event!(self.trace, TraceEvent::Visit { page });

        let mut leaf = loop {
            let index = match Node::pin(&self.pfh, page, kt)? {
                Node::Leaf(leaf) => break leaf,
                Node::Index(index) => index,
            };
            let mut child = index.get_left_link();
            if let Some(lo) = lo {
                for i in 0..index.num_entries() {
                    let (sep, next) = index.get_entry(i)?;
                    if sep >= *lo {
                        break;
                    }
                    child = next;
                }
            }
            index.release()?;
            page = child;
            trace_event!(self.trace, TraceEvent::Visit { page });
        };

        let mut pos = 0;
        loop {
            if pos < leaf.num_entries() {
                let below = match lo {
                    Some(lo) => leaf.get_key(pos)? < *lo,
                    None => false,
                };
                if !below {
                    return Ok(Some((leaf, pos)));
                }
                pos += 1;
                continue;
            }
            let next = leaf.next_page();
            leaf.release()?;
            leaf = match next {
                Some(next) => LeafPage::pin(&self.pfh, next, kt)?,
                None => return Ok(None),
            };
            pos = 0;
        }
    }

    /*
     * Remove the entry matching both key and rid.
     * Returns false when there is no such entry.
     */
    pub fn delete_entry(&mut self, key: &Key, rid: &RID) -> Result<bool, IndexingError> {
        if DeletePolicy::from_u8(self.header.delete_policy) != Some(DeletePolicy::Naive) {
            return Err(IndexingError::UnsupportedDeletePolicy(self.header.delete_policy));
        }
        self.check_key_type(key)?;
        //a key too long to insert can't be in the tree.
        if key.key_length() > self.header.max_key_size {
            return Ok(false);
        }
        self.naive_delete(key, rid)
    }

    fn naive_delete(&mut self, key: &Key, rid: &RID) -> Result<bool, IndexingError> {
        let kt = self.header.key_type;
        let (mut leaf, mut pos) = match self.find_run_start(Some(key))? {
            Some(start) => start,
            None => return Ok(false),
        };

        loop {
            if pos < leaf.num_entries() {
                if leaf.get_key(pos)? > *key {
                    leaf.release()?;
                    return Ok(false);
                }
                if leaf.del_entry(key, rid)? {
                    leaf.release()?;
                    debug!("Deleted ({}, {}) from index {:?}", key, rid, self.name);
                    return Ok(true);
                }
            }
            let next = leaf.next_page();
            leaf.release()?;
            leaf = match next {
                Some(next) => LeafPage::pin(&self.pfh, next, kt)?,
                None => return Ok(false),
            };
            pos = 0;
        }
    }

    /*
     * Scan entries with lo <= key <= hi in key order. A missing bound
     * leaves that side open, lo == hi finds every duplicate of a key.
     */
    pub fn scan(&mut self, lo: Option<&Key>, hi: Option<&Key>) -> Result<IndexScan, IndexingError> {
        for key in lo.iter().chain(hi.iter()) {
            self.check_key_type(key)?;
        }
        let start = self.find_run_start(lo)?;
        Ok(IndexScan::new(
            &self.pfh,
            self.header.key_type,
            self.header.max_key_size,
            start,
            hi.cloned(),
        ))
    }

    /// Number of levels, 0 for an empty tree.
    pub fn depth(&self) -> Result<usize, IndexingError> {
        let mut page = match self.header.root {
            Some(root) => root,
            None => return Ok(0),
        };
        let mut depth = 1;
        loop {
            match Node::pin(&self.pfh, page, self.header.key_type)? {
                Node::Leaf(leaf) => {
                    leaf.release()?;
                    return Ok(depth);
                }
                Node::Index(index) => {
                    page = index.get_left_link();
                    index.release()?;
                    depth += 1;
                }
            }
        }
    }

    /// Log every node of the tree at debug level, parents first.
    pub fn dump_tree(&self) -> Result<(), IndexingError> {
        match self.header.root {
            Some(root) => self.dump_node(root, 0),
            None => {
                debug!("Index {:?} is empty", self.name);
                Ok(())
            }
        }
    }

    fn dump_node(&self, page: PageId, level: usize) -> Result<(), IndexingError> {
        let children = match Node::pin(&self.pfh, page, self.header.key_type)? {
            Node::Index(index) => {
                let mut line = format!("{}", index.get_left_link());
                for i in 0..index.num_entries() {
                    let (k, child) = index.get_entry(i)?;
                    line.push_str(&format!(" <{}> {}", k, child));
                }
                debug!("{:indent$}index {}: {}", "", page, line, indent = level * 2);
                let children = index.children()?;
                index.release()?;
                children
            }
            Node::Leaf(leaf) => {
                let entries: Vec<String> = leaf
                    .entries()?
                    .iter()
                    .map(|(k, rid)| format!("{}{}", k, rid))
                    .collect();
                debug!(
                    "{:indent$}leaf {} (prev {:?}, next {:?}): {}",
                    "",
                    page,
                    leaf.prev_page(),
                    leaf.next_page(),
                    entries.join(" "),
                    indent = level * 2
                );
                leaf.release()?;
                Vec::new()
            }
        };
        for child in children {
            self.dump_node(child, level + 1)?;
        }
        Ok(())
    }

    fn trace_children(&mut self, page: PageId) -> Result<(), IndexingError> {
        if self.trace.is_none() {
            return Ok(());
        }
        let event = match Node::pin(&self.pfh, page, self.header.key_type)? {
            Node::Index(index) => {
                let event = TraceEvent::IndexChildren {
                    page,
                    left_link: index.get_left_link(),
                    children: index.children()?.split_off(1),
                };
                index.release()?;
                event
            }
            Node::Leaf(leaf) => {
                let event = TraceEvent::LeafChildren {
                    page,
                    entries: leaf.entries()?,
                };
                leaf.release()?;
                event
            }
        };
        trace_event!(self.trace, event);
        Ok(())
    }

    /*
     * Free every page of the tree, children before parents, then the
     * header page, and forget the name.
     */
    pub fn destroy(self) -> Result<(), IndexingError> {
        if let Some(root) = self.header.root {
            self.free_subtree(root)?;
        }
        self.pfh.dispose_page(self.header_page)?;
        self.pfh.delete_file_entry(&self.name)?;
        info!("Destroyed index {:?}", self.name);
        Ok(())
    }

    fn free_subtree(&self, page: PageId) -> Result<(), IndexingError> {
        let children = match Node::pin(&self.pfh, page, self.header.key_type)? {
            Node::Index(index) => {
                let children = index.children()?;
                index.release()?;
                children
            }
            Node::Leaf(leaf) => {
                leaf.release()?;
                Vec::new()
            }
        };
        for child in children {
            self.free_subtree(child)?;
        }
        self.pfh.dispose_page(page)?;
        Ok(())
    }

    /// Write back every dirty page of the file.
    pub fn close(self) -> Result<(), IndexingError> {
        self.pfh.flush_pages()?;
        debug!("Closed index {:?}", self.name);
        Ok(())
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("header_page", &self.header_page)
            .field("tracing", &self.trace.is_some())
            .finish()
    }
}
