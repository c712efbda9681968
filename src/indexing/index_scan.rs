/**********************************************
  > File Name		: index_scan.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Wed Apr  7 15:02:11 2021
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * IndexScan walks the leaf chain from the run start of the lower bound
 * and returns (key, RID) pairs in key order until a key exceeds the
 * upper bound or the chain ends.
 *
 * A scan holds at most one pinned leaf. The leaf is released as soon
 * as the scan moves past it, ends, or is dropped.
 */

use super::node::LeafPage;
use super::{AttrType, Key};
use crate::errors::IndexingError;
use crate::page_management::PageFileHandle;
use crate::record_management::RID;

#[derive(Debug)]
pub struct IndexScan {
    pfh: PageFileHandle,
    attr_type: AttrType,
    max_key_size: usize,
    leaf: Option<LeafPage>,
    //slot of the next entry to return on leaf.
    pos: usize,
    hi: Option<Key>,
    //the entry at pos - 1 was returned and not deleted yet.
    returned: bool,
}

impl IndexScan {
    pub(super) fn new(
        pfh: &PageFileHandle,
        attr_type: AttrType,
        max_key_size: usize,
        start: Option<(LeafPage, usize)>,
        hi: Option<Key>,
    ) -> Self {
        let (leaf, pos) = match start {
            Some((leaf, pos)) => (Some(leaf), pos),
            None => (None, 0),
        };
        Self {
            pfh: pfh.clone(),
            attr_type,
            max_key_size,
            leaf,
            pos,
            hi,
            returned: false,
        }
    }

    pub fn key_size(&self) -> usize {
        self.max_key_size
    }

    /// Ok(None) once the scan is exhausted, and from then on.
    pub fn get_next(&mut self) -> Result<Option<(Key, RID)>, IndexingError> {
        loop {
            let leaf = match self.leaf.as_ref() {
                Some(leaf) => leaf,
                None => return Ok(None),
            };

            if self.pos < leaf.num_entries() {
                let (key, rid) = leaf.get_entry(self.pos)?;
                if matches!(&self.hi, Some(hi) if key > *hi) {
                    self.finish()?;
                    return Ok(None);
                }
                self.pos += 1;
                self.returned = true;
                return Ok(Some((key, rid)));
            }

            let next = leaf.next_page();
            self.finish()?;
            if let Some(next) = next {
                self.leaf = Some(LeafPage::pin(&self.pfh, next, self.attr_type)?);
            }
        }
    }

    /*
     * Remove the entry returned by the last get_next from its leaf.
     * The scan goes on with the entry that followed it. Returns false
     * if there is nothing to delete: no entry returned yet, or it was
     * already deleted.
     */
    pub fn delete_current(&mut self) -> Result<bool, IndexingError> {
        let leaf = match self.leaf.as_mut() {
            Some(leaf) if self.returned => leaf,
            _ => return Ok(false),
        };
        self.pos -= 1;
        leaf.delete_entry(self.pos)?;
        self.returned = false;
        Ok(true)
    }

    fn finish(&mut self) -> Result<(), IndexingError> {
        self.pos = 0;
        self.returned = false;
        if let Some(leaf) = self.leaf.take() {
            leaf.release()?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<(), IndexingError> {
        self.finish()
    }
}

impl Iterator for IndexScan {
    type Item = Result<(Key, RID), IndexingError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                //the pinned leaf, if any, is released on drop.
                self.leaf = None;
                Some(Err(e))
            }
        }
    }
}
