/**********************************************
  > File Name		: indexing/file_manager.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue 30 Mar 2021 09:10:51 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Indexing File Manager is in charge of creating and opening indexes.
 * It uses page_management module as a client: all indexes of a page
 * file share its pages and are found by name in its directory.
 */

use log::{debug, warn};

use super::index_handle::{IndexFileHeader, IndexHandle};
use super::node::{NodeType, NODE_HEADER_SIZE, SLOT_SIZE};
use super::{AttrType, DeletePolicy, INT_KEY_LEN, MAX_STRING_LEN, STRING_LEN_PREFIX};
use crate::errors::IndexingError;
use crate::page_management::PageFileHandle;

//a leaf must hold at least this many max size entries for splits to work.
const MIN_LEAF_FANOUT: usize = 3;

#[derive(Debug)]
pub struct IndexFileManager {}

impl IndexFileManager {
    /*
     * Create an index named name. If the name is already taken, the
     * existing index is opened instead and the given attributes are
     * ignored.
     */
    pub fn create_file(
        pfh: &PageFileHandle,
        name: &str,
        attr_type: AttrType,
        attr_length: usize,
        delete_policy: DeletePolicy,
    ) -> Result<IndexHandle, IndexingError> {
        if pfh.get_file_entry(name).is_some() {
            warn!("Index {:?} already exists, opening it", name);
            return IndexHandle::open(pfh, name);
        }
        Self::check_attr_validity(pfh.page_size(), attr_type, attr_length)?;
        let header = IndexFileHeader::new(attr_type, attr_length, delete_policy);
        IndexHandle::create(pfh, name, header)
    }

    pub fn open_file(pfh: &PageFileHandle, name: &str) -> Result<IndexHandle, IndexingError> {
        IndexHandle::open(pfh, name)
    }

    fn check_attr_validity(page_size: usize, attr_type: AttrType, attr_length: usize) -> Result<(), IndexingError> {
        let invalid = IndexingError::InvalidAttr {
            attr_type,
            attr_length,
        };
        let key_length = match attr_type {
            AttrType::INT if attr_length >= INT_KEY_LEN && attr_length <= u16::MAX as usize => INT_KEY_LEN,
            AttrType::STRING
                if attr_length > STRING_LEN_PREFIX && attr_length <= MAX_STRING_LEN + STRING_LEN_PREFIX =>
            {
                attr_length
            }
            _ => return Err(invalid),
        };

        let entry = key_length + NodeType::Leaf.payload_length() + SLOT_SIZE;
        if page_size < NODE_HEADER_SIZE + MIN_LEAF_FANOUT * entry {
            debug!(
                "Page size {} can't hold {} entries of {} bytes",
                page_size, MIN_LEAF_FANOUT, entry
            );
            return Err(invalid);
        }
        Ok(())
    }
}
