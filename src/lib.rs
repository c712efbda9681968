/**********************************************
  > File Name		: lib.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 03:56:10 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * A disk based B+ tree index.
 *
 * Layers, bottom up:
 *   page_management: paged files, buffer pool and pinned page guards.
 *   record_management: record ids, the payload of leaf entries.
 *   indexing: tree nodes, the tree itself and scans over it.
 */

#[macro_use]
mod macros;

pub mod errors;
pub mod indexing;
pub mod page_management;
pub mod record_management;
pub mod utils;

pub use errors::{IndexingError, PageFileError};
pub use indexing::{AttrType, DeletePolicy, IndexFileManager, IndexHandle, IndexScan, Key};
pub use page_management::{PageFileManager, PageFileOptions, PageId};
pub use record_management::RID;
