/**********************************************
  > File Name		: mod.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time     : Wed Mar 10 07:25:33 PM CST 2021
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Records live in paged files outside of any index. An index only
 * keeps their RIDs as leaf payloads and never looks inside them.
 */

use std::fmt;

use crate::utils;

pub const RID_SIZE: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RID {
    page_num: u32,
    slot_num: u32, //slot_num represents the location of a record in a page.
}

impl RID {
    pub fn new(page_num: u32, slot_num: u32) -> Self {
        Self { page_num, slot_num }
    }

    pub fn get_page_num(&self) -> u32 {
        self.page_num
    }

    pub fn get_slot_num(&self) -> u32 {
        self.slot_num
    }

    pub fn write_to(&self, data: &mut [u8], offset: usize) {
        utils::write_u32(data, offset, self.page_num);
        utils::write_u32(data, offset + 4, self.slot_num);
    }

    pub fn read_from(data: &[u8], offset: usize) -> Self {
        Self {
            page_num: utils::read_u32(data, offset),
            slot_num: utils::read_u32(data, offset + 4),
        }
    }
}

impl fmt::Display for RID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.page_num, self.slot_num)
    }
}
