/**********************************************
  > File Name		: utils.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Thu 11 Mar 2021 03:54:41 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Utils functions for global usage.
 *
 * All on-disk integers are little endian. Callers are responsible
 * for keeping offsets inside the buffer, an out of range offset is
 * a layout bug and panics like any other slice index.
 */

pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&data[offset..offset + 2]);
    u16::from_le_bytes(bytes)
}

pub fn write_u16(data: &mut [u8], offset: usize, val: u16) {
    data[offset..offset + 2].copy_from_slice(&val.to_le_bytes());
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

pub fn write_u32(data: &mut [u8], offset: usize, val: u32) {
    data[offset..offset + 4].copy_from_slice(&val.to_le_bytes());
}

pub fn read_i32(data: &[u8], offset: usize) -> i32 {
    read_u32(data, offset) as i32
}

pub fn write_i32(data: &mut [u8], offset: usize, val: i32) {
    write_u32(data, offset, val as u32);
}
