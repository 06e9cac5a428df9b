//! Ogg 页面模型.
//!
//! # Ogg 页面结构
//! ```text
//! "OggS" (4 bytes)
//! Version (1 byte = 0)
//! Header Type (1 byte): 0x01=续包, 0x02=BOS, 0x04=EOS
//! Granule Position (8 bytes, LE)
//! Serial Number (4 bytes, LE)
//! Page Sequence (4 bytes, LE)
//! CRC Checksum (4 bytes, LE)
//! Num Segments (1 byte)
//! Segment Table (N bytes)
//! Page Data
//! ```

use std::io::Write;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use pcmogg_core::crc::ogg_crc32;
use pcmogg_core::{PcmOggError, PcmOggResult};

/// Ogg 同步字 (capture pattern)
pub const OGG_CAPTURE: &[u8; 4] = b"OggS";
/// 页头固定部分长度 (不含段表)
pub const PAGE_HEADER_LEN: usize = 27;
/// 每页最多段数
pub const MAX_SEGMENTS: usize = 255;
/// 单段最大字节数
pub const MAX_LACING: usize = 255;
/// 每页最大数据量
pub const MAX_PAGE_BODY: usize = MAX_SEGMENTS * MAX_LACING;
/// CRC 字段在页头中的偏移
const CRC_OFFSET: usize = 22;

bitflags! {
    /// 页面头部标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// 首个数据片段是上一页未完成包的延续
        const CONTINUED = 0x01;
        /// 逻辑流的第一页 (BOS)
        const FIRST     = 0x02;
        /// 逻辑流的最后一页 (EOS)
        const LAST      = 0x04;
    }
}

/// 页头中由封装器决定的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub flags: PageFlags,
    /// 本页最后一个完整包结束时的粒度位置, 无完整包时为 -1
    pub granule_position: i64,
    pub serial: u32,
    pub sequence: u32,
}

/// 一个包的段表 (lacing) 值: 若干 255 加一个小于 255 的结束值
pub fn lacing_values(len: usize) -> Vec<u8> {
    let mut lacing = vec![MAX_LACING as u8; len / MAX_LACING];
    lacing.push((len % MAX_LACING) as u8);
    lacing
}

/// 组装完整页面并填入 CRC
pub fn assemble_page(header: &PageHeader, lacing: &[u8], body: &[u8]) -> PcmOggResult<Vec<u8>> {
    if lacing.len() > MAX_SEGMENTS {
        return Err(PcmOggError::Format(format!(
            "Ogg: 段数 {} 超过 {MAX_SEGMENTS}",
            lacing.len()
        )));
    }
    let declared: usize = lacing.iter().map(|&l| usize::from(l)).sum();
    if declared != body.len() {
        return Err(PcmOggError::Format(format!(
            "Ogg: 段表长度 {declared} 与数据长度 {} 不一致",
            body.len()
        )));
    }

    let mut page = Vec::with_capacity(PAGE_HEADER_LEN + lacing.len() + body.len());
    page.write_all(OGG_CAPTURE)?;
    page.write_u8(0)?; // version
    page.write_u8(header.flags.bits())?;
    page.write_i64::<LittleEndian>(header.granule_position)?;
    page.write_u32::<LittleEndian>(header.serial)?;
    page.write_u32::<LittleEndian>(header.sequence)?;
    page.write_u32::<LittleEndian>(0)?; // CRC 占位
    page.write_u8(lacing.len() as u8)?;
    page.write_all(lacing)?;
    page.write_all(body)?;

    let crc = ogg_crc32(&page);
    LittleEndian::write_u32(&mut page[CRC_OFFSET..CRC_OFFSET + 4], crc);
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_段表() {
        assert_eq!(lacing_values(0), vec![0]);
        assert_eq!(lacing_values(254), vec![254]);
        assert_eq!(lacing_values(255), vec![255, 0]);
        assert_eq!(lacing_values(600), vec![255, 255, 90]);
    }

    #[test]
    fn test_页面布局() {
        let header = PageHeader {
            flags: PageFlags::FIRST,
            granule_position: 0,
            serial: 0x1234_5678,
            sequence: 0,
        };
        let page = assemble_page(&header, &[3], b"abc").unwrap();
        assert_eq!(page.len(), PAGE_HEADER_LEN + 1 + 3);
        assert_eq!(&page[..4], b"OggS");
        assert_eq!(page[5], 0x02);
        assert_eq!(&page[14..18], &0x1234_5678u32.to_le_bytes());
        assert_eq!(page[26], 1);
        assert_eq!(&page[28..], b"abc");

        // 置零 CRC 字段后重算应与写入值一致
        let stored = LittleEndian::read_u32(&page[22..26]);
        let mut zeroed = page.clone();
        zeroed[22..26].fill(0);
        assert_eq!(ogg_crc32(&zeroed), stored);
    }

    #[test]
    fn test_段表与数据不一致报错() {
        let header = PageHeader {
            flags: PageFlags::empty(),
            granule_position: -1,
            serial: 1,
            sequence: 1,
        };
        assert!(assemble_page(&header, &[4], b"abc").is_err());
        assert!(assemble_page(&header, &[0; 256], b"").is_err());
    }
}
