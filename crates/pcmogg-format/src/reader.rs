//! Ogg 页面读取与校验.
//!
//! 用于检查封装结果: 逐页解析并校验 CRC, 再检查单个逻辑流的页序号、
//! BOS/EOS 标志与每页数据上限. 命令行的 `inspect` 也用它列出页表.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use pcmogg_core::crc::ogg_crc32;
use pcmogg_core::{PcmOggError, PcmOggResult};

use crate::page::{MAX_PAGE_BODY, OGG_CAPTURE, PAGE_HEADER_LEN, PageFlags};

/// 已解析的 Ogg 页面
#[derive(Debug, Clone)]
pub struct OggPage {
    /// 页在输入中的字节偏移
    pub offset: usize,
    pub flags: PageFlags,
    pub granule_position: i64,
    pub serial: u32,
    pub sequence: u32,
    pub checksum: u32,
    /// 段表
    pub lacing: Vec<u8>,
    pub body: Vec<u8>,
}

impl OggPage {
    /// 页面总长度 (字节)
    pub fn size(&self) -> usize {
        PAGE_HEADER_LEN + self.lacing.len() + self.body.len()
    }

    /// 本页结束的包数
    pub fn packets_completed(&self) -> usize {
        self.lacing.iter().filter(|&&l| l < 255).count()
    }
}

/// 单个逻辑流的统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub serial: u32,
    pub pages: usize,
    /// 完整包数 (含头包)
    pub packets: usize,
    /// 最后一页的粒度位置
    pub last_granule: i64,
    /// 最大的单页数据量
    pub max_body: usize,
}

fn read_page(cursor: &mut Cursor<&[u8]>) -> PcmOggResult<OggPage> {
    let offset = cursor.position() as usize;
    let mut capture = [0u8; 4];
    cursor.read_exact(&mut capture)?;
    if &capture != OGG_CAPTURE {
        return Err(PcmOggError::InvalidData(format!(
            "Ogg: 偏移 {offset} 处不是页面同步字"
        )));
    }
    let version = cursor.read_u8()?;
    if version != 0 {
        return Err(PcmOggError::InvalidData(format!("Ogg: 不支持的版本 {version}")));
    }
    let raw_flags = cursor.read_u8()?;
    let flags = PageFlags::from_bits(raw_flags).ok_or_else(|| {
        PcmOggError::InvalidData(format!("Ogg: 未知的页面标志 0x{raw_flags:02X}"))
    })?;
    let granule_position = cursor.read_i64::<LittleEndian>()?;
    let serial = cursor.read_u32::<LittleEndian>()?;
    let sequence = cursor.read_u32::<LittleEndian>()?;
    let checksum = cursor.read_u32::<LittleEndian>()?;
    let count = cursor.read_u8()? as usize;
    let mut lacing = vec![0u8; count];
    cursor.read_exact(&mut lacing)?;
    let body_len: usize = lacing.iter().map(|&l| usize::from(l)).sum();
    let mut body = vec![0u8; body_len];
    cursor.read_exact(&mut body)?;

    let end = cursor.position() as usize;
    let mut raw = cursor.get_ref()[offset..end].to_vec();
    raw[22..26].fill(0);
    let computed = ogg_crc32(&raw);
    if computed != checksum {
        return Err(PcmOggError::InvalidData(format!(
            "Ogg 页面 CRC 校验失败: 页 #{sequence}, 读取=0x{checksum:08X}, 计算=0x{computed:08X}"
        )));
    }

    Ok(OggPage {
        offset,
        flags,
        granule_position,
        serial,
        sequence,
        checksum,
        lacing,
        body,
    })
}

/// 解析连续的 Ogg 页面, 任何一页损坏都返回错误
pub fn parse_pages(data: &[u8]) -> PcmOggResult<Vec<OggPage>> {
    let mut cursor = Cursor::new(data);
    let mut pages = Vec::new();
    while (cursor.position() as usize) < data.len() {
        pages.push(read_page(&mut cursor)?);
    }
    Ok(pages)
}

/// 校验单逻辑流的页面序列
///
/// 要求: 序列号一致, 页序号从 0 连续递增, 仅首页带 BOS, 仅末页带 EOS,
/// 每页数据不超过 65025 字节, 续包标志与上一页结尾一致.
pub fn validate_stream(pages: &[OggPage]) -> PcmOggResult<StreamSummary> {
    let Some(first) = pages.first() else {
        return Err(PcmOggError::InvalidData("Ogg: 没有页面".into()));
    };
    let last_index = pages.len() - 1;
    let mut open_packet = false;
    let mut packets = 0usize;
    let mut max_body = 0usize;

    for (i, page) in pages.iter().enumerate() {
        if page.serial != first.serial {
            return Err(PcmOggError::InvalidData(format!(
                "Ogg: 页 #{i} 序列号 0x{:08X} 与流 0x{:08X} 不一致",
                page.serial, first.serial
            )));
        }
        if page.sequence as usize != i {
            return Err(PcmOggError::InvalidData(format!(
                "Ogg: 页序号不连续, 期望 {i}, 实际 {}",
                page.sequence
            )));
        }
        if page.flags.contains(PageFlags::FIRST) != (i == 0) {
            return Err(PcmOggError::InvalidData(format!("Ogg: 页 #{i} 的 BOS 标志错误")));
        }
        if page.flags.contains(PageFlags::LAST) != (i == last_index) {
            return Err(PcmOggError::InvalidData(format!("Ogg: 页 #{i} 的 EOS 标志错误")));
        }
        if page.flags.contains(PageFlags::CONTINUED) != open_packet {
            return Err(PcmOggError::InvalidData(format!("Ogg: 页 #{i} 的续包标志错误")));
        }
        if page.body.len() > MAX_PAGE_BODY {
            return Err(PcmOggError::InvalidData(format!(
                "Ogg: 页 #{i} 数据 {} 字节超过上限",
                page.body.len()
            )));
        }
        max_body = max_body.max(page.body.len());
        packets += page.packets_completed();
        if let Some(&l) = page.lacing.last() {
            open_packet = l == 255;
        }
    }

    Ok(StreamSummary {
        serial: first.serial,
        pages: pages.len(),
        packets,
        last_granule: pages[last_index].granule_position,
        max_body,
    })
}

/// 按段表重新拼出完整的包
pub fn reassemble_packets(pages: &[OggPage]) -> PcmOggResult<Vec<Vec<u8>>> {
    let mut packets = Vec::new();
    let mut current = Vec::new();
    let mut open = false;
    for page in pages {
        if page.flags.contains(PageFlags::CONTINUED) != open {
            return Err(PcmOggError::InvalidData(format!(
                "Ogg: 页 #{} 的续包标志与数据不符",
                page.sequence
            )));
        }
        let mut pos = 0usize;
        for &l in &page.lacing {
            let len = usize::from(l);
            current.extend_from_slice(&page.body[pos..pos + len]);
            pos += len;
            if l < 255 {
                packets.push(std::mem::take(&mut current));
            }
        }
        open = page.lacing.last().is_some_and(|&l| l == 255) || (open && page.lacing.is_empty());
    }
    if open {
        return Err(PcmOggError::InvalidData("Ogg: 流末尾有未完成的包".into()));
    }
    Ok(packets)
}
