//! Ogg 容器封装器.
//!
//! 单逻辑流. 状态机:
//! - `StreamStart`: 等待头包. 第一个头包单独成页 (BOS), 其余头包随后强制落页.
//! - `Streaming`: 累积音频包, 数据量达到目标页大小 (在包边界) 或段数满 255 时出页.
//! - `StreamEnd`: 已写出 EOS 页, 不再接受数据.

use log::{debug, trace};
use pcmogg_codec::Packet;
use pcmogg_core::{OutputBuffer, PcmOggError, PcmOggResult};

use crate::muxer::Muxer;
use crate::page::{
    MAX_PAGE_BODY, MAX_SEGMENTS, PageFlags, PageHeader, assemble_page, lacing_values,
};

/// 默认目标页大小 (字节)
pub const DEFAULT_PAGE_TARGET: usize = 4096;
/// 目标页大小下限
pub const MIN_PAGE_TARGET: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    StreamStart,
    Streaming,
    StreamEnd,
}

/// 待落页的一个段
#[derive(Debug, Clone, Copy)]
struct PendingSegment {
    lacing: u8,
    /// 是否为某个包的第一段
    packet_start: bool,
    /// 若为包的最后一段, 该包的粒度位置
    granule: Option<i64>,
}

/// Ogg 封装器
pub struct OggMuxer {
    serial: u32,
    page_target: usize,
    state: StreamState,
    /// 下一页的序号
    sequence: u32,
    segments: Vec<PendingSegment>,
    body: Vec<u8>,
    /// 最近一个落页的完整包的粒度位置
    last_granule: i64,
}

impl OggMuxer {
    /// 创建 Ogg 封装器
    ///
    /// `page_target` 会被限制在 512..=65025.
    pub fn new(serial: u32, page_target: usize) -> Self {
        Self {
            serial,
            page_target: page_target.clamp(MIN_PAGE_TARGET, MAX_PAGE_BODY),
            state: StreamState::StreamStart,
            sequence: 0,
            segments: Vec::new(),
            body: Vec::new(),
            last_granule: 0,
        }
    }

    /// 以 trait 对象形式创建
    pub fn create(serial: u32, page_target: usize) -> PcmOggResult<Box<dyn Muxer>> {
        Ok(Box::new(Self::new(serial, page_target)))
    }

    /// 流序列号
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// 已写出的页数
    pub fn pages_written(&self) -> u32 {
        self.sequence
    }

    fn queue(&mut self, packet: &Packet) {
        let lacing = lacing_values(packet.data.len());
        let count = lacing.len();
        for (i, l) in lacing.into_iter().enumerate() {
            self.segments.push(PendingSegment {
                lacing: l,
                packet_start: i == 0,
                granule: (i + 1 == count).then_some(packet.granule_position),
            });
        }
        self.body.extend_from_slice(&packet.data);
    }

    /// 下一页包含的段数
    ///
    /// 在数据量首次达到目标的包边界处切分; 段数满 255 时强制切分;
    /// `force` 时把剩余全部落页.
    fn page_cut(&self, force: bool) -> Option<usize> {
        let mut bytes = 0usize;
        for (i, seg) in self.segments.iter().take(MAX_SEGMENTS).enumerate() {
            bytes += usize::from(seg.lacing);
            if seg.granule.is_some() && bytes >= self.page_target {
                return Some(i + 1);
            }
        }
        if self.segments.len() >= MAX_SEGMENTS {
            Some(MAX_SEGMENTS)
        } else if force && !self.segments.is_empty() {
            Some(self.segments.len())
        } else {
            None
        }
    }

    fn emit_page(
        &mut self,
        out: &mut OutputBuffer,
        cut: usize,
        end_of_stream: bool,
    ) -> PcmOggResult<()> {
        let segs: Vec<PendingSegment> = self.segments.drain(..cut).collect();
        let len: usize = segs.iter().map(|s| usize::from(s.lacing)).sum();
        let body: Vec<u8> = self.body.drain(..len).collect();

        let mut flags = PageFlags::empty();
        if segs.first().is_some_and(|s| !s.packet_start) {
            flags |= PageFlags::CONTINUED;
        }
        if self.sequence == 0 {
            flags |= PageFlags::FIRST;
        }
        if end_of_stream && self.segments.is_empty() {
            flags |= PageFlags::LAST;
        }
        let granule_position = match segs.iter().rev().find_map(|s| s.granule) {
            Some(g) => {
                self.last_granule = g;
                g
            }
            None => -1,
        };

        let lacing: Vec<u8> = segs.iter().map(|s| s.lacing).collect();
        self.write_page(out, flags, granule_position, &lacing, &body)
    }

    fn write_page(
        &mut self,
        out: &mut OutputBuffer,
        flags: PageFlags,
        granule_position: i64,
        lacing: &[u8],
        body: &[u8],
    ) -> PcmOggResult<()> {
        let header = PageHeader {
            flags,
            granule_position,
            serial: self.serial,
            sequence: self.sequence,
        };
        let page = assemble_page(&header, lacing, body)?;
        out.append(&page)?;
        trace!(
            "Ogg 页 #{}: 标志 {:?}, 粒度 {}, {} 段, {} 字节",
            self.sequence,
            flags,
            granule_position,
            lacing.len(),
            body.len(),
        );
        self.sequence = self.sequence.wrapping_add(1);
        if flags.contains(PageFlags::LAST) {
            self.state = StreamState::StreamEnd;
        }
        Ok(())
    }

    /// 把待落页的段全部写出
    fn flush_all(&mut self, out: &mut OutputBuffer, end_of_stream: bool) -> PcmOggResult<()> {
        while let Some(cut) = self.page_cut(true) {
            self.emit_page(out, cut, end_of_stream)?;
        }
        Ok(())
    }
}

impl Muxer for OggMuxer {
    fn name(&self) -> &str {
        "ogg"
    }

    fn write_header(&mut self, out: &mut OutputBuffer, headers: &[Packet]) -> PcmOggResult<()> {
        if self.state != StreamState::StreamStart {
            return Err(PcmOggError::Format("Ogg: 头部已写入".into()));
        }
        let Some((first, rest)) = headers.split_first() else {
            return Err(PcmOggError::InvalidArgument("Ogg: 没有头包".into()));
        };

        self.queue(first);
        self.flush_all(out, false)?;
        for packet in rest {
            self.queue(packet);
        }
        self.flush_all(out, false)?;

        self.state = StreamState::Streaming;
        debug!(
            "Ogg 头部写入完成: 序列号 0x{:08X}, {} 个头包, {} 页",
            self.serial,
            headers.len(),
            self.sequence,
        );
        Ok(())
    }

    fn write_packet(&mut self, out: &mut OutputBuffer, packet: &Packet) -> PcmOggResult<()> {
        match self.state {
            StreamState::StreamStart => {
                return Err(PcmOggError::Format("Ogg: 头部尚未写入".into()));
            }
            StreamState::StreamEnd => {
                return Err(PcmOggError::Format("Ogg: 流已结束".into()));
            }
            StreamState::Streaming => {}
        }

        self.queue(packet);
        if packet.is_last {
            return self.flush_all(out, true);
        }
        while let Some(cut) = self.page_cut(false) {
            self.emit_page(out, cut, false)?;
        }
        Ok(())
    }

    fn write_trailer(&mut self, out: &mut OutputBuffer) -> PcmOggResult<()> {
        match self.state {
            StreamState::StreamStart => Err(PcmOggError::Format("Ogg: 头部尚未写入".into())),
            StreamState::StreamEnd => Ok(()),
            StreamState::Streaming => {
                self.flush_all(out, true)?;
                if self.state != StreamState::StreamEnd {
                    // 没有剩余数据可携带 EOS, 补一个空页
                    let granule = self.last_granule;
                    self.write_page(out, PageFlags::LAST, granule, &[], &[])?;
                }
                debug!("Ogg 封装完成: {} 页, 末粒度 {}", self.sequence, self.last_granule);
                Ok(())
            }
        }
    }
}
