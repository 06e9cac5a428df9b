//! 压缩数据包 (Packet).
//!
//! 编码器输出的一个逻辑 Vorbis 包: 三个头包之一, 或一个编码块.

use bytes::Bytes;

/// 压缩数据包
///
/// 由编码器产生, 立即交给封装器, 不在流水线中长期持有.
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 本包结束时的粒度位置 (已解码出的真实 PCM 帧数)
    pub granule_position: i64,
    /// 包序号, 从 0 开始逐包递增 (头包也计入)
    pub packet_no: u64,
    /// 是否为头包
    pub is_header: bool,
    /// 是否为流中最后一个包
    pub is_last: bool,
}

impl Packet {
    /// 创建头包 (粒度位置恒为 0)
    pub fn header(data: impl Into<Bytes>, packet_no: u64) -> Self {
        Self {
            data: data.into(),
            granule_position: 0,
            packet_no,
            is_header: true,
            is_last: false,
        }
    }

    /// 创建音频包
    pub fn audio(data: impl Into<Bytes>, packet_no: u64, granule_position: i64) -> Self {
        Self {
            data: data.into(),
            granule_position,
            packet_no,
            is_header: false,
            is_last: false,
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
