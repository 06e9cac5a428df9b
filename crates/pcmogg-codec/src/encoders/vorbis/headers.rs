//! 识别头与注释头.

use bytes::{BufMut, BytesMut};

/// 头包签名
pub(crate) const VORBIS_MAGIC: &[u8; 6] = b"vorbis";
/// 识别头类型
const PACKET_IDENTIFICATION: u8 = 0x01;
/// 注释头类型
const PACKET_COMMENT: u8 = 0x03;
/// 识别头固定长度
pub(crate) const IDENTIFICATION_LEN: usize = 30;

/// 默认厂商字符串
pub fn default_vendor() -> String {
    concat!("pcmogg ", env!("CARGO_PKG_VERSION")).to_string()
}

/// 生成识别头
///
/// 块大小字节低 4 位为 log2(短块), 高 4 位为 log2(长块).
pub(crate) fn identification(
    channels: u8,
    sample_rate: u32,
    nominal_bitrate: u32,
    blocksizes: [usize; 2],
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(IDENTIFICATION_LEN);
    buf.put_u8(PACKET_IDENTIFICATION);
    buf.put_slice(VORBIS_MAGIC);
    buf.put_u32_le(0); // vorbis_version
    buf.put_u8(channels);
    buf.put_u32_le(sample_rate);
    buf.put_i32_le(0); // bitrate_maximum
    buf.put_i32_le(nominal_bitrate.min(i32::MAX as u32) as i32);
    buf.put_i32_le(0); // bitrate_minimum
    let short_bits = blocksizes[0].trailing_zeros() as u8;
    let long_bits = blocksizes[1].trailing_zeros() as u8;
    buf.put_u8((long_bits << 4) | short_bits);
    buf.put_u8(1); // framing
    buf.to_vec()
}

/// 生成注释头
pub(crate) fn comment(vendor: &str, comments: &[String]) -> Vec<u8> {
    let body: usize = comments.iter().map(|c| 4 + c.len()).sum();
    let mut buf = BytesMut::with_capacity(7 + 4 + vendor.len() + 4 + body + 1);
    buf.put_u8(PACKET_COMMENT);
    buf.put_slice(VORBIS_MAGIC);
    buf.put_u32_le(vendor.len() as u32);
    buf.put_slice(vendor.as_bytes());
    buf.put_u32_le(comments.len() as u32);
    for c in comments {
        buf.put_u32_le(c.len() as u32);
        buf.put_slice(c.as_bytes());
    }
    buf.put_u8(1); // framing
    buf.to_vec()
}
