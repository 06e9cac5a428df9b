//! 封装器 (Muxer) trait 定义.
//!
//! 定义了将编码器数据包写入容器格式的接口. 输出追加到调用方持有的
//! `OutputBuffer`, 封装器本身不持有输出.

use pcmogg_codec::Packet;
use pcmogg_core::{OutputBuffer, PcmOggResult};

/// 封装器 trait
///
/// 使用流程:
/// 1. 调用 `write_header()` 写入编码器头包
/// 2. 循环调用 `write_packet()` 写入音频包
/// 3. 调用 `write_trailer()` 完成封装
pub trait Muxer: Send {
    /// 获取格式名称
    fn name(&self) -> &str;

    /// 写入码流头包, 写完后所有头包都已落页
    fn write_header(&mut self, out: &mut OutputBuffer, headers: &[Packet]) -> PcmOggResult<()>;

    /// 写入一个数据包
    fn write_packet(&mut self, out: &mut OutputBuffer, packet: &Packet) -> PcmOggResult<()>;

    /// 写入容器尾部, 完成封装
    fn write_trailer(&mut self, out: &mut OutputBuffer) -> PcmOggResult<()>;
}
