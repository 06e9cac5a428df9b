//! 编码器 trait 定义.
//!
//! 所有编码器实现必须实现 `Encoder` trait.

use pcmogg_core::PcmOggResult;

use crate::codec_parameters::CodecParameters;
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// 编码器 trait
///
/// 编码流程:
/// 1. 调用 `open()` 配置编码器
/// 2. 调用 `headers()` 取出码流头包
/// 3. 调用 `send_frame()` 送入原始帧数据
/// 4. 调用 `receive_packet()` 取出压缩数据包, 直到返回 `NeedMoreData`
/// 5. 送入 None 表示编码结束, 取空剩余包直到返回 `Eof`
pub trait Encoder: Send {
    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 使用参数配置编码器
    ///
    /// 声道数或采样率超出范围时返回 `UnsupportedParameters`,
    /// 此时尚未产生任何输出.
    fn open(&mut self, params: &CodecParameters) -> PcmOggResult<()>;

    /// 生成码流头包
    ///
    /// 必须在 `open()` 之后, 第一个音频包之前调用.
    fn headers(&mut self) -> PcmOggResult<Vec<Packet>>;

    /// 送入一帧原始数据进行编码
    ///
    /// # 参数
    /// - `frame`: 原始帧数据. `None` 表示输入结束, 编码器输出剩余的块.
    fn send_frame(&mut self, frame: Option<&AudioFrame<'_>>) -> PcmOggResult<()>;

    /// 从编码器取出一个压缩数据包
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功取出一个数据包
    /// - `Err(PcmOggError::NeedMoreData)`: 需要送入更多帧
    /// - `Err(PcmOggError::Eof)`: 所有数据包已取出
    fn receive_packet(&mut self) -> PcmOggResult<Packet>;

    /// 刷新编码器, 清空内部状态
    fn flush(&mut self);
}
