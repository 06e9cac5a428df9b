//! 编码门面: 校验请求并驱动 编码器 → 封装器 → 输出缓冲区.
//!
//! 任何一步失败时, 已构建的部分输出随错误一起释放, 调用方拿不到半成品.

use log::debug;
use pcmogg_codec::{AudioFrame, CodecParameters, Encoder, Packet, RateControl, VorbisEncoder};
use pcmogg_core::{OutputBuffer, PcmOggError, PcmOggResult};
use pcmogg_format::{Muxer, OggMuxer};

use crate::request::EncodeRequest;
use crate::settings::EncodeSettings;

/// 编码结果: 一段完整的 Ogg/Vorbis 码流
#[derive(Debug)]
pub struct OggOutput {
    buffer: OutputBuffer,
    serial: u32,
    frames: u64,
}

impl OggOutput {
    /// 码流字节
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// 码流首字节指针, 在 `OggOutput` 释放前保持有效
    pub fn as_ptr(&self) -> *const u8 {
        self.buffer.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 流序列号
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// 编码的帧数 (每声道采样数)
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer.into_vec()
    }
}

/// 使用默认配置编码
pub fn encode(request: &EncodeRequest<'_>) -> PcmOggResult<OggOutput> {
    encode_with_settings(request, &EncodeSettings::default())
}

/// 使用指定配置编码
pub fn encode_with_settings(
    request: &EncodeRequest<'_>,
    settings: &EncodeSettings,
) -> PcmOggResult<OggOutput> {
    request.validate()?;

    let channels = request.channels as u32;
    let sample_rate = u32::try_from(request.sample_rate).map_err(|_| {
        PcmOggError::UnsupportedParameters(format!("采样率过大: {}", request.sample_rate))
    })?;
    let mut params = CodecParameters::with_quality(sample_rate, channels, request.quality);
    if let Some(bps) = settings.average_bitrate {
        params.rate_control = RateControl::AverageBitrate(bps);
    }
    params.comments = settings.comments.clone();

    let mut encoder = VorbisEncoder::new();
    encoder.open(&params)?;

    let serial = settings.resolve_serial();
    let mut muxer = OggMuxer::new(serial, settings.page_target);
    let mut out = OutputBuffer::with_limit(settings.max_output_bytes);

    let headers = encoder.headers()?;
    muxer.write_header(&mut out, &headers)?;

    let chunk = settings.chunk_frames.max(1) * channels as usize;
    for block in request.samples.chunks(chunk) {
        encoder.send_frame(Some(&AudioFrame::new(block, channels)))?;
        drain_packets(&mut encoder, &mut muxer, &mut out)?;
    }
    encoder.send_frame(None)?;
    drain_packets(&mut encoder, &mut muxer, &mut out)?;
    muxer.write_trailer(&mut out)?;
    encoder.flush();

    let frames = request.frames() as u64;
    debug!(
        "编码完成: {frames} 帧, {} 声道, {} Hz, 输出 {} 字节, 序列号 0x{serial:08X}",
        channels,
        sample_rate,
        out.len(),
    );
    Ok(OggOutput {
        buffer: out,
        serial,
        frames,
    })
}

/// 取空编码器中已就绪的包并交给封装器
fn drain_packets(
    encoder: &mut dyn Encoder,
    muxer: &mut dyn Muxer,
    out: &mut OutputBuffer,
) -> PcmOggResult<()> {
    loop {
        let packet: Packet = match encoder.receive_packet() {
            Ok(p) => p,
            Err(PcmOggError::NeedMoreData) | Err(PcmOggError::Eof) => return Ok(()),
            Err(e) => return Err(e),
        };
        muxer.write_packet(out, &packet)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcmogg_core::ErrorKind;

    #[test]
    fn test_声道数为零() {
        let data = [0.0f32; 4];
        let err = encode(&EncodeRequest::new(&data, 0, 44100, 0.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_不支持的参数() {
        let data = vec![0.0f32; 300 * 4];
        let err = encode(&EncodeRequest::new(&data, 300, 44100, 0.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameters);
        let err = encode(&EncodeRequest::new(&data, 1, 1_000_000, 0.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameters);
        let err = encode(&EncodeRequest::new(&data, 1, 10_000_000_000, 0.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameters);
    }

    #[test]
    fn test_输出上限() {
        let data: Vec<f32> = (0..44100).map(|i| ((i * 31) % 200) as f32 / 100.0 - 1.0).collect();
        let settings = EncodeSettings {
            max_output_bytes: 2000,
            ..EncodeSettings::default()
        };
        let err = encode_with_settings(&EncodeRequest::new(&data, 1, 44100, 1.0), &settings)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailure);
    }

    #[test]
    fn test_基本输出() {
        let data = vec![0.0f32; 2 * 1000];
        let settings = EncodeSettings {
            serial: Some(5),
            ..EncodeSettings::default()
        };
        let out = encode_with_settings(&EncodeRequest::new(&data, 2, 8000, 0.0), &settings)
            .unwrap();
        assert!(out.as_bytes().starts_with(b"OggS"));
        assert_eq!(out.serial(), 5);
        assert_eq!(out.frames(), 1000);
        assert_eq!(out.len(), out.as_bytes().len());
    }
}
