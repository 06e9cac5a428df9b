//! # pcmogg-codec
//!
//! pcmogg 编码器库, 提供编码器抽象与 Vorbis 编码器实现.
//!
//! 编码器以 Packet 为输出单位: 先取出三个头包, 再按送入/取出的方式
//! 逐块产出音频包, 交给封装器写入容器.
//!
//! ## 使用示例
//!
//! ```rust
//! use pcmogg_codec::{AudioFrame, CodecParameters, Encoder, VorbisEncoder};
//!
//! let mut enc = VorbisEncoder::new();
//! enc.open(&CodecParameters::with_quality(44100, 1, 0.5)).unwrap();
//! let headers = enc.headers().unwrap();
//! assert_eq!(headers.len(), 3);
//!
//! let pcm = vec![0.0f32; 4410];
//! enc.send_frame(Some(&AudioFrame::new(&pcm, 1))).unwrap();
//! enc.send_frame(None).unwrap();
//! while let Ok(packet) = enc.receive_packet() {
//!     assert!(!packet.is_header);
//! }
//! ```

pub mod codec_parameters;
pub mod encoder;
pub mod encoders;
pub mod frame;
pub mod packet;

// 重导出常用类型
pub use codec_parameters::{CodecParameters, RateControl};
pub use encoder::Encoder;
pub use encoders::VorbisEncoder;
pub use encoders::vorbis::quality::{
    MAX_QUALITY, MIN_QUALITY, estimate_bitrate, quality_for_bitrate,
};
pub use frame::AudioFrame;
pub use packet::Packet;
