//! # pcmogg
//!
//! 纯 Rust 实现的 PCM 到 Ogg/Vorbis 编码引擎.
//!
//! 输入为按声道交错的 f32 PCM, 输出为包含单个 Vorbis 逻辑流的完整 Ogg 码流.
//! 整个缓冲区一次编码完成, 每次调用各自持有编码状态, 可在多线程中并发调用.
//!
//! # 快速开始
//!
//! ```rust
//! use pcmogg::{EncodeRequest, encode};
//!
//! let pcm = vec![0.0f32; 44100];
//! let output = encode(&EncodeRequest::new(&pcm, 1, 44100, 0.5)).unwrap();
//! assert!(output.as_bytes().starts_with(b"OggS"));
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `pcmogg-core` | 错误类型、位写入器、CRC、输出缓冲区 |
//! | `pcmogg-codec` | 编码器框架与 Vorbis 编码器 |
//! | `pcmogg-format` | Ogg 封装与页面校验 |
//! | `pcmogg-ffi` | C ABI |

pub mod encode;
pub mod request;
pub mod settings;

/// 核心类型与工具
pub use pcmogg_core as core;

/// 编码器框架
pub use pcmogg_codec as codec;

/// 容器封装
pub use pcmogg_format as format;

pub use encode::{OggOutput, encode, encode_with_settings};
pub use pcmogg_core::{ErrorKind, PcmOggError, PcmOggResult};
pub use request::EncodeRequest;
pub use settings::{EncodeSettings, next_serial};

/// 获取 pcmogg 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
