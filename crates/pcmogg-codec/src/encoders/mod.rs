//! 编码器实现模块.

pub mod vorbis;

pub use vorbis::VorbisEncoder;
