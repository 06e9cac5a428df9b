//! 封装器实现模块.

pub mod ogg;

pub use ogg::OggMuxer;
