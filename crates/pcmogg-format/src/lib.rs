//! # pcmogg-format
//!
//! pcmogg 容器封装库, 负责把编码器数据包装入 Ogg 页面.
//!
//! - `Muxer` trait: 封装器接口
//! - `OggMuxer`: 单逻辑流 Ogg 封装器, 页面追加到 `OutputBuffer`
//! - `reader`: 页面解析与流校验, 供测试和命令行检查使用

pub mod muxer;
pub mod muxers;
pub mod page;
pub mod reader;

// 重导出常用类型
pub use muxer::Muxer;
pub use muxers::OggMuxer;
pub use muxers::ogg::{DEFAULT_PAGE_TARGET, MIN_PAGE_TARGET};
pub use page::{MAX_PAGE_BODY, PageFlags, PageHeader};
pub use reader::{OggPage, StreamSummary, parse_pages, reassemble_packets, validate_stream};
