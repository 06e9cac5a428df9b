//! # pcmogg-core
//!
//! pcmogg 核心库, 提供错误处理、位打包、校验和与输出缓冲区.
//!
//! 本 crate 不依赖任何编解码知识, 为编码器和封装器提供底层基础设施.

pub mod bitwriter;
pub mod buffer;
pub mod crc;
pub mod error;

// 重导出常用类型
pub use bitwriter::BitWriter;
pub use buffer::OutputBuffer;
pub use error::{ErrorKind, PcmOggError, PcmOggResult};
