//! 统一错误类型定义.
//!
//! 所有 pcmogg crate 共用的错误类型, 支持跨模块传播.
//! 对外只暴露三类失败: 参数无效、参数不受支持、内存分配失败.

use thiserror::Error;

/// pcmogg 统一错误类型
#[derive(Debug, Error)]
pub enum PcmOggError {
    /// 无效参数 (空缓冲区、非正声道数/采样率、长度不整除、质量越界)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 参数合法但编码器不支持 (声道数或采样率超出范围)
    #[error("不支持的参数: {0}")]
    UnsupportedParameters(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    AllocationFailure(String),

    /// 编码器错误
    #[error("编码器错误: {0}")]
    Codec(String),

    /// 容器格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 对外可见的失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 调用参数无效
    InvalidArgument,
    /// 参数组合不受支持
    UnsupportedParameters,
    /// 内存分配失败
    AllocationFailure,
}

impl PcmOggError {
    /// 归类到对外的三种失败之一
    ///
    /// 流水线内部错误统一视为不受支持的参数组合, I/O 错误视为参数问题
    /// (只有命令行会遇到).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::Io(_) => ErrorKind::InvalidArgument,
            Self::AllocationFailure(_) => ErrorKind::AllocationFailure,
            Self::UnsupportedParameters(_)
            | Self::Codec(_)
            | Self::Format(_)
            | Self::NeedMoreData
            | Self::Eof
            | Self::InvalidData(_)
            | Self::Internal(_) => ErrorKind::UnsupportedParameters,
        }
    }
}

/// pcmogg 统一 Result 类型
pub type PcmOggResult<T> = Result<T, PcmOggError>;
