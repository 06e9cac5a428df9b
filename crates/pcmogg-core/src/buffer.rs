//! 输出缓冲区.
//!
//! 编码结果的可增长字节缓冲区. 容量按倍增策略扩展, 扩容失败时返回
//! `AllocationFailure` 而不是中止进程. 缓冲区被释放 (drop) 时全部内存随之归还.

use log::trace;

use crate::{PcmOggError, PcmOggResult};

/// 首次扩容的最小容量
const MIN_CAPACITY: usize = 4096;

/// 可增长的输出字节缓冲区
#[derive(Debug)]
pub struct OutputBuffer {
    /// 已写入的数据
    data: Vec<u8>,
    /// 允许的最大字节数
    limit: usize,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer {
    /// 创建不设上限的空缓冲区
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// 创建带大小上限的空缓冲区
    ///
    /// 追加后超过 `limit` 字节视为分配失败.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// 追加字节
    ///
    /// 失败时缓冲区内容保持不变.
    pub fn append(&mut self, bytes: &[u8]) -> PcmOggResult<()> {
        let needed = self.data.len().checked_add(bytes.len()).ok_or_else(|| {
            PcmOggError::AllocationFailure("输出缓冲区长度溢出".into())
        })?;
        if needed > self.limit {
            return Err(PcmOggError::AllocationFailure(format!(
                "输出缓冲区超过上限 {} 字节",
                self.limit
            )));
        }
        if needed > self.data.capacity() {
            let target = self
                .data
                .capacity()
                .saturating_mul(2)
                .max(MIN_CAPACITY)
                .max(needed)
                .min(self.limit);
            self.data
                .try_reserve_exact(target - self.data.len())
                .map_err(|e| {
                    PcmOggError::AllocationFailure(format!("扩容到 {target} 字节失败: {e}"))
                })?;
            trace!("输出缓冲区扩容: {} 字节", self.data.capacity());
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// 已写入的数据
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 数据起始指针 (下一次追加或释放前有效)
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// 已写入的字节数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 当前容量
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 大小上限
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 取出底层字节数组
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}
