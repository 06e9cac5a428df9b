//! 编码配置.
//!
//! 不属于 C ABI 的结构性参数: 流序列号、目标页大小、分块大小、注释与
//! 输出上限. 所有字段都有默认值, 可以从 JSON 加载.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use pcmogg_core::{PcmOggError, PcmOggResult};
use serde::{Deserialize, Serialize};

/// 进程内序列号源的步长 (奇数, 2^32 次内不重复)
const SERIAL_STEP: u32 = 0x9E37_79B9;

static NEXT_SERIAL: AtomicU32 = AtomicU32::new(0x5043_4D4F);

/// 取一个新的流序列号, 同一进程内并发打开的流互不相同
pub fn next_serial() -> u32 {
    NEXT_SERIAL.fetch_add(SERIAL_STEP, Ordering::Relaxed)
}

/// 编码配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// 固定的流序列号, 为空时从进程内序列号源获取
    pub serial: Option<u32>,
    /// 目标页大小 (字节), 限制在 512..=65025
    pub page_target: usize,
    /// 每次送入编码器的帧数
    pub chunk_frames: usize,
    /// 注释标签, 形如 `KEY=value`
    pub comments: Vec<String>,
    /// 输出字节数上限
    pub max_output_bytes: usize,
    /// 平均码率 (比特/秒). 设置后按码率换算质量, 忽略请求中的质量值
    pub average_bitrate: Option<u32>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            serial: None,
            page_target: pcmogg_format::DEFAULT_PAGE_TARGET,
            chunk_frames: 1024,
            comments: vec!["ENCODER=pcm_to_ogg_plugin".to_string()],
            max_output_bytes: i32::MAX as usize,
            average_bitrate: None,
        }
    }
}

impl EncodeSettings {
    /// 从 JSON 字符串加载, 缺省字段取默认值
    pub fn from_json_str(json: &str) -> PcmOggResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PcmOggError::InvalidArgument(format!("配置解析失败: {e}")))
    }

    /// 从 JSON 文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> PcmOggResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// 序列化为格式化的 JSON
    pub fn to_json_string(&self) -> PcmOggResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PcmOggError::Internal(format!("配置序列化失败: {e}")))
    }

    /// 本次编码使用的序列号
    pub fn resolve_serial(&self) -> u32 {
        self.serial.unwrap_or_else(next_serial)
    }
}
