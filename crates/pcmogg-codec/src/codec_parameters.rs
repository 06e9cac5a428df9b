//! 编码器参数.
//!
//! 编码器打开时需要的全部配置: 采样率、声道数、码率控制方式与注释标签.

/// 码率控制方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateControl {
    /// 直接质量模式, 取值 [-0.1, 1.0], 越大保真度越高
    Quality(f32),
    /// 平均码率模式 (比特/秒), 按码率估算曲线换算为质量
    AverageBitrate(u32),
}

impl Default for RateControl {
    fn default() -> Self {
        Self::Quality(0.5)
    }
}

/// 编码器参数
#[derive(Debug, Clone)]
pub struct CodecParameters {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
    /// 码率控制
    pub rate_control: RateControl,
    /// 用户注释, 形如 `KEY=value`
    pub comments: Vec<String>,
    /// 厂商字符串, 为空时使用内置值
    pub vendor: Option<String>,
}

impl CodecParameters {
    /// 以质量模式创建参数
    pub fn with_quality(sample_rate: u32, channels: u32, quality: f32) -> Self {
        Self {
            sample_rate,
            channels,
            rate_control: RateControl::Quality(quality),
            comments: Vec::new(),
            vendor: None,
        }
    }
}
