//! 原始音频帧.
//!
//! 借用调用方的交错 f32 PCM 数据, 不复制.

/// 交错 f32 PCM 音频帧
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    /// 交错采样 (帧数 * 声道数)
    pub samples: &'a [f32],
    /// 声道数
    pub channels: u32,
}

impl<'a> AudioFrame<'a> {
    /// 创建音频帧
    pub fn new(samples: &'a [f32], channels: u32) -> Self {
        Self { samples, channels }
    }

    /// 每声道采样数 (帧数)
    pub fn nb_samples(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}
