//! 编码请求与参数校验.

use pcmogg_codec::{MAX_QUALITY, MIN_QUALITY};
use pcmogg_core::{PcmOggError, PcmOggResult};

/// 一次编码调用的参数
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    /// 按声道交错的采样, 长度为 帧数 * 声道数
    pub samples: &'a [f32],
    pub channels: i32,
    pub sample_rate: i64,
    /// 质量, 取值 [-0.1, 1.0]
    pub quality: f32,
}

impl<'a> EncodeRequest<'a> {
    pub fn new(samples: &'a [f32], channels: i32, sample_rate: i64, quality: f32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            quality,
        }
    }

    /// 按固定顺序校验, 返回第一个违反的条件
    ///
    /// 顺序: 缓冲区非空 → 声道数 >= 1 → 长度整除声道数 → 采样率 > 0 → 质量在范围内.
    pub fn validate(&self) -> PcmOggResult<()> {
        if self.samples.is_empty() {
            return Err(PcmOggError::InvalidArgument("采样缓冲区为空".into()));
        }
        if self.channels < 1 {
            return Err(PcmOggError::InvalidArgument(format!(
                "声道数必须 >= 1, 实际为 {}",
                self.channels
            )));
        }
        if self.samples.len() % self.channels as usize != 0 {
            return Err(PcmOggError::InvalidArgument(format!(
                "采样数 {} 不是声道数 {} 的整数倍",
                self.samples.len(),
                self.channels
            )));
        }
        if self.sample_rate <= 0 {
            return Err(PcmOggError::InvalidArgument(format!(
                "采样率必须 > 0, 实际为 {}",
                self.sample_rate
            )));
        }
        if !self.quality.is_finite() || !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(PcmOggError::InvalidArgument(format!(
                "质量 {} 超出范围 [{MIN_QUALITY}, {MAX_QUALITY}]",
                self.quality
            )));
        }
        Ok(())
    }

    /// 每声道帧数 (未校验时声道数非正返回 0)
    pub fn frames(&self) -> usize {
        if self.channels < 1 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(req: EncodeRequest<'_>) -> Option<String> {
        req.validate().err().map(|e| e.to_string())
    }

    #[test]
    fn test_校验顺序() {
        let data = [0.0f32; 6];
        // 空缓冲区优先于其他错误
        let msg = kind_of(EncodeRequest::new(&[], 0, 0, 9.0)).unwrap();
        assert!(msg.contains("为空"));
        let msg = kind_of(EncodeRequest::new(&data, 0, -1, 9.0)).unwrap();
        assert!(msg.contains("声道数"));
        let msg = kind_of(EncodeRequest::new(&data[..5], 2, -1, 9.0)).unwrap();
        assert!(msg.contains("整数倍"));
        let msg = kind_of(EncodeRequest::new(&data, 2, 0, 9.0)).unwrap();
        assert!(msg.contains("采样率"));
        let msg = kind_of(EncodeRequest::new(&data, 2, 44100, 1.5)).unwrap();
        assert!(msg.contains("质量"));
        assert!(kind_of(EncodeRequest::new(&data, 2, 44100, f32::NAN)).is_some());
    }

    #[test]
    fn test_合法请求() {
        let data = [0.0f32; 6];
        let req = EncodeRequest::new(&data, 3, 8000, -0.1);
        assert!(req.validate().is_ok());
        assert_eq!(req.frames(), 2);
        assert!(EncodeRequest::new(&data, 1, 8000, 1.0).validate().is_ok());
    }
}
