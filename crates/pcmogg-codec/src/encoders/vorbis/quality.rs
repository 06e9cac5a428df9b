//! 质量到编码参数的映射.
//!
//! 质量 q ∈ [-0.1, 1.0] 先归一化为 t ∈ [0, 1], 各参数随 t 单调变化:
//! - 噪声余量 10 → 40 dB (floor 相对包络的下移量, 越大残差越精细)
//! - 绝对阈值 -100 → -120 dB
//! - 带宽 11 → 20 kHz (不超过奈奎斯特频率)
//! - floor 分区数: 长块 6 → 14, 短块 3 → 5
//!
//! 标称码率只写入识别头, 供播放器显示, 不参与码率控制.

use log::warn;

/// 质量下限
pub const MIN_QUALITY: f32 = -0.1;
/// 质量上限
pub const MAX_QUALITY: f32 = 1.0;

/// 立体声 44.1kHz 下各质量档的估算码率 (kbps)
const BITRATE_CURVE: [(f32, f32); 12] = [
    (-0.1, 45.0),
    (0.0, 64.0),
    (0.1, 80.0),
    (0.2, 96.0),
    (0.3, 112.0),
    (0.4, 128.0),
    (0.5, 160.0),
    (0.6, 192.0),
    (0.7, 224.0),
    (0.8, 256.0),
    (0.9, 320.0),
    (1.0, 500.0),
];

/// 由质量导出的编码参数
#[derive(Debug, Clone, Copy)]
pub(crate) struct QualityProfile {
    /// 生效的质量 (已限制在合法范围内)
    pub(crate) quality: f32,
    pub(crate) noise_offset_db: f32,
    pub(crate) ath_db: f32,
    pub(crate) bandwidth_hz: f32,
    pub(crate) long_floor_partitions: usize,
    pub(crate) short_floor_partitions: usize,
    /// 小于等于该差值的 floor 后直接沿用预测值
    pub(crate) floor_tolerance: i32,
    pub(crate) nominal_bitrate: u32,
}

impl QualityProfile {
    pub(crate) fn new(quality: f32, channels: u32, sample_rate: u32) -> Self {
        let q = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        let t = (q - MIN_QUALITY) / (MAX_QUALITY - MIN_QUALITY);
        let nyquist = sample_rate as f32 / 2.0;
        Self {
            quality: q,
            noise_offset_db: 10.0 + 30.0 * t,
            ath_db: -100.0 - 20.0 * t,
            bandwidth_hz: (11_000.0 + 9_000.0 * t).min(nyquist),
            long_floor_partitions: 6 + (8.0 * t).round() as usize,
            short_floor_partitions: 3 + (2.0 * t).round() as usize,
            floor_tolerance: if t < 0.5 { 1 } else { 0 },
            nominal_bitrate: estimate_bitrate(q, channels, sample_rate),
        }
    }

    /// floor 相对包络的线性增益
    pub(crate) fn floor_gain(&self) -> f32 {
        10f32.powf(-self.noise_offset_db / 20.0)
    }

    /// 绝对阈值的线性幅度
    pub(crate) fn ath_amp(&self) -> f32 {
        10f32.powf(self.ath_db / 20.0)
    }
}

/// 估算给定质量的平均码率 (比特/秒)
pub fn estimate_bitrate(quality: f32, channels: u32, sample_rate: u32) -> u32 {
    let q = quality.clamp(MIN_QUALITY, MAX_QUALITY);
    let kbps = BITRATE_CURVE
        .windows(2)
        .find(|w| q <= w[1].0)
        .map(|w| {
            let (q0, b0) = w[0];
            let (q1, b1) = w[1];
            b0 + (b1 - b0) * (q - q0) / (q1 - q0)
        })
        .unwrap_or(BITRATE_CURVE[BITRATE_CURVE.len() - 1].1);
    let channel_factor = (channels as f32 / 2.0).max(0.5);
    let rate_factor = (sample_rate as f32 / 44_100.0).clamp(0.25, 1.1);
    (kbps * 1000.0 * channel_factor * rate_factor) as u32
}

/// 由目标平均码率反推质量
///
/// 码率超出可达范围时取最近的端点.
pub fn quality_for_bitrate(bitrate: u32, channels: u32, sample_rate: u32) -> f32 {
    let lowest = estimate_bitrate(MIN_QUALITY, channels, sample_rate);
    let highest = estimate_bitrate(MAX_QUALITY, channels, sample_rate);
    if bitrate <= lowest {
        if bitrate < lowest {
            warn!("目标码率 {bitrate} 低于可达下限 {lowest}, 使用最低质量");
        }
        return MIN_QUALITY;
    }
    if bitrate >= highest {
        if bitrate > highest {
            warn!("目标码率 {bitrate} 高于可达上限 {highest}, 使用最高质量");
        }
        return MAX_QUALITY;
    }
    let (mut lo, mut hi) = (MIN_QUALITY, MAX_QUALITY);
    for _ in 0..32 {
        let mid = (lo + hi) / 2.0;
        if estimate_bitrate(mid, channels, sample_rate) < bitrate {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_参数随质量单调() {
        let mut prev = QualityProfile::new(MIN_QUALITY, 2, 44100);
        for i in 1..=22 {
            let q = MIN_QUALITY + i as f32 * 0.05;
            let p = QualityProfile::new(q, 2, 44100);
            assert!(p.noise_offset_db >= prev.noise_offset_db);
            assert!(p.bandwidth_hz >= prev.bandwidth_hz);
            assert!(p.long_floor_partitions >= prev.long_floor_partitions);
            assert!(p.nominal_bitrate >= prev.nominal_bitrate);
            prev = p;
        }
    }

    #[test]
    fn test_端点限制() {
        let p = QualityProfile::new(1.0, 1, 8000);
        assert_eq!(p.quality, 1.0);
        assert!(p.bandwidth_hz <= 4000.0);
        assert!(p.long_floor_partitions <= 31);
        let p = QualityProfile::new(-0.1, 1, 44100);
        assert!(p.noise_offset_db > 0.0);
        assert!(p.short_floor_partitions >= 3);
    }

    #[test]
    fn test_码率反推质量() {
        let q = quality_for_bitrate(160_000, 2, 44100);
        assert!((q - 0.5).abs() < 0.01, "q={q}");
        assert_eq!(quality_for_bitrate(1, 2, 44100), MIN_QUALITY);
        assert_eq!(quality_for_bitrate(10_000_000, 2, 44100), MAX_QUALITY);
    }
}
