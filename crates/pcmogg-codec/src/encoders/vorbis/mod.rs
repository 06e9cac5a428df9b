//! Vorbis 音频编码器.
//!
//! 流水线: 瞬态检测 → 块长规划 → 加窗 → MDCT → floor 拟合 → 残差量化 → 打包.
//! 固定使用 256/2048 两种块长, 声道之间不耦合.
//!
//! 粒度位置只统计真实输入帧: 最后一块越过输入末尾的部分由解码端按
//! 末包粒度裁掉.

mod codebook;
mod envelope;
mod floor;
mod headers;
mod mdct;
pub mod quality;
mod residue;
mod setup;
mod window;

use std::collections::VecDeque;

use log::{debug, trace};
use pcmogg_core::{BitWriter, PcmOggError, PcmOggResult};

use crate::codec_parameters::{CodecParameters, RateControl};
use crate::encoder::Encoder;
use crate::frame::AudioFrame;
use crate::packet::Packet;

use envelope::{BlockPlanner, PlannedBlock, TransientDetector};
use floor::{FloorFit, FloorParams};
use mdct::Mdct;
use quality::QualityProfile;
use setup::{BLOCKSIZES, VorbisSetup};
use window::VorbisWindow;

pub use headers::default_vendor;

/// 支持的最小采样率
pub const MIN_SAMPLE_RATE: u32 = 4_000;
/// 支持的最大采样率
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// 支持的最大声道数 (识别头中为 8 位)
pub const MAX_CHANNELS: u32 = 255;

/// 历史缓冲中可丢弃的采样超过该值时才整理
const HISTORY_SLACK: i64 = 16_384;

/// 一次编码会话的分析状态
struct Analysis {
    setup: VorbisSetup,
    profile: QualityProfile,
    window: VorbisWindow,
    /// 按块类型索引 (0 短, 1 长)
    mdct: [Mdct; 2],
    detector: TransientDetector,
    planner: BlockPlanner,
    /// 每声道的输入历史
    history: Vec<Vec<f32>>,
    /// history[ch][0] 对应的绝对帧位置
    history_start: i64,
    /// 复用的缓冲
    win_buf: Vec<f32>,
    block_buf: Vec<f32>,
    spectra: Vec<Vec<f32>>,
    quantized: Vec<Vec<i32>>,
    /// 清洗后的交错输入
    clean: Vec<f32>,
}

/// Vorbis 编码器
pub struct VorbisEncoder {
    sample_rate: u32,
    channels: u32,
    vendor: String,
    comments: Vec<String>,
    analysis: Option<Analysis>,
    /// 已产出待取的数据包
    pending: VecDeque<Packet>,
    /// 下一个包的序号 (头包计入)
    packet_no: u64,
    /// 已收到的帧数
    frames_received: i64,
    /// 是否已收到结束信号
    flushing: bool,
}

impl VorbisEncoder {
    /// 创建 Vorbis 编码器实例
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            channels: 0,
            vendor: String::new(),
            comments: Vec::new(),
            analysis: None,
            pending: VecDeque::new(),
            packet_no: 0,
            frames_received: 0,
            flushing: false,
        }
    }

    /// 以 trait 对象形式创建
    pub fn create() -> PcmOggResult<Box<dyn Encoder>> {
        Ok(Box::new(Self::new()))
    }

    /// 生效的质量 (打开后可用)
    pub fn quality(&self) -> Option<f32> {
        self.analysis.as_ref().map(|a| a.profile.quality)
    }

    /// 识别头中写入的标称码率 (打开后可用)
    pub fn nominal_bitrate(&self) -> Option<u32> {
        self.analysis.as_ref().map(|a| a.profile.nominal_bitrate)
    }

    fn analysis_mut(&mut self) -> PcmOggResult<&mut Analysis> {
        self.analysis
            .as_mut()
            .ok_or_else(|| PcmOggError::Codec("编码器未打开, 请先调用 open()".into()))
    }

    /// 编码所有已就绪的块
    fn drain_blocks(&mut self) -> PcmOggResult<()> {
        let channels = self.channels as usize;
        let received = self.frames_received;
        let flushing = self.flushing;
        let Some(analysis) = self.analysis.as_mut() else {
            return Err(PcmOggError::Codec("编码器未打开, 请先调用 open()".into()));
        };

        while let Some(block) = analysis
            .planner
            .next_block(&analysis.detector, received, flushing)
        {
            let data = analysis.encode_block(&block, channels, received);
            // 第 0 块中心为 0, 其包粒度自然为 0
            let granule = block.center.min(received);
            let mut packet = Packet::audio(data, self.packet_no, granule);
            packet.is_last = block.is_last;
            trace!(
                "Vorbis 包 #{}: {} 块, 中心 {}, {} 字节",
                self.packet_no,
                if block.long { "长" } else { "短" },
                block.center,
                packet.size(),
            );
            self.packet_no += 1;
            self.pending.push_back(packet);
        }

        if flushing && !analysis.planner.is_done() {
            return Err(PcmOggError::Internal("刷新后仍有未编码的块".into()));
        }
        analysis.compact_history();
        Ok(())
    }
}

impl Default for VorbisEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis {
    fn new(channels: usize, profile: QualityProfile, sample_rate: u32) -> PcmOggResult<Self> {
        let setup = VorbisSetup::new(&profile, sample_rate)?;
        Ok(Self {
            setup,
            profile,
            window: VorbisWindow::new(BLOCKSIZES[0], BLOCKSIZES[1]),
            mdct: [Mdct::new(BLOCKSIZES[0]), Mdct::new(BLOCKSIZES[1])],
            detector: TransientDetector::new(channels),
            planner: BlockPlanner::new(BLOCKSIZES[0], BLOCKSIZES[1]),
            history: vec![Vec::new(); channels],
            history_start: 0,
            win_buf: Vec::with_capacity(BLOCKSIZES[1]),
            block_buf: vec![0.0; BLOCKSIZES[1]],
            spectra: vec![vec![0.0; BLOCKSIZES[1] / 2]; channels],
            quantized: vec![Vec::new(); channels],
            clean: Vec::new(),
        })
    }

    /// 清洗输入 (非有限值视为 0) 并追加到历史
    fn push_samples(&mut self, samples: &[f32], channels: usize) {
        self.clean.clear();
        self.clean
            .extend(samples.iter().map(|&s| if s.is_finite() { s } else { 0.0 }));
        for frame in self.clean.chunks_exact(channels) {
            for (hist, &s) in self.history.iter_mut().zip(frame) {
                hist.push(s);
            }
        }
        self.detector.push(&self.clean);
    }

    /// 丢弃之后不会再读取的历史
    ///
    /// 最后一块之后规划器的窗起点可能越过输入末尾, 丢弃量不超过已有历史.
    fn compact_history(&mut self) {
        let held = self.history.first().map_or(0, Vec::len) as i64;
        let keep_from = self.planner.retain_from().min(self.history_start + held);
        let stale = keep_from - self.history_start;
        if stale > HISTORY_SLACK {
            for hist in &mut self.history {
                hist.drain(..stale as usize);
            }
            self.history_start = keep_from;
        }
    }

    /// 编码一个块, 返回包数据
    fn encode_block(&mut self, block: &PlannedBlock, channels: usize, received: i64) -> Vec<u8> {
        let kind = usize::from(block.long);
        let n = BLOCKSIZES[kind];
        let n2 = n / 2;
        let start = block.center - n as i64 / 2;
        debug_assert_eq!(self.mdct[kind].len(), n);

        self.window
            .fill(block.long, block.prev_long, block.next_long, &mut self.win_buf);

        for ch in 0..channels {
            let hist = &self.history[ch];
            for (i, v) in self.block_buf[..n].iter_mut().enumerate() {
                let pos = start + i as i64;
                *v = if pos < 0 || pos >= received {
                    0.0
                } else {
                    hist[(pos - self.history_start) as usize] * self.win_buf[i]
                };
            }
            self.mdct[kind].forward(&self.block_buf[..n], &mut self.spectra[ch][..n2]);
        }

        let params = FloorParams {
            gain: self.profile.floor_gain(),
            ath_amp: self.profile.ath_amp(),
            tolerance: self.profile.floor_tolerance,
        };
        let floor = &self.setup.floors[kind];
        let fits: Vec<Option<FloorFit>> = self.spectra[..channels]
            .iter()
            .map(|spectrum| floor.fit(&spectrum[..n2], &params))
            .collect();

        let mut bw = BitWriter::with_capacity(n2 * channels / 2 + 16);
        bw.write_bit(false); // 音频包
        bw.write_bits(kind as u32, 1); // 模式号
        if block.long {
            bw.write_bit(block.prev_long);
            bw.write_bit(block.next_long);
        }
        for fit in &fits {
            floor.write_packet(&mut bw, &self.setup.books, fit.as_ref());
        }

        let residue = &self.setup.residues[kind];
        for ((spectrum, fit), q) in self.spectra.iter().zip(&fits).zip(&mut self.quantized) {
            match fit {
                Some(fit) => residue.quantize(&spectrum[..n2], &fit.curve, q),
                None => q.clear(),
            }
        }
        let coded: Vec<&[i32]> = self
            .quantized
            .iter()
            .zip(&fits)
            .filter(|(_, fit)| fit.is_some())
            .map(|(q, _)| q.as_slice())
            .collect();
        residue.write_packet(&mut bw, &self.setup.books, &coded);

        bw.finish()
    }
}

impl Encoder for VorbisEncoder {
    fn name(&self) -> &str {
        "vorbis"
    }

    fn open(&mut self, params: &CodecParameters) -> PcmOggResult<()> {
        if params.channels == 0 {
            return Err(PcmOggError::InvalidArgument("声道数不能为 0".into()));
        }
        if params.channels > MAX_CHANNELS {
            return Err(PcmOggError::UnsupportedParameters(format!(
                "Vorbis 不支持的声道数: {} (最多 {MAX_CHANNELS})",
                params.channels,
            )));
        }
        if params.sample_rate == 0 {
            return Err(PcmOggError::InvalidArgument("采样率不能为 0".into()));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&params.sample_rate) {
            return Err(PcmOggError::UnsupportedParameters(format!(
                "Vorbis 不支持的采样率: {} Hz (范围 {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE})",
                params.sample_rate,
            )));
        }

        let quality = match params.rate_control {
            RateControl::Quality(q) => {
                if !q.is_finite() {
                    return Err(PcmOggError::InvalidArgument(format!("无效的质量值: {q}")));
                }
                q
            }
            RateControl::AverageBitrate(bps) => {
                quality::quality_for_bitrate(bps, params.channels, params.sample_rate)
            }
        };
        let profile = QualityProfile::new(quality, params.channels, params.sample_rate);

        self.analysis = Some(Analysis::new(
            params.channels as usize,
            profile,
            params.sample_rate,
        )?);
        self.sample_rate = params.sample_rate;
        self.channels = params.channels;
        self.vendor = params.vendor.clone().unwrap_or_else(default_vendor);
        self.comments = params.comments.clone();
        self.pending.clear();
        self.packet_no = 0;
        self.frames_received = 0;
        self.flushing = false;

        debug!(
            "打开 Vorbis 编码器: {} Hz, {} 声道, 质量 {:.2}, 标称码率 {} bps, 带宽 {:.0} Hz",
            self.sample_rate,
            self.channels,
            profile.quality,
            profile.nominal_bitrate,
            profile.bandwidth_hz,
        );
        Ok(())
    }

    fn headers(&mut self) -> PcmOggResult<Vec<Packet>> {
        let channels = self.channels;
        let sample_rate = self.sample_rate;
        let analysis = self.analysis_mut()?;
        let id = headers::identification(
            channels as u8,
            sample_rate,
            analysis.profile.nominal_bitrate,
            BLOCKSIZES,
        );
        let setup = analysis.setup.header_packet();
        let comment = headers::comment(&self.vendor, &self.comments);
        self.packet_no = 3;
        Ok(vec![
            Packet::header(id, 0),
            Packet::header(comment, 1),
            Packet::header(setup, 2),
        ])
    }

    fn send_frame(&mut self, frame: Option<&AudioFrame<'_>>) -> PcmOggResult<()> {
        if self.flushing {
            return Err(PcmOggError::Codec("编码器已结束输入".into()));
        }
        self.analysis_mut()?;
        let channels = self.channels as usize;
        match frame {
            None => {
                let detector = &mut self.analysis_mut()?.detector;
                detector.finish();
                trace!("瞬态检测结束: {} 段", detector.segments());
                self.flushing = true;
            }
            Some(frame) => {
                if frame.channels != self.channels {
                    return Err(PcmOggError::InvalidArgument(format!(
                        "帧声道数 {} 与编码器 {} 不一致",
                        frame.channels, self.channels,
                    )));
                }
                if frame.samples.len() % channels != 0 {
                    return Err(PcmOggError::InvalidArgument(
                        "采样数不是声道数的整数倍".into(),
                    ));
                }
                self.analysis_mut()?.push_samples(frame.samples, channels);
                self.frames_received += frame.nb_samples() as i64;
            }
        }
        self.drain_blocks()
    }

    fn receive_packet(&mut self) -> PcmOggResult<Packet> {
        if let Some(pkt) = self.pending.pop_front() {
            return Ok(pkt);
        }
        if self.flushing {
            return Err(PcmOggError::Eof);
        }
        Err(PcmOggError::NeedMoreData)
    }

    fn flush(&mut self) {
        if self.flushing {
            debug!(
                "Vorbis 编码结束: {} 帧, {} 个包",
                self.frames_received, self.packet_no,
            );
        }
        self.analysis = None;
        self.pending.clear();
        self.packet_no = 0;
        self.frames_received = 0;
        self.flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(samples: &[f32], channels: u32, rate: u32, quality: f32) -> Vec<Packet> {
        let mut enc = VorbisEncoder::new();
        enc.open(&CodecParameters::with_quality(rate, channels, quality))
            .unwrap();
        let mut out = enc.headers().unwrap();
        for chunk in samples.chunks(1024 * channels as usize) {
            enc.send_frame(Some(&AudioFrame::new(chunk, channels)))
                .unwrap();
            while let Ok(p) = enc.receive_packet() {
                out.push(p);
            }
        }
        enc.send_frame(None).unwrap();
        loop {
            match enc.receive_packet() {
                Ok(p) => out.push(p),
                Err(PcmOggError::Eof) => break,
                Err(e) => panic!("意外错误: {e}"),
            }
        }
        out
    }

    #[test]
    fn test_参数检查() {
        let mut enc = VorbisEncoder::new();
        let err = enc
            .open(&CodecParameters::with_quality(44100, 256, 0.5))
            .unwrap_err();
        assert!(matches!(err, PcmOggError::UnsupportedParameters(_)));
        let err = enc
            .open(&CodecParameters::with_quality(1000, 1, 0.5))
            .unwrap_err();
        assert!(matches!(err, PcmOggError::UnsupportedParameters(_)));
        let err = enc
            .open(&CodecParameters::with_quality(44100, 1, f32::NAN))
            .unwrap_err();
        assert!(matches!(err, PcmOggError::InvalidArgument(_)));
        assert!(enc.headers().is_err());
    }

    #[test]
    fn test_包序号与粒度() {
        let samples: Vec<f32> = (0..10_000)
            .map(|i| (i as f32 * 0.03).sin() * 0.4)
            .collect();
        let packets = encode_all(&samples, 1, 44100, 0.3);
        assert!(packets[..3].iter().all(|p| p.is_header));
        for (i, p) in packets.iter().enumerate() {
            assert_eq!(p.packet_no, i as u64);
        }
        let audio = &packets[3..];
        assert_eq!(audio[0].granule_position, 0);
        assert!(
            audio
                .windows(2)
                .all(|w| w[1].granule_position >= w[0].granule_position)
        );
        let last = audio.last().unwrap();
        assert!(last.is_last);
        assert_eq!(last.granule_position, 10_000);
        assert_eq!(audio.iter().filter(|p| p.is_last).count(), 1);
    }

    #[test]
    fn test_静音包很小() {
        let packets = encode_all(&vec![0.0; 2 * 8192], 2, 48000, 0.5);
        for p in &packets[3..] {
            // 包类型 + 模式 + 标志 + 2 个未使用的 floor 标志
            assert_eq!(p.size(), 1);
        }
    }

    #[test]
    fn test_非有限采样视为零() {
        let mut samples = vec![0.0f32; 4096];
        samples[100] = f32::NAN;
        samples[200] = f32::INFINITY;
        let packets = encode_all(&samples, 1, 22050, 0.0);
        assert!(packets[3..].iter().all(|p| p.size() == 1));
    }

    #[test]
    fn test_长输入刷新时整理历史() {
        // 末块之后的窗起点会越过输入末尾, 这些长度在刷新时触发历史整理
        for frames in [16_952usize, 17_949, 20_000, 33_901, 34_898, 51_850] {
            let samples: Vec<f32> = (0..frames)
                .map(|i| (i as f32 * 0.0627).sin() * 0.5)
                .collect();
            let packets = encode_all(&samples, 1, 44100, 0.4);
            let last = packets.last().unwrap();
            assert!(last.is_last, "frames={frames}");
            assert_eq!(last.granule_position, frames as i64, "frames={frames}");
        }
    }

    #[test]
    fn test_双声道长输入() {
        let frames = 40_123usize;
        let samples: Vec<f32> = (0..frames * 2)
            .map(|i| ((i / 2) as f32 * 0.021).sin() * if i % 2 == 0 { 0.3 } else { 0.6 })
            .collect();
        let packets = encode_all(&samples, 2, 48000, 0.7);
        assert_eq!(packets.last().unwrap().granule_position, frames as i64);
    }

    /// 不带缩放的逆 MDCT, 与解码端一致
    fn imdct_unscaled(coeffs: &[f32]) -> Vec<f32> {
        let n = coeffs.len() * 2;
        (0..n)
            .map(|j| {
                let base =
                    std::f64::consts::PI * 2.0 / n as f64 * (j as f64 + 0.5 + n as f64 / 4.0);
                coeffs
                    .iter()
                    .enumerate()
                    .map(|(k, &x)| f64::from(x) * (base * (k as f64 + 0.5)).cos())
                    .sum::<f64>() as f32
            })
            .collect()
    }

    #[test]
    fn test_长块分析单位增益() {
        let n = BLOCKSIZES[1];
        let half = n / 2;
        let signal: Vec<f32> = (0..half * 5)
            .map(|i| (i as f32 * 0.0627).sin() * 0.5)
            .collect();
        let window = VorbisWindow::new(BLOCKSIZES[0], BLOCKSIZES[1]);
        let mut win = Vec::new();
        window.fill(true, true, true, &mut win);
        let mut mdct = Mdct::new(n);
        let mut coeffs = vec![0.0f32; half];
        let mut recon = vec![0.0f32; signal.len()];
        for block in 0..4 {
            let start = block * half;
            let windowed: Vec<f32> = (0..n).map(|i| signal[start + i] * win[i]).collect();
            mdct.forward(&windowed, &mut coeffs);
            for (i, y) in imdct_unscaled(&coeffs).into_iter().enumerate() {
                recon[start + i] += y * win[i];
            }
        }
        for i in half..half * 4 {
            assert!(
                (recon[i] - signal[i]).abs() < 1e-3,
                "i={i}: {} vs {}",
                recon[i],
                signal[i]
            );
        }
    }

    #[test]
    fn test_码率模式() {
        let mut enc = VorbisEncoder::new();
        let mut params = CodecParameters::with_quality(44100, 2, 0.0);
        params.rate_control = RateControl::AverageBitrate(128_000);
        enc.open(&params).unwrap();
        let q = enc.quality().unwrap();
        assert!((q - 0.4).abs() < 0.01, "q={q}");
        let nominal = i64::from(enc.nominal_bitrate().unwrap());
        assert!((nominal - 128_000).abs() < 500, "nominal={nominal}");
    }
}
