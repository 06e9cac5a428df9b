//! 瞬态检测与块长规划.
//!
//! 输入按 64 帧分段, 每段的能量取各声道一阶差分的平方和. 某段能量超过
//! 前 4 段均值的 8 倍 (且高于静音门限) 即视为瞬态. 块规划器据此在长块与
//! 短块之间选择: 下一个块的窗覆盖范围内出现瞬态就用短块.

/// 分段长度 (帧)
pub(crate) const SEGMENT: usize = 64;
/// 参与均值比较的历史段数
const HISTORY: usize = 4;
/// 能量突增倍数
const ATTACK_RATIO: f32 = 8.0;
/// 每个采样的静音能量门限
const SILENCE_ENERGY: f32 = 1e-7;

/// 瞬态检测器
#[derive(Debug)]
pub(crate) struct TransientDetector {
    channels: usize,
    /// 每声道上一个采样
    last: Vec<f32>,
    /// 当前段累计能量
    acc: f32,
    /// 当前段已累计的帧数
    filled: usize,
    recent: [f32; HISTORY],
    recent_len: usize,
    recent_pos: usize,
    /// 每段是否为瞬态
    flags: Vec<bool>,
}

impl TransientDetector {
    pub(crate) fn new(channels: usize) -> Self {
        Self {
            channels,
            last: vec![0.0; channels],
            acc: 0.0,
            filled: 0,
            recent: [0.0; HISTORY],
            recent_len: 0,
            recent_pos: 0,
            flags: Vec::new(),
        }
    }

    /// 送入交错采样 (已清洗)
    pub(crate) fn push(&mut self, interleaved: &[f32]) {
        for frame in interleaved.chunks_exact(self.channels) {
            let mut energy = 0.0f32;
            for (last, &x) in self.last.iter_mut().zip(frame) {
                let d = x - *last;
                energy += d * d;
                *last = x;
            }
            self.acc += energy;
            self.filled += 1;
            if self.filled == SEGMENT {
                self.close_segment();
            }
        }
    }

    /// 输入结束, 结算未满的最后一段
    pub(crate) fn finish(&mut self) {
        if self.filled > 0 {
            self.close_segment();
        }
    }

    fn close_segment(&mut self) {
        let mean = if self.recent_len == 0 {
            0.0
        } else {
            self.recent[..self.recent_len].iter().sum::<f32>() / self.recent_len as f32
        };
        let gate = SILENCE_ENERGY * (SEGMENT * self.channels) as f32;
        self.flags.push(self.acc > ATTACK_RATIO * mean && self.acc > gate);

        self.recent[self.recent_pos] = self.acc;
        self.recent_pos = (self.recent_pos + 1) % HISTORY;
        self.recent_len = (self.recent_len + 1).min(HISTORY);
        self.acc = 0.0;
        self.filled = 0;
    }

    /// 已结算的段数
    pub(crate) fn segments(&self) -> usize {
        self.flags.len()
    }

    /// 帧区间 [start, end) 内是否有瞬态, 未结算的段视为无瞬态
    pub(crate) fn any_in(&self, start: i64, end: i64) -> bool {
        if end <= start || end <= 0 {
            return false;
        }
        let first = (start.max(0) as usize) / SEGMENT;
        let last = (end as usize).div_ceil(SEGMENT).min(self.flags.len());
        first < last && self.flags[first..last].iter().any(|&t| t)
    }
}

/// 规划好的一个块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlannedBlock {
    /// 窗中心的绝对帧位置
    pub(crate) center: i64,
    pub(crate) long: bool,
    pub(crate) prev_long: bool,
    pub(crate) next_long: bool,
    pub(crate) is_last: bool,
}

/// 块长规划器
///
/// 相邻块中心间隔为 n_cur/4 + n_next/4, 第 0 块中心位于第 0 帧.
#[derive(Debug)]
pub(crate) struct BlockPlanner {
    short: i64,
    long: i64,
    center: i64,
    /// 下一个待编码块是否为长块, 第 0 块尚未决定时为 None
    current_long: Option<bool>,
    prev_long: bool,
    done: bool,
}

impl BlockPlanner {
    pub(crate) fn new(short: usize, long: usize) -> Self {
        Self {
            short: short as i64,
            long: long as i64,
            center: 0,
            current_long: None,
            prev_long: true,
            done: false,
        }
    }

    /// 编码中心为 `center` 的块前必须已收到的帧数
    fn lookahead(&self, center: i64) -> i64 {
        center + 3 * self.long / 4 + self.short / 4 + 2 * SEGMENT as i64
    }

    /// 下一个块的窗起点下界 (之前的采样不会再被读取)
    pub(crate) fn retain_from(&self) -> i64 {
        self.center - self.long / 2
    }

    /// 取出下一个可以编码的块
    ///
    /// `received` 为已收到的总帧数. 未进入刷新阶段且预读不足时返回 None;
    /// 刷新阶段持续产出, 直到窗中心越过输入末尾的那个块 (标记为最后一块).
    pub(crate) fn next_block(
        &mut self,
        detector: &TransientDetector,
        received: i64,
        flushing: bool,
    ) -> Option<PlannedBlock> {
        if self.done {
            return None;
        }
        let center = self.center;
        if !flushing && received < self.lookahead(center) {
            return None;
        }

        let long = match self.current_long {
            Some(v) => v,
            None => !detector.any_in(0, self.long / 4 + self.short / 4),
        };
        let n = if long { self.long } else { self.short };
        let is_last = flushing && center >= received;
        let next_long = is_last
            || !detector.any_in(center, center + n / 4 + self.long / 2 + self.short / 4);

        let block = PlannedBlock {
            center,
            long,
            prev_long: self.prev_long,
            next_long,
            is_last,
        };

        let next_n = if next_long { self.long } else { self.short };
        self.prev_long = long;
        self.current_long = Some(next_long);
        self.center = center + n / 4 + next_n / 4;
        self.done = is_last;
        Some(block)
    }

    /// 是否已产出最后一块
    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_at(frames: usize, pos: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; frames];
        // 前面有微弱的平稳噪声
        for (i, s) in v.iter_mut().enumerate() {
            *s = ((i * 7919 % 13) as f32 - 6.0) * 1e-4;
        }
        v[pos] = 0.9;
        v
    }

    #[test]
    fn test_检测突发() {
        let mut det = TransientDetector::new(1);
        det.push(&impulse_at(4096, 2000));
        det.finish();
        assert_eq!(det.segments(), 64);
        assert!(det.any_in(1984, 2048));
        // 第 0 段没有历史可比, 只要高于静音门限就算瞬态
        assert!(det.any_in(0, 64));
        assert!(!det.any_in(64, 1900));
        assert!(!det.any_in(2200, 4096));
    }

    #[test]
    fn test_静音无瞬态() {
        let mut det = TransientDetector::new(2);
        det.push(&vec![0.0; 2 * 3000]);
        det.finish();
        assert!(!det.any_in(0, 3000));
    }

    #[test]
    fn test_平稳信号全为长块() {
        let frames = 44100i64;
        let pcm: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut det = TransientDetector::new(1);
        det.push(&pcm);
        det.finish();
        let mut planner = BlockPlanner::new(256, 2048);
        let mut blocks = Vec::new();
        while let Some(b) = planner.next_block(&det, frames, true) {
            blocks.push(b);
        }
        // 第 0 块起点处的跳变可能被视为瞬态, 其余都应为长块
        assert!(blocks[2..].iter().all(|b| b.long));
        let last = blocks.last().unwrap();
        assert!(last.is_last);
        assert!(last.center >= frames);
        assert!(planner.is_done());
    }

    #[test]
    fn test_中心间隔与相邻标志一致() {
        let frames = 20_000i64;
        let mut pcm = vec![0.0f32; frames as usize];
        for pos in [5000usize, 12_000] {
            for (i, s) in pcm[pos..pos + 300].iter_mut().enumerate() {
                *s = if i % 2 == 0 { 0.8 } else { -0.8 };
            }
        }
        let mut det = TransientDetector::new(1);
        det.push(&pcm);
        det.finish();
        let mut planner = BlockPlanner::new(256, 2048);
        let mut blocks = Vec::new();
        while let Some(b) = planner.next_block(&det, frames, true) {
            blocks.push(b);
        }
        assert!(blocks.iter().any(|b| !b.long));
        for w in blocks.windows(2) {
            let n0 = if w[0].long { 2048 } else { 256 };
            let n1 = if w[1].long { 2048 } else { 256 };
            assert_eq!(w[1].center - w[0].center, n0 / 4 + n1 / 4);
            assert_eq!(w[0].next_long, w[1].long);
            assert_eq!(w[1].prev_long, w[0].long);
        }
    }

    #[test]
    fn test_预读不足时等待() {
        let det = TransientDetector::new(1);
        let mut planner = BlockPlanner::new(256, 2048);
        assert!(planner.next_block(&det, 100, false).is_none());
        let b = planner.next_block(&det, 100_000, false).unwrap();
        assert_eq!(b.center, 0);
        assert!(!b.is_last);
    }
}
