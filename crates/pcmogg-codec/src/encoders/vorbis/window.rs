//! Vorbis 窗函数.
//!
//! 上升沿 w(i) = sin(π/2 * sin²((i + 0.5) / L * π/2)), L 为斜坡长度, 下降沿为其镜像.
//! 长块的左右斜坡长度取决于相邻块的大小: 与短块相邻的一侧使用短斜坡,
//! 斜坡以块的 N/4 和 3N/4 为中心, 斜坡外侧为 0, 内侧为 1.

use std::f64::consts::PI;

/// 预计算的短/长斜坡
pub(crate) struct VorbisWindow {
    /// 块大小 [短, 长]
    blocksizes: [usize; 2],
    /// 上升沿, 长度分别为 短块/2 与 长块/2
    slopes: [Vec<f32>; 2],
}

fn rising_slope(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let s = ((i as f64 + 0.5) / len as f64 * PI / 2.0).sin();
            (PI / 2.0 * s * s).sin() as f32
        })
        .collect()
}

impl VorbisWindow {
    pub(crate) fn new(short: usize, long: usize) -> Self {
        Self {
            blocksizes: [short, long],
            slopes: [rising_slope(short / 2), rising_slope(long / 2)],
        }
    }

    /// 生成指定块类型的完整窗
    ///
    /// `prev_long`/`next_long` 只对长块有意义; 短块两侧总是短斜坡.
    pub(crate) fn fill(&self, long: bool, prev_long: bool, next_long: bool, out: &mut Vec<f32>) {
        let n = self.blocksizes[usize::from(long)];
        out.clear();
        out.resize(n, 0.0);

        let left = &self.slopes[usize::from(long && prev_long)];
        let right = &self.slopes[usize::from(long && next_long)];

        let left_start = n / 4 - left.len() / 2;
        let left_end = left_start + left.len();
        let right_start = n * 3 / 4 - right.len() / 2;
        let right_end = right_start + right.len();

        out[left_start..left_end].copy_from_slice(left);
        for v in &mut out[left_end..right_start] {
            *v = 1.0;
        }
        for (i, v) in out[right_start..right_end].iter_mut().enumerate() {
            *v = right[right.len() - 1 - i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_长长窗满足功率互补() {
        let win = VorbisWindow::new(256, 2048);
        let mut w = Vec::new();
        win.fill(true, true, true, &mut w);
        assert_eq!(w.len(), 2048);
        for i in 0..1024 {
            let sum = w[i] * w[i] + w[i + 1024] * w[i + 1024];
            assert!((sum - 1.0).abs() < 1e-5, "i={i} sum={sum}");
        }
    }

    #[test]
    fn test_长块右侧接短块() {
        let win = VorbisWindow::new(256, 2048);
        let mut w = Vec::new();
        win.fill(true, true, false, &mut w);
        // 右斜坡 [1472, 1600), 之后全为 0, 之前为 1
        assert_eq!(w[1471], 1.0);
        assert!(w[1472] > 0.99);
        assert!(w[1599] > 0.0 && w[1599] < 0.01);
        assert!(w[1600..].iter().all(|&v| v == 0.0));
        // 左侧是长斜坡, 从 0 开始
        assert!(w[0] < 1e-3);
        assert!((w[1023] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_短窗与长窗短斜坡相同() {
        let win = VorbisWindow::new(256, 2048);
        let mut short = Vec::new();
        let mut long = Vec::new();
        win.fill(false, true, true, &mut short);
        win.fill(true, false, true, &mut long);
        // 长块左短斜坡 [448, 576) 与短窗上升沿 [0, 128) 完全一致
        assert_eq!(&long[448..576], &short[0..128]);
        assert!(long[..448].iter().all(|&v| v == 0.0));
    }
}
