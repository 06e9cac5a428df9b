//! Residue 1 量化与编码.
//!
//! 频谱除以 floor 曲线后取整, 每 16 个系数为一个分区, 按最大幅度分为 5 类.
//! 大幅度分区拆成多级 (cascade) 叠加: 粗格 135 → 粗格 9 → 细格 ±4,
//! 解码端把各级码本矢量相加即得原值.

use pcmogg_core::BitWriter;

use super::codebook::Codebook;

/// 分区大小
pub(crate) const PARTITION_SIZE: usize = 16;
/// 分类数
pub(crate) const CLASSIFICATIONS: usize = 5;
/// 分类码本维度 (每个分类码字覆盖的分区数)
pub(crate) const CLASSBOOK_DIM: usize = 2;
/// 量化值上限 (7*135 + 7*9 + 4)
pub(crate) const MAX_RESIDUE: i32 = 1012;
/// 最多级数
const MAX_PASSES: usize = 3;

/// 各类别的最大幅度 (类别 0 为全零)
const CLASS_LIMITS: [i32; CLASSIFICATIONS] = [0, 1, 4, 67, MAX_RESIDUE];

/// 残差所用码本编号
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResidueBooks {
    pub(crate) classbook: usize,
    /// 维度 4, 取值 {-1, 0, 1}
    pub(crate) unit: usize,
    /// 维度 2, 取值 -4..=4
    pub(crate) small: usize,
    /// 维度 2, 取值 -63..=63 步长 9
    pub(crate) coarse9: usize,
    /// 维度 2, 取值 -945..=945 步长 135
    pub(crate) coarse135: usize,
}

/// Residue 1 配置
#[derive(Debug, Clone)]
pub(crate) struct ResidueConfig {
    begin: usize,
    end: usize,
    classbook: usize,
    /// 每个类别在各级使用的码本
    stages: [[Option<usize>; MAX_PASSES]; CLASSIFICATIONS],
}

impl ResidueConfig {
    /// `end` 必须是 分区大小 * 分类码本维度 的倍数
    pub(crate) fn new(end: usize, books: ResidueBooks) -> Self {
        debug_assert_eq!(end % (PARTITION_SIZE * CLASSBOOK_DIM), 0);
        Self {
            begin: 0,
            end,
            classbook: books.classbook,
            stages: [
                [None, None, None],
                [Some(books.unit), None, None],
                [Some(books.small), None, None],
                [Some(books.coarse9), Some(books.small), None],
                [Some(books.coarse135), Some(books.coarse9), Some(books.small)],
            ],
        }
    }

    /// 编码的频点上界
    pub(crate) fn end(&self) -> usize {
        self.end
    }

    fn cascade(&self, class: usize) -> u32 {
        self.stages[class]
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .fold(0u32, |acc, (pass, _)| acc | (1 << pass))
    }

    /// 写出 residue 头部 (不含类型号)
    pub(crate) fn write(&self, bw: &mut BitWriter) {
        bw.write_bits(self.begin as u32, 24);
        bw.write_bits(self.end as u32, 24);
        bw.write_bits(PARTITION_SIZE as u32 - 1, 24);
        bw.write_bits(CLASSIFICATIONS as u32 - 1, 6);
        bw.write_bits(self.classbook as u32, 8);
        for class in 0..CLASSIFICATIONS {
            let cascade = self.cascade(class);
            bw.write_bits(cascade & 7, 3);
            let high = cascade >> 3;
            bw.write_bit(high != 0);
            if high != 0 {
                bw.write_bits(high, 5);
            }
        }
        for stage in &self.stages {
            for book in stage.iter().flatten() {
                bw.write_bits(*book as u32, 8);
            }
        }
    }

    /// 量化: 频谱除以 floor 取整, 超出 `end` 的频点置零
    pub(crate) fn quantize(&self, spectrum: &[f32], floor: &[f32], out: &mut Vec<i32>) {
        out.clear();
        out.resize(spectrum.len(), 0);
        for k in self.begin..self.end.min(spectrum.len()) {
            let q = (spectrum[k] / floor[k]).round();
            out[k] = (q as i32).clamp(-MAX_RESIDUE, MAX_RESIDUE);
        }
    }

    /// 编码所有使用中声道的残差
    ///
    /// 位序: 逐级 → 逐分类码字 → (第 0 级先写各声道分类码字) → 逐分区 → 逐声道.
    pub(crate) fn write_packet(&self, bw: &mut BitWriter, books: &[Codebook], channels: &[&[i32]]) {
        if channels.is_empty() {
            return;
        }
        let partvals = (self.end - self.begin) / PARTITION_SIZE;

        let classes: Vec<Vec<usize>> = channels
            .iter()
            .map(|q| {
                (0..partvals)
                    .map(|p| {
                        let start = self.begin + p * PARTITION_SIZE;
                        classify(&q[start..start + PARTITION_SIZE])
                    })
                    .collect()
            })
            .collect();

        let mut digits = [0i32; PARTITION_SIZE];
        for pass in 0..MAX_PASSES {
            let mut p = 0;
            while p < partvals {
                if pass == 0 {
                    for ch_classes in &classes {
                        let word = (0..CLASSBOOK_DIM).fold(0usize, |acc, k| {
                            acc * CLASSIFICATIONS + ch_classes.get(p + k).copied().unwrap_or(0)
                        });
                        books[self.classbook].encode(bw, word as u32);
                    }
                }
                for _ in 0..CLASSBOOK_DIM {
                    if p >= partvals {
                        break;
                    }
                    for (q, ch_classes) in channels.iter().zip(&classes) {
                        let class = ch_classes[p];
                        let Some(book_idx) = self.stages[class][pass] else {
                            continue;
                        };
                        let start = self.begin + p * PARTITION_SIZE;
                        stage_digits(&q[start..start + PARTITION_SIZE], class, pass, &mut digits);
                        let book = &books[book_idx];
                        let dim = book.dimensions as usize;
                        for chunk in digits.chunks(dim) {
                            book.encode(bw, book.lattice_entry(chunk));
                        }
                    }
                    p += 1;
                }
            }
        }
    }
}

/// 按最大幅度分类
fn classify(partition: &[i32]) -> usize {
    let peak = partition.iter().map(|v| v.abs()).max().unwrap_or(0);
    CLASS_LIMITS
        .iter()
        .position(|&limit| peak <= limit)
        .unwrap_or(CLASSIFICATIONS - 1)
}

/// 四舍五入的整数除法 (对称)
fn round_div(v: i32, step: i32) -> i32 {
    if v >= 0 {
        (v + step / 2) / step
    } else {
        -((-v + step / 2) / step)
    }
}

/// 求分区在某一级的格点 (已中心化, 与码本 lattice_entry 对应)
fn stage_digits(values: &[i32], class: usize, pass: usize, out: &mut [i32; PARTITION_SIZE]) {
    for (d, &v) in out.iter_mut().zip(values) {
        *d = match (class, pass) {
            (1 | 2, 0) => v,
            (3, 0) => round_div(v, 9).clamp(-7, 7),
            (3, 1) => v - 9 * round_div(v, 9).clamp(-7, 7),
            (4, 0) => round_div(v, 135).clamp(-7, 7),
            (4, 1) => {
                let r = v - 135 * round_div(v, 135).clamp(-7, 7);
                round_div(r, 9).clamp(-7, 7)
            }
            (4, 2) => {
                let r = v - 135 * round_div(v, 135).clamp(-7, 7);
                r - 9 * round_div(r, 9).clamp(-7, 7)
            }
            _ => 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(v: i32, class: usize) -> i32 {
        let mut out = [0i32; PARTITION_SIZE];
        let values = [v; PARTITION_SIZE];
        let steps = [[0, 0, 0], [1, 0, 0], [1, 0, 0], [9, 1, 0], [135, 9, 1]];
        let mut sum = 0;
        for pass in 0..MAX_PASSES {
            stage_digits(&values, class, pass, &mut out);
            let step = steps[class][pass];
            if step != 0 {
                let bound = match (step, class) {
                    (1, 1) => 1,
                    (1, _) => 4,
                    _ => 7,
                };
                assert!(out[0].abs() <= bound);
            }
            sum += out[0] * step;
        }
        sum
    }

    #[test]
    fn test_分类() {
        assert_eq!(classify(&[0; 16]), 0);
        assert_eq!(classify(&[0, 1, -1, 0]), 1);
        assert_eq!(classify(&[4, -3]), 2);
        assert_eq!(classify(&[-67]), 3);
        assert_eq!(classify(&[68]), 4);
        assert_eq!(classify(&[-MAX_RESIDUE]), 4);
    }

    #[test]
    fn test_多级分解可还原() {
        for v in -MAX_RESIDUE..=MAX_RESIDUE {
            let class = classify(&[v]);
            assert_eq!(reconstruct(v, class), v, "v={v}");
        }
    }

    #[test]
    fn test_量化截断与带宽() {
        let books = ResidueBooks {
            classbook: 1,
            unit: 2,
            small: 3,
            coarse9: 4,
            coarse135: 5,
        };
        let cfg = ResidueConfig::new(32, books);
        let spectrum = vec![10.0f32; 64];
        let floor = vec![0.001f32; 64];
        let mut q = Vec::new();
        cfg.quantize(&spectrum, &floor, &mut q);
        assert_eq!(q.len(), 64);
        assert!(q[..32].iter().all(|&v| v == MAX_RESIDUE));
        assert!(q[32..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_cascade_位图() {
        let books = ResidueBooks {
            classbook: 1,
            unit: 2,
            small: 3,
            coarse9: 4,
            coarse135: 5,
        };
        let cfg = ResidueConfig::new(64, books);
        assert_eq!(cfg.cascade(0), 0);
        assert_eq!(cfg.cascade(1), 0b001);
        assert_eq!(cfg.cascade(3), 0b011);
        assert_eq!(cfg.cascade(4), 0b111);
        let mut bw = BitWriter::new();
        cfg.write(&mut bw);
        // 24*3 + 6 + 8 + 5*4 + 7 个码本号 * 8
        assert_eq!(bw.bits_written(), 72 + 14 + 20 + 56);
    }
}
