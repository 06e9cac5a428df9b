//! Floor 1 曲线拟合与编码.
//!
//! 每个后 (post) 的目标值取其附近频谱包络减去噪声余量, 且不低于绝对阈值.
//! 编码值的选取保证解码端按预测规则重建出的 Y 与目标完全一致,
//! 然后用解码端相同的整数画线算法渲染曲线, 残差以该曲线归一化.

use std::collections::VecDeque;

use pcmogg_core::BitWriter;

use super::codebook::Codebook;

/// Y 值乘数
pub(crate) const FLOOR1_MULTIPLIER: i32 = 2;
/// 乘数 2 对应的 Y 取值范围
pub(crate) const FLOOR1_RANGE: i32 = 128;
/// 每个分区的后数
pub(crate) const FLOOR1_CLASS_DIM: usize = 3;
/// 前两个后的直接编码位数 ilog(range - 1)
const Y_BITS: u32 = 7;
/// 后位置曲线的弯曲度, 越大低频越密
const POST_CURVE: f64 = 5.0;

/// 拟合参数 (由质量决定)
#[derive(Debug, Clone, Copy)]
pub(crate) struct FloorParams {
    /// 包络到 floor 的线性增益 (噪声余量)
    pub(crate) gain: f32,
    /// 绝对阈值 (线性幅度)
    pub(crate) ath_amp: f32,
    /// 与预测值相差不超过该值时直接沿用预测
    pub(crate) tolerance: i32,
}

/// 一个声道的拟合结果
#[derive(Debug, Clone)]
pub(crate) struct FloorFit {
    /// 按头部顺序的编码值: 前两个为 Y, 其余为相对预测的编码
    pub(crate) coded: Vec<u32>,
    /// 解码端将得到的 floor 曲线 (线性幅度, 长度 n/2)
    pub(crate) curve: Vec<f32>,
}

/// Floor 1 配置 (一个块长一份)
#[derive(Debug, Clone)]
pub(crate) struct Floor1Config {
    /// 半块长 n/2
    n2: usize,
    rangebits: u32,
    /// 头部顺序的 X, 前两个为 0 与 n/2
    xs: Vec<i32>,
    /// 按 X 升序排列的后下标
    sorted: Vec<usize>,
    /// 每个后的 (低邻居, 高邻居), 仅对下标 >= 2 有意义
    neighbors: Vec<(usize, usize)>,
    /// 每个后用于估计包络的频点区间
    bands: Vec<(usize, usize)>,
    /// Y 值码本编号
    y_book: usize,
}

impl Floor1Config {
    /// `partitions` 个分区, 每分区 3 个后
    pub(crate) fn new(n2: usize, partitions: usize, y_book: usize) -> Self {
        let count = partitions * FLOOR1_CLASS_DIM;
        let positions = post_positions(n2, count);

        let mut xs = vec![0i32, n2 as i32];
        xs.extend(coding_order(&positions));

        let mut sorted: Vec<usize> = (0..xs.len()).collect();
        sorted.sort_by_key(|&i| xs[i]);

        let neighbors = (0..xs.len())
            .map(|i| if i < 2 { (0, 1) } else { find_neighbors(&xs, i) })
            .collect();

        let mut bands = vec![(0usize, 1usize); xs.len()];
        for (s, &i) in sorted.iter().enumerate() {
            let x = xs[i] as usize;
            let prev = if s == 0 { x } else { xs[sorted[s - 1]] as usize };
            let next = if s + 1 == sorted.len() { n2 } else { xs[sorted[s + 1]] as usize };
            let lo = ((prev + x) / 2).min(n2 - 1);
            let hi = ((x + next).div_ceil(2)).clamp(lo + 1, n2);
            bands[i] = (lo, hi);
        }

        Self {
            n2,
            rangebits: n2.trailing_zeros(),
            xs,
            sorted,
            neighbors,
            bands,
            y_book,
        }
    }

    /// 后的总数 (含两端)
    pub(crate) fn posts(&self) -> usize {
        self.xs.len()
    }

    /// 写出 floor 1 头部 (不含类型号)
    pub(crate) fn write(&self, bw: &mut BitWriter) {
        let partitions = (self.xs.len() - 2) / FLOOR1_CLASS_DIM;
        bw.write_bits(partitions as u32, 5);
        for _ in 0..partitions {
            bw.write_bits(0, 4);
        }
        // 唯一的类别 0: 维度 3, 无子类, 子类码本为 Y 值码本
        bw.write_bits(FLOOR1_CLASS_DIM as u32 - 1, 3);
        bw.write_bits(0, 2);
        bw.write_bits(self.y_book as u32 + 1, 8);
        bw.write_bits(FLOOR1_MULTIPLIER as u32 - 1, 2);
        bw.write_bits(self.rangebits, 4);
        for &x in &self.xs[2..] {
            bw.write_bits(x as u32, self.rangebits);
        }
    }

    /// 拟合一个声道的频谱
    ///
    /// 频谱峰值低于绝对阈值时返回 `None`, 该声道在包中标记为未使用.
    pub(crate) fn fit(&self, spectrum: &[f32], params: &FloorParams) -> Option<FloorFit> {
        debug_assert_eq!(spectrum.len(), self.n2);
        let peak = spectrum.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        if peak < params.ath_amp {
            return None;
        }

        let targets: Vec<i32> = self
            .bands
            .iter()
            .map(|&(lo, hi)| {
                let band = &spectrum[lo..hi];
                let (sum, max) = band
                    .iter()
                    .fold((0.0f32, 0.0f32), |(s, m), &v| (s + v * v, m.max(v.abs())));
                let rms = (sum / band.len() as f32).sqrt();
                let envelope = (rms * max).sqrt();
                amplitude_to_y((envelope * params.gain).max(params.ath_amp))
            })
            .collect();

        let posts = self.xs.len();
        let mut final_y = vec![0i32; posts];
        let mut used = vec![false; posts];
        let mut coded = vec![0u32; posts];
        for i in 0..2 {
            final_y[i] = targets[i];
            used[i] = true;
            coded[i] = targets[i] as u32;
        }
        for i in 2..posts {
            let (lo, hi) = self.neighbors[i];
            let predicted =
                render_point(self.xs[lo], final_y[lo], self.xs[hi], final_y[hi], self.xs[i]);
            let mut target = targets[i];
            if (target - predicted).abs() <= params.tolerance {
                target = predicted;
            }
            let v = encode_y(target, predicted);
            coded[i] = v;
            if v != 0 {
                used[lo] = true;
                used[hi] = true;
                used[i] = true;
                final_y[i] = target;
            } else {
                final_y[i] = predicted;
            }
        }

        let curve = self.render(&final_y, &used);
        Some(FloorFit { coded, curve })
    }

    /// 写出一个声道的 floor 包数据
    pub(crate) fn write_packet(
        &self,
        bw: &mut BitWriter,
        books: &[Codebook],
        fit: Option<&FloorFit>,
    ) {
        let Some(fit) = fit else {
            bw.write_bit(false);
            return;
        };
        bw.write_bit(true);
        bw.write_bits(fit.coded[0], Y_BITS);
        bw.write_bits(fit.coded[1], Y_BITS);
        let book = &books[self.y_book];
        for &v in &fit.coded[2..] {
            book.encode(bw, v);
        }
    }

    /// 按解码端的方式渲染曲线
    fn render(&self, final_y: &[i32], used: &[bool]) -> Vec<f32> {
        let mut idx = Vec::with_capacity(self.n2 + 1);
        let mut lx = 0i32;
        let mut ly = final_y[0] * FLOOR1_MULTIPLIER;
        for &i in &self.sorted[1..] {
            if used[i] {
                let hx = self.xs[i];
                let hy = final_y[i] * FLOOR1_MULTIPLIER;
                render_line(lx, ly, hx, hy, &mut idx);
                lx = hx;
                ly = hy;
            }
        }
        idx.resize(self.n2, ly);
        idx.iter()
            .map(|&v| FLOOR1_INVERSE_DB_TABLE[v.clamp(0, 255) as usize])
            .collect()
    }
}

/// 在 (0, n2) 内生成互不相同的后位置, 低频密集
fn post_positions(n2: usize, count: usize) -> Vec<i32> {
    let denom = POST_CURVE.exp2() - 1.0;
    let mut xs: Vec<i32> = (1..=count)
        .map(|i| {
            let u = i as f64 / (count + 1) as f64;
            (((POST_CURVE * u).exp2() - 1.0) / denom * n2 as f64).round() as i32
        })
        .collect();
    let mut prev = 0;
    for x in xs.iter_mut() {
        *x = (*x).max(prev + 1);
        prev = *x;
    }
    let mut next = n2 as i32;
    for x in xs.iter_mut().rev() {
        *x = (*x).min(next - 1);
        next = *x;
    }
    xs
}

/// 按区间中点逐层细分的编码顺序, 使每个后的邻居都已先行编码
fn coding_order(sorted: &[i32]) -> Vec<i32> {
    let mut out = Vec::with_capacity(sorted.len());
    let mut queue = VecDeque::from([(0usize, sorted.len())]);
    while let Some((lo, hi)) = queue.pop_front() {
        if lo >= hi {
            continue;
        }
        let mid = (lo + hi) / 2;
        out.push(sorted[mid]);
        queue.push_back((lo, mid));
        queue.push_back((mid + 1, hi));
    }
    out
}

fn find_neighbors(xs: &[i32], i: usize) -> (usize, usize) {
    let xi = xs[i];
    let mut low = 0usize;
    let mut high = 1usize;
    for (j, &xj) in xs.iter().enumerate().take(i) {
        if xj < xi && xj > xs[low] {
            low = j;
        }
        if xj > xi && xj < xs[high] {
            high = j;
        }
    }
    (low, high)
}

/// 线性幅度转换为 floor Y 值 (已除以乘数)
fn amplitude_to_y(amp: f32) -> i32 {
    let floor_db = 20.0 * FLOOR1_INVERSE_DB_TABLE[0].log10();
    let db = 20.0 * amp.max(FLOOR1_INVERSE_DB_TABLE[0]).log10();
    let idx = (db - floor_db) / -floor_db * 255.0;
    ((idx / FLOOR1_MULTIPLIER as f32).round() as i32).clamp(0, FLOOR1_RANGE - 1)
}

/// 求编码值, 使解码端由预测值还原出 `target`
fn encode_y(target: i32, predicted: i32) -> u32 {
    let highroom = FLOOR1_RANGE - predicted;
    let lowroom = predicted;
    let room = 2 * highroom.min(lowroom);
    let d = target - predicted;
    let v = if d == 0 {
        0
    } else if d > 0 && 2 * d < room {
        2 * d
    } else if d < 0 && -2 * d - 1 < room {
        -2 * d - 1
    } else if highroom > lowroom {
        target
    } else {
        FLOOR1_RANGE - 1 - target
    };
    v as u32
}

fn render_point(x0: i32, y0: i32, x1: i32, y1: i32, x: i32) -> i32 {
    if x1 == x0 {
        return y0;
    }
    let dy = y1 - y0;
    let adx = x1 - x0;
    let off = dy.abs() * (x - x0) / adx;
    if dy < 0 { y0 - off } else { y0 + off }
}

/// 整数画线, 输出 [x0, x1) 上的值
fn render_line(x0: i32, y0: i32, x1: i32, y1: i32, out: &mut Vec<i32>) {
    if x1 <= x0 {
        return;
    }
    let dy = y1 - y0;
    let adx = x1 - x0;
    let base = dy / adx;
    let sy = if dy < 0 { base - 1 } else { base + 1 };
    let ady = dy.abs() - base.abs() * adx;
    let mut y = y0;
    let mut err = 0;
    out.push(y);
    for _ in (x0 + 1)..x1 {
        err += ady;
        if err >= adx {
            err -= adx;
            y += sy;
        } else {
            y += base;
        }
        out.push(y);
    }
}


#[allow(clippy::excessive_precision)]
static FLOOR1_INVERSE_DB_TABLE: &[f32; 256] = &[
    1.0649863e-07,
    1.1341951e-07,
    1.2079015e-07,
    1.2863978e-07,
    1.3699951e-07,
    1.4590251e-07,
    1.5538408e-07,
    1.6548181e-07,
    1.7623575e-07,
    1.8768855e-07,
    1.9988561e-07,
    2.1287530e-07,
    2.2670913e-07,
    2.4144197e-07,
    2.5713223e-07,
    2.7384213e-07,
    2.9163793e-07,
    3.1059021e-07,
    3.3077411e-07,
    3.5226968e-07,
    3.7516214e-07,
    3.9954229e-07,
    4.2550680e-07,
    4.5315863e-07,
    4.8260743e-07,
    5.1396998e-07,
    5.4737065e-07,
    5.8294187e-07,
    6.2082472e-07,
    6.6116941e-07,
    7.0413592e-07,
    7.4989464e-07,
    7.9862701e-07,
    8.5052630e-07,
    9.0579828e-07,
    9.6466216e-07,
    1.0273513e-06,
    1.0941144e-06,
    1.1652161e-06,
    1.2409384e-06,
    1.3215816e-06,
    1.4074654e-06,
    1.4989305e-06,
    1.5963394e-06,
    1.7000785e-06,
    1.8105592e-06,
    1.9282195e-06,
    2.0535261e-06,
    2.1869758e-06,
    2.3290978e-06,
    2.4804557e-06,
    2.6416497e-06,
    2.8133190e-06,
    2.9961443e-06,
    3.1908506e-06,
    3.3982101e-06,
    3.6190449e-06,
    3.8542308e-06,
    4.1047004e-06,
    4.3714470e-06,
    4.6555282e-06,
    4.9580707e-06,
    5.2802740e-06,
    5.6234160e-06,
    5.9888572e-06,
    6.3780469e-06,
    6.7925283e-06,
    7.2339451e-06,
    7.7040476e-06,
    8.2047000e-06,
    8.7378876e-06,
    9.3057248e-06,
    9.9104632e-06,
    1.0554501e-05,
    1.1240392e-05,
    1.1970856e-05,
    1.2748789e-05,
    1.3577278e-05,
    1.4459606e-05,
    1.5399272e-05,
    1.6400004e-05,
    1.7465768e-05,
    1.8600792e-05,
    1.9809576e-05,
    2.1096914e-05,
    2.2467911e-05,
    2.3928002e-05,
    2.5482978e-05,
    2.7139006e-05,
    2.8902651e-05,
    3.0780908e-05,
    3.2781225e-05,
    3.4911534e-05,
    3.7180282e-05,
    3.9596466e-05,
    4.2169667e-05,
    4.4910090e-05,
    4.7828601e-05,
    5.0936773e-05,
    5.4246931e-05,
    5.7772202e-05,
    6.1526565e-05,
    6.5524908e-05,
    6.9783085e-05,
    7.4317983e-05,
    7.9147585e-05,
    8.4291040e-05,
    8.9768747e-05,
    9.5602426e-05,
    1.0181521e-04,
    1.0843174e-04,
    1.1547824e-04,
    1.2298267e-04,
    1.3097477e-04,
    1.3948625e-04,
    1.4855085e-04,
    1.5820453e-04,
    1.6848555e-04,
    1.7943469e-04,
    1.9109536e-04,
    2.0351382e-04,
    2.1673929e-04,
    2.3082423e-04,
    2.4582449e-04,
    2.6179955e-04,
    2.7881275e-04,
    2.9693158e-04,
    3.1622787e-04,
    3.3677814e-04,
    3.5866388e-04,
    3.8197188e-04,
    4.0679456e-04,
    4.3323036e-04,
    4.6138411e-04,
    4.9136745e-04,
    5.2329927e-04,
    5.5730621e-04,
    5.9352311e-04,
    6.3209358e-04,
    6.7317058e-04,
    7.1691700e-04,
    7.6350630e-04,
    8.1312324e-04,
    8.6596457e-04,
    9.2223983e-04,
    9.8217216e-04,
    1.0459992e-03,
    1.1139742e-03,
    1.1863665e-03,
    1.2634633e-03,
    1.3455702e-03,
    1.4330129e-03,
    1.5261382e-03,
    1.6253153e-03,
    1.7309374e-03,
    1.8434235e-03,
    1.9632195e-03,
    2.0908006e-03,
    2.2266726e-03,
    2.3713743e-03,
    2.5254795e-03,
    2.6895994e-03,
    2.8643847e-03,
    3.0505286e-03,
    3.2487691e-03,
    3.4598925e-03,
    3.6847358e-03,
    3.9241906e-03,
    4.1792066e-03,
    4.4507950e-03,
    4.7400328e-03,
    5.0480668e-03,
    5.3761186e-03,
    5.7254891e-03,
    6.0975636e-03,
    6.4938176e-03,
    6.9158225e-03,
    7.3652516e-03,
    7.8438871e-03,
    8.3536271e-03,
    8.8964928e-03,
    9.4746370e-03,
    1.0090352e-02,
    1.0746080e-02,
    1.1444421e-02,
    1.2188144e-02,
    1.2980198e-02,
    1.3823725e-02,
    1.4722068e-02,
    1.5678791e-02,
    1.6697687e-02,
    1.7782797e-02,
    1.8938423e-02,
    2.0169149e-02,
    2.1479854e-02,
    2.2875735e-02,
    2.4362330e-02,
    2.5945531e-02,
    2.7631618e-02,
    2.9427276e-02,
    3.1339626e-02,
    3.3376252e-02,
    3.5545228e-02,
    3.7855157e-02,
    4.0315199e-02,
    4.2935108e-02,
    4.5725273e-02,
    4.8696758e-02,
    5.1861348e-02,
    5.5231591e-02,
    5.8820850e-02,
    6.2643361e-02,
    6.6714279e-02,
    7.1049749e-02,
    7.5666962e-02,
    8.0584227e-02,
    8.5821044e-02,
    9.1398179e-02,
    9.7337747e-02,
    1.0366330e-01,
    1.1039993e-01,
    1.1757434e-01,
    1.2521498e-01,
    1.3335215e-01,
    1.4201813e-01,
    1.5124727e-01,
    1.6107617e-01,
    1.7154380e-01,
    1.8269168e-01,
    1.9456402e-01,
    2.0720788e-01,
    2.2067342e-01,
    2.3501402e-01,
    2.5028656e-01,
    2.6655159e-01,
    2.8387361e-01,
    3.0232132e-01,
    3.2196786e-01,
    3.4289114e-01,
    3.6517414e-01,
    3.8890521e-01,
    4.1417847e-01,
    4.4109412e-01,
    4.6975890e-01,
    5.0028648e-01,
    5.3279791e-01,
    5.6742212e-01,
    6.0429640e-01,
    6.4356699e-01,
    6.8538959e-01,
    7.2993007e-01,
    7.7736504e-01,
    8.2788260e-01,
    8.8168307e-01,
    9.3897980e-01,
    1.0,
];
