//! 正向 MDCT.
//!
//! X[k] = (4/N) * sum_j x[j] * cos(2π/N * (j + 1/2 + N/4) * (k + 1/2)), k ∈ [0, N/2)
//!
//! 先把 N 点输入折叠成 N/2 点 DCT-IV, 再用 N/4 点复数 FFT 计算.
//! 4/N 的缩放与解码端不带缩放的 IMDCT 配合, 经功率互补窗重叠相加后可完美重建.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, Default)]
struct Complex {
    re: f32,
    im: f32,
}

impl Complex {
    fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    fn mul(self, o: Self) -> Self {
        Self {
            re: self.re * o.re - self.im * o.im,
            im: self.re * o.im + self.im * o.re,
        }
    }

    fn add(self, o: Self) -> Self {
        Self::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Self) -> Self {
        Self::new(self.re - o.re, self.im - o.im)
    }

    /// e^{-iθ}
    fn expi_neg(theta: f64) -> Self {
        Self::new(theta.cos() as f32, -theta.sin() as f32)
    }
}

/// 基 2 迭代复数 FFT (正变换, 核 e^{-2πi nk/N})
struct Fft {
    n: usize,
    twiddles: Vec<Complex>,
    bitrev: Vec<usize>,
}

impl Fft {
    fn new(n: usize) -> Self {
        debug_assert!(n.is_power_of_two());
        let bits = n.trailing_zeros();
        let bitrev = (0..n)
            .map(|i| {
                if bits == 0 {
                    0
                } else {
                    i.reverse_bits() >> (usize::BITS - bits)
                }
            })
            .collect();
        let twiddles = (0..n / 2)
            .map(|k| Complex::expi_neg(2.0 * PI * k as f64 / n as f64))
            .collect();
        Self {
            n,
            twiddles,
            bitrev,
        }
    }

    fn process(&self, buf: &mut [Complex]) {
        let n = self.n;
        for i in 0..n {
            let j = self.bitrev[i];
            if i < j {
                buf.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let step = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let w = self.twiddles[k * step];
                    let a = buf[start + k];
                    let b = buf[start + k + half].mul(w);
                    buf[start + k] = a.add(b);
                    buf[start + k + half] = a.sub(b);
                }
            }
            len <<= 1;
        }
    }
}

/// 固定长度的正向 MDCT
pub(crate) struct Mdct {
    /// 输入长度 N
    n: usize,
    /// 预旋转 e^{-iπm/M}, M = N/2
    pre: Vec<Complex>,
    /// 后旋转 e^{-iπ(p+1/4)/M}
    post: Vec<Complex>,
    fft: Fft,
    folded: Vec<f32>,
    scratch: Vec<Complex>,
}

impl Mdct {
    pub(crate) fn new(n: usize) -> Self {
        let m = n / 2;
        let q = n / 4;
        let pre = (0..q)
            .map(|i| Complex::expi_neg(PI * i as f64 / m as f64))
            .collect();
        let post = (0..q)
            .map(|p| Complex::expi_neg(PI * (p as f64 + 0.25) / m as f64))
            .collect();
        Self {
            n,
            pre,
            post,
            fft: Fft::new(q),
            folded: vec![0.0; m],
            scratch: vec![Complex::default(); q],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.n
    }

    /// 对已加窗的 N 点输入做变换, 输出 N/2 个系数
    pub(crate) fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        let n = self.n;
        let m = n / 2;
        let q = n / 4;
        debug_assert_eq!(input.len(), n);
        debug_assert_eq!(output.len(), m);

        // 输入分为 a b c d 四段, 折叠为 (-c_r - d, a - b_r)
        for i in 0..q {
            self.folded[i] = -input[3 * q - 1 - i] - input[3 * q + i];
            self.folded[q + i] = input[i] - input[2 * q - 1 - i];
        }

        for (i, z) in self.scratch.iter_mut().enumerate() {
            let v = Complex::new(self.folded[2 * i], self.folded[m - 1 - 2 * i]);
            *z = v.mul(self.pre[i]);
        }
        self.fft.process(&mut self.scratch);

        let scale = 4.0 / n as f32;
        for (p, z) in self.scratch.iter().enumerate() {
            let w = z.mul(self.post[p]);
            output[2 * p] = w.re * scale;
            output[m - 1 - 2 * p] = -w.im * scale;
        }
    }
}
