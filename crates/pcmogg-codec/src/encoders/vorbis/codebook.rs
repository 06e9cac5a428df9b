//! Vorbis 码本.
//!
//! 码长由确定性的权重经 Huffman 构造得到, 码字按 Vorbis 规定的顺序分配
//! (与解码端从码长重建的树完全一致). 矢量码本使用格型查找表 (lookup type 1).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use pcmogg_core::{BitWriter, PcmOggError, PcmOggResult};

/// 码本同步字 "BCV"
pub(crate) const CODEBOOK_SYNC: u32 = 0x56_4342;
/// 允许的最大码长
const MAX_CODEWORD_LEN: u8 = 32;

/// 格型 VQ 参数
///
/// 第 j 维取值为 `min + delta * digit_j`, digit_j ∈ [0, values).
#[derive(Debug, Clone)]
pub(crate) struct Lattice {
    pub(crate) min: f32,
    pub(crate) delta: f32,
    /// 每维可取值个数 L, 满足 L^dim == entries
    pub(crate) values: u32,
}

impl Lattice {
    /// 关于 0 对称的整数格 (-half*delta .. half*delta)
    pub(crate) fn symmetric(values: u32, delta: u32) -> Self {
        let half = (values - 1) / 2;
        Self {
            min: -((half * delta) as f32),
            delta: delta as f32,
            values,
        }
    }

    fn value_bits(&self) -> u32 {
        ilog(self.values - 1)
    }
}

/// 已构建的码本
#[derive(Debug, Clone)]
pub(crate) struct Codebook {
    pub(crate) dimensions: u32,
    pub(crate) entries: u32,
    pub(crate) lengths: Vec<u8>,
    codewords: Vec<u32>,
    pub(crate) lattice: Option<Lattice>,
}

impl Codebook {
    /// 由每个条目的权重构建码本
    pub(crate) fn new(
        dimensions: u32,
        weights: &[u64],
        lattice: Option<Lattice>,
    ) -> PcmOggResult<Self> {
        if let Some(l) = &lattice {
            if (l.values as u64).pow(dimensions) != weights.len() as u64 {
                return Err(PcmOggError::Internal(format!(
                    "格型码本条目数不匹配: {}^{} != {}",
                    l.values,
                    dimensions,
                    weights.len()
                )));
            }
        }
        let lengths = huffman_lengths(weights)?;
        let codewords = make_codewords(&lengths)?;
        Ok(Self {
            dimensions,
            entries: weights.len() as u32,
            lengths,
            codewords,
            lattice,
        })
    }

    /// 构建对称格型码本, 权重由中心化后的各维取值决定
    pub(crate) fn symmetric_lattice(
        dimensions: u32,
        values: u32,
        delta: u32,
        weight: impl Fn(&[i32]) -> u64,
    ) -> PcmOggResult<Self> {
        let entries = values.pow(dimensions);
        let half = ((values - 1) / 2) as i32;
        let mut digits = vec![0i32; dimensions as usize];
        let weights: Vec<u64> = (0..entries)
            .map(|entry| {
                let mut e = entry;
                for d in digits.iter_mut() {
                    *d = (e % values) as i32 - half;
                    e /= values;
                }
                weight(&digits)
            })
            .collect();
        Self::new(dimensions, &weights, Some(Lattice::symmetric(values, delta)))
    }

    /// 中心化取值 (每维 -half..=half) 对应的条目号, 第 0 维为最低位
    pub(crate) fn lattice_entry(&self, digits: &[i32]) -> u32 {
        let values = self.lattice.as_ref().map_or(1, |l| l.values);
        let half = ((values - 1) / 2) as i32;
        digits
            .iter()
            .rev()
            .fold(0u32, |acc, &d| acc * values + (d + half) as u32)
    }

    /// 写出一个条目的码字
    pub(crate) fn encode(&self, bw: &mut BitWriter, entry: u32) {
        let idx = entry as usize;
        debug_assert!(idx < self.codewords.len(), "码本条目越界: {entry}");
        bw.write_codeword(self.codewords[idx], u32::from(self.lengths[idx]));
    }

    /// 写出码本头部
    pub(crate) fn write(&self, bw: &mut BitWriter) {
        bw.write_bits(CODEBOOK_SYNC, 24);
        bw.write_bits(self.dimensions, 16);
        bw.write_bits(self.entries, 24);
        bw.write_bit(false); // ordered
        bw.write_bit(false); // sparse
        for &len in &self.lengths {
            bw.write_bits(u32::from(len) - 1, 5);
        }
        match &self.lattice {
            None => bw.write_bits(0, 4),
            Some(l) => {
                let bits = l.value_bits();
                bw.write_bits(1, 4);
                bw.write_bits(float32_pack(l.min), 32);
                bw.write_bits(float32_pack(l.delta), 32);
                bw.write_bits(bits - 1, 4);
                bw.write_bit(false); // sequence_p
                for m in 0..l.values {
                    bw.write_bits(m, bits);
                }
            }
        }
    }
}

/// 整数的位宽 (ilog(0) = 0)
pub(crate) fn ilog(v: u32) -> u32 {
    32 - v.leading_zeros()
}

/// 由权重构造 Huffman 码长
///
/// 权重相同时按条目序号决胜, 结果完全确定.
pub(crate) fn huffman_lengths(weights: &[u64]) -> PcmOggResult<Vec<u8>> {
    let n = weights.len();
    if n < 2 {
        return Err(PcmOggError::Internal(format!("码本条目过少: {n}")));
    }
    let mut parent = vec![usize::MAX; 2 * n - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Reverse((w.max(1), i)))
        .collect();
    let mut next = n;
    while let (Some(Reverse((wa, a))), Some(Reverse((wb, b)))) = (heap.pop(), heap.pop()) {
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((wa + wb, next)));
        next += 1;
    }

    let root = next - 1;
    let mut lengths = Vec::with_capacity(n);
    for leaf in 0..n {
        let mut depth = 0u8;
        let mut node = leaf;
        while node != root {
            node = parent[node];
            depth += 1;
        }
        if depth > MAX_CODEWORD_LEN {
            return Err(PcmOggError::Internal(format!("码长 {depth} 超过 32")));
        }
        lengths.push(depth);
    }
    Ok(lengths)
}

/// 按 Vorbis 规则由码长分配码字
///
/// 返回的码字以最高位为树根方向. 码长必须描述一棵满二叉树,
/// 过满或不满都会被拒绝 (解码端同样会拒绝).
pub(crate) fn make_codewords(lengths: &[u8]) -> PcmOggResult<Vec<u32>> {
    let mut marker = [0u32; 33];
    let mut codewords = Vec::with_capacity(lengths.len());

    for &len in lengths {
        let len = len as usize;
        if len == 0 || len > 32 {
            return Err(PcmOggError::Internal(format!("非法码长 {len}")));
        }
        let mut entry = marker[len];
        if len < 32 && (entry >> len) != 0 {
            return Err(PcmOggError::Internal("码长描述的 Huffman 树过满".into()));
        }
        codewords.push(entry);

        // 占用该节点: 向上寻找下一个可用的兄弟分支
        for j in (1..=len).rev() {
            if marker[j] & 1 == 1 {
                if j == 1 {
                    marker[1] = marker[1].wrapping_add(1);
                } else {
                    marker[j] = marker[j - 1] << 1;
                }
                break;
            }
            marker[j] = marker[j].wrapping_add(1);
        }

        // 挂在刚占用节点下的更长标记改挂到新节点
        for j in len + 1..33 {
            if marker[j] >> 1 == entry {
                entry = marker[j];
                marker[j] = marker[j - 1] << 1;
            } else {
                break;
            }
        }
    }

    for (i, &m) in marker.iter().enumerate().skip(1) {
        if m & (u32::MAX >> (32 - i)) != 0 {
            return Err(PcmOggError::Internal("码长描述的 Huffman 树不满".into()));
        }
    }
    Ok(codewords)
}

/// Vorbis 码本浮点格式: 1 位符号, 10 位指数 (偏置 788), 21 位尾数
pub(crate) fn float32_pack(value: f32) -> u32 {
    if value == 0.0 {
        return 0;
    }
    let sign = if value < 0.0 { 0x8000_0000u32 } else { 0 };
    let v = f64::from(value.abs());
    let exp = (v.log2() + 0.001).floor() as i32;
    let mant = (v * 2f64.powi(20 - exp)).round() as u32;
    sign | (((exp + 768) as u32) << 21) | (mant & 0x1F_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float32_unpack(x: u32) -> f64 {
        let mant = f64::from(x & 0x1F_FFFF);
        let exp = ((x & 0x7FE0_0000) >> 21) as i32;
        let v = mant * 2f64.powi(exp - 788);
        if x & 0x8000_0000 != 0 { -v } else { v }
    }

    #[test]
    fn test_码字分配_标准示例() {
        // 码长 [2,4,4,4,4,2,3,3] 对应码字 00 0100 0101 0110 0111 10 110 111
        let cw = make_codewords(&[2, 4, 4, 4, 4, 2, 3, 3]).unwrap();
        assert_eq!(cw, vec![0b00, 0b0100, 0b0101, 0b0110, 0b0111, 0b10, 0b110, 0b111]);
    }

    #[test]
    fn test_码字分配_拒绝不满与过满() {
        assert!(make_codewords(&[1, 2]).is_err());
        assert!(make_codewords(&[1, 1, 1]).is_err());
    }

    #[test]
    fn test_huffman_码长满足_kraft_等式() {
        let weights: Vec<u64> = (0..128u64).map(|v| 1024 / (v + 2)).collect();
        let lengths = huffman_lengths(&weights).unwrap();
        let kraft: f64 = lengths.iter().map(|&l| 0.5f64.powi(i32::from(l))).sum();
        assert!((kraft - 1.0).abs() < 1e-12);
        // 权重大的条目码长不更长
        assert!(lengths[0] <= lengths[127]);
        assert!(make_codewords(&lengths).is_ok());
    }

    #[test]
    fn test_huffman_确定性() {
        let weights = vec![5u64; 25];
        assert_eq!(huffman_lengths(&weights).unwrap(), huffman_lengths(&weights).unwrap());
    }

    #[test]
    fn test_浮点打包() {
        for &v in &[1.0f32, -1.0, -4.0, 9.0, -63.0, 135.0, -945.0, 0.5] {
            assert_eq!(float32_unpack(float32_pack(v)), f64::from(v), "v={v}");
        }
        // 1.0: 指数 768, 尾数 2^20
        assert_eq!(float32_pack(1.0), (768 << 21) | (1 << 20));
    }

    #[test]
    fn test_格型条目编号() {
        let book = Codebook::symmetric_lattice(2, 9, 1, |_| 1).unwrap();
        assert_eq!(book.entries, 81);
        // 第 0 维为最低位
        assert_eq!(book.lattice_entry(&[-4, -4]), 0);
        assert_eq!(book.lattice_entry(&[-3, -4]), 1);
        assert_eq!(book.lattice_entry(&[-4, -3]), 9);
        assert_eq!(book.lattice_entry(&[4, 4]), 80);
    }

    #[test]
    fn test_码本头部长度() {
        let book = Codebook::symmetric_lattice(4, 3, 1, |d| {
            1 << (2 * d.iter().filter(|&&v| v == 0).count())
        })
        .unwrap();
        let mut bw = BitWriter::new();
        book.write(&mut bw);
        // 24+16+24+1+1 + 81*5 + 4 + 32+32+4+1 + 3*2
        assert_eq!(bw.bits_written(), 66 + 405 + 4 + 69 + 6);
    }

    #[test]
    fn test_ilog() {
        assert_eq!(ilog(0), 0);
        assert_eq!(ilog(1), 1);
        assert_eq!(ilog(127), 7);
        assert_eq!(ilog(128), 8);
    }
}
