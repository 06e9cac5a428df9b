//! 比特流写入器.
//!
//! 提供向字节缓冲区按位写入数据的能力, 是 Vorbis 打包器的基础设施.
//!
//! 按小端位序写入 (LSB first): 值的最低位先写, 每个字节从最低位开始填充,
//! 与 libogg 的 oggpack 位序一致.

/// 比特流写入器
///
/// 向字节缓冲区按位写入数据, 使用小端位序 (LSB first).
///
/// # 示例
/// ```
/// use pcmogg_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b0010, 4);
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0101_0101, 8);
/// let data = bw.finish();
/// assert_eq!(data, vec![0b1011_0010, 0b0101_0101]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 尚未落盘的位 (低位在前)
    acc: u64,
    /// acc 中有效位数 (0-7, 写入时临时可超过)
    acc_bits: u32,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定容量创建比特流写入器
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            acc: 0,
            acc_bits: 0,
        }
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.acc_bits as usize
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(u32::from(bit), 1);
    }

    /// 写入 N 个位 (最多 32 位)
    ///
    /// 值的低 N 位被写入, 低位在前.
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);

        if n == 0 {
            return;
        }
        let mask = if n >= 32 { u32::MAX } else { (1u32 << n) - 1 };
        self.acc |= u64::from(value & mask) << self.acc_bits;
        self.acc_bits += n;
        while self.acc_bits >= 8 {
            self.data.push(self.acc as u8);
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
    }

    /// 写入有符号整数 (二进制补码的低 N 位)
    pub fn write_bits_signed(&mut self, value: i32, n: u32) {
        self.write_bits(value as u32, n);
    }

    /// 按 Huffman 码字的书写顺序写入 (码字最高位先写)
    ///
    /// Vorbis 码本的码字按树的路径定义, 第一位是根节点的分支,
    /// 在 LSB 打包流中需要逐位反转后写入.
    pub fn write_codeword(&mut self, codeword: u32, length: u32) {
        debug_assert!(length <= 32);
        let mut reversed = 0u32;
        for i in 0..length {
            reversed |= ((codeword >> (length - 1 - i)) & 1) << i;
        }
        self.write_bits(reversed, length);
    }

    /// 写入完整字节 (任意位置均可, 不要求字节对齐)
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.acc_bits == 0 {
            self.data.extend_from_slice(bytes);
            return;
        }
        for &b in bytes {
            self.write_bits(u32::from(b), 8);
        }
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.acc_bits > 0 {
            self.data.push(self.acc as u8);
            self.acc = 0;
            self.acc_bits = 0;
        }
    }

    /// 完成写入, 返回字节数据
    ///
    /// 如果当前不在字节边界, 自动用 0 填充.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }

    /// 获取当前已完成的字节数据引用
    ///
    /// 注意: 不包括正在填充的当前字节.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_位序_低位在前() {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 1);
        bw.write_bits(0b001, 3);
        bw.write_bits(0b1011, 4);
        assert_eq!(bw.finish(), vec![0b1011_0010]);
    }

    #[test]
    fn test_跨字节写入() {
        let mut bw = BitWriter::new();
        bw.write_bits(0x3, 2);
        bw.write_bits(0x564342, 24);
        bw.write_bits(0x3F, 6);
        let data = bw.finish();
        // 0x564342 << 2 | 0x3, 然后 6 个 1
        let expected = ((0x3Fu64 << 26) | (0x564342u64 << 2) | 0x3).to_le_bytes();
        assert_eq!(data, expected[..4].to_vec());
    }

    #[test]
    fn test_写入32位() {
        let mut bw = BitWriter::new();
        bw.write_bits(1, 1);
        bw.write_bits(0xDEAD_BEEF, 32);
        assert_eq!(bw.bits_written(), 33);
        let data = bw.finish();
        let expected = ((0xDEAD_BEEFu64 << 1) | 1).to_le_bytes();
        assert_eq!(data, expected[..5].to_vec());
    }

    #[test]
    fn test_码字按路径顺序写入() {
        // 码字 "0100" (长度 4): 读取顺序为 0,1,0,0
        let mut bw = BitWriter::new();
        bw.write_codeword(0b0100, 4);
        assert_eq!(bw.finish(), vec![0b0010]);
    }

    #[test]
    fn test_非对齐字节写入与补齐() {
        let mut bw = BitWriter::new();
        bw.write_bit(true);
        bw.write_bytes(b"v");
        assert_eq!(bw.bits_written(), 9);
        let data = bw.finish();
        assert_eq!(data, vec![(b'v' << 1) | 1, b'v' >> 7]);
    }

    #[test]
    fn test_有符号写入() {
        let mut bw = BitWriter::new();
        bw.write_bits_signed(-1, 5);
        assert_eq!(bw.finish(), vec![0b1_1111]);
    }
}
