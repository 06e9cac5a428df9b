//! 设置头: 码本、floor、residue、映射与模式.
//!
//! 短块与长块各有一套 floor/residue/映射, 模式 0 为短块, 模式 1 为长块.
//! 所有声道共用一个子映射, 不做声道耦合.

use pcmogg_core::{BitWriter, PcmOggResult};

use super::codebook::Codebook;
use super::floor::{FLOOR1_RANGE, Floor1Config};
use super::headers::VORBIS_MAGIC;
use super::quality::QualityProfile;
use super::residue::{CLASSBOOK_DIM, CLASSIFICATIONS, PARTITION_SIZE, ResidueBooks, ResidueConfig};

/// 设置头类型
const PACKET_SETUP: u8 = 0x05;
/// 块大小 [短, 长]
pub(crate) const BLOCKSIZES: [usize; 2] = [256, 2048];

pub(crate) const BOOK_FLOOR_Y: usize = 0;
pub(crate) const BOOK_CLASS: usize = 1;
pub(crate) const BOOK_UNIT: usize = 2;
pub(crate) const BOOK_SMALL: usize = 3;
pub(crate) const BOOK_COARSE9: usize = 4;
pub(crate) const BOOK_COARSE135: usize = 5;

/// 分类码字中单个分类的权重, 低类别更常见
const CLASS_WEIGHTS: [u64; CLASSIFICATIONS] = [16, 6, 4, 3, 1];

/// 完整的编码配置, 同时用于生成设置头与编码音频包
#[derive(Debug, Clone)]
pub(crate) struct VorbisSetup {
    pub(crate) books: Vec<Codebook>,
    /// 按块类型索引 (0 短, 1 长)
    pub(crate) floors: [Floor1Config; 2],
    pub(crate) residues: [ResidueConfig; 2],
}

impl VorbisSetup {
    pub(crate) fn new(profile: &QualityProfile, sample_rate: u32) -> PcmOggResult<Self> {
        let books = build_books()?;
        let residue_books = ResidueBooks {
            classbook: BOOK_CLASS,
            unit: BOOK_UNIT,
            small: BOOK_SMALL,
            coarse9: BOOK_COARSE9,
            coarse135: BOOK_COARSE135,
        };
        let floors = [
            Floor1Config::new(
                BLOCKSIZES[0] / 2,
                profile.short_floor_partitions,
                BOOK_FLOOR_Y,
            ),
            Floor1Config::new(BLOCKSIZES[1] / 2, profile.long_floor_partitions, BOOK_FLOOR_Y),
        ];
        let residues = BLOCKSIZES.map(|n| {
            ResidueConfig::new(
                residue_end(n / 2, profile.bandwidth_hz, sample_rate),
                residue_books,
            )
        });
        Ok(Self {
            books,
            floors,
            residues,
        })
    }

    /// 生成设置头包
    pub(crate) fn header_packet(&self) -> Vec<u8> {
        let mut bw = BitWriter::with_capacity(4096);
        bw.write_bits(u32::from(PACKET_SETUP), 8);
        bw.write_bytes(VORBIS_MAGIC);

        bw.write_bits(self.books.len() as u32 - 1, 8);
        for book in &self.books {
            book.write(&mut bw);
        }

        // 时域变换: 1 个, 类型 0 (占位)
        bw.write_bits(0, 6);
        bw.write_bits(0, 16);

        bw.write_bits(self.floors.len() as u32 - 1, 6);
        for floor in &self.floors {
            bw.write_bits(1, 16);
            floor.write(&mut bw);
        }

        bw.write_bits(self.residues.len() as u32 - 1, 6);
        for residue in &self.residues {
            bw.write_bits(1, 16);
            residue.write(&mut bw);
        }

        // 映射 m 使用 floor m 与 residue m
        bw.write_bits(BLOCKSIZES.len() as u32 - 1, 6);
        for m in 0..BLOCKSIZES.len() {
            bw.write_bits(0, 16);
            bw.write_bit(false); // 单子映射
            bw.write_bit(false); // 无耦合
            bw.write_bits(0, 2);
            bw.write_bits(0, 8);
            bw.write_bits(m as u32, 8);
            bw.write_bits(m as u32, 8);
        }

        // 模式 m: 块标志 m, 窗类型 0, 变换类型 0, 映射 m
        bw.write_bits(BLOCKSIZES.len() as u32 - 1, 6);
        for m in 0..BLOCKSIZES.len() {
            bw.write_bit(m == 1);
            bw.write_bits(0, 16);
            bw.write_bits(0, 16);
            bw.write_bits(m as u32, 8);
        }

        bw.write_bit(true); // framing
        bw.finish()
    }
}

/// 残差编码上界: 带宽对应的频点, 向下取整到 32 的倍数
fn residue_end(n2: usize, bandwidth_hz: f32, sample_rate: u32) -> usize {
    let step = PARTITION_SIZE * CLASSBOOK_DIM;
    let nyquist = sample_rate as f32 / 2.0;
    let bins = (bandwidth_hz / nyquist * n2 as f32) as usize;
    (bins / step * step).clamp(step, n2)
}

fn build_books() -> PcmOggResult<Vec<Codebook>> {
    let y_weights: Vec<u64> = (0..FLOOR1_RANGE as u64).map(|v| 1024 / (v + 2)).collect();
    let class_weights: Vec<u64> = (0..CLASSIFICATIONS * CLASSIFICATIONS)
        .map(|e| CLASS_WEIGHTS[e / CLASSIFICATIONS] * CLASS_WEIGHTS[e % CLASSIFICATIONS])
        .collect();
    let coarse = |d: &[i32]| 1u64 << (14 - d[0].abs() - d[1].abs());

    Ok(vec![
        Codebook::new(1, &y_weights, None)?,
        Codebook::new(CLASSBOOK_DIM as u32, &class_weights, None)?,
        Codebook::symmetric_lattice(4, 3, 1, |d| {
            1 << (2 * d.iter().filter(|&&v| v == 0).count())
        })?,
        Codebook::symmetric_lattice(2, 9, 1, |d| 1 << (8 - d[0].abs() - d[1].abs()))?,
        Codebook::symmetric_lattice(2, 15, 9, coarse)?,
        Codebook::symmetric_lattice(2, 15, 135, coarse)?,
    ])
}
