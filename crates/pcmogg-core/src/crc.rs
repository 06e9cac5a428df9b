//! CRC 校验和计算.
//!
//! Ogg 页面使用的 CRC-32: 多项式 0x04C11DB7, 初始值 0, 不反射, 无最终异或.
//! 计算时页头中的校验和字段必须置零.

/// CRC-32 查找表 (多项式 0x04C11DB7)
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// 在已有校验值上继续累加数据
///
/// 页头和页体分开存放时, 可先算页头再接着算页体.
pub fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let idx = ((crc >> 24) ^ u32::from(byte)) & 0xFF;
        crc = (crc << 8) ^ CRC32_TABLE[idx as usize];
    }
    crc
}

/// 计算 Ogg CRC-32
pub fn ogg_crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_标准校验值() {
        // CRC-32/POSIX 的 check 值为 0x765E7680, 去掉最终异或即为 Ogg 的结果
        assert_eq!(ogg_crc32(b"123456789"), !0x765E_7680u32);
    }

    #[test]
    fn test_空数据() {
        assert_eq!(ogg_crc32(&[]), 0);
    }

    #[test]
    fn test_分段累加() {
        let data = b"OggS\x00\x02page body";
        let whole = ogg_crc32(data);
        let split = crc32_update(crc32_update(0, &data[..6]), &data[6..]);
        assert_eq!(whole, split);
    }
}
