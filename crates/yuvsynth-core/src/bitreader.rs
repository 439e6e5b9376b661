//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区中读取, 供 H.264 参数集解析使用.
//! 另提供 Exp-Golomb 可变长编码 `ue(v)` / `se(v)` 的读取.

use crate::{SynthError, SynthResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use yuvsynth_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    pub fn read_bit(&mut self) -> SynthResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(SynthError::Eof);
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(u32::from(bit))
    }

    pub fn read_flag(&mut self) -> SynthResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 (最多 32 位), 返回值的低 N 位有效
    pub fn read_bits(&mut self, n: u32) -> SynthResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(SynthError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n
            )));
        }
        if n as usize > self.bits_left() {
            return Err(SynthError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - u32::from(self.bit_pos);
            let to_read = remaining.min(available);

            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;
            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }
        Ok(result)
    }

    pub fn skip_bits(&mut self, n: u32) -> SynthResult<()> {
        if n as usize > self.bits_left() {
            return Err(SynthError::Eof);
        }
        let total_bits = u32::from(self.bit_pos) + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;
        Ok(())
    }

    /// 读取无符号 Exp-Golomb 编码值 ue(v)
    pub fn read_ue(&mut self) -> SynthResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(SynthError::InvalidData("Exp-Golomb 前导零过多".into()));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// 读取有符号 Exp-Golomb 编码值 se(v)
    ///
    /// 映射: 0 -> 0, 1 -> 1, 2 -> -1, 3 -> 2, 4 -> -2, ...
    pub fn read_se(&mut self) -> SynthResult<i32> {
        let code = self.read_ue()?;
        let value = code.div_ceil(2) as i32;
        Ok(if code & 1 == 0 { -value } else { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_按位读取() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(1).unwrap(), 1);
        assert_eq!(br.read_bits(1).unwrap(), 0);
        assert_eq!(br.read_bits(2).unwrap(), 0b11);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
        assert_eq!(br.bits_left(), 0);
        assert!(matches!(br.read_bit(), Err(SynthError::Eof)));
    }

    #[test]
    fn test_读取32位() {
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(32).unwrap(), 0xFF00FF00);
    }

    #[test]
    fn test_跳过() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);
        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(4).unwrap(), 0b0101);
        assert!(br.skip_bits(1).is_err());
    }

    #[test]
    fn test_exp_golomb() {
        // 1 | 010 | 011 | 00100 | 00101 -> ue: 0, 1, 2, 3, 4
        let data = [0b1010_0110, 0b0100_0010, 0b1000_0000];
        let mut br = BitReader::new(&data);
        let values: Vec<u32> = (0..5).map(|_| br.read_ue().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);

        let mut br = BitReader::new(&data);
        let values: Vec<i32> = (0..5).map(|_| br.read_se().unwrap()).collect();
        assert_eq!(values, vec![0, 1, -1, 2, -2]);
    }

    #[test]
    fn test_exp_golomb_前导零过多() {
        let data = [0u8; 5];
        let mut br = BitReader::new(&data);
        assert!(matches!(br.read_ue(), Err(SynthError::InvalidData(_))));
    }
}
