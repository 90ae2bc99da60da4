//! 比特流写入器.
//!
//! 与 [`BitReader`](crate::bitreader::BitReader) 对应的大端位序写入器,
//! 主要用于在测试与基准中构造合成的 MPEG 音频帧.

/// 比特流写入器
///
/// # 示例
/// ```
/// use yin_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b01010101, 8);
/// assert_eq!(bw.finish(), vec![0b10110001, 0b01010101]);
/// ```
#[derive(Default)]
pub struct BitWriter {
    /// 已完成的字节
    data: Vec<u8>,
    /// 尚未凑满一个字节的位累加器
    acc: u32,
    /// 累加器中的位数 (0-7)
    acc_bits: u32,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.acc_bits as usize
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(u32::from(bit), 1);
    }

    /// 写入值的低 N 位 (最多 32 位), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={n} 超过 32 位");
        for i in (0..n).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.acc_bits += 1;
            if self.acc_bits == 8 {
                self.data.push(self.acc as u8);
                self.acc = 0;
                self.acc_bits = 0;
            }
        }
    }

    /// 写入整字节序列
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_bits(u32::from(b), 8);
        }
    }

    /// 以 0 填充到字节边界
    pub fn align_to_byte(&mut self) {
        if self.acc_bits > 0 {
            self.write_bits(0, 8 - self.acc_bits);
        }
    }

    /// 以 0 填充到指定字节长度 (已超过时不截断)
    pub fn pad_to(&mut self, len: usize) {
        self.align_to_byte();
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }

    /// 完成写入, 返回字节数据 (末尾不足一字节的部分以 0 补齐)
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_写入后读回() {
        let mut bw = BitWriter::new();
        bw.write_bits(0x7FF, 11);
        bw.write_bits(3, 2);
        bw.write_bit(true);
        bw.write_bits(0xABCD, 16);
        assert_eq!(bw.bits_written(), 30);
        let data = bw.finish();
        assert_eq!(data.len(), 4);

        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(11).unwrap(), 0x7FF);
        assert_eq!(br.read_bits(2).unwrap(), 3);
        assert_eq!(br.read_bit().unwrap(), 1);
        assert_eq!(br.read_bits(16).unwrap(), 0xABCD);
        assert_eq!(br.read_bits(2).unwrap(), 0);
    }

    #[test]
    fn test_填充到指定长度() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.pad_to(4);
        let data = bw.finish();
        assert_eq!(data, vec![0b1010_0000, 0, 0, 0]);
    }
}
