//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区读取数据, MPEG 音频的帧头、边信息
//! 与主数据都按此位序排列.

use crate::{YinError, YinResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use yin_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
#[derive(Clone)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前位位置 (从缓冲区起点计)
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 剩余可读位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> YinResult<u32> {
        let byte = *self.data.get(self.pos >> 3).ok_or(YinError::Eof)?;
        let bit = (byte >> (7 - (self.pos & 7))) & 1;
        self.pos += 1;
        Ok(u32::from(bit))
    }

    /// 读取 1 个位并转换为布尔值
    pub fn read_flag(&mut self) -> YinResult<bool> {
        Ok(self.read_bit()? != 0)
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> YinResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(YinError::InvalidArgument(format!(
                "read_bits: n={n} 超过 32 位"
            )));
        }
        if n as usize > self.bits_left() {
            return Err(YinError::Eof);
        }

        let mut result: u64 = 0;
        let mut remaining = n;
        while remaining > 0 {
            let bit_off = (self.pos & 7) as u32;
            let available = 8 - bit_off;
            let take = remaining.min(available);
            let byte = u64::from(self.data[self.pos >> 3]);
            let bits = (byte >> (available - take)) & ((1u64 << take) - 1);
            result = (result << take) | bits;
            self.pos += take as usize;
            remaining -= take;
        }
        Ok(result as u32)
    }

    /// 窥视 N 个位 (不移动位置)
    pub fn peek_bits(&self, n: u32) -> YinResult<u32> {
        self.clone().read_bits(n)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: usize) -> YinResult<()> {
        if n > self.bits_left() {
            return Err(YinError::Eof);
        }
        self.pos += n;
        Ok(())
    }

    /// 定位到指定位位置 (允许等于末尾)
    pub fn seek_bits(&mut self, pos: usize) -> YinResult<()> {
        if pos > self.data.len() * 8 {
            return Err(YinError::Eof);
        }
        self.pos = pos;
        Ok(())
    }

    /// 对齐到下一个字节边界
    pub fn align_to_byte(&mut self) {
        self.pos = (self.pos + 7) & !7;
    }

    /// 当前字节位置 (向下取整)
    pub fn byte_position(&self) -> usize {
        self.pos >> 3
    }

    /// 从当前位置读取原始字节切片, 仅在字节对齐时可用
    pub fn read_bytes(&mut self, n: usize) -> YinResult<&'a [u8]> {
        if self.pos & 7 != 0 {
            return Err(YinError::InvalidArgument("read_bytes 需要字节对齐".into()));
        }
        let start = self.pos >> 3;
        let end = start + n;
        if end > self.data.len() {
            return Err(YinError::Eof);
        }
        self.pos = end * 8;
        Ok(&self.data[start..end])
    }

    /// 底层数据
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}
