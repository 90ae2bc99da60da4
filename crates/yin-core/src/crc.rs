//! CRC-16 校验.
//!
//! MPEG 音频帧的可选校验字使用 CRC-16 (多项式 0x8005, 初始值 0xFFFF, 不反射),
//! 覆盖帧头后两个字节与受保护的边信息位. 受保护区域未必字节对齐,
//! 因此同时提供按字节与按位的累加.

/// CRC-16 查找表 (多项式 0x8005)
const CRC16_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0u16;
    while i < 256 {
        let mut crc = i << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x8005;
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

/// MPEG 音频 CRC-16 累加器
#[derive(Debug, Clone, Copy)]
pub struct Crc16Mpeg {
    crc: u16,
}

impl Default for Crc16Mpeg {
    fn default() -> Self {
        Self { crc: 0xFFFF }
    }
}

impl Crc16Mpeg {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加整字节
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.crc = (self.crc << 8) ^ CRC16_TABLE[((self.crc >> 8) as u8 ^ byte) as usize];
        }
    }

    /// 累加值的低 `n` 位, 高位在前
    pub fn update_bits(&mut self, value: u32, n: u32) {
        for i in (0..n).rev() {
            let bit = ((value >> i) & 1) as u16;
            let top = (self.crc >> 15) & 1;
            self.crc <<= 1;
            if top ^ bit != 0 {
                self.crc ^= 0x8005;
            }
        }
    }

    /// 累加字节缓冲区中从起点开始的前 `nbits` 位
    pub fn update_leading_bits(&mut self, data: &[u8], nbits: usize) {
        let whole = (nbits / 8).min(data.len());
        self.update_bytes(&data[..whole]);
        let rest = nbits - whole * 8;
        if rest > 0 {
            if let Some(&b) = data.get(whole) {
                self.update_bits(u32::from(b >> (8 - rest)), rest as u32);
            }
        }
    }

    pub fn value(&self) -> u16 {
        self.crc
    }
}

/// 一次性计算 MPEG 音频 CRC-16
pub fn crc16_mpeg(data: &[u8]) -> u16 {
    let mut crc = Crc16Mpeg::new();
    crc.update_bytes(data);
    crc.value()
}
