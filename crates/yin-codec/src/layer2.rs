//! MPEG 音频 Layer II 解码.
//!
//! 分配表按采样率, 每声道码率选择 (MPEG-1 四张, LSF 一张);
//! 每帧 12 组 × 3 个样本, 每 4 组共用一个缩放因子, scfsi 指示缩放因子的复用方式.

use log::warn;
use yin_core::{BitReader, YinError, YinResult};

use crate::context::CodecContext;
use crate::frame::{SBLIMIT, SubbandBlock, crc_matches};
use crate::header::FrameHeader;
use crate::layer1::{dequantize, joint_bound};

/// 一段连续子带共用的分配规则: (子带数, 分配码位数, 分配码 → 量化级数)
type AllocRow = (usize, u32, &'static [u32]);

const LEVELS_HIGH_0: [u32; 16] = [
    0, 3, 7, 15, 31, 63, 127, 255, 511, 1023, 2047, 4095, 8191, 16383, 32767, 65535,
];
const LEVELS_HIGH_1: [u32; 16] = [
    0, 3, 5, 7, 9, 15, 31, 63, 127, 255, 511, 1023, 2047, 4095, 8191, 65535,
];
const LEVELS_HIGH_2: [u32; 8] = [0, 3, 5, 7, 9, 15, 31, 65535];
const LEVELS_HIGH_3: [u32; 4] = [0, 3, 5, 65535];
const LEVELS_LOW_0: [u32; 16] = [
    0, 3, 5, 9, 15, 31, 63, 127, 255, 511, 1023, 2047, 4095, 8191, 16383, 65535,
];
const LEVELS_LOW_1: [u32; 8] = [0, 3, 5, 9, 15, 31, 63, 127];
const LEVELS_LSF_0: [u32; 16] = [
    0, 3, 5, 7, 9, 15, 31, 63, 127, 255, 511, 1023, 2047, 4095, 8191, 16383,
];
const LEVELS_LSF_2: [u32; 4] = [0, 3, 5, 9];

/// 高码率表 (sblimit 27)
const TABLE_A: [AllocRow; 4] = [
    (3, 4, &LEVELS_HIGH_0),
    (8, 4, &LEVELS_HIGH_1),
    (12, 3, &LEVELS_HIGH_2),
    (4, 2, &LEVELS_HIGH_3),
];
/// 高码率表 (sblimit 30)
const TABLE_B: [AllocRow; 4] = [
    (3, 4, &LEVELS_HIGH_0),
    (8, 4, &LEVELS_HIGH_1),
    (12, 3, &LEVELS_HIGH_2),
    (7, 2, &LEVELS_HIGH_3),
];
/// 低码率表 (sblimit 8)
const TABLE_C: [AllocRow; 2] = [(2, 4, &LEVELS_LOW_0), (6, 3, &LEVELS_LOW_1)];
/// 低码率表 (sblimit 12)
const TABLE_D: [AllocRow; 2] = [(2, 4, &LEVELS_LOW_0), (10, 3, &LEVELS_LOW_1)];
/// MPEG-2/2.5 表 (sblimit 30)
const TABLE_LSF: [AllocRow; 3] = [
    (4, 4, &LEVELS_LSF_0),
    (7, 3, &LEVELS_LOW_1),
    (19, 2, &LEVELS_LSF_2),
];

const TABLES: [&[AllocRow]; 5] = [&TABLE_A, &TABLE_B, &TABLE_C, &TABLE_D, &TABLE_LSF];

/// MPEG-1 表选择 [采样率][立体声 0 / 单声道 1][码率索引] → 表 A..D
const TRANSLATE: [[[u8; 16]; 2]; 3] = [
    [
        [0, 2, 2, 2, 2, 2, 2, 0, 0, 0, 1, 1, 1, 1, 1, 0],
        [0, 2, 2, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
    ],
    [
        [0, 2, 2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        [0, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    ],
    [
        [0, 3, 3, 3, 3, 3, 3, 0, 0, 0, 1, 1, 1, 1, 1, 0],
        [0, 3, 3, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
    ],
];

/// 帧对应的分配表
fn select_table(header: &FrameHeader) -> &'static [AllocRow] {
    if header.version.is_lsf() {
        return TABLES[4];
    }
    let mode = usize::from(header.channels() == 1);
    let idx = TRANSLATE[header.sample_rate_index as usize % 3][mode][header.bitrate_index as usize];
    TABLES[idx as usize]
}

/// 分配表覆盖的子带数
pub fn sblimit(header: &FrameHeader) -> usize {
    select_table(header).iter().map(|row| row.0).sum()
}

/// 每个子带的 (分配码位数, 级数表)
fn expand(table: &[AllocRow]) -> Vec<(u32, &'static [u32])> {
    table
        .iter()
        .flat_map(|&(count, bits, levels)| std::iter::repeat_n((bits, levels), count))
        .collect()
}

/// 级数对应的码字位数与是否三样本分组
fn code_layout(levels: u32) -> (u32, bool) {
    match levels {
        3 => (5, true),
        5 => (7, true),
        9 => (10, true),
        n => ((n + 1).trailing_zeros(), false),
    }
}

/// 读取一组 3 个样本的码值
fn read_triplet(br: &mut BitReader, levels: u32) -> YinResult<[u32; 3]> {
    let (bits, grouped) = code_layout(levels);
    if grouped {
        let mut v = br.read_bits(bits)?;
        let a = v % levels;
        v /= levels;
        let b = v % levels;
        let c = v / levels;
        Ok([a, b, c])
    } else {
        Ok([br.read_bits(bits)?, br.read_bits(bits)?, br.read_bits(bits)?])
    }
}

/// 解码一帧 Layer II, 向 `out` 追加 36 个时隙
pub fn decode(
    ctx: &CodecContext,
    header: &FrameHeader,
    frame: &[u8],
    verify_crc: bool,
    out: &mut Vec<SubbandBlock>,
) -> YinResult<()> {
    let base = out.len();
    out.resize(base + 36, SubbandBlock::default());

    let body = frame.get(header.body_offset()..).unwrap_or_default();
    let mut br = BitReader::new(body);
    let mut state = Layer2Frame::new(header);
    let parsed = state.read_side(&mut br);
    if verify_crc && header.has_crc && !crc_matches(frame, state.protected_bits) {
        warn!("Layer II CRC 校验失败, 输出静音");
        return Ok(());
    }
    let result = parsed.and_then(|_| state.read_samples(ctx, &mut br, &mut out[base..]));
    match result {
        Ok(()) => Ok(()),
        Err(YinError::Eof) => {
            warn!("Layer II 帧数据不足, 剩余部分置零");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// 一帧的分配, scfsi 与缩放因子
struct Layer2Frame {
    nch: usize,
    sblimit: usize,
    jsbound: usize,
    rows: Vec<(u32, &'static [u32])>,
    /// [声道][子带] 量化级数, 0 表示无分配
    levels: [[u32; SBLIMIT]; 2],
    /// [声道][子带][部分] 缩放因子索引
    scale_index: [[[u32; 3]; SBLIMIT]; 2],
    /// CRC 覆盖的比特数 (分配码 + scfsi)
    protected_bits: usize,
}

impl Layer2Frame {
    fn new(header: &FrameHeader) -> Self {
        let rows = expand(select_table(header));
        let sblimit = rows.len();
        Self {
            nch: header.channels(),
            sblimit,
            jsbound: joint_bound(header, sblimit),
            rows,
            levels: [[0; SBLIMIT]; 2],
            scale_index: [[[63; 3]; SBLIMIT]; 2],
            protected_bits: 0,
        }
    }

    fn read_side(&mut self, br: &mut BitReader) -> YinResult<()> {
        for sb in 0..self.sblimit {
            let (bits, table) = self.rows[sb];
            if sb < self.jsbound {
                for ch in 0..self.nch {
                    self.levels[ch][sb] = table[br.read_bits(bits)? as usize];
                }
            } else {
                let n = table[br.read_bits(bits)? as usize];
                self.levels[0][sb] = n;
                self.levels[1][sb] = n;
            }
        }

        let mut scfsi = [[0u32; SBLIMIT]; 2];
        for sb in 0..self.sblimit {
            for ch in 0..self.nch {
                if self.levels[ch][sb] != 0 {
                    scfsi[ch][sb] = br.read_bits(2)?;
                }
            }
        }
        self.protected_bits = br.bits_read();

        for sb in 0..self.sblimit {
            for ch in 0..self.nch {
                if self.levels[ch][sb] == 0 {
                    continue;
                }
                let idx = &mut self.scale_index[ch][sb];
                match scfsi[ch][sb] {
                    0 => {
                        for s in idx.iter_mut() {
                            *s = br.read_bits(6)?;
                        }
                    }
                    1 => {
                        let a = br.read_bits(6)?;
                        let b = br.read_bits(6)?;
                        *idx = [a, a, b];
                    }
                    2 => {
                        let a = br.read_bits(6)?;
                        *idx = [a, a, a];
                    }
                    _ => {
                        let a = br.read_bits(6)?;
                        let b = br.read_bits(6)?;
                        *idx = [a, b, b];
                    }
                }
            }
        }
        Ok(())
    }

    fn read_samples(
        &self,
        ctx: &CodecContext,
        br: &mut BitReader,
        slots: &mut [SubbandBlock],
    ) -> YinResult<()> {
        for gr in 0..12 {
            let part = gr / 4;
            let triple = &mut slots[gr * 3..gr * 3 + 3];
            for sb in 0..self.sblimit {
                if sb < self.jsbound {
                    for ch in 0..self.nch {
                        let n = self.levels[ch][sb];
                        if n == 0 {
                            continue;
                        }
                        let codes = read_triplet(br, n)?;
                        let scale = ctx.scalefactor(self.scale_index[ch][sb][part]);
                        for (slot, &c) in triple.iter_mut().zip(codes.iter()) {
                            slot.samples[ch][sb] = dequantize(c, n) * scale;
                        }
                    }
                } else {
                    let n = self.levels[0][sb];
                    if n == 0 {
                        continue;
                    }
                    let codes = read_triplet(br, n)?;
                    for ch in 0..self.nch {
                        let scale = ctx.scalefactor(self.scale_index[ch][sb][part]);
                        for (slot, &c) in triple.iter_mut().zip(codes.iter()) {
                            slot.samples[ch][sb] = dequantize(c, n) * scale;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
