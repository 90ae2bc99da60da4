//! Layer III 缩放因子读取 (MPEG-1 与 LSF).

use yin_core::{BitReader, YinResult};

use super::side_info::GranuleInfo;
use super::tables::{LSF_PARTITIONS, SLEN};

/// 一个颗粒一个声道的缩放因子
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scalefactors {
    /// 长块, 第 21 带无缩放因子恒为 0
    pub long: [u8; 22],
    /// 短块 [带][窗口]
    pub short: [[u8; 3]; 13],
}

/// MPEG-1 scfsi 分组对应的长块带范围
const SCFSI_BANDS: [(usize, usize); 4] = [(0, 6), (6, 11), (11, 16), (16, 21)];

/// 读取 MPEG-1 缩放因子
///
/// 第二颗粒中 scfsi 置位的分组沿用第一颗粒的值 (`prev`).
pub fn read_mpeg1(
    br: &mut BitReader,
    gi: &GranuleInfo,
    scfsi: &[bool; 4],
    gr: usize,
    prev: &Scalefactors,
) -> YinResult<Scalefactors> {
    let slen1 = u32::from(SLEN[0][gi.scalefac_compress as usize & 0xF]);
    let slen2 = u32::from(SLEN[1][gi.scalefac_compress as usize & 0xF]);
    let mut sf = Scalefactors::default();

    if gi.has_short() {
        let first_short = if gi.mixed_block {
            for sfb in 0..8 {
                sf.long[sfb] = br.read_bits(slen1)? as u8;
            }
            3
        } else {
            0
        };
        for sfb in first_short..12 {
            let bits = if sfb < 6 { slen1 } else { slen2 };
            for w in 0..3 {
                sf.short[sfb][w] = br.read_bits(bits)? as u8;
            }
        }
        return Ok(sf);
    }

    for (group, &(start, end)) in SCFSI_BANDS.iter().enumerate() {
        let bits = if group < 2 { slen1 } else { slen2 };
        if gr == 1 && scfsi[group] {
            sf.long[start..end].copy_from_slice(&prev.long[start..end]);
        } else {
            for sfb in start..end {
                sf.long[sfb] = br.read_bits(bits)? as u8;
            }
        }
    }
    Ok(sf)
}

/// 由 LSF scalefac_compress 推导 (各分区位数, 分区表序号, preflag)
///
/// 强度立体声的右声道使用另一套划分, 其 scalefac_compress 先右移一位.
pub fn lsf_slen(scalefac_compress: u32, intensity_right: bool) -> ([u32; 4], usize, bool) {
    if intensity_right {
        let c = scalefac_compress >> 1;
        if c < 180 {
            ([c / 36, (c % 36) / 6, c % 6, 0], 3, false)
        } else if c < 244 {
            let c = c - 180;
            ([(c % 64) >> 4, (c % 16) >> 2, c % 4, 0], 4, false)
        } else {
            let c = c - 244;
            ([c / 3, c % 3, 0, 0], 5, false)
        }
    } else {
        let c = scalefac_compress;
        if c < 400 {
            ([(c >> 4) / 5, (c >> 4) % 5, (c % 16) >> 2, c % 4], 0, false)
        } else if c < 500 {
            let c = c - 400;
            ([(c >> 2) / 5, (c >> 2) % 5, c % 4, 0], 1, false)
        } else {
            let c = c - 500;
            ([c / 3, c % 3, 0, 0], 2, true)
        }
    }
}

/// 读取 LSF (MPEG-2/2.5) 缩放因子, 返回缩放因子与 preflag
pub fn read_lsf(
    br: &mut BitReader,
    gi: &GranuleInfo,
    intensity_right: bool,
) -> YinResult<(Scalefactors, bool)> {
    let (slen, table, preflag) = lsf_slen(gi.scalefac_compress, intensity_right);
    let category = match (gi.has_short(), gi.mixed_block) {
        (false, _) => 0,
        (true, false) => 1,
        (true, true) => 2,
    };
    let counts = &LSF_PARTITIONS[category][table];

    let mut flat = [0u8; 39];
    let mut n = 0usize;
    for (part, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            flat[n] = br.read_bits(slen[part])? as u8;
            n += 1;
        }
    }

    let mut sf = Scalefactors::default();
    match category {
        0 => sf.long[..21].copy_from_slice(&flat[..21]),
        1 => {
            for (i, &v) in flat[..36].iter().enumerate() {
                sf.short[i / 3][i % 3] = v;
            }
        }
        _ => {
            sf.long[..6].copy_from_slice(&flat[..6]);
            for (j, &v) in flat[6..33].iter().enumerate() {
                sf.short[3 + j / 3][j % 3] = v;
            }
        }
    }
    Ok((sf, preflag))
}
