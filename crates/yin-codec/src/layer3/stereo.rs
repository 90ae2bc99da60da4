//! Layer III 联合立体声: M/S 与强度立体声.
//!
//! 强度立体声只作用于右声道最后一个非零带之上的缩放因子带,
//! 从高频向低频扫描确定起点 (短块按窗口分别确定).

use std::f32::consts::FRAC_1_SQRT_2;

use crate::header::{ChannelMode, FrameHeader};

use super::requantize::mixed_long_bands;
use super::scalefactors::Scalefactors;
use super::side_info::GranuleInfo;
use super::tables::{BandLayout, Layer3Tables};

/// 强度立体声比例来源
#[derive(Debug, Clone, Copy)]
pub enum IntensityScale {
    /// MPEG-1: tan 比例, is_pos = 7 非法
    Mpeg1,
    /// LSF: 以 2^(-(p+1)/4) 为底的幂, p 取自右声道 scalefac_compress 的最低位
    Lsf(u32),
}

fn intensity_ratio(tables: &Layer3Tables, scale: IntensityScale, is_pos: u8) -> Option<(f32, f32)> {
    match scale {
        IntensityScale::Mpeg1 => tables.is_ratios.get(is_pos as usize).copied(),
        IntensityScale::Lsf(p) => {
            let base = 2f32.powf(-0.25 * (p + 1) as f32);
            let pos = i32::from(is_pos);
            Some(if pos == 0 {
                (1.0, 1.0)
            } else if pos & 1 == 1 {
                (base.powi((pos + 1) / 2), 1.0)
            } else {
                (1.0, base.powi(pos / 2))
            })
        }
    }
}

fn band_is_zero(xr: &[f32; 576], start: usize, end: usize) -> bool {
    xr[start..end.min(576)].iter().all(|&v| v == 0.0)
}

/// 对一个颗粒执行立体声处理
#[allow(clippy::too_many_arguments)]
pub fn process(
    tables: &Layer3Tables,
    header: &FrameHeader,
    gi: &GranuleInfo,
    sf_right: &Scalefactors,
    scale: IntensityScale,
    layout: &BandLayout,
    left: &mut [f32; 576],
    right: &mut [f32; 576],
) {
    if header.channel_mode != ChannelMode::JointStereo {
        return;
    }
    let ms = header.mode_extension & 0x2 != 0;
    let intensity = header.mode_extension & 0x1 != 0;
    if !ms && !intensity {
        return;
    }

    // (起始线, 结束线, is_pos)
    let mut bands: Vec<(usize, usize, u8)> = Vec::new();
    if intensity {
        let mut long_limit = if gi.has_short() {
            if gi.mixed_block { mixed_long_bands(header.version.is_lsf()) } else { 0 }
        } else {
            22
        };

        if gi.has_short() {
            let first_short = if gi.mixed_block { 3 } else { 0 };
            let mut short_all_zero = true;
            for w in 0..3 {
                let mut start_sfb = first_short;
                for sfb in (first_short..13).rev() {
                    let width = layout.short_width(sfb);
                    let s = layout.short[sfb] * 3 + w * width;
                    if !band_is_zero(right, s, s + width) {
                        start_sfb = sfb + 1;
                        short_all_zero = false;
                        break;
                    }
                }
                for sfb in start_sfb..13 {
                    let width = layout.short_width(sfb);
                    let s = layout.short[sfb] * 3 + w * width;
                    bands.push((s, s + width, sf_right.short[sfb.min(11)][w]));
                }
            }
            if !short_all_zero {
                long_limit = 0;
            }
        }

        if long_limit > 0 {
            let mut start_sfb = 0;
            for sfb in (0..long_limit).rev() {
                if !band_is_zero(right, layout.long[sfb], layout.long[sfb + 1]) {
                    start_sfb = sfb + 1;
                    break;
                }
            }
            for sfb in start_sfb..long_limit {
                bands.push((layout.long[sfb], layout.long[sfb + 1], sf_right.long[sfb.min(20)]));
            }
        }
    }

    let mut done = [false; 576];
    for &(start, end, is_pos) in &bands {
        // 非法位置按 M/S (若启用) 或左右独立处理
        let Some((kl, kr)) = intensity_ratio(tables, scale, is_pos) else {
            continue;
        };
        for i in start..end.min(576) {
            let v = left[i];
            left[i] = v * kl;
            right[i] = v * kr;
            done[i] = true;
        }
    }

    if ms {
        for i in 0..576 {
            if !done[i] {
                let m = left[i];
                let s = right[i];
                left[i] = (m + s) * FRAC_1_SQRT_2;
                right[i] = (m - s) * FRAC_1_SQRT_2;
            }
        }
    }
}
