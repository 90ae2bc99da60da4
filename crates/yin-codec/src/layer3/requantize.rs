//! Layer III 反量化: xr = sign(is) · |is|^(4/3) · 2^(exp/4).

use super::scalefactors::Scalefactors;
use super::side_info::GranuleInfo;
use super::tables::{BandLayout, Layer3Tables, PRETAB};

/// 混合块中长块部分的缩放因子带数
pub fn mixed_long_bands(lsf: bool) -> usize {
    if lsf { 6 } else { 8 }
}

#[inline]
fn scale(tables: &Layer3Tables, v: i32, gain: f32) -> f32 {
    let mag = tables.pow43[(v.unsigned_abs() as usize).min(8206)] * gain;
    if v < 0 { -mag } else { mag }
}

/// 反量化一个颗粒一个声道
///
/// 长块与短块的增益以 1/4 为步长计算; `nonzero` 之后的频率线直接置零.
#[allow(clippy::too_many_arguments)]
pub fn requantize(
    tables: &Layer3Tables,
    gi: &GranuleInfo,
    sf: &Scalefactors,
    preflag: bool,
    lsf: bool,
    layout: &BandLayout,
    quantized: &[i32; 576],
    nonzero: usize,
    xr: &mut [f32; 576],
) {
    xr.fill(0.0);
    let base = gi.global_gain as i32 - 210;
    let sf_mult = if gi.scalefac_scale { 4 } else { 2 };

    let (long_bands, first_short) = if !gi.has_short() {
        (22, 13)
    } else if gi.mixed_block {
        (mixed_long_bands(lsf), 3)
    } else {
        (0, 0)
    };

    for sfb in 0..long_bands {
        let start = layout.long[sfb];
        if start >= nonzero {
            return;
        }
        let end = layout.long[sfb + 1].min(nonzero);
        let pre = if preflag { i32::from(PRETAB[sfb]) } else { 0 };
        let exp = base - sf_mult * (i32::from(sf.long[sfb]) + pre);
        let gain = 2f32.powf(exp as f32 * 0.25);
        for i in start..end {
            xr[i] = scale(tables, quantized[i], gain);
        }
    }

    for sfb in first_short..13 {
        let width = layout.short_width(sfb);
        for w in 0..3 {
            let start = layout.short[sfb] * 3 + w * width;
            if start >= nonzero {
                return;
            }
            let end = (start + width).min(nonzero);
            let exp = base
                - 8 * i32::from(gi.subblock_gain[w])
                - sf_mult * i32::from(sf.short[sfb][w]);
            let gain = 2f32.powf(exp as f32 * 0.25);
            for i in start..end {
                xr[i] = scale(tables, quantized[i], gain);
            }
        }
    }
}
