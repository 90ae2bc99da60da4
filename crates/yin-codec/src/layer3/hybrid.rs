//! Layer III 混合滤波: 短块重排, 混叠消除, IMDCT 与重叠相加.

use super::requantize::mixed_long_bands;
use super::side_info::GranuleInfo;
use super::tables::{BandLayout, Layer3Tables};

/// 使用长窗口的子带数 (纯长块 32, 纯短块 0, 混合块按切换线计算)
pub fn long_subbands(gi: &GranuleInfo, layout: &BandLayout, lsf: bool) -> usize {
    if !gi.has_short() {
        32
    } else if gi.mixed_block {
        layout.long[mixed_long_bands(lsf)] / 18
    } else {
        0
    }
}

/// 将短块频率线按 `[子带][窗口][6]` 重排
///
/// 码流中短块按 (带, 窗口, 线) 排列; 重排后子带 sb 的窗口 w 的第 k 个系数
/// 位于 `sb * 18 + w * 6 + k`.
pub fn reorder_short(gi: &GranuleInfo, layout: &BandLayout, lsf: bool, xr: &mut [f32; 576]) {
    if !gi.has_short() {
        return;
    }
    let first_sfb = if gi.mixed_block { 3 } else { 0 };
    let start = layout.short[first_sfb] * 3;
    let mut tmp = [0f32; 576];
    for sfb in first_sfb..13 {
        let width = layout.short_width(sfb);
        for w in 0..3 {
            let src = layout.short[sfb] * 3 + w * width;
            for j in 0..width {
                let freq = layout.short[sfb] + j;
                tmp[(freq / 6) * 18 + w * 6 + freq % 6] = xr[src + j];
            }
        }
    }
    let long_end = long_subbands(gi, layout, lsf) * 18;
    xr[start.max(long_end)..].copy_from_slice(&tmp[start.max(long_end)..]);
}

/// 子带边界上的混叠消除蝶形运算
pub fn alias_reduce(tables: &Layer3Tables, gi: &GranuleInfo, layout: &BandLayout, lsf: bool, xr: &mut [f32; 576]) {
    let bounds = long_subbands(gi, layout, lsf).saturating_sub(1).min(31);
    for sb in 1..=bounds {
        let base = sb * 18;
        for (i, &(cs, ca)) in tables.alias.iter().enumerate() {
            let lo = xr[base - 1 - i];
            let hi = xr[base + i];
            xr[base - 1 - i] = lo * cs - hi * ca;
            xr[base + i] = hi * cs + lo * ca;
        }
    }
}

/// IMDCT, 加窗与重叠相加, 输出 18 个时隙的子带样本
///
/// 奇数子带的奇数时隙取反 (频率反转).
pub fn imdct(
    tables: &Layer3Tables,
    gi: &GranuleInfo,
    layout: &BandLayout,
    lsf: bool,
    xr: &[f32; 576],
    overlap: &mut [[f32; 18]; 32],
    out: &mut [[f32; 32]; 18],
) {
    let long_sb = long_subbands(gi, layout, lsf);
    for sb in 0..32 {
        let input = &xr[sb * 18..sb * 18 + 18];
        let mut raw = [0f32; 36];
        if input.iter().any(|&v| v != 0.0) {
            if sb < long_sb {
                let block_type = if gi.window_switching && !gi.mixed_block {
                    gi.block_type as usize
                } else {
                    0
                };
                let window = &tables.windows[block_type];
                for (i, r) in raw.iter_mut().enumerate() {
                    let cos = &tables.imdct_long[i];
                    let sum: f32 = input.iter().zip(cos.iter()).map(|(x, c)| x * c).sum();
                    *r = sum * window[i];
                }
            } else {
                let window = &tables.windows[2];
                for w in 0..3 {
                    let coeffs = &input[w * 6..w * 6 + 6];
                    for i in 0..12 {
                        let cos = &tables.imdct_short[i];
                        let sum: f32 = coeffs.iter().zip(cos.iter()).map(|(x, c)| x * c).sum();
                        raw[6 + 6 * w + i] += sum * window[i];
                    }
                }
            }
        }

        let prev = &mut overlap[sb];
        for t in 0..18 {
            let mut v = raw[t] + prev[t];
            if sb & 1 == 1 && t & 1 == 1 {
                v = -v;
            }
            out[t][sb] = v;
            prev[t] = raw[18 + t];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_gi(mixed: bool) -> GranuleInfo {
        GranuleInfo {
            window_switching: true,
            block_type: 2,
            mixed_block: mixed,
            ..GranuleInfo::default()
        }
    }

    #[test]
    fn test_短块重排() {
        let tables = Layer3Tables::new();
        let layout = &tables.bands[0];
        let gi = short_gi(false);
        let mut xr = [0f32; 576];
        // 带 0 宽 4: 窗口 2 的第 1 条线 (频率 1) 位于码流位置 9
        xr[9] = 1.0;
        // 带 1 (频率 4..8): 窗口 1 的第 2 条线 (频率 6) 位于 12 + 4 + 2
        xr[18] = 2.0;
        reorder_short(&gi, layout, false, &mut xr);
        assert_eq!(xr[2 * 6 + 1], 1.0);
        assert_eq!(xr[18 + 6], 2.0);
        assert_eq!(xr.iter().filter(|&&v| v != 0.0).count(), 2);
    }

    #[test]
    fn test_混合块长块部分不重排() {
        let tables = Layer3Tables::new();
        let layout = &tables.bands[0];
        let gi = short_gi(true);
        assert_eq!(long_subbands(&gi, layout, false), 2);
        let mut xr = [0f32; 576];
        xr[5] = 3.0;
        xr[35] = 4.0;
        reorder_short(&gi, layout, false, &mut xr);
        assert_eq!(xr[5], 3.0);
        assert_eq!(xr[35], 4.0);
    }

    #[test]
    fn test_混叠消除边界() {
        let tables = Layer3Tables::new();
        let layout = &tables.bands[0];
        let mut xr = [0f32; 576];
        xr[17] = 1.0;
        alias_reduce(&tables, &GranuleInfo::default(), layout, false, &mut xr);
        let (cs, ca) = tables.alias[0];
        assert!((xr[17] - cs).abs() < 1e-6);
        assert!((xr[18] - ca).abs() < 1e-6);

        // 纯短块不处理
        let mut xr = [0f32; 576];
        xr[17] = 1.0;
        alias_reduce(&tables, &short_gi(false), layout, false, &mut xr);
        assert_eq!(xr[18], 0.0);
    }

    #[test]
    fn test_imdct_静音与重叠() {
        let tables = Layer3Tables::new();
        let layout = &tables.bands[0];
        let gi = GranuleInfo::default();
        let mut overlap = [[0f32; 18]; 32];
        let mut out = [[0f32; 32]; 18];
        let mut xr = [0f32; 576];
        xr[0] = 1.0;
        imdct(&tables, &gi, layout, false, &xr, &mut overlap, &mut out);
        assert!(overlap[0].iter().any(|&v| v != 0.0));
        assert!(overlap[1].iter().all(|&v| v == 0.0));

        // 零输入时仍输出上一颗粒的重叠部分并清空
        let saved = overlap[0];
        imdct(&tables, &gi, layout, false, &[0f32; 576], &mut overlap, &mut out);
        for t in 0..18 {
            assert_eq!(out[t][0], saved[t]);
        }
        assert!(overlap[0].iter().all(|&v| v == 0.0));
    }
}
