//! Layer III 常量表与预计算表.

use super::huffman::HuffmanTree;
use super::huffman_tables::{self, BIG_VALUE_SOURCE};

/// 9 种采样率的长块缩放因子带宽度
/// (44.1k, 48k, 32k, 22.05k, 24k, 16k, 11.025k, 12k, 8k)
const LONG_WIDTHS: [[u16; 22]; 9] = [
    [4, 4, 4, 4, 4, 4, 6, 6, 8, 8, 10, 12, 16, 20, 24, 28, 34, 42, 50, 54, 76, 158],
    [4, 4, 4, 4, 4, 4, 6, 6, 6, 8, 10, 12, 16, 18, 22, 28, 34, 40, 46, 54, 54, 192],
    [4, 4, 4, 4, 4, 4, 6, 6, 8, 10, 12, 16, 20, 24, 30, 38, 46, 56, 68, 84, 102, 26],
    [6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54],
    [6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 18, 22, 26, 32, 38, 46, 54, 62, 70, 76, 36],
    [6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54],
    [6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54],
    [6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54],
    [12, 12, 12, 12, 12, 12, 16, 20, 24, 28, 32, 40, 48, 56, 64, 76, 90, 2, 2, 2, 2, 2],
];

/// 9 种采样率的短块缩放因子带宽度 (单个窗口)
const SHORT_WIDTHS: [[u16; 13]; 9] = [
    [4, 4, 4, 4, 6, 8, 10, 12, 14, 18, 22, 30, 56],
    [4, 4, 4, 4, 6, 6, 10, 12, 14, 16, 20, 26, 66],
    [4, 4, 4, 4, 6, 8, 12, 16, 20, 26, 34, 42, 12],
    [4, 4, 4, 6, 6, 8, 10, 14, 18, 26, 32, 42, 18],
    [4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 32, 44, 12],
    [4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 30, 40, 18],
    [4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 30, 40, 18],
    [4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 30, 40, 18],
    [8, 8, 8, 12, 16, 20, 24, 28, 36, 2, 2, 2, 26],
];

/// 长块预强调表
pub const PRETAB: [u8; 22] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 3, 2, 0];

/// MPEG-1 scalefac_compress → (slen1, slen2)
pub const SLEN: [[u8; 16]; 2] = [
    [0, 0, 0, 0, 3, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4],
    [0, 1, 2, 3, 0, 1, 2, 3, 1, 2, 3, 1, 2, 3, 2, 3],
];

/// LSF 缩放因子分区内的缩放因子个数, 按 [块类别][分区表][分区]
/// 块类别: 0 长块, 1 纯短块, 2 混合块
pub const LSF_PARTITIONS: [[[u8; 4]; 6]; 3] = [
    [[6, 5, 5, 5], [6, 5, 7, 3], [11, 10, 0, 0], [7, 7, 7, 0], [6, 6, 6, 3], [8, 8, 5, 0]],
    [[9, 9, 9, 9], [9, 9, 12, 6], [18, 18, 0, 0], [12, 12, 12, 0], [12, 9, 9, 6], [15, 12, 9, 0]],
    [[6, 9, 9, 9], [6, 9, 12, 6], [15, 18, 0, 0], [6, 15, 12, 0], [6, 12, 9, 6], [6, 18, 9, 0]],
];

/// 混叠消除系数
const ALIAS_COEFFS: [f64; 8] = [-0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037];

/// 某一采样率下的缩放因子带边界 (单位: 频率线)
#[derive(Debug, Clone)]
pub struct BandLayout {
    /// 长块边界, 23 个, 末项 576
    pub long: [usize; 23],
    /// 短块边界 (单窗口), 14 个, 末项 192
    pub short: [usize; 14],
}

impl BandLayout {
    fn new(rate: usize) -> Self {
        let mut long = [0usize; 23];
        for (i, &w) in LONG_WIDTHS[rate].iter().enumerate() {
            long[i + 1] = long[i] + w as usize;
        }
        let mut short = [0usize; 14];
        for (i, &w) in SHORT_WIDTHS[rate].iter().enumerate() {
            short[i + 1] = short[i] + w as usize;
        }
        Self { long, short }
    }

    /// 短块缩放因子带宽度
    pub fn short_width(&self, sfb: usize) -> usize {
        self.short[sfb + 1] - self.short[sfb]
    }
}

/// Layer III 预计算表
pub struct Layer3Tables {
    /// |x|^(4/3), x ∈ [0, 8206]
    pub pow43: Vec<f32>,
    pub bands: Vec<BandLayout>,
    /// 大值码表 0..=31 (同一码字来源的表共享一棵树)
    pub big_value_trees: Vec<Option<HuffmanTree>>,
    /// count1 四元组表 A
    pub quad_a: HuffmanTree,
    /// 混叠消除蝶形系数 (cs, ca)
    pub alias: [(f32, f32); 8],
    /// 36 点 IMDCT 余弦表 [i][k]
    pub imdct_long: Vec<[f32; 18]>,
    /// 12 点 IMDCT 余弦表 [i][k]
    pub imdct_short: [[f32; 6]; 12],
    /// 窗函数, 按块类型 0..=3 (类型 2 仅使用前 12 项)
    pub windows: [[f32; 36]; 4],
    /// MPEG-1 强度立体声比例 (左, 右), is_pos 0..=6
    pub is_ratios: [(f32, f32); 7],
}

impl Layer3Tables {
    pub fn new() -> Self {
        let pow43 = (0..8207).map(|i| (i as f64).powf(4.0 / 3.0) as f32).collect();
        let bands = (0..9).map(BandLayout::new).collect();

        let mut sources: Vec<Option<HuffmanTree>> = (0..=24).map(|_| None).collect();
        let big_value_trees = BIG_VALUE_SOURCE
            .iter()
            .map(|src| {
                let n = (*src)?;
                let slot = &mut sources[n as usize];
                if slot.is_none() {
                    *slot = huffman_tables::spec(n).map(|s| HuffmanTree::build(&s));
                }
                slot.clone()
            })
            .collect();
        let quad_a = huffman_tables::spec(32)
            .map(|s| HuffmanTree::build(&s))
            .unwrap_or_default();

        let mut alias = [(0f32, 0f32); 8];
        for (i, &c) in ALIAS_COEFFS.iter().enumerate() {
            let sq = (1.0 + c * c).sqrt();
            alias[i] = ((1.0 / sq) as f32, (c / sq) as f32);
        }

        let pi = std::f64::consts::PI;
        let imdct_long = (0..36)
            .map(|i| {
                let mut row = [0f32; 18];
                for (k, v) in row.iter_mut().enumerate() {
                    *v = (pi / 72.0 * (2 * i + 1 + 18) as f64 * (2 * k + 1) as f64).cos() as f32;
                }
                row
            })
            .collect();
        let mut imdct_short = [[0f32; 6]; 12];
        for (i, row) in imdct_short.iter_mut().enumerate() {
            for (k, v) in row.iter_mut().enumerate() {
                *v = (pi / 24.0 * (2 * i + 1 + 6) as f64 * (2 * k + 1) as f64).cos() as f32;
            }
        }

        let mut windows = [[0f32; 36]; 4];
        let long_sin = |i: usize| (pi / 36.0 * (i as f64 + 0.5)).sin() as f32;
        let short_sin = |i: usize| (pi / 12.0 * (i as f64 + 0.5)).sin() as f32;
        for i in 0..36 {
            windows[0][i] = long_sin(i);
        }
        for i in 0..18 {
            windows[1][i] = long_sin(i);
        }
        for i in 18..24 {
            windows[1][i] = 1.0;
        }
        for i in 24..30 {
            windows[1][i] = short_sin(i - 18);
        }
        for i in 0..12 {
            windows[2][i] = short_sin(i);
        }
        for i in 6..12 {
            windows[3][i] = short_sin(i - 6);
        }
        for i in 12..18 {
            windows[3][i] = 1.0;
        }
        for i in 18..36 {
            windows[3][i] = long_sin(i);
        }

        let mut is_ratios = [(0f32, 0f32); 7];
        for (i, r) in is_ratios.iter_mut().enumerate() {
            if i == 6 {
                *r = (1.0, 0.0);
            } else {
                let t = (i as f64 * pi / 12.0).tan();
                *r = ((t / (1.0 + t)) as f32, (1.0 / (1.0 + t)) as f32);
            }
        }

        Self {
            pow43,
            bands,
            big_value_trees,
            quad_a,
            alias,
            imdct_long,
            imdct_short,
            windows,
            is_ratios,
        }
    }
}

impl Default for Layer3Tables {
    fn default() -> Self {
        Self::new()
    }
}
