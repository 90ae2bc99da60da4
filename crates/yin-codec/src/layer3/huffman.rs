//! Layer III 霍夫曼解码.
//!
//! 主数据中的频谱分为三段: 大值区 (成对编码, 最多 3 个子区各用一张码表),
//! count1 区 (四元组, 码表 A 或 B), 以及其后的全零区.

use log::warn;
use yin_core::{BitReader, YinError, YinResult};

use super::huffman_tables::{HuffmanSpec, LINBITS};
use super::side_info::GranuleInfo;
use super::tables::{BandLayout, Layer3Tables};

/// 二叉解码树, 叶子以负数 `-(symbol + 1)` 表示, 0 表示空分支
#[derive(Debug, Clone, Default)]
pub struct HuffmanTree {
    nodes: Vec<[i32; 2]>,
}

impl HuffmanTree {
    /// 由码字表建树, 码长为 0 的符号不参与
    pub fn build(spec: &HuffmanSpec) -> Self {
        let mut nodes = vec![[0i32; 2]];
        for (sym, (&code, &len)) in spec.codes.iter().zip(spec.lens.iter()).enumerate() {
            if len == 0 {
                continue;
            }
            let mut node = 0usize;
            for depth in (0..len).rev() {
                let bit = ((u32::from(code) >> depth) & 1) as usize;
                if depth == 0 {
                    nodes[node][bit] = -(sym as i32 + 1);
                } else {
                    let next = nodes[node][bit];
                    if next > 0 {
                        node = next as usize;
                    } else {
                        nodes.push([0, 0]);
                        let idx = nodes.len() - 1;
                        nodes[node][bit] = idx as i32;
                        node = idx;
                    }
                }
            }
        }
        Self { nodes }
    }

    /// 解码一个符号
    pub fn decode(&self, br: &mut BitReader) -> YinResult<usize> {
        let mut node = 0usize;
        loop {
            let bit = br.read_bit()? as usize;
            let next = *self
                .nodes
                .get(node)
                .map(|n| &n[bit])
                .ok_or_else(|| YinError::Internal("霍夫曼树为空".into()))?;
            if next < 0 {
                return Ok((-next - 1) as usize);
            }
            if next == 0 {
                return Err(YinError::InvalidData("无效的霍夫曼码字".into()));
            }
            node = next as usize;
        }
    }
}

/// 读取带符号的大值分量
fn read_value(br: &mut BitReader, mut v: i32, linbits: u32) -> YinResult<i32> {
    if linbits > 0 && v == 15 {
        v += br.read_bits(linbits)? as i32;
    }
    if v != 0 && br.read_bit()? == 1 {
        v = -v;
    }
    Ok(v)
}

/// 解码一个颗粒一个声道的量化频谱
///
/// `end_bit` 为 part2_3 在主数据中的结束位置. 返回值为最后一个可能非零的
/// 频率线之后的位置 (其后的频率线全为 0).
/// 码字越界时保留已解码部分, 其余视为静音.
pub fn read_spectrum(
    br: &mut BitReader,
    tables: &Layer3Tables,
    gi: &GranuleInfo,
    layout: &BandLayout,
    end_bit: usize,
    out: &mut [i32; 576],
) -> usize {
    out.fill(0);
    let big_end = (gi.big_values as usize * 2).min(576);

    let (region1, region2) = if gi.window_switching {
        let r1 = if gi.block_type == 2 {
            layout.short[3] * 3
        } else {
            layout.long[8]
        };
        (r1, 576)
    } else {
        let r0 = gi.region0_count as usize;
        let r1 = gi.region1_count as usize;
        (layout.long[(r0 + 1).min(22)], layout.long[(r0 + r1 + 2).min(22)])
    };
    let bounds = [region1.min(big_end), region2.min(big_end), big_end];

    let mut pos = 0usize;
    for (region, &limit) in bounds.iter().enumerate() {
        let table = gi.table_select[region] as usize;
        let Some(tree) = tables.big_value_trees[table].as_ref() else {
            // 码表 0: 该区全零
            pos = pos.max(limit);
            continue;
        };
        let width = if table >= 13 { 16 } else { width_of(table) };
        let linbits = u32::from(LINBITS[table]);
        while pos < limit {
            if br.bits_read() >= end_bit {
                return pos;
            }
            let decoded = tree.decode(br).and_then(|sym| {
                let x = read_value(br, (sym / width) as i32, linbits)?;
                let y = read_value(br, (sym % width) as i32, linbits)?;
                Ok((x, y))
            });
            match decoded {
                Ok((x, y)) => {
                    out[pos] = x;
                    out[pos + 1] = y;
                }
                Err(e) => {
                    warn!("大值区解码失败, 剩余频谱置零: {e}");
                    return pos;
                }
            }
            pos += 2;
        }
    }

    // count1 区
    while pos + 4 <= 576 && br.bits_read() < end_bit {
        let quad_start = br.bits_read();
        let sym = if gi.count1_table_b {
            br.read_bits(4).map(|v| (15 - v) as usize)
        } else {
            tables.quad_a.decode(br)
        };
        let Ok(sym) = sym else {
            break;
        };
        let mut vals = [0i32; 4];
        let mut failed = false;
        for (k, v) in vals.iter_mut().enumerate() {
            if (sym >> (3 - k)) & 1 == 1 {
                match br.read_bit() {
                    Ok(s) => *v = if s == 1 { -1 } else { 1 },
                    Err(_) => failed = true,
                }
            }
        }
        if failed || br.bits_read() > end_bit {
            // 越过 part2_3 末尾的最后一个四元组作废
            let _ = br.seek_bits(quad_start);
            break;
        }
        out[pos..pos + 4].copy_from_slice(&vals);
        pos += 4;
    }
    pos
}

/// 码表 1..=12 的行宽
fn width_of(table: usize) -> usize {
    match table {
        1 => 2,
        2 | 3 => 3,
        5 | 6 => 4,
        7..=9 => 6,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer3::huffman_tables;
    use yin_core::BitWriter;

    fn write_code(bw: &mut BitWriter, table: u8, sym: usize) {
        let s = huffman_tables::spec(table).unwrap();
        bw.write_bits(u32::from(s.codes[sym]), u32::from(s.lens[sym]));
    }

    #[test]
    fn test_码表1_全部符号() {
        let tree = HuffmanTree::build(&huffman_tables::spec(1).unwrap());
        let mut bw = BitWriter::new();
        for sym in [0, 1, 2, 3, 2, 0] {
            write_code(&mut bw, 1, sym);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        for sym in [0, 1, 2, 3, 2, 0] {
            assert_eq!(tree.decode(&mut br).unwrap(), sym);
        }
    }

    #[test]
    fn test_大码表逐符号解码() {
        for table in [13u8, 15, 16, 24] {
            let spec = huffman_tables::spec(table).unwrap();
            let tree = HuffmanTree::build(&spec);
            let mut bw = BitWriter::new();
            for sym in 0..256 {
                write_code(&mut bw, table, sym);
            }
            let data = bw.finish();
            let mut br = BitReader::new(&data);
            for sym in 0..256 {
                assert_eq!(tree.decode(&mut br).unwrap(), sym, "码表 {table}");
            }
        }
    }

    #[test]
    fn test_频谱解码_大值与四元组() {
        let tables = Layer3Tables::new();
        let layout = &tables.bands[0];
        let gi = GranuleInfo {
            big_values: 2,
            table_select: [1, 1, 1],
            region0_count: 15,
            region1_count: 7,
            ..GranuleInfo::default()
        };
        let mut bw = BitWriter::new();
        // (1, 0) 后接负号, (0, 1) 后接正号
        write_code(&mut bw, 1, 2);
        bw.write_bit(true);
        write_code(&mut bw, 1, 1);
        bw.write_bit(false);
        // 四元组 A: v=1, y=1 → 符号 0b1001
        let qa = huffman_tables::spec(32).unwrap();
        bw.write_bits(u32::from(qa.codes[0b1001]), u32::from(qa.lens[0b1001]));
        bw.write_bit(false);
        bw.write_bit(true);
        let end = bw.bits_written();
        bw.write_bits(0xFF, 8);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        let mut out = [0i32; 576];
        let nz = read_spectrum(&mut br, &tables, &gi, layout, end, &mut out);
        assert_eq!(&out[..8], &[-1, 0, 0, 1, 1, 0, 0, -1]);
        assert_eq!(nz, 8);
        assert_eq!(br.bits_read(), end);
    }

    #[test]
    fn test_频谱解码_越界四元组作废() {
        let tables = Layer3Tables::new();
        let layout = &tables.bands[0];
        let gi = GranuleInfo {
            count1_table_b: true,
            ..GranuleInfo::default()
        };
        let mut bw = BitWriter::new();
        // 码表 B: 符号 0b1000 的码字为 15 - 8 = 7
        bw.write_bits(7, 4);
        bw.write_bit(false);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut out = [0i32; 576];
        // part2_3 只有 4 位, 符号位越界
        let nz = read_spectrum(&mut br, &tables, &gi, layout, 4, &mut out);
        assert_eq!(nz, 0);
        assert!(out.iter().all(|&v| v == 0));
    }
}
