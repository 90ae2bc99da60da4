//! MPEG 音频 Layer III 解码.
//!
//! 流程: 边信息 → 比特储备池 → 缩放因子 → 哈夫曼频谱 → 反量化
//! → 立体声处理 → 短块重排 → 混叠消除 → IMDCT 与重叠相加.
//! 储备池与重叠缓冲跨帧保留, 定位或换轨时清空.

pub mod huffman;
pub mod huffman_tables;
pub mod hybrid;
pub mod requantize;
pub mod reservoir;
pub mod scalefactors;
pub mod side_info;
pub mod stereo;
pub mod tables;

use log::{debug, warn};
use yin_core::{BitReader, YinError, YinResult};

use crate::frame::{SubbandBlock, crc_matches};
use crate::header::{ChannelMode, FrameHeader};

use self::reservoir::Reservoir;
use self::scalefactors::Scalefactors;
use self::side_info::{GranuleInfo, SideInfo};
use self::stereo::IntensityScale;
use self::tables::Layer3Tables;

/// Layer III 解码器的跨帧状态
pub struct Layer3Decoder {
    reservoir: Reservoir,
    /// IMDCT 重叠部分 [声道][子带][18]
    overlap: Box<[[[f32; 18]; 32]; 2]>,
}

impl Default for Layer3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer3Decoder {
    pub fn new() -> Self {
        Self {
            reservoir: Reservoir::new(),
            overlap: Box::new([[[0.0; 18]; 32]; 2]),
        }
    }

    /// 清空储备池与重叠缓冲
    pub fn reset(&mut self) {
        self.reservoir.clear();
        self.overlap.iter_mut().flatten().for_each(|sb| sb.fill(0.0));
    }

    /// 储备池当前可回溯的字节数
    pub fn reservoir_bytes(&self) -> usize {
        self.reservoir.available()
    }

    /// 跳过一帧: 不解码, 只把主数据存入储备池
    pub fn absorb(&mut self, header: &FrameHeader, frame: &[u8]) {
        let start = header.body_offset() + header.side_info_size();
        if let Some(main) = frame.get(start..) {
            self.reservoir.absorb(main);
        }
    }

    /// 解码一帧, 向 `out` 追加 18 × 颗粒数 个时隙
    ///
    /// 边信息损坏, CRC 不符与储备池下溢都输出静音颗粒 (IMDCT 仍运行以排空重叠),
    /// 只有帧长不足以容纳边信息时返回错误.
    pub fn decode(
        &mut self,
        tables: &Layer3Tables,
        header: &FrameHeader,
        frame: &[u8],
        verify_crc: bool,
        out: &mut Vec<SubbandBlock>,
    ) -> YinResult<()> {
        let nch = header.channels();
        let lsf = header.version.is_lsf();
        let granules = if lsf { 1 } else { 2 };
        let body = header.body_offset();
        let side_len = header.side_info_size();
        if frame.len() < body + side_len {
            return Err(YinError::InvalidData(format!(
                "Layer III 帧过短: {} 字节, 边信息需要 {} 字节",
                frame.len(),
                body + side_len
            )));
        }
        let layout = &tables.bands[header.rate_table_index()];
        let main = &frame[body + side_len..];

        let crc_ok = !(verify_crc && header.has_crc) || crc_matches(frame, side_len * 8);
        let side = match SideInfo::parse(&frame[body..body + side_len], header) {
            Ok(si) if crc_ok => Some(si),
            Ok(_) => {
                warn!("Layer III CRC 校验失败, 输出静音");
                None
            }
            Err(e) => {
                warn!("Layer III 边信息无效, 输出静音: {e}");
                None
            }
        };

        let main_data = match &side {
            Some(si) => {
                let data = self.reservoir.push(main, si.main_data_begin);
                if data.is_none() {
                    debug!(
                        "比特储备池下溢: 需要回溯 {} 字节, 输出静音",
                        si.main_data_begin
                    );
                }
                data
            }
            None => {
                self.reservoir.absorb(main);
                None
            }
        };

        let intensity = header.channel_mode == ChannelMode::JointStereo && header.mode_extension & 1 != 0;
        let mut br = main_data.map(BitReader::new);
        let mut xr = Box::new([[0f32; 576]; 2]);
        let mut quantized = [0i32; 576];
        let mut slots = [[0f32; 32]; 18];
        let mut granule_sf = [Scalefactors::default(), Scalefactors::default()];
        let fallback = GranuleInfo::default();
        let decodable = side.is_some() && br.is_some();

        for gr in 0..granules {
            xr.iter_mut().for_each(|ch| ch.fill(0.0));

            if let (Some(si), Some(reader)) = (&side, br.as_mut()) {
                for ch in 0..nch {
                    let gi = &si.granules[gr][ch];
                    let part2_start = reader.bits_read();
                    let end_bit = part2_start + gi.part2_3_length as usize;

                    let sf_result = if lsf {
                        scalefactors::read_lsf(reader, gi, intensity && ch == 1)
                    } else {
                        scalefactors::read_mpeg1(reader, gi, &si.scfsi[ch], gr, &granule_sf[ch])
                            .map(|sf| (sf, gi.preflag))
                    };
                    let Ok((sf, preflag)) = sf_result else {
                        warn!("主数据不足以读取缩放因子, 颗粒 {gr} 声道 {ch} 置零");
                        break;
                    };

                    let nonzero = huffman::read_spectrum(
                        reader,
                        tables,
                        gi,
                        layout,
                        end_bit,
                        &mut quantized,
                    );
                    requantize::requantize(
                        tables, gi, &sf, preflag, lsf, layout, &quantized, nonzero, &mut xr[ch],
                    );
                    granule_sf[ch] = sf;
                    if reader.seek_bits(end_bit).is_err() {
                        warn!("part2_3 长度越过主数据末尾");
                        let len = reader.data().len() * 8;
                        let _ = reader.seek_bits(len);
                    }
                }

                if nch == 2 {
                    let gi_right = &si.granules[gr][1];
                    let scale = if lsf {
                        IntensityScale::Lsf(gi_right.scalefac_compress & 1)
                    } else {
                        IntensityScale::Mpeg1
                    };
                    let (left, right) = xr.split_at_mut(1);
                    stereo::process(
                        tables,
                        header,
                        gi_right,
                        &granule_sf[1],
                        scale,
                        layout,
                        &mut left[0],
                        &mut right[0],
                    );
                }
            }

            let base = out.len();
            out.resize(base + 18, SubbandBlock::default());
            for ch in 0..nch {
                let gi = match &side {
                    Some(si) if decodable => &si.granules[gr][ch],
                    _ => &fallback,
                };
                hybrid::reorder_short(gi, layout, lsf, &mut xr[ch]);
                hybrid::alias_reduce(tables, gi, layout, lsf, &mut xr[ch]);
                hybrid::imdct(tables, gi, layout, lsf, &xr[ch], &mut self.overlap[ch], &mut slots);
                for (t, slot) in slots.iter().enumerate() {
                    out[base + t].samples[ch] = *slot;
                }
            }
        }
        Ok(())
    }
}
