//! Layer III 边信息解析.

use yin_core::{BitReader, YinError, YinResult};

use crate::header::FrameHeader;

/// 单个颗粒单个声道的边信息
#[derive(Debug, Clone, Default)]
pub struct GranuleInfo {
    pub part2_3_length: u32,
    pub big_values: u32,
    pub global_gain: u32,
    pub scalefac_compress: u32,
    pub window_switching: bool,
    pub block_type: u8,
    pub mixed_block: bool,
    pub table_select: [u8; 3],
    pub subblock_gain: [u8; 3],
    pub region0_count: u32,
    pub region1_count: u32,
    pub preflag: bool,
    pub scalefac_scale: bool,
    pub count1_table_b: bool,
}

impl GranuleInfo {
    /// 是否含短块 (纯短块或混合块)
    pub fn has_short(&self) -> bool {
        self.window_switching && self.block_type == 2
    }

    /// 是否为纯短块
    pub fn is_pure_short(&self) -> bool {
        self.has_short() && !self.mixed_block
    }
}

/// 一帧的边信息
#[derive(Debug, Clone, Default)]
pub struct SideInfo {
    pub main_data_begin: usize,
    /// [声道][scfsi 带] (仅 MPEG-1)
    pub scfsi: [[bool; 4]; 2],
    /// [颗粒][声道]
    pub granules: [[GranuleInfo; 2]; 2],
    pub granule_count: usize,
    pub channels: usize,
}

impl SideInfo {
    pub fn parse(data: &[u8], header: &FrameHeader) -> YinResult<Self> {
        let mut br = BitReader::new(data);
        let lsf = header.version.is_lsf();
        let nch = header.channels();
        let mut si = SideInfo {
            granule_count: if lsf { 1 } else { 2 },
            channels: nch,
            ..Default::default()
        };

        si.main_data_begin = br.read_bits(if lsf { 8 } else { 9 })? as usize;
        let private_bits = match (lsf, nch) {
            (false, 1) => 5,
            (false, _) => 3,
            (true, 1) => 1,
            (true, _) => 2,
        };
        br.skip_bits(private_bits)?;

        if !lsf {
            for ch in 0..nch {
                for band in 0..4 {
                    si.scfsi[ch][band] = br.read_flag()?;
                }
            }
        }

        for gr in 0..si.granule_count {
            for ch in 0..nch {
                let gi = &mut si.granules[gr][ch];
                gi.part2_3_length = br.read_bits(12)?;
                gi.big_values = br.read_bits(9)?;
                if gi.big_values > 288 {
                    log::warn!("big_values={} 超过 288, 截断", gi.big_values);
                    gi.big_values = 288;
                }
                gi.global_gain = br.read_bits(8)?;
                gi.scalefac_compress = br.read_bits(if lsf { 9 } else { 4 })?;
                gi.window_switching = br.read_flag()?;

                if gi.window_switching {
                    gi.block_type = br.read_bits(2)? as u8;
                    if gi.block_type == 0 {
                        return Err(YinError::InvalidData(
                            "窗口切换时块类型不能为 0".into(),
                        ));
                    }
                    gi.mixed_block = br.read_flag()?;
                    for i in 0..2 {
                        gi.table_select[i] = br.read_bits(5)? as u8;
                    }
                    for i in 0..3 {
                        gi.subblock_gain[i] = br.read_bits(3)? as u8;
                    }
                } else {
                    for i in 0..3 {
                        gi.table_select[i] = br.read_bits(5)? as u8;
                    }
                    gi.region0_count = br.read_bits(4)?;
                    gi.region1_count = br.read_bits(3)?;
                }

                gi.preflag = if lsf {
                    // LSF 的预强调由 scalefac_compress 推导
                    false
                } else {
                    br.read_flag()?
                };
                gi.scalefac_scale = br.read_flag()?;
                gi.count1_table_b = br.read_flag()?;
            }
        }
        Ok(si)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yin_core::BitWriter;

    #[test]
    fn test_全零边信息() {
        let header = FrameHeader::parse(0xFFFB_9064).unwrap();
        let data = vec![0u8; header.side_info_size()];
        let si = SideInfo::parse(&data, &header).unwrap();
        assert_eq!(si.granule_count, 2);
        assert_eq!(si.channels, 2);
        assert_eq!(si.main_data_begin, 0);
        assert_eq!(si.granules[1][1].part2_3_length, 0);
    }

    #[test]
    fn test_短块边信息() {
        // MPEG-1 单声道: 17 字节边信息
        let header = FrameHeader::parse(0xFFFB_90C4).unwrap();
        let mut bw = BitWriter::new();
        bw.write_bits(300, 9); // main_data_begin
        bw.write_bits(0, 5); // private
        bw.write_bits(0b1010, 4); // scfsi
        // 颗粒 0
        bw.write_bits(1000, 12);
        bw.write_bits(100, 9);
        bw.write_bits(150, 8);
        bw.write_bits(7, 4);
        bw.write_bit(true);
        bw.write_bits(2, 2);
        bw.write_bit(true);
        bw.write_bits(5, 5);
        bw.write_bits(7, 5);
        bw.write_bits(1, 3);
        bw.write_bits(2, 3);
        bw.write_bits(3, 3);
        bw.write_bit(false);
        bw.write_bit(true);
        bw.write_bit(true);
        bw.pad_to(17);
        let data = bw.finish();

        let si = SideInfo::parse(&data, &header).unwrap();
        assert_eq!(si.main_data_begin, 300);
        assert_eq!(si.scfsi[0], [true, false, true, false]);
        let gi = &si.granules[0][0];
        assert_eq!(gi.part2_3_length, 1000);
        assert_eq!(gi.big_values, 100);
        assert_eq!(gi.global_gain, 150);
        assert!(gi.has_short());
        assert!(gi.mixed_block);
        assert!(!gi.is_pure_short());
        assert_eq!(gi.table_select, [5, 7, 0]);
        assert_eq!(gi.subblock_gain, [1, 2, 3]);
        assert!(gi.scalefac_scale);
        assert!(gi.count1_table_b);
    }

    #[test]
    fn test_窗口切换块类型为零时报错() {
        let header = FrameHeader::parse(0xFFFB_90C4).unwrap();
        let mut bw = BitWriter::new();
        bw.write_bits(0, 9 + 5 + 4);
        bw.write_bits(0, 12 + 9);
        bw.write_bits(0, 8 + 4);
        bw.write_bit(true);
        bw.write_bits(0, 2);
        bw.pad_to(17);
        let data = bw.finish();
        assert!(SideInfo::parse(&data, &header).is_err());
    }
}
