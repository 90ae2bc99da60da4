//! PCM 输出: RIFF/WAVE 或原始字节.
//!
//! WAV 头先按 0 长度写出, 结束时回填 RIFF 与 data 块大小.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use yin::{Encoding, OutputFormat};

/// WAV 头长度 (RIFF + fmt + data 块头)
pub const WAV_HEADER_LEN: u64 = 44;

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// 输出容器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Wav,
    Raw,
}

impl SinkKind {
    /// 按扩展名推断: `.wav` 输出 WAV, 其余输出原始 PCM
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wav") => SinkKind::Wav,
            _ => SinkKind::Raw,
        }
    }
}

/// 写出 44 字节的 WAV 头
pub fn write_wav_header<W: Write>(w: &mut W, format: &OutputFormat, data_len: u32) -> Result<()> {
    let bytes_per_sample = format.encoding.bytes_per_sample() as u16;
    let block_align = bytes_per_sample * format.channels;
    let tag = match format.encoding {
        Encoding::F32 => WAVE_FORMAT_IEEE_FLOAT,
        _ => WAVE_FORMAT_PCM,
    };
    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(data_len.saturating_add(36))?;
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_u32::<LittleEndian>(16)?;
    w.write_u16::<LittleEndian>(tag)?;
    w.write_u16::<LittleEndian>(format.channels)?;
    w.write_u32::<LittleEndian>(format.rate)?;
    w.write_u32::<LittleEndian>(format.rate * u32::from(block_align))?;
    w.write_u16::<LittleEndian>(block_align)?;
    w.write_u16::<LittleEndian>(bytes_per_sample * 8)?;
    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(data_len)?;
    Ok(())
}

/// PCM 输出文件
pub struct PcmSink {
    writer: BufWriter<File>,
    kind: SinkKind,
    format: OutputFormat,
    data_len: u64,
}

impl PcmSink {
    pub fn create(path: &Path, kind: SinkKind, format: OutputFormat) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("无法创建输出文件 '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        if kind == SinkKind::Wav {
            write_wav_header(&mut writer, &format, 0)?;
        }
        Ok(Self {
            writer,
            kind,
            format,
            data_len: 0,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).context("写入输出文件失败")?;
        self.data_len += data.len() as u64;
        Ok(())
    }

    /// 刷新并回填 WAV 头, 返回 PCM 数据字节数
    pub fn finish(mut self) -> Result<u64> {
        if self.kind == SinkKind::Wav {
            let len = u32::try_from(self.data_len).unwrap_or_else(|_| {
                log::warn!("PCM 数据超过 4 GiB, WAV 头中的长度被截断");
                u32::MAX
            });
            self.writer.seek(SeekFrom::Start(0))?;
            write_wav_header(&mut self.writer, &self.format, len)?;
        }
        self.writer.flush().context("刷新输出文件失败")?;
        Ok(self.data_len)
    }
}
