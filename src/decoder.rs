//! 解码器句柄: 把同步器、帧解码器、合成器、输出协商和位置引擎串起来.
//!
//! 每次调用最多处理一帧. 输入不足时返回 [`DecodeStatus::NeedMoreInput`],
//! 此时同步器没有消费半帧数据, 追加输入后重新调用即可.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace, warn};
use yin_codec::{
    CodecContext, FrameDecoder, FrameHeader, Layer, PcmBlock, Synthesizer, select_kernel,
};
use yin_core::{Encoding, YinError, YinResult};
use yin_format::{
    ByteSource, FeedSource, FileSource, FrameSync, RawFrame, StreamReader, TagInfo, TrackInfo,
};
use yin_resample::{CodecCapabilities, ResolvedFormat, negotiate, write_samples};

use crate::config::DecoderConfig;
use crate::position::{FrameAction, Timeline, preshift};
use crate::seek_index::SeekIndex;

/// 索引之后超过该帧数才改用估算定位
const FUZZY_THRESHOLD: i64 = 10;

/// 对外的输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub rate: u32,
    pub channels: u16,
    pub encoding: Encoding,
}

impl From<&ResolvedFormat> for OutputFormat {
    fn from(resolved: &ResolvedFormat) -> Self {
        Self {
            rate: resolved.rate,
            channels: resolved.channels,
            encoding: resolved.encoding,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} 声道, {}", self.rate, self.channels, self.encoding)
    }
}

/// [`Decoder::decode_frame`] 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStatus {
    /// 一帧 PCM
    Frame(PcmBlock),
    /// 输出格式变化, 调用方应先读取新格式
    NewFormat(OutputFormat),
    /// 输入不足, 追加数据后重试
    NeedMoreInput,
    /// 轨道结束
    Done,
}

/// [`Decoder::decode_next`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStatus {
    /// 写入的字节数
    Bytes(usize),
    NewFormat(OutputFormat),
    NeedMoreInput,
    Done,
}

/// 定位基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// 码流原生格式, 任何一项变化都要重新协商输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NativeFormat {
    rate: u32,
    channels: usize,
    spf: usize,
    layer: Layer,
}

impl NativeFormat {
    fn of(header: &FrameHeader) -> Self {
        Self {
            rate: header.sample_rate_hz(),
            channels: header.channels(),
            spf: header.samples_per_frame(),
            layer: header.layer,
        }
    }
}

enum Pulled {
    Frame(RawFrame),
    NeedMoreInput,
    Done,
}

/// MPEG 音频解码器
pub struct Decoder {
    config: DecoderConfig,
    reader: StreamReader,
    sync: FrameSync,
    frames: FrameDecoder,
    synth: Synthesizer,
    caps: CodecCapabilities,
    index: SeekIndex,
    timeline: Option<Timeline>,
    native: Option<NativeFormat>,
    header: Option<FrameHeader>,
    output: Option<ResolvedFormat>,
    /// 已计数但尚未处理的帧
    pending: Option<RawFrame>,
    announce_pending: bool,
    /// 最近取出的帧号, 开始前为 -1
    num: i64,
    /// 帧号是否可信 (估算定位后为 false)
    accurate: bool,
    audio_start: Option<u64>,
    frame_bytes: u64,
    frame_count: u64,
    /// 平均帧长来自全流扫描, 不再更新
    mean_exact: bool,
    done: bool,
}

impl Decoder {
    /// 在任意字节源上创建解码器
    pub fn open(source: impl ByteSource + 'static, config: DecoderConfig) -> YinResult<Self> {
        Self::with_source(Box::new(source), config)
    }

    pub fn open_file(path: impl AsRef<Path>, config: DecoderConfig) -> YinResult<Self> {
        Self::open(FileSource::open(path)?, config)
    }

    /// 创建推送模式的解码器, 数据通过 [`Decoder::feed`] 送入
    pub fn open_feed(config: DecoderConfig) -> YinResult<Self> {
        Self::open(FeedSource::new(), config)
    }

    fn with_source(source: Box<dyn ByteSource>, config: DecoderConfig) -> YinResult<Self> {
        if config.output.encodings.is_empty() {
            return Err(YinError::InvalidArgument("输出编码集合为空".into()));
        }
        let ctx: Arc<CodecContext> = CodecContext::init();
        let synth = Synthesizer::new(Arc::clone(&ctx), select_kernel(config.kernel.as_deref()));
        debug!(
            "打开解码器: kernel={}, gapless={}, resync_limit={:?}",
            synth.kernel_tag(),
            config.gapless,
            config.resync_limit
        );
        Ok(Self {
            reader: StreamReader::new(source),
            sync: FrameSync::new(config.sync_config()),
            frames: FrameDecoder::new(ctx, config.crc_check),
            synth,
            caps: CodecCapabilities::default(),
            index: SeekIndex::new(config.index_size, config.index_grow),
            timeline: None,
            native: None,
            header: None,
            output: None,
            pending: None,
            announce_pending: false,
            num: -1,
            accurate: true,
            audio_start: None,
            frame_bytes: 0,
            frame_count: 0,
            mean_exact: false,
            done: false,
            config,
        })
    }

    /// 推送模式下追加输入
    pub fn feed(&mut self, data: &[u8]) -> YinResult<()> {
        self.reader.feed(data)
    }

    /// 推送模式下声明输入结束
    pub fn finish_feed(&mut self) -> YinResult<()> {
        self.reader.end_of_feed()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 读取输出格式, 必要时先读入第一帧
    pub fn read_format(&mut self) -> YinResult<OutputFormat> {
        loop {
            if let Some(out) = &self.output {
                self.announce_pending = false;
                return Ok(OutputFormat::from(out));
            }
            match self.pull()? {
                Pulled::Frame(frame) => self.accept(frame)?,
                Pulled::NeedMoreInput => return Err(YinError::NeedMoreData),
                Pulled::Done => {
                    return Err(YinError::InvalidData("码流中没有音频帧".into()));
                }
            }
        }
    }

    /// 当前输出格式 (第一帧之前为 `None`)
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output.as_ref().map(OutputFormat::from)
    }

    /// 解码下一帧
    pub fn decode_frame(&mut self) -> YinResult<DecodeStatus> {
        loop {
            if self.done {
                return Ok(DecodeStatus::Done);
            }
            if self.pending.is_none() {
                match self.pull()? {
                    Pulled::Frame(frame) => self.accept(frame)?,
                    Pulled::NeedMoreInput => return Ok(DecodeStatus::NeedMoreInput),
                    Pulled::Done => return Ok(DecodeStatus::Done),
                }
            }
            if self.announce_pending {
                self.announce_pending = false;
                if let Some(out) = &self.output {
                    return Ok(DecodeStatus::NewFormat(OutputFormat::from(out)));
                }
            }
            let Some(frame) = self.pending.take() else {
                continue;
            };
            if let Some(block) = self.process(frame)? {
                return Ok(DecodeStatus::Frame(block));
            }
        }
    }

    /// 解码下一帧并按输出编码追加到 `out`
    pub fn decode_next(&mut self, out: &mut Vec<u8>) -> YinResult<NextStatus> {
        Ok(match self.decode_frame()? {
            DecodeStatus::Frame(block) => {
                let encoding = self
                    .output
                    .map(|o| o.encoding)
                    .ok_or_else(|| YinError::Internal("输出格式未协商".into()))?;
                NextStatus::Bytes(write_samples(&block.samples, encoding, out))
            }
            DecodeStatus::NewFormat(fmt) => NextStatus::NewFormat(fmt),
            DecodeStatus::NeedMoreInput => NextStatus::NeedMoreInput,
            DecodeStatus::Done => NextStatus::Done,
        })
    }

    /// 按位置引擎的判定处理一帧, 返回需要输出的 PCM
    fn process(&mut self, frame: RawFrame) -> YinResult<Option<PcmBlock>> {
        let Some(timeline) = self.timeline.as_ref() else {
            return Err(YinError::Internal("位置引擎未初始化".into()));
        };
        let num = self.num;
        match timeline.action(num) {
            FrameAction::Done => {
                trace!("帧 {num} 越过轨道终点");
                self.done = true;
                Ok(None)
            }
            FrameAction::Skip => {
                self.frames.skip(&frame.header, &frame.data);
                Ok(None)
            }
            FrameAction::Prime => {
                let decoded = self.frames.decode(&frame.header, &frame.data)?;
                self.synth.set_ntom_frame(num);
                self.synth.synthesize(&decoded);
                Ok(None)
            }
            FrameAction::Emit { trim_front, keep } => {
                let decoded = self.frames.decode(&frame.header, &frame.data)?;
                self.synth.set_ntom_frame(num);
                let mut block = self.synth.synthesize(&decoded);
                let channels = block.channels.max(1);
                let mut end = block.frames();
                if let Some(keep) = keep {
                    end = end.min(keep);
                    block.samples.truncate(end * channels);
                }
                let front = trim_front.min(end);
                block.samples.skip_front(front * channels);
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.advance(num, end);
                }
                if keep.is_some() {
                    self.done = true;
                }
                Ok((!block.samples.is_empty()).then_some(block))
            }
        }
    }

    /// 从同步器取一帧并把错误映射到状态
    fn pull(&mut self) -> YinResult<Pulled> {
        match self.sync.next_frame(&mut self.reader) {
            Ok(frame) => Ok(Pulled::Frame(frame)),
            Err(YinError::NeedMoreData) | Err(YinError::WouldBlock) => Ok(Pulled::NeedMoreInput),
            Err(YinError::Eof) => {
                self.finish_track();
                Ok(Pulled::Done)
            }
            Err(e) => Err(e),
        }
    }

    fn finish_track(&mut self) {
        self.done = true;
        let frames = (self.num + 1).max(0) as u64;
        if let Some(timeline) = self.timeline.as_mut() {
            if self.accurate {
                timeline.set_total_frames(frames);
            }
        }
        debug!("码流结束, 共 {frames} 帧");
    }

    /// 为新取出的帧编号, 登记索引并检查格式变化
    fn accept(&mut self, frame: RawFrame) -> YinResult<()> {
        self.num += 1;
        self.track_frame(&frame);
        self.header = Some(frame.header);
        let native = NativeFormat::of(&frame.header);
        if self.native != Some(native) {
            self.apply_format(native)?;
        }
        self.pending = Some(frame);
        Ok(())
    }

    fn track_frame(&mut self, frame: &RawFrame) {
        if !self.accurate {
            if let Some(known) = self.index.frame_at_offset(frame.offset) {
                debug!("估算定位后回到索引帧 {known} (原估计 {})", self.num);
                self.num = known as i64;
                self.accurate = true;
            }
        }
        if self.accurate {
            self.index.record(self.num as u64, frame.offset);
        }
        if self.audio_start.is_none() {
            self.audio_start = Some(frame.offset);
        }
        if !self.mean_exact {
            self.frame_bytes += frame.len() as u64;
            self.frame_count += 1;
        }
    }

    fn mean_frame_size(&self) -> f64 {
        if self.frame_count == 0 {
            0.0
        } else {
            self.frame_bytes as f64 / self.frame_count as f64
        }
    }

    fn apply_format(&mut self, native: NativeFormat) -> YinResult<()> {
        let resolved = negotiate(
            native.rate,
            native.channels as u16,
            native.spf,
            &self.config.output,
            &self.caps,
        )?;
        self.synth.configure(resolved.synth_config());
        let shift = preshift(native.layer, self.config.preframes);
        match self.timeline.as_mut() {
            None => {
                let mut timeline = Timeline::new(resolved.mode, native.spf, shift);
                let frames = self.sync.track_info().and_then(|info| info.frames);
                timeline.configure_track(self.gapless_params(), frames);
                if timeline.has_gapless() {
                    debug!("启用 gapless, 调整后长度 {:?}", timeline.length());
                }
                self.timeline = Some(timeline);
            }
            Some(timeline) => {
                warn!("码流格式在帧 {} 处变化, 之后的位置可能不精确", self.num);
                timeline.set_format(resolved.mode, native.spf, shift);
            }
        }

        let changed = self
            .output
            .map(|old| OutputFormat::from(&old) != OutputFormat::from(&resolved))
            .unwrap_or(true);
        if changed {
            debug!("输出格式: {resolved}");
            self.announce_pending = true;
        }
        self.output = Some(resolved);
        self.native = Some(native);
        Ok(())
    }

    fn gapless_params(&self) -> Option<(u32, u32)> {
        if !self.config.gapless {
            return None;
        }
        let info = self.sync.track_info()?;
        info.has_gapless()
            .then_some((info.encoder_delay, info.encoder_padding))
    }

    /// 当前输出位置 (调整后的输出样本数)
    pub fn tell(&self) -> u64 {
        self.timeline.as_ref().map(Timeline::tell).unwrap_or(0)
    }

    /// 轨道总长度 (输出样本), 未知时为 `None`
    pub fn length(&self) -> Option<u64> {
        self.timeline.as_ref().and_then(Timeline::length)
    }

    /// 最近处理的帧号
    pub fn frame_position(&self) -> Option<u64> {
        (self.num >= 0).then_some(self.num as u64)
    }

    /// 帧号是否来自索引或顺序计数 (而非估算)
    pub fn position_accurate(&self) -> bool {
        self.accurate
    }

    /// 最近取出的帧头
    pub fn frame_header(&self) -> Option<&FrameHeader> {
        self.header.as_ref()
    }

    pub fn track_info(&self) -> Option<&TrackInfo> {
        self.sync.track_info()
    }

    pub fn tags(&self) -> &TagInfo {
        self.sync.tags()
    }

    pub fn seek_index(&self) -> &SeekIndex {
        &self.index
    }

    pub fn kernel_tag(&self) -> &'static str {
        self.synth.kernel_tag()
    }

    /// 定位到输出样本位置, 返回定位后的 [`Decoder::tell`]
    pub fn seek(&mut self, offset: i64, whence: Whence) -> YinResult<u64> {
        if !self.reader.is_seekable() {
            return Err(YinError::NotSeekable);
        }
        self.read_format()?;
        let length = self.length();
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.tell() as i64,
            Whence::End => length
                .ok_or_else(|| YinError::InvalidArgument("轨道长度未知, 无法从末尾定位".into()))?
                as i64,
        };
        let mut target = base.saturating_add(offset).max(0) as u64;
        if let Some(length) = length {
            target = target.min(length);
        }
        self.seek_to(target, false)
    }

    fn seek_to(&mut self, target: u64, force: bool) -> YinResult<u64> {
        let Some(timeline) = self.timeline.as_mut() else {
            return Err(YinError::Internal("位置引擎未初始化".into()));
        };
        timeline.set_seek(target);
        let want = timeline.ignore_frame();
        let (frame, offset, accurate) = self.locate(want);
        if force || frame > self.num + 1 || want <= self.num {
            self.jump(frame, offset, accurate)?;
        }
        self.done = false;
        debug!("定位到样本 {target}: 从帧 {frame} 开始, 目标帧 {want}");
        Ok(self.tell())
    }

    /// 为目标帧挑选起点 `(帧号, 字节偏移, 是否精确)`
    fn locate(&self, want: i64) -> (i64, u64, bool) {
        let start = self.audio_start.unwrap_or(0);
        let (frame, offset) = match self.index.find(want.max(0) as u64) {
            Some((frame, offset)) => (frame as i64, offset),
            None => (0, start),
        };
        if self.config.fuzzy_seek && want - frame > FUZZY_THRESHOLD {
            if let Some(estimate) = self.fuzzy_locate(want, start) {
                return estimate;
            }
        }
        (frame, offset, true)
    }

    /// 按定位表或平均帧长估算
    fn fuzzy_locate(&self, want: i64, start: u64) -> Option<(i64, u64, bool)> {
        let total = self.timeline.as_ref().and_then(Timeline::total_frames);
        let toc = self.sync.track_info().filter(|info| info.toc.is_some());
        if let (Some(info), Some(total), Some(size)) = (toc, total, self.reader.size()) {
            if total > 0 {
                let entry = ((want as u64 * 100) / total).min(99);
                let frame = (entry * total / 100) as i64;
                let offset = info.toc_offset((entry as f64 + 0.5) / 100.0, size)?;
                trace!("定位表估算: 帧 {frame} @ {offset}");
                return Some((frame, offset, false));
            }
        }
        let mean = self.mean_frame_size();
        if mean <= 0.0 {
            return None;
        }
        let offset = start + (mean * want as f64) as u64;
        trace!("平均帧长估算: 帧 {want} @ {offset} (平均 {mean:.1} 字节)");
        Some((want, offset, false))
    }

    fn jump(&mut self, frame: i64, offset: u64, accurate: bool) -> YinResult<()> {
        self.pending = None;
        self.reader.seek(offset)?;
        self.sync.reset_for_seek();
        self.frames.reset();
        self.synth.reset();
        self.num = frame - 1;
        self.accurate = accurate;
        Ok(())
    }

    /// 扫描整个码流: 补全定位索引并得到精确帧数, 之后回到原位置
    pub fn scan(&mut self) -> YinResult<u64> {
        if !self.reader.is_seekable() {
            return Err(YinError::NotSeekable);
        }
        self.read_format()?;
        let saved = self.tell();
        let start = self
            .index
            .entry(0)
            .map(|(_, offset)| offset)
            .or(self.audio_start)
            .unwrap_or(0);
        self.reader.seek(start)?;
        self.sync.reset_for_seek();

        let mut count = 0u64;
        let mut bytes = 0u64;
        loop {
            match self.sync.next_frame(&mut self.reader) {
                Ok(frame) => {
                    self.index.record(count, frame.offset);
                    count += 1;
                    bytes += frame.len() as u64;
                }
                Err(YinError::Eof) => break,
                Err(e) => return Err(e),
            }
        }
        debug!("扫描完成: {count} 帧, {bytes} 字节");

        self.frame_count = count;
        self.frame_bytes = bytes;
        self.mean_exact = true;
        let gapless = self.gapless_params();
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.configure_track(gapless, Some(count));
        }
        self.seek_to(saved, true)?;
        Ok(count)
    }

    /// 关闭解码器
    pub fn close(self) {
        debug!("关闭解码器, 最后帧号 {}", self.num);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yin_format::MemorySource;

    /// 0xFFFB9064: MPEG-1 Layer III 128 kbps 44.1 kHz 联合立体声, 帧体全零
    fn zero_layer3(frames: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..frames {
            let mut frame = vec![0u8; 417];
            frame[..4].copy_from_slice(&0xFFFB_9064u32.to_be_bytes());
            out.extend_from_slice(&frame);
        }
        out
    }

    fn no_gapless() -> DecoderConfig {
        DecoderConfig {
            gapless: false,
            ..DecoderConfig::default()
        }
    }

    #[test]
    fn test_第一次调用返回新格式() {
        let mut dec = Decoder::open(MemorySource::new(zero_layer3(3)), no_gapless()).unwrap();
        let status = dec.decode_frame().unwrap();
        let DecodeStatus::NewFormat(fmt) = status else {
            panic!("应先返回 NewFormat: {status:?}");
        };
        assert_eq!(fmt.rate, 44100);
        assert_eq!(fmt.channels, 2);
        assert_eq!(fmt.encoding, Encoding::S16);
    }

    #[test]
    fn test_解码到结束_位置等于帧数乘1152() {
        let mut dec = Decoder::open(MemorySource::new(zero_layer3(5)), no_gapless()).unwrap();
        let mut samples = 0usize;
        loop {
            match dec.decode_frame().unwrap() {
                DecodeStatus::Frame(block) => samples += block.frames(),
                DecodeStatus::NewFormat(_) => {}
                DecodeStatus::NeedMoreInput => panic!("内存源不应缺数据"),
                DecodeStatus::Done => break,
            }
        }
        assert_eq!(samples, 5 * 1152);
        assert_eq!(dec.tell(), 5 * 1152);
        assert_eq!(dec.length(), Some(5 * 1152));
        assert_eq!(dec.frame_position(), Some(4));
        assert_eq!(dec.decode_frame().unwrap(), DecodeStatus::Done);
    }

    #[test]
    fn test_read_format_之后不再通知() {
        let mut dec = Decoder::open(MemorySource::new(zero_layer3(2)), no_gapless()).unwrap();
        let fmt = dec.read_format().unwrap();
        assert_eq!(fmt.rate, 44100);
        assert!(matches!(dec.decode_frame().unwrap(), DecodeStatus::Frame(_)));
    }

    #[test]
    fn test_decode_next_写入字节() {
        let mut dec = Decoder::open(MemorySource::new(zero_layer3(2)), no_gapless()).unwrap();
        let mut out = Vec::new();
        assert!(matches!(dec.decode_next(&mut out).unwrap(), NextStatus::NewFormat(_)));
        assert_eq!(dec.decode_next(&mut out).unwrap(), NextStatus::Bytes(1152 * 2 * 2));
        assert_eq!(out.len(), 1152 * 4);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_推送模式_不可定位() {
        let mut dec = Decoder::open_feed(no_gapless()).unwrap();
        assert_eq!(dec.decode_frame().unwrap(), DecodeStatus::NeedMoreInput);
        assert!(matches!(dec.seek(0, Whence::Set), Err(YinError::NotSeekable)));
        assert!(matches!(dec.scan(), Err(YinError::NotSeekable)));
    }

    #[test]
    fn test_空编码集合() {
        let mut config = DecoderConfig::default();
        config.output.encodings = yin_core::EncodingSet::empty();
        assert!(matches!(
            Decoder::open(MemorySource::new(Vec::new()), config),
            Err(YinError::InvalidArgument(_))
        ));
    }
}
