//! 帧同步器.
//!
//! 在字节流中定位有效帧头, 跳过标签与杂散数据, 失步后逐字节重同步.
//!
//! 状态:
//! - `SeekingSync`: 初始或刚跳过标签, 尚无可信的帧边界
//! - `HeaderCandidate`: 解析出帧头, 正在确认帧长与下一帧头
//! - `InFrame`: 刚交付完整帧, 下一帧头应紧随其后
//! - `Resync`: 帧边界处没有帧头, 逐字节向后搜索
//!
//! 第一帧、重同步后以及码流参数变化处的帧头都要经过预读校验:
//! `frame_size` 字节之后必须是同一条流的帧头 (或标签/输入结束), 否则视为误判.

use bytes::Bytes;
use log::{debug, trace, warn};
use yin_codec::{FrameHeader, Layer};
use yin_core::{YinError, YinResult};

use crate::io::StreamReader;
use crate::tags::{self, TagInfo, TagKind};
use crate::xing::{self, TrackInfo};

/// 重同步默认字节上限
pub const DEFAULT_RESYNC_LIMIT: u64 = 1024;

/// 自由格式帧长探测的最大搜索长度
pub const FREE_FORMAT_SEARCH: usize = 3456;

/// ID3v2 标签解析时最多缓冲的字节数, 超出部分直接跳过
const MAX_TAG_PARSE: usize = 256 * 1024;

/// 同步器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    SeekingSync,
    HeaderCandidate,
    InFrame,
    Resync,
}

/// 同步器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// 重同步字节上限, `None` 表示不限
    pub resync_limit: Option<u64>,
    /// 是否识别并跳过标签
    pub skip_tags: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            resync_limit: Some(DEFAULT_RESYNC_LIMIT),
            skip_tags: true,
        }
    }
}

/// 一个完整的原始帧
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: FrameHeader,
    /// 帧头在码流中的偏移
    pub offset: u64,
    /// 含帧头的完整帧数据
    pub data: Bytes,
}

impl RawFrame {
    /// 帧长 (字节)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 候选帧头的判定结果
enum Candidate {
    Frame(RawFrame),
    Reject,
    /// 可信位置上的帧被输入结束截断
    Truncated,
}

/// 帧同步器
pub struct FrameSync {
    config: SyncConfig,
    state: SyncState,
    /// 当前流的参考帧头 (固定位)
    reference: Option<FrameHeader>,
    /// 自由格式基准帧长 (不含填充)
    free_base: Option<usize>,
    /// 已交付的音频帧数
    frames: u64,
    /// 自上一个有效帧以来跳过的杂散字节
    skipped: u64,
    /// 下一个帧头需要预读校验
    verify_next: bool,
    /// 尚未跳过的标签字节
    pending_skip: u64,
    tags: TagInfo,
    track_info: Option<TrackInfo>,
    /// 信息帧所在偏移, 定位回到该处时再次跳过
    info_offset: Option<u64>,
}

impl FrameSync {
    /// 创建同步器
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: SyncState::SeekingSync,
            reference: None,
            free_base: None,
            frames: 0,
            skipped: 0,
            verify_next: true,
            pending_skip: 0,
            tags: TagInfo::default(),
            track_info: None,
            info_offset: None,
        }
    }

    /// 当前状态
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// 已解析的标签文本
    pub fn tags(&self) -> &TagInfo {
        &self.tags
    }

    /// 信息帧 (Xing/Info/VBRI) 内容
    pub fn track_info(&self) -> Option<&TrackInfo> {
        self.track_info.as_ref()
    }

    /// 信息帧在码流中的偏移 (无信息帧时为 `None`)
    pub fn info_frame_offset(&self) -> Option<u64> {
        self.info_offset
    }

    /// 已交付的音频帧数
    pub fn frames_found(&self) -> u64 {
        self.frames
    }

    /// 已探测到的自由格式基准帧长
    pub fn free_format_base(&self) -> Option<usize> {
        self.free_base
    }

    /// 定位后调用: 丢弃边界信息, 下一帧头重新预读校验
    pub fn reset_for_seek(&mut self) {
        self.state = SyncState::SeekingSync;
        self.skipped = 0;
        self.verify_next = true;
        self.pending_skip = 0;
    }

    /// 读取下一个完整音频帧
    ///
    /// - `Err(WouldBlock)`: 字节源暂不可读, 已缓冲的数据保留, 稍后重试
    /// - `Err(Eof)`: 正常结束 (末尾被截断的帧直接丢弃)
    /// - `Err(ResyncFailed)`: 超过重同步上限
    /// - `Err(InvalidData)`: 整个输入中没有找到任何帧
    pub fn next_frame(&mut self, reader: &mut StreamReader) -> YinResult<RawFrame> {
        loop {
            self.drain_pending(reader)?;

            if reader.ensure(4)? < 4 {
                return self.finish(reader);
            }
            if self.config.skip_tags && self.try_skip_tag(reader)? {
                continue;
            }

            let head = reader.peek(4);
            let raw = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
            if let Ok(header) = FrameHeader::parse(raw) {
                self.state = SyncState::HeaderCandidate;
                match self.try_frame(reader, header)? {
                    Candidate::Frame(frame) => {
                        if self.is_info_frame(&frame) {
                            continue;
                        }
                        self.frames += 1;
                        trace!("帧 @ {}: {} ({} 字节)", frame.offset, frame.header, frame.len());
                        return Ok(frame);
                    }
                    Candidate::Truncated => return self.finish(reader),
                    Candidate::Reject => {}
                }
            }
            self.skip_byte(reader)?;
        }
    }

    /// 判定候选帧头
    fn try_frame(&mut self, reader: &mut StreamReader, header: FrameHeader) -> YinResult<Candidate> {
        let continues = self
            .reference
            .map(|r| r.same_stream(&header))
            .unwrap_or(false);
        let need_check = self.verify_next || !continues;

        let size = if header.is_free_format() {
            match self.free_frame_size(reader, &header, continues)? {
                Some(size) => size,
                None => return Ok(Candidate::Reject),
            }
        } else {
            match header.frame_size_bytes() {
                Some(size) => size,
                None => return Ok(Candidate::Reject),
            }
        };
        let minimum = header.body_offset()
            + if header.layer == Layer::III {
                header.side_info_size()
            } else {
                0
            };
        if size < minimum {
            return Ok(Candidate::Reject);
        }

        if reader.ensure(size)? < size {
            return Ok(if need_check {
                Candidate::Reject
            } else {
                debug!("末尾帧被截断 @ {}, 丢弃", reader.offset());
                Candidate::Truncated
            });
        }

        if need_check && !self.read_ahead_ok(reader, &header, size)? {
            trace!("帧头 @ {} 未通过预读校验", reader.offset());
            return Ok(Candidate::Reject);
        }

        let offset = reader.offset();
        let data = reader.take(size);
        if self.skipped > 0 {
            debug!("跳过 {} 字节后重新同步 @ {offset}", self.skipped);
        }
        if !continues {
            if self.reference.is_some() {
                debug!("码流参数变化 @ {offset}: {header}");
            }
            self.reference = Some(header);
        }
        self.skipped = 0;
        self.verify_next = false;
        self.state = SyncState::InFrame;
        Ok(Candidate::Frame(RawFrame {
            header,
            offset,
            data,
        }))
    }

    /// 预读校验: `size` 字节之后应是同一条流的帧头、标签或输入结束
    fn read_ahead_ok(
        &self,
        reader: &mut StreamReader,
        header: &FrameHeader,
        size: usize,
    ) -> YinResult<bool> {
        let avail = reader.ensure(size + 4)?;
        if avail < size + 4 {
            // 帧之后的数据不足 4 字节: 只有恰好结束才算通过
            return Ok(avail == size || tags::maybe_tag_prefix(reader.peek_at(size, 4)));
        }
        let next = reader.peek_at(size, 4);
        if tags::detect(next).is_some() || tags::maybe_tag_prefix(next) {
            return Ok(true);
        }
        let raw = u32::from_be_bytes([next[0], next[1], next[2], next[3]]);
        Ok(header.matches_fixed_bits(raw) && FrameHeader::parse(raw).is_ok())
    }

    /// 自由格式帧长: 已知基准时直接计算, 否则向后搜索下一个固定位一致的帧头
    fn free_frame_size(
        &mut self,
        reader: &mut StreamReader,
        header: &FrameHeader,
        continues: bool,
    ) -> YinResult<Option<usize>> {
        if continues {
            if let Some(base) = self.free_base {
                return Ok(Some(header.free_frame_size(base)));
            }
        }
        let avail = reader.ensure(FREE_FORMAT_SEARCH + 4)?;
        let window = reader.peek(avail);
        let start = header.body_offset() + 1;
        for pos in start..avail.saturating_sub(3) {
            let cand = u32::from_be_bytes([
                window[pos],
                window[pos + 1],
                window[pos + 2],
                window[pos + 3],
            ]);
            let free = (cand >> 12) & 0xF == 0;
            if free && header.matches_fixed_bits(cand) && FrameHeader::parse(cand).is_ok() {
                let base = header.free_base_from_frame(pos);
                debug!("自由格式帧长探测: {pos} 字节 (基准 {base})");
                self.free_base = Some(base);
                return Ok(Some(pos));
            }
        }
        Ok(None)
    }

    /// 识别并跳过标签, 返回是否跳过了标签
    fn try_skip_tag(&mut self, reader: &mut StreamReader) -> YinResult<bool> {
        let kind = match tags::detect(reader.peek(4)) {
            Some(kind) => kind,
            None if reader.peek(4).starts_with(b"APET") => {
                reader.ensure(tags::APE_HEADER_LEN)?;
                match tags::detect(reader.peek(8)) {
                    Some(kind) => kind,
                    None => return Ok(false),
                }
            }
            None => return Ok(false),
        };

        let offset = reader.offset();
        let (size, info) = match kind {
            TagKind::Id3v2 => {
                reader.ensure(tags::ID3V2_HEADER_LEN)?;
                let Some(total) = tags::id3v2_total_size(reader.peek(tags::ID3V2_HEADER_LEN)) else {
                    return Ok(false);
                };
                let parse_len = reader.ensure(total.min(MAX_TAG_PARSE))?;
                (total, tags::parse_id3v2(reader.peek(parse_len)))
            }
            TagKind::Id3v1 => {
                if reader.ensure(tags::ID3V1_LEN)? < tags::ID3V1_LEN {
                    return Ok(false);
                }
                (tags::ID3V1_LEN, tags::parse_id3v1(reader.peek(tags::ID3V1_LEN)))
            }
            TagKind::Ape => {
                let Some(size) = tags::ape_skip_size(reader.peek(tags::APE_HEADER_LEN)) else {
                    return Ok(false);
                };
                let info = TagInfo {
                    kinds: vec![TagKind::Ape],
                    ..TagInfo::default()
                };
                (size, info)
            }
        };

        debug!("跳过 {kind:?} 标签 @ {offset}, 大小={size} 字节");
        self.tags.merge(info);
        self.state = SyncState::SeekingSync;
        self.verify_next = true;
        self.pending_skip = size as u64;
        self.drain_pending(reader)?;
        Ok(true)
    }

    /// 跳过尚未越过的标签字节
    fn drain_pending(&mut self, reader: &mut StreamReader) -> YinResult<()> {
        if self.pending_skip == 0 {
            return Ok(());
        }
        if reader.is_seekable() {
            reader.skip(self.pending_skip)?;
            self.pending_skip = 0;
            return Ok(());
        }
        while self.pending_skip > 0 {
            let want = usize::try_from(self.pending_skip)
                .unwrap_or(usize::MAX)
                .min(64 * 1024);
            let got = reader.ensure(want)?;
            if got == 0 {
                self.pending_skip = 0;
                break;
            }
            reader.consume(got);
            self.pending_skip -= got as u64;
        }
        Ok(())
    }

    /// 第一帧可能是信息帧, 是则记录并跳过
    fn is_info_frame(&mut self, frame: &RawFrame) -> bool {
        if let Some(at) = self.info_offset {
            return at == frame.offset;
        }
        if self.frames > 0 || self.track_info.is_some() {
            return false;
        }
        match xing::parse(&frame.header, &frame.data) {
            Some(info) => {
                self.track_info = Some(info);
                self.info_offset = Some(frame.offset);
                true
            }
            None => false,
        }
    }

    /// 逐字节向后搜索
    fn skip_byte(&mut self, reader: &mut StreamReader) -> YinResult<()> {
        if self.skipped == 0 && self.frames > 0 {
            warn!("帧边界 @ {} 处失去同步, 开始重同步", reader.offset());
        }
        reader.consume(1);
        self.skipped += 1;
        self.verify_next = true;
        self.state = if self.frames > 0 {
            SyncState::Resync
        } else {
            SyncState::SeekingSync
        };
        if let Some(limit) = self.config.resync_limit {
            if self.skipped > limit {
                return Err(YinError::ResyncFailed {
                    offset: reader.offset() - self.skipped,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// 输入结束
    fn finish(&mut self, reader: &mut StreamReader) -> YinResult<RawFrame> {
        let rest = reader.buffered();
        reader.consume(rest);
        if self.frames > 0 || self.track_info.is_some() {
            Err(YinError::Eof)
        } else {
            Err(YinError::InvalidData("未找到有效的 MPEG 音频帧".into()))
        }
    }
}
