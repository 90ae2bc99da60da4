//! 字节源抽象层.
//!
//! 解码器只需要顺序读取, 以及可选的随机定位能力.
//! [`ByteSource`] 是底层来源 (文件、内存、推送式数据),
//! [`StreamReader`] 在其上提供带缓冲的窥视/消费接口供同步器使用.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::{Buf, Bytes, BytesMut};
use yin_core::{YinError, YinResult};

/// 字节源 trait
///
/// `read` 返回 `Ok(0)` 表示输入结束, 返回 `Err(YinError::WouldBlock)`
/// 表示暂时没有数据 (推送模式下等待调用方继续喂数据).
pub trait ByteSource: Send {
    /// 读取数据到缓冲区
    fn read(&mut self, buf: &mut [u8]) -> YinResult<usize>;

    /// 定位到绝对偏移
    fn seek(&mut self, offset: u64) -> YinResult<u64> {
        let _ = offset;
        Err(YinError::NotSeekable)
    }

    /// 当前读取位置
    fn position(&self) -> u64;

    /// 总大小 (如果可知)
    fn size(&self) -> Option<u64> {
        None
    }

    /// 是否支持定位
    fn is_seekable(&self) -> bool {
        false
    }

    /// 推送数据 (仅推送式来源支持)
    fn feed(&mut self, data: &[u8]) -> YinResult<()> {
        let _ = data;
        Err(YinError::Unsupported("该字节源不接受推送数据".into()))
    }

    /// 标记推送结束 (仅推送式来源支持)
    fn end_of_feed(&mut self) -> YinResult<()> {
        Err(YinError::Unsupported("该字节源不接受推送数据".into()))
    }
}

/// 文件字节源
pub struct FileSource {
    file: File,
    size: Option<u64>,
    pos: u64,
}

impl FileSource {
    /// 只读打开文件
    pub fn open(path: impl AsRef<Path>) -> YinResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }

    /// 从已打开的文件创建
    pub fn new(file: File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size, pos: 0 }
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> YinResult<usize> {
        loop {
            match self.file.read(buf) {
                Ok(n) => {
                    self.pos += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn seek(&mut self, offset: u64) -> YinResult<u64> {
        self.pos = self.file.seek(SeekFrom::Start(offset))?;
        Ok(self.pos)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存字节源
///
/// 用于测试和已整体载入内存的码流.
pub struct MemorySource {
    data: Bytes,
    pos: usize,
}

impl MemorySource {
    /// 从已有数据创建
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> YinResult<usize> {
        let start = self.pos.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos = start + n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> YinResult<u64> {
        // 越过末尾的定位是合法的, 之后的读取返回 0
        self.pos = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(offset)
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 推送式字节源
///
/// 调用方通过 `feed` 追加数据; 读到已推送数据的末尾时返回 `WouldBlock`,
/// 直到 `end_of_feed` 之后才返回输入结束.
#[derive(Default)]
pub struct FeedSource {
    pending: BytesMut,
    consumed: u64,
    finished: bool,
}

impl FeedSource {
    /// 创建空的推送源
    pub fn new() -> Self {
        Self::default()
    }

    /// 尚未被读取的字节数
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// 是否已标记结束
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ByteSource for FeedSource {
    fn read(&mut self, buf: &mut [u8]) -> YinResult<usize> {
        if self.pending.is_empty() {
            return if self.finished {
                Ok(0)
            } else {
                Err(YinError::WouldBlock)
            };
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        self.consumed += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.consumed
    }

    fn feed(&mut self, data: &[u8]) -> YinResult<()> {
        if self.finished {
            return Err(YinError::InvalidArgument("推送已结束, 不能继续追加数据".into()));
        }
        self.pending.extend_from_slice(data);
        Ok(())
    }

    fn end_of_feed(&mut self) -> YinResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// 每次向字节源请求的块大小
const READ_CHUNK: usize = 16 * 1024;

/// 带缓冲的码流读取器
///
/// 同步器通过 `ensure` + `peek` 查看数据而不消费, 确认完整帧后再 `take`.
/// 因此字节源暂不可读时, 读取器中已缓冲的数据原样保留.
pub struct StreamReader {
    source: Box<dyn ByteSource>,
    buffer: BytesMut,
    /// `buffer[0]` 在码流中的偏移
    offset: u64,
    /// 字节源已返回输入结束
    exhausted: bool,
}

impl StreamReader {
    /// 包装字节源
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        let offset = source.position();
        Self {
            source,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            offset,
            exhausted: false,
        }
    }

    /// 确保至少 `n` 字节可窥视
    ///
    /// 返回实际可用的字节数; 小于 `n` 时说明输入已经结束.
    /// 字节源暂不可读时返回 `Err(YinError::WouldBlock)`.
    pub fn ensure(&mut self, n: usize) -> YinResult<usize> {
        while self.buffer.len() < n && !self.exhausted {
            let old = self.buffer.len();
            let want = (n - old).max(READ_CHUNK);
            self.buffer.resize(old + want, 0);
            let result = self.source.read(&mut self.buffer[old..]);
            match result {
                Ok(0) => {
                    self.buffer.truncate(old);
                    self.exhausted = true;
                }
                Ok(got) => self.buffer.truncate(old + got),
                Err(e) => {
                    self.buffer.truncate(old);
                    return Err(e);
                }
            }
        }
        Ok(self.buffer.len().min(n))
    }

    /// 已缓冲的字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 窥视最多 `n` 字节
    pub fn peek(&self, n: usize) -> &[u8] {
        &self.buffer[..n.min(self.buffer.len())]
    }

    /// 窥视 `[at, at + n)` 区间 (不足时截短)
    pub fn peek_at(&self, at: usize, n: usize) -> &[u8] {
        let start = at.min(self.buffer.len());
        let end = at.saturating_add(n).min(self.buffer.len());
        &self.buffer[start..end]
    }

    /// 丢弃 `n` 字节 (不超过已缓冲量)
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.advance(n);
        self.offset += n as u64;
    }

    /// 取出 `n` 字节 (不超过已缓冲量)
    pub fn take(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buffer.len());
        self.offset += n as u64;
        self.buffer.split_to(n).freeze()
    }

    /// 跳过 `n` 字节, 必要时从字节源读取
    ///
    /// 返回实际跳过的字节数 (输入结束时可能不足).
    pub fn skip(&mut self, n: u64) -> YinResult<u64> {
        let mut left = n;
        while left > 0 {
            if self.buffer.is_empty() {
                // 可定位时直接越过
                if self.source.is_seekable() {
                    let target = self.offset + left;
                    if let Some(size) = self.source.size() {
                        if target > size {
                            let skipped = size.saturating_sub(self.offset);
                            self.seek(size)?;
                            return Ok(n - left + skipped);
                        }
                    }
                    self.seek(target)?;
                    return Ok(n);
                }
                let want = usize::try_from(left).unwrap_or(usize::MAX).min(READ_CHUNK);
                if self.ensure(want)? == 0 {
                    break;
                }
            }
            let chunk = usize::try_from(left)
                .unwrap_or(usize::MAX)
                .min(self.buffer.len());
            self.consume(chunk);
            left -= chunk as u64;
        }
        Ok(n - left)
    }

    /// 读取位置在码流中的偏移
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 输入是否已经完全读完
    pub fn at_end(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// 定位到绝对偏移, 清空缓冲区
    pub fn seek(&mut self, offset: u64) -> YinResult<()> {
        if !self.source.is_seekable() {
            return Err(YinError::NotSeekable);
        }
        self.source.seek(offset)?;
        self.buffer.clear();
        self.offset = offset;
        self.exhausted = false;
        Ok(())
    }

    /// 是否支持定位
    pub fn is_seekable(&self) -> bool {
        self.source.is_seekable()
    }

    /// 码流总大小 (如果可知)
    pub fn size(&self) -> Option<u64> {
        self.source.size()
    }

    /// 向推送式来源追加数据
    pub fn feed(&mut self, data: &[u8]) -> YinResult<()> {
        self.source.feed(data)
    }

    /// 标记推送结束
    pub fn end_of_feed(&mut self) -> YinResult<()> {
        self.source.end_of_feed()
    }
}
