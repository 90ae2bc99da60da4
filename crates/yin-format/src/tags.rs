//! 元数据标签识别与解析.
//!
//! 支持 ID3v2 (可带 footer)、ID3v1 (固定 128 字节) 与 APEv2 (`APETAGEX`).
//! 同步器在寻找帧头时遇到标签签名即整体跳过, ID3 的标题/艺术家/专辑文本顺带解析.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use log::debug;

/// ID3v2 头部长度
pub const ID3V2_HEADER_LEN: usize = 10;
/// ID3v1 标签长度
pub const ID3V1_LEN: usize = 128;
/// APE 头部/尾部长度
pub const APE_HEADER_LEN: usize = 32;

/// 标签种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Id3v2,
    Id3v1,
    Ape,
}

/// 标签中的文本字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// 遇到过的标签种类 (按出现顺序)
    pub kinds: Vec<TagKind>,
}

impl TagInfo {
    /// 是否没有任何文本字段
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }

    /// 合并另一份标签, 已有字段优先
    pub fn merge(&mut self, other: TagInfo) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.artist.is_none() {
            self.artist = other.artist;
        }
        if self.album.is_none() {
            self.album = other.album;
        }
        for kind in other.kinds {
            if !self.kinds.contains(&kind) {
                self.kinds.push(kind);
            }
        }
    }
}

/// 根据开头字节识别标签签名
///
/// 需要至少 3 字节 (APE 需要 8 字节才能确认).
pub fn detect(head: &[u8]) -> Option<TagKind> {
    if head.starts_with(b"ID3") {
        Some(TagKind::Id3v2)
    } else if head.starts_with(b"TAG") {
        Some(TagKind::Id3v1)
    } else if head.starts_with(b"APETAGEX") {
        Some(TagKind::Ape)
    } else {
        None
    }
}

/// 开头字节是否可能是标签签名的前缀 (数据不足以判定时使用)
pub fn maybe_tag_prefix(head: &[u8]) -> bool {
    !head.is_empty() && b"APETAGEX".starts_with(head)
}

/// 读取 syncsafe 整数 (每字节低 7 位)
fn syncsafe(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | usize::from(b & 0x7F))
}

/// 由 10 字节 ID3v2 头计算整个标签的长度 (含头部与可选 footer)
pub fn id3v2_total_size(header: &[u8]) -> Option<usize> {
    if header.len() < ID3V2_HEADER_LEN || !header.starts_with(b"ID3") {
        return None;
    }
    // 版本字节 0xFF 与大小字节最高位置 1 都不合法
    if header[3] == 0xFF || header[4] == 0xFF || header[6..10].iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let footer = if header[5] & 0x10 != 0 { 10 } else { 0 };
    Some(ID3V2_HEADER_LEN + syncsafe(&header[6..10]) + footer)
}

/// 由 32 字节 APE 头部/尾部计算应跳过的长度
///
/// 遇到的是头部时跳过整个标签; 遇到尾部时 (标签项已经被当作杂散数据扫过) 只跳过尾部.
pub fn ape_skip_size(header: &[u8]) -> Option<usize> {
    if header.len() < APE_HEADER_LEN || !header.starts_with(b"APETAGEX") {
        return None;
    }
    let size = LittleEndian::read_u32(&header[12..16]) as usize;
    let flags = LittleEndian::read_u32(&header[20..24]);
    let is_header = flags & (1 << 29) != 0;
    if is_header {
        Some(APE_HEADER_LEN + size)
    } else {
        Some(APE_HEADER_LEN)
    }
}

/// 解码 ID3v2 文本帧内容 (首字节为编码标识)
fn decode_text_frame(body: &[u8]) -> Option<String> {
    let (&enc, text) = body.split_first()?;
    let encoding: &'static Encoding = match enc {
        0 => WINDOWS_1252,
        1 => UTF_16LE,
        2 => UTF_16BE,
        3 => UTF_8,
        _ => return None,
    };
    // encoding 1 依靠 BOM 决定字节序, decode 会自动嗅探
    let (decoded, _, _) = encoding.decode(text);
    let cleaned = decoded.trim_end_matches('\0').trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// 去除 ID3v2 "非同步化" 插入的 0x00 (0xFF 0x00 → 0xFF)
fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev_ff = false;
    for &b in data {
        if prev_ff && b == 0 {
            prev_ff = false;
            continue;
        }
        out.push(b);
        prev_ff = b == 0xFF;
    }
    out
}

/// 解析完整的 ID3v2 标签 (含 10 字节头部)
pub fn parse_id3v2(tag: &[u8]) -> TagInfo {
    let mut info = TagInfo {
        kinds: vec![TagKind::Id3v2],
        ..TagInfo::default()
    };
    let Some(total) = id3v2_total_size(tag) else {
        return info;
    };
    let major = tag[3];
    let flags = tag[5];
    let footer = if flags & 0x10 != 0 { 10 } else { 0 };
    let end = total.saturating_sub(footer).min(tag.len());
    let body = &tag[ID3V2_HEADER_LEN.min(end)..end];

    // v2.4 之前的非同步化作用于整个标签体
    let owned;
    let mut body = if flags & 0x80 != 0 && major < 4 {
        owned = remove_unsync(body);
        &owned[..]
    } else {
        body
    };

    // 扩展头
    if flags & 0x40 != 0 && body.len() >= 4 {
        let ext = if major >= 4 {
            syncsafe(&body[0..4])
        } else {
            4 + byteorder::BigEndian::read_u32(&body[0..4]) as usize
        };
        body = &body[ext.min(body.len())..];
    }

    let (id_len, header_len) = if major == 2 { (3, 6) } else { (4, 10) };
    let mut pos = 0;
    while pos + header_len <= body.len() {
        let id = &body[pos..pos + id_len];
        if id[0] == 0 {
            // 进入填充区
            break;
        }
        let size = match major {
            2 => {
                (usize::from(body[pos + 3]) << 16)
                    | (usize::from(body[pos + 4]) << 8)
                    | usize::from(body[pos + 5])
            }
            3 => byteorder::BigEndian::read_u32(&body[pos + 4..pos + 8]) as usize,
            _ => syncsafe(&body[pos + 4..pos + 8]),
        };
        let start = pos + header_len;
        let end = start.saturating_add(size).min(body.len());
        let content = &body[start..end];
        match id {
            b"TIT2" | b"TT2" => info.title = decode_text_frame(content),
            b"TPE1" | b"TP1" => info.artist = decode_text_frame(content),
            b"TALB" | b"TAL" => info.album = decode_text_frame(content),
            _ => {}
        }
        pos = end;
    }
    debug!(
        "ID3v2.{major}: 标题={:?}, 艺术家={:?}, 专辑={:?}",
        info.title, info.artist, info.album
    );
    info
}

/// 解码 ID3v1 固定宽度字段
fn v1_field(bytes: &[u8]) -> Option<String> {
    let (decoded, _, _) = WINDOWS_1252.decode(bytes);
    let cleaned = decoded.trim_end_matches('\0').trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// 解析 128 字节 ID3v1 标签
pub fn parse_id3v1(tag: &[u8]) -> TagInfo {
    let mut info = TagInfo {
        kinds: vec![TagKind::Id3v1],
        ..TagInfo::default()
    };
    if tag.len() < ID3V1_LEN || !tag.starts_with(b"TAG") {
        return info;
    }
    info.title = v1_field(&tag[3..33]);
    info.artist = v1_field(&tag[33..63]);
    info.album = v1_field(&tag[63..93]);
    info
}
