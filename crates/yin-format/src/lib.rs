//! # yin-format
//!
//! MPEG 音频基本流的输入层: 字节源、缓冲读取器、标签跳过、VBR 信息帧解析与帧同步器.

pub mod io;
pub mod sync;
pub mod tags;
pub mod xing;

// 重导出常用类型
pub use io::{ByteSource, FeedSource, FileSource, MemorySource, StreamReader};
pub use sync::{FrameSync, RawFrame, SyncConfig, SyncState};
pub use tags::{TagInfo, TagKind};
pub use xing::{TrackInfo, VbrKind};
