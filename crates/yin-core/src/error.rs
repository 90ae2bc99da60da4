//! 统一错误类型定义.
//!
//! 所有 Yin crate 共用的错误类型, 按可恢复性划分:
//! - 可恢复: 数据不足 / 源暂不可读 / 流结束, 调用方补充数据或收尾即可
//! - 码流错误: 由同步器内部重同步吸收, 一般不会到达调用方
//! - 致命错误: 格式协商失败、重同步超限、不可定位源上的定位请求

use thiserror::Error;

/// Yin 解码器统一错误类型
#[derive(Debug, Error)]
pub enum YinError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 字节源暂时无法提供数据
    #[error("字节源暂不可读")]
    WouldBlock,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 重同步超过字节上限
    #[error("重同步失败: 自偏移 {offset} 起扫描 {limit} 字节仍未找到有效帧头")]
    ResyncFailed { offset: u64, limit: u64 },

    /// 没有可用的输出格式组合
    #[error("没有兼容的输出格式: {0}")]
    NoCompatibleFormat(String),

    /// 字节源不支持定位
    #[error("字节源不支持定位")]
    NotSeekable,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl YinError {
    /// 是否为可恢复的状态信号 (而非真正的错误)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NeedMoreData | Self::WouldBlock | Self::Eof)
    }

    /// 是否为致命错误, 调用方需关闭后重新打开
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResyncFailed { .. }
                | Self::NoCompatibleFormat(_)
                | Self::NotSeekable
                | Self::Internal(_)
        )
    }
}

/// Yin 统一 Result 类型
pub type YinResult<T> = Result<T, YinError>;
