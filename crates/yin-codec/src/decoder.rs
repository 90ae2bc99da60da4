//! 帧解码器: 按层分派, 持有 Layer III 的跨帧状态.

use std::sync::Arc;

use log::{trace, warn};
use yin_core::{YinError, YinResult};

use crate::context::CodecContext;
use crate::frame::DecodedFrame;
use crate::header::{FrameHeader, Layer};
use crate::layer3::Layer3Decoder;
use crate::{layer1, layer2};

/// 将帧体解码为子带样本
pub struct FrameDecoder {
    ctx: Arc<CodecContext>,
    layer3: Layer3Decoder,
    verify_crc: bool,
}

impl FrameDecoder {
    pub fn new(ctx: Arc<CodecContext>, verify_crc: bool) -> Self {
        Self {
            ctx,
            layer3: Layer3Decoder::new(),
            verify_crc,
        }
    }

    pub fn context(&self) -> &Arc<CodecContext> {
        &self.ctx
    }

    /// 解码一帧 (含帧头字节)
    ///
    /// 帧数据损坏时输出静音帧而不是返回错误, 解码流程继续.
    pub fn decode(&mut self, header: &FrameHeader, frame: &[u8]) -> YinResult<DecodedFrame> {
        let mut blocks = Vec::with_capacity(header.samples_per_frame() / 32);
        let result = match header.layer {
            Layer::I => layer1::decode(&self.ctx, header, frame, self.verify_crc, &mut blocks),
            Layer::II => layer2::decode(&self.ctx, header, frame, self.verify_crc, &mut blocks),
            Layer::III => self.layer3.decode(
                &self.ctx.layer3,
                header,
                frame,
                self.verify_crc,
                &mut blocks,
            ),
        };
        match result {
            Ok(()) => {
                trace!("解码帧: {header}, {} 个时隙", blocks.len());
                Ok(DecodedFrame {
                    header: *header,
                    blocks,
                })
            }
            Err(YinError::InvalidData(msg)) | Err(YinError::Unsupported(msg)) => {
                warn!("帧解码失败, 以静音代替: {msg}");
                Ok(DecodedFrame::silent(*header))
            }
            Err(e) => Err(e),
        }
    }

    /// 跳过一帧但保持 Layer III 储备池连续
    pub fn skip(&mut self, header: &FrameHeader, frame: &[u8]) {
        if header.layer == Layer::III {
            self.layer3.absorb(header, frame);
        }
    }

    /// 清空跨帧状态 (定位与换轨)
    pub fn reset(&mut self) {
        self.layer3.reset();
    }
}
