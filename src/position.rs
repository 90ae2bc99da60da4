//! 输出样本位置与 gapless 裁剪.
//!
//! 所有位置都以输出样本 (每声道) 计, 帧号与样本数的换算走 [`ResampleMode`],
//! 因此降采样与 N:M 重采样下定位仍然是帧号的纯函数.
//!
//! 对外的位置是"调整后"的: 减去 gapless 起点, 并截断在 gapless 终点.

use yin_codec::{Layer, ResampleMode};

/// 合成滤波器组引入的固定延迟 (原生样本)
pub const DECODER_DELAY: i64 = 529;

/// 对某一帧应采取的处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// 只吸收储备池, 不解码
    Skip,
    /// 解码并合成以预热历史, 输出丢弃
    Prime,
    /// 输出, 先截到前 `keep` 个样本再丢掉前 `trim_front` 个
    Emit {
        trim_front: usize,
        keep: Option<usize>,
    },
    /// 已越过轨道终点
    Done,
}

/// 定位前需要预解码的帧数: Layer III 至少 1 帧, Layer I/II 至多 2 帧
pub fn preshift(layer: Layer, preframes: u32) -> i64 {
    let preframes = i64::from(preframes);
    match layer {
        Layer::III => preframes.max(1),
        Layer::I | Layer::II => preframes.min(2),
    }
}

/// 单条轨道的位置状态
#[derive(Debug, Clone)]
pub struct Timeline {
    mode: ResampleMode,
    spf: usize,
    preshift: i64,
    /// gapless 起止 (原生样本, 已含解码延迟)
    gapless: Option<(i64, i64)>,
    total_frames: Option<u64>,
    first_frame: i64,
    first_off: i64,
    ignore_frame: i64,
    /// 最后一帧及其中保留的样本数
    last: Option<(i64, i64)>,
    /// 定位后已输出到的绝对位置
    pos_out: Option<i64>,
    /// 最近一次定位的调整后目标
    target: u64,
}

impl Timeline {
    pub fn new(mode: ResampleMode, spf: usize, preshift: i64) -> Self {
        let mut timeline = Self {
            mode,
            spf,
            preshift,
            gapless: None,
            total_frames: None,
            first_frame: 0,
            first_off: 0,
            ignore_frame: 0,
            last: None,
            pos_out: None,
            target: 0,
        };
        timeline.set_seek(0);
        timeline
    }

    /// 设置轨道信息; 只有总帧数已知时 gapless 才生效
    pub fn configure_track(&mut self, gapless: Option<(u32, u32)>, total_frames: Option<u64>) {
        self.total_frames = total_frames;
        self.gapless = match (gapless, total_frames) {
            (Some((delay, padding)), Some(frames)) => {
                let total = frames as i64 * self.spf as i64;
                let begin = i64::from(delay) + DECODER_DELAY;
                let end = (total - i64::from(padding) + DECODER_DELAY).min(total);
                (end > begin).then_some((begin, end))
            }
            _ => None,
        };
        self.update_end();
        self.reseek();
    }

    /// 码流中途改变采样率或每帧样本数
    pub fn set_format(&mut self, mode: ResampleMode, spf: usize, preshift: i64) {
        self.mode = mode;
        self.spf = spf;
        self.preshift = preshift;
        self.update_end();
        self.reseek();
    }

    /// 换算规则变化后重新计算尚未开始输出的定位目标
    fn reseek(&mut self) {
        if self.pos_out.is_none() {
            self.set_seek(self.target);
        }
    }

    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, frames: u64) {
        if self.total_frames.is_none() {
            self.total_frames = Some(frames);
        }
    }

    pub fn has_gapless(&self) -> bool {
        self.gapless.is_some()
    }

    fn begin_os(&self) -> i64 {
        self.gapless
            .map(|(begin, _)| self.mode.ins2outs(begin))
            .unwrap_or(0)
    }

    fn end_os(&self) -> Option<i64> {
        self.gapless.map(|(_, end)| self.mode.ins2outs(end))
    }

    fn update_end(&mut self) {
        self.last = self.end_os().map(|end| {
            let frame = self.mode.frame_offset(end, self.spf);
            (frame, end - self.mode.frame_outs(frame, self.spf))
        });
    }

    /// 定位到调整后的输出样本 `target`
    pub fn set_seek(&mut self, target: u64) {
        self.target = target;
        let abs = target as i64 + self.begin_os();
        self.first_frame = self.mode.frame_offset(abs, self.spf);
        self.first_off = abs - self.mode.frame_outs(self.first_frame, self.spf);
        self.ignore_frame = (self.first_frame - self.preshift).max(0);
        self.pos_out = None;
    }

    /// 第一帧需要完整解码的帧号
    pub fn ignore_frame(&self) -> i64 {
        self.ignore_frame
    }

    pub fn first_frame(&self) -> i64 {
        self.first_frame
    }

    pub fn action(&self, frame: i64) -> FrameAction {
        if let Some((last, last_off)) = self.last {
            if frame > last || (frame == last && last_off == 0) {
                return FrameAction::Done;
            }
        }
        if frame < self.ignore_frame {
            return FrameAction::Skip;
        }
        if frame < self.first_frame {
            return FrameAction::Prime;
        }
        let trim_front = if frame == self.first_frame {
            self.first_off as usize
        } else {
            0
        };
        let keep = match self.last {
            Some((last, last_off)) if frame == last => Some(last_off as usize),
            _ => None,
        };
        FrameAction::Emit { trim_front, keep }
    }

    /// 记录第 `frame` 帧输出到帧内第 `end` 个样本 (裁剪前的帧内坐标)
    pub fn advance(&mut self, frame: i64, end: usize) {
        self.pos_out = Some(self.mode.frame_outs(frame, self.spf) + end as i64);
    }

    /// 当前调整后的输出位置
    pub fn tell(&self) -> u64 {
        let abs = self.pos_out.unwrap_or_else(|| {
            self.mode.frame_outs(self.first_frame, self.spf) + self.first_off
        });
        let mut pos = abs - self.begin_os();
        if let Some(end) = self.end_os() {
            pos = pos.min(end - self.begin_os());
        }
        pos.max(0) as u64
    }

    /// 调整后的轨道总长度 (输出样本)
    pub fn length(&self) -> Option<u64> {
        if let Some(end) = self.end_os() {
            return Some((end - self.begin_os()).max(0) as u64);
        }
        self.total_frames
            .map(|frames| self.mode.frame_outs(frames as i64, self.spf).max(0) as u64)
    }
}
