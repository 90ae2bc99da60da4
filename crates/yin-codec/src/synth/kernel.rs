//! 合成内核: 矩阵运算与窗口累加.
//!
//! 内核在解码器构造时选定, 解码流程只通过 [`SynthesisKernel`] 调用它,
//! 诊断时可查询其标识.

use log::debug;

use super::dct64::{DctCoefficients, dct64};
use super::window::SynthWindow;

/// 合成所需的只读表
#[derive(Debug, Clone, Default)]
pub struct SynthTables {
    pub dct: DctCoefficients,
    pub window: SynthWindow,
}

/// 单声道合成历史: 最近 16 次矩阵运算的 V 向量, 环形存放
///
/// `pos` 指向最新一项, 每次合成前递减.
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    ring: [[f32; 64]; 16],
    pos: usize,
}

impl Default for ChannelHistory {
    fn default() -> Self {
        Self {
            ring: [[0.0; 64]; 16],
            pos: 0,
        }
    }
}

impl ChannelHistory {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 推入新的 V 向量, 返回其槽位
    fn push(&mut self) -> &mut [f32; 64] {
        self.pos = (self.pos + 15) % 16;
        &mut self.ring[self.pos]
    }

    /// 第 `age` 新的 V 向量 (0 为最新)
    fn get(&self, age: usize) -> &[f32; 64] {
        &self.ring[(self.pos + age) % 16]
    }
}

/// 合成内核接口
pub trait SynthesisKernel: Send + Sync {
    /// 诊断用标识
    fn tag(&self) -> &'static str;

    /// 一次合成: 32 个子带样本 → 32 个原生采样率的浮点样本 (满幅 ±1.0)
    fn synth(
        &self,
        tables: &SynthTables,
        bands: &[f32; 32],
        history: &mut ChannelHistory,
        out: &mut [f32; 32],
    );
}

/// 通用标量实现
#[derive(Debug, Default)]
pub struct GenericKernel;

impl SynthesisKernel for GenericKernel {
    fn tag(&self) -> &'static str {
        "generic"
    }

    fn synth(
        &self,
        tables: &SynthTables,
        bands: &[f32; 32],
        history: &mut ChannelHistory,
        out: &mut [f32; 32],
    ) {
        dct64(&tables.dct, bands, history.push());
        let d = &tables.window.d;
        for (j, o) in out.iter_mut().enumerate() {
            let mut sum = 0f32;
            for i in 0..8 {
                sum += d[64 * i + j] * history.get(2 * i)[j];
                sum += d[64 * i + 32 + j] * history.get(2 * i + 1)[32 + j];
            }
            *o = sum;
        }
    }
}

/// 按标识选择内核, `None` 或未知标识时使用通用实现
pub fn select_kernel(preferred: Option<&str>) -> Box<dyn SynthesisKernel> {
    match preferred {
        Some("generic") | None => {}
        Some(other) => debug!("合成内核 {other} 不可用, 使用 generic"),
    }
    Box::new(GenericKernel)
}
