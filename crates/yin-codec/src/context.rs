//! 解码器共享的只读表.
//!
//! 表只构造一次: [`CodecContext::init`] 首次调用时建表, 之后的调用返回同一个 `Arc`.

use std::sync::{Arc, OnceLock};

use log::debug;

use crate::layer3::tables::Layer3Tables;
use crate::synth::kernel::SynthTables;

static CONTEXT: OnceLock<Arc<CodecContext>> = OnceLock::new();

/// 全部解码表
pub struct CodecContext {
    pub layer3: Layer3Tables,
    pub synth: SynthTables,
    /// Layer I/II 缩放因子: 2 · 2^(-i/3), 第 63 项为 0
    scalefactors: [f32; 64],
}

impl CodecContext {
    /// 取得共享上下文, 重复调用是幂等的
    pub fn init() -> Arc<Self> {
        CONTEXT
            .get_or_init(|| {
                debug!("初始化解码表");
                Arc::new(Self::build())
            })
            .clone()
    }

    fn build() -> Self {
        let mut scalefactors = [0f32; 64];
        for (i, v) in scalefactors.iter_mut().enumerate().take(63) {
            *v = (2.0 * 2f64.powf(-(i as f64) / 3.0)) as f32;
        }
        Self {
            layer3: Layer3Tables::new(),
            synth: SynthTables::default(),
            scalefactors,
        }
    }

    /// Layer I/II 缩放因子
    pub fn scalefactor(&self, index: u32) -> f32 {
        self.scalefactors.get(index as usize).copied().unwrap_or(0.0)
    }
}
