//! 任意有理比例 (N:M) 重采样的定点计数.
//!
//! 累加器以 [`NTOM_MUL`] 为单位: 每个原生样本加 `step`, 每越过一次 `NTOM_MUL`
//! 输出一个样本. 帧起点的累加器值只取决于帧号与 `step`, 因此定位后无需回放.

use yin_core::{YinError, YinResult};

/// 定点倍数
pub const NTOM_MUL: u64 = 32768;
/// 输出与原生采样率之比的上限
pub const NTOM_MAX_RATIO: u64 = 8;
/// 允许的最高采样率
pub const NTOM_MAX_RATE: u32 = 96000;

/// 与帧号相关的 N:M 计数公式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtomClock {
    step: u64,
    spf: u64,
    output_rate: u32,
}

impl NtomClock {
    pub fn new(native_rate: u32, output_rate: u32, samples_per_frame: usize) -> YinResult<Self> {
        if native_rate == 0 || output_rate == 0 {
            return Err(YinError::InvalidArgument("采样率不能为 0".into()));
        }
        if native_rate > NTOM_MAX_RATE || output_rate > NTOM_MAX_RATE {
            return Err(YinError::Unsupported(format!(
                "N:M 重采样不支持超过 {NTOM_MAX_RATE} Hz 的采样率: {native_rate} → {output_rate}"
            )));
        }
        let step = u64::from(output_rate) * NTOM_MUL / u64::from(native_rate);
        if step == 0 || step > NTOM_MAX_RATIO * NTOM_MUL {
            return Err(YinError::Unsupported(format!(
                "N:M 重采样比例超出范围: {native_rate} → {output_rate}"
            )));
        }
        Ok(Self {
            step,
            spf: samples_per_frame as u64,
            output_rate,
        })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    fn phase(&self, frame: i64) -> u64 {
        NTOM_MUL / 2 + frame.max(0) as u64 * self.spf * self.step
    }

    /// 第 `frame` 帧开始时的累加器值
    pub fn ntom_val(&self, frame: i64) -> u64 {
        self.phase(frame) % NTOM_MUL
    }

    /// 第 0..frame 帧输出的样本总数
    pub fn frame_outs(&self, frame: i64) -> i64 {
        (self.phase(frame) / NTOM_MUL) as i64
    }

    /// 第 `outs` 个输出样本所在的帧
    pub fn frame_offset(&self, outs: i64) -> i64 {
        if outs <= 0 {
            return 0;
        }
        let per_frame = self.spf * self.step;
        let target = (outs as u64 + 1) * NTOM_MUL - NTOM_MUL / 2;
        (target.div_ceil(per_frame) as i64 - 1).max(0)
    }

    /// 原生样本数换算为输出样本数
    pub fn ins2outs(&self, ins: i64) -> i64 {
        ((NTOM_MUL / 2 + ins.max(0) as u64 * self.step) / NTOM_MUL) as i64
    }
}

/// 逐样本推进累加器, 对越过的每个单位调用 `emit`
#[inline]
pub fn advance(acc: &mut u64, step: u64, mut emit: impl FnMut()) {
    *acc += step;
    while *acc >= NTOM_MUL {
        emit();
        *acc -= NTOM_MUL;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_公式与逐帧累加一致() {
        let clock = NtomClock::new(44100, 48000, 1152).unwrap();
        let mut acc = NTOM_MUL / 2;
        let mut total = 0i64;
        for frame in 0..2000i64 {
            assert_eq!(clock.ntom_val(frame), acc);
            assert_eq!(clock.frame_outs(frame), total);
            for _ in 0..1152 {
                advance(&mut acc, clock.step(), || total += 1);
            }
        }
    }

    #[test]
    fn test_帧偏移为帧输出的逆() {
        for (native, out, spf) in [(44100, 48000, 1152), (48000, 8000, 384), (8000, 44100, 576)] {
            let clock = NtomClock::new(native, out, spf).unwrap();
            for s in (0..50_000i64).step_by(97) {
                let f = clock.frame_offset(s);
                assert!(clock.frame_outs(f) <= s && s < clock.frame_outs(f + 1), "s={s} f={f}");
            }
        }
    }

    #[test]
    fn test_比例限制() {
        assert!(NtomClock::new(8000, 96000, 576).is_err());
        assert!(NtomClock::new(44100, 192000, 1152).is_err());
        assert!(NtomClock::new(11025, 88200, 576).is_ok());
    }

    #[test]
    fn test_样本数换算() {
        let clock = NtomClock::new(44100, 22050, 1152).unwrap();
        assert_eq!(clock.ins2outs(0), 0);
        assert_eq!(clock.ins2outs(1000), 500);
    }
}
