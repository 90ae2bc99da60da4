//! 帧号到字节偏移的定位索引.
//!
//! 每隔 `step` 帧记录一项, 即第 `i` 项对应第 `i * step` 帧. 容量用尽时要么扩容,
//! 要么把 `step` 加倍并丢弃奇数项, 因此第 0 帧的记录始终保留.

use log::trace;

/// 稀疏的 (帧号, 字节偏移) 索引
#[derive(Debug, Clone)]
pub struct SeekIndex {
    offsets: Vec<u64>,
    step: u64,
    capacity: usize,
    grow: usize,
}

impl SeekIndex {
    /// `capacity` 为 0 时不记录任何项; `grow` 为 0 时满后稀释
    pub fn new(capacity: usize, grow: usize) -> Self {
        Self {
            offsets: Vec::with_capacity(capacity),
            step: 1,
            capacity,
            grow,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 下一项应记录的帧号
    pub fn next_frame(&self) -> u64 {
        self.offsets.len() as u64 * self.step
    }

    /// 已索引到的最后一帧
    pub fn last_frame(&self) -> Option<u64> {
        (self.offsets.len() as u64).checked_sub(1).map(|i| i * self.step)
    }

    /// 第 `i` 项 `(帧号, 偏移)`
    pub fn entry(&self, i: usize) -> Option<(u64, u64)> {
        self.offsets.get(i).map(|&off| (i as u64 * self.step, off))
    }

    pub fn entries(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .map(|(i, &off)| (i as u64 * self.step, off))
    }

    /// 记录一帧; 只有帧号恰为下一索引点时才写入
    pub fn record(&mut self, frame: u64, offset: u64) {
        if self.capacity == 0 || frame != self.next_frame() {
            return;
        }
        if self.offsets.len() >= self.capacity {
            if self.grow > 0 {
                self.capacity += self.grow;
                trace!("定位索引扩容到 {}", self.capacity);
            } else {
                self.shrink();
                // 稀释后下一索引点可能不再是本帧
                if frame != self.next_frame() {
                    return;
                }
            }
        }
        self.offsets.push(offset);
    }

    fn shrink(&mut self) {
        let kept: Vec<u64> = self.offsets.iter().step_by(2).copied().collect();
        self.offsets = kept;
        self.step *= 2;
        trace!(
            "定位索引稀释: step={}, {} 项",
            self.step,
            self.offsets.len()
        );
    }

    /// 不晚于 `frame` 的最近索引项
    pub fn find(&self, frame: u64) -> Option<(u64, u64)> {
        if self.offsets.is_empty() {
            return None;
        }
        let i = ((frame / self.step) as usize).min(self.offsets.len() - 1);
        self.entry(i)
    }

    /// 字节偏移恰为某索引项时返回其帧号
    pub fn frame_at_offset(&self, offset: u64) -> Option<u64> {
        self.offsets
            .binary_search(&offset)
            .ok()
            .map(|i| i as u64 * self.step)
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
        self.step = 1;
    }
}
