//! Layer III 比特储备池.
//!
//! 双槽环形结构: 当前槽保存 "上一槽末尾最多 511 字节 + 本帧主数据",
//! 奇偶标志指示当前槽. 帧的主数据从 `携带长度 - main_data_begin` 处开始.

/// 单帧最多可回溯的字节数
pub const MAX_CARRY: usize = 511;

#[derive(Debug, Default)]
pub struct Reservoir {
    slots: [Vec<u8>; 2],
    current: usize,
}

impl Reservoir {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前可供下一帧回溯的字节数
    pub fn available(&self) -> usize {
        self.slots[self.current].len().min(MAX_CARRY)
    }

    /// 推入一帧的主数据, 返回本帧主数据的起始切片
    ///
    /// 回溯量超过可用字节数时返回 `None` (储备池下溢), 数据仍被保存.
    pub fn push(&mut self, main: &[u8], main_data_begin: usize) -> Option<&[u8]> {
        let carry = self.rotate(main);
        if main_data_begin > carry {
            return None;
        }
        Some(&self.slots[self.current][carry - main_data_begin..])
    }

    /// 只保存主数据不解码 (跳帧时保持储备池连续)
    pub fn absorb(&mut self, main: &[u8]) {
        self.rotate(main);
    }

    /// 清空 (定位或重置之后)
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.current = 0;
    }

    fn rotate(&mut self, main: &[u8]) -> usize {
        let next = 1 - self.current;
        let mut buf = std::mem::take(&mut self.slots[next]);
        buf.clear();
        let prev = &self.slots[self.current];
        let carry = prev.len().min(MAX_CARRY);
        buf.extend_from_slice(&prev[prev.len() - carry..]);
        buf.extend_from_slice(main);
        self.slots[next] = buf;
        self.current = next;
        carry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_储备池回溯() {
        let mut r = Reservoir::new();
        assert_eq!(r.push(&[1, 2, 3], 0), Some(&[1u8, 2, 3][..]));
        assert_eq!(r.push(&[4, 5], 2), Some(&[2u8, 3, 4, 5][..]));
        assert_eq!(r.available(), 5);
    }

    #[test]
    fn test_储备池下溢() {
        let mut r = Reservoir::new();
        assert!(r.push(&[1, 2], 5).is_none());
        // 下溢帧的数据依然可供后续帧回溯
        assert_eq!(r.push(&[9], 2), Some(&[1u8, 2, 9][..]));
        // 只携带 3 字节时回溯 4 字节仍然下溢
        assert!(r.push(&[7], 4).is_none());
    }

    #[test]
    fn test_储备池携带上限() {
        let mut r = Reservoir::new();
        r.absorb(&vec![7u8; 1000]);
        assert_eq!(r.available(), MAX_CARRY);
        let data = r.push(&[0], MAX_CARRY).map(<[u8]>::len);
        assert_eq!(data, Some(MAX_CARRY + 1));
        assert!(r.push(&[0], MAX_CARRY + 1).is_none());
    }

    #[test]
    fn test_储备池清空() {
        let mut r = Reservoir::new();
        r.absorb(&[1, 2, 3]);
        r.clear();
        assert_eq!(r.available(), 0);
        assert!(r.push(&[1], 1).is_none());
    }
}
