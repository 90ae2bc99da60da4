//! 合成滤波器的矩阵运算: 32 个子带样本 → 64 个 V 值.
//!
//! V[i] = Σ S[k]·cos((16 + i)(2k + 1)π / 64), 由 32 点 DCT-II 的对称性展开得到.
//! DCT-II 采用 Lee 的递归蝶形分解, 每一级把长度 n 拆成两个 n/2 的变换.

use std::f64::consts::PI;

/// 各级蝶形的 1 / (2cos((i + 0.5)π / n)), n = 32, 16, 8, 4, 2 依次排列;
/// 长度 n 的一级从下标 `32 - n` 开始.
#[derive(Debug, Clone)]
pub struct DctCoefficients {
    factors: [f32; 31],
}

impl DctCoefficients {
    pub fn new() -> Self {
        let mut factors = [0f32; 31];
        let mut n = 32usize;
        while n >= 2 {
            for i in 0..n / 2 {
                factors[32 - n + i] = (0.5 / ((i as f64 + 0.5) * PI / n as f64).cos()) as f32;
            }
            n /= 2;
        }
        Self { factors }
    }
}

impl Default for DctCoefficients {
    fn default() -> Self {
        Self::new()
    }
}

/// 原位 DCT-II: X[k] = Σ x[n]·cos(π(n + 0.5)k / N), `tmp` 与 `v` 等长
fn dct_lee(v: &mut [f32], tmp: &mut [f32], coef: &DctCoefficients) {
    let n = v.len();
    if n == 1 {
        return;
    }
    let half = n / 2;
    let factors = &coef.factors[32 - n..32 - n + half];
    for i in 0..half {
        let x = v[i];
        let y = v[n - 1 - i];
        tmp[i] = x + y;
        tmp[i + half] = (x - y) * factors[i];
    }
    {
        let (lo, hi) = tmp.split_at_mut(half);
        let (scratch_lo, scratch_hi) = v.split_at_mut(half);
        dct_lee(lo, scratch_lo, coef);
        dct_lee(hi, scratch_hi, coef);
    }
    for i in 0..half - 1 {
        v[2 * i] = tmp[i];
        v[2 * i + 1] = tmp[i + half] + tmp[i + half + 1];
    }
    v[n - 2] = tmp[half - 1];
    v[n - 1] = tmp[n - 1];
}

/// 由 32 个子带样本计算 64 个 V 值
pub fn dct64(coef: &DctCoefficients, bands: &[f32; 32], v: &mut [f32; 64]) {
    let mut a = *bands;
    let mut tmp = [0f32; 32];
    dct_lee(&mut a, &mut tmp, coef);

    for i in 0..16 {
        v[i] = a[16 + i];
    }
    v[16] = 0.0;
    for i in 17..48 {
        v[i] = -a[48 - i];
    }
    for i in 48..64 {
        v[i] = -a[i - 48];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dct64_与直接公式一致() {
        let coef = DctCoefficients::new();
        let mut bands = [0f32; 32];
        for (k, b) in bands.iter_mut().enumerate() {
            *b = ((k * 7 + 3) % 11) as f32 / 11.0 - 0.5;
        }
        let mut v = [0f32; 64];
        dct64(&coef, &bands, &mut v);
        for (i, &got) in v.iter().enumerate() {
            let want: f64 = (0..32)
                .map(|k| {
                    bands[k] as f64 * ((16 + i) as f64 * (2 * k + 1) as f64 * PI / 64.0).cos()
                })
                .sum();
            assert!((got as f64 - want).abs() < 1e-4, "V[{i}]: {got} != {want}");
        }
    }

    #[test]
    fn test_dct64_零输入() {
        let coef = DctCoefficients::new();
        let mut v = [1f32; 64];
        dct64(&coef, &[0.0; 32], &mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }
}
