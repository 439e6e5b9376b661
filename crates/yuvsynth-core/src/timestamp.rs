//! 时间戳: 以时间基为单位的 pts.

use std::fmt;

use crate::rational::Rational;

/// 未设置的 pts
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 带时间基的时间戳, 秒数 = pts * time_base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub pts: i64,
    pub time_base: Rational,
}

impl Timestamp {
    pub const fn new(pts: i64, time_base: Rational) -> Self {
        Self { pts, time_base }
    }

    /// pts 已设置且时间基有效
    pub const fn is_valid(&self) -> bool {
        self.pts != NOPTS_VALUE && self.time_base.is_valid()
    }

    pub fn seconds(&self) -> Option<f64> {
        self.is_valid()
            .then(|| self.pts as f64 * self.time_base.to_f64())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seconds() {
            Some(secs) => write!(f, "{:.3}s", secs),
            None => f.write_str("NOPTS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_帧序号换算为秒() {
        let tb = Rational::new(1, 25);
        assert_eq!(Timestamp::new(25, tb).seconds(), Some(1.0));
        assert_eq!(Timestamp::new(3, tb).to_string(), "0.120s");
    }

    #[test]
    fn test_未设置() {
        let ts = Timestamp::new(NOPTS_VALUE, Rational::new(1, 25));
        assert_eq!(ts.seconds(), None);
        assert_eq!(ts.to_string(), "NOPTS");
        assert!(!Timestamp::new(0, Rational::UNDEFINED).is_valid());
    }
}
