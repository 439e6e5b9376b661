//! 有理数: 帧率、时间基与像素宽高比.

use std::fmt;
use std::str::FromStr;

use crate::error::SynthError;

/// `num / den` 形式的有理数
///
/// 帧率 25/1 的倒数 1/25 即对应的时间基. 分母为 0 表示未定义.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 分母不为 0
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 分子分母都为正, 帧率和宽高比必须满足
    pub const fn is_positive(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// 未定义时为 `NAN`
    pub fn to_f64(self) -> f64 {
        if self.is_valid() {
            f64::from(self.num) / f64::from(self.den)
        } else {
            f64::NAN
        }
    }

    /// 约分, 并把符号移到分子上
    pub fn reduce(self) -> Self {
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g <= 1 {
            return if self.den < 0 {
                Self::new(-self.num, -self.den)
            } else {
                self
            };
        }
        let (num, den) = (self.num / g as i32, self.den / g as i32);
        if den < 0 {
            Self::new(-num, -den)
        } else {
            Self::new(num, den)
        }
    }

    /// 帧率与时间基互换
    pub const fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// 接受 `25`, `30000/1001` 与 Y4M 风格的 `25:1`
impl FromStr for Rational {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SynthError::InvalidArgument(format!("无效比例: {:?}", s));
        let s = s.trim();
        let (num, den) = match s.split_once(['/', ':']) {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (s, "1"),
        };
        let num = num.parse().map_err(|_| invalid())?;
        let den = den.parse().map_err(|_| invalid())?;
        Ok(Self::new(num, den))
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}
