//! Arbitrary-precision decimal numbers (`H` values).

use std::fmt;
use std::str::FromStr;

use crate::error::ParseHighPrecisionError;

/// A decimal number of unbounded precision.
///
/// Finite values are stored as a coefficient (decimal digits, no leading
/// zeros) and a power-of-ten exponent, so `1.50` is `150 × 10^-2`. Trailing
/// zeros are significant and survive a round trip, the same way they do in
/// the General Decimal Arithmetic model the wire strings follow.
///
/// # Example
///
/// ```
/// use ubjson::HighPrecision;
///
/// let num: HighPrecision = "10e15".parse().unwrap();
/// assert_eq!(num.to_string(), "1.0E+16");
/// assert_eq!(num.to_f64(), 1e16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HighPrecision {
    negative: bool,
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Kind {
    Finite { digits: String, exponent: i64 },
    Infinite,
    NaN,
}

impl HighPrecision {
    pub fn nan() -> Self {
        Self {
            negative: false,
            kind: Kind::NaN,
        }
    }

    pub fn infinity(negative: bool) -> Self {
        Self {
            negative,
            kind: Kind::Infinite,
        }
    }

    fn finite(negative: bool, digits: &str, exponent: i64) -> Self {
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Self {
            negative,
            kind: Kind::Finite {
                digits: digits.to_owned(),
                exponent,
            },
        }
    }

    /// Converts a float exactly enough for it to convert back unchanged.
    ///
    /// Uses the shortest digit string that round-trips, so subnormals keep
    /// their exact bit pattern through [`to_f64`](Self::to_f64).
    pub fn from_f64(num: f64) -> Self {
        if num.is_nan() {
            return Self::nan();
        }
        if num.is_infinite() {
            return Self::infinity(num < 0.0);
        }
        format!("{num:e}").parse().unwrap_or_else(|_| Self::nan())
    }

    pub fn is_finite(&self) -> bool {
        matches!(self.kind, Kind::Finite { .. })
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.kind, Kind::NaN)
    }

    pub fn is_sign_negative(&self) -> bool {
        self.negative
    }

    /// Nearest `f64`; out-of-range magnitudes saturate to infinity or zero.
    pub fn to_f64(&self) -> f64 {
        let sign = if self.negative { -1.0 } else { 1.0 };
        match &self.kind {
            Kind::NaN => f64::NAN,
            Kind::Infinite => sign * f64::INFINITY,
            Kind::Finite { digits, exponent } => format!("{digits}e{exponent}")
                .parse::<f64>()
                .map(|v| sign * v)
                .unwrap_or(f64::NAN),
        }
    }

    /// The value as an integer, if it is integral and fits.
    pub fn to_i128(&self) -> Option<i128> {
        let Kind::Finite { digits, exponent } = &self.kind else {
            return None;
        };
        if digits.bytes().all(|b| b == b'0') {
            // zero at any exponent
            return Some(0);
        }
        let magnitude: u128 = if *exponent >= 0 {
            let scale = 10u128.checked_pow(u32::try_from(*exponent).ok()?)?;
            digits.parse::<u128>().ok()?.checked_mul(scale)?
        } else {
            let cut = usize::try_from(exponent.unsigned_abs()).ok()?;
            let split = digits.len().saturating_sub(cut);
            let (int_part, frac_part) = digits.split_at(split);
            if frac_part.bytes().any(|b| b != b'0') {
                return None;
            }
            if int_part.is_empty() {
                0
            } else {
                int_part.parse::<u128>().ok()?
            }
        };
        if !self.negative {
            return i128::try_from(magnitude).ok();
        }
        if magnitude == i128::MIN.unsigned_abs() {
            return Some(i128::MIN);
        }
        i128::try_from(magnitude).ok().map(|m| -m)
    }
}

impl From<i64> for HighPrecision {
    fn from(num: i64) -> Self {
        Self::finite(num < 0, &num.unsigned_abs().to_string(), 0)
    }
}

impl From<u64> for HighPrecision {
    fn from(num: u64) -> Self {
        Self::finite(false, &num.to_string(), 0)
    }
}

impl From<i128> for HighPrecision {
    fn from(num: i128) -> Self {
        Self::finite(num < 0, &num.unsigned_abs().to_string(), 0)
    }
}

impl FromStr for HighPrecision {
    type Err = ParseHighPrecisionError;

    /// Accepts `[sign] digits [. digits] [(e|E) [sign] digits]` as well as
    /// `Inf`, `Infinity` and `NaN` in any case. Surrounding whitespace is
    /// ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseHighPrecisionError::Empty);
        }
        let (negative, rest) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };
        if rest.eq_ignore_ascii_case("inf") || rest.eq_ignore_ascii_case("infinity") {
            return Ok(Self::infinity(negative));
        }
        if rest.eq_ignore_ascii_case("nan") {
            return Ok(Self {
                negative,
                kind: Kind::NaN,
            });
        }

        let (mantissa, exp_part) = match rest.find(['e', 'E']) {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
            None => (mantissa, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if int_part.len() + frac_part.len() == 0 || !all_digits(int_part) || !all_digits(frac_part)
        {
            return Err(ParseHighPrecisionError::Invalid);
        }

        let mut exponent: i64 = 0;
        if let Some(exp) = exp_part {
            let unsigned = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            if unsigned.is_empty() || !all_digits(unsigned) {
                return Err(ParseHighPrecisionError::Invalid);
            }
            exponent = exp
                .parse()
                .map_err(|_| ParseHighPrecisionError::ExponentOutOfRange)?;
        }
        let frac_len =
            i64::try_from(frac_part.len()).map_err(|_| ParseHighPrecisionError::ExponentOutOfRange)?;
        let exponent = exponent
            .checked_sub(frac_len)
            .ok_or(ParseHighPrecisionError::ExponentOutOfRange)?;

        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(int_part);
        digits.push_str(frac_part);
        Ok(Self::finite(negative, &digits, exponent))
    }
}

impl fmt::Display for HighPrecision {
    /// Scientific string form: plain notation while the exponent is not
    /// positive and the adjusted exponent is at least -6, otherwise one
    /// digit before the point and an explicit `E±n` suffix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        let (digits, exponent) = match &self.kind {
            Kind::NaN => return f.write_str("NaN"),
            Kind::Infinite => return f.write_str("Infinity"),
            Kind::Finite { digits, exponent } => (digits.as_str(), *exponent),
        };
        let len = digits.len() as i64;
        let adjusted = exponent.saturating_add(len - 1);

        if exponent <= 0 && adjusted >= -6 {
            if exponent == 0 {
                return f.write_str(digits);
            }
            let point = len + exponent;
            if point > 0 {
                let (int_part, frac_part) = digits.split_at(point as usize);
                return write!(f, "{int_part}.{frac_part}");
            }
            f.write_str("0.")?;
            for _ in 0..-point {
                f.write_str("0")?;
            }
            return f.write_str(digits);
        }

        let (first, rest) = digits.split_at(1);
        f.write_str(first)?;
        if !rest.is_empty() {
            write!(f, ".{rest}")?;
        }
        write!(f, "E{adjusted:+}")
    }
}
