use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Anything that may be convertible to a number.
///
/// `None` means "missing or not numeric"; the guard turns that into zero.
pub trait NumericLike {
    fn to_number(&self) -> Option<f64>;
}

impl NumericLike for f64 {
    fn to_number(&self) -> Option<f64> {
        Some(*self)
    }
}

impl NumericLike for f32 {
    fn to_number(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl NumericLike for i64 {
    fn to_number(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl NumericLike for i32 {
    fn to_number(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl NumericLike for u32 {
    fn to_number(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl NumericLike for u64 {
    fn to_number(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl NumericLike for str {
    fn to_number(&self) -> Option<f64> {
        self.trim().parse::<f64>().ok()
    }
}

impl NumericLike for String {
    fn to_number(&self) -> Option<f64> {
        self.as_str().to_number()
    }
}

impl NumericLike for Money {
    fn to_number(&self) -> Option<f64> {
        Some(self.0)
    }
}

impl<T: NumericLike> NumericLike for Option<T> {
    fn to_number(&self) -> Option<f64> {
        self.as_ref().and_then(NumericLike::to_number)
    }
}

impl<T: NumericLike + ?Sized> NumericLike for &T {
    fn to_number(&self) -> Option<f64> {
        (**self).to_number()
    }
}

/// Decimal columns are usually serialized as strings, so both JSON numbers
/// and numeric strings are accepted.
impl NumericLike for serde_json::Value {
    fn to_number(&self) -> Option<f64> {
        match self {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.to_number(),
            _ => None,
        }
    }
}

/// Returns the finite numeric value of `value`, or `0.0` when it is missing,
/// not numeric, NaN, or infinite.
pub fn to_finite_number<T: NumericLike + ?Sized>(value: &T) -> f64 {
    value
        .to_number()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// A monetary amount that is always finite.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "f64")]
pub struct Money(f64);

impl Money {
    pub const ZERO: Money = Money(0.0);

    pub fn new(value: f64) -> Self {
        Money(to_finite_number(&value))
    }

    /// Guards an arbitrary numeric-like value into a `Money`.
    pub fn from_numeric<T: NumericLike + ?Sized>(value: &T) -> Self {
        Money(to_finite_number(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn max(self, other: Money) -> Self {
        Money(self.0.max(other.0))
    }

    pub fn min(self, other: Money) -> Self {
        Money(self.0.min(other.0))
    }

    /// Floors the amount at zero.
    pub fn non_negative(self) -> Self {
        self.max(Money::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}

impl From<serde_json::Value> for Money {
    fn from(value: serde_json::Value) -> Self {
        Money::from_numeric(&value)
    }
}

impl From<f64> for Money {
    fn from(value: f64) -> Self {
        Money::new(value)
    }
}

impl From<Money> for f64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl JsonSchema for Money {
    fn schema_name() -> String {
        "Money".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        f64::json_schema(gen)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::new(self.0 - rhs.0)
    }
}

impl Mul<f64> for Money {
    type Output = Money;

    fn mul(self, rhs: f64) -> Money {
        Money::new(self.0 * rhs)
    }
}

/// Division by zero yields zero rather than an infinity.
impl Div<f64> for Money {
    type Output = Money;

    fn div(self, rhs: f64) -> Money {
        Money::new(self.0 / rhs)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}
