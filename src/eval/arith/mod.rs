// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The default arithmetic.
//!
//! Numeric operands are promoted along the ladder
//! `Byte < Short < Int < Long < BigInt < Float < Double < BigDecimal`.
//! Integer results are narrowed back to `Int` when both operands were at
//! most `Int` and the result fits; integer overflow widens to `BigInt`
//! rather than wrapping.
//!
//! Hosts may intercept any operator before this arithmetic runs; see
//! `hooks::Operators`.

use std::cmp::Ordering;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use bigdecimal::RoundingMode;
use num_bigint::BigInt;
use num_traits::FromPrimitive;
use num_traits::ToPrimitive;
use num_traits::Zero;

use crate::eval::options::Options;
use crate::eval::value::Range;
use crate::eval::value::Value;
use crate::syn::BinaryOp;
use crate::syn::UnaryOp;

pub mod hooks;
pub use hooks::NoOperators;
pub use hooks::Operators;
pub use hooks::Overload;
pub use hooks::SelfAssign;
pub use hooks::ValueIter;

/// A position on the numeric promotion ladder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
  Byte,
  Short,
  Int,
  Long,
  BigInt,
  Float,
  Double,
  BigDecimal,
}

/// A number, widened to one of four working representations.
#[derive(Clone, Debug)]
pub enum Num {
  Int(i64, Rank),
  Big(BigInt),
  Float(f64, Rank),
  Dec(BigDecimal),
}

impl Num {
  fn rank(&self) -> Rank {
    match self {
      Num::Int(_, r) | Num::Float(_, r) => *r,
      Num::Big(_) => Rank::BigInt,
      Num::Dec(_) => Rank::BigDecimal,
    }
  }

  fn to_big(&self) -> Option<BigInt> {
    match self {
      Num::Int(n, _) => Some(BigInt::from(*n)),
      Num::Big(n) => Some(n.clone()),
      _ => None,
    }
  }

  fn to_f64(&self) -> f64 {
    match self {
      Num::Int(n, _) => *n as f64,
      Num::Big(n) => n.to_f64().unwrap_or(f64::NAN),
      Num::Float(f, _) => *f,
      Num::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
    }
  }

  fn to_dec(&self) -> Option<BigDecimal> {
    match self {
      Num::Int(n, _) => Some(BigDecimal::from(*n)),
      Num::Big(n) => Some(BigDecimal::new(n.clone(), 0)),
      Num::Float(f, _) => BigDecimal::from_f64(*f),
      Num::Dec(d) => Some(d.clone()),
    }
  }
}

/// Widens a numeric value; returns `None` for anything else.
pub fn num_of(v: &Value) -> Option<Num> {
  Some(match v {
    Value::Byte(n) => Num::Int(*n as i64, Rank::Byte),
    Value::Short(n) => Num::Int(*n as i64, Rank::Short),
    Value::Int(n) => Num::Int(*n as i64, Rank::Int),
    Value::Long(n) => Num::Int(*n, Rank::Long),
    Value::BigInt(n) => Num::Big((**n).clone()),
    Value::Float(f) => Num::Float(*f as f64, Rank::Float),
    Value::Double(f) => Num::Float(*f, Rank::Double),
    Value::BigDecimal(d) => Num::Dec((**d).clone()),
    _ => return None,
  })
}

/// Narrows a working number back into a value.
pub fn value_of(n: Num) -> Value {
  match n {
    Num::Int(v, r) if r <= Rank::Int => {
      i32::try_from(v).map(Value::Int).unwrap_or(Value::Long(v))
    }
    Num::Int(v, _) => Value::Long(v),
    Num::Big(b) => Value::BigInt(Arc::new(b)),
    Num::Float(f, Rank::Float) => Value::Float(f as f32),
    Num::Float(f, _) => Value::Double(f),
    Num::Dec(d) => Value::BigDecimal(Arc::new(d)),
  }
}

/// Converts a numeric value to `f64`.
pub fn to_f64(v: &Value) -> Option<f64> {
  num_of(v).map(|n| n.to_f64())
}

/// Compares two numbers by value; `None` if either is NaN.
pub fn compare_nums(a: &Num, b: &Num) -> Option<Ordering> {
  match (a, b) {
    (Num::Int(x, _), Num::Int(y, _)) => Some(x.cmp(y)),
    (Num::Dec(_), _) | (_, Num::Dec(_)) => Some(a.to_dec()?.cmp(&b.to_dec()?)),
    (Num::Float(..), _) | (_, Num::Float(..)) => {
      a.to_f64().partial_cmp(&b.to_f64())
    }
    _ => Some(a.to_big()?.cmp(&b.to_big()?)),
  }
}

/// Compares two numeric values by value; `None` if either is not a number.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
  compare_nums(&num_of(a)?, &num_of(b)?)
}

/// Parses a string as a number, the way lenient arithmetic coerces strings.
pub fn parse_number(s: &str) -> Option<Num> {
  let s = s.trim();
  if s.is_empty() {
    return Some(Num::Int(0, Rank::Int));
  }
  if let Ok(n) = s.parse::<i64>() {
    let rank = if i32::try_from(n).is_ok() {
      Rank::Int
    } else {
      Rank::Long
    };
    return Some(Num::Int(n, rank));
  }
  if let Ok(n) = s.parse::<BigInt>() {
    return Some(Num::Big(n));
  }
  match s.parse::<f64>() {
    Ok(f) if f.is_finite() => Some(Num::Float(f, Rank::Double)),
    _ => None,
  }
}

/// Why an arithmetic operation failed.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ArithError {
  #[error("unsupported operand types")]
  Unsupported,
  #[error("division by zero")]
  DivideByZero,
  #[error("null operand")]
  NullOperand,
  #[error("not a number: '{0}'")]
  NotANumber(Arc<str>),
}

type Result<T> = std::result::Result<T, ArithError>;

/// The default arithmetic, configured from evaluation options.
#[derive(Clone, Debug)]
pub struct Arithmetic {
  strict: bool,
  scale: Option<i64>,
  rounding: RoundingMode,
}

impl Arithmetic {
  /// Creates a new `Arithmetic`. Strict arithmetic rejects null operands,
  /// and concatenates whenever either operand of `+` is a string.
  pub fn new(strict: bool, scale: Option<i64>, rounding: RoundingMode) -> Self {
    Arithmetic {
      strict,
      scale,
      rounding,
    }
  }

  /// Creates an `Arithmetic` configured by `opts`.
  pub fn from_options(opts: &Options) -> Self {
    Self::new(
      opts.strict_arithmetic(),
      opts.math_scale(),
      opts.math_rounding(),
    )
  }

  /// Coerces an operand to a number.
  pub fn to_num(&self, v: &Value) -> Result<Num> {
    if let Some(n) = num_of(v) {
      return Ok(n);
    }
    match v {
      Value::Null if self.strict => Err(ArithError::NullOperand),
      Value::Null => Ok(Num::Int(0, Rank::Int)),
      Value::Bool(b) => Ok(Num::Int(*b as i64, Rank::Int)),
      Value::String(s) => {
        parse_number(s).ok_or_else(|| ArithError::NotANumber(s.clone()))
      }
      _ => Err(ArithError::Unsupported),
    }
  }

  /// Applies a binary operator. The logical, containment, and coalescing
  /// operators are not handled here.
  pub fn binary(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
      BinaryOp::Add => self.add(l, r),
      BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
        self.numeric(op, l, r)
      }
      BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
        self.bitwise(op, l, r)
      }
      BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => self.shift(op, l, r),
      BinaryOp::Eq => Ok(Value::Bool(self.equals(l, r))),
      BinaryOp::Ne => Ok(Value::Bool(!self.equals(l, r))),
      BinaryOp::StrictEq => Ok(Value::Bool(strict_equals(l, r))),
      BinaryOp::StrictNe => Ok(Value::Bool(!strict_equals(l, r))),
      BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
        let ord = self.compare(l, r)?;
        Ok(Value::Bool(match op {
          BinaryOp::Lt => ord == Ordering::Less,
          BinaryOp::Le => ord != Ordering::Greater,
          BinaryOp::Gt => ord == Ordering::Greater,
          _ => ord != Ordering::Less,
        }))
      }
      BinaryOp::Range => self.range(l, r),
      _ => Err(ArithError::Unsupported),
    }
  }

  fn add(&self, l: &Value, r: &Value) -> Result<Value> {
    let (ls, rs) = (l.as_str().is_some(), r.as_str().is_some());
    let concat = if self.strict { ls || rs } else { ls && rs };
    if !concat {
      match self.numeric(BinaryOp::Add, l, r) {
        Err(ArithError::NotANumber(_)) | Err(ArithError::Unsupported)
          if ls || rs => {}
        res => return res,
      }
    }
    let mut buf = l.to_display_string();
    buf.push_str(&r.to_display_string());
    Ok(Value::String(buf.into()))
  }

  /// Applies `+`, `-`, `*`, `/`, or `%` to numeric operands.
  pub fn numeric(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = (self.to_num(l)?, self.to_num(r)?);
    self.apply(op, a, b).map(value_of)
  }

  fn apply(&self, op: BinaryOp, a: Num, b: Num) -> Result<Num> {
    let rank = a.rank().max(b.rank());
    if rank == Rank::BigDecimal {
      return self.apply_dec(op, a, b);
    }
    if rank >= Rank::Float {
      let rank = if a.rank() == Rank::BigInt || b.rank() == Rank::BigInt {
        Rank::Double
      } else {
        rank
      };
      return apply_float(op, a.to_f64(), b.to_f64(), rank);
    }
    if let (Num::Int(x, _), Num::Int(y, _)) = (&a, &b) {
      let (x, y) = (*x, *y);
      let res = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div if y == 0 => return Err(ArithError::DivideByZero),
        BinaryOp::Div => x.checked_div(y),
        BinaryOp::Mod if y == 0 => return Err(ArithError::DivideByZero),
        BinaryOp::Mod => x.checked_rem(y),
        _ => return Err(ArithError::Unsupported),
      };
      if let Some(v) = res {
        return Ok(Num::Int(v, rank));
      }
    }
    apply_big(op, a, b)
  }

  fn apply_dec(&self, op: BinaryOp, a: Num, b: Num) -> Result<Num> {
    let x = a.to_dec().ok_or(ArithError::Unsupported)?;
    let y = b.to_dec().ok_or(ArithError::Unsupported)?;
    Ok(Num::Dec(match op {
      BinaryOp::Add => x + y,
      BinaryOp::Sub => x - y,
      BinaryOp::Mul => x * y,
      BinaryOp::Div | BinaryOp::Mod if y.is_zero() => {
        return Err(ArithError::DivideByZero)
      }
      BinaryOp::Div => {
        let q = x / y;
        match self.scale {
          Some(scale) => q.with_scale_round(scale, self.rounding),
          None => q,
        }
      }
      BinaryOp::Mod => x % y,
      _ => return Err(ArithError::Unsupported),
    }))
  }

  fn bitwise(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if let (Value::Bool(x), Value::Bool(y)) = (l, r) {
      return Ok(Value::Bool(match op {
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        _ => x ^ y,
      }));
    }

    let (a, b) = (self.to_num(l)?, self.to_num(r)?);
    let rank = a.rank().max(b.rank());
    if rank >= Rank::Float {
      return Err(ArithError::Unsupported);
    }
    if let (Num::Int(x, _), Num::Int(y, _)) = (&a, &b) {
      let v = match op {
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        _ => x ^ y,
      };
      return Ok(value_of(Num::Int(v, rank)));
    }

    let (x, y) = (a.to_big(), b.to_big());
    let (x, y) = x.zip(y).ok_or(ArithError::Unsupported)?;
    Ok(value_of(Num::Big(match op {
      BinaryOp::BitAnd => x & y,
      BinaryOp::BitOr => x | y,
      _ => x ^ y,
    })))
  }

  fn shift(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let n = match self.to_num(r)? {
      Num::Int(n, _) => n,
      _ => return Err(ArithError::Unsupported),
    };

    match self.to_num(l)? {
      Num::Int(x, rank) if rank <= Rank::Int => {
        let (x, s) = (x as i32, (n & 31) as u32);
        let v = match op {
          BinaryOp::Shl => x.wrapping_shl(s),
          BinaryOp::Shr => x >> s,
          _ => ((x as u32) >> s) as i32,
        };
        Ok(Value::Int(v))
      }
      Num::Int(x, _) => {
        let s = (n & 63) as u32;
        let v = match op {
          BinaryOp::Shl => x.wrapping_shl(s),
          BinaryOp::Shr => x >> s,
          _ => ((x as u64) >> s) as i64,
        };
        Ok(Value::Long(v))
      }
      Num::Big(x) if n >= 0 => {
        let s = n as usize;
        match op {
          BinaryOp::Shl => Ok(value_of(Num::Big(x << s))),
          BinaryOp::Shr => Ok(value_of(Num::Big(x >> s))),
          _ => Err(ArithError::Unsupported),
        }
      }
      _ => Err(ArithError::Unsupported),
    }
  }

  /// Applies a unary operator. `empty` and `size` are not handled here.
  pub fn unary(&self, op: UnaryOp, v: &Value) -> Result<Value> {
    match op {
      UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
      UnaryOp::Neg => match v {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        v if v.is_number() => Ok(value_of(match self.to_num(v)? {
          Num::Int(x, r) => match x.checked_neg() {
            Some(n) => Num::Int(n, r),
            None => Num::Big(-BigInt::from(x)),
          },
          Num::Big(b) => Num::Big(-b),
          Num::Float(f, r) => Num::Float(-f, r),
          Num::Dec(d) => Num::Dec(-d),
        })),
        _ => Err(ArithError::Unsupported),
      },
      UnaryOp::Pos => match v {
        Value::Bool(_) => Ok(v.clone()),
        v if v.is_number() => Ok(v.clone()),
        _ => Err(ArithError::Unsupported),
      },
      UnaryOp::Complement => match num_of(v) {
        Some(Num::Int(x, r)) => Ok(value_of(Num::Int(!x, r))),
        Some(Num::Big(b)) => Ok(value_of(Num::Big(!b))),
        _ => Err(ArithError::Unsupported),
      },
      UnaryOp::Empty | UnaryOp::Size => Err(ArithError::Unsupported),
    }
  }

  /// Adds `delta` to a numeric value, for `++` and `--`.
  pub fn increment(&self, v: &Value, delta: i32) -> Result<Value> {
    self.numeric(BinaryOp::Add, v, &Value::Int(delta))
  }

  /// Orders two values; numbers, strings and booleans are comparable.
  pub fn compare(&self, l: &Value, r: &Value) -> Result<Ordering> {
    match (l, r) {
      (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
      (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
      (Value::Null, Value::Null) => Ok(Ordering::Equal),
      _ => {
        let (a, b) = (self.to_num(l)?, self.to_num(r)?);
        compare_nums(&a, &b).ok_or(ArithError::Unsupported)
      }
    }
  }

  /// The `==` operator: numbers compare by value, and strings coerce to the
  /// type of the other operand when it is a number or a boolean.
  pub fn equals(&self, l: &Value, r: &Value) -> bool {
    match (l, r) {
      (Value::Null, Value::Null) => true,
      (Value::Null, _) | (_, Value::Null) => false,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      // A boolean meets a number as 0 or 1.
      (Value::Bool(b), o) | (o, Value::Bool(b)) => match o {
        Value::String(s) => s.parse::<bool>().ok() == Some(*b),
        o if o.is_number() => {
          compare_values(&Value::Int(*b as i32), o) == Some(Ordering::Equal)
        }
        _ => false,
      },
      (a, b) if a.is_number() && b.is_number() => {
        compare_values(a, b) == Some(Ordering::Equal)
      }
      (Value::String(s), n) | (n, Value::String(s)) if n.is_number() => {
        let parsed = parse_number(s);
        let n = num_of(n);
        match (parsed, n) {
          (Some(a), Some(b)) => compare_nums(&a, &b) == Some(Ordering::Equal),
          _ => false,
        }
      }
      _ => l == r,
    }
  }

  /// Builds the inclusive range `l .. r`.
  pub fn range(&self, l: &Value, r: &Value) -> Result<Value> {
    match (self.to_num(l)?, self.to_num(r)?) {
      (Num::Int(a, _), Num::Int(b, _)) => Ok(Value::Range(Range::new(a, b))),
      _ => Err(ArithError::Unsupported),
    }
  }
}

impl Default for Arithmetic {
  fn default() -> Self {
    Self::from_options(&Options::default())
  }
}

/// The `===` operator: same type, same value.
pub fn strict_equals(l: &Value, r: &Value) -> bool {
  std::mem::discriminant(l) == std::mem::discriminant(r) && l == r
}

fn apply_float(op: BinaryOp, x: f64, y: f64, rank: Rank) -> Result<Num> {
  let v = match op {
    BinaryOp::Add => x + y,
    BinaryOp::Sub => x - y,
    BinaryOp::Mul => x * y,
    BinaryOp::Div | BinaryOp::Mod if y == 0.0 => {
      return Err(ArithError::DivideByZero)
    }
    BinaryOp::Div => x / y,
    BinaryOp::Mod => x % y,
    _ => return Err(ArithError::Unsupported),
  };
  Ok(Num::Float(v, rank))
}

fn apply_big(op: BinaryOp, a: Num, b: Num) -> Result<Num> {
  let (x, y) = a.to_big().zip(b.to_big()).ok_or(ArithError::Unsupported)?;
  Ok(Num::Big(match op {
    BinaryOp::Add => x + y,
    BinaryOp::Sub => x - y,
    BinaryOp::Mul => x * y,
    BinaryOp::Div | BinaryOp::Mod if y.is_zero() => {
      return Err(ArithError::DivideByZero)
    }
    BinaryOp::Div => x / y,
    BinaryOp::Mod => x % y,
    _ => return Err(ArithError::Unsupported),
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::str::FromStr;

  fn arith() -> Arithmetic {
    Arithmetic::default()
  }

  fn big(s: &str) -> Value {
    Value::BigInt(Arc::new(BigInt::from_str(s).unwrap()))
  }

  #[test]
  fn integer_results_narrow() {
    let a = arith();
    let v = a.binary(BinaryOp::Add, &Value::Byte(1), &Value::Short(2));
    assert!(matches!(v, Ok(Value::Int(3))));
    let v = a.binary(BinaryOp::Add, &Value::Int(1), &Value::Long(2));
    assert!(matches!(v, Ok(Value::Long(3))));
  }

  #[test]
  fn overflow_widens() {
    let a = arith();
    let v = a.binary(BinaryOp::Add, &Value::Int(i32::MAX), &Value::Int(1));
    assert!(matches!(v, Ok(Value::Long(2147483648))));
    let v = a.binary(BinaryOp::Mul, &Value::Long(i64::MAX), &Value::Int(2));
    assert_eq!(v, Ok(big("18446744073709551614")));
    let v = a.unary(UnaryOp::Neg, &Value::Long(i64::MIN));
    assert_eq!(v, Ok(big("9223372036854775808")));
  }

  #[test]
  fn division() {
    let a = arith();
    let v = a.binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2));
    assert!(matches!(v, Ok(Value::Int(3))));
    let v = a.binary(BinaryOp::Div, &Value::Int(7), &Value::Int(0));
    assert_eq!(v, Err(ArithError::DivideByZero));
    let v = a.binary(BinaryOp::Div, &Value::Double(7.0), &Value::Int(2));
    assert!(matches!(v, Ok(Value::Double(f)) if f == 3.5));

    let scaled = Arithmetic::new(false, Some(2), RoundingMode::HalfUp);
    let one = Value::BigDecimal(Arc::new(BigDecimal::from(1)));
    let v = scaled.binary(BinaryOp::Div, &one, &Value::Int(3)).unwrap();
    assert_eq!(v.to_string(), "0.33B");
  }

  #[test]
  fn string_coercions() {
    let a = arith();
    let v = a.binary(BinaryOp::Add, &"a".into(), &Value::Int(1));
    assert_eq!(v, Ok(Value::String("a1".into())));
    let v = a.binary(BinaryOp::Add, &"2".into(), &Value::Int(1));
    assert!(matches!(v, Ok(Value::Int(3))));
    assert!(a.equals(&"1.0".into(), &Value::Int(1)));
    assert!(a.equals(&"true".into(), &Value::Bool(true)));
    assert!(!a.equals(&Value::Null, &Value::Int(0)));

    let strict = Arithmetic::new(true, None, RoundingMode::HalfEven);
    let v = strict.binary(BinaryOp::Add, &"2".into(), &Value::Int(1));
    assert_eq!(v, Ok(Value::String("21".into())));
    let v = strict.binary(BinaryOp::Mul, &Value::Null, &Value::Int(1));
    assert_eq!(v, Err(ArithError::NullOperand));
  }

  #[test]
  fn booleans_equal_zero_or_one() {
    let a = arith();
    assert!(a.equals(&Value::Bool(true), &Value::Int(1)));
    assert!(a.equals(&Value::Double(0.0), &Value::Bool(false)));
    assert!(!a.equals(&Value::Bool(true), &Value::Int(2)));
    assert!(!a.equals(&Value::Bool(true), &"yes".into()));
    assert!(!a.equals(&Value::Bool(false), &Value::Array(Default::default())));
  }

  #[test]
  fn null_is_zero_when_lenient() {
    let v = arith().binary(BinaryOp::Sub, &Value::Null, &Value::Int(4));
    assert!(matches!(v, Ok(Value::Int(-4))));
  }

  #[test]
  fn bits_and_shifts() {
    let a = arith();
    let v = a.binary(BinaryOp::BitAnd, &Value::Bool(true), &Value::Bool(false));
    assert_eq!(v, Ok(Value::Bool(false)));
    let v = a.binary(BinaryOp::Ushr, &Value::Int(-1), &Value::Int(28));
    assert!(matches!(v, Ok(Value::Int(15))));
    let v = a.binary(BinaryOp::Shl, &Value::Long(1), &Value::Int(40));
    assert!(matches!(v, Ok(Value::Long(1099511627776))));
    let v = a.unary(UnaryOp::Complement, &Value::Int(0));
    assert!(matches!(v, Ok(Value::Int(-1))));
  }

  #[test]
  fn comparisons() {
    let a = arith();
    let v = a.binary(BinaryOp::Lt, &Value::Int(1), &Value::Double(1.5));
    assert_eq!(v, Ok(Value::Bool(true)));
    let v = a.binary(BinaryOp::Ge, &"b".into(), &"a".into());
    assert_eq!(v, Ok(Value::Bool(true)));
    let v = a.compare(&Value::Array(Default::default()), &Value::Int(1));
    assert_eq!(v, Err(ArithError::Unsupported));
    assert!(strict_equals(&Value::Int(1), &Value::Int(1)));
    assert!(!strict_equals(&Value::Int(1), &Value::Long(1)));
  }

  #[test]
  fn ranges() {
    let v = arith().range(&Value::Int(3), &Value::Int(1)).unwrap();
    match v {
      Value::Range(r) => assert_eq!(r.iter().collect::<Vec<_>>(), [3, 2, 1]),
      v => panic!("expected range, got {:?}", v),
    }
  }
}
