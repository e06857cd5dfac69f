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

//! JEXL runtime values. These consist of:
//! - `null`, the singleton, default value.
//! - `bool`, a boolean.
//! - eight numeric types, from `Byte` up to `BigDecimal`.
//! - `string`, an immutable string.
//! - arrays, maps, sets and integer ranges.
//! - patterns, compiled regular expressions.
//! - closures, native functions and generators.
//! - host classes and host objects, exposed through introspection.
//! - errors, as bound by `catch`.

use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::eval::arith;
use crate::eval::encode::jexl::JexlEncoding;
use crate::eval::encode::Encoder;
use crate::eval::error::JexlError;
use crate::eval::generator::Generator;
use crate::eval::introspect::HostClass;
use crate::eval::introspect::HostRef;

#[macro_use]
pub mod native_macros;

pub mod fns;
pub use fns::Closure;
pub use fns::NativeFn;

pub mod seq;
pub use seq::Array;
pub use seq::Range;
pub use seq::Set;

pub mod object;
pub use object::Map;

pub mod convert;
pub use convert::FromValue;
pub use convert::IntoValue;

/// A `Value` is a JEXL value. `Value`s can be safely shared across threads;
/// the mutable containers lock internally.
#[derive(Clone, Debug)]
pub enum Value {
  Null,
  Bool(bool),
  Byte(i8),
  Short(i16),
  Int(i32),
  Long(i64),
  BigInt(Arc<BigInt>),
  Float(f32),
  Double(f64),
  BigDecimal(Arc<BigDecimal>),
  String(Arc<str>),
  Array(Array),
  Map(Map),
  Set(Set),
  Range(Range),
  Regex(Pattern),
  Closure(Closure),
  Function(NativeFn),
  Generator(Generator),
  Class(Arc<HostClass>),
  Object(HostRef),
  Error(Arc<JexlError>),
}

impl Value {
  /// Returns the `Type` of this `Value`.
  pub fn ty(&self) -> Type {
    match self {
      Value::Null => Type::Null,
      Value::Bool(..) => Type::Boolean,
      Value::Byte(..) => Type::Byte,
      Value::Short(..) => Type::Short,
      Value::Int(..) => Type::Integer,
      Value::Long(..) => Type::Long,
      Value::BigInt(..) => Type::BigInteger,
      Value::Float(..) => Type::Float,
      Value::Double(..) => Type::Double,
      Value::BigDecimal(..) => Type::BigDecimal,
      Value::String(..) => Type::String,
      Value::Array(..) => Type::Array,
      Value::Map(..) => Type::Map,
      Value::Set(..) => Type::Set,
      Value::Range(..) => Type::Range,
      Value::Regex(..) => Type::Pattern,
      Value::Closure(..) => Type::Closure,
      Value::Function(..) => Type::Function,
      Value::Generator(..) => Type::Generator,
      Value::Class(..) => Type::Class,
      Value::Object(..) => Type::Object,
      Value::Error(..) => Type::Error,
    }
  }

  /// Returns the name of this value's type; host objects report their own.
  pub fn type_name(&self) -> &str {
    match self {
      Value::Object(o) => o.type_name(),
      v => v.ty().name(),
    }
  }

  /// Returns whether this value is an instance of the type named `name`,
  /// walking supertypes. Host class supertypes are consulted through
  /// `class`, when the host class of the value is known.
  pub fn is_instance(&self, name: &str, class: Option<&HostClass>) -> bool {
    if self.is_null() {
      return false;
    }
    if self.type_name() == name || self.ty().supertypes().contains(&name) {
      return true;
    }
    match class {
      Some(c) => c.is_a(name),
      None => name == "Object",
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  /// Returns whether this value is one of the numeric types.
  pub fn is_number(&self) -> bool {
    self.ty().is_number()
  }

  /// Returns whether this value can be called.
  pub fn is_callable(&self) -> bool {
    matches!(self, Value::Closure(..) | Value::Function(..))
  }

  /// Returns the boolean interpretation of this value: null is false,
  /// numbers are true unless zero or NaN, strings are true unless empty or
  /// `"false"`, and everything else is true.
  pub fn truthy(&self) -> bool {
    match self {
      Value::Null => false,
      Value::Bool(b) => *b,
      Value::Byte(n) => *n != 0,
      Value::Short(n) => *n != 0,
      Value::Int(n) => *n != 0,
      Value::Long(n) => *n != 0,
      Value::BigInt(n) => n.sign() != num_bigint::Sign::NoSign,
      Value::Float(n) => *n != 0.0 && !n.is_nan(),
      Value::Double(n) => *n != 0.0 && !n.is_nan(),
      Value::BigDecimal(n) => !num_traits::Zero::is_zero(&**n),
      Value::String(s) => !s.is_empty() && &**s != "false",
      _ => true,
    }
  }

  /// Returns this value as a string slice, if it is a string.
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  /// Attempts to convert this value into an integer: integral numbers that
  /// fit in 64 bits convert, and so do floating point numbers without a
  /// fractional part.
  ///
  /// If the conversion fails, the type of the value is returned instead.
  pub fn as_int(&self) -> Result<i64, Type> {
    match self {
      Value::Byte(n) => Ok(*n as i64),
      Value::Short(n) => Ok(*n as i64),
      Value::Int(n) => Ok(*n as i64),
      Value::Long(n) => Ok(*n),
      Value::BigInt(n) => n.to_i64().ok_or(Type::BigInteger),
      Value::Float(f) if fits_i64(*f as f64) => Ok(*f as i64),
      Value::Double(f) if fits_i64(*f) => Ok(*f as i64),
      Value::BigDecimal(d) if d.is_integer() => {
        d.to_i64().ok_or(Type::BigDecimal)
      }
      v => Err(v.ty()),
    }
  }

  /// Returns a string rendition of this value, without quotes for strings.
  pub fn to_display_string(&self) -> String {
    match self {
      Value::String(s) => s.to_string(),
      Value::Null => String::new(),
      v => v.to_string(),
    }
  }

  /// Returns an identity for reference-typed values, used to detect cycles
  /// while encoding.
  pub fn ptr_value(&self) -> Option<usize> {
    match self {
      Value::Array(a) => Some(a.ptr_value()),
      Value::Map(m) => Some(m.ptr_value()),
      Value::Set(s) => Some(s.ptr_value()),
      _ => None,
    }
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let buf = Encoder::<JexlEncoding>::new().encode(self);
    write!(
      f,
      "{}",
      buf
        .as_ref()
        .map(|s| s.as_str())
        .unwrap_or("<encoding error>")
    )
  }
}

/// Structural equality, as used by map keys and set members.
///
/// Numbers compare by numeric value across types; no other coercion happens
/// here. The `==` operator layers its own coercions on top of this.
impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (a, b) if a.is_number() && b.is_number() => {
        arith::compare_values(a, b) == Some(std::cmp::Ordering::Equal)
      }
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Array(a), Value::Array(b)) => a == b,
      (Value::Map(a), Value::Map(b)) => a == b,
      (Value::Set(a), Value::Set(b)) => a == b,
      (Value::Range(a), Value::Range(b)) => a == b,
      (Value::Regex(a), Value::Regex(b)) => a.source() == b.source(),
      (Value::Closure(a), Value::Closure(b)) => a == b,
      (Value::Function(a), Value::Function(b)) => a == b,
      (Value::Generator(a), Value::Generator(b)) => a.ptr_eq(b),
      (Value::Class(a), Value::Class(b)) => a.name() == b.name(),
      (Value::Object(a), Value::Object(b)) => a.equals(&**b),
      (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl Eq for Value {}

impl Hash for Value {
  fn hash<H: Hasher>(&self, state: &mut H) {
    match self {
      Value::Null => 0u8.hash(state),
      Value::Bool(b) => b.hash(state),
      v if v.is_number() => hash_number(v, state),
      Value::String(s) => s.hash(state),
      Value::Array(a) => a.hash(state),
      Value::Map(m) => m.hash(state),
      Value::Set(s) => s.hash(state),
      Value::Range(r) => r.hash(state),
      Value::Regex(p) => p.source().hash(state),
      Value::Closure(c) => c.hash(state),
      Value::Function(f) => f.hash(state),
      Value::Generator(g) => g.ptr_value().hash(state),
      Value::Class(c) => c.name().hash(state),
      Value::Object(o) => o.hash_code().hash(state),
      Value::Error(e) => (Arc::as_ptr(e) as usize).hash(state),
      _ => {}
    }
  }
}

/// Hashes a number so that numerically equal values of different types
/// collide. Integers up to 2^53 in magnitude hash as `i64`; every other number
/// hashes as the bits of its nearest `f64`, which is exact wherever a mixed
/// comparison could find two values equal.
fn hash_number<H: Hasher>(v: &Value, state: &mut H) {
  const EXACT: i64 = 1 << 53;
  if let Ok(n) = v.as_int() {
    if (-EXACT..=EXACT).contains(&n) {
      return n.hash(state);
    }
  }
  let f = match v {
    Value::Byte(n) => Some(*n as f64),
    Value::Short(n) => Some(*n as f64),
    Value::Int(n) => Some(*n as f64),
    Value::Long(n) => Some(*n as f64),
    Value::BigInt(n) => n.to_f64(),
    Value::Float(n) => Some(*n as f64),
    Value::Double(n) => Some(*n),
    Value::BigDecimal(n) => n.to_f64(),
    _ => None,
  };
  f.unwrap_or(f64::NAN).to_bits().hash(state)
}

/// Whether `f` is integral and within the range of `i64`.
fn fits_i64(f: f64) -> bool {
  // 2^63 is exactly representable; i64::MAX is not.
  const LIMIT: f64 = 9_223_372_036_854_775_808.0;
  f.fract() == 0.0 && f >= -LIMIT && f < LIMIT
}

/// A `Pattern` is a compiled regular expression. Matching is anchored: a
/// pattern must match the whole of a string.
#[derive(Clone)]
pub struct Pattern {
  source: Arc<str>,
  regex: regex::Regex,
}

impl Pattern {
  /// Compiles `source`.
  pub fn new(source: &str) -> Result<Self, regex::Error> {
    let regex = regex::Regex::new(&format!("^(?:{})$", source))?;
    Ok(Pattern {
      source: source.into(),
      regex,
    })
  }

  /// Returns the pattern's source text.
  pub fn source(&self) -> &str {
    &self.source
  }

  /// Returns whether the pattern matches the whole of `s`.
  pub fn is_match(&self, s: &str) -> bool {
    self.regex.is_match(s)
  }
}

impl Debug for Pattern {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "~/{}/", self.source)
  }
}

/// A `Type` represents one of the built-in JEXL value types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Type {
  Null,
  Boolean,
  Byte,
  Short,
  Integer,
  Long,
  BigInteger,
  Float,
  Double,
  BigDecimal,
  String,
  Array,
  Map,
  Set,
  Range,
  Pattern,
  Closure,
  Function,
  Generator,
  Class,
  Object,
  Error,
}

impl Type {
  pub fn name(self) -> &'static str {
    match self {
      Type::Null => "null",
      Type::Boolean => "Boolean",
      Type::Byte => "Byte",
      Type::Short => "Short",
      Type::Integer => "Integer",
      Type::Long => "Long",
      Type::BigInteger => "BigInteger",
      Type::Float => "Float",
      Type::Double => "Double",
      Type::BigDecimal => "BigDecimal",
      Type::String => "String",
      Type::Array => "Array",
      Type::Map => "Map",
      Type::Set => "Set",
      Type::Range => "Range",
      Type::Pattern => "Pattern",
      Type::Closure => "Closure",
      Type::Function => "Function",
      Type::Generator => "Generator",
      Type::Class => "Class",
      Type::Object => "Object",
      Type::Error => "Error",
    }
  }

  /// Returns whether this is one of the numeric types.
  pub fn is_number(self) -> bool {
    matches!(
      self,
      Type::Byte
        | Type::Short
        | Type::Integer
        | Type::Long
        | Type::BigInteger
        | Type::Float
        | Type::Double
        | Type::BigDecimal
    )
  }

  /// Returns the abstract types this type is an instance of.
  pub fn supertypes(self) -> &'static [&'static str] {
    match self {
      Type::Null => &[],
      t if t.is_number() => &["Number", "Object"],
      Type::Array | Type::Set => &["Collection", "Iterable", "Object"],
      Type::Range | Type::Generator => &["Iterable", "Object"],
      Type::Closure | Type::Function => &["Callable", "Object"],
      _ => &["Object"],
    }
  }
}

impl Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::hash_map::DefaultHasher;

  fn hash_of(v: &Value) -> u64 {
    let mut h = DefaultHasher::new();
    v.hash(&mut h);
    h.finish()
  }

  #[test]
  fn numbers_compare_across_types() {
    let pairs = [
      (Value::Int(3), Value::Long(3)),
      (Value::Byte(3), Value::Double(3.0)),
      (Value::Double(1.5), Value::Float(1.5)),
      (Value::Int(7), Value::BigInt(Arc::new(BigInt::from(7)))),
    ];
    for (a, b) in &pairs {
      assert_eq!(a, b);
      assert_eq!(hash_of(a), hash_of(b));
    }
    assert_ne!(Value::Int(3), Value::String("3".into()));
  }

  #[test]
  fn large_numbers_hash_like_their_equals() {
    let big = BigInt::from(i64::MAX) * 4;
    let pairs = [
      (Value::BigInt(Arc::new(big)), Value::Double(36893488147419103228.0)),
      (Value::Long(i64::MAX), Value::Double(9223372036854775807.0)),
      (Value::Long(1 << 60), Value::Double((1u64 << 60) as f64)),
    ];
    for (a, b) in &pairs {
      assert_eq!(a, b);
      assert_eq!(hash_of(a), hash_of(b));
    }

    let set = Set::new(pairs.iter().map(|(a, _)| a.clone()).collect::<Vec<_>>());
    for (_, b) in &pairs {
      assert!(set.contains(b));
    }
  }

  #[test]
  fn out_of_range_doubles_are_not_ints() {
    assert!(Value::Double(1e19).as_int().is_err());
    assert!(Value::Double(-1e19).as_int().is_err());
    assert_eq!(Value::Double(-9223372036854775808.0).as_int(), Ok(i64::MIN));
  }

  #[test]
  fn truthiness() {
    assert!(!Value::Null.truthy());
    assert!(!Value::Int(0).truthy());
    assert!(!Value::Double(f64::NAN).truthy());
    assert!(!Value::String("".into()).truthy());
    assert!(!Value::String("false".into()).truthy());
    assert!(Value::String("no".into()).truthy());
    assert!(Value::Array(Array::new(vec![])).truthy());
  }

  #[test]
  fn instance_tests_walk_supertypes() {
    let v = Value::Long(1);
    assert!(v.is_instance("Long", None));
    assert!(v.is_instance("Number", None));
    assert!(v.is_instance("Object", None));
    assert!(!v.is_instance("String", None));
    assert!(!Value::Null.is_instance("Object", None));
  }

  #[test]
  fn patterns_are_anchored() {
    let p = Pattern::new("a+b").unwrap();
    assert!(p.is_match("aab"));
    assert!(!p.is_match("xaab"));
  }
}
