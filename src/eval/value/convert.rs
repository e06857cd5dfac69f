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

//! Traits for converting between Rust types and JEXL values.

use std::sync::Arc;

use crate::eval::value::Array;
use crate::eval::value::Closure;
use crate::eval::value::Map;
use crate::eval::value::NativeFn;
use crate::eval::value::Set;
use crate::eval::value::Type;
use crate::eval::value::Value;
use crate::eval::Result;

/// Represents a type that can be converted into a `Value`.
///
/// This trait mostly exists to be different from `Into` to avoid coherence
/// issues, and `Into::into()` should generally be preferred instead.
pub trait IntoValue {
  fn into_value(self) -> Value;
}

impl<T: IntoValue> From<T> for Value {
  #[inline]
  fn from(x: T) -> Self {
    x.into_value()
  }
}

macro_rules! into_value {
  ($($ty:ty => |$x:ident| $e:expr,)*) => {$(
    impl IntoValue for $ty {
      fn into_value(self) -> Value {
        let $x = self;
        $e
      }
    }
  )*}
}

into_value! {
  () => |_x| Value::Null,
  bool => |x| Value::Bool(x),
  i8 => |x| Value::Byte(x),
  i16 => |x| Value::Short(x),
  i32 => |x| Value::Int(x),
  i64 => |x| Value::Long(x),
  f32 => |x| Value::Float(x),
  f64 => |x| Value::Double(x),
  String => |x| Value::String(x.into()),
  &str => |x| Value::String(x.into()),
  Arc<str> => |x| Value::String(x),
  Vec<Value> => |x| Value::Array(Array::new(x)),
  Array => |x| Value::Array(x),
  Map => |x| Value::Map(x),
  Set => |x| Value::Set(x),
  Closure => |x| Value::Closure(x),
  NativeFn => |x| Value::Function(x),
}

impl<T: IntoValue> IntoValue for Option<T> {
  fn into_value(self) -> Value {
    match self {
      Some(x) => x.into_value(),
      None => Value::Null,
    }
  }
}

/// Represents a type that can be extracted out of a `Value`, for host code
/// consuming evaluation results.
pub trait FromValue: Sized {
  /// Converts `v`, or reports its type if it does not convert.
  fn from_value(v: &Value) -> std::result::Result<Self, Type>;
}

impl FromValue for Value {
  fn from_value(v: &Value) -> std::result::Result<Self, Type> {
    Ok(v.clone())
  }
}

impl FromValue for bool {
  fn from_value(v: &Value) -> std::result::Result<Self, Type> {
    match v {
      Value::Bool(b) => Ok(*b),
      v => Err(v.ty()),
    }
  }
}

impl FromValue for i64 {
  fn from_value(v: &Value) -> std::result::Result<Self, Type> {
    v.as_int()
  }
}

impl FromValue for f64 {
  fn from_value(v: &Value) -> std::result::Result<Self, Type> {
    crate::eval::arith::to_f64(v).ok_or_else(|| v.ty())
  }
}

impl FromValue for String {
  fn from_value(v: &Value) -> std::result::Result<Self, Type> {
    match v {
      Value::String(s) => Ok(s.to_string()),
      v => Err(v.ty()),
    }
  }
}

impl<T: FromValue> FromValue for Vec<T> {
  fn from_value(v: &Value) -> std::result::Result<Self, Type> {
    match v {
      Value::Array(a) => a.read().iter().map(T::from_value).collect(),
      Value::Set(s) => s.read().iter().map(T::from_value).collect(),
      v => Err(v.ty()),
    }
  }
}

/// Represents a type that can be converted into a `Result<Value>`.
///
/// This trait mostly exists to be different from `Into` to avoid coherence
/// issues. It is exclusively used by `native_fn!()`.
#[doc(hidden)]
pub trait IntoValueResult {
  fn into_value_result(self) -> Result<Value>;
}

impl<I> IntoValueResult for I
where
  I: IntoValue,
{
  fn into_value_result(self) -> Result<Value> {
    Ok(self.into_value())
  }
}

impl IntoValueResult for Value {
  fn into_value_result(self) -> Result<Value> {
    Ok(self)
  }
}

impl IntoValueResult for Result<Value> {
  fn into_value_result(self) -> Result<Value> {
    self
  }
}
