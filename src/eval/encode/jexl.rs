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

//! JEXL literal syntax for JEXL values.
//!
//! Numbers carry the literal suffix of their type, so that printing a value
//! and parsing it back yields the same type.

use std::fmt::Write;

use crate::eval::encode::Context;
use crate::eval::encode::Encode;
use crate::eval::encode::EncodeError;
use crate::eval::encode::PathComponent;
use crate::eval::escaping;
use crate::eval::value::Value;

#[derive(Default)]
pub struct JexlEncoding(());

/// Renders a number without its type suffix; other values render as
/// `to_display_string()` would.
pub fn plain_number(v: &Value) -> String {
  match v {
    Value::Byte(n) => n.to_string(),
    Value::Short(n) => n.to_string(),
    Value::Int(n) => n.to_string(),
    Value::Long(n) => n.to_string(),
    Value::BigInt(n) => n.to_string(),
    Value::Float(n) => float(*n as f64),
    Value::Double(n) => float(*n),
    Value::BigDecimal(n) => n.to_string(),
    v => v.to_display_string(),
  }
}

/// Makes sure integral floats still read as floats.
fn float(f: f64) -> String {
  if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
    format!("{:.1}", f)
  } else {
    f.to_string()
  }
}

/// Recurses into `v`, printing cycles instead of failing on them.
fn recurse_lenient(
  ctx: &mut Context<JexlEncoding>,
  key: PathComponent,
  v: &Value,
) -> Result<(), EncodeError> {
  match ctx.recurse(key, v) {
    Err(EncodeError::Cycle { .. }) => {
      ctx.buf().push_str("<cycle>");
      Ok(())
    }
    res => res,
  }
}

impl Encode for JexlEncoding {
  fn encode(mut ctx: Context<Self>, val: &Value) -> Result<(), EncodeError> {
    match val {
      Value::Null => ctx.buf().push_str("null"),
      Value::Bool(b) => {
        let _ = write!(ctx.buf(), "{}", b);
      }
      Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Double(_) => {
        let n = plain_number(val);
        ctx.buf().push_str(&n);
      }
      Value::Long(n) => {
        let _ = write!(ctx.buf(), "{}L", n);
      }
      Value::BigInt(n) => {
        let _ = write!(ctx.buf(), "{}H", n);
      }
      Value::Float(n) => {
        let _ = write!(ctx.buf(), "{}F", float(*n as f64));
      }
      Value::BigDecimal(n) => {
        let _ = write!(ctx.buf(), "{}B", n);
      }
      Value::String(s) => escaping::escape_jexl_string(s, ctx.buf()),
      Value::Array(a) => {
        ctx.buf().push('[');
        for (i, v) in a.snapshot().iter().enumerate() {
          if i != 0 {
            ctx.buf().push_str(", ");
          }
          recurse_lenient(&mut ctx, PathComponent::Index(i), v)?;
        }
        ctx.buf().push(']');
      }
      Value::Set(s) => {
        ctx.buf().push('{');
        for (i, v) in s.snapshot().iter().enumerate() {
          if i != 0 {
            ctx.buf().push_str(", ");
          }
          recurse_lenient(&mut ctx, PathComponent::Index(i), v)?;
        }
        ctx.buf().push('}');
      }
      Value::Map(m) => {
        let entries = m.entries();
        if entries.is_empty() {
          ctx.buf().push_str("{:}");
          return Ok(());
        }
        ctx.buf().push('{');
        for (i, (k, v)) in entries.iter().enumerate() {
          if i != 0 {
            ctx.buf().push_str(", ");
          }
          let key = PathComponent::Key(k.to_display_string());
          recurse_lenient(&mut ctx, key.clone(), k)?;
          ctx.buf().push_str(" : ");
          recurse_lenient(&mut ctx, key, v)?;
        }
        ctx.buf().push('}');
      }
      Value::Range(r) => {
        let _ = write!(ctx.buf(), "{} .. {}", r.start(), r.end());
      }
      Value::Regex(p) => {
        let _ = write!(ctx.buf(), "~/{}/", p.source());
      }
      Value::Closure(c) => ctx.buf().push_str(c.source()),
      Value::Function(f) => {
        let _ = write!(ctx.buf(), "<native {}>", f.name().unwrap_or("fn"));
      }
      Value::Generator(_) => ctx.buf().push_str("<generator>"),
      Value::Class(c) => ctx.buf().push_str(c.name()),
      Value::Object(o) => {
        let _ = write!(ctx.buf(), "<{}>", o.type_name());
      }
      Value::Error(e) => {
        let _ = write!(ctx.buf(), "<{}: {}>", e.kind.name(), e.message);
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::encode::Encoder;
  use crate::eval::value::Array;
  use crate::eval::value::Map;
  use crate::eval::value::Range;
  use crate::eval::value::Set;

  fn encode(v: &Value) -> String {
    Encoder::<JexlEncoding>::new().encode(v).unwrap()
  }

  #[test]
  fn numbers_keep_their_suffix() {
    assert_eq!(encode(&Value::Int(42)), "42");
    assert_eq!(encode(&Value::Long(42)), "42L");
    assert_eq!(encode(&Value::Double(2.0)), "2.0");
    assert_eq!(encode(&Value::Float(1.5)), "1.5F");
    assert_eq!(plain_number(&Value::Long(42)), "42");
  }

  #[test]
  fn containers() {
    let a = Value::Array(Array::new(vec![Value::Int(1), "x".into()]));
    assert_eq!(encode(&a), "[1, 'x']");
    assert_eq!(encode(&Value::Map(Map::new())), "{:}");
    let s = Value::Set(Set::new(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(encode(&s), "{1, 2}");
    assert_eq!(encode(&Value::Range(Range::new(1, 3))), "1 .. 3");
  }

  #[test]
  fn cycles_are_marked() {
    let a = Array::new(vec![]);
    a.push(Value::Array(a.clone()));
    assert_eq!(encode(&Value::Array(a.clone())), "[<cycle>]");
    // Break the cycle so the test does not leak.
    a.write().clear();
  }
}
