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

//! Json encoding for JEXL values.

use std::fmt::Write;

use crate::eval::encode::jexl::plain_number;
use crate::eval::encode::Context;
use crate::eval::encode::Encode;
use crate::eval::encode::EncodeError;
use crate::eval::encode::PathComponent;
use crate::eval::escaping;
use crate::eval::value::Value;

#[derive(Default)]
pub struct JsonEncoding(());

impl Encode for JsonEncoding {
  fn encode(mut ctx: Context<Self>, val: &Value) -> Result<(), EncodeError> {
    match val {
      Value::Null => ctx.buf().push_str("null"),
      Value::Bool(b) => {
        let _ = write!(ctx.buf(), "{}", b);
      }
      Value::Float(f) if !f.is_finite() => ctx.buf().push_str("null"),
      Value::Double(f) if !f.is_finite() => ctx.buf().push_str("null"),
      v if v.is_number() => {
        let n = plain_number(v);
        ctx.buf().push_str(&n);
      }
      Value::String(s) => escaping::escape_json_string(s, ctx.buf()),
      Value::Array(_) | Value::Set(_) | Value::Range(_) => {
        let items: Vec<Value> = match val {
          Value::Array(a) => a.snapshot(),
          Value::Set(s) => s.snapshot(),
          Value::Range(r) => r.iter().map(Value::Long).collect(),
          _ => Vec::new(),
        };
        ctx.buf().push('[');
        for (i, v) in items.iter().enumerate() {
          if i != 0 {
            ctx.buf().push(',');
          }
          ctx.recurse(PathComponent::Index(i), v)?
        }
        ctx.buf().push(']');
      }
      Value::Map(m) => {
        ctx.buf().push('{');
        for (i, (k, v)) in m.entries().iter().enumerate() {
          if i != 0 {
            ctx.buf().push(',');
          }
          let key = k.to_display_string();
          escaping::escape_json_string(&key, ctx.buf());
          ctx.buf().push(':');
          ctx.recurse(PathComponent::Key(key), v)?
        }
        ctx.buf().push('}');
      }
      v => {
        return Err(EncodeError::BadType {
          bad_type: v.ty(),
          path: ctx.path().to_vec(),
        })
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
  use crate::eval::value::Pattern;

  #[test]
  fn data_values() {
    let m = Map::new();
    m.insert("a".into(), Value::Array(Array::new(vec![Value::Long(1)])));
    m.insert("b".into(), Value::Null);
    let json = Encoder::<JsonEncoding>::new().encode(&Value::Map(m)).unwrap();
    assert_eq!(json, r#"{"a":[1],"b":null}"#);
  }

  #[test]
  fn rejects_functions() {
    let m = Map::new();
    m.insert("re".into(), Value::Regex(Pattern::new("a+").unwrap()));
    let err = Encoder::<JsonEncoding>::new()
      .encode(&Value::Map(m))
      .unwrap_err();
    assert_eq!(err.to_string(), "error: unsupported type Pattern at .re");
  }
}
