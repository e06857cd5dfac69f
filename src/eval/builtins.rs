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

//! Members of the built-in value types.

use std::sync::Arc;

use crate::eval::cancel::CancelFlag;
use crate::eval::cancel::Poller;
use crate::eval::error::host_error;
use crate::eval::generator::Item;
use crate::eval::introspect::HostClass;
use crate::eval::introspect::HostResult;
use crate::eval::introspect::Method;
use crate::eval::introspect::ParamType as P;
use crate::eval::value::Array;
use crate::eval::value::Set;
use crate::eval::value::Value;

/// Returns the classes describing the built-in types.
pub fn classes() -> Vec<HostClass> {
  let mut classes = vec![
    string(),
    array(),
    map(),
    set(),
    range(),
    closure(),
    generator(),
    error(),
    pattern(),
  ];
  for name in &[
    "Byte",
    "Short",
    "Integer",
    "Long",
    "BigInteger",
    "Float",
    "Double",
    "BigDecimal",
  ] {
    classes.push(number(name));
  }
  classes
}

macro_rules! receiver {
  ($recv:expr, $variant:ident) => {
    match $recv {
      Value::$variant(x) => x,
      v => {
        return Err(host_error(format!(
          "bad receiver: expected {}, got {}",
          stringify!($variant),
          v.ty()
        )))
      }
    }
  };
}

fn int_arg(args: &[Value], idx: usize) -> HostResult<i64> {
  match args.get(idx).map(Value::as_int) {
    Some(Ok(n)) => Ok(n),
    _ => Err(host_error(format!("argument {} must be an integer", idx))),
  }
}

fn str_arg(args: &[Value], idx: usize) -> HostResult<&str> {
  args
    .get(idx)
    .and_then(Value::as_str)
    .ok_or_else(|| host_error(format!("argument {} must be a string", idx)))
}

fn string() -> HostClass {
  let s = |f: fn(&str) -> Value| {
    move |recv: &Value, _: Vec<Value>| -> HostResult {
      Ok(f(receiver!(recv, String)))
    }
  };

  HostClass::new("String")
    .extends("CharSequence")
    .method("length", vec![], s(|s| Value::Long(s.chars().count() as i64)))
    .method("size", vec![], s(|s| Value::Long(s.chars().count() as i64)))
    .method("isEmpty", vec![], s(|s| Value::Bool(s.is_empty())))
    .method("trim", vec![], s(|s| s.trim().into()))
    .method("toUpperCase", vec![], s(|s| s.to_uppercase().into()))
    .method("toLowerCase", vec![], s(|s| s.to_lowercase().into()))
    .method("toString", vec![], s(|s| s.into()))
    .method("charAt", vec![P::Long], |recv, args| {
      let s = receiver!(recv, String);
      let idx = int_arg(&args, 0)?;
      usize::try_from(idx)
        .ok()
        .and_then(|i| s.chars().nth(i))
        .map(|c| Value::String(c.to_string().into()))
        .ok_or_else(|| host_error(format!("index {} out of bounds", idx)))
    })
    .method("substring", vec![P::Long], |recv, args| {
      let s = receiver!(recv, String);
      let from = int_arg(&args, 0)?.max(0) as usize;
      Ok(s.chars().skip(from).collect::<String>().into())
    })
    .method("substring", vec![P::Long, P::Long], |recv, args| {
      let s = receiver!(recv, String);
      let from = int_arg(&args, 0)?.max(0) as usize;
      let to = int_arg(&args, 1)?.max(0) as usize;
      let len = to.saturating_sub(from);
      Ok(s.chars().skip(from).take(len).collect::<String>().into())
    })
    .method("indexOf", vec![P::String], |recv, args| {
      let s = receiver!(recv, String);
      let needle = str_arg(&args, 0)?;
      let idx = s.find(needle).map(|b| s[..b].chars().count() as i64);
      Ok(Value::Long(idx.unwrap_or(-1)))
    })
    .method("contains", vec![P::String], |recv, args| {
      Ok(Value::Bool(receiver!(recv, String).contains(str_arg(&args, 0)?)))
    })
    .method("startsWith", vec![P::String], |recv, args| {
      let s = receiver!(recv, String);
      Ok(Value::Bool(s.starts_with(str_arg(&args, 0)?)))
    })
    .method("endsWith", vec![P::String], |recv, args| {
      let s = receiver!(recv, String);
      Ok(Value::Bool(s.ends_with(str_arg(&args, 0)?)))
    })
    .method("replace", vec![P::String, P::String], |recv, args| {
      let s = receiver!(recv, String);
      Ok(s.replace(str_arg(&args, 0)?, str_arg(&args, 1)?).into())
    })
    .method("split", vec![P::String], |recv, args| {
      let s = receiver!(recv, String);
      let parts = s
        .split(str_arg(&args, 0)?)
        .map(|p| Value::String(p.into()))
        .collect::<Vec<_>>();
      Ok(parts.into())
    })
    .method("matches", vec![P::String], |recv, args| {
      let s = receiver!(recv, String);
      let re = crate::eval::value::Pattern::new(str_arg(&args, 0)?)
        .map_err(|e| host_error(e.to_string()))?;
      Ok(Value::Bool(re.is_match(s)))
    })
}

fn array() -> HostClass {
  HostClass::new("Array")
    .extends("Collection")
    .extends("Iterable")
    .extends("List")
    .property("length", |recv| {
      Ok(Value::Long(receiver!(recv, Array).len() as i64))
    })
    .method("size", vec![], |recv, _| {
      Ok(Value::Long(receiver!(recv, Array).len() as i64))
    })
    .method("isEmpty", vec![], |recv, _| {
      Ok(Value::Bool(receiver!(recv, Array).is_empty()))
    })
    .method("get", vec![P::Long], |recv, args| {
      let a = receiver!(recv, Array);
      let idx = int_arg(&args, 0)?;
      usize::try_from(idx)
        .ok()
        .and_then(|i| a.get(i))
        .ok_or_else(|| host_error(format!("index {} out of bounds", idx)))
    })
    .method("set", vec![P::Long, P::Any], |recv, mut args| {
      let a = receiver!(recv, Array);
      let idx = int_arg(&args, 0)?;
      let value = args.pop().unwrap_or(Value::Null);
      let old = usize::try_from(idx).ok().and_then(|i| a.get(i));
      match old {
        Some(old) if a.set(idx as usize, value) => Ok(old),
        _ => Err(host_error(format!("index {} out of bounds", idx))),
      }
    })
    .method("add", vec![P::Any], |recv, mut args| {
      receiver!(recv, Array).push(args.pop().unwrap_or(Value::Null));
      Ok(Value::Bool(true))
    })
    .method("remove", vec![P::Long], |recv, args| {
      let a = receiver!(recv, Array);
      let idx = int_arg(&args, 0)?;
      usize::try_from(idx)
        .ok()
        .and_then(|i| a.remove(i))
        .ok_or_else(|| host_error(format!("index {} out of bounds", idx)))
    })
    .method("clear", vec![], |recv, _| {
      receiver!(recv, Array).write().clear();
      Ok(Value::Null)
    })
    .method("contains", vec![P::Any], |recv, args| {
      let a = receiver!(recv, Array);
      Ok(Value::Bool(args.first().map_or(false, |x| a.read().contains(x))))
    })
    .method("indexOf", vec![P::Any], |recv, args| {
      let a = receiver!(recv, Array);
      let idx = args
        .first()
        .and_then(|x| a.read().iter().position(|v| v == x))
        .map_or(-1, |i| i as i64);
      Ok(Value::Long(idx))
    })
    .method("join", vec![P::String], |recv, args| {
      let a = receiver!(recv, Array);
      let sep = str_arg(&args, 0)?;
      let parts: Vec<String> =
        a.read().iter().map(Value::to_display_string).collect();
      Ok(parts.join(sep).into())
    })
    .method("toSet", vec![], |recv, _| {
      Ok(Value::Set(Set::new(receiver!(recv, Array).snapshot())))
    })
}

fn map() -> HostClass {
  HostClass::new("Map")
    .method("size", vec![], |recv, _| {
      Ok(Value::Long(receiver!(recv, Map).len() as i64))
    })
    .method("isEmpty", vec![], |recv, _| {
      Ok(Value::Bool(receiver!(recv, Map).is_empty()))
    })
    .method("get", vec![P::Any], |recv, args| {
      let m = receiver!(recv, Map);
      Ok(args.first().and_then(|k| m.get(k)).unwrap_or(Value::Null))
    })
    .method("put", vec![P::Any, P::Any], |recv, mut args| {
      let m = receiver!(recv, Map);
      let value = args.pop().unwrap_or(Value::Null);
      let key = args.pop().unwrap_or(Value::Null);
      Ok(m.insert(key, value).unwrap_or(Value::Null))
    })
    .method("remove", vec![P::Any], |recv, args| {
      let m = receiver!(recv, Map);
      Ok(args.first().and_then(|k| m.remove(k)).unwrap_or(Value::Null))
    })
    .method("containsKey", vec![P::Any], |recv, args| {
      let m = receiver!(recv, Map);
      Ok(Value::Bool(args.first().map_or(false, |k| m.contains_key(k))))
    })
    .method("keySet", vec![], |recv, _| {
      Ok(Value::Set(Set::new(receiver!(recv, Map).keys())))
    })
    .method("values", vec![], |recv, _| {
      Ok(Value::Array(Array::new(receiver!(recv, Map).values())))
    })
}

fn set() -> HostClass {
  HostClass::new("Set")
    .extends("Collection")
    .extends("Iterable")
    .method("size", vec![], |recv, _| {
      Ok(Value::Long(receiver!(recv, Set).len() as i64))
    })
    .method("isEmpty", vec![], |recv, _| {
      Ok(Value::Bool(receiver!(recv, Set).is_empty()))
    })
    .method("add", vec![P::Any], |recv, mut args| {
      let s = receiver!(recv, Set);
      Ok(Value::Bool(s.insert(args.pop().unwrap_or(Value::Null))))
    })
    .method("remove", vec![P::Any], |recv, args| {
      let s = receiver!(recv, Set);
      Ok(Value::Bool(args.first().map_or(false, |x| s.remove(x))))
    })
    .method("contains", vec![P::Any], |recv, args| {
      let s = receiver!(recv, Set);
      Ok(Value::Bool(args.first().map_or(false, |x| s.contains(x))))
    })
    .method("toArray", vec![], |recv, _| {
      Ok(Value::Array(Array::new(receiver!(recv, Set).snapshot())))
    })
}

fn range() -> HostClass {
  HostClass::new("Range")
    .extends("Iterable")
    .property("from", |recv| Ok(Value::Long(receiver!(recv, Range).start())))
    .property("to", |recv| Ok(Value::Long(receiver!(recv, Range).end())))
    .method("size", vec![], |recv, _| {
      Ok(Value::Long(receiver!(recv, Range).len() as i64))
    })
    .method("isAscending", vec![], |recv, _| {
      Ok(Value::Bool(receiver!(recv, Range).is_ascending()))
    })
    .method("contains", vec![P::Any], |recv, args| {
      let r = receiver!(recv, Range);
      let found = args.first().and_then(|v| v.as_int().ok());
      Ok(Value::Bool(found.map_or(false, |n| r.contains(n))))
    })
}

fn closure() -> HostClass {
  HostClass::new("Closure")
    .extends("Callable")
    .property("source", |recv| Ok(receiver!(recv, Closure).source().into()))
    .property("parameters", |recv| {
      let names = receiver!(recv, Closure).parameters();
      Ok(names.into_iter().map(Value::String).collect::<Vec<_>>().into())
    })
    .with_method(
      Method::new("curry", vec![], |recv, args| {
        Ok(Value::Closure(receiver!(recv, Closure).curry(args)))
      })
      .with_varargs(P::Any),
    )
    .method("getParameters", vec![], |recv, _| {
      let names = receiver!(recv, Closure).parameters();
      Ok(names.into_iter().map(Value::String).collect::<Vec<_>>().into())
    })
}

fn generator() -> HostClass {
  HostClass::new("Generator")
    .extends("Iterable")
    // Scripts pull through the interpreter, which bounds the wait; a host
    // caller waits for the body as long as it takes.
    .method("next", vec![], |recv, _| {
      let unbounded = Poller::new(CancelFlag::new());
      match receiver!(recv, Generator).pull(&unbounded) {
        Some(Item::Value(v)) => Ok(v),
        None => Ok(Value::Null),
        Some(Item::Error(e)) => Err(Arc::new(e)),
        Some(Item::Interrupt(_)) => Err(host_error("generator interrupted")),
      }
    })
}

fn error() -> HostClass {
  HostClass::new("Error")
    .extends("Exception")
    .property("message", |recv| {
      Ok(receiver!(recv, Error).message.as_str().into())
    })
    .property("kind", |recv| Ok(receiver!(recv, Error).kind.name().into()))
    .property("symbol", |recv| {
      let e = receiver!(recv, Error);
      Ok(e.kind.symbol().map(Value::from).unwrap_or(Value::Null))
    })
    .method("getMessage", vec![], |recv, _| {
      Ok(receiver!(recv, Error).message.as_str().into())
    })
}

fn pattern() -> HostClass {
  HostClass::new("Pattern")
    .method("source", vec![], |recv, _| {
      Ok(receiver!(recv, Regex).source().into())
    })
    .method("matches", vec![P::String], |recv, args| {
      let p = receiver!(recv, Regex);
      Ok(Value::Bool(p.is_match(str_arg(&args, 0)?)))
    })
}

fn number(name: &str) -> HostClass {
  use crate::eval::arith;
  HostClass::new(name)
    .extends("Number")
    .method("intValue", vec![], |recv, _| {
      Ok(Value::Int(arith::to_f64(recv).unwrap_or(0.0) as i32))
    })
    .method("longValue", vec![], |recv, _| match recv.as_int() {
      Ok(n) => Ok(Value::Long(n)),
      Err(_) => Ok(Value::Long(arith::to_f64(recv).unwrap_or(0.0) as i64)),
    })
    .method("doubleValue", vec![], |recv, _| {
      Ok(Value::Double(arith::to_f64(recv).unwrap_or(f64::NAN)))
    })
    .method("toString", vec![], |recv, _| {
      Ok(Value::String(crate::eval::encode::jexl::plain_number(recv).into()))
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::introspect::ClassUberspect;
  use crate::eval::introspect::Resolution;
  use crate::eval::introspect::Uberspect;

  fn invoke(recv: Value, name: &str, args: Vec<Value>) -> Value {
    let u = ClassUberspect::default();
    match u.resolve_method(&recv, name, &args) {
      Resolution::Found(m) => m.invoke(&recv, args).unwrap(),
      r => panic!("could not resolve {}: {:?}", name, r),
    }
  }

  #[test]
  fn string_members() {
    let s = Value::String("héllo".into());
    assert_eq!(invoke(s.clone(), "length", vec![]), Value::Long(5));
    assert_eq!(
      invoke(s.clone(), "substring", vec![Value::Int(1), Value::Int(3)]),
      Value::String("él".into())
    );
    assert_eq!(
      invoke(s, "indexOf", vec!["l".into()]),
      Value::Long(2)
    );
  }

  #[test]
  fn array_members() {
    let a = Value::Array(Array::new(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(
      invoke(a.clone(), "add", vec![Value::Int(3)]),
      Value::Bool(true)
    );
    assert_eq!(invoke(a.clone(), "size", vec![]), Value::Long(3));
    assert_eq!(invoke(a.clone(), "remove", vec![Value::Int(0)]), Value::Int(1));
    assert_eq!(
      invoke(a, "join", vec!["-".into()]),
      Value::String("2-3".into())
    );
  }

  #[test]
  fn number_members() {
    assert_eq!(invoke(Value::Double(2.7), "intValue", vec![]), Value::Int(2));
    assert_eq!(invoke(Value::Byte(4), "longValue", vec![]), Value::Long(4));
  }
}
