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

//! Data-model operators: `empty`, `size`, containment, prefix and suffix
//! tests, and iteration.

use crate::eval::arith::Overload;
use crate::eval::arith::ValueIter;
use crate::eval::cancel::Poller;
use crate::eval::error::ErrorKind;
use crate::eval::error::JexlError;
use crate::eval::generator::Generator;
use crate::eval::generator::Item;
use crate::eval::introspect::Resolution;
use crate::eval::value::seq::RangeIter;
use crate::eval::value::Value;
use crate::eval::Interpreter;
use crate::eval::Result;
use crate::eval::Signal;
use crate::syn::Span;

/// Narrows an integer to `Int` when it fits.
pub fn int_value(n: i64) -> Value {
  i32::try_from(n).map(Value::Int).unwrap_or(Value::Long(n))
}

/// A `Cursor` walks over the values of an iterable.
pub enum Cursor {
  Values(std::vec::IntoIter<Value>),
  Range(RangeIter),
  Generator(Generator),
  Hook(ValueIter),
}

impl Cursor {
  /// Returns the next value; generator failures surface as signals. A
  /// generator is waited on only for as long as `poller` allows.
  pub fn next(&mut self, poller: &Poller) -> Result<Option<Value>> {
    Ok(match self {
      Cursor::Values(it) => it.next(),
      Cursor::Range(it) => it.next().map(int_value),
      Cursor::Hook(it) => it.next(),
      Cursor::Generator(g) => match g.pull(poller) {
        None => None,
        Some(Item::Value(v)) => Some(v),
        Some(Item::Error(e)) => return Err(Signal::Error(e)),
        Some(Item::Interrupt(i)) => return Err(Signal::Cancel(i)),
      },
    })
  }
}

impl Interpreter {
  /// Starts iterating over `v`. Arrays and sets are iterated over a
  /// snapshot; maps yield their values and strings their characters.
  pub(super) fn cursor(&mut self, span: Span, v: &Value) -> Result<Cursor> {
    match self.runtime.operators.for_each(v) {
      Overload::Handled(it) => return Ok(Cursor::Hook(it)),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    Ok(match v {
      Value::Null => Cursor::Values(Vec::new().into_iter()),
      Value::Array(a) => Cursor::Values(a.snapshot().into_iter()),
      Value::Set(s) => Cursor::Values(s.snapshot().into_iter()),
      Value::Map(m) => Cursor::Values(m.values().into_iter()),
      Value::Range(r) => Cursor::Range(r.iter()),
      Value::Generator(g) => Cursor::Generator(g.clone()),
      Value::String(s) => Cursor::Values(
        s.chars()
          .map(|c| Value::String(c.to_string().into()))
          .collect::<Vec<_>>()
          .into_iter(),
      ),
      v => error!(self, span, "cannot iterate over {}", v.type_name()),
    })
  }

  /// Calls the host method `v.name(arg)`, if `v` has one.
  fn probe(
    &mut self,
    span: Span,
    v: &Value,
    name: &str,
    arg: Option<&Value>,
  ) -> Result<Option<Value>> {
    let args: Vec<Value> = arg.into_iter().cloned().collect();
    let uberspect = self.runtime.uberspect.clone();
    match uberspect.resolve_method(v, name, &args) {
      Resolution::Found(m) => m
        .invoke(v, args)
        .map(Some)
        .map_err(|e| self.host_failure(span, e)),
      _ => Ok(None),
    }
  }

  /// Implements `empty(v)`.
  pub(super) fn is_empty(&mut self, span: Span, v: &Value) -> Result<bool> {
    match self.runtime.operators.empty(v) {
      Overload::Handled(b) => return Ok(b),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    Ok(match v {
      Value::Null => true,
      Value::String(s) => s.is_empty(),
      Value::Array(a) => a.is_empty(),
      Value::Map(m) => m.is_empty(),
      Value::Set(s) => s.is_empty(),
      Value::Range(_) => false,
      v if v.is_number() => !v.truthy(),
      v => self
        .probe(span, v, "isEmpty", None)?
        .map_or(false, |r| r.truthy()),
    })
  }

  /// Implements `size(v)`.
  pub(super) fn size_of(&mut self, span: Span, v: &Value) -> Result<usize> {
    match self.runtime.operators.size(v) {
      Overload::Handled(n) => return Ok(n),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    Ok(match v {
      Value::Null => 0,
      Value::String(s) => s.chars().count(),
      Value::Array(a) => a.len(),
      Value::Map(m) => m.len(),
      Value::Set(s) => s.len(),
      Value::Range(r) => usize::try_from(r.len()).unwrap_or(usize::MAX),
      v => match self.probe(span, v, "size", None)? {
        Some(n) => n
          .as_int()
          .ok()
          .and_then(|n| usize::try_from(n).ok())
          .unwrap_or(0),
        // Generators are not drained to be measured.
        None => {
          let err = JexlError::new(
            self,
            ErrorKind::Operator("size"),
            span,
            format!("size of {} is undefined", v.type_name()),
          );
          self.degrade(err)?;
          0
        }
      },
    })
  }

  /// Implements `item =~ container`. A string or pattern container is
  /// matched as a regular expression; a collection container must hold
  /// `item`, or every element of `item` if it is a collection itself.
  pub(super) fn matches(
    &mut self,
    span: Span,
    item: &Value,
    container: &Value,
  ) -> Result<bool> {
    match self.runtime.operators.contains(container, item) {
      Overload::Handled(b) => return Ok(b),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }

    let arith = self.arith();
    let elements = |item: &Value| match item {
      Value::Array(a) => Some(a.snapshot()),
      Value::Set(s) => Some(s.snapshot()),
      _ => None,
    };
    Ok(match container {
      Value::Null => item.is_null(),
      Value::Regex(p) => p.is_match(&item.to_display_string()),
      Value::String(src) => match item {
        Value::String(s) => match self.runtime.pattern(src) {
          Ok(p) => p.is_match(s),
          Err(_) => s == src,
        },
        item => arith.equals(item, container),
      },
      Value::Array(a) => {
        let held = a.snapshot();
        let holds = |x: &Value| held.iter().any(|h| arith.equals(h, x));
        match elements(item) {
          Some(xs) => xs.iter().all(holds),
          None => holds(item),
        }
      }
      Value::Set(s) => match elements(item) {
        Some(xs) => xs.iter().all(|x| s.contains(x)),
        None => s.contains(item),
      },
      Value::Map(m) => m.contains_key(item),
      Value::Range(r) => item.as_int().map_or(false, |n| r.contains(n)),
      c => match self.probe(span, c, "contains", Some(item))? {
        Some(r) => r.truthy(),
        None => arith.equals(item, c),
      },
    })
  }

  /// Implements `value =^ prefix`.
  pub(super) fn starts_with(
    &mut self,
    span: Span,
    value: &Value,
    prefix: &Value,
  ) -> Result<bool> {
    match self.runtime.operators.starts_with(value, prefix) {
      Overload::Handled(b) => return Ok(b),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    let arith = self.arith();
    Ok(match (value, prefix) {
      (Value::Null, _) | (_, Value::Null) => false,
      (Value::String(s), p) => s.starts_with(p.to_display_string().as_str()),
      (Value::Array(a), Value::Array(p)) => {
        let (a, p) = (a.snapshot(), p.snapshot());
        p.len() <= a.len()
          && a.iter().zip(&p).all(|(x, y)| arith.equals(x, y))
      }
      (Value::Array(a), p) => a.get(0).map_or(false, |x| arith.equals(&x, p)),
      (v, p) => self
        .probe(span, v, "startsWith", Some(p))?
        .map_or(false, |r| r.truthy()),
    })
  }

  /// Implements `value =$ suffix`.
  pub(super) fn ends_with(
    &mut self,
    span: Span,
    value: &Value,
    suffix: &Value,
  ) -> Result<bool> {
    match self.runtime.operators.ends_with(value, suffix) {
      Overload::Handled(b) => return Ok(b),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    let arith = self.arith();
    Ok(match (value, suffix) {
      (Value::Null, _) | (_, Value::Null) => false,
      (Value::String(s), p) => s.ends_with(p.to_display_string().as_str()),
      (Value::Array(a), Value::Array(p)) => {
        let (a, p) = (a.snapshot(), p.snapshot());
        p.len() <= a.len()
          && a
            .iter()
            .rev()
            .zip(p.iter().rev())
            .all(|(x, y)| arith.equals(x, y))
      }
      (Value::Array(a), p) => a
        .snapshot()
        .last()
        .map_or(false, |x| arith.equals(x, p)),
      (v, p) => self
        .probe(span, v, "endsWith", Some(p))?
        .map_or(false, |r| r.truthy()),
    })
  }
}
