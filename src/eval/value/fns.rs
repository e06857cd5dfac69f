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

//! JEXL functions: script closures and native functions.

use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use crate::eval::error::ErrorKind;
use crate::eval::error::HostError;
use crate::eval::error::JexlError;
use crate::eval::frame::Cell;
use crate::eval::frame::Slot;
use crate::eval::value::Value;
use crate::eval::Interpreter;
use crate::eval::Result;
use crate::syn;

/// A `Closure` is a JEXL lambda. It is implemented as a reference to its
/// syntax tree, the frame cells it captured from its definition site, and
/// any arguments bound by currying.
#[derive(Clone)]
pub struct Closure {
  lambda: Arc<syn::Lambda>,
  captured: Arc<[Cell]>,
  curried: Arc<[Value]>,
}

impl Closure {
  /// Creates a new `Closure` over `lambda`; `captured` must hold one cell per
  /// captured slot, in slot order.
  pub fn new(lambda: Arc<syn::Lambda>, captured: Vec<Cell>) -> Self {
    Closure {
      lambda,
      captured: captured.into(),
      curried: Arc::new([]),
    }
  }

  /// Returns the syntax tree for this closure.
  pub fn lambda(&self) -> &Arc<syn::Lambda> {
    &self.lambda
  }

  /// Returns this closure's declared name.
  pub fn name(&self) -> Option<&str> {
    self.lambda.name.as_deref()
  }

  /// Returns the source text of this closure.
  pub fn source(&self) -> &str {
    &self.lambda.source
  }

  /// Returns the captured cells, in slot order.
  pub fn captured(&self) -> &[Cell] {
    &self.captured
  }

  /// Returns the arguments bound by currying.
  pub fn curried(&self) -> &[Value] {
    &self.curried
  }

  /// Returns whether calling this closure produces a generator.
  pub fn is_generator(&self) -> bool {
    self.lambda.is_generator
  }

  /// Binds `args` to the leading unbound parameters, producing a new
  /// closure. Currying never evaluates the body, and arguments past the
  /// parameter list are dropped.
  pub fn curry(&self, args: impl IntoIterator<Item = Value>) -> Closure {
    let room = self.lambda.params.len().saturating_sub(self.curried.len());
    let mut curried = self.curried.to_vec();
    curried.extend(args.into_iter().take(room));
    Closure {
      lambda: self.lambda.clone(),
      captured: self.captured.clone(),
      curried: curried.into(),
    }
  }

  /// Returns the names of the parameters not yet bound by currying.
  pub fn parameters(&self) -> Vec<Arc<str>> {
    self.lambda.params[self.curried.len().min(self.lambda.params.len())..]
      .iter()
      .map(|p| p.name.clone())
      .collect()
  }

  /// Returns the names and current values of the captured variables.
  pub fn captured_values(&self) -> Vec<(Arc<str>, Value)> {
    self
      .lambda
      .scope
      .captures()
      .zip(self.captured.iter())
      .map(|((_, _, name), cell)| (name.clone(), cell.lock().value_or_null()))
      .collect()
  }

  fn capture_snapshot(&self) -> Vec<Slot> {
    self.captured.iter().map(|c| c.lock().clone()).collect()
  }
}

/// Closures compare structurally: same source, same captured values, and
/// same curried arguments. Captured closures compare by source alone, which
/// keeps self-referencing closures from recursing forever.
impl PartialEq for Closure {
  fn eq(&self, other: &Self) -> bool {
    if Arc::ptr_eq(&self.captured, &other.captured)
      && Arc::ptr_eq(&self.curried, &other.curried)
    {
      return true;
    }
    if self.lambda.source != other.lambda.source
      || self.curried != other.curried
      || self.captured.len() != other.captured.len()
    {
      return false;
    }

    let (a, b) = (self.capture_snapshot(), other.capture_snapshot());
    a.iter().zip(b.iter()).all(|pair| match pair {
      (Slot::Value(Value::Closure(x)), Slot::Value(Value::Closure(y))) => {
        x.lambda.source == y.lambda.source
      }
      (Slot::Value(x), Slot::Value(y)) => x == y,
      (x, y) => std::mem::discriminant(x) == std::mem::discriminant(y),
    })
  }
}

impl Hash for Closure {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.lambda.source.hash(state);
    self.curried.len().hash(state);
    for slot in self.capture_snapshot() {
      match slot {
        Slot::Value(Value::Closure(c)) => c.lambda.source.hash(state),
        Slot::Value(v) => v.hash(state),
        _ => 0u8.hash(state),
      }
    }
  }
}

impl Debug for Closure {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Closure")
      .field("source", &self.lambda.source)
      .field("curried", &self.curried)
      .finish()
  }
}

impl Display for Closure {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match &self.lambda.name {
      Some(name) => write!(f, "{}() ", name)?,
      None => write!(f, "<lambda> ")?,
    }
    write!(f, "({})", self.lambda.span)
  }
}

type NativeFnHandle =
  Arc<dyn Fn(&mut Interpreter, Vec<Value>) -> Result<Value> + Send + Sync>;

/// A `NativeFn` is a JEXL function implemented as a native Rust function.
#[derive(Clone)]
pub struct NativeFn {
  name: Option<Arc<str>>,
  fnc: NativeFnHandle,
  location: (&'static str, u32, u32),
}

impl NativeFn {
  /// Creates a new `NativeFn`.
  ///
  /// The preferred method to bind native functions is the `native_fn!()` macro.
  pub fn new(
    fnc: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Value>
      + Send
      + Sync
      + 'static,
    location: (&'static str, u32, u32),
  ) -> Self {
    Self {
      name: None,
      fnc: Arc::new(fnc),
      location,
    }
  }

  /// Creates a named `NativeFn` out of a plain host function; errors it
  /// returns are raised as host errors.
  #[track_caller]
  pub fn host(
    name: &str,
    fnc: impl Fn(Vec<Value>) -> std::result::Result<Value, HostError>
      + Send
      + Sync
      + 'static,
  ) -> Self {
    let caller = std::panic::Location::caller();
    let name: Arc<str> = name.into();
    let fn_name = name.clone();
    let mut native = NativeFn::new(
      move |interp, args| match fnc(args) {
        Ok(v) => Ok(v),
        Err(e) => Err(
          JexlError::new(
            interp,
            ErrorKind::Host(e.clone()),
            interp.call_site(),
            format!("{}(): {}", fn_name, e),
          )
          .into(),
        ),
      },
      (caller.file(), caller.line(), caller.column()),
    );
    native.rename(name);
    native
  }

  /// Returns this function's name.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Renames this function to the given name.
  pub fn rename(&mut self, name: Arc<str>) {
    self.name = Some(name);
  }

  /// Calls this function's handle.
  ///
  /// Note that this function does not do anything to the stack in `interp`;
  /// setting up a sane stack is the caller's responsibility.
  pub fn call(
    &self,
    interp: &mut Interpreter,
    args: Vec<Value>,
  ) -> Result<Value> {
    (self.fnc)(interp, args)
  }

  /// Returns a unique value identifying the contained function, which is
  /// used for equality and recursion detection.
  pub fn ptr_value(&self) -> usize {
    Arc::as_ptr(&self.fnc) as *const u8 as usize
  }
}

impl PartialEq for NativeFn {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_value() == other.ptr_value()
  }
}

impl Hash for NativeFn {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.ptr_value().hash(state)
  }
}

impl Debug for NativeFn {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("NativeFn")
      .field("name", &self.name)
      .field("location", &self.location)
      .finish()
  }
}

impl Display for NativeFn {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let (file, line, col) = self.location;
    match &self.name {
      Some(name) => write!(f, "{}() ({}:{}:{})", name, file, line, col),
      None => write!(f, "<native> ({}:{}:{})", file, line, col),
    }
  }
}
