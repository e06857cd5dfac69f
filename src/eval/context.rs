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

//! Evaluation contexts: the host-provided store of global variables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::eval::cancel::CancelFlag;
use crate::eval::options::Options;
use crate::eval::value::Value;

/// What the interpreter should do with an annotated statement.
#[derive(Clone, Debug)]
pub enum AnnotationAction {
  /// Run the statement.
  Proceed,
  /// Skip the statement, producing the given value instead.
  Skip(Value),
  /// The annotation is not recognized.
  Unknown,
}

/// A `Context` provides global variables, namespaces, and per-evaluation
/// settings to a running script.
///
/// Contexts are shared by reference with every evaluation using them, so
/// mutation goes through `&self`.
pub trait Context: Send + Sync {
  /// Looks up a variable; `None` means undefined, as opposed to null.
  fn get(&self, name: &str) -> Option<Value>;

  /// Defines or replaces a variable.
  fn set(&self, name: &str, value: Value);

  /// Returns whether a variable is defined.
  fn has(&self, name: &str) -> bool {
    self.get(name).is_some()
  }

  /// Resolves a function namespace, `ns` in `ns:f(..)`.
  fn resolve_namespace(&self, _name: &str) -> Option<Value> {
    None
  }

  /// Returns options overriding the engine's.
  fn options(&self) -> Option<Arc<Options>> {
    None
  }

  /// Returns a flag that cancels evaluations using this context.
  fn cancellation(&self) -> Option<CancelFlag> {
    None
  }

  /// Decides what to do with an annotation the interpreter does not handle
  /// itself.
  fn process_annotation(
    &self,
    _name: &str,
    _args: &[Value],
  ) -> AnnotationAction {
    AnnotationAction::Unknown
  }
}

/// A `MapContext` is a `Context` backed by hash maps.
#[derive(Default)]
pub struct MapContext {
  vars: RwLock<HashMap<Arc<str>, Value>>,
  namespaces: RwLock<HashMap<Arc<str>, Value>>,
  options: Option<Arc<Options>>,
  cancel: Option<CancelFlag>,
}

impl MapContext {
  /// Creates a new, empty context.
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes evaluations using this context run with `options`.
  pub fn with_options(mut self, options: Arc<Options>) -> Self {
    self.options = Some(options);
    self
  }

  /// Makes evaluations using this context observe `flag`.
  pub fn with_cancellation(mut self, flag: CancelFlag) -> Self {
    self.cancel = Some(flag);
    self
  }

  /// Defines a variable.
  pub fn define(&self, name: &str, value: impl Into<Value>) -> &Self {
    self.vars.write().insert(name.into(), value.into());
    self
  }

  /// Defines a function namespace.
  pub fn define_namespace(&self, name: &str, ns: Value) -> &Self {
    self.namespaces.write().insert(name.into(), ns);
    self
  }

  /// Removes a variable, returning its value.
  pub fn remove(&self, name: &str) -> Option<Value> {
    self.vars.write().remove(name)
  }

  /// Returns the names of the defined variables, sorted.
  pub fn names(&self) -> Vec<Arc<str>> {
    let mut names: Vec<_> = self.vars.read().keys().cloned().collect();
    names.sort();
    names
  }
}

impl Context for MapContext {
  fn get(&self, name: &str) -> Option<Value> {
    self.vars.read().get(name).cloned()
  }

  fn set(&self, name: &str, value: Value) {
    self.vars.write().insert(name.into(), value);
  }

  fn has(&self, name: &str) -> bool {
    self.vars.read().contains_key(name)
  }

  fn resolve_namespace(&self, name: &str) -> Option<Value> {
    self.namespaces.read().get(name).cloned()
  }

  fn options(&self) -> Option<Arc<Options>> {
    self.options.clone()
  }

  fn cancellation(&self) -> Option<CancelFlag> {
    self.cancel.clone()
  }
}

impl fmt::Debug for MapContext {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("MapContext")
      .field("vars", &self.names())
      .field("options", &self.options)
      .finish()
  }
}
