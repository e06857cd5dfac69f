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

//! Call frames.
//!
//! A frame is a flat array of cells, one per slot of a lambda's scope. A
//! cell is shared storage: a closure captures the cells of its enclosing
//! frame rather than their values, so writes through either side are seen by
//! both. Executing a declaration installs a fresh cell, which is what gives
//! each loop iteration its own binding.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::eval::value::Value;
use crate::syn::scope::SymbolKind;
use crate::syn::Scope;

/// The contents of a single variable.
#[derive(Clone, Debug)]
pub enum Slot {
  /// Declared in the scope, but not yet reached by evaluation.
  Unset,
  /// Declared without initializer.
  Undefined,
  /// Holding a value.
  Value(Value),
}

impl Slot {
  /// Returns the held value; an undefined variable reads as null.
  pub fn value(&self) -> Option<Value> {
    match self {
      Slot::Unset => None,
      Slot::Undefined => Some(Value::Null),
      Slot::Value(v) => Some(v.clone()),
    }
  }

  /// Returns the held value, or null.
  pub fn value_or_null(&self) -> Value {
    self.value().unwrap_or(Value::Null)
  }
}

/// Shared storage for a single variable.
pub type Cell = Arc<Mutex<Slot>>;

/// Creates a new cell holding `slot`.
pub fn cell(slot: Slot) -> Cell {
  Arc::new(Mutex::new(slot))
}

/// A `Frame` holds the variables of a single lambda invocation.
#[derive(Clone, Debug, Default)]
pub struct Frame {
  cells: Vec<Cell>,
}

impl Frame {
  /// Lays out a frame for `scope`. Captured slots alias `captured`, which
  /// must list one cell per captured slot in slot order; every other slot
  /// starts out unset.
  pub fn new(scope: &Scope, captured: &[Cell]) -> Self {
    let mut captured = captured.iter();
    let cells = scope
      .symbols()
      .iter()
      .map(|sym| match sym.kind {
        SymbolKind::Captured { .. } => captured
          .next()
          .cloned()
          .unwrap_or_else(|| cell(Slot::Unset)),
        _ => cell(Slot::Unset),
      })
      .collect();
    Frame { cells }
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// Reads `slot`.
  pub fn get(&self, slot: usize) -> Slot {
    match self.cells.get(slot) {
      Some(c) => c.lock().clone(),
      None => Slot::Unset,
    }
  }

  /// Writes `slot` in place, so that captures see the write.
  pub fn set(&self, slot: usize, value: Value) {
    if let Some(c) = self.cells.get(slot) {
      *c.lock() = Slot::Value(value);
    }
  }

  /// Installs a fresh cell for `slot`, detaching it from any closure that
  /// captured the previous one.
  pub fn declare(&mut self, slot: usize, contents: Slot) {
    if let Some(c) = self.cells.get_mut(slot) {
      *c = cell(contents);
    }
  }

  /// Returns the cell backing `slot`, for capture.
  pub fn cell(&self, slot: usize) -> Cell {
    self
      .cells
      .get(slot)
      .cloned()
      .unwrap_or_else(|| cell(Slot::Unset))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame(n: usize) -> Frame {
    Frame {
      cells: (0..n).map(|_| cell(Slot::Unset)).collect(),
    }
  }

  #[test]
  fn captured_cells_share_writes() {
    let mut outer = frame(2);
    outer.declare(0, Slot::Value(Value::Int(1)));
    let captured = outer.cell(0);
    outer.set(0, Value::Int(2));
    assert_eq!(captured.lock().value(), Some(Value::Int(2)));

    // A fresh declaration detaches the old cell.
    outer.declare(0, Slot::Undefined);
    assert_eq!(captured.lock().value(), Some(Value::Int(2)));
    assert_eq!(outer.get(0).value(), Some(Value::Null));
  }

  #[test]
  fn unset_slots_have_no_value() {
    let f = frame(1);
    assert!(f.get(0).value().is_none());
    assert!(f.get(7).value().is_none());
  }
}
