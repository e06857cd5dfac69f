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

//! JEXL sequence values: arrays, sets and integer ranges.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockWriteGuard;

use crate::eval::value::Value;

/// An `Array` is a mutable, reference-counted vector of values. Clones alias
/// the same storage.
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Array {
  /// Creates a new `Array` holding `values`.
  pub fn new(values: Vec<Value>) -> Self {
    Array(Arc::new(RwLock::new(values)))
  }

  pub fn len(&self) -> usize {
    self.0.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  /// Returns the element at `idx`, if it exists.
  pub fn get(&self, idx: usize) -> Option<Value> {
    self.0.read().get(idx).cloned()
  }

  /// Replaces the element at `idx`; returns false if it is out of bounds.
  pub fn set(&self, idx: usize, value: Value) -> bool {
    match self.0.write().get_mut(idx) {
      Some(slot) => {
        *slot = value;
        true
      }
      None => false,
    }
  }

  pub fn push(&self, value: Value) {
    self.0.write().push(value)
  }

  /// Removes the element at `idx`, if it exists.
  pub fn remove(&self, idx: usize) -> Option<Value> {
    let mut vec = self.0.write();
    if idx < vec.len() {
      Some(vec.remove(idx))
    } else {
      None
    }
  }

  /// Copies out the current elements.
  pub fn snapshot(&self) -> Vec<Value> {
    self.0.read().clone()
  }

  pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
    self.0.write()
  }

  /// Returns whether `self` and `other` share storage.
  pub fn ptr_eq(&self, other: &Array) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Converts this array into a unique integer, for cycle detection.
  pub fn ptr_value(&self) -> usize {
    Arc::as_ptr(&self.0) as *const u8 as usize
  }
}

impl PartialEq for Array {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other) || *self.read() == *other.read()
  }
}

impl Hash for Array {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.read().hash(state)
  }
}

impl fmt::Debug for Array {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_list().entries(self.read().iter()).finish()
  }
}

impl From<Vec<Value>> for Array {
  fn from(values: Vec<Value>) -> Self {
    Array::new(values)
  }
}

/// A `Set` is a mutable, insertion-ordered set of values.
#[derive(Clone, Default)]
pub struct Set(Arc<RwLock<IndexSet<Value>>>);

impl Set {
  /// Creates a new `Set` out of `values`, dropping duplicates.
  pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
    Set(Arc::new(RwLock::new(values.into_iter().collect())))
  }

  pub fn len(&self) -> usize {
    self.0.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  pub fn contains(&self, value: &Value) -> bool {
    self.0.read().contains(value)
  }

  /// Inserts `value`; returns false if it was already present.
  pub fn insert(&self, value: Value) -> bool {
    self.0.write().insert(value)
  }

  /// Removes `value`; returns false if it was absent.
  pub fn remove(&self, value: &Value) -> bool {
    self.0.write().shift_remove(value)
  }

  /// Copies out the current members, in insertion order.
  pub fn snapshot(&self) -> Vec<Value> {
    self.0.read().iter().cloned().collect()
  }

  pub fn read(&self) -> RwLockReadGuard<'_, IndexSet<Value>> {
    self.0.read()
  }

  pub fn ptr_eq(&self, other: &Set) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Converts this set into a unique integer, for cycle detection.
  pub fn ptr_value(&self) -> usize {
    Arc::as_ptr(&self.0) as *const u8 as usize
  }
}

impl PartialEq for Set {
  fn eq(&self, other: &Self) -> bool {
    if self.ptr_eq(other) {
      return true;
    }
    let (a, b) = (self.read(), other.read());
    a.len() == b.len() && a.iter().all(|v| b.contains(v))
  }
}

impl Hash for Set {
  fn hash<H: Hasher>(&self, state: &mut H) {
    // Order-independent, to agree with equality.
    let set = self.read();
    let mut acc = 0u64;
    for v in set.iter() {
      let mut h = std::collections::hash_map::DefaultHasher::new();
      v.hash(&mut h);
      acc = acc.wrapping_add(h.finish());
    }
    state.write_usize(set.len());
    state.write_u64(acc);
  }
}

impl fmt::Debug for Set {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_set().entries(self.read().iter()).finish()
  }
}

/// A `Range` is an inclusive, lazily-enumerated range of integers. A range
/// whose start exceeds its end counts down.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Range {
  start: i64,
  end: i64,
}

impl Range {
  pub fn new(start: i64, end: i64) -> Self {
    Range { start, end }
  }

  pub fn start(&self) -> i64 {
    self.start
  }

  pub fn end(&self) -> i64 {
    self.end
  }

  pub fn is_ascending(&self) -> bool {
    self.start <= self.end
  }

  /// Returns the number of integers in this range; a range is never empty.
  /// The full `i64` range saturates.
  pub fn len(&self) -> u64 {
    let span = (self.end as i128 - self.start as i128).unsigned_abs() as u64;
    span.saturating_add(1)
  }

  /// Returns the `idx`th integer of this range, if it exists.
  pub fn get(&self, idx: u64) -> Option<i64> {
    if idx >= self.len() {
      return None;
    }
    let off = idx as i128;
    let v = if self.is_ascending() {
      self.start as i128 + off
    } else {
      self.start as i128 - off
    };
    Some(v as i64)
  }

  /// Returns whether `n` lies between the bounds of this range.
  pub fn contains(&self, n: i64) -> bool {
    let (lo, hi) = if self.is_ascending() {
      (self.start, self.end)
    } else {
      (self.end, self.start)
    };
    lo <= n && n <= hi
  }

  pub fn iter(&self) -> RangeIter {
    RangeIter {
      range: *self,
      next: 0,
    }
  }
}

/// An iterator over a `Range`.
#[derive(Clone, Debug)]
pub struct RangeIter {
  range: Range,
  next: u64,
}

impl Iterator for RangeIter {
  type Item = i64;

  fn next(&mut self) -> Option<i64> {
    let v = self.range.get(self.next)?;
    self.next += 1;
    Some(v)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_cardinality() {
    assert_eq!(Range::new(1, 3).len(), 3);
    assert_eq!(Range::new(3, 1).len(), 3);
    assert_eq!(Range::new(-3, 3).len(), 7);
    assert_eq!(Range::new(5, 5).len(), 1);
    assert_eq!(Range::new(3, 1).iter().collect::<Vec<_>>(), vec![3, 2, 1]);
    assert_eq!(Range::new(i64::MIN, i64::MAX).len(), u64::MAX);
  }

  #[test]
  fn array_clones_alias() {
    let a = Array::new(vec![Value::Int(1)]);
    let b = a.clone();
    b.push(Value::Int(2));
    assert_eq!(a.len(), 2);
    assert!(a.set(0, Value::Int(5)));
    assert!(!a.set(9, Value::Int(5)));
    assert_eq!(b.get(0), Some(Value::Int(5)));
  }

  #[test]
  fn set_equality_ignores_order() {
    let a = Set::new(vec![Value::Int(1), Value::Int(2)]);
    let b = Set::new(vec![Value::Int(2), Value::Long(1)]);
    assert_eq!(a, b);
    assert!(!a.insert(Value::Double(1.0)));
  }
}
