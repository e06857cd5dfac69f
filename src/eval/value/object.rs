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

//! JEXL maps.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;

use crate::eval::value::Value;

/// A `Map` is a mutable, insertion-ordered map from values to values,
/// wrapped up in an `Arc` pointer. Clones alias the same storage.
#[derive(Clone, Default)]
pub struct Map(Arc<RwLock<IndexMap<Value, Value>>>);

impl Map {
  /// Creates a new, empty `Map`.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.0.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  /// Looks up `key`.
  pub fn get(&self, key: &Value) -> Option<Value> {
    self.0.read().get(key).cloned()
  }

  /// Looks up a string key.
  pub fn get_str(&self, key: &str) -> Option<Value> {
    self.get(&Value::String(key.into()))
  }

  pub fn contains_key(&self, key: &Value) -> bool {
    self.0.read().contains_key(key)
  }

  /// Defines `key`, returning the previous value.
  pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
    self.0.write().insert(key, value)
  }

  /// Removes `key`, keeping the order of the remaining entries.
  pub fn remove(&self, key: &Value) -> Option<Value> {
    self.0.write().shift_remove(key)
  }

  /// Copies out the keys, in insertion order.
  pub fn keys(&self) -> Vec<Value> {
    self.0.read().keys().cloned().collect()
  }

  /// Copies out the values, in insertion order.
  pub fn values(&self) -> Vec<Value> {
    self.0.read().values().cloned().collect()
  }

  /// Copies out the entries, in insertion order.
  pub fn entries(&self) -> Vec<(Value, Value)> {
    self
      .0
      .read()
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }

  pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<Value, Value>> {
    self.0.read()
  }

  pub fn ptr_eq(&self, other: &Map) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Converts this map into a unique integer, for cycle detection.
  pub fn ptr_value(&self) -> usize {
    Arc::as_ptr(&self.0) as *const u8 as usize
  }
}

impl PartialEq for Map {
  fn eq(&self, other: &Self) -> bool {
    if self.ptr_eq(other) {
      return true;
    }
    let (a, b) = (self.read(), other.read());
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
  }
}

impl Hash for Map {
  fn hash<H: Hasher>(&self, state: &mut H) {
    // Keys only, and order-independent; values may be mutated in place.
    let map = self.read();
    let mut acc = 0u64;
    for k in map.keys() {
      let mut h = std::collections::hash_map::DefaultHasher::new();
      k.hash(&mut h);
      acc = acc.wrapping_add(h.finish());
    }
    state.write_usize(map.len());
    state.write_u64(acc);
  }
}

impl fmt::Debug for Map {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_map().entries(self.read().iter()).finish()
  }
}

impl FromIterator<(Value, Value)> for Map {
  fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
    Map(Arc::new(RwLock::new(iter.into_iter().collect())))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_are_numerically_normalized() {
    let m = Map::new();
    m.insert(Value::Int(1), Value::String("one".into()));
    assert_eq!(m.get(&Value::Long(1)), Some(Value::String("one".into())));
    assert_eq!(m.insert(Value::Double(1.0), Value::Null).is_some(), true);
    assert_eq!(m.len(), 1);
  }

  #[test]
  fn removal_keeps_order() {
    let m: Map = (0..4).map(|i| (Value::Int(i), Value::Int(i * i))).collect();
    m.remove(&Value::Int(1));
    assert_eq!(m.keys(), vec![Value::Int(0), Value::Int(2), Value::Int(3)]);
  }
}
