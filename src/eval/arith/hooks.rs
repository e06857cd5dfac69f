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

//! Operator overloading.
//!
//! Every hook defaults to `Overload::NotApplicable`, which makes the
//! interpreter fall back to the default arithmetic and data model.

use std::cmp::Ordering;

use crate::eval::value::Value;
use crate::syn::BinaryOp;
use crate::syn::UnaryOp;

/// The outcome of an operator hook.
#[derive(Clone, Debug)]
pub enum Overload<T = Value> {
  /// The hook produced a result.
  Handled(T),
  /// The hook does not apply to these operands.
  NotApplicable,
  /// The hook applies, but failed; this is raised as a `TryFailed` error.
  Failed(String),
}

/// The result of a self-assignment hook, for `x += y` and friends.
#[derive(Clone, Debug)]
pub enum SelfAssign {
  /// The left-hand side was updated in place; nothing is stored.
  InPlace,
  /// The new value to store in the left-hand side.
  Value(Value),
}

/// An iterator handed out by a `for_each` hook.
pub type ValueIter = Box<dyn Iterator<Item = Value> + Send>;

/// Host overrides for operators, property access, and iteration.
pub trait Operators: Send + Sync {
  fn binary(&self, _op: BinaryOp, _lhs: &Value, _rhs: &Value) -> Overload {
    Overload::NotApplicable
  }

  fn unary(&self, _op: UnaryOp, _arg: &Value) -> Overload {
    Overload::NotApplicable
  }

  /// Compound assignment, `lhs op= rhs`.
  fn self_assign(
    &self,
    _op: BinaryOp,
    _lhs: &Value,
    _rhs: &Value,
  ) -> Overload<SelfAssign> {
    Overload::NotApplicable
  }

  fn property_get(&self, _obj: &Value, _name: &str) -> Overload {
    Overload::NotApplicable
  }

  fn property_set(
    &self,
    _obj: &Value,
    _name: &str,
    _value: &Value,
  ) -> Overload<()> {
    Overload::NotApplicable
  }

  fn property_delete(&self, _obj: &Value, _name: &str) -> Overload<()> {
    Overload::NotApplicable
  }

  fn array_get(&self, _obj: &Value, _index: &Value) -> Overload {
    Overload::NotApplicable
  }

  fn array_set(
    &self,
    _obj: &Value,
    _index: &Value,
    _value: &Value,
  ) -> Overload<()> {
    Overload::NotApplicable
  }

  fn array_delete(&self, _obj: &Value, _index: &Value) -> Overload<()> {
    Overload::NotApplicable
  }

  /// Iteration, for `for (x : obj)`.
  fn for_each(&self, _obj: &Value) -> Overload<ValueIter> {
    Overload::NotApplicable
  }

  fn size(&self, _obj: &Value) -> Overload<usize> {
    Overload::NotApplicable
  }

  fn empty(&self, _obj: &Value) -> Overload<bool> {
    Overload::NotApplicable
  }

  /// `=~`: whether `container` contains `item`.
  fn contains(&self, _container: &Value, _item: &Value) -> Overload<bool> {
    Overload::NotApplicable
  }

  /// `=^`: whether `value` starts with `prefix`.
  fn starts_with(&self, _value: &Value, _prefix: &Value) -> Overload<bool> {
    Overload::NotApplicable
  }

  /// `=$`: whether `value` ends with `suffix`.
  fn ends_with(&self, _value: &Value, _suffix: &Value) -> Overload<bool> {
    Overload::NotApplicable
  }

  /// Ordering, for `<`, `<=`, `>`, and `>=`.
  fn compare(&self, _lhs: &Value, _rhs: &Value) -> Overload<Ordering> {
    Overload::NotApplicable
  }
}

/// The empty set of overrides.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOperators;

impl Operators for NoOperators {}
