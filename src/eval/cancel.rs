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

//! Cooperative cancellation.
//!
//! Evaluation is never interrupted preemptively. Instead, the interpreter
//! polls a `CancelFlag` at statement, loop-iteration, and call boundaries,
//! and unwinds with an `Interrupt` once the flag is raised or a `@timeout`
//! deadline has passed.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// A thread-safe cancellation flag.
///
/// Clones share the same flag, so a flag handed to another thread can cancel
/// every invocation that observes it.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  /// Creates a new, lowered flag.
  pub fn new() -> Self {
    Self::default()
  }

  /// Raises the flag. Returns false if it was already raised.
  pub fn cancel(&self) -> bool {
    !self.0.swap(true, Ordering::SeqCst)
  }

  /// Returns whether the flag has been raised.
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  /// Lowers the flag, so that the invocations sharing it may run again.
  pub fn reset(&self) {
    self.0.store(false, Ordering::SeqCst)
  }

  /// Returns whether `self` and `other` are the same flag.
  pub fn ptr_eq(&self, other: &CancelFlag) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl fmt::Debug for CancelFlag {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_tuple("CancelFlag").field(&self.is_cancelled()).finish()
  }
}

/// Why evaluation is unwinding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interrupt {
  /// The cancellation flag was raised.
  Cancelled,
  /// The `@timeout` deadline at the given depth expired.
  Deadline(usize),
}

/// The polling state of a single interpreter.
#[derive(Clone, Debug)]
pub struct Poller {
  flag: CancelFlag,
  stop: Option<CancelFlag>,
  deadlines: Vec<Instant>,
  masked: usize,
}

impl Poller {
  /// Creates a poller watching `flag`.
  pub fn new(flag: CancelFlag) -> Self {
    Poller {
      flag,
      stop: None,
      deadlines: Vec::new(),
      masked: 0,
    }
  }

  /// Returns the watched flag.
  pub fn flag(&self) -> &CancelFlag {
    &self.flag
  }

  /// Checks whether evaluation must stop. Outer deadlines take precedence
  /// over inner ones.
  pub fn poll(&self) -> Option<Interrupt> {
    if self.masked > 0 {
      return None;
    }
    let stopped = self.stop.as_ref().map_or(false, CancelFlag::is_cancelled);
    if stopped || self.flag.is_cancelled() {
      return Some(Interrupt::Cancelled);
    }
    if self.deadlines.is_empty() {
      return None;
    }
    let now = Instant::now();
    self
      .deadlines
      .iter()
      .position(|d| now >= *d)
      .map(Interrupt::Deadline)
  }

  /// Pushes a deadline, returning its depth.
  pub fn push_deadline(&mut self, deadline: Instant) -> usize {
    self.deadlines.push(deadline);
    self.deadlines.len() - 1
  }

  /// Pops the innermost deadline.
  pub fn pop_deadline(&mut self) {
    self.deadlines.pop();
  }

  /// Suspends polling, e.g. while a `finally` block runs; calls nest.
  pub fn mask(&mut self) {
    self.masked += 1;
  }

  /// Undoes one call to `mask()`.
  pub fn unmask(&mut self) {
    self.masked = self.masked.saturating_sub(1);
  }

  /// Copies this poller for an evaluation running on another thread; the
  /// copy watches the same flag and deadlines, but is not masked. Raising
  /// `stop` cancels the copy alone.
  pub fn fork(&self, stop: CancelFlag) -> Self {
    Poller {
      flag: self.flag.clone(),
      stop: Some(stop),
      deadlines: self.deadlines.clone(),
      masked: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn flag_is_shared_by_clones() {
    let flag = CancelFlag::new();
    let other = flag.clone();
    assert!(other.cancel());
    assert!(!flag.cancel());
    assert!(flag.is_cancelled());
    flag.reset();
    assert!(!other.is_cancelled());
  }

  #[test]
  fn masking_suppresses_polls() {
    let flag = CancelFlag::new();
    let mut poller = Poller::new(flag.clone());
    flag.cancel();
    poller.mask();
    assert_eq!(poller.poll(), None);
    poller.unmask();
    assert_eq!(poller.poll(), Some(Interrupt::Cancelled));
  }

  #[test]
  fn stopping_a_fork_leaves_the_parent_running() {
    let parent = Poller::new(CancelFlag::new());
    let stop = CancelFlag::new();
    let child = parent.fork(stop.clone());
    assert_eq!(child.poll(), None);
    stop.cancel();
    assert_eq!(child.poll(), Some(Interrupt::Cancelled));
    assert_eq!(parent.poll(), None);
  }

  #[test]
  fn outermost_deadline_wins() {
    let mut poller = Poller::new(CancelFlag::new());
    let past = Instant::now() - Duration::from_millis(5);
    assert_eq!(poller.push_deadline(past), 0);
    assert_eq!(poller.push_deadline(past), 1);
    assert_eq!(poller.poll(), Some(Interrupt::Deadline(0)));
    poller.pop_deadline();
    poller.pop_deadline();
    assert_eq!(poller.poll(), None);
  }
}
