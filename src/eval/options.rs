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

//! Evaluation options.
//!
//! Every field is atomic: an `Options` marked as a shared instance is handed
//! to running evaluations as is, so toggling a flag from one thread is seen
//! by every evaluation using it. A non-shared instance is snapshotted at the
//! start of each evaluation instead.

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use bigdecimal::RoundingMode;

bitflags::bitflags! {
  /// Boolean evaluation options.
  #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
  pub struct Flags: u32 {
    /// Undefined variables, properties and methods are errors.
    const STRICT = 1 << 0;
    /// Lenient-mode degradations are not logged.
    const SILENT = 1 << 1;
    /// Navigating through null or undefined values yields null.
    const SAFE = 1 << 2;
    /// Declarations are block-scoped.
    const LEXICAL = 1 << 3;
    /// A block-scoped local hides same-named globals after its block ends.
    const LEXICAL_SHADE = 1 << 4;
    /// A cancelled evaluation raises an error rather than returning null.
    const CANCELLABLE = 1 << 5;
    /// Unresolved dotted names are looked up as flat context keys.
    const ANTISH = 1 << 6;
    /// Null operands to arithmetic are errors rather than zero.
    const STRICT_ARITHMETIC = 1 << 7;
    /// The options are used as is, not snapshotted, by evaluations.
    const SHARED_INSTANCE = 1 << 8;
  }
}

impl Default for Flags {
  fn default() -> Self {
    Flags::SAFE | Flags::CANCELLABLE | Flags::ANTISH
  }
}

/// Evaluation options; see the module documentation.
pub struct Options {
  flags: AtomicU32,
  stack_overflow: AtomicUsize,
  math_scale: AtomicI64,
  math_rounding: AtomicU8,
}

const ROUNDINGS: [RoundingMode; 7] = [
  RoundingMode::Up,
  RoundingMode::Down,
  RoundingMode::Ceiling,
  RoundingMode::Floor,
  RoundingMode::HalfUp,
  RoundingMode::HalfDown,
  RoundingMode::HalfEven,
];

macro_rules! flag_accessors {
  ($($get:ident, $set:ident => $flag:ident;)*) => {$(
    #[doc = concat!("Returns the `", stringify!($flag), "` flag.")]
    pub fn $get(&self) -> bool {
      self.flags().contains(Flags::$flag)
    }

    #[doc = concat!("Sets the `", stringify!($flag), "` flag.")]
    pub fn $set(&self, on: bool) -> &Self {
      self.set_flag(Flags::$flag, on)
    }
  )*}
}

impl Options {
  /// Creates a new set of options with default values.
  pub fn new() -> Self {
    Options {
      flags: AtomicU32::new(Flags::default().bits()),
      stack_overflow: AtomicUsize::new(usize::MAX),
      math_scale: AtomicI64::new(-1),
      math_rounding: AtomicU8::new(6),
    }
  }

  /// Deep-copies these options into an isolated instance.
  pub fn snapshot(&self) -> Self {
    Options {
      flags: AtomicU32::new(self.flags.load(Ordering::SeqCst)),
      stack_overflow: AtomicUsize::new(self.stack_overflow()),
      math_scale: AtomicI64::new(self.math_scale.load(Ordering::SeqCst)),
      math_rounding: AtomicU8::new(self.math_rounding.load(Ordering::SeqCst)),
    }
  }

  /// Returns all boolean flags at once.
  pub fn flags(&self) -> Flags {
    Flags::from_bits_truncate(self.flags.load(Ordering::SeqCst))
  }

  /// Sets or clears `flag`.
  pub fn set_flag(&self, flag: Flags, on: bool) -> &Self {
    if on {
      self.flags.fetch_or(flag.bits(), Ordering::SeqCst);
    } else {
      self.flags.fetch_and(!flag.bits(), Ordering::SeqCst);
    }
    self
  }

  flag_accessors! {
    strict, set_strict => STRICT;
    silent, set_silent => SILENT;
    safe, set_safe => SAFE;
    lexical, set_lexical => LEXICAL;
    lexical_shade, set_lexical_shade => LEXICAL_SHADE;
    cancellable, set_cancellable => CANCELLABLE;
    antish, set_antish => ANTISH;
    strict_arithmetic, set_strict_arithmetic => STRICT_ARITHMETIC;
    shared_instance, set_shared_instance => SHARED_INSTANCE;
  }

  /// Returns the guarded call-depth limit.
  pub fn stack_overflow(&self) -> usize {
    self.stack_overflow.load(Ordering::SeqCst)
  }

  /// Sets the guarded call-depth limit.
  pub fn set_stack_overflow(&self, limit: usize) -> &Self {
    self.stack_overflow.store(limit, Ordering::SeqCst);
    self
  }

  /// Returns the scale big decimal division rounds to, if any.
  pub fn math_scale(&self) -> Option<i64> {
    match self.math_scale.load(Ordering::SeqCst) {
      s if s < 0 => None,
      s => Some(s),
    }
  }

  /// Sets the scale big decimal division rounds to; `None` keeps the full
  /// precision of the division.
  pub fn set_math_scale(&self, scale: Option<i64>) -> &Self {
    let raw = scale.map(|s| s.max(0)).unwrap_or(-1);
    self.math_scale.store(raw, Ordering::SeqCst);
    self
  }

  /// Returns the rounding mode used with `math_scale`.
  pub fn math_rounding(&self) -> RoundingMode {
    let idx = self.math_rounding.load(Ordering::SeqCst) as usize;
    ROUNDINGS.get(idx).copied().unwrap_or(RoundingMode::HalfEven)
  }

  /// Sets the rounding mode used with `math_scale`.
  pub fn set_math_rounding(&self, mode: RoundingMode) -> &Self {
    let idx = ROUNDINGS.iter().position(|m| *m == mode).unwrap_or(6);
    self.math_rounding.store(idx as u8, Ordering::SeqCst);
    self
  }
}

impl Default for Options {
  fn default() -> Self {
    Options::new()
  }
}

impl Clone for Options {
  fn clone(&self) -> Self {
    self.snapshot()
  }
}

impl fmt::Debug for Options {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Options")
      .field("flags", &self.flags())
      .field("stack_overflow", &self.stack_overflow())
      .field("math_scale", &self.math_scale())
      .field("math_rounding", &self.math_rounding())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_is_isolated() {
    let shared = Options::new();
    shared.set_strict(true).set_stack_overflow(64);
    let copy = shared.snapshot();
    shared.set_strict(false);
    assert!(copy.strict());
    assert!(!shared.strict());
    assert_eq!(copy.stack_overflow(), 64);
  }

  #[test]
  fn defaults() {
    let opts = Options::new();
    assert!(opts.safe());
    assert!(opts.cancellable());
    assert!(opts.antish());
    assert!(!opts.strict());
    assert!(!opts.lexical());
    assert_eq!(opts.math_scale(), None);
    assert_eq!(opts.math_rounding(), RoundingMode::HalfEven);
  }

  #[test]
  fn math_context() {
    let opts = Options::new();
    opts.set_math_scale(Some(2)).set_math_rounding(RoundingMode::Down);
    assert_eq!(opts.math_scale(), Some(2));
    assert_eq!(opts.math_rounding(), RoundingMode::Down);
  }
}
