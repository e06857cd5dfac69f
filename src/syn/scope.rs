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

//! Scope descriptors, and the builder that assigns frame slots to names while
//! a tree is being parsed.
//!
//! Every lambda (the top-level script included) owns a flat array of slots.
//! Parameters come first, in order; locals and captured variables follow in
//! order of first appearance. A captured slot is aliased at closure creation
//! time to a slot of the enclosing lambda's frame.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::syn::Symbol;

/// What a frame slot holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
  /// A lambda parameter.
  Param,
  /// A variable declared in the lambda body.
  Local,
  /// A variable declared by an enclosing lambda, living at `parent_slot` in
  /// the enclosing frame.
  Captured {
    /// The slot in the enclosing frame.
    parent_slot: usize,
  },
}

/// Information about a single frame slot.
#[derive(Clone, Debug)]
pub struct SymbolInfo {
  /// The declared name.
  pub name: Arc<str>,
  /// The kind of slot.
  pub kind: SymbolKind,
  /// Whether the slot was declared `const`.
  pub constant: bool,
}

/// A `Scope` describes the frame layout of a lambda.
#[derive(Clone, Debug, Default)]
pub struct Scope {
  symbols: Vec<SymbolInfo>,
  params: usize,
}

impl Scope {
  /// Returns the number of slots a frame for this scope needs.
  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  /// Returns whether this scope declares no slots at all.
  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  /// Returns the number of parameters.
  pub fn param_count(&self) -> usize {
    self.params
  }

  /// Returns information about `slot`.
  pub fn symbol(&self, slot: usize) -> Option<&SymbolInfo> {
    self.symbols.get(slot)
  }

  /// Returns every slot, in order.
  pub fn symbols(&self) -> &[SymbolInfo] {
    &self.symbols
  }

  /// Returns the parameter names, in order.
  pub fn params(&self) -> impl Iterator<Item = &Arc<str>> + '_ {
    self.symbols[..self.params].iter().map(|s| &s.name)
  }

  /// Returns the names of the lambda's own variables: parameters and body
  /// locals, but not captured variables.
  pub fn locals(&self) -> impl Iterator<Item = &Arc<str>> + '_ {
    let mut seen = HashSet::new();
    self
      .symbols
      .iter()
      .filter(|s| !matches!(s.kind, SymbolKind::Captured { .. }))
      .map(|s| &s.name)
      .filter(move |n| seen.insert(Arc::clone(n)))
  }

  /// Returns the captured slots, as `(slot, parent_slot, name)` triples.
  pub fn captures(
    &self,
  ) -> impl Iterator<Item = (usize, usize, &Arc<str>)> + '_ {
    self
      .symbols
      .iter()
      .enumerate()
      .filter_map(|(i, s)| match s.kind {
        SymbolKind::Captured { parent_slot } => Some((i, parent_slot, &s.name)),
        _ => None,
      })
  }
}

/// A bit-set tracking which slots a single block declares, and which of
/// those are constant.
#[derive(Clone, Debug, Default)]
pub struct LexicalUnit {
  declared: Vec<u64>,
  constant: Vec<u64>,
  count: usize,
}

impl LexicalUnit {
  fn test(bits: &[u64], slot: usize) -> bool {
    bits
      .get(slot / 64)
      .map(|w| w & (1 << (slot % 64)) != 0)
      .unwrap_or(false)
  }

  fn set(bits: &mut Vec<u64>, slot: usize) {
    if bits.len() <= slot / 64 {
      bits.resize(slot / 64 + 1, 0);
    }
    bits[slot / 64] |= 1 << (slot % 64);
  }

  /// Declares `slot`; returns false if it was already declared here.
  pub fn add_symbol(&mut self, slot: usize) -> bool {
    if Self::test(&self.declared, slot) {
      return false;
    }
    Self::set(&mut self.declared, slot);
    self.count += 1;
    true
  }

  /// Declares `slot` as a constant; returns false if it was already declared
  /// here, as a constant or otherwise.
  pub fn add_constant(&mut self, slot: usize) -> bool {
    if !self.add_symbol(slot) {
      return false;
    }
    Self::set(&mut self.constant, slot);
    true
  }

  /// Returns whether `slot` is declared in this unit.
  pub fn has_symbol(&self, slot: usize) -> bool {
    Self::test(&self.declared, slot)
  }

  /// Returns whether `slot` is declared as a constant in this unit.
  pub fn is_constant(&self, slot: usize) -> bool {
    Self::test(&self.constant, slot)
  }

  /// Returns the number of declared slots.
  pub fn len(&self) -> usize {
    self.count
  }

  /// Returns whether nothing is declared.
  pub fn is_empty(&self) -> bool {
    self.count == 0
  }
}

/// The kind of a declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
  /// `var`: block-scoped only in lexical mode.
  Var,
  /// `let`: always block-scoped.
  Let,
  /// `const`: always block-scoped, and never assignable.
  Const,
}

/// A resolved declaration.
#[derive(Copy, Clone, Debug)]
pub struct Decl {
  /// The slot the declaration binds.
  pub slot: usize,
  /// The slot whose current value the fresh variable starts with, if any.
  pub inherit: Option<usize>,
}

/// Why a declaration was rejected.
#[derive(Clone, Debug)]
pub enum DeclError {
  /// The name is already declared in an open block.
  Redeclared(Arc<str>),
}

#[derive(Default)]
struct BlockScope {
  names: HashMap<Arc<str>, usize>,
  unit: LexicalUnit,
  lexical: Vec<Arc<str>>,
}

#[derive(Default)]
struct FnScope {
  symbols: Vec<SymbolInfo>,
  params: usize,
  blocks: Vec<BlockScope>,
  captures: HashMap<Arc<str>, usize>,
  shaded: HashSet<Arc<str>>,
}

impl FnScope {
  fn lookup(&self, name: &str) -> Option<usize> {
    self
      .blocks
      .iter()
      .rev()
      .find_map(|b| b.names.get(name).copied())
      .or_else(|| self.captures.get(name).copied())
  }

  fn alloc(
    &mut self,
    name: Arc<str>,
    kind: SymbolKind,
    constant: bool,
  ) -> usize {
    self.symbols.push(SymbolInfo {
      name,
      kind,
      constant,
    });
    self.symbols.len() - 1
  }
}

/// Builds scope descriptors for a tree of nested lambdas.
pub(crate) struct ScopeBuilder {
  fns: Vec<FnScope>,
  lexical: bool,
}

impl ScopeBuilder {
  /// Creates a builder; `lexical` makes `var` block-scoped.
  pub fn new(lexical: bool) -> Self {
    Self {
      fns: Vec::new(),
      lexical,
    }
  }

  fn top(&mut self) -> &mut FnScope {
    self.fns.last_mut().expect("no open lambda scope")
  }

  /// Opens the scope of a new lambda, with its parameter block open.
  pub fn push_fn(&mut self) {
    let mut scope = FnScope::default();
    scope.blocks.push(BlockScope::default());
    self.fns.push(scope);
  }

  /// Closes the innermost lambda scope, producing its descriptor.
  pub fn pop_fn(&mut self) -> Arc<Scope> {
    let scope = self.fns.pop().expect("no open lambda scope");
    Arc::new(Scope {
      symbols: scope.symbols,
      params: scope.params,
    })
  }

  /// Opens a nested block.
  pub fn push_block(&mut self) {
    self.top().blocks.push(BlockScope::default());
  }

  /// Closes the innermost block. Names it declared lexically become shaded.
  pub fn pop_block(&mut self) {
    let top = self.top();
    if let Some(block) = top.blocks.pop() {
      debug_assert_eq!(block.unit.len(), block.names.len());
      top.shaded.extend(block.lexical);
    }
  }

  /// Declares a parameter of the innermost lambda.
  pub fn declare_param(
    &mut self,
    name: Arc<str>,
    constant: bool,
  ) -> Result<usize, DeclError> {
    let top = self.top();
    if top.blocks[0].names.contains_key(&name) {
      return Err(DeclError::Redeclared(name));
    }
    let slot = top.alloc(name.clone(), SymbolKind::Param, constant);
    top.params += 1;
    let block = &mut top.blocks[0];
    if constant {
      block.unit.add_constant(slot);
    } else {
      block.unit.add_symbol(slot);
    }
    block.names.insert(name, slot);
    Ok(slot)
  }

  /// Declares a variable in the innermost block.
  ///
  /// The declaration is registered before its initializer is parsed, so a
  /// lambda initializer may refer to itself. A declaration without
  /// initializer that shadows a captured variable starts out with the
  /// captured value.
  pub fn declare(
    &mut self,
    name: Arc<str>,
    kind: DeclKind,
    has_init: bool,
  ) -> Result<Decl, DeclError> {
    let lexical = self.lexical || kind != DeclKind::Var;
    let constant = kind == DeclKind::Const;
    let depth = self.fns.len();

    let existing = self
      .top()
      .blocks
      .iter()
      .rev()
      .find_map(|b| b.names.get(&name).copied());
    let captured = match existing {
      None if !has_init && depth > 1 => self.resolve_at(depth - 1, &name),
      _ => None,
    };
    let top = self.top();

    if let Some(slot) = existing {
      if lexical {
        return Err(DeclError::Redeclared(name));
      }
      if top.symbols[slot].constant {
        return Err(DeclError::Redeclared(name));
      }
      // A plain `var` redeclaration is the same variable.
      return Ok(Decl {
        slot,
        inherit: Some(slot),
      });
    }

    let slot = top.alloc(name.clone(), SymbolKind::Local, constant);
    let block = if lexical {
      top.blocks.last_mut().expect("no open block")
    } else {
      &mut top.blocks[0]
    };
    if constant {
      block.unit.add_constant(slot);
    } else {
      block.unit.add_symbol(slot);
    }
    block.names.insert(name.clone(), slot);
    if lexical {
      block.lexical.push(name.clone());
    }
    top.shaded.remove(&name);

    Ok(Decl {
      slot,
      inherit: captured,
    })
  }

  /// Resolves a reference to `name` from the innermost lambda, threading
  /// captures through every intermediate lambda.
  pub fn resolve(&mut self, name: &str) -> Symbol {
    let depth = self.fns.len();
    match self.resolve_at(depth - 1, name) {
      Some(slot) => Symbol::Local { slot },
      None => Symbol::Global {
        shaded: self.fns.iter().any(|f| f.shaded.contains(name)),
      },
    }
  }

  fn resolve_at(&mut self, idx: usize, name: &str) -> Option<usize> {
    if let Some(slot) = self.fns[idx].lookup(name) {
      return Some(slot);
    }
    if idx == 0 {
      return None;
    }
    let parent_slot = self.resolve_at(idx - 1, name)?;
    let constant = self.fns[idx - 1].symbols[parent_slot].constant;
    let name: Arc<str> = name.into();
    let scope = &mut self.fns[idx];
    let slot =
      scope.alloc(name.clone(), SymbolKind::Captured { parent_slot }, constant);
    scope.captures.insert(name, slot);
    Some(slot)
  }

  /// Returns whether `slot` of the innermost lambda is a constant.
  pub fn is_constant(&self, slot: usize) -> bool {
    self
      .fns
      .last()
      .and_then(|f| f.symbols.get(slot))
      .map(|s| s.constant)
      .unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lexical_unit_rejects_duplicates() {
    let mut unit = LexicalUnit::default();
    assert!(unit.add_symbol(3));
    assert!(!unit.add_symbol(3));
    assert!(!unit.add_constant(3));
    assert!(unit.add_constant(70));
    assert!(unit.is_constant(70));
    assert!(!unit.is_constant(3));
    assert!(unit.has_symbol(70));
    assert!(!unit.has_symbol(69));
    assert_eq!(unit.len(), 2);
  }

  #[test]
  fn lexical_redeclaration() {
    let mut b = ScopeBuilder::new(true);
    b.push_fn();
    b.declare("x".into(), DeclKind::Var, false).unwrap();
    b.push_block();
    assert!(b.declare("x".into(), DeclKind::Var, false).is_err());
    b.pop_block();
    b.push_block();
    b.declare("y".into(), DeclKind::Let, true).unwrap();
    b.pop_block();
    b.push_block();
    assert!(b.declare("y".into(), DeclKind::Let, true).is_ok());
    b.pop_block();
  }

  #[test]
  fn non_lexical_reuses_slot() {
    let mut b = ScopeBuilder::new(false);
    b.push_fn();
    let first = b.declare("x".into(), DeclKind::Var, false).unwrap();
    b.push_block();
    let second = b.declare("x".into(), DeclKind::Var, false).unwrap();
    b.pop_block();
    assert_eq!(first.slot, second.slot);
    assert!(matches!(
      b.resolve("x"),
      Symbol::Local { slot } if slot == first.slot
    ));
  }

  #[test]
  fn shade_after_block() {
    let mut b = ScopeBuilder::new(true);
    b.push_fn();
    b.push_block();
    b.declare("x".into(), DeclKind::Var, false).unwrap();
    b.pop_block();
    assert_eq!(b.resolve("x"), Symbol::Global { shaded: true });
    assert_eq!(b.resolve("y"), Symbol::Global { shaded: false });
  }

  #[test]
  fn captures_thread_through() {
    let mut b = ScopeBuilder::new(false);
    b.push_fn();
    let x = b.declare("x".into(), DeclKind::Var, false).unwrap();
    b.push_fn();
    b.push_fn();
    let inner = b.resolve("x");
    let innermost = b.pop_fn();
    let middle = b.pop_fn();
    let top = b.pop_fn();

    assert_eq!(inner, Symbol::Local { slot: 0 });
    assert_eq!(innermost.captures().next().map(|c| c.1), Some(0));
    assert_eq!(middle.captures().next().map(|c| c.1), Some(x.slot));
    assert_eq!(top.locals().count(), 1);
    assert_eq!(middle.locals().count(), 0);
  }

  #[test]
  fn shadowing_a_capture_inherits() {
    let mut b = ScopeBuilder::new(false);
    b.push_fn();
    b.declare("x".into(), DeclKind::Var, false).unwrap();
    b.push_fn();
    let captured = match b.resolve("x") {
      Symbol::Local { slot } => slot,
      s => panic!("unexpected symbol: {:?}", s),
    };
    let decl = b.declare("x".into(), DeclKind::Var, false).unwrap();
    assert_ne!(decl.slot, captured);
    assert_eq!(decl.inherit, Some(captured));
  }
}
