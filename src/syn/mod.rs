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

//! Syntax tree data structures for the JEXL language.
//!
//! Trees are immutable once built and are shared through `Arc`s, so that a
//! compiled script (and every lambda inside it) can be evaluated from many
//! threads at once.

#![deny(missing_docs)]

use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

mod parser;
pub use parser::{parse, parse_expression, ParseError, ParseErrorKind};

pub mod scope;
pub use scope::Scope;

/// A source span, recording a byte range and the one-indexed line and column
/// at which it starts.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
  start: usize,
  end: usize,
  line: u32,
  col: u32,
}

impl Span {
  /// Builds a new `Span` from raw parts.
  pub(crate) fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
    Self {
      start,
      end,
      line: line as u32,
      col: col as u32,
    }
  }

  /// Builds a new "synthetic" span, which does not point into any script.
  pub fn synthetic() -> Self {
    Self::default()
  }

  /// Returns whether this `Span` is synthetic.
  pub fn is_synthetic(&self) -> bool {
    self.line == 0
  }

  /// Returns the offset at which this `Span` starts.
  pub fn start_byte(&self) -> usize {
    self.start
  }

  /// Returns the offset at which this `Span` ends.
  pub fn end_byte(&self) -> usize {
    self.end
  }

  /// Returns the line and column this `Span` starts at, both one-indexed.
  pub fn start_position(&self) -> Option<(usize, usize)> {
    if self.is_synthetic() {
      return None;
    }
    Some((self.line as usize, self.col as usize))
  }

  /// Joins two spans into a single, contiguous span.
  pub fn join(first: Span, second: Span) -> Span {
    if first.is_synthetic() {
      return second;
    }
    Span {
      end: second.end.max(first.end),
      ..first
    }
  }
}

impl fmt::Debug for Span {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.is_synthetic() {
      return write!(f, "[?..?]");
    }
    write!(f, "[{}..{}]", self.start, self.end)
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.start_position() {
      Some((line, col)) => write!(f, "{}:{}", line, col),
      None => write!(f, "?:?"),
    }
  }
}

/// Represents a type with a source span.
pub trait Spanned {
  /// Returns the associated source span.
  fn span(&self) -> Span;
}

impl Spanned for Span {
  fn span(&self) -> Span {
    *self
  }
}

impl<S: Spanned> Spanned for &S {
  fn span(&self) -> Span {
    S::span(*self)
  }
}

impl<S: Spanned> Spanned for Box<S> {
  fn span(&self) -> Span {
    S::span(&**self)
  }
}

impl<S: Spanned> Spanned for Arc<S> {
  fn span(&self) -> Span {
    S::span(&**self)
  }
}

macro_rules! spanned {
  ($($ty:ident),* $(,)?) => {$(
    impl Spanned for $ty {
      fn span(&self) -> Span {
        self.span
      }
    }
  )*}
}

spanned!(
  Ident, Lambda, Param, Block, Member, Index, Call, NsCall, New, Unary,
  Binary, Quantified, InstanceOf, Ternary, Assign, Step, Delete, VarDecl, If,
  While, For, ForEach, Labeled, Jump, Return, Throw, Yield, Try, Catch,
  Switch, Case, TypePattern, Annotated, Annotation, Resource,
);

/// Parse-time features, which change how scopes are resolved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Features {
  /// Whether `var` declarations are block-scoped, making redeclaration in
  /// an enclosing open block an error.
  pub lexical: bool,
}

/// A `Unit` represents a complete unit of evaluation: a script, which is
/// simply a lambda whose body is the whole source text.
#[derive(Clone, Debug)]
pub struct Unit {
  /// The top-level lambda.
  pub lambda: Arc<Lambda>,
  /// The global (context) variables this unit references, as paths; dotted
  /// antish references produce multi-element paths.
  pub globals: Vec<Vec<Arc<str>>>,
}

/// A numeric literal, already narrowed to its natural width.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum Lit {
  Int(i32),
  Long(i64),
  BigInt(Arc<BigInt>),
  Float(f32),
  Double(f64),
  BigDecimal(Arc<BigDecimal>),
}

/// How an identifier was resolved by the scope builder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
  /// A frame slot of the enclosing lambda; captured variables are also frame
  /// slots, aliased to the declaring frame.
  Local {
    /// The frame slot.
    slot: usize,
  },
  /// A context variable.
  Global {
    /// Whether a local of the same name was declared in a block that has
    /// already closed.
    shaded: bool,
  },
}

/// An `Ident` represents a variable reference.
#[derive(Clone, Debug)]
pub struct Ident {
  /// The name of this identifier.
  pub name: Arc<str>,
  /// What this identifier resolves to.
  pub symbol: Symbol,
  /// This AST node's span.
  pub span: Span,
}

/// A lambda: a parameter list, a body, and the scope descriptor that maps
/// its variables onto frame slots.
#[derive(Debug)]
pub struct Lambda {
  /// The declared name, for `function name(..) {..}` declarations.
  pub name: Option<Arc<str>>,
  /// The parameters, in order.
  pub params: Vec<Param>,
  /// The body. Expression-bodied lambdas have a single statement.
  pub body: Block,
  /// The scope descriptor.
  pub scope: Arc<Scope>,
  /// The source text of the lambda, used for display and for structural
  /// equality of closures.
  pub source: Arc<str>,
  /// Whether the body contains a `yield`, making calls produce generators.
  pub is_generator: bool,
  /// This AST node's span.
  pub span: Span,
}

/// A lambda parameter.
#[derive(Clone, Debug)]
pub struct Param {
  /// The parameter's name.
  pub name: Arc<str>,
  /// The frame slot the parameter is bound to.
  pub slot: usize,
  /// The default value, evaluated in the callee frame when the argument is
  /// missing or null.
  pub default: Option<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// A `Block` is a sequence of statements.
#[derive(Clone, Debug)]
pub struct Block {
  /// The statements.
  pub stmts: Vec<Stmt>,
  /// This AST node's span.
  pub span: Span,
}

/// An element of an array literal.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum ArrayItem {
  Value(Expr),
  Spread(Expr),
}

/// An `Expr` represents a JEXL expression.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum Expr {
  Null(Span),
  Bool(bool, Span),
  Num(Lit, Span),
  Str(Arc<str>, Span),
  Regex(Arc<str>, Span),
  Ident(Ident),
  Array(Vec<ArrayItem>, Span),
  Set(Vec<Expr>, Span),
  Map(Vec<(Expr, Expr)>, Span),
  Lambda(Arc<Lambda>),
  Generator(Arc<Block>),
  Block(Box<Block>),
  Member(Box<Member>),
  Index(Box<Index>),
  Call(Box<Call>),
  NsCall(Box<NsCall>),
  New(Box<New>),
  Unary(Box<Unary>),
  Binary(Box<Binary>),
  Quantified(Box<Quantified>),
  InstanceOf(Box<InstanceOf>),
  Ternary(Box<Ternary>),
  Assign(Box<Assign>),
  Step(Box<Step>),
  Delete(Box<Delete>),
  Switch(Box<Switch>),
}

impl Spanned for Expr {
  fn span(&self) -> Span {
    match self {
      Expr::Null(s)
      | Expr::Bool(_, s)
      | Expr::Num(_, s)
      | Expr::Str(_, s)
      | Expr::Regex(_, s)
      | Expr::Array(_, s)
      | Expr::Set(_, s)
      | Expr::Map(_, s) => *s,
      Expr::Ident(e) => e.span,
      Expr::Lambda(e) => e.span,
      Expr::Generator(e) => e.span,
      Expr::Block(e) => e.span,
      Expr::Member(e) => e.span,
      Expr::Index(e) => e.span,
      Expr::Call(e) => e.span,
      Expr::NsCall(e) => e.span,
      Expr::New(e) => e.span,
      Expr::Unary(e) => e.span,
      Expr::Binary(e) => e.span,
      Expr::Quantified(e) => e.span,
      Expr::InstanceOf(e) => e.span,
      Expr::Ternary(e) => e.span,
      Expr::Assign(e) => e.span,
      Expr::Step(e) => e.span,
      Expr::Delete(e) => e.span,
      Expr::Switch(e) => e.span,
    }
  }
}

/// Property access, `base.name` or `base?.name`.
#[derive(Clone, Debug)]
pub struct Member {
  /// The object being accessed.
  pub base: Expr,
  /// The property name.
  pub name: Arc<str>,
  /// Whether this is a safe (`?.`) access.
  pub safe: bool,
  /// The dotted path of this access, if it is a chain of plain identifiers
  /// rooted at a global; used for antish variable resolution.
  pub antish: Option<Arc<str>>,
  /// This AST node's span.
  pub span: Span,
}

/// Indexed access, `base[index]` or `base?[index]`.
#[derive(Clone, Debug)]
pub struct Index {
  /// The object being indexed.
  pub base: Expr,
  /// The index.
  pub index: Expr,
  /// Whether this is a safe (`?[`) access.
  pub safe: bool,
  /// This AST node's span.
  pub span: Span,
}

/// A call; if `callee` is a `Member`, this is a method call.
#[derive(Clone, Debug)]
pub struct Call {
  /// The function being called.
  pub callee: Expr,
  /// The arguments.
  pub args: Vec<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// A namespace-qualified call, `ns:name(args)`.
#[derive(Clone, Debug)]
pub struct NsCall {
  /// The namespace.
  pub ns: Arc<str>,
  /// The function name.
  pub name: Arc<str>,
  /// The arguments.
  pub args: Vec<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// The class named by a `new` expression.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum NewClass {
  Named(Arc<str>),
  Expr(Expr),
}

/// A constructor call, `new(class, args)` or `new a.b.Class(args)`.
#[derive(Clone, Debug)]
pub struct New {
  /// The class to construct.
  pub class: NewClass,
  /// The constructor arguments.
  pub args: Vec<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// A unary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum UnaryOp {
  Neg,
  Pos,
  Not,
  Complement,
  Empty,
  Size,
}

impl UnaryOp {
  /// Returns the operator's source symbol.
  pub fn symbol(self) -> &'static str {
    match self {
      UnaryOp::Neg => "-",
      UnaryOp::Pos => "+",
      UnaryOp::Not => "!",
      UnaryOp::Complement => "~",
      UnaryOp::Empty => "empty",
      UnaryOp::Size => "size",
    }
  }
}

impl fmt::Display for UnaryOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// A unary operation.
#[derive(Clone, Debug)]
pub struct Unary {
  /// The operator.
  pub op: UnaryOp,
  /// The operand.
  pub arg: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// A binary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  Ushr,
  Eq,
  Ne,
  StrictEq,
  StrictNe,
  Lt,
  Le,
  Gt,
  Ge,
  Contains,
  NotContains,
  StartsWith,
  NotStartsWith,
  EndsWith,
  NotEndsWith,
  Range,
  And,
  Or,
  Coalesce,
  Elvis,
}

impl BinaryOp {
  /// Returns the operator's source symbol.
  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Mod => "%",
      BinaryOp::BitAnd => "&",
      BinaryOp::BitOr => "|",
      BinaryOp::BitXor => "^",
      BinaryOp::Shl => "<<",
      BinaryOp::Shr => ">>",
      BinaryOp::Ushr => ">>>",
      BinaryOp::Eq => "==",
      BinaryOp::Ne => "!=",
      BinaryOp::StrictEq => "===",
      BinaryOp::StrictNe => "!==",
      BinaryOp::Lt => "<",
      BinaryOp::Le => "<=",
      BinaryOp::Gt => ">",
      BinaryOp::Ge => ">=",
      BinaryOp::Contains => "=~",
      BinaryOp::NotContains => "!~",
      BinaryOp::StartsWith => "=^",
      BinaryOp::NotStartsWith => "!^",
      BinaryOp::EndsWith => "=$",
      BinaryOp::NotEndsWith => "!$",
      BinaryOp::Range => "..",
      BinaryOp::And => "&&",
      BinaryOp::Or => "||",
      BinaryOp::Coalesce => "??",
      BinaryOp::Elvis => "?:",
    }
  }

  /// Returns whether the right-hand side of this operator is only evaluated
  /// conditionally.
  pub fn is_lazy(self) -> bool {
    matches!(
      self,
      BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce | BinaryOp::Elvis
    )
  }

  /// Returns whether this operator may be applied in compound assignment.
  pub fn is_assignable(self) -> bool {
    matches!(
      self,
      BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Mod
        | BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::Shl
        | BinaryOp::Shr
        | BinaryOp::Ushr
    )
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// A binary operation.
#[derive(Clone, Debug)]
pub struct Binary {
  /// The operator.
  pub op: BinaryOp,
  /// The left-hand side.
  pub lhs: Expr,
  /// The right-hand side.
  pub rhs: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// A quantified comparison, `lhs op ?(a, b)` (any) or `lhs op ??(a, b)`
/// (all).
#[derive(Clone, Debug)]
pub struct Quantified {
  /// The base operator.
  pub op: BinaryOp,
  /// The left-hand side.
  pub lhs: Expr,
  /// The operand list.
  pub rhs: Vec<Expr>,
  /// Whether every comparison must hold, rather than any.
  pub all: bool,
  /// This AST node's span.
  pub span: Span,
}

/// A type test, `value instanceof Class`.
#[derive(Clone, Debug)]
pub struct InstanceOf {
  /// The value being tested.
  pub value: Expr,
  /// The type name.
  pub class: Arc<str>,
  /// Whether this is `!instanceof`.
  pub negated: bool,
  /// This AST node's span.
  pub span: Span,
}

/// A conditional, `cond ? then : otherwise`.
#[derive(Clone, Debug)]
pub struct Ternary {
  /// The condition.
  pub cond: Expr,
  /// The value if the condition is true.
  pub then: Expr,
  /// The value if the condition is false.
  pub otherwise: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// An assignment, simple or compound.
#[derive(Clone, Debug)]
pub struct Assign {
  /// The assignment target; one of `Ident`, `Member`, or `Index`.
  pub target: Expr,
  /// The operator, for compound assignments.
  pub op: Option<BinaryOp>,
  /// The value being assigned.
  pub value: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// An increment or decrement, prefix or postfix.
#[derive(Clone, Debug)]
pub struct Step {
  /// The assignment target.
  pub target: Expr,
  /// Whether this is `++` rather than `--`.
  pub increment: bool,
  /// Whether the operator is written before the target.
  pub prefix: bool,
  /// This AST node's span.
  pub span: Span,
}

/// A `delete` of a property or element.
#[derive(Clone, Debug)]
pub struct Delete {
  /// The property or element; one of `Member` or `Index`.
  pub target: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// A `Stmt` represents a JEXL statement.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum Stmt {
  Empty(Span),
  Expr(Expr),
  Var(Vec<VarDecl>, Span),
  Block(Block),
  If(Box<If>),
  While(Box<While>),
  DoWhile(Box<While>),
  For(Box<For>),
  ForEach(Box<ForEach>),
  Labeled(Box<Labeled>),
  Break(Jump),
  Continue(Jump),
  Return(Return),
  Throw(Throw),
  Yield(Yield),
  Try(Box<Try>),
  Switch(Box<Switch>),
  Annotated(Box<Annotated>),
}

impl Spanned for Stmt {
  fn span(&self) -> Span {
    match self {
      Stmt::Empty(s) | Stmt::Var(_, s) => *s,
      Stmt::Expr(e) => e.span(),
      Stmt::Block(e) => e.span,
      Stmt::If(e) => e.span,
      Stmt::While(e) | Stmt::DoWhile(e) => e.span,
      Stmt::For(e) => e.span,
      Stmt::ForEach(e) => e.span,
      Stmt::Labeled(e) => e.span,
      Stmt::Break(e) | Stmt::Continue(e) => e.span,
      Stmt::Return(e) => e.span,
      Stmt::Throw(e) => e.span,
      Stmt::Yield(e) => e.span,
      Stmt::Try(e) => e.span,
      Stmt::Switch(e) => e.span,
      Stmt::Annotated(e) => e.span,
    }
  }
}

/// A single variable declaration.
#[derive(Clone, Debug)]
pub struct VarDecl {
  /// The variable name.
  pub name: Arc<str>,
  /// The frame slot.
  pub slot: usize,
  /// The initializer.
  pub init: Option<Expr>,
  /// For a lambda local without initializer that shadows a captured
  /// variable, the captured slot whose value it starts out with.
  pub inherit: Option<usize>,
  /// This AST node's span.
  pub span: Span,
}

/// An `if` statement.
#[derive(Clone, Debug)]
pub struct If {
  /// The condition.
  pub cond: Expr,
  /// The statement run when the condition holds.
  pub then: Stmt,
  /// The `else` branch.
  pub otherwise: Option<Stmt>,
  /// This AST node's span.
  pub span: Span,
}

/// A `while` or `do .. while` loop.
#[derive(Clone, Debug)]
pub struct While {
  /// The loop condition.
  pub cond: Expr,
  /// The loop body.
  pub body: Stmt,
  /// This AST node's span.
  pub span: Span,
}

/// A C-style `for` loop.
#[derive(Clone, Debug)]
pub struct For {
  /// The initializer.
  pub init: Option<Stmt>,
  /// The loop condition; absent means forever.
  pub cond: Option<Expr>,
  /// The step expression.
  pub step: Option<Expr>,
  /// The loop body.
  pub body: Stmt,
  /// This AST node's span.
  pub span: Span,
}

/// A `for (var x : iterable)` loop.
#[derive(Clone, Debug)]
pub struct ForEach {
  /// The loop variable.
  pub var: Ident,
  /// Whether the loop declares its variable, giving each iteration a fresh
  /// binding.
  pub declared: bool,
  /// The iterable.
  pub iter: Expr,
  /// The loop body.
  pub body: Stmt,
  /// This AST node's span.
  pub span: Span,
}

/// A labeled statement, the target of labeled `break` and `continue`.
#[derive(Clone, Debug)]
pub struct Labeled {
  /// The label.
  pub label: Arc<str>,
  /// The labeled statement.
  pub body: Stmt,
  /// This AST node's span.
  pub span: Span,
}

/// A `break` or `continue`.
#[derive(Clone, Debug)]
pub struct Jump {
  /// The target label, if any.
  pub label: Option<Arc<str>>,
  /// This AST node's span.
  pub span: Span,
}

/// A `return`.
#[derive(Clone, Debug)]
pub struct Return {
  /// The returned value.
  pub value: Option<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// A `throw`.
#[derive(Clone, Debug)]
pub struct Throw {
  /// The thrown value.
  pub value: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// Where a `yield` delivers its value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum YieldTarget {
  /// The enclosing generator.
  Generator,
  /// The enclosing switch expression.
  Switch,
}

/// A `yield`.
#[derive(Clone, Debug)]
pub struct Yield {
  /// The yielded value.
  pub value: Expr,
  /// Where the value goes.
  pub target: YieldTarget,
  /// This AST node's span.
  pub span: Span,
}

/// A `try` resource, closed when the `try` block exits.
#[derive(Clone, Debug)]
pub struct Resource {
  /// The slot the resource is bound to, if declared.
  pub slot: Option<usize>,
  /// The resource expression.
  pub init: Expr,
  /// This AST node's span.
  pub span: Span,
}

/// A `catch` clause.
#[derive(Clone, Debug)]
pub struct Catch {
  /// The slot the caught exception is bound to; absent for a blind catch.
  pub slot: Option<usize>,
  /// The handler.
  pub body: Block,
  /// This AST node's span.
  pub span: Span,
}

/// A `try` statement.
#[derive(Clone, Debug)]
pub struct Try {
  /// The resources, in acquisition order.
  pub resources: Vec<Resource>,
  /// The guarded block.
  pub body: Block,
  /// The `catch` clause.
  pub catch: Option<Catch>,
  /// The `finally` block.
  pub finally: Option<Block>,
  /// This AST node's span.
  pub span: Span,
}

/// A type pattern, `case Class name when guard`.
#[derive(Clone, Debug)]
pub struct TypePattern {
  /// The type name.
  pub class: Arc<str>,
  /// The slot bound to the matched value.
  pub slot: Option<usize>,
  /// The guard, evaluated after the type test succeeds.
  pub guard: Option<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// A switch case label.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum CaseLabel {
  Default(Span),
  Value(Expr),
  Type(TypePattern),
}

/// The body of a switch case.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum CaseBody {
  /// Statements of a colon-style case, which fall through.
  Stmts(Vec<Stmt>),
  Expr(Expr),
  Block(Block),
  Throw(Throw),
}

/// A switch case.
#[derive(Clone, Debug)]
pub struct Case {
  /// The labels; a case matches if any of them does.
  pub labels: Vec<CaseLabel>,
  /// The body.
  pub body: CaseBody,
  /// This AST node's span.
  pub span: Span,
}

/// A `switch`, as a statement or as an expression.
#[derive(Clone, Debug)]
pub struct Switch {
  /// The value being switched on.
  pub subject: Expr,
  /// The cases, in order.
  pub cases: Vec<Case>,
  /// Whether this uses `->` cases, which never fall through.
  pub arrow: bool,
  /// Whether this switch appears in expression position.
  pub is_expr: bool,
  /// This AST node's span.
  pub span: Span,
}

/// An annotation, `@name(args)`.
#[derive(Clone, Debug)]
pub struct Annotation {
  /// The annotation name.
  pub name: Arc<str>,
  /// The arguments.
  pub args: Vec<Expr>,
  /// This AST node's span.
  pub span: Span,
}

/// An annotated statement.
#[derive(Clone, Debug)]
pub struct Annotated {
  /// The annotations, outermost first.
  pub annotations: Vec<Annotation>,
  /// The annotated statement.
  pub body: Stmt,
  /// This AST node's span.
  pub span: Span,
}
