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

//! Interpreter for the JEXL language.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use chashmap::CHashMap;

use crate::eval::arith::ArithError;
use crate::eval::arith::Arithmetic;
use crate::eval::arith::NoOperators;
use crate::eval::arith::Operators;
use crate::eval::arith::Overload;
use crate::eval::arith::SelfAssign;
use crate::eval::cancel::CancelFlag;
use crate::eval::cancel::Interrupt;
use crate::eval::cancel::Poller;
use crate::eval::context::AnnotationAction;
use crate::eval::context::Context;
use crate::eval::error::ErrorKind;
use crate::eval::error::HostError;
use crate::eval::error::JexlError;
use crate::eval::frame::Frame;
use crate::eval::frame::Slot;
use crate::eval::generator::Generator;
use crate::eval::generator::Item;
use crate::eval::generator::Sink;
use crate::eval::introspect::ClassUberspect;
use crate::eval::introspect::Resolution;
use crate::eval::introspect::Uberspect;
use crate::eval::ops::Cursor;
use crate::eval::options::Options;
use crate::eval::value::Array;
use crate::eval::value::Closure;
use crate::eval::value::Map;
use crate::eval::value::Pattern;
use crate::eval::value::Set;
use crate::eval::value::Value;
use crate::syn;
use crate::syn::Span;
use crate::syn::Spanned as _;
use crate::syn::Symbol;

#[macro_use]
pub mod error;

#[macro_use]
pub mod value;

pub mod arith;
pub mod builtins;
pub mod cancel;
pub mod context;
pub mod encode;
pub mod frame;
pub mod generator;
pub mod introspect;
pub mod options;

mod ops;

pub(crate) mod escaping;

#[cfg(test)]
mod conformance;

/// Host stack that must remain free when entering a call.
const RED_ZONE: usize = 512 * 1024;

/// A `Signal` represents exceptional control flow in JEXL evaluation: either
/// user-provided control flow, such as `return` or `break`, an interruption,
/// or an error.
#[derive(Debug)]
pub enum Signal {
  Return(Value),
  Break(Option<Arc<str>>),
  Continue(Option<Arc<str>>),
  /// A `yield` out of a switch expression.
  Yield(Value),
  Cancel(Interrupt),
  Error(JexlError),
}

impl From<JexlError> for Signal {
  fn from(e: JexlError) -> Self {
    Signal::Error(e)
  }
}

/// The result type for all JEXL computations.
///
/// Rather than returning a plain evaluation error, a JEXL computation can
/// return:
/// - A value, represented by the `Ok` variant.
/// - Non-trivial control flow, like an early return or loop control,
///   represented by the `Err` variant.
/// - A real error, which is a variant of `Signal`.
pub type Result<T> = std::result::Result<T, Signal>;

/// The evaluation machinery shared by every evaluation of an engine: default
/// options, operator hooks, introspection, and namespaces.
pub struct Runtime {
  pub options: Arc<Options>,
  pub operators: Arc<dyn Operators>,
  pub uberspect: Arc<dyn Uberspect>,
  pub namespaces: HashMap<Arc<str>, Value>,
  patterns: CHashMap<String, Pattern>,
}

impl Runtime {
  pub fn new(
    options: Arc<Options>,
    operators: Arc<dyn Operators>,
    uberspect: Arc<dyn Uberspect>,
    namespaces: HashMap<Arc<str>, Value>,
  ) -> Self {
    Runtime {
      options,
      operators,
      uberspect,
      namespaces,
      patterns: CHashMap::new(),
    }
  }

  /// Compiles `src`, memoizing the result.
  pub fn pattern(
    &self,
    src: &str,
  ) -> std::result::Result<Pattern, regex::Error> {
    if let Some(p) = self.patterns.get(src) {
      return Ok(p.clone());
    }
    let p = Pattern::new(src)?;
    self.patterns.insert(src.to_string(), p.clone());
    Ok(p)
  }
}

impl Default for Runtime {
  fn default() -> Self {
    Runtime::new(
      Arc::new(Options::default()),
      Arc::new(NoOperators),
      Arc::new(ClassUberspect::default()),
      HashMap::new(),
    )
  }
}

/// A JEXL stack frame: the function being run, where it was called from,
/// and its variables.
struct StackFrame {
  fnc: Value,
  call_site: Span,
  frame: Frame,
}

/// A place an assignment can store into.
enum Place {
  Local(usize),
  Global(Arc<str>),
  Property(Value, Arc<str>),
  Element(Value, Value),
}

/// What a loop does after running its body once.
enum Flow {
  Next(Value),
  Exit,
}

/// The body of a generator.
enum GenBody {
  Lambda(Arc<syn::Lambda>),
  Block(Arc<syn::Block>),
}

impl GenBody {
  fn block(&self) -> &syn::Block {
    match self {
      GenBody::Lambda(l) => &l.body,
      GenBody::Block(b) => b,
    }
  }
}

/// An `Interpreter` evaluates JEXL code against a `Context`.
///
/// An interpreter is meant for a single evaluation on a single thread;
/// evaluations running concurrently each use their own.
pub struct Interpreter {
  runtime: Arc<Runtime>,
  context: Arc<dyn Context>,
  options: Arc<Options>,
  poller: Poller,
  call_stack: Vec<StackFrame>,
  sink: Option<Sink>,
  silenced: usize,
}

impl Interpreter {
  /// Creates an interpreter for `context`. The context's options are used
  /// directly when they are a shared instance, and copied otherwise; a
  /// context without options gets a copy of the engine defaults.
  pub fn new(runtime: Arc<Runtime>, context: Arc<dyn Context>) -> Self {
    let options = match context.options() {
      Some(o) if o.shared_instance() => o,
      Some(o) => Arc::new(o.snapshot()),
      None => Arc::new(runtime.options.snapshot()),
    };
    let flag = context.cancellation().unwrap_or_default();
    Interpreter {
      runtime,
      context,
      options,
      poller: Poller::new(flag),
      call_stack: Vec::new(),
      sink: None,
      silenced: 0,
    }
  }

  /// Makes this interpreter observe `flag` instead of the context's.
  pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
    self.poller = Poller::new(flag);
    self
  }

  /// Returns the options this interpreter runs with.
  pub fn options(&self) -> &Arc<Options> {
    &self.options
  }

  /// Returns the evaluation context.
  pub fn context(&self) -> &Arc<dyn Context> {
    &self.context
  }

  /// Returns the location the innermost function was called from.
  pub fn call_site(&self) -> Span {
    self
      .call_stack
      .last()
      .map(|f| f.call_site)
      .unwrap_or_else(Span::synthetic)
  }

  /// Runs `f` to completion.
  pub fn run(
    &mut self,
    f: &Closure,
    args: Vec<Value>,
  ) -> std::result::Result<Value, JexlError> {
    match self.call_closure(Span::synthetic(), f, args) {
      Ok(v) | Err(Signal::Return(v)) | Err(Signal::Yield(v)) => Ok(v),
      Err(Signal::Break(_)) | Err(Signal::Continue(_)) => Ok(Value::Null),
      Err(Signal::Cancel(i)) => {
        let message = match i {
          Interrupt::Cancelled => "execution cancelled",
          Interrupt::Deadline(_) => "execution timed out",
        };
        Err(JexlError::bare(ErrorKind::Cancel, Span::synthetic(), message))
      }
      Err(Signal::Error(e)) => Err(e),
    }
  }

  /// Calls a callable value; meant for native functions calling back into
  /// scripts.
  pub fn call(&mut self, f: &Value, args: Vec<Value>) -> Result<Value> {
    let span = self.call_site();
    self.call_value(span, f, args)
  }

  /// Drains an iterable value; meant for native functions.
  pub fn collect(&mut self, v: &Value) -> Result<Vec<Value>> {
    let span = self.call_site();
    let mut cursor = self.cursor(span, v)?;
    let mut values = Vec::new();
    while let Some(v) = cursor.next(&self.poller)? {
      values.push(v);
    }
    Ok(values)
  }

  /// Creates an interpreter for a generator body, running in `top`, that
  /// also unwinds once `stop` is raised.
  fn fork(&self, top: StackFrame, stop: CancelFlag) -> Interpreter {
    Interpreter {
      runtime: self.runtime.clone(),
      context: self.context.clone(),
      options: self.options.clone(),
      poller: self.poller.fork(stop),
      call_stack: vec![top],
      sink: None,
      silenced: self.silenced,
    }
  }

  fn frame(&self) -> &Frame {
    match self.call_stack.last() {
      Some(f) => &f.frame,
      None => bug!("call stack is empty"),
    }
  }

  fn frame_mut(&mut self) -> &mut Frame {
    match self.call_stack.last_mut() {
      Some(f) => &mut f.frame,
      None => bug!("call stack is empty"),
    }
  }

  fn arith(&self) -> Arithmetic {
    Arithmetic::from_options(&self.options)
  }

  /// Whether lenient-mode degradations go unreported.
  fn quiet(&self) -> bool {
    self.options.silent() || self.silenced > 0
  }

  /// Checks for cancellation and expired deadlines.
  fn poll(&self) -> Result<()> {
    match self.poller.poll() {
      Some(i) => {
        tracing::debug!(interrupt = ?i, "interrupting evaluation");
        Err(Signal::Cancel(i))
      }
      None => Ok(()),
    }
  }

  /// Raises `err` in strict mode; otherwise, logs it and produces null.
  fn degrade(&self, err: JexlError) -> Result<Value> {
    if self.options.strict() {
      return Err(err.into());
    }
    if !self.quiet() {
      tracing::warn!(kind = err.kind.name(), at = %err.span, "{}", err.message);
    }
    Ok(Value::Null)
  }

  fn undefined_variable(&self, span: Span, name: &str) -> Result<Value> {
    let err = JexlError::new(
      self,
      ErrorKind::Variable(name.into()),
      span,
      format!("undefined variable {}", name),
    );
    self.degrade(err)
  }

  /// Converts a failure raised by host code into a signal. Errors that
  /// originated in JEXL code are passed through unchanged.
  fn host_failure(&self, span: Span, e: HostError) -> Signal {
    if let Some(inner) = e.downcast_ref::<JexlError>() {
      return Signal::Error(inner.clone());
    }
    let message = e.to_string();
    JexlError::new(self, ErrorKind::Host(e), span, message).into()
  }

  fn arith_failure<T>(
    &self,
    span: Span,
    symbol: &'static str,
    e: ArithError,
  ) -> Result<T> {
    match e {
      ArithError::Unsupported => error!(
        self,
        span,
        kind: ErrorKind::Operator(symbol),
        "operator '{}' does not apply to its operands",
        symbol
      ),
      e => error!(self, span, "{}: {}", symbol, e),
    }
  }

  fn check_stack(&self, span: Span) -> Result<()> {
    let limit = self.options.stack_overflow();
    if self.call_stack.len() >= limit {
      error!(
        self,
        span,
        kind: ErrorKind::StackOverflow(Overflow::Guarded { limit }),
        "stack overflow: call depth exceeds {}",
        limit
      )
    }
    if stacker::remaining_stack().map_or(false, |left| left < RED_ZONE) {
      error!(
        self,
        span,
        kind: ErrorKind::StackOverflow(Overflow::Host),
        "stack overflow: host stack exhausted"
      )
    }
    Ok(())
  }

  /// Calls any callable value.
  fn call_value(
    &mut self,
    span: Span,
    f: &Value,
    args: Vec<Value>,
  ) -> Result<Value> {
    match f {
      Value::Closure(c) => self.call_closure(span, c, args),
      Value::Function(native) => {
        self.poll()?;
        self.check_stack(span)?;
        self.call_stack.push(StackFrame {
          fnc: f.clone(),
          call_site: span,
          frame: Frame::default(),
        });
        let res = native.call(self, args);
        self.call_stack.pop();
        res
      }
      v => error!(
        self,
        span,
        kind: ErrorKind::Method {
          name: v.type_name().into(),
          ambiguity: None,
        },
        "{} is not callable",
        v.type_name()
      ),
    }
  }

  /// Calls a closure: lays out its frame, binds curried arguments and then
  /// `args` to its parameters, and runs its body. Generator closures return
  /// a generator over their body instead.
  fn call_closure(
    &mut self,
    call_site: Span,
    f: &Closure,
    args: Vec<Value>,
  ) -> Result<Value> {
    self.poll()?;
    self.check_stack(call_site)?;

    let lambda = f.lambda().clone();
    self.call_stack.push(StackFrame {
      fnc: Value::Closure(f.clone()),
      call_site,
      frame: Frame::new(&lambda.scope, f.captured()),
    });
    if let Err(e) = self.bind_params(&lambda, f.curried(), args) {
      self.call_stack.pop();
      return Err(e);
    }

    if lambda.is_generator {
      let top = match self.call_stack.pop() {
        Some(top) => top,
        None => bug!("call stack is empty"),
      };
      return Ok(self.make_generator(lambda.span, top, GenBody::Lambda(lambda)));
    }

    let res = self.eval_block(&lambda.body);
    self.call_stack.pop();
    match res {
      Err(Signal::Return(v)) => Ok(v),
      Err(Signal::Break(_)) | Err(Signal::Continue(_)) => Ok(Value::Null),
      res => res,
    }
  }

  /// Binds arguments to parameters. A missing or null argument takes the
  /// parameter's default, evaluated in the callee frame; arguments past the
  /// parameter list are ignored.
  fn bind_params(
    &mut self,
    lambda: &syn::Lambda,
    curried: &[Value],
    args: Vec<Value>,
  ) -> Result<()> {
    let mut supplied = curried.iter().cloned().chain(args);
    for param in &lambda.params {
      let arg = supplied.next().unwrap_or(Value::Null);
      let value = match (&param.default, arg) {
        (Some(default), Value::Null) => self.eval_expr(default)?,
        (_, arg) => arg,
      };
      self.frame().set(param.slot, value);
    }
    Ok(())
  }

  /// Wraps `body` into a generator evaluated on its own thread, in `top`.
  fn make_generator(
    &self,
    span: Span,
    top: StackFrame,
    body: GenBody,
  ) -> Value {
    let stop = CancelFlag::new();
    let mut interp = self.fork(top, stop.clone());
    Value::Generator(Generator::new(
      span,
      stop,
      Box::new(move |sink| {
        interp.sink = Some(sink);
        let last = match interp.eval_block(body.block()) {
          Err(Signal::Error(e)) => Some(Item::Error(e)),
          Err(Signal::Cancel(i)) => Some(Item::Interrupt(i)),
          _ => None,
        };
        if let Some(sink) = interp.sink.take() {
          sink.finish(last);
        }
      }),
    ))
  }

  /// Makes `slot` safe to bind: a cell that already holds a value is
  /// replaced, so closures that captured it keep the old binding.
  fn fresh_slot(&mut self, slot: usize) {
    if !matches!(self.frame().get(slot), Slot::Unset) {
      self.frame_mut().declare(slot, Slot::Unset);
    }
  }

  fn bind(&mut self, slot: usize, value: Value) {
    self.fresh_slot(slot);
    self.frame().set(slot, value);
  }

  /// Looks up a variable; `None` means it is undefined.
  fn lookup(&self, id: &syn::Ident) -> Option<Value> {
    match id.symbol {
      Symbol::Local { slot } => match self.frame().get(slot) {
        Slot::Unset => None,
        s => Some(s.value_or_null()),
      },
      Symbol::Global { shaded } => {
        if shaded && self.options.lexical_shade() {
          return None;
        }
        self.context.get(&id.name)
      }
    }
  }

  fn read_ident(&self, id: &syn::Ident) -> Result<Value> {
    match self.lookup(id) {
      Some(v) => Ok(v),
      None => self.undefined_variable(id.span, &id.name),
    }
  }

  fn eval_args(&mut self, args: &[syn::Expr]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
      values.push(self.eval_expr(arg)?);
    }
    Ok(values)
  }

  pub fn eval_block(&mut self, block: &syn::Block) -> Result<Value> {
    let mut last = Value::Null;
    for stmt in &block.stmts {
      last = self.eval_stmt(stmt)?;
    }
    Ok(last)
  }

  pub fn eval_stmt(&mut self, stmt: &syn::Stmt) -> Result<Value> {
    self.poll()?;
    let val = match stmt {
      syn::Stmt::Empty(..) => Value::Null,
      syn::Stmt::Expr(e) => self.eval_expr(e)?,

      // Evaluate declarations in order; the statement's value is the last
      // declared value.
      syn::Stmt::Var(decls, _) => {
        let mut last = Value::Null;
        for decl in decls {
          last = self.exec_decl(decl)?;
        }
        last
      }

      syn::Stmt::Block(b) => self.eval_block(b)?,

      syn::Stmt::If(i) => {
        if self.eval_expr(&i.cond)?.truthy() {
          self.eval_stmt(&i.then)?
        } else if let Some(otherwise) = &i.otherwise {
          self.eval_stmt(otherwise)?
        } else {
          Value::Null
        }
      }

      syn::Stmt::While(..)
      | syn::Stmt::DoWhile(..)
      | syn::Stmt::For(..)
      | syn::Stmt::ForEach(..) => self.eval_loop(stmt, None)?,

      // A label makes its statement the target of `break label`; labeled
      // loops also consume `continue label`.
      syn::Stmt::Labeled(l) => {
        let res = match &l.body {
          s @ syn::Stmt::While(..)
          | s @ syn::Stmt::DoWhile(..)
          | s @ syn::Stmt::For(..)
          | s @ syn::Stmt::ForEach(..) => self.eval_loop(s, Some(&l.label)),
          s => self.eval_stmt(s),
        };
        match res {
          Err(Signal::Break(Some(label))) if label == l.label => Value::Null,
          res => res?,
        }
      }

      syn::Stmt::Break(j) => return Err(Signal::Break(j.label.clone())),
      syn::Stmt::Continue(j) => return Err(Signal::Continue(j.label.clone())),
      syn::Stmt::Return(r) => {
        let v = match &r.value {
          Some(e) => self.eval_expr(e)?,
          None => Value::Null,
        };
        return Err(Signal::Return(v));
      }
      syn::Stmt::Throw(t) => self.eval_throw(t)?,

      // A generator `yield` hands the value to the consumer, and blocks
      // until the next value is asked for.
      syn::Stmt::Yield(y) => {
        let v = self.eval_expr(&y.value)?;
        match y.target {
          syn::YieldTarget::Switch => return Err(Signal::Yield(v)),
          syn::YieldTarget::Generator => match &self.sink {
            Some(sink) => {
              if sink.send(v).is_err() {
                tracing::trace!("generator abandoned");
                return Err(Signal::Cancel(Interrupt::Cancelled));
              }
              Value::Null
            }
            None => error!(self, y, "yield outside of a generator"),
          },
        }
      }

      syn::Stmt::Try(t) => self.eval_try(t)?,
      syn::Stmt::Switch(s) => self.eval_switch(s)?,
      syn::Stmt::Annotated(a) => self.eval_annotated(&a.annotations, &a.body)?,
    };
    Ok(val)
  }

  /// Declares a variable. A fresh cell is installed unless the declaration
  /// repeats a visible one.
  fn exec_decl(&mut self, d: &syn::VarDecl) -> Result<Value> {
    if d.inherit == Some(d.slot) {
      return match &d.init {
        Some(init) => {
          let v = self.eval_expr(init)?;
          self.frame().set(d.slot, v.clone());
          Ok(v)
        }
        None => Ok(self.frame().get(d.slot).value_or_null()),
      };
    }

    // The slot is reserved before the initializer runs, so that a lambda
    // initializer can refer to itself.
    self.fresh_slot(d.slot);
    match &d.init {
      Some(init) => {
        let v = self.eval_expr(init)?;
        self.frame().set(d.slot, v.clone());
        Ok(v)
      }
      None => {
        let inherited = match d.inherit.map(|from| self.frame().get(from)) {
          Some(Slot::Value(v)) => Slot::Value(v),
          _ => Slot::Undefined,
        };
        let v = inherited.value_or_null();
        *self.frame().cell(d.slot).lock() = inherited;
        Ok(v)
      }
    }
  }

  /// Runs a loop statement; `label` is the loop's label, if any.
  fn eval_loop(
    &mut self,
    stmt: &syn::Stmt,
    label: Option<&str>,
  ) -> Result<Value> {
    let flow = |res: Result<Value>| match res {
      Ok(v) => Ok(Flow::Next(v)),
      Err(Signal::Break(None)) => Ok(Flow::Exit),
      Err(Signal::Continue(None)) => Ok(Flow::Next(Value::Null)),
      Err(Signal::Break(Some(l))) if Some(&*l) == label => Ok(Flow::Exit),
      Err(Signal::Continue(Some(l))) if Some(&*l) == label => {
        Ok(Flow::Next(Value::Null))
      }
      Err(e) => Err(e),
    };

    let mut last = Value::Null;
    match stmt {
      syn::Stmt::While(w) => loop {
        self.poll()?;
        if !self.eval_expr(&w.cond)?.truthy() {
          break;
        }
        match flow(self.eval_stmt(&w.body))? {
          Flow::Next(v) => last = v,
          Flow::Exit => break,
        }
      },
      syn::Stmt::DoWhile(w) => loop {
        self.poll()?;
        match flow(self.eval_stmt(&w.body))? {
          Flow::Next(v) => last = v,
          Flow::Exit => break,
        }
        if !self.eval_expr(&w.cond)?.truthy() {
          break;
        }
      },
      syn::Stmt::For(f) => {
        if let Some(init) = &f.init {
          self.eval_stmt(init)?;
        }
        loop {
          self.poll()?;
          if let Some(cond) = &f.cond {
            if !self.eval_expr(cond)?.truthy() {
              break;
            }
          }
          match flow(self.eval_stmt(&f.body))? {
            Flow::Next(v) => last = v,
            Flow::Exit => break,
          }
          if let Some(step) = &f.step {
            self.eval_expr(step)?;
          }
        }
      }
      syn::Stmt::ForEach(f) => {
        let iterable = self.eval_expr(&f.iter)?;
        let mut cursor = self.cursor(f.iter.span(), &iterable)?;
        while let Some(v) = cursor.next(&self.poller)? {
          self.poll()?;
          match f.var.symbol {
            Symbol::Local { slot } if f.declared => self.bind(slot, v),
            Symbol::Local { slot } => self.frame().set(slot, v),
            Symbol::Global { .. } => self.context.set(&f.var.name, v),
          }
          match flow(self.eval_stmt(&f.body))? {
            Flow::Next(v) => last = v,
            Flow::Exit => break,
          }
        }
      }
      s => bug!("not a loop: {:?}", s.span()),
    }
    Ok(last)
  }

  fn eval_throw(&mut self, t: &syn::Throw) -> Result<Value> {
    match self.eval_expr(&t.value)? {
      Value::Error(e) => Err(Signal::Error((*e).clone())),
      v => {
        let message = v.to_display_string();
        error!(self, t, kind: ErrorKind::Thrown(v), "{}", message)
      }
    }
  }

  /// Runs a `try` statement. Resources close in reverse order whatever the
  /// outcome; a `finally` block's own signal replaces any pending one,
  /// except that only an error replaces a cancellation.
  fn eval_try(&mut self, t: &syn::Try) -> Result<Value> {
    let mut resources = Vec::new();
    let mut res = Ok(Value::Null);
    for r in &t.resources {
      match self.eval_expr(&r.init) {
        Ok(v) => {
          if let Some(slot) = r.slot {
            self.bind(slot, v.clone());
          }
          resources.push((v, r.span));
        }
        Err(e) => {
          res = Err(e);
          break;
        }
      }
    }
    if res.is_ok() {
      res = self.eval_block(&t.body);
    }

    for (resource, span) in resources.into_iter().rev() {
      if let Err(e) = self.close(span, &resource) {
        tracing::warn!(at = %span, "failed to close {}", resource.type_name());
        if res.is_ok() {
          res = Err(e);
        }
      }
    }

    res = match (res, &t.catch) {
      (Err(Signal::Error(e)), Some(catch)) if e.is_catchable() => {
        if let Some(slot) = catch.slot {
          let caught = match &e.kind {
            ErrorKind::Thrown(v) => v.clone(),
            _ => Value::Error(Arc::new(e)),
          };
          self.bind(slot, caught);
        }
        self.eval_block(&catch.body)
      }
      (res, _) => res,
    };

    if let Some(finally) = &t.finally {
      self.poller.mask();
      let fin = self.eval_block(finally);
      self.poller.unmask();
      res = match (res, fin) {
        (res, Ok(_)) => res,
        (_, Err(Signal::Error(e))) => Err(Signal::Error(e)),
        (Err(Signal::Cancel(i)), Err(_)) => Err(Signal::Cancel(i)),
        (_, Err(signal)) => Err(signal),
      };
    }
    res
  }

  /// Closes a `try` resource through its `close()` method, if it has one.
  fn close(&mut self, span: Span, resource: &Value) -> Result<()> {
    let uberspect = self.runtime.uberspect.clone();
    match uberspect.resolve_method(resource, "close", &[]) {
      Resolution::Found(m) => m
        .invoke(resource, Vec::new())
        .map(|_| ())
        .map_err(|e| self.host_failure(span, e)),
      _ => Ok(()),
    }
  }

  /// Runs a switch. Colon-style cases fall through from the first match;
  /// arrow-style cases run alone.
  fn eval_switch(&mut self, sw: &syn::Switch) -> Result<Value> {
    let subject = self.eval_expr(&sw.subject)?;
    let start = match self.select_case(sw, &subject)? {
      Some(i) => i,
      None => return Ok(Value::Null),
    };

    let res = if sw.arrow {
      self.eval_case_body(&sw.cases[start].body)
    } else {
      let mut res = Ok(Value::Null);
      for case in &sw.cases[start..] {
        res = self.eval_case_body(&case.body);
        if res.is_err() {
          break;
        }
      }
      res
    };

    match res {
      Err(Signal::Yield(v)) if sw.is_expr => Ok(v),
      Err(Signal::Break(None)) if !sw.is_expr => Ok(Value::Null),
      res => res,
    }
  }

  /// Finds the case to start at: the first case with a matching label, or
  /// else the case holding `default`.
  fn select_case(
    &mut self,
    sw: &syn::Switch,
    subject: &Value,
  ) -> Result<Option<usize>> {
    let mut default = None;
    for (i, case) in sw.cases.iter().enumerate() {
      for label in &case.labels {
        match label {
          syn::CaseLabel::Default(_) => {
            default.get_or_insert(i);
          }
          syn::CaseLabel::Value(e) => {
            let v = self.eval_expr(e)?;
            if self.arith().equals(subject, &v) {
              return Ok(Some(i));
            }
          }
          syn::CaseLabel::Type(pat) => {
            let class = self.runtime.uberspect.class_of(subject);
            if !subject.is_instance(&pat.class, class.as_deref()) {
              continue;
            }
            if let Some(slot) = pat.slot {
              self.bind(slot, subject.clone());
            }
            match &pat.guard {
              Some(guard) if !self.eval_expr(guard)?.truthy() => continue,
              _ => return Ok(Some(i)),
            }
          }
        }
      }
    }
    Ok(default)
  }

  fn eval_case_body(&mut self, body: &syn::CaseBody) -> Result<Value> {
    match body {
      syn::CaseBody::Stmts(stmts) => {
        let mut last = Value::Null;
        for stmt in stmts {
          last = self.eval_stmt(stmt)?;
        }
        Ok(last)
      }
      syn::CaseBody::Expr(e) => self.eval_expr(e),
      syn::CaseBody::Block(b) => self.eval_block(b),
      syn::CaseBody::Throw(t) => self.eval_throw(t),
    }
  }

  /// Runs an annotated statement, applying annotations outermost first.
  fn eval_annotated(
    &mut self,
    annotations: &[syn::Annotation],
    body: &syn::Stmt,
  ) -> Result<Value> {
    let (ann, rest) = match annotations.split_first() {
      Some(split) => split,
      None => return self.eval_stmt(body),
    };
    let args = self.eval_args(&ann.args)?;

    match &*ann.name {
      // `@timeout(ms, default)` cancels its statement once `ms` have passed,
      // producing `default` instead.
      "timeout" => {
        let ms = match args.first().map(Value::as_int) {
          Some(Ok(ms)) if ms >= 0 => ms as u64,
          _ => error!(self, ann, "@timeout expects a number of milliseconds"),
        };
        let fallback = args.get(1).cloned().unwrap_or(Value::Null);
        let deadline = Instant::now() + Duration::from_millis(ms);
        let depth = self.poller.push_deadline(deadline);
        let res = self.eval_annotated(rest, body);
        self.poller.pop_deadline();
        match res {
          Err(Signal::Cancel(Interrupt::Deadline(d))) if d == depth => {
            tracing::debug!(ms, "statement timed out");
            Ok(fallback)
          }
          res => res,
        }
      }

      // `@silent` turns errors in its statement into null.
      "silent" => {
        self.silenced += 1;
        let res = self.eval_annotated(rest, body);
        self.silenced -= 1;
        match res {
          Err(Signal::Error(e)) if e.is_catchable() => {
            tracing::trace!(kind = e.kind.name(), "silenced error");
            Ok(Value::Null)
          }
          res => res,
        }
      }

      name => match self.context.process_annotation(name, &args) {
        AnnotationAction::Proceed => self.eval_annotated(rest, body),
        AnnotationAction::Skip(v) => Ok(v),
        AnnotationAction::Unknown => {
          if !self.quiet() {
            tracing::warn!(at = %ann.span, "unknown annotation @{}", name);
          }
          self.eval_annotated(rest, body)
        }
      },
    }
  }

  pub fn eval_expr(&mut self, expr: &syn::Expr) -> Result<Value> {
    let val = match expr {
      syn::Expr::Null(..) => Value::Null,
      syn::Expr::Bool(b, _) => Value::Bool(*b),
      syn::Expr::Num(lit, _) => match lit {
        syn::Lit::Int(n) => Value::Int(*n),
        syn::Lit::Long(n) => Value::Long(*n),
        syn::Lit::BigInt(n) => Value::BigInt(n.clone()),
        syn::Lit::Float(n) => Value::Float(*n),
        syn::Lit::Double(n) => Value::Double(*n),
        syn::Lit::BigDecimal(n) => Value::BigDecimal(n.clone()),
      },
      syn::Expr::Str(s, _) => Value::String(s.clone()),
      syn::Expr::Regex(src, span) => match self.runtime.pattern(src) {
        Ok(p) => Value::Regex(p),
        Err(e) => error!(self, span, "invalid regular expression: {}", e),
      },

      syn::Expr::Ident(id) => self.read_ident(id)?,

      // Evaluate an array literal; spread items splice in every value of an
      // iterable.
      syn::Expr::Array(items, _) => {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
          match item {
            syn::ArrayItem::Value(e) => values.push(self.eval_expr(e)?),
            syn::ArrayItem::Spread(e) => {
              let v = self.eval_expr(e)?;
              let mut cursor = self.cursor(e.span(), &v)?;
              while let Some(v) = cursor.next(&self.poller)? {
                values.push(v);
              }
            }
          }
        }
        Value::Array(Array::new(values))
      }
      syn::Expr::Set(items, _) => Value::Set(Set::new(self.eval_args(items)?)),
      syn::Expr::Map(entries, _) => {
        let map = Map::new();
        for (k, v) in entries {
          let k = self.eval_expr(k)?;
          let v = self.eval_expr(v)?;
          map.insert(k, v);
        }
        Value::Map(map)
      }

      // Create a closure, aliasing the cells of every captured variable.
      syn::Expr::Lambda(lambda) => {
        let frame = self.frame();
        let captured = lambda
          .scope
          .captures()
          .map(|(_, parent, _)| frame.cell(parent))
          .collect();
        Value::Closure(Closure::new(lambda.clone(), captured))
      }

      // A generator block runs over the cells of the current frame.
      syn::Expr::Generator(block) => {
        let top = match self.call_stack.last() {
          Some(f) => StackFrame {
            fnc: f.fnc.clone(),
            call_site: block.span,
            frame: f.frame.clone(),
          },
          None => bug!("call stack is empty"),
        };
        self.make_generator(block.span, top, GenBody::Block(block.clone()))
      }

      syn::Expr::Block(b) => self.eval_block(b)?,
      syn::Expr::Member(m) => self.eval_member(m)?,
      syn::Expr::Index(x) => {
        let base = self.eval_base(&x.base, x.safe)?;
        let index = self.eval_expr(&x.index)?;
        self.element_of(x.span, &base, &index, x.safe)?
      }
      syn::Expr::Call(c) => self.eval_call(c)?,
      syn::Expr::NsCall(c) => {
        let args = self.eval_args(&c.args)?;
        match self.namespace(&c.ns) {
          Some(ns) => self.invoke_method(c.span, &ns, &c.name, args)?,
          None => {
            let err = JexlError::new(
              self,
              ErrorKind::Method {
                name: format!("{}:{}", c.ns, c.name).into(),
                ambiguity: None,
              },
              c.span,
              format!("unknown namespace {}", c.ns),
            );
            self.degrade(err)?
          }
        }
      }
      syn::Expr::New(n) => self.eval_new(n)?,

      syn::Expr::Unary(u) => match u.op {
        syn::UnaryOp::Empty => {
          let v = self.eval_lenient(&u.arg)?;
          Value::Bool(self.is_empty(u.span, &v)?)
        }
        syn::UnaryOp::Size => {
          let v = self.eval_lenient(&u.arg)?;
          ops::int_value(self.size_of(u.span, &v)? as i64)
        }
        op => {
          let v = self.eval_expr(&u.arg)?;
          self.unary(u.span, op, &v)?
        }
      },
      syn::Expr::Binary(b) => self.eval_binary(b)?,

      // `x op ?(a, b)` holds if `x op a` or `x op b` does; `??(..)` requires
      // every comparison to hold.
      syn::Expr::Quantified(q) => {
        let lhs = self.eval_expr(&q.lhs)?;
        let mut result = q.all;
        for rhs in &q.rhs {
          let rhs = self.eval_expr(rhs)?;
          let hit = self.binary(q.span, q.op, &lhs, &rhs)?.truthy();
          if hit != q.all {
            result = hit;
            break;
          }
        }
        Value::Bool(result)
      }

      syn::Expr::InstanceOf(i) => {
        let v = self.eval_expr(&i.value)?;
        let class = self.runtime.uberspect.class_of(&v);
        Value::Bool(v.is_instance(&i.class, class.as_deref()) != i.negated)
      }

      syn::Expr::Ternary(t) => {
        if self.eval_expr(&t.cond)?.truthy() {
          self.eval_expr(&t.then)?
        } else {
          self.eval_expr(&t.otherwise)?
        }
      }

      syn::Expr::Assign(a) => self.eval_assign(a)?,

      syn::Expr::Step(s) => {
        let place = self.place(&s.target)?;
        let current = self.read_place(s.span, &place)?;
        let op = if s.increment {
          syn::BinaryOp::Add
        } else {
          syn::BinaryOp::Sub
        };
        let next = self.binary(s.span, op, &current, &Value::Int(1))?;
        self.write_place(s.span, place, next.clone())?;
        if s.prefix {
          next
        } else {
          current
        }
      }

      syn::Expr::Delete(d) => {
        match &d.target {
          syn::Expr::Member(m) => {
            let base = self.eval_expr(&m.base)?;
            self.delete_property(d.span, &base, &m.name)?;
          }
          syn::Expr::Index(x) => {
            let base = self.eval_expr(&x.base)?;
            let index = self.eval_expr(&x.index)?;
            self.delete_element(d.span, &base, &index)?;
          }
          e => error!(self, e, "can only delete properties and elements"),
        }
        Value::Null
      }

      syn::Expr::Switch(s) => self.eval_switch(s)?,
    };
    Ok(val)
  }

  /// Evaluates `expr`, treating an undefined variable as null rather than
  /// an error.
  fn eval_lenient(&mut self, expr: &syn::Expr) -> Result<Value> {
    match expr {
      syn::Expr::Ident(id) => Ok(self.lookup(id).unwrap_or(Value::Null)),
      syn::Expr::Member(m) if m.antish.is_some() && self.options.antish() => {
        Ok(self.resolve_antish(m)?.unwrap_or(Value::Null))
      }
      e => self.eval_expr(e),
    }
  }

  /// Evaluates the base of a navigation; safe navigation tolerates an
  /// undefined base.
  fn eval_base(&mut self, expr: &syn::Expr, safe: bool) -> Result<Value> {
    if safe || self.options.safe() {
      self.eval_lenient(expr)
    } else {
      self.eval_expr(expr)
    }
  }

  fn eval_member(&mut self, m: &syn::Member) -> Result<Value> {
    if let Some(path) = &m.antish {
      if self.options.antish() {
        return match self.resolve_antish(m)? {
          Some(v) => Ok(v),
          None if self.options.safe() => Ok(Value::Null),
          None => self.undefined_variable(m.span, path),
        };
      }
    }
    let base = self.eval_base(&m.base, m.safe)?;
    self.member_of(m.span, &base, &m.name, m.safe)
  }

  /// Resolves a dotted chain of identifiers rooted at a context variable.
  /// When the root is undefined, the longest defined prefix of the path,
  /// taken as a single context key, stands in for it.
  fn resolve_antish(&mut self, m: &syn::Member) -> Result<Option<Value>> {
    let base = match &m.base {
      syn::Expr::Ident(id) => self.lookup(id),
      syn::Expr::Member(inner) if inner.antish.is_some() => {
        self.resolve_antish(inner)?
      }
      e => Some(self.eval_expr(e)?),
    };
    match base {
      Some(b) => self.member_of(m.span, &b, &m.name, m.safe).map(Some),
      None => Ok(m.antish.as_ref().and_then(|path| self.context.get(path))),
    }
  }

  fn member_of(
    &mut self,
    span: Span,
    base: &Value,
    name: &str,
    safe: bool,
  ) -> Result<Value> {
    if base.is_null() {
      if safe || self.options.safe() {
        return Ok(Value::Null);
      }
      let err = JexlError::new(
        self,
        ErrorKind::Property(name.into()),
        span,
        format!("cannot read property '{}' of null", name),
      );
      return self.degrade(err);
    }
    match self.get_property(span, base, name)? {
      Some(v) => Ok(v),
      None => {
        let err = JexlError::new(
          self,
          ErrorKind::Property(name.into()),
          span,
          format!("unsolvable property '{}' on {}", name, base.type_name()),
        );
        self.degrade(err)
      }
    }
  }

  fn element_of(
    &mut self,
    span: Span,
    base: &Value,
    index: &Value,
    safe: bool,
  ) -> Result<Value> {
    if base.is_null() {
      if safe || self.options.safe() {
        return Ok(Value::Null);
      }
      let err = JexlError::new(
        self,
        ErrorKind::Property(index.to_display_string().into()),
        span,
        format!("cannot index null with {}", index),
      );
      return self.degrade(err);
    }
    match self.get_element(span, base, index)? {
      Some(v) => Ok(v),
      None => {
        let err = JexlError::new(
          self,
          ErrorKind::Property(index.to_display_string().into()),
          span,
          format!("unsolvable element {} of {}", index, base.type_name()),
        );
        self.degrade(err)
      }
    }
  }

  /// Reads a property; `None` means it could not be resolved.
  fn get_property(
    &mut self,
    span: Span,
    obj: &Value,
    name: &str,
  ) -> Result<Option<Value>> {
    match self.runtime.operators.property_get(obj, name) {
      Overload::Handled(v) => return Ok(Some(v)),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    if let Value::Map(m) = obj {
      return Ok(Some(m.get_str(name).unwrap_or(Value::Null)));
    }
    match self.runtime.uberspect.resolve_property_get(obj, name) {
      Some(get) => get(obj).map(Some).map_err(|e| self.host_failure(span, e)),
      None => Ok(None),
    }
  }

  /// Reads an element; `None` means it could not be resolved.
  fn get_element(
    &mut self,
    span: Span,
    obj: &Value,
    index: &Value,
  ) -> Result<Option<Value>> {
    match self.runtime.operators.array_get(obj, index) {
      Overload::Handled(v) => return Ok(Some(v)),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    let position = index.as_int().ok().and_then(|i| usize::try_from(i).ok());
    Ok(match obj {
      Value::Array(a) => position.and_then(|i| a.get(i)),
      Value::Map(m) => Some(m.get(index).unwrap_or(Value::Null)),
      Value::Range(r) => position
        .and_then(|i| r.get(i as u64))
        .map(ops::int_value),
      Value::String(s) => position
        .and_then(|i| s.chars().nth(i))
        .map(|c| Value::String(c.to_string().into())),
      _ => match index {
        Value::String(name) => return self.get_property(span, obj, name),
        _ => None,
      },
    })
  }

  fn eval_call(&mut self, c: &syn::Call) -> Result<Value> {
    match &c.callee {
      syn::Expr::Member(m) => {
        let base = self.eval_base(&m.base, m.safe)?;
        let args = self.eval_args(&c.args)?;
        if base.is_null() {
          if m.safe || self.options.safe() {
            return Ok(Value::Null);
          }
          let err = JexlError::new(
            self,
            ErrorKind::Method {
              name: m.name.clone(),
              ambiguity: None,
            },
            c.span,
            format!("cannot call {}() on null", m.name),
          );
          return self.degrade(err);
        }
        self.invoke_method(c.span, &base, &m.name, args)
      }

      // A plain name calls a variable holding a callable, or else a
      // function of the unnamed namespace.
      syn::Expr::Ident(id) => {
        let f = self.lookup(id);
        let args = self.eval_args(&c.args)?;
        match f {
          Some(f) if f.is_callable() => self.call_value(c.span, &f, args),
          Some(v) if !v.is_null() => error!(
            self,
            c.span,
            kind: ErrorKind::Method {
              name: id.name.clone(),
              ambiguity: None,
            },
            "{} is not callable: {}",
            id.name,
            v.type_name()
          ),
          _ => match self.namespace("") {
            Some(ns) => self.invoke_method(c.span, &ns, &id.name, args),
            None => {
              let err = JexlError::new(
                self,
                ErrorKind::Method {
                  name: id.name.clone(),
                  ambiguity: None,
                },
                c.span,
                format!("unsolvable function {}()", id.name),
              );
              self.degrade(err)
            }
          },
        }
      }

      callee => {
        let f = self.eval_expr(callee)?;
        let args = self.eval_args(&c.args)?;
        if f.is_null() && self.options.safe() {
          return Ok(Value::Null);
        }
        self.call_value(c.span, &f, args)
      }
    }
  }

  fn namespace(&self, name: &str) -> Option<Value> {
    self
      .context
      .resolve_namespace(name)
      .or_else(|| self.runtime.namespaces.get(name).cloned())
  }

  /// Calls `recv.name(args)`: a callable map entry, a host method, or a
  /// property holding a callable, in that order.
  fn invoke_method(
    &mut self,
    span: Span,
    recv: &Value,
    name: &str,
    args: Vec<Value>,
  ) -> Result<Value> {
    if let Value::Map(map) = recv {
      if let Some(f) = map.get_str(name) {
        if f.is_callable() {
          return self.call_value(span, &f, args);
        }
      }
    }

    // Pulled here rather than through the host class, so that waiting on
    // the body observes this evaluation's deadlines.
    if let (Value::Generator(g), "next") = (recv, name) {
      let mut cursor = Cursor::Generator(g.clone());
      return Ok(cursor.next(&self.poller)?.unwrap_or(Value::Null));
    }

    let uberspect = self.runtime.uberspect.clone();
    match uberspect.resolve_method(recv, name, &args) {
      Resolution::Found(m) => {
        return m.invoke(recv, args).map_err(|e| self.host_failure(span, e))
      }
      Resolution::Ambiguous(signatures) => error!(
        self,
        span,
        kind: ErrorKind::Method {
          name: name.into(),
          ambiguity: Some(signatures),
        },
        "ambiguous call to {}() on {}",
        name,
        recv.type_name()
      ),
      Resolution::Missing => {}
    }

    if !matches!(recv, Value::Map(_)) {
      if let Some(f) = self.get_property(span, recv, name)? {
        if f.is_callable() {
          return self.call_value(span, &f, args);
        }
      }
    }

    let err = JexlError::new(
      self,
      ErrorKind::Method {
        name: name.into(),
        ambiguity: None,
      },
      span,
      format!("unsolvable method {}() on {}", name, recv.type_name()),
    );
    self.degrade(err)
  }

  fn eval_new(&mut self, n: &syn::New) -> Result<Value> {
    let uberspect = self.runtime.uberspect.clone();
    let (what, class): (Arc<str>, _) = match &n.class {
      syn::NewClass::Named(name) => (name.clone(), uberspect.class(name)),
      syn::NewClass::Expr(e) => match self.eval_expr(e)? {
        Value::Class(c) => (c.name().into(), Some(c)),
        Value::String(s) => (s.clone(), uberspect.class(&s)),
        v => (v.type_name().into(), None),
      },
    };
    let args = self.eval_args(&n.args)?;

    let class = match class {
      Some(c) => c,
      None => {
        let err = JexlError::new(
          self,
          ErrorKind::Method {
            name: what.clone(),
            ambiguity: None,
          },
          n.span,
          format!("unknown class {}", what),
        );
        return self.degrade(err);
      }
    };
    match uberspect.resolve_constructor(&class, &args) {
      Resolution::Found(m) => m
        .invoke(&Value::Class(class.clone()), args)
        .map_err(|e| self.host_failure(n.span, e)),
      Resolution::Ambiguous(signatures) => error!(
        self,
        n.span,
        kind: ErrorKind::Method {
          name: what,
          ambiguity: Some(signatures),
        },
        "ambiguous constructor of {}",
        class.name()
      ),
      Resolution::Missing => {
        let err = JexlError::new(
          self,
          ErrorKind::Method {
            name: what,
            ambiguity: None,
          },
          n.span,
          format!("no matching constructor of {}", class.name()),
        );
        self.degrade(err)
      }
    }
  }

  fn unary(
    &mut self,
    span: Span,
    op: syn::UnaryOp,
    v: &Value,
  ) -> Result<Value> {
    match self.runtime.operators.unary(op, v) {
      Overload::Handled(r) => return Ok(r),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    match self.arith().unary(op, v) {
      Ok(r) => Ok(r),
      Err(e) => self.arith_failure(span, op.symbol(), e),
    }
  }

  fn eval_binary(&mut self, b: &syn::Binary) -> Result<Value> {
    use syn::BinaryOp as Op;
    match b.op {
      Op::And => {
        if !self.eval_expr(&b.lhs)?.truthy() {
          return Ok(Value::Bool(false));
        }
        Ok(Value::Bool(self.eval_expr(&b.rhs)?.truthy()))
      }
      Op::Or => {
        if self.eval_expr(&b.lhs)?.truthy() {
          return Ok(Value::Bool(true));
        }
        Ok(Value::Bool(self.eval_expr(&b.rhs)?.truthy()))
      }
      Op::Coalesce => match self.eval_lenient(&b.lhs)? {
        Value::Null => self.eval_expr(&b.rhs),
        v => Ok(v),
      },
      Op::Elvis => match self.eval_lenient(&b.lhs)? {
        v if v.truthy() => Ok(v),
        _ => self.eval_expr(&b.rhs),
      },
      op => {
        let lhs = self.eval_expr(&b.lhs)?;
        let rhs = self.eval_expr(&b.rhs)?;
        self.binary(b.span, op, &lhs, &rhs)
      }
    }
  }

  /// Applies a strict binary operator: host overrides first, then the
  /// default arithmetic and data model.
  fn binary(
    &mut self,
    span: Span,
    op: syn::BinaryOp,
    lhs: &Value,
    rhs: &Value,
  ) -> Result<Value> {
    use syn::BinaryOp as Op;
    match self.runtime.operators.binary(op, lhs, rhs) {
      Overload::Handled(v) => return Ok(v),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }

    let hit = match op {
      Op::Contains => self.matches(span, lhs, rhs)?,
      Op::NotContains => !self.matches(span, lhs, rhs)?,
      Op::StartsWith => self.starts_with(span, lhs, rhs)?,
      Op::NotStartsWith => !self.starts_with(span, lhs, rhs)?,
      Op::EndsWith => self.ends_with(span, lhs, rhs)?,
      Op::NotEndsWith => !self.ends_with(span, lhs, rhs)?,
      Op::Lt | Op::Le | Op::Gt | Op::Ge => {
        match self.runtime.operators.compare(lhs, rhs) {
          Overload::Handled(ord) => match op {
            Op::Lt => ord.is_lt(),
            Op::Le => ord.is_le(),
            Op::Gt => ord.is_gt(),
            _ => ord.is_ge(),
          },
          Overload::Failed(msg) => {
            error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
          }
          Overload::NotApplicable => return self.arithmetic(span, op, lhs, rhs),
        }
      }
      op => return self.arithmetic(span, op, lhs, rhs),
    };
    Ok(Value::Bool(hit))
  }

  fn arithmetic(
    &self,
    span: Span,
    op: syn::BinaryOp,
    lhs: &Value,
    rhs: &Value,
  ) -> Result<Value> {
    match self.arith().binary(op, lhs, rhs) {
      Ok(v) => Ok(v),
      Err(e) => self.arith_failure(span, op.symbol(), e),
    }
  }

  fn eval_assign(&mut self, a: &syn::Assign) -> Result<Value> {
    let place = self.place(&a.target)?;
    let value = match a.op {
      None => self.eval_expr(&a.value)?,
      Some(op) => {
        let current = self.read_place(a.span, &place)?;
        let rhs = self.eval_expr(&a.value)?;
        match self.runtime.operators.self_assign(op, &current, &rhs) {
          // The left-hand side was updated in place; there is nothing to
          // store.
          Overload::Handled(SelfAssign::InPlace) => return Ok(current),
          Overload::Handled(SelfAssign::Value(v)) => v,
          Overload::Failed(msg) => {
            error!(self, a.span, kind: ErrorKind::TryFailed, "{}", msg)
          }
          Overload::NotApplicable => self.binary(a.span, op, &current, &rhs)?,
        }
      }
    };
    self.write_place(a.span, place, value.clone())?;
    Ok(value)
  }

  /// Resolves an assignment target.
  fn place(&mut self, target: &syn::Expr) -> Result<Place> {
    match target {
      syn::Expr::Ident(id) => Ok(match id.symbol {
        Symbol::Local { slot } => Place::Local(slot),
        Symbol::Global { .. } => Place::Global(id.name.clone()),
      }),
      syn::Expr::Member(m) => {
        if let Some(path) = &m.antish {
          if self.options.antish() {
            // `a.b.c = x`, with no `a.b` to hold `c`, sets the flat
            // variable `a.b.c`.
            let base = match &m.base {
              syn::Expr::Ident(id) => self.lookup(id),
              syn::Expr::Member(inner) if inner.antish.is_some() => {
                self.resolve_antish(inner)?
              }
              e => Some(self.eval_expr(e)?),
            };
            return Ok(match base {
              Some(b) => Place::Property(b, m.name.clone()),
              None => Place::Global(path.clone()),
            });
          }
        }
        let base = self.eval_expr(&m.base)?;
        Ok(Place::Property(base, m.name.clone()))
      }
      syn::Expr::Index(x) => {
        let base = self.eval_expr(&x.base)?;
        let index = self.eval_expr(&x.index)?;
        Ok(Place::Element(base, index))
      }
      e => error!(
        self,
        e,
        kind: ErrorKind::Assignment("<expression>".into()),
        "invalid assignment target"
      ),
    }
  }

  fn read_place(&mut self, span: Span, place: &Place) -> Result<Value> {
    match place {
      Place::Local(slot) => Ok(self.frame().get(*slot).value_or_null()),
      Place::Global(name) => match self.context.get(name) {
        Some(v) => Ok(v),
        None => self.undefined_variable(span, name),
      },
      Place::Property(obj, name) => self.member_of(span, obj, name, false),
      Place::Element(obj, index) => self.element_of(span, obj, index, false),
    }
  }

  fn write_place(
    &mut self,
    span: Span,
    place: Place,
    value: Value,
  ) -> Result<()> {
    match place {
      Place::Local(slot) => self.frame().set(slot, value),
      Place::Global(name) => self.context.set(&name, value),
      Place::Property(obj, name) => {
        self.set_property(span, &obj, &name, value)?
      }
      Place::Element(obj, index) => {
        self.set_element(span, &obj, &index, value)?
      }
    }
    Ok(())
  }

  fn set_property(
    &mut self,
    span: Span,
    obj: &Value,
    name: &str,
    value: Value,
  ) -> Result<()> {
    match self.runtime.operators.property_set(obj, name, &value) {
      Overload::Handled(()) => return Ok(()),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    if let Value::Map(m) = obj {
      m.insert(Value::String(name.into()), value);
      return Ok(());
    }
    if let Some(set) = self.runtime.uberspect.resolve_property_set(obj, name) {
      return set(obj, value).map_err(|e| self.host_failure(span, e));
    }
    let err = JexlError::new(
      self,
      ErrorKind::Property(name.into()),
      span,
      format!("cannot set property '{}' on {}", name, obj.type_name()),
    );
    self.degrade(err).map(|_| ())
  }

  fn set_element(
    &mut self,
    span: Span,
    obj: &Value,
    index: &Value,
    value: Value,
  ) -> Result<()> {
    match self.runtime.operators.array_set(obj, index, &value) {
      Overload::Handled(()) => return Ok(()),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    match (obj, index) {
      (Value::Map(m), _) => {
        m.insert(index.clone(), value);
        Ok(())
      }
      (Value::Array(a), _) => {
        let stored = index
          .as_int()
          .ok()
          .and_then(|i| usize::try_from(i).ok())
          .map_or(false, |i| a.set(i, value));
        if stored {
          return Ok(());
        }
        let err = JexlError::new(
          self,
          ErrorKind::Property(index.to_display_string().into()),
          span,
          format!("index {} out of bounds", index),
        );
        self.degrade(err).map(|_| ())
      }
      (_, Value::String(name)) => self.set_property(span, obj, name, value),
      _ => {
        let err = JexlError::new(
          self,
          ErrorKind::Property(index.to_display_string().into()),
          span,
          format!("cannot set element {} of {}", index, obj.type_name()),
        );
        self.degrade(err).map(|_| ())
      }
    }
  }

  fn delete_property(
    &mut self,
    span: Span,
    obj: &Value,
    name: &str,
  ) -> Result<()> {
    match self.runtime.operators.property_delete(obj, name) {
      Overload::Handled(()) => return Ok(()),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    match obj {
      Value::Map(m) => {
        m.remove(&Value::String(name.into()));
        Ok(())
      }
      _ => {
        let err = JexlError::new(
          self,
          ErrorKind::Property(name.into()),
          span,
          format!("cannot delete property '{}' of {}", name, obj.type_name()),
        );
        self.degrade(err).map(|_| ())
      }
    }
  }

  fn delete_element(
    &mut self,
    span: Span,
    obj: &Value,
    index: &Value,
  ) -> Result<()> {
    match self.runtime.operators.array_delete(obj, index) {
      Overload::Handled(()) => return Ok(()),
      Overload::Failed(msg) => {
        error!(self, span, kind: ErrorKind::TryFailed, "{}", msg)
      }
      Overload::NotApplicable => {}
    }
    match (obj, index) {
      (Value::Map(m), _) => {
        m.remove(index);
        Ok(())
      }
      (Value::Set(s), _) => {
        s.remove(index);
        Ok(())
      }
      (Value::Array(a), _) => {
        let removed = index
          .as_int()
          .ok()
          .and_then(|i| usize::try_from(i).ok())
          .and_then(|i| a.remove(i));
        match removed {
          Some(_) => Ok(()),
          None => error!(
            self,
            span,
            kind: ErrorKind::Property(index.to_display_string().into()),
            "index {} out of bounds",
            index
          ),
        }
      }
      (_, Value::String(name)) => self.delete_property(span, obj, name),
      _ => error!(
        self,
        span,
        kind: ErrorKind::Property(index.to_display_string().into()),
        "cannot delete element {} of {}",
        index,
        obj.type_name()
      ),
    }
  }
}
