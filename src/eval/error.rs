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

//! Error generation for JEXL evaluation.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::eval::value::Value;
use crate::eval::Interpreter;
use crate::syn::ParseError;
use crate::syn::ParseErrorKind;
use crate::syn::Span;

/// An error raised by host code: a native function, a host method, or an
/// operator hook.
pub type HostError = Arc<dyn StdError + Send + Sync>;

/// Builds a `HostError` out of a message.
pub fn host_error(message: impl Into<String>) -> HostError {
  let boxed: Box<dyn StdError + Send + Sync> = message.into().into();
  Arc::from(boxed)
}

/// Which stack limit was exhausted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Overflow {
  /// The configured call-depth limit.
  Guarded {
    /// The configured limit.
    limit: usize,
  },
  /// The host thread's call stack.
  Host,
}

impl fmt::Display for Overflow {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Overflow::Guarded { limit } => write!(f, "call depth exceeds {}", limit),
      Overflow::Host => write!(f, "host stack exhausted"),
    }
  }
}

/// The kind of a `JexlError`.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ErrorKind {
  /// Malformed or disallowed syntax.
  #[error("parse error")]
  Parsing,
  /// An undefined variable.
  #[error("undefined variable {0}")]
  Variable(Arc<str>),
  /// An unresolvable property.
  #[error("unsolvable property '{0}'")]
  Property(Arc<str>),
  /// An unresolvable or ambiguous method.
  #[error("unsolvable method '{name}'{}", ambiguity_suffix(.ambiguity))]
  Method {
    /// The method name.
    name: Arc<str>,
    /// For an ambiguous call, the conflicting signatures.
    ambiguity: Option<String>,
  },
  /// An operator that does not apply to its operands.
  #[error("unsupported operator '{0}'")]
  Operator(&'static str),
  /// An illegal assignment.
  #[error("cannot assign to {0}")]
  Assignment(Arc<str>),
  /// A stack limit was exhausted.
  #[error("stack overflow: {0}")]
  StackOverflow(Overflow),
  /// Evaluation was cancelled.
  #[error("execution cancelled")]
  Cancel,
  /// An operator overload started, then refused to produce a value.
  #[error("operator overload failed")]
  TryFailed,
  /// A value raised by `throw`.
  #[error("thrown {0}")]
  Thrown(Value),
  /// A runtime type error.
  #[error("evaluation error")]
  Eval,
  /// A failure inside host code.
  #[error("host error: {0}")]
  Host(HostError),
}

fn ambiguity_suffix(ambiguity: &Option<String>) -> String {
  match ambiguity {
    Some(a) => format!(", ambiguous between {}", a),
    None => String::new(),
  }
}

impl ErrorKind {
  /// Returns a short name for this kind.
  pub fn name(&self) -> &'static str {
    match self {
      ErrorKind::Parsing => "parsing",
      ErrorKind::Variable(..) => "variable",
      ErrorKind::Property(..) => "property",
      ErrorKind::Method { .. } => "method",
      ErrorKind::Operator(..) => "operator",
      ErrorKind::Assignment(..) => "assignment",
      ErrorKind::StackOverflow(..) => "stack-overflow",
      ErrorKind::Cancel => "cancel",
      ErrorKind::TryFailed => "try-failed",
      ErrorKind::Thrown(..) => "thrown",
      ErrorKind::Eval => "eval",
      ErrorKind::Host(..) => "host",
    }
  }

  /// Returns the symbol this error is about, if any: the variable, property,
  /// method, or operator name.
  pub fn symbol(&self) -> Option<&str> {
    match self {
      ErrorKind::Variable(n)
      | ErrorKind::Property(n)
      | ErrorKind::Assignment(n)
      | ErrorKind::Method { name: n, .. } => Some(n),
      ErrorKind::Operator(op) => Some(op),
      _ => None,
    }
  }
}

/// A `JexlError` is any error raised while compiling or evaluating a script;
/// it records its kind, a message, the offending span, and a stack trace.
#[derive(Clone, Debug)]
pub struct JexlError {
  pub kind: ErrorKind,
  pub message: String,
  pub span: Span,
  pub trace: Vec<Frame>,
}

impl JexlError {
  /// Creates a new `JexlError` at the given span, recording the interpreter's
  /// current call stack.
  pub fn new(
    interp: &Interpreter,
    kind: ErrorKind,
    span: Span,
    message: String,
  ) -> Self {
    let stack = &interp.call_stack;
    let height = stack.len();
    let mut trace = Vec::with_capacity(height);

    // Each stack frame records where it was called from; the innermost frame
    // reports the error's own span instead.
    for i in (0..height).rev() {
      let fn_name = match &stack[i].fnc {
        _ if i == 0 => "<script>".to_string(),
        Value::Closure(c) => c.to_string(),
        f => f.to_string(),
      };

      let error_span = if i == height - 1 {
        span
      } else {
        stack[i + 1].call_site
      };

      trace.push(Frame {
        fn_name,
        error_span,
      })
    }

    JexlError {
      kind,
      message,
      span,
      trace,
    }
  }

  /// Creates a new `JexlError` with no stack trace.
  pub fn bare(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
    JexlError {
      kind,
      message: message.into(),
      span,
      trace: Vec::new(),
    }
  }

  /// Returns whether a script `catch` may intercept this error.
  pub fn is_catchable(&self) -> bool {
    !matches!(self.kind, ErrorKind::Cancel | ErrorKind::StackOverflow(_))
  }

  /// Returns whether this error reports a cancellation.
  pub fn is_cancel(&self) -> bool {
    matches!(self.kind, ErrorKind::Cancel)
  }

  /// Writes a human-readable rendition of this error, including its stack
  /// trace, to `w`.
  pub fn symbolize(&self, w: &mut impl fmt::Write) -> fmt::Result {
    write!(w, "error: {}", self.message)?;
    if let Some((line, col)) = self.span.start_position() {
      write!(w, " at {}:{}", line, col)?;
    }
    writeln!(w)?;
    if self.trace.is_empty() {
      return Ok(());
    }

    writeln!(w, "stack dump:")?;
    for frame in &self.trace {
      writeln!(w, "* {} at ({})", frame.fn_name, frame.error_span)?;
    }
    Ok(())
  }
}

impl fmt::Display for JexlError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    self.symbolize(f)
  }
}

impl StdError for JexlError {
  fn source(&self) -> Option<&(dyn StdError + 'static)> {
    match &self.kind {
      ErrorKind::Host(e) => Some(&**e),
      _ => None,
    }
  }
}

impl From<ParseError> for JexlError {
  fn from(e: ParseError) -> Self {
    let kind = match &e.kind {
      ParseErrorKind::ConstAssign(name) => ErrorKind::Assignment(name.clone()),
      _ => ErrorKind::Parsing,
    };
    JexlError::bare(kind, e.span, e.message)
  }
}

/// A `Frame` is stack frame information relating to an evaluation error.
#[derive(Clone, Debug)]
pub struct Frame {
  pub fn_name: String,
  pub error_span: Span,
}

/// Generates, and returns, a `JexlError` given an `Interpreter`, a `Spanned`,
/// an optional `kind: ..`, and a formatted message.
macro_rules! error {
  ($ctx:expr, $expr:expr, kind: $kind:expr, $($tt:tt)*) => {{
    #[allow(unused_imports)]
    use $crate::syn::Spanned;
    #[allow(unused_imports)]
    use $crate::eval::error::*;
    return Err(
      JexlError::new($ctx, $kind, $expr.span(), format!($($tt)*)).into()
    )
  }};
  ($ctx:expr, $expr:expr, $($tt:tt)*) => {{
    error!($ctx, $expr, kind: $crate::eval::error::ErrorKind::Eval, $($tt)*)
  }};
}

macro_rules! bug {
  ($($tt:tt)*) => {{
    eprintln!("error: internal interpreter error; this is a bug\nerror: ");
    eprintln!($($tt)*);
    panic!()
  }}
}
