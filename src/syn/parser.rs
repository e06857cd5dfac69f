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

//! The nuts and bolts of the JEXL parser.
//!
//! Scope resolution happens while the tree is built: every identifier leaves
//! the parser already bound to a frame slot or marked as a context variable.

#![allow(clippy::upper_case_acronyms)]

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use pest::error::ErrorVariant;
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Position;

use pest_derive::Parser;

use crate::eval::escaping;
use crate::syn;
use crate::syn::scope::DeclError;
use crate::syn::scope::DeclKind;
use crate::syn::scope::ScopeBuilder;
use crate::syn::Features;
use crate::syn::Span;
use crate::syn::Spanned as _;
use crate::syn::Symbol;

/// The reason a parse failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
  /// The text does not match the grammar.
  Syntax,
  /// A variable was declared twice in the same lexical scope.
  Redeclared(Arc<str>),
  /// A constant was the target of an assignment.
  ConstAssign(Arc<str>),
  /// A switch has more than one `default` label.
  DuplicateDefault,
  /// A `break` or `continue` has no matching target.
  BadJump,
  /// An assignment, increment, or `delete` has an invalid target.
  BadTarget,
  /// A literal could not be decoded.
  BadLiteral,
}

/// A `ParseError` represents a parse failure at some `Span`.
#[derive(Clone, Debug)]
pub struct ParseError {
  /// What went wrong.
  pub kind: ParseErrorKind,
  /// The `Span` at which the error occured.
  pub span: Span,
  /// An error message.
  pub message: String,
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}: {}", self.span, self.message)
  }
}

impl std::error::Error for ParseError {}

type Result<T> = std::result::Result<T, ParseError>;

/// Parses `input` as a script whose parameters are `params`.
pub fn parse(
  input: &str,
  params: &[&str],
  features: Features,
) -> Result<syn::Unit> {
  let pair = run(Rule::Unit, input)?;
  let mut ctx = Context::new(input, features);
  let span = ctx.span(pair.as_span());

  ctx.enter_fn();
  let mut param_list = Vec::new();
  for &name in params {
    let name: Arc<str> = name.into();
    let slot = ctx.declare_param(name.clone(), false, span)?;
    param_list.push(syn::Param {
      name,
      slot,
      default: None,
      span,
    });
  }

  let mut stmts = Vec::new();
  for pair in pair.into_inner() {
    match pair.as_rule() {
      Rule::EOI => break,
      _ => stmts.push(ctx.parse_stmt(pair)?),
    }
  }
  let (scope, is_generator) = ctx.exit_fn();

  Ok(syn::Unit {
    lambda: Arc::new(syn::Lambda {
      name: None,
      params: param_list,
      body: syn::Block { stmts, span },
      scope,
      source: input.into(),
      is_generator,
      span,
    }),
    globals: ctx.globals,
  })
}

/// Parses `input` as a single expression.
pub fn parse_expression(input: &str, features: Features) -> Result<syn::Unit> {
  let pair = run(Rule::ExprUnit, input)?;
  let mut ctx = Context::new(input, features);
  let span = ctx.span(pair.as_span());

  ctx.enter_fn();
  let mut stmts = Vec::new();
  for pair in pair.into_inner() {
    match pair.as_rule() {
      Rule::EOI => break,
      _ => stmts.push(syn::Stmt::Expr(ctx.parse_expr(pair)?)),
    }
  }
  let (scope, is_generator) = ctx.exit_fn();

  Ok(syn::Unit {
    lambda: Arc::new(syn::Lambda {
      name: None,
      params: Vec::new(),
      body: syn::Block { stmts, span },
      scope,
      source: input.into(),
      is_generator,
      span,
    }),
    globals: ctx.globals,
  })
}

fn run(rule: Rule, input: &str) -> Result<Pair<'_, Rule>> {
  use pest::Parser as _;
  match PegParser::parse(rule, input) {
    Ok(mut pairs) => Ok(pairs.next().unwrap()),
    Err(err) => {
      let (start, end) = match err.location {
        InputLocation::Pos(pos) => (pos, pos),
        InputLocation::Span(span) => span,
      };
      let (line, col) = Position::new(input, start)
        .map(|p| p.line_col())
        .unwrap_or((1, 1));

      let message = match err.variant {
        ErrorVariant::ParsingError { positives, .. }
          if !positives.is_empty() =>
        {
          let expected = positives
            .iter()
            .map(|r| format!("{:?}", r))
            .collect::<Vec<_>>()
            .join(", ");
          format!("syntax error; expected one of: {}", expected)
        }
        ErrorVariant::CustomError { message } => message,
        _ => "syntax error".to_string(),
      };

      Err(ParseError {
        kind: ParseErrorKind::Syntax,
        span: Span::new(start, end, line, col),
        message,
      })
    }
  }
}

#[derive(Parser)]
#[grammar = "syn/jexl.pest"]
struct PegParser;

#[derive(Copy, Clone, PartialEq, Eq)]
enum TargetKind {
  Loop,
  Switch,
  Block,
}

struct Target {
  label: Option<Arc<str>>,
  kind: TargetKind,
}

enum YieldScope {
  Generator(bool),
  Switch,
}

struct Context<'i> {
  input: &'i str,
  scopes: ScopeBuilder,
  globals: Vec<Vec<Arc<str>>>,
  seen_globals: HashSet<Vec<Arc<str>>>,
  // Jump targets, per lambda or generator block; jumps never cross them.
  targets: Vec<Vec<Target>>,
  yields: Vec<YieldScope>,
}

impl<'i> Context<'i> {
  fn new(input: &'i str, features: Features) -> Self {
    Self {
      input,
      scopes: ScopeBuilder::new(features.lexical),
      globals: Vec::new(),
      seen_globals: HashSet::new(),
      targets: Vec::new(),
      yields: Vec::new(),
    }
  }

  fn span(&self, span: pest::Span<'i>) -> Span {
    let (line, col) = span.start_pos().line_col();
    Span::new(span.start(), span.end(), line, col)
  }

  fn error<T>(
    &self,
    span: Span,
    kind: ParseErrorKind,
    message: impl Into<String>,
  ) -> Result<T> {
    Err(ParseError {
      kind,
      span,
      message: message.into(),
    })
  }

  fn enter_fn(&mut self) {
    self.scopes.push_fn();
    self.targets.push(Vec::new());
    self.yields.push(YieldScope::Generator(false));
  }

  fn exit_fn(&mut self) -> (Arc<syn::Scope>, bool) {
    self.targets.pop();
    let is_generator =
      matches!(self.yields.pop(), Some(YieldScope::Generator(true)));
    (self.scopes.pop_fn(), is_generator)
  }

  fn redeclared<T>(&self, err: DeclError, span: Span) -> Result<T> {
    match err {
      DeclError::Redeclared(name) => self.error(
        span,
        ParseErrorKind::Redeclared(name.clone()),
        format!("{}: variable is already declared", name),
      ),
    }
  }

  fn declare_param(
    &mut self,
    name: Arc<str>,
    constant: bool,
    span: Span,
  ) -> Result<usize> {
    match self.scopes.declare_param(name, constant) {
      Ok(slot) => Ok(slot),
      Err(e) => self.redeclared(e, span),
    }
  }

  fn declare(
    &mut self,
    name: Arc<str>,
    kind: DeclKind,
    has_init: bool,
    span: Span,
  ) -> Result<syn::scope::Decl> {
    match self.scopes.declare(name, kind, has_init) {
      Ok(decl) => Ok(decl),
      Err(e) => self.redeclared(e, span),
    }
  }

  fn record_global(&mut self, path: Vec<Arc<str>>) {
    if self.seen_globals.insert(path.clone()) {
      self.globals.push(path);
    }
  }

  fn decl_kind(&self, pair: &Pair<'i, Rule>) -> DeclKind {
    match pair.as_str() {
      "let" => DeclKind::Let,
      "const" => DeclKind::Const,
      _ => DeclKind::Var,
    }
  }

  fn ident(&mut self, pair: Pair<'i, Rule>) -> syn::Ident {
    let name: Arc<str> = pair.as_str().into();
    syn::Ident {
      symbol: self.scopes.resolve(&name),
      name,
      span: self.span(pair.as_span()),
    }
  }

  fn parse_block(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Block> {
    let span = self.span(pair.as_span());
    self.scopes.push_block();
    let mut stmts = Vec::new();
    for pair in pair.into_inner() {
      stmts.push(self.parse_stmt(pair)?);
    }
    self.scopes.pop_block();
    Ok(syn::Block { stmts, span })
  }

  fn parse_loop_body(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Stmt> {
    self.push_target(None, TargetKind::Loop);
    let body = self.parse_stmt(pair);
    self.pop_target();
    body
  }

  fn push_target(&mut self, label: Option<Arc<str>>, kind: TargetKind) {
    if let Some(targets) = self.targets.last_mut() {
      targets.push(Target { label, kind });
    }
  }

  fn pop_target(&mut self) {
    if let Some(targets) = self.targets.last_mut() {
      targets.pop();
    }
  }

  fn check_jump(
    &self,
    label: Option<&str>,
    is_continue: bool,
    span: Span,
  ) -> Result<()> {
    let targets = match self.targets.last() {
      Some(t) => t,
      None => return Ok(()),
    };
    let found = match label {
      None => targets.iter().any(|t| {
        t.kind == TargetKind::Loop
          || (!is_continue && t.kind == TargetKind::Switch)
      }),
      Some(l) => targets.iter().any(|t| {
        t.label.as_deref() == Some(l)
          && (!is_continue || t.kind == TargetKind::Loop)
      }),
    };
    if found {
      return Ok(());
    }
    let what = if is_continue { "continue" } else { "break" };
    match label {
      Some(l) => self.error(
        span,
        ParseErrorKind::BadJump,
        format!("{} {}: no such label", what, l),
      ),
      None => self.error(
        span,
        ParseErrorKind::BadJump,
        format!("{} outside of loop", what),
      ),
    }
  }

  fn check_target(&self, target: &syn::Expr) -> Result<()> {
    match target {
      syn::Expr::Ident(id) => {
        if let Symbol::Local { slot } = id.symbol {
          if self.scopes.is_constant(slot) {
            return self.error(
              id.span,
              ParseErrorKind::ConstAssign(id.name.clone()),
              format!("{}: cannot assign to constant", id.name),
            );
          }
        }
        Ok(())
      }
      syn::Expr::Member(m) if !m.safe => Ok(()),
      syn::Expr::Index(i) if !i.safe => Ok(()),
      _ => self.error(
        target.span(),
        ParseErrorKind::BadTarget,
        "invalid assignment target",
      ),
    }
  }

  fn parse_stmt(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Stmt> {
    let span = self.span(pair.as_span());
    let stmt = match pair.as_rule() {
      Rule::EmptyStmt => syn::Stmt::Empty(span),
      Rule::Block => syn::Stmt::Block(self.parse_block(pair)?),
      Rule::VarStmt => {
        let decls = self.parse_var_decls(pair.into_inner().next().unwrap())?;
        syn::Stmt::Var(decls, span)
      }
      Rule::FunctionDecl => {
        let mut pairs = pair.into_inner();
        let _function = pairs.next();
        let name_pair = pairs.next().unwrap();
        let name: Arc<str> = name_pair.as_str().into();
        let name_span = self.span(name_pair.as_span());
        let decl = self.declare(name.clone(), DeclKind::Var, true, name_span)?;

        let mut params = None;
        let mut body = None;
        for pair in pairs {
          match pair.as_rule() {
            Rule::Params => params = Some(pair),
            Rule::Block => body = Some(pair),
            r => panic!("unexpected rule: {:?}", r),
          }
        }
        let lambda =
          self.parse_lambda(Some(name.clone()), params, body.unwrap(), span)?;
        syn::Stmt::Var(
          vec![syn::VarDecl {
            name,
            slot: decl.slot,
            init: Some(syn::Expr::Lambda(lambda)),
            inherit: None,
            span,
          }],
          span,
        )
      }
      Rule::IfStmt => {
        let mut pairs = pair.into_inner();
        let _if = pairs.next();
        let cond = self.parse_expr(pairs.next().unwrap())?;
        let then = self.parse_stmt(pairs.next().unwrap())?;
        let otherwise = match pairs.next() {
          Some(_else) => Some(self.parse_stmt(pairs.next().unwrap())?),
          None => None,
        };
        syn::Stmt::If(Box::new(syn::If {
          cond,
          then,
          otherwise,
          span,
        }))
      }
      Rule::WhileStmt => {
        let mut pairs = pair.into_inner();
        let _while = pairs.next();
        let cond = self.parse_expr(pairs.next().unwrap())?;
        let body = self.parse_loop_body(pairs.next().unwrap())?;
        syn::Stmt::While(Box::new(syn::While { cond, body, span }))
      }
      Rule::DoStmt => {
        let mut pairs = pair.into_inner();
        let _do = pairs.next();
        let body = self.parse_loop_body(pairs.next().unwrap())?;
        let _while = pairs.next();
        let cond = self.parse_expr(pairs.next().unwrap())?;
        syn::Stmt::DoWhile(Box::new(syn::While { cond, body, span }))
      }
      Rule::ForEachStmt => {
        let mut pairs = pair.into_inner();
        let _for = pairs.next();
        let mut kind = None;
        if pairs.peek().map(|p| p.as_rule()) == Some(Rule::DeclKw) {
          kind = pairs.next().map(|p| self.decl_kind(&p));
        }
        let var_pair = pairs.next().unwrap();
        let iter = self.parse_expr(pairs.next().unwrap())?;

        self.scopes.push_block();
        let var = match kind {
          Some(kind) => {
            let var_span = self.span(var_pair.as_span());
            let name: Arc<str> = var_pair.as_str().into();
            let decl = self.declare(name.clone(), kind, true, var_span)?;
            syn::Ident {
              name,
              symbol: Symbol::Local { slot: decl.slot },
              span: var_span,
            }
          }
          None => {
            let var = self.ident(var_pair);
            self.check_target(&syn::Expr::Ident(var.clone()))?;
            if let Symbol::Global { .. } = var.symbol {
              self.record_global(vec![var.name.clone()]);
            }
            var
          }
        };
        let body = self.parse_loop_body(pairs.next().unwrap());
        self.scopes.pop_block();

        syn::Stmt::ForEach(Box::new(syn::ForEach {
          var,
          declared: kind.is_some(),
          iter,
          body: body?,
          span,
        }))
      }
      Rule::ForStmt => {
        self.scopes.push_block();
        let mut init = None;
        let mut cond = None;
        let mut step = None;
        let mut body = None;
        for pair in pair.into_inner() {
          match pair.as_rule() {
            Rule::For => {}
            Rule::ForInit => {
              let inner = pair.into_inner().next().unwrap();
              let inner_span = self.span(inner.as_span());
              init = Some(match inner.as_rule() {
                Rule::VarDecls => {
                  syn::Stmt::Var(self.parse_var_decls(inner)?, inner_span)
                }
                _ => syn::Stmt::Expr(self.parse_expr(inner)?),
              });
            }
            Rule::ForCond => cond = Some(self.parse_expr(pair)?),
            Rule::ForStep => step = Some(self.parse_expr(pair)?),
            _ => body = Some(self.parse_loop_body(pair)?),
          }
        }
        self.scopes.pop_block();
        syn::Stmt::For(Box::new(syn::For {
          init,
          cond,
          step,
          body: body.unwrap(),
          span,
        }))
      }
      Rule::LabeledStmt => {
        let mut pairs = pair.into_inner();
        let label: Arc<str> = pairs.next().unwrap().as_str().into();
        let inner = pairs.next().unwrap();
        let kind = match inner.as_rule() {
          Rule::WhileStmt
          | Rule::DoStmt
          | Rule::ForEachStmt
          | Rule::ForStmt => TargetKind::Loop,
          _ => TargetKind::Block,
        };
        self.push_target(Some(label.clone()), kind);
        let body = self.parse_stmt(inner);
        self.pop_target();
        syn::Stmt::Labeled(Box::new(syn::Labeled {
          label,
          body: body?,
          span,
        }))
      }
      Rule::BreakStmt | Rule::ContinueStmt => {
        let is_continue = pair.as_rule() == Rule::ContinueStmt;
        let mut pairs = pair.into_inner();
        let _kw = pairs.next();
        let label: Option<Arc<str>> = pairs.next().map(|p| p.as_str().into());
        self.check_jump(label.as_deref(), is_continue, span)?;
        let jump = syn::Jump { label, span };
        if is_continue {
          syn::Stmt::Continue(jump)
        } else {
          syn::Stmt::Break(jump)
        }
      }
      Rule::ReturnStmt => {
        let mut pairs = pair.into_inner();
        let _return = pairs.next();
        let value = match pairs.next() {
          Some(p) => Some(self.parse_expr(p)?),
          None => None,
        };
        syn::Stmt::Return(syn::Return { value, span })
      }
      Rule::ThrowStmt => syn::Stmt::Throw(self.parse_throw(pair)?),
      Rule::YieldStmt => {
        let mut pairs = pair.into_inner();
        let _yield = pairs.next();
        let value = self.parse_expr(pairs.next().unwrap())?;
        let target = match self.yields.last_mut() {
          Some(YieldScope::Switch) => syn::YieldTarget::Switch,
          Some(YieldScope::Generator(used)) => {
            *used = true;
            syn::YieldTarget::Generator
          }
          None => syn::YieldTarget::Generator,
        };
        syn::Stmt::Yield(syn::Yield {
          value,
          target,
          span,
        })
      }
      Rule::TryStmt => {
        let mut resources = Vec::new();
        let mut body = None;
        let mut catch = None;
        let mut finally = None;

        self.scopes.push_block();
        for pair in pair.into_inner() {
          match pair.as_rule() {
            Rule::Try => {}
            Rule::Resources => {
              for res in pair.into_inner() {
                resources.push(self.parse_resource(res)?);
              }
            }
            Rule::Block => body = Some(self.parse_block(pair)?),
            Rule::CatchClause => {
              let catch_span = self.span(pair.as_span());
              self.scopes.push_block();
              let mut slot = None;
              let mut block = None;
              let mut kind = DeclKind::Var;
              for pair in pair.into_inner() {
                match pair.as_rule() {
                  Rule::Catch => {}
                  Rule::DeclKw => kind = self.decl_kind(&pair),
                  Rule::Ident => {
                    let var_span = self.span(pair.as_span());
                    let decl =
                      self.declare(pair.as_str().into(), kind, true, var_span)?;
                    slot = Some(decl.slot);
                  }
                  Rule::Block => block = Some(self.parse_block(pair)?),
                  r => panic!("unexpected rule: {:?}", r),
                }
              }
              self.scopes.pop_block();
              catch = Some(syn::Catch {
                slot,
                body: block.unwrap(),
                span: catch_span,
              });
            }
            Rule::FinallyClause => {
              let block = pair.into_inner().nth(1).unwrap();
              finally = Some(self.parse_block(block)?);
            }
            r => panic!("unexpected rule: {:?}", r),
          }
        }
        self.scopes.pop_block();

        syn::Stmt::Try(Box::new(syn::Try {
          resources,
          body: body.unwrap(),
          catch,
          finally,
          span,
        }))
      }
      Rule::SwitchStmt => {
        syn::Stmt::Switch(Box::new(self.parse_switch(pair, false)?))
      }
      Rule::AnnotatedStmt => {
        let mut annotations = Vec::new();
        let mut body = None;
        for pair in pair.into_inner() {
          match pair.as_rule() {
            Rule::Annotation => {
              let ann_span = self.span(pair.as_span());
              let mut pairs = pair.into_inner();
              let name_pair = pairs.next().unwrap();
              let name = name_pair.into_inner().next().unwrap().as_str().into();
              let args = match pairs.next() {
                Some(args) => self.parse_args(args)?,
                None => Vec::new(),
              };
              annotations.push(syn::Annotation {
                name,
                args,
                span: ann_span,
              });
            }
            _ => body = Some(self.parse_stmt(pair)?),
          }
        }
        syn::Stmt::Annotated(Box::new(syn::Annotated {
          annotations,
          body: body.unwrap(),
          span,
        }))
      }
      Rule::ExprStmt => {
        syn::Stmt::Expr(self.parse_expr(pair.into_inner().next().unwrap())?)
      }
      r => panic!("unexpected rule: {:?}", r),
    };
    Ok(stmt)
  }

  fn parse_throw(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Throw> {
    let span = self.span(pair.as_span());
    let mut pairs = pair.into_inner();
    let _throw = pairs.next();
    let value = self.parse_expr(pairs.next().unwrap())?;
    Ok(syn::Throw { value, span })
  }

  fn parse_var_decls(
    &mut self,
    pair: Pair<'i, Rule>,
  ) -> Result<Vec<syn::VarDecl>> {
    let mut pairs = pair.into_inner();
    let kind = self.decl_kind(&pairs.next().unwrap());
    let mut decls = Vec::new();
    for decl in pairs {
      let span = self.span(decl.as_span());
      let mut inner = decl.into_inner();
      let name: Arc<str> = inner.next().unwrap().as_str().into();
      let _eq = inner.next();
      let init_pair = inner.next();
      if kind == DeclKind::Const && init_pair.is_none() {
        return self.error(
          span,
          ParseErrorKind::Syntax,
          format!("{}: constant requires a value", name),
        );
      }

      let d = self.declare(name.clone(), kind, init_pair.is_some(), span)?;
      let init = match init_pair {
        Some(p) => Some(self.parse_expr(p)?),
        None => None,
      };
      decls.push(syn::VarDecl {
        name,
        slot: d.slot,
        init,
        inherit: d.inherit,
        span,
      });
    }
    Ok(decls)
  }

  fn parse_resource(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Resource> {
    let span = self.span(pair.as_span());
    let mut pairs = pair.into_inner();
    let first = pairs.next().unwrap();
    if first.as_rule() != Rule::DeclKw {
      return Ok(syn::Resource {
        slot: None,
        init: self.parse_expr(first)?,
        span,
      });
    }
    let kind = self.decl_kind(&first);
    let name_pair = pairs.next().unwrap();
    let _eq = pairs.next();
    let init = self.parse_expr(pairs.next().unwrap())?;
    let decl = self.declare(name_pair.as_str().into(), kind, true, span)?;
    Ok(syn::Resource {
      slot: Some(decl.slot),
      init,
      span,
    })
  }

  fn parse_switch(
    &mut self,
    pair: Pair<'i, Rule>,
    is_expr: bool,
  ) -> Result<syn::Switch> {
    let span = self.span(pair.as_span());
    let mut pairs = pair.into_inner();
    let _switch = pairs.next();
    let subject = self.parse_expr(pairs.next().unwrap())?;

    if is_expr {
      self.yields.push(YieldScope::Switch);
    } else {
      self.push_target(None, TargetKind::Switch);
    }
    let cases = self.parse_cases(pairs);
    if is_expr {
      self.yields.pop();
    } else {
      self.pop_target();
    }
    let (cases, arrow) = cases?;

    let mut defaults = cases
      .iter()
      .flat_map(|c| c.labels.iter())
      .filter(|l| matches!(l, syn::CaseLabel::Default(_)));
    if let (Some(_), Some(dup)) = (defaults.next(), defaults.next()) {
      let dup_span = match dup {
        syn::CaseLabel::Default(s) => *s,
        _ => span,
      };
      return self.error(
        dup_span,
        ParseErrorKind::DuplicateDefault,
        "switch has more than one default label",
      );
    }

    Ok(syn::Switch {
      subject,
      cases,
      arrow,
      is_expr,
      span,
    })
  }

  fn parse_cases(
    &mut self,
    pairs: pest::iterators::Pairs<'i, Rule>,
  ) -> Result<(Vec<syn::Case>, bool)> {
    let mut cases = Vec::new();
    let mut arrow = false;
    for case in pairs {
      let span = self.span(case.as_span());
      arrow = case.as_rule() == Rule::ArrowCase;
      self.scopes.push_block();
      let mut labels = Vec::new();
      let mut stmts = Vec::new();
      let mut body = None;
      for pair in case.into_inner() {
        match pair.as_rule() {
          Rule::CaseLabel => self.parse_case_label(pair, &mut labels)?,
          Rule::ArrowOp => {}
          Rule::Block if arrow => {
            body = Some(syn::CaseBody::Block(self.parse_block(pair)?))
          }
          Rule::ThrowStmt if arrow => {
            body = Some(syn::CaseBody::Throw(self.parse_throw(pair)?))
          }
          Rule::ExprStmt if arrow => {
            let expr = self.parse_expr(pair.into_inner().next().unwrap())?;
            body = Some(syn::CaseBody::Expr(expr));
          }
          _ => stmts.push(self.parse_stmt(pair)?),
        }
      }
      self.scopes.pop_block();
      cases.push(syn::Case {
        labels,
        body: body.unwrap_or(syn::CaseBody::Stmts(stmts)),
        span,
      });
    }
    Ok((cases, arrow))
  }

  fn parse_case_label(
    &mut self,
    pair: Pair<'i, Rule>,
    labels: &mut Vec<syn::CaseLabel>,
  ) -> Result<()> {
    for pat in pair.into_inner() {
      let span = self.span(pat.as_span());
      match pat.as_rule() {
        Rule::Case => {}
        Rule::Default => labels.push(syn::CaseLabel::Default(span)),
        Rule::TypePattern => {
          let mut pairs = pat.into_inner();
          let class: Arc<str> = pairs.next().unwrap().as_str().into();
          let var_pair = pairs.next().unwrap();
          let var_span = self.span(var_pair.as_span());
          let name = var_pair.as_str().into();
          let decl = self.declare(name, DeclKind::Let, true, var_span)?;
          let _when = pairs.next();
          let guard = match pairs.next() {
            Some(p) => Some(self.parse_expr(p)?),
            None => None,
          };
          labels.push(syn::CaseLabel::Type(syn::TypePattern {
            class,
            slot: Some(decl.slot),
            guard,
            span,
          }));
        }
        _ => labels.push(syn::CaseLabel::Value(self.parse_expr(pat)?)),
      }
    }
    Ok(())
  }

  fn parse_args(&mut self, pair: Pair<'i, Rule>) -> Result<Vec<syn::Expr>> {
    pair.into_inner().map(|p| self.parse_expr(p)).collect()
  }

  fn parse_lambda(
    &mut self,
    name: Option<Arc<str>>,
    params: Option<Pair<'i, Rule>>,
    body: Pair<'i, Rule>,
    span: Span,
  ) -> Result<Arc<syn::Lambda>> {
    self.enter_fn();
    let lambda = self.parse_lambda_inner(params, body);
    let (scope, is_generator) = self.exit_fn();
    let (params, body) = lambda?;

    Ok(Arc::new(syn::Lambda {
      name,
      params,
      body,
      scope,
      source: self.input[span.start_byte()..span.end_byte()].into(),
      is_generator,
      span,
    }))
  }

  fn parse_lambda_inner(
    &mut self,
    params: Option<Pair<'i, Rule>>,
    body: Pair<'i, Rule>,
  ) -> Result<(Vec<syn::Param>, syn::Block)> {
    // `x -> ..` has a bare identifier in place of a parameter list.
    let params = match params {
      Some(p) if p.as_rule() == Rule::Ident => vec![p],
      Some(p) => p.into_inner().collect(),
      None => Vec::new(),
    };
    let mut param_list = Vec::new();
    for param in params {
      let span = self.span(param.as_span());
      if param.as_rule() == Rule::Ident {
        let name: Arc<str> = param.as_str().into();
        let slot = self.declare_param(name.clone(), false, span)?;
        param_list.push(syn::Param {
          name,
          slot,
          default: None,
          span,
        });
        continue;
      }

      let mut constant = false;
      let mut name = None;
      let mut default = None;
      for pair in param.into_inner() {
        match pair.as_rule() {
          Rule::DeclKw => constant = pair.as_str() == "const",
          Rule::Ident => {
            let n: Arc<str> = pair.as_str().into();
            let slot = self.declare_param(n.clone(), constant, span)?;
            name = Some((n, slot));
          }
          Rule::AssignEq => {}
          _ => default = Some(self.parse_expr(pair)?),
        }
      }
      let (name, slot) = name.unwrap();
      param_list.push(syn::Param {
        name,
        slot,
        default,
        span,
      });
    }

    let body = match body.as_rule() {
      Rule::Block => self.parse_block(body)?,
      _ => {
        let span = self.span(body.as_span());
        syn::Block {
          stmts: vec![syn::Stmt::Expr(self.parse_expr(body)?)],
          span,
        }
      }
    };
    Ok((param_list, body))
  }

  fn parse_expr(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Expr> {
    let span = self.span(pair.as_span());
    let expr = match pair.as_rule() {
      Rule::Null => syn::Expr::Null(span),
      Rule::True => syn::Expr::Bool(true, span),
      Rule::False => syn::Expr::Bool(false, span),
      Rule::Number => {
        syn::Expr::Num(self.parse_number(pair.as_str(), span)?, span)
      }
      Rule::String => syn::Expr::Str(self.parse_string(pair, span)?, span),
      Rule::Regex => {
        let body = pair.into_inner().next().unwrap().as_str();
        syn::Expr::Regex(body.replace("\\/", "/").into(), span)
      }
      Rule::Ident => {
        let id = self.ident(pair);
        if let Symbol::Global { .. } = id.symbol {
          self.record_global(vec![id.name.clone()]);
        }
        syn::Expr::Ident(id)
      }
      Rule::Lambda => {
        let mut pairs = pair.into_inner();
        let params = pairs.next().unwrap();
        let _arrow = pairs.next();
        let body = pairs.next().unwrap();
        let params = params.into_inner().next();
        syn::Expr::Lambda(self.parse_lambda(None, params, body, span)?)
      }
      Rule::FunctionLit => {
        let mut params = None;
        let mut body = None;
        for pair in pair.into_inner() {
          match pair.as_rule() {
            Rule::Function => {}
            Rule::Params => params = Some(pair),
            Rule::Block => body = Some(pair),
            r => panic!("unexpected rule: {:?}", r),
          }
        }
        syn::Expr::Lambda(self.parse_lambda(None, params, body.unwrap(), span)?)
      }
      Rule::AssignExpr => {
        let mut pairs = pair.into_inner();
        let target = self.parse_expr(pairs.next().unwrap())?;
        let op = match pairs.next() {
          Some(op) => op,
          None => return Ok(target),
        };
        self.check_target(&target)?;
        let op = match op.as_str() {
          "=" => None,
          s => Some(binary_op(&s[..s.len() - 1])),
        };
        let value = self.parse_expr(pairs.next().unwrap())?;
        syn::Expr::Assign(Box::new(syn::Assign {
          target,
          op,
          value,
          span,
        }))
      }
      Rule::CondExpr => {
        let mut pairs = pair.into_inner();
        let cond = self.parse_expr(pairs.next().unwrap())?;
        match pairs.next() {
          None => cond,
          Some(op) if op.as_rule() == Rule::ElvisOp => {
            let rhs = self.parse_expr(pairs.next().unwrap())?;
            syn::Expr::Binary(Box::new(syn::Binary {
              op: syn::BinaryOp::Elvis,
              lhs: cond,
              rhs,
              span,
            }))
          }
          Some(_question) => {
            let then = self.parse_expr(pairs.next().unwrap())?;
            let otherwise = self.parse_expr(pairs.next().unwrap())?;
            syn::Expr::Ternary(Box::new(syn::Ternary {
              cond,
              then,
              otherwise,
              span,
            }))
          }
        }
      }
      Rule::CoalesceExpr
      | Rule::OrExpr
      | Rule::AndExpr
      | Rule::BitOrExpr
      | Rule::BitXorExpr
      | Rule::BitAndExpr
      | Rule::EqExpr
      | Rule::RangeExpr
      | Rule::ShiftExpr
      | Rule::AddExpr
      | Rule::MulExpr => {
        let mut pairs = pair.into_inner();
        let mut expr = self.parse_expr(pairs.next().unwrap())?;
        while let Some(op) = pairs.next() {
          let op = binary_op(op.as_str());
          let rhs = self.parse_expr(pairs.next().unwrap())?;
          let span = Span::join(expr.span(), rhs.span());
          expr = syn::Expr::Binary(Box::new(syn::Binary {
            op,
            lhs: expr,
            rhs,
            span,
          }))
        }
        expr
      }
      Rule::RelExpr => {
        let mut pairs = pair.into_inner();
        let mut expr = self.parse_expr(pairs.next().unwrap())?;
        while let Some(op) = pairs.next() {
          let rhs = pairs.next().unwrap();
          let span = Span::join(expr.span(), self.span(rhs.as_span()));
          if op.as_rule() == Rule::InstanceOfOp {
            expr = syn::Expr::InstanceOf(Box::new(syn::InstanceOf {
              value: expr,
              class: rhs.as_str().into(),
              negated: op.as_str().starts_with('!'),
              span,
            }));
            continue;
          }

          let op = binary_op(op.as_str());
          if rhs.as_rule() == Rule::Quantifier {
            let mut inner = rhs.into_inner();
            let all = inner.next().unwrap().as_rule() == Rule::QuantAll;
            let args = self.parse_args(inner.next().unwrap())?;
            expr = syn::Expr::Quantified(Box::new(syn::Quantified {
              op,
              lhs: expr,
              rhs: args,
              all,
              span,
            }));
            continue;
          }

          let rhs = self.parse_expr(rhs)?;
          expr = syn::Expr::Binary(Box::new(syn::Binary {
            op,
            lhs: expr,
            rhs,
            span,
          }));
        }
        expr
      }
      Rule::UnaryExpr => {
        let mut pairs = pair.into_inner().rev();
        let mut expr = self.parse_expr(pairs.next().unwrap())?;
        for op in pairs {
          let op_span = self.span(op.as_span());
          let span = Span::join(op_span, expr.span());
          expr = match op.as_str() {
            "++" | "--" => {
              self.check_target(&expr)?;
              syn::Expr::Step(Box::new(syn::Step {
                target: expr,
                increment: op.as_str() == "++",
                prefix: true,
                span,
              }))
            }
            "delete" => match expr {
              syn::Expr::Member(_) | syn::Expr::Index(_) => {
                syn::Expr::Delete(Box::new(syn::Delete { target: expr, span }))
              }
              _ => {
                return self.error(
                  span,
                  ParseErrorKind::BadTarget,
                  "can only delete properties and elements",
                )
              }
            },
            "-" => match expr {
              syn::Expr::Num(lit, _) => syn::Expr::Num(negate(lit), span),
              expr => unary(syn::UnaryOp::Neg, expr, span),
            },
            "+" => unary(syn::UnaryOp::Pos, expr, span),
            "!" | "not" => unary(syn::UnaryOp::Not, expr, span),
            "~" => unary(syn::UnaryOp::Complement, expr, span),
            "empty" => unary(syn::UnaryOp::Empty, expr, span),
            "size" => unary(syn::UnaryOp::Size, expr, span),
            s => panic!("unexpected operator: {:?}", s),
          };
        }
        expr
      }
      Rule::PostfixExpr => {
        let mut pairs = pair.into_inner();
        let expr = self.parse_expr(pairs.next().unwrap())?;
        match pairs.next() {
          None => expr,
          Some(op) => {
            self.check_target(&expr)?;
            syn::Expr::Step(Box::new(syn::Step {
              target: expr,
              increment: op.as_str() == "++",
              prefix: false,
              span,
            }))
          }
        }
      }
      Rule::SuffixExpr => self.parse_suffixes(pair)?,
      Rule::NewExpr => {
        let mut pairs = pair.into_inner();
        let _new = pairs.next();
        let first = pairs.next().unwrap();
        match first.as_rule() {
          Rule::ClassName => {
            let args = match pairs.next() {
              Some(args) => self.parse_args(args)?,
              None => Vec::new(),
            };
            syn::Expr::New(Box::new(syn::New {
              class: syn::NewClass::Named(first.as_str().into()),
              args,
              span,
            }))
          }
          _ => {
            let mut args = self.parse_args(first)?;
            let class = args.remove(0);
            syn::Expr::New(Box::new(syn::New {
              class: syn::NewClass::Expr(class),
              args,
              span,
            }))
          }
        }
      }
      Rule::SwitchExpr => {
        syn::Expr::Switch(Box::new(self.parse_switch(pair, true)?))
      }
      Rule::NsCall => {
        let mut pairs = pair.into_inner();
        let mut name = pairs.next().unwrap().into_inner();
        let ns = name.next().unwrap().as_str().into();
        let func = name.next().unwrap().as_str().into();
        let args = match pairs.next() {
          Some(args) => self.parse_args(args)?,
          None => Vec::new(),
        };
        syn::Expr::NsCall(Box::new(syn::NsCall {
          ns,
          name: func,
          args,
          span,
        }))
      }
      Rule::ArrayLit => {
        let mut items = Vec::new();
        for pair in pair.into_inner() {
          match pair.as_rule() {
            Rule::Ellipsis => {}
            Rule::Spread => {
              let inner = pair.into_inner().nth(1).unwrap();
              items.push(syn::ArrayItem::Spread(self.parse_expr(inner)?));
            }
            _ => items.push(syn::ArrayItem::Value(self.parse_expr(pair)?)),
          }
        }
        syn::Expr::Array(items, span)
      }
      Rule::MapLit => {
        let mut entries = Vec::new();
        for entry in pair.into_inner() {
          let mut kv = entry.into_inner();
          let key = self.parse_expr(kv.next().unwrap())?;
          let value = self.parse_expr(kv.next().unwrap())?;
          entries.push((key, value));
        }
        syn::Expr::Map(entries, span)
      }
      Rule::SetLit => syn::Expr::Set(self.parse_args(pair)?, span),
      Rule::BlockExpr => {
        self.yields.push(YieldScope::Generator(false));
        self.targets.push(Vec::new());
        let block = self.parse_block(pair.into_inner().next().unwrap());
        self.targets.pop();
        let is_generator =
          matches!(self.yields.pop(), Some(YieldScope::Generator(true)));
        match block? {
          b if is_generator => syn::Expr::Generator(Arc::new(b)),
          b => syn::Expr::Block(Box::new(b)),
        }
      }
      Rule::Parens | Rule::Expr | Rule::ForCond | Rule::ForStep => {
        self.parse_expr(pair.into_inner().next().unwrap())?
      }
      r => panic!("unexpected rule: {:?}", r),
    };
    Ok(expr)
  }

  fn parse_suffixes(&mut self, pair: Pair<'i, Rule>) -> Result<syn::Expr> {
    let mut pairs = pair.into_inner();
    let first = pairs.next().unwrap();

    // A chain of plain identifiers rooted at a context variable is recorded
    // as a single dotted path.
    let mut path = None;
    let mut expr = match first.as_rule() {
      Rule::Ident => {
        let id = self.ident(first);
        if let Symbol::Global { .. } = id.symbol {
          path = Some(vec![id.name.clone()]);
        }
        syn::Expr::Ident(id)
      }
      _ => self.parse_expr(first)?,
    };

    for suf in pairs {
      let span = Span::join(expr.span(), self.span(suf.as_span()));
      match suf.as_rule() {
        Rule::Member | Rule::SafeMember => {
          let safe = suf.as_rule() == Rule::SafeMember;
          let name_pair = suf.into_inner().next().unwrap();
          let plain = name_pair.as_rule() == Rule::MemberName;
          let name: Arc<str> = match name_pair.as_rule() {
            Rule::MemberName => name_pair.as_str().into(),
            _ => {
              let name_span = self.span(name_pair.as_span());
              self.parse_string(name_pair, name_span)?
            }
          };

          let antish = match &mut path {
            Some(parts) if plain && !safe => {
              parts.push(name.clone());
              Some(parts.join(".").into())
            }
            _ => {
              if let Some(parts) = path.take() {
                self.record_global(parts);
              }
              None
            }
          };
          expr = syn::Expr::Member(Box::new(syn::Member {
            base: expr,
            name,
            safe,
            antish,
            span,
          }));
        }
        Rule::Index | Rule::SafeIndex => {
          if let Some(parts) = path.take() {
            self.record_global(parts);
          }
          let safe = suf.as_rule() == Rule::SafeIndex;
          let index = self.parse_expr(suf.into_inner().next().unwrap())?;
          expr = syn::Expr::Index(Box::new(syn::Index {
            base: expr,
            index,
            safe,
            span,
          }));
        }
        Rule::Call => {
          // A method name is not part of a variable path.
          if let Some(mut parts) = path.take() {
            if matches!(expr, syn::Expr::Member(_)) {
              parts.pop();
            }
            self.record_global(parts);
            if let syn::Expr::Member(m) = &mut expr {
              m.antish = None;
            }
          }
          let args = match suf.into_inner().next() {
            Some(args) => self.parse_args(args)?,
            None => Vec::new(),
          };
          expr = syn::Expr::Call(Box::new(syn::Call {
            callee: expr,
            args,
            span,
          }));
        }
        r => panic!("unexpected rule: {:?}", r),
      }
    }

    if let Some(parts) = path {
      self.record_global(parts);
    }
    Ok(expr)
  }

  fn parse_string(&self, pair: Pair<'i, Rule>, span: Span) -> Result<Arc<str>> {
    let body = pair.into_inner().next().unwrap().as_str();
    match escaping::unescape_utf8_literal(body) {
      Ok(s) => Ok(s.into()),
      Err(e) => self.error(span, ParseErrorKind::BadLiteral, e),
    }
  }

  fn parse_number(&self, text: &str, span: Span) -> Result<syn::Lit> {
    let bad = || {
      self.error(
        span,
        ParseErrorKind::BadLiteral,
        format!("invalid number literal: {}", text),
      )
    };

    let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
    if let Some(hex) = hex {
      let (digits, suffix) = split_suffix(hex, "lLhH");
      return match BigInt::parse_bytes(digits.as_bytes(), 16) {
        Some(n) => Ok(narrow_int(n, suffix)),
        None => bad(),
      };
    }

    let (digits, suffix) = split_suffix(text, "lLhHfFdDbB");
    let is_decimal = digits.contains(|c| matches!(c, '.' | 'e' | 'E'));
    match (suffix, is_decimal) {
      (Some('f'), _) => digits.parse().map(syn::Lit::Float).or_else(|_| bad()),
      (Some('d'), _) | (None, true) => {
        digits.parse().map(syn::Lit::Double).or_else(|_| bad())
      }
      (Some('b'), _) => match BigDecimal::from_str(digits) {
        Ok(d) => Ok(syn::Lit::BigDecimal(Arc::new(d))),
        Err(_) => bad(),
      },
      (_, true) => bad(),
      (suffix, false) => match BigInt::from_str(digits) {
        Ok(n) => Ok(narrow_int(n, suffix)),
        Err(_) => bad(),
      },
    }
  }
}

fn unary(op: syn::UnaryOp, arg: syn::Expr, span: Span) -> syn::Expr {
  syn::Expr::Unary(Box::new(syn::Unary { op, arg, span }))
}

/// Splits a trailing type suffix off a number literal, lowercasing it.
fn split_suffix<'a>(text: &'a str, suffixes: &str) -> (&'a str, Option<char>) {
  match text.chars().last() {
    Some(c) if suffixes.contains(c) => {
      (&text[..text.len() - 1], Some(c.to_ascii_lowercase()))
    }
    _ => (text, None),
  }
}

/// Narrows an integer literal to the smallest of int, long and big integer
/// that holds it, honoring an explicit suffix.
fn narrow_int(n: BigInt, suffix: Option<char>) -> syn::Lit {
  match suffix {
    Some('h') => syn::Lit::BigInt(Arc::new(n)),
    Some('l') => match n.to_i64() {
      Some(l) => syn::Lit::Long(l),
      None => syn::Lit::BigInt(Arc::new(n)),
    },
    _ => match (n.to_i32(), n.to_i64()) {
      (Some(i), _) => syn::Lit::Int(i),
      (None, Some(l)) => syn::Lit::Long(l),
      _ => syn::Lit::BigInt(Arc::new(n)),
    },
  }
}

fn negate(lit: syn::Lit) -> syn::Lit {
  match lit {
    syn::Lit::Int(i) => match i.checked_neg() {
      Some(i) => syn::Lit::Int(i),
      None => syn::Lit::Long(-(i as i64)),
    },
    syn::Lit::Long(l) => match l.checked_neg() {
      Some(l) => syn::Lit::Long(l),
      None => syn::Lit::BigInt(Arc::new(-BigInt::from(l))),
    },
    syn::Lit::BigInt(b) => {
      let n = -(*b).clone();
      match n.to_i64() {
        Some(l) if l == i64::MIN => syn::Lit::Long(l),
        _ => syn::Lit::BigInt(Arc::new(n)),
      }
    }
    syn::Lit::Float(f) => syn::Lit::Float(-f),
    syn::Lit::Double(d) => syn::Lit::Double(-d),
    syn::Lit::BigDecimal(d) => syn::Lit::BigDecimal(Arc::new(-(*d).clone())),
  }
}

fn binary_op(op: &str) -> syn::BinaryOp {
  use syn::BinaryOp::*;
  match op {
    "+" => Add,
    "-" => Sub,
    "*" => Mul,
    "/" | "div" => Div,
    "%" | "mod" => Mod,
    "&" => BitAnd,
    "|" => BitOr,
    "^" => BitXor,
    "<<" => Shl,
    ">>" => Shr,
    ">>>" => Ushr,
    "==" | "eq" => Eq,
    "!=" | "ne" => Ne,
    "===" => StrictEq,
    "!==" => StrictNe,
    "<" | "lt" => Lt,
    "<=" | "le" => Le,
    ">" | "gt" => Gt,
    ">=" | "ge" => Ge,
    "=~" => Contains,
    "!~" => NotContains,
    "=^" => StartsWith,
    "!^" => NotStartsWith,
    "=$" => EndsWith,
    "!$" => NotEndsWith,
    ".." => Range,
    "&&" | "and" => And,
    "||" | "or" => Or,
    "??" => Coalesce,
    "?:" => Elvis,
    s => panic!("unexpected operator: {:?}", s),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn script(src: &str) -> syn::Unit {
    match parse(src, &[], Features::default()) {
      Ok(u) => u,
      Err(e) => panic!("failed to parse {:?}: {}", src, e),
    }
  }

  fn lexical(src: &str) -> Result<syn::Unit> {
    parse(src, &[], Features { lexical: true })
  }

  #[test]
  fn number_literals() {
    let lit = |src: &str| match &script(src).lambda.body.stmts[0] {
      syn::Stmt::Expr(syn::Expr::Num(lit, _)) => lit.clone(),
      s => panic!("not a number: {:?}", s),
    };
    assert!(matches!(lit("42"), syn::Lit::Int(42)));
    assert!(matches!(lit("42L"), syn::Lit::Long(42)));
    assert!(matches!(lit("3000000000"), syn::Lit::Long(3000000000)));
    assert!(matches!(lit("42H"), syn::Lit::BigInt(_)));
    assert!(matches!(lit("0x2A"), syn::Lit::Int(42)));
    assert!(matches!(lit("1.5"), syn::Lit::Double(_)));
    assert!(matches!(lit("1.5f"), syn::Lit::Float(_)));
    assert!(matches!(lit("1.5B"), syn::Lit::BigDecimal(_)));
    assert!(matches!(lit("-7"), syn::Lit::Int(-7)));
  }

  #[test]
  fn globals_and_antish_paths() {
    let unit = script("var x = 1; x + a.b.c + d[0] + e.f(2)");
    let globals: Vec<String> = unit
      .globals
      .iter()
      .map(|p| p.iter().map(|s| &**s).collect::<Vec<_>>().join("."))
      .collect();
    assert_eq!(globals, vec!["a.b.c", "d", "e"]);
  }

  #[test]
  fn const_assignment_is_rejected() {
    let err = lexical("const x = 1; x += 2").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::ConstAssign("x".into()));

    let err = lexical("const x = 1; (y -> x = y)").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::ConstAssign("x".into()));

    assert!(lexical("{ const x = 1; } { let x = 2; x = 3 }").is_ok());
  }

  #[test]
  fn lexical_redeclaration_is_rejected() {
    let err = lexical("var x = 1; { var x = 2; }").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Redeclared("x".into()));
    let src = "var x = 1; { var x = 2; }";
    assert!(parse(src, &[], Features::default()).is_ok());
    assert!(lexical("var x = 1; var f = () -> { var x = 2; x }").is_ok());
  }

  #[test]
  fn duplicate_default_is_rejected() {
    let err = parse(
      "switch (x) { case 1: default: 2; break; default: 3 }",
      &[],
      Features::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::DuplicateDefault);
  }

  #[test]
  fn jumps_need_targets() {
    let err = parse("break;", &[], Features::default()).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::BadJump);
    let err =
      parse("while (true) { continue foo; }", &[], Features::default())
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::BadJump);
    script("foo: while (true) { while (true) { continue foo; } }");
    script("x: { break x; }");
  }

  #[test]
  fn generators_are_detected() {
    let unit =
      script("var g = { yield 1; yield 2; }; var f = () -> { yield 3 }");
    let stmts = &unit.lambda.body.stmts;
    assert!(!unit.lambda.is_generator);
    match &stmts[0] {
      syn::Stmt::Var(decls, _) => {
        assert!(matches!(decls[0].init, Some(syn::Expr::Generator(_))))
      }
      s => panic!("unexpected statement: {:?}", s),
    }
    match &stmts[1] {
      syn::Stmt::Var(decls, _) => match &decls[0].init {
        Some(syn::Expr::Lambda(l)) => assert!(l.is_generator),
        e => panic!("unexpected initializer: {:?}", e),
      },
      s => panic!("unexpected statement: {:?}", s),
    }
  }

  #[test]
  fn switch_expression_yield() {
    let unit =
      script("var v = switch (x) { case 1 -> { yield 2; } default -> 3 }");
    assert!(!unit.lambda.is_generator);
  }

  #[test]
  fn lambda_source_and_scope() {
    let unit = script("var y = 1; var f = (a, b = 2) -> a + b + y");
    match &unit.lambda.body.stmts[1] {
      syn::Stmt::Var(decls, _) => match &decls[0].init {
        Some(syn::Expr::Lambda(l)) => {
          assert_eq!(&*l.source, "(a, b = 2) -> a + b + y");
          let params: Vec<&str> = l.scope.params().map(|p| &**p).collect();
          assert_eq!(params, vec!["a", "b"]);
          assert_eq!(l.scope.captures().count(), 1);
          assert!(l.params[1].default.is_some());
        }
        e => panic!("unexpected initializer: {:?}", e),
      },
      s => panic!("unexpected statement: {:?}", s),
    }
  }

  #[test]
  fn syntax_errors_have_positions() {
    let err = parse("var x = ;\n", &[], Features::default()).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Syntax);
    assert_eq!(err.span.start_position(), Some((1, 9)));
  }
}
