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

//! The embedding API: engines, compiled scripts, and callables.
//!
//! An `Engine` holds configuration shared by every script it compiles, and a
//! cache of compiled scripts. A `Script` is immutable and may be executed
//! concurrently from any number of threads, each execution getting its own
//! interpreter.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bigdecimal::RoundingMode;
use chashmap::CHashMap;
use parking_lot::Mutex;

use crate::eval::arith::NoOperators;
use crate::eval::arith::Operators;
use crate::eval::cancel::CancelFlag;
use crate::eval::context::Context;
use crate::eval::error::JexlError;
use crate::eval::introspect::ClassUberspect;
use crate::eval::introspect::HostClass;
use crate::eval::introspect::Permissions;
use crate::eval::introspect::Uberspect;
use crate::eval::options::Options;
use crate::eval::value::Closure;
use crate::eval::value::Value;
use crate::eval::Interpreter;
use crate::eval::Runtime;
use crate::syn;
use crate::syn::Features;

const DEFAULT_CACHE_SIZE: usize = 256;

/// Builds an `Engine`.
pub struct EngineBuilder {
  options: Options,
  cache_size: usize,
  namespaces: HashMap<Arc<str>, Value>,
  operators: Arc<dyn Operators>,
  uberspect: Option<Arc<dyn Uberspect>>,
  permissions: Permissions,
  classes: Vec<HostClass>,
}

macro_rules! builder_flags {
  ($($name:ident => $set:ident;)*) => {$(
    #[doc = concat!("Sets the `", stringify!($name), "` option.")]
    pub fn $name(self, on: bool) -> Self {
      self.options.$set(on);
      self
    }
  )*}
}

impl EngineBuilder {
  fn new() -> Self {
    EngineBuilder {
      options: Options::new(),
      cache_size: DEFAULT_CACHE_SIZE,
      namespaces: HashMap::new(),
      operators: Arc::new(NoOperators),
      uberspect: None,
      permissions: Permissions::default(),
      classes: Vec::new(),
    }
  }

  builder_flags! {
    strict => set_strict;
    silent => set_silent;
    safe => set_safe;
    lexical => set_lexical;
    lexical_shade => set_lexical_shade;
    cancellable => set_cancellable;
    antish => set_antish;
    strict_arithmetic => set_strict_arithmetic;
  }

  /// Limits the depth of nested calls.
  pub fn stack_overflow(self, limit: usize) -> Self {
    self.options.set_stack_overflow(limit);
    self
  }

  /// Sets the scale big decimal division rounds to.
  pub fn math_scale(self, scale: i64) -> Self {
    self.options.set_math_scale(Some(scale));
    self
  }

  pub fn math_rounding(self, mode: RoundingMode) -> Self {
    self.options.set_math_rounding(mode);
    self
  }

  /// Sets how many compiled scripts are kept; zero disables caching.
  pub fn cache(mut self, size: usize) -> Self {
    self.cache_size = size;
    self
  }

  /// Registers a function namespace, resolving `name:f(..)` calls. The
  /// namespace named `""` supplies unqualified functions.
  pub fn namespace(mut self, name: &str, ns: impl Into<Value>) -> Self {
    self.namespaces.insert(name.into(), ns.into());
    self
  }

  /// Installs host operator overloads.
  pub fn operators(mut self, operators: impl Operators + 'static) -> Self {
    self.operators = Arc::new(operators);
    self
  }

  /// Replaces the introspection strategy. Registered host classes and
  /// permissions only apply to the default one.
  pub fn uberspect(mut self, uberspect: Arc<dyn Uberspect>) -> Self {
    self.uberspect = Some(uberspect);
    self
  }

  pub fn permissions(mut self, permissions: Permissions) -> Self {
    self.permissions = permissions;
    self
  }

  /// Makes a host class available to scripts.
  pub fn host_class(mut self, class: HostClass) -> Self {
    self.classes.push(class);
    self
  }

  pub fn build(self) -> Engine {
    let uberspect = match self.uberspect {
      Some(u) => u,
      None => {
        let mut u = ClassUberspect::new(self.permissions);
        for class in self.classes {
          u.register(class);
        }
        Arc::new(u)
      }
    };
    let runtime = Runtime::new(
      Arc::new(self.options),
      self.operators,
      uberspect,
      self.namespaces,
    );
    let cache = match self.cache_size {
      0 => None,
      capacity => Some(ScriptCache {
        units: CHashMap::new(),
        order: Mutex::new(VecDeque::new()),
        capacity,
      }),
    };
    Engine(Arc::new(EngineInner {
      runtime: Arc::new(runtime),
      cache,
    }))
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
  source: Arc<str>,
  params: Vec<Arc<str>>,
  expression: bool,
  features: Features,
}

/// A bounded cache of compiled units, evicting the oldest entry first.
struct ScriptCache {
  units: CHashMap<CacheKey, Arc<syn::Unit>>,
  order: Mutex<VecDeque<CacheKey>>,
  capacity: usize,
}

impl ScriptCache {
  fn get(&self, key: &CacheKey) -> Option<Arc<syn::Unit>> {
    self.units.get(key).map(|u| u.clone())
  }

  fn put(&self, key: CacheKey, unit: Arc<syn::Unit>) {
    let mut order = self.order.lock();
    if self.units.insert(key.clone(), unit).is_none() {
      order.push_back(key);
    }
    while order.len() > self.capacity {
      if let Some(oldest) = order.pop_front() {
        self.units.remove(&oldest);
      }
    }
  }
}

struct EngineInner {
  runtime: Arc<Runtime>,
  cache: Option<ScriptCache>,
}

/// An `Engine` compiles scripts sharing one configuration. Engines are
/// cheap to clone.
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

impl Engine {
  /// Creates an engine with default configuration.
  pub fn new() -> Self {
    Engine::builder().build()
  }

  pub fn builder() -> EngineBuilder {
    EngineBuilder::new()
  }

  /// Returns the default options of evaluations run by this engine.
  pub fn options(&self) -> &Arc<Options> {
    &self.0.runtime.options
  }

  /// Creates an interpreter over `context`, for hosts driving evaluation
  /// themselves.
  pub fn interpreter(&self, context: Arc<dyn Context>) -> Interpreter {
    Interpreter::new(self.0.runtime.clone(), context)
  }

  /// Compiles a script.
  pub fn create_script(&self, source: &str) -> Result<Script, JexlError> {
    self.compile(source, &[], false)
  }

  /// Compiles a script taking the named parameters.
  pub fn create_script_with_params(
    &self,
    source: &str,
    params: &[&str],
  ) -> Result<Script, JexlError> {
    self.compile(source, params, false)
  }

  /// Compiles a single expression; statements are rejected.
  pub fn create_expression(&self, source: &str) -> Result<Script, JexlError> {
    self.compile(source, &[], true)
  }

  fn compile(
    &self,
    source: &str,
    params: &[&str],
    expression: bool,
  ) -> Result<Script, JexlError> {
    let features = Features {
      lexical: self.options().lexical(),
    };
    let key = CacheKey {
      source: source.into(),
      params: params.iter().map(|&p| p.into()).collect(),
      expression,
      features,
    };
    if let Some(unit) = self.0.cache.as_ref().and_then(|c| c.get(&key)) {
      tracing::trace!(len = source.len(), "script cache hit");
      return Ok(Script::new(self.clone(), unit));
    }

    let unit = if expression {
      syn::parse_expression(source, features)
    } else {
      syn::parse(source, params, features)
    }?;
    tracing::debug!(len = source.len(), expression, "compiled script");

    let unit = Arc::new(unit);
    if let Some(cache) = &self.0.cache {
      cache.put(key, unit.clone());
    }
    Ok(Script::new(self.clone(), unit))
  }
}

impl Default for Engine {
  fn default() -> Self {
    Engine::new()
  }
}

/// A compiled script.
#[derive(Clone)]
pub struct Script {
  engine: Engine,
  unit: Arc<syn::Unit>,
  closure: Closure,
}

impl Script {
  fn new(engine: Engine, unit: Arc<syn::Unit>) -> Self {
    let closure = Closure::new(unit.lambda.clone(), Vec::new());
    Script {
      engine,
      unit,
      closure,
    }
  }

  /// Runs this script against `context`.
  pub fn execute(&self, context: Arc<dyn Context>) -> Result<Value, JexlError> {
    self.execute_with_args(context, Vec::new())
  }

  /// Runs this script, binding `args` to its parameters.
  pub fn execute_with_args(
    &self,
    context: Arc<dyn Context>,
    args: Vec<Value>,
  ) -> Result<Value, JexlError> {
    let mut interp = self.engine.interpreter(context);
    let res = interp.run(&self.closure, args);
    settle(interp.options(), res)
  }

  /// Prepares an execution that can be started, and cancelled, later; the
  /// execution observes the context's cancellation flag, if it has one.
  pub fn callable(
    &self,
    context: Arc<dyn Context>,
    args: Vec<Value>,
  ) -> Callable {
    let flag = context.cancellation().unwrap_or_default();
    Callable {
      script: self.clone(),
      context,
      args,
      flag,
    }
  }

  /// Binds a prefix of this script's parameters.
  pub fn curry(&self, args: Vec<Value>) -> Script {
    Script {
      engine: self.engine.clone(),
      unit: self.unit.clone(),
      closure: self.closure.curry(args),
    }
  }

  /// Returns the names of the parameters not yet bound by currying.
  pub fn parameters(&self) -> Vec<Arc<str>> {
    self.closure.parameters()
  }

  /// Returns the names of the variables declared by the script itself.
  pub fn local_variables(&self) -> Vec<Arc<str>> {
    self.unit.lambda.scope.locals().cloned().collect()
  }

  /// Returns the names of variables captured from an enclosing scope.
  pub fn captured_variables(&self) -> Vec<Arc<str>> {
    self
      .closure
      .captured_values()
      .into_iter()
      .map(|(name, _)| name)
      .collect()
  }

  /// Returns the context variables the script refers to; dotted antish
  /// references appear as multi-element paths.
  pub fn variables(&self) -> Vec<Vec<Arc<str>>> {
    self.unit.globals.clone()
  }

  pub fn source(&self) -> &str {
    &self.unit.lambda.source
  }
}

impl fmt::Debug for Script {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Script")
      .field("source", &self.source())
      .finish()
  }
}

/// Turns a cancellation into null when cancellation is not reported.
fn settle(
  options: &Options,
  res: Result<Value, JexlError>,
) -> Result<Value, JexlError> {
  match res {
    Err(e) if e.is_cancel() && !options.cancellable() => {
      tracing::debug!("evaluation cancelled; returning null");
      Ok(Value::Null)
    }
    res => res,
  }
}

/// A prepared script execution.
pub struct Callable {
  script: Script,
  context: Arc<dyn Context>,
  args: Vec<Value>,
  flag: CancelFlag,
}

impl Callable {
  /// Runs the script, blocking until it completes or is cancelled.
  pub fn call(&self) -> Result<Value, JexlError> {
    let mut interp = self
      .script
      .engine
      .interpreter(self.context.clone())
      .with_cancel(self.flag.clone());
    let res = interp.run(&self.script.closure, self.args.clone());
    settle(interp.options(), res)
  }

  /// Requests cancellation; returns whether this call changed the flag.
  pub fn cancel(&self) -> bool {
    self.flag.cancel()
  }

  pub fn cancel_flag(&self) -> &CancelFlag {
    &self.flag
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::any::Any;
  use std::sync::atomic::AtomicBool;
  use std::sync::atomic::Ordering;
  use std::thread;
  use std::time::Duration;

  use pretty_assertions::assert_eq;

  use crate::eval::arith::Overload;
  use crate::eval::arith::SelfAssign;
  use crate::eval::arith::ValueIter;
  use crate::eval::context::MapContext;
  use crate::eval::error::host_error;
  use crate::eval::error::ErrorKind;
  use crate::eval::error::Overflow;
  use crate::eval::introspect::downcast;
  use crate::eval::introspect::HostObject;
  use crate::eval::value::Array;
  use crate::eval::value::Map;
  use crate::eval::value::NativeFn;
  use crate::syn::BinaryOp;

  fn run(engine: &Engine, src: &str) -> Result<Value, JexlError> {
    engine
      .create_script(src)
      .and_then(|s| s.execute(Arc::new(MapContext::new())))
  }

  fn strict() -> Engine {
    Engine::builder().strict(true).safe(false).build()
  }

  fn array(values: Vec<Value>) -> Value {
    Value::Array(Array::new(values))
  }

  #[test]
  fn ranges_are_inclusive() {
    let calc = Map::new();
    calc.insert(
      "sum".into(),
      native_fn!((ctx, range: any) {
        let mut total = 0;
        for v in ctx.collect(&range)? {
          total += v.as_int().unwrap_or(0);
        }
        total
      })
      .into(),
    );
    let engine = Engine::builder().namespace("calc", calc).build();

    assert_eq!(
      run(&engine, "[...(1 .. 3)]").unwrap(),
      array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
      run(&engine, "[...(3 .. 1)]").unwrap(),
      array(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
    );
    assert_eq!(run(&engine, "calc:sum(-3 .. 3)").unwrap(), Value::Int(0));
  }

  /// Iterates arrays while letting `remove()` drop the current element.
  #[derive(Default)]
  struct RemovingIterator {
    current: Arc<Mutex<Option<(Array, Value)>>>,
  }

  impl Operators for RemovingIterator {
    fn for_each(&self, obj: &Value) -> Overload<ValueIter> {
      let array = match obj {
        Value::Array(a) => a.clone(),
        _ => return Overload::NotApplicable,
      };
      let current = self.current.clone();
      let snapshot = array.snapshot();
      Overload::Handled(Box::new(snapshot.into_iter().map(move |v| {
        *current.lock() = Some((array.clone(), v.clone()));
        v
      })))
    }
  }

  #[test]
  fn iteration_hook_can_remove() {
    let hook = RemovingIterator::default();
    let current = hook.current.clone();
    let remove = NativeFn::new(
      move |_, _| {
        if let Some((array, v)) = current.lock().take() {
          let idx = array.snapshot().iter().position(|x| *x == v);
          if let Some(idx) = idx {
            array.remove(idx);
          }
        }
        Ok(Value::Null)
      },
      (file!(), line!(), column!()),
    );
    let functions = Map::new();
    functions.insert("remove".into(), remove.into());
    let engine = Engine::builder()
      .operators(hook)
      .namespace("", functions)
      .build();

    let list = array((1..=6).map(Value::Int).collect());
    let ctx = MapContext::new();
    ctx.define("list", list.clone());
    let script = engine
      .create_script(
        "var x = 0; for (var y : list) { if (y <= 3) remove(); }; size(list)",
      )
      .unwrap();
    assert_eq!(script.execute(Arc::new(ctx)).unwrap(), Value::Int(3));
    assert_eq!(
      list,
      array(vec![Value::Int(4), Value::Int(5), Value::Int(6)])
    );
  }

  #[test]
  fn curry_composes() {
    let engine = Engine::new();
    let src = "var f = (x, y, z) -> { x + y + z }; f.curry(5).curry(15)(22)";
    assert_eq!(run(&engine, src).unwrap(), Value::Int(42));

    let script = engine
      .create_script_with_params("x * 100 + y * 10 + z", &["x", "y", "z"])
      .unwrap();
    let ctx: Arc<dyn Context> = Arc::new(MapContext::new());
    let args = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
    let whole = script.execute_with_args(ctx.clone(), args.clone()).unwrap();
    for k in 0..=3 {
      let (bound, rest) = args.split_at(k);
      let curried = script.curry(bound.to_vec());
      assert_eq!(curried.parameters().len(), 3 - k);
      assert_eq!(
        curried.execute_with_args(ctx.clone(), rest.to_vec()).unwrap(),
        whole
      );
    }
  }

  #[test]
  fn generators_support_labeled_breaks() {
    let engine = Engine::new();
    assert_eq!(
      run(
        &engine,
        "[...{yield 1; yield 2; x: {yield 3; break x; yield 4;}; yield 5;}]"
      )
      .unwrap(),
      array(vec![1, 2, 3, 5].into_iter().map(Value::Int).collect())
    );
  }

  #[test]
  fn safe_navigation_of_undefined() {
    let err = run(&strict(), "z[0]").unwrap_err();
    assert!(matches!(&err.kind, ErrorKind::Variable(name) if &**name == "z"));

    let safe = Engine::builder().strict(true).safe(true).build();
    assert_eq!(run(&safe, "z[0]").unwrap(), Value::Null);
  }

  #[test]
  fn closures_compare_structurally() {
    let src = "var k = 2; (v) -> v * k";
    let a = run(&Engine::builder().cache(0).build(), src).unwrap();
    let b = run(&Engine::builder().cache(0).build(), src).unwrap();
    assert_eq!(a, b);

    let hash = |v: &Value| {
      use std::hash::Hash;
      use std::hash::Hasher;
      let mut h = std::collections::hash_map::DefaultHasher::new();
      v.hash(&mut h);
      h.finish()
    };
    assert_eq!(hash(&a), hash(&b));
  }

  #[test]
  fn lexical_shade_hides_globals() {
    let engine = Engine::builder()
      .strict(true)
      .lexical(true)
      .lexical_shade(true)
      .build();
    let ctx = MapContext::new();
    ctx.define("x", 5i32);
    let script = engine.create_script("{ var x = 1; } x").unwrap();
    let err = script.execute(Arc::new(ctx)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Variable(_)));
  }

  #[test]
  fn cancellation_from_another_thread() {
    let engine = Engine::new();
    let script = engine.create_script("while (true) { }").unwrap();
    let callable =
      Arc::new(script.callable(Arc::new(MapContext::new()), vec![]));

    let runner = {
      let callable = callable.clone();
      thread::spawn(move || callable.call())
    };
    thread::sleep(Duration::from_millis(50));
    assert!(callable.cancel());

    let err = runner.join().unwrap().unwrap_err();
    assert!(err.is_cancel());
  }

  #[test]
  fn cancellation_is_quiet_unless_cancellable() {
    let engine = Engine::builder().cancellable(false).build();
    let script = engine.create_script("while (true) { }").unwrap();
    let callable = script.callable(Arc::new(MapContext::new()), vec![]);
    callable.cancel();
    assert_eq!(callable.call().unwrap(), Value::Null);
  }

  #[test]
  fn guarded_stack_overflow() {
    let engine = Engine::builder().stack_overflow(16).build();
    let err = run(
      &engine,
      "var f = (n) -> n == 0 ? 0 : f(n - 1); try { f(100) } catch (e) { -1 }",
    )
    .unwrap_err();
    assert!(matches!(
      err.kind,
      ErrorKind::StackOverflow(Overflow::Guarded { limit: 16 })
    ));
    assert_eq!(
      run(&engine, "var f = (n) -> n == 0 ? 0 : f(n - 1); f(10)").unwrap(),
      Value::Int(0)
    );
  }

  #[test]
  fn host_stack_overflow() {
    let err = thread::Builder::new()
      .stack_size(4 * 1024 * 1024)
      .spawn(|| {
        run(&Engine::new(), "var f = (n) -> f(n + 1); f(0)").unwrap_err()
      })
      .unwrap()
      .join()
      .unwrap();
    assert!(matches!(
      err.kind,
      ErrorKind::StackOverflow(Overflow::Host)
    ));
  }

  #[test]
  fn shared_options_are_live() {
    let engine = Engine::new();
    let script = engine.create_script("flip(); undefinedVariable").unwrap();

    for shared in [true, false] {
      let options = Arc::new(Options::new());
      options.set_shared_instance(shared);
      let flipped = options.clone();
      let flip = NativeFn::new(
        move |_, _| {
          flipped.set_strict(true);
          Ok(Value::Null)
        },
        (file!(), line!(), column!()),
      );
      let ctx = MapContext::new().with_options(options);
      ctx.define("flip", flip);

      let res = script.execute(Arc::new(ctx));
      assert_eq!(res.is_err(), shared, "shared = {}", shared);
    }
  }

  #[test]
  fn parse_errors() {
    let err = Engine::new().create_script("var x = ;").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parsing));

    let err = Engine::new().create_script("const c = 1; c = 2").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Assignment(_)));
  }

  /// A resource that records being closed, and may fail to close.
  #[derive(Debug)]
  struct Resource {
    name: &'static str,
    broken: bool,
    closed: Arc<Mutex<Vec<&'static str>>>,
  }

  impl HostObject for Resource {
    fn type_name(&self) -> &str {
      "Resource"
    }

    fn as_any(&self) -> &dyn Any {
      self
    }
  }

  type CloseLog = Arc<Mutex<Vec<&'static str>>>;

  fn with_resources(
    names: &[(&'static str, bool)],
  ) -> (Engine, Arc<MapContext>, CloseLog) {
    let class = HostClass::new("Resource").method("close", vec![], |recv, _| {
      match downcast::<Resource>(recv) {
        Some(r) if r.broken => {
          r.closed.lock().push(r.name);
          Err(host_error(format!("cannot close {}", r.name)))
        }
        Some(r) => {
          r.closed.lock().push(r.name);
          Ok(Value::Null)
        }
        None => Ok(Value::Null),
      }
    });
    let engine = Engine::builder().strict(true).host_class(class).build();

    let closed = CloseLog::default();
    let ctx = MapContext::new();
    for &(name, broken) in names {
      let resource = Resource {
        name,
        broken,
        closed: closed.clone(),
      };
      ctx.define(name, Value::Object(Arc::new(resource)));
    }
    (engine, Arc::new(ctx), closed)
  }

  #[test]
  fn resources_close_in_reverse() {
    let (engine, ctx, closed) = with_resources(&[("a", false), ("b", false)]);
    let script = engine
      .create_script("try (var x = a; var y = b) { 42 }")
      .unwrap();
    assert_eq!(script.execute(ctx).unwrap(), Value::Int(42));
    assert_eq!(*closed.lock(), vec!["b", "a"]);
  }

  #[test]
  fn finally_return_beats_close_failure() {
    let (engine, ctx, closed) =
      with_resources(&[("good", false), ("broken", true)]);
    let script = engine
      .create_script(
        "var f = () -> {
           try (var x = good; var y = broken) { 1 } finally { return 'kept'; }
         };
         f()",
      )
      .unwrap();
    let kept = script.execute(ctx.clone()).unwrap();
    assert_eq!(kept, Value::String("kept".into()));
    assert_eq!(*closed.lock(), vec!["broken", "good"]);

    let script = engine.create_script("try (var y = broken) { 1 }").unwrap();
    let err = script.execute(ctx).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Host(_)));
  }

  #[test]
  fn timeout_produces_default() {
    let engine = Engine::new();
    assert_eq!(
      run(&engine, "@timeout(20, 'dflt') { while (true) { } }").unwrap(),
      Value::String("dflt".into())
    );
    assert_eq!(
      run(&engine, "@timeout(5000, 'dflt') 1 + 1").unwrap(),
      Value::Int(2)
    );
  }

  #[test]
  fn timeout_reaches_generators() {
    let engine = Engine::new();
    let sources = [
      "@timeout(50, 'dflt') [...{ while (true) { } yield 1; }]",
      "var g = { while (true) { } yield 1; }; @timeout(50, 'dflt') [...g]",
      "var g = { while (true) { } yield 1; }; @timeout(50, 'dflt') g.next()",
    ];
    for src in &sources {
      let got = run(&engine, src).unwrap();
      assert_eq!(got, Value::String("dflt".into()), "{}", src);
    }
  }

  #[test]
  fn cancellation_skips_catch_and_survives_finally() {
    let engine = Engine::new();
    let src = "
      var caught = false;
      var cleaned = false;
      @timeout(20, 'dflt') {
        try {
          while (true) { }
        } catch (e) {
          caught = true;
        } finally {
          cleaned = true;
        }
      }
      [caught, cleaned]";
    assert_eq!(
      run(&engine, src).unwrap(),
      array(vec![Value::Bool(false), Value::Bool(true)])
    );

    let src = "
      var f = () -> {
        try { while (true) { } } finally { return 'swallowed'; }
      };
      @timeout(20, 'dflt') f()";
    assert_eq!(run(&engine, src).unwrap(), Value::String("dflt".into()));
  }

  /// Appends to arrays in place, and strips substrings out of strings.
  struct Accumulate;

  impl Operators for Accumulate {
    fn self_assign(
      &self,
      op: BinaryOp,
      lhs: &Value,
      rhs: &Value,
    ) -> Overload<SelfAssign> {
      match (op, lhs) {
        (BinaryOp::Add, Value::Array(a)) => {
          a.push(rhs.clone());
          Overload::Handled(SelfAssign::InPlace)
        }
        (BinaryOp::Sub, Value::String(s)) => {
          let stripped = s.replace(&rhs.to_display_string(), "");
          Overload::Handled(SelfAssign::Value(stripped.as_str().into()))
        }
        (BinaryOp::Mul, Value::String(_)) => {
          Overload::Failed("strings do not repeat".into())
        }
        _ => Overload::NotApplicable,
      }
    }
  }

  #[test]
  fn self_assignment_hooks() {
    let engine = Engine::builder().operators(Accumulate).build();
    let list = array(vec![Value::Int(1)]);
    let ctx = MapContext::new();
    ctx.define("list", list.clone());
    let script = engine
      .create_script("list += 2; var s = 'banana'; s -= 'an'; s")
      .unwrap();
    let stripped = script.execute(Arc::new(ctx)).unwrap();
    assert_eq!(stripped, Value::String("ba".into()));
    assert_eq!(list, array(vec![Value::Int(1), Value::Int(2)]));

    let err = run(&engine, "var s = 'ab'; s *= 2").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TryFailed));
    assert_eq!(run(&engine, "var n = 2; n *= 3; n").unwrap(), Value::Int(6));
  }

  #[test]
  fn generators_cannot_pull_themselves() {
    let src = "
      var me = null;
      me = { yield me.next(); };
      try { me.next() } catch (e) { e.message }";
    let msg = run(&Engine::new(), src).unwrap();
    assert!(msg.to_display_string().contains("own body"), "{:?}", msg);
  }

  #[test]
  fn size_of_generators_is_undefined() {
    let err = run(&strict(), "size({ yield 1; yield 2; })").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Operator("size")));
    let lenient = Engine::builder().silent(true).build();
    assert_eq!(
      run(&lenient, "size({ yield 1; yield 2; })").unwrap(),
      Value::Int(0)
    );
  }

  #[test]
  fn expressions_reject_statements() {
    let engine = Engine::new();
    assert!(engine.create_expression("1 + 2").is_ok());
    assert!(engine.create_expression("var x = 1").is_err());
  }

  #[test]
  fn script_introspection() {
    let engine = Engine::builder().antish(true).build();
    let script = engine
      .create_script_with_params("var t = a.b.c + y; t", &["y"])
      .unwrap();
    assert_eq!(script.parameters(), vec![Arc::<str>::from("y")]);
    assert!(script.local_variables().iter().any(|v| &**v == "t"));
    assert!(script.captured_variables().is_empty());
    assert_eq!(
      script.variables(),
      vec![vec![Arc::<str>::from("a"), "b".into(), "c".into()]]
    );
    assert_eq!(script.source(), "var t = a.b.c + y; t");
  }

  #[test]
  fn cache_reuses_units() {
    let engine = Engine::builder().cache(1).build();
    let a = engine.create_script("1 + 1").unwrap();
    let b = engine.create_script("1 + 1").unwrap();
    assert!(Arc::ptr_eq(&a.unit, &b.unit));

    engine.create_script("2 + 2").unwrap();
    let c = engine.create_script("1 + 1").unwrap();
    assert!(!Arc::ptr_eq(&a.unit, &c.unit));
  }

  #[test]
  fn concurrent_executions_are_isolated() {
    let engine = Engine::new();
    let script = engine
      .create_script_with_params(
        "var acc = 0; for (var i : 1 .. n) acc += i; acc",
        &["n"],
      )
      .unwrap();
    let done = Arc::new(AtomicBool::new(true));
    crossbeam::scope(|s| {
      for n in 1..=8i32 {
        let script = &script;
        let done = done.clone();
        s.spawn(move |_| {
          let got = script
            .execute_with_args(Arc::new(MapContext::new()), vec![Value::Int(n)])
            .unwrap();
          if got != Value::Int(n * (n + 1) / 2) {
            done.store(false, Ordering::SeqCst);
          }
        });
      }
    })
    .unwrap();
    assert!(done.load(Ordering::SeqCst));
  }
}
