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

//! Introspection: resolving methods, properties and constructors of host
//! types.
//!
//! Host types are described by `HostClass` tables rather than discovered by
//! reflection. The built-in value types are described the same way, so a
//! script calling `"abc".length()` goes through the same resolution as one
//! calling a method of a host object.

use std::any::Any;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chashmap::CHashMap;

use crate::eval::builtins;
use crate::eval::error::HostError;
use crate::eval::value::Value;

/// The result of host code.
pub type HostResult<T = Value> = std::result::Result<T, HostError>;

/// A native object exposed to scripts.
///
/// Its methods and properties are described by the `HostClass` registered
/// under its `type_name()`.
pub trait HostObject: Send + Sync + fmt::Debug {
  /// The name of the object's class.
  fn type_name(&self) -> &str;

  /// Upcasts to `Any`, for downcasting in host methods.
  fn as_any(&self) -> &dyn Any;

  /// Compares with another host object; identity by default.
  fn equals(&self, other: &dyn HostObject) -> bool {
    std::ptr::eq(
      self.as_any() as *const dyn Any as *const u8,
      other.as_any() as *const dyn Any as *const u8,
    )
  }

  /// Hashes consistently with `equals()`; identity by default.
  fn hash_code(&self) -> u64 {
    self.as_any() as *const dyn Any as *const u8 as usize as u64
  }
}

/// A shared host object.
pub type HostRef = Arc<dyn HostObject>;

/// Returns the host object inside `v`, if it has type `T`.
pub fn downcast<T: 'static>(v: &Value) -> Option<&T> {
  match v {
    Value::Object(o) => o.as_any().downcast_ref::<T>(),
    _ => None,
  }
}

/// The declared type of a host method parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
  Any,
  Bool,
  Int,
  Long,
  Double,
  Number,
  String,
  Array,
  Map,
  Set,
  Callable,
  /// A host class, by name.
  Class(Arc<str>),
}

/// How well an argument fits a parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Fit {
  Assignable,
  Exact,
}

impl ParamType {
  fn accepts(&self, v: &Value) -> Option<Fit> {
    use ParamType as P;
    let fit = match (self, v) {
      (P::Any, _) => Fit::Assignable,
      (P::Bool, Value::Bool(_)) => Fit::Exact,
      (P::Int, Value::Int(_)) => Fit::Exact,
      (P::Int, Value::Byte(_) | Value::Short(_)) => Fit::Assignable,
      (P::Long, Value::Long(_)) => Fit::Exact,
      (P::Long, Value::Byte(_) | Value::Short(_) | Value::Int(_)) => {
        Fit::Assignable
      }
      (P::Double, Value::Double(_)) => Fit::Exact,
      (P::Double, v) if v.is_number() => Fit::Assignable,
      (P::Number, v) if v.is_number() => Fit::Assignable,
      (P::String, Value::String(_)) => Fit::Exact,
      (P::Array, Value::Array(_)) => Fit::Exact,
      (P::Map, Value::Map(_)) => Fit::Exact,
      (P::Set, Value::Set(_)) => Fit::Exact,
      (P::Callable, Value::Closure(_) | Value::Function(_)) => Fit::Exact,
      (P::Class(name), v) if v.type_name() == &**name => Fit::Exact,
      // Null fits any reference type.
      (
        P::String | P::Array | P::Map | P::Set | P::Callable | P::Class(_),
        Value::Null,
      ) => Fit::Assignable,
      _ => return None,
    };
    Some(fit)
  }
}

impl fmt::Display for ParamType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ParamType::Class(name) => f.write_str(name),
      p => write!(f, "{:?}", p),
    }
  }
}

type MethodFn = Arc<dyn Fn(&Value, Vec<Value>) -> HostResult + Send + Sync>;

/// A property getter.
pub type Getter = Arc<dyn Fn(&Value) -> HostResult + Send + Sync>;

/// A property setter.
pub type Setter = Arc<dyn Fn(&Value, Value) -> HostResult<()> + Send + Sync>;

/// A host method, static method, or constructor.
#[derive(Clone)]
pub struct Method {
  name: Arc<str>,
  params: Vec<ParamType>,
  varargs: Option<ParamType>,
  func: MethodFn,
}

impl Method {
  /// Creates a method; `func` receives the receiver and the arguments.
  pub fn new(
    name: &str,
    params: Vec<ParamType>,
    func: impl Fn(&Value, Vec<Value>) -> HostResult + Send + Sync + 'static,
  ) -> Self {
    Method {
      name: name.into(),
      params,
      varargs: None,
      func: Arc::new(func),
    }
  }

  /// Makes this method accept any number of trailing `ty` arguments.
  pub fn with_varargs(mut self, ty: ParamType) -> Self {
    self.varargs = Some(ty);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Renders the signature, e.g. `substring(Int, Int)`.
  pub fn signature(&self) -> String {
    let mut params: Vec<String> =
      self.params.iter().map(|p| p.to_string()).collect();
    if let Some(v) = &self.varargs {
      params.push(format!("{}...", v));
    }
    format!("{}({})", self.name, params.join(", "))
  }

  /// Calls the method.
  pub fn invoke(&self, receiver: &Value, args: Vec<Value>) -> HostResult {
    (self.func)(receiver, args)
  }

  /// Scores the fit of `args`: exact beats assignable beats varargs, and
  /// within a tier more exactly-typed parameters win.
  fn score(&self, args: &[Value]) -> Option<(u8, usize)> {
    let fixed = self.params.len();
    match &self.varargs {
      None if args.len() != fixed => return None,
      Some(_) if args.len() < fixed => return None,
      _ => {}
    }

    let mut exact = 0;
    for (p, a) in self.params.iter().zip(args) {
      if p.accepts(a)? == Fit::Exact {
        exact += 1;
      }
    }
    if let Some(v) = &self.varargs {
      for a in &args[fixed..] {
        v.accepts(a)?;
      }
      return Some((1, exact));
    }
    let tier = if exact == fixed { 3 } else { 2 };
    Some((tier, exact))
  }
}

impl fmt::Debug for Method {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Method({})", self.signature())
  }
}

/// The outcome of resolving a method or constructor.
#[derive(Clone, Debug)]
pub enum Resolution<T> {
  Found(T),
  Missing,
  /// Several candidates fit equally well; holds their signatures.
  Ambiguous(String),
}

/// Picks the best-fitting method named `name` among `candidates`.
fn select(
  candidates: &[Method],
  name: &str,
  args: &[Value],
) -> Resolution<usize> {
  let scored: Vec<_> = candidates
    .iter()
    .enumerate()
    .filter(|(_, m)| &*m.name == name)
    .filter_map(|(i, m)| m.score(args).map(|s| (i, s)))
    .collect();
  let best = match scored.iter().map(|(_, s)| *s).max() {
    Some(best) => best,
    None => return Resolution::Missing,
  };
  let winners: Vec<_> = scored.iter().filter(|(_, s)| *s == best).collect();
  match winners.as_slice() {
    [(i, _)] => Resolution::Found(*i),
    _ => Resolution::Ambiguous(
      winners
        .iter()
        .map(|(i, _)| candidates[*i].signature())
        .collect::<Vec<_>>()
        .join(" and "),
    ),
  }
}

/// A readable, and possibly writable, property.
#[derive(Clone)]
struct Property {
  name: Arc<str>,
  get: Getter,
  set: Option<Setter>,
}

/// A `HostClass` describes the members of a host type.
///
/// Fields are modeled as properties whose accessors reach into the host
/// object's own storage.
#[derive(Clone)]
pub struct HostClass {
  name: Arc<str>,
  supertypes: Vec<Arc<str>>,
  constructors: Vec<Method>,
  methods: Vec<Method>,
  statics: Vec<Method>,
  properties: Vec<Property>,
}

impl HostClass {
  /// Creates an empty class named `name`.
  pub fn new(name: &str) -> Self {
    HostClass {
      name: name.into(),
      supertypes: Vec::new(),
      constructors: Vec::new(),
      methods: Vec::new(),
      statics: Vec::new(),
      properties: Vec::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns whether this class is, or extends, `name`.
  pub fn is_a(&self, name: &str) -> bool {
    &*self.name == name
      || name == "Object"
      || self.supertypes.iter().any(|s| &**s == name)
  }

  /// Declares a supertype, for `instanceof`.
  pub fn extends(mut self, supertype: &str) -> Self {
    self.supertypes.push(supertype.into());
    self
  }

  /// Adds a constructor.
  pub fn constructor(
    mut self,
    params: Vec<ParamType>,
    func: impl Fn(Vec<Value>) -> HostResult + Send + Sync + 'static,
  ) -> Self {
    let name = self.name.clone();
    self
      .constructors
      .push(Method::new(&name, params, move |_, args| func(args)));
    self
  }

  /// Adds an instance method.
  pub fn method(
    self,
    name: &str,
    params: Vec<ParamType>,
    func: impl Fn(&Value, Vec<Value>) -> HostResult + Send + Sync + 'static,
  ) -> Self {
    self.with_method(Method::new(name, params, func))
  }

  /// Adds a prebuilt instance method, e.g. one taking varargs.
  pub fn with_method(mut self, method: Method) -> Self {
    self.methods.push(method);
    self
  }

  /// Adds a static method, called as `Class.name(..)` on a class value.
  pub fn static_method(
    mut self,
    name: &str,
    params: Vec<ParamType>,
    func: impl Fn(Vec<Value>) -> HostResult + Send + Sync + 'static,
  ) -> Self {
    self
      .statics
      .push(Method::new(name, params, move |_, args| func(args)));
    self
  }

  /// Adds a read-only property.
  pub fn property(
    mut self,
    name: &str,
    get: impl Fn(&Value) -> HostResult + Send + Sync + 'static,
  ) -> Self {
    self.properties.push(Property {
      name: name.into(),
      get: Arc::new(get),
      set: None,
    });
    self
  }

  /// Adds a read-write property.
  pub fn writable_property(
    mut self,
    name: &str,
    get: impl Fn(&Value) -> HostResult + Send + Sync + 'static,
    set: impl Fn(&Value, Value) -> HostResult<()> + Send + Sync + 'static,
  ) -> Self {
    self.properties.push(Property {
      name: name.into(),
      get: Arc::new(get),
      set: Some(Arc::new(set)),
    });
    self
  }

  fn property_named(&self, name: &str) -> Option<&Property> {
    self.properties.iter().find(|p| &*p.name == name)
  }
}

impl fmt::Debug for HostClass {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("HostClass")
      .field("name", &self.name)
      .field("supertypes", &self.supertypes)
      .field("methods", &self.methods)
      .finish()
  }
}

/// Access restrictions for introspection. A denied member behaves exactly
/// like a missing one.
#[derive(Clone, Debug, Default)]
pub struct Permissions {
  denied_classes: HashSet<Arc<str>>,
  denied_prefixes: Vec<Arc<str>>,
  denied_members: HashSet<(Arc<str>, Arc<str>)>,
}

impl Permissions {
  /// Permissions that allow everything.
  pub fn unrestricted() -> Self {
    Self::default()
  }

  /// Denies a whole class; a trailing `.*` denies every class under a dotted
  /// prefix.
  pub fn deny_class(mut self, name: &str) -> Self {
    match name.strip_suffix(".*") {
      Some(prefix) => self.denied_prefixes.push(format!("{}.", prefix).into()),
      None => {
        self.denied_classes.insert(name.into());
      }
    }
    self
  }

  /// Denies a single member of a class.
  pub fn deny_member(mut self, class: &str, member: &str) -> Self {
    self.denied_members.insert((class.into(), member.into()));
    self
  }

  /// Returns whether `class` may be used at all.
  pub fn allows_class(&self, class: &str) -> bool {
    !self.denied_classes.contains(class)
      && !self.denied_prefixes.iter().any(|p| class.starts_with(&**p))
  }

  /// Returns whether `class.member` may be used.
  pub fn allows(&self, class: &str, member: &str) -> bool {
    self.allows_class(class)
      && !self.denied_members.contains(&(class.into(), member.into()))
  }
}

/// The introspection strategy used to resolve members of values.
pub trait Uberspect: Send + Sync {
  /// Looks up a class by name.
  fn class(&self, name: &str) -> Option<Arc<HostClass>>;

  /// Returns the class describing `value`.
  fn class_of(&self, value: &Value) -> Option<Arc<HostClass>> {
    self.class(value.type_name())
  }

  /// Resolves `receiver.name(args)`. A class value resolves static methods.
  fn resolve_method(
    &self,
    receiver: &Value,
    name: &str,
    args: &[Value],
  ) -> Resolution<Method>;

  /// Resolves a property getter.
  fn resolve_property_get(
    &self,
    receiver: &Value,
    name: &str,
  ) -> Option<Getter>;

  /// Resolves a property setter.
  fn resolve_property_set(
    &self,
    receiver: &Value,
    name: &str,
  ) -> Option<Setter>;

  /// Resolves a constructor of `class`.
  fn resolve_constructor(
    &self,
    class: &HostClass,
    args: &[Value],
  ) -> Resolution<Method>;
}

/// The default `Uberspect`: a registry of `HostClass`es, filtered by
/// `Permissions`, with a resolution cache keyed by argument types.
pub struct ClassUberspect {
  classes: HashMap<Arc<str>, Arc<HostClass>>,
  permissions: Permissions,
  cache: CHashMap<String, Resolution<usize>>,
}

impl ClassUberspect {
  /// Creates an uberspect knowing only the built-in classes.
  pub fn new(permissions: Permissions) -> Self {
    let mut uberspect = ClassUberspect {
      classes: HashMap::new(),
      permissions,
      cache: CHashMap::new(),
    };
    for class in builtins::classes() {
      uberspect.register(class);
    }
    uberspect
  }

  /// Registers a class, replacing any class of the same name.
  pub fn register(&mut self, class: HostClass) {
    self.classes.insert(class.name.clone(), Arc::new(class));
    self.cache.clear();
  }

  fn resolve(
    &self,
    kind: &str,
    class: &HostClass,
    candidates: &[Method],
    name: &str,
    args: &[Value],
  ) -> Resolution<Method> {
    if !self.permissions.allows(&class.name, name) {
      return Resolution::Missing;
    }

    let types: Vec<&str> = args
      .iter()
      .map(|a| if a.is_null() { "null" } else { a.type_name() })
      .collect();
    let key = format!("{}#{}.{}({})", kind, class.name, name, types.join(","));
    let resolved = match self.cache.get(&key) {
      Some(hit) => hit.clone(),
      None => {
        let res = select(candidates, name, args);
        tracing::trace!(key = %key, "caching method resolution");
        self.cache.insert(key, res.clone());
        res
      }
    };
    match resolved {
      Resolution::Found(i) => match candidates.get(i) {
        Some(m) => Resolution::Found(m.clone()),
        None => Resolution::Missing,
      },
      Resolution::Missing => Resolution::Missing,
      Resolution::Ambiguous(a) => Resolution::Ambiguous(a),
    }
  }
}

impl Default for ClassUberspect {
  fn default() -> Self {
    Self::new(Permissions::default())
  }
}

impl Uberspect for ClassUberspect {
  fn class(&self, name: &str) -> Option<Arc<HostClass>> {
    if !self.permissions.allows_class(name) {
      return None;
    }
    self.classes.get(name).cloned()
  }

  fn resolve_method(
    &self,
    receiver: &Value,
    name: &str,
    args: &[Value],
  ) -> Resolution<Method> {
    if let Value::Class(class) = receiver {
      if !self.permissions.allows_class(&class.name) {
        return Resolution::Missing;
      }
      return self.resolve("static", class, &class.statics, name, args);
    }
    match self.class_of(receiver) {
      Some(class) => self.resolve("method", &class, &class.methods, name, args),
      None => Resolution::Missing,
    }
  }

  fn resolve_property_get(
    &self,
    receiver: &Value,
    name: &str,
  ) -> Option<Getter> {
    let class = self.class_of(receiver)?;
    if !self.permissions.allows(&class.name, name) {
      return None;
    }
    class.property_named(name).map(|p| p.get.clone())
  }

  fn resolve_property_set(
    &self,
    receiver: &Value,
    name: &str,
  ) -> Option<Setter> {
    let class = self.class_of(receiver)?;
    if !self.permissions.allows(&class.name, name) {
      return None;
    }
    class.property_named(name).and_then(|p| p.set.clone())
  }

  fn resolve_constructor(
    &self,
    class: &HostClass,
    args: &[Value],
  ) -> Resolution<Method> {
    if !self.permissions.allows_class(&class.name) {
      return Resolution::Missing;
    }
    let name = class.name.clone();
    self.resolve("new", class, &class.constructors, &name, args)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn echo(tag: &'static str) -> impl Fn(&Value, Vec<Value>) -> HostResult {
    move |_, _| Ok(Value::String(tag.into()))
  }

  fn probe() -> HostClass {
    HostClass::new("Probe")
      .method("f", vec![ParamType::Long], echo("long"))
      .method("f", vec![ParamType::Int], echo("int"))
      .method("g", vec![ParamType::String], echo("string"))
      .method("g", vec![ParamType::Array], echo("array"))
      .with_method(
        Method::new("h", vec![], echo("varargs")).with_varargs(ParamType::Any),
      )
      .method("h", vec![ParamType::Array], echo("array"))
  }

  #[derive(Debug)]
  struct ProbeObj;

  impl HostObject for ProbeObj {
    fn type_name(&self) -> &str {
      "Probe"
    }

    fn as_any(&self) -> &dyn Any {
      self
    }
  }

  fn call(
    u: &ClassUberspect,
    name: &str,
    args: &[Value],
  ) -> Resolution<String> {
    let recv = Value::Object(Arc::new(ProbeObj));
    match u.resolve_method(&recv, name, args) {
      Resolution::Found(m) => match m.invoke(&recv, args.to_vec()) {
        Ok(Value::String(s)) => Resolution::Found(s.to_string()),
        _ => Resolution::Missing,
      },
      Resolution::Missing => Resolution::Missing,
      Resolution::Ambiguous(a) => Resolution::Ambiguous(a),
    }
  }

  #[test]
  fn exact_beats_assignable() {
    let mut u = ClassUberspect::default();
    u.register(probe());
    match call(&u, "f", &[Value::Int(1)]) {
      Resolution::Found(s) => assert_eq!(s, "int"),
      r => panic!("{:?}", r),
    }
    match call(&u, "f", &[Value::Short(1)]) {
      Resolution::Ambiguous(a) => assert!(a.contains("f(Long)")),
      r => panic!("{:?}", r),
    }
  }

  #[test]
  fn null_arguments_are_ambiguous() {
    let mut u = ClassUberspect::default();
    u.register(probe());
    assert!(matches!(
      call(&u, "g", &[Value::Null]),
      Resolution::Ambiguous(_)
    ));
    // Cached resolutions stay consistent.
    assert!(matches!(
      call(&u, "g", &[Value::Null]),
      Resolution::Ambiguous(_)
    ));
  }

  #[test]
  fn varargs_rank_last() {
    let mut u = ClassUberspect::default();
    u.register(probe());
    let arr = Value::Array(Default::default());
    match call(&u, "h", &[arr]) {
      Resolution::Found(s) => assert_eq!(s, "array"),
      r => panic!("{:?}", r),
    }
    match call(&u, "h", &[Value::Int(1), Value::Int(2)]) {
      Resolution::Found(s) => assert_eq!(s, "varargs"),
      r => panic!("{:?}", r),
    }
  }

  #[test]
  fn denied_members_are_missing() {
    let permissions = Permissions::default().deny_member("Probe", "g");
    let mut u = ClassUberspect::new(permissions);
    u.register(probe());
    assert!(matches!(
      call(&u, "g", &["x".into()]),
      Resolution::Missing
    ));

    let u = ClassUberspect::new(Permissions::default().deny_class("java.*"));
    assert!(!u.permissions.allows_class("java.lang.Runtime"));
    assert!(u.permissions.allows_class("javax.Foo"));
  }
}
