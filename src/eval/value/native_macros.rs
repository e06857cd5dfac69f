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

//! Macros for creating native functions.

/// Generates a specialized native error at the current call site, and returns
/// immediately.
///
/// Compare `jexl::eval::error!()`.
#[macro_export]
macro_rules! native_err {
  ($ctx:expr, kind: $kind:expr, $($tt:tt)*) => {{
    let span = $ctx.call_site();
    error!($ctx, span, kind: $kind, $($tt)*)
  }};
  ($ctx:expr, $($tt:tt)*) => {{
    let span = $ctx.call_site();
    error!($ctx, span, $($tt)*)
  }};
}

/// Asserts that a JEXL value is of a particular type:
/// ```ignore
/// let my_array = assert_jexl_type!(ctx, val: array);
/// ```
/// Note that `val` must be an identifier.
///
/// Supported types are: `any`, `bool`, `int`, `number`, `string`, `array`,
/// `map`, `set`, and `callable`. Of these, `any` simply always succeeds,
/// `int` accepts any integral value and yields an `i64`, `number` yields an
/// `f64`, and `callable` matches both closures and native functions (and as
/// such returns a `Value`).
#[macro_export]
macro_rules! assert_jexl_type {
  ($ctx:ident, $arg:ident: any) => {$arg};
  ($ctx:ident, $arg:ident: bool) => {
    assert_jexl_type!(@match $ctx, $arg, Bool, bool)
  };
  ($ctx:ident, $arg:ident: int) => {
    match $arg.as_int() {
      Ok(x) => x,
      Err(t) => native_err!($ctx, "expected integer, got {}", t),
    }
  };
  ($ctx:ident, $arg:ident: number) => {
    match $crate::eval::arith::to_f64(&$arg) {
      Some(x) => x,
      None => native_err!($ctx, "expected number, got {}", $arg.ty()),
    }
  };
  ($ctx:ident, $arg:ident: string) => {
    assert_jexl_type!(@match $ctx, $arg, String, string)
  };
  ($ctx:ident, $arg:ident: array) => {
    assert_jexl_type!(@match $ctx, $arg, Array, array)
  };
  ($ctx:ident, $arg:ident: map) => {
    assert_jexl_type!(@match $ctx, $arg, Map, map)
  };
  ($ctx:ident, $arg:ident: set) => {
    assert_jexl_type!(@match $ctx, $arg, Set, set)
  };

  ($ctx:ident, $arg:ident: callable) => {
    match $arg {
      f @ $crate::eval::value::Value::Closure(_) => f,
      f @ $crate::eval::value::Value::Function(_) => f,
      v => native_err!($ctx, "expected callable, got {}", v.ty()),
    }
  };

  (@match $ctx:ident, $arg:ident, $variant:ident, $expected:ident) => {
    match $arg {
      $crate::eval::value::Value::$variant(x) => x,
      v => native_err!($ctx, "expected {}, got {}",
                       stringify!($expected), v.ty()),
    }
  }
}

/// Generates a native JEXL function, saving users significant boilerplate.
///
/// Syntax is as follows:
/// ```ignore
/// native_fn!((ctx, arg1: number, arg2: string) {
///   // `ctx` is the current interpreter, and is optional.
///   // `arg1` and `arg2` are of types `f64` and `Arc<str>`, respectively.
///   // ...
/// })
/// ```
///
/// A trailing `..rest` binds any remaining arguments as a `Vec<Value>`:
/// ```ignore
/// native_fn!((ctx, ..args) { args.len() as i64 })
/// ```
///
/// The generated function automatically performs type-assertions on arguments,
/// and checks that the argument list is of the right size. The body may have
/// any type which can be converted to a `Value` (by `IntoValueResult`), or it
/// can explictly `return` a `Result`.
#[macro_export]
macro_rules! native_fn {
  (($ctx:tt, ..$rest:ident) $block:block) => {{
    #[allow(unreachable_code, unused_variables)]
    let f = $crate::eval::value::NativeFn::new(|ctx, $rest| {
      let $ctx = ctx;
      $crate::eval::value::convert::IntoValueResult::into_value_result($block)
    }, (file!(), line!(), column!()));
    f
  }};
  (($($arg:ident: $ty:ident),* $(,)?) $block:block) => {
    native_fn!((_, $($arg: $ty,)*) $block)
  };
  (($ctx:tt $(, $arg:ident: $ty:ident)* $(,)?) $block:block) => {{
    #[allow(unreachable_code, unused_variables)]
    let f = $crate::eval::value::NativeFn::new(|ctx, args| {
      const __ARG_COUNT: usize = native_fn!(@arg_count $($arg)*);
      if args.len() != __ARG_COUNT {
        native_err!(ctx, "expected {} arguments, got {}",
                    __ARG_COUNT, args.len())
      }

      let count = 0;
      let _ = count;
      native_fn!(@arg_bind count, ctx, args, $($arg $ty)*);

      let $ctx = ctx;
      $crate::eval::value::convert::IntoValueResult::into_value_result($block)
    }, (file!(), line!(), column!()));
    f
  }};

  (@arg_bind $count:ident, $ctx:ident, $args:ident,) => {};
  (@arg_bind $count:ident, $ctx:ident, $args:ident,
    $arg:ident $ty:ident $($rest:tt)*) => {
    let $arg = {
      let arg = $args[$count].clone();
      assert_jexl_type!($ctx, arg: $ty)
    };
    let $count = $count + 1;
    let _ = $count;
    native_fn!(@arg_bind $count, $ctx, $args, $($rest)*)
  };

  (@arg_count) => {0};
  (@arg_count $_:ident $($rest:ident)*) => {
    1 + native_fn!(@arg_count $($rest)*)
  };
}
