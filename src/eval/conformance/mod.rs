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

//! Conformance tests for the interpreter.
//!
//! A conformance test consists of a JEXL file, which is compiled by a strict
//! engine and executed against an empty context.
//!
//! Tests get access to assertions through the `t` namespace:
//! ```text
//! t:expect(1 + 1 == 2, 'arithmetic is broken');
//! t:expect_death(() -> 1 / 0);
//! ```

use std::cell::Cell;
use std::sync::Arc;

use crate::engine::Engine;
use crate::engine::EngineBuilder;
use crate::eval::context::MapContext;
use crate::eval::value::Map;
use crate::eval::value::Value;
use crate::eval::Signal;

/// Macro for generating conformance tests. An optional list of builder
/// flags is switched on for the test's engine.
macro_rules! conf_test {
  ($test_name:ident $(, $flag:ident)*) => {
    #[test]
    fn $test_name() {
      conformance_test(
        concat!(stringify!($test_name), ".jexl"),
        include_str!(concat!(stringify!($test_name), ".jexl")),
        |b| b$(.$flag(true))*,
      )
    }
  };
}

thread_local! {
  static FAILURE_FLAG: Cell<bool> = Cell::new(false);
}

fn message(args: &[Value], default: &str) -> String {
  args
    .get(1)
    .map(Value::to_display_string)
    .unwrap_or_else(|| default.to_string())
}

fn test_lib() -> Value {
  let test_lib = Map::new();

  test_lib.insert(
    "fail".into(),
    native_fn!((ctx, ..args) {
      FAILURE_FLAG.with(|f| f.set(true));
      native_err!(ctx, "unconditional failure: {}", message(&args, "?"));
      Value::Null
    })
    .into(),
  );

  test_lib.insert(
    "expect".into(),
    native_fn!((ctx, ..args) {
      if !args.first().map_or(false, Value::truthy) {
        FAILURE_FLAG.with(|f| f.set(true));
        native_err!(ctx, "{}", message(&args, "expectation failed"))
      }
      Value::Null
    })
    .into(),
  );

  test_lib.insert(
    "assert".into(),
    native_fn!((ctx, ..args) {
      if !args.first().map_or(false, Value::truthy) {
        native_err!(ctx, "{}", message(&args, "assertion failed"))
      }
      Value::Null
    })
    .into(),
  );

  test_lib.insert(
    "expect_death".into(),
    native_fn!((ctx, body: callable) {
      match ctx.call(&body, vec![]) {
        Err(Signal::Error(_)) => {}
        _ => {
          FAILURE_FLAG.with(|f| f.set(true));
          native_err!(ctx, "body failed to die")
        }
      }
      Value::Null
    })
    .into(),
  );

  Value::Map(test_lib)
}

/// Basic fixture for all conformance tests.
fn conformance_test(
  name: &'static str,
  text: &'static str,
  configure: impl FnOnce(EngineBuilder) -> EngineBuilder,
) {
  FAILURE_FLAG.with(|f| f.set(false));

  let builder = Engine::builder()
    .strict(true)
    .cache(0)
    .namespace("t", test_lib());
  let engine = configure(builder).build();
  let script = match engine.create_script(text) {
    Ok(s) => s,
    Err(e) => {
      eprintln!("{}: {}", name, e);
      panic!("failed to parse testcase")
    }
  };

  if let Err(e) = script.execute(Arc::new(MapContext::new())) {
    eprintln!("{}: {}", name, e);
    FAILURE_FLAG.with(|f| f.set(true));
  }

  if FAILURE_FLAG.with(|f| f.get()) {
    panic!("unexpected failure")
  }
}

conf_test!(must_pass);

conf_test!(variables);
conf_test!(lexical, lexical);
conf_test!(lambdas);
conf_test!(blocks);
conf_test!(conditionals);
conf_test!(loops);
conf_test!(switches);
conf_test!(exceptions);
conf_test!(generators);

conf_test!(nulls);
conf_test!(numbers);
conf_test!(strings);
conf_test!(collections);
conf_test!(operators);
