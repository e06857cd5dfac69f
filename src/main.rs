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

#![deny(unused)]

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use jexl::eval::encode::json::JsonEncoding;
use jexl::eval::encode::Encoder;
use jexl::exec::fs::Local;
use jexl::exec::parallel::Executor;
use jexl::Engine;
use jexl::MapContext;
use jexl::Value;

const USAGE: &str = "\
usage: jexl [--strict] [--jobs N] [--timeout MS [--default EXPR]] FILE...
       jexl             (starts a REPL)";

/// Command-line configuration.
struct Args {
  strict: bool,
  jobs: usize,
  timeout: Option<Duration>,
  fallback: Option<String>,
  files: Vec<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
  let mut parsed = Args {
    strict: false,
    jobs: 8,
    timeout: None,
    fallback: None,
    files: Vec::new(),
  };
  let number = |flag: &str, v: Option<String>| -> Result<u64, String> {
    v.ok_or_else(|| format!("{} expects a value", flag))?
      .parse()
      .map_err(|e| format!("bad value for {}: {}", flag, e))
  };
  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--strict" => parsed.strict = true,
      "--jobs" => parsed.jobs = number("--jobs", args.next())? as usize,
      "--timeout" => {
        let ms = number("--timeout", args.next())?;
        parsed.timeout = Some(Duration::from_millis(ms));
      }
      "--default" => {
        let expr = args.next().ok_or("--default expects a value")?;
        parsed.fallback = Some(expr);
      }
      "--help" | "-h" => return Err(USAGE.to_string()),
      flag if flag.starts_with("--") => {
        return Err(format!("unknown flag {}\n{}", flag, USAGE))
      }
      file => parsed.files.push(file.into()),
    }
  }
  if parsed.fallback.is_some() && parsed.timeout.is_none() {
    return Err("--default requires --timeout".to_string());
  }
  Ok(parsed)
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = match parse_args(std::env::args().skip(1)) {
    Ok(a) => a,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(2)
    }
  };
  let engine = Engine::builder().strict(args.strict).build();

  if args.files.is_empty() {
    if let Err(e) = jexl::exec::repl::Executor::new(engine).execute_loop() {
      eprintln!("error: {}", e);
      process::exit(1)
    }
    return;
  }

  let fs = match Local::new() {
    Ok(fs) => fs,
    Err(e) => {
      eprintln!("error: cannot access working directory: {}", e);
      process::exit(1)
    }
  };

  let mut exec = Executor::new(engine.clone(), &fs, std::io::stderr());
  if let Some(timeout) = args.timeout {
    let fallback = match &args.fallback {
      None => Value::Null,
      Some(src) => match engine
        .create_expression(src)
        .and_then(|s| s.execute(Arc::new(MapContext::new())))
      {
        Ok(v) => v,
        Err(e) => {
          eprintln!("error: bad --default: {}", e);
          process::exit(2)
        }
      },
    };
    exec = exec.with_timeout(timeout, fallback);
  }

  let outcomes =
    match exec.exec_files(args.files.iter().map(AsRef::as_ref), args.jobs) {
      Ok(v) => v,
      Err(n) => {
        eprintln!("error: got {} errors", n);
        process::exit(1)
      }
    };

  for (file, outcome) in outcomes {
    match Encoder::<JsonEncoding>::new().encode(outcome.value()) {
      Ok(j) => println!("# {}\n{}", file.display(), j),
      Err(e) => eprintln!("# {}\n{}", file.display(), e),
    }
  }
}
