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

//! Execution environment for evaluating many JEXL files at once.

use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chashmap::CHashMap;
use crossbeam::channel;
use parking_lot::Mutex;

use crate::engine::Engine;
use crate::eval::context::MapContext;
use crate::eval::value::Value;
use crate::exec::fs::FileSys;

/// How a file's evaluation ended.
#[derive(Clone, Debug)]
pub enum Outcome {
  /// The script ran to completion.
  Complete(Value),
  /// The script overran its time budget; carries the fallback value.
  TimedOut(Value),
}

impl Outcome {
  pub fn value(&self) -> &Value {
    match self {
      Outcome::Complete(v) | Outcome::TimedOut(v) => v,
    }
  }
}

/// A parallel executor, which can execute a large set of JEXL files
/// simultaneously.
pub struct Executor<'i, Fs> {
  engine: Engine,
  fs: &'i Fs,
  results: CHashMap<&'i Path, Outcome>,
  log_output: Mutex<Box<dyn io::Write + Send + 'i>>,
  errors: AtomicUsize,
  timeout: Option<Duration>,
  fallback: Value,
}

impl<'i, Fs> Executor<'i, Fs>
where
  Fs: FileSys,
{
  /// Constructs a new `Executor`, using the given engine, file system, and
  /// log sink.
  pub fn new(
    engine: Engine,
    fs: &'i Fs,
    log_output: impl io::Write + Send + 'i,
  ) -> Self {
    Executor {
      engine,
      fs,
      results: CHashMap::new(),
      log_output: Mutex::new(Box::new(log_output)),
      errors: AtomicUsize::new(0),
      timeout: None,
      fallback: Value::Null,
    }
  }

  /// Cancels scripts running longer than `timeout`, reporting `fallback`
  /// as their result.
  pub fn with_timeout(mut self, timeout: Duration, fallback: Value) -> Self {
    self.timeout = Some(timeout);
    self.fallback = fallback;
    self
  }

  /// Executes the given set of files with the given level of parallelism.
  ///
  /// Returns the outcome of every file, in the order given, or the number of
  /// files that failed.
  pub fn exec_files(
    &self,
    file_names: impl IntoIterator<Item = &'i Path>,
    parallelism: usize,
  ) -> Result<Vec<(&'i Path, Outcome)>, usize> {
    let file_names = file_names.into_iter().collect::<Vec<_>>();
    let next_work_item = AtomicUsize::new(0);
    let spawned = crossbeam::scope(|s| {
      for i in 0..parallelism.max(1) {
        let worker = s
          .builder()
          .name(format!("jexl-evaluator-{}", i))
          .stack_size(1024 * 1024 * 8) // 8 MB.
          .spawn(|_| loop {
            let idx = next_work_item.fetch_add(1, Ordering::SeqCst);
            if idx >= file_names.len() {
              return;
            }
            let file_name = file_names[idx];
            if self.results.contains_key(&file_name) {
              continue;
            }
            if let Some(outcome) = self.exec(file_name) {
              self.results.insert(file_name, outcome);
            }
          });
        if let Err(e) = worker {
          self.log(format_args!("error: cannot start worker: {}", e));
          self.errors.fetch_add(1, Ordering::SeqCst);
        }
      }
    });
    if spawned.is_err() {
      self.errors.fetch_add(1, Ordering::SeqCst);
    }

    let errors = self.errors.load(Ordering::SeqCst);
    if errors > 0 {
      return Err(errors);
    }

    let mut outcomes = Vec::with_capacity(file_names.len());
    for file_name in file_names {
      match self.results.get(&file_name) {
        Some(outcome) => outcomes.push((file_name, outcome.clone())),
        None => bug!("no outcome recorded for {}", file_name.display()),
      }
    }
    Ok(outcomes)
  }

  fn log(&self, args: std::fmt::Arguments) {
    // A broken log sink must not abort evaluation.
    let _ = writeln!(self.log_output.lock(), "{}", args);
  }

  fn fail(&self, args: std::fmt::Arguments) -> Option<Outcome> {
    self.errors.fetch_add(1, Ordering::SeqCst);
    self.log(args);
    None
  }

  /// Actually executes some JEXL.
  fn exec(&self, file_name: &'i Path) -> Option<Outcome> {
    self.log(format_args!("info: queueing {}...", file_name.display()));
    tracing::debug!(file = %file_name.display(), "evaluating");

    let text = match self.fs.read_file(file_name) {
      Ok(s) => s,
      Err(e) => {
        return self.fail(format_args!(
          "error: cannot read file {}: {}",
          file_name.display(),
          e
        ))
      }
    };

    let script = match self.engine.create_script(&text) {
      Ok(s) => s,
      Err(e) => {
        return self.fail(format_args!("{}: {}", file_name.display(), e))
      }
    };

    let callable = script.callable(Arc::new(MapContext::new()), Vec::new());
    let result = match self.timeout {
      None => callable.call(),
      Some(timeout) => {
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        let flag = callable.cancel_flag().clone();
        let watchdog = std::thread::Builder::new()
          .name("jexl-watchdog".into())
          .spawn(move || {
            if let Err(channel::RecvTimeoutError::Timeout) =
              done_rx.recv_timeout(timeout)
            {
              flag.cancel();
            }
          });
        let result = callable.call();
        let _ = done_tx.send(());
        if let Ok(handle) = watchdog {
          let _ = handle.join();
        }
        result
      }
    };

    match result {
      Ok(v) => {
        self.log(format_args!("info: finished {}", file_name.display()));
        Some(Outcome::Complete(v))
      }
      Err(e) if e.is_cancel() && self.timeout.is_some() => {
        tracing::warn!(file = %file_name.display(), "evaluation timed out");
        self.log(format_args!(
          "warning: {} timed out; using the default value",
          file_name.display()
        ));
        Some(Outcome::TimedOut(self.fallback.clone()))
      }
      Err(e) => self.fail(format_args!("{}: {}", file_name.display(), e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::exec::fs::Memory;

  #[test]
  fn runs_every_file() {
    let mut fs = Memory::new();
    fs.insert("a.jexl", "var x = 20; x + 22");
    fs.insert("b.jexl", "size([1, 2, 3])");
    fs.insert("c.jexl", "'a' + 'b'");

    let exec = Executor::new(Engine::new(), &fs, io::sink());
    let paths = ["a.jexl", "b.jexl", "c.jexl"].iter().copied().map(Path::new);
    let outcomes = exec.exec_files(paths, 2).unwrap();
    let values = outcomes
      .iter()
      .map(|(_, o)| o.value().clone())
      .collect::<Vec<_>>();
    assert_eq!(
      values,
      vec![Value::Int(42), Value::Int(3), Value::String("ab".into())]
    );
  }

  #[test]
  fn failures_are_counted() {
    let mut fs = Memory::new();
    fs.insert("bad.jexl", "var = ;");
    fs.insert("throws.jexl", "throw 'no'");

    let exec = Executor::new(Engine::new(), &fs, io::sink());
    let paths = ["bad.jexl", "throws.jexl", "missing.jexl"]
      .iter()
      .copied()
      .map(Path::new);
    assert_eq!(exec.exec_files(paths, 4).unwrap_err(), 3);
  }

  #[test]
  fn timeouts_report_fallback() {
    let mut fs = Memory::new();
    fs.insert("spin.jexl", "while (true) { }");
    fs.insert("quick.jexl", "1");

    let exec = Executor::new(Engine::new(), &fs, io::sink())
      .with_timeout(Duration::from_millis(50), Value::Int(-1));
    let paths = ["spin.jexl", "quick.jexl"].iter().copied().map(Path::new);
    let outcomes = exec.exec_files(paths, 2).unwrap();
    assert!(matches!(outcomes[0].1, Outcome::TimedOut(Value::Int(-1))));
    assert!(matches!(outcomes[1].1, Outcome::Complete(Value::Int(1))));
  }
}
