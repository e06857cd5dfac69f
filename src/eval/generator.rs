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

//! Lazy generators.
//!
//! A generator body runs on its own thread, started by the first pull. The
//! producer and the consumer hand values over a rendezvous channel, so the
//! body never runs ahead of the consumer by more than one item. Dropping
//! every handle to a generator raises its stop flag and makes its next
//! `yield` fail, either of which unwinds the body.
//!
//! A consumer waiting for a value keeps polling its own cancellation state,
//! and stops the body if it is interrupted while waiting.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::thread::ThreadId;
use std::time::Duration;

use crossbeam::channel;
use crossbeam::channel::Receiver;
use crossbeam::channel::RecvTimeoutError;
use crossbeam::channel::Sender;
use parking_lot::Mutex;

use crate::eval::cancel::CancelFlag;
use crate::eval::cancel::Interrupt;
use crate::eval::cancel::Poller;
use crate::eval::error::ErrorKind;
use crate::eval::error::JexlError;
use crate::eval::value::Value;
use crate::syn::Span;

const STACK_SIZE: usize = 8 * 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Something produced by a generator body.
#[derive(Clone, Debug)]
pub enum Item {
  /// A yielded value.
  Value(Value),
  /// The body failed; this is the last item.
  Error(JexlError),
  /// The body was interrupted; this is the last item.
  Interrupt(Interrupt),
}

/// A generator body: runs to completion, yielding through the `Sink`.
pub type Body = Box<dyn FnOnce(Sink) + Send>;

/// The producing end of a generator.
pub struct Sink {
  items: Sender<Item>,
  resume: Receiver<()>,
}

/// Returned by `Sink::send()` once nobody can observe the generator anymore.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Abandoned;

impl Sink {
  /// Yields `value`, blocking until the consumer asks for the next one.
  pub fn send(&self, value: Value) -> Result<(), Abandoned> {
    self.items.send(Item::Value(value)).map_err(|_| Abandoned)?;
    self.resume.recv().map_err(|_| Abandoned)
  }

  /// Ends the generator, reporting a final error or interrupt if any.
  pub fn finish(self, last: Option<Item>) {
    if let Some(item) = last {
      let _ = self.items.send(item);
    }
  }
}

impl fmt::Debug for Sink {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("Sink")
  }
}

enum State {
  Cold(Body),
  Running {
    items: Receiver<Item>,
    resume: Sender<()>,
  },
  Done,
}

struct Inner {
  state: Mutex<State>,
  span: Span,
  stop: CancelFlag,
  producer: Mutex<Option<ThreadId>>,
}

impl Drop for Inner {
  fn drop(&mut self) {
    self.stop.cancel();
  }
}

/// A `Generator` is a lazily-evaluated sequence of values.
#[derive(Clone)]
pub struct Generator(Arc<Inner>);

impl Generator {
  /// Creates a generator that runs `body` once first pulled. `span` is the
  /// location reported if the body cannot be started; `stop` is raised once
  /// the body must unwind, and should be polled by it.
  pub fn new(span: Span, stop: CancelFlag, body: Body) -> Self {
    Generator(Arc::new(Inner {
      state: Mutex::new(State::Cold(body)),
      span,
      stop,
      producer: Mutex::new(None),
    }))
  }

  /// Pulls the next item; `None` means the generator is exhausted.
  ///
  /// While waiting, `poller` is checked every few milliseconds. If it
  /// reports an interrupt, the body is stopped, the generator is exhausted,
  /// and the interrupt is returned.
  pub fn pull(&self, poller: &Poller) -> Option<Item> {
    if *self.0.producer.lock() == Some(thread::current().id()) {
      return Some(Item::Error(JexlError::bare(
        ErrorKind::Eval,
        self.0.span,
        "generator pulled from its own body",
      )));
    }

    let mut state = self.0.state.lock();
    loop {
      match std::mem::replace(&mut *state, State::Done) {
        State::Done => return None,
        State::Cold(body) => match self.start(body) {
          Ok(running) => *state = running,
          Err(e) => return Some(Item::Error(e)),
        },
        State::Running { items, resume } => {
          if resume.send(()).is_err() {
            return None;
          }
          loop {
            match items.recv_timeout(POLL_INTERVAL) {
              Ok(Item::Value(v)) => {
                *state = State::Running { items, resume };
                return Some(Item::Value(v));
              }
              Ok(last) => return Some(last),
              Err(RecvTimeoutError::Disconnected) => return None,
              Err(RecvTimeoutError::Timeout) => {
                if let Some(i) = poller.poll() {
                  tracing::trace!(interrupt = ?i, "stopping generator");
                  self.0.stop.cancel();
                  return Some(Item::Interrupt(i));
                }
              }
            }
          }
        }
      }
    }
  }

  fn start(&self, body: Body) -> Result<State, JexlError> {
    let (item_tx, item_rx) = channel::bounded(0);
    let (resume_tx, resume_rx) = channel::bounded(0);
    let sink = Sink {
      items: item_tx,
      resume: resume_rx,
    };

    let handle = thread::Builder::new()
      .name("jexl-generator".into())
      .stack_size(STACK_SIZE)
      .spawn(move || {
        // Wait for the first pull before running anything.
        if sink.resume.recv().is_ok() {
          body(sink)
        }
      })
      .map_err(|e| {
        JexlError::bare(
          ErrorKind::Eval,
          self.0.span,
          format!("could not start generator: {}", e),
        )
      })?;
    *self.0.producer.lock() = Some(handle.thread().id());
    tracing::trace!(span = %self.0.span, "started generator");

    Ok(State::Running {
      items: item_rx,
      resume: resume_tx,
    })
  }

  /// Returns an iterator over the remaining values; an interrupt is
  /// reported as a cancellation error. The iterator waits on the body for
  /// as long as it takes.
  pub fn iter(&self) -> Iter {
    Iter {
      gen: self.clone(),
      poller: Poller::new(CancelFlag::new()),
      done: false,
    }
  }

  pub fn ptr_eq(&self, other: &Generator) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  pub fn ptr_value(&self) -> usize {
    Arc::as_ptr(&self.0) as *const () as usize
  }
}

impl fmt::Debug for Generator {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Generator({:#x})", self.ptr_value())
  }
}

/// An iterator over a `Generator`.
pub struct Iter {
  gen: Generator,
  poller: Poller,
  done: bool,
}

impl Iterator for Iter {
  type Item = Result<Value, JexlError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    match self.gen.pull(&self.poller) {
      Some(Item::Value(v)) => Some(Ok(v)),
      Some(Item::Error(e)) => {
        self.done = true;
        Some(Err(e))
      }
      Some(Item::Interrupt(_)) => {
        self.done = true;
        Some(Err(JexlError::bare(
          ErrorKind::Cancel,
          self.gen.0.span,
          "generator interrupted",
        )))
      }
      None => {
        self.done = true;
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Instant;

  fn idle() -> Poller {
    Poller::new(CancelFlag::new())
  }

  fn counting(n: i64) -> Generator {
    Generator::new(
      Span::synthetic(),
      CancelFlag::new(),
      Box::new(move |sink: Sink| {
        for i in 0..n {
          if sink.send(Value::Long(i)).is_err() {
            return;
          }
        }
        sink.finish(None)
      }),
    )
  }

  #[test]
  fn yields_in_order() {
    let values: Vec<Value> =
      counting(3).iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(values, vec![Value::Long(0), Value::Long(1), Value::Long(2)]);
  }

  #[test]
  fn exhausted_stays_exhausted() {
    let gen = counting(1);
    assert!(matches!(gen.pull(&idle()), Some(Item::Value(_))));
    assert!(gen.pull(&idle()).is_none());
    assert!(gen.pull(&idle()).is_none());
  }

  #[test]
  fn lazy_until_pulled() {
    let (tx, rx) = channel::unbounded();
    let gen = Generator::new(
      Span::synthetic(),
      CancelFlag::new(),
      Box::new(move |sink: Sink| {
        let _ = tx.send(());
        let _ = sink.send(Value::Null);
      }),
    );
    assert!(rx.try_recv().is_err());
    gen.pull(&idle());
    assert!(rx.try_recv().is_ok());
  }

  #[test]
  fn abandoned_producer_unwinds() {
    let (tx, rx) = channel::unbounded();
    let gen = Generator::new(
      Span::synthetic(),
      CancelFlag::new(),
      Box::new(move |sink: Sink| {
        let mut i = 0;
        while sink.send(Value::Long(i)).is_ok() {
          i += 1;
        }
        let _ = tx.send(i);
      }),
    );
    assert!(matches!(gen.pull(&idle()), Some(Item::Value(Value::Long(0)))));
    drop(gen);
    assert_eq!(rx.recv().unwrap(), 0);
  }

  #[test]
  fn errors_end_the_sequence() {
    let gen = Generator::new(
      Span::synthetic(),
      CancelFlag::new(),
      Box::new(|sink: Sink| {
        let _ = sink.send(Value::Long(1));
        let e = JexlError::bare(ErrorKind::Eval, Span::synthetic(), "boom");
        sink.finish(Some(Item::Error(e)))
      }),
    );
    let mut it = gen.iter();
    assert!(matches!(it.next(), Some(Ok(Value::Long(1)))));
    assert!(matches!(it.next(), Some(Err(_))));
    assert!(it.next().is_none());
  }

  #[test]
  fn expired_deadline_stops_the_body() {
    let stop = CancelFlag::new();
    let watched = stop.clone();
    let (tx, rx) = channel::unbounded();
    let gen = Generator::new(
      Span::synthetic(),
      stop,
      Box::new(move |sink: Sink| {
        while !watched.is_cancelled() {
          thread::sleep(Duration::from_millis(1));
        }
        let _ = tx.send(());
        sink.finish(None)
      }),
    );

    let mut poller = idle();
    poller.push_deadline(Instant::now() + Duration::from_millis(20));
    assert!(matches!(
      gen.pull(&poller),
      Some(Item::Interrupt(Interrupt::Deadline(0)))
    ));
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(gen.pull(&idle()).is_none());
  }

  #[test]
  fn pulling_from_its_own_body_fails() {
    let (tx, rx) = channel::bounded::<Generator>(1);
    let gen = Generator::new(
      Span::synthetic(),
      CancelFlag::new(),
      Box::new(move |sink: Sink| {
        let me = match rx.recv() {
          Ok(g) => g,
          Err(_) => return,
        };
        let item = me.pull(&idle());
        drop(me);
        sink.finish(item)
      }),
    );
    tx.send(gen.clone()).unwrap();
    assert!(matches!(gen.pull(&idle()), Some(Item::Error(_))));
  }
}
