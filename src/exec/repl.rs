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

//! Execution environment for the JEXL Read-Eval-Print Loop.

use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use rustyline::error::ReadlineError;
use rustyline::Editor;

use crate::engine::Engine;
use crate::eval::context::MapContext;
use crate::eval::encode::jexl::JexlEncoding;
use crate::eval::encode::json::JsonEncoding;
use crate::eval::encode::EncodeError;
use crate::eval::encode::Encoder;
use crate::eval::value::Value;

const DOUBLE_CTRL_C_THRESHOLD: Duration = Duration::from_millis(300);

type PrintFn = Box<dyn Fn(&Value) -> Result<String, EncodeError>>;

/// All state for the REPL.
pub struct Executor {
  engine: Engine,
  context: Arc<MapContext>,
  editor: Editor<()>,
  last_ctrl_c: Instant,
  print_function: PrintFn,
}

impl Executor {
  /// Creates a new REPL; call `execute_loop()` to run it.
  pub fn new(engine: Engine) -> Self {
    Executor {
      engine,
      context: Arc::new(MapContext::new()),
      editor: Editor::new(),
      last_ctrl_c: Instant::now(),
      print_function: Box::new(|v| Encoder::<JexlEncoding>::new().encode(v)),
    }
  }

  /// Execs into the REPL; does not return except in the case of errors.
  pub fn execute_loop(&mut self) -> io::Result<Infallible> {
    let rustc = rustc_version::version()
      .map(|v| v.to_string())
      .unwrap_or_else(|_| "unknown".into());
    eprintln!(
      "Welcome to JEXL v{version} (rustc v{rustc}, {arch} {os})",
      version = env!("CARGO_PKG_VERSION"),
      os = std::env::consts::OS,
      arch = std::env::consts::ARCH,
      rustc = rustc,
    );
    eprintln!("Enter scripts below and have them evaluated.");
    eprintln!("Assignments to undeclared names persist between lines.");
    eprintln!("Run :quit, or double-press ^C, to escape.");
    eprintln!("Run :help for more information.");
    eprintln!();
    loop {
      let buf = self.read_line()?;
      if buf.trim().is_empty() {
        continue;
      }

      if buf.starts_with(':') {
        self.execute_command(&buf);
        continue;
      }

      if let Some(text) = self.eval(&buf) {
        println!("{}", text);
      }
    }
  }

  /// Evaluates one entry, returning what to print, if anything.
  fn eval(&self, src: &str) -> Option<String> {
    let script = match self.engine.create_script(src) {
      Ok(s) => s,
      Err(e) => {
        eprintln!("{}", e);
        return None;
      }
    };
    match script.execute(self.context.clone()) {
      Ok(Value::Null) => None,
      Ok(val) => match (self.print_function)(&val) {
        Ok(text) => Some(text),
        Err(e) => {
          eprintln!("{}", e);
          None
        }
      },
      Err(e) => {
        eprintln!("{}", e);
        None
      }
    }
  }

  fn read_line(&mut self) -> io::Result<String> {
    let mut buf = String::new();
    let mut indent = 0;
    loop {
      let prompt = if buf.is_empty() { "jexl> " } else { "   | " };
      let indent_whitespace = "  ".repeat(indent);
      match self
        .editor
        .readline_with_initial(prompt, (&indent_whitespace, ""))
      {
        Ok(s) => {
          buf.push_str(s.as_str());
          buf.push('\n');
        }
        Err(ReadlineError::Io(e)) => return Err(e),
        Err(ReadlineError::Interrupted) => {
          if self.last_ctrl_c.elapsed() < DOUBLE_CTRL_C_THRESHOLD {
            std::process::exit(0)
          }
          self.last_ctrl_c = Instant::now();

          return Ok(String::new());
        }
        Err(ReadlineError::Eof) => std::process::exit(0),
        Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
      }

      let (matches, i) = check_brackets_match(&buf);
      if matches || i < 0 {
        buf.pop();
        self.editor.add_history_entry(buf.as_str());
        return Ok(buf);
      }
      indent = i as usize;
    }
  }

  fn execute_command(&mut self, command: &str) {
    let args = command.split_ascii_whitespace().collect::<Vec<_>>();
    match args.first().copied().unwrap_or_default() {
      ":help" | ":h" => println!(
        "\
available commands:
:clear - clears the terminal
:emit  - set print mode: one of jexl, debug, or json
:help  - shows this message
:vars  - lists the names defined in the context
:quit  - exits the REPL\
"
      ),
      ":emit" | ":e" => match args.get(1).copied() {
        Some("jexl") | Some("x") => {
          self.print_function =
            Box::new(|v| Encoder::<JexlEncoding>::new().encode(v))
        }
        Some("json") | Some("j") => {
          self.print_function =
            Box::new(|v| Encoder::<JsonEncoding>::new().encode(v))
        }
        Some("debug") | Some("d") => {
          self.print_function = Box::new(|v| Ok(format!("{:#?}", v)))
        }
        _ => eprintln!("expected 'jexl', 'debug' or 'json'"),
      },
      ":vars" | ":v" => {
        let mut names = self.context.names();
        names.sort();
        for name in names {
          println!("{}", name);
        }
      }
      ":clear" | ":c" => {
        print!("{}{}", termion::clear::All, termion::cursor::Goto(1, 1))
      }
      ":quit" | ":q" => std::process::exit(0),
      command => eprintln!("unknown command: {}", command),
    }
  }
}

/// Returns true if `s` has balanced brackets, strings, and comments;
/// it also returns the expected indentation level.
fn check_brackets_match(s: &str) -> (bool, i32) {
  let mut bracket_count: i32 = 0;
  let mut comment_count: i32 = 0;

  let mut chars = s.chars().peekable();
  'char_loop: while let Some(c) = chars.next() {
    match (c, chars.peek()) {
      ('/', Some('/')) if comment_count == 0 => loop {
        match chars.next() {
          Some('\n') | None => continue 'char_loop,
          _ => {}
        }
      },

      ('/', Some('*')) => comment_count += 1,
      ('*', Some('/')) => comment_count -= 1,

      ('(', _) | ('[', _) | ('{', _) if comment_count == 0 => {
        bracket_count += 1
      }
      (')', _) | (']', _) | ('}', _) if comment_count == 0 => {
        bracket_count -= 1
      }

      ('"', _) | ('\'', _) if comment_count == 0 => loop {
        let next = chars.next();
        let peek = chars.peek();
        match (next, peek) {
          (Some('\\'), Some('\\')) => {
            let _ = chars.next();
          }
          (Some('\\'), Some(q)) if *q == c => {
            let _ = chars.next();
          }
          (Some(q), _) if q == c => continue 'char_loop,
          (None, _) => return (false, 0),
          _ => {}
        }
      },
      _ => {}
    }
  }

  (bracket_count == 0 && comment_count == 0, bracket_count)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn brackets() {
    assert_eq!(check_brackets_match("1 + 2"), (true, 0));
    assert_eq!(check_brackets_match("if (x) {"), (false, 1));
    assert_eq!(check_brackets_match("'{' + \"(\""), (true, 0));
    assert_eq!(check_brackets_match("f(/* ) */"), (false, 1));
    assert_eq!(check_brackets_match("[1, // ]\n"), (false, 1));
  }

  #[test]
  fn context_persists_between_entries() {
    let repl = Executor::new(Engine::new());
    assert_eq!(repl.eval("x = 40"), Some("40".to_string()));
    assert_eq!(repl.eval("x + 2"), Some("42".to_string()));
    assert_eq!(repl.eval("null"), None);
  }
}
