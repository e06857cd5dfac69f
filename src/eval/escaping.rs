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

//! String escaping and unescaping for literals and encoders.

use std::fmt::Write as _;

/// Unescapes the body of a quoted string literal.
pub fn unescape_utf8_literal(s: &str) -> Result<String, String> {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some('t') => out.push('\t'),
      Some('r') => out.push('\r'),
      Some('b') => out.push('\u{8}'),
      Some('f') => out.push('\u{c}'),
      Some('0') => out.push('\0'),
      Some('u') => {
        let hex: String = chars.by_ref().take(4).collect();
        let code = u32::from_str_radix(&hex, 16)
          .map_err(|_| format!("invalid unicode escape: \\u{}", hex))?;
        match char::from_u32(code) {
          Some(c) => out.push(c),
          None => return Err(format!("invalid code point: \\u{}", hex)),
        }
      }
      Some(c) => out.push(c),
      None => return Err("dangling escape at end of string".to_string()),
    }
  }
  Ok(out)
}

/// Returns whether `s` could be written as a bare identifier.
pub fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Writes `s` as a JEXL string literal into `buf`.
pub fn escape_jexl_string(s: &str, buf: &mut String) {
  buf.push('\'');
  for c in s.chars() {
    match c {
      '\'' => buf.push_str("\\'"),
      '\\' => buf.push_str("\\\\"),
      '\n' => buf.push_str("\\n"),
      '\t' => buf.push_str("\\t"),
      '\r' => buf.push_str("\\r"),
      c if c.is_control() => {
        let _ = write!(buf, "\\u{:04x}", c as u32);
      }
      c => buf.push(c),
    }
  }
  buf.push('\'');
}

/// Writes `s` as a JSON string into `buf`.
pub fn escape_json_string(s: &str, buf: &mut String) {
  buf.push('"');
  for c in s.chars() {
    match c {
      '"' => buf.push_str("\\\""),
      '\\' => buf.push_str("\\\\"),
      '\n' => buf.push_str("\\n"),
      '\t' => buf.push_str("\\t"),
      '\r' => buf.push_str("\\r"),
      c if (c as u32) < 0x20 => {
        let _ = write!(buf, "\\u{:04x}", c as u32);
      }
      c => buf.push(c),
    }
  }
  buf.push('"');
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unescape() {
    assert_eq!(unescape_utf8_literal(r"a\nb\'c").unwrap(), "a\nb'c");
    assert_eq!(unescape_utf8_literal(r"\u00e9").unwrap(), "\u{e9}");
    assert!(unescape_utf8_literal("\\").is_err());
  }

  #[test]
  fn escape() {
    let mut buf = String::new();
    escape_jexl_string("it's", &mut buf);
    assert_eq!(buf, r"'it\'s'");

    buf.clear();
    escape_json_string("say \"hi\"\n", &mut buf);
    assert_eq!(buf, r#""say \"hi\"\n""#);
  }
}
