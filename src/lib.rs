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

//! A JEXL interpreter.
//!
//! Scripts are compiled by an [`Engine`](engine::Engine) into immutable
//! [`Script`](engine::Script)s, which evaluate against a
//! [`Context`](eval::context::Context) of host variables.

pub mod syn;
#[macro_use]
pub mod eval;
pub mod engine;
pub mod exec;

pub use engine::Callable;
pub use engine::Engine;
pub use engine::EngineBuilder;
pub use engine::Script;
pub use eval::context::Context;
pub use eval::context::MapContext;
pub use eval::error::ErrorKind;
pub use eval::error::JexlError;
pub use eval::options::Options;
pub use eval::value::Value;
