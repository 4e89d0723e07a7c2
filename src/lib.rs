// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # cilsplice
//!
//! Splice CIL instruction sequences into the method bodies of compiled .NET style modules.
//!
//! `cilsplice` loads a module image into a mutable object model, resolves logical references
//! (`Terraria.Main::Update`, `System.Console::WriteLine(string)`) to tokens, turns anchors
//! ("before every return", "after the second call to X", "at instruction 5") into concrete
//! insertion points and splices payloads in while keeping branch targets and exception regions
//! pointing at the instructions they meant. The patched module is written back as an image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cilsplice::prelude::*;
//! use cilsplice::resolver::{DirectoryResolver, HostMethod};
//!
//! let mut session = PatchSession::open("Terraria.cmod", Arc::new(DirectoryResolver::new(&["lib"])))?;
//!
//! let write_line = session.method_of(
//!     &HostMethod::of::<fn(String)>("mscorlib", "System.Console", "WriteLine"),
//! )?;
//! let update = session.resolve_method("Terraria.Main", "Update", &[] as &[&str])?;
//!
//! session.inject(vec![InjectionSpec::method(
//!     update.token,
//!     InjectionPosition::Pre,
//!     Emitter::new().ldstr("Hello, world").call(write_line.token).finish()?,
//! )])?;
//! session.write("Prism.Terraria.cmod")?;
//! # Ok::<(), cilsplice::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The compiled module model: tokens, signatures, methods and bodies, and the
//!   image codec that reads and writes it
//! - [`assembly`] - Opcodes, the index based instruction model, bytecode decoding and encoding
//!   and the payload [`assembly::Emitter`]
//! - [`resolver`] - Name to token resolution, cross-module imports and the pluggable module
//!   resolution strategies
//! - [`injection`] - Anchors, the splice engine and batch injection
//! - [`PatchSession`] and [`patch_parallel`] - One module under patch, and many at once
//!
//! ## Instruction model
//!
//! Branch operands name their target by instruction index rather than byte offset. A splice
//! only has to shift indices, and the encoder derives offsets again when the module is written,
//! promoting short branches whose displacement no longer fits.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Batch failures carry the index of the
//! failing spec:
//!
//! ```rust,no_run
//! use cilsplice::{prelude::*, Error};
//!
//! # fn run(module: &mut CompiledModule, specs: Vec<InjectionSpec>) {
//! match inject(module, specs, &InjectionConfig::default()) {
//!     Ok(report) => println!("{} instructions added", report.inserted()),
//!     Err(error @ Error::Injection { index, .. }) => {
//!         println!("spec {index} failed ({}): {error}", error.kind())
//!     }
//!     Err(error) => println!("{error}"),
//! }
//! # }
//! ```
//!
//! ## Logging
//!
//! `cilsplice` logs through the [`log`] facade and never installs a logger. Loads, writes and
//! applied specs are reported at `debug`, individual splices and cache events at `trace`.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use cilsplice::prelude::*;
///
/// let module = CompiledModule::new("Game");
/// assert!(module.types().is_empty());
/// ```
pub mod prelude;

/// Opcodes, instructions and the bytecode codec.
pub mod assembly;

/// Injection of instruction sequences into method bodies.
pub mod injection;

/// The compiled module model and its image format.
pub mod metadata;

/// Resolution of logical references.
pub mod resolver;

mod session;

/// `cilsplice` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::{Error, ErrorKind};

pub use file::{parser::Parser, writer::Writer, File};

pub use metadata::{module::CompiledModule, token::Token};

pub use injection::{
    inject, Anchor, InjectionConfig, InjectionPosition, InjectionReport, InjectionSpec,
};

pub use resolver::{MethodHandle, Resolver, TypeHandle};

pub use session::{patch_parallel, PatchJob, PatchSession};
