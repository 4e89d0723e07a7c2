//! # cilsplice Prelude
//!
//! The types needed for a typical patch: load a module, resolve what to hook, build payloads
//! and inject them.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilsplice operations
pub use crate::{Error, ErrorKind};

/// The result type used throughout cilsplice
pub use crate::Result;

// ================================================================================================
// Module Model
// ================================================================================================

/// The in-memory module and its tokens
pub use crate::{CompiledModule, Token};

/// Methods and their bodies
pub use crate::metadata::method::{MethodAttributes, MethodBody, MethodDef};

/// Signatures used to define and match methods
pub use crate::metadata::signatures::{MethodSignature, TypeSignature};

// ================================================================================================
// Instructions
// ================================================================================================

/// Instruction model and payload builder
pub use crate::assembly::{Emitter, Instruction, OpCode, Operand};

// ================================================================================================
// Resolution and Injection
// ================================================================================================

/// Reference resolution
pub use crate::{MethodHandle, Resolver, TypeHandle};

/// Injection requests and batches
pub use crate::{inject, Anchor, InjectionConfig, InjectionPosition, InjectionReport, InjectionSpec};

/// Sessions
pub use crate::{patch_parallel, PatchJob, PatchSession};
