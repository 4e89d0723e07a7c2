//! The compiled module model and its binary image.
//!
//! - [`module`] - [`module::CompiledModule`] and its tables
//! - [`method`] - Method definitions, bodies and exception clauses
//! - [`signatures`] - Type and method signatures
//! - [`token`] - Metadata tokens
//! - [`strings`] - The `#US` user string heap
//! - [`image`] - [`image::ModuleCodec`] and the native [`image::ImageCodec`]

pub mod image;
pub mod method;
pub mod module;
pub mod signatures;
pub mod strings;
pub mod token;
