//! Template compiler and evaluation engine for jsonx.
//!
//! A raw specification (`{ "templates": [...], "root": ... }`) is compiled
//! once into an immutable [`CompiledSpec`], then evaluated any number of
//! times by an [`Engine`] against different inputs and runtime contexts.

pub mod ast;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod matcher;

pub use ast::{RawSpec, RawTemplate};
pub use compiler::{
    CompiledSpec, Compiler, ConformanceCheck, OutputNode, SchemaConformance, SpecMeta, Template,
    compile, compile_str,
};
pub use engine::{Engine, transform};
pub use error::{CompileError, TransformError};
pub use matcher::MatchPicker;
