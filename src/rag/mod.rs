//! Context assembly for answer generation

pub mod assembler;

pub use assembler::{ContextAssembler, CONTEXT_SEPARATOR};
