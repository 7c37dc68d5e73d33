//! Compiles tree-shaped filter conditions into inline SQL predicates, and
//! derives per-entity field/column mappings and projection clauses.

pub mod ast;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod operator;
pub mod sql_compiler;

pub use ast::{FilterGroup, FilterRule};
pub use catalog::{EntityMetadata, FieldCatalog, FieldDescriptor, MemoryCatalog};
pub use config::{CompilerConfig, ConfigError, ValueEscaping};
pub use descriptor::{DescriptorCache, FieldColumnMap, QueryDescriptor};
pub use operator::FilterOperate;
pub use sql_compiler::FilterCompiler;
