//! Meta-model: type descriptors and the registry that resolves them

pub mod descriptor;
pub mod registry;

pub use descriptor::{AttributeDescriptor, AttributeKind, SchemaFragment, TypeDescriptor, TypeKind};
pub use registry::{MetaModel, TypeId};
