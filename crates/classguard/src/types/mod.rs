pub mod class;
pub mod registry;

pub(crate) use class::{ClassChain, compute_c3_mro, resolve};
pub use class::{ClassKind, ClassObject, Instance};
pub use registry::{AttributeRegistry, RegistryEntry};
