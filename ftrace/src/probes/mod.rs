//! Probe specification: parameter catalog, event descriptors and the
//! built-in event registry.

pub mod descriptor;
pub mod param_kind;
pub mod registry;
pub mod syscalls;

pub use descriptor::{EventDescriptor, Param, ProbeLayout, DEFAULT_LIST_LEN, STANDARD_FIELDS};
pub use param_kind::{Fetch, KindSpec, ParameterKind};
pub use registry::EventRegistry;
pub use syscalls::builtin_events;
