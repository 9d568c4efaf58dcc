#![doc = include_str!("../../../README.md")]

mod access;
mod attribute;
mod body;
mod config;
pub mod conformance;
mod exception;
mod function;
mod heap;
mod pipeline;
mod runtime;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    access::Receiver,
    attribute::{
        Attribute, AttributeInfo, AttributeKind, AttributeTag, Member, Predicate, Slot, Variable, Visibility,
        is_attribute,
    },
    body::ClassBody,
    config::{DEFAULT_MAX_INHERITANCE_DEPTH, DEFAULT_MAX_MRO_LENGTH, DEFAULT_RESERVED_PREFIX, RuntimeConfig},
    exception::{ExcType, Exception, RunResult},
    function::{Function, FunctionId},
    heap::{Heap, HeapData, HeapId, HeapStats},
    runtime::Runtime,
    tracer::{ContractTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{AttributeRegistry, ClassKind, ClassObject, Instance, RegistryEntry},
    value::{BuiltinType, TypeSpec, Value},
};
