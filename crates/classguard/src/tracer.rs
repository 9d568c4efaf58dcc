//! Contract-event tracing.
//!
//! The [`ContractTracer`] trait defines hook points at the events the runtime
//! enforces contracts on: class definition, attribute binding, interface
//! promotion, instantiation, retroactive installation and every returned error.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Does nothing (the default) |
//! | [`StderrTracer`] | Human-readable event log to stderr |
//! | [`RecordingTracer`] | Records [`TraceEvent`]s for inspection or JSON export |
//!
//! # Usage
//!
//! ```
//! use classguard::{ClassBody, RecordingTracer, Runtime};
//!
//! let tracer = RecordingTracer::new();
//! let mut rt = Runtime::new().with_tracer(tracer.clone());
//! rt.define_class("Point", &[], ClassBody::new()).unwrap();
//! assert_eq!(tracer.event_count(), 1);
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    attribute::AttributeTag,
    exception::{ExcType, Exception},
    heap::HeapId,
    types::ClassKind,
};

/// Event recorded by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    /// A class or interface passed the construction pipeline and was allocated.
    ClassDefined {
        id: HeapId,
        name: String,
        kind: ClassKind,
        is_abstract: bool,
    },
    /// An attribute received its name.
    AttributeBound {
        class: String,
        name: String,
        kind: AttributeTag,
    },
    /// An interface member was turned into an abstract method.
    AbstractPromoted { interface: String, name: String },
    Instantiated { class: String, instance: HeapId },
    /// An attribute was added to an existing class.
    AttributeInstalled {
        class: String,
        name: String,
        kind: AttributeTag,
    },
    /// An operation failed; one event per returned error.
    Violation { kind: ExcType, message: Option<String> },
}

/// Hooks called by the runtime at contract events.
///
/// All methods have default no-op implementations, so implementations only
/// override the hooks they care about.
pub trait ContractTracer: fmt::Debug {
    /// Called after a class or interface has been allocated.
    #[inline(always)]
    fn on_class_defined(&mut self, _id: HeapId, _name: &str, _kind: ClassKind, _is_abstract: bool) {}

    /// Called when the pipeline binds an attribute declared in a class body.
    #[inline(always)]
    fn on_attribute_bound(&mut self, _class: &str, _name: &str, _kind: AttributeTag) {}

    /// Called for every interface member promoted to an abstract method.
    #[inline(always)]
    fn on_abstract_promoted(&mut self, _interface: &str, _name: &str) {}

    /// Called after an instance is allocated, before its initializer runs.
    #[inline(always)]
    fn on_instantiate(&mut self, _class: &str, _instance: HeapId) {}

    /// Called after a retroactive installation succeeded.
    #[inline(always)]
    fn on_attribute_installed(&mut self, _class: &str, _name: &str, _kind: AttributeTag) {}

    /// Called with every error the runtime is about to return.
    #[inline(always)]
    fn on_violation(&mut self, _error: &Exception) {}
}

// ============================================================================
// NoopTracer
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl ContractTracer for NoopTracer {}

// ============================================================================
// StderrTracer
// ============================================================================

/// Tracer that prints a human-readable event log to stderr.
///
/// Output format:
/// ```text
/// +++ CLASS     Shape (Interface, abstract) #0
///   . bind      Shape.area AbstractMethod
/// !!! VIOLATION AbstractInstantiationError: cannot instantiate abstract class 'Shape'
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Only report violations.
    violations_only: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer that only logs violations.
    #[must_use]
    pub fn violations_only() -> Self {
        Self { violations_only: true }
    }
}

impl ContractTracer for StderrTracer {
    fn on_class_defined(&mut self, id: HeapId, name: &str, kind: ClassKind, is_abstract: bool) {
        if self.violations_only {
            return;
        }
        let flag = if is_abstract { ", abstract" } else { "" };
        eprintln!("+++ CLASS     {name} ({kind}{flag}) {id}");
    }

    fn on_attribute_bound(&mut self, class: &str, name: &str, kind: AttributeTag) {
        if self.violations_only {
            return;
        }
        eprintln!("  . bind      {class}.{name} {kind}");
    }

    fn on_abstract_promoted(&mut self, interface: &str, name: &str) {
        if self.violations_only {
            return;
        }
        eprintln!("  ^ promote   {interface}.{name}");
    }

    fn on_instantiate(&mut self, class: &str, instance: HeapId) {
        if self.violations_only {
            return;
        }
        eprintln!(">>> NEW       {class} {instance}");
    }

    fn on_attribute_installed(&mut self, class: &str, name: &str, kind: AttributeTag) {
        if self.violations_only {
            return;
        }
        eprintln!("  + install   {class}.{name} {kind}");
    }

    fn on_violation(&mut self, error: &Exception) {
        eprintln!("!!! VIOLATION {error}");
    }
}

// ============================================================================
// RecordingTracer
// ============================================================================

/// Tracer that records every event in chronological order.
///
/// The event log is shared between clones, so a caller can keep one clone and
/// hand the other to [`Runtime::with_tracer`](crate::Runtime::with_tracer).
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Rc<RefCell<Vec<TraceEvent>>>,
    /// Optional limit on number of events recorded.
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Rc::default(),
            limit: Some(limit),
        }
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns only the recorded violations.
    #[must_use]
    pub fn violations(&self) -> Vec<TraceEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, TraceEvent::Violation { .. }))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Serializes the recorded events as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.events.borrow())
    }

    fn record(&self, event: TraceEvent) {
        let mut events = self.events.borrow_mut();
        if self.limit.is_some_and(|limit| events.len() >= limit) {
            return;
        }
        events.push(event);
    }
}

impl ContractTracer for RecordingTracer {
    fn on_class_defined(&mut self, id: HeapId, name: &str, kind: ClassKind, is_abstract: bool) {
        self.record(TraceEvent::ClassDefined {
            id,
            name: name.to_owned(),
            kind,
            is_abstract,
        });
    }

    fn on_attribute_bound(&mut self, class: &str, name: &str, kind: AttributeTag) {
        self.record(TraceEvent::AttributeBound {
            class: class.to_owned(),
            name: name.to_owned(),
            kind,
        });
    }

    fn on_abstract_promoted(&mut self, interface: &str, name: &str) {
        self.record(TraceEvent::AbstractPromoted {
            interface: interface.to_owned(),
            name: name.to_owned(),
        });
    }

    fn on_instantiate(&mut self, class: &str, instance: HeapId) {
        self.record(TraceEvent::Instantiated {
            class: class.to_owned(),
            instance,
        });
    }

    fn on_attribute_installed(&mut self, class: &str, name: &str, kind: AttributeTag) {
        self.record(TraceEvent::AttributeInstalled {
            class: class.to_owned(),
            name: name.to_owned(),
            kind,
        });
    }

    fn on_violation(&mut self, error: &Exception) {
        self.record(TraceEvent::Violation {
            kind: error.exc_type(),
            message: error.message().map(str::to_owned),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_respects_limit() {
        let mut tracer = RecordingTracer::with_limit(1);
        tracer.on_abstract_promoted("I", "a");
        tracer.on_abstract_promoted("I", "b");
        assert_eq!(tracer.event_count(), 1);
    }

    #[test]
    fn clones_share_the_log() {
        let tracer = RecordingTracer::new();
        let mut other = tracer.clone();
        other.on_violation(&ExcType::ScopeError.with_message("x"));
        assert_eq!(tracer.violations().len(), 1);
        tracer.clear();
        assert_eq!(other.event_count(), 0);
    }

    #[test]
    fn events_serialize_with_tag() {
        let mut tracer = RecordingTracer::new();
        tracer.on_abstract_promoted("Shape", "area");
        assert_eq!(
            tracer.to_json().unwrap(),
            r#"[{"event":"AbstractPromoted","interface":"Shape","name":"area"}]"#
        );
    }
}
