//! Structural and nominal interface conformance.

use ahash::AHashSet;

use crate::{
    access::{self, Receiver},
    exception::RunResult,
    heap::{Heap, HeapId},
    types::ClassChain,
    value::Value,
};

/// Names an implementer of `interface` must expose as methods.
///
/// Every name declared anywhere in the interface's chain whose nearest member is
/// function-like, in chain order.
pub fn required_methods(heap: &Heap, interface: HeapId) -> RunResult<Vec<String>> {
    let chain = ClassChain::of(heap, interface)?;
    let mut seen = AHashSet::new();
    let mut names = Vec::new();
    for (_, cls) in chain.classes() {
        for name in cls.namespace().keys() {
            if !seen.insert(name.as_str()) {
                continue;
            }
            if chain.resolve(name).is_some_and(|(_, member)| member.is_function_like()) {
                names.push(name.clone());
            }
        }
    }
    Ok(names)
}

/// Interfaces implemented by the head of `chain`: those declared by any class in
/// the chain, first declaration wins.
pub(crate) fn implemented_interfaces(chain: &ClassChain<'_>) -> Vec<HeapId> {
    let mut out: Vec<HeapId> = Vec::new();
    for (_, cls) in chain.classes() {
        for &iface in cls.declared_interfaces() {
            if !out.contains(&iface) {
                out.push(iface);
            }
        }
    }
    out
}

/// Returns true if `value` exposes every required method of `interface` as a
/// public callable.
///
/// Reads go through the normal access protocol from outside any class, so an
/// abstract method (which refuses access) and a protected or private one do not
/// count. Values without members only conform to interfaces that require nothing.
#[must_use]
pub fn structural(heap: &Heap, value: &Value, interface: HeapId) -> bool {
    let Ok(required) = required_methods(heap, interface) else {
        return false;
    };
    let receiver = match value {
        Value::Instance(id) => Receiver::Instance(*id),
        Value::Class(id) => Receiver::Class(*id),
        _ => return required.is_empty(),
    };
    required
        .iter()
        .all(|name| {
            access::check_visibility(heap, None, receiver, name).is_ok()
                && access::load(heap, receiver, name).is_ok_and(|found| found.is_function())
        })
}

/// Returns true if `value`'s class declares `interface`, directly, through an
/// ancestor, or through an interface extending it.
#[must_use]
pub fn nominal(heap: &Heap, value: &Value, interface: HeapId) -> bool {
    let class_id = match value {
        Value::Instance(id) => match heap.instance(*id) {
            Ok(inst) => inst.class_id(),
            Err(_) => return false,
        },
        Value::Class(id) => *id,
        _ => return false,
    };
    let Ok(chain) = ClassChain::of(heap, class_id) else {
        return false;
    };
    if chain.classes().any(|(id, _)| id == interface) {
        return true;
    }
    implemented_interfaces(&chain)
        .into_iter()
        .any(|iface| heap.class(iface).is_ok_and(|cls| cls.mro().contains(&interface)))
}

/// Dispatches to [`structural`] or [`nominal`].
#[must_use]
pub fn conforms(heap: &Heap, value: &Value, interface: HeapId, structural_check: bool) -> bool {
    if structural_check {
        structural(heap, value, interface)
    } else {
        nominal(heap, value, interface)
    }
}
