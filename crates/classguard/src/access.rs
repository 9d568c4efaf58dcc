//! Name resolution for attribute reads, writes and deletes.
//!
//! The nearest member in the receiver's chain decides what happens: an
//! [`Attribute`](crate::Attribute) applies its contract; a plain class value is
//! shadowed by instance storage on reads and replaced by a plain instance field on
//! writes; a name with no member at all lives in plain instance storage.
//!
//! Visibility is checked separately, against the class whose method is running.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{
    attribute::{Attribute, Member, Slot, Visibility},
    exception::{ExcType, Exception, RunResult},
    heap::{Heap, HeapId},
    types::resolve,
    value::Value,
};

/// The object an attribute operation is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Receiver {
    /// Class-scope access, with no owning instance.
    Class(HeapId),
    Instance(HeapId),
}

impl Receiver {
    /// Returns the class whose chain resolves names for this receiver.
    pub fn class_id(self, heap: &Heap) -> RunResult<HeapId> {
        match self {
            Self::Class(id) => heap.class(id).map(|_| id),
            Self::Instance(id) => heap.instance(id).map(|inst| inst.class_id()),
        }
    }

    #[must_use]
    pub fn instance(self) -> Option<HeapId> {
        match self {
            Self::Class(_) => None,
            Self::Instance(id) => Some(id),
        }
    }
}

impl From<Receiver> for Value {
    fn from(receiver: Receiver) -> Self {
        match receiver {
            Receiver::Class(id) => Self::Class(id),
            Receiver::Instance(id) => Self::Instance(id),
        }
    }
}

fn missing(heap: &Heap, receiver: Receiver, class_id: HeapId, name: &str) -> Exception {
    let class_name = heap.class(class_id).map_or("<unknown>", |cls| cls.name());
    match receiver {
        Receiver::Class(_) => ExcType::attribute_error(format!("type object '{class_name}'"), name),
        Receiver::Instance(_) => ExcType::attribute_error(format!("'{class_name}' object"), name),
    }
}

/// Reads `name` from the receiver.
pub(crate) fn load(heap: &Heap, receiver: Receiver, name: &str) -> RunResult<Value> {
    let class_id = receiver.class_id(heap)?;
    let resolved = resolve(heap, class_id, name)?.map(|(_, member)| member);
    match (receiver, resolved) {
        (_, Some(Member::Attribute(attr))) => attr.get(heap, receiver.instance()),
        (Receiver::Class(_), Some(Member::Value(value))) => Ok(value.clone()),
        (Receiver::Instance(id), Some(Member::Value(value))) => {
            Ok(heap.instance(id)?.get(name).unwrap_or(value).clone())
        }
        (Receiver::Instance(id), None) => heap
            .instance(id)?
            .get(name)
            .cloned()
            .ok_or_else(|| missing(heap, receiver, class_id, name)),
        (Receiver::Class(_), None) => Err(missing(heap, receiver, class_id, name)),
    }
}

/// Returns the attribute `name` resolves to, if the nearest member is one.
pub(crate) fn resolve_attribute(heap: &Heap, class_id: HeapId, name: &str) -> RunResult<Option<Rc<Attribute>>> {
    Ok(resolve(heap, class_id, name)?.and_then(|(_, member)| member.as_attribute().cloned()))
}

/// Refuses access to a protected or private attribute unless `context`, the class
/// whose method is running, may see it.
///
/// Private members are visible from their declaring class only; protected members
/// from any class whose chain contains the declaring class.
pub(crate) fn check_visibility(
    heap: &Heap,
    context: Option<HeapId>,
    receiver: Receiver,
    name: &str,
) -> RunResult<()> {
    let class_id = receiver.class_id(heap)?;
    let Some((owner, Member::Attribute(attr))) = resolve(heap, class_id, name)? else {
        return Ok(());
    };
    let visible = match attr.visibility() {
        Visibility::Public => true,
        Visibility::Private => context == Some(owner),
        Visibility::Protected => {
            context.is_some_and(|ctx| heap.class(ctx).is_ok_and(|cls| cls.mro().contains(&owner)))
        }
    };
    if visible {
        Ok(())
    } else {
        let owner_name = heap.class(owner).map_or("<unknown>", |cls| cls.name());
        Err(ExcType::visibility(attr.visibility(), owner_name, name))
    }
}

/// Writes a plain value through an instance.
///
/// Names resolving to an attribute go through its contract; anything else becomes
/// a plain instance field.
pub(crate) fn store_on_instance(heap: &mut Heap, inst: HeapId, name: &str, value: Value) -> RunResult<()> {
    let class_id = heap.instance(inst)?.class_id();
    if let Some(attr) = resolve_attribute(heap, class_id, name)? {
        return attr.set(heap, Some(inst), value);
    }
    heap.instance_mut(inst)?.store(name, Slot::Set(value));
    Ok(())
}

/// Deletes `name` through an instance.
pub(crate) fn delete_on_instance(heap: &mut Heap, inst: HeapId, name: &str) -> RunResult<()> {
    let class_id = heap.instance(inst)?.class_id();
    if let Some(attr) = resolve_attribute(heap, class_id, name)? {
        return attr.delete(heap, Some(inst));
    }
    let removed = heap.instance_mut(inst)?.remove(name);
    match removed {
        Some(Slot::Set(_)) => Ok(()),
        _ => Err(missing(heap, Receiver::Instance(inst), class_id, name)),
    }
}
