//! The class construction pipeline.
//!
//! Every definition runs through the same checks, in order, before anything is
//! allocated:
//!
//! 0. preliminary validation of bases, declared interfaces and linearization
//! 1. interfaces only: function-like members outside the reserved prefix become
//!    abstract methods
//! 2. no attribute of the body is already bound under another name
//! 3. classes only: every implemented interface is satisfied
//! 4. classes only: no strict ancestor is final
//! 5. the attribute walk: abstract methods still resolving to themselves make the
//!    class abstract; for classes, final methods must not be overridden
//!
//! Only when all steps pass are the attributes bound to their names and the class
//! allocated, so a failed definition leaves no trace. Retroactive changes to an
//! existing class go through [`amend`], which re-runs steps 3 and 5 for the class
//! and its descendants and rolls the change back when they fail.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    attribute::{Attribute, AttributeKind, Member},
    body::BodyParts,
    conformance,
    config::RuntimeConfig,
    exception::{ExcType, Exception, RunResult},
    heap::{Heap, HeapData, HeapId},
    tracer::ContractTracer,
    types::{ClassChain, ClassKind, ClassObject, compute_c3_mro},
    value::Value,
};

/// A class or interface definition about to enter the pipeline.
pub(crate) struct Definition<'a> {
    pub name: &'a str,
    pub kind: ClassKind,
    pub bases: &'a [HeapId],
    pub body: BodyParts,
}

/// Runs the full pipeline and allocates the class on success.
pub(crate) fn define(
    heap: &mut Heap,
    config: &RuntimeConfig,
    tracer: &mut dyn ContractTracer,
    definition: Definition<'_>,
) -> RunResult<HeapId> {
    let Definition { name, kind, bases, body } = definition;
    validate_bases(heap, name, kind, bases)?;
    validate_interfaces(heap, name, kind, &body)?;

    let self_id = heap.next_id();
    let mro = compute_c3_mro(self_id, bases, heap, config)?;

    let namespace = if kind == ClassKind::Interface {
        promote_interface_members(name, body.members, config, tracer)
    } else {
        body.members
    };
    check_bindings(&namespace)?;

    let mut cls = ClassObject::new(name.to_owned(), kind, bases.to_vec(), mro, namespace, body.interfaces);
    if body.is_abstract {
        cls.mark_abstract();
    }
    if body.is_final {
        cls.mark_final();
    }

    let abstract_methods = {
        let chain = ClassChain::with_pending(heap, self_id, &cls);
        if kind == ClassKind::Class {
            check_interfaces(heap, &chain)?;
            check_final_ancestors(&chain)?;
        }
        walk_attributes(&chain, kind == ClassKind::Class)?
    };
    cls.set_abstract_methods(abstract_methods);
    bind_names(name, cls.namespace(), tracer);

    let is_abstract = cls.is_abstract();
    let id = heap.allocate(HeapData::Class(cls));
    debug_assert_eq!(id, self_id, "allocation id must match the linearized self id");
    tracer.on_class_defined(id, name, kind, is_abstract);
    Ok(id)
}

// ============================================================================
// Preliminary validation
// ============================================================================

fn validate_bases(heap: &Heap, name: &str, kind: ClassKind, bases: &[HeapId]) -> RunResult<()> {
    for (i, &base_id) in bases.iter().enumerate() {
        if bases[..i].contains(&base_id) {
            return Err(ExcType::definition_error(format!(
                "duplicate base class {} in definition of '{name}'",
                class_name(heap, base_id)
            )));
        }
        let base = heap.class(base_id).map_err(|_| {
            ExcType::definition_error(format!("base {base_id} of '{name}' is not a class"))
        })?;
        match (kind, base.kind()) {
            (ClassKind::Class, ClassKind::Interface) => {
                return Err(ExcType::definition_error(format!(
                    "class '{name}' cannot inherit from interface '{}'; declare it with implements",
                    base.name()
                )));
            }
            (ClassKind::Interface, ClassKind::Class) => {
                return Err(ExcType::definition_error(format!(
                    "interface '{name}' can only extend interfaces, not class '{}'",
                    base.name()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_interfaces(heap: &Heap, name: &str, kind: ClassKind, body: &BodyParts) -> RunResult<()> {
    if kind == ClassKind::Interface {
        if !body.interfaces.is_empty() {
            return Err(ExcType::definition_error(format!(
                "interface '{name}' cannot declare implementations; extend the interfaces instead"
            )));
        }
        if body.is_final {
            return Err(ExcType::definition_error(format!("interface '{name}' cannot be final")));
        }
        return Ok(());
    }
    for (i, &iface) in body.interfaces.iter().enumerate() {
        if body.interfaces[..i].contains(&iface) {
            return Err(ExcType::definition_error(format!(
                "interface {} declared twice by '{name}'",
                class_name(heap, iface)
            )));
        }
        let is_interface = heap.class(iface).is_ok_and(ClassObject::is_interface);
        if !is_interface {
            return Err(ExcType::definition_error(format!(
                "'{name}' can only implement interfaces, {} is not one",
                class_name(heap, iface)
            )));
        }
    }
    Ok(())
}

fn class_name(heap: &Heap, id: HeapId) -> String {
    heap.class(id)
        .map_or_else(|_| id.to_string(), |cls| format!("'{}'", cls.name()))
}

// ============================================================================
// Promotion and binding
// ============================================================================

/// Turns every function-like interface member into an abstract method wrapping the
/// same function. Reserved names and non-function members are kept as declared.
fn promote_interface_members(
    interface: &str,
    members: IndexMap<String, Member>,
    config: &RuntimeConfig,
    tracer: &mut dyn ContractTracer,
) -> IndexMap<String, Member> {
    members
        .into_iter()
        .map(|(name, member)| {
            if config.is_reserved(&name) {
                return (name, member);
            }
            let promoted = match &member {
                Member::Attribute(attr) if attr.is_abstract() => None,
                Member::Attribute(attr) => attr.function().cloned(),
                Member::Value(Value::Function(function)) => Some(function.clone()),
                Member::Value(_) => None,
            };
            match promoted {
                Some(function) => {
                    tracer.on_abstract_promoted(interface, &name);
                    (name, Member::Attribute(Rc::new(Attribute::abstract_method(function))))
                }
                None => (name, member),
            }
        })
        .collect()
}

/// Refuses attributes already bound under another name, and one attribute object
/// declared under two names of the same body. Binds nothing.
fn check_bindings(namespace: &IndexMap<String, Member>) -> RunResult<()> {
    let mut seen: Vec<(&Rc<Attribute>, &str)> = Vec::new();
    for (name, member) in namespace {
        let Member::Attribute(attr) = member else { continue };
        check_binding(attr, name)?;
        if let Some((_, first)) = seen.iter().find(|(other, _)| Rc::ptr_eq(other, attr)) {
            return Err(rebinding(first, name));
        }
        seen.push((attr, name));
    }
    Ok(())
}

/// Fails if `attr` is already bound to a name other than `name`.
pub(crate) fn check_binding(attr: &Attribute, name: &str) -> RunResult<()> {
    match attr.name() {
        Some(bound) if bound != name => Err(rebinding(bound, name)),
        _ => Ok(()),
    }
}

fn rebinding(bound: &str, name: &str) -> Exception {
    ExcType::definition_error(format!("attribute '{bound}' cannot also be bound as '{name}'"))
}

/// Names every attribute of an accepted body. Conflicts were refused by [`check_bindings`].
fn bind_names(class: &str, namespace: &IndexMap<String, Member>, tracer: &mut dyn ContractTracer) {
    for (name, member) in namespace {
        let Member::Attribute(attr) = member else { continue };
        let bound = attr.bind_name(name);
        debug_assert!(bound, "binding conflicts are checked before allocation");
        tracer.on_attribute_bound(class, name, attr.kind().tag());
    }
}

// ============================================================================
// Steps 3 to 5
// ============================================================================

/// Checks every interface the head of `chain` implements, own and inherited.
fn check_interfaces(heap: &Heap, chain: &ClassChain<'_>) -> RunResult<()> {
    let Some((_, head)) = chain.classes().next() else {
        return Ok(());
    };
    for iface in conformance::implemented_interfaces(chain) {
        let iface_name = heap.class(iface)?.name();
        for name in conformance::required_methods(heap, iface)? {
            match chain.resolve(&name) {
                None => return Err(ExcType::incomplete_implementation(head.name(), iface_name, &name)),
                Some((_, member)) if !member.is_function_like() => {
                    return Err(ExcType::not_a_method(head.name(), iface_name, &name));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

fn check_final_ancestors(chain: &ClassChain<'_>) -> RunResult<()> {
    match chain.ancestors().find(|(_, cls)| cls.is_final()) {
        Some((_, cls)) => Err(ExcType::final_class(cls.name())),
        None => Ok(()),
    }
}

/// Walks every attribute of the chain and returns the names of abstract methods
/// that still resolve to themselves.
///
/// Identity decides: an abstract method is implemented once the nearest member of
/// its name carries a different function, and a final method is overridden as soon
/// as the nearest member does not carry the sealed function. Final methods are only
/// enforced when `check_final` is set, which interfaces never do.
fn walk_attributes(chain: &ClassChain<'_>, check_final: bool) -> RunResult<Vec<String>> {
    let head_id = chain.classes().next().map(|(id, _)| id);
    let mut abstract_names: Vec<String> = Vec::new();
    for (owner_id, cls) in chain.classes() {
        for (name, member) in cls.namespace() {
            let Member::Attribute(attr) = member else { continue };
            let (AttributeKind::AbstractMethod(function) | AttributeKind::FinalMethod(function)) = attr.kind() else {
                continue;
            };
            let resolved = chain.resolve(name).and_then(|(_, member)| member.function_id());
            let is_own = resolved == Some(function.id());
            if attr.is_abstract() {
                if is_own && !abstract_names.iter().any(|n| n == name) {
                    abstract_names.push(name.clone());
                }
            } else if check_final && !is_own && Some(owner_id) != head_id {
                return Err(ExcType::final_method(cls.name(), name));
            }
        }
    }
    Ok(abstract_names)
}

// ============================================================================
// Retroactive changes
// ============================================================================

/// A change to one name of an existing class namespace.
pub(crate) enum Amendment {
    Insert(Member),
    Remove,
}

/// Applies `amendment` to `class_id` and re-validates the class and every descendant.
///
/// On success the registries are invalidated, derived abstractness is refreshed and
/// the replaced member (if any) is returned. On failure the namespace is restored
/// and the error returned.
pub(crate) fn amend(heap: &mut Heap, class_id: HeapId, name: &str, amendment: Amendment) -> RunResult<Option<Member>> {
    enum Undo {
        Reinsert(usize, Member),
        Replace(Member),
        Remove,
    }

    let cls = heap.class_mut(class_id)?;
    let undo = match amendment {
        Amendment::Insert(member) => match cls.insert_member(name.to_owned(), member) {
            Some(previous) => Undo::Replace(previous),
            None => Undo::Remove,
        },
        Amendment::Remove => match cls.remove_member(name) {
            Some((index, previous)) => Undo::Reinsert(index, previous),
            None => return Ok(None),
        },
    };
    heap.invalidate_registries(class_id);

    match revalidate(heap, class_id) {
        Ok(updates) => {
            for (id, names) in updates {
                heap.class_mut(id)?.set_abstract_methods(names);
            }
            Ok(match undo {
                Undo::Reinsert(_, member) | Undo::Replace(member) => Some(member),
                Undo::Remove => None,
            })
        }
        Err(err) => {
            let cls = heap.class_mut(class_id)?;
            match undo {
                Undo::Reinsert(index, member) => cls.restore_member(index, name.to_owned(), member),
                Undo::Replace(member) => {
                    cls.insert_member(name.to_owned(), member);
                }
                Undo::Remove => {
                    cls.remove_member(name);
                }
            }
            heap.invalidate_registries(class_id);
            Err(err)
        }
    }
}

/// Re-runs the interface check and the attribute walk for `class_id` and its
/// descendants without mutating anything.
fn revalidate(heap: &Heap, class_id: HeapId) -> RunResult<Vec<(HeapId, Vec<String>)>> {
    let mut updates = Vec::new();
    for id in heap.lineage(class_id) {
        let chain = ClassChain::of(heap, id)?;
        let is_class = !heap.class(id)?.is_interface();
        if is_class {
            check_interfaces(heap, &chain)?;
        }
        updates.push((id, walk_attributes(&chain, is_class)?));
    }
    Ok(updates)
}
