//! Class objects, instances and ancestor-chain resolution.
//!
//! `ClassObject` describes a class or interface after the construction pipeline has
//! accepted it. `Instance` holds per-instance storage for variables and plain fields.
//!
//! # Resolution
//!
//! Every name lookup is a pure function over the class's cached linearized chain
//! (most-derived first): the first class whose namespace declares the name wins.
//! [`ClassChain`] performs that walk, and can include a pending class that has not
//! been allocated yet so the pipeline can inspect a definition before committing it.

use std::{cell::OnceCell, rc::Rc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use super::AttributeRegistry;
use crate::{
    attribute::{Member, Slot},
    config::RuntimeConfig,
    exception::{ExcType, RunResult},
    heap::{Heap, HeapId},
    value::Value,
};

/// Whether a class object is a concrete-able class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
}

/// A class or interface.
#[derive(Debug)]
pub struct ClassObject {
    name: String,
    kind: ClassKind,
    bases: Vec<HeapId>,
    /// Linearized ancestor chain, starting with the class itself.
    mro: Vec<HeapId>,
    namespace: IndexMap<String, Member>,
    /// Interfaces declared by this class body (not the inherited ones).
    interfaces: Vec<HeapId>,
    explicit_abstract: bool,
    /// Names of unimplemented abstract methods, in chain order.
    abstract_methods: Vec<String>,
    is_final: bool,
    registry: OnceCell<Rc<AttributeRegistry>>,
}

impl ClassObject {
    pub(crate) fn new(
        name: String,
        kind: ClassKind,
        bases: Vec<HeapId>,
        mro: Vec<HeapId>,
        namespace: IndexMap<String, Member>,
        interfaces: Vec<HeapId>,
    ) -> Self {
        Self {
            name,
            kind,
            bases,
            mro,
            namespace,
            interfaces,
            explicit_abstract: false,
            abstract_methods: Vec::new(),
            is_final: false,
            registry: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    #[must_use]
    pub fn bases(&self) -> &[HeapId] {
        &self.bases
    }

    /// Returns the linearized ancestor chain, the class itself first.
    #[must_use]
    pub fn mro(&self) -> &[HeapId] {
        &self.mro
    }

    /// Returns the members declared directly on this class, in declaration order.
    #[must_use]
    pub fn namespace(&self) -> &IndexMap<String, Member> {
        &self.namespace
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.namespace.get(name)
    }

    #[must_use]
    pub fn declared_interfaces(&self) -> &[HeapId] {
        &self.interfaces
    }

    /// Returns true if the class is explicitly abstract, an interface, or has
    /// unimplemented abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.explicit_abstract || self.is_interface() || !self.abstract_methods.is_empty()
    }

    #[must_use]
    pub fn is_explicitly_abstract(&self) -> bool {
        self.explicit_abstract
    }

    /// Names whose nearest definition is a not-yet-overridden abstract method.
    #[must_use]
    pub fn abstract_methods(&self) -> &[String] {
        &self.abstract_methods
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub(crate) fn mark_abstract(&mut self) {
        self.explicit_abstract = true;
    }

    pub(crate) fn mark_final(&mut self) {
        self.is_final = true;
    }

    pub(crate) fn set_abstract_methods(&mut self, names: Vec<String>) {
        self.abstract_methods = names;
    }

    pub(crate) fn insert_member(&mut self, name: String, member: Member) -> Option<Member> {
        self.namespace.insert(name, member)
    }

    /// Removes a member, returning its position and value.
    pub(crate) fn remove_member(&mut self, name: &str) -> Option<(usize, Member)> {
        self.namespace
            .shift_remove_full(name)
            .map(|(index, _, member)| (index, member))
    }

    /// Puts a removed member back at its old position.
    pub(crate) fn restore_member(&mut self, index: usize, name: String, member: Member) {
        let index = index.min(self.namespace.len());
        self.namespace.shift_insert(index, name, member);
    }

    pub(crate) fn cached_registry(&self) -> Option<Rc<AttributeRegistry>> {
        self.registry.get().cloned()
    }

    pub(crate) fn cache_registry(&self, registry: Rc<AttributeRegistry>) {
        // only called after a cache miss, so the cell is empty
        let _ = self.registry.set(registry);
    }

    pub(crate) fn clear_registry(&mut self) {
        self.registry.take();
    }
}

// ============================================================================
// Instance
// ============================================================================

/// An instance of a concrete class.
#[derive(Debug)]
pub struct Instance {
    class_id: HeapId,
    storage: IndexMap<String, Slot>,
}

impl Instance {
    #[must_use]
    pub fn new(class_id: HeapId) -> Self {
        Self {
            class_id,
            storage: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn class_id(&self) -> HeapId {
        self.class_id
    }

    /// Returns the stored value, treating `Slot::Unset` as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.storage.get(name).and_then(Slot::value)
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.storage.get(name)
    }

    pub(crate) fn store(&mut self, name: &str, slot: Slot) {
        if let Some(existing) = self.storage.get_mut(name) {
            *existing = slot;
        } else {
            self.storage.insert(name.to_owned(), slot);
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Slot> {
        self.storage.shift_remove(name)
    }

    /// Iterates over stored fields in first-write order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.storage.iter().map(|(name, slot)| (name.as_str(), slot))
    }
}

// ============================================================================
// Chain resolution
// ============================================================================

/// View over a linearized ancestor chain, optionally headed by a pending class.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassChain<'a> {
    heap: &'a Heap,
    pending: Option<(HeapId, &'a ClassObject)>,
    mro: &'a [HeapId],
}

impl<'a> ClassChain<'a> {
    /// Chain of an allocated class.
    pub fn of(heap: &'a Heap, id: HeapId) -> RunResult<Self> {
        let cls = heap.class(id)?;
        Ok(Self {
            heap,
            pending: None,
            mro: cls.mro(),
        })
    }

    /// Chain of a class that is not in the heap yet and will be allocated as `id`.
    pub fn with_pending(heap: &'a Heap, id: HeapId, cls: &'a ClassObject) -> Self {
        Self {
            heap,
            pending: Some((id, cls)),
            mro: cls.mro(),
        }
    }

    fn class(&self, id: HeapId) -> Option<&'a ClassObject> {
        match self.pending {
            Some((pending_id, cls)) if pending_id == id => Some(cls),
            _ => self.heap.class(id).ok(),
        }
    }

    /// Iterates over the chain, most-derived first.
    pub fn classes(&self) -> impl Iterator<Item = (HeapId, &'a ClassObject)> + '_ {
        self.mro.iter().filter_map(|&id| self.class(id).map(|cls| (id, cls)))
    }

    /// Strict ancestors, the head of the chain excluded.
    pub fn ancestors(&self) -> impl Iterator<Item = (HeapId, &'a ClassObject)> + '_ {
        self.classes().skip(1)
    }

    /// Returns the nearest member named `name` and the class declaring it.
    pub fn resolve(&self, name: &str) -> Option<(HeapId, &'a Member)> {
        self.classes()
            .find_map(|(id, cls)| cls.member(name).map(|member| (id, member)))
    }
}

/// Returns the nearest member named `name` in the chain of an allocated class.
pub(crate) fn resolve<'a>(heap: &'a Heap, class_id: HeapId, name: &str) -> RunResult<Option<(HeapId, &'a Member)>> {
    Ok(ClassChain::of(heap, class_id)?.resolve(name))
}

// ============================================================================
// C3 Linearization
// ============================================================================

/// Computes the C3 linearization for a class with the given direct bases.
///
/// The merge keeps every class ahead of its bases and preserves the local order of
/// each base list. Bases must be allocated classes; the result starts with `self_id`.
///
/// # Errors
/// `DefinitionError` if a base inherits from the class itself, if the hierarchy has
/// no consistent ordering, or if either configured limit is exceeded.
pub(crate) fn compute_c3_mro(
    self_id: HeapId,
    bases: &[HeapId],
    heap: &Heap,
    config: &RuntimeConfig,
) -> RunResult<Vec<HeapId>> {
    if bases.is_empty() {
        return Ok(vec![self_id]);
    }
    if bases.contains(&self_id) {
        return Err(ExcType::definition_error("a class cannot inherit from itself"));
    }

    let max_depth = config.get_max_inheritance_depth();
    let mut linearizations: Vec<Vec<HeapId>> = Vec::with_capacity(bases.len() + 1);
    for &base_id in bases {
        let base = heap.class(base_id)?;
        if base.mro().len() > max_depth {
            return Err(ExcType::definition_error(format!(
                "inheritance chain too deep (maximum depth {max_depth})"
            )));
        }
        linearizations.push(base.mro().to_vec());
    }
    linearizations.push(bases.to_vec());

    let max_len = config.get_max_mro_length();
    let mut result = vec![self_id];
    loop {
        linearizations.retain(|lin| !lin.is_empty());
        if linearizations.is_empty() {
            break;
        }

        // a good head appears in no list's tail
        let found = linearizations
            .iter()
            .map(|lin| lin[0])
            .find(|candidate| !linearizations.iter().any(|other| other[1..].contains(candidate)));

        let Some(next) = found else {
            let base_names: Vec<&str> = bases
                .iter()
                .map(|&id| heap.class(id).map_or("?", |cls| cls.name()))
                .collect();
            return Err(ExcType::definition_error(format!(
                "cannot create a consistent method resolution order for bases {}",
                base_names.join(", ")
            )));
        };

        result.push(next);
        for lin in &mut linearizations {
            if lin.first() == Some(&next) {
                lin.remove(0);
            }
        }

        if result.len() > max_len {
            return Err(ExcType::definition_error(format!(
                "method resolution order exceeds maximum length {max_len}"
            )));
        }
    }

    Ok(result)
}
