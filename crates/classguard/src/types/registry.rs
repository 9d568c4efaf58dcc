use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    attribute::{Attribute, AttributeInfo, Member},
    heap::{Heap, HeapId},
};

/// The attribute found for a name, and the class that declares it.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub owner: HeapId,
    pub attribute: Rc<Attribute>,
}

/// Name to nearest-attribute mapping for one class.
///
/// Each name maps to the nearest [`Attribute`] declared under it. Plain values are
/// skipped, so an attribute further up the chain stays registered even when a
/// closer class shadows it with a plain value for attribute access.
/// Entries keep chain order: names of the class itself first, then of each ancestor.
///
/// Computed lazily by [`Heap::registry`] and cached on the class until the class or
/// one of its ancestors gains an attribute through `install_attribute`.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl AttributeRegistry {
    pub(crate) fn collect(heap: &Heap, mro: &[HeapId]) -> Self {
        let mut entries: IndexMap<String, RegistryEntry> = IndexMap::new();
        for &class_id in mro {
            let Ok(cls) = heap.class(class_id) else { continue };
            for (name, member) in cls.namespace() {
                let Member::Attribute(attribute) = member else { continue };
                if !entries.contains_key(name) {
                    entries.insert(
                        name.clone(),
                        RegistryEntry {
                            owner: class_id,
                            attribute: Rc::clone(attribute),
                        },
                    );
                }
            }
        }
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Describes every registered attribute, in registry order.
    #[must_use]
    pub fn describe(&self, heap: &Heap) -> Vec<AttributeInfo> {
        self.entries.values().map(|entry| entry.attribute.describe(heap)).collect()
    }
}
