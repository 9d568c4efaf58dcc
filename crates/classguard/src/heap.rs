use std::{collections::BTreeMap, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    exception::{ExcType, RunResult},
    types::{AttributeRegistry, ClassKind, ClassObject, Instance},
};

/// Unique identifier for objects stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Objects that live in the heap.
#[derive(Debug)]
pub enum HeapData {
    /// A class or interface.
    Class(ClassObject),
    Instance(Instance),
}

impl HeapData {
    /// Static variant name used in [`HeapStats::objects_by_type`].
    fn type_name(&self) -> &'static str {
        match self {
            Self::Class(cls) if cls.kind() == ClassKind::Interface => "Interface",
            Self::Class(_) => "Class",
            Self::Instance(_) => "Instance",
        }
    }
}

/// Snapshot of heap usage, returned by [`Runtime::heap_stats`](crate::Runtime::heap_stats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of slots whose object has been freed.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Breakdown of live objects by kind ("Class", "Interface", "Instance").
    pub objects_by_type: BTreeMap<&'static str, usize>,
}

/// Arena owning every class, interface and instance of a runtime.
///
/// Slots are never reused: a freed id stays dead, so a stale `HeapId` fails
/// loudly instead of silently aliasing a newer object.
#[derive(Debug, Default)]
pub struct Heap {
    entries: Vec<Option<HeapData>>,
}

impl Heap {
    /// Returns the id the next allocation will receive.
    ///
    /// The construction pipeline linearizes a pending class under this id before
    /// deciding whether to allocate it at all.
    #[must_use]
    pub fn next_id(&self) -> HeapId {
        HeapId(self.entries.len())
    }

    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = self.next_id();
        self.entries.push(Some(data));
        id
    }

    /// Frees an object, returning it if it was live.
    pub fn free(&mut self, id: HeapId) -> Option<HeapData> {
        self.entries.get_mut(id.0).and_then(Option::take)
    }

    pub fn get(&self, id: HeapId) -> RunResult<&HeapData> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| ExcType::type_error(format!("no live object at {id}")))
    }

    fn get_mut(&mut self, id: HeapId) -> RunResult<&mut HeapData> {
        self.entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| ExcType::type_error(format!("no live object at {id}")))
    }

    pub fn class(&self, id: HeapId) -> RunResult<&ClassObject> {
        match self.get(id)? {
            HeapData::Class(cls) => Ok(cls),
            HeapData::Instance(_) => Err(ExcType::type_error(format!("object at {id} is not a class"))),
        }
    }

    pub fn class_mut(&mut self, id: HeapId) -> RunResult<&mut ClassObject> {
        match self.get_mut(id)? {
            HeapData::Class(cls) => Ok(cls),
            HeapData::Instance(_) => Err(ExcType::type_error(format!("object at {id} is not a class"))),
        }
    }

    pub fn instance(&self, id: HeapId) -> RunResult<&Instance> {
        match self.get(id)? {
            HeapData::Instance(inst) => Ok(inst),
            HeapData::Class(_) => Err(ExcType::type_error(format!("object at {id} is not an instance"))),
        }
    }

    pub fn instance_mut(&mut self, id: HeapId) -> RunResult<&mut Instance> {
        match self.get_mut(id)? {
            HeapData::Instance(inst) => Ok(inst),
            HeapData::Class(_) => Err(ExcType::type_error(format!("object at {id} is not an instance"))),
        }
    }

    /// Returns true if `inst` is an instance of `class_id` or of one of its subclasses.
    #[must_use]
    pub fn is_instance_of(&self, inst: HeapId, class_id: HeapId) -> bool {
        self.instance(inst)
            .and_then(|inst| self.class(inst.class_id()))
            .is_ok_and(|cls| cls.mro().contains(&class_id))
    }

    /// Returns the attribute registry of a class, computing and caching it on first use.
    pub fn registry(&self, id: HeapId) -> RunResult<Rc<AttributeRegistry>> {
        let cls = self.class(id)?;
        if let Some(registry) = cls.cached_registry() {
            return Ok(registry);
        }
        let registry = Rc::new(AttributeRegistry::collect(self, cls.mro()));
        cls.cache_registry(Rc::clone(&registry));
        Ok(registry)
    }

    /// Live classes whose chain contains `id`, `id` itself included, in allocation order.
    ///
    /// Allocation order puts every ancestor before its descendants.
    #[must_use]
    pub fn lineage(&self, id: HeapId) -> Vec<HeapId> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Some(HeapData::Class(cls)) if cls.mro().contains(&id) => Some(HeapId(index)),
                _ => None,
            })
            .collect()
    }

    /// Drops the cached registry of `id` and of every class that inherits from it.
    pub fn invalidate_registries(&mut self, id: HeapId) {
        for entry in self.entries.iter_mut().flatten() {
            if let HeapData::Class(cls) = entry
                && cls.mro().contains(&id)
            {
                cls.clear_registry();
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        let mut live_objects = 0;
        for data in self.entries.iter().flatten() {
            live_objects += 1;
            *objects_by_type.entry(data.type_name()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects,
            free_slots: self.entries.len() - live_objects,
            total_slots: self.entries.len(),
            objects_by_type,
        }
    }
}
