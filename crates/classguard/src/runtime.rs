//! The runtime: owner of the heap and entry point for every guarded operation.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    access::{self, Receiver},
    attribute::{Attribute, AttributeInfo, Member},
    body::ClassBody,
    config::RuntimeConfig,
    conformance,
    exception::{ExcType, RunResult},
    function::Function,
    heap::{Heap, HeapData, HeapId, HeapStats},
    pipeline::{self, Amendment, Definition},
    tracer::{ContractTracer, NoopTracer},
    types::{self, AttributeRegistry, ClassChain, ClassKind, ClassObject, Instance},
    value::Value,
};

/// Owns every class, interface and instance, and enforces their contracts.
///
/// All operations that can fail report the error to the tracer before returning it.
///
/// Methods invoked through [`call_method`](Self::call_method),
/// [`call_static`](Self::call_static) or an `__init__` run with their declaring class
/// as the access context, which decides whether protected and private attributes
/// are visible to the reads and writes they make. The runtime is single-threaded: functions are `Rc` closures and class caches use
/// `OnceCell`, so it is neither `Send` nor `Sync`.
///
/// ```
/// use classguard::{ClassBody, ExcType, Function, Receiver, Runtime, Value};
///
/// let mut rt = Runtime::new();
/// let shape = rt
///     .define_interface("Shape", &[], ClassBody::new().value("area", Function::stub("area")))
///     .unwrap();
/// let square = rt
///     .define_class(
///         "Square",
///         &[],
///         ClassBody::new()
///             .implements(shape)
///             .method("area", Function::new("area", |_, _| Ok(Value::Int(4)))),
///     )
///     .unwrap();
/// let sq = rt.instantiate(square, &[]).unwrap();
/// assert!(rt.conforms(&Value::Instance(sq), shape, true));
/// assert_eq!(rt.call_method(sq, "area", &[]).unwrap(), Value::Int(4));
///
/// let err = rt.instantiate(shape, &[]).unwrap_err();
/// assert_eq!(err.exc_type(), ExcType::InterfaceInstantiationError);
/// ```
#[derive(Debug)]
pub struct Runtime {
    heap: Heap,
    config: RuntimeConfig,
    tracer: Box<dyn ContractTracer>,
    /// Declaring classes of the methods currently running, innermost last.
    contexts: Vec<HeapId>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with the default configuration and no tracing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            heap: Heap::default(),
            config,
            tracer: Box::new(NoopTracer),
            contexts: Vec::new(),
        }
    }

    /// Replaces the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl ContractTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Passes errors to the tracer on their way out.
    fn report<T>(&mut self, result: RunResult<T>) -> RunResult<T> {
        if let Err(err) = &result {
            self.tracer.on_violation(err);
        }
        result
    }

    // ========================================================================
    // Definition
    // ========================================================================

    /// Defines a class. Bases must be classes; interfaces go in [`ClassBody::implements`].
    pub fn define_class(&mut self, name: &str, bases: &[HeapId], body: ClassBody) -> RunResult<HeapId> {
        self.define(name, ClassKind::Class, bases, body)
    }

    /// Defines an interface. Bases must be interfaces.
    ///
    /// Every function-like member whose name does not start with the reserved prefix
    /// becomes an abstract method.
    pub fn define_interface(&mut self, name: &str, bases: &[HeapId], body: ClassBody) -> RunResult<HeapId> {
        self.define(name, ClassKind::Interface, bases, body)
    }

    fn define(&mut self, name: &str, kind: ClassKind, bases: &[HeapId], body: ClassBody) -> RunResult<HeapId> {
        let definition = Definition {
            name,
            kind,
            bases,
            body: body.into_parts(),
        };
        let result = pipeline::define(&mut self.heap, &self.config, self.tracer.as_mut(), definition);
        self.report(result)
    }

    /// Adds `attribute` to an existing class under `name`.
    ///
    /// Fails with `InvalidOverrideError` if `name` already resolves to an attribute
    /// and with `DefinitionError` for interfaces. On success the registries of the
    /// class and its descendants are rebuilt on next use and their abstractness is
    /// recomputed; installing an abstract method makes them abstract, installing a
    /// method that overrides a final one fails and changes nothing.
    pub fn install_attribute(
        &mut self,
        class_id: HeapId,
        name: &str,
        attribute: impl Into<Rc<Attribute>>,
    ) -> RunResult<()> {
        let attribute = attribute.into();
        let result = self.install(class_id, name, attribute);
        self.report(result)
    }

    fn install(&mut self, class_id: HeapId, name: &str, attribute: Rc<Attribute>) -> RunResult<()> {
        let cls = self.heap.class(class_id)?;
        if cls.is_interface() {
            return Err(ExcType::definition_error(format!(
                "cannot install attributes on interface '{}'",
                cls.name()
            )));
        }
        if access::resolve_attribute(&self.heap, class_id, name)?.is_some() {
            return Err(ExcType::reassigned_attribute(cls.name(), name));
        }
        pipeline::check_binding(&attribute, name)?;
        let kind = attribute.kind().tag();
        pipeline::amend(
            &mut self.heap,
            class_id,
            name,
            Amendment::Insert(Member::Attribute(Rc::clone(&attribute))),
        )?;
        attribute.bind_name(name);
        let class_name = self.heap.class(class_id)?.name();
        self.tracer.on_attribute_installed(class_name, name, kind);
        Ok(())
    }

    // ========================================================================
    // Instantiation
    // ========================================================================

    /// Creates an instance of `class_id` and runs its `__init__`, if it resolves one.
    ///
    /// Interfaces are always refused first; abstract classes (explicit or derived)
    /// next. If the initializer fails the instance is freed.
    pub fn instantiate(&mut self, class_id: HeapId, args: &[Value]) -> RunResult<HeapId> {
        let guard = self.check_instantiable(class_id);
        let init = self.report(guard)?;

        let inst = self.heap.allocate(HeapData::Instance(Instance::new(class_id)));
        let class_name = self.heap.class(class_id)?.name();
        self.tracer.on_instantiate(class_name, inst);

        if let Some((owner, init)) = init {
            let mut call_args: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
            call_args.push(Value::Instance(inst));
            call_args.extend(args.iter().cloned());
            if let Err(err) = self.invoke(Some(owner), &init, &call_args) {
                self.heap.free(inst);
                return Err(err);
            }
        }
        Ok(inst)
    }

    /// Returns the initializer to run with its declaring class, or the reason the
    /// class cannot be instantiated.
    fn check_instantiable(&self, class_id: HeapId) -> RunResult<Option<(HeapId, Function)>> {
        let cls = self.heap.class(class_id)?;
        if cls.is_interface() {
            return Err(ExcType::interface_instantiation(cls.name()));
        }
        if cls.is_abstract() {
            return Err(ExcType::abstract_instantiation(cls.name(), cls.abstract_methods()));
        }
        let init = ClassChain::of(&self.heap, class_id)?
            .resolve("__init__")
            .and_then(|(owner, member)| member.function().cloned().map(|init| (owner, init)));
        Ok(init)
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    /// Reads `name` from the receiver.
    pub fn get_attr(&mut self, receiver: Receiver, name: &str) -> RunResult<Value> {
        let result = self
            .check_visibility(receiver, name)
            .and_then(|()| access::load(&self.heap, receiver, name));
        self.report(result)
    }

    fn check_visibility(&self, receiver: Receiver, name: &str) -> RunResult<()> {
        access::check_visibility(&self.heap, self.contexts.last().copied(), receiver, name)
    }

    /// Assigns `name` on the receiver.
    ///
    /// An [`Attribute`] is installed into the receiver's class with
    /// [`install_attribute`](Self::install_attribute). A plain value is delegated to
    /// the attribute `name` resolves to; with no attribute, it becomes a plain
    /// instance field or a plain class value.
    pub fn set_attr(&mut self, receiver: Receiver, name: &str, member: impl Into<Member>) -> RunResult<()> {
        let result = self.store(receiver, name, member.into());
        self.report(result)
    }

    fn store(&mut self, receiver: Receiver, name: &str, member: Member) -> RunResult<()> {
        let value = match member {
            Member::Attribute(attribute) => {
                let class_id = receiver.class_id(&self.heap)?;
                return self.install(class_id, name, attribute);
            }
            Member::Value(value) => value,
        };
        self.check_visibility(receiver, name)?;
        match receiver {
            Receiver::Instance(inst) => access::store_on_instance(&mut self.heap, inst, name, value),
            Receiver::Class(class_id) => {
                if let Some(attr) = access::resolve_attribute(&self.heap, class_id, name)? {
                    return attr.set(&mut self.heap, None, value);
                }
                self.ensure_extensible(class_id)?;
                pipeline::amend(&mut self.heap, class_id, name, Amendment::Insert(Member::Value(value)))?;
                Ok(())
            }
        }
    }

    /// Deletes `name` from the receiver.
    ///
    /// Class-scope deletes only remove plain values declared on the class itself.
    pub fn del_attr(&mut self, receiver: Receiver, name: &str) -> RunResult<()> {
        let result = self.delete(receiver, name);
        self.report(result)
    }

    fn delete(&mut self, receiver: Receiver, name: &str) -> RunResult<()> {
        self.check_visibility(receiver, name)?;
        let class_id = match receiver {
            Receiver::Instance(inst) => return access::delete_on_instance(&mut self.heap, inst, name),
            Receiver::Class(class_id) => class_id,
        };
        if let Some(attr) = access::resolve_attribute(&self.heap, class_id, name)? {
            return attr.delete(&mut self.heap, None);
        }
        let cls = self.heap.class(class_id)?;
        if cls.member(name).is_none() {
            return Err(ExcType::attribute_error(format!("type object '{}'", cls.name()), name));
        }
        self.ensure_extensible(class_id)?;
        pipeline::amend(&mut self.heap, class_id, name, Amendment::Remove)?;
        Ok(())
    }

    fn ensure_extensible(&self, class_id: HeapId) -> RunResult<()> {
        let cls = self.heap.class(class_id)?;
        if cls.is_interface() {
            Err(ExcType::definition_error(format!(
                "interface '{}' cannot be modified after definition",
                cls.name()
            )))
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Calls a function with positional arguments.
    pub fn call(&mut self, function: &Function, args: &[Value]) -> RunResult<Value> {
        function.call(self, args)
    }

    /// Reads `name` from an instance and calls it with the instance prepended to `args`.
    ///
    /// A static method receives the instance's class instead of the instance.
    pub fn call_method(&mut self, instance: HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
        let found = self.get_attr(Receiver::Instance(instance), name)?;
        let function = self.callable(found)?;
        let inst = self.heap.instance(instance)?;
        let (class_id, shadowed) = (inst.class_id(), inst.get(name).is_some());
        let declared = match types::resolve(&self.heap, class_id, name)? {
            Some((owner, Member::Attribute(attr))) => Some((owner, attr.is_static_method())),
            // instance storage shadows plain class values
            Some((owner, Member::Value(_))) if !shadowed => Some((owner, false)),
            _ => None,
        };
        let first = match declared {
            Some((_, true)) => Value::Class(class_id),
            _ => Value::Instance(instance),
        };
        let mut call_args: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        call_args.push(first);
        call_args.extend(args.iter().cloned());
        self.invoke(declared.map(|(owner, _)| owner), &function, &call_args)
    }

    /// Reads `name` from class scope and calls it.
    ///
    /// A static method receives `class_id` prepended to `args`; anything else is
    /// called with `args` unchanged.
    pub fn call_static(&mut self, class_id: HeapId, name: &str, args: &[Value]) -> RunResult<Value> {
        let found = self.get_attr(Receiver::Class(class_id), name)?;
        let function = self.callable(found)?;
        let declared = types::resolve(&self.heap, class_id, name)?
            .map(|(owner, member)| (owner, member.as_attribute().is_some_and(|attr| attr.is_static_method())));
        let mut call_args: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        if let Some((_, true)) = declared {
            call_args.push(Value::Class(class_id));
        }
        call_args.extend(args.iter().cloned());
        self.invoke(declared.map(|(owner, _)| owner), &function, &call_args)
    }

    fn callable(&mut self, found: Value) -> RunResult<Function> {
        match found {
            Value::Function(function) => Ok(function),
            other => {
                let err = ExcType::type_error(format!("'{}' object is not callable", other.type_name(&self.heap)));
                self.report(Err(err))
            }
        }
    }

    /// Runs `function` with `context` as the access context, restoring the previous
    /// context afterwards whether or not the call succeeds.
    fn invoke(&mut self, context: Option<HeapId>, function: &Function, args: &[Value]) -> RunResult<Value> {
        let Some(class_id) = context else {
            return function.call(self, args);
        };
        self.contexts.push(class_id);
        let result = function.call(self, args);
        self.contexts.pop();
        result
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Checks `value` against `interface`, structurally or nominally. Never fails.
    #[must_use]
    pub fn conforms(&self, value: &Value, interface: HeapId, structural: bool) -> bool {
        conformance::conforms(&self.heap, value, interface, structural)
    }

    /// Names an implementer of `interface` must provide as methods.
    pub fn required_methods(&self, interface: HeapId) -> RunResult<Vec<String>> {
        conformance::required_methods(&self.heap, interface)
    }

    /// Returns the attribute registry of a class.
    pub fn attributes(&self, class_id: HeapId) -> RunResult<Rc<AttributeRegistry>> {
        self.heap.registry(class_id)
    }

    /// Describes every attribute reachable from a class.
    pub fn describe(&self, class_id: HeapId) -> RunResult<Vec<AttributeInfo>> {
        Ok(self.attributes(class_id)?.describe(&self.heap))
    }

    pub fn class(&self, id: HeapId) -> RunResult<&ClassObject> {
        self.heap.class(id)
    }

    pub fn instance(&self, id: HeapId) -> RunResult<&Instance> {
        self.heap.instance(id)
    }

    /// Returns the class of an instance, or the class itself for a class value.
    #[must_use]
    pub fn class_of(&self, value: &Value) -> Option<HeapId> {
        match value {
            Value::Instance(id) => self.heap.instance(*id).ok().map(Instance::class_id),
            Value::Class(id) => self.heap.class(*id).ok().map(|_| *id),
            _ => None,
        }
    }

    /// Returns true if the class is explicitly abstract, an interface, or has
    /// unimplemented abstract methods. Unknown ids are not abstract.
    #[must_use]
    pub fn is_abstract(&self, class_id: HeapId) -> bool {
        self.heap.class(class_id).is_ok_and(ClassObject::is_abstract)
    }

    #[must_use]
    pub fn is_final(&self, class_id: HeapId) -> bool {
        self.heap.class(class_id).is_ok_and(ClassObject::is_final)
    }

    #[must_use]
    pub fn is_interface(&self, class_id: HeapId) -> bool {
        self.heap.class(class_id).is_ok_and(ClassObject::is_interface)
    }

    /// Returns true if `name` resolves to a contract-carrying attribute on the class.
    #[must_use]
    pub fn is_attribute(&self, class_id: HeapId, name: &str) -> bool {
        access::resolve_attribute(&self.heap, class_id, name).is_ok_and(|attr| attr.is_some())
    }
}
