//! The attribute model: contract-carrying class members.
//!
//! An [`Attribute`] is created unnamed when a class body is built and receives its
//! name exactly once, when the construction pipeline accepts the class. The
//! [`AttributeKind`]s share one protocol (`get`, `set`, `delete`, `describe`) whose
//! behaviour depends on the kind and on whether an owning instance is present.
//! Every attribute also carries a [`Visibility`], enforced by the runtime.

use std::{
    cell::{OnceCell, RefCell},
    fmt,
    rc::Rc,
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, IntoStaticStr};

use crate::{
    conformance,
    exception::{ExcType, RunResult},
    function::{Function, FunctionId},
    heap::{Heap, HeapId},
    value::{TypeSpec, Value},
};

/// A validation callback run against the (possibly coerced) value on every write.
pub type Predicate = Rc<dyn Fn(&Value) -> bool>;

/// Per-instance storage cell for a variable or plain instance field.
///
/// Deleting a variable writes `Unset` rather than removing the entry, so a later
/// read falls back to the default exactly as if the value had never been written.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Unset,
    Set(Value),
}

impl Slot {
    /// Returns the stored value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Unset => None,
            Self::Set(value) => Some(value),
        }
    }
}

// ============================================================================
// Variable
// ============================================================================

/// A typed, validated, instance-only field.
///
/// ```
/// use classguard::{BuiltinType, Variable};
///
/// let age = Variable::new()
///     .typed(BuiltinType::Int)
///     .validate(|v| v.as_int().is_some_and(|i| i >= 0))
///     .with_default(0);
/// ```
#[derive(Clone, Default)]
pub struct Variable {
    types: SmallVec<[TypeSpec; 2]>,
    interface: Option<HeapId>,
    predicate: Option<Predicate>,
    default: Option<Value>,
}

impl Variable {
    /// Creates an unconstrained variable with no default.
    #[must_use]
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Adds one accepted type.
    #[must_use]
    pub fn typed(mut self, ty: impl Into<TypeSpec>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// Adds several accepted types.
    #[must_use]
    pub fn types(mut self, types: impl IntoIterator<Item = TypeSpec>) -> Self {
        self.types.extend(types);
        self
    }

    /// Requires values to structurally conform to the given interface.
    #[must_use]
    pub fn interface(mut self, interface: HeapId) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Sets the validation predicate.
    #[must_use]
    pub fn validate(mut self, predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Sets the default returned while no value is stored.
    ///
    /// `Value::None` is a legal default, distinct from having none.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn accepted_types(&self) -> &[TypeSpec] {
        &self.types
    }

    #[must_use]
    pub fn required_interface(&self) -> Option<HeapId> {
        self.interface
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Runs the write-time checks and returns the value to store.
    ///
    /// Order: interface conformance, then the type constraint (coercing when exactly
    /// one type is accepted), then the predicate against the coerced value.
    fn check(&self, name: &str, value: Value, heap: &Heap) -> RunResult<Value> {
        if let Some(interface) = self.interface
            && !conformance::structural(heap, &value, interface)
        {
            let iface_name = heap.class(interface).map_or("<unknown>", |cls| cls.name());
            return Err(ExcType::contract_violation(
                name,
                format!("{} does not conform to interface '{iface_name}'", value.repr()),
            ));
        }

        let value = match self.types.as_slice() {
            [] => value,
            types if types.iter().any(|ty| ty.matches(&value, heap)) => value,
            [single] => single.construct(&value, heap).map_err(|err| {
                ExcType::contract_violation(
                    name,
                    format!(
                        "cannot convert {} to '{}': {err}",
                        value.repr(),
                        single.display_name(heap)
                    ),
                )
            })?,
            types => {
                let names: Vec<String> = types.iter().map(|ty| ty.display_name(heap)).collect();
                return Err(ExcType::contract_violation(
                    name,
                    format!(
                        "expected one of ({}), got '{}'",
                        names.join(", "),
                        value.type_name(heap)
                    ),
                ));
            }
        };

        if let Some(predicate) = &self.predicate
            && !predicate(&value)
        {
            return Err(ExcType::contract_violation(
                name,
                format!("{} rejected by validator", value.repr()),
            ));
        }
        Ok(value)
    }
}

impl Variable {
    /// Appends the human-readable constraint summary used by [`Attribute::describe`].
    fn describe_into(&self, heap: &Heap, constraints: &mut Vec<String>) {
        if !self.types.is_empty() {
            let names: Vec<String> = self.types.iter().map(|ty| ty.display_name(heap)).collect();
            constraints.push(format!("type: {}", names.join(" | ")));
        }
        if let Some(interface) = self.interface {
            let iface_name = heap.class(interface).map_or("<unknown>", |cls| cls.name());
            constraints.push(format!("interface: {iface_name}"));
        }
        if self.predicate.is_some() {
            constraints.push("validated".to_owned());
        }
        if let Some(default) = &self.default {
            constraints.push(format!("default = {}", default.repr()));
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("types", &self.types)
            .field("interface", &self.interface)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("default", &self.default)
            .finish()
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// The contract an attribute enforces.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    /// Immutable value, readable from class and instance scope.
    Constant(Value),
    /// Instance-only validated field.
    Variable(Variable),
    /// Validated field with one value for the declaring class, its subclasses and
    /// all their instances.
    StaticVariable { variable: Variable, value: RefCell<Slot> },
    Method(Function),
    /// Called with the class instead of the instance.
    StaticMethod(Function),
    /// Must be overridden before the class can be instantiated; every access fails.
    AbstractMethod(Function),
    /// Cannot be overridden by subclasses.
    FinalMethod(Function),
}

impl AttributeKind {
    #[must_use]
    pub fn tag(&self) -> AttributeTag {
        match self {
            Self::Constant(_) => AttributeTag::Constant,
            Self::Variable(_) => AttributeTag::Variable,
            Self::StaticVariable { .. } => AttributeTag::StaticVariable,
            Self::Method(_) => AttributeTag::Method,
            Self::StaticMethod(_) => AttributeTag::StaticMethod,
            Self::AbstractMethod(_) => AttributeTag::AbstractMethod,
            Self::FinalMethod(_) => AttributeTag::FinalMethod,
        }
    }
}

/// Fieldless mirror of [`AttributeKind`] used in reports and trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
pub enum AttributeTag {
    Constant,
    Variable,
    StaticVariable,
    Method,
    StaticMethod,
    AbstractMethod,
    FinalMethod,
}

/// Who may access an attribute through the runtime.
///
/// Public members are open to everyone. Protected members are open to methods of
/// the declaring class and its subclasses, private members to methods of the
/// declaring class only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// A class member carrying a contract.
#[derive(Debug)]
pub struct Attribute {
    name: OnceCell<String>,
    kind: AttributeKind,
    visibility: Visibility,
}

impl Attribute {
    fn with_kind(kind: AttributeKind) -> Self {
        Self {
            name: OnceCell::new(),
            kind,
            visibility: Visibility::Public,
        }
    }

    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::with_kind(AttributeKind::Constant(value.into()))
    }

    #[must_use]
    pub fn variable(variable: Variable) -> Self {
        Self::with_kind(AttributeKind::Variable(variable))
    }

    /// A validated variable stored once for the whole class hierarchy.
    #[must_use]
    pub fn static_variable(variable: Variable) -> Self {
        Self::with_kind(AttributeKind::StaticVariable {
            variable,
            value: RefCell::new(Slot::Unset),
        })
    }

    #[must_use]
    pub fn method(function: Function) -> Self {
        Self::with_kind(AttributeKind::Method(function))
    }

    #[must_use]
    pub fn static_method(function: Function) -> Self {
        Self::with_kind(AttributeKind::StaticMethod(function))
    }

    #[must_use]
    pub fn abstract_method(function: Function) -> Self {
        Self::with_kind(AttributeKind::AbstractMethod(function))
    }

    #[must_use]
    pub fn final_method(function: Function) -> Self {
        Self::with_kind(AttributeKind::FinalMethod(function))
    }

    /// Restricts access to methods of the declaring class and its subclasses.
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.visibility = Visibility::Protected;
        self
    }

    /// Restricts access to methods of the declaring class.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    #[must_use]
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Returns the bound name, or `None` before the pipeline has bound it.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Binds the name if unset.
    ///
    /// Returns false if the attribute is already bound to a different name; the
    /// existing name is kept.
    pub(crate) fn bind_name(&self, name: &str) -> bool {
        self.name.get_or_init(|| name.to_owned()) == name
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, AttributeKind::AbstractMethod(_))
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self.kind, AttributeKind::FinalMethod(_))
    }

    #[must_use]
    pub fn is_static_method(&self) -> bool {
        matches!(self.kind, AttributeKind::StaticMethod(_))
    }

    /// Returns the wrapped function for the method kinds.
    #[must_use]
    pub fn function(&self) -> Option<&Function> {
        match &self.kind {
            AttributeKind::Method(f)
            | AttributeKind::StaticMethod(f)
            | AttributeKind::AbstractMethod(f)
            | AttributeKind::FinalMethod(f) => Some(f),
            AttributeKind::Constant(_) | AttributeKind::Variable(_) | AttributeKind::StaticVariable { .. } => None,
        }
    }

    fn display_name(&self) -> &str {
        self.name().unwrap_or("<unbound>")
    }

    /// Reads the attribute. `inst` is `None` for class-scope access.
    pub fn get(&self, heap: &Heap, inst: Option<HeapId>) -> RunResult<Value> {
        let name = self.display_name();
        match &self.kind {
            AttributeKind::Constant(value) => Ok(value.clone()),
            AttributeKind::Method(function)
            | AttributeKind::StaticMethod(function)
            | AttributeKind::FinalMethod(function) => Ok(Value::Function(function.clone())),
            AttributeKind::StaticVariable { variable, value } => match (&*value.borrow(), variable.default_value()) {
                (Slot::Set(stored), _) => Ok(stored.clone()),
                (Slot::Unset, Some(default)) => Ok(default.clone()),
                (Slot::Unset, None) => Err(ExcType::uninitialized_static(name)),
            },
            AttributeKind::AbstractMethod(_) => Err(ExcType::abstract_access(name)),
            AttributeKind::Variable(variable) => {
                let inst_id = inst.ok_or_else(|| ExcType::scope_error(name))?;
                let instance = heap.instance(inst_id)?;
                if let Some(value) = instance.get(name) {
                    return Ok(value.clone());
                }
                match variable.default_value() {
                    Some(default) => Ok(default.clone()),
                    None => {
                        let class_name = heap.class(instance.class_id()).map_or("<unknown>", |cls| cls.name());
                        Err(ExcType::uninitialized(class_name, name))
                    }
                }
            }
        }
    }

    /// Writes the attribute. A failed write leaves instance storage untouched.
    pub fn set(&self, heap: &mut Heap, inst: Option<HeapId>, value: Value) -> RunResult<()> {
        let name = self.display_name();
        match &self.kind {
            AttributeKind::Constant(_) => Err(ExcType::constant_assignment(name)),
            AttributeKind::Method(_) | AttributeKind::StaticMethod(_) | AttributeKind::FinalMethod(_) => {
                Err(ExcType::method_reassignment(name))
            }
            AttributeKind::AbstractMethod(_) => Err(ExcType::abstract_access(name)),
            AttributeKind::StaticVariable { variable, value: slot } => {
                let value = variable.check(name, value, heap)?;
                *slot.borrow_mut() = Slot::Set(value);
                Ok(())
            }
            AttributeKind::Variable(variable) => {
                let inst_id = inst.ok_or_else(|| ExcType::scope_error(name))?;
                // resolve the instance first so a dangling id fails before validation runs
                heap.instance(inst_id)?;
                let value = variable.check(name, value, heap)?;
                heap.instance_mut(inst_id)?.store(name, Slot::Set(value));
                Ok(())
            }
        }
    }

    /// Deletes the attribute's per-instance value.
    pub fn delete(&self, heap: &mut Heap, inst: Option<HeapId>) -> RunResult<()> {
        let name = self.display_name();
        match &self.kind {
            AttributeKind::Constant(_) => Err(ExcType::constant_deletion(name)),
            AttributeKind::Method(_) | AttributeKind::StaticMethod(_) | AttributeKind::FinalMethod(_) => {
                Err(ExcType::method_reassignment(name))
            }
            AttributeKind::AbstractMethod(_) => Err(ExcType::abstract_access(name)),
            AttributeKind::StaticVariable { value, .. } => {
                *value.borrow_mut() = Slot::Unset;
                Ok(())
            }
            AttributeKind::Variable(_) => {
                let inst_id = inst.ok_or_else(|| ExcType::scope_error(name))?;
                heap.instance_mut(inst_id)?.store(name, Slot::Unset);
                Ok(())
            }
        }
    }

    /// Summarizes the attribute for humans and for serialization.
    #[must_use]
    pub fn describe(&self, heap: &Heap) -> AttributeInfo {
        let mut constraints = Vec::new();
        let mut function = None;
        match &self.kind {
            AttributeKind::Constant(value) => constraints.push(format!("value = {}", value.repr())),
            AttributeKind::Variable(variable) => variable.describe_into(heap, &mut constraints),
            AttributeKind::StaticVariable { variable, value } => {
                variable.describe_into(heap, &mut constraints);
                if let Slot::Set(stored) = &*value.borrow() {
                    constraints.push(format!("value = {}", stored.repr()));
                }
            }
            AttributeKind::Method(f)
            | AttributeKind::StaticMethod(f)
            | AttributeKind::AbstractMethod(f)
            | AttributeKind::FinalMethod(f) => {
                function = Some(f.name().to_owned());
            }
        }
        AttributeInfo {
            name: self.name().map(str::to_owned),
            kind: self.kind.tag(),
            visibility: self.visibility,
            function,
            constraints,
        }
    }
}

/// Serializable summary of an attribute, produced by [`Attribute::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: Option<String>,
    pub kind: AttributeTag,
    pub visibility: Visibility,
    /// Name of the wrapped function, for method kinds.
    pub function: Option<String>,
    pub constraints: Vec<String>,
}

impl fmt::Display for AttributeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.visibility != Visibility::Public {
            write!(f, "{} ", self.visibility)?;
        }
        write!(f, "{} {}", self.kind, self.name.as_deref().unwrap_or("<unbound>"))?;
        if let Some(function) = &self.function {
            write!(f, " -> {function}")?;
        }
        if !self.constraints.is_empty() {
            write!(f, " [{}]", self.constraints.join("; "))?;
        }
        Ok(())
    }
}

// ============================================================================
// Member
// ============================================================================

/// An entry of a class namespace.
#[derive(Debug, Clone)]
pub enum Member {
    Attribute(Rc<Attribute>),
    /// Plain class-level value, including plain functions.
    Value(Value),
}

impl Member {
    /// Returns the function behind this member, for method attributes and plain functions.
    #[must_use]
    pub fn function(&self) -> Option<&Function> {
        match self {
            Self::Attribute(attr) => attr.function(),
            Self::Value(value) => value.as_function(),
        }
    }

    /// Returns true if the member is a function or wraps one.
    #[must_use]
    pub fn is_function_like(&self) -> bool {
        self.function().is_some()
    }

    #[must_use]
    pub fn function_id(&self) -> Option<FunctionId> {
        self.function().map(Function::id)
    }

    #[must_use]
    pub fn as_attribute(&self) -> Option<&Rc<Attribute>> {
        match self {
            Self::Attribute(attr) => Some(attr),
            Self::Value(_) => None,
        }
    }
}

impl From<Attribute> for Member {
    fn from(attr: Attribute) -> Self {
        Self::Attribute(Rc::new(attr))
    }
}

impl From<Rc<Attribute>> for Member {
    fn from(attr: Rc<Attribute>) -> Self {
        Self::Attribute(attr)
    }
}

impl From<Value> for Member {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Function> for Member {
    fn from(function: Function) -> Self {
        Self::Value(Value::Function(function))
    }
}

impl From<i64> for Member {
    fn from(i: i64) -> Self {
        Self::Value(Value::Int(i))
    }
}

impl From<&str> for Member {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

/// Returns true if `member` is a contract-carrying attribute rather than a plain value.
#[must_use]
pub fn is_attribute(member: &Member) -> bool {
    matches!(member, Member::Attribute(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_binds_once() {
        let attr = Attribute::constant(1);
        assert_eq!(attr.name(), None);
        assert!(attr.bind_name("x"));
        assert!(attr.bind_name("x"));
        assert!(!attr.bind_name("y"));
        assert_eq!(attr.name(), Some("x"));
    }

    #[test]
    fn member_function_likeness() {
        let f = Function::stub("f");
        assert!(Member::from(f.clone()).is_function_like());
        assert!(Member::from(Attribute::abstract_method(f.clone())).is_function_like());
        assert!(!Member::from(Attribute::constant(3)).is_function_like());
        assert!(!Member::from(Value::Int(3)).is_function_like());
        assert_eq!(Member::from(Attribute::method(f.clone())).function_id(), Some(f.id()));
    }

    #[test]
    fn describe_variable() {
        let heap = Heap::default();
        let attr = Attribute::variable(
            Variable::new()
                .typed(crate::value::BuiltinType::Int)
                .validate(|_| true)
                .with_default(0),
        );
        attr.bind_name("count");
        let info = attr.describe(&heap);
        assert_eq!(info.kind, AttributeTag::Variable);
        assert_eq!(info.constraints, vec!["type: int", "validated", "default = 0"]);
        assert_eq!(info.to_string(), "Variable count [type: int; validated; default = 0]");
    }

    #[test]
    fn static_variable_is_shared_across_scopes() {
        let mut heap = Heap::default();
        let attr = Attribute::static_variable(Variable::new().typed(crate::value::BuiltinType::Int)).protected();
        attr.bind_name("count");
        assert_eq!(
            attr.get(&heap, None).map_err(|e| e.exc_type()),
            Err(ExcType::UninitializedAttributeError)
        );
        attr.set(&mut heap, None, Value::from("7")).unwrap();
        assert_eq!(attr.get(&heap, None).unwrap(), Value::Int(7));
        assert_eq!(
            attr.describe(&heap).to_string(),
            "protected StaticVariable count [type: int; value = 7]"
        );
        attr.delete(&mut heap, None).unwrap();
        assert!(attr.get(&heap, None).is_err());
    }
}
