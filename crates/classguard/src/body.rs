use indexmap::IndexMap;

use crate::{
    attribute::{Attribute, Member, Variable},
    function::Function,
    heap::HeapId,
    value::Value,
};

/// The declarations of a class or interface, in declaration order.
///
/// Built with chained calls and handed to
/// [`Runtime::define_class`](crate::Runtime::define_class) or
/// [`Runtime::define_interface`](crate::Runtime::define_interface). Declaring a
/// name twice keeps the first position and the last member.
///
/// ```
/// use classguard::{BuiltinType, ClassBody, Function, Value, Variable};
///
/// let body = ClassBody::new()
///     .constant("SIDES", 4)
///     .variable("width", Variable::new().typed(BuiltinType::Float))
///     .method("area", Function::new("area", |_, _| Ok(Value::Float(0.0))))
///     .mark_final();
/// assert_eq!(body.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClassBody {
    members: IndexMap<String, Member>,
    interfaces: Vec<HeapId>,
    is_abstract: bool,
    is_final: bool,
}

impl ClassBody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares any member: an [`Attribute`] or a plain value.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, member: impl Into<Member>) -> Self {
        self.members.insert(name.into(), member.into());
        self
    }

    #[must_use]
    pub fn constant(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, Attribute::constant(value))
    }

    #[must_use]
    pub fn variable(self, name: impl Into<String>, variable: Variable) -> Self {
        self.member(name, Attribute::variable(variable))
    }

    /// Declares a variable whose single value is shared by the class, its
    /// subclasses and all their instances.
    #[must_use]
    pub fn static_variable(self, name: impl Into<String>, variable: Variable) -> Self {
        self.member(name, Attribute::static_variable(variable))
    }
    #[must_use]
    pub fn method(self, name: impl Into<String>, function: Function) -> Self {
        self.member(name, Attribute::method(function))
    }

    #[must_use]
    pub fn static_method(self, name: impl Into<String>, function: Function) -> Self {
        self.member(name, Attribute::static_method(function))
    }

    #[must_use]
    pub fn abstract_method(self, name: impl Into<String>, function: Function) -> Self {
        self.member(name, Attribute::abstract_method(function))
    }

    #[must_use]
    pub fn final_method(self, name: impl Into<String>, function: Function) -> Self {
        self.member(name, Attribute::final_method(function))
    }

    /// Declares a plain class-level value without a contract.
    ///
    /// A plain function declared this way still counts as a method for interface
    /// checks and overrides.
    #[must_use]
    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, Member::Value(value.into()))
    }

    /// Declares that the class implements `interface`.
    #[must_use]
    pub fn implements(mut self, interface: HeapId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Marks the class abstract regardless of its methods.
    #[must_use]
    pub fn mark_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Forbids subclassing.
    #[must_use]
    pub fn mark_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    pub(crate) fn into_parts(self) -> BodyParts {
        BodyParts {
            members: self.members,
            interfaces: self.interfaces,
            is_abstract: self.is_abstract,
            is_final: self.is_final,
        }
    }
}

/// A consumed [`ClassBody`], as seen by the construction pipeline.
pub(crate) struct BodyParts {
    pub members: IndexMap<String, Member>,
    pub interfaces: Vec<HeapId>,
    pub is_abstract: bool,
    pub is_final: bool,
}
