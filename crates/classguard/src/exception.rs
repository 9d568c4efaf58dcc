use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for every fallible runtime operation.
pub type RunResult<T> = Result<T, Exception>;

/// Kinds of failure raised by the contract layer.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ScopeError` -> "ScopeError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    // --- access-time failures ---
    /// Write or delete on a constant, or reassignment of a method.
    ImmutableAttributeError,
    /// Instance-only attribute touched without an instance.
    ScopeError,
    /// Read before first write with no default.
    UninitializedAttributeError,
    /// Type, interface or predicate validation failed on write.
    ContractViolationError,
    /// Any access of an abstract method that has not been overridden.
    AbstractAccessError,
    /// Name not found on the receiver at all.
    AttributeError,
    /// Protected or private member accessed from outside its class.
    VisibilityError,

    // --- construction-time failures ---
    /// A declared interface method is missing from the class.
    IncompleteImplementationError,
    /// A name required to be a method resolves to something else, or an
    /// attribute was reassigned after definition.
    InvalidOverrideError,
    /// A final class appears among the ancestors.
    FinalClassViolationError,
    /// A final method was overridden with a different function.
    FinalMethodViolationError,
    /// Malformed definition: bad bases, inconsistent linearization, limits exceeded.
    DefinitionError,

    // --- instantiation guard ---
    AbstractInstantiationError,
    InterfaceInstantiationError,

    // --- value construction and host functions ---
    TypeError,
    ValueError,
}

impl ExcType {
    /// Returns true for kinds that are raised while a class or interface is being defined.
    ///
    /// These errors are fatal to the definition: no class object is produced.
    #[must_use]
    pub fn is_construction_error(self) -> bool {
        matches!(
            self,
            Self::IncompleteImplementationError
                | Self::InvalidOverrideError
                | Self::FinalClassViolationError
                | Self::FinalMethodViolationError
                | Self::DefinitionError
        )
    }

    /// Returns true for kinds raised by the instantiation guard.
    #[must_use]
    pub fn is_instantiation_error(self) -> bool {
        matches!(
            self,
            Self::AbstractInstantiationError | Self::InterfaceInstantiationError
        )
    }

    /// Creates an exception of this kind with a message.
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Exception {
        Exception::new(self, Some(message.into()))
    }

    pub(crate) fn constant_assignment(name: &str) -> Exception {
        Self::ImmutableAttributeError.with_message(format!("cannot override constant '{name}'"))
    }

    pub(crate) fn constant_deletion(name: &str) -> Exception {
        Self::ImmutableAttributeError.with_message(format!("cannot delete constant '{name}'"))
    }

    pub(crate) fn method_reassignment(name: &str) -> Exception {
        Self::ImmutableAttributeError.with_message(format!("method '{name}' cannot be reassigned or deleted"))
    }

    pub(crate) fn scope_error(name: &str) -> Exception {
        Self::ScopeError.with_message(format!(
            "instance member '{name}' cannot be accessed from the class scope"
        ))
    }

    pub(crate) fn uninitialized(class_name: &str, name: &str) -> Exception {
        Self::UninitializedAttributeError.with_message(format!(
            "'{class_name}' object attribute '{name}' has not been set and has no default"
        ))
    }

    pub(crate) fn uninitialized_static(name: &str) -> Exception {
        Self::UninitializedAttributeError.with_message(format!(
            "static attribute '{name}' has not been set and has no default"
        ))
    }

    pub(crate) fn visibility(visibility: impl fmt::Display, owner: &str, name: &str) -> Exception {
        Self::VisibilityError.with_message(format!("cannot access {visibility} '{owner}' member '{name}'"))
    }

    pub(crate) fn contract_violation(name: &str, detail: impl fmt::Display) -> Exception {
        Self::ContractViolationError.with_message(format!("invalid value for attribute '{name}': {detail}"))
    }

    pub(crate) fn abstract_access(name: &str) -> Exception {
        Self::AbstractAccessError.with_message(format!("cannot access abstract method '{name}'"))
    }

    pub(crate) fn attribute_error(owner: impl fmt::Display, name: &str) -> Exception {
        Self::AttributeError.with_message(format!("{owner} has no attribute '{name}'"))
    }

    pub(crate) fn incomplete_implementation(class_name: &str, interface: &str, name: &str) -> Exception {
        Self::IncompleteImplementationError.with_message(format!(
            "class '{class_name}' is missing method '{name}' required by interface '{interface}'"
        ))
    }

    pub(crate) fn not_a_method(class_name: &str, interface: &str, name: &str) -> Exception {
        Self::InvalidOverrideError.with_message(format!(
            "class '{class_name}' attribute '{name}' is not a method, as required by interface '{interface}'"
        ))
    }

    pub(crate) fn reassigned_attribute(class_name: &str, name: &str) -> Exception {
        Self::InvalidOverrideError.with_message(format!(
            "cannot override '{class_name}' attribute '{name}' by assignment"
        ))
    }

    pub(crate) fn final_class(name: &str) -> Exception {
        Self::FinalClassViolationError.with_message(format!("cannot subclass final class '{name}'"))
    }

    pub(crate) fn final_method(owner: &str, name: &str) -> Exception {
        Self::FinalMethodViolationError.with_message(format!("cannot override final '{owner}' method '{name}'"))
    }

    pub(crate) fn definition_error(message: impl Into<String>) -> Exception {
        Self::DefinitionError.with_message(message)
    }

    pub(crate) fn abstract_instantiation(class_name: &str, methods: &[String]) -> Exception {
        let message = if methods.is_empty() {
            format!("cannot instantiate abstract class '{class_name}'")
        } else {
            format!(
                "cannot instantiate abstract class '{class_name}' with abstract methods {}",
                methods.join(", ")
            )
        };
        Self::AbstractInstantiationError.with_message(message)
    }

    pub(crate) fn interface_instantiation(name: &str) -> Exception {
        Self::InterfaceInstantiationError.with_message(format!("cannot instantiate interface '{name}'"))
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Exception {
        Self::TypeError.with_message(message)
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Exception {
        Self::ValueError.with_message(message)
    }
}

/// An error raised by the runtime, carrying its kind and an optional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    exc_type: ExcType,
    message: Option<String>,
}

impl Exception {
    /// Creates a new exception.
    #[must_use]
    pub fn new(exc_type: ExcType, message: Option<String>) -> Self {
        Self { exc_type, message }
    }

    /// Returns the kind of this exception.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Consumes the exception and returns its message.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message
    }
}

impl From<ExcType> for Exception {
    fn from(exc_type: ExcType) -> Self {
        Self::new(exc_type, None)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

impl std::error::Error for Exception {}
