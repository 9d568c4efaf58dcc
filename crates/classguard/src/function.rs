use std::{
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{exception::RunResult, runtime::Runtime, value::Value};

/// Opaque identity of a function object.
///
/// Assigned once when the [`Function`] is created. Clones of a function share the id,
/// two separately created functions never do, even when their bodies are identical.
/// Override detection compares these ids, never behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FunctionId(u64);

impl FunctionId {
    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic source of function identities.
static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

type NativeBody = dyn Fn(&mut Runtime, &[Value]) -> RunResult<Value>;

/// A host function that can be installed as a method or stored as a value.
///
/// The body receives the runtime and the positional arguments. When called as a
/// method the receiving instance is passed as the first argument.
#[derive(Clone)]
pub struct Function {
    id: FunctionId,
    name: Rc<str>,
    body: Rc<NativeBody>,
}

impl Function {
    /// Creates a new function with a fresh identity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut Runtime, &[Value]) -> RunResult<Value> + 'static,
    ) -> Self {
        Self {
            id: FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed)),
            name: Rc::from(name.into()),
            body: Rc::new(body),
        }
    }

    /// Creates a function that ignores its arguments and returns `None`.
    ///
    /// Handy as a placeholder body for interface and abstract declarations.
    #[must_use]
    pub fn stub(name: impl Into<String>) -> Self {
        Self::new(name, |_, _| Ok(Value::None))
    }

    /// Returns the identity of this function.
    #[must_use]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if both handles refer to the same function object.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Invokes the function body.
    pub fn call(&self, runtime: &mut Runtime, args: &[Value]) -> RunResult<Value> {
        (self.body)(runtime, args)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {} #{}>", self.name, self.id.0)
    }
}
