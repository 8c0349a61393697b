//! Runtime values seen by the call surface.
//!
//! Only what body-method invocation needs: a receiver, a result, an
//! opaque block and a call-site token. Object layout, method tables and
//! the rest of the object model live elsewhere.

use std::fmt;
use std::sync::Arc;

/// A runtime value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Module(ModuleRef),
}

impl Value {
    /// Create a string value.
    pub fn string(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Module(m) => write!(f, "{m}"),
        }
    }
}

/// What kind of namespace a [`ModuleRef`] names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Module,
    Class,
    /// The singleton class opened by `class << obj`.
    Singleton,
}

struct ModuleData {
    name: Arc<str>,
    kind: ModuleKind,
    lexical_parent: Option<ModuleRef>,
}

/// Shared reference to a module or class object.
///
/// Equality is identity: two references are equal only if they point at
/// the same module object, even if the names match.
#[derive(Clone)]
pub struct ModuleRef(Arc<ModuleData>);

impl ModuleRef {
    /// Create a top-level module or class.
    pub fn new(name: &str, kind: ModuleKind) -> Self {
        ModuleRef(Arc::new(ModuleData {
            name: Arc::from(name),
            kind,
            lexical_parent: None,
        }))
    }

    /// Create a module or class nested lexically inside `parent`.
    pub fn nested(parent: &ModuleRef, name: &str, kind: ModuleKind) -> Self {
        ModuleRef(Arc::new(ModuleData {
            name: Arc::from(name),
            kind,
            lexical_parent: Some(parent.clone()),
        }))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn kind(&self) -> ModuleKind {
        self.0.kind
    }

    pub fn lexical_parent(&self) -> Option<&ModuleRef> {
        self.0.lexical_parent.as_ref()
    }

    /// Fully qualified name, e.g. `Outer::Inner`.
    pub fn qualified_name(&self) -> String {
        match &self.0.lexical_parent {
            Some(parent) => format!("{}::{}", parent.qualified_name(), self.0.name),
            None => self.0.name.to_string(),
        }
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ModuleRef {}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleRef({:?}, {})", self.0.kind, self.qualified_name())
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            ModuleKind::Singleton => write!(f, "#<Class:{}>", self.qualified_name()),
            ModuleKind::Module | ModuleKind::Class => f.write_str(&self.qualified_name()),
        }
    }
}

/// A block attached to a call.
///
/// Opaque to the call path: it is forwarded, never inspected.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Block {
    /// No block was passed.
    #[default]
    Null,
    /// A block, carried as the value of its proc.
    Given(Value),
}

/// Token identifying the call site a call was made from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Method name as written at the site.
    pub method_name: Arc<str>,
    /// Site index within the calling sequence.
    pub index: u32,
}

impl CallSite {
    pub fn new(method_name: &str, index: u32) -> Self {
        CallSite {
            method_name: Arc::from(method_name),
            index,
        }
    }
}
