//! The namespaced type registry consulted during traversal.
//!
//! Two process-wide registry instances exist, one per `none_is_leaf`
//! mode; they differ only in whether the null type has a built-in entry.
//! Both are seeded with the standard containers and share every user
//! registration. Registrations live for the process lifetime; there is no
//! unregister.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use log::debug;

use pytree_value::{ExtensionType, Value, ValueType};

use crate::error::PyTreeError;
use crate::node::PyTreeKind;

/// The result of a custom type's `to_iterable` callback.
pub struct FlattenedNode {
    /// The children to flatten recursively, in canonical order.
    pub children: Vec<Value>,
    /// Auxiliary data stored in the structure and handed back to
    /// `from_iterable`.
    pub metadata: Option<Value>,
    /// Path entries for the children; when absent, `0..children.len()`
    /// is used.
    pub entries: Option<Vec<Value>>,
}

/// Splits a custom container value into children and auxiliary data.
pub type FlattenFn = Arc<dyn Fn(&Value) -> Result<FlattenedNode, PyTreeError> + Send + Sync>;

/// Rebuilds a custom container value from auxiliary data and children.
pub type UnflattenFn =
    Arc<dyn Fn(Option<&Value>, Vec<Value>) -> Result<Value, PyTreeError> + Send + Sync>;

/// How values of one host type are handled during traversal.
pub struct Registration {
    pub(crate) kind: PyTreeKind,
    pub(crate) ty: ValueType,
    pub(crate) to_iterable: Option<FlattenFn>,
    pub(crate) from_iterable: Option<UnflattenFn>,
    pub(crate) namespace: String,
}

impl Registration {
    /// The node kind values of this type flatten into.
    pub fn kind(&self) -> PyTreeKind {
        self.kind
    }

    /// The registered host type.
    pub fn node_type(&self) -> &ValueType {
        &self.ty
    }

    /// The namespace this registration lives in (empty for the default
    /// namespace and for built-ins).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn builtin(kind: PyTreeKind, ty: ValueType) -> Arc<Self> {
        Arc::new(Registration {
            kind,
            ty,
            to_iterable: None,
            from_iterable: None,
            namespace: String::new(),
        })
    }
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum RegistryKey {
    Builtin(&'static str),
    Custom {
        namespace: String,
        type_name: String,
    },
}

pub(crate) struct PyTreeTypeRegistry {
    registrations: HashMap<RegistryKey, Arc<Registration>>,
}

static REGISTRY_NONE_IS_NODE: LazyLock<RwLock<PyTreeTypeRegistry>> =
    LazyLock::new(|| RwLock::new(PyTreeTypeRegistry::seeded(false)));
static REGISTRY_NONE_IS_LEAF: LazyLock<RwLock<PyTreeTypeRegistry>> =
    LazyLock::new(|| RwLock::new(PyTreeTypeRegistry::seeded(true)));

impl PyTreeTypeRegistry {
    fn seeded(none_is_leaf: bool) -> Self {
        let mut registrations = HashMap::new();
        let mut builtin = |kind: PyTreeKind, ty: ValueType, name: &'static str| {
            registrations.insert(RegistryKey::Builtin(name), Registration::builtin(kind, ty));
        };
        builtin(PyTreeKind::Tuple, ValueType::Tuple, "builtins.tuple");
        builtin(PyTreeKind::List, ValueType::List, "builtins.list");
        builtin(PyTreeKind::Dict, ValueType::Dict, "builtins.dict");
        builtin(
            PyTreeKind::OrderedDict,
            ValueType::OrderedDict,
            "collections.OrderedDict",
        );
        builtin(
            PyTreeKind::DefaultDict,
            ValueType::DefaultDict,
            "collections.defaultdict",
        );
        builtin(PyTreeKind::Deque, ValueType::Deque, "collections.deque");
        if !none_is_leaf {
            builtin(PyTreeKind::None, ValueType::None, "builtins.NoneType");
        }
        PyTreeTypeRegistry { registrations }
    }

    fn instance(none_is_leaf: bool) -> &'static RwLock<Self> {
        if none_is_leaf {
            &REGISTRY_NONE_IS_LEAF
        } else {
            &REGISTRY_NONE_IS_NODE
        }
    }

    /// Register `ty` in both mode instances under `namespace`.
    pub(crate) fn register(
        ty: &Arc<ExtensionType>,
        to_iterable: FlattenFn,
        from_iterable: UnflattenFn,
        namespace: &str,
    ) -> Result<(), PyTreeError> {
        let key = RegistryKey::Custom {
            namespace: namespace.to_owned(),
            type_name: ty.name().to_owned(),
        };
        // Lock order is fixed: the none-is-node instance first.
        let mut none_is_node = Self::instance(false).write().unwrap_or_else(|e| e.into_inner());
        let mut none_is_leaf = Self::instance(true).write().unwrap_or_else(|e| e.into_inner());
        if none_is_node.registrations.contains_key(&key) {
            return Err(PyTreeError::AlreadyRegistered {
                type_name: ty.name().to_owned(),
                namespace: namespace.to_owned(),
            });
        }
        let registration = Arc::new(Registration {
            kind: PyTreeKind::Custom,
            ty: ValueType::Extension(Arc::clone(ty)),
            to_iterable: Some(to_iterable),
            from_iterable: Some(from_iterable),
            namespace: namespace.to_owned(),
        });
        none_is_node
            .registrations
            .insert(key.clone(), Arc::clone(&registration));
        none_is_leaf.registrations.insert(key, registration);
        debug!(
            "registered custom tree node type '{}' in namespace '{namespace}'",
            ty.name()
        );
        Ok(())
    }

    /// Find the registration for `ty`, if any: built-in entries first,
    /// then the user entry in `namespace`, then the default namespace.
    /// Never fails.
    pub(crate) fn lookup(
        ty: &ValueType,
        namespace: &str,
        none_is_leaf: bool,
    ) -> Option<Arc<Registration>> {
        let registry = Self::instance(none_is_leaf)
            .read()
            .unwrap_or_else(|e| e.into_inner());
        match ty {
            ValueType::Extension(ext) => registry.lookup_custom(ext.name(), namespace),
            other => other.builtin_qualified_name().and_then(|name| {
                registry
                    .registrations
                    .get(&RegistryKey::Builtin(name))
                    .cloned()
            }),
        }
    }

    /// Resolve a custom type by name, as stored in the encoded form.
    pub(crate) fn lookup_custom_by_name(
        type_name: &str,
        namespace: &str,
        none_is_leaf: bool,
    ) -> Option<Arc<Registration>> {
        Self::instance(none_is_leaf)
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .lookup_custom(type_name, namespace)
    }

    fn lookup_custom(&self, type_name: &str, namespace: &str) -> Option<Arc<Registration>> {
        if !namespace.is_empty() {
            let key = RegistryKey::Custom {
                namespace: namespace.to_owned(),
                type_name: type_name.to_owned(),
            };
            if let Some(registration) = self.registrations.get(&key) {
                return Some(Arc::clone(registration));
            }
        }
        let key = RegistryKey::Custom {
            namespace: String::new(),
            type_name: type_name.to_owned(),
        };
        self.registrations.get(&key).cloned()
    }
}

/// Extends the set of types treated as internal nodes: values of `ty`
/// will be split with `to_iterable` and rebuilt with `from_iterable`.
///
/// `namespace` scopes the registration; the empty string is the default
/// namespace, visible from every flatten call. Registering the same
/// `(type, namespace)` pair twice fails with
/// [`PyTreeError::AlreadyRegistered`].
pub fn register_node(
    ty: &Arc<ExtensionType>,
    to_iterable: impl Fn(&Value) -> Result<FlattenedNode, PyTreeError> + Send + Sync + 'static,
    from_iterable: impl Fn(Option<&Value>, Vec<Value>) -> Result<Value, PyTreeError>
        + Send
        + Sync
        + 'static,
    namespace: &str,
) -> Result<(), PyTreeError> {
    PyTreeTypeRegistry::register(ty, Arc::new(to_iterable), Arc::new(from_iterable), namespace)
}
