use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased equality and hashing, so that arguments of arbitrary types can be fingerprinted
/// together.
pub(crate) trait Key: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn key_eq(&self, other: &dyn Key) -> bool;
    fn key_hash(&self, state: &mut dyn Hasher);
}
impl<T: Any + Hash + Eq + fmt::Debug + Send + Sync> Key for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn key_eq(&self, other: &dyn Key) -> bool {
        other.as_any().downcast_ref::<T>().map_or(false, |other| other == self)
    }

    fn key_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// A value passed to, or returned from, a dependency.
///
/// Values are reference counted, so cloning one is cheap and a cached result handed out twice is
/// the very same object both times.  Values built with [`Value::new`] can take part in the
/// fingerprint of a cached dependency; values built with [`Value::opaque`] cannot.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    key: Option<Arc<dyn Key>>,
    type_id: TypeId,
    type_name: &'static str,
}
impl Value {
    pub fn new<T: Any + Hash + Eq + fmt::Debug + Send + Sync>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            inner: value.clone(),
            key: Some(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            key: None,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both values share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_fingerprintable(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn key(&self) -> Option<&Arc<dyn Key>> {
        self.key.as_ref()
    }
}
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "Value({:?})", key),
            None => write!(f, "Value(<{}>)", self.type_name),
        }
    }
}

/// The fingerprint of one invocation of a cached dependency: its bound argument values in
/// declared order.
#[derive(Debug, Clone)]
pub(crate) struct Fingerprint(Vec<Arc<dyn Key>>);
impl Fingerprint {
    /// Fails with the name of the first argument that cannot be fingerprinted.
    pub fn of<'a, I>(arguments: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut keys = Vec::new();
        for (name, value) in arguments {
            match value.key() {
                Some(key) => keys.push(Arc::clone(key)),
                None => return Err(String::from(name)),
            }
        }
        Ok(Self(keys))
    }
}
impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(left, right)| (**left).key_eq(&**right))
    }
}
impl Eq for Fingerprint {}
impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for key in self.0.iter() {
            (**key).key_hash(state);
        }
    }
}
