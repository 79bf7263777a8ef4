//! Model provider contract and the in-memory map provider.
//!
//! A provider exclusively owns a model tree and is the sole authority for
//! how paths resolve into it. The frame processor and the proxies never
//! touch provider state except through the five operations below.

use smol_str::SmolStr;

use crate::error::VabError;
use crate::path::ElementPath;
use crate::value::{Value, ValueKind};

/// Backend interface of the bus.
///
/// Implementations report failures through [`VabError`]; callers convert
/// them to error responses at the transport boundary, so no provider error
/// ever tears down a server.
pub trait ModelProvider {
    /// Reads the element at `path`. The root path yields the whole tree.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when nothing lives at `path`, `TypeMismatch` when the
    /// path traverses through a scalar.
    fn get(&self, path: &ElementPath) -> Result<Value, VabError>;

    /// Overwrites the element at `path`. Only existing elements are
    /// written; the root path replaces the whole tree.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when the element does not exist.
    fn set(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError>;

    /// Creates a new element at `path`, never replacing an existing one.
    /// Creating at the path of an existing list or set adds the value to
    /// that collection.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when a non-collection element occupies `path`,
    /// `PathNotFound` when the parent is missing.
    fn create(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError>;

    /// Removes the element at `path` from its parent.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when nothing lives at `path`.
    fn delete(&mut self, path: &ElementPath) -> Result<(), VabError>;

    /// Removes the first member structurally equal to `value` from the
    /// collection at `path`.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when no member matches, `TypeMismatch` when the
    /// element is not a list or set.
    fn delete_value(&mut self, path: &ElementPath, value: &Value) -> Result<(), VabError>;

    /// Invokes the function at `path` with a parameter list.
    ///
    /// # Errors
    ///
    /// `PathNotFound`, `NotInvocable` when the element is not a function,
    /// `InvocationFailure` when the function itself fails.
    fn invoke(&mut self, path: &ElementPath, params: Vec<Value>) -> Result<Value, VabError>;
}

/// Unwraps `{"valueType": .., "value": ..}` parameter wrappers in place,
/// replacing each wrapper with its plain value. Other parameters pass
/// through untouched.
pub fn unwrap_typed_params(params: &mut [Value]) {
    for param in params {
        if let Value::Map(entries) = param {
            if entries.contains_key("valueType") {
                if let Some(inner) = entries.get("value") {
                    *param = inner.clone();
                }
            }
        }
    }
}

/// In-memory provider over a map-rooted model tree.
#[derive(Debug, Default)]
pub struct MapProvider {
    root: Value,
}

impl MapProvider {
    /// Provider with an empty map root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Value::empty_map(),
        }
    }

    /// Provider over an existing tree, typically a map.
    #[must_use]
    pub fn with_root(root: Value) -> Self {
        Self { root }
    }

    /// Borrows the model tree.
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    fn not_found(path: &ElementPath) -> VabError {
        VabError::PathNotFound(path.to_string().into())
    }

    // Resolves one segment against an element. `None` means the segment
    // addresses nothing there; traversal through a scalar is a kind error.
    fn step<'a>(element: &'a Value, segment: &str) -> Result<Option<&'a Value>, VabError> {
        match element {
            Value::Map(entries) => Ok(entries.get(segment)),
            Value::List(items) => Ok(segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))),
            // Set members carry no addressable name.
            Value::Set(_) => Ok(None),
            other => Err(VabError::TypeMismatch {
                expected: ValueKind::Map,
                found: other.kind(),
            }),
        }
    }

    fn step_mut<'a>(element: &'a mut Value, segment: &str) -> Result<Option<&'a mut Value>, VabError> {
        match element {
            Value::Map(entries) => Ok(entries.get_mut(segment)),
            Value::List(items) => Ok(segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index))),
            Value::Set(_) => Ok(None),
            other => Err(VabError::TypeMismatch {
                expected: ValueKind::Map,
                found: other.kind(),
            }),
        }
    }

    // Walks the first `depth` segments of `path`. Errors always report the
    // full request path.
    fn resolve_prefix<'a>(
        root: &'a Value,
        path: &ElementPath,
        depth: usize,
    ) -> Result<&'a Value, VabError> {
        let mut current = root;
        for segment in path.segments().take(depth) {
            current = Self::step(current, segment)?.ok_or_else(|| Self::not_found(path))?;
        }
        Ok(current)
    }

    fn resolve_prefix_mut<'a>(
        root: &'a mut Value,
        path: &ElementPath,
        depth: usize,
    ) -> Result<&'a mut Value, VabError> {
        let mut current = root;
        for segment in path.segments().take(depth) {
            current = Self::step_mut(current, segment)?.ok_or_else(|| Self::not_found(path))?;
        }
        Ok(current)
    }
}

impl ModelProvider for MapProvider {
    fn get(&self, path: &ElementPath) -> Result<Value, VabError> {
        Ok(Self::resolve_prefix(&self.root, path, path.depth())?.clone())
    }

    fn set(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        if path.is_root() {
            self.root = value;
            return Ok(());
        }
        let slot = Self::resolve_prefix_mut(&mut self.root, path, path.depth())?;
        *slot = value;
        Ok(())
    }

    fn create(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        if path.is_root() {
            return Err(VabError::Provider("cannot create the root element".into()));
        }

        // Probe first: an existing collection absorbs the value, any other
        // existing element is a conflict.
        let existing = match Self::resolve_prefix(&self.root, path, path.depth()) {
            Ok(element) => Some(element.kind()),
            Err(VabError::PathNotFound(_)) => None,
            Err(other) => return Err(other),
        };

        match existing {
            Some(ValueKind::List | ValueKind::Set) => {
                let collection = Self::resolve_prefix_mut(&mut self.root, path, path.depth())?;
                match collection {
                    Value::List(items) => items.push(value),
                    other => {
                        other.insert_member(value)?;
                    }
                }
                Ok(())
            }
            Some(_) => Err(VabError::AlreadyExists(path.to_string().into())),
            None => {
                let key = SmolStr::new(path.last().unwrap_or_default());
                let parent =
                    Self::resolve_prefix_mut(&mut self.root, path, path.depth() - 1)?;
                match parent {
                    Value::Map(entries) => {
                        entries.insert(key, value);
                        Ok(())
                    }
                    // List slots cannot be created by index.
                    _ => Err(Self::not_found(path)),
                }
            }
        }
    }

    fn delete(&mut self, path: &ElementPath) -> Result<(), VabError> {
        if path.is_root() {
            return Err(VabError::Provider("cannot delete the root element".into()));
        }
        let last = SmolStr::new(path.last().unwrap_or_default());
        let parent = Self::resolve_prefix_mut(&mut self.root, path, path.depth() - 1)?;
        match parent {
            Value::Map(entries) => entries
                .shift_remove(last.as_str())
                .map(|_| ())
                .ok_or_else(|| Self::not_found(path)),
            Value::List(items) => {
                let index = last
                    .parse::<usize>()
                    .map_err(|_| Self::not_found(path))?;
                if index < items.len() {
                    items.remove(index);
                    Ok(())
                } else {
                    Err(Self::not_found(path))
                }
            }
            Value::Set(_) => Err(Self::not_found(path)),
            other => Err(VabError::TypeMismatch {
                expected: ValueKind::Map,
                found: other.kind(),
            }),
        }
    }

    fn delete_value(&mut self, path: &ElementPath, value: &Value) -> Result<(), VabError> {
        let element = Self::resolve_prefix_mut(&mut self.root, path, path.depth())?;
        match element {
            Value::List(members) | Value::Set(members) => {
                let position = members
                    .iter()
                    .position(|member| member == value)
                    .ok_or_else(|| Self::not_found(path))?;
                members.remove(position);
                Ok(())
            }
            other => Err(VabError::TypeMismatch {
                expected: ValueKind::List,
                found: other.kind(),
            }),
        }
    }

    fn invoke(&mut self, path: &ElementPath, mut params: Vec<Value>) -> Result<Value, VabError> {
        unwrap_typed_params(&mut params);

        let fallback = path.child("invokable");
        let handle = match Self::resolve_prefix(&self.root, path, path.depth())? {
            Value::Function(handle) => handle.clone(),
            _ => match Self::resolve_prefix(&self.root, &fallback, fallback.depth()) {
                Ok(Value::Function(handle)) => handle.clone(),
                _ => return Err(VabError::NotInvocable(path.to_string().into())),
            },
        };

        handle.call(&params).map_err(|err| match err {
            failure @ VabError::InvocationFailure(_) => failure,
            other => VabError::InvocationFailure(other.to_string().into()),
        })
    }
}
