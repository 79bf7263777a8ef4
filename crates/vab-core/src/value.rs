//! The VAB object model.
//!
//! Every value exchanged over the bus is a [`Value`]: a closed variant type
//! that always knows its own kind. Typed extraction fails explicitly when the
//! kind disagrees; the only coercion is the documented `Int` to `Float`
//! widening in [`Value::as_float`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::VabError;

/// Kind tag for [`Value`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    List,
    Set,
    Map,
    Function,
}

impl ValueKind {
    /// Lowercase name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Set => "set",
            ValueKind::Map => "map",
            ValueKind::Function => "function",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type FunctionImpl = dyn Fn(&[Value]) -> Result<Value, VabError> + Send + Sync;

/// Callable backend operation stored in a model tree.
///
/// Functions exist only on the side that owns the backend. They are reached
/// through `invoke` and have no JSON form; encoding one is an error.
/// Equality is handle identity.
#[derive(Clone)]
pub struct FunctionHandle(Arc<FunctionImpl>);

impl FunctionHandle {
    /// Wraps a closure as an invocable model element.
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, VabError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Calls the wrapped function with a parameter list.
    ///
    /// # Errors
    ///
    /// Propagates whatever the wrapped function reports.
    pub fn call(&self, params: &[Value]) -> Result<Value, VabError> {
        (self.0)(params)
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FunctionHandle(..)")
    }
}

impl PartialEq for FunctionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A value in the VAB object model.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(SmolStr),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unordered collection of unique members.
    Set(Vec<Value>),
    /// Keyed entries with unique keys.
    Map(IndexMap<SmolStr, Value>),
    /// Invocable backend operation.
    Function(FunctionHandle),
}

impl Value {
    /// An empty map value.
    #[must_use]
    pub fn empty_map() -> Self {
        Value::Map(IndexMap::new())
    }

    /// The kind tag of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
            Value::Map(_) => ValueKind::Map,
            Value::Function(_) => ValueKind::Function,
        }
    }

    fn mismatch(&self, expected: ValueKind) -> VabError {
        VabError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    /// Extracts a boolean.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_bool(&self) -> Result<bool, VabError> {
        match self {
            Value::Bool(value) => Ok(*value),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }

    /// Extracts an integer.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind, floats included.
    pub fn as_int(&self) -> Result<i64, VabError> {
        match self {
            Value::Int(value) => Ok(*value),
            other => Err(other.mismatch(ValueKind::Int)),
        }
    }

    /// Extracts a float. Integers widen losslessly up to 2^53.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for non-numeric kinds.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Result<f64, VabError> {
        match self {
            Value::Float(value) => Ok(*value),
            Value::Int(value) => Ok(*value as f64),
            other => Err(other.mismatch(ValueKind::Float)),
        }
    }

    /// Extracts text.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_str(&self) -> Result<&str, VabError> {
        match self {
            Value::String(value) => Ok(value.as_str()),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    /// Borrows the elements of a list.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_list(&self) -> Result<&[Value], VabError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::List)),
        }
    }

    /// Mutably borrows the elements of a list.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_list_mut(&mut self) -> Result<&mut Vec<Value>, VabError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::List)),
        }
    }

    /// Borrows the members of a set.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_set(&self) -> Result<&[Value], VabError> {
        match self {
            Value::Set(members) => Ok(members),
            other => Err(other.mismatch(ValueKind::Set)),
        }
    }

    /// Borrows the entries of a map.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_map(&self) -> Result<&IndexMap<SmolStr, Value>, VabError> {
        match self {
            Value::Map(entries) => Ok(entries),
            other => Err(other.mismatch(ValueKind::Map)),
        }
    }

    /// Mutably borrows the entries of a map.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_map_mut(&mut self) -> Result<&mut IndexMap<SmolStr, Value>, VabError> {
        match self {
            Value::Map(entries) => Ok(entries),
            other => Err(other.mismatch(ValueKind::Map)),
        }
    }

    /// Borrows the function handle.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other kind.
    pub fn as_function(&self) -> Result<&FunctionHandle, VabError> {
        match self {
            Value::Function(handle) => Ok(handle),
            other => Err(other.mismatch(ValueKind::Function)),
        }
    }

    /// Inserts a map entry, returning the previous value for the key.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when this value is not a map.
    pub fn insert(
        &mut self,
        key: impl Into<SmolStr>,
        value: Value,
    ) -> Result<Option<Value>, VabError> {
        Ok(self.as_map_mut()?.insert(key.into(), value))
    }

    /// Looks up a map entry by key.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when this value is not a map, `KeyNotFound` when the
    /// key is absent.
    pub fn get(&self, key: &str) -> Result<&Value, VabError> {
        self.as_map()?
            .get(key)
            .ok_or_else(|| VabError::KeyNotFound(key.into()))
    }

    /// Whether a map contains a key.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when this value is not a map.
    pub fn contains(&self, key: &str) -> Result<bool, VabError> {
        Ok(self.as_map()?.contains_key(key))
    }

    /// Indexes into a list.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when this value is not a list, `IndexOutOfRange` past
    /// the end.
    pub fn at(&self, index: usize) -> Result<&Value, VabError> {
        let items = self.as_list()?;
        items.get(index).ok_or(VabError::IndexOutOfRange {
            index,
            len: items.len(),
        })
    }

    /// Appends to a list.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when this value is not a list.
    pub fn push(&mut self, value: Value) -> Result<(), VabError> {
        self.as_list_mut()?.push(value);
        Ok(())
    }

    /// Inserts a set member. Inserting an existing member is a no-op;
    /// returns whether the member was newly added.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when this value is not a set.
    pub fn insert_member(&mut self, value: Value) -> Result<bool, VabError> {
        match self {
            Value::Set(members) => {
                if members.contains(&value) {
                    Ok(false)
                } else {
                    members.push(value);
                    Ok(true)
                }
            }
            other => Err(other.mismatch(ValueKind::Set)),
        }
    }

    /// Encodes this value in the canonical JSON mapping.
    ///
    /// Sets encode as arrays; their member order is not part of the value.
    ///
    /// # Errors
    ///
    /// `NotSerializable` for functions and non-finite floats.
    pub fn to_json(&self) -> Result<serde_json::Value, VabError> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(value) => Ok(serde_json::Value::Bool(*value)),
            Value::Int(value) => Ok(serde_json::Value::Number((*value).into())),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .ok_or_else(|| VabError::NotSerializable("non-finite number".into())),
            Value::String(value) => Ok(serde_json::Value::String(value.to_string())),
            Value::List(items) | Value::Set(items) => Ok(serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Map(entries) => {
                let mut object = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    object.insert(key.to_string(), value.to_json()?);
                }
                Ok(serde_json::Value::Object(object))
            }
            Value::Function(_) => Err(VabError::NotSerializable("function".into())),
        }
    }

    /// Decodes a value from the canonical JSON mapping.
    ///
    /// Integral numbers decode as `Int`, all others as `Float`. Arrays
    /// decode as `List`; a backend that models a set re-establishes set
    /// identity itself, the wire form does not carry it.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => number.as_i64().map_or_else(
                || Value::Float(number.as_f64().unwrap_or_default()),
                Value::Int,
            ),
            serde_json::Value::String(value) => Value::String(SmolStr::new(value)),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::Map(
                object
                    .iter()
                    .map(|(key, value)| (SmolStr::new(key), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Encodes this value as JSON text.
    ///
    /// # Errors
    ///
    /// `NotSerializable` for functions and non-finite floats.
    pub fn to_json_text(&self) -> Result<String, VabError> {
        let json = self.to_json()?;
        serde_json::to_string(&json)
            .map_err(|err| VabError::NotSerializable(format!("json: {err}").into()))
    }

    /// Decodes a value from JSON text.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when the text is not valid JSON.
    pub fn from_json_text(text: &str) -> Result<Self, VabError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| VabError::MalformedFrame(format!("invalid json: {err}").into()))?;
        Ok(Self::from_json(&json))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Sets compare as unordered members.
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|member| b.contains(member))
            }
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(SmolStr::new(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(SmolStr::new(value))
    }
}

impl From<SmolStr> for Value {
    fn from(value: SmolStr) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<SmolStr, Value>> for Value {
    fn from(entries: IndexMap<SmolStr, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<FunctionHandle> for Value {
    fn from(handle: FunctionHandle) -> Self {
        Value::Function(handle)
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn sample_map() -> Value {
        let mut map = Value::empty_map();
        map.insert("name", Value::from("motor")).unwrap();
        map.insert("speed", Value::from(1500)).unwrap();
        map.insert(
            "tags",
            Value::List(vec![Value::from("a"), Value::from("b")]),
        )
        .unwrap();
        map
    }

    #[test]
    fn kind_query() {
        assert_eq!(Value::Null.kind(), ValueKind::Null);
        assert_eq!(Value::from(3).kind(), ValueKind::Int);
        assert_eq!(Value::from(3.5).kind(), ValueKind::Float);
        assert_eq!(sample_map().kind(), ValueKind::Map);
    }

    #[test]
    fn typed_extraction_fails_across_kinds() {
        let err = Value::from("text").as_int().unwrap_err();
        assert_eq!(
            err,
            VabError::TypeMismatch {
                expected: ValueKind::Int,
                found: ValueKind::String,
            }
        );
        assert_eq!(err.to_string(), "type mismatch (expected int, found string)");
    }

    #[test]
    fn float_widens_int_only() {
        assert_eq!(Value::from(2).as_float().unwrap(), 2.0);
        assert!(Value::from(2.5).as_int().is_err());
    }

    #[test]
    fn map_ops() {
        let mut map = sample_map();
        assert_eq!(map.get("speed").unwrap(), &Value::from(1500));
        assert!(map.contains("name").unwrap());
        assert!(!map.contains("missing").unwrap());
        assert_eq!(
            map.get("missing").unwrap_err(),
            VabError::KeyNotFound("missing".into())
        );
        let previous = map.insert("speed", Value::from(0)).unwrap();
        assert_eq!(previous, Some(Value::from(1500)));
    }

    #[test]
    fn list_index_bounds() {
        let list = Value::List(vec![Value::from(1), Value::from(2)]);
        assert_eq!(list.at(1).unwrap(), &Value::from(2));
        assert_eq!(
            list.at(5).unwrap_err(),
            VabError::IndexOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn set_uniqueness_and_equality() {
        let mut set = Value::Set(Vec::new());
        assert!(set.insert_member(Value::from(1)).unwrap());
        assert!(set.insert_member(Value::from(2)).unwrap());
        assert!(!set.insert_member(Value::from(1)).unwrap());
        assert_eq!(set.as_set().unwrap().len(), 2);

        let reordered = Value::Set(vec![Value::from(2), Value::from(1)]);
        assert_eq!(set, reordered);
        assert_ne!(set, Value::Set(vec![Value::from(1)]));
    }

    #[test]
    fn function_equality_is_identity() {
        let f = FunctionHandle::new(|_| Ok(Value::Null));
        let g = FunctionHandle::new(|_| Ok(Value::Null));
        assert_eq!(Value::Function(f.clone()), Value::Function(f.clone()));
        assert_ne!(Value::Function(f), Value::Function(g));
    }

    #[test]
    fn json_round_trip() {
        let value = sample_map();
        let decoded = Value::from_json(&value.to_json().unwrap());
        assert_eq!(decoded, value);

        let text = value.to_json_text().unwrap();
        assert_eq!(Value::from_json_text(&text).unwrap(), value);
    }

    #[test]
    fn json_text_layout() {
        expect![[r#"{"name":"motor","speed":1500,"tags":["a","b"]}"#]]
            .assert_eq(&sample_map().to_json_text().unwrap());

        let mixed = Value::List(vec![
            Value::Null,
            Value::from(true),
            Value::from(2),
            Value::from(2.5),
            Value::from("t"),
        ]);
        expect![[r#"[null,true,2,2.5,"t"]"#]].assert_eq(&mixed.to_json_text().unwrap());
    }

    #[test]
    fn json_number_mapping() {
        assert_eq!(Value::from_json_text("7").unwrap(), Value::from(7));
        assert_eq!(Value::from_json_text("7.5").unwrap(), Value::from(7.5));
        assert_eq!(
            Value::from(7).to_json_text().unwrap(),
            "7",
        );
    }

    #[test]
    fn set_encodes_as_array_members_survive() {
        let mut set = Value::Set(Vec::new());
        set.insert_member(Value::from("x")).unwrap();
        set.insert_member(Value::from("y")).unwrap();
        let decoded = Value::from_json(&set.to_json().unwrap());
        let members = decoded.as_list().unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.contains(&Value::from("x")));
        assert!(members.contains(&Value::from("y")));
    }

    #[test]
    fn function_has_no_json_form() {
        let function = Value::Function(FunctionHandle::new(|_| Ok(Value::Null)));
        assert_eq!(
            function.to_json().unwrap_err(),
            VabError::NotSerializable("function".into())
        );
        let mut map = Value::empty_map();
        map.insert("op", function).unwrap();
        assert!(map.to_json().is_err());
    }

    #[test]
    fn non_finite_float_rejected() {
        assert!(Value::from(f64::NAN).to_json().is_err());
        assert!(Value::from(f64::INFINITY).to_json_text().is_err());
    }

    #[test]
    fn invalid_json_text_is_malformed() {
        assert!(matches!(
            Value::from_json_text("{not json").unwrap_err(),
            VabError::MalformedFrame(_)
        ));
    }
}
