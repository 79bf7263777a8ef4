//! Wire frame codec.
//!
//! A frame travels as a length-delimited record:
//!
//! ```text
//! record   = [u32 body-len] body              (little-endian lengths)
//! request  = [u8 opcode] [u32 len] path ([u32 len] payload)?
//! response = [u8 result-flag] [u32 len] payload
//! ```
//!
//! Payloads are JSON text; responses wrap their value under an `"entity"`
//! key, error responses carry the error message the same way. Get and
//! simple-delete requests have no payload field at all; on opcode `0x04`
//! the presence of the payload selects delete-by-value.

use smol_str::SmolStr;
use vab_core::{VabError, Value};

/// Default size of a single read on either side of the connection.
pub const DEFAULT_FRAME_BUFFER: usize = 4096;

/// Wire operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read the element at a path.
    Get,
    /// Overwrite the element at a path.
    Set,
    /// Create a new element at a path.
    Create,
    /// Delete the element at a path.
    DeleteSimple,
    /// Delete a matching member from the collection at a path.
    DeleteComplex,
    /// Invoke the function at a path.
    Invoke,
}

impl Operation {
    // Both delete variants share one opcode; payload presence picks the
    // variant on decode.
    fn opcode(self) -> u8 {
        match self {
            Operation::Get => 0x01,
            Operation::Set => 0x02,
            Operation::Create => 0x03,
            Operation::DeleteSimple | Operation::DeleteComplex => 0x04,
            Operation::Invoke => 0x05,
        }
    }

    /// Lowercase operation name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Create => "create",
            Operation::DeleteSimple => "delete",
            Operation::DeleteComplex => "delete-value",
            Operation::Invoke => "invoke",
        }
    }
}

/// A request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    operation: Operation,
    path: String,
    payload: Option<String>,
}

impl Frame {
    /// Get request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            operation: Operation::Get,
            path: path.into(),
            payload: None,
        }
    }

    /// Set request carrying the new value.
    ///
    /// # Errors
    ///
    /// `NotSerializable` when the value has no JSON form.
    pub fn set(path: impl Into<String>, value: &Value) -> Result<Self, VabError> {
        Ok(Self {
            operation: Operation::Set,
            path: path.into(),
            payload: Some(value.to_json_text()?),
        })
    }

    /// Create request carrying the new value.
    ///
    /// # Errors
    ///
    /// `NotSerializable` when the value has no JSON form.
    pub fn create(path: impl Into<String>, value: &Value) -> Result<Self, VabError> {
        Ok(Self {
            operation: Operation::Create,
            path: path.into(),
            payload: Some(value.to_json_text()?),
        })
    }

    /// Simple delete request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            operation: Operation::DeleteSimple,
            path: path.into(),
            payload: None,
        }
    }

    /// Delete-by-value request.
    ///
    /// # Errors
    ///
    /// `NotSerializable` when the value has no JSON form.
    pub fn delete_value(path: impl Into<String>, value: &Value) -> Result<Self, VabError> {
        Ok(Self {
            operation: Operation::DeleteComplex,
            path: path.into(),
            payload: Some(value.to_json_text()?),
        })
    }

    /// Invoke request. A single parameter is sent plain, several are sent
    /// as an array; an empty list is an empty array.
    ///
    /// # Errors
    ///
    /// `NotSerializable` when a parameter has no JSON form.
    pub fn invoke(path: impl Into<String>, params: &[Value]) -> Result<Self, VabError> {
        let payload = match params {
            [single] => single.to_json_text()?,
            many => Value::List(many.to_vec()).to_json_text()?,
        };
        Ok(Self {
            operation: Operation::Invoke,
            path: path.into(),
            payload: Some(payload),
        })
    }

    /// The requested operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The addressed path in text form.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw JSON payload text, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Decodes the payload into a value.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when the payload is not valid JSON.
    pub fn payload_value(&self) -> Result<Option<Value>, VabError> {
        self.payload
            .as_deref()
            .map(Value::from_json_text)
            .transpose()
    }

    /// Encodes the full record, length prefix included.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when a field exceeds the wire's length range.
    pub fn encode(&self) -> Result<Vec<u8>, VabError> {
        let mut body = Vec::with_capacity(
            1 + 4 + self.path.len() + self.payload.as_ref().map_or(0, |p| 4 + p.len()),
        );
        body.push(self.operation.opcode());
        push_field(&mut body, self.path.as_bytes())?;
        if let Some(payload) = &self.payload {
            push_field(&mut body, payload.as_bytes())?;
        }
        finish_record(body)
    }

    /// Decodes a record body (without the outer length prefix).
    ///
    /// # Errors
    ///
    /// `MalformedFrame` for truncated fields, trailing bytes, unknown
    /// opcodes and operation/payload mismatches.
    pub fn decode(body: &[u8]) -> Result<Self, VabError> {
        let opcode = *body.first().ok_or_else(|| VabError::malformed("empty frame"))?;
        let (path_bytes, cursor) = take_field(body, 1)?;
        let path = std::str::from_utf8(path_bytes)
            .map_err(|_| VabError::malformed("path is not utf-8"))?
            .to_owned();

        let payload = if cursor == body.len() {
            None
        } else {
            let (payload_bytes, end) = take_field(body, cursor)?;
            if end != body.len() {
                return Err(VabError::malformed("trailing bytes after payload"));
            }
            let text = std::str::from_utf8(payload_bytes)
                .map_err(|_| VabError::malformed("payload is not utf-8"))?;
            Some(text.to_owned())
        };

        let operation = match (opcode, payload.is_some()) {
            (0x01, false) => Operation::Get,
            (0x01, true) => return Err(VabError::malformed("unexpected payload for get")),
            (0x02, true) => Operation::Set,
            (0x02, false) => return Err(VabError::malformed("set requires a payload")),
            (0x03, true) => Operation::Create,
            (0x03, false) => return Err(VabError::malformed("create requires a payload")),
            (0x04, false) => Operation::DeleteSimple,
            (0x04, true) => Operation::DeleteComplex,
            (0x05, true) => Operation::Invoke,
            (0x05, false) => return Err(VabError::malformed("invoke requires a payload")),
            (other, _) => {
                return Err(VabError::MalformedFrame(
                    format!("unknown operation 0x{other:02x}").into(),
                ))
            }
        };

        Ok(Self {
            operation,
            path,
            payload,
        })
    }
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    flag: u8,
    payload: Option<String>,
}

impl Response {
    /// Success response, with the value wrapped under `"entity"` when one
    /// is carried.
    ///
    /// # Errors
    ///
    /// `NotSerializable` when the value has no JSON form.
    pub fn ok(value: Option<&Value>) -> Result<Self, VabError> {
        let payload = value.map(wrap_entity).transpose()?;
        Ok(Self { flag: 0, payload })
    }

    /// Error response carrying a message under `"entity"`.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            flag: 1,
            payload: Some(wrap_entity_text(message)),
        }
    }

    /// Whether the result flag signals success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.flag == 0
    }

    /// The raw result flag.
    #[must_use]
    pub fn flag(&self) -> u8 {
        self.flag
    }

    /// The raw JSON payload text, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Unwraps the `"entity"` payload into a value.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when the payload is not an `"entity"` wrapper.
    pub fn entity(&self) -> Result<Option<Value>, VabError> {
        let Some(text) = self.payload.as_deref() else {
            return Ok(None);
        };
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| VabError::MalformedFrame(format!("invalid json: {err}").into()))?;
        let entity = json
            .as_object()
            .and_then(|object| object.get("entity"))
            .ok_or_else(|| VabError::malformed("payload without entity wrapper"))?;
        Ok(Some(Value::from_json(entity)))
    }

    /// The error message of an error response, best effort.
    #[must_use]
    pub fn error_text(&self) -> SmolStr {
        match self.entity() {
            Ok(Some(Value::String(message))) => message,
            Ok(Some(other)) => other
                .to_json_text()
                .map_or_else(|_| SmolStr::new("unspecified error"), SmolStr::from),
            _ => SmolStr::new("unspecified error"),
        }
    }

    /// Encodes the full record, length prefix included. The payload field
    /// is always present, zero-length when empty.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when the payload exceeds the wire's length range.
    pub fn encode(&self) -> Result<Vec<u8>, VabError> {
        let payload = self.payload.as_deref().unwrap_or_default();
        let mut body = Vec::with_capacity(1 + 4 + payload.len());
        body.push(self.flag);
        push_field(&mut body, payload.as_bytes())?;
        finish_record(body)
    }

    /// Decodes a record body (without the outer length prefix).
    ///
    /// # Errors
    ///
    /// `MalformedFrame` for truncated fields or trailing bytes.
    pub fn decode(body: &[u8]) -> Result<Self, VabError> {
        let flag = *body
            .first()
            .ok_or_else(|| VabError::malformed("empty response"))?;
        let (payload_bytes, end) = take_field(body, 1)?;
        if end != body.len() {
            return Err(VabError::malformed("trailing bytes after payload"));
        }
        let payload = if payload_bytes.is_empty() {
            None
        } else {
            let text = std::str::from_utf8(payload_bytes)
                .map_err(|_| VabError::malformed("payload is not utf-8"))?;
            Some(text.to_owned())
        };
        Ok(Self { flag, payload })
    }
}

/// Splits the next complete record off the front of `buffer`.
///
/// Returns the record body and the total bytes consumed (prefix included),
/// or `None` while the buffer holds no full record yet.
///
/// # Errors
///
/// `MalformedFrame` when the advertised body length exceeds `max`.
pub fn split_record(buffer: &[u8], max: usize) -> Result<Option<(&[u8], usize)>, VabError> {
    let Some(len) = read_u32_le(buffer, 0) else {
        return Ok(None);
    };
    let len = len as usize;
    if len > max {
        return Err(VabError::MalformedFrame(
            format!("frame of {len} bytes exceeds the {max} byte limit").into(),
        ));
    }
    let end = 4 + len;
    Ok(buffer.get(4..end).map(|body| (body, end)))
}

fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    let chunk = bytes.get(at..)?.first_chunk::<4>()?;
    Some(u32::from_le_bytes(*chunk))
}

fn take_field(bytes: &[u8], at: usize) -> Result<(&[u8], usize), VabError> {
    let len =
        read_u32_le(bytes, at).ok_or_else(|| VabError::malformed("field length truncated"))?;
    let start = at + 4;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| VabError::malformed("field length overflow"))?;
    let field = bytes
        .get(start..end)
        .ok_or_else(|| VabError::malformed("field data truncated"))?;
    Ok((field, end))
}

fn push_field(body: &mut Vec<u8>, field: &[u8]) -> Result<(), VabError> {
    let len = u32::try_from(field.len()).map_err(|_| VabError::malformed("field too long"))?;
    body.extend_from_slice(&len.to_le_bytes());
    body.extend_from_slice(field);
    Ok(())
}

fn finish_record(body: Vec<u8>) -> Result<Vec<u8>, VabError> {
    let len = u32::try_from(body.len()).map_err(|_| VabError::malformed("frame too long"))?;
    let mut record = Vec::with_capacity(4 + body.len());
    record.extend_from_slice(&len.to_le_bytes());
    record.extend(body);
    Ok(record)
}

fn wrap_entity(value: &Value) -> Result<String, VabError> {
    let mut object = serde_json::Map::with_capacity(1);
    object.insert("entity".to_owned(), value.to_json()?);
    serde_json::to_string(&serde_json::Value::Object(object))
        .map_err(|err| VabError::NotSerializable(format!("json: {err}").into()))
}

fn wrap_entity_text(message: &str) -> String {
    let mut object = serde_json::Map::with_capacity(1);
    object.insert(
        "entity".to_owned(),
        serde_json::Value::String(message.to_owned()),
    );
    serde_json::Value::Object(object).to_string()
}
