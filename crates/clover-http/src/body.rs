//! Request bodies.
//!
//! Every body is turned into a byte buffer before it is signed and sent, so
//! the signature always covers exactly the bytes on the wire.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use clover_core::CloverError;

/// The accepted body shapes for a POST.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Bytes(Vec<u8>),
    /// Encoded as UTF-8.
    Text(String),
    /// Encoded as compact JSON.
    Json(Value),
    Multipart(Multipart),
}

impl RequestBody {
    /// Serialize a structured object up front.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, CloverError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// The content type implied by the body itself, if any.
    pub fn implied_content_type(&self) -> Option<String> {
        match self {
            Self::Multipart(m) => Some(m.content_type()),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, CloverError> {
        match self {
            Self::Bytes(b) => Ok(b),
            Self::Text(s) => Ok(s.into_bytes()),
            Self::Json(v) => Ok(serde_json::to_vec(&v)?),
            Self::Multipart(m) => {
                let mut buf = Vec::new();
                m.write_to(&mut buf);
                Ok(buf)
            }
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for RequestBody {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Value> for RequestBody {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<Multipart> for RequestBody {
    fn from(m: Multipart) -> Self {
        Self::Multipart(m)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// A `multipart/form-data` payload, rendered into a buffer before sending.
#[derive(Debug, Clone, PartialEq)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Empty payload with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Add a plain text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    /// Add a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data,
        });
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for part in &self.parts {
            buf.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!(
                "Content-Disposition: form-data; name=\"{}\"",
                escape_param(&part.name)
            );
            if let Some(file_name) = &part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", escape_param(file_name)));
            }
            buf.extend_from_slice(disposition.as_bytes());
            buf.extend_from_slice(b"\r\n");
            if let Some(ct) = &part.content_type {
                buf.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(&part.data);
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
    }
}

/// Percent-encode the characters that would end a quoted header parameter
/// or the header line itself, the way browsers encode form field names.
fn escape_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("%22"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
    out
}
