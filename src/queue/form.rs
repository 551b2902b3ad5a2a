//! Stored representation of an upload body.
//!
//! A multipart body is kept as an ordered list of fields, each a name plus
//! either text or file bytes. `decode_multipart` and `encode_multipart` are
//! the two halves of the contract: decoding what the page sent and encoding
//! it again, with a fresh boundary, at replay time.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

/// serde helper storing bytes as base64 text
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Value of one form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldValue {
    Text {
        value: String,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(flatten)]
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text {
                value: value.into(),
            },
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::File {
                file_name: Some(file_name.into()),
                content_type: Some(content_type.into()),
                data: data.into(),
            },
        }
    }
}

/// Ordered multipart fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields(pub Vec<FormField>);

impl FormFields {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self(fields)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormField> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode a `multipart/form-data` body, keeping field order
    pub async fn decode_multipart(content_type: &str, body: Bytes) -> Result<Self, FormError> {
        let boundary = multer::parse_boundary(content_type)?;
        let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await?;

            let value = match (file_name, content_type) {
                (None, None) => match String::from_utf8(data.to_vec()) {
                    Ok(value) => FieldValue::Text { value },
                    Err(e) => FieldValue::File {
                        file_name: None,
                        content_type: None,
                        data: e.into_bytes(),
                    },
                },
                (file_name, content_type) => FieldValue::File {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                },
            };
            fields.push(FormField { name, value });
        }

        Ok(Self(fields))
    }

    /// Encode as a `multipart/form-data` body delimited by `boundary`
    pub fn encode_multipart(&self, boundary: &str) -> Bytes {
        let mut out = BytesMut::new();
        for field in &self.0 {
            out.put_slice(format!("--{}\r\n", boundary).as_bytes());
            let mut disposition =
                format!("Content-Disposition: form-data; name=\"{}\"", escape_quoted(&field.name));
            match &field.value {
                FieldValue::Text { value } => {
                    out.put_slice(disposition.as_bytes());
                    out.put_slice(b"\r\n\r\n");
                    out.put_slice(value.as_bytes());
                }
                FieldValue::File {
                    file_name,
                    content_type,
                    data,
                } => {
                    if let Some(file_name) = file_name {
                        disposition
                            .push_str(&format!("; filename=\"{}\"", escape_quoted(file_name)));
                    }
                    out.put_slice(disposition.as_bytes());
                    out.put_slice(b"\r\n");
                    let content_type = content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream");
                    out.put_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
                    out.put_slice(data);
                }
            }
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("--{}--\r\n", boundary).as_bytes());
        out.freeze()
    }
}

/// `Content-Type` header value for a multipart body with this boundary
pub fn multipart_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={}", boundary)
}

/// Fresh boundary for a re-encoded body
pub fn new_boundary() -> String {
    format!("offline-agent-{}", uuid::Uuid::new_v4().simple())
}

// Same escaping browsers apply to names and filenames in form-data
fn escape_quoted(s: &str) -> String {
    s.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
