//! `multipart/form-data` payload generation.
//!
//! [`generate`] assembles the complete request body in memory and returns it
//! together with the boundary token to put in the `Content-Type` header:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="list"; filename="a.png"\r\n
//! Content-Type: image/png\r\n
//! \r\n
//! <bytes>\r\n
//! --<boundary>--\r\n
//! ```

use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::debug;

/// A named binary value (a file or an in-memory image).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlob {
    /// File name sent in the `filename` parameter.
    pub file_name: String,
    /// MIME type; guessed from `file_name` when None.
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl NamedBlob {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The declared MIME type, else a guess from the file name, else
    /// `application/octet-stream`.
    pub fn mime_type(&self) -> String {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

/// One value of a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    /// Plain text, sent UTF-8 encoded.
    Text(String),
    /// A named file.
    File(NamedBlob),
    /// Raw bytes without a name; sent as `filename="blob"`.
    Bytes(Vec<u8>),
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<NamedBlob> for PayloadValue {
    fn from(blob: NamedBlob) -> Self {
        PayloadValue::File(blob)
    }
}

impl From<Vec<u8>> for PayloadValue {
    fn from(bytes: Vec<u8>) -> Self {
        PayloadValue::Bytes(bytes)
    }
}

/// Field name → values, in insertion order.
///
/// Keys keep the position of their first insertion; repeated keys append
/// to the existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadData {
    fields: Vec<(String, Vec<PayloadValue>)>,
}

impl PayloadData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key, vec![value])),
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[PayloadValue])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A random boundary token of the form `----Boundary<16 alphanumerics>`.
pub fn random_boundary() -> String {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("----Boundary{token}")
}

/// Encode `payload` as a `multipart/form-data` body.
///
/// Returns `(body, boundary)`; send the body with
/// `Content-Type: multipart/form-data; boundary=<boundary>`.
pub fn generate(payload: &PayloadData) -> (Vec<u8>, String) {
    let boundary = random_boundary();
    let body = encode_with_boundary(payload, &boundary);
    debug!(
        "Encoded multipart payload: {} bytes, boundary {}",
        body.len(),
        boundary
    );
    (body, boundary)
}

/// Encode `payload` using a caller-chosen boundary.
pub fn encode_with_boundary(payload: &PayloadData, boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    let delimiter = format!("--{boundary}\r\n");

    for (key, values) in payload.fields() {
        for value in values {
            body.extend_from_slice(delimiter.as_bytes());
            match value {
                PayloadValue::Text(text) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(key)
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(text.as_bytes());
                }
                PayloadValue::File(blob) => {
                    write_file_header(&mut body, key, &blob.file_name, &blob.mime_type());
                    body.extend_from_slice(&blob.data);
                }
                PayloadValue::Bytes(bytes) => {
                    write_file_header(&mut body, key, "blob", "application/octet-stream");
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// The full `Content-Type` header value for a boundary.
pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

fn write_file_header(body: &mut Vec<u8>, key: &str, file_name: &str, mime: &str) {
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_quoted(key),
            escape_quoted(file_name),
            mime
        )
        .as_bytes(),
    );
}

// Quoted-string parameters: CR/LF would break the header block, `"` the parameter.
fn escape_quoted(s: &str) -> String {
    s.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}
