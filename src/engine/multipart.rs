//! `multipart/form-data` parsing for request bodies.
//!
//! ```text
//! --boundary\r\n
//! Content-Disposition: form-data; name="field1"\r\n
//! \r\n
//! value1\r\n
//! --boundary\r\n
//! Content-Disposition: form-data; name="file"; filename="example.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! file contents...\r\n
//! --boundary--\r\n
//! ```
//!
//! Parts with a `filename` become [`FilePart`]s, everything else is a text
//! value. Both keep the order they appeared in on the wire.

use std::fmt;
use std::io;

/// Errors that can occur while parsing a multipart body.
#[derive(Debug)]
pub enum MultipartError {
    /// Content-Type is not `multipart/form-data`.
    NotMultipart,
    /// No `boundary=` parameter in the Content-Type header.
    MissingBoundary,
    /// A part has no Content-Disposition header, or it lacks `name=`.
    MissingContentDisposition,
    /// The body ended before the closing boundary.
    UnexpectedEof,
    /// Structural error in the body.
    InvalidFormat {
        /// What was wrong
        detail: &'static str,
    },
    /// Draining a streamed body failed.
    Io(io::Error),
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMultipart => write!(f, "request content type is not multipart/form-data"),
            Self::MissingBoundary => write!(f, "missing boundary in multipart Content-Type"),
            Self::MissingContentDisposition => {
                write!(f, "missing or invalid Content-Disposition header in part")
            }
            Self::UnexpectedEof => write!(f, "unexpected end of multipart data"),
            Self::InvalidFormat { detail } => write!(f, "invalid multipart format: {detail}"),
            Self::Io(err) => write!(f, "failed to read multipart body: {err}"),
        }
    }
}

impl std::error::Error for MultipartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field_name: String,
    /// Client-supplied filename.
    pub filename: String,
    /// Content-Type of the part, `application/octet-stream` when absent.
    pub content_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// Parsed multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Text fields in wire order. Repeated names appear repeatedly.
    pub values: Vec<(String, String)>,
    /// File parts in wire order.
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// First text value for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All text values for `name`, in order.
    pub fn values_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First file uploaded under `name`.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.field_name == name)
    }
}

/// Extract the boundary from a `multipart/form-data; boundary=...` Content-Type.
pub fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or("").trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }
    for param in params {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() {
                return Err(MultipartError::MissingBoundary);
            }
            return Ok(boundary.to_string());
        }
    }
    Err(MultipartError::MissingBoundary)
}

/// Parse a complete multipart body.
pub fn parse_form(content_type: &str, body: &[u8]) -> Result<MultipartForm, MultipartError> {
    let boundary = parse_boundary(content_type)?;
    let delimiter = format!("--{boundary}").into_bytes();
    let mut form = MultipartForm::default();

    let mut pos = find(body, &delimiter, 0).ok_or(MultipartError::UnexpectedEof)?;
    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            return Ok(form);
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(if body.len() < pos + 2 {
                MultipartError::UnexpectedEof
            } else {
                MultipartError::InvalidFormat {
                    detail: "expected CRLF after boundary",
                }
            });
        }
        pos += 2;

        let header_end = find(body, b"\r\n\r\n", pos).ok_or(MultipartError::UnexpectedEof)?;
        let head = std::str::from_utf8(&body[pos..header_end]).map_err(|_| {
            MultipartError::InvalidFormat {
                detail: "part headers are not UTF-8",
            }
        })?;
        let part = PartHead::parse(head)?;
        pos = header_end + 4;

        let next = find(body, &delimiter, pos).ok_or(MultipartError::UnexpectedEof)?;
        let data_end = if next >= pos + 2 && &body[next - 2..next] == b"\r\n" {
            next - 2
        } else {
            next
        };
        let data = &body[pos..data_end];

        match part.filename {
            Some(filename) => form.files.push(FilePart {
                field_name: part.name,
                filename,
                content_type: part
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                data: data.to_vec(),
            }),
            None => form
                .values
                .push((part.name, String::from_utf8_lossy(data).into_owned())),
        }
        pos = next;
    }
}

struct PartHead {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
}

impl PartHead {
    fn parse(head: &str) -> Result<Self, MultipartError> {
        let mut disposition = None;
        let mut content_type = None;
        for line in head.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-disposition") {
                disposition = Some(value.trim());
            } else if name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }

        let disposition = disposition.ok_or(MultipartError::MissingContentDisposition)?;
        let mut name = None;
        let mut filename = None;
        for param in disposition.split(';').skip(1) {
            if let Some((key, value)) = param.trim().split_once('=') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => name = Some(value),
                    "filename" => filename = Some(value),
                    _ => {}
                }
            }
        }

        Ok(Self {
            name: name.ok_or(MultipartError::MissingContentDisposition)?,
            filename,
            content_type,
        })
    }
}

fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + start)
}
