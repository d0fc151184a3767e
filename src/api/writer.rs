use std::io::{self, Write};

use http::{HeaderMap, StatusCode};
use tracing::debug;

/// Synchronous response sink in the shape of a classic `ResponseWriter`.
///
/// Headers are collected in `headers_mut` and take effect when
/// `write_header` is called; writing body bytes first implies `200 OK`.
pub trait ResponseWriter: Write {
    fn headers_mut(&mut self) -> &mut HeaderMap;
    fn write_header(&mut self, status: StatusCode);
}

/// In-memory [`ResponseWriter`] that records what was written.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded status, `200` when nothing was written.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn into_response(self) -> http::Response<Vec<u8>> {
        let status = self.status();
        let mut response = http::Response::new(self.body);
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        match self.status {
            Some(first) => debug!(first = %first, ignored = %status, "Superfluous write_header"),
            None => self.status = Some(status),
        }
    }
}

impl Write for ResponseRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_write_header_wins() {
        let mut rec = ResponseRecorder::new();
        rec.write_header(StatusCode::CREATED);
        rec.write_header(StatusCode::BAD_REQUEST);
        assert_eq!(rec.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_body_write_implies_ok() {
        let mut rec = ResponseRecorder::new();
        rec.write_all(b"hi").unwrap();
        rec.write_header(StatusCode::NOT_FOUND);
        let res = rec.into_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), b"hi");
    }
}
