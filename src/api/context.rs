use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Instant;

use super::operation::{Operation, ProtoVersion, TlsConnectionState};
use crate::context::Context;
use crate::engine::{Ctx, MultipartError, MultipartForm};

/// Request/response contract operation handlers are written against.
///
/// Implementations are built per request and must not outlive it. Every
/// response-side call lands on the underlying response immediately; there is
/// no staging or commit step.
pub trait ApiContext {
    /// Operation this request was routed to.
    fn operation(&self) -> &Operation;

    /// Route template that matched, in the engine's syntax.
    fn matched(&self) -> &str;

    /// Request-scoped values, deadline and cancellation.
    fn context(&self) -> Arc<dyn Context>;

    fn method(&self) -> &str;
    fn host(&self) -> &str;
    fn remote_addr(&self) -> String;

    /// Request target as a URI (path and query).
    fn url(&self) -> http::Uri;

    /// Path parameter, empty when absent.
    fn param(&self, name: &str) -> &str;

    /// Query parameter, empty when absent.
    fn query(&self, name: &str) -> String;

    /// Request header, empty when absent.
    fn header(&self, name: &str) -> &str;

    /// Call `cb` once per request header value in wire order. Repeated
    /// headers are not merged.
    fn each_header(&self, cb: &mut dyn FnMut(&str, &str));

    /// Request body. Live when the engine streams bodies, otherwise a
    /// single-pass reader over the buffered bytes.
    fn body_reader(&mut self) -> Box<dyn Read + '_>;

    fn multipart_form(&mut self) -> Result<MultipartForm, MultipartError>;

    /// Ask for reads of the request body to stop at `deadline`. Implementations
    /// may not be able to enforce this; callers must not assume they do.
    fn set_read_deadline(&mut self, deadline: Instant) -> io::Result<()>;

    fn set_status(&mut self, code: u16);

    /// Status last passed to [`set_status`](ApiContext::set_status), `0` if never set.
    fn status(&self) -> u16;

    /// Add a response header value, keeping existing values.
    fn append_header(&mut self, name: &str, value: &str);

    /// Replace every response header value under `name`.
    fn set_header(&mut self, name: &str, value: &str);

    /// Response body sink.
    fn body_writer(&mut self) -> &mut dyn Write;

    /// `Some` only when the request arrived over TLS. See [`TlsConnectionState`].
    fn tls(&self) -> Option<TlsConnectionState>;

    fn version(&self) -> ProtoVersion;

    /// Native engine context behind this one, if it has one.
    fn native_ctx(&mut self) -> Option<&mut dyn Ctx> {
        None
    }
}
