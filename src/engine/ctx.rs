//! Native per-request context.
//!
//! [`NativeState`] holds everything the engine knows about one request and the
//! response being built for it. States are pooled by [`App`](super::App): a
//! state is reset and handed to the next request once the previous one has
//! been flushed, so nothing may hold on to it past the handler's return.
//!
//! [`DefaultCtx`] is the borrow handlers see. Its lifetime `'r` is the lifetime
//! of that single request cycle, which makes "do not retain the context" a
//! compile-time property rather than a convention.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use super::app::Route;
use super::config::EngineConfig;
use super::locals::Locals;
use super::multipart::{self, MultipartError, MultipartForm};
use super::radix::ParamVec;
use crate::context::{Key, Value};

/// Native request context, as seen by route handlers and middleware.
pub trait Ctx {
    /// Configuration of the engine serving this request.
    fn app(&self) -> &EngineConfig;

    /// Request method, e.g. `GET`.
    fn method(&self) -> &str;

    /// Template of the matched route in engine syntax (`/items/:id`), empty
    /// when no route matched.
    fn route_path(&self) -> &str;

    /// `Host` header value.
    fn hostname(&self) -> &str;

    /// Remote IP address, empty when the transport does not report it.
    fn ip(&self) -> String;

    /// Raw request target as received, path plus query.
    fn request_uri(&self) -> &str;

    /// Request path without the query string.
    fn path(&self) -> &str;

    /// Path parameter captured by the route, empty when absent.
    fn params(&self, name: &str) -> &str;

    /// First query parameter named `name`, percent-decoded, empty when absent.
    fn query(&self, name: &str) -> String;

    /// First request header named `name` (case-insensitive), empty when absent.
    fn get(&self, name: &str) -> &str;

    /// Visit request headers in wire order. Repeated headers are visited once per value.
    fn visit_request_headers(&self, f: &mut dyn FnMut(&str, &str));

    /// Buffered request body. Empty in streaming mode.
    fn body_raw(&self) -> &[u8];

    /// Live body stream. `Some` only in streaming mode, and only on the first call.
    fn body_stream(&mut self) -> Option<Box<dyn Read + '_>>;

    /// Parse the body as `multipart/form-data`.
    fn multipart_form(&mut self) -> Result<MultipartForm, MultipartError>;

    /// Set the response status code.
    fn status(&mut self, code: u16);

    /// Response status code currently set.
    fn response_status(&self) -> u16;

    /// Add a response header value, keeping existing values under that name.
    fn append(&mut self, name: &str, value: &str);

    /// Replace every response header value under `name` with `value`.
    fn set(&mut self, name: &str, value: &str);

    /// Visit response headers in the order they will be written.
    fn visit_response_headers(&self, f: &mut dyn FnMut(&str, &str));

    /// Response body sink. Bytes written here are the response body.
    fn writer(&mut self) -> &mut dyn Write;

    /// Request protocol, e.g. `HTTP/1.1`.
    fn protocol(&self) -> &str;

    /// `https` for TLS connections, otherwise `http`.
    fn scheme(&self) -> &str {
        if self.is_tls() {
            "https"
        } else {
            "http"
        }
    }

    /// Whether the request arrived over TLS.
    fn is_tls(&self) -> bool;

    /// Per-request local value.
    fn locals(&self, key: &Key) -> Option<Value>;

    /// Store a per-request local value.
    fn set_locals(&mut self, key: Key, value: Value);

    /// Visit every local in insertion order.
    fn visit_locals(&self, f: &mut dyn FnMut(&Key, &Value));
}

/// Response being built for the current request.
#[derive(Default)]
pub struct NativeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Pooled per-request state. Buffers keep their capacity across requests.
#[derive(Default)]
pub struct NativeState {
    pub(crate) method: String,
    pub(crate) uri: String,
    pub(crate) protocol: Cow<'static, str>,
    pub(crate) host: String,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) tls: bool,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) params: ParamVec,
    pub(crate) body: Vec<u8>,
    pub(crate) locals: Locals,
    pub(crate) response: NativeResponse,
}

/// Largest body buffer a pooled state keeps between requests.
pub(crate) const MAX_RETAINED_BUFFER: usize = 64 * 1024;

impl NativeState {
    /// Clear everything from the previous request.
    pub(crate) fn reset(&mut self) {
        self.method.clear();
        self.uri.clear();
        self.protocol = Cow::Borrowed("HTTP/1.1");
        self.host.clear();
        self.remote_addr = None;
        self.tls = false;
        self.headers.clear();
        self.params.clear();
        self.body.clear();
        self.locals.clear();
        self.response.status = 200;
        self.response.headers.clear();
        self.response.body.clear();
    }

    /// Drop buffer capacity above [`MAX_RETAINED_BUFFER`] so an idle pooled
    /// state does not pin the memory of the largest body it ever carried.
    pub(crate) fn shrink_buffers(&mut self) {
        if self.body.capacity() > MAX_RETAINED_BUFFER {
            self.body.shrink_to(MAX_RETAINED_BUFFER);
        }
        if self.response.body.capacity() > MAX_RETAINED_BUFFER {
            self.response.body.shrink_to(MAX_RETAINED_BUFFER);
        }
    }

    pub(crate) fn push_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("host") && self.host.is_empty() {
            self.host.push_str(value);
        }
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or("/")
    }
}

/// The engine's [`Ctx`] implementation, borrowing pooled state for one request.
pub struct DefaultCtx<'r> {
    config: &'r EngineConfig,
    state: &'r mut NativeState,
    route: Option<Arc<Route>>,
    stream: Option<Box<dyn Read + 'r>>,
}

impl<'r> DefaultCtx<'r> {
    pub(crate) fn new(
        config: &'r EngineConfig,
        state: &'r mut NativeState,
        stream: Option<Box<dyn Read + 'r>>,
    ) -> Self {
        Self {
            config,
            state,
            route: None,
            stream,
        }
    }

    pub(crate) fn state(&self) -> &NativeState {
        &*self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut NativeState {
        &mut *self.state
    }

    pub(crate) fn set_route(&mut self, route: Arc<Route>) {
        self.route = Some(route);
    }

    /// Read the remaining streamed body into the buffer so it can be parsed.
    fn drain_stream(&mut self) -> io::Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.read_to_end(&mut self.state.body)?;
        }
        Ok(())
    }
}

impl Ctx for DefaultCtx<'_> {
    fn app(&self) -> &EngineConfig {
        self.config
    }

    fn method(&self) -> &str {
        &self.state.method
    }

    fn route_path(&self) -> &str {
        self.route.as_ref().map(|r| r.path.as_str()).unwrap_or("")
    }

    fn hostname(&self) -> &str {
        &self.state.host
    }

    fn ip(&self) -> String {
        self.state
            .remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    fn request_uri(&self) -> &str {
        &self.state.uri
    }

    fn path(&self) -> &str {
        self.state.path()
    }

    fn params(&self, name: &str) -> &str {
        self.state
            .params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    fn query(&self, name: &str) -> String {
        let Some((_, query)) = self.state.uri.split_once('?') else {
            return String::new();
        };
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    fn get(&self, name: &str) -> &str {
        self.state.header(name).unwrap_or("")
    }

    fn visit_request_headers(&self, f: &mut dyn FnMut(&str, &str)) {
        for (name, value) in &self.state.headers {
            f(name, value);
        }
    }

    fn body_raw(&self) -> &[u8] {
        &self.state.body
    }

    fn body_stream(&mut self) -> Option<Box<dyn Read + '_>> {
        self.stream.take()
    }

    fn multipart_form(&mut self) -> Result<MultipartForm, MultipartError> {
        let content_type = self
            .state
            .header("content-type")
            .ok_or(MultipartError::NotMultipart)?
            .to_string();
        self.drain_stream().map_err(MultipartError::Io)?;
        multipart::parse_form(&content_type, &self.state.body)
    }

    fn status(&mut self, code: u16) {
        self.state.response.status = code;
    }

    fn response_status(&self) -> u16 {
        self.state.response.status
    }

    fn append(&mut self, name: &str, value: &str) {
        self.state
            .response
            .headers
            .push((name.to_string(), value.to_string()));
    }

    fn set(&mut self, name: &str, value: &str) {
        let headers = &mut self.state.response.headers;
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.to_string()));
    }

    fn visit_response_headers(&self, f: &mut dyn FnMut(&str, &str)) {
        for (name, value) in &self.state.response.headers {
            f(name, value);
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.state.response.body
    }

    fn protocol(&self) -> &str {
        &self.state.protocol
    }

    fn is_tls(&self) -> bool {
        self.state.tls
    }

    fn locals(&self, key: &Key) -> Option<Value> {
        self.state.locals.get(key).map(Arc::clone)
    }

    fn set_locals(&mut self, key: Key, value: Value) {
        self.state.locals.set(key, value);
    }

    fn visit_locals(&self, f: &mut dyn FnMut(&Key, &Value)) {
        self.state.locals.visit(f);
    }
}
