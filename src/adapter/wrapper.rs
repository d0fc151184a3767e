use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::api::{ApiContext, Operation, ProtoVersion, TlsConnectionState};
use crate::context::Context;
use crate::engine::{Ctx, MultipartError, MultipartForm};

/// [`ApiContext`] over one native engine context.
///
/// Borrows the native context for the duration of the handler call only;
/// the engine recycles it as soon as the handler returns.
pub struct Wrapper<'a> {
    op: Arc<Operation>,
    status: u16,
    orig: &'a mut dyn Ctx,
    ctx: Arc<dyn Context>,
}

impl<'a> Wrapper<'a> {
    #[must_use]
    pub fn new(op: Arc<Operation>, orig: &'a mut dyn Ctx, ctx: Arc<dyn Context>) -> Self {
        Self {
            op,
            status: 0,
            orig,
            ctx,
        }
    }

    /// The native engine context. Do not keep references to it or its values.
    pub fn unwrap(&mut self) -> &mut dyn Ctx {
        &mut *self.orig
    }
}

impl ApiContext for Wrapper<'_> {
    fn operation(&self) -> &Operation {
        &self.op
    }

    fn matched(&self) -> &str {
        self.orig.route_path()
    }

    fn context(&self) -> Arc<dyn Context> {
        Arc::clone(&self.ctx)
    }

    fn method(&self) -> &str {
        self.orig.method()
    }

    fn host(&self) -> &str {
        self.orig.hostname()
    }

    fn remote_addr(&self) -> String {
        self.orig.ip()
    }

    fn url(&self) -> http::Uri {
        let raw = self.orig.request_uri();
        raw.parse().unwrap_or_else(|err| {
            warn!(uri = %raw, error = %err, "Malformed request URI, using '/'");
            http::Uri::from_static("/")
        })
    }

    fn param(&self, name: &str) -> &str {
        self.orig.params(name)
    }

    fn query(&self, name: &str) -> String {
        self.orig.query(name)
    }

    fn header(&self, name: &str) -> &str {
        self.orig.get(name)
    }

    fn each_header(&self, cb: &mut dyn FnMut(&str, &str)) {
        self.orig.visit_request_headers(cb);
    }

    fn body_reader(&mut self) -> Box<dyn Read + '_> {
        if self.orig.app().stream_request_body {
            return self
                .orig
                .body_stream()
                .unwrap_or_else(|| Box::new(io::empty()));
        }
        Box::new(self.orig.body_raw())
    }

    fn multipart_form(&mut self) -> Result<MultipartForm, MultipartError> {
        self.orig.multipart_form()
    }

    fn set_read_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        // the engine does not expose per-connection read deadlines
        debug!(
            in_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "Read deadline requested but not enforced"
        );
        Ok(())
    }

    fn set_status(&mut self, code: u16) {
        self.status = code;
        self.orig.status(code);
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn append_header(&mut self, name: &str, value: &str) {
        self.orig.append(name, value);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.orig.set(name, value);
    }

    fn body_writer(&mut self) -> &mut dyn Write {
        self.orig.writer()
    }

    fn tls(&self) -> Option<TlsConnectionState> {
        self.orig.is_tls().then(TlsConnectionState::default)
    }

    fn version(&self) -> ProtoVersion {
        ProtoVersion::parse(self.orig.protocol())
    }

    fn native_ctx(&mut self) -> Option<&mut dyn Ctx> {
        Some(&mut *self.orig)
    }
}
