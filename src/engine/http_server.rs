use std::borrow::Cow;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use http::StatusCode;
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer as MiniHttpServer, HttpService, Request, Response};
use once_cell::sync::Lazy;
use tracing::{info, warn};

use super::app::App;
use super::ctx::{DefaultCtx, NativeResponse};

/// Most response headers written per response; the rest are dropped with a warning.
pub const MAX_RESPONSE_HEADERS: usize = 16;

/// Most distinct lines kept in the process-wide header table.
pub const MAX_INTERNED_LINES: usize = 256;

/// Headers whose values come from a small, fixed vocabulary. Only these are
/// leaked into [`HEADER_LINES`]; everything else lives in the connection's
/// scratch buffer.
const INTERNABLE_HEADERS: &[&str] = &[
    "access-control-allow-credentials",
    "access-control-allow-headers",
    "access-control-allow-methods",
    "access-control-allow-origin",
    "cache-control",
    "connection",
    "content-encoding",
    "content-language",
    "content-type",
    "vary",
    "x-content-type-options",
    "x-frame-options",
];

/// `may_minihttp` only takes `&'static str` header lines. Repeated lines of
/// [`INTERNABLE_HEADERS`] are leaked once and reused.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);

/// `may_minihttp` service that feeds connections into an [`App`].
///
/// `may_minihttp` clones the service for every accepted connection, so each
/// connection owns its own header scratch buffer.
pub struct AppService {
    app: App,
    header_scratch: Vec<String>,
}

impl AppService {
    #[must_use]
    pub fn new(app: App) -> Self {
        Self {
            app,
            header_scratch: Vec::with_capacity(MAX_RESPONSE_HEADERS),
        }
    }
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self::new(self.app.clone())
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, rsp: &mut Response) -> io::Result<()> {
        // The previous response on this connection is already encoded.
        self.header_scratch.clear();
        let app = &self.app;
        let mut state = app.acquire();

        state.method.push_str(req.method());
        state.uri.push_str(req.path());
        state.protocol = Cow::Borrowed(if req.version() == 0 {
            "HTTP/1.0"
        } else {
            "HTTP/1.1"
        });
        for header in req.headers().iter() {
            state.push_header(header.name, &String::from_utf8_lossy(header.value));
        }

        let mut body = req.body();
        let streaming = app.config().stream_request_body;
        if !streaming {
            let limit = app.config().body_limit as u64;
            (&mut body).take(limit + 1).read_to_end(&mut state.body)?;
            // keep the connection framed even when the body is rejected
            io::copy(&mut body, &mut io::sink())?;
        }

        {
            let stream: Option<Box<dyn Read + '_>> = if streaming {
                Some(Box::new(body))
            } else {
                None
            };
            let mut ctx = DefaultCtx::new(app.config(), &mut state, stream);
            app.serve(&mut ctx);
        }

        write_response(rsp, &mut state.response, &mut self.header_scratch);
        app.release(state);
        Ok(())
    }
}

fn write_response(rsp: &mut Response, native: &mut NativeResponse, scratch: &mut Vec<String>) {
    let reason = StatusCode::from_u16(native.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    rsp.status_code(native.status as usize, reason);

    if native.headers.len() > MAX_RESPONSE_HEADERS {
        warn!(
            count = native.headers.len(),
            max = MAX_RESPONSE_HEADERS,
            "Too many response headers, dropping the rest"
        );
    }
    for (name, value) in native.headers.iter().take(MAX_RESPONSE_HEADERS) {
        if !is_valid_header_line(name, value) {
            warn!(header = %name, "Dropping header with invalid characters");
            continue;
        }
        let line = format!("{name}: {value}");
        let line = match intern_header_line(name, line) {
            Ok(interned) => interned,
            Err(line) => scratch_line(scratch, line),
        };
        rsp.header(line);
    }
    rsp.body_vec(std::mem::take(&mut native.body));
}

/// `false` for lines that would break response framing.
fn is_valid_header_line(name: &str, value: &str) -> bool {
    !name.contains(['\r', '\n', ':']) && !value.contains(['\r', '\n'])
}

/// Shared `'static` copy of `line`, or the line back when it must not be interned.
fn intern_header_line(name: &str, line: String) -> Result<&'static str, String> {
    if !INTERNABLE_HEADERS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name))
    {
        return Err(line);
    }
    if let Some(found) = HEADER_LINES.get(&line) {
        return Ok(*found);
    }
    if HEADER_LINES.len() >= MAX_INTERNED_LINES {
        return Err(line);
    }
    let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
    HEADER_LINES.insert(line, leaked);
    Ok(leaked)
}

/// Park `line` in the connection's scratch buffer for the current response.
#[allow(unsafe_code)]
fn scratch_line(scratch: &mut Vec<String>, line: String) -> &'static str {
    scratch.push(line);
    let stored = scratch.last().map_or("", String::as_str);
    // SAFETY: the string's heap buffer does not move when `scratch` grows and
    // is only freed by the `clear` at the start of the next `call` on this
    // connection. `may_minihttp` encodes the response right after `call`
    // returns, before the next request is dispatched, so the line is never
    // read after it is freed.
    unsafe { &*(stored as *const str) }
}

/// Number of lines currently held in the process-wide header table.
#[must_use]
pub fn interned_header_lines() -> usize {
    HEADER_LINES.len()
}

/// Wrapper around `may_minihttp`'s server.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening address until it accepts connections.
    ///
    /// # Errors
    ///
    /// `TimedOut` if the server is not accepting after ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the server coroutine and wait for it to finish.
    pub fn stop(self) {
        // SAFETY: cancellation of the accept coroutine we own; nothing else
        // holds this handle.
        #[allow(unsafe_code)]
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            warn!(addr = %self.addr, "Server coroutine panicked during shutdown");
        }
    }

    /// Block until the server coroutine exits.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the server coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = MiniHttpServer(self.0).start(addr)?;
        Ok(ServerHandle { addr, handle })
    }
}

impl App {
    /// Serve this app on `addr` with the configured coroutine stack size.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn listen<A: ToSocketAddrs>(&self, addr: A) -> io::Result<ServerHandle> {
        may::config().set_stack_size(self.config().stack_size);
        let handle = HttpServer(AppService::new(self.clone())).start(addr)?;
        info!(
            app = %self.config().app_name,
            addr = %handle.addr(),
            "Listening"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, RequestIdMiddleware};
    use std::collections::HashSet;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::Arc;

    #[test]
    fn test_intern_reuses_lines() {
        let a = intern_header_line("Content-Type", "Content-Type: text/x-interned".into()).unwrap();
        let b = intern_header_line("content-type", "Content-Type: text/x-interned".into()).unwrap();
        assert_eq!(a, "Content-Type: text/x-interned");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_per_request_headers_are_not_interned() {
        let line = intern_header_line("X-Request-ID", "X-Request-ID: abc".into());
        assert_eq!(line, Err("X-Request-ID: abc".to_string()));
    }

    #[test]
    fn test_scratch_lines_survive_until_cleared() {
        let mut scratch = Vec::new();
        let a = scratch_line(&mut scratch, "Location: /items/1".to_string());
        let b = scratch_line(&mut scratch, "ETag: \"v1\"".to_string());
        assert_eq!(a, "Location: /items/1");
        assert_eq!(b, "ETag: \"v1\"");
        assert_eq!(scratch.len(), 2);
    }

    #[test]
    fn test_rejects_injection() {
        assert!(!is_valid_header_line("X-Evil", "a\r\nSet-Cookie: x"));
        assert!(!is_valid_header_line("X:Evil", "a"));
        assert!(is_valid_header_line("X-Fine", "a: b"));
    }

    /// Read one `ok`-bodied response off a keep-alive connection.
    fn read_response(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        while !buf.ends_with(b"\r\n\r\nok") {
            let n = stream.read(&mut byte).unwrap();
            assert!(n > 0, "connection closed mid-response");
            buf.push(byte[0]);
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_request_ids_do_not_grow_header_table() {
        let app = App::new(EngineConfig::default());
        app.use_middleware(Arc::new(RequestIdMiddleware));
        app.get("/", |ctx| {
            ctx.status(200);
            ctx.set("Content-Type", "text/plain");
            ctx.writer().write_all(b"ok")?;
            Ok(())
        });

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let handle = app.listen(addr).unwrap();
        handle.wait_ready().unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut ids = HashSet::new();
        for _ in 0..200 {
            stream
                .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .unwrap();
            let resp = read_response(&mut stream);
            assert!(resp.contains("\r\nContent-Type: text/plain\r\n"), "{resp}");
            let id = resp
                .lines()
                .find_map(|l| l.strip_prefix("X-Request-ID: "))
                .map(str::to_string)
                .expect("request id header");
            ids.insert(id);
        }
        handle.stop();

        assert_eq!(ids.len(), 200);
        assert!(interned_header_lines() <= MAX_INTERNED_LINES);
        assert!(!HEADER_LINES
            .iter()
            .any(|entry| entry.key().starts_with("X-Request-ID")));
    }
}
