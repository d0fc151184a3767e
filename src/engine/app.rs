use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use http::{HeaderName, HeaderValue, Method, StatusCode, Version};
use serde_json::json;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::ctx::{Ctx, DefaultCtx, NativeResponse, NativeState};
use super::error::Error;
use super::middleware::Middleware;
use super::radix::RadixTree;

/// Idle request states kept for reuse.
const MAX_POOLED_STATES: usize = 256;

/// Route handler.
pub type Handler = Arc<dyn Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync>;

/// One registered method + path.
pub struct Route {
    pub method: Method,
    /// Path in engine syntax, prefix included (`/api/items/:id`)
    pub path: String,
    pub(crate) handler: Handler,
}

/// Anything routes can be registered on: the [`App`] itself or a [`Group`].
pub trait Router: Send + Sync {
    /// Register `handler` for each of `methods` at `path`.
    fn add(&self, methods: &[Method], path: &str, handler: Handler);
}

struct AppInner {
    config: EngineConfig,
    routes: RwLock<RadixTree<Route>>,
    middleware: RwLock<Arc<[Arc<dyn Middleware>]>>,
    pool: Mutex<Vec<NativeState>>,
}

/// The engine application: route table, middleware chain and request state pool.
///
/// `App` is a cheap handle; clones share the same routes and pool.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(AppInner {
                config,
                routes: RwLock::new(RadixTree::default()),
                middleware: RwLock::new(Arc::from(Vec::new())),
                pool: Mutex::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Number of method + path pairs registered.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.inner
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn get<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::GET], path, Arc::new(f));
    }

    pub fn post<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::POST], path, Arc::new(f));
    }

    pub fn put<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::PUT], path, Arc::new(f));
    }

    pub fn patch<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::PATCH], path, Arc::new(f));
    }

    pub fn delete<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::DELETE], path, Arc::new(f));
    }

    /// Routes registered on the returned group are mounted under `prefix`.
    #[must_use]
    pub fn group(&self, prefix: &str) -> Group {
        Group {
            app: self.clone(),
            prefix: join_path("", prefix),
        }
    }

    /// Append a middleware to the chain.
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        let mut chain = self
            .inner
            .middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<dyn Middleware>> = chain.iter().map(Arc::clone).collect();
        next.push(middleware);
        *chain = Arc::from(next);
    }

    /// Run `req` through the full routing table in-process, without a socket.
    ///
    /// A handler error does not make this fail; it becomes an error response
    /// exactly as it would on the wire. `Err` means the response the handler
    /// produced cannot be represented as an `http::Response`.
    pub fn test(&self, req: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, Error> {
        let (parts, body) = req.into_parts();
        let mut state = self.acquire();

        state.method.push_str(parts.method.as_str());
        state
            .uri
            .push_str(parts.uri.path_and_query().map_or("/", |pq| pq.as_str()));
        state.protocol = protocol_name(parts.version);
        state.tls = parts.uri.scheme() == Some(&http::uri::Scheme::HTTPS);
        state.remote_addr = Some(
            parts
                .extensions
                .get::<SocketAddr>()
                .copied()
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0))),
        );
        for (name, value) in &parts.headers {
            state.push_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }
        if state.host.is_empty() {
            if let Some(authority) = parts.uri.authority() {
                state.host.push_str(authority.as_str());
            }
        }

        let streaming = self.config().stream_request_body;
        if !streaming {
            state.body.extend_from_slice(&body);
        }
        {
            let stream: Option<Box<dyn std::io::Read + '_>> = if streaming {
                Some(Box::new(body.as_slice()))
            } else {
                None
            };
            let mut ctx = DefaultCtx::new(self.config(), &mut state, stream);
            self.serve(&mut ctx);
        }

        let response = build_response(&mut state.response);
        self.release(state);
        response
    }

    pub(crate) fn acquire(&self) -> NativeState {
        let mut state = self
            .inner
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        state.reset();
        state
    }

    /// Wipe `state` and return it to the pool for the next request.
    pub(crate) fn release(&self, mut state: NativeState) {
        state.reset();
        state.shrink_buffers();
        let mut pool = self.inner.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.len() < MAX_POOLED_STATES {
            pool.push(state);
        }
    }

    /// Dispatch one request whose head and body are already in `ctx`.
    pub(crate) fn serve(&self, ctx: &mut DefaultCtx<'_>) {
        let start = Instant::now();
        let config = self.config();

        if !config.stream_request_body && ctx.state().body.len() > config.body_limit {
            warn!(
                size = ctx.state().body.len(),
                limit = config.body_limit,
                "Request body exceeds limit"
            );
            write_json_error(
                ctx.state_mut(),
                413,
                &json!({"error": "Request Entity Too Large", "limit": config.body_limit}),
            );
            return;
        }

        let route = self.lookup(ctx.state_mut());
        if let Some(route) = &route {
            ctx.set_route(Arc::clone(route));
        }

        let chain = Arc::clone(
            &*self
                .inner
                .middleware
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut handled = false;
        for middleware in chain.iter() {
            if middleware.before(&mut *ctx).is_break() {
                handled = true;
                break;
            }
        }

        if !handled {
            match route {
                Some(route) => {
                    if let Err(err) = (route.handler)(&mut *ctx) {
                        handle_error(ctx.state_mut(), &err);
                    }
                }
                None => {
                    let state = ctx.state_mut();
                    debug!(method = %state.method, path = %state.path(), "No route matched");
                    let body = json!({
                        "error": "Not Found",
                        "method": state.method,
                        "path": state.path(),
                    });
                    write_json_error(state, 404, &body);
                }
            }
        }

        let latency = start.elapsed();
        for middleware in chain.iter() {
            middleware.after(&mut *ctx, latency);
        }
    }

    fn lookup(&self, state: &mut NativeState) -> Option<Arc<Route>> {
        let method = Method::from_bytes(state.method.as_bytes()).ok()?;
        let NativeState { uri, params, .. } = state;
        let path = uri.split('?').next().unwrap_or("/");
        self.inner
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(&method, path, params)
    }
}

impl Router for App {
    fn add(&self, methods: &[Method], path: &str, handler: Handler) {
        let path = join_path("", path);
        let mut routes = self
            .inner
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for method in methods {
            let route = Arc::new(Route {
                method: method.clone(),
                path: path.clone(),
                handler: Arc::clone(&handler),
            });
            if routes.insert(method.clone(), &path, route).is_some() {
                warn!(method = %method, path = %path, "Route replaced");
            } else {
                info!(method = %method, path = %path, "Route added");
            }
        }
    }
}

/// Routes sharing a path prefix, registered on the parent [`App`].
#[derive(Clone)]
pub struct Group {
    app: App,
    prefix: String,
}

impl Group {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Nested group under this group's prefix.
    #[must_use]
    pub fn group(&self, prefix: &str) -> Group {
        Group {
            app: self.app.clone(),
            prefix: join_path(&self.prefix, prefix),
        }
    }

    pub fn get<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::GET], path, Arc::new(f));
    }

    pub fn post<F>(&self, path: &str, f: F)
    where
        F: Fn(&mut dyn Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.add(&[Method::POST], path, Arc::new(f));
    }
}

impl Router for Group {
    fn add(&self, methods: &[Method], path: &str, handler: Handler) {
        self.app.add(methods, &join_path(&self.prefix, path), handler);
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() && !prefix.is_empty() {
        return prefix.to_string();
    }
    format!("{prefix}/{path}")
}

fn protocol_name(version: Version) -> Cow<'static, str> {
    Cow::Borrowed(match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    })
}

/// The default error handler: status from the error, plain-text message body.
fn handle_error(state: &mut NativeState, err: &Error) {
    let code = err.code();
    if code >= 500 {
        warn!(status = code, error = %err, "Handler failed");
    } else {
        debug!(status = code, error = %err, "Handler returned error");
    }
    let response = &mut state.response;
    response.status = code;
    response
        .headers
        .retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
    response.headers.push((
        "Content-Type".to_string(),
        "text/plain; charset=utf-8".to_string(),
    ));
    response.body.clear();
    response.body.extend_from_slice(err.to_string().as_bytes());
}

fn write_json_error(state: &mut NativeState, status: u16, body: &serde_json::Value) {
    let response = &mut state.response;
    response.status = status;
    response
        .headers
        .retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
    response
        .headers
        .push(("Content-Type".to_string(), "application/json".to_string()));
    response.body.clear();
    response.body.extend_from_slice(body.to_string().as_bytes());
}

fn build_response(native: &mut NativeResponse) -> Result<http::Response<Vec<u8>>, Error> {
    let status = StatusCode::from_u16(native.status).map_err(|_| Error::InvalidStatus(native.status))?;
    let mut response = http::Response::new(std::mem::take(&mut native.body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in &native.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidHeader { name: name.clone() })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader { name: name.clone() })?;
        headers.append(header_name, header_value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ctx::MAX_RETAINED_BUFFER;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "/items"), "/items");
        assert_eq!(join_path("", "items"), "/items");
        assert_eq!(join_path("/api/", "/items/:id"), "/api/items/:id");
        assert_eq!(join_path("/api", ""), "/api");
        assert_eq!(join_path("", ""), "/");
    }

    #[test]
    fn test_handler_error_becomes_response() {
        let app = App::new(EngineConfig::default());
        app.get("/teapot", |_ctx| Err(Error::status(418, "short and stout")));
        let res = app
            .test(http::Request::get("/teapot").body(Vec::new()).unwrap())
            .unwrap();
        assert_eq!(res.status(), 418);
        assert_eq!(res.body(), b"short and stout");
    }

    #[test]
    fn test_state_is_recycled() {
        let app = App::new(EngineConfig::default());
        app.get("/", |ctx| {
            ctx.append("X-Seen", "1");
            Ok(())
        });
        for _ in 0..3 {
            let res = app
                .test(http::Request::get("/").body(Vec::new()).unwrap())
                .unwrap();
            assert_eq!(res.headers().get_all("x-seen").iter().count(), 1);
        }
        assert_eq!(app.inner.pool.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_large_bodies_do_not_pin_pooled_memory() {
        let app = App::new(EngineConfig::default());
        app.post("/", |ctx| {
            let echo = ctx.body_raw().to_vec();
            ctx.writer().write_all(&echo)?;
            Ok(())
        });
        let big = vec![b'x'; 1024 * 1024];
        let res = app
            .test(http::Request::post("/").body(big).unwrap())
            .unwrap();
        assert_eq!(res.body().len(), 1024 * 1024);

        let pool = app.inner.pool.lock().unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool[0].body.capacity() <= MAX_RETAINED_BUFFER);
        assert!(pool[0].response.body.capacity() <= MAX_RETAINED_BUFFER);
    }

    #[test]
    fn test_invalid_header_is_an_error() {
        let app = App::new(EngineConfig::default());
        app.get("/", |ctx| {
            ctx.set("Bad Header", "x");
            Ok(())
        });
        let err = app
            .test(http::Request::get("/").body(Vec::new()).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { .. }));
    }
}
