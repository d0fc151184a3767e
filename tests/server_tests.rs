//! Network tests: the adapter served by `may_minihttp` over a real socket.

use std::io::Read;
use std::net::TcpListener;

use brrtbridge::api::{Config, Operation};
use brrtbridge::engine::{App, EngineConfig, ServerHandle};
use http::Method;

mod common;
use common::http_client::{parse_response, send_request};
use common::test_server::setup_may_runtime;

struct TestServer {
    handle: Option<ServerHandle>,
    addr: std::net::SocketAddr,
}

impl TestServer {
    fn start(config: EngineConfig) -> Self {
        setup_may_runtime();
        let app = App::new(config);
        let api = brrtbridge::new(&app, Config::new("Socket API", "1.0.0"));

        api.register(Operation::new(Method::GET, "/items/{id}"), |ctx| {
            let id = ctx.param("id").to_string();
            ctx.set_status(200);
            ctx.set_header("Content-Type", "text/plain");
            ctx.set_header("X-Test", "a");
            ctx.append_header("X-Test", "b");
            let _ = ctx.body_writer().write_all(format!("item {id}").as_bytes());
        });
        api.register(Operation::new(Method::POST, "/echo"), |ctx| {
            let mut body = Vec::new();
            if ctx.body_reader().read_to_end(&mut body).is_err() {
                ctx.set_status(400);
                return;
            }
            ctx.set_status(201);
            let _ = ctx.body_writer().write_all(&body);
        });

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handle = app.listen(addr).unwrap();
        handle.wait_ready().unwrap();
        Self {
            handle: Some(handle),
            addr,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[test]
fn test_get_over_socket() {
    let server = TestServer::start(EngineConfig::default());
    let resp = send_request(
        &server.addr,
        "GET /items/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    let (status, headers, body) = parse_response(&resp);
    assert_eq!(status, 200);
    assert_eq!(body, "item 42");
    let x_test: Vec<_> = headers
        .iter()
        .filter_map(|h| h.strip_prefix("X-Test: "))
        .collect();
    assert_eq!(x_test, ["a", "b"]);
}

#[test]
fn test_unknown_route_over_socket() {
    let server = TestServer::start(EngineConfig::default());
    let resp = send_request(
        &server.addr,
        "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    let (status, _headers, body) = parse_response(&resp);
    assert_eq!(status, 404);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "Not Found");
}

#[test]
fn test_post_body_buffered_and_streamed() {
    for streaming in [false, true] {
        let server = TestServer::start(EngineConfig {
            stream_request_body: streaming,
            ..EngineConfig::default()
        });
        let resp = send_request(
            &server.addr,
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        );
        let (status, _headers, body) = parse_response(&resp);
        assert_eq!(status, 201, "streaming={streaming}");
        assert_eq!(body, "hello", "streaming={streaming}");
    }
}

#[test]
fn test_body_over_limit_over_socket() {
    let server = TestServer::start(EngineConfig {
        body_limit: 2,
        ..EngineConfig::default()
    });
    let resp = send_request(
        &server.addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    );
    let (status, _headers, _body) = parse_response(&resp);
    assert_eq!(status, 413);
}
