#![allow(dead_code)]

use brrtbridge::api::{Api, Config, ResponseRecorder};
use brrtbridge::engine::{App, EngineConfig};

/// App plus an API registered on it.
pub fn api_with(config: EngineConfig) -> (App, Api) {
    let app = App::new(config);
    let api = brrtbridge::new(&app, Config::new("Test API", "1.0.0"));
    (app, api)
}

pub fn api() -> (App, Api) {
    api_with(EngineConfig::default())
}

pub fn get(uri: &str) -> http::Request<Vec<u8>> {
    http::Request::get(uri).body(Vec::new()).unwrap()
}

pub fn post(uri: &str, content_type: &str, body: impl Into<Vec<u8>>) -> http::Request<Vec<u8>> {
    http::Request::post(uri)
        .header("Content-Type", content_type)
        .body(body.into())
        .unwrap()
}

/// Run `req` through `api`'s synchronous entry point.
pub fn serve(api: &Api, req: http::Request<Vec<u8>>) -> ResponseRecorder {
    let mut rec = ResponseRecorder::new();
    api.serve_http(&mut rec, req);
    rec
}

pub fn body_str(rec: &ResponseRecorder) -> &str {
    std::str::from_utf8(rec.body()).unwrap()
}

pub mod test_server {
    use std::sync::Once;

    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod http_client {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Send a raw request and read until the server goes quiet.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Status, header lines and body of a raw response.
    pub fn parse_response(resp: &str) -> (u16, Vec<String>, String) {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        (status, lines.map(str::to_string).collect(), body.to_string())
    }
}
