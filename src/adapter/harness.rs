use std::io;

use tracing::warn;

use super::BrrtAdapter;
use crate::api::ResponseWriter;

impl BrrtAdapter {
    /// Run `req` through the whole app in-process and copy the result onto `w`.
    ///
    /// # Panics
    ///
    /// If the engine cannot complete the in-process request. That is a wiring
    /// fault, not a request-level failure.
    #[allow(clippy::panic)]
    pub(crate) fn serve(&self, w: &mut dyn ResponseWriter, req: http::Request<Vec<u8>>) {
        let response = match self.tester.test(req) {
            Ok(response) => response,
            Err(err) => panic!("in-process request failed: {err}"),
        };
        let (parts, body) = response.into_parts();

        let headers = w.headers_mut();
        for (name, value) in &parts.headers {
            headers.append(name.clone(), value.clone());
        }
        w.write_header(parts.status);
        if let Err(err) = io::copy(&mut body.as_slice(), w) {
            warn!(error = %err, "Failed to copy response body");
        }
    }
}
