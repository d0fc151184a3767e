use http::Method;

/// Description of one API endpoint.
///
/// Paths use `{name}` segments for path parameters, e.g. `/items/{id}`.
/// Operations are immutable once registered and shared as `Arc<Operation>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub operation_id: String,
    pub method: Method,
    pub path: String,
    pub summary: String,
    pub tags: Vec<String>,
    /// Status the operation responds with on success, `0` when unspecified
    pub default_status: u16,
}

impl Operation {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            operation_id: String::new(),
            method,
            path: path.into(),
            summary: String::new(),
            tags: Vec::new(),
            default_status: 0,
        }
    }

    #[must_use]
    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = id.into();
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }
}

/// Negotiated HTTP protocol of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoVersion {
    /// Protocol string as received, e.g. `HTTP/1.1`
    pub proto: String,
    pub proto_major: u8,
    pub proto_minor: u8,
}

impl ProtoVersion {
    /// Split `HTTP/<major>[.<minor>]`. Unrecognised strings keep `proto` and
    /// report `0.0`.
    #[must_use]
    pub fn parse(proto: &str) -> Self {
        let (major, minor) = proto
            .strip_prefix("HTTP/")
            .and_then(|v| {
                let (major, minor) = v.split_once('.').unwrap_or((v, "0"));
                Some((major.parse().ok()?, minor.parse().ok()?))
            })
            .unwrap_or((0, 0));
        Self {
            proto: proto.to_string(),
            proto_major: major,
            proto_minor: minor,
        }
    }
}

/// TLS details of the connection a request arrived on.
///
/// The engine does not expose handshake details, so the adapter only ever
/// hands out [`TlsConnectionState::default()`]: its presence means "this
/// request came over TLS" and every field is `None`. Do not rely on the
/// fields being populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConnectionState {
    pub version: Option<u16>,
    pub cipher_suite: Option<u16>,
    pub server_name: Option<String>,
    pub negotiated_protocol: Option<String>,
    pub handshake_complete: Option<bool>,
}
