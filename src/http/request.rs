use std::collections::HashMap;

/// Represents a parsed HTTP request from a client.
///
/// Built once per connection from the request line and headers of the
/// upgrade (or health-check) request. The body is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method, uppercased (e.g. "GET")
    pub method: String,
    /// The request target, lowercased (e.g. "/ready")
    pub url: String,
    /// Protocol name, uppercased (typically "HTTP")
    pub protocol: String,
    /// Protocol version, lowercased (typically "1.1")
    pub protocol_version: String,
    /// Headers keyed by lowercased name. The last occurrence of a name wins.
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Retrieves a header value by name.
    ///
    /// Names are stored lowercased, so the lookup is case-insensitive.
    ///
    /// # Example
    ///
    /// ```
    /// # use wsgate::http::parser::RequestParser;
    /// let req = RequestParser::new()
    ///     .feed(b"GET / HTTP/1.1\r\nOrigin: https://example.com\r\n\r\n")
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(req.header("ORIGIN"), Some("https://example.com"));
    /// ```
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_lowercase())
            .map(|v| v.as_str())
    }

    /// The browser-supplied `Origin` header, if any.
    pub fn origin(&self) -> Option<&str> {
        self.header("origin")
    }
}
