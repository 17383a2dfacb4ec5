//! Session affinity cookies
//!
//! The node that accepts a build also serves its event stream. The server pins
//! the client to that node with cookies returned from build creation, which
//! must be replayed on the event stream request.

use reqwest::Response;

/// A single cookie as set by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// Cookies captured from the build creation response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    cookies: Vec<SessionCookie>,
}

impl SessionTokens {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self { cookies }
    }

    /// Captures every `Set-Cookie` of a response, in order
    pub fn from_response(response: &Response) -> Self {
        let cookies = response
            .cookies()
            .map(|cookie| SessionCookie {
                name: cookie.name().to_string(),
                value: cookie.value().to_string(),
            })
            .collect();
        Self { cookies }
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for a `Cookie` request header, or `None` without cookies
    pub fn cookie_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }
}
