//! Exempt-path policy.
//!
//! Decides, per request path, whether a token is mandatory, ignored, or
//! forbidden-if-valid. Paths are matched by suffix, so `/api/v1/login`
//! matches `/login`. Every configured suffix starts with `/`, which keeps a
//! match aligned to a path segment (`/relogin` does not match `/login`).

/// How a request path is treated by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Always allowed; no validation attempted.
    Open,
    /// Allowed only while unauthenticated; a valid token is rejected.
    Login,
    /// A valid token is required.
    Protected,
}

/// Suffix lists for open and login paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptPaths {
    open: Vec<String>,
    login: Vec<String>,
}

impl Default for ExemptPaths {
    fn default() -> Self {
        Self::new(
            ["/.well-known/jwks.json", "/available", "/v1/health", "/metrics"],
            ["/login", "/signup"],
        )
    }
}

impl ExemptPaths {
    pub fn new<O, L>(open: O, login: L) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            open: open.into_iter().map(Into::into).collect(),
            login: login.into_iter().map(Into::into).collect(),
        }
    }

    /// Classify `path`. Login suffixes are checked before open ones.
    pub fn classify(&self, path: &str) -> PathClass {
        if self.login.iter().any(|suffix| path.ends_with(suffix.as_str())) {
            PathClass::Login
        } else if self.open.iter().any(|suffix| path.ends_with(suffix.as_str())) {
            PathClass::Open
        } else {
            PathClass::Protected
        }
    }
}
