//! Route methods: real HTTP methods plus the static-file pseudo-methods.

use std::fmt;

use axum::http::Method;

use crate::routing::RouteError;

/// Pseudo-method names used for static mounts.
pub const METHOD_STATIC: &str = "Static";
pub const METHOD_STATIC_FILE: &str = "StaticFile";
pub const METHOD_STATIC_FS: &str = "StaticFS";

/// The method a route node is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Http(Method),
    /// Directory served from a path on disk.
    Static,
    /// Single file.
    StaticFile,
    /// Pre-configured directory service.
    StaticFs,
}

impl RouteMethod {
    pub fn as_str(&self) -> &str {
        match self {
            RouteMethod::Http(m) => m.as_str(),
            RouteMethod::Static => METHOD_STATIC,
            RouteMethod::StaticFile => METHOD_STATIC_FILE,
            RouteMethod::StaticFs => METHOD_STATIC_FS,
        }
    }

    pub fn is_static(&self) -> bool {
        !matches!(self, RouteMethod::Http(_))
    }

    /// Parse a configured method name. HTTP methods are case-insensitive;
    /// pseudo-methods must be spelled as registered.
    pub fn parse(name: &str) -> Result<Self, RouteError> {
        match name {
            METHOD_STATIC => return Ok(RouteMethod::Static),
            METHOD_STATIC_FILE => return Ok(RouteMethod::StaticFile),
            METHOD_STATIC_FS => return Ok(RouteMethod::StaticFs),
            _ => {}
        }
        let upper = name.to_ascii_uppercase();
        match Method::from_bytes(upper.as_bytes()) {
            Ok(m) if is_standard(&m) => Ok(RouteMethod::Http(m)),
            _ => Err(RouteError::InvalidMethod(name.to_string())),
        }
    }

    /// True if this method is named by `name` (case-insensitive).
    pub fn is(&self, name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(name)
    }
}

fn is_standard(m: &Method) -> bool {
    [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::CONNECT,
        Method::OPTIONS,
        Method::TRACE,
    ]
    .contains(m)
}

impl From<Method> for RouteMethod {
    fn from(m: Method) -> Self {
        RouteMethod::Http(m)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods() {
        assert_eq!(RouteMethod::parse("get").unwrap(), RouteMethod::Http(Method::GET));
        assert_eq!(RouteMethod::parse("POST").unwrap(), RouteMethod::Http(Method::POST));
        assert_eq!(RouteMethod::parse("StaticFile").unwrap(), RouteMethod::StaticFile);
        assert!(RouteMethod::parse("FETCH").is_err());
        assert!(RouteMethod::parse("").is_err());
    }

    #[test]
    fn test_is_case_insensitive() {
        assert!(RouteMethod::Http(Method::GET).is("get"));
        assert!(RouteMethod::Static.is("static"));
        assert!(!RouteMethod::Static.is("StaticFile"));
    }
}
