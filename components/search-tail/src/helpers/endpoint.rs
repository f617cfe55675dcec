// External crates
use reqwest::Url;
use std::fmt;

/// Search endpoint after normalization. The scheme decides whether TLS is used
/// and which port is implied when the URL does not carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEndpoint {
    pub url: Url,
    pub port: u16,
    pub secure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint URL {endpoint:?}: {reason}")]
    Invalid { endpoint: String, reason: String },
    #[error("unsupported endpoint scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("endpoint {0:?} has no host")]
    MissingHost(String),
}

impl NormalizedEndpoint {
    /// Parse and normalize an endpoint URL.
    ///
    /// - `http://host`      -> port 80, plain
    /// - `https://host`     -> port 443, secure
    /// - `http://host:8080` -> left as given
    pub fn parse(endpoint: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(endpoint.trim()).map_err(|e| EndpointError::Invalid {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let (secure, default_port) = match url.scheme() {
            "http" => (false, 80),
            "https" => (true, 443),
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };

        if url.host_str().is_none_or(str::is_empty) {
            return Err(EndpointError::MissingHost(endpoint.to_string()));
        }

        let port = url.port().unwrap_or(default_port);

        Ok(Self { url, port, secure })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

impl fmt::Display for NormalizedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_implies_port_80() {
        let endpoint = NormalizedEndpoint::parse("http://host").unwrap();
        assert_eq!(endpoint.scheme(), "http");
        assert_eq!(endpoint.port, 80);
        assert!(!endpoint.secure);
    }

    #[test]
    fn https_implies_port_443_and_tls() {
        let endpoint = NormalizedEndpoint::parse("https://host").unwrap();
        assert_eq!(endpoint.scheme(), "https");
        assert_eq!(endpoint.port, 443);
        assert!(endpoint.secure);
    }

    #[test]
    fn explicit_port_is_left_unchanged() {
        let endpoint = NormalizedEndpoint::parse("http://host:8080").unwrap();
        assert_eq!(endpoint.port, 8080);
        assert_eq!(endpoint.url.port(), Some(8080));
        assert_eq!(endpoint.to_string(), "http://host:8080/");
    }

    #[test]
    fn keeps_path_prefix_of_proxied_endpoints() {
        let endpoint = NormalizedEndpoint::parse("https://proxy.local/es").unwrap();
        assert_eq!(endpoint.url.path(), "/es");
    }

    #[test]
    fn rejects_other_schemes() {
        let err = NormalizedEndpoint::parse("ftp://host").unwrap_err();
        assert!(matches!(err, EndpointError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            NormalizedEndpoint::parse("not a url"),
            Err(EndpointError::Invalid { .. })
        ));
    }
}
