//
use std::fmt;
use std::io;

/// qiniu-ssl result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// qiniu-ssl errors.
#[derive(Debug)]
pub enum Error {
    /// Invalid or missing configuration. Reported before any network activity.
    Config(String),
    /// The CDN API answered with a non-2xx status.
    Api { status: u16, message: String },
    /// The DNS API rejected a call.
    Dns(String),
    /// No hosted zone owns the domain.
    ZoneNotFound(String),
    /// Certificate issuance failed.
    Acme(acme_lib::Error),
    /// Transport level failure (connect, timeout, TLS).
    Http(String),
    /// JSON serialization/deserialization error.
    Json(serde_json::Error),
    /// std::io error.
    Io(io::Error),
    /// Signing or PEM handling failed inside openssl.
    Ssl(openssl::error::ErrorStack),
    /// Some other error. Notice that `Error` is
    /// `From<String>` and `From<&str>` and it becomes `Other`.
    Other(String),
}
impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(s) => write!(f, "{}", s),
            Error::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Error::Dns(s) => write!(f, "Aliyun DNS: {}", s),
            Error::ZoneNotFound(d) => write!(f, "zone not found for domain {}", d),
            Error::Acme(e) => write!(f, "ACME: {}", e),
            Error::Http(s) => write!(f, "{}", s),
            Error::Json(e) => write!(f, "{}", e),
            Error::Io(e) => write!(f, "{}", e),
            Error::Ssl(e) => write!(f, "{}", e),
            Error::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<acme_lib::Error> for Error {
    fn from(e: acme_lib::Error) -> Self {
        Error::Acme(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Ssl(e)
    }
}

impl From<ureq::Transport> for Error {
    fn from(e: ureq::Transport) -> Self {
        Error::Http(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
