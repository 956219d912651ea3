//! Low level Qiniu CDN API JSON objects.
//!
//! Field names follow the wire format, which mixes snake and camel case.
#![allow(non_snake_case)]

use serde::{Deserialize, Serialize};

/// HTTPS sub-configuration of a CDN domain.
///
/// Also the request body of the `sslize` and `httpsconf` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiHttpsConf {
    /// Bound certificate id. Empty when HTTPS is off.
    #[serde(default, alias = "certId")]
    pub certid: String,
    #[serde(default)]
    pub forceHttps: bool,
    #[serde(default)]
    pub http2Enable: bool,
}

impl ApiHttpsConf {
    pub fn new(certid: &str, force_https: bool, http2: bool) -> Self {
        ApiHttpsConf {
            certid: certid.to_string(),
            forceHttps: force_https,
            http2Enable: http2,
        }
    }
}

/// Reply of `GET /domain/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiDomain {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub _type: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub geoCover: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<ApiHttpsConf>,
}

impl ApiDomain {
    /// The bound certificate id, if HTTPS is configured.
    pub fn bound_cert_id(&self) -> Option<&str> {
        self.https
            .as_ref()
            .map(|h| h.certid.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// A certificate as stored server side. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiCert {
    #[serde(default, alias = "certId")]
    pub certid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub dnsnames: Vec<String>,
    #[serde(default)]
    pub not_before: i64,
    #[serde(default)]
    pub not_after: i64,
    #[serde(default)]
    pub create_time: i64,
}

impl ApiCert {
    /// `not_before <= not_after`, which every issued certificate satisfies.
    pub fn is_consistent(&self) -> bool {
        self.not_before <= self.not_after
    }
}

/// Reply of `GET /sslcert/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiCertReply {
    pub cert: ApiCert,
}

/// Body of `POST /sslcert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiUploadCert {
    pub name: String,
    pub common_name: String,
    /// Certificate chain PEM.
    pub ca: String,
    /// Private key PEM.
    pub pri: String,
}

/// Reply of `POST /sslcert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiUploadReply {
    #[serde(alias = "certid")]
    pub certID: String,
}

/// Error payload of non-2xx replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}
