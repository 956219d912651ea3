use std::time::Duration;

use crate::cdn::api::{
    ApiCert, ApiCertReply, ApiDomain, ApiError, ApiHttpsConf, ApiUploadCert, ApiUploadReply,
};
use crate::cdn::sign::{Credentials, CONTENT_TYPE};
use crate::cdn::Cdn;
use crate::util::{read_body, read_json};
use crate::{Error, Result};

/// Production API host.
pub const QINIU_API_HOST: &str = "https://api.qiniu.com";

/// Timeout shared by every CDN call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for the Qiniu CDN API.
#[derive(Debug, Clone)]
pub struct QiniuClient {
    credentials: Credentials,
    base_url: String,
    host: String,
    agent: ureq::Agent,
}

impl QiniuClient {
    /// Client against the production API host.
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self> {
        Self::with_base_url(access_key, secret_key, QINIU_API_HOST)
    }

    /// Client against some other API host, such as a local fake.
    ///
    /// `base_url` is `scheme://host[:port]` without a trailing path.
    pub fn with_base_url(access_key: &str, secret_key: &str, base_url: &str) -> Result<Self> {
        let credentials = Credentials::new(access_key, secret_key)?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let host = host_of(&base_url)?;
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(QiniuClient {
            credentials,
            base_url,
            host,
            agent,
        })
    }

    fn call(&self, method: &str, path: &str, body: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let auth = self.credentials.authorization(
            method,
            &self.host,
            path,
            CONTENT_TYPE,
            body.as_bytes(),
        )?;

        debug!("Call endpoint {} {}", method, url);
        trace!("{}", body);

        let req = self
            .agent
            .request(method, &url)
            .set("Content-Type", CONTENT_TYPE)
            .set("Authorization", &auth);
        let res = if body.is_empty() {
            req.call()
        } else {
            req.send_string(body)
        };

        match res {
            Ok(res) => read_body(res),
            Err(ureq::Error::Status(status, res)) => {
                let body = read_body(res)?;
                warn!("API error: {}", body);
                Err(api_error(status, &body))
            }
            Err(ureq::Error::Transport(t)) => Err(t.into()),
        }
    }
}

impl Cdn for QiniuClient {
    fn upload_certificate(&self, name: &str, cert_pem: &str, key_pem: &str) -> Result<String> {
        let upload = ApiUploadCert {
            name: name.to_string(),
            common_name: name.to_string(),
            ca: cert_pem.to_string(),
            pri: key_pem.to_string(),
        };
        let body = serde_json::to_string(&upload)?;
        let res = self
            .call("POST", "/sslcert", &body)
            .map_err(|e| context("failed to upload certificate", e))?;
        let reply: ApiUploadReply = read_json(&res)?;
        Ok(reply.certID)
    }

    fn domain_info(&self, domain: &str) -> Result<ApiDomain> {
        let res = self
            .call("GET", &format!("/domain/{}", domain), "")
            .map_err(|e| context("failed to get domain info", e))?;
        read_json(&res)
    }

    fn certificate_info(&self, cert_id: &str) -> Result<ApiCert> {
        let res = self
            .call("GET", &format!("/sslcert/{}", cert_id), "")
            .map_err(|e| context("failed to get certificate info", e))?;
        let reply: ApiCertReply = read_json(&res)?;
        Ok(reply.cert)
    }

    fn enable_https(&self, domain: &str, conf: &ApiHttpsConf) -> Result<()> {
        let body = serde_json::to_string(conf)?;
        self.call("PUT", &format!("/domain/{}/sslize", domain), &body)
            .map_err(|e| context("failed to enable HTTPS for domain", e))?;
        Ok(())
    }

    fn update_https_conf(&self, domain: &str, conf: &ApiHttpsConf) -> Result<()> {
        let body = serde_json::to_string(conf)?;
        self.call("PUT", &format!("/domain/{}/httpsconf", domain), &body)
            .map_err(|e| context("failed to update HTTPS configuration", e))?;
        Ok(())
    }
}

/// Turn a non-2xx reply into an error. Prefers the payload's `error`
/// field, then `message`, then the raw body.
pub(crate) fn api_error(status: u16, body: &str) -> Error {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(p) if !p.error.is_empty() => p.error,
        Ok(p) if !p.message.is_empty() => p.message,
        _ => body.to_string(),
    };
    Error::Api { status, message }
}

// API errors keep their variant so callers can still match on the status.
fn context(what: &str, e: Error) -> Error {
    match e {
        Error::Api { status, message } => Error::Api {
            status,
            message: format!("{}: {}", what, message),
        },
        Error::Http(s) => Error::Http(format!("{}: {}", what, s)),
        e => e,
    }
}

fn host_of(base_url: &str) -> Result<String> {
    let rest = base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .ok_or_else(|| Error::Config(format!("unsupported API url: {}", base_url)))?;
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(Error::Config(format!("no host in API url: {}", base_url)));
    }
    Ok(host.to_string())
}
