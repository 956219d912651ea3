//! Qiniu CDN control.
//!
//! The [`Cdn`] trait is the seam the renewal workflow talks to. [`QiniuClient`]
//! implements it over the signed Qiniu HTTP API.
//!
//! [`Cdn`]: trait.Cdn.html
//! [`QiniuClient`]: struct.QiniuClient.html

pub mod api;
mod client;
mod sign;

pub use crate::cdn::client::{QiniuClient, QINIU_API_HOST, REQUEST_TIMEOUT};
pub use crate::cdn::sign::Credentials;

use crate::cdn::api::{ApiCert, ApiDomain, ApiHttpsConf};
use crate::Result;

/// Operations the renewal workflow needs from a CDN.
pub trait Cdn {
    /// Upload a certificate chain and its private key. Returns the opaque
    /// id the CDN assigned to it.
    fn upload_certificate(&self, name: &str, cert_pem: &str, key_pem: &str) -> Result<String>;

    /// Domain configuration, including the HTTPS binding if any.
    fn domain_info(&self, domain: &str) -> Result<ApiDomain>;

    /// A previously uploaded certificate.
    fn certificate_info(&self, cert_id: &str) -> Result<ApiCert>;

    /// Turn on HTTPS for a domain that has no certificate bound.
    fn enable_https(&self, domain: &str, conf: &ApiHttpsConf) -> Result<()>;

    /// Rebind the certificate of a domain that already serves HTTPS.
    fn update_https_conf(&self, domain: &str, conf: &ApiHttpsConf) -> Result<()>;
}

impl<'a, C: Cdn + ?Sized> Cdn for &'a C {
    fn upload_certificate(&self, name: &str, cert_pem: &str, key_pem: &str) -> Result<String> {
        (**self).upload_certificate(name, cert_pem, key_pem)
    }
    fn domain_info(&self, domain: &str) -> Result<ApiDomain> {
        (**self).domain_info(domain)
    }
    fn certificate_info(&self, cert_id: &str) -> Result<ApiCert> {
        (**self).certificate_info(cert_id)
    }
    fn enable_https(&self, domain: &str, conf: &ApiHttpsConf) -> Result<()> {
        (**self).enable_https(domain, conf)
    }
    fn update_https_conf(&self, domain: &str, conf: &ApiHttpsConf) -> Result<()> {
        (**self).update_https_conf(domain, conf)
    }
}
