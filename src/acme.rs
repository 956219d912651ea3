//! Certificate issuance through an ACME authority.
//!
//! [`AcmeAuthority`] drives an order with `acme-lib`, proving control of the
//! domain with the DNS-01 challenge through a [`ChallengeProvider`].
//!
//! [`AcmeAuthority`]: struct.AcmeAuthority.html
//! [`ChallengeProvider`]: ../dns/trait.ChallengeProvider.html
use std::thread;

use acme_lib::persist::Persist;
use acme_lib::{create_p256_key, Directory, DirectoryUrl};

use crate::dns::ChallengeProvider;
use crate::Result;

/// Milliseconds between polls of challenge and order status.
const POLL_MILLIS: u64 = 5000;

/// The ACME account holder.
///
/// The account key and registration live in `acme-lib`'s `Account`; this
/// only carries who the account is for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcmeUser {
    email: Option<String>,
}

impl AcmeUser {
    /// A blank email means an account without contact.
    pub fn new(email: Option<String>) -> Self {
        AcmeUser {
            email: email.filter(|e| !e.trim().is_empty()),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Contact URIs for the account registration.
    pub fn contact(&self) -> Vec<String> {
        self.email
            .iter()
            .map(|e| format!("mailto:{}", e))
            .collect()
    }

    // The persisted account key is looked up by realm.
    fn realm<'a>(&'a self, domain: &'a str) -> &'a str {
        self.email().unwrap_or(domain)
    }
}

/// A freshly issued certificate chain and its private key, both PEM.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    private_key: String,
    certificate: String,
}

impl IssuedCertificate {
    pub fn new(private_key: impl Into<String>, certificate: impl Into<String>) -> Self {
        IssuedCertificate {
            private_key: private_key.into(),
            certificate: certificate.into(),
        }
    }

    /// The PEM encoded private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// The PEM encoded certificate chain, leaf first.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Something that issues certificates for a domain.
pub trait CertificateAuthority {
    fn issue(
        &self,
        user: &AcmeUser,
        domain: &str,
        challenge: &mut dyn ChallengeProvider,
    ) -> Result<IssuedCertificate>;
}

/// Which ACME directory to order from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcmeDirectory {
    LetsEncrypt,
    /// Relaxed rate limits, untrusted certificates. For testing.
    LetsEncryptStaging,
    Other(String),
}

impl Default for AcmeDirectory {
    fn default() -> Self {
        AcmeDirectory::LetsEncrypt
    }
}

impl AcmeDirectory {
    fn to_url(&self) -> DirectoryUrl<'_> {
        match self {
            AcmeDirectory::LetsEncrypt => DirectoryUrl::LetsEncrypt,
            AcmeDirectory::LetsEncryptStaging => DirectoryUrl::LetsEncryptStaging,
            AcmeDirectory::Other(url) => DirectoryUrl::Other(url),
        }
    }
}

/// ACME issuance with the DNS-01 challenge.
#[derive(Clone)]
pub struct AcmeAuthority<P: Persist> {
    directory: AcmeDirectory,
    persist: P,
    poll_millis: u64,
}

impl<P: Persist> AcmeAuthority<P> {
    pub fn new(directory: AcmeDirectory, persist: P) -> Self {
        AcmeAuthority {
            directory,
            persist,
            poll_millis: POLL_MILLIS,
        }
    }
}

impl<P: Persist> CertificateAuthority for AcmeAuthority<P> {
    fn issue(
        &self,
        user: &AcmeUser,
        domain: &str,
        challenge: &mut dyn ChallengeProvider,
    ) -> Result<IssuedCertificate> {
        let dir = Directory::from_url(self.persist.clone(), self.directory.to_url())?;

        // Reads the account key from persistence, or creates and registers one.
        let acc = dir.account_with_realm(user.realm(domain), user.contact())?;

        let mut ord_new = acc.new_order(domain, &[])?;

        // The authority may already consider the domain authorized.
        let ord_csr = loop {
            if let Some(ord_csr) = ord_new.confirm_validations() {
                break ord_csr;
            }

            for auth in ord_new.authorizations()? {
                if !auth.need_challenge() {
                    continue;
                }
                let name = auth.domain_name().to_string();
                let chall = auth.dns_challenge();
                let proof = chall.dns_proof();

                challenge.present(&name, &proof)?;

                let wait = challenge.timeout();
                info!("Waiting {}s for DNS propagation of {}", wait.as_secs(), name);
                thread::sleep(wait);

                // the record goes away whether validation passed or not
                let validated = chall.validate(self.poll_millis);
                if let Err(e) = challenge.cleanup(&name, &proof) {
                    warn!("Failed to clean up challenge record for {}: {}", name, e);
                }
                validated?;
            }

            ord_new.refresh()?;
        };

        let pkey = create_p256_key();
        let ord_cert = ord_csr.finalize_pkey(pkey, self.poll_millis)?;
        let cert = ord_cert.download_and_save_cert()?;

        Ok(IssuedCertificate::new(cert.private_key(), cert.certificate()))
    }
}
