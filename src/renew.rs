//! Expiry checks and the renew-then-publish workflow.
//!
//! A [`Renewer`] asks the CDN how long the certificate bound to a domain has
//! left. When that is less than the configured threshold (or nothing useful
//! can be learned) it issues a new certificate, stores it, uploads it and
//! binds it to the domain.
//!
//! ```no_run
//! use qiniu_ssl::acme::{AcmeAuthority, AcmeDirectory, AcmeUser};
//! use qiniu_ssl::cdn::QiniuClient;
//! use qiniu_ssl::dns::aliyun::AliyunDns;
//! use qiniu_ssl::dns::{DnsChallenge, DEFAULT_PROPAGATION_WAIT};
//! use qiniu_ssl::renew::{Policy, Renewer};
//! use qiniu_ssl::store::{AccountPersist, CertStore};
//!
//! fn renew() -> Result<(), qiniu_ssl::Error> {
//!     let store = CertStore::open("certs")?;
//!     let cdn = QiniuClient::new("qiniu-ak", "qiniu-sk")?;
//!     let dns = AliyunDns::new("aliyun-ak", "aliyun-sk", "cn-hangzhou")?;
//!     let challenge = DnsChallenge::new(dns, DEFAULT_PROPAGATION_WAIT);
//!     let authority = AcmeAuthority::new(AcmeDirectory::LetsEncrypt, AccountPersist::new(store.dir()));
//!     let user = AcmeUser::new(Some("ops@example.com".into()));
//!
//!     let mut renewer = Renewer::new(cdn, authority, challenge, store, user, Policy::default());
//!     renewer.run("cdn.example.com")?;
//!     Ok(())
//! }
//! ```
//!
//! [`Renewer`]: struct.Renewer.html
use std::fmt;

use crate::acme::{AcmeUser, CertificateAuthority};
use crate::cdn::api::{ApiCert, ApiHttpsConf};
use crate::cdn::Cdn;
use crate::dns::ChallengeProvider;
use crate::store::CertStore;
use crate::util::{format_day, now_unix, SECONDS_PER_DAY};
use crate::{Error, Result};

/// How a renewed certificate is published, and when renewal kicks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub force_https: bool,
    pub http2: bool,
    /// Renew once fewer than this many days are left.
    pub threshold_days: i64,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            force_https: false,
            http2: true,
            threshold_days: 30,
        }
    }
}

/// Why a domain does or does not need a new certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The CDN could not tell us. Renewing is the safe side.
    LookupFailed(String),
    /// No certificate bound to the domain.
    NoCertificate,
    /// The bound certificate claims to end before it starts.
    InvalidRecord,
    /// Inside the threshold.
    Expiring { not_after: i64, days_left: i64 },
    Valid { not_after: i64, days_left: i64 },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reason::LookupFailed(e) => write!(f, "certificate status unknown ({})", e),
            Reason::NoCertificate => write!(f, "no certificate bound"),
            Reason::InvalidRecord => write!(f, "bound certificate has an invalid validity period"),
            Reason::Expiring {
                not_after,
                days_left,
            } => write!(
                f,
                "certificate expires on {} ({} days left)",
                format_day(*not_after),
                days_left
            ),
            Reason::Valid {
                not_after,
                days_left,
            } => write!(
                f,
                "certificate valid until {} ({} days left)",
                format_day(*not_after),
                days_left
            ),
        }
    }
}

/// Outcome of an expiry check. Computed fresh on every check, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalDecision {
    pub needs_renewal: bool,
    pub reason: Reason,
}

impl RenewalDecision {
    fn renew(reason: Reason) -> Self {
        RenewalDecision {
            needs_renewal: true,
            reason,
        }
    }
}

/// Decide on a bound certificate: renew iff `not_after < now + threshold`.
pub fn decide(cert: &ApiCert, now: i64, threshold_days: i64) -> RenewalDecision {
    if !cert.is_consistent() {
        return RenewalDecision::renew(Reason::InvalidRecord);
    }
    let not_after = cert.not_after;
    let days_left = not_after.saturating_sub(now) / SECONDS_PER_DAY;
    // a threshold beyond the representable range covers every certificate
    let inside_threshold = match threshold_days.checked_mul(SECONDS_PER_DAY) {
        Some(threshold) => not_after < now.saturating_add(threshold),
        None => true,
    };
    if inside_threshold {
        RenewalDecision::renew(Reason::Expiring {
            not_after,
            days_left,
        })
    } else {
        RenewalDecision {
            needs_renewal: false,
            reason: Reason::Valid {
                not_after,
                days_left,
            },
        }
    }
}

/// Which HTTPS call published the new certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpsAction {
    /// HTTPS was off and got turned on.
    Enabled,
    /// HTTPS was on and got rebound.
    Updated,
}

/// Result of a successful renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewal {
    /// Id the CDN assigned to the uploaded certificate.
    pub cert_id: String,
    pub https: HttpsAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(RenewalDecision),
    Renewed(Renewal),
}

/// Tally of one pass over a list of domains.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub renewed: Vec<String>,
    pub skipped: Vec<String>,
    /// In the order they happened.
    pub failed: Vec<(String, Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// The first failure, if any.
    pub fn into_result(self) -> Result<()> {
        match self.failed.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        }
    }
}

/// Keeps the certificates of CDN domains fresh.
pub struct Renewer<C, A, P> {
    cdn: C,
    authority: A,
    challenge: P,
    store: CertStore,
    user: AcmeUser,
    policy: Policy,
}

impl<C, A, P> Renewer<C, A, P>
where
    C: Cdn,
    A: CertificateAuthority,
    P: ChallengeProvider,
{
    pub fn new(
        cdn: C,
        authority: A,
        challenge: P,
        store: CertStore,
        user: AcmeUser,
        policy: Policy,
    ) -> Self {
        Renewer {
            cdn,
            authority,
            challenge,
            store,
            user,
            policy,
        }
    }

    pub fn cdn(&self) -> &C {
        &self.cdn
    }

    pub fn challenge(&self) -> &P {
        &self.challenge
    }

    pub fn store(&self) -> &CertStore {
        &self.store
    }

    /// Expiry check against the current time.
    pub fn check(&self, domain: &str) -> RenewalDecision {
        self.check_at(domain, now_unix())
    }

    /// Expiry check as of `now` (unix seconds).
    ///
    /// Never fails: when the CDN cannot be asked, the answer is "renew".
    pub fn check_at(&self, domain: &str, now: i64) -> RenewalDecision {
        let info = match self.cdn.domain_info(domain) {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to get domain info for {}: {}", domain, e);
                return RenewalDecision::renew(Reason::LookupFailed(e.to_string()));
            }
        };
        let cert_id = match info.bound_cert_id() {
            Some(id) => id,
            None => return RenewalDecision::renew(Reason::NoCertificate),
        };
        match self.cdn.certificate_info(cert_id) {
            Ok(cert) => decide(&cert, now, self.policy.threshold_days),
            Err(e) => {
                warn!("Failed to get certificate info for {}: {}", domain, e);
                RenewalDecision::renew(Reason::LookupFailed(e.to_string()))
            }
        }
    }

    /// Issue a new certificate for `domain` and bind it on the CDN,
    /// regardless of what is bound now.
    pub fn renew(&mut self, domain: &str) -> Result<Renewal> {
        info!("Requesting certificate for {}", domain);
        let issued = self
            .authority
            .issue(&self.user, domain, &mut self.challenge)?;
        self.store.save(domain, &issued)?;

        let stored = self.store.load(domain)?;
        let cert_id =
            self.cdn
                .upload_certificate(domain, stored.certificate(), stored.private_key())?;
        info!("Certificate uploaded to Qiniu with ID: {}", cert_id);

        let conf = ApiHttpsConf::new(&cert_id, self.policy.force_https, self.policy.http2);
        let info = self.cdn.domain_info(domain)?;
        let https = if info.bound_cert_id().is_none() {
            self.cdn.enable_https(domain, &conf)?;
            info!("HTTPS enabled for domain {}", domain);
            HttpsAction::Enabled
        } else {
            self.cdn.update_https_conf(domain, &conf)?;
            info!("HTTPS configuration updated for domain {}", domain);
            HttpsAction::Updated
        };

        Ok(Renewal { cert_id, https })
    }

    /// Check `domain` and renew it if needed.
    pub fn run(&mut self, domain: &str) -> Result<Outcome> {
        let decision = self.check(domain);
        if !decision.needs_renewal {
            info!("Skipping {}: {}", domain, decision.reason);
            return Ok(Outcome::Skipped(decision));
        }
        info!("Renewing {}: {}", domain, decision.reason);
        let renewal = self.renew(domain)?;
        Ok(Outcome::Renewed(renewal))
    }

    /// [`run`](#method.run) for each domain in order. A failing domain is
    /// logged and does not stop the others.
    pub fn run_batch<S: AsRef<str>>(&mut self, domains: &[S]) -> BatchReport {
        let mut report = BatchReport::default();
        for domain in domains {
            let domain = domain.as_ref();
            match self.run(domain) {
                Ok(Outcome::Skipped(_)) => report.skipped.push(domain.to_string()),
                Ok(Outcome::Renewed(_)) => report.renewed.push(domain.to_string()),
                Err(e) => {
                    error!("Failed to process domain {}: {}", domain, e);
                    report.failed.push((domain.to_string(), e));
                }
            }
        }
        info!(
            "Check finished: {} renewed, {} skipped, {} failed",
            report.renewed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }
}
