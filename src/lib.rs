#![warn(clippy::all)]
//! qiniu-ssl keeps the HTTPS certificates of [Qiniu](https://www.qiniu.com/) CDN
//! domains issued by [Let's Encrypt](https://letsencrypt.org/).
//!
//! Domain ownership is proven with the ACME DNS-01 challenge, placing the
//! `_acme-challenge` TXT record through the Aliyun DNS API. The issued
//! certificate is kept on disk, uploaded to Qiniu and bound to the domain.
//!
//! Install the binary like so:
//!
//! ```text
//! cargo install qiniu-ssl
//! ```
//!
//! # Quick start
//!
//! ```text
//! qiniu-ssl --qak <qiniu-ak> --qsk <qiniu-sk> \
//!           --aak <aliyun-ak> --ask <aliyun-sk> \
//!           -d cdn.example.com -e ops@example.com -f
//! ```
//!
//! Every key can also come from the environment: `QINIU_ACCESS_KEY`,
//! `QINIU_SECRET_KEY`, `ALIYUN_ACCESS_KEY`, `ALIYUN_SECRET_KEY` and
//! `ALIYUN_REGION`.
//!
//! A certificate is only requested when the one bound on the CDN has fewer
//! than `--threshold` days left (default 30), or when none is bound. With
//! `--daemon` the check is repeated every `--check-interval` days until
//! SIGINT or SIGTERM.
//!
//! ## Domain lists
//!
//! `--domains-file` reads one domain per line. Blank lines and lines
//! starting with `#` are skipped.
//!
//! ```text
//! # production
//! cdn.example.com
//! static.example.com
//! ```
//!
//! ## Certificate files
//!
//! Issued certificates are written to `--cert-dir` (default `certs`) as
//! `<domain>.crt` and `<domain>.key`, readable by the owner only. The ACME
//! account key is kept there too, so later runs reuse the same account.
//!
//! # Library use
//!
//! The workflow is in [`renew::Renewer`], generic over the CDN
//! ([`cdn::Cdn`]), the certificate authority ([`acme::CertificateAuthority`])
//! and the DNS challenge ([`dns::ChallengeProvider`]).
//!
//! [`renew::Renewer`]: renew/struct.Renewer.html
//! [`cdn::Cdn`]: cdn/trait.Cdn.html
//! [`acme::CertificateAuthority`]: acme/trait.CertificateAuthority.html
//! [`dns::ChallengeProvider`]: dns/trait.ChallengeProvider.html
//!
//! ## Logging
//!
//! Uses the `log` crate. The binary logs at `info` by default, see
//! `RUST_LOG` in [env_logger](https://docs.rs/env_logger).
#[macro_use]
extern crate log;

mod error;
mod util;

pub mod acme;
pub mod cdn;
pub mod config;
pub mod daemon;
pub mod dns;
pub mod renew;
pub mod store;

#[cfg(test)]
mod test;

pub use crate::error::{Error, Result};
