//! Command line and environment configuration.
//!
//! [`Cli`] is what the user types; [`Settings`] is the validated result the
//! rest of the program runs on. Everything here is checked before the first
//! network call.
//!
//! [`Cli`]: struct.Cli.html
//! [`Settings`]: struct.Settings.html
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::acme::AcmeDirectory;
use crate::dns::aliyun::DEFAULT_REGION;
use crate::renew::Policy;
use crate::util::SECONDS_PER_DAY;
use crate::{Error, Result};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "qiniu-ssl",
    version,
    about = "Apply for Let's Encrypt SSL certificates using Aliyun DNS challenge and upload to Qiniu CDN"
)]
pub struct Cli {
    /// Qiniu access key
    #[arg(long, visible_alias = "qak", env = "QINIU_ACCESS_KEY", hide_env_values = true)]
    pub qiniu_access_key: Option<String>,

    /// Qiniu secret key
    #[arg(long, visible_alias = "qsk", env = "QINIU_SECRET_KEY", hide_env_values = true)]
    pub qiniu_secret_key: Option<String>,

    /// Aliyun access key for DNS challenge
    #[arg(long, visible_alias = "aak", env = "ALIYUN_ACCESS_KEY", hide_env_values = true)]
    pub aliyun_access_key: Option<String>,

    /// Aliyun secret key for DNS challenge
    #[arg(long, visible_alias = "ask", env = "ALIYUN_SECRET_KEY", hide_env_values = true)]
    pub aliyun_secret_key: Option<String>,

    /// Aliyun region for DNS API
    #[arg(long, visible_alias = "ar", env = "ALIYUN_REGION", default_value = DEFAULT_REGION)]
    pub aliyun_region: String,

    /// Domain name for the certificate
    #[arg(short, long)]
    pub domain: Option<String>,

    /// File with domains to check, one per line (repeatable)
    #[arg(long = "domains-file", visible_alias = "df")]
    pub domains_files: Vec<PathBuf>,

    /// Email address for Let's Encrypt
    #[arg(short, long)]
    pub email: Option<String>,

    /// Directory to store certificates
    #[arg(short, long, default_value = "certs")]
    pub cert_dir: PathBuf,

    /// Force HTTPS for the domain
    #[arg(short, long)]
    pub force_https: bool,

    /// Enable HTTP/2 for the domain
    #[arg(long, visible_alias = "h2", default_value_t = true, action = clap::ArgAction::Set)]
    pub http2: bool,

    /// Interval in days between certificate expiry checks
    #[arg(short = 'i', long, default_value_t = 7, allow_negative_numbers = true)]
    pub check_interval: i64,

    /// Number of days before expiry to trigger renewal
    #[arg(short, long, default_value_t = 30, allow_negative_numbers = true)]
    pub threshold: i64,

    /// Run as a daemon, checking periodically
    #[arg(long)]
    pub daemon: bool,

    /// Log file path (if not specified, logs to stdout)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Seconds to wait for the challenge TXT record to propagate
    #[arg(long, env = "ALIYUN_POLLING_INTERVAL", default_value_t = 60)]
    pub dns_wait: u64,

    /// Use the Let's Encrypt staging directory
    #[arg(long, conflicts_with = "acme_directory")]
    pub staging: bool,

    /// ACME directory URL, instead of Let's Encrypt
    #[arg(long)]
    pub acme_directory: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub qiniu_access_key: String,
    pub qiniu_secret_key: String,
    pub aliyun_access_key: String,
    pub aliyun_secret_key: String,
    pub aliyun_region: String,
    pub domains: Vec<String>,
    pub email: Option<String>,
    pub cert_dir: PathBuf,
    pub force_https: bool,
    pub http2: bool,
    pub check_interval_days: i64,
    pub threshold_days: i64,
    pub daemon: bool,
    pub log_file: Option<PathBuf>,
    pub dns_wait: Duration,
    pub acme_directory: AcmeDirectory,
}

impl Cli {
    /// Collect domains and check every constraint.
    pub fn into_settings(self) -> Result<Settings> {
        let domains = collect_domains(self.domain.as_deref(), &self.domains_files)?;
        if domains.is_empty() {
            return Err(Error::Config(
                "no domains specified, use --domain or --domains-file".into(),
            ));
        }

        let (qiniu_access_key, qiniu_secret_key) =
            require_pair(self.qiniu_access_key, self.qiniu_secret_key).ok_or_else(|| {
                Error::Config("qiniu access key and secret key are required".into())
            })?;
        let (aliyun_access_key, aliyun_secret_key) =
            require_pair(self.aliyun_access_key, self.aliyun_secret_key).ok_or_else(|| {
                Error::Config("aliyun access key and secret key are required".into())
            })?;

        validate_intervals(self.check_interval, self.threshold)?;

        let acme_directory = match (self.staging, self.acme_directory) {
            (_, Some(url)) => AcmeDirectory::Other(url),
            (true, None) => AcmeDirectory::LetsEncryptStaging,
            (false, None) => AcmeDirectory::LetsEncrypt,
        };

        Ok(Settings {
            qiniu_access_key,
            qiniu_secret_key,
            aliyun_access_key,
            aliyun_secret_key,
            aliyun_region: self.aliyun_region,
            domains,
            email: self.email.filter(|e| !e.is_empty()),
            cert_dir: self.cert_dir,
            force_https: self.force_https,
            http2: self.http2,
            check_interval_days: self.check_interval,
            threshold_days: self.threshold,
            daemon: self.daemon,
            log_file: self.log_file,
            dns_wait: Duration::from_secs(self.dns_wait),
            acme_directory,
        })
    }
}

impl Settings {
    pub fn policy(&self) -> Policy {
        Policy {
            force_https: self.force_https,
            http2: self.http2,
            threshold_days: self.threshold_days,
        }
    }

    /// Time between daemon cycles.
    pub fn check_interval(&self) -> Duration {
        let secs = self.check_interval_days.saturating_mul(SECONDS_PER_DAY).max(0);
        Duration::from_secs(secs as u64)
    }
}

fn require_pair(a: Option<String>, b: Option<String>) -> Option<(String, String)> {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some((a, b)),
        _ => None,
    }
}

/// Both must be positive and the interval shorter than the threshold, or a
/// certificate could expire between two checks.
pub fn validate_intervals(check_interval_days: i64, threshold_days: i64) -> Result<()> {
    if check_interval_days <= 0 {
        return Err(Error::Config("check interval must be greater than 0".into()));
    }
    if threshold_days <= 0 {
        return Err(Error::Config("threshold must be greater than 0".into()));
    }
    if check_interval_days >= threshold_days {
        return Err(Error::Config(
            "check interval must be less than threshold".into(),
        ));
    }
    if threshold_days.checked_mul(SECONDS_PER_DAY).is_none() {
        return Err(Error::Config(format!(
            "threshold of {} days is too large",
            threshold_days
        )));
    }
    Ok(())
}

/// Domains from a list file: one per line, `#` comments and blank lines skipped.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// `--domain` first, then every list file in order. Duplicates are dropped.
pub fn collect_domains<P: AsRef<Path>>(domain: Option<&str>, files: &[P]) -> Result<Vec<String>> {
    let mut domains: Vec<String> = vec![];
    let mut push = |d: String| {
        if !domains.contains(&d) {
            domains.push(d);
        }
    };

    if let Some(d) = domain.map(str::trim).filter(|d| !d.is_empty()) {
        push(d.to_string());
    }
    for file in files {
        let file = file.as_ref();
        let content = fs::read_to_string(file).map_err(|e| {
            Error::Config(format!(
                "failed to read domains file {}: {}",
                file.display(),
                e
            ))
        })?;
        for d in parse_domain_list(&content) {
            push(d);
        }
    }
    Ok(domains)
}
