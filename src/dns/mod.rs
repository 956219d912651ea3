//! DNS-01 challenge handling.
//!
//! [`DnsChallenge`] places and removes the `_acme-challenge` TXT record
//! through any [`DnsApi`]. The only shipped API is Aliyun DNS.
//!
//! [`DnsChallenge`]: struct.DnsChallenge.html
//! [`DnsApi`]: trait.DnsApi.html
use std::collections::HashMap;
use std::time::Duration;

use crate::{Error, Result};

pub mod aliyun;

/// Label prepended to the domain to form the challenge record name.
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// TTL of challenge records. 600 is the lowest Aliyun accepts on free plans.
pub const CHALLENGE_TTL: u32 = 600;

/// Default wait between placing the record and asking for validation.
pub const DEFAULT_PROPAGATION_WAIT: Duration = Duration::from_secs(60);

/// A DNS record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    /// Record name relative to its zone (`@` for the apex).
    pub name: String,
    pub value: String,
}

/// Record operations offered by a DNS provider account.
pub trait DnsApi {
    /// Names of all zones hosted by the account.
    fn list_zones(&self) -> Result<Vec<String>>;
    /// Create a TXT record, returning its id.
    fn add_txt_record(&self, zone: &str, name: &str, value: &str, ttl: u32) -> Result<String>;
    /// TXT records in `zone` whose relative name is `name`.
    fn list_txt_records(&self, zone: &str, name: &str) -> Result<Vec<DnsRecord>>;
    fn delete_record(&self, record_id: &str) -> Result<()>;
}

/// The hooks an ACME authority needs to prove control of a domain via DNS.
pub trait ChallengeProvider {
    /// Publish `proof` as the TXT record for `domain`.
    fn present(&mut self, domain: &str, proof: &str) -> Result<()>;
    /// Remove the TXT record(s) published for `domain`. Removing nothing is fine.
    fn cleanup(&mut self, domain: &str, proof: &str) -> Result<()>;
    /// How long to wait after `present` before validation is requested.
    fn timeout(&self) -> Duration;
}

/// Strips a wildcard prefix: `*.example.com` is validated as `example.com`.
pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// `_acme-challenge.<domain>`
pub fn challenge_fqdn(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_LABEL, normalize_domain(domain))
}

fn canonical(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Picks the zone owning `domain`: the longest zone that equals the domain
/// or is a parent of it on a label boundary.
pub fn find_zone<'a, S: AsRef<str>>(zones: &'a [S], domain: &str) -> Option<&'a str> {
    let domain = canonical(domain);
    zones
        .iter()
        .map(|z| z.as_ref())
        .filter(|z| {
            let zone = canonical(z);
            !zone.is_empty()
                && (domain == zone || domain.ends_with(&format!(".{}", zone)))
        })
        .max_by_key(|z| canonical(z).len())
}

/// Name of `fqdn` relative to `zone`, `@` for the apex.
pub fn relative_name(fqdn: &str, zone: &str) -> String {
    let fqdn = canonical(fqdn);
    let zone = canonical(zone);
    if fqdn == zone {
        return "@".to_string();
    }
    match fqdn.strip_suffix(&format!(".{}", zone)) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "@".to_string(),
    }
}

/// DNS-01 challenge provider over a [`DnsApi`](trait.DnsApi.html).
///
/// Every `present` resolves the zone afresh. The zone is remembered until
/// the matching `cleanup` so it removes the record where it was placed.
#[derive(Debug)]
pub struct DnsChallenge<D: DnsApi> {
    api: D,
    wait: Duration,
    pending: HashMap<String, String>,
}

impl<D: DnsApi> DnsChallenge<D> {
    pub fn new(api: D, wait: Duration) -> Self {
        DnsChallenge {
            api,
            wait,
            pending: HashMap::new(),
        }
    }

    pub fn api(&self) -> &D {
        &self.api
    }

    fn resolve_zone(&self, domain: &str) -> Result<String> {
        let zones = self.api.list_zones()?;
        let zone = find_zone(&zones, domain)
            .ok_or_else(|| Error::ZoneNotFound(domain.to_string()))?
            .to_string();
        debug!("Zone for {} is {}", domain, zone);
        Ok(zone)
    }
}

impl<D: DnsApi> ChallengeProvider for DnsChallenge<D> {
    fn present(&mut self, domain: &str, proof: &str) -> Result<()> {
        let domain = normalize_domain(domain);
        let zone = self.resolve_zone(domain)?;
        let name = relative_name(&challenge_fqdn(domain), &zone);
        let id = self.api.add_txt_record(&zone, &name, proof, CHALLENGE_TTL)?;
        info!("Created TXT record {} in zone {} (id {})", name, zone, id);
        self.pending.insert(domain.to_string(), zone);
        Ok(())
    }

    fn cleanup(&mut self, domain: &str, _proof: &str) -> Result<()> {
        let domain = normalize_domain(domain);
        let zone = match self.pending.remove(domain) {
            Some(zone) => zone,
            None => self.resolve_zone(domain)?,
        };
        let name = relative_name(&challenge_fqdn(domain), &zone);
        // providers may match names fuzzily, only delete exact matches
        let records = self.api.list_txt_records(&zone, &name)?;
        for record in records.iter().filter(|r| r.name == name) {
            self.api.delete_record(&record.id)?;
            info!("Deleted TXT record {} in zone {} (id {})", name, zone, record.id);
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.wait
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// DNS account kept in memory.
    #[derive(Default)]
    pub struct MemoryDns {
        pub zones: RefCell<Vec<String>>,
        pub records: RefCell<Vec<(String, DnsRecord)>>,
        pub zone_lists: Cell<usize>,
        next_id: Cell<u64>,
    }

    impl MemoryDns {
        pub fn with_zones(zones: &[&str]) -> Self {
            MemoryDns {
                zones: RefCell::new(zones.iter().map(|z| z.to_string()).collect()),
                ..Default::default()
            }
        }

        pub fn set_zones(&self, zones: &[&str]) {
            *self.zones.borrow_mut() = zones.iter().map(|z| z.to_string()).collect();
        }

        pub fn txt_count(&self, zone: &str, name: &str) -> usize {
            self.records
                .borrow()
                .iter()
                .filter(|(z, r)| z == zone && r.name == name)
                .count()
        }
    }

    impl DnsApi for MemoryDns {
        fn list_zones(&self) -> Result<Vec<String>> {
            self.zone_lists.set(self.zone_lists.get() + 1);
            Ok(self.zones.borrow().clone())
        }

        fn add_txt_record(&self, zone: &str, name: &str, value: &str, _ttl: u32) -> Result<String> {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            let record = DnsRecord {
                id: id.to_string(),
                name: name.to_string(),
                value: value.to_string(),
            };
            self.records.borrow_mut().push((zone.to_string(), record));
            Ok(id.to_string())
        }

        fn list_txt_records(&self, zone: &str, name: &str) -> Result<Vec<DnsRecord>> {
            // substring match, like the Aliyun keyword search
            Ok(self
                .records
                .borrow()
                .iter()
                .filter(|(z, r)| z == zone && r.name.contains(name))
                .map(|(_, r)| r.clone())
                .collect())
        }

        fn delete_record(&self, record_id: &str) -> Result<()> {
            self.records.borrow_mut().retain(|(_, r)| r.id != record_id);
            Ok(())
        }
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("example.com"), "example.com");
        assert_eq!(normalize_domain("*.example.com"), "example.com");
    }

    #[test]
    fn test_challenge_fqdn() {
        assert_eq!(challenge_fqdn("example.com"), "_acme-challenge.example.com");
        assert_eq!(challenge_fqdn("*.sub.example.com"), "_acme-challenge.sub.example.com");
    }

    #[test]
    fn test_find_zone_prefers_longest() {
        let zones = ["example.com", "sub.example.com"];
        assert_eq!(find_zone(&zones, "a.sub.example.com"), Some("sub.example.com"));
        assert_eq!(find_zone(&zones, "sub.example.com"), Some("sub.example.com"));
        assert_eq!(find_zone(&zones, "b.example.com"), Some("example.com"));
        assert_eq!(find_zone(&zones, "example.com"), Some("example.com"));
    }

    #[test]
    fn test_find_zone_label_boundary() {
        let zones = ["example.com"];
        assert_eq!(find_zone(&zones, "badexample.com"), None);
        assert_eq!(find_zone(&zones, "example.org"), None);
    }

    #[test]
    fn test_find_zone_ignores_case_and_trailing_dot() {
        let zones = ["Example.COM."];
        assert_eq!(find_zone(&zones, "www.example.com"), Some("Example.COM."));
    }

    #[test]
    fn test_relative_name() {
        assert_eq!(
            relative_name("_acme-challenge.a.sub.example.com", "sub.example.com"),
            "_acme-challenge.a"
        );
        assert_eq!(relative_name("_acme-challenge.example.com", "example.com"), "_acme-challenge");
        assert_eq!(relative_name("example.com", "example.com"), "@");
    }

    #[test]
    fn test_present_creates_record_in_most_specific_zone() {
        let mut ch = DnsChallenge::new(
            MemoryDns::with_zones(&["example.com", "sub.example.com"]),
            DEFAULT_PROPAGATION_WAIT,
        );
        ch.present("a.sub.example.com", "proof").unwrap();
        assert_eq!(ch.api().txt_count("sub.example.com", "_acme-challenge.a"), 1);
        assert_eq!(ch.api().txt_count("example.com", "_acme-challenge.a.sub"), 0);
    }

    #[test]
    fn test_present_then_cleanup_leaves_nothing() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        ch.present("www.example.com", "proof").unwrap();
        ch.cleanup("www.example.com", "proof").unwrap();
        assert_eq!(ch.api().txt_count("example.com", "_acme-challenge.www"), 0);
        // zone resolved once, reused by cleanup
        assert_eq!(ch.api().zone_lists.get(), 1);
    }

    #[test]
    fn test_present_sees_zone_changes() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        ch.present("a.sub.example.com", "proof").unwrap();
        ch.cleanup("a.sub.example.com", "proof").unwrap();

        ch.api().set_zones(&["example.com", "sub.example.com"]);
        ch.present("a.sub.example.com", "proof").unwrap();
        assert_eq!(ch.api().txt_count("sub.example.com", "_acme-challenge.a"), 1);
        assert_eq!(ch.api().txt_count("example.com", "_acme-challenge.a.sub"), 0);

        ch.cleanup("a.sub.example.com", "proof").unwrap();
        assert_eq!(ch.api().txt_count("sub.example.com", "_acme-challenge.a"), 0);
        assert_eq!(ch.api().zone_lists.get(), 2);
    }

    #[test]
    fn test_cleanup_uses_zone_of_present() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        ch.present("a.sub.example.com", "proof").unwrap();
        // zone added mid-validation; the record still lives in example.com
        ch.api().set_zones(&["example.com", "sub.example.com"]);
        ch.cleanup("a.sub.example.com", "proof").unwrap();
        assert_eq!(ch.api().txt_count("example.com", "_acme-challenge.a.sub"), 0);
    }

    #[test]
    fn test_cleanup_without_present_resolves_zone() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        ch.api()
            .add_txt_record("example.com", "_acme-challenge.www", "stale", CHALLENGE_TTL)
            .unwrap();
        ch.cleanup("www.example.com", "stale").unwrap();
        assert_eq!(ch.api().txt_count("example.com", "_acme-challenge.www"), 0);
        assert_eq!(ch.api().zone_lists.get(), 1);
    }

    #[test]
    fn test_cleanup_only_deletes_exact_names() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        ch.present("www2.example.com", "keep").unwrap();
        ch.present("www.example.com", "proof").unwrap();
        ch.cleanup("www.example.com", "proof").unwrap();
        assert_eq!(ch.api().txt_count("example.com", "_acme-challenge.www2"), 1);
    }

    #[test]
    fn test_cleanup_without_records_is_ok() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        ch.cleanup("www.example.com", "proof").unwrap();
        ch.cleanup("www.example.com", "proof").unwrap();
    }

    #[test]
    fn test_zone_not_found() {
        let mut ch = DnsChallenge::new(MemoryDns::with_zones(&["example.com"]), DEFAULT_PROPAGATION_WAIT);
        match ch.present("www.example.org", "proof") {
            Err(Error::ZoneNotFound(d)) => assert_eq!(d, "www.example.org"),
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn test_timeout_is_configured_wait() {
        let ch = DnsChallenge::new(MemoryDns::default(), Duration::from_secs(5));
        assert_eq!(ch.timeout(), Duration::from_secs(5));
    }
}
