//! Aliyun DNS (alidns) RPC client.
//!
//! Only the four calls needed for DNS-01 are implemented. Every call is a
//! signed GET against the RPC endpoint, see
//! <https://help.aliyun.com/document_detail/29747.html> for the signature.
#![allow(non_snake_case)]

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::dns::{DnsApi, DnsRecord};
use crate::util::{base64std, hmac_sha1, read_body, read_json};
use crate::{Error, Result};

/// Public RPC endpoint, valid for every region.
pub const ALIYUN_DNS_ENDPOINT: &str = "https://alidns.aliyuncs.com/";

pub const DEFAULT_REGION: &str = "cn-hangzhou";

const API_VERSION: &str = "2015-01-09";
const TIMEOUT: Duration = Duration::from_secs(30);
const ZONE_PAGE_SIZE: u32 = 100;
const RECORD_PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    Code: String,
    #[serde(default)]
    Message: String,
}

#[derive(Debug, Deserialize)]
struct ApiZone {
    DomainName: String,
}

#[derive(Debug, Deserialize, Default)]
struct ApiZones {
    #[serde(default)]
    Domain: Vec<ApiZone>,
}

#[derive(Debug, Deserialize)]
struct ApiDescribeDomains {
    #[serde(default)]
    TotalCount: u64,
    #[serde(default)]
    Domains: ApiZones,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    RecordId: String,
    RR: String,
    #[serde(default)]
    Value: String,
}

#[derive(Debug, Deserialize, Default)]
struct ApiRecords {
    #[serde(default)]
    Record: Vec<ApiRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiDescribeRecords {
    #[serde(default)]
    DomainRecords: ApiRecords,
}

#[derive(Debug, Deserialize)]
struct ApiRecordId {
    RecordId: String,
}

/// Blocking Aliyun DNS client.
#[derive(Clone)]
pub struct AliyunDns {
    access_key: String,
    secret_key: String,
    region: String,
    endpoint: String,
    agent: ureq::Agent,
}

impl AliyunDns {
    /// An empty region falls back to `cn-hangzhou`.
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Result<Self> {
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(Error::Config(
                "Aliyun DNS: access key and secret key are required".into(),
            ));
        }
        let region = if region.is_empty() {
            DEFAULT_REGION
        } else {
            region
        };
        Ok(AliyunDns {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
            endpoint: ALIYUN_DNS_ENDPOINT.to_string(),
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
        })
    }

    /// Point the client at another endpoint. Must end in `/`.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// The signed query string for one call, `Signature` last.
    fn signed_query(
        &self,
        action: &str,
        params: &[(&str, &str)],
        timestamp: &str,
        nonce: &str,
    ) -> Result<String> {
        let mut query: Vec<(&str, &str)> = vec![
            ("Format", "JSON"),
            ("Version", API_VERSION),
            ("AccessKeyId", self.access_key.as_str()),
            ("SignatureMethod", "HMAC-SHA1"),
            ("Timestamp", timestamp),
            ("SignatureVersion", "1.0"),
            ("SignatureNonce", nonce),
            ("RegionId", self.region.as_str()),
            ("Action", action),
        ];
        query.extend_from_slice(params);
        query.sort();

        let canonical = query
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let to_sign = format!("GET&{}&{}", encode("/"), encode(&canonical));
        let key = format!("{}&", self.secret_key);
        let signature = base64std(&hmac_sha1(key.as_bytes(), to_sign.as_bytes())?);

        Ok(format!("{}&Signature={}", canonical, encode(&signature)))
    }

    fn call<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<T> {
        let timestamp = time::strftime("%Y-%m-%dT%H:%M:%SZ", &time::now_utc())
            .map_err(|e| Error::Other(e.to_string()))?;
        let nonce = new_nonce()?;
        let url = format!(
            "{}?{}",
            self.endpoint,
            self.signed_query(action, params, &timestamp, &nonce)?
        );

        debug!("Call Aliyun DNS {}", action);
        trace!("{:?}", params);

        match self.agent.get(&url).call() {
            Ok(res) => read_json(&read_body(res)?),
            Err(ureq::Error::Status(status, res)) => {
                let body = read_body(res)?;
                warn!("Aliyun DNS error: {}", body);
                Err(dns_error(status, &body))
            }
            Err(ureq::Error::Transport(t)) => Err(Error::Dns(t.to_string())),
        }
    }
}

impl DnsApi for AliyunDns {
    fn list_zones(&self) -> Result<Vec<String>> {
        let page_size = ZONE_PAGE_SIZE.to_string();
        let mut zones = vec![];
        let mut page = 1u32;
        loop {
            let page_number = page.to_string();
            let res: ApiDescribeDomains = self.call(
                "DescribeDomains",
                &[
                    ("PageNumber", page_number.as_str()),
                    ("PageSize", page_size.as_str()),
                ],
            )?;
            let got = res.Domains.Domain.len();
            zones.extend(res.Domains.Domain.into_iter().map(|z| z.DomainName));
            if got == 0 || zones.len() as u64 >= res.TotalCount {
                break;
            }
            page += 1;
        }
        Ok(zones)
    }

    fn add_txt_record(&self, zone: &str, name: &str, value: &str, ttl: u32) -> Result<String> {
        let ttl = ttl.to_string();
        let res: ApiRecordId = self.call(
            "AddDomainRecord",
            &[
                ("DomainName", zone),
                ("RR", name),
                ("Type", "TXT"),
                ("Value", value),
                ("TTL", ttl.as_str()),
            ],
        )?;
        Ok(res.RecordId)
    }

    fn list_txt_records(&self, zone: &str, name: &str) -> Result<Vec<DnsRecord>> {
        let page_size = RECORD_PAGE_SIZE.to_string();
        let res: ApiDescribeRecords = self.call(
            "DescribeDomainRecords",
            &[
                ("DomainName", zone),
                ("RRKeyWord", name),
                ("Type", "TXT"),
                ("PageSize", page_size.as_str()),
            ],
        )?;
        Ok(res
            .DomainRecords
            .Record
            .into_iter()
            .map(|r| DnsRecord {
                id: r.RecordId,
                name: r.RR,
                value: r.Value,
            })
            .collect())
    }

    fn delete_record(&self, record_id: &str) -> Result<()> {
        let _: ApiRecordId = self.call("DeleteDomainRecord", &[("RecordId", record_id)])?;
        Ok(())
    }
}

impl std::fmt::Debug for AliyunDns {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("AliyunDns")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// RFC 3986 percent-encoding, the form the signature is computed over.
fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn new_nonce() -> Result<String> {
    let mut buf = [0u8; 16];
    openssl::rand::rand_bytes(&mut buf)?;
    Ok(buf.iter().map(|b| format!("{:02x}", b)).collect())
}

fn dns_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ApiError>(body) {
        Ok(e) if !e.Code.is_empty() => Error::Dns(format!("{} ({}): {}", e.Code, status, e.Message)),
        _ => Error::Dns(format!("HTTP {}: {}", status, body)),
    }
}
