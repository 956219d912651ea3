use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use serde::de::DeserializeOwned;

use crate::Result;

pub(crate) const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// URL-safe base64 with padding, as Qiniu tokens use it.
pub(crate) fn base64url<T: ?Sized + AsRef<[u8]>>(input: &T) -> String {
    URL_SAFE.encode(input)
}

pub(crate) fn base64std<T: ?Sized + AsRef<[u8]>>(input: &T) -> String {
    STANDARD.encode(input)
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let pkey = PKey::hmac(key)?;
    let mut signer = Signer::new(MessageDigest::sha1(), &pkey)?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
}

pub(crate) fn now_unix() -> i64 {
    time::get_time().sec
}

/// Formats unix seconds as `YYYY-MM-DD` (UTC) for log lines.
pub(crate) fn format_day(secs: i64) -> String {
    let tm = time::at_utc(time::Timespec::new(secs, 0));
    match time::strftime("%Y-%m-%d", &tm) {
        Ok(s) => s,
        Err(_) => secs.to_string(),
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    debug!("{}", body);
    Ok(serde_json::from_str(body)?)
}

pub(crate) fn read_body(res: ureq::Response) -> Result<String> {
    use std::io::Read;
    let mut body = String::new();
    res.into_reader().read_to_string(&mut body)?;
    Ok(body)
}
