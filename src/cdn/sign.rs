use crate::util::{base64url, hmac_sha1};
use crate::{Error, Result};

/// Content type of every CDN API call.
pub(crate) const CONTENT_TYPE: &str = "application/json";

/// Qiniu access/secret key pair.
///
/// Signs requests with the "Qiniu" token scheme: HMAC-SHA1 over method,
/// path, host, content type and body, url-safe base64 encoded.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self> {
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(Error::Config(
                "access key and secret key cannot be empty".into(),
            ));
        }
        Ok(Credentials {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// `<access key>:<signature of data>`
    pub fn sign(&self, data: &[u8]) -> Result<String> {
        let digest = hmac_sha1(self.secret_key.as_bytes(), data)?;
        Ok(format!("{}:{}", self.access_key, base64url(&digest)))
    }

    /// Value of the `Authorization` header for a request.
    ///
    /// `path_and_query` starts with `/`. The body only takes part in the
    /// signature when it is not an octet stream.
    pub fn authorization(
        &self,
        method: &str,
        host: &str,
        path_and_query: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<String> {
        let mut data = format!("{} {}\nHost: {}", method, path_and_query, host).into_bytes();
        if !content_type.is_empty() {
            data.extend_from_slice(b"\nContent-Type: ");
            data.extend_from_slice(content_type.as_bytes());
        }
        data.extend_from_slice(b"\n\n");
        if !body.is_empty() && content_type != "application/octet-stream" {
            data.extend_from_slice(body);
        }
        Ok(format!("Qiniu {}", self.sign(&data)?))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .finish()
    }
}
