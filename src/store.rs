//! Certificate files on disk.
//!
//! Each domain owns two files in the store directory, `<domain>.crt` with the
//! certificate chain and `<domain>.key` with the private key. A renewal
//! overwrites both; no history is kept.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use acme_lib::persist::{MemoryPersist, Persist, PersistKey, PersistKind};

use crate::acme::IssuedCertificate;
use crate::{Error, Result};

/// Directory of issued certificates, keyed by domain.
#[derive(Debug, Clone)]
pub struct CertStore {
    dir: PathBuf,
}

impl CertStore {
    /// Open the store, creating the directory (owner-only) if absent.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            create_private_dir(&dir).map_err(|e| {
                Error::Config(format!(
                    "failed to create certificate directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(CertStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cert_path(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{}.crt", file_stem(domain)))
    }

    pub fn key_path(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{}.key", file_stem(domain)))
    }

    /// Write the certificate and key of `domain`, replacing earlier ones.
    pub fn save(&self, domain: &str, cert: &IssuedCertificate) -> Result<()> {
        let cert_path = self.cert_path(domain);
        let key_path = self.key_path(domain);
        write_private(&cert_path, cert.certificate().as_bytes())?;
        write_private(&key_path, cert.private_key().as_bytes())?;
        info!("Certificate saved at: {}", cert_path.display());
        info!("Private key saved at: {}", key_path.display());
        Ok(())
    }

    /// Read back what `save` wrote for `domain`.
    pub fn load(&self, domain: &str) -> Result<IssuedCertificate> {
        let certificate = fs::read_to_string(self.cert_path(domain)).map_err(|e| {
            Error::Other(format!("failed to read certificate file: {}", e))
        })?;
        let private_key = fs::read_to_string(self.key_path(domain))
            .map_err(|e| Error::Other(format!("failed to read key file: {}", e)))?;
        Ok(IssuedCertificate::new(private_key, certificate))
    }
}

/// Persistence handed to the ACME client.
///
/// The account key is kept on disk next to the certificates so one ACME
/// account is reused across runs. The per-order keys and certificates the
/// client stores as well are only kept in memory; [`CertStore`] owns the
/// files for those.
///
/// [`CertStore`]: struct.CertStore.html
#[derive(Clone)]
pub struct AccountPersist {
    dir: PathBuf,
    memory: MemoryPersist,
}

impl AccountPersist {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        AccountPersist {
            dir: dir.as_ref().to_path_buf(),
            memory: MemoryPersist::new(),
        }
    }

    fn account_key_path(&self, key: &PersistKey) -> PathBuf {
        self.dir.join(format!("account-{}.key", key.realm))
    }
}

impl Persist for AccountPersist {
    fn put(&self, key: &PersistKey, value: &[u8]) -> acme_lib::Result<()> {
        match key.kind {
            PersistKind::AccountPrivateKey => {
                Ok(write_private(&self.account_key_path(key), value)?)
            }
            _ => self.memory.put(key, value),
        }
    }

    fn get(&self, key: &PersistKey) -> acme_lib::Result<Option<Vec<u8>>> {
        match key.kind {
            PersistKind::AccountPrivateKey => {
                let path = self.account_key_path(key);
                if path.is_file() {
                    Ok(Some(fs::read(path)?))
                } else {
                    Ok(None)
                }
            }
            _ => self.memory.get(key),
        }
    }
}

/// `*.example.com` is stored as `_.example.com`.
fn file_stem(domain: &str) -> String {
    domain.replace('*', "_")
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private(path: &Path, value: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(path)?;
    let mut permissions = f.metadata()?.permissions();
    permissions.set_mode(0o600);
    f.set_permissions(permissions)?;
    f.write_all(value)
}

#[cfg(not(unix))]
fn write_private(path: &Path, value: &[u8]) -> std::io::Result<()> {
    fs::File::create(path)?.write_all(value)
}
