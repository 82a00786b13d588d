//! File-granularity authenticated encryption using a single asymmetric
//! identity stored on disk.
//!
//! Built on the `age` crate's X25519 recipient/identity primitives: a
//! fresh identity is generated once, written as a file with a leading
//! `# created: <recipient>` comment, and used to seal or unseal a file
//! stream via `age::x25519::Identity` and `age::Encryptor`/`age::Decryptor`.
//! `secrecy` wraps the decoded secret in memory, the same way the sibling
//! `bestool` example wraps credentials.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use age::secrecy::ExposeSecret;
use age::x25519;

use crate::error::{Error, ErrorKind, Result};

/// Manages the on-disk identity and seals/unseals artifacts to it.
pub struct Encryptor {
    key_path: std::path::PathBuf,
}

impl Encryptor {
    /// Build an encryptor bound to the identity file at `key_path`.
    pub fn new(key_path: impl Into<std::path::PathBuf>) -> Self {
        Encryptor { key_path: key_path.into() }
    }

    /// `true` if the identity file already exists.
    pub fn key_exists(&self) -> bool {
        self.key_path.is_file()
    }

    /// Generate a fresh identity and write it to `self.key_path`.
    ///
    /// Fails if the file already exists: the secret file is the sole ground
    /// truth and must never be silently overwritten.
    pub fn generate_key(&self) -> Result<x25519::Recipient> {
        if self.key_exists() {
            return Err(Error::new(
                ErrorKind::Other,
                format!("identity file `{}` already exists", self.key_path.display()),
            )
            .with_path(&self.key_path)
            .with_suggestion("remove the existing key or choose a different --key-path"));
        }

        let identity = x25519::Identity::generate();
        let recipient = identity.to_public();

        let contents = format!("# created: {}\n{}\n", recipient, identity.to_string().expose_secret());

        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.key_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        Ok(recipient)
    }

    /// Load the identity from disk.
    fn load_identity(&self) -> Result<x25519::Identity> {
        if !self.key_exists() {
            return Err(Error::encryption_key_missing(&self.key_path));
        }
        let contents = fs::read_to_string(&self.key_path)?;
        let secret_line = contents
            .lines()
            .find(|line| !line.trim().is_empty() && !line.starts_with('#'))
            .ok_or_else(|| {
                Error::new(ErrorKind::Config, "identity file contains no secret line")
                    .with_path(&self.key_path)
            })?;

        x25519::Identity::from_str(secret_line.trim()).map_err(|e| {
            Error::new(ErrorKind::Config, format!("malformed identity: {e}")).with_path(&self.key_path)
        })
    }

    /// Derive the recipient (public key) for the managed identity.
    pub fn recipient(&self) -> Result<x25519::Recipient> {
        Ok(self.load_identity()?.to_public())
    }

    /// Seal `in_path` into a self-contained authenticated ciphertext at
    /// `out_path`, keyed only to this identity's recipient.
    pub fn encrypt(&self, in_path: &Path, out_path: &Path) -> Result<()> {
        let recipient = self.recipient()?;
        let mut input = fs::File::open(in_path)?;
        let output = fs::File::create(out_path)?;

        let encryptor = age::Encryptor::with_recipients(vec![Box::new(recipient)])
            .ok_or_else(|| Error::new(ErrorKind::Other, "no recipients configured"))?;

        let mut writer = encryptor
            .wrap_output(output)
            .map_err(|e| Error::new(ErrorKind::Other, format!("failed to start sealing: {e}")))?;

        std::io::copy(&mut input, &mut writer)?;
        writer
            .finish()
            .map_err(|e| Error::new(ErrorKind::Other, format!("failed to finish sealing: {e}")))?;

        Ok(())
    }

    /// Unseal `in_path` into `out_path`. Any authentication failure or
    /// wrong identity surfaces as [`ErrorKind::DecryptionFailed`].
    pub fn decrypt(&self, in_path: &Path, out_path: &Path) -> Result<()> {
        let identity = self.load_identity()?;
        let input = fs::File::open(in_path)?;

        let decryptor = match age::Decryptor::new(input) {
            Ok(age::Decryptor::Recipients(d)) => d,
            Ok(_) => return Err(Error::decryption_failed(in_path)),
            Err(_) => return Err(Error::decryption_failed(in_path)),
        };

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|_| Error::decryption_failed(in_path))?;

        let mut output = fs::File::create(out_path)?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|_| Error::decryption_failed(in_path))?;
        output.write_all(&buf)?;
        output.sync_all()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_key_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id.key");
        let enc = Encryptor::new(&key_path);
        enc.generate_key().unwrap();
        assert!(enc.generate_key().is_err());
    }

    #[test]
    fn generate_key_writes_comment_header() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id.key");
        Encryptor::new(&key_path).generate_key().unwrap();

        let contents = fs::read_to_string(&key_path).unwrap();
        assert!(contents.starts_with("# created: age1"));
    }

    #[cfg(unix)]
    #[test]
    fn generate_key_sets_mode_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id.key");
        Encryptor::new(&key_path).generate_key().unwrap();
        let mode = fs::metadata(&key_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id.key");
        let enc = Encryptor::new(&key_path);
        enc.generate_key().unwrap();

        let plain_path = dir.path().join("plain.bin");
        fs::write(&plain_path, b"super secret dotfiles").unwrap();

        let sealed_path = dir.path().join("sealed.age");
        enc.encrypt(&plain_path, &sealed_path).unwrap();
        assert_ne!(fs::read(&sealed_path).unwrap(), b"super secret dotfiles");

        let opened_path = dir.path().join("opened.bin");
        enc.decrypt(&sealed_path, &opened_path).unwrap();
        assert_eq!(fs::read(&opened_path).unwrap(), b"super secret dotfiles");
    }

    #[test]
    fn decrypt_with_wrong_identity_fails() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id.key");
        let enc = Encryptor::new(&key_path);
        enc.generate_key().unwrap();

        let plain_path = dir.path().join("plain.bin");
        fs::write(&plain_path, b"data").unwrap();
        let sealed_path = dir.path().join("sealed.age");
        enc.encrypt(&plain_path, &sealed_path).unwrap();

        let other_key_path = dir.path().join("other.key");
        let other = Encryptor::new(&other_key_path);
        other.generate_key().unwrap();

        let opened_path = dir.path().join("opened.bin");
        let err = other.decrypt(&sealed_path, &opened_path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecryptionFailed);
    }

    #[test]
    fn encrypt_without_key_fails_with_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("missing.key");
        let enc = Encryptor::new(&key_path);

        let plain_path = dir.path().join("plain.bin");
        fs::write(&plain_path, b"data").unwrap();
        let out_path = dir.path().join("out.age");

        let err = enc.encrypt(&plain_path, &out_path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EncryptionKeyMissing);
    }
}
