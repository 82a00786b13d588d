//! Small helper shared by Restore, Diff, and Optimize: read `metadata.json`
//! out of an artifact without fully extracting it, transparently handling
//! the `.age`-sealed case.

use std::path::Path;

use crate::archive::read_entry;
use crate::encrypt::Encryptor;
use crate::error::{Error, ErrorKind, Result};
use crate::metadata::{Metadata, METADATA_FILENAME};

/// `true` if `path`'s name ends in the canonical `.age` suffix.
pub fn is_encrypted(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("age")
}

/// Read and parse `metadata.json` from `artifact`, decrypting through a
/// temporary file first if the artifact is sealed.
pub fn read_metadata(artifact: &Path, key_path: Option<&Path>) -> Result<Metadata> {
    let bytes = if is_encrypted(artifact) {
        let key_path = key_path.ok_or_else(|| Error::encryption_key_missing("~/.stash.key"))?;
        let tmp = tempfile::NamedTempFile::new().map_err(Error::from)?;
        Encryptor::new(key_path).decrypt(artifact, tmp.path())?;
        read_entry(tmp.path(), METADATA_FILENAME)?
    } else {
        read_entry(artifact, METADATA_FILENAME)?
    };

    let bytes = bytes.ok_or_else(|| {
        Error::new(ErrorKind::ArchiveCorrupt, format!("`{METADATA_FILENAME}` missing from artifact"))
            .with_path(artifact)
    })?;

    Metadata::from_json(&bytes)
}
