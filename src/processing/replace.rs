//! In-place file replacement

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::Result;

/// Replace `destination` with `bytes`, keeping the given permission bits.
///
/// The bytes land in a sibling temp file first and are renamed over the
/// destination, so a crash mid-write never leaves a truncated image behind.
/// On failure the temp file is removed and the destination is untouched.
/// A read-only destination is refused with `PermissionDenied`, as a direct
/// overwrite would be.
pub fn replace_file(destination: &Path, bytes: &[u8], permissions: Permissions) -> Result<()> {
    if permissions.readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{} is read-only", destination.display()),
        )
        .into());
    }

    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(directory)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;
    temp.persist(destination).map_err(|e| e.error)?;
    Ok(())
}
