// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `signature` module computes a stable `(file_size, digest)` identity for a media file,
//! used to bind a persisted index to the file it was built from.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::checksum::Sha1;
use crate::errors::{file_read_error, Result};

/// The size of each hashed region, in bytes.
const SIGNATURE_REGION_LEN: u64 = 1024 * 1024;

/// A file's identity: its size and a 160-bit digest of its first and last megabyte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileSignature {
    pub file_size: i64,
    pub digest: [u8; 20],
}

/// Computes the `(file_size, digest)` identity of the file at `path`.
///
/// Hashes up to the first `1 MiB` of the file, then up to the last `1 MiB`. For files shorter
/// than 2 MiB these regions overlap, and in the case of files under 1 MiB they are identical,
/// so the whole file is hashed twice; this is deliberate and stable.
pub fn calculate_file_signature(path: &Path) -> Result<FileSignature> {
    let context = || format!("failed to hash '{}'", path.display());

    let mut file = File::open(path).map_err(|e| file_read_error(context(), e))?;

    let mut sha1 = Sha1::default();
    let mut buf = vec![0u8; SIGNATURE_REGION_LEN as usize];

    let result = (|| -> Result<i64> {
        let read = read_region(&mut file, &mut buf).map_err(|e| file_read_error(context(), e))?;
        sha1.update(&buf[..read]);

        let file_size = file.seek(SeekFrom::End(0)).map_err(|e| file_read_error(context(), e))?;

        let tail_start = file_size.saturating_sub(SIGNATURE_REGION_LEN);
        file.seek(SeekFrom::Start(tail_start)).map_err(|e| file_read_error(context(), e))?;

        let read = read_region(&mut file, &mut buf).map_err(|e| file_read_error(context(), e))?;
        sha1.update(&buf[..read]);

        Ok(file_size as i64)
    })();

    // The hash must be finalized regardless of whether the read loop above succeeded, so that
    // hash state is released deterministically.
    let digest = sha1.finalize();

    let file_size = result?;

    Ok(FileSignature { file_size, digest })
}

fn read_region(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;

    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn signs_a_small_file() {
        // S1: a 3-byte file hashes its bytes twice (first/last MiB regions fully overlap).
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x41, 0x42, 0x43]).unwrap();
        file.flush().unwrap();

        let sig = calculate_file_signature(file.path()).unwrap();
        assert_eq!(sig.file_size, 3);

        let mut expected = Sha1::default();
        expected.update(&[0x41, 0x42, 0x43, 0x41, 0x42, 0x43]);
        assert_eq!(sig.digest, expected.finalize());
    }

    #[test]
    fn signature_is_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"deterministic content for hashing").unwrap();
        file.flush().unwrap();

        let a = calculate_file_signature(file.path()).unwrap();
        let b = calculate_file_signature(file.path()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_yields_different_signature() {
        let mut a_file = tempfile::NamedTempFile::new().unwrap();
        a_file.write_all(b"file A content").unwrap();
        a_file.flush().unwrap();

        let mut b_file = tempfile::NamedTempFile::new().unwrap();
        b_file.write_all(b"file B content, a different length").unwrap();
        b_file.flush().unwrap();

        let a = calculate_file_signature(a_file.path()).unwrap();
        let b = calculate_file_signature(b_file.path()).unwrap();
        assert_ne!(a, b);
    }
}
