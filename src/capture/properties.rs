use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::Serialize;
use sha2::Sha256;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::capture::pcap_reader::{CaptureError, ReaderStats};

/// File-level facts about a capture: identity, hashes, time span and link type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureProperties {
    pub file_name: String,
    pub file_size: u64,
    pub md5_hash: String,
    pub sha256_hash: String,
    pub first_packet_utc: Option<DateTime<Utc>>,
    pub last_packet_utc: Option<DateTime<Utc>>,
    pub link_type: String,
}

impl CaptureProperties {
    /// Stat and hash `path`; packet times come from the reader's pass over it.
    pub fn collect(
        path: &Path,
        link_type: String,
        stats: &ReaderStats,
    ) -> Result<Self, CaptureError> {
        let metadata_error = |source| CaptureError::Metadata {
            path: path.to_path_buf(),
            source,
        };
        let file_size = std::fs::metadata(path).map_err(metadata_error)?.len();
        let (md5_hash, sha256_hash) = hash_file(path).map_err(metadata_error)?;

        Ok(CaptureProperties {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            file_size,
            md5_hash,
            sha256_hash,
            first_packet_utc: stats.first_packet.map(DateTime::<Utc>::from),
            last_packet_utc: stats.last_packet.map(DateTime::<Utc>::from),
            link_type,
        })
    }
}

/// MD5 and SHA-256 of a file as lowercase hex, computed in one read.
pub fn hash_file(path: &Path) -> io::Result<(String, String)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        sha256.update(&buf[..n]);
    }

    Ok((hex::encode(md5.finalize()), hex::encode(sha256.finalize())))
}
