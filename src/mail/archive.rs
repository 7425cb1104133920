use std::io::Read;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::{debug, warn};
use tar::Archive;

use crate::domain::mail::{ArchiveEntry, EntryKind};
use crate::error::{Error, Result};

pub const MAIL_EXTENSION: &str = "eml";

/// Streams a gzip'd tarball one entry at a time. Concatenated gzip members
/// are read as one stream.
pub struct ArchiveIngestor<R: Read> {
    archive: Archive<MultiGzDecoder<R>>,
}

impl<R: Read> ArchiveIngestor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            archive: Archive::new(MultiGzDecoder::new(reader)),
        }
    }

    /// Calls `f` with every regular `.eml` entry, in archive order.
    ///
    /// The entry content must be consumed inside `f`; it is gone once the
    /// next header is read.
    pub fn for_each_mail<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(ArchiveEntry<'_>) -> Result<()>,
    {
        let entries = self.archive.entries().map_err(Error::MalformedArchive)?;
        for entry in entries {
            let mut entry = entry.map_err(Error::MalformedArchive)?;
            let path = split_path(&entry.path_bytes());
            let entry_type = entry.header().entry_type();

            let kind = if entry_type.is_file() {
                EntryKind::Regular
            } else {
                EntryKind::Other(entry_type.as_byte())
            };
            if let EntryKind::Other(flag) = kind {
                warn!("Ignoring irregular file {} (type {:?})", path.join("/"), flag as char);
                continue;
            }

            if !is_mail(&path) {
                debug!("Skipping {}", path.join("/"));
                continue;
            }

            f(ArchiveEntry {
                path,
                kind,
                content: &mut entry,
            })?;
        }
        Ok(())
    }
}

fn split_path(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

fn is_mail(path: &[String]) -> bool {
    path.last()
        .and_then(|name| Path::new(name).extension())
        .is_some_and(|ext| ext == MAIL_EXTENSION)
}
