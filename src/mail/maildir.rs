//! Maildir++ delivery: `tmp`/`new`/`cur` at every level, sub-folders as
//! dot-prefixed siblings marked with a `maildirfolder` file.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::mail::MailRecord;
use crate::error::{Error, Result};
use crate::mail::sink::MailSink;

const SUBDIRS: [&str; 3] = ["tmp", "new", "cur"];
const FOLDER_MARKER: &str = "maildirfolder";

pub struct Maildir {
    inner: maildirpp::Maildir,
    root: bool,
}

impl Maildir {
    /// Opens an existing top-level maildir.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        for sub in SUBDIRS {
            let sub_path = path.join(sub);
            let meta = fs::metadata(&sub_path)
                .map_err(|e| Error::io(format!("inspecting {}", sub_path.display()), e))?;
            if !meta.is_dir() {
                return Err(Error::InvalidMaildir {
                    path,
                    reason: format!("{sub} is not a directory"),
                });
            }
        }
        if path.join(FOLDER_MARKER).exists() {
            return Err(Error::InvalidMaildir {
                path,
                reason: format!("{FOLDER_MARKER} present, not a top-level maildir"),
            });
        }
        Ok(Self {
            inner: maildirpp::Maildir::from(path),
            root: true,
        })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Creates (or reuses) the sub-folder `folder` of this maildir.
    pub fn add_folder(&self, folder: &str) -> Result<Maildir> {
        let path = if self.root {
            self.path().join(format!(".{folder}"))
        } else {
            let mut name = OsString::from(self.path().as_os_str());
            name.push(".");
            name.push(folder);
            PathBuf::from(name)
        };

        let inner = maildirpp::Maildir::from(path);
        inner.create_dirs().map_err(|source| Error::Maildir {
            path: inner.path().to_path_buf(),
            source,
        })?;

        let marker = inner.path().join(FOLDER_MARKER);
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
            .open(&marker)
            .map_err(|e| Error::io(format!("creating {}", marker.display()), e))?;

        Ok(Maildir { inner, root: false })
    }

    /// Stores `content` through `tmp/` into `new/` and returns the final path.
    ///
    /// Nothing is left in `tmp/` when reading or storing fails.
    pub fn add_mail(&self, content: &mut dyn Read) -> Result<PathBuf> {
        let mut data = Vec::new();
        content
            .read_to_end(&mut data)
            .map_err(|e| Error::io("reading mail from archive", e))?;

        let id = self.inner.store_new(&data).map_err(|source| Error::Maildir {
            path: self.path().to_path_buf(),
            source,
        })?;

        let target = self.path().join("new").join(id);
        debug!("Stored {}", target.display());
        Ok(target)
    }
}

/// Writes messages into a maildir, recreating the archive's folder tree.
pub struct MaildirSink {
    root: Maildir,
}

impl MaildirSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: Maildir::open(path)?,
        })
    }
}

impl MailSink for MaildirSink {
    fn deliver(&mut self, mail: MailRecord<'_>, _recipient: &str) -> Result<()> {
        let mut folder: Option<Maildir> = None;
        for name in mail.folders {
            let parent = folder.as_ref().unwrap_or(&self.root);
            folder = Some(parent.add_folder(name)?);
        }
        folder.as_ref().unwrap_or(&self.root).add_mail(mail.content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::TempDir;

    fn new_maildir() -> (TempDir, Maildir) {
        let dir = TempDir::new().unwrap();
        for sub in SUBDIRS {
            fs::create_dir(dir.path().join(sub)).unwrap();
        }
        let md = Maildir::open(dir.path()).unwrap();
        (dir, md)
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[test]
    fn open_requires_all_subdirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("tmp")).unwrap();
        fs::create_dir(dir.path().join("new")).unwrap();
        assert!(matches!(Maildir::open(dir.path()), Err(Error::Io { .. })));

        fs::write(dir.path().join("cur"), b"").unwrap();
        assert!(matches!(
            Maildir::open(dir.path()),
            Err(Error::InvalidMaildir { .. })
        ));
    }

    #[test]
    fn open_rejects_sub_folder() {
        let (dir, _) = new_maildir();
        fs::write(dir.path().join(FOLDER_MARKER), b"").unwrap();
        assert!(matches!(
            Maildir::open(dir.path()),
            Err(Error::InvalidMaildir { .. })
        ));
    }

    #[test]
    fn nested_folders_use_dot_names() {
        let (dir, md) = new_maildir();
        let work = md.add_folder("Work").unwrap();
        let project = work.add_folder("Project").unwrap();

        assert_eq!(work.path(), dir.path().join(".Work"));
        assert_eq!(project.path(), dir.path().join(".Work.Project"));
        for folder in [work.path(), project.path()] {
            for sub in SUBDIRS {
                assert!(folder.join(sub).is_dir());
            }
            assert!(folder.join(FOLDER_MARKER).is_file());
        }
        assert!(!dir.path().join(FOLDER_MARKER).exists());

        // Idempotent.
        md.add_folder("Work").unwrap();
    }

    #[test]
    fn mail_round_trips_byte_for_byte() {
        let (_dir, md) = new_maildir();
        let body: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();

        let path = md.add_mail(&mut body.as_slice()).unwrap();

        assert_eq!(path.parent().unwrap(), md.path().join("new"));
        assert_eq!(fs::read(&path).unwrap(), body);
        assert!(files_in(&md.path().join("tmp")).is_empty());
    }

    struct BrokenReader(usize);

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::other("connection reset"));
            }
            let n = self.0.min(buf.len());
            buf[..n].fill(b'x');
            self.0 -= n;
            Ok(n)
        }
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let (_dir, md) = new_maildir();
        let err = md.add_mail(&mut BrokenReader(4096)).unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert!(files_in(&md.path().join("tmp")).is_empty());
        assert!(files_in(&md.path().join("new")).is_empty());
    }

    #[test]
    fn store_failure_cleans_up_tmp() {
        let (dir, md) = new_maildir();
        fs::remove_dir(dir.path().join("new")).unwrap();

        let err = md.add_mail(&mut &b"Subject: lost\r\n\r\n"[..]).unwrap_err();

        assert!(matches!(err, Error::Maildir { ref path, .. } if path == dir.path()));
        assert!(files_in(&dir.path().join("tmp")).is_empty());
    }

    #[test]
    fn stored_mail_is_listed_as_new() {
        let (dir, md) = new_maildir();
        md.add_mail(&mut &b"one"[..]).unwrap();
        md.add_mail(&mut &b"two"[..]).unwrap();

        let listed = maildirpp::Maildir::from(dir.path().to_path_buf());
        assert_eq!(listed.count_new(), 2);
        assert_eq!(listed.count_cur(), 0);
    }

    #[test]
    fn sink_recreates_folder_tree() {
        let (dir, _) = new_maildir();
        let mut sink = MaildirSink::open(dir.path()).unwrap();
        let folders = vec!["Inbox".to_string(), "Lists".to_string()];
        let mut body: &[u8] = b"Subject: hi\r\n\r\nhello\r\n";

        sink.deliver(
            MailRecord {
                id: "12".into(),
                folders: &folders,
                file_name: "0012-hi.eml",
                content: &mut body,
            },
            "jdoe@example.org",
        )
        .unwrap();

        let stored = files_in(&dir.path().join(".Inbox.Lists").join("new"));
        assert_eq!(stored.len(), 1);
        assert_eq!(fs::read(&stored[0]).unwrap(), b"Subject: hi\r\n\r\nhello\r\n");
        assert!(dir.path().join(".Inbox").join(FOLDER_MARKER).is_file());
    }
}
