use std::fmt;
use std::io::Read;

/// Remote identifier of a delivered message, derived from its archive path.
pub type MailId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    /// Directories, links and anything else; carries the raw tar type flag.
    Other(u8),
}

/// One member of the downloaded archive, borrowed from the tar stream.
pub struct ArchiveEntry<'a> {
    pub path: Vec<String>,
    pub kind: EntryKind,
    pub content: &'a mut dyn Read,
}

impl ArchiveEntry<'_> {
    pub fn file_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// Every segment but the last.
    pub fn folders(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, folders)) => folders,
            None => &[],
        }
    }

    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// A message on its way to a sink.
pub struct MailRecord<'a> {
    pub id: MailId,
    pub folders: &'a [String],
    pub file_name: &'a str,
    pub content: &'a mut dyn Read,
}

/// What to do on the webmail once messages are safely delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    Tag(String),
    Trash,
}

impl SyncMode {
    pub fn op(&self) -> &'static str {
        match self {
            SyncMode::Tag(_) => "tag",
            SyncMode::Trash => "trash",
        }
    }

    /// Tag to exclude from the next archive fetch, if any.
    pub fn exclude_tag(&self) -> Option<&str> {
        match self {
            SyncMode::Tag(tag) => Some(tag),
            SyncMode::Trash => None,
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Tag(tag) => write!(f, "tag {tag}"),
            SyncMode::Trash => f.write_str("trash"),
        }
    }
}
