use std::fs;
use std::path::Path;

use log::debug;

use crate::domain::mail::MailRecord;
use crate::error::{Error, Result};
use crate::mail::lmtp::LmtpSink;
use crate::mail::maildir::MaildirSink;

/// Where extracted messages end up.
pub trait MailSink {
    /// Delivers one message; `mail.content` must be read to the end.
    fn deliver(&mut self, mail: MailRecord<'_>, recipient: &str) -> Result<()>;

    /// Called once after the last message.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: MailSink + ?Sized> MailSink for &mut S {
    fn deliver(&mut self, mail: MailRecord<'_>, recipient: &str) -> Result<()> {
        (**self).deliver(mail, recipient)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<S: MailSink + ?Sized> MailSink for Box<S> {
    fn deliver(&mut self, mail: MailRecord<'_>, recipient: &str) -> Result<()> {
        (**self).deliver(mail, recipient)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkKind {
    /// Maildir when the destination is a directory, LMTP otherwise.
    #[default]
    Auto,
    Lmtp,
    Maildir,
}

/// Opens the sink for `destination`, once per run.
pub fn open_sink(kind: SinkKind, destination: &Path) -> Result<Box<dyn MailSink>> {
    let kind = match kind {
        SinkKind::Auto => {
            let meta = fs::metadata(destination)
                .map_err(|e| Error::io(format!("inspecting {}", destination.display()), e))?;
            if meta.is_dir() {
                SinkKind::Maildir
            } else {
                SinkKind::Lmtp
            }
        }
        other => other,
    };
    debug!("Using {kind:?} sink at {}", destination.display());

    Ok(match kind {
        SinkKind::Maildir => Box::new(MaildirSink::open(destination)?),
        _ => Box::new(LmtpSink::connect(destination)?),
    })
}
