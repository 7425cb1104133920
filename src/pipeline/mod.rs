use log::{info, warn};

use crate::auth::cookies;
use crate::auth::session::{Session, SessionAuthenticator};
use crate::config::Config;
use crate::domain::mail::{MailId, SyncMode};
use crate::error::Result;
use crate::mail::delivery;
use crate::mail::sink::MailSink;
use crate::webmail::archive::{self, ArchiveRequest};
use crate::webmail::sync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The webmail had nothing matching the request.
    NothingNew,
    Delivered { ids: Vec<MailId>, marked: bool },
}

/// One pass: log in, fetch, deliver, then mark what was delivered.
///
/// `open_sink` is only called once the webmail returned an archive, so an
/// empty folder never touches the destination. The sink is finished whether
/// delivery succeeded or not, and marking only happens once every message
/// has reached it.
pub fn run<S, F>(cfg: &Config, open_sink: F) -> Result<Outcome>
where
    S: MailSink,
    F: FnOnce() -> Result<S>,
{
    let suffixes = cookies::load_public_suffixes(cfg.public_suffix_list.as_deref())?;
    let mut session = Session::new(cfg.base_url.clone(), suffixes)?;
    SessionAuthenticator::from_config(cfg).login(&mut session, &cfg.credentials)?;

    let request = ArchiveRequest {
        address: &cfg.address,
        folder: &cfg.folder,
        exclude_tag: cfg.sync.as_ref().and_then(SyncMode::exclude_tag),
    };
    let Some(archive) = archive::fetch(&mut session, &request)? else {
        info!("Nothing new");
        return Ok(Outcome::NothingNew);
    };

    let mut sink = open_sink()?;
    let delivered = delivery::deliver(archive, &mut sink, &cfg.address);
    close(&mut sink);
    let ids = delivered?;

    let marked = match &cfg.sync {
        Some(mode) if !ids.is_empty() => {
            sync::mark_processed(&mut session, &ids, mode)?;
            true
        }
        _ => false,
    };

    Ok(Outcome::Delivered { ids, marked })
}

fn close(sink: &mut impl MailSink) {
    if let Err(e) = sink.finish() {
        warn!("Closing mail sink: {e}");
    }
}
