use std::io::Read;

use log::{debug, info, warn};

use crate::domain::mail::{ArchiveEntry, MailId, MailRecord};
use crate::error::{Error, Result};
use crate::mail::archive::ArchiveIngestor;
use crate::mail::sink::MailSink;

/// Webmail id encoded in an archive file name: the part before the first
/// `-`, without leading zeros. `None` when there is no `-`.
pub fn message_id(file_name: &str) -> Option<MailId> {
    let (prefix, _) = file_name.split_once('-')?;
    Some(prefix.trim_start_matches('0').to_string())
}

/// Feeds every mail of a compressed archive to `sink`.
///
/// Returns the ids of delivered messages in archive order. Entries whose
/// name carries no id are skipped; any sink failure aborts the whole run.
pub fn deliver<R: Read>(archive: R, sink: &mut dyn MailSink, recipient: &str) -> Result<Vec<MailId>> {
    let mut ids = Vec::new();

    info!("Reading archive");
    ArchiveIngestor::new(archive).for_each_mail(|entry| {
        let name = entry.display_path();
        let ArchiveEntry { path, content, .. } = entry;
        let Some((file_name, folders)) = path.split_last() else {
            return Ok(());
        };
        let Some(id) = message_id(file_name) else {
            warn!("Cannot find id in file name {name}");
            return Ok(());
        };

        debug!("Delivering e-mail {name}");
        let mail = MailRecord {
            id: id.clone(),
            folders,
            file_name,
            content,
        };
        sink.deliver(mail, recipient)
            .map_err(|e| Error::DeliveryFailed {
                entry: name,
                source: Box::new(e),
            })?;

        ids.push(id);
        Ok(())
    })?;

    info!("Stored {} e-mails", ids.len());
    Ok(ids)
}
