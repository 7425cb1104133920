use log::{debug, info};
use reqwest::StatusCode;
use reqwest::blocking::Response;
use url::Url;

use crate::auth::session::{Session, content_type};
use crate::error::{Error, Result};

pub const ARCHIVE_CONTENT_TYPE: &str = "application/x-compressed-tar";

/// Which folder of which mailbox to download, and what to leave out.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveRequest<'a> {
    pub address: &'a str,
    pub folder: &'a str,
    pub exclude_tag: Option<&'a str>,
}

impl ArchiveRequest<'_> {
    /// `GET /home/{address}/{folder}?fmt=tgz&meta=1[&query=not tag:{tag}]`
    pub fn url(&self, session: &Session) -> Result<Url> {
        let mut url = session.endpoint(&format!("home/{}/{}", self.address, self.folder))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fmt", "tgz").append_pair("meta", "1");
            if let Some(tag) = self.exclude_tag {
                query.append_pair("query", &format!("not tag:{tag}"));
            }
        }
        Ok(url)
    }
}

/// Downloads the folder as a gzip'd tarball.
///
/// Returns `None` when the server has nothing new (204). The response is
/// handed back unread so the archive can be streamed.
pub fn fetch(session: &mut Session, request: &ArchiveRequest<'_>) -> Result<Option<Response>> {
    let url = request.url(session)?;
    info!("Requesting tarball of {}", request.folder);
    let resp = session.get(url)?;
    let final_url = resp.url().to_string();

    match resp.status() {
        StatusCode::NO_CONTENT => {
            debug!("{final_url}: no content");
            return Ok(None);
        }
        StatusCode::OK => {}
        status => {
            return Err(Error::UnexpectedStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }
    }

    let ct = content_type(&resp);
    if !ct.starts_with(ARCHIVE_CONTENT_TYPE) {
        return Err(Error::ContentTypeMismatch {
            url: final_url,
            expected: ARCHIVE_CONTENT_TYPE,
            found: ct,
        });
    }

    debug!("Got tarball from {final_url}");
    Ok(Some(resp))
}
