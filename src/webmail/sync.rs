use log::{debug, info};
use reqwest::StatusCode;
use serde::Serialize;

use crate::auth::session::Session;
use crate::domain::mail::{MailId, SyncMode};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
pub struct SoapEnvelope<'a> {
    #[serde(rename = "Body")]
    pub body: SoapBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct SoapBody<'a> {
    #[serde(rename = "MsgActionRequest")]
    pub msg_action: MsgActionRequest<'a>,
}

#[derive(Debug, Serialize)]
pub struct MsgActionRequest<'a> {
    #[serde(rename = "_jsns")]
    pub jsns: &'static str,
    pub action: MsgAction<'a>,
}

#[derive(Debug, Serialize)]
pub struct MsgAction<'a> {
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tn: Option<&'a str>,
    pub id: String,
}

impl<'a> SoapEnvelope<'a> {
    pub fn msg_action(mode: &'a SyncMode, ids: &[MailId]) -> Self {
        Self {
            body: SoapBody {
                msg_action: MsgActionRequest {
                    jsns: "urn:zimbraMail",
                    action: MsgAction {
                        op: mode.op(),
                        tn: mode.exclude_tag(),
                        id: ids.join(","),
                    },
                },
            },
        }
    }
}

/// Tags or trashes `ids` in one batched request so the next fetch skips them.
pub fn mark_processed(session: &mut Session, ids: &[MailId], mode: &SyncMode) -> Result<()> {
    if ids.is_empty() {
        debug!("Nothing to {}", mode.op());
        return Ok(());
    }

    info!("Marking {} e-mail(s) with {mode}", ids.len());
    let url = session.endpoint("service/soap")?;
    let envelope = SoapEnvelope::msg_action(mode, ids);
    let resp = session.post_json(url, &envelope)?;

    if resp.status() != StatusCode::OK {
        return Err(Error::RemoteActionFailed {
            op: mode.op(),
            status: resp.status().as_u16(),
        });
    }
    Ok(())
}
