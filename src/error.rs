//! Error types shared by every stage of the bridge.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Network, DNS or TLS failure while talking to the webmail.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    /// A login step answered with something other than 200.
    #[error("login step {step} ({url}): unexpected status code {status}")]
    AuthStepFailed { step: usize, url: String, status: u16 },

    #[error("{url}: unexpected content-type {found:?}, expected {expected}")]
    ContentTypeMismatch {
        url: String,
        expected: &'static str,
        found: String,
    },

    /// No usable `<form>` in a login page.
    #[error("no usable form in {url}")]
    FormNotFound { url: String },

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The SSO chain asked us to submit to a URL we already posted to.
    #[error("login loop detected: {url} was already submitted")]
    LoginLoop { url: String },

    #[error("login did not reach the mail host within {limit} steps")]
    TooManyLoginSteps { limit: usize },

    #[error("{url}: unexpected status code {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Corrupt gzip or tar stream.
    #[error("malformed archive: {0}")]
    MalformedArchive(#[source] std::io::Error),

    #[error("cannot deliver {entry}: {source}")]
    DeliveryFailed {
        entry: String,
        source: Box<Error>,
    },

    /// The LMTP server rejected a command.
    #[error("LMTP {command}: {code} {message}")]
    Lmtp {
        command: &'static str,
        code: u16,
        message: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("invalid maildir {path}: {reason}")]
    InvalidMaildir { path: PathBuf, reason: String },

    #[error("cannot write to maildir {path}: {source}")]
    Maildir {
        path: PathBuf,
        source: maildirpp::Error,
    },

    /// The public suffix list used to scope cookies could not be parsed.
    #[error("invalid public suffix list {origin}: {source}")]
    PublicSuffixList {
        origin: String,
        source: publicsuffix::Error,
    },

    #[error("remote {op} action failed with status {status}")]
    RemoteActionFailed { op: &'static str, status: u16 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("keyring error: {0}")]
    Keyring(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }
}
