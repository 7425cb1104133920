//! Requests made to the webmail once the session is authenticated.

pub mod archive;
pub mod sync;
