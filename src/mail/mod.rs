pub mod archive;
pub mod delivery;
pub mod lmtp;
pub mod maildir;
pub mod sink;
