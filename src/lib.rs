//! Bridge from a Zimbra webmail account to a local mail store.
//!
//! A run logs in through the SSO form chain, downloads the folder as a
//! tarball, hands each message to a [`mail::sink::MailSink`] and finally
//! tags or trashes the delivered messages on the webmail.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod webmail;
