use keyring::{Entry, Error as KeyringError};

use crate::error::{Error, Result};

const SERVICE: &str = "zimbridge";

fn entry(username: &str) -> Result<Entry> {
    Entry::new(SERVICE, username).map_err(|e| Error::Keyring(e.to_string()))
}

/// Save the webmail password into the OS keyring for the given username
pub fn save_password(username: &str, password: &str) -> Result<()> {
    entry(username)?
        .set_password(password)
        .map_err(|e| Error::Keyring(e.to_string()))
}

/// Load the webmail password from the keyring, `None` when nothing is stored
pub fn load_password(username: &str) -> Result<Option<String>> {
    match entry(username)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(Error::Keyring(e.to_string())),
    }
}
