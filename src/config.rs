use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::auth::form::FormPolicy;
use crate::domain::mail::SyncMode;
use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://mail.etu.cyu.fr/";
pub const DEFAULT_FOLDER: &str = "Inbox";
pub const DEFAULT_MAX_LOGIN_STEPS: usize = 16;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.masked_password())
            .finish()
    }
}

/// Names of the fields injected into the first login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginFields {
    pub username: String,
    pub password: String,
    pub submit_name: String,
    pub submit_value: String,
}

impl Default for LoginFields {
    fn default() -> Self {
        Self {
            username: "username".to_string(),
            password: "password".to_string(),
            submit_name: "submit".to_string(),
            submit_value: "SE CONNECTER".to_string(),
        }
    }
}

/// Everything one run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub credentials: Credentials,
    pub address: String,
    pub folder: String,
    pub sync: Option<SyncMode>,
    pub form_policy: FormPolicy,
    pub login_fields: LoginFields,
    pub max_login_steps: usize,
    /// Public suffix list file; the cached download is used when unset.
    pub public_suffix_list: Option<PathBuf>,
}

impl Config {
    pub fn new(base_url: Url, credentials: Credentials, address: impl Into<String>) -> Self {
        Self {
            base_url,
            credentials,
            address: address.into(),
            folder: DEFAULT_FOLDER.to_string(),
            sync: None,
            form_policy: FormPolicy::default(),
            login_fields: LoginFields::default(),
            max_login_steps: DEFAULT_MAX_LOGIN_STEPS,
            public_suffix_list: None,
        }
    }

    /// Overrides defaults with whatever the config file sets.
    pub fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        if let Some(base_url) = file.base_url {
            self.base_url = parse_base_url(&base_url)?;
        }
        if let Some(folder) = file.folder {
            self.folder = folder;
        }
        if let Some(policy) = file.form_policy {
            self.form_policy = policy;
        }
        if let Some(fields) = file.login_fields {
            self.login_fields = fields;
        }
        if let Some(steps) = file.max_login_steps {
            if steps == 0 {
                return Err(Error::Config("max_login_steps must be at least 1".into()));
            }
            self.max_login_steps = steps;
        }
        if let Some(path) = file.public_suffix_list {
            self.public_suffix_list = Some(path);
        }
        Ok(())
    }
}

/// Parses the webmail base URL, making sure relative joins stay under it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("base URL {raw} has no host")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Optional settings read from `config.toml`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub folder: Option<String>,
    pub form_policy: Option<FormPolicy>,
    pub max_login_steps: Option<usize>,
    pub login_fields: Option<LoginFields>,
    pub public_suffix_list: Option<PathBuf>,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| Error::Config("no config dir available".into()))?
        .join("zimbridge"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `path`, or the default location when `path` is `None`.
///
/// A missing default file yields an empty config; an explicit path must exist.
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = config_path()?;
            if !p.exists() {
                return Ok(FileConfig::default());
            }
            p
        }
    };
    let s = fs::read_to_string(&path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    parse_file_config(&s).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

pub fn parse_file_config(s: &str) -> std::result::Result<FileConfig, toml::de::Error> {
    toml::from_str(s)
}
