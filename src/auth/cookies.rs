//! Session cookie jar, scoped with the public suffix list.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use cookie_store::CookieStore;
use log::{debug, info, warn};
use publicsuffix::List;
use reqwest_cookie_store::CookieStoreMutex;

use crate::error::{Error, Result};

pub const PUBLIC_SUFFIX_URL: &str = "https://publicsuffix.org/list/public_suffix_list.dat";

const CACHE_FILE: &str = "public_suffix_list.dat";
const MAX_CACHE_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Cookie store handed to the HTTP client. Cookies whose domain is a public
/// suffix (`Domain=fr`) are refused unless the suffix is the host itself.
pub fn cookie_jar(suffixes: List) -> Arc<CookieStoreMutex> {
    Arc::new(CookieStoreMutex::new(CookieStore::new(Some(suffixes))))
}

pub fn parse_public_suffixes(text: &str, origin: &str) -> Result<List> {
    text.parse().map_err(|source| Error::PublicSuffixList {
        origin: origin.to_string(),
        source,
    })
}

/// Reads the list from `path` when given. Otherwise uses the copy cached in
/// the user cache dir, downloading it when missing or older than 30 days.
pub fn load_public_suffixes(path: Option<&Path>) -> Result<List> {
    if let Some(path) = path {
        return read_list(path);
    }

    let cached = cache_path()?;
    let age = fs::metadata(&cached)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());

    match age {
        Some(age) if age < MAX_CACHE_AGE => read_list(&cached),
        Some(_) => match download() {
            Ok(text) => cache(&cached, text),
            Err(e) => {
                warn!("Cannot refresh public suffix list ({e}), using cached copy");
                read_list(&cached)
            }
        },
        None => cache(&cached, download()?),
    }
}

fn cache_path() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .ok_or_else(|| Error::Config("no cache dir available".into()))?
        .join("zimbridge")
        .join(CACHE_FILE))
}

fn read_list(path: &Path) -> Result<List> {
    debug!("Reading public suffix list {}", path.display());
    let text = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    parse_public_suffixes(&text, &path.display().to_string())
}

fn download() -> Result<String> {
    info!("Downloading public suffix list");
    reqwest::blocking::get(PUBLIC_SUFFIX_URL)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .map_err(|e| Error::transport(PUBLIC_SUFFIX_URL, e))
}

/// Parses a freshly downloaded list, then keeps it for the next runs.
fn cache(cached: &Path, text: String) -> Result<List> {
    let list = parse_public_suffixes(&text, PUBLIC_SUFFIX_URL)?;
    let written = match cached.parent() {
        Some(dir) => fs::create_dir_all(dir).and_then(|_| fs::write(cached, &text)),
        None => fs::write(cached, &text),
    };
    if let Err(e) = written {
        warn!("Cannot cache public suffix list in {}: {e}", cached.display());
    }
    Ok(list)
}
