use std::collections::HashSet;

use log::{debug, info};
use publicsuffix::List;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use crate::auth::cookies;
use crate::auth::form::{FormExtractor, FormPolicy};
use crate::config::{Config, Credentials, LoginFields};
use crate::error::{Error, Result};

/// Cookie-bearing HTTP client shared by every stage of a run.
pub struct Session {
    client: Client,
    base_url: Url,
    last_url: Option<Url>,
    requests: usize,
}

impl Session {
    /// `suffixes` scopes the cookie jar so that a cookie set for a public
    /// suffix never reaches other sites.
    pub fn new(base_url: Url, suffixes: List) -> Result<Self> {
        let client = Client::builder()
            .cookie_provider(cookies::cookie_jar(suffixes))
            .user_agent(concat!("zimbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transport(base_url.as_str(), e))?;
        Ok(Self {
            client,
            base_url,
            last_url: None,
            requests: 0,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Final URL of the latest response, after redirects.
    pub fn last_url(&self) -> Option<&Url> {
        self.last_url.as_ref()
    }

    /// Number of requests sent so far; redirects followed by the client
    /// are not counted separately.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Resolves `path` against the webmail base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|source| Error::InvalidUrl {
            url: path.to_string(),
            source,
        })
    }

    pub fn get(&mut self, url: Url) -> Result<Response> {
        debug!("GET {url}");
        let resp = self.client.get(url.clone()).send();
        self.record(url, resp)
    }

    pub fn post_form(&mut self, url: Url, fields: &[(String, String)]) -> Result<Response> {
        debug!("POST {url} ({} fields)", fields.len());
        let resp = self.client.post(url.clone()).form(fields).send();
        self.record(url, resp)
    }

    pub fn post_json<T: Serialize + ?Sized>(&mut self, url: Url, body: &T) -> Result<Response> {
        debug!("POST {url} (json)");
        let resp = self.client.post(url.clone()).json(body).send();
        self.record(url, resp)
    }

    fn record(&mut self, url: Url, resp: reqwest::Result<Response>) -> Result<Response> {
        self.requests += 1;
        let resp = resp.map_err(|e| Error::transport(url.as_str(), e))?;
        self.last_url = Some(resp.url().clone());
        Ok(resp)
    }
}

/// Content type without parameters, empty when the header is absent.
pub(crate) fn content_type(resp: &Response) -> String {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Host and port must both match for two URLs to be the same site.
pub(crate) fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Walks the SSO chain until the session lands on the mail host.
pub struct SessionAuthenticator {
    policy: FormPolicy,
    login_fields: LoginFields,
    max_steps: usize,
}

impl SessionAuthenticator {
    pub fn new(policy: FormPolicy, login_fields: LoginFields, max_steps: usize) -> Self {
        Self {
            policy,
            login_fields,
            max_steps,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.form_policy, cfg.login_fields.clone(), cfg.max_login_steps)
    }

    pub fn login(&self, session: &mut Session, credentials: &Credentials) -> Result<()> {
        let target = session.base_url().clone();
        let extractor = FormExtractor::new(self.policy, credentials);
        let mut submitted: HashSet<Url> = HashSet::new();

        info!("Requesting login form");
        let mut step = 1;
        let mut resp = session.get(target.clone())?;

        loop {
            let (page_url, body) = html_page(step, resp)?;
            debug!("Login step {step} landed on {page_url}");

            if same_origin(&page_url, &target) {
                info!("Logged in after {step} step(s)");
                return Ok(());
            }
            if step >= self.max_steps {
                return Err(Error::TooManyLoginSteps {
                    limit: self.max_steps,
                });
            }

            let mut form = extractor.extract(&body, &page_url)?;
            if step == 1 && self.policy == FormPolicy::HiddenOnly {
                info!("Logging in as {}", credentials.username);
                let fields = &self.login_fields;
                form.push(fields.username.clone(), credentials.username.clone());
                form.push(fields.password.clone(), credentials.password.clone());
                form.push(fields.submit_name.clone(), fields.submit_value.clone());
            } else {
                info!("Following SSO step to {}", form.submit_url);
            }

            if !submitted.insert(form.submit_url.clone()) {
                return Err(Error::LoginLoop {
                    url: form.submit_url.to_string(),
                });
            }

            step += 1;
            resp = session.post_form(form.submit_url, &form.fields)?;
        }
    }
}

/// Checks a login step response and reads its HTML body.
fn html_page(step: usize, resp: Response) -> Result<(Url, String)> {
    let url = resp.url().clone();
    if resp.status() != StatusCode::OK {
        return Err(Error::AuthStepFailed {
            step,
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }
    let ct = content_type(&resp);
    if !ct.starts_with("text/html") {
        return Err(Error::ContentTypeMismatch {
            url: url.to_string(),
            expected: "text/html",
            found: ct,
        });
    }
    let body = resp.text().map_err(|e| Error::transport(url.as_str(), e))?;
    Ok((url, body))
}
