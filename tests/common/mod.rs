//! Fake webmail hosts for integration tests, built on `tiny_http`.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use flate2::Compression;
use flate2::write::GzEncoder;
use publicsuffix::List;
use tiny_http::{Header, Response, Server};
use url::Url;
use zimbridge::auth::cookies;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path and query, as sent.
    pub url: String,
    pub cookie: String,
    pub body: String,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or("")
    }

    /// Decoded `application/x-www-form-urlencoded` body or query.
    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn query(&self) -> Vec<(String, String)> {
        let query = self.url.split_once('?').map(|(_, q)| q).unwrap_or("");
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.form()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::status(200)
            .header("Content-Type", "text/html;charset=utf-8")
            .body(body.into().into_bytes())
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::status(302).header("Location", location)
    }

    pub fn tgz(archive: Vec<u8>) -> Self {
        Self::status(200)
            .header("Content-Type", "application/x-compressed-tar")
            .body(archive)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// One fake host listening on an ephemeral port.
pub struct FakeServer {
    server: Server,
    pub url: Url,
    pub log: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeServer {
    pub fn bind() -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().port();
        Self {
            server,
            url: Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serves requests with `handler` on a background thread.
    pub fn run<F>(self, handler: F) -> Handle
    where
        F: Fn(&Recorded) -> Reply + Send + 'static,
    {
        let handle = Handle {
            url: self.url.clone(),
            log: self.log.clone(),
        };
        let log = self.log;
        let server = self.server;
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let cookie = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Cookie"))
                    .map(|h| h.value.as_str().to_string())
                    .unwrap_or_default();
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    cookie,
                    body,
                };
                let reply = handler(&recorded);
                log.lock().unwrap().push(recorded);

                let mut response = Response::from_data(reply.body).with_status_code(reply.status);
                for (name, value) in reply.headers {
                    response.add_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
                }
                let _ = request.respond(response);
            }
        });
        handle
    }
}

#[derive(Clone)]
pub struct Handle {
    pub url: Url,
    pub log: Arc<Mutex<Vec<Recorded>>>,
}

impl Handle {
    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn join(&self, path: &str) -> String {
        self.url.join(path).unwrap().to_string()
    }
}

pub const USERNAME: &str = "e-jdoe";
pub const PASSWORD: &str = "s3cret";
pub const ADDRESS: &str = "jdoe@etu.example.org";

/// Enough of the public suffix list for the fake hosts and a few real TLDs.
pub const SUFFIXES: &str = "// ===BEGIN ICANN DOMAINS===\nfr\norg\ncom\n// ===END ICANN DOMAINS===\n";

pub fn suffixes() -> List {
    cookies::parse_public_suffixes(SUFFIXES, "tests").unwrap()
}

/// `SUFFIXES` written to a file once per test binary, for configs.
pub fn suffix_list_file() -> &'static Path {
    static FILE: OnceLock<PathBuf> = OnceLock::new();
    FILE.get_or_init(|| {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SUFFIXES.as_bytes()).unwrap();
        let (_, path) = file.keep().unwrap();
        path
    })
}

pub fn login_form(action: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><body>
        <form id="fm1" action="{action}" method="post">
          <input type="text" name="username">
          <input type="password" name="password">
          <input type="hidden" name="lt" value="LT-1">
          <input type="hidden" name="execution" value="e1s1">
          <input type="submit" name="submit" value="SE CONNECTER">
        </form></body></html>"#
    )
}

pub fn auto_post_form(action: &str, field: &str, value: &str) -> String {
    format!(
        r#"<html><body onload="document.forms[0].submit()">
        <form action="{action}" method="POST">
          <input type="hidden" name="{field}" value="{value}">
          <noscript><input type="submit" value="Continue"></noscript>
        </form></body></html>"#
    )
}

pub fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Mail host plus CAS-like auth host wired into a three step SSO chain:
/// `GET /` on mail redirects to the auth login form, posting credentials
/// yields an auto-submit form back to the mail host, which sets the session
/// cookie.
///
/// `mail` handles whatever the mail host serves once logged in.
pub fn webmail<F>(mail: F) -> (Handle, Handle)
where
    F: Fn(&Recorded) -> Reply + Send + 'static,
{
    let mail_server = FakeServer::bind();
    let auth_server = FakeServer::bind();
    let mail_url = mail_server.url.clone();
    let auth_url = auth_server.url.clone();

    let sso_target = mail_url.join("service/extension/samlreceiver").unwrap().to_string();
    let auth = auth_server.run(move |req| match (req.method.as_str(), req.path()) {
        ("GET", "/cas/login") => Reply::html(login_form("/cas/login")),
        ("POST", "/cas/login") => {
            if req.field("username").as_deref() == Some(USERNAME)
                && req.field("password").as_deref() == Some(PASSWORD)
            {
                Reply::html(auto_post_form(&sso_target, "SAMLResponse", "PHNhbWw+"))
            } else {
                Reply::status(401)
            }
        }
        _ => Reply::status(404),
    });

    let login_url = auth_url.join("cas/login").unwrap().to_string();
    let mail = mail_server.run(move |req| {
        let logged_in = req.cookie.contains("ZM_AUTH_TOKEN=tok");
        match (req.method.as_str(), req.path()) {
            ("POST", "/service/extension/samlreceiver") => Reply::redirect("/")
                .header("Set-Cookie", "ZM_AUTH_TOKEN=tok; Path=/; HttpOnly"),
            ("GET", "/") if logged_in => Reply::html("<html><body>Zimbra</body></html>"),
            ("GET", "/") => Reply::redirect(login_url.clone()),
            _ if !logged_in => Reply::status(401),
            _ => mail(req),
        }
    });

    (mail, auth)
}
