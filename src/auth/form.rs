//! Login form discovery in SSO pages.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use log::debug;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Credentials;
use crate::error::{Error, Result};

/// How inputs of a form are turned into submitted fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormPolicy {
    /// First form; hidden inputs with a name and a value. Credentials are
    /// added by the caller.
    #[default]
    HiddenOnly,
    /// First POST form; hidden and submit inputs as-is, text and password
    /// inputs filled with the credentials.
    MethodAware,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDescriptor {
    pub submit_url: Url,
    pub fields: Vec<(String, String)>,
}

impl FormDescriptor {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Read-only view of a parsed HTML tree.
pub trait HtmlNode: Sized {
    /// Lowercase tag name for elements, `None` for text, comments, etc.
    fn tag_name(&self) -> Option<&str>;
    fn attr(&self, name: &str) -> Option<String>;
    fn children(&self) -> Vec<Self>;
}

impl HtmlNode for Handle {
    fn tag_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }

    fn attr(&self, name: &str) -> Option<String> {
        match &self.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|a| &*a.name.local == name)
                .map(|a| a.value.to_string()),
            _ => None,
        }
    }

    fn children(&self) -> Vec<Self> {
        self.children.borrow().clone()
    }
}

/// Pre-order traversal, `root` included, driven by an explicit stack.
pub struct Descendants<N> {
    stack: Vec<N>,
}

impl<N: HtmlNode> Iterator for Descendants<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let node = self.stack.pop()?;
        let mut children = node.children();
        children.reverse();
        self.stack.extend(children);
        Some(node)
    }
}

pub fn descendants<N: HtmlNode>(root: N) -> Descendants<N> {
    Descendants { stack: vec![root] }
}

pub struct FormExtractor<'a> {
    policy: FormPolicy,
    credentials: &'a Credentials,
}

impl<'a> FormExtractor<'a> {
    pub fn new(policy: FormPolicy, credentials: &'a Credentials) -> Self {
        Self {
            policy,
            credentials,
        }
    }

    pub fn policy(&self) -> FormPolicy {
        self.policy
    }

    /// Parses `html` and extracts the form, resolving its action against `page_url`.
    pub fn extract(&self, html: &str, page_url: &Url) -> Result<FormDescriptor> {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        self.extract_from(dom.document, page_url)
    }

    pub fn extract_from<N: HtmlNode>(&self, root: N, page_url: &Url) -> Result<FormDescriptor> {
        let form = descendants(root)
            .find(|n| n.tag_name() == Some("form") && self.accepts(n))
            .ok_or_else(|| Error::FormNotFound {
                url: page_url.to_string(),
            })?;

        let mut descriptor = FormDescriptor {
            submit_url: resolve_action(form.attr("action").as_deref(), page_url)?,
            fields: Vec::new(),
        };

        for input in descendants(form).filter(|n| n.tag_name() == Some("input")) {
            let name = input.attr("name").unwrap_or_default();
            let value = input.attr("value").unwrap_or_default();
            let kind = input
                .attr("type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string());

            match self.policy {
                FormPolicy::HiddenOnly => {
                    if kind == "hidden" && !name.is_empty() && !value.is_empty() {
                        descriptor.push(name, value);
                    }
                }
                FormPolicy::MethodAware => {
                    if name.is_empty() {
                        debug!("Dropping unnamed {kind} input");
                        continue;
                    }
                    match kind.as_str() {
                        "hidden" | "submit" => descriptor.push(name, value),
                        "text" => descriptor.push(name, self.credentials.username.clone()),
                        "password" => descriptor.push(name, self.credentials.password.clone()),
                        other => debug!("Dropping {other} input {name:?}"),
                    }
                }
            }
        }

        Ok(descriptor)
    }

    fn accepts<N: HtmlNode>(&self, form: &N) -> bool {
        match self.policy {
            FormPolicy::HiddenOnly => true,
            FormPolicy::MethodAware => form
                .attr("method")
                .is_some_and(|m| m.trim().eq_ignore_ascii_case("post")),
        }
    }
}

fn resolve_action(action: Option<&str>, page_url: &Url) -> Result<Url> {
    match action.map(str::trim) {
        None | Some("") => Ok(page_url.clone()),
        Some(action) => page_url.join(action).map_err(|source| Error::InvalidUrl {
            url: action.to_string(),
            source,
        }),
    }
}
