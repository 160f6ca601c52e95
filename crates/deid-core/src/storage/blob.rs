//! Azure Blob container over REST, authenticated with a SAS query string.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::http::{self, HttpRequest, HttpResponse, Method};

use super::ObjectStore;

const STORAGE_API_VERSION: &str = "2021-08-06";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct BlobStore {
    container: Url,
    sas: Option<String>,
}

impl BlobStore {
    /// `container_url` is `https://<account>.blob.core.windows.net/<container>`.
    /// `sas` is the token query string, with or without the leading `?`.
    pub fn new(container_url: &str, sas: Option<String>) -> Result<Self> {
        let container = Url::parse(container_url.trim_end_matches('/'))
            .with_context(|| format!("invalid container URL {container_url:?}"))?;
        if container.cannot_be_a_base() {
            bail!("container URL {container_url:?} has no path");
        }
        let sas = sas
            .map(|s| s.trim().trim_start_matches('?').to_string())
            .filter(|s| !s.is_empty());
        Ok(Self { container, sas })
    }

    /// Reads the SAS from the environment variable `sas_env` (missing = anonymous).
    pub fn from_env(container_url: &str, sas_env: &str) -> Result<Self> {
        let sas = std::env::var(sas_env).ok();
        if sas.is_none() {
            tracing::warn!(env = sas_env, "no storage SAS set; requests are anonymous");
        }
        Self::new(container_url, sas)
    }

    fn with_sas(&self, mut url: Url) -> Url {
        if let Some(sas) = &self.sas {
            let query = match url.query() {
                Some(q) if !q.is_empty() => format!("{q}&{sas}"),
                _ => sas.clone(),
            };
            url.set_query(Some(&query));
        }
        url
    }

    fn blob_url(&self, name: &str) -> Result<Url> {
        let mut url = self.container.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("container URL has no path"))?
            .pop_if_empty()
            .extend(name.trim_start_matches('/').split('/'));
        Ok(self.with_sas(url))
    }

    fn list_url(&self, prefix: &str, marker: Option<&str>) -> Url {
        let mut url = self.container.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("restype", "container");
            q.append_pair("comp", "list");
            if !prefix.is_empty() {
                q.append_pair("prefix", prefix);
            }
            if let Some(m) = marker {
                q.append_pair("marker", m);
            }
        }
        self.with_sas(url)
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let req = req.header("x-ms-version", STORAGE_API_VERSION);
        let url = redact(&req.url).to_string();
        http::send(req, REQUEST_TIMEOUT)
            .await
            .with_context(|| format!("request {url}"))
    }
}

/// URL without its query string, for messages.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn fail(action: &str, name: &str, resp: &HttpResponse) -> anyhow::Error {
    let code = http::header_value(&resp.headers, "x-ms-error-code").unwrap_or("");
    anyhow!("{action} {name:?}: HTTP {} {code}", resp.status)
}

/// Blob names and the continuation marker from one List Blobs page.
fn parse_list_page(xml: &str) -> (Vec<String>, Option<String>) {
    let mut names = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Blob>") {
        let after = &rest[start + "<Blob>".len()..];
        let end = after.find("</Blob>").unwrap_or(after.len());
        if let Some(name) = blob_name(&after[..end]) {
            names.push(name);
        }
        rest = &after[end..];
    }
    let marker = element(xml, "NextMarker")
        .map(|(_, text)| unescape(text))
        .filter(|m| !m.is_empty());
    (names, marker)
}

/// `<Name>` of one `<Blob>` entry. Names the service could not put in XML
/// come percent-encoded with `Encoded="true"`.
fn blob_name(entry: &str) -> Option<String> {
    let (attrs, text) = element(entry, "Name")?;
    let name = unescape(text);
    if !attrs.contains(r#"Encoded="true""#) {
        return Some(name);
    }
    match urlencoding::decode(&name) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            tracing::warn!(blob = %name, "skipping undecodable blob name: {}", e);
            None
        }
    }
}

/// Attributes and raw text of the first `<tag>` element in `xml`.
/// `<tag/>` yields empty text; `<tagX>` does not match `tag`.
fn element<'a>(xml: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut from = 0;
    while let Some(pos) = xml[from..].find(&open) {
        let at = from + pos + open.len();
        let rest = &xml[at..];
        let gt = rest.find('>')?;
        let head = &rest[..gt];
        if !(head.is_empty() || head.starts_with(char::is_whitespace) || head == "/") {
            from = at;
            continue;
        }
        if let Some(attrs) = head.strip_suffix('/') {
            return Some((attrs.trim(), ""));
        }
        let body = &rest[gt + 1..];
        let end = body.find(&close)?;
        return Some((head.trim(), &body[..end]));
    }
    None
}

/// Resolves the five predefined entities and numeric references (`&#13;`,
/// `&#xD;`). Anything else is kept as written.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|semi| Some((entity(&tail[1..semi])?, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[async_trait]
impl ObjectStore for BlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_start_matches('/');
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let url = self.list_url(prefix, marker.as_deref());
            let resp = self.send(HttpRequest::new(Method::Get, url.as_str())).await?;
            if !resp.is_success() {
                return Err(fail("list", prefix, &resp));
            }
            let (page, next) = parse_list_page(&resp.text());
            names.extend(page);
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        names.sort();
        Ok(names)
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let url = self.blob_url(name)?;
        let resp = self.send(HttpRequest::new(Method::Get, url.as_str())).await?;
        match resp.status {
            404 => Ok(None),
            _ if resp.is_success() => Ok(Some(resp.body)),
            _ => Err(fail("get", name, &resp)),
        }
    }

    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.blob_url(name)?;
        let req = HttpRequest::new(Method::Put, url.as_str())
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        let resp = self.send(req).await?;
        if !resp.is_success() {
            return Err(fail("put", name, &resp));
        }
        tracing::debug!(blob = name, "uploaded");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let url = self.blob_url(name)?;
        let resp = self.send(HttpRequest::new(Method::Delete, url.as_str())).await?;
        if resp.status == 404 || resp.is_success() {
            Ok(())
        } else {
            Err(fail("delete", name, &resp))
        }
    }
}
