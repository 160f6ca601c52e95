//! In-process stand-in for one Azure Blob container at `/<container>`.
//!
//! Supports Put Blob, Get Blob, Delete Blob and List Blobs (paged by
//! `page_size` with a numeric `NextMarker`). Every request must carry the
//! configured SAS `sig` query value.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{serve, Request, Response};

pub struct FakeBlob {
    /// Container URL, e.g. "http://127.0.0.1:1234/output".
    pub container_url: String,
    pub blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

pub fn start(container: &str, sig: &str, page_size: usize) -> FakeBlob {
    let blobs = Arc::new(Mutex::new(BTreeMap::new()));
    let shared = Arc::clone(&blobs);
    let prefix = format!("/{container}");
    let sig = sig.to_string();
    let base = serve(move |req| respond(&prefix, &sig, page_size, &shared, req));
    FakeBlob {
        container_url: format!("{base}/{container}"),
        blobs,
    }
}

fn decode(path: &str) -> String {
    url::form_urlencoded::parse(format!("p={}", path.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn respond(
    container: &str,
    sig: &str,
    page_size: usize,
    blobs: &Mutex<BTreeMap<String, Vec<u8>>>,
    req: Request,
) -> Response {
    if req.query_value("sig") != Some(sig) {
        return Response::new("403 Forbidden").with_header("x-ms-error-code", "AuthenticationFailed");
    }
    let mut blobs = blobs.lock().unwrap();

    if req.path == container && req.query_value("comp") == Some("list") {
        let prefix = req.query_value("prefix").unwrap_or("");
        let skip: usize = req.query_value("marker").and_then(|m| m.parse().ok()).unwrap_or(0);
        let matching: Vec<&String> = blobs.keys().filter(|k| k.starts_with(prefix)).collect();
        let page: Vec<&&String> = matching.iter().skip(skip).take(page_size).collect();
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><EnumerationResults><Blobs>");
        for name in &page {
            xml.push_str(&format!(
                "<Blob><Name>{}</Name><Properties><BlobType>BlockBlob</BlobType></Properties></Blob>",
                escape(name)
            ));
        }
        xml.push_str("</Blobs>");
        if skip + page.len() < matching.len() {
            xml.push_str(&format!("<NextMarker>{}</NextMarker>", skip + page.len()));
        } else {
            xml.push_str("<NextMarker />");
        }
        xml.push_str("</EnumerationResults>");
        return Response::new("200 OK")
            .with_header("Content-Type", "application/xml")
            .with_body(xml.into_bytes());
    }

    let Some(name) = req.path.strip_prefix(&format!("{container}/")).map(decode) else {
        return Response::new("400 Bad Request");
    };
    match req.method.as_str() {
        "PUT" => {
            if req.header("x-ms-blob-type") != Some("BlockBlob") {
                return Response::new("400 Bad Request")
                    .with_header("x-ms-error-code", "MissingRequiredHeader");
            }
            blobs.insert(name, req.body);
            Response::new("201 Created")
        }
        "GET" => match blobs.get(&name) {
            Some(data) => Response::new("200 OK").with_body(data.clone()),
            None => Response::new("404 Not Found").with_header("x-ms-error-code", "BlobNotFound"),
        },
        "DELETE" => match blobs.remove(&name) {
            Some(_) => Response::new("202 Accepted"),
            None => Response::new("404 Not Found").with_header("x-ms-error-code", "BlobNotFound"),
        },
        _ => Response::new("405 Method Not Allowed"),
    }
}
