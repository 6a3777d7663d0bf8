#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use cid_tagger::Config;
use cid_tagger::auth::TokenProvider;
use tiny_http::{Header, Response, Server};
use url::Url;

pub const SITE_HOST: &str = "contoso.sharepoint.com";

/// One request as seen by the fake Graph server.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
}

impl Seen {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub struct FakeGraph {
    pub base: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl FakeGraph {
    /// Serves `handler(request, base)` on a loopback port until the test exits.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Seen, &str) -> (u16, String) + Send + 'static,
    {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let server = Server::http(("127.0.0.1", port)).unwrap();
        let base = format!("http://127.0.0.1:{port}/v1.0");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        let server_base = base.clone();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let url = Url::parse(&format!("http://127.0.0.1{}", request.url())).unwrap();
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());
                let req = Seen {
                    path: url.path().to_string(),
                    query: url.query_pairs().into_owned().collect(),
                    authorization,
                };
                let (status, body) = handler(&req, &server_base);
                log.lock().unwrap().push(req);

                let json: Header = "Content-Type: application/json".parse().unwrap();
                let _ = request.respond(
                    Response::from_string(body)
                        .with_status_code(status)
                        .with_header(json),
                );
            }
        });

        Self { base, seen }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn config(&self) -> Config {
        Config {
            site_url: format!("https://{SITE_HOST}"),
            graph_base_url: self.base.clone(),
            ..Config::default()
        }
    }
}

/// Answers the site and list lookups; delegates item queries to `items`.
pub fn register_handler<F>(items: F) -> impl Fn(&Seen, &str) -> (u16, String) + Send + 'static
where
    F: Fn(&Seen, &str) -> (u16, String) + Send + 'static,
{
    move |req, base| match req.path.as_str() {
        "/v1.0/sites/contoso.sharepoint.com:/" => (200, r#"{"id":"site-1"}"#.to_string()),
        "/v1.0/sites/site-1/lists" => {
            if req.param("$filter") == Some("displayName eq 'CID Register'") {
                (200, r#"{"value":[{"id":"list-1"}]}"#.to_string())
            } else {
                (200, r#"{"value":[]}"#.to_string())
            }
        }
        "/v1.0/sites/site-1/lists/list-1/items" => items(req, base),
        _ => (404, r#"{"error":{"code":"itemNotFound"}}"#.to_string()),
    }
}

/// Addresses named in an item query's `$filter`, unescaped.
pub fn filtered_addresses(req: &Seen) -> Vec<String> {
    let filter = req.param("$filter").unwrap_or_default();
    let mut out = Vec::new();
    for clause in filter.split(" or ") {
        if let Some((_, value)) = clause.split_once(" eq '")
            && let Some(value) = value.strip_suffix('\'')
        {
            let value = value.replace("''", "'");
            if !out.contains(&value) {
                out.push(value);
            }
        }
    }
    out
}

pub fn item(cid: &str, name: Option<&str>, email1: &str, email2: Option<&str>) -> serde_json::Value {
    let mut fields = serde_json::json!({
        "Title": cid,
        "Client_x0020_Email": email1,
    });
    if let Some(name) = name {
        fields["KW_x0020_Opportunity_x0020_Name"] = name.into();
    }
    if let Some(email2) = email2 {
        fields["Client_x0020_Email_x0020_2"] = email2.into();
    }
    serde_json::json!({ "id": cid, "fields": fields })
}

pub struct FixedToken {
    token: Option<&'static str>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedToken {
    pub fn new(token: Option<&'static str>) -> Self {
        Self {
            token,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl TokenProvider for FixedToken {
    fn get_token(&self) -> cid_tagger::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.map(str::to_string))
    }
}
