//! CID Register lookups through Microsoft Graph.
//!
//! Each resolution makes three kinds of call, in order: hostname to site id,
//! list display name to list id, then one filtered item query per batch.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::auth::TokenProvider;
use crate::config::{Config, ListFields};
use crate::directory::{DirectorySession, DirectorySource};
use crate::domain::matches::DirectoryRow;
use crate::error::{CidError, Result};

#[derive(Debug, Deserialize)]
struct Site {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Doubles single quotes so `value` can sit inside an OData string literal.
pub fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

/// OR-filter matching any of `emails` against both email columns.
pub fn build_email_filter(emails: &[String], fields: &ListFields) -> String {
    emails
        .iter()
        .map(|e| {
            let v = escape_odata(e);
            format!(
                "fields/{} eq '{v}' or fields/{} eq '{v}'",
                fields.primary_email, fields.secondary_email
            )
        })
        .collect::<Vec<_>>()
        .join(" or ")
}

pub struct GraphDirectory {
    client: Client,
    base_url: String,
    site_hostname: String,
    list_name: String,
    fields: ListFields,
    tokens: Box<dyn TokenProvider>,
}

impl GraphDirectory {
    pub fn new(cfg: &Config, tokens: Box<dyn TokenProvider>) -> Result<Self> {
        let site_hostname = cfg.site_hostname()?;
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: cfg.graph_base_url.trim_end_matches('/').to_string(),
            site_hostname,
            list_name: cfg.contacts_list_name.clone(),
            fields: cfg.fields.clone(),
            tokens,
        })
    }

    fn get(&self, url: &str, token: &str, query: &[(&str, &str)]) -> Result<Response> {
        let mut req = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }
        Ok(req.send()?)
    }

    fn site_id(&self, token: &str) -> Result<String> {
        let url = format!("{}/sites/{}:/", self.base_url, self.site_hostname);
        log::debug!("resolving site {}", self.site_hostname);

        let resp = self.get(&url, token, &[])?;
        let status = resp.status();
        if !status.is_success() {
            log::error!("Graph site error: {} {}", status, resp.text().unwrap_or_default());
            return Err(CidError::DirectoryUnavailable(format!(
                "Failed to access SharePoint site via Graph API: {}",
                status.as_u16()
            )));
        }
        let site: Site = read_json(resp)?;
        Ok(site.id)
    }

    fn list_id(&self, token: &str, site_id: &str) -> Result<String> {
        let url = format!("{}/sites/{}/lists", self.base_url, site_id);
        let filter = format!("displayName eq '{}'", escape_odata(&self.list_name));
        log::debug!("resolving list '{}'", self.list_name);

        let resp = self.get(&url, token, &[("$filter", filter.as_str())])?;
        let status = resp.status();
        if !status.is_success() {
            log::error!("Graph list error: {} {}", status, resp.text().unwrap_or_default());
            return Err(CidError::DirectoryUnavailable(format!(
                "Failed to find list '{}': {}",
                self.list_name,
                status.as_u16()
            )));
        }
        let lists: Collection<ListRef> = read_json(resp)?;
        lists
            .value
            .into_iter()
            .next()
            .map(|l| l.id)
            .ok_or_else(|| {
                CidError::DirectoryUnavailable(format!(
                    "List '{}' not found in SharePoint site",
                    self.list_name
                ))
            })
    }

    fn row_from_fields(&self, fields: &Map<String, Value>) -> Option<DirectoryRow> {
        let text = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let cid = text(&self.fields.cid)?;
        let emails = [&self.fields.primary_email, &self.fields.secondary_email]
            .into_iter()
            .filter_map(|f| text(f))
            .collect();
        Some(DirectoryRow {
            cid,
            display_name: text(&self.fields.display_name),
            emails,
        })
    }
}

impl DirectorySource for GraphDirectory {
    fn open_session(&self) -> Result<Box<dyn DirectorySession + '_>> {
        let token = self.tokens.get_token()?.ok_or_else(|| {
            CidError::Authentication(
                "Failed to get authentication token. Please sign in to Microsoft 365.".into(),
            )
        })?;
        let site_id = self.site_id(&token)?;
        let list_id = self.list_id(&token, &site_id)?;
        log::debug!("site {site_id}, list {list_id}");
        Ok(Box::new(GraphSession {
            directory: self,
            token,
            items_url: format!("{}/sites/{}/lists/{}/items", self.base_url, site_id, list_id),
        }))
    }
}

struct GraphSession<'a> {
    directory: &'a GraphDirectory,
    token: String,
    items_url: String,
}

impl GraphSession<'_> {
    fn fetch_page(&self, url: &str, query: &[(&str, &str)]) -> Result<Collection<ListItem>> {
        let resp = self.directory.get(url, &self.token, query)?;
        let status = resp.status();
        if status.is_success() {
            return read_json(resp);
        }

        let body = resp.text().unwrap_or_default();
        log::error!("Graph items error: {status} {body}");
        let message = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                "Authentication failed. Please ensure you have access to the SharePoint site."
                    .to_string()
            }
            _ => body.chars().take(100).collect(),
        };
        Err(CidError::Query {
            status: status.as_u16(),
            message,
        })
    }
}

impl DirectorySession for GraphSession<'_> {
    fn query(&self, batch: &[String]) -> Result<Vec<DirectoryRow>> {
        let filter = build_email_filter(batch, &self.directory.fields);
        let mut page =
            self.fetch_page(&self.items_url, &[("$expand", "fields"), ("$filter", filter.as_str())])?;

        let mut rows = Vec::new();
        loop {
            rows.extend(
                page.value
                    .iter()
                    .filter_map(|item| self.directory.row_from_fields(&item.fields)),
            );
            match page.next_link.take() {
                Some(next) => page = self.fetch_page(&next, &[])?,
                None => break,
            }
        }
        Ok(rows)
    }
}

fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let bytes = resp.bytes()?;
    Ok(serde_json::from_slice(&bytes)?)
}
