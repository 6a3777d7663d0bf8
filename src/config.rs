use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::CidError;

pub const DEFAULT_CID_TAG_PATTERN: &str = r"(?i)\[CID-[0-9]{4}-[0-9]{4}\]";
pub const CLIENT_ID_PLACEHOLDER: &str = "YOUR_CLIENT_ID_HERE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SharePoint site hosting the CID Register
    pub site_url: String,
    pub contacts_list_name: String,
    /// Regex detecting an existing CID tag in a subject
    pub cid_tag_pattern: String,
    pub azure_client_id: String,
    /// Tenant id, or `common` for multi-tenant apps
    pub azure_tenant_id: String,
    pub redirect_uri: String,
    pub graph_base_url: String,
    pub fields: ListFields,
    pub notifications: NotificationKeys,
    pub register_new_item_url: Option<String>,
    pub register_list_url: Option<String>,
}

/// Column names of the CID Register list
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ListFields {
    pub cid: String,
    pub display_name: String,
    pub primary_email: String,
    pub secondary_email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NotificationKeys {
    pub no_match: String,
    pub applied: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: "https://julieandbryce.sharepoint.com".to_string(),
            contacts_list_name: "CID Register".to_string(),
            cid_tag_pattern: DEFAULT_CID_TAG_PATTERN.to_string(),
            azure_client_id: "f1569983-b73d-4260-840a-e0260d48fa81".to_string(),
            azure_tenant_id: "bd787835-1bb2-4149-a907-9074cfaacb64".to_string(),
            redirect_uri: "http://127.0.0.1:8400/callback".to_string(),
            graph_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            fields: ListFields::default(),
            notifications: NotificationKeys::default(),
            register_new_item_url: None,
            register_list_url: None,
        }
    }
}

impl Default for ListFields {
    fn default() -> Self {
        Self {
            cid: "Title".to_string(),
            display_name: "KW_x0020_Opportunity_x0020_Name".to_string(),
            primary_email: "Client_x0020_Email".to_string(),
            secondary_email: "Client_x0020_Email_x0020_2".to_string(),
        }
    }
}

impl Default for NotificationKeys {
    fn default() -> Self {
        Self {
            no_match: "CID_NO_MATCH".to_string(),
            applied: "CID_APPLIED".to_string(),
        }
    }
}

impl Config {
    /// Hostname of `site_url`, as addressed by Graph (`/sites/{hostname}:/`).
    pub fn site_hostname(&self) -> crate::Result<String> {
        if self.site_url.trim().is_empty() || self.site_url.starts_with('<') {
            return Err(CidError::Configuration("site_url is not configured".into()));
        }
        let url = Url::parse(&self.site_url).map_err(|e| {
            CidError::Configuration(format!("invalid site_url '{}': {e}", self.site_url))
        })?;
        url.host_str()
            .map(|h| h.to_string())
            .ok_or_else(|| CidError::Configuration(format!("site_url has no host: {}", self.site_url)))
    }

    pub fn register_list_url(&self) -> String {
        self.register_list_url
            .clone()
            .unwrap_or_else(|| self.register_page("AllItems.aspx"))
    }

    pub fn register_new_item_url(&self) -> String {
        self.register_new_item_url
            .clone()
            .unwrap_or_else(|| self.register_page("NewForm.aspx"))
    }

    fn register_page(&self, page: &str) -> String {
        let list = self.contacts_list_name.replace(' ', "%20");
        format!("{}/Lists/{}/{}", self.site_url.trim_end_matches('/'), list, page)
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("cid_tagger"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        // create a template config for users to edit
        let tom = toml::to_string_pretty(&Config::default())?;
        fs::write(path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}. Review it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
