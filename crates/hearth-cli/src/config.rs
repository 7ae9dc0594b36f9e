// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use hearth_app::ListingScope;
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_HOUSING_BASE_URL: &str = "https://housing.sfgov.org/api/v1";
const DEFAULT_GIS_QUERY_URL: &str =
    "https://gis.sf.gov/dahl/rest/services/app_services/NRHP_pref_pq_QA/MapServer/0/query";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8700";
const DEFAULT_UPSTREAM_TIMEOUT: &str = "10s";
const DEFAULT_GEOMETRY_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub google: Google,
    #[serde(default)]
    pub proxy: Proxy,
    #[serde(default)]
    pub ui: Ui,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            upstream: Upstream::default(),
            google: Google::default(),
            proxy: Proxy::default(),
            ui: Ui::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub geometry_ttl_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Upstream {
    pub housing_base_url: Option<String>,
    pub gis_query_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Google {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Proxy {
    pub bind_addr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub default_scope: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("HEARTH_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set HEARTH_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(hearth_store::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and move values under \
                     [storage], [upstream], [google], [proxy], and [ui]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            hearth_store::validate_db_path(db_path)?;
        }

        if let Some(ttl_hours) = self.storage.geometry_ttl_hours
            && ttl_hours <= 0
        {
            bail!(
                "storage.geometry_ttl_hours in {} must be positive, got {}",
                path.display(),
                ttl_hours
            );
        }

        if let Some(timeout) = &self.upstream.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "upstream.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(raw) = &self.proxy.bind_addr
            && raw.parse::<SocketAddr>().is_err()
        {
            bail!(
                "proxy.bind_addr in {} is not a socket address: {raw:?}",
                path.display()
            );
        }

        if let Some(raw) = &self.ui.default_scope
            && ListingScope::parse(raw).is_none()
        {
            bail!(
                "ui.default_scope in {} must be one of All, Rental, Sales; got {raw:?}",
                path.display()
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => hearth_store::default_db_path(),
        }
    }

    pub fn geometry_ttl(&self) -> time::Duration {
        time::Duration::hours(
            self.storage
                .geometry_ttl_hours
                .unwrap_or(DEFAULT_GEOMETRY_TTL_HOURS),
        )
    }

    pub fn housing_base_url(&self) -> &str {
        self.upstream
            .housing_base_url
            .as_deref()
            .unwrap_or(DEFAULT_HOUSING_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn gis_query_url(&self) -> &str {
        self.upstream
            .gis_query_url
            .as_deref()
            .unwrap_or(DEFAULT_GIS_QUERY_URL)
    }

    pub fn upstream_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.upstream
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
        )
    }

    /// The environment variable wins so deployments never have to write
    /// secrets into the config file.
    pub fn google_api_key(&self) -> String {
        if let Ok(key) = env::var("GOOGLE_MAPS_API_KEY")
            && !key.trim().is_empty()
        {
            return key;
        }
        self.google.api_key.clone().unwrap_or_default()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let raw = self.proxy.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse()
            .with_context(|| format!("parse proxy.bind_addr {raw:?}"))
    }

    pub fn default_scope(&self) -> ListingScope {
        self.ui
            .default_scope
            .as_deref()
            .and_then(ListingScope::parse)
            .unwrap_or_default()
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# hearth config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/hearth/hearth.db)\n# db_path = \"/absolute/path/to/hearth.db\"\ngeometry_ttl_hours = {}\n\n[upstream]\nhousing_base_url = \"{}\"\ngis_query_url = \"{}\"\ntimeout = \"{}\"\n\n[google]\n# Prefer the GOOGLE_MAPS_API_KEY environment variable.\n# api_key = \"\"\n\n[proxy]\nbind_addr = \"{}\"\n\n[ui]\ndefault_scope = \"All\"\n",
            path.display(),
            DEFAULT_GEOMETRY_TTL_HOURS,
            DEFAULT_HOUSING_BASE_URL,
            DEFAULT_GIS_QUERY_URL,
            DEFAULT_UPSTREAM_TIMEOUT,
            DEFAULT_BIND_ADDR,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}
