//! Gateway settings: YAML file plus CLI overrides.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::{Error, Result};

/// Top-level gateway settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Directory of per-cluster schema artifacts to watch.
    pub open_api_definitions_path: PathBuf,
    /// Bypass end-user authentication; development only.
    pub local_development: bool,
    /// Enable logical-workspace aware routing and URL rewriting.
    pub enable_kcp: bool,
    /// HTTP handler settings.
    pub gateway: GatewaySettings,
    /// URL layout settings.
    pub url: UrlSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            open_api_definitions_path: PathBuf::from("./definitions"),
            local_development: false,
            enable_kcp: false,
            gateway: GatewaySettings::default(),
            url: UrlSettings::default(),
        }
    }
}

/// Settings for the GraphQL endpoint itself.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewaySettings {
    /// Listen port.
    pub port: u16,
    /// JWT claim naming the end user.
    pub username_claim: String,
    /// Impersonate the claim's user instead of forwarding tokens.
    pub should_impersonate: bool,
    /// Actively validate tokens on introspection queries.
    pub introspection_authentication: bool,
    /// HTML/debug handler toggles.
    pub handler_cfg: HandlerSettings,
    /// Cross-origin settings.
    pub cors: CorsSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            port: 8080,
            username_claim: "email".into(),
            should_impersonate: false,
            introspection_authentication: false,
            handler_cfg: HandlerSettings::default(),
            cors: CorsSettings::default(),
        }
    }
}

/// Toggles for the HTML pages served on GET.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandlerSettings {
    /// Pretty-print JSON responses.
    pub pretty: bool,
    /// Serve the Playground page.
    pub playground: bool,
    /// Serve the GraphiQL page; wins over playground when both are set.
    #[serde(rename = "graphiQL")]
    pub graphiql: bool,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            pretty: true,
            playground: false,
            graphiql: true,
        }
    }
}

/// CORS behavior for browser clients.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsSettings {
    /// Whether to answer CORS preflight and set allow headers.
    pub enabled: bool,
    /// Origins allowed to call the gateway; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Headers allowed on cross-origin requests; `*` allows any.
    pub allowed_headers: Vec<String>,
}

/// URL layout of the gateway.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlSettings {
    /// First path segment marking virtual-workspace clusters.
    pub virtual_workspace_prefix: String,
    /// Workspace assumed when a virtual-workspace path omits one.
    pub default_kcp_workspace: String,
    /// Trailing path segment of every GraphQL endpoint.
    pub graphql_suffix: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            virtual_workspace_prefix: "virtual-workspace".into(),
            default_kcp_workspace: "root".into(),
            graphql_suffix: "graphql".into(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Settings(Box::new(e)))?;
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|e| Error::Settings(Box::new(e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.url.graphql_suffix.is_empty() || self.url.graphql_suffix.contains('/') {
            return Err(Error::Settings(
                format!("invalid graphql suffix {:?}", self.url.graphql_suffix).into(),
            ));
        }
        if self.url.virtual_workspace_prefix.is_empty() {
            return Err(Error::Settings("virtual workspace prefix must not be empty".into()));
        }
        Ok(())
    }
}

/// Multi-tenant GraphQL gateway for Kubernetes-compatible API servers.
#[derive(Debug, Parser)]
#[command(name = "kubegraph", version)]
pub struct Args {
    /// Path to the YAML settings file.
    #[arg(long, env = "KUBEGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of schema artifacts; overrides the settings file.
    #[arg(long, env = "KUBEGRAPH_DEFINITIONS")]
    pub definitions: Option<PathBuf>,

    /// Listen port; overrides the settings file.
    #[arg(long, env = "KUBEGRAPH_PORT")]
    pub port: Option<u16>,

    /// Run without end-user authentication; development only.
    #[arg(long)]
    pub local_development: bool,
}

impl Args {
    /// Resolve the effective settings from file plus CLI overrides.
    pub fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        if let Some(definitions) = self.definitions {
            settings.open_api_definitions_path = definitions;
        }
        if let Some(port) = self.port {
            settings.gateway.port = port;
        }
        if self.local_development {
            settings.local_development = true;
        }
        Ok(settings)
    }
}
