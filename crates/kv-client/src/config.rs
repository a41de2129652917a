//! Connection configuration for a benchmark target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// How the endpoints of a target are organised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Sharded cluster; keys are routed by hash slot.
    #[default]
    Cluster,
    /// Single server; only the first endpoint is used for data commands.
    Standalone,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Cluster => write!(f, "cluster"),
            Topology::Standalone => write!(f, "standalone"),
        }
    }
}

/// Command renames applied before a command is sent.
///
/// Keys are command names (case-insensitive). An empty replacement disables
/// the command entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandMap {
    renames: BTreeMap<String, String>,
}

impl CommandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `command` under a different name.
    pub fn rename(mut self, command: &str, to: impl Into<String>) -> Self {
        self.renames.insert(command.to_uppercase(), to.into());
        self
    }

    /// Refuse to send `command`.
    pub fn disable(self, command: &str) -> Self {
        self.rename(command, "")
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Resolve the wire name for `command`.
    pub fn resolve(&self, command: &str) -> Result<String> {
        let upper = command.to_uppercase();
        let mapped = self
            .renames
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&upper))
            .map(|(_, to)| to.as_str());

        match mapped {
            Some("") => Err(ClientError::CommandDisabled(upper)),
            Some(to) => Ok(to.to_string()),
            None => Ok(upper),
        }
    }
}

/// One deployment being benchmarked.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name, unique within a run.
    pub name: String,
    /// `host:port` endpoints.
    pub endpoints: Vec<String>,
    /// Allow server-level admin commands (e.g. `INFO`).
    #[serde(default = "default_allow_admin")]
    pub allow_admin: bool,
    /// Abort when the target is unreachable at startup.
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default, skip_serializing_if = "CommandMap::is_empty")]
    pub command_map: CommandMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_allow_admin() -> bool {
    true
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            name: name.into(),
            endpoints,
            allow_admin: default_allow_admin(),
            fail_fast: false,
            topology: Topology::default(),
            command_map: CommandMap::default(),
            username: None,
            password: None,
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_allow_admin(mut self, allow_admin: bool) -> Self {
        self.allow_admin = allow_admin;
        self
    }

    pub fn with_command_map(mut self, command_map: CommandMap) -> Self {
        self.command_map = command_map;
        self
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Endpoints joined for log output. Credentials are never part of an endpoint.
    pub fn endpoint_list(&self) -> String {
        self.endpoints.join(", ")
    }
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints)
            .field("allow_admin", &self.allow_admin)
            .field("fail_fast", &self.fail_fast)
            .field("topology", &self.topology)
            .field("command_map", &self.command_map)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Split `host:port` into its parts.
///
/// IPv6 hosts must be bracketed (`[::1]:6379`).
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16)> {
    let invalid = || ClientError::InvalidEndpoint(endpoint.to_string());

    let (host, port) = endpoint.trim().rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}
