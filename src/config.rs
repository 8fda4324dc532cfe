//! Target membership and connection settings
//!
//! A [`MembershipConfig`] is the desired state handed to the convergence
//! procedure. It can be built in code or loaded from a TOML topology file:
//!
//! ```toml
//! set = "rs0"
//! version = 1
//!
//! [[members]]
//! id = 0
//! host = "localhost:27017"
//! ```

use crate::command::{ConfigMember, ReplSetConfig, INITIAL_CONFIG_VERSION, PROTOCOL_VERSION};
use crate::error::{ConfigError, ReplSetResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Desired replica-set membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipConfig {
    /// Replica-set name (`_id` of the configuration)
    pub set_name: String,
    /// Target members, in configuration order
    pub members: Vec<ConfigMember>,
    /// Version submitted with reconfigure; must exceed the set's current one to apply
    pub version: i64,
}

impl MembershipConfig {
    pub fn new(set_name: impl Into<String>) -> Self {
        Self {
            set_name: set_name.into(),
            members: Vec::new(),
            version: INITIAL_CONFIG_VERSION,
        }
    }

    /// Single-member set with id 0
    pub fn single(set_name: impl Into<String>, host: impl Into<String>) -> Self {
        Self::new(set_name).with_member(0, host)
    }

    pub fn with_member(mut self, id: i64, host: impl Into<String>) -> Self {
        self.members.push(ConfigMember::new(id, host));
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.set_name.trim().is_empty() {
            return Err(ConfigError::EmptySetName);
        }
        if self.members.is_empty() {
            return Err(ConfigError::NoMembers(self.set_name.clone()));
        }
        if self.version < 1 {
            return Err(ConfigError::InvalidVersion(self.version));
        }

        let mut ids = HashSet::new();
        let mut hosts = HashSet::new();
        for member in &self.members {
            if member.host.trim().is_empty() {
                return Err(ConfigError::EmptyHost(member.id));
            }
            if !ids.insert(member.id) {
                return Err(ConfigError::DuplicateId(member.id));
            }
            if !hosts.insert(member.host.as_str()) {
                return Err(ConfigError::DuplicateHost(member.host.clone()));
            }
        }
        Ok(())
    }

    /// Configuration sent with `replSetInitiate`; always version 1
    pub fn initial_config(&self) -> ReplSetConfig {
        self.config_with_version(INITIAL_CONFIG_VERSION)
    }

    /// Configuration sent with `replSetReconfig`
    pub fn target_config(&self) -> ReplSetConfig {
        self.config_with_version(self.version)
    }

    fn config_with_version(&self, version: i64) -> ReplSetConfig {
        ReplSetConfig {
            set: self.set_name.clone(),
            version,
            protocol_version: PROTOCOL_VERSION,
            members: self.members.clone(),
        }
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|member| member.host.as_str())
    }
}

fn default_version() -> i64 {
    INITIAL_CONFIG_VERSION
}

/// Member entry of a topology file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyMember {
    pub id: i64,
    pub host: String,
}

/// On-disk description of a target topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyFile {
    pub set: String,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub members: Vec<TopologyMember>,
}

impl TopologyFile {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ReplSetResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    /// Validated membership described by this file
    pub fn into_membership(self) -> Result<MembershipConfig, ConfigError> {
        let membership = MembershipConfig {
            set_name: self.set,
            members: self
                .members
                .into_iter()
                .map(|member| ConfigMember::new(member.id, member.host))
                .collect(),
            version: self.version,
        };
        membership.validate()?;
        Ok(membership)
    }
}

/// Parameters for reaching a node; consumed by whatever builds the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub replica_set: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            user: None,
            password: None,
            database: "admin".to_string(),
            replica_set: "rs0".to_string(),
        }
    }
}

impl ConnectionSettings {
    /// `host:port`, the member name the node reports for itself
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Direct-connection URI
    pub fn uri(&self) -> String {
        self.build_uri(self.password.as_deref())
    }

    /// URI safe to log
    pub fn redacted_uri(&self) -> String {
        self.build_uri(self.password.as_ref().map(|_| "***"))
    }

    fn build_uri(&self, password: Option<&str>) -> String {
        let auth = match (self.user.as_deref(), password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                format!("{}:{}@", user, password)
            }
            _ => String::new(),
        };
        format!("mongodb://{}{}/?connect=direct", auth, self.host_port())
    }

    /// Single-member membership for this node
    pub fn membership(&self) -> MembershipConfig {
        MembershipConfig::single(self.replica_set.clone(), self.host_port())
    }
}
