//! Principals and the role strings they carry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Suffix that grants access to every target of a scope.
pub const ALL_SUFFIX: &str = "ALL";

const GRANT_ACTION_PREFIX: &str = "cmd-channel-grant-";

/// Family of per-target grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantScope {
    FilesRead,
    FilesWrite,
    AgentsRead,
    VmsRead,
}

impl GrantScope {
    const ALL_SCOPES: [GrantScope; 4] = [
        Self::FilesRead,
        Self::FilesWrite,
        Self::AgentsRead,
        Self::VmsRead,
    ];

    /// Role-name prefix, including the trailing dash.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::FilesRead => "files-read-",
            Self::FilesWrite => "files-write-",
            Self::AgentsRead => "agents-read-",
            Self::VmsRead => "vms-read-",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GrantTarget {
    All,
    Id(String),
}

/// A single role membership.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    RegisterCategory,
    PrepareStatement,
    Read,
    Write,
    Purge,
    SaveFile,
    LoadFile,
    CmdChannelGenerate,
    CmdChannelVerify,
    /// May issue delegation tokens for the named action.
    CmdChannelGrant(String),
    Grant {
        scope: GrantScope,
        target: GrantTarget,
    },
}

impl Role {
    /// Parse a role string such as `read` or `agents-read-ALL`.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let role = match s {
            "register-category" => Self::RegisterCategory,
            "prepare-statement" => Self::PrepareStatement,
            "read" => Self::Read,
            "write" => Self::Write,
            "purge" => Self::Purge,
            "save-file" => Self::SaveFile,
            "load-file" => Self::LoadFile,
            "cmd-channel-generate" => Self::CmdChannelGenerate,
            "cmd-channel-verify" => Self::CmdChannelVerify,
            _ => {
                if let Some(action) = s.strip_prefix(GRANT_ACTION_PREFIX) {
                    if action.is_empty() {
                        return Err(crate::Error::InvalidRole(s.to_string()));
                    }
                    return Ok(Self::CmdChannelGrant(action.to_string()));
                }
                let (scope, rest) = GrantScope::ALL_SCOPES
                    .iter()
                    .find_map(|scope| s.strip_prefix(scope.prefix()).map(|rest| (*scope, rest)))
                    .ok_or_else(|| crate::Error::InvalidRole(s.to_string()))?;
                let target = match rest {
                    "" => return Err(crate::Error::InvalidRole(s.to_string())),
                    ALL_SUFFIX => GrantTarget::All,
                    id => GrantTarget::Id(id.to_string()),
                };
                Self::Grant { scope, target }
            }
        };
        Ok(role)
    }

    /// Role granting a specific target of a scope.
    pub fn grant(scope: GrantScope, id: impl Into<String>) -> Self {
        Self::Grant {
            scope,
            target: GrantTarget::Id(id.into()),
        }
    }

    /// Role granting every target of a scope.
    pub fn grant_all(scope: GrantScope) -> Self {
        Self::Grant {
            scope,
            target: GrantTarget::All,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterCategory => f.write_str("register-category"),
            Self::PrepareStatement => f.write_str("prepare-statement"),
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Purge => f.write_str("purge"),
            Self::SaveFile => f.write_str("save-file"),
            Self::LoadFile => f.write_str("load-file"),
            Self::CmdChannelGenerate => f.write_str("cmd-channel-generate"),
            Self::CmdChannelVerify => f.write_str("cmd-channel-verify"),
            Self::CmdChannelGrant(action) => write!(f, "{GRANT_ACTION_PREFIX}{action}"),
            Self::Grant { scope, target } => match target {
                GrantTarget::All => write!(f, "{}{ALL_SUFFIX}", scope.prefix()),
                GrantTarget::Id(id) => write!(f, "{}{id}", scope.prefix()),
            },
        }
    }
}

impl TryFrom<String> for Role {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

/// What a principal may see within one grant scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Grants {
    All,
    Only(BTreeSet<String>),
}

impl Grants {
    pub fn allows(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
        }
    }
}

/// An authenticated identity and its role memberships.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub roles: HashSet<Role>,
}

impl Principal {
    pub fn new(name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Collect this principal's grants in one scope.
    pub fn grants(&self, scope: GrantScope) -> Grants {
        let mut ids = BTreeSet::new();
        for role in &self.roles {
            if let Role::Grant { scope: s, target } = role
                && *s == scope
            {
                match target {
                    GrantTarget::All => return Grants::All,
                    GrantTarget::Id(id) => {
                        ids.insert(id.clone());
                    }
                }
            }
        }
        Grants::Only(ids)
    }

    /// Role names in a stable order, for display.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.iter().map(Role::to_string).collect();
        names.sort();
        names
    }
}
