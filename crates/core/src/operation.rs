//! The fixed set of gateway operations.

use crate::principal::Role;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterCategory,
    PrepareStatement,
    QueryExecute,
    WriteExecute,
    SaveFile,
    LoadFile,
    Purge,
    GenerateToken,
    VerifyToken,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Self::RegisterCategory,
        Self::PrepareStatement,
        Self::QueryExecute,
        Self::WriteExecute,
        Self::SaveFile,
        Self::LoadFile,
        Self::Purge,
        Self::GenerateToken,
        Self::VerifyToken,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterCategory => "register-category",
            Self::PrepareStatement => "prepare-statement",
            Self::QueryExecute => "query-execute",
            Self::WriteExecute => "write-execute",
            Self::SaveFile => "save-file",
            Self::LoadFile => "load-file",
            Self::Purge => "purge",
            Self::GenerateToken => "generate-token",
            Self::VerifyToken => "verify-token",
        }
    }

    /// HTTP path the operation is served under.
    pub fn path(&self) -> &'static str {
        match self {
            Self::RegisterCategory => "/register-category",
            Self::PrepareStatement => "/prepare-statement",
            Self::QueryExecute => "/query-execute",
            Self::WriteExecute => "/write-execute",
            Self::SaveFile => "/save-file",
            Self::LoadFile => "/load-file",
            Self::Purge => "/purge",
            Self::GenerateToken => "/generate-token",
            Self::VerifyToken => "/verify-token",
        }
    }

    /// Role checked before any other work is done.
    pub fn required_role(&self) -> Role {
        match self {
            Self::RegisterCategory => Role::RegisterCategory,
            Self::PrepareStatement => Role::PrepareStatement,
            Self::QueryExecute => Role::Read,
            Self::WriteExecute => Role::Write,
            Self::SaveFile => Role::SaveFile,
            Self::LoadFile => Role::LoadFile,
            Self::Purge => Role::Purge,
            Self::GenerateToken => Role::CmdChannelGenerate,
            Self::VerifyToken => Role::CmdChannelVerify,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
