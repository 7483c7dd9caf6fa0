use gatehouse_core::config::{TrustConfig, TrustedDescriptorConfig, UserConfig};
use gatehouse_server::auth::hash_token;
use serde_json::{Value, json};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const CLIENT_TOKEN: &str = "client-token";
pub const AGENT_TOKEN: &str = "agent-token";

pub const QUERY_BY_AGENT: &str = "QUERY host-info WHERE agentId = ?s SORT timeStamp DSC LIMIT 1";
pub const QUERY_ALL: &str = "QUERY host-info SORT timeStamp ASC";
pub const ADD_HOST: &str = "ADD host-info SET agentId = ?s, hostname = ?s, timeStamp = ?l";
pub const BROKEN: &str = "QUERY host-info WHERE cpu = ?s";

fn user(name: &str, token: &str, roles: &[&str]) -> UserConfig {
    UserConfig {
        name: name.to_string(),
        token_hash: hash_token(token),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

#[allow(dead_code)]
pub fn users() -> Vec<UserConfig> {
    vec![
        user(
            "admin",
            ADMIN_TOKEN,
            &[
                "register-category",
                "prepare-statement",
                "read",
                "write",
                "purge",
                "save-file",
                "load-file",
                "agents-read-ALL",
                "files-read-ALL",
                "files-write-ALL",
            ],
        ),
        user(
            "client",
            CLIENT_TOKEN,
            &[
                "prepare-statement",
                "read",
                "agents-read-a1",
                "load-file",
                "files-read-shared.txt",
                "cmd-channel-generate",
                "cmd-channel-grant-ping",
            ],
        ),
        user(
            "agent",
            AGENT_TOKEN,
            &["register-category", "prepare-statement", "write", "cmd-channel-verify"],
        ),
    ]
}

#[allow(dead_code)]
pub fn trust() -> TrustConfig {
    let descriptor = |text: &str, agent: Option<usize>| TrustedDescriptorConfig {
        text: text.to_string(),
        agent_id_param: agent,
        vm_id_param: None,
    };
    TrustConfig {
        categories: vec!["host-info".to_string()],
        descriptors: vec![
            descriptor(QUERY_BY_AGENT, Some(0)),
            descriptor(QUERY_ALL, None),
            descriptor(ADD_HOST, None),
            descriptor(BROKEN, None),
        ],
    }
}

/// Body of a host-info registration request.
#[allow(dead_code)]
pub fn host_info_registration() -> Value {
    json!({
        "name": "host-info",
        "dataType": {"record": "HostInfo"},
        "category": {
            "name": "host-info",
            "keys": [
                {"name": "agentId", "indexed": true},
                {"name": "hostname", "indexed": false},
                {"name": "timeStamp", "indexed": false}
            ],
            "dataType": {"record": "HostInfo"}
        }
    })
}

#[allow(dead_code)]
pub fn string_param(value: &str) -> Value {
    json!({"type": "string", "value": value})
}

#[allow(dead_code)]
pub fn long_param(value: i64) -> Value {
    json!({"type": "long", "value": value})
}
