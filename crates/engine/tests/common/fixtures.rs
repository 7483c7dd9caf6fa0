use gatehouse_core::config::{TrustConfig, TrustedDescriptorConfig};
use gatehouse_core::{Category, DataType, Key, Principal, Role};
use gatehouse_engine::Gateway;
use gatehouse_storage::Storage;
use std::sync::Arc;
use std::time::Duration;

pub const HOST_INFO: &str = "host-info";

pub const QUERY_BY_AGENT: &str = "QUERY host-info WHERE agentId = ?s SORT timeStamp DSC LIMIT 1";
pub const QUERY_ALL: &str = "QUERY host-info SORT timeStamp ASC";
pub const COUNT_ALL: &str = "QUERY-COUNT host-info";
pub const ADD_HOST: &str =
    "ADD host-info SET agentId = ?s, vmId = ?s, hostname = ?s, timeStamp = ?l";
pub const RENAME_HOST: &str = "UPDATE host-info SET hostname = ?s WHERE agentId = ?s";
pub const BROKEN: &str = "QUERY host-info WHERE cpu = ?s";

#[allow(dead_code)]
pub fn host_info() -> Category {
    Category::new(
        HOST_INFO,
        vec![
            Key::new("agentId", true),
            Key::new("vmId", false),
            Key::new("hostname", false),
            Key::new("timeStamp", false),
        ],
        DataType::Record("HostInfo".to_string()),
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn trust() -> TrustConfig {
    let descriptor = |text: &str, agent: Option<usize>| TrustedDescriptorConfig {
        text: text.to_string(),
        agent_id_param: agent,
        vm_id_param: None,
    };
    TrustConfig {
        categories: vec![HOST_INFO.to_string()],
        descriptors: vec![
            descriptor(QUERY_BY_AGENT, Some(0)),
            descriptor(QUERY_ALL, None),
            descriptor(COUNT_ALL, None),
            descriptor(ADD_HOST, None),
            descriptor(RENAME_HOST, None),
            descriptor(BROKEN, None),
        ],
    }
}

#[allow(dead_code)]
pub fn gateway(storage: Arc<dyn Storage>) -> Gateway {
    Gateway::new(storage, &trust(), Duration::from_secs(30))
}

#[allow(dead_code)]
pub fn principal(name: &str, roles: &[&str]) -> Principal {
    Principal::new(name, roles.iter().map(|r| Role::parse(r).unwrap()))
}
