//! # Process Identity
//!
//! Every World runs inside one process. [`ProcessInfo`] describes such a process as the
//! discovery registry sees it: a numeric id, the application it belongs to, a reachable URL
//! (absent for the local process) and free-form string metadata used for capability tagging.

use crate::framework::address::ActorAddress;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    id: u64,
    app_name: String,
    url: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl ProcessInfo {
    pub fn new(id: u64, app_name: impl Into<String>) -> Self {
        Self {
            id,
            app_name: app_name.into(),
            url: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The id in the same hexadecimal form used by addresses.
    pub fn id_string(&self) -> String {
        format!("{:016x}", self.id)
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.metadata
    }

    /// True when `metadata[key]` parses as the boolean `true`.
    pub fn has_capability(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    /// The address of the process itself (actor number 0).
    pub fn address(&self) -> ActorAddress {
        ActorAddress::process(self.id)
    }

    /// Builds the address of an actor hosted by this process.
    pub fn actor(&self, actor_number: u64) -> ActorAddress {
        ActorAddress::new(self.id, actor_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_flags_are_parsed_leniently() {
        let process = ProcessInfo::new(1, "cav")
            .with_metadata("supportsCalculators", "TRUE")
            .with_metadata("supportsGreeters", "nope");
        assert!(process.has_capability("supportsCalculators"));
        assert!(!process.has_capability("supportsGreeters"));
        assert!(!process.has_capability("missing"));
    }

    #[test]
    fn builds_addresses_on_this_process() {
        let process = ProcessInfo::new(0x2a, "cav");
        assert_eq!(process.address(), ActorAddress::process(0x2a));
        assert_eq!(process.actor(5), ActorAddress::new(0x2a, 5));
        assert_eq!(process.id_string(), "000000000000002a");
    }
}
