//! # Process Discovery
//!
//! The transport only needs a read model of the other processes: who exists, where they can
//! be reached and what metadata they advertise. [`ProcessRegistry`] is that read model;
//! [`StaticRegistry`] is the in-memory implementation seeded from configuration and refreshed
//! by whoever owns discovery. [`Network`] is the view of one process: the peers of the
//! applications it cares about, itself excluded.

use crate::framework::ProcessInfo;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ProcessRegistry: Send + Sync {
    /// Every known process.
    fn processes(&self) -> Vec<ProcessInfo>;

    fn resolve(&self, id: u64) -> Option<ProcessInfo>;
}

#[derive(Debug, Default)]
pub struct StaticRegistry {
    processes: RwLock<HashMap<u64, ProcessInfo>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_peers(peers: impl IntoIterator<Item = ProcessInfo>) -> Self {
        let registry = Self::new();
        registry.replace(peers);
        registry
    }

    pub fn insert(&self, process: ProcessInfo) {
        self.processes.write().insert(process.id(), process);
    }

    pub fn remove(&self, id: u64) -> Option<ProcessInfo> {
        self.processes.write().remove(&id)
    }

    /// Swaps the whole content, as a discovery refresh would.
    pub fn replace(&self, peers: impl IntoIterator<Item = ProcessInfo>) {
        let fresh: HashMap<u64, ProcessInfo> = peers
            .into_iter()
            .map(|process| (process.id(), process))
            .collect();
        *self.processes.write() = fresh;
    }

    pub fn len(&self) -> usize {
        self.processes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.read().is_empty()
    }
}

impl ProcessRegistry for StaticRegistry {
    fn processes(&self) -> Vec<ProcessInfo> {
        self.processes.read().values().cloned().collect()
    }

    fn resolve(&self, id: u64) -> Option<ProcessInfo> {
        self.processes.read().get(&id).cloned()
    }
}

/// The peers one process works with.
pub struct Network {
    local: ProcessInfo,
    applications: Vec<String>,
    registry: Arc<dyn ProcessRegistry>,
}

impl Network {
    /// `applications` lists the application names whose processes are visible; an empty list
    /// means only the local process's own application.
    pub fn new(
        local: ProcessInfo,
        applications: Vec<String>,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Self {
        let applications = if applications.is_empty() {
            vec![local.app_name().to_string()]
        } else {
            applications
        };
        Self {
            local,
            applications,
            registry,
        }
    }

    pub fn local(&self) -> &ProcessInfo {
        &self.local
    }

    pub fn registry(&self) -> &Arc<dyn ProcessRegistry> {
        &self.registry
    }

    fn is_visible(&self, process: &ProcessInfo) -> bool {
        process.id() != self.local.id()
            && self
                .applications
                .iter()
                .any(|app| app.eq_ignore_ascii_case(process.app_name()))
    }

    /// Visible peers, the local process excluded.
    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.registry
            .processes()
            .into_iter()
            .filter(|process| self.is_visible(process))
            .collect()
    }

    /// URL of the mailbox host of process `id`, if it is known and reachable.
    pub fn resolve(&self, id: u64) -> Option<String> {
        self.registry
            .resolve(id)
            .and_then(|process| process.url().map(str::to_string))
    }

    /// A process advertising the boolean capability `key`, preferring the local one.
    pub fn pick_with_metadata(&self, key: &str) -> Option<ProcessInfo> {
        if self.local.has_capability(key) {
            return Some(self.local.clone());
        }
        let capable: Vec<ProcessInfo> = self
            .processes()
            .into_iter()
            .filter(|process| process.has_capability(key))
            .collect();
        capable.choose(&mut rand::thread_rng()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u64, app: &str) -> ProcessInfo {
        ProcessInfo::new(id, app).with_url(format!("http://peer-{id}"))
    }

    #[test]
    fn static_registry_replace_and_remove() {
        let registry = StaticRegistry::from_peers([peer(1, "a"), peer(2, "a")]);
        assert_eq!(registry.len(), 2);
        assert!(registry.remove(1).is_some());
        assert!(registry.resolve(1).is_none());

        registry.replace([peer(3, "a")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(2).is_none());
        assert_eq!(registry.resolve(3).unwrap().url(), Some("http://peer-3"));
    }

    #[test]
    fn network_filters_by_application_and_excludes_itself() {
        let local = ProcessInfo::new(1, "cav");
        let registry = Arc::new(StaticRegistry::from_peers([
            peer(1, "cav"),
            peer(2, "CAV"),
            peer(3, "other"),
        ]));
        let network = Network::new(local, Vec::new(), registry);
        let ids: Vec<u64> = network.processes().iter().map(ProcessInfo::id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(network.resolve(3).as_deref(), Some("http://peer-3"));
        assert_eq!(network.resolve(9), None);
    }

    #[test]
    fn pick_prefers_the_local_process() {
        let registry = Arc::new(StaticRegistry::from_peers([
            peer(2, "cav").with_metadata("calc", "true")
        ]));
        let local = ProcessInfo::new(1, "cav").with_metadata("calc", "true");
        let network = Network::new(local, Vec::new(), registry.clone());
        assert_eq!(network.pick_with_metadata("calc").map(|p| p.id()), Some(1));

        let network = Network::new(ProcessInfo::new(1, "cav"), Vec::new(), registry);
        assert_eq!(network.pick_with_metadata("calc").map(|p| p.id()), Some(2));
        assert!(network.pick_with_metadata("greet").is_none());
    }
}
