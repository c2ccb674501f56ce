//! RCU service registry: the authoritative service → PoP-list mapping.
//!
//! Readers load the current snapshot pointer with acquire semantics and
//! keep it alive by refcount; they never block and never see a torn map.
//! Writers copy the whole map, apply one mutation, and publish the new
//! snapshot atomically with release semantics. Old snapshots are
//! reclaimed when the last reader drops its `Arc`.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use hashbrown::HashMap;

use crate::error::{RegistryError, Result};
use crate::pop::Pop;

/// Maximum number of services in the registry.
pub const MAX_SERVICES: usize = 128;
/// Maximum number of PoPs per service.
pub const MAX_POPS_PER_SERVICE: usize = 32;
/// Minimum length for service, PoP, and region identifiers.
pub const MIN_ID_LEN: usize = 2;
/// Maximum length for service, PoP, and region identifiers.
pub const MAX_ID_LEN: usize = 32;
/// Maximum length for textual IP addresses.
pub const MAX_IP_LEN: usize = 64;

/// The published snapshot type: service id → ordered PoP list.
pub type ServiceMap = HashMap<String, Vec<Pop>>;

/// Cumulative mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Successful `add_service` calls.
    pub adds: u64,
    /// Successful `replace_service` calls.
    pub replaces: u64,
    /// Successful `upsert_service` calls.
    pub upserts: u64,
    /// Successful `remove_service` calls.
    pub removes: u64,
    /// Rejected mutations (validation, capacity, missing/duplicate keys).
    pub failures: u64,
}

enum Mode {
    Add,
    Replace,
    Upsert,
}

/// Copy-on-write service registry with atomic snapshot publication.
///
/// Reads are wait-free. Mutations are serialized by an internal writer
/// lock (the expected deployment has a single control-plane writer; the
/// lock makes that assumption safe rather than load-bearing) and may
/// allocate. A rejected mutation never publishes.
pub struct ServiceRegistry {
    /// Current snapshot; the only shared-writer word in the registry.
    map: ArcSwap<ServiceMap>,
    /// Serializes copy-on-write mutators. Readers never touch it.
    write_lock: Mutex<()>,
    /// Monotonic version, incremented on every successful publish.
    version: AtomicU64,

    adds: AtomicU64,
    replaces: AtomicU64,
    upserts: AtomicU64,
    removes: AtomicU64,
    failures: AtomicU64,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: ArcSwap::from_pointee(ServiceMap::new()),
            write_lock: Mutex::new(()),
            version: AtomicU64::new(0),
            adds: AtomicU64::new(0),
            replaces: AtomicU64::new(0),
            upserts: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Returns the current snapshot.
    ///
    /// The returned `Arc` keeps the snapshot alive for the reader's
    /// scope; later publishes do not affect it.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<ServiceMap> {
        self.map.load_full()
    }

    /// Returns a copy of the PoPs for a service, if present.
    #[must_use]
    pub fn get_pops(&self, service_id: &str) -> Option<Vec<Pop>> {
        self.map.load().get(service_id).cloned()
    }

    /// Returns true if the service exists in the current snapshot.
    #[must_use]
    pub fn has_service(&self, service_id: &str) -> bool {
        self.map.load().contains_key(service_id)
    }

    /// Returns the number of services in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.load().len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.load().is_empty()
    }

    /// Lists the service identifiers in the current snapshot.
    #[must_use]
    pub fn list_services(&self) -> Vec<String> {
        self.map.load().keys().cloned().collect()
    }

    /// Returns the monotonic snapshot version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Returns cumulative mutation counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            adds: self.adds.load(Ordering::Relaxed),
            replaces: self.replaces.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Adds a new service.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Exists`] if the service is already present,
    /// [`RegistryError::Invalid`] on validation failure,
    /// [`RegistryError::Capacity`] when the registry is full.
    pub fn add_service(&self, service_id: &str, pops: &[Pop]) -> Result<()> {
        self.mutate(Mode::Add, service_id, pops)
    }

    /// Replaces the PoPs of an existing service.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if the service does not exist,
    /// [`RegistryError::Invalid`] on validation failure.
    pub fn replace_service(&self, service_id: &str, pops: &[Pop]) -> Result<()> {
        self.mutate(Mode::Replace, service_id, pops)
    }

    /// Inserts or overwrites a service.
    ///
    /// Re-upserting an existing key overwrites its PoP list.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Invalid`] on validation failure,
    /// [`RegistryError::Capacity`] when inserting into a full registry.
    pub fn upsert_service(&self, service_id: &str, pops: &[Pop]) -> Result<()> {
        self.mutate(Mode::Upsert, service_id, pops)
    }

    /// Removes a service. Returns true if it was present.
    ///
    /// Removing a missing service is a no-op: nothing is published and
    /// the version does not change.
    pub fn remove_service(&self, service_id: &str) -> bool {
        let _guard = self.write_lock.lock().expect("registry writer lock poisoned");

        let snap = self.map.load_full();
        if !snap.contains_key(service_id) {
            return false;
        }

        let mut next = ServiceMap::clone(&snap);
        next.remove(service_id);

        self.map.store(Arc::new(next));
        self.version.fetch_add(1, Ordering::Relaxed);
        self.removes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(service = service_id, "removed service");
        true
    }

    /// Removes all services. Maintenance operation; bumps the version.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().expect("registry writer lock poisoned");

        self.map.store(Arc::new(ServiceMap::new()));
        self.version.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("cleared registry");
    }

    fn mutate(&self, mode: Mode, service_id: &str, pops: &[Pop]) -> Result<()> {
        if !validate_id(service_id) || !validate_pops(pops) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(service = service_id, "rejected invalid registry mutation");
            return Err(RegistryError::Invalid);
        }

        let _guard = self.write_lock.lock().expect("registry writer lock poisoned");

        let snap = self.map.load_full();
        let exists = snap.contains_key(service_id);

        match mode {
            Mode::Add if exists => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(RegistryError::Exists);
            }
            Mode::Replace if !exists => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(RegistryError::NotFound);
            }
            _ => {}
        }

        if !exists && snap.len() >= MAX_SERVICES {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(RegistryError::Capacity);
        }

        let mut next = ServiceMap::clone(&snap);
        next.insert(service_id.to_owned(), pops.to_vec());

        self.map.store(Arc::new(next));
        self.version.fetch_add(1, Ordering::Relaxed);
        match mode {
            Mode::Add => self.adds.fetch_add(1, Ordering::Relaxed),
            Mode::Replace => self.replaces.fetch_add(1, Ordering::Relaxed),
            Mode::Upsert => self.upserts.fetch_add(1, Ordering::Relaxed),
        };
        tracing::debug!(
            service = service_id,
            pops = pops.len(),
            version = self.version(),
            "published registry snapshot"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

/// Validates a service, PoP, or region identifier: `[A-Za-z0-9_-]`,
/// length 2..=32.
fn validate_id(id: &str) -> bool {
    (MIN_ID_LEN..=MAX_ID_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validates an IP literal: parses as IPv4 or IPv6, textual length ≤ 64.
fn validate_ip(ip: &str) -> bool {
    ip.len() <= MAX_IP_LEN && ip.parse::<IpAddr>().is_ok()
}

/// Validates a PoP list: 1..=32 entries, all fields within limits, PoP
/// ids unique.
fn validate_pops(pops: &[Pop]) -> bool {
    if pops.is_empty() || pops.len() > MAX_POPS_PER_SERVICE {
        return false;
    }
    for pop in pops {
        if !validate_id(&pop.id) || !validate_id(&pop.region) || !validate_ip(&pop.ip) {
            return false;
        }
    }
    let mut ids: Vec<&str> = pops.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    ids.windows(2).all(|w| w[0] != w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pops(ids: &[&str]) -> Vec<Pop> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Pop::new(*id, "us-east", format!("203.0.113.{}", i + 1)))
            .collect()
    }

    #[test]
    fn test_empty_snapshot() {
        let reg = ServiceRegistry::new();
        assert!(reg.snapshot().is_empty());
        assert_eq!(reg.version(), 0);
    }

    #[test]
    fn test_add_and_version() {
        let reg = ServiceRegistry::new();
        reg.add_service("svc1", &pops(&["nyc", "sfo"])).unwrap();

        let snap = reg.snapshot();
        let list = snap.get("svc1").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "nyc");
        assert_eq!(list[1].id, "sfo");
        assert_eq!(reg.version(), 1);
    }

    #[test]
    fn test_add_existing_fails() {
        let reg = ServiceRegistry::new();
        reg.add_service("svc", &pops(&["nyc"])).unwrap();

        assert_eq!(
            reg.add_service("svc", &pops(&["sfo"])),
            Err(RegistryError::Exists)
        );
        assert_eq!(reg.stats().failures, 1);
        assert_eq!(reg.version(), 1);
    }

    #[test]
    fn test_replace_missing_fails() {
        let reg = ServiceRegistry::new();
        assert_eq!(
            reg.replace_service("ghost", &pops(&["nyc"])),
            Err(RegistryError::NotFound)
        );
        assert_eq!(reg.version(), 0);
    }

    #[test]
    fn test_replace_content() {
        let reg = ServiceRegistry::new();
        reg.add_service("svc", &pops(&["old"])).unwrap();
        reg.replace_service("svc", &pops(&["new"])).unwrap();

        let snap = reg.snapshot();
        assert_eq!(snap.get("svc").unwrap()[0].id, "new");
        assert_eq!(reg.version(), 2);
    }

    #[test]
    fn test_upsert_overwrites() {
        let reg = ServiceRegistry::new();
        reg.upsert_service("svc", &pops(&["a1", "a2"])).unwrap();
        reg.upsert_service("svc", &pops(&["b1"])).unwrap();

        let snap = reg.snapshot();
        assert_eq!(snap.get("svc").unwrap().len(), 1);
        assert_eq!(reg.stats().upserts, 2);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let reg = ServiceRegistry::new();
        reg.add_service("svcX", &pops(&["pp"])).unwrap();

        let before = reg.snapshot();
        let version = reg.version();

        assert!(!reg.remove_service("doesnotexist"));
        // No publish: same snapshot object, same version.
        assert!(Arc::ptr_eq(&before, &reg.snapshot()));
        assert_eq!(reg.version(), version);
    }

    #[test]
    fn test_remove_existing() {
        let reg = ServiceRegistry::new();
        reg.add_service("svc", &pops(&["nyc"])).unwrap();

        assert!(reg.remove_service("svc"));
        assert!(!reg.has_service("svc"));
        assert_eq!(reg.stats().removes, 1);
    }

    #[test]
    fn test_clear() {
        let reg = ServiceRegistry::new();
        reg.add_service("aa", &pops(&["p1"])).unwrap();
        reg.add_service("bb", &pops(&["p1"])).unwrap();

        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.version(), 3);
    }

    #[test]
    fn test_validation_rejections_do_not_publish() {
        let reg = ServiceRegistry::new();
        let before = reg.snapshot();

        // Invalid IP.
        let bad_ip = vec![Pop::new("ny", "r1", "not_an_ip")];
        assert_eq!(reg.add_service("svc", &bad_ip), Err(RegistryError::Invalid));

        // Duplicate PoP ids.
        let dup = vec![
            Pop::new("la", "r1", "192.0.2.10"),
            Pop::new("la", "r2", "192.0.2.11"),
        ];
        assert_eq!(reg.add_service("svc", &dup), Err(RegistryError::Invalid));

        // Bad service id (too short, bad chars).
        assert_eq!(reg.add_service("x", &pops(&["p1"])), Err(RegistryError::Invalid));
        assert_eq!(
            reg.add_service("bad id!", &pops(&["p1"])),
            Err(RegistryError::Invalid)
        );

        // Empty PoP list.
        assert_eq!(reg.add_service("svc", &[]), Err(RegistryError::Invalid));

        // Too many PoPs.
        let many: Vec<Pop> = (0..33)
            .map(|i| Pop::new(format!("p{i:02}"), "r1", "192.0.2.1"))
            .collect();
        assert_eq!(reg.add_service("svc", &many), Err(RegistryError::Invalid));

        assert!(Arc::ptr_eq(&before, &reg.snapshot()));
        assert_eq!(reg.version(), 0);
        assert_eq!(reg.stats().failures, 6);
    }

    #[test]
    fn test_ipv6_accepted() {
        let reg = ServiceRegistry::new();
        let v6 = vec![Pop::new("ams", "eu-west", "2001:db8::1")];
        reg.add_service("svc6", &v6).unwrap();
        assert!(reg.has_service("svc6"));
    }

    #[test]
    fn test_capacity_limit() {
        let reg = ServiceRegistry::new();
        for i in 0..MAX_SERVICES {
            reg.add_service(&format!("svc{i:03}"), &pops(&["p1"])).unwrap();
        }

        assert_eq!(
            reg.add_service("overflow", &pops(&["p1"])),
            Err(RegistryError::Capacity)
        );
        // Replacing an existing service is still allowed at capacity.
        reg.replace_service("svc000", &pops(&["p2"])).unwrap();
    }

    #[test]
    fn test_heterogeneous_lookup_shapes() {
        let reg = ServiceRegistry::new();
        reg.add_service("svc", &pops(&["nyc"])).unwrap();

        let owned = String::from("svc");
        assert!(reg.has_service(&owned));
        assert!(reg.has_service("svc"));
        assert_eq!(reg.get_pops("svc").unwrap().len(), 1);
        assert!(reg.get_pops("missing").is_none());
    }
}
