//! Per-connection context store.
//!
//! Each worker owns one [`ConnectionContextStore`]: a nested map from
//! connection fd to that connection's key/value scope. The current fd is
//! carried explicitly by a [`ContextScope`] handle threaded through every
//! entry point rather than resolved from ambient task-local state; fd 0 is
//! the "no active binding" scope.
//!
//! The host server serializes event delivery per connection, so at most one
//! task touches a given fd's scope at a time. The lock below only guards the
//! outer map; [`ContextScope::copy_from`] is the single deliberate
//! cross-task sharing path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use wsgate_core::ConnectionId;

/// Context key holding the current upgrade request.
pub const REQUEST_KEY: &str = "ws.request";
/// Context key holding the response being assembled.
pub const RESPONSE_KEY: &str = "ws.response";
/// Context key holding the bound handler name.
pub const HANDLER_KEY: &str = "ws.handler";

/// Process-local store of per-connection key/value scopes.
pub struct ConnectionContextStore {
    scopes: RwLock<HashMap<ConnectionId, HashMap<String, Value>>>,
}

impl ConnectionContextStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a scope handle for the given connection.
    #[must_use]
    pub fn scope(self: &Arc<Self>, fd: ConnectionId) -> ContextScope {
        ContextScope {
            store: Arc::clone(self),
            fd,
        }
    }

    /// Remove a connection's entire scope.
    ///
    /// Must run on close and on handshake failure. After this, no key under
    /// `fd` is observable.
    pub fn release(&self, fd: ConnectionId) {
        let _ = self.scopes.write().remove(&fd);
    }

    fn read(&self, fd: ConnectionId, key: &str) -> Option<Value> {
        self.scopes
            .read()
            .get(&fd)
            .and_then(|scope| scope.get(key))
            // A stored null is treated as absent.
            .filter(|v| !v.is_null())
            .cloned()
    }

    fn write(&self, fd: ConnectionId, key: &str, value: Value) {
        // Sub-map is created lazily on first write.
        let _ = self
            .scopes
            .write()
            .entry(fd)
            .or_default()
            .insert(key.to_owned(), value);
    }
}

impl Default for ConnectionContextStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle binding a store to one connection's scope.
///
/// Cheap to clone; all operations default to the bound fd, with explicit
/// override variants for the pipe-listener path.
#[derive(Clone)]
pub struct ContextScope {
    store: Arc<ConnectionContextStore>,
    fd: ConnectionId,
}

impl ContextScope {
    /// The connection this scope is bound to.
    #[must_use]
    pub fn current(&self) -> ConnectionId {
        self.fd
    }

    /// Write a value under the current scope, returning it.
    pub fn set(&self, key: &str, value: Value) -> Value {
        self.store.write(self.fd, key, value.clone());
        value
    }

    /// Read a value from the current scope. A stored null is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.read(self.fd, key)
    }

    /// Read a value from an explicitly named connection's scope.
    #[must_use]
    pub fn get_from(&self, key: &str, fd: ConnectionId) -> Option<Value> {
        self.store.read(fd, key)
    }

    /// Read a value, falling back to `default` when absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Whether a non-null value exists under the current scope.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether a non-null value exists under an explicitly named scope.
    #[must_use]
    pub fn has_in(&self, key: &str, fd: ConnectionId) -> bool {
        self.get_from(key, fd).is_some()
    }

    /// Remove one key from the current scope.
    pub fn destroy(&self, key: &str) {
        if let Some(scope) = self.store.scopes.write().get_mut(&self.fd) {
            let _ = scope.remove(key);
        }
    }

    /// Remove the current connection's entire scope.
    pub fn release(&self) {
        self.store.release(self.fd);
    }

    /// Clone entries from `source` into the current scope.
    ///
    /// With an empty key list the full scope is snapshotted as of call time;
    /// later mutations to `source` are not reflected. With keys given, only
    /// `keys ∩ existing-keys` is installed. Seeds a fresh task from an
    /// established connection.
    pub fn copy_from(&self, source: ConnectionId, keys: &[&str]) {
        let mut scopes = self.store.scopes.write();
        let Some(from) = scopes.get(&source) else {
            return;
        };
        let installed: HashMap<String, Value> = if keys.is_empty() {
            from.clone()
        } else {
            keys.iter()
                .filter_map(|k| from.get(*k).map(|v| ((*k).to_owned(), v.clone())))
                .collect()
        };
        let _ = scopes.insert(self.fd, installed);
    }

    /// Read-or-default then atomically replace via `f`, returning the new
    /// value.
    pub fn override_with(&self, key: &str, f: impl FnOnce(Option<Value>) -> Value) -> Value {
        let mut scopes = self.store.scopes.write();
        let scope = scopes.entry(self.fd).or_default();
        let current = scope.get(key).filter(|v| !v.is_null()).cloned();
        let next = f(current);
        let _ = scope.insert(key.to_owned(), next.clone());
        next
    }

    /// Return the existing value or store the given one.
    pub fn get_or_set(&self, key: &str, value: Value) -> Value {
        self.get_or_set_with(key, || value)
    }

    /// Return the existing value or lazily compute and store one.
    pub fn get_or_set_with(&self, key: &str, thunk: impl FnOnce() -> Value) -> Value {
        let mut scopes = self.store.scopes.write();
        let scope = scopes.entry(self.fd).or_default();
        if let Some(existing) = scope.get(key).filter(|v| !v.is_null()) {
            return existing.clone();
        }
        let value = thunk();
        let _ = scope.insert(key.to_owned(), value.clone());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Arc<ConnectionContextStore> {
        Arc::new(ConnectionContextStore::new())
    }

    #[test]
    fn set_returns_value_and_get_reads_it() {
        let scope = store().scope(ConnectionId::new(1));
        let v = scope.set("user", json!("alice"));
        assert_eq!(v, json!("alice"));
        assert_eq!(scope.get("user"), Some(json!("alice")));
    }

    #[test]
    fn scopes_are_isolated_per_fd() {
        let store = store();
        let a = store.scope(ConnectionId::new(1));
        let b = store.scope(ConnectionId::new(2));
        let _ = a.set("k", json!(1));
        assert!(!b.has("k"));
        assert_eq!(b.get("k"), None);
    }

    #[test]
    fn default_scope_is_fd_zero() {
        let store = store();
        let unbound = store.scope(ConnectionId::default());
        let _ = unbound.set("k", json!(true));
        assert!(store.scope(ConnectionId::new(0)).has("k"));
    }

    #[test]
    fn stored_null_is_absent() {
        let scope = store().scope(ConnectionId::new(1));
        let _ = scope.set("k", Value::Null);
        assert!(!scope.has("k"));
        assert_eq!(scope.get("k"), None);
        assert_eq!(scope.get_or("k", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn get_or_returns_default_when_missing() {
        let scope = store().scope(ConnectionId::new(1));
        assert_eq!(scope.get_or("missing", json!(7)), json!(7));
    }

    #[test]
    fn get_from_reads_override_scope() {
        let store = store();
        let a = store.scope(ConnectionId::new(1));
        let b = store.scope(ConnectionId::new(2));
        let _ = a.set("k", json!("from-a"));
        assert_eq!(b.get_from("k", ConnectionId::new(1)), Some(json!("from-a")));
        assert!(b.has_in("k", ConnectionId::new(1)));
        assert!(!b.has_in("k", ConnectionId::new(3)));
    }

    #[test]
    fn destroy_removes_single_key() {
        let scope = store().scope(ConnectionId::new(1));
        let _ = scope.set("a", json!(1));
        let _ = scope.set("b", json!(2));
        scope.destroy("a");
        assert!(!scope.has("a"));
        assert!(scope.has("b"));
    }

    #[test]
    fn destroy_on_missing_scope_is_noop() {
        let scope = store().scope(ConnectionId::new(9));
        scope.destroy("never-set");
        assert!(!scope.has("never-set"));
    }

    #[test]
    fn release_removes_all_keys() {
        let store = store();
        let fd = ConnectionId::new(5);
        let scope = store.scope(fd);
        let _ = scope.set("a", json!(1));
        let _ = scope.set("b", json!(2));
        scope.release();
        assert!(!scope.has("a"));
        assert!(!scope.has("b"));
        // Re-check through a fresh scope as well.
        assert!(!store.scope(fd).has("a"));
    }

    #[test]
    fn release_by_store_with_explicit_fd() {
        let store = store();
        let scope = store.scope(ConnectionId::new(5));
        let _ = scope.set("a", json!(1));
        store.release(ConnectionId::new(5));
        assert!(!scope.has("a"));
    }

    #[test]
    fn copy_full_snapshot() {
        let store = store();
        let src = store.scope(ConnectionId::new(1));
        let dst = store.scope(ConnectionId::new(2));
        let _ = src.set("a", json!(1));
        let _ = src.set("b", json!(2));
        dst.copy_from(ConnectionId::new(1), &[]);
        assert_eq!(dst.get("a"), Some(json!(1)));
        assert_eq!(dst.get("b"), Some(json!(2)));
    }

    #[test]
    fn copy_snapshot_does_not_track_later_mutations() {
        let store = store();
        let src = store.scope(ConnectionId::new(1));
        let dst = store.scope(ConnectionId::new(2));
        let _ = src.set("a", json!("before"));
        dst.copy_from(ConnectionId::new(1), &[]);
        let _ = src.set("a", json!("after"));
        assert_eq!(dst.get("a"), Some(json!("before")));
    }

    #[test]
    fn copy_subset_installs_intersection_only() {
        let store = store();
        let src = store.scope(ConnectionId::new(1));
        let dst = store.scope(ConnectionId::new(2));
        let _ = src.set("a", json!(1));
        let _ = src.set("b", json!(2));
        dst.copy_from(ConnectionId::new(1), &["a", "nonexistent"]);
        assert_eq!(dst.get("a"), Some(json!(1)));
        assert!(!dst.has("b"));
        assert!(!dst.has("nonexistent"));
    }

    #[test]
    fn copy_replaces_destination_scope() {
        let store = store();
        let src = store.scope(ConnectionId::new(1));
        let dst = store.scope(ConnectionId::new(2));
        let _ = src.set("a", json!(1));
        let _ = dst.set("stale", json!(true));
        dst.copy_from(ConnectionId::new(1), &[]);
        assert!(!dst.has("stale"));
    }

    #[test]
    fn copy_from_missing_source_is_noop() {
        let store = store();
        let dst = store.scope(ConnectionId::new(2));
        let _ = dst.set("keep", json!(1));
        dst.copy_from(ConnectionId::new(99), &[]);
        assert_eq!(dst.get("keep"), Some(json!(1)));
    }

    #[test]
    fn override_with_receives_current_and_stores_new() {
        let scope = store().scope(ConnectionId::new(1));
        let _ = scope.set("count", json!(1));
        let next = scope.override_with("count", |cur| {
            let n = cur.and_then(|v| v.as_i64()).unwrap_or(0);
            json!(n + 1)
        });
        assert_eq!(next, json!(2));
        assert_eq!(scope.get("count"), Some(json!(2)));
    }

    #[test]
    fn override_with_missing_key_sees_none() {
        let scope = store().scope(ConnectionId::new(1));
        let v = scope.override_with("fresh", |cur| {
            assert!(cur.is_none());
            json!("init")
        });
        assert_eq!(v, json!("init"));
    }

    #[test]
    fn get_or_set_first_value_wins() {
        let scope = store().scope(ConnectionId::new(1));
        assert_eq!(scope.get_or_set("k", json!("v1")), json!("v1"));
        assert_eq!(scope.get_or_set("k", json!("v2")), json!("v1"));
    }

    #[test]
    fn get_or_set_with_thunk_runs_once() {
        let scope = store().scope(ConnectionId::new(1));
        let mut calls = 0;
        let _ = scope.get_or_set_with("k", || {
            calls += 1;
            json!("computed")
        });
        let again = scope.get_or_set_with("k", || {
            calls += 1;
            json!("recomputed")
        });
        assert_eq!(calls, 1);
        assert_eq!(again, json!("computed"));
    }

    #[test]
    fn release_then_write_recreates_scope_lazily() {
        let store = store();
        let scope = store.scope(ConnectionId::new(1));
        let _ = scope.set("a", json!(1));
        scope.release();
        let _ = scope.set("b", json!(2));
        assert!(!scope.has("a"));
        assert!(scope.has("b"));
    }
}
