//! Incremental per-interface status store.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::slug::Endpoint;

/// Metric name carrying the administrative status of an interface.
pub const ADMIN_STATUS_METRIC: &str = "interfaces_interface_state_admin_status";

/// Metric name carrying the operational status of an interface.
pub const OPER_STATUS_METRIC: &str = "interfaces_interface_state_oper_status";

/// Which status field a metric updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    Admin,
    Oper,
}

impl StatusField {
    /// Recognize one of the two interface status metrics.
    pub fn from_metric_name(name: &str) -> Option<Self> {
        match name {
            ADMIN_STATUS_METRIC => Some(StatusField::Admin),
            OPER_STATUS_METRIC => Some(StatusField::Oper),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusField::Admin => "admin",
            StatusField::Oper => "oper",
        }
    }
}

/// Last known status of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceState {
    pub admin: Option<String>,
    pub oper: Option<String>,
}

/// Interface states keyed by endpoint.
///
/// Records are created on first merge and live for the process lifetime.
/// Each merge runs under the store lock, so admin and oper updates for the
/// same endpoint never overwrite each other.
#[derive(Debug, Default)]
pub struct InterfaceStateStore {
    states: Mutex<HashMap<Endpoint, InterfaceState>>,
}

impl InterfaceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field of an endpoint's state and return the merged snapshot.
    pub fn merge(
        &self,
        endpoint: &Endpoint,
        field: StatusField,
        value: impl Into<String>,
    ) -> InterfaceState {
        let mut states = self.states.lock();
        let state = states.entry(endpoint.clone()).or_default();
        let value = Some(value.into());
        match field {
            StatusField::Admin => state.admin = value,
            StatusField::Oper => state.oper = value,
        }
        state.clone()
    }

    /// Current state of an endpoint, if anything has been observed for it.
    pub fn snapshot(&self, endpoint: &Endpoint) -> Option<InterfaceState> {
        self.states.lock().get(endpoint).cloned()
    }

    /// Number of tracked endpoints.
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("r2", "management1")
    }

    #[test]
    fn test_status_field_from_metric_name() {
        assert_eq!(
            StatusField::from_metric_name("interfaces_interface_state_admin_status"),
            Some(StatusField::Admin)
        );
        assert_eq!(
            StatusField::from_metric_name("interfaces_interface_state_oper_status"),
            Some(StatusField::Oper)
        );
        assert_eq!(
            StatusField::from_metric_name("interfaces_interface_state_description"),
            None
        );
    }

    #[test]
    fn test_merge_creates_and_updates_fields() {
        let store = InterfaceStateStore::new();
        assert!(store.snapshot(&endpoint()).is_none());

        let state = store.merge(&endpoint(), StatusField::Admin, "UP");
        assert_eq!(state.admin.as_deref(), Some("UP"));
        assert_eq!(state.oper, None);

        let state = store.merge(&endpoint(), StatusField::Oper, "UP");
        assert_eq!(state.admin.as_deref(), Some("UP"));
        assert_eq!(state.oper.as_deref(), Some("UP"));

        let state = store.merge(&endpoint(), StatusField::Admin, "DOWN");
        assert_eq!(state.admin.as_deref(), Some("DOWN"));
        assert_eq!(state.oper.as_deref(), Some("UP"));

        assert_eq!(store.snapshot(&endpoint()), Some(state));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_endpoints_are_independent() {
        let store = InterfaceStateStore::new();
        let other = Endpoint::new("r2", "ethernet1");

        store.merge(&endpoint(), StatusField::Oper, "UP");
        store.merge(&other, StatusField::Oper, "DOWN");

        assert_eq!(
            store.snapshot(&endpoint()).unwrap().oper.as_deref(),
            Some("UP")
        );
        assert_eq!(store.snapshot(&other).unwrap().oper.as_deref(), Some("DOWN"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_merges_keep_both_fields() {
        let store = InterfaceStateStore::new();

        for round in 0..50 {
            let endpoint = Endpoint::new("r1", format!("ethernet{}", round));
            std::thread::scope(|s| {
                s.spawn(|| store.merge(&endpoint, StatusField::Admin, "UP"));
                s.spawn(|| store.merge(&endpoint, StatusField::Oper, "DOWN"));
            });

            let state = store.snapshot(&endpoint).unwrap();
            assert_eq!(state.admin.as_deref(), Some("UP"));
            assert_eq!(state.oper.as_deref(), Some("DOWN"));
        }
        assert_eq!(store.len(), 50);
    }
}
