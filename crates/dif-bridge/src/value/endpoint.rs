//! Interned endpoint identities

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;

fn registry() -> &'static DashMap<String, Weak<EndpointName>> {
    static ENDPOINTS: OnceLock<DashMap<String, Weak<EndpointName>>> = OnceLock::new();
    ENDPOINTS.get_or_init(DashMap::new)
}

#[derive(Debug)]
struct EndpointName(String);

impl Drop for EndpointName {
    fn drop(&mut self) {
        // Only drop the entry if no newer instance took its place
        registry().remove_if(&self.0, |_, weak| weak.strong_count() == 0);
    }
}

/// A communication endpoint, interned by name.
///
/// While any handle for a name is alive, [`Endpoint::get`] returns a handle
/// to the same instance; the registry only holds weak entries.
#[derive(Clone)]
pub struct Endpoint(Arc<EndpointName>);

impl Endpoint {
    /// The live instance for `name`, or a newly registered one
    pub fn get(name: &str) -> Self {
        let mut slot = registry()
            .entry(name.to_string())
            .or_insert_with(Weak::new);
        if let Some(existing) = slot.upgrade() {
            return Endpoint(existing);
        }
        let endpoint = Arc::new(EndpointName(name.to_string()));
        *slot = Arc::downgrade(&endpoint);
        Endpoint(endpoint)
    }

    /// The endpoint name
    pub fn name(&self) -> &str {
        &self.0 .0
    }

    /// Whether both handles are the same interned instance
    pub fn ptr_eq(&self, other: &Endpoint) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Endpoint {}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({})", self.name())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_is_same_instance() {
        let a = Endpoint::get("@interned-alice");
        let b = Endpoint::get("@interned-alice");
        assert!(a.ptr_eq(&b));
        assert_eq!(b.to_string(), "@interned-alice");
    }

    #[test]
    fn test_entry_removed_after_last_drop() {
        let name = "@interned-transient";
        let endpoint = Endpoint::get(name);
        assert!(registry().contains_key(name));
        drop(endpoint);
        assert!(!registry().contains_key(name));

        let fresh = Endpoint::get(name);
        assert_eq!(fresh.name(), name);
    }
}
