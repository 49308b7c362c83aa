//! Global registry bookkeeping
//!
//! Interest in each interface is declared up front with a supported version
//! range. As `wl_registry.global` events arrive the registry decides whether
//! the global should be bound and at which version; the protocol glue then
//! performs the actual bind and reports back with [`Registry::mark_bound`].
//!
//! Singletons (compositor, shm, shell, ...) are bound at most once. Multi
//! interests (seat, output) are bound for every announcement for as long as
//! the connection lives, so hot-plugged outputs go through the same path as
//! the initial ones.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("compositor offers {interface} version {offered}, at least {min} is required")]
    ProtocolVersion {
        interface: String,
        offered: u32,
        min: u32,
    },

    #[error("required global {0} was not announced by the compositor")]
    MissingGlobal(String),

    #[error("global {name} ({interface}) is already bound")]
    AlreadyBound { name: u32, interface: String },

    #[error("unknown global {0}")]
    UnknownGlobal(u32),
}

/// How often an interface may be bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestKind {
    /// Bound at most once; `required` singletons must exist after the first round trip
    Singleton { required: bool },
    /// Bound for every announcement (seats, outputs)
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalInterest {
    pub interface: &'static str,
    pub min_version: u32,
    pub max_version: u32,
    pub kind: InterestKind,
}

/// One announced global the registry decided to bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalEntry {
    pub name: u32,
    pub interface: &'static str,
    pub version: u32,
    pub kind: InterestKind,
    bound: bool,
}

impl GlobalEntry {
    pub fn is_bound(&self) -> bool {
        self.bound
    }
}

/// A global that went away, with the kind needed to route the removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedGlobal {
    pub name: u32,
    pub interface: &'static str,
    pub kind: InterestKind,
}

/// Pick the version to bind: the highest both sides support
pub fn negotiate_version(
    interface: &str,
    offered: u32,
    min: u32,
    max: u32,
) -> Result<u32, RegistryError> {
    if offered < min {
        return Err(RegistryError::ProtocolVersion {
            interface: interface.to_string(),
            offered,
            min,
        });
    }
    Ok(max.min(offered))
}

#[derive(Debug, Default)]
pub struct Registry {
    interests: HashMap<&'static str, GlobalInterest>,
    entries: HashMap<u32, GlobalEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare interest in a singleton interface
    pub fn request_singleton(
        &mut self,
        interface: &'static str,
        min_version: u32,
        max_version: u32,
        required: bool,
    ) {
        self.interests.insert(
            interface,
            GlobalInterest {
                interface,
                min_version,
                max_version,
                kind: InterestKind::Singleton { required },
            },
        );
    }

    /// Declare interest in an interface that may be announced many times
    pub fn request(&mut self, interface: &'static str, min_version: u32, max_version: u32) {
        self.interests.insert(
            interface,
            GlobalInterest {
                interface,
                min_version,
                max_version,
                kind: InterestKind::Multi,
            },
        );
    }

    pub fn interest(&self, interface: &str) -> Option<&GlobalInterest> {
        self.interests.get(interface)
    }

    /// Handle a `wl_registry.global` announcement
    ///
    /// Returns the entry to bind, `None` if the interface is of no interest
    /// or is a singleton that is already bound.
    pub fn announce(
        &mut self,
        name: u32,
        interface: &str,
        offered: u32,
    ) -> Result<Option<GlobalEntry>, RegistryError> {
        let Some(interest) = self.interests.get(interface) else {
            return Ok(None);
        };

        if let InterestKind::Singleton { .. } = interest.kind {
            if self.find(interest.interface).is_some() {
                tracing::debug!(name, interface, "ignoring second announcement of singleton");
                return Ok(None);
            }
        }

        let version = negotiate_version(
            interest.interface,
            offered,
            interest.min_version,
            interest.max_version,
        )?;

        let entry = GlobalEntry {
            name,
            interface: interest.interface,
            version,
            kind: interest.kind,
            bound: false,
        };
        self.entries.insert(name, entry.clone());
        tracing::debug!(name, interface, offered, version, "global accepted");
        Ok(Some(entry))
    }

    /// Record that the protocol object for `name` was created
    pub fn mark_bound(&mut self, name: u32) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(&name)
            .ok_or(RegistryError::UnknownGlobal(name))?;
        if entry.bound {
            return Err(RegistryError::AlreadyBound {
                name,
                interface: entry.interface.to_string(),
            });
        }
        entry.bound = true;
        Ok(())
    }

    /// Fail if any required singleton is still unbound
    pub fn check_required(&self) -> Result<(), RegistryError> {
        let mut missing: Vec<&str> = self
            .interests
            .values()
            .filter(|i| matches!(i.kind, InterestKind::Singleton { required: true }))
            .filter(|i| !self.is_bound(i.interface))
            .map(|i| i.interface)
            .collect();
        missing.sort_unstable();
        match missing.first() {
            Some(interface) => Err(RegistryError::MissingGlobal(interface.to_string())),
            None => Ok(()),
        }
    }

    /// Handle a `wl_registry.global_remove`
    pub fn remove(&mut self, name: u32) -> Option<RemovedGlobal> {
        self.entries.remove(&name).map(|entry| RemovedGlobal {
            name,
            interface: entry.interface,
            kind: entry.kind,
        })
    }

    pub fn is_bound(&self, interface: &str) -> bool {
        self.find(interface).is_some_and(|e| e.bound)
    }

    /// The entry for a singleton interface, if one was announced
    pub fn find(&self, interface: &str) -> Option<&GlobalEntry> {
        self.entries.values().find(|e| e.interface == interface)
    }

    pub fn entries(&self) -> impl Iterator<Item = &GlobalEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_picks_lowest_of_offered_and_max() {
        assert_eq!(negotiate_version("wl_compositor", 6, 1, 4), Ok(4));
        assert_eq!(negotiate_version("wl_compositor", 3, 1, 4), Ok(3));
        assert_eq!(negotiate_version("wl_output", 2, 2, 3), Ok(2));
    }

    #[test]
    fn negotiate_rejects_too_old() {
        let err = negotiate_version("wl_output", 1, 2, 3).unwrap_err();
        assert_eq!(
            err,
            RegistryError::ProtocolVersion {
                interface: "wl_output".to_string(),
                offered: 1,
                min: 2,
            }
        );
    }

    #[test]
    fn uninteresting_globals_ignored() {
        let mut registry = Registry::new();
        registry.request_singleton("wl_compositor", 1, 4, true);
        assert_eq!(registry.announce(1, "zwlr_layer_shell_v1", 4), Ok(None));
    }

    #[test]
    fn singleton_bound_once() {
        let mut registry = Registry::new();
        registry.request_singleton("wl_shm", 1, 1, true);

        let entry = registry.announce(3, "wl_shm", 1).unwrap().unwrap();
        assert_eq!(entry.version, 1);
        registry.mark_bound(3).unwrap();

        assert!(matches!(
            registry.mark_bound(3),
            Err(RegistryError::AlreadyBound { name: 3, .. })
        ));
        // A second wl_shm global is not bound again
        assert_eq!(registry.announce(9, "wl_shm", 1), Ok(None));
    }

    #[test]
    fn multi_interest_accepts_every_announcement() {
        let mut registry = Registry::new();
        registry.request("wl_output", 2, 3);

        assert!(registry.announce(10, "wl_output", 4).unwrap().is_some());
        assert!(registry.announce(11, "wl_output", 3).unwrap().is_some());
        registry.mark_bound(10).unwrap();
        registry.mark_bound(11).unwrap();

        let removed = registry.remove(10).unwrap();
        assert_eq!(removed.kind, InterestKind::Multi);
        assert_eq!(removed.interface, "wl_output");
        assert!(registry.remove(10).is_none());
    }

    #[test]
    fn missing_required_reported() {
        let mut registry = Registry::new();
        registry.request_singleton("wl_compositor", 1, 4, true);
        registry.request_singleton("wl_shm", 1, 1, true);
        registry.request_singleton("wp_presentation", 1, 1, false);

        registry.announce(1, "wl_compositor", 4).unwrap();
        registry.mark_bound(1).unwrap();

        assert_eq!(
            registry.check_required(),
            Err(RegistryError::MissingGlobal("wl_shm".to_string()))
        );

        registry.announce(2, "wl_shm", 1).unwrap();
        registry.mark_bound(2).unwrap();
        assert_eq!(registry.check_required(), Ok(()));
        assert!(!registry.is_bound("wp_presentation"));
    }
}
