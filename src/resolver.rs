//! Device resolution.
//!
//! The supervisor never owns the device registry. It asks a
//! [`DeviceResolver`] to turn a [`DeviceRef`] into [`Addressing`] at the
//! moment a job is dispatched, so registry edits take effect for jobs that
//! are still queued.
//!
//! [`DeviceTable`] is a thread-safe in-memory resolver that a host can keep
//! in sync with its own registry.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::Result;
use crate::identifiers::DeviceRef;
use crate::protocol::Addressing;

// ============================================================================
// DeviceResolver
// ============================================================================

/// Resolves device references to RF addressing fields.
pub trait DeviceResolver: Send + Sync {
    /// Returns the addressing of `device`, or `None` if it is unknown.
    fn resolve(&self, device: &DeviceRef) -> Option<Addressing>;
}

impl<F> DeviceResolver for F
where
    F: Fn(&DeviceRef) -> Option<Addressing> + Send + Sync,
{
    fn resolve(&self, device: &DeviceRef) -> Option<Addressing> {
        self(device)
    }
}

// ============================================================================
// DeviceTable
// ============================================================================

/// In-memory device table.
///
/// # Example
///
/// ```ignore
/// let table = DeviceTable::new();
/// table.insert("ARC_A_1", Addressing::remote_code('A', 1)?)?;
/// assert!(table.resolve(&"ARC_A_1".into()).is_some());
/// ```
#[derive(Debug, Default)]
pub struct DeviceTable {
    /// Addressing by device reference.
    devices: RwLock<FxHashMap<DeviceRef, Addressing>>,
}

impl DeviceTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a device.
    ///
    /// Returns the previous addressing, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`](crate::Error::InvalidAddress) if
    /// the addressing fails validation. Valid addressing is stored
    /// normalized.
    pub fn insert(
        &self,
        device: impl Into<DeviceRef>,
        addressing: Addressing,
    ) -> Result<Option<Addressing>> {
        let addressing = addressing.normalize()?;
        let device = device.into();
        debug!(device = %device, addressing = %addressing, "Device registered");
        Ok(self.devices.write().insert(device, addressing))
    }

    /// Removes a device, returning its addressing.
    pub fn remove(&self, device: &DeviceRef) -> Option<Addressing> {
        self.devices.write().remove(device)
    }

    /// Returns the number of registered devices.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns `true` if no device is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

impl DeviceResolver for DeviceTable {
    fn resolve(&self, device: &DeviceRef) -> Option<Addressing> {
        self.devices.read().get(device).cloned()
    }
}

impl FromIterator<(DeviceRef, Addressing)> for DeviceTable {
    fn from_iter<I: IntoIterator<Item = (DeviceRef, Addressing)>>(iter: I) -> Self {
        let devices = iter
            .into_iter()
            .filter_map(|(device, addressing)| Some((device, addressing.normalize().ok()?)))
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::Family;

    #[test]
    fn test_insert_and_resolve() {
        let table = DeviceTable::new();
        assert!(table.is_empty());

        let addressing = Addressing::remote_code('A', 1).expect("valid");
        let previous = table.insert("ARC_A_1", addressing.clone()).expect("insert");
        assert!(previous.is_none());
        assert_eq!(table.len(), 1);

        let resolved = table.resolve(&"ARC_A_1".into()).expect("known device");
        assert_eq!(resolved, addressing);
        assert!(table.resolve(&"does-not-exist".into()).is_none());
    }

    #[test]
    fn test_insert_rejects_invalid_addressing() {
        let table = DeviceTable::new();
        let bad = Addressing::RemoteCode {
            house_code: 'Z',
            unit_code: 1,
        };
        assert!(table.insert("bad", bad).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_stores_normalized_addressing() {
        let table = DeviceTable::new();
        let lower = Addressing::AddressableSwitch {
            device_id: "a1b2c3".to_string(),
            unit_code: 0,
        };
        table.insert("AC_A1B2C3_0", lower).expect("insert");

        let resolved = table.resolve(&"AC_A1B2C3_0".into()).expect("known device");
        assert_eq!(resolved.to_string(), "0xA1B2C3/0");
    }

    #[test]
    fn test_remove() {
        let table = DeviceTable::new();
        let addressing = Addressing::addressable_switch("123456", 0).expect("valid");
        table.insert("AC_123456_0", addressing).expect("insert");

        let removed = table.remove(&"AC_123456_0".into()).expect("removed");
        assert_eq!(removed.family(), Family::AddressableSwitch);
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_iter_skips_invalid() {
        let table: DeviceTable = [
            (
                DeviceRef::new("ARC_A_1"),
                Addressing::remote_code('A', 1).expect("valid"),
            ),
            (
                DeviceRef::new("broken"),
                Addressing::RemoteCode {
                    house_code: 'A',
                    unit_code: 0,
                },
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |device: &DeviceRef| {
            (device.as_str() == "ARC_B_2").then(|| Addressing::remote_code('B', 2).ok())?
        };
        assert!(resolver.resolve(&"ARC_B_2".into()).is_some());
        assert!(resolver.resolve(&"other".into()).is_none());
    }
}
