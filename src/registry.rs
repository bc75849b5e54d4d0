//! Saved locations, the single selection, and the alarm timing preference.
//!
//! At most one location is selected at any time. Selecting a location clears
//! every other selection in the same update, and deleting the selected location
//! leaves nothing selected. Operations that name an unknown id are no-ops.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::constants::*;
use crate::store::{KeyValueStore, StoreError, get_json, set_json};

/// A user-saved place the alarm can follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    pub id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_selected: bool,
}

impl SavedLocation {
    /// Create an unselected location with a fresh id.
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            latitude,
            longitude,
            is_selected: false,
        }
    }
}

/// Which side of sunrise the alarm fires on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmTiming {
    #[default]
    Before,
    After,
}

impl AlarmTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmTiming::Before => "before",
            AlarmTiming::After => "after",
        }
    }

    /// Human wording used in status output.
    pub fn label(&self) -> &'static str {
        match self {
            AlarmTiming::Before => "Before Sunrise",
            AlarmTiming::After => "After Sunrise",
        }
    }

    /// Signed offset applied to sunrise.
    pub fn offset_minutes(&self) -> i64 {
        match self {
            AlarmTiming::Before => -ALARM_OFFSET_MINUTES,
            AlarmTiming::After => ALARM_OFFSET_MINUTES,
        }
    }
}

impl std::str::FromStr for AlarmTiming {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before" | "before sunrise" => Ok(AlarmTiming::Before),
            "after" | "after sunrise" => Ok(AlarmTiming::After),
            other => anyhow::bail!("unknown alarm timing '{other}' (expected 'before' or 'after')"),
        }
    }
}

/// Check coordinates against the WGS84 ranges.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> anyhow::Result<()> {
    if !(MINIMUM_LATITUDE..=MAXIMUM_LATITUDE).contains(&latitude) {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {latitude})");
    }
    if !(MINIMUM_LONGITUDE..=MAXIMUM_LONGITUDE).contains(&longitude) {
        anyhow::bail!("longitude must be between -180 and 180 degrees (got {longitude})");
    }
    Ok(())
}

struct RegistryData {
    locations: Vec<SavedLocation>,
    timing: AlarmTiming,
}

/// Persistent registry of saved locations.
///
/// All methods take `&self`; mutations are serialized by an internal mutex and
/// written through to the store before the lock is released.
pub struct LocationRegistry {
    store: Arc<dyn KeyValueStore>,
    data: Mutex<RegistryData>,
}

impl LocationRegistry {
    /// Load the registry from `store`.
    ///
    /// A stored list with more than one selected entry keeps only the first one
    /// selected.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let mut locations: Vec<SavedLocation> =
            get_json(store.as_ref(), LOCATIONS_KEY)?.unwrap_or_default();

        let mut seen_selected = false;
        let mut repaired = false;
        for location in &mut locations {
            if location.is_selected {
                if seen_selected {
                    location.is_selected = false;
                    repaired = true;
                }
                seen_selected = true;
            }
        }
        if repaired {
            log_warning!("Stored locations had several selections; keeping the first one");
        }

        let timing = match store.get(TIMING_KEY)? {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log_warning!("Ignoring unknown stored alarm timing '{}'", raw.trim());
                AlarmTiming::default()
            }),
            None => AlarmTiming::default(),
        };

        Ok(Self {
            store,
            data: Mutex::new(RegistryData { locations, timing }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RegistryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist `locations` and adopt them only once the store accepted them.
    fn commit_locations(
        &self,
        data: &mut RegistryData,
        locations: Vec<SavedLocation>,
    ) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), LOCATIONS_KEY, &locations)?;
        data.locations = locations;
        Ok(())
    }

    /// Append a location and persist the full set.
    ///
    /// The stored record is always unselected; use [`Self::select`] afterwards.
    pub fn add(&self, mut location: SavedLocation) -> Result<SavedLocation, StoreError> {
        location.is_selected = false;
        let mut data = self.lock();
        let mut locations = data.locations.clone();
        locations.push(location.clone());
        self.commit_locations(&mut data, locations)?;
        Ok(location)
    }

    /// Append a location and make it the only selected one, in one update.
    pub fn add_and_select(&self, mut location: SavedLocation) -> Result<SavedLocation, StoreError> {
        let mut data = self.lock();
        let mut locations = data.locations.clone();
        for existing in &mut locations {
            existing.is_selected = false;
        }
        location.is_selected = true;
        locations.push(location.clone());
        self.commit_locations(&mut data, locations)?;
        Ok(location)
    }

    /// Remove the location with `id`. Removing the selected one clears the selection.
    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut data = self.lock();
        if !data.locations.iter().any(|location| location.id == id) {
            return Ok(());
        }
        let locations = data
            .locations
            .iter()
            .filter(|location| location.id != id)
            .cloned()
            .collect();
        self.commit_locations(&mut data, locations)
    }

    /// Select `id` and deselect everything else.
    ///
    /// Returns `false` without changing anything if `id` is unknown.
    pub fn select(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut data = self.lock();
        if !data.locations.iter().any(|location| location.id == id) {
            return Ok(false);
        }
        let mut locations = data.locations.clone();
        for location in &mut locations {
            location.is_selected = location.id == id;
        }
        self.commit_locations(&mut data, locations)?;
        Ok(true)
    }

    /// Change the display name of `id`. Returns `false` if `id` is unknown.
    pub fn rename(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let mut data = self.lock();
        let mut locations = data.locations.clone();
        let Some(location) = locations.iter_mut().find(|location| location.id == id) else {
            return Ok(false);
        };
        location.name = name.to_string();
        self.commit_locations(&mut data, locations)?;
        Ok(true)
    }

    pub fn selected(&self) -> Option<SavedLocation> {
        self.lock()
            .locations
            .iter()
            .find(|location| location.is_selected)
            .cloned()
    }

    pub fn get(&self, id: Uuid) -> Option<SavedLocation> {
        self.lock()
            .locations
            .iter()
            .find(|location| location.id == id)
            .cloned()
    }

    /// Find a location by full id or unique id prefix (as printed by `location list`).
    pub fn find_by_prefix(&self, prefix: &str) -> Option<SavedLocation> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return None;
        }
        let data = self.lock();
        let mut matches = data
            .locations
            .iter()
            .filter(|location| location.id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(location), None) => Some(location.clone()),
            _ => None,
        }
    }

    pub fn list(&self) -> Vec<SavedLocation> {
        self.lock().locations.clone()
    }

    pub fn alarm_timing(&self) -> AlarmTiming {
        self.lock().timing
    }

    pub fn set_alarm_timing(&self, timing: AlarmTiming) -> Result<(), StoreError> {
        let mut data = self.lock();
        self.store.set(TIMING_KEY, timing.as_str())?;
        data.timing = timing;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self, key: &str) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io {
                    path: key.to_string(),
                    source: std::io::Error::other("disk full"),
                });
            }
            Ok(())
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.check(key)?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.check(key)?;
            self.inner.remove(key)
        }
    }

    fn registry() -> (Arc<MemoryStore>, LocationRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = LocationRegistry::load(store.clone()).unwrap();
        (store, registry)
    }

    fn selected_count(registry: &LocationRegistry) -> usize {
        registry.list().iter().filter(|l| l.is_selected).count()
    }

    #[test]
    fn test_add_does_not_dedup_and_stores_unselected() {
        let (_, registry) = registry();
        let mut lisbon = SavedLocation::new("Lisbon", 38.7223, -9.1393);
        lisbon.is_selected = true;

        let first = registry.add(lisbon.clone()).unwrap();
        let second = registry.add(SavedLocation::new("Lisbon", 38.7223, -9.1393)).unwrap();

        assert!(!first.is_selected);
        assert_ne!(first.id, second.id);
        assert_eq!(registry.list().len(), 2);
        assert_eq!(selected_count(&registry), 0);
    }

    #[test]
    fn test_select_clears_previous_selection() {
        let (_, registry) = registry();
        let a = registry.add(SavedLocation::new("A", 10.0, 10.0)).unwrap();
        let b = registry.add(SavedLocation::new("B", 20.0, 20.0)).unwrap();

        assert!(registry.select(a.id).unwrap());
        assert_eq!(registry.selected().unwrap().id, a.id);

        assert!(registry.select(b.id).unwrap());
        assert_eq!(registry.selected().unwrap().id, b.id);
        assert_eq!(selected_count(&registry), 1);
    }

    #[test]
    fn test_add_and_select_takes_over_selection() {
        let (_, registry) = registry();
        let a = registry.add(SavedLocation::new("A", 10.0, 10.0)).unwrap();
        registry.select(a.id).unwrap();

        let b = registry.add_and_select(SavedLocation::new("B", 20.0, 20.0)).unwrap();
        assert!(b.is_selected);
        assert_eq!(registry.selected().unwrap().id, b.id);
        assert_eq!(selected_count(&registry), 1);
    }

    #[test]
    fn test_select_unknown_id_changes_nothing() {
        let (_, registry) = registry();
        let a = registry.add(SavedLocation::new("A", 10.0, 10.0)).unwrap();
        registry.select(a.id).unwrap();

        assert!(!registry.select(Uuid::new_v4()).unwrap());
        assert_eq!(registry.selected().unwrap().id, a.id);
    }

    #[test]
    fn test_delete_selected_clears_selection_without_reselecting() {
        let (_, registry) = registry();
        let a = registry.add(SavedLocation::new("A", 10.0, 10.0)).unwrap();
        registry.add(SavedLocation::new("B", 20.0, 20.0)).unwrap();
        registry.select(a.id).unwrap();

        registry.delete(a.id).unwrap();
        assert!(registry.selected().is_none());
        assert_eq!(registry.list().len(), 1);

        // Unknown id is a no-op
        registry.delete(Uuid::new_v4()).unwrap();
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_state_survives_reload() {
        let (store, registry) = registry();
        let a = registry.add(SavedLocation::new("Reykjavik", 64.1466, -21.9426)).unwrap();
        registry.select(a.id).unwrap();
        registry.rename(a.id, "Home").unwrap();
        registry.set_alarm_timing(AlarmTiming::After).unwrap();

        let reloaded = LocationRegistry::load(store).unwrap();
        let selected = reloaded.selected().unwrap();
        assert_eq!(selected.id, a.id);
        assert_eq!(selected.name, "Home");
        assert_eq!(reloaded.alarm_timing(), AlarmTiming::After);
    }

    #[test]
    fn test_load_repairs_multiple_selections() {
        let store = Arc::new(MemoryStore::new());
        let mut a = SavedLocation::new("A", 1.0, 1.0);
        let mut b = SavedLocation::new("B", 2.0, 2.0);
        a.is_selected = true;
        b.is_selected = true;
        set_json(store.as_ref(), LOCATIONS_KEY, &vec![a.clone(), b]).unwrap();

        let registry = LocationRegistry::load(store).unwrap();
        assert_eq!(selected_count(&registry), 1);
        assert_eq!(registry.selected().unwrap().id, a.id);
    }

    #[test]
    fn test_timing_defaults_to_before_and_ignores_garbage() {
        let store = Arc::new(MemoryStore::new());
        store.set(TIMING_KEY, "sideways").unwrap();
        let registry = LocationRegistry::load(store).unwrap();
        assert_eq!(registry.alarm_timing(), AlarmTiming::Before);
    }

    #[test]
    fn test_find_by_prefix_requires_unique_match() {
        let (_, registry) = registry();
        let a = registry.add(SavedLocation::new("A", 1.0, 1.0)).unwrap();
        let full = a.id.to_string();

        assert_eq!(registry.find_by_prefix(&full[..8]).unwrap().id, a.id);
        assert_eq!(registry.find_by_prefix(&full.to_uppercase()).unwrap().id, a.id);
        assert!(registry.find_by_prefix("").is_none());
        assert!(registry.find_by_prefix("zzzz").is_none());
    }

    #[test]
    fn test_timing_parsing_and_offsets() {
        assert_eq!("Before".parse::<AlarmTiming>().unwrap(), AlarmTiming::Before);
        assert_eq!("after sunrise".parse::<AlarmTiming>().unwrap(), AlarmTiming::After);
        assert!("noon".parse::<AlarmTiming>().is_err());
        assert_eq!(AlarmTiming::Before.offset_minutes(), -10);
        assert_eq!(AlarmTiming::After.offset_minutes(), 10);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_failed_write_leaves_registry_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let registry = LocationRegistry::load(store.clone()).unwrap();
        let a = registry.add(SavedLocation::new("A", 10.0, 10.0)).unwrap();
        let b = registry.add(SavedLocation::new("B", 20.0, 20.0)).unwrap();
        registry.select(a.id).unwrap();
        let before = registry.list();

        store.failing.store(true, Ordering::SeqCst);
        assert!(registry.add(SavedLocation::new("C", 30.0, 30.0)).is_err());
        assert!(registry.add_and_select(SavedLocation::new("D", 40.0, 40.0)).is_err());
        assert!(registry.select(b.id).is_err());
        assert!(registry.rename(a.id, "Renamed").is_err());
        assert!(registry.delete(a.id).is_err());
        assert!(registry.set_alarm_timing(AlarmTiming::After).is_err());

        assert_eq!(registry.list(), before);
        assert_eq!(registry.selected().unwrap().id, a.id);
        assert_eq!(registry.alarm_timing(), AlarmTiming::Before);

        // Memory and store still agree
        store.failing.store(false, Ordering::SeqCst);
        let reloaded = LocationRegistry::load(store).unwrap();
        assert_eq!(reloaded.list(), before);
    }
}
