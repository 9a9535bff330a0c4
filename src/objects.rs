use std::sync::Arc;

use glam::DVec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Generational reference into an [`ObjectTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    /// Packs the handle into a single integer for scripting layers.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Resolves tracked-object handles to world positions.
pub trait ObjectResolver {
    /// World position of `handle`, or `None` if the object no longer exists.
    fn object_position(&self, handle: ObjectHandle) -> Option<DVec3>;
}

/// Object that can be tracked by the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub name: String,
    pub position: DVec3,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    object: Option<TrackedObject>,
}

/// Thread-safe table of externally owned objects the camera may follow.
///
/// Clones share the same storage.
#[derive(Debug, Default)]
pub struct ObjectTable {
    slots: Arc<RwLock<Vec<Slot>>>,
}

impl Clone for ObjectTable {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object and returns its handle, reusing free slots.
    pub fn insert(&self, name: impl Into<String>, position: DVec3) -> ObjectHandle {
        let object = TrackedObject {
            name: name.into(),
            position,
        };
        let mut slots = self.slots.write();
        if let Some((index, slot)) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.object.is_none())
        {
            slot.object = Some(object);
            return ObjectHandle {
                index: index as u32,
                generation: slot.generation,
            };
        }
        slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        ObjectHandle {
            index: (slots.len() - 1) as u32,
            generation: 0,
        }
    }

    /// Removes the object, invalidating every outstanding handle to it.
    pub fn remove(&self, handle: ObjectHandle) -> Option<TrackedObject> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(object)
    }

    /// Returns a clone of the object behind `handle`.
    pub fn get(&self, handle: ObjectHandle) -> Option<TrackedObject> {
        self.update(handle, |object| object.clone())
    }

    /// Finds the first live object called `name`.
    pub fn find(&self, name: &str) -> Option<ObjectHandle> {
        self.slots
            .read()
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.object.as_ref().is_some_and(|o| o.name == name))
            .map(|(index, slot)| ObjectHandle {
                index: index as u32,
                generation: slot.generation,
            })
    }

    /// Applies a mutation to the requested object.
    pub fn update<F, R>(&self, handle: ObjectHandle, mut updater: F) -> Option<R>
    where
        F: FnMut(&mut TrackedObject) -> R,
    {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_mut().map(|object| updater(object))
    }

    pub fn set_position(&self, handle: ObjectHandle, position: DVec3) -> bool {
        self.update(handle, |object| object.position = position)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .iter()
            .filter(|slot| slot.object.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectResolver for ObjectTable {
    fn object_position(&self, handle: ObjectHandle) -> Option<DVec3> {
        self.get(handle).map(|object| object.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_resolve_position() {
        let table = ObjectTable::new();
        let handle = table.insert("ship", DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(table.object_position(handle), Some(DVec3::new(1.0, 2.0, 3.0)));
        assert!(table.set_position(handle, DVec3::ONE));
        assert_eq!(table.get(handle).unwrap().position, DVec3::ONE);
        assert_eq!(table.find("ship"), Some(handle));
    }

    #[test]
    fn removed_handle_stays_dead_after_slot_reuse() {
        let table = ObjectTable::new();
        let old = table.insert("a", DVec3::ZERO);
        assert!(table.remove(old).is_some());
        let new = table.insert("b", DVec3::X);
        assert_ne!(old, new);
        assert_eq!(table.object_position(old), None);
        assert_eq!(table.object_position(new), Some(DVec3::X));
        assert!(!table.set_position(old, DVec3::Y));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn clones_share_storage() {
        let table = ObjectTable::new();
        let shared = table.clone();
        let handle = table.insert("cam-target", DVec3::ZERO);
        assert!(shared.set_position(handle, DVec3::Z));
        assert_eq!(table.object_position(handle), Some(DVec3::Z));
    }

    #[test]
    fn handle_bits_round_trip() {
        let table = ObjectTable::new();
        table.insert("a", DVec3::ZERO);
        let handle = table.insert("b", DVec3::ZERO);
        assert_eq!(ObjectHandle::from_bits(handle.to_bits()), handle);
    }
}
