// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Storage behind the device's handles.

* [`IdTable`] is a generational slot arena: stable indices, a free list, and a generation
  per slot so that stale ids miss instead of aliasing.
* [`SharedTable`] layers deduplication and reference counting on top, for state objects
  whose descriptions are compared for equality.
* [`DeadObjects`] is the queue of objects waiting for the next frame boundary.
*/

use std::collections::HashMap;
use std::hash::Hash;

use crate::images::handles::{ObjectType, ResourceId};
use crate::imp::NativeObject;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub(crate) struct IdTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for IdTable<T> {
    fn default() -> Self {
        IdTable { slots: Vec::new(), free: Vec::new(), len: 0 }
    }
}

impl<T> IdTable<T> {
    pub fn insert(&mut self, value: T) -> ResourceId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            ResourceId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 1, value: Some(value) });
            ResourceId::new(index, 1)
        }
    }

    fn slot(&self, id: ResourceId) -> Option<&Slot<T>> {
        if id.is_invalidated() {
            return None;
        }
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }

    pub fn get(&self, id: ResourceId) -> Option<&T> {
        self.slot(id).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut T> {
        if id.is_invalidated() {
            return None;
        }
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    /// Frees the slot.  The slot's generation moves on, so `id` never resolves again.
    pub fn remove(&mut self, id: ResourceId) -> Option<T> {
        if id.is_invalidated() {
            return None;
        }
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        self.free.push(id.index());
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (ResourceId::new(index as u32, slot.generation), value))
        })
    }
}

/// A deduplicated state object.
#[derive(Debug)]
pub(crate) struct SharedRecord<D> {
    pub description: D,
    pub ref_count: u32,
    pub native: Option<NativeObject>,
}

#[derive(Debug)]
pub(crate) struct SharedTable<D> {
    objects: IdTable<SharedRecord<D>>,
    by_description: HashMap<D, ResourceId>,
}

impl<D> Default for SharedTable<D> {
    fn default() -> Self {
        SharedTable { objects: IdTable::default(), by_description: HashMap::new() }
    }
}

impl<D: Hash + Eq + Clone> SharedTable<D> {
    pub fn find(&self, description: &D) -> Option<ResourceId> {
        self.by_description.get(description).copied()
    }

    /// Inserts with a reference count of zero.  The caller takes the first reference.
    pub fn insert(&mut self, description: D, native: Option<NativeObject>) -> ResourceId {
        let id = self.objects.insert(SharedRecord {
            description: description.clone(),
            ref_count: 0,
            native,
        });
        self.by_description.insert(description, id);
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&SharedRecord<D>> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut SharedRecord<D>> {
        self.objects.get_mut(id)
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<SharedRecord<D>> {
        let record = self.objects.remove(id)?;
        if self.by_description.get(&record.description) == Some(&id) {
            self.by_description.remove(&record.description);
        }
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeadObject {
    pub object_type: ObjectType,
    pub id: ResourceId,
}

/// Objects destroyed during the current frame.
#[derive(Debug, Default)]
pub(crate) struct DeadObjects(Vec<DeadObject>);

impl DeadObjects {
    pub fn add(&mut self, object_type: ObjectType, id: ResourceId) {
        self.0.push(DeadObject { object_type, id });
    }

    pub fn contains(&self, object_type: ObjectType, id: ResourceId) -> bool {
        self.0.iter().any(|d| d.object_type == object_type && d.id == id)
    }

    /// Removes a pending destruction.  Returns whether one was queued.
    pub fn revive(&mut self, object_type: ObjectType, id: ResourceId) -> bool {
        match self.0.iter().position(|d| d.object_type == object_type && d.id == id) {
            Some(position) => {
                self.0.swap_remove(position);
                true
            }
            None => false,
        }
    }

    pub fn take(&mut self) -> Vec<DeadObject> {
        std::mem::take(&mut self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
