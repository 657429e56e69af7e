// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A backend without a GPU.
//!
//! Buffers keep their bytes in memory so uploads can be inspected, textures and samplers
//! are plain records.  Every operation is counted in [`HeadlessStats`], readable through
//! a [`HeadlessProbe`] that stays valid after the backend has been moved into a device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::bindings::sampler::SamplerStateDescription;
use crate::images::descriptors::{BufferDescription, TextureDescription};
use crate::imp::{Backend, Error, NativeObject};

#[derive(Debug)]
pub struct HeadlessBuffer {
    pub id: u64,
    pub description: BufferDescription,
    contents: Mutex<Vec<u8>>,
}

impl HeadlessBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Debug)]
pub struct HeadlessTexture {
    pub id: u64,
    pub description: TextureDescription,
}

#[derive(Debug)]
pub struct HeadlessSampler {
    pub id: u64,
    pub description: SamplerStateDescription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUpdate {
    pub buffer: u64,
    pub byte_offset: u32,
    pub byte_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub buffers_created: u32,
    pub textures_created: u32,
    pub samplers_created: u32,
    pub objects_destroyed: u32,
    pub updates: Vec<BufferUpdate>,
}

#[derive(Debug, Default)]
struct Shared {
    stats: Mutex<HeadlessStats>,
    refuse_creation: AtomicBool,
    next_id: AtomicU64,
}

impl Shared {
    fn record(&self, f: impl FnOnce(&mut HeadlessStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn check(&self, what: &'static str) -> Result<(), Error> {
        if self.refuse_creation.load(Ordering::Relaxed) {
            Err(Error::CreationRefused { what })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    shared: Arc<Shared>,
}

/// Observes a [`HeadlessBackend`] from outside the device.
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    shared: Arc<Shared>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe { shared: self.shared.clone() }
    }
}

impl HeadlessProbe {
    pub fn stats(&self) -> HeadlessStats {
        self.shared.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// While set, every creation fails the way a driver out of memory would.
    pub fn refuse_creation(&self, refuse: bool) {
        self.shared.refuse_creation.store(refuse, Ordering::Relaxed);
    }
}

impl Backend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_buffer(
        &mut self,
        description: &BufferDescription,
        initial_data: &[u8],
        _debug_name: &str,
    ) -> Result<NativeObject, Error> {
        self.shared.check("buffer")?;
        let mut contents = vec![0u8; description.total_size as usize];
        if !initial_data.is_empty() {
            contents.copy_from_slice(initial_data);
        }
        self.shared.record(|s| s.buffers_created += 1);
        Ok(NativeObject::new(HeadlessBuffer {
            id: self.shared.next_id(),
            description: *description,
            contents: Mutex::new(contents),
        }))
    }

    fn update_buffer(&mut self, buffer: &NativeObject, byte_offset: u32, data: &[u8]) {
        let Some(buffer) = buffer.downcast_ref::<HeadlessBuffer>() else {
            logwise::error_sync!("update_buffer called with a foreign native object");
            return;
        };
        let start = byte_offset as usize;
        let mut contents = buffer.contents.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(start + data.len() <= contents.len(), "update past the end of the buffer");
        contents[start..start + data.len()].copy_from_slice(data);
        self.shared.record(|s| {
            s.updates.push(BufferUpdate {
                buffer: buffer.id,
                byte_offset,
                byte_count: data.len() as u32,
            })
        });
    }

    fn create_texture(
        &mut self,
        description: &TextureDescription,
        _initial_data: &[&[u8]],
        _debug_name: &str,
    ) -> Result<NativeObject, Error> {
        self.shared.check("texture")?;
        self.shared.record(|s| s.textures_created += 1);
        Ok(NativeObject::new(HeadlessTexture {
            id: self.shared.next_id(),
            description: *description,
        }))
    }

    fn create_sampler(&mut self, description: &SamplerStateDescription) -> Result<NativeObject, Error> {
        self.shared.check("sampler")?;
        self.shared.record(|s| s.samplers_created += 1);
        Ok(NativeObject::new(HeadlessSampler {
            id: self.shared.next_id(),
            description: *description,
        }))
    }

    fn destroy(&mut self, _object: NativeObject) {
        self.shared.record(|s| s.objects_destroyed += 1);
    }
}
