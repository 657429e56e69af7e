// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Platform backends.
//!
//! The device keeps its bookkeeping platform-independent and hands the native work to a
//! [`Backend`].  The headless backend is always available; the wgpu backend is compiled
//! with the `backend_wgpu` feature.

use std::any::Any;
use std::fmt::Formatter;

use crate::bindings::sampler::SamplerStateDescription;
use crate::images::descriptors::{BufferDescription, TextureDescription};

mod error;
mod nop;

pub use error::Error;
pub use nop::{BufferUpdate, HeadlessBackend, HeadlessBuffer, HeadlessProbe, HeadlessSampler, HeadlessStats, HeadlessTexture};

#[cfg(feature = "backend_wgpu")]
mod wgpu;

#[cfg(feature = "backend_wgpu")]
pub use self::wgpu::WgpuBackend;

/// A backend-owned GPU object, type-erased so the device tables stay backend-agnostic.
pub struct NativeObject(Box<dyn Any + Send + Sync>);

impl NativeObject {
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        NativeObject(Box::new(object))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast<T: Any>(self) -> Result<Box<T>, NativeObject> {
        self.0.downcast::<T>().map_err(NativeObject)
    }
}

impl std::fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NativeObject").finish_non_exhaustive()
    }
}

/// Native object creation and destruction.
///
/// The device calls into the backend with its state lock held, so implementations
/// must not call back into the device.
pub trait Backend: Send {
    fn name(&self) -> &'static str;

    /// `initial_data` is either empty or exactly `description.total_size` bytes.
    fn create_buffer(
        &mut self,
        description: &BufferDescription,
        initial_data: &[u8],
        debug_name: &str,
    ) -> Result<NativeObject, Error>;

    /// Writes `data` at `byte_offset`.  The device keeps both 4-byte aligned.
    fn update_buffer(&mut self, buffer: &NativeObject, byte_offset: u32, data: &[u8]);

    /// `initial_data` holds one entry per mip level, or is empty.
    fn create_texture(
        &mut self,
        description: &TextureDescription,
        initial_data: &[&[u8]],
        debug_name: &str,
    ) -> Result<NativeObject, Error>;

    fn create_sampler(&mut self, description: &SamplerStateDescription) -> Result<NativeObject, Error>;

    fn destroy(&mut self, object: NativeObject);
}
