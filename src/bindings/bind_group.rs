// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Flat bind group descriptions.

A [`BindGroupCreationDescription`] holds one [`BindGroupItem`] per binding of its layout, at
the same index.  Descriptions are normally produced by the
[`BindGroupBuilder`](crate::bindings::bind_group_builder::BindGroupBuilder), which guarantees
completeness; [`BindGroupCreationDescription::assert_valid_description`] checks hand-made or
suspicious ones against the device.
*/

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::images::descriptors::{BufferRange, TextureRange};
use crate::images::device::Device;
use crate::images::handles::{BindGroupLayoutHandle, BufferHandle, SamplerStateHandle, TextureHandle};
use crate::pixel_formats::ResourceFormat;

bitflags::bitflags! {
    /// Where an item's resource came from.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BindGroupItemFlags: u8 {
        /// Nothing was bound under the binding's name; a fallback resource fills the slot.
        const EMPTY_BINDING = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferView {
    pub buffer: BufferHandle,
    pub range: BufferRange,
    /// Texel buffers only: read the elements as this format instead of the buffer's own.
    /// [`ResourceFormat::Invalid`] keeps the buffer's format.
    pub override_texel_format: ResourceFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureView {
    pub texture: TextureHandle,
    /// Only used by combined texture and sampler bindings.
    pub sampler: SamplerStateHandle,
    pub range: TextureRange,
    /// Reinterprets the texture's format, e.g. to read sRGB data linearly.
    pub override_view_format: ResourceFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindGroupResource {
    Sampler(SamplerStateHandle),
    Buffer(BufferView),
    Texture(TextureView),
}

impl BindGroupResource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BindGroupResource::Sampler(_) => "sampler",
            BindGroupResource::Buffer(_) => "buffer",
            BindGroupResource::Texture(_) => "texture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupItem {
    pub resource: BindGroupResource,
    pub flags: BindGroupItemFlags,
}

impl BindGroupItem {
    pub fn sampler(sampler: SamplerStateHandle) -> Self {
        BindGroupItem { resource: BindGroupResource::Sampler(sampler), flags: BindGroupItemFlags::empty() }
    }

    pub fn buffer(view: BufferView) -> Self {
        BindGroupItem { resource: BindGroupResource::Buffer(view), flags: BindGroupItemFlags::empty() }
    }

    pub fn texture(view: TextureView) -> Self {
        BindGroupItem { resource: BindGroupResource::Texture(view), flags: BindGroupItemFlags::empty() }
    }

    pub fn with_flags(mut self, flags: BindGroupItemFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Whether the slot was empty and a fallback was substituted.
    pub fn is_fallback(&self) -> bool {
        self.flags.contains(BindGroupItemFlags::EMPTY_BINDING)
    }
}

/// A bind group for one layout: `items[i]` binds the layout's `i`-th resource binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindGroupCreationDescription {
    pub layout: BindGroupLayoutHandle,
    pub items: Vec<BindGroupItem>,
}

impl BindGroupCreationDescription {
    /// Hash used to cache native bind groups.  Equal descriptions hash equally within a process.
    pub fn calculate_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Panics on the first mismatch between this description, its layout and the device's
    /// resources.
    ///
    /// Does nothing unless debug assertions or the `validation` feature are enabled; call
    /// [`validate`](crate::bindings::validation::validate) to check unconditionally.
    pub fn assert_valid_description(&self, device: &Device) {
        if cfg!(any(debug_assertions, feature = "validation")) {
            if let Err(violation) = crate::bindings::validation::validate(self, device) {
                panic!("invalid bind group description: {violation}");
            }
        }
    }
}
