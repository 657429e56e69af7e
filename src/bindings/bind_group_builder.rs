// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Binds resources by name and materializes bind groups for whatever layout is active.

Call sites bind under the names a shader declares, in any order and without knowing slot
indices.  [`BindGroupBuilder::create_bind_group`] walks the *layout's* bindings, so the result
always has exactly the items the shader expects, in its order.  Anything left unbound is
filled with one of the device's fallback resources and flagged
[`EMPTY_BINDING`](BindGroupItemFlags::EMPTY_BINDING): a half-bound frame renders black
textures instead of crashing.

```
use bindings_and_buffers::bindings::bind_group_builder::BindGroupBuilder;
use bindings_and_buffers::bindings::resource_binding::{
    BindGroupLayoutDescription, ShaderResourceBinding, ShaderResourceType, ShaderTextureType,
};
use bindings_and_buffers::images::device::{Device, DeviceDescription};

let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
let layout = device
    .create_bind_group_layout(&BindGroupLayoutDescription::new(vec![
        ShaderResourceBinding::new("BaseTexture", 0, ShaderResourceType::TextureAndSampler)
            .with_texture_type(ShaderTextureType::Texture2D),
    ]))
    .unwrap();

let mut builder = BindGroupBuilder::new();
builder.reset_bound_resources(&device);
let bind_group = builder.create_bind_group(layout);
assert_eq!(bind_group.items.len(), 1);
assert!(bind_group.items[0].is_fallback());
```
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::bindings::bind_group::{
    BindGroupCreationDescription, BindGroupItem, BindGroupItemFlags, BindGroupResource, BufferView, TextureView,
};
use crate::bindings::resource_binding::{NameHash, ResourceCategory, ShaderResourceBinding};
use crate::bindings::sampler::SamplerType;
use crate::images::descriptors::{ALL_MIP_LEVELS, BufferRange, TextureRange};
use crate::images::device::Device;
use crate::images::handles::{BindGroupLayoutHandle, BufferHandle, SamplerStateHandle, TextureHandle};
use crate::pixel_formats::ResourceFormat;

static READS: AtomicU32 = AtomicU32::new(0);
static WRITES: AtomicU32 = AtomicU32::new(0);

/// Slot table traffic across all builders, for profiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindGroupStatistics {
    pub reads: u32,
    pub writes: u32,
}

pub fn statistics() -> BindGroupStatistics {
    BindGroupStatistics { reads: READS.load(Ordering::Relaxed), writes: WRITES.load(Ordering::Relaxed) }
}

/// Usually called once per frame by whoever reports the statistics.
pub fn reset_statistics() {
    READS.store(0, Ordering::Relaxed);
    WRITES.store(0, Ordering::Relaxed);
}

/// Items bound by name, one table per resource kind.
#[derive(Debug, Clone, Default)]
pub struct BoundResources {
    pub samplers: HashMap<NameHash, BindGroupItem>,
    pub buffers: HashMap<NameHash, BindGroupItem>,
    pub textures: HashMap<NameHash, BindGroupItem>,
}

fn insert_item(table: &mut HashMap<NameHash, BindGroupItem>, name: NameHash, item: BindGroupItem, modified: &mut bool) {
    READS.fetch_add(1, Ordering::Relaxed);
    if table.insert(name, item) != Some(item) {
        *modified = true;
        WRITES.fetch_add(1, Ordering::Relaxed);
    }
}

fn remove_item(table: &mut HashMap<NameHash, BindGroupItem>, name: NameHash, modified: &mut bool) {
    READS.fetch_add(1, Ordering::Relaxed);
    if table.remove(&name).is_some() {
        *modified = true;
        WRITES.fetch_add(1, Ordering::Relaxed);
    }
}

/// Resolves one layout binding against the bound resources, substituting fallbacks.
///
/// # Panics
/// If the binding's resource type cannot appear in a bind group, or the device has no
/// fallback for it.
pub fn resolve_item(
    binding: &ShaderResourceBinding,
    bound: &BoundResources,
    default_sampler: SamplerStateHandle,
    device: &Device,
) -> BindGroupItem {
    match binding.category() {
        ResourceCategory::Sampler => {
            READS.fetch_add(1, Ordering::Relaxed);
            bound
                .samplers
                .get(&binding.name_hash)
                .copied()
                .unwrap_or_else(|| BindGroupItem::sampler(default_sampler))
        }
        ResourceCategory::Buffer { .. } => {
            READS.fetch_add(1, Ordering::Relaxed);
            bound.buffers.get(&binding.name_hash).copied().unwrap_or_else(|| {
                let buffer = device.fallback_buffer(binding.resource_type);
                let Some(description) = device.buffer(buffer) else {
                    panic!("missing fallback buffer for binding '{}' of type {:?}", binding.name, binding.resource_type);
                };
                BindGroupItem::buffer(BufferView {
                    buffer,
                    range: description.clamp_range(BufferRange::default()),
                    override_texel_format: ResourceFormat::Invalid,
                })
                .with_flags(BindGroupItemFlags::EMPTY_BINDING)
            })
        }
        ResourceCategory::Texture { with_sampler, .. } => {
            READS.fetch_add(1, Ordering::Relaxed);
            let mut item = bound.textures.get(&binding.name_hash).copied().unwrap_or_else(|| {
                let depth = binding.wants_depth_fallback();
                let texture = device.fallback_texture(binding.resource_type, binding.texture_type, depth);
                let Some(description) = device.texture(texture) else {
                    panic!(
                        "missing fallback texture for binding '{}' of type {:?}, texture type {:?}, depth {}",
                        binding.name, binding.resource_type, binding.texture_type, depth
                    );
                };
                BindGroupItem::texture(TextureView {
                    texture,
                    sampler: SamplerStateHandle::invalid(),
                    range: description.clamp_range(TextureRange::default()),
                    override_view_format: ResourceFormat::Invalid,
                })
                .with_flags(BindGroupItemFlags::EMPTY_BINDING)
            });
            if let BindGroupResource::Texture(view) = &mut item.resource {
                if with_sampler {
                    READS.fetch_add(1, Ordering::Relaxed);
                    view.sampler = match bound.samplers.get(&binding.name_hash).map(|i| i.resource) {
                        Some(BindGroupResource::Sampler(sampler)) => sampler,
                        _ => default_sampler,
                    };
                }
                if !binding.texture_type.is_array() {
                    view.range.array_slices = binding.texture_type.non_array_slices();
                }
            }
            item
        }
        ResourceCategory::Unsupported => {
            panic!("unsupported resource type {:?} for binding '{}'", binding.resource_type, binding.name)
        }
    }
}

/// Per-frame binding state.  Call [`reset_bound_resources`](Self::reset_bound_resources)
/// before first use and at the start of every frame.
#[derive(Debug)]
pub struct BindGroupBuilder<'d> {
    device: Option<&'d Device>,
    modified: bool,
    default_sampler: SamplerStateHandle,
    bound: BoundResources,
}

impl Default for BindGroupBuilder<'_> {
    fn default() -> Self {
        BindGroupBuilder {
            device: None,
            modified: true,
            default_sampler: SamplerStateHandle::invalid(),
            bound: BoundResources::default(),
        }
    }
}

impl<'d> BindGroupBuilder<'d> {
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self) -> &'d Device {
        match self.device {
            Some(device) => device,
            None => panic!("reset_bound_resources must be called before the builder is used"),
        }
    }

    /// Forgets everything bound and re-binds the device's immutable samplers under their names.
    pub fn reset_bound_resources(&mut self, device: &'d Device) {
        self.device = Some(device);
        self.modified = true;
        self.default_sampler = SamplerStateHandle::invalid();
        self.bound.samplers.clear();
        self.bound.buffers.clear();
        self.bound.textures.clear();

        //backends without immutable samplers still need them bound
        for (sampler_type, sampler) in device.immutable_samplers() {
            self.bound.samplers.insert(NameHash::new(sampler_type.name()), BindGroupItem::sampler(sampler));
            if sampler_type == SamplerType::DEFAULT {
                self.default_sampler = sampler;
            }
        }
        debug_assert!(
            !self.default_sampler.is_invalidated(),
            "{} should have been registered at this point",
            SamplerType::DEFAULT.name()
        );
    }

    /// Whether a bind call changed anything since the last [`create_bind_group`](Self::create_bind_group).
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn default_sampler(&self) -> SamplerStateHandle {
        self.default_sampler
    }

    pub fn bound_resources(&self) -> &BoundResources {
        &self.bound
    }

    /// Binds `sampler` under `name`.  An invalidated handle unbinds.
    ///
    /// The immutable sampler names are reserved.
    pub fn bind_sampler(&mut self, name: &str, sampler: SamplerStateHandle) {
        debug_assert!(
            !SamplerType::ALL.iter().any(|t| t.name() == name),
            "'{name}' is a reserved sampler name and must not be set manually"
        );
        let hash = NameHash::new(name);
        if sampler.is_invalidated() {
            remove_item(&mut self.bound.samplers, hash, &mut self.modified);
            return;
        }
        debug_assert!(self.device().sampler_state(sampler).is_some(), "invalid sampler handle bound to '{name}'");
        insert_item(&mut self.bound.samplers, hash, BindGroupItem::sampler(sampler), &mut self.modified);
    }

    /// Binds `range` of `buffer` under `name`.  An invalidated handle unbinds.
    ///
    /// `override_texel_format` reinterprets a texel buffer's elements;
    /// [`ResourceFormat::Invalid`] keeps the buffer's own format.
    pub fn bind_buffer(
        &mut self,
        name: &str,
        buffer: BufferHandle,
        range: BufferRange,
        override_texel_format: ResourceFormat,
    ) {
        let hash = NameHash::new(name);
        if buffer.is_invalidated() {
            remove_item(&mut self.bound.buffers, hash, &mut self.modified);
            return;
        }
        let Some(description) = self.device().buffer(buffer) else {
            debug_assert!(false, "invalid buffer handle bound to '{name}'");
            remove_item(&mut self.bound.buffers, hash, &mut self.modified);
            return;
        };
        let item = BindGroupItem::buffer(BufferView {
            buffer,
            range: description.clamp_range(range),
            override_texel_format,
        });
        insert_item(&mut self.bound.buffers, hash, item, &mut self.modified);
    }

    /// Binds `range` of `texture` under `name`.  An invalidated handle unbinds.
    ///
    /// Proxy textures are resolved here to their parent and slice; `range` is then ignored.
    pub fn bind_texture(
        &mut self,
        name: &str,
        texture: TextureHandle,
        range: TextureRange,
        override_view_format: ResourceFormat,
    ) {
        let hash = NameHash::new(name);
        if texture.is_invalidated() {
            remove_item(&mut self.bound.textures, hash, &mut self.modified);
            return;
        }
        let device = self.device();
        let (texture, range) = match device.proxy_texture(texture) {
            Some(proxy) => (
                proxy.parent,
                TextureRange { base_array_slice: proxy.slice, array_slices: 1, base_mip_level: 0, mip_levels: ALL_MIP_LEVELS },
            ),
            None => (texture, range),
        };
        let Some(description) = device.texture(texture) else {
            debug_assert!(false, "invalid texture handle bound to '{name}'");
            remove_item(&mut self.bound.textures, hash, &mut self.modified);
            return;
        };
        let item = BindGroupItem::texture(TextureView {
            texture,
            sampler: SamplerStateHandle::invalid(),
            range: description.clamp_range(range),
            override_view_format,
        });
        insert_item(&mut self.bound.textures, hash, item, &mut self.modified);
    }

    /// Binds a texture and the sampler it is meant to be read with under the same name.
    pub fn bind_texture_resource(&mut self, name: &str, texture: TextureHandle, sampler: SamplerStateHandle) {
        self.bind_texture(name, texture, TextureRange::default(), ResourceFormat::Invalid);
        self.bind_sampler(name, sampler);
    }

    /// Produces one item per binding of `layout`, in the layout's order.
    ///
    /// # Panics
    /// If `layout` does not resolve, or a binding's resource type cannot appear in a bind group.
    pub fn create_bind_group(&mut self, layout: BindGroupLayoutHandle) -> BindGroupCreationDescription {
        let device = self.device();
        let Some(layout_description) = device.bind_group_layout(layout) else {
            panic!("bind group layout does not resolve");
        };
        let items = layout_description
            .resource_bindings
            .iter()
            .map(|binding| resolve_item(binding, &self.bound, self.default_sampler, device))
            .collect();
        self.modified = false;
        BindGroupCreationDescription { layout, items }
    }
}
