// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Bind group validation.

Checks a [`BindGroupCreationDescription`] against its layout and the device's resource tables,
catching mistakes before they reach the native API where they tend to fail silently.
Every violation is a programmer error; [`validate`] reports the first one it finds and
[`BindGroupCreationDescription::assert_valid_description`] turns it into a panic.
*/

use crate::bindings::bind_group::{BindGroupCreationDescription, BindGroupItem, BindGroupResource, BufferView, TextureView};
use crate::bindings::resource_binding::{
    Access, BufferKind, ResourceCategory, ShaderResourceBinding, ShaderResourceType, ShaderTextureType,
};
use crate::bindings::visible_to::BufferUsageFlags;
use crate::images::descriptors::{ALL_ARRAY_SLICES, ALL_MIP_LEVELS, MsaaSampleCount, TextureType, WHOLE_SIZE};
use crate::images::device::Device;
use crate::pixel_formats::ResourceFormat;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("bind group layout does not resolve")]
    InvalidLayout,
    #[error("layout has {bindings} bindings but the description has {items} items")]
    ItemCount { bindings: usize, items: usize },
    #[error("binding {index} ('{name}'): {kind}")]
    Binding { index: usize, name: String, kind: BindingViolation },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingViolation {
    #[error("item is a {actual} but the binding expects a {expected}")]
    KindMismatch { expected: &'static str, actual: &'static str },
    #[error("invalid sampler state")]
    InvalidSampler,
    #[error("invalid buffer")]
    InvalidBuffer,
    #[error("invalid texture")]
    InvalidTexture,
    #[error("texel format override must be Invalid for constant buffers")]
    OverrideOnConstantBuffer,
    #[error("byte offset {0} for constant buffers not supported")]
    ConstantBufferOffset(u32),
    #[error("byte count {count} must cover the whole constant buffer of {total_size} bytes")]
    ConstantBufferCount { count: u32, total_size: u32 },
    #[error("texel format override must be Invalid for non-texel buffers")]
    OverrideOnNonTexelBuffer,
    #[error("buffer lacks the {0} usage flag")]
    MissingUsage(&'static str),
    #[error("element size of the bound view is 0")]
    ZeroElementSize,
    #[error("byte offset {offset} is not a multiple of the element size {element_size}")]
    UnalignedOffset { offset: u32, element_size: u32 },
    #[error("byte offset {offset} is too big for the buffer of size {size}")]
    OffsetOutOfBounds { offset: u32, size: u32 },
    #[error("byte count {count} is not a multiple of the element size {element_size}")]
    UnalignedCount { count: u32, element_size: u32 },
    #[error("byte offset {offset} + byte count {count} is too big for the buffer of size {size}")]
    RangeOutOfBounds { offset: u32, count: u32, size: u32 },
    #[error("format override has {override_bits} bits per element but the texture format has {bits}")]
    OverrideBits { override_bits: u32, bits: u32 },
    #[error("format override has {override_channels} channels but the texture format has {channels}")]
    OverrideChannels { override_channels: u32, channels: u32 },
    #[error("array slices must be {expected} for a non-array binding, not {actual}")]
    NonArraySlices { expected: u16, actual: u16 },
    #[error("MSAA mismatch between texture and binding")]
    MsaaMismatch,
    #[error("texture does not allow {0} views")]
    MissingTexturePermission(&'static str),
    #[error("proxy textures must be resolved to their parent texture before binding")]
    UnresolvedProxy,
    #[error("base array slice {base} is out of bounds of {slices} slices")]
    BaseSliceOutOfBounds { base: u16, slices: u32 },
    #[error("base mip level {base} is out of bounds of {mips} mip levels")]
    BaseMipOutOfBounds { base: u8, mips: u32 },
    #[error("mip level count must be greater than 0")]
    ZeroMipLevels,
    #[error("array slices must be greater than 0")]
    ZeroArraySlices,
    #[error("mip levels {base}..{base}+{count} are out of bounds of {mips}")]
    MipRangeOutOfBounds { base: u8, count: u8, mips: u32 },
    #[error("array slices {base}..{base}+{count} are out of bounds of {slices}")]
    SliceRangeOutOfBounds { base: u16, count: u16, slices: u32 },
    #[error("cube bindings must view 6 slices, not {0}")]
    CubeSlices(u16),
    #[error("cube array bindings must view a multiple of 6 slices, not {0}")]
    CubeArraySlices(u16),
    #[error("unsupported shader resource type {0:?}")]
    UnsupportedResourceType(ShaderResourceType),
}

/// Checks every item of `description` against its layout binding.
pub fn validate(description: &BindGroupCreationDescription, device: &Device) -> Result<(), Violation> {
    let layout = device.bind_group_layout(description.layout).ok_or(Violation::InvalidLayout)?;
    let bindings = &layout.resource_bindings;
    if bindings.len() != description.items.len() {
        return Err(Violation::ItemCount { bindings: bindings.len(), items: description.items.len() });
    }
    for (index, (binding, item)) in bindings.iter().zip(&description.items).enumerate() {
        validate_item(binding, item, device).map_err(|kind| Violation::Binding {
            index,
            name: binding.name.clone(),
            kind,
        })?;
    }
    Ok(())
}

fn mismatch(expected: &'static str, item: &BindGroupItem) -> BindingViolation {
    BindingViolation::KindMismatch { expected, actual: item.resource.kind_name() }
}

fn check(condition: bool, violation: BindingViolation) -> Result<(), BindingViolation> {
    if condition { Ok(()) } else { Err(violation) }
}

fn validate_item(binding: &ShaderResourceBinding, item: &BindGroupItem, device: &Device) -> Result<(), BindingViolation> {
    match (binding.category(), &item.resource) {
        (ResourceCategory::Sampler, BindGroupResource::Sampler(sampler)) => {
            check(device.sampler_state(*sampler).is_some(), BindingViolation::InvalidSampler)
        }
        (ResourceCategory::Sampler, _) => Err(mismatch("sampler", item)),
        (ResourceCategory::Buffer { kind, access }, BindGroupResource::Buffer(view)) => {
            validate_buffer(kind, access, view, device)
        }
        (ResourceCategory::Buffer { .. }, _) => Err(mismatch("buffer", item)),
        (ResourceCategory::Texture { access, with_sampler }, BindGroupResource::Texture(view)) => {
            validate_texture(binding.texture_type, access, with_sampler, view, device)
        }
        (ResourceCategory::Texture { .. }, _) => Err(mismatch("texture", item)),
        (ResourceCategory::Unsupported, _) => Err(BindingViolation::UnsupportedResourceType(binding.resource_type)),
    }
}

fn validate_buffer(kind: BufferKind, access: Access, view: &BufferView, device: &Device) -> Result<(), BindingViolation> {
    let description = device.buffer(view.buffer).ok_or(BindingViolation::InvalidBuffer)?;
    let range = view.range;

    if kind == BufferKind::Constant {
        check(view.override_texel_format == ResourceFormat::Invalid, BindingViolation::OverrideOnConstantBuffer)?;
        check(range.byte_offset == 0, BindingViolation::ConstantBufferOffset(range.byte_offset))?;
        return check(
            range.byte_count == description.total_size,
            BindingViolation::ConstantBufferCount { count: range.byte_count, total_size: description.total_size },
        );
    }

    let usage = description.usage;
    check(
        kind == BufferKind::Texel || view.override_texel_format == ResourceFormat::Invalid,
        BindingViolation::OverrideOnNonTexelBuffer,
    )?;
    let required = match kind {
        BufferKind::Texel => (BufferUsageFlags::TEXEL_BUFFER, "TexelBuffer"),
        BufferKind::Structured => (BufferUsageFlags::STRUCTURED_BUFFER, "StructuredBuffer"),
        BufferKind::ByteAddress => (BufferUsageFlags::BYTE_ADDRESS_BUFFER, "ByteAddressBuffer"),
        BufferKind::Constant => (BufferUsageFlags::CONSTANT_BUFFER, "ConstantBuffer"),
    };
    check(usage.contains(required.0), BindingViolation::MissingUsage(required.1))?;
    match access {
        Access::ShaderResource => check(
            usage.contains(BufferUsageFlags::SHADER_RESOURCE),
            BindingViolation::MissingUsage("ShaderResource"),
        )?,
        Access::UnorderedAccess => check(
            usage.contains(BufferUsageFlags::UNORDERED_ACCESS),
            BindingViolation::MissingUsage("UnorderedAccess"),
        )?,
    }

    let element_size = match kind {
        BufferKind::Structured => description.struct_size,
        BufferKind::Texel => {
            let format = if view.override_texel_format == ResourceFormat::Invalid {
                description.format
            } else {
                view.override_texel_format
            };
            format.bits_per_element() / 8
        }
        //byte address views are 4-byte addressed
        BufferKind::ByteAddress | BufferKind::Constant => 4,
    };
    check(element_size != 0, BindingViolation::ZeroElementSize)?;
    check(
        range.byte_offset % element_size == 0,
        BindingViolation::UnalignedOffset { offset: range.byte_offset, element_size },
    )?;
    check(
        range.byte_offset < description.total_size,
        BindingViolation::OffsetOutOfBounds { offset: range.byte_offset, size: description.total_size },
    )?;
    if range.byte_count != WHOLE_SIZE {
        check(
            range.byte_count % element_size == 0,
            BindingViolation::UnalignedCount { count: range.byte_count, element_size },
        )?;
        check(
            range.byte_offset as u64 + range.byte_count as u64 <= description.total_size as u64,
            BindingViolation::RangeOutOfBounds {
                offset: range.byte_offset,
                count: range.byte_count,
                size: description.total_size,
            },
        )?;
    }
    Ok(())
}

fn validate_texture(
    texture_type: ShaderTextureType,
    access: Access,
    with_sampler: bool,
    view: &TextureView,
    device: &Device,
) -> Result<(), BindingViolation> {
    let description = device.texture(view.texture).ok_or(BindingViolation::InvalidTexture)?;

    if view.override_view_format != ResourceFormat::Invalid {
        let format = description.format;
        let override_format = view.override_view_format;
        check(
            format.bits_per_element() == override_format.bits_per_element(),
            BindingViolation::OverrideBits {
                override_bits: override_format.bits_per_element(),
                bits: format.bits_per_element(),
            },
        )?;
        check(
            format.channel_count() == override_format.channel_count(),
            BindingViolation::OverrideChannels {
                override_channels: override_format.channel_count(),
                channels: format.channel_count(),
            },
        )?;
    }
    if with_sampler {
        check(device.sampler_state(view.sampler).is_some(), BindingViolation::InvalidSampler)?;
    }

    let range = view.range;
    if !texture_type.is_array() {
        let expected = texture_type.non_array_slices();
        let violation = if texture_type == ShaderTextureType::TextureCube {
            BindingViolation::CubeSlices(range.array_slices)
        } else {
            BindingViolation::NonArraySlices { expected, actual: range.array_slices }
        };
        check(range.array_slices == expected, violation)?;
    }
    check(
        texture_type.is_msaa() == (description.sample_count != MsaaSampleCount::None),
        BindingViolation::MsaaMismatch,
    )?;
    match access {
        Access::ShaderResource => check(
            description.allow_shader_resource_view,
            BindingViolation::MissingTexturePermission("shader resource"),
        )?,
        Access::UnorderedAccess => {
            check(description.allow_uav, BindingViolation::MissingTexturePermission("unordered access"))?
        }
    }

    let slices = description.slice_count();
    let mips = description.mip_level_count;
    check(description.texture_type != TextureType::Texture2DProxy, BindingViolation::UnresolvedProxy)?;
    check(
        (range.base_array_slice as u32) < slices,
        BindingViolation::BaseSliceOutOfBounds { base: range.base_array_slice, slices },
    )?;
    check(
        (range.base_mip_level as u32) < mips,
        BindingViolation::BaseMipOutOfBounds { base: range.base_mip_level, mips },
    )?;
    check(range.mip_levels > 0, BindingViolation::ZeroMipLevels)?;
    check(range.array_slices > 0, BindingViolation::ZeroArraySlices)?;
    check(
        range.mip_levels == ALL_MIP_LEVELS || range.base_mip_level as u32 + range.mip_levels as u32 <= mips,
        BindingViolation::MipRangeOutOfBounds { base: range.base_mip_level, count: range.mip_levels, mips },
    )?;
    check(
        range.array_slices == ALL_ARRAY_SLICES || range.base_array_slice as u32 + range.array_slices as u32 <= slices,
        BindingViolation::SliceRangeOutOfBounds { base: range.base_array_slice, count: range.array_slices, slices },
    )?;
    check(
        texture_type != ShaderTextureType::TextureCube || range.array_slices == 6,
        BindingViolation::CubeSlices(range.array_slices),
    )?;
    check(
        texture_type != ShaderTextureType::TextureCubeArray || range.array_slices % 6 == 0,
        BindingViolation::CubeArraySlices(range.array_slices),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::resource_binding::BindGroupLayoutDescription;
    use crate::images::descriptors::{BufferDescription, BufferRange};
    use crate::images::device::DeviceDescription;

    #[test]
    fn item_count_must_match_layout() {
        let (device, _) = Device::headless(DeviceDescription::default()).unwrap();
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDescription::new(vec![ShaderResourceBinding::new(
                "Sampler",
                0,
                ShaderResourceType::Sampler,
            )]))
            .unwrap();
        let description = BindGroupCreationDescription { layout, items: Vec::new() };
        assert_eq!(validate(&description, &device), Err(Violation::ItemCount { bindings: 1, items: 0 }));
    }

    #[test]
    fn byte_address_views_are_word_aligned() {
        let (device, _) = Device::headless(DeviceDescription::default()).unwrap();
        let buffer = device
            .create_buffer(
                &BufferDescription {
                    total_size: 64,
                    usage: BufferUsageFlags::BYTE_ADDRESS_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
                    immutable: false,
                    ..Default::default()
                },
                &[],
                "raw",
            )
            .unwrap();
        let view = BufferView { buffer, range: BufferRange { byte_offset: 0, byte_count: 64 }, override_texel_format: ResourceFormat::Invalid };
        assert_eq!(
            validate_buffer(BufferKind::Structured, Access::ShaderResource, &view, &device),
            Err(BindingViolation::MissingUsage("StructuredBuffer"))
        );
        assert_eq!(validate_buffer(BufferKind::ByteAddress, Access::ShaderResource, &view, &device), Ok(()));
        let view = BufferView { range: BufferRange { byte_offset: 2, byte_count: WHOLE_SIZE }, ..view };
        assert_eq!(
            validate_buffer(BufferKind::ByteAddress, Access::ShaderResource, &view, &device),
            Err(BindingViolation::UnalignedOffset { offset: 2, element_size: 4 })
        );
    }
}
