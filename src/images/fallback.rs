// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Placeholder resources substituted for anything a bind group leaves unbound.
//!
//! Every buffer category and every texture shape a shader can declare maps to one of a
//! handful of small resources created with the device.  The contents are unspecified;
//! what matters is that the bind group is complete and type-correct.

use std::collections::HashMap;

use crate::bindings::resource_binding::{ShaderResourceType, ShaderTextureType};
use crate::bindings::visible_to::BufferUsageFlags;
use crate::images::descriptors::{BufferDescription, MsaaSampleCount, TextureDescription, TextureType};
use crate::images::device::{CreateError, Device};
use crate::images::handles::{BufferHandle, TextureHandle};
use crate::pixel_formats::ResourceFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    resource_type: ShaderResourceType,
    texture_type: ShaderTextureType,
    depth: bool,
}

#[derive(Debug, Default)]
pub(crate) struct FallbackResources {
    textures: HashMap<TextureKey, TextureHandle>,
    buffers: HashMap<ShaderResourceType, BufferHandle>,
    owned_textures: Vec<TextureHandle>,
    owned_buffers: Vec<BufferHandle>,
}

impl FallbackResources {
    pub fn create(device: &Device) -> Result<Self, CreateError> {
        let mut f = FallbackResources::default();
        use ShaderResourceType as R;
        use ShaderTextureType as S;

        let color = f.texture(device, TextureType::Texture2D, MsaaSampleCount::None, false, "FallbackTexture2D")?;
        f.map_sampled(&[S::Texture2D, S::Texture2DArray], false, color);

        let depth = f.texture(device, TextureType::Texture2D, MsaaSampleCount::None, true, "FallbackDepth2D")?;
        f.map_sampled(&[S::Texture2D, S::Texture2DArray], true, depth);

        if device.capabilities().supports_msaa_4x {
            let msaa = f.texture(device, TextureType::Texture2D, MsaaSampleCount::FourSamples, false, "FallbackTexture2DMS")?;
            f.map_sampled(&[S::Texture2DMS, S::Texture2DMSArray], false, msaa);
        }

        let cube = f.texture(device, TextureType::TextureCube, MsaaSampleCount::None, false, "FallbackTextureCube")?;
        f.map_sampled(&[S::TextureCube, S::TextureCubeArray], false, cube);

        let volume = f.texture(device, TextureType::Texture3D, MsaaSampleCount::None, false, "FallbackTexture3D")?;
        f.map_sampled(&[S::Texture3D], false, volume);

        let rw = device.create_texture(
            &TextureDescription {
                width: 4,
                height: 4,
                format: ResourceFormat::RGBAHalf,
                allow_uav: true,
                immutable: false,
                ..Default::default()
            },
            &[],
            "FallbackTextureRW",
        )?;
        f.owned_textures.push(rw);
        for texture_type in [S::Texture2D, S::Texture2DArray] {
            f.textures.insert(TextureKey { resource_type: R::TextureRW, texture_type, depth: false }, rw);
        }

        let srv = BufferUsageFlags::SHADER_RESOURCE;
        let uav = BufferUsageFlags::SHADER_RESOURCE | BufferUsageFlags::UNORDERED_ACCESS;
        let constant = BufferDescription {
            total_size: 128,
            usage: BufferUsageFlags::CONSTANT_BUFFER | srv,
            immutable: false,
            ..Default::default()
        };
        f.buffer(device, R::ConstantBuffer, constant, "FallbackConstantBuffer")?;

        let structured = BufferDescription {
            total_size: 1280,
            struct_size: 128,
            usage: BufferUsageFlags::STRUCTURED_BUFFER | srv,
            immutable: false,
            ..Default::default()
        };
        f.buffer(device, R::StructuredBuffer, structured, "FallbackStructuredBuffer")?;
        let structured_rw = BufferDescription { usage: BufferUsageFlags::STRUCTURED_BUFFER | uav, ..structured };
        f.buffer(device, R::StructuredBufferRW, structured_rw, "FallbackStructuredBufferRW")?;

        let byte_address = BufferDescription {
            total_size: 1024,
            usage: BufferUsageFlags::BYTE_ADDRESS_BUFFER | srv,
            immutable: false,
            ..Default::default()
        };
        f.buffer(device, R::ByteAddressBuffer, byte_address, "FallbackByteAddressBuffer")?;
        let byte_address_rw = BufferDescription { usage: BufferUsageFlags::BYTE_ADDRESS_BUFFER | uav, ..byte_address };
        f.buffer(device, R::ByteAddressBufferRW, byte_address_rw, "FallbackByteAddressBufferRW")?;

        if device.capabilities().supports_texel_buffers {
            let texel = BufferDescription {
                total_size: 1024,
                format: ResourceFormat::RUInt,
                usage: BufferUsageFlags::TEXEL_BUFFER | srv,
                immutable: false,
                ..Default::default()
            };
            f.buffer(device, R::TexelBuffer, texel, "FallbackTexelBuffer")?;
            let texel_rw = BufferDescription { usage: BufferUsageFlags::TEXEL_BUFFER | uav, ..texel };
            f.buffer(device, R::TexelBufferRW, texel_rw, "FallbackTexelBufferRW")?;
        }

        Ok(f)
    }

    fn texture(
        &mut self,
        device: &Device,
        texture_type: TextureType,
        sample_count: MsaaSampleCount,
        depth: bool,
        name: &str,
    ) -> Result<TextureHandle, CreateError> {
        let description = TextureDescription {
            width: 4,
            height: 4,
            depth: if texture_type == TextureType::Texture3D { 4 } else { 1 },
            format: if depth { ResourceFormat::D16 } else { ResourceFormat::BGRAUByteNormalizedsRGB },
            texture_type,
            sample_count,
            allow_render_target_view: depth || sample_count != MsaaSampleCount::None,
            immutable: false,
            ..Default::default()
        };
        let handle = device.create_texture(&description, &[], name)?;
        self.owned_textures.push(handle);
        Ok(handle)
    }

    fn map_sampled(&mut self, texture_types: &[ShaderTextureType], depth: bool, handle: TextureHandle) {
        for &texture_type in texture_types {
            for resource_type in [ShaderResourceType::Texture, ShaderResourceType::TextureAndSampler] {
                self.textures.insert(TextureKey { resource_type, texture_type, depth }, handle);
            }
        }
    }

    fn buffer(
        &mut self,
        device: &Device,
        resource_type: ShaderResourceType,
        description: BufferDescription,
        name: &str,
    ) -> Result<(), CreateError> {
        let handle = device.create_buffer(&description, &[], name)?;
        self.owned_buffers.push(handle);
        self.buffers.insert(resource_type, handle);
        Ok(())
    }

    pub fn fallback_buffer(&self, resource_type: ShaderResourceType) -> Option<BufferHandle> {
        self.buffers.get(&resource_type).copied()
    }

    /// Depth lookups with no depth variant fall back to the color texture of the same shape.
    pub fn fallback_texture(
        &self,
        resource_type: ShaderResourceType,
        texture_type: ShaderTextureType,
        depth: bool,
    ) -> Option<TextureHandle> {
        let key = TextureKey { resource_type, texture_type, depth };
        self.textures
            .get(&key)
            .or_else(|| depth.then(|| self.textures.get(&TextureKey { depth: false, ..key })).flatten())
            .copied()
    }

    pub fn destroy(self, device: &Device) {
        for buffer in self.owned_buffers {
            device.destroy_buffer(buffer);
        }
        for texture in self.owned_textures {
            device.destroy_texture(texture);
        }
    }
}
