// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! wgpu backend.

use ::wgpu::util::DeviceExt;

use crate::bindings::sampler::{AddressMode, CompareFunction, FilterMode, SamplerStateDescription};
use crate::bindings::visible_to::BufferUsageFlags;
use crate::images::descriptors::{BufferDescription, TextureDescription, TextureType};
use crate::imp::{Backend, Error, NativeObject};

mod pixel_format;

/// Creates native objects on a wgpu device.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuBackend { device, queue }
    }
}

fn buffer_usages(description: &BufferDescription) -> wgpu::BufferUsages {
    let flags = description.usage;
    let mut usages = wgpu::BufferUsages::COPY_SRC;
    if !description.immutable {
        usages |= wgpu::BufferUsages::COPY_DST;
    }
    if flags.contains(BufferUsageFlags::VERTEX_BUFFER) {
        usages |= wgpu::BufferUsages::VERTEX;
    }
    if flags.contains(BufferUsageFlags::INDEX_BUFFER) {
        usages |= wgpu::BufferUsages::INDEX;
    }
    if flags.contains(BufferUsageFlags::CONSTANT_BUFFER) {
        usages |= wgpu::BufferUsages::UNIFORM;
    }
    if flags.contains(BufferUsageFlags::DRAW_INDIRECT) {
        usages |= wgpu::BufferUsages::INDIRECT;
    }
    //wgpu has no texel buffers; they are storage buffers read with a typed view in the shader
    if flags.intersects(
        BufferUsageFlags::TEXEL_BUFFER
            | BufferUsageFlags::STRUCTURED_BUFFER
            | BufferUsageFlags::BYTE_ADDRESS_BUFFER,
    ) {
        usages |= wgpu::BufferUsages::STORAGE;
    }
    usages
}

fn filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Point => wgpu::FilterMode::Nearest,
        FilterMode::Linear | FilterMode::Anisotropic => wgpu::FilterMode::Linear,
    }
}

fn address(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        //border colors need a device feature we don't request
        AddressMode::Clamp | AddressMode::Border => wgpu::AddressMode::ClampToEdge,
    }
}

fn compare(function: CompareFunction) -> wgpu::CompareFunction {
    match function {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

impl Backend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(
        &mut self,
        description: &BufferDescription,
        initial_data: &[u8],
        debug_name: &str,
    ) -> Result<NativeObject, Error> {
        let usage = buffer_usages(description);
        let buffer = if initial_data.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(debug_name),
                size: description.total_size as u64,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(debug_name),
                contents: initial_data,
                usage,
            })
        };
        Ok(NativeObject::new(buffer))
    }

    fn update_buffer(&mut self, buffer: &NativeObject, byte_offset: u32, data: &[u8]) {
        let Some(buffer) = buffer.downcast_ref::<wgpu::Buffer>() else {
            logwise::error_sync!("update_buffer called with a foreign native object");
            return;
        };
        self.queue.write_buffer(buffer, byte_offset as u64, data);
    }

    fn create_texture(
        &mut self,
        description: &TextureDescription,
        initial_data: &[&[u8]],
        debug_name: &str,
    ) -> Result<NativeObject, Error> {
        let format = pixel_format::wgpu_format(description.format)?;
        let (dimension, depth_or_array_layers) = match description.texture_type {
            TextureType::Texture3D => (wgpu::TextureDimension::D3, description.depth),
            TextureType::Texture2DProxy => return Err(Error::CreationRefused { what: "proxy texture" }),
            _ => (wgpu::TextureDimension::D2, description.slice_count()),
        };
        let mut usage = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        if description.allow_shader_resource_view {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if description.allow_uav {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if description.allow_render_target_view {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let descriptor = wgpu::TextureDescriptor {
            label: Some(debug_name),
            size: wgpu::Extent3d {
                width: description.width,
                height: description.height,
                depth_or_array_layers,
            },
            mip_level_count: description.mip_level_count,
            sample_count: description.sample_count.samples(),
            dimension,
            format,
            usage,
            view_formats: &[],
        };
        let texture = if initial_data.is_empty() {
            self.device.create_texture(&descriptor)
        } else {
            let data: Vec<u8> = initial_data.concat();
            self.device.create_texture_with_data(
                &self.queue,
                &descriptor,
                wgpu::util::TextureDataOrder::MipMajor,
                &data,
            )
        };
        Ok(NativeObject::new(texture))
    }

    fn create_sampler(&mut self, description: &SamplerStateDescription) -> Result<NativeObject, Error> {
        let all_linear = [description.min_filter, description.mag_filter, description.mip_filter]
            .iter()
            .all(|f| *f != FilterMode::Point);
        let anisotropy_clamp = if all_linear {
            description.max_anisotropy.clamp(1, 16) as u16
        } else {
            1
        };
        let s = wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: address(description.address_u),
            address_mode_v: address(description.address_v),
            address_mode_w: address(description.address_w),
            mag_filter: filter(description.mag_filter),
            min_filter: filter(description.min_filter),
            mipmap_filter: filter(description.mip_filter),
            lod_min_clamp: description.min_mip,
            lod_max_clamp: description.max_mip,
            compare: description.compare.map(compare),
            anisotropy_clamp,
            border_color: None,
        };
        Ok(NativeObject::new(self.device.create_sampler(&s)))
    }

    fn destroy(&mut self, object: NativeObject) {
        let object = match object.downcast::<wgpu::Buffer>() {
            Ok(buffer) => return buffer.destroy(),
            Err(object) => object,
        };
        if let Ok(texture) = object.downcast::<wgpu::Texture>() {
            texture.destroy();
        }
        //samplers are released on drop
    }
}
