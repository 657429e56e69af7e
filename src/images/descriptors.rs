// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Creation descriptions for device resources, and the sub-ranges views select from them.

use std::hash::{Hash, Hasher};

use crate::bindings::sampler::CompareFunction;
use crate::bindings::visible_to::BufferUsageFlags;
use crate::images::handles::{BlendStateHandle, DepthStencilStateHandle, RasterizerStateHandle, ShaderHandle};
use crate::pixel_formats::ResourceFormat;

/// Byte count meaning "to the end of the buffer".
pub const WHOLE_SIZE: u32 = u32::MAX;
/// Slice count meaning "every remaining slice".
pub const ALL_ARRAY_SLICES: u16 = 0xFFFF;
/// Mip count meaning "every remaining mip level".
pub const ALL_MIP_LEVELS: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    Texture2D,
    /// A view of one slice of another texture.  Created with
    /// [`Device::create_proxy_texture`](crate::images::Device::create_proxy_texture).
    Texture2DProxy,
    TextureCube,
    Texture3D,
    Texture2DArray,
    TextureCubeArray,
}

impl TextureType {
    pub const fn is_cube(self) -> bool {
        matches!(self, TextureType::TextureCube | TextureType::TextureCubeArray)
    }

    pub const fn is_array(self) -> bool {
        matches!(self, TextureType::Texture2DArray | TextureType::TextureCubeArray)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MsaaSampleCount {
    #[default]
    None,
    TwoSamples,
    FourSamples,
    EightSamples,
}

impl MsaaSampleCount {
    pub const fn samples(self) -> u32 {
        match self {
            MsaaSampleCount::None => 1,
            MsaaSampleCount::TwoSamples => 2,
            MsaaSampleCount::FourSamples => 4,
            MsaaSampleCount::EightSamples => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDescription {
    pub total_size: u32,
    /// Element size for structured, vertex and index buffers.  Zero otherwise.
    pub struct_size: u32,
    pub usage: BufferUsageFlags,
    /// Element format.  Only texel buffers may set this.
    pub format: ResourceFormat,
    /// Immutable buffers must be created with their full contents.
    pub immutable: bool,
}

impl Default for BufferDescription {
    fn default() -> Self {
        BufferDescription {
            total_size: 0,
            struct_size: 0,
            usage: BufferUsageFlags::empty(),
            format: ResourceFormat::Invalid,
            immutable: true,
        }
    }
}

impl BufferDescription {
    /// Resolves [`WHOLE_SIZE`] against this buffer.
    pub fn clamp_range(&self, mut range: BufferRange) -> BufferRange {
        debug_assert!(
            range.byte_offset < self.total_size,
            "buffer offset {} is out of bounds of the buffer size {}",
            range.byte_offset,
            self.total_size
        );
        if range.byte_count == WHOLE_SIZE {
            range.byte_count = self.total_size.saturating_sub(range.byte_offset);
        }
        debug_assert!(
            range.byte_offset as u64 + range.byte_count as u64 <= self.total_size as u64,
            "buffer offset {} + byte count {} is bigger than buffer size {}",
            range.byte_offset,
            range.byte_count,
            self.total_size
        );
        range
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    pub byte_offset: u32,
    pub byte_count: u32,
}

impl Default for BufferRange {
    fn default() -> Self {
        BufferRange { byte_offset: 0, byte_count: WHOLE_SIZE }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescription {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_level_count: u32,
    /// Number of array elements.  For cube types, each element is six slices.
    pub array_size: u32,
    pub format: ResourceFormat,
    pub sample_count: MsaaSampleCount,
    pub texture_type: TextureType,
    pub allow_shader_resource_view: bool,
    pub allow_uav: bool,
    pub allow_render_target_view: bool,
    pub immutable: bool,
}

impl Default for TextureDescription {
    fn default() -> Self {
        TextureDescription {
            width: 0,
            height: 0,
            depth: 1,
            mip_level_count: 1,
            array_size: 1,
            format: ResourceFormat::Invalid,
            sample_count: MsaaSampleCount::None,
            texture_type: TextureType::Texture2D,
            allow_shader_resource_view: true,
            allow_uav: false,
            allow_render_target_view: false,
            immutable: true,
        }
    }
}

impl TextureDescription {
    /// Number of addressable slices: array size, times six for cube types.
    pub fn slice_count(&self) -> u32 {
        if self.texture_type.is_cube() { self.array_size * 6 } else { self.array_size }
    }

    /// Resolves [`ALL_ARRAY_SLICES`] and [`ALL_MIP_LEVELS`] against this texture.
    pub fn clamp_range(&self, mut range: TextureRange) -> TextureRange {
        let slices = self.slice_count().min(u16::MAX as u32) as u16;
        let mips = self.mip_level_count.min(u8::MAX as u32) as u8;
        if range.array_slices == ALL_ARRAY_SLICES {
            range.array_slices = slices.saturating_sub(range.base_array_slice);
        }
        if range.mip_levels == ALL_MIP_LEVELS {
            range.mip_levels = mips.saturating_sub(range.base_mip_level);
        }
        debug_assert!(
            range.base_array_slice as u32 + range.array_slices as u32 <= slices as u32,
            "base array slice {} + array slices {} is bigger than the texture's slice count {}",
            range.base_array_slice,
            range.array_slices,
            slices
        );
        debug_assert!(
            range.base_mip_level as u32 + range.mip_levels as u32 <= mips as u32,
            "base mip level {} + mip levels {} is bigger than the texture's mip level count {}",
            range.base_mip_level,
            range.mip_levels,
            mips
        );
        range
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRange {
    pub base_array_slice: u16,
    pub array_slices: u16,
    pub base_mip_level: u8,
    pub mip_levels: u8,
}

impl Default for TextureRange {
    fn default() -> Self {
        TextureRange {
            base_array_slice: 0,
            array_slices: ALL_ARRAY_SLICES,
            base_mip_level: 0,
            mip_levels: ALL_MIP_LEVELS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDescription {
    pub alpha_to_coverage: bool,
    pub blending_enabled: bool,
    pub source_blend: BlendFactor,
    pub dest_blend: BlendFactor,
    pub blend_op: BlendOp,
    pub write_mask: u8,
}

impl Default for BlendStateDescription {
    fn default() -> Self {
        BlendStateDescription {
            alpha_to_coverage: false,
            blending_enabled: false,
            source_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_op: BlendOp::Add,
            write_mask: 0xF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDescription {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_test_function: CompareFunction,
    pub stencil_test: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilStateDescription {
    fn default() -> Self {
        DepthStencilStateDescription {
            depth_test: true,
            depth_write: true,
            depth_test_function: CompareFunction::Less,
            stencil_test: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterizerStateDescription {
    pub cull_mode: CullMode,
    pub wireframe: bool,
    pub front_counter_clockwise: bool,
    pub scissor_test: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
}

impl RasterizerStateDescription {
    fn bits(&self) -> (u32, u32) {
        (self.depth_bias_clamp.to_bits(), self.slope_scaled_depth_bias.to_bits())
    }
}

impl PartialEq for RasterizerStateDescription {
    fn eq(&self, other: &Self) -> bool {
        self.cull_mode == other.cull_mode
            && self.wireframe == other.wireframe
            && self.front_counter_clockwise == other.front_counter_clockwise
            && self.scissor_test == other.scissor_test
            && self.depth_bias == other.depth_bias
            && self.bits() == other.bits()
    }
}

impl Eq for RasterizerStateDescription {}

impl Hash for RasterizerStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cull_mode.hash(state);
        self.wireframe.hash(state);
        self.front_counter_clockwise.hash(state);
        self.scissor_test.hash(state);
        self.depth_bias.hash(state);
        self.bits().hash(state);
    }
}

/// A compiled shader.  Compilation happens elsewhere; the device only tracks identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderDescription {
    pub name: String,
    pub byte_code: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    #[default]
    Triangles,
}

/// A pipeline holds a counted reference on each state object it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GraphicsPipelineDescription {
    pub shader: ShaderHandle,
    pub blend_state: BlendStateHandle,
    pub depth_stencil_state: DepthStencilStateHandle,
    pub rasterizer_state: RasterizerStateHandle,
    pub topology: PrimitiveTopology,
}
