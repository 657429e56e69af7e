// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Sampler state descriptions and the device's immutable samplers.

use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Point,
    #[default]
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    #[default]
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Full description of a sampler state object.
///
/// Equal descriptions are deduplicated by the device, so floats compare by their bits.
#[derive(Debug, Clone, Copy)]
pub struct SamplerStateDescription {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    /// `Some` turns the sampler into a comparison sampler.
    pub compare: Option<CompareFunction>,
    pub mip_lod_bias: f32,
    pub min_mip: f32,
    pub max_mip: f32,
    pub max_anisotropy: u32,
}

impl Default for SamplerStateDescription {
    fn default() -> Self {
        SamplerStateDescription {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            compare: None,
            mip_lod_bias: 0.0,
            min_mip: 0.0,
            max_mip: 32.0,
            max_anisotropy: 4,
        }
    }
}

impl SamplerStateDescription {
    fn bits(&self) -> (u32, u32, u32) {
        (self.mip_lod_bias.to_bits(), self.min_mip.to_bits(), self.max_mip.to_bits())
    }
}

impl PartialEq for SamplerStateDescription {
    fn eq(&self, other: &Self) -> bool {
        self.min_filter == other.min_filter
            && self.mag_filter == other.mag_filter
            && self.mip_filter == other.mip_filter
            && self.address_u == other.address_u
            && self.address_v == other.address_v
            && self.address_w == other.address_w
            && self.compare == other.compare
            && self.max_anisotropy == other.max_anisotropy
            && self.bits() == other.bits()
    }
}

impl Eq for SamplerStateDescription {}

impl Hash for SamplerStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min_filter.hash(state);
        self.mag_filter.hash(state);
        self.mip_filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.compare.hash(state);
        self.max_anisotropy.hash(state);
        self.bits().hash(state);
    }
}

/// Samplers the device creates at startup and the bind group builder seeds every frame.
///
/// Their names are reserved: shaders refer to them directly and they cannot be rebound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    ///Linear filtering, wrapping.  The default sampler for textures bound without one.
    Linear,
    ///Linear filtering, clamped to the edge.
    LinearClamp,
    ///Nearest filtering, wrapping.
    Point,
    ///Nearest filtering, clamped to the edge.
    PointClamp,
}

impl SamplerType {
    pub const ALL: [SamplerType; 4] = [
        SamplerType::Linear,
        SamplerType::LinearClamp,
        SamplerType::Point,
        SamplerType::PointClamp,
    ];

    /// The sampler used when a texture is bound without a companion sampler.
    pub const DEFAULT: SamplerType = SamplerType::Linear;

    /// Name shaders use to refer to this sampler.
    pub const fn name(self) -> &'static str {
        match self {
            SamplerType::Linear => "LinearSampler",
            SamplerType::LinearClamp => "LinearClampSampler",
            SamplerType::Point => "PointSampler",
            SamplerType::PointClamp => "PointClampSampler",
        }
    }

    pub fn description(self) -> SamplerStateDescription {
        let (filter, address) = match self {
            SamplerType::Linear => (FilterMode::Linear, AddressMode::Wrap),
            SamplerType::LinearClamp => (FilterMode::Linear, AddressMode::Clamp),
            SamplerType::Point => (FilterMode::Point, AddressMode::Wrap),
            SamplerType::PointClamp => (FilterMode::Point, AddressMode::Clamp),
        };
        SamplerStateDescription {
            min_filter: filter,
            mag_filter: filter,
            mip_filter: filter,
            address_u: address,
            address_v: address,
            address_w: address,
            ..SamplerStateDescription::default()
        }
    }
}
