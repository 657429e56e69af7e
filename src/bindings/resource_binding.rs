// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shader-reflected resource bindings and the category dispatch shared by the
//! bind group builder and the validator.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::images::descriptors::TextureType;

/// 64-bit hash of a binding name.  Bind group slot tables are keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameHash(pub u64);

impl NameHash {
    pub fn new(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        NameHash(hasher.finish())
    }
}

impl From<&str> for NameHash {
    fn from(name: &str) -> Self {
        NameHash::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderResourceType {
    #[default]
    Unknown,
    Sampler,
    ConstantBuffer,
    /// Push constants are set on the command stream, never through a bind group.
    PushConstants,
    Texture,
    TextureRW,
    TextureAndSampler,
    TexelBuffer,
    TexelBufferRW,
    StructuredBuffer,
    StructuredBufferRW,
    ByteAddressBuffer,
    ByteAddressBufferRW,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Constant,
    Texel,
    Structured,
    ByteAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read-only (SRV).
    ShaderResource,
    /// Read-write (UAV).
    UnorderedAccess,
}

/// What a binding needs, independent of which of the many resource types named it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    Sampler,
    Buffer { kind: BufferKind, access: Access },
    Texture { access: Access, with_sampler: bool },
    /// Push constants and unknown types.  Reaching one in a bind group is a bug.
    Unsupported,
}

impl ShaderResourceType {
    pub const fn category(self) -> ResourceCategory {
        use Access::*;
        use ShaderResourceType as T;
        match self {
            T::Sampler => ResourceCategory::Sampler,
            T::ConstantBuffer => ResourceCategory::Buffer { kind: BufferKind::Constant, access: ShaderResource },
            T::TexelBuffer => ResourceCategory::Buffer { kind: BufferKind::Texel, access: ShaderResource },
            T::TexelBufferRW => ResourceCategory::Buffer { kind: BufferKind::Texel, access: UnorderedAccess },
            T::StructuredBuffer => ResourceCategory::Buffer { kind: BufferKind::Structured, access: ShaderResource },
            T::StructuredBufferRW => ResourceCategory::Buffer { kind: BufferKind::Structured, access: UnorderedAccess },
            T::ByteAddressBuffer => ResourceCategory::Buffer { kind: BufferKind::ByteAddress, access: ShaderResource },
            T::ByteAddressBufferRW => {
                ResourceCategory::Buffer { kind: BufferKind::ByteAddress, access: UnorderedAccess }
            }
            T::Texture => ResourceCategory::Texture { access: ShaderResource, with_sampler: false },
            T::TextureRW => ResourceCategory::Texture { access: UnorderedAccess, with_sampler: false },
            T::TextureAndSampler => ResourceCategory::Texture { access: ShaderResource, with_sampler: true },
            T::PushConstants | T::Unknown => ResourceCategory::Unsupported,
        }
    }
}

/// Texture dimensionality as a shader declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderTextureType {
    #[default]
    Unknown,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

impl ShaderTextureType {
    pub const fn is_array(self) -> bool {
        matches!(
            self,
            ShaderTextureType::Texture1DArray
                | ShaderTextureType::Texture2DArray
                | ShaderTextureType::Texture2DMSArray
                | ShaderTextureType::TextureCubeArray
        )
    }

    pub const fn is_msaa(self) -> bool {
        matches!(self, ShaderTextureType::Texture2DMS | ShaderTextureType::Texture2DMSArray)
    }

    /// Slice count a non-array binding of this type always views.
    pub const fn non_array_slices(self) -> u16 {
        if matches!(self, ShaderTextureType::TextureCube) { 6 } else { 1 }
    }

    /// The resource type that backs this binding type, if textures of it can be created.
    pub const fn texture_type(self) -> Option<TextureType> {
        match self {
            ShaderTextureType::Texture2D | ShaderTextureType::Texture2DMS => Some(TextureType::Texture2D),
            ShaderTextureType::Texture2DArray | ShaderTextureType::Texture2DMSArray => {
                Some(TextureType::Texture2DArray)
            }
            ShaderTextureType::Texture3D => Some(TextureType::Texture3D),
            ShaderTextureType::TextureCube => Some(TextureType::TextureCube),
            ShaderTextureType::TextureCubeArray => Some(TextureType::TextureCubeArray),
            ShaderTextureType::Unknown | ShaderTextureType::Texture1D | ShaderTextureType::Texture1DArray => None,
        }
    }
}

/// One entry of a shader's reflected resource layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderResourceBinding {
    pub name: String,
    pub name_hash: NameHash,
    pub slot: u32,
    pub resource_type: ShaderResourceType,
    pub texture_type: ShaderTextureType,
    pub array_size: u32,
    /// Whether an unbound texture here should fall back to a depth texture.
    /// `None` leaves the decision to the binding's name.
    pub depth_compatible: Option<bool>,
}

impl ShaderResourceBinding {
    pub fn new(name: impl Into<String>, slot: u32, resource_type: ShaderResourceType) -> Self {
        let name = name.into();
        ShaderResourceBinding {
            name_hash: NameHash::new(&name),
            name,
            slot,
            resource_type,
            texture_type: ShaderTextureType::Unknown,
            array_size: 1,
            depth_compatible: None,
        }
    }

    pub fn with_texture_type(mut self, texture_type: ShaderTextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_depth_compatible(mut self, depth_compatible: bool) -> Self {
        self.depth_compatible = Some(depth_compatible);
        self
    }

    pub fn category(&self) -> ResourceCategory {
        self.resource_type.category()
    }

    /// Whether the fallback for this binding should be a depth texture.
    pub fn wants_depth_fallback(&self) -> bool {
        self.depth_compatible.unwrap_or_else(|| {
            let lower = self.name.to_ascii_lowercase();
            lower.contains("shadow") || lower.contains("depth")
        })
    }
}

/// A shader's complete resource layout, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindGroupLayoutDescription {
    pub resource_bindings: Vec<ShaderResourceBinding>,
}

impl BindGroupLayoutDescription {
    pub fn new(resource_bindings: Vec<ShaderResourceBinding>) -> Self {
        BindGroupLayoutDescription { resource_bindings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rw_type_is_unordered_access() {
        for t in [
            ShaderResourceType::TextureRW,
            ShaderResourceType::TexelBufferRW,
            ShaderResourceType::StructuredBufferRW,
            ShaderResourceType::ByteAddressBufferRW,
        ] {
            let access = match t.category() {
                ResourceCategory::Buffer { access, .. } | ResourceCategory::Texture { access, .. } => access,
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(access, Access::UnorderedAccess);
        }
        assert_eq!(ShaderResourceType::PushConstants.category(), ResourceCategory::Unsupported);
    }

    #[test]
    fn depth_heuristic_and_override() {
        let b = ShaderResourceBinding::new("ShadowAtlasTexture", 0, ShaderResourceType::Texture);
        assert!(b.wants_depth_fallback());
        let b = ShaderResourceBinding::new("SceneDEPTH", 0, ShaderResourceType::Texture);
        assert!(b.wants_depth_fallback());
        let b = ShaderResourceBinding::new("BaseTexture", 0, ShaderResourceType::Texture);
        assert!(!b.wants_depth_fallback());
        let b = b.with_depth_compatible(true);
        assert!(b.wants_depth_fallback());
        let b = ShaderResourceBinding::new("ShadowColor", 0, ShaderResourceType::Texture).with_depth_compatible(false);
        assert!(!b.wants_depth_fallback());
    }

    #[test]
    fn name_hash_is_stable_within_a_process() {
        assert_eq!(NameHash::new("Albedo"), NameHash::from("Albedo"));
        assert_ne!(NameHash::new("Albedo"), NameHash::new("albedo"));
    }
}
