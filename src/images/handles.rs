// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Typed, generation-tagged resource handles.

A handle is a slot index plus the generation the slot had when the resource was created.
When a slot is freed its generation is bumped, so stale handles stop resolving instead
of silently aliasing whatever lives in the slot next.  Generation 0 is never handed out;
the all-zero handle is the invalidated handle and is what `Default` gives you.
*/

use crate::bittricks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ResourceId {
    index: u32,
    generation: u32,
}

impl ResourceId {
    pub const INVALID: ResourceId = ResourceId { index: 0, generation: 0 };

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        ResourceId { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub const fn is_invalidated(self) -> bool {
        self.generation == 0
    }

    /// Generation in the high half, index in the low half.
    pub fn packed(self) -> u64 {
        bittricks::u32s_to_u64(self.generation, self.index)
    }

    pub fn from_packed(packed: u64) -> Self {
        let (generation, index) = bittricks::u64_to_u32s(packed);
        ResourceId { index, generation }
    }
}

/// Kind of object a handle refers to.  Dead-object bookkeeping is keyed on this plus the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Buffer,
    Texture,
    SamplerState,
    BlendState,
    DepthStencilState,
    RasterizerState,
    Shader,
    BindGroupLayout,
    GraphicsPipeline,
    DynamicBuffer,
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $object_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub(crate) ResourceId);

        impl $name {
            pub const OBJECT_TYPE: ObjectType = $object_type;

            pub const fn invalid() -> Self {
                $name(ResourceId::INVALID)
            }

            pub const fn is_invalidated(&self) -> bool {
                self.0.is_invalidated()
            }

            pub const fn id(&self) -> ResourceId {
                self.0
            }
        }

        impl From<$name> for AnyHandle {
            fn from(handle: $name) -> AnyHandle {
                AnyHandle { object_type: $object_type, id: handle.0 }
            }
        }
    };
}

define_handle!(BufferHandle, ObjectType::Buffer);
define_handle!(TextureHandle, ObjectType::Texture);
define_handle!(SamplerStateHandle, ObjectType::SamplerState);
define_handle!(BlendStateHandle, ObjectType::BlendState);
define_handle!(DepthStencilStateHandle, ObjectType::DepthStencilState);
define_handle!(RasterizerStateHandle, ObjectType::RasterizerState);
define_handle!(ShaderHandle, ObjectType::Shader);
define_handle!(BindGroupLayoutHandle, ObjectType::BindGroupLayout);
define_handle!(GraphicsPipelineHandle, ObjectType::GraphicsPipeline);
define_handle!(
    /// A [`DynamicBuffer`](crate::bindings::dynamic_buffer::DynamicBuffer) owned by the device.
    DynamicBufferHandle,
    ObjectType::DynamicBuffer
);

/// Any handle, with its type erased into a tag.  Used by device queries that work across types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnyHandle {
    pub object_type: ObjectType,
    pub id: ResourceId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_is_invalidated() {
        assert!(BufferHandle::default().is_invalidated());
        assert_eq!(TextureHandle::invalid(), TextureHandle::default());
        assert!(!BufferHandle(ResourceId::new(0, 1)).is_invalidated());
    }

    #[test]
    fn packed_round_trip_keeps_generation() {
        let id = ResourceId::new(12, 3);
        assert_eq!(ResourceId::from_packed(id.packed()), id);
        assert_ne!(ResourceId::new(12, 4).packed(), id.packed());
    }
}
