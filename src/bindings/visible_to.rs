// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Resource usage declarations.
//!
//! A buffer declares up front how shaders and the input assembler may use it.
//! The device checks these flags when the buffer is created, and the bind group
//! validator checks them again when the buffer is bound as a shader resource.
//!
//! # Examples
//!
//! ```
//! use bindings_and_buffers::bindings::visible_to::BufferUsageFlags;
//!
//! // A structured buffer that compute shaders read and write.
//! let usage = BufferUsageFlags::STRUCTURED_BUFFER
//!     | BufferUsageFlags::SHADER_RESOURCE
//!     | BufferUsageFlags::UNORDERED_ACCESS;
//! assert!(usage.contains(BufferUsageFlags::SHADER_RESOURCE));
//! ```

bitflags::bitflags! {
    /// How a buffer may be used by the pipeline.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsageFlags: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        /// Elements are typed through a [`ResourceFormat`](crate::pixel_formats::ResourceFormat).
        const TEXEL_BUFFER = 1 << 3;
        /// Elements are `struct_size` bytes each.
        const STRUCTURED_BUFFER = 1 << 4;
        /// Raw 4-byte addressed access.
        const BYTE_ADDRESS_BUFFER = 1 << 5;
        /// Readable from shaders (SRV).
        const SHADER_RESOURCE = 1 << 6;
        /// Writable from shaders (UAV).
        const UNORDERED_ACCESS = 1 << 7;
        const DRAW_INDIRECT = 1 << 8;
        /// Contents are rewritten every frame.
        const TRANSIENT = 1 << 9;
    }
}
