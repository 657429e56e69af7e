// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Binding types: what shaders declare, what call sites bind, and the buffers they bind. */

pub mod sampler;
pub mod visible_to;
pub mod dirty_tracking;
pub mod resource_binding;
pub mod dynamic_buffer;
pub mod bind_group;
pub mod bind_group_builder;
pub mod validation;

pub use bind_group::{BindGroupCreationDescription, BindGroupItem};
pub use bind_group_builder::BindGroupBuilder;
pub use dynamic_buffer::DynamicBuffer;
