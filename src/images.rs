// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The device, its handles and the descriptions resources are created from. */

pub mod descriptors;
pub mod handles;
pub mod device;
pub(crate) mod resource_table;
pub(crate) mod fallback;

pub use device::Device;
