// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! bindings_and_buffers is the resource core of a render abstraction layer: the part that
decides what a shader actually sees when it reads slot 3.

It owns four things:

| Component            | Module                                   | Job                                                                 |
|----------------------|------------------------------------------|---------------------------------------------------------------------|
| Resource table       | [`images::device`]                       | Typed handles, deduplicated state objects, frame-deferred destruction |
| Dynamic buffer       | [`bindings::dynamic_buffer`]             | Sub-allocation of one growable GPU buffer, with compaction          |
| Bind group builder   | [`bindings::bind_group_builder`]         | Bind by name, materialize per layout, substitute fallbacks          |
| Bind group validator | [`bindings::validation`]                 | Catch binding mistakes before the native API does                   |

# Lifetimes of resources

Nothing is destroyed when you ask for it.  Destroying a resource queues it, and the queue
is drained at [`Device::end_frame`](images::device::Device::end_frame).  Until then the handle
still resolves, so commands recorded earlier in the frame stay valid, and code that destroys
and immediately recreates an identical state object (shader hot reload is the usual culprit)
gets the same object back instead of churning the driver.

Handles carry a generation.  Once a slot is actually freed, stale handles miss instead of
aliasing whatever moves into the slot next.

# Backends

The device does its bookkeeping itself and delegates native objects to an
[`imp::Backend`].  The headless backend keeps everything in memory and records what it was
asked to do, which is what the tests run against.  The wgpu backend is behind the
`backend_wgpu` feature.

# Threading

Resource creation and destruction belong to the thread that created the device unless
[`Capabilities::multithreaded_resource_creation`](images::device::Capabilities) is set.
Lookups are safe from any thread.  Dynamic buffers are internally locked and may be
written from any thread.
*/

pub mod images;
pub mod bindings;
pub mod pixel_formats;
pub mod imp;
mod bittricks;

pub use images::device::{Capabilities, CreateError, Device, DeviceDescription};
