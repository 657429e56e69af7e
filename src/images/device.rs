// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The device and its resource tables.
//!
//! Every resource the renderer creates lives in one of the device's tables and is named by a
//! typed, generation-tagged handle.  Destruction is deferred: destroying a resource (or
//! releasing the last reference to a shared one) queues it, and the queue is drained by
//! [`Device::end_frame`].  Until then the resource still resolves, and creating an equal
//! state object takes it off the queue again instead of creating a new one.
//!
//! The device is an explicit context.  Components that need resource lookups take a
//! `&Device`; there is no global.

use std::fmt::Formatter;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use crate::bindings::dynamic_buffer::DynamicBuffer;
use crate::bindings::resource_binding::{BindGroupLayoutDescription, ShaderResourceType, ShaderTextureType};
use crate::bindings::sampler::{SamplerStateDescription, SamplerType};
use crate::bindings::visible_to::BufferUsageFlags;
use crate::images::descriptors::{
    BlendStateDescription, BufferDescription, DepthStencilStateDescription, GraphicsPipelineDescription,
    MsaaSampleCount, RasterizerStateDescription, ShaderDescription, TextureDescription, TextureType,
};
use crate::images::fallback::FallbackResources;
use crate::images::handles::{
    AnyHandle, BindGroupLayoutHandle, BlendStateHandle, BufferHandle, DepthStencilStateHandle, DynamicBufferHandle,
    GraphicsPipelineHandle, ObjectType, RasterizerStateHandle, ResourceId, SamplerStateHandle, ShaderHandle,
    TextureHandle,
};
use crate::images::resource_table::{DeadObject, DeadObjects, IdTable, SharedTable};
use crate::imp::{self, Backend, HeadlessBackend, HeadlessProbe, NativeObject};
use crate::pixel_formats::ResourceFormat;

/// What the platform underneath the device can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Resources may be created and destroyed from any thread.
    pub multithreaded_resource_creation: bool,
    pub supports_texel_buffers: bool,
    pub supports_msaa_4x: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            multithreaded_resource_creation: false,
            supports_texel_buffers: true,
            supports_msaa_4x: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceDescription {
    pub capabilities: Capabilities,
    /// Log every creation and destruction.
    pub debug_device: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("a buffer with a size of 0 cannot be created")]
    ZeroSizedBuffer,
    #[error("an immutable {0} cannot be created without initial data")]
    ImmutableWithoutData(&'static str),
    #[error("initial data is {actual} bytes but the buffer is {expected} bytes")]
    InitialDataSize { expected: u32, actual: usize },
    #[error("transient buffers cannot have initial data")]
    TransientWithData,
    #[error("texel buffers need a valid format")]
    TexelBufferWithoutFormat,
    #[error("a format is only allowed on texel buffers")]
    FormatOnNonTexelBuffer,
    #[error("{format:?} cannot describe texel buffer elements")]
    InvalidTexelFormat { format: ResourceFormat },
    #[error("texel buffer of format {format:?} must have a size multiple of {element_size}, but size is {size}")]
    TexelBufferSize { format: ResourceFormat, element_size: u32, size: u32 },
    #[error("struct size must not be 0 for structured, vertex and index buffers")]
    MissingStructSize,
    #[error("structured buffer size {size} is not a multiple of the struct size {struct_size}")]
    StructuredBufferSize { size: u32, struct_size: u32 },
    #[error("texel buffers are not supported on this device")]
    TexelBuffersUnsupported,
    #[error("a texture with a width or height of 0 cannot be created")]
    ZeroSizedTexture,
    #[error("array size must be 1 for non-array textures, but is {0}")]
    ArraySizeOnNonArrayTexture(u32),
    #[error("{0:?} sampling is not supported on this device")]
    MsaaUnsupported(MsaaSampleCount),
    #[error("proxy textures are created with create_proxy_texture")]
    ProxyDescription,
    #[error("the parent of a proxy texture must be a live, non-proxy texture")]
    InvalidProxyParent,
    #[error("slice {slice} is out of range for a parent with {slices} slices")]
    ProxySliceOutOfRange { slice: u16, slices: u32 },
    #[error("graphics pipeline references an invalid {0}")]
    MissingDependency(&'static str),
    #[error(transparent)]
    Backend(#[from] imp::Error),
}

fn validate_buffer(
    description: &BufferDescription,
    initial_data: &[u8],
    capabilities: &Capabilities,
) -> Result<(), CreateError> {
    let usage = description.usage;
    if description.total_size == 0 {
        return Err(CreateError::ZeroSizedBuffer);
    }
    if description.immutable && initial_data.is_empty() {
        return Err(CreateError::ImmutableWithoutData("buffer"));
    }
    if !initial_data.is_empty() && initial_data.len() != description.total_size as usize {
        return Err(CreateError::InitialDataSize {
            expected: description.total_size,
            actual: initial_data.len(),
        });
    }
    if usage.contains(BufferUsageFlags::TRANSIENT) && !initial_data.is_empty() {
        return Err(CreateError::TransientWithData);
    }
    if usage.contains(BufferUsageFlags::INDEX_BUFFER) && description.struct_size != 2 && description.struct_size != 4 {
        logwise::warn_sync!(
            "index buffer struct size must be 2 or 4 but is {size}",
            size = description.struct_size
        );
    }
    if usage.contains(BufferUsageFlags::TEXEL_BUFFER) {
        if description.format == ResourceFormat::Invalid {
            return Err(CreateError::TexelBufferWithoutFormat);
        }
        if !description.format.is_texel_buffer_format() {
            return Err(CreateError::InvalidTexelFormat { format: description.format });
        }
        let element_size = description.format.bytes_per_element();
        if description.total_size % element_size != 0 {
            return Err(CreateError::TexelBufferSize {
                format: description.format,
                element_size,
                size: description.total_size,
            });
        }
    } else if description.format != ResourceFormat::Invalid {
        return Err(CreateError::FormatOnNonTexelBuffer);
    }
    let needs_struct_size =
        BufferUsageFlags::STRUCTURED_BUFFER | BufferUsageFlags::VERTEX_BUFFER | BufferUsageFlags::INDEX_BUFFER;
    if usage.intersects(needs_struct_size) && description.struct_size == 0 {
        return Err(CreateError::MissingStructSize);
    }
    if usage.contains(BufferUsageFlags::STRUCTURED_BUFFER) && description.total_size % description.struct_size != 0 {
        return Err(CreateError::StructuredBufferSize {
            size: description.total_size,
            struct_size: description.struct_size,
        });
    }
    if usage.contains(BufferUsageFlags::TEXEL_BUFFER) && !capabilities.supports_texel_buffers {
        return Err(CreateError::TexelBuffersUnsupported);
    }
    Ok(())
}

fn validate_texture(
    description: &TextureDescription,
    initial_data: &[&[u8]],
    capabilities: &Capabilities,
) -> Result<(), CreateError> {
    if description.texture_type == TextureType::Texture2DProxy {
        return Err(CreateError::ProxyDescription);
    }
    if description.immutable
        && initial_data.len() < description.mip_level_count as usize
        && !description.allow_render_target_view
    {
        return Err(CreateError::ImmutableWithoutData("texture"));
    }
    if description.width == 0 || description.height == 0 {
        return Err(CreateError::ZeroSizedTexture);
    }
    if !description.texture_type.is_array() && description.array_size != 1 {
        return Err(CreateError::ArraySizeOnNonArrayTexture(description.array_size));
    }
    if description.sample_count == MsaaSampleCount::FourSamples && !capabilities.supports_msaa_4x {
        return Err(CreateError::MsaaUnsupported(description.sample_count));
    }
    Ok(())
}

#[derive(Debug)]
struct BufferRecord {
    description: BufferDescription,
    native: NativeObject,
}

/// The parent and slice a proxy texture views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyTexture {
    pub parent: TextureHandle,
    pub slice: u16,
}

#[derive(Debug)]
struct TextureRecord {
    description: TextureDescription,
    native: Option<NativeObject>,
    proxy: Option<ProxyTexture>,
}

pub(crate) struct DeviceState {
    backend: Box<dyn Backend>,
    buffers: IdTable<BufferRecord>,
    textures: IdTable<TextureRecord>,
    dynamic_buffers: IdTable<Arc<DynamicBuffer>>,
    samplers: SharedTable<SamplerStateDescription>,
    blend_states: SharedTable<BlendStateDescription>,
    depth_stencil_states: SharedTable<DepthStencilStateDescription>,
    rasterizer_states: SharedTable<RasterizerStateDescription>,
    shaders: SharedTable<ShaderDescription>,
    bind_group_layouts: SharedTable<BindGroupLayoutDescription>,
    graphics_pipelines: SharedTable<GraphicsPipelineDescription>,
    dead_objects: DeadObjects,
    fallbacks: Option<FallbackResources>,
    immutable_samplers: Vec<(SamplerType, SamplerStateHandle)>,
    frame: u64,
    in_frame: bool,
}

/// A deduplicated, reference-counted state object.
trait SharedObject: Copy {
    type Description: Hash + Eq + Clone;
    const NAME: &'static str;
    const OBJECT_TYPE: ObjectType;

    fn from_id(id: ResourceId) -> Self;
    fn resource_id(self) -> ResourceId;
    fn table(state: &DeviceState) -> &SharedTable<Self::Description>;
    fn table_mut(state: &mut DeviceState) -> &mut SharedTable<Self::Description>;

    /// Runs when the reference count goes from 0 to 1, for new and revived objects alike.
    fn first_reference(_state: &mut DeviceState, _description: &Self::Description) {}
    /// Runs when the reference count drops to 0.
    fn last_reference(_state: &mut DeviceState, _description: &Self::Description) {}
}

macro_rules! shared_object {
    ($handle:ident, $description:ty, $field:ident, $name:literal) => {
        shared_object!($handle, $description, $field, $name, {});
    };
    ($handle:ident, $description:ty, $field:ident, $name:literal, { $($hooks:tt)* }) => {
        impl SharedObject for $handle {
            type Description = $description;
            const NAME: &'static str = $name;
            const OBJECT_TYPE: ObjectType = $handle::OBJECT_TYPE;

            fn from_id(id: ResourceId) -> Self {
                $handle(id)
            }
            fn resource_id(self) -> ResourceId {
                self.0
            }
            fn table(state: &DeviceState) -> &SharedTable<$description> {
                &state.$field
            }
            fn table_mut(state: &mut DeviceState) -> &mut SharedTable<$description> {
                &mut state.$field
            }
            $($hooks)*
        }
    };
}

shared_object!(SamplerStateHandle, SamplerStateDescription, samplers, "sampler state");
shared_object!(BlendStateHandle, BlendStateDescription, blend_states, "blend state");
shared_object!(DepthStencilStateHandle, DepthStencilStateDescription, depth_stencil_states, "depth stencil state");
shared_object!(RasterizerStateHandle, RasterizerStateDescription, rasterizer_states, "rasterizer state");
shared_object!(ShaderHandle, ShaderDescription, shaders, "shader");
shared_object!(BindGroupLayoutHandle, BindGroupLayoutDescription, bind_group_layouts, "bind group layout");
shared_object!(GraphicsPipelineHandle, GraphicsPipelineDescription, graphics_pipelines, "graphics pipeline", {
    fn first_reference(state: &mut DeviceState, description: &GraphicsPipelineDescription) {
        state.acquire(description.shader);
        state.acquire(description.rasterizer_state);
        state.acquire(description.blend_state);
        state.acquire(description.depth_stencil_state);
    }
    fn last_reference(state: &mut DeviceState, description: &GraphicsPipelineDescription) {
        state.release(description.shader);
        state.release(description.rasterizer_state);
        state.release(description.blend_state);
        state.release(description.depth_stencil_state);
    }
});

impl DeviceState {
    fn new(backend: Box<dyn Backend>) -> Self {
        DeviceState {
            backend,
            buffers: IdTable::default(),
            textures: IdTable::default(),
            dynamic_buffers: IdTable::default(),
            samplers: SharedTable::default(),
            blend_states: SharedTable::default(),
            depth_stencil_states: SharedTable::default(),
            rasterizer_states: SharedTable::default(),
            shaders: SharedTable::default(),
            bind_group_layouts: SharedTable::default(),
            graphics_pipelines: SharedTable::default(),
            dead_objects: DeadObjects::default(),
            fallbacks: None,
            immutable_samplers: Vec::new(),
            frame: 0,
            in_frame: false,
        }
    }

    fn acquire<H: SharedObject>(&mut self, handle: H) -> bool {
        let id = handle.resource_id();
        let first = match H::table_mut(self).get_mut(id) {
            Some(record) => {
                record.ref_count += 1;
                (record.ref_count == 1).then(|| record.description.clone())
            }
            None => {
                logwise::error_sync!("acquiring an invalid {kind} handle", kind = logwise::privacy::LogIt(H::NAME));
                return false;
            }
        };
        if let Some(description) = first {
            if self.dead_objects.revive(H::OBJECT_TYPE, id) {
                logwise::trace_sync!("revived dead {kind}", kind = logwise::privacy::LogIt(H::NAME));
            }
            H::first_reference(self, &description);
        }
        true
    }

    fn release<H: SharedObject>(&mut self, handle: H) {
        let id = handle.resource_id();
        let last = match H::table_mut(self).get_mut(id) {
            Some(record) if record.ref_count == 0 => {
                debug_assert!(false, "{} destroyed more often than it was created", H::NAME);
                logwise::warn_sync!(
                    "{kind} is already dead (double free?)",
                    kind = logwise::privacy::LogIt(H::NAME)
                );
                return;
            }
            Some(record) => {
                record.ref_count -= 1;
                (record.ref_count == 0).then(|| record.description.clone())
            }
            None => {
                logwise::warn_sync!(
                    "destroy called on an invalid {kind} handle (double free?)",
                    kind = logwise::privacy::LogIt(H::NAME)
                );
                return;
            }
        };
        if let Some(description) = last {
            self.dead_objects.add(H::OBJECT_TYPE, id);
            H::last_reference(self, &description);
        }
    }

    fn queue_unshared(&mut self, object_type: ObjectType, id: ResourceId, live: bool) {
        if !live {
            logwise::warn_sync!(
                "destroy called on an invalid {kind} handle (double free?)",
                kind = logwise::privacy::LogIt(&object_type)
            );
            return;
        }
        if self.dead_objects.contains(object_type, id) {
            debug_assert!(false, "{object_type:?} destroyed twice");
            return;
        }
        self.dead_objects.add(object_type, id);
    }

    fn remove_shared<D: Hash + Eq + Clone>(table: &mut SharedTable<D>, id: ResourceId) -> Option<Option<NativeObject>> {
        match table.get(id) {
            //taken back by a later create; the dead entry is stale
            Some(record) if record.ref_count > 0 => Some(None),
            Some(_) => table.remove(id).map(|record| record.native),
            None => None,
        }
    }

    fn destroy_dead(&mut self, object: DeadObject, dynamic: &mut Vec<Arc<DynamicBuffer>>) {
        let id = object.id;
        let native = match object.object_type {
            ObjectType::Buffer => self.buffers.remove(id).map(|r| Some(r.native)),
            ObjectType::Texture => self.textures.remove(id).map(|r| r.native),
            ObjectType::DynamicBuffer => self.dynamic_buffers.remove(id).map(|buffer| {
                dynamic.push(buffer);
                None
            }),
            ObjectType::SamplerState => Self::remove_shared(&mut self.samplers, id),
            ObjectType::BlendState => Self::remove_shared(&mut self.blend_states, id),
            ObjectType::DepthStencilState => Self::remove_shared(&mut self.depth_stencil_states, id),
            ObjectType::RasterizerState => Self::remove_shared(&mut self.rasterizer_states, id),
            ObjectType::Shader => Self::remove_shared(&mut self.shaders, id),
            ObjectType::BindGroupLayout => Self::remove_shared(&mut self.bind_group_layouts, id),
            ObjectType::GraphicsPipeline => Self::remove_shared(&mut self.graphics_pipelines, id),
        };
        match native {
            Some(Some(native)) => self.backend.destroy(native),
            Some(None) => {}
            None => logwise::warn_sync!(
                "dead {kind} disappeared before the frame boundary",
                kind = logwise::privacy::LogIt(&object.object_type)
            ),
        }
    }

    fn live_object_count(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.dynamic_buffers.len()
            + self.samplers.len()
            + self.blend_states.len()
            + self.depth_stencil_states.len()
            + self.rasterizer_states.len()
            + self.shaders.len()
            + self.bind_group_layouts.len()
            + self.graphics_pipelines.len()
    }
}

/// Owns every GPU resource and the frame-deferred destruction queue.
pub struct Device {
    description: DeviceDescription,
    main_thread: ThreadId,
    state: Mutex<DeviceState>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Creates the device, its immutable samplers and its fallback resources.
    ///
    /// The calling thread becomes the device's main thread.
    pub fn new(description: DeviceDescription, backend: Box<dyn Backend>) -> Result<Device, CreateError> {
        logwise::info_sync!(
            "creating device on the {backend} backend",
            backend = logwise::privacy::LogIt(backend.name())
        );
        let device = Device {
            description,
            main_thread: std::thread::current().id(),
            state: Mutex::new(DeviceState::new(backend)),
        };

        let mut immutable_samplers = Vec::with_capacity(SamplerType::ALL.len());
        for sampler_type in SamplerType::ALL {
            immutable_samplers.push((sampler_type, device.create_sampler_state(&sampler_type.description())?));
        }
        let fallbacks = FallbackResources::create(&device)?;

        let mut state = device.state();
        state.immutable_samplers = immutable_samplers;
        state.fallbacks = Some(fallbacks);
        drop(state);
        Ok(device)
    }

    /// A device on the headless backend, and a probe to observe what it did.
    pub fn headless(description: DeviceDescription) -> Result<(Device, HeadlessProbe), CreateError> {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        Device::new(description, Box::new(backend)).map(|device| (device, probe))
    }

    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    pub fn capabilities(&self) -> Capabilities {
        self.description.capabilities
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_for_mutation(&self) -> MutexGuard<'_, DeviceState> {
        if !self.description.capabilities.multithreaded_resource_creation {
            debug_assert_eq!(
                std::thread::current().id(),
                self.main_thread,
                "resources must be created and destroyed on the main thread"
            );
        }
        self.state()
    }

    fn log_failure(&self, kind: &str, name: &str, error: &CreateError) {
        logwise::error_sync!(
            "failed to create {kind} {name}: {error}",
            kind = logwise::privacy::LogIt(kind),
            name = logwise::privacy::LogIt(name),
            error = logwise::privacy::LogIt(error)
        );
    }

    fn create_shared<H: SharedObject>(
        &self,
        description: &H::Description,
        create: impl FnOnce(&mut DeviceState) -> Result<Option<NativeObject>, CreateError>,
    ) -> Result<H, CreateError> {
        let mut state = self.state_for_mutation();
        if let Some(id) = H::table(&state).find(description) {
            let handle = H::from_id(id);
            state.acquire(handle);
            return Ok(handle);
        }
        let native = create(&mut state).inspect_err(|e| self.log_failure(H::NAME, "", e))?;
        let handle = H::from_id(H::table_mut(&mut state).insert(description.clone(), native));
        state.acquire(handle);
        if self.description.debug_device {
            logwise::trace_sync!("created {kind}", kind = logwise::privacy::LogIt(H::NAME));
        }
        Ok(handle)
    }

    fn shared_description<H: SharedObject>(&self, handle: H) -> Option<H::Description> {
        H::table(&self.state())
            .get(handle.resource_id())
            .map(|record| record.description.clone())
    }

    pub fn create_sampler_state(&self, description: &SamplerStateDescription) -> Result<SamplerStateHandle, CreateError> {
        self.create_shared(description, |state| Ok(Some(state.backend.create_sampler(description)?)))
    }

    pub fn destroy_sampler_state(&self, handle: SamplerStateHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn sampler_state(&self, handle: SamplerStateHandle) -> Option<SamplerStateDescription> {
        self.shared_description(handle)
    }

    pub fn create_blend_state(&self, description: &BlendStateDescription) -> Result<BlendStateHandle, CreateError> {
        self.create_shared(description, |_| Ok(None))
    }

    pub fn destroy_blend_state(&self, handle: BlendStateHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn blend_state(&self, handle: BlendStateHandle) -> Option<BlendStateDescription> {
        self.shared_description(handle)
    }

    pub fn create_depth_stencil_state(
        &self,
        description: &DepthStencilStateDescription,
    ) -> Result<DepthStencilStateHandle, CreateError> {
        self.create_shared(description, |_| Ok(None))
    }

    pub fn destroy_depth_stencil_state(&self, handle: DepthStencilStateHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn depth_stencil_state(&self, handle: DepthStencilStateHandle) -> Option<DepthStencilStateDescription> {
        self.shared_description(handle)
    }

    pub fn create_rasterizer_state(
        &self,
        description: &RasterizerStateDescription,
    ) -> Result<RasterizerStateHandle, CreateError> {
        self.create_shared(description, |_| Ok(None))
    }

    pub fn destroy_rasterizer_state(&self, handle: RasterizerStateHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn rasterizer_state(&self, handle: RasterizerStateHandle) -> Option<RasterizerStateDescription> {
        self.shared_description(handle)
    }

    pub fn create_shader(&self, description: &ShaderDescription) -> Result<ShaderHandle, CreateError> {
        self.create_shared(description, |_| Ok(None))
    }

    pub fn destroy_shader(&self, handle: ShaderHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn shader(&self, handle: ShaderHandle) -> Option<ShaderDescription> {
        self.shared_description(handle)
    }

    pub fn create_bind_group_layout(
        &self,
        description: &BindGroupLayoutDescription,
    ) -> Result<BindGroupLayoutHandle, CreateError> {
        self.create_shared(description, |_| Ok(None))
    }

    pub fn destroy_bind_group_layout(&self, handle: BindGroupLayoutHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn bind_group_layout(&self, handle: BindGroupLayoutHandle) -> Option<BindGroupLayoutDescription> {
        self.shared_description(handle)
    }

    /// Creates a pipeline holding one reference on each state object it names.
    pub fn create_graphics_pipeline(
        &self,
        description: &GraphicsPipelineDescription,
    ) -> Result<GraphicsPipelineHandle, CreateError> {
        self.create_shared(description, |state| {
            if state.shaders.get(description.shader.0).is_none() {
                return Err(CreateError::MissingDependency(ShaderHandle::NAME));
            }
            if state.blend_states.get(description.blend_state.0).is_none() {
                return Err(CreateError::MissingDependency(BlendStateHandle::NAME));
            }
            if state.depth_stencil_states.get(description.depth_stencil_state.0).is_none() {
                return Err(CreateError::MissingDependency(DepthStencilStateHandle::NAME));
            }
            if state.rasterizer_states.get(description.rasterizer_state.0).is_none() {
                return Err(CreateError::MissingDependency(RasterizerStateHandle::NAME));
            }
            Ok(None)
        })
    }

    /// Releasing the last reference also releases the pipeline's state objects.
    pub fn destroy_graphics_pipeline(&self, handle: GraphicsPipelineHandle) {
        self.state_for_mutation().release(handle);
    }

    pub fn graphics_pipeline(&self, handle: GraphicsPipelineHandle) -> Option<GraphicsPipelineDescription> {
        self.shared_description(handle)
    }

    /// Creates a buffer.  `initial_data` is empty or exactly `total_size` bytes.
    pub fn create_buffer(
        &self,
        description: &BufferDescription,
        initial_data: &[u8],
        debug_name: &str,
    ) -> Result<BufferHandle, CreateError> {
        let mut state = self.state_for_mutation();
        let result = validate_buffer(description, initial_data, &self.description.capabilities)
            .and_then(|_| Ok(state.backend.create_buffer(description, initial_data, debug_name)?));
        let native = result.inspect_err(|e| self.log_failure("buffer", debug_name, e))?;
        let id = state.buffers.insert(BufferRecord { description: *description, native });
        if self.description.debug_device {
            logwise::trace_sync!(
                "created buffer {name} of {size} bytes",
                name = logwise::privacy::LogIt(debug_name),
                size = description.total_size
            );
        }
        Ok(BufferHandle(id))
    }

    pub fn destroy_buffer(&self, handle: BufferHandle) {
        let mut state = self.state_for_mutation();
        let live = state.buffers.contains(handle.0);
        state.queue_unshared(ObjectType::Buffer, handle.0, live);
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<BufferDescription> {
        self.state().buffers.get(handle.0).map(|record| record.description)
    }

    /// Writes into a mutable buffer.  The write lands before the next frame renders.
    pub fn update_buffer(&self, handle: BufferHandle, byte_offset: u32, data: &[u8]) {
        let mut state = self.state();
        let DeviceState { buffers, backend, .. } = &mut *state;
        let Some(record) = buffers.get(handle.0) else {
            logwise::warn_sync!("update_buffer called on an invalid buffer handle");
            return;
        };
        debug_assert!(!record.description.immutable, "immutable buffers cannot be updated");
        assert!(
            byte_offset as u64 + data.len() as u64 <= record.description.total_size as u64,
            "update of {} bytes at {} overruns a buffer of {} bytes",
            data.len(),
            byte_offset,
            record.description.total_size
        );
        backend.update_buffer(&record.native, byte_offset, data);
    }

    /// Runs `f` on the buffer's native object.  `f` must not call back into the device.
    pub fn with_native_buffer<R>(&self, handle: BufferHandle, f: impl FnOnce(&NativeObject) -> R) -> Option<R> {
        self.state().buffers.get(handle.0).map(|record| f(&record.native))
    }

    /// Creates a texture.  `initial_data` holds one entry per mip level, or is empty.
    pub fn create_texture(
        &self,
        description: &TextureDescription,
        initial_data: &[&[u8]],
        debug_name: &str,
    ) -> Result<TextureHandle, CreateError> {
        let mut state = self.state_for_mutation();
        let result = validate_texture(description, initial_data, &self.description.capabilities)
            .and_then(|_| Ok(state.backend.create_texture(description, initial_data, debug_name)?));
        let native = result.inspect_err(|e| self.log_failure("texture", debug_name, e))?;
        let id = state.textures.insert(TextureRecord {
            description: *description,
            native: Some(native),
            proxy: None,
        });
        Ok(TextureHandle(id))
    }

    /// Creates a view of one slice of `parent`, typed [`TextureType::Texture2DProxy`].
    pub fn create_proxy_texture(&self, parent: TextureHandle, slice: u16) -> Result<TextureHandle, CreateError> {
        let mut state = self.state_for_mutation();
        let parent_description = match state.textures.get(parent.0) {
            Some(record) if record.proxy.is_none() => record.description,
            _ => {
                let e = CreateError::InvalidProxyParent;
                self.log_failure("proxy texture", "", &e);
                return Err(e);
            }
        };
        if slice as u32 >= parent_description.slice_count() {
            let e = CreateError::ProxySliceOutOfRange { slice, slices: parent_description.slice_count() };
            self.log_failure("proxy texture", "", &e);
            return Err(e);
        }
        let id = state.textures.insert(TextureRecord {
            description: TextureDescription {
                texture_type: TextureType::Texture2DProxy,
                array_size: 1,
                ..parent_description
            },
            native: None,
            proxy: Some(ProxyTexture { parent, slice }),
        });
        Ok(TextureHandle(id))
    }

    pub fn destroy_texture(&self, handle: TextureHandle) {
        let mut state = self.state_for_mutation();
        let live = state.textures.contains(handle.0);
        state.queue_unshared(ObjectType::Texture, handle.0, live);
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<TextureDescription> {
        self.state().textures.get(handle.0).map(|record| record.description)
    }

    /// The parent and slice of a proxy texture.  `None` for other textures.
    pub fn proxy_texture(&self, handle: TextureHandle) -> Option<ProxyTexture> {
        self.state().textures.get(handle.0).and_then(|record| record.proxy)
    }

    /// Runs `f` on the texture's native object.  Proxies have none.
    pub fn with_native_texture<R>(&self, handle: TextureHandle, f: impl FnOnce(&NativeObject) -> R) -> Option<R> {
        self.state()
            .textures
            .get(handle.0)
            .and_then(|record| record.native.as_ref())
            .map(f)
    }

    /// Creates a dynamic buffer.  Its GPU buffers are created on first upload.
    ///
    /// # Panics
    /// If `description.struct_size` is 0.
    pub fn create_dynamic_buffer(&self, description: &BufferDescription, debug_name: &str) -> DynamicBufferHandle {
        let buffer = Arc::new(DynamicBuffer::new(description, debug_name));
        DynamicBufferHandle(self.state_for_mutation().dynamic_buffers.insert(buffer))
    }

    /// Queues the dynamic buffer and, at the frame boundary, its GPU buffers for destruction.
    pub fn destroy_dynamic_buffer(&self, handle: DynamicBufferHandle) {
        let mut state = self.state_for_mutation();
        let live = state.dynamic_buffers.contains(handle.0);
        state.queue_unshared(ObjectType::DynamicBuffer, handle.0, live);
    }

    pub fn dynamic_buffer(&self, handle: DynamicBufferHandle) -> Option<Arc<DynamicBuffer>> {
        self.state().dynamic_buffers.get(handle.0).cloned()
    }

    /// Reference count of a shared state object.  Buffers, textures and dynamic buffers are
    /// not shared; they report 1 while live and 0 once queued for destruction.
    pub fn ref_count(&self, handle: impl Into<AnyHandle>) -> Option<u32> {
        let AnyHandle { object_type, id } = handle.into();
        let state = self.state();
        let unshared = |live: bool| live.then(|| u32::from(!state.dead_objects.contains(object_type, id)));
        match object_type {
            ObjectType::Buffer => unshared(state.buffers.contains(id)),
            ObjectType::Texture => unshared(state.textures.contains(id)),
            ObjectType::DynamicBuffer => unshared(state.dynamic_buffers.contains(id)),
            ObjectType::SamplerState => state.samplers.get(id).map(|r| r.ref_count),
            ObjectType::BlendState => state.blend_states.get(id).map(|r| r.ref_count),
            ObjectType::DepthStencilState => state.depth_stencil_states.get(id).map(|r| r.ref_count),
            ObjectType::RasterizerState => state.rasterizer_states.get(id).map(|r| r.ref_count),
            ObjectType::Shader => state.shaders.get(id).map(|r| r.ref_count),
            ObjectType::BindGroupLayout => state.bind_group_layouts.get(id).map(|r| r.ref_count),
            ObjectType::GraphicsPipeline => state.graphics_pipelines.get(id).map(|r| r.ref_count),
        }
    }

    /// Whether the object is queued for destruction at the next frame boundary.
    pub fn is_pending_destruction(&self, handle: impl Into<AnyHandle>) -> bool {
        let AnyHandle { object_type, id } = handle.into();
        self.state().dead_objects.contains(object_type, id)
    }

    /// Number of objects queued for destruction.
    pub fn dead_object_count(&self) -> usize {
        self.state().dead_objects.len()
    }

    /// Number of live objects across all tables, including fallbacks and immutable samplers.
    pub fn live_object_count(&self) -> usize {
        self.state().live_object_count()
    }

    pub fn fallback_buffer(&self, resource_type: ShaderResourceType) -> BufferHandle {
        self.state()
            .fallbacks
            .as_ref()
            .and_then(|f| f.fallback_buffer(resource_type))
            .unwrap_or_default()
    }

    pub fn fallback_texture(
        &self,
        resource_type: ShaderResourceType,
        texture_type: ShaderTextureType,
        depth: bool,
    ) -> TextureHandle {
        self.state()
            .fallbacks
            .as_ref()
            .and_then(|f| f.fallback_texture(resource_type, texture_type, depth))
            .unwrap_or_default()
    }

    pub fn immutable_samplers(&self) -> Vec<(SamplerType, SamplerStateHandle)> {
        self.state().immutable_samplers.clone()
    }

    pub fn immutable_sampler(&self, sampler_type: SamplerType) -> SamplerStateHandle {
        self.state()
            .immutable_samplers
            .iter()
            .find(|(t, _)| *t == sampler_type)
            .map(|(_, handle)| *handle)
            .unwrap_or_default()
    }

    pub fn frame_index(&self) -> u64 {
        self.state().frame
    }

    /// Starts a frame.  Dynamic buffers publish their latest upload for rendering.
    pub fn begin_frame(&self) {
        let dynamic_buffers: Vec<Arc<DynamicBuffer>> = {
            let mut state = self.state_for_mutation();
            debug_assert!(!state.in_frame, "begin_frame called twice");
            state.in_frame = true;
            state.frame += 1;
            state.dynamic_buffers.iter().map(|(_, buffer)| buffer.clone()).collect()
        };
        for buffer in dynamic_buffers {
            buffer.swap_buffers();
        }
    }

    /// Ends a frame and destroys everything queued since the last frame boundary.
    pub fn end_frame(&self) {
        {
            let mut state = self.state_for_mutation();
            debug_assert!(state.in_frame, "end_frame called without begin_frame");
            state.in_frame = false;
        }
        let destroyed = self.destroy_dead_objects();
        if self.description.debug_device && destroyed > 0 {
            logwise::trace_sync!("destroyed {count} dead objects", count = destroyed);
        }
    }

    fn destroy_dead_objects(&self) -> usize {
        let sweep = logwise::perfwarn_begin!("Device::destroy_dead_objects");
        let mut destroyed = 0;
        loop {
            let dynamic = {
                let mut state = self.state();
                let dead = state.dead_objects.take();
                if dead.is_empty() {
                    break;
                }
                let mut dynamic = Vec::new();
                for object in dead {
                    destroyed += 1;
                    state.destroy_dead(object, &mut dynamic);
                }
                dynamic
            };
            //queues their GPU buffers, which the next pass picks up
            for buffer in dynamic {
                buffer.deinitialize(self);
            }
        }
        drop(sweep);
        destroyed
    }

    /// Destroys fallbacks and immutable samplers, drains the destruction queue
    /// and reports anything the application leaked.
    pub fn shutdown(&self) {
        let (fallbacks, immutable_samplers) = {
            let mut state = self.state_for_mutation();
            (state.fallbacks.take(), std::mem::take(&mut state.immutable_samplers))
        };
        if let Some(fallbacks) = fallbacks {
            fallbacks.destroy(self);
        }
        for (_, sampler) in immutable_samplers {
            self.destroy_sampler_state(sampler);
        }
        self.destroy_dead_objects();

        let state = self.state();
        let leaks = [
            ("buffers", state.buffers.len()),
            ("textures", state.textures.len()),
            ("dynamic buffers", state.dynamic_buffers.len()),
            ("sampler states", state.samplers.len()),
            ("blend states", state.blend_states.len()),
            ("depth stencil states", state.depth_stencil_states.len()),
            ("rasterizer states", state.rasterizer_states.len()),
            ("shaders", state.shaders.len()),
            ("bind group layouts", state.bind_group_layouts.len()),
            ("graphics pipelines", state.graphics_pipelines.len()),
        ];
        for (kind, count) in leaks {
            if count > 0 {
                logwise::warn_sync!(
                    "{count} {kind} have not been cleaned up",
                    count = count,
                    kind = logwise::privacy::LogIt(kind)
                );
            }
        }
    }
}
