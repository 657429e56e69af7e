// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use bindings_and_buffers::bindings::visible_to::BufferUsageFlags;
use bindings_and_buffers::images::descriptors::{
    BlendFactor, BlendStateDescription, BufferDescription, CullMode, DepthStencilStateDescription,
    GraphicsPipelineDescription, RasterizerStateDescription, ShaderDescription, TextureDescription, TextureType,
};
use bindings_and_buffers::images::handles::{BufferHandle, GraphicsPipelineHandle, ShaderHandle};
use bindings_and_buffers::pixel_formats::ResourceFormat;
use bindings_and_buffers::{Capabilities, CreateError, Device, DeviceDescription};

fn pipeline_description(device: &Device, name: &str) -> GraphicsPipelineDescription {
    GraphicsPipelineDescription {
        shader: device
            .create_shader(&ShaderDescription { name: name.to_owned(), byte_code: vec![1, 2, 3] })
            .unwrap(),
        blend_state: device
            .create_blend_state(&BlendStateDescription {
                blending_enabled: true,
                source_blend: BlendFactor::SrcAlpha,
                dest_blend: BlendFactor::InvSrcAlpha,
                ..Default::default()
            })
            .unwrap(),
        depth_stencil_state: device
            .create_depth_stencil_state(&DepthStencilStateDescription { depth_write: false, ..Default::default() })
            .unwrap(),
        rasterizer_state: device
            .create_rasterizer_state(&RasterizerStateDescription { cull_mode: CullMode::Front, ..Default::default() })
            .unwrap(),
        ..Default::default()
    }
}

fn dependency_counts(device: &Device, pipeline: &GraphicsPipelineDescription) -> [Option<u32>; 4] {
    [
        device.ref_count(pipeline.shader),
        device.ref_count(pipeline.blend_state),
        device.ref_count(pipeline.depth_stencil_state),
        device.ref_count(pipeline.rasterizer_state),
    ]
}

fn destroy_dependencies(device: &Device, pipeline: &GraphicsPipelineDescription) {
    device.destroy_shader(pipeline.shader);
    device.destroy_blend_state(pipeline.blend_state);
    device.destroy_depth_stencil_state(pipeline.depth_stencil_state);
    device.destroy_rasterizer_state(pipeline.rasterizer_state);
}

#[test]
fn pipeline_holds_its_dependencies() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let description = pipeline_description(&device, "forward");
    let pipeline = device.create_graphics_pipeline(&description).unwrap();
    assert_eq!(device.ref_count(pipeline), Some(1));
    assert_eq!(dependency_counts(&device, &description), [Some(2); 4]);

    //pipeline first
    device.destroy_graphics_pipeline(pipeline);
    assert_eq!(dependency_counts(&device, &description), [Some(1); 4]);
    destroy_dependencies(&device, &description);
    assert_eq!(dependency_counts(&device, &description), [Some(0); 4]);
    assert_eq!(device.ref_count(pipeline), Some(0));
    assert!(device.graphics_pipeline(pipeline).is_some());
    assert!(device.shader(description.shader).is_some());

    device.begin_frame();
    device.end_frame();
    assert_eq!(dependency_counts(&device, &description), [None; 4]);
    assert!(device.graphics_pipeline(pipeline).is_none());
    assert!(device.shader(description.shader).is_none());
    assert_eq!(device.dead_object_count(), 0);
}

#[test]
fn dependencies_outlive_their_own_destroy() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let description = pipeline_description(&device, "deferred");
    let pipeline = device.create_graphics_pipeline(&description).unwrap();

    //dependencies first
    destroy_dependencies(&device, &description);
    assert_eq!(dependency_counts(&device, &description), [Some(1); 4]);
    assert!(!device.is_pending_destruction(description.shader));

    device.begin_frame();
    device.end_frame();
    assert!(device.shader(description.shader).is_some());

    device.destroy_graphics_pipeline(pipeline);
    assert_eq!(dependency_counts(&device, &description), [Some(0); 4]);
    assert!(device.is_pending_destruction(description.rasterizer_state));
    device.begin_frame();
    device.end_frame();
    assert_eq!(dependency_counts(&device, &description), [None; 4]);
}

#[test]
fn recreating_revives_instead_of_recreating() {
    let (device, probe) = Device::headless(DeviceDescription::default()).unwrap();
    let live = device.live_object_count();
    let description = pipeline_description(&device, "hot reload");
    let pipeline = device.create_graphics_pipeline(&description).unwrap();
    device.destroy_graphics_pipeline(pipeline);
    destroy_dependencies(&device, &description);
    assert_eq!(device.dead_object_count(), 5);

    //same description, same frame
    let again = device.create_graphics_pipeline(&description).unwrap();
    assert_eq!(again, pipeline);
    assert_eq!(device.ref_count(again), Some(1));
    assert_eq!(dependency_counts(&device, &description), [Some(1); 4]);
    assert!(!device.is_pending_destruction(again));
    assert!(!device.is_pending_destruction(description.shader));
    assert_eq!(device.dead_object_count(), 0);

    let destroyed = probe.stats().objects_destroyed;
    device.begin_frame();
    device.end_frame();
    assert!(device.graphics_pipeline(again).is_some());
    assert_eq!(probe.stats().objects_destroyed, destroyed);
    assert_eq!(device.live_object_count(), live + 5);

    device.destroy_graphics_pipeline(again);
    device.begin_frame();
    device.end_frame();
    assert_eq!(device.live_object_count(), live);
}

#[test]
fn identical_state_objects_are_shared() {
    let (device, probe) = Device::headless(DeviceDescription::default()).unwrap();
    let shader = ShaderDescription { name: "sky".into(), byte_code: vec![9; 16] };
    let a = device.create_shader(&shader).unwrap();
    let b = device.create_shader(&shader).unwrap();
    assert_eq!(a, b);
    assert_eq!(device.ref_count(a), Some(2));

    let other = device
        .create_shader(&ShaderDescription { name: "sky".into(), byte_code: vec![8; 16] })
        .unwrap();
    assert_ne!(a, other);

    //dedup happens before the backend is asked
    let samplers = probe.stats().samplers_created;
    let sampler = device.immutable_samplers()[0].1;
    let description = device.sampler_state(sampler).unwrap();
    assert_eq!(device.create_sampler_state(&description).unwrap(), sampler);
    assert_eq!(probe.stats().samplers_created, samplers);
    device.destroy_sampler_state(sampler);

    device.destroy_shader(a);
    assert_eq!(device.ref_count(b), Some(1));
    assert!(!device.is_pending_destruction(b));
    device.destroy_shader(b);
    device.destroy_shader(other);
    assert!(device.is_pending_destruction(a));
}

#[test]
fn invalid_descriptions_are_refused() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let live = device.live_object_count();

    let empty = BufferDescription { total_size: 0, immutable: false, ..Default::default() };
    assert!(matches!(device.create_buffer(&empty, &[], "empty"), Err(CreateError::ZeroSizedBuffer)));

    let immutable = BufferDescription { total_size: 64, ..Default::default() };
    assert!(matches!(
        device.create_buffer(&immutable, &[], "immutable"),
        Err(CreateError::ImmutableWithoutData(_))
    ));
    assert!(matches!(
        device.create_buffer(&immutable, &[0; 32], "short"),
        Err(CreateError::InitialDataSize { expected: 64, actual: 32 })
    ));

    let texel = BufferDescription {
        total_size: 64,
        usage: BufferUsageFlags::TEXEL_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
        immutable: false,
        ..Default::default()
    };
    assert!(matches!(
        device.create_buffer(&texel, &[], "texel"),
        Err(CreateError::TexelBufferWithoutFormat)
    ));
    let formatted = BufferDescription { format: ResourceFormat::RGBAFloat, ..texel };
    assert!(device.create_buffer(&formatted, &[], "texel").is_ok());
    let uneven = BufferDescription { total_size: 40, ..formatted };
    assert!(matches!(
        device.create_buffer(&uneven, &[], "texel"),
        Err(CreateError::TexelBufferSize { element_size: 16, size: 40, .. })
    ));

    let structured = BufferDescription {
        total_size: 100,
        struct_size: 12,
        usage: BufferUsageFlags::STRUCTURED_BUFFER,
        immutable: false,
        ..Default::default()
    };
    assert!(matches!(
        device.create_buffer(&structured, &[], "structured"),
        Err(CreateError::StructuredBufferSize { size: 100, struct_size: 12 })
    ));

    let flat = TextureDescription { width: 0, height: 4, immutable: false, ..Default::default() };
    assert!(matches!(device.create_texture(&flat, &[], "flat"), Err(CreateError::ZeroSizedTexture)));
    let array = TextureDescription { width: 4, height: 4, array_size: 3, immutable: false, ..Default::default() };
    assert!(matches!(
        device.create_texture(&array, &[], "array"),
        Err(CreateError::ArraySizeOnNonArrayTexture(3))
    ));

    assert!(matches!(
        device.create_graphics_pipeline(&GraphicsPipelineDescription::default()),
        Err(CreateError::MissingDependency(_))
    ));

    //one valid texel buffer got through
    assert_eq!(device.live_object_count(), live + 1);
}

#[test]
fn backend_failures_leave_no_trace() {
    let (device, probe) = Device::headless(DeviceDescription::default()).unwrap();
    let live = device.live_object_count();
    let description = BufferDescription { total_size: 256, immutable: false, ..Default::default() };

    probe.refuse_creation(true);
    assert!(matches!(device.create_buffer(&description, &[], "oom"), Err(CreateError::Backend(_))));
    let texture = TextureDescription { width: 8, height: 8, immutable: false, ..Default::default() };
    assert!(matches!(device.create_texture(&texture, &[], "oom"), Err(CreateError::Backend(_))));
    assert_eq!(device.live_object_count(), live);

    probe.refuse_creation(false);
    let buffer = device.create_buffer(&description, &[], "fine").unwrap();
    assert_eq!(device.buffer(buffer), Some(description));
}

#[test]
fn destroying_unknown_handles_only_warns() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    device.destroy_buffer(BufferHandle::invalid());
    device.destroy_shader(ShaderHandle::invalid());
    device.destroy_graphics_pipeline(GraphicsPipelineHandle::invalid());
    assert_eq!(device.dead_object_count(), 0);
    assert_eq!(device.ref_count(BufferHandle::invalid()), None);
}

#[test]
fn stale_handles_stop_resolving() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let description = BufferDescription { total_size: 64, immutable: false, ..Default::default() };
    let old = device.create_buffer(&description, &[], "old").unwrap();
    device.destroy_buffer(old);
    assert_eq!(device.ref_count(old), Some(0));
    assert!(device.buffer(old).is_some());

    device.begin_frame();
    device.end_frame();
    assert!(device.buffer(old).is_none());
    assert_eq!(device.ref_count(old), None);

    //the freed slot is reused under a new generation
    let new = device.create_buffer(&description, &[], "new").unwrap();
    assert_eq!(new.id().index(), old.id().index());
    assert_ne!(new, old);
    assert!(device.buffer(old).is_none());
    device.destroy_buffer(old);
    assert!(!device.is_pending_destruction(new));
    assert_eq!(device.ref_count(new), Some(1));
}

#[test]
fn proxy_textures_view_one_slice() {
    let (device, probe) = Device::headless(DeviceDescription::default()).unwrap();
    let parent = device
        .create_texture(
            &TextureDescription {
                width: 64,
                height: 64,
                array_size: 4,
                format: ResourceFormat::RGBAUByteNormalized,
                texture_type: TextureType::Texture2DArray,
                immutable: false,
                ..Default::default()
            },
            &[],
            "atlas",
        )
        .unwrap();
    let textures = probe.stats().textures_created;

    let proxy = device.create_proxy_texture(parent, 2).unwrap();
    assert_eq!(probe.stats().textures_created, textures);
    let view = device.proxy_texture(proxy).unwrap();
    assert_eq!(view.parent, parent);
    assert_eq!(view.slice, 2);
    assert_eq!(device.texture(proxy).map(|d| d.texture_type), Some(TextureType::Texture2DProxy));
    assert!(device.with_native_texture(proxy, |_| ()).is_none());
    assert!(device.proxy_texture(parent).is_none());

    assert!(matches!(
        device.create_proxy_texture(parent, 4),
        Err(CreateError::ProxySliceOutOfRange { slice: 4, slices: 4 })
    ));
    assert!(matches!(device.create_proxy_texture(proxy, 0), Err(CreateError::InvalidProxyParent)));

    let direct = TextureDescription { width: 4, height: 4, texture_type: TextureType::Texture2DProxy, ..Default::default() };
    assert!(matches!(device.create_texture(&direct, &[], "direct"), Err(CreateError::ProxyDescription)));

    let destroyed = probe.stats().objects_destroyed;
    device.destroy_texture(proxy);
    device.destroy_texture(parent);
    device.begin_frame();
    device.end_frame();
    assert!(device.texture(proxy).is_none());
    assert_eq!(probe.stats().objects_destroyed, destroyed + 1);
}

#[test]
fn shutdown_leaves_nothing_behind() {
    let (device, probe) = Device::headless(DeviceDescription::default()).unwrap();
    let description = pipeline_description(&device, "final");
    let pipeline = device.create_graphics_pipeline(&description).unwrap();
    device.destroy_graphics_pipeline(pipeline);
    destroy_dependencies(&device, &description);
    device.shutdown();
    assert_eq!(device.live_object_count(), 0);
    let stats = probe.stats();
    assert_eq!(stats.objects_destroyed, stats.buffers_created + stats.textures_created + stats.samplers_created);
}

#[test]
#[cfg(debug_assertions)]
fn worker_threads_cannot_create_by_default() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let description = BufferDescription { total_size: 64, immutable: false, ..Default::default() };
    let live = device.live_object_count();
    let outcome = std::thread::scope(|scope| scope.spawn(|| device.create_buffer(&description, &[], "worker")).join());
    let message = outcome.err().and_then(|payload| payload.downcast_ref::<String>().cloned()).unwrap_or_default();
    assert!(message.contains("must be created and destroyed on the main thread"), "{message}");
    assert_eq!(device.live_object_count(), live);
}

#[test]
fn worker_threads_create_with_the_capability() {
    let description = DeviceDescription {
        capabilities: Capabilities { multithreaded_resource_creation: true, ..Default::default() },
        ..Default::default()
    };
    let (device, _probe) = Device::headless(description).unwrap();
    let buffer = BufferDescription { total_size: 64, immutable: false, ..Default::default() };
    let created = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| device.create_buffer(&buffer, &[], "worker").unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect::<Vec<_>>()
    });
    for handle in &created {
        assert_eq!(device.buffer(*handle), Some(buffer));
    }
    std::thread::scope(|scope| {
        for handle in &created {
            scope.spawn(|| device.destroy_buffer(*handle));
        }
    });
    device.begin_frame();
    device.end_frame();
    assert!(created.iter().all(|handle| device.buffer(*handle).is_none()));
}
