// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use bindings_and_buffers::bindings::bind_group::{BindGroupCreationDescription, BindGroupItem, BufferView, TextureView};
use bindings_and_buffers::bindings::resource_binding::{
    BindGroupLayoutDescription, ShaderResourceBinding, ShaderResourceType, ShaderTextureType,
};
use bindings_and_buffers::bindings::sampler::SamplerType;
use bindings_and_buffers::bindings::validation::{BindingViolation, Violation, validate};
use bindings_and_buffers::bindings::visible_to::BufferUsageFlags;
use bindings_and_buffers::images::descriptors::{
    BufferDescription, BufferRange, MsaaSampleCount, TextureDescription, TextureRange, TextureType,
};
use bindings_and_buffers::images::handles::{
    BindGroupLayoutHandle, BufferHandle, SamplerStateHandle, TextureHandle,
};
use bindings_and_buffers::pixel_formats::ResourceFormat;
use bindings_and_buffers::{Device, DeviceDescription};

fn single(device: &Device, binding: ShaderResourceBinding, item: BindGroupItem) -> BindGroupCreationDescription {
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescription::new(vec![binding]))
        .unwrap();
    BindGroupCreationDescription { layout, items: vec![item] }
}

fn buffer(device: &Device, description: BufferDescription) -> BufferHandle {
    device.create_buffer(&description, &[], "buffer").unwrap()
}

fn constant_buffer(device: &Device) -> BufferHandle {
    buffer(
        device,
        BufferDescription {
            total_size: 256,
            usage: BufferUsageFlags::CONSTANT_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
            immutable: false,
            ..Default::default()
        },
    )
}

fn texture(device: &Device, description: TextureDescription) -> TextureHandle {
    device
        .create_texture(
            &TextureDescription { width: 8, height: 8, immutable: false, ..description },
            &[],
            "texture",
        )
        .unwrap()
}

fn buffer_item(buffer: BufferHandle, byte_offset: u32, byte_count: u32) -> BindGroupItem {
    BindGroupItem::buffer(BufferView {
        buffer,
        range: BufferRange { byte_offset, byte_count },
        override_texel_format: ResourceFormat::Invalid,
    })
}

fn texture_item(texture: TextureHandle, base_array_slice: u16, array_slices: u16) -> BindGroupItem {
    BindGroupItem::texture(TextureView {
        texture,
        sampler: SamplerStateHandle::invalid(),
        range: TextureRange { base_array_slice, array_slices, base_mip_level: 0, mip_levels: 1 },
        override_view_format: ResourceFormat::Invalid,
    })
}

fn binding_violation(result: Result<(), Violation>) -> BindingViolation {
    match result {
        Err(Violation::Binding { kind, .. }) => kind,
        other => panic!("expected a binding violation, got {other:?}"),
    }
}

#[test]
fn unresolved_layouts_are_reported() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let description = BindGroupCreationDescription { layout: BindGroupLayoutHandle::invalid(), items: Vec::new() };
    assert_eq!(validate(&description, &device), Err(Violation::InvalidLayout));
}

#[test]
fn violations_name_the_binding() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let sampler = device.immutable_sampler(SamplerType::Linear);
    let description = single(
        &device,
        ShaderResourceBinding::new("Globals", 0, ShaderResourceType::ConstantBuffer),
        BindGroupItem::sampler(sampler),
    );
    let Err(violation) = validate(&description, &device) else {
        panic!("a sampler cannot fill a constant buffer binding");
    };
    assert_eq!(
        violation,
        Violation::Binding {
            index: 0,
            name: "Globals".into(),
            kind: BindingViolation::KindMismatch { expected: "buffer", actual: "sampler" },
        }
    );
    assert!(violation.to_string().contains("'Globals'"));
}

#[test]
fn constant_buffers_are_bound_whole() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let constants = constant_buffer(&device);
    let binding = ShaderResourceBinding::new("Globals", 0, ShaderResourceType::ConstantBuffer);

    let whole = single(&device, binding.clone(), buffer_item(constants, 0, 256));
    assert_eq!(validate(&whole, &device), Ok(()));

    let partial = single(&device, binding, buffer_item(constants, 0, 128));
    assert_eq!(
        binding_violation(validate(&partial, &device)),
        BindingViolation::ConstantBufferCount { count: 128, total_size: 256 }
    );
}

#[test]
#[cfg(any(debug_assertions, feature = "validation"))]
#[should_panic(expected = "constant buffers not supported")]
fn constant_buffer_offsets_panic() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let constants = constant_buffer(&device);
    let description = single(
        &device,
        ShaderResourceBinding::new("Globals", 0, ShaderResourceType::ConstantBuffer),
        buffer_item(constants, 16, 240),
    );
    description.assert_valid_description(&device);
}

#[test]
#[cfg(any(debug_assertions, feature = "validation"))]
#[should_panic(expected = "cube bindings must view 6 slices")]
fn partial_cube_views_panic() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let cube = texture(&device, TextureDescription { texture_type: TextureType::TextureCube, ..Default::default() });
    let description = single(
        &device,
        ShaderResourceBinding::new("Sky", 0, ShaderResourceType::Texture).with_texture_type(ShaderTextureType::TextureCube),
        texture_item(cube, 0, 3),
    );
    description.assert_valid_description(&device);
}

#[test]
fn buffer_usage_must_match_the_binding() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let read_only = buffer(
        &device,
        BufferDescription {
            total_size: 256,
            struct_size: 16,
            usage: BufferUsageFlags::STRUCTURED_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
            immutable: false,
            ..Default::default()
        },
    );

    let rw = single(
        &device,
        ShaderResourceBinding::new("Particles", 0, ShaderResourceType::StructuredBufferRW),
        buffer_item(read_only, 0, 256),
    );
    assert_eq!(
        binding_violation(validate(&rw, &device)),
        BindingViolation::MissingUsage("UnorderedAccess")
    );

    let unaligned = single(
        &device,
        ShaderResourceBinding::new("Particles", 0, ShaderResourceType::StructuredBuffer),
        buffer_item(read_only, 8, 240),
    );
    assert_eq!(
        binding_violation(validate(&unaligned, &device)),
        BindingViolation::UnalignedOffset { offset: 8, element_size: 16 }
    );

    let overrun = single(
        &device,
        ShaderResourceBinding::new("Particles", 0, ShaderResourceType::StructuredBuffer),
        buffer_item(read_only, 32, 256),
    );
    assert_eq!(
        binding_violation(validate(&overrun, &device)),
        BindingViolation::RangeOutOfBounds { offset: 32, count: 256, size: 256 }
    );

    let mut reinterpreted = buffer_item(read_only, 0, 256);
    if let bindings_and_buffers::bindings::bind_group::BindGroupResource::Buffer(view) = &mut reinterpreted.resource {
        view.override_texel_format = ResourceFormat::RFloat;
    }
    let reinterpreted = single(
        &device,
        ShaderResourceBinding::new("Particles", 0, ShaderResourceType::StructuredBuffer),
        reinterpreted,
    );
    assert_eq!(
        binding_violation(validate(&reinterpreted, &device)),
        BindingViolation::OverrideOnNonTexelBuffer
    );
}

#[test]
fn texel_views_use_the_override_element_size() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let texels = buffer(
        &device,
        BufferDescription {
            total_size: 256,
            format: ResourceFormat::RGBAFloat,
            usage: BufferUsageFlags::TEXEL_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
            immutable: false,
            ..Default::default()
        },
    );
    let binding = ShaderResourceBinding::new("Texels", 0, ShaderResourceType::TexelBuffer);

    //4 bytes is not a multiple of RGBAFloat's 16
    let view = buffer_item(texels, 4, 16);
    assert_eq!(
        binding_violation(validate(&single(&device, binding.clone(), view), &device)),
        BindingViolation::UnalignedOffset { offset: 4, element_size: 16 }
    );

    let view = BindGroupItem::buffer(BufferView {
        buffer: texels,
        range: BufferRange { byte_offset: 4, byte_count: 16 },
        override_texel_format: ResourceFormat::RFloat,
    });
    assert_eq!(validate(&single(&device, binding, view), &device), Ok(()));
}

#[test]
fn texture_views_are_checked_against_the_texture() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let color = texture(&device, TextureDescription { format: ResourceFormat::RGBAUByteNormalized, ..Default::default() });
    let plain = ShaderResourceBinding::new("Color", 0, ShaderResourceType::Texture).with_texture_type(ShaderTextureType::Texture2D);

    assert_eq!(validate(&single(&device, plain.clone(), texture_item(color, 0, 1)), &device), Ok(()));

    let msaa = ShaderResourceBinding::new("Color", 0, ShaderResourceType::Texture)
        .with_texture_type(ShaderTextureType::Texture2DMS);
    assert_eq!(
        binding_violation(validate(&single(&device, msaa, texture_item(color, 0, 1)), &device)),
        BindingViolation::MsaaMismatch
    );

    let rw = ShaderResourceBinding::new("Color", 0, ShaderResourceType::TextureRW)
        .with_texture_type(ShaderTextureType::Texture2D);
    assert_eq!(
        binding_violation(validate(&single(&device, rw, texture_item(color, 0, 1)), &device)),
        BindingViolation::MissingTexturePermission("unordered access")
    );

    let mut reformatted = texture_item(color, 0, 1);
    if let bindings_and_buffers::bindings::bind_group::BindGroupResource::Texture(view) = &mut reformatted.resource {
        view.override_view_format = ResourceFormat::RGBAFloat;
    }
    assert!(matches!(
        binding_violation(validate(&single(&device, plain.clone(), reformatted), &device)),
        BindingViolation::OverrideBits { .. }
    ));

    let sampled = ShaderResourceBinding::new("Color", 0, ShaderResourceType::TextureAndSampler)
        .with_texture_type(ShaderTextureType::Texture2D);
    assert_eq!(
        binding_violation(validate(&single(&device, sampled, texture_item(color, 0, 1)), &device)),
        BindingViolation::InvalidSampler
    );

    let layers = texture(
        &device,
        TextureDescription { texture_type: TextureType::Texture2DArray, array_size: 4, ..Default::default() },
    );
    let array = ShaderResourceBinding::new("Layers", 0, ShaderResourceType::Texture)
        .with_texture_type(ShaderTextureType::Texture2DArray);
    assert_eq!(
        binding_violation(validate(&single(&device, array.clone(), texture_item(layers, 2, 3)), &device)),
        BindingViolation::SliceRangeOutOfBounds { base: 2, count: 3, slices: 4 }
    );
    assert_eq!(
        binding_violation(validate(&single(&device, array, texture_item(layers, 0, 0)), &device)),
        BindingViolation::ZeroArraySlices
    );
    assert_eq!(
        binding_violation(validate(&single(&device, plain, texture_item(layers, 0, 2)), &device)),
        BindingViolation::NonArraySlices { expected: 1, actual: 2 }
    );
}

#[test]
fn proxies_must_be_resolved_before_binding() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let layers = texture(
        &device,
        TextureDescription { texture_type: TextureType::Texture2DArray, array_size: 2, ..Default::default() },
    );
    let proxy = device.create_proxy_texture(layers, 1).unwrap();
    let binding = ShaderResourceBinding::new("Layer", 0, ShaderResourceType::Texture)
        .with_texture_type(ShaderTextureType::Texture2D);
    assert_eq!(
        binding_violation(validate(&single(&device, binding, texture_item(proxy, 0, 1)), &device)),
        BindingViolation::UnresolvedProxy
    );
}

#[test]
fn destroyed_resources_fail_after_the_frame() {
    let (device, _probe) = Device::headless(DeviceDescription::default()).unwrap();
    let multisampled = texture(
        &device,
        TextureDescription {
            sample_count: MsaaSampleCount::FourSamples,
            allow_render_target_view: true,
            ..Default::default()
        },
    );
    let binding = ShaderResourceBinding::new("Resolve", 0, ShaderResourceType::Texture)
        .with_texture_type(ShaderTextureType::Texture2DMS);
    let description = single(&device, binding, texture_item(multisampled, 0, 1));
    assert_eq!(validate(&description, &device), Ok(()));

    //still valid until the frame boundary
    device.destroy_texture(multisampled);
    assert_eq!(validate(&description, &device), Ok(()));
    device.begin_frame();
    device.end_frame();
    assert_eq!(binding_violation(validate(&description, &device)), BindingViolation::InvalidTexture);
}
