// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::Error;
use crate::pixel_formats::ResourceFormat;

pub fn wgpu_format(format: ResourceFormat) -> Result<wgpu::TextureFormat, Error> {
    use wgpu::TextureFormat as T;
    Ok(match format {
        ResourceFormat::RGBAFloat => T::Rgba32Float,
        ResourceFormat::RGFloat => T::Rg32Float,
        ResourceFormat::RFloat => T::R32Float,
        ResourceFormat::RGBAUInt => T::Rgba32Uint,
        ResourceFormat::RUInt => T::R32Uint,
        ResourceFormat::RInt => T::R32Sint,
        ResourceFormat::RGBAHalf => T::Rgba16Float,
        ResourceFormat::RGHalf => T::Rg16Float,
        ResourceFormat::RHalf => T::R16Float,
        ResourceFormat::RGBAUShortNormalized => T::Rgba16Unorm,
        ResourceFormat::RUShort => T::R16Uint,
        ResourceFormat::RGBAUByteNormalized => T::Rgba8Unorm,
        ResourceFormat::RGBAUByteNormalizedsRGB => T::Rgba8UnormSrgb,
        ResourceFormat::BGRAUByteNormalized => T::Bgra8Unorm,
        ResourceFormat::BGRAUByteNormalizedsRGB => T::Bgra8UnormSrgb,
        ResourceFormat::RUByteNormalized => T::R8Unorm,
        ResourceFormat::D16 => T::Depth16Unorm,
        ResourceFormat::D24S8 => T::Depth24PlusStencil8,
        ResourceFormat::D32Float => T::Depth32Float,
        //no three-channel formats in wgpu
        ResourceFormat::RGBFloat | ResourceFormat::Invalid => return Err(Error::UnsupportedFormat(format)),
    })
}
