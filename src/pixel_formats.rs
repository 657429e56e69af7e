// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Runtime resource format definitions.
//!
//! Buffers, textures and format overrides in bind groups all carry a [`ResourceFormat`].
//! The bind group validator compares formats by their bit layout, so every format
//! reports its size per element and its channel count.
//!
//! # Examples
//!
//! ```
//! use bindings_and_buffers::pixel_formats::ResourceFormat;
//!
//! let f = ResourceFormat::RGBAHalf;
//! assert_eq!(f.bits_per_element(), 64);
//! assert_eq!(f.channel_count(), 4);
//! assert!(!f.is_depth());
//! ```

/*
A closed enum rather than one type per format: descriptions are stored in hash maps,
compared at runtime, and overridden per binding, so the format has to be a value.
*/

/// Format of a texture's texels or a texel buffer's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceFormat {
    /// No format. Buffers that are not texel buffers use this.
    #[default]
    Invalid,

    RGBAFloat,
    RGBFloat,
    RGFloat,
    RFloat,

    RGBAUInt,
    RUInt,
    RInt,

    RGBAHalf,
    RGHalf,
    RHalf,

    RGBAUShortNormalized,
    RUShort,

    RGBAUByteNormalized,
    RGBAUByteNormalizedsRGB,
    BGRAUByteNormalized,
    BGRAUByteNormalizedsRGB,
    RUByteNormalized,

    D16,
    D24S8,
    D32Float,
}

impl ResourceFormat {
    /// Size of one element in bits.
    pub const fn bits_per_element(self) -> u32 {
        use ResourceFormat::*;
        match self {
            Invalid => 0,
            RGBAFloat | RGBAUInt => 128,
            RGBFloat => 96,
            RGFloat | RGBAHalf | RGBAUShortNormalized => 64,
            RFloat | RUInt | RInt | RGHalf | RGBAUByteNormalized | RGBAUByteNormalizedsRGB
            | BGRAUByteNormalized | BGRAUByteNormalizedsRGB | D24S8 | D32Float => 32,
            RHalf | RUShort | D16 => 16,
            RUByteNormalized => 8,
        }
    }

    pub const fn channel_count(self) -> u32 {
        use ResourceFormat::*;
        match self {
            Invalid => 0,
            RGBAFloat | RGBAUInt | RGBAHalf | RGBAUShortNormalized | RGBAUByteNormalized
            | RGBAUByteNormalizedsRGB | BGRAUByteNormalized | BGRAUByteNormalizedsRGB => 4,
            RGBFloat => 3,
            RGFloat | RGHalf | D24S8 => 2,
            RFloat | RUInt | RInt | RHalf | RUShort | RUByteNormalized | D16 | D32Float => 1,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(self, ResourceFormat::D16 | ResourceFormat::D24S8 | ResourceFormat::D32Float)
    }

    pub const fn is_srgb(self) -> bool {
        matches!(
            self,
            ResourceFormat::RGBAUByteNormalizedsRGB | ResourceFormat::BGRAUByteNormalizedsRGB
        )
    }

    /// Whether the format can describe the elements of a texel buffer.
    pub const fn is_texel_buffer_format(self) -> bool {
        !matches!(self, ResourceFormat::Invalid) && !self.is_depth() && !self.is_srgb()
    }

    /// Size of one element in bytes, rounded down.
    pub const fn bytes_per_element(self) -> u32 {
        self.bits_per_element() / 8
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceFormat;

    #[test]
    fn reinterpretable_formats_share_layout() {
        let a = ResourceFormat::RGBAUByteNormalized;
        let b = ResourceFormat::RGBAUByteNormalizedsRGB;
        assert_eq!(a.bits_per_element(), b.bits_per_element());
        assert_eq!(a.channel_count(), b.channel_count());
        assert_ne!(
            ResourceFormat::RFloat.channel_count(),
            ResourceFormat::RGHalf.channel_count()
        );
    }

    #[test]
    fn texel_buffer_formats() {
        assert!(ResourceFormat::RUInt.is_texel_buffer_format());
        assert!(!ResourceFormat::Invalid.is_texel_buffer_format());
        assert!(!ResourceFormat::D32Float.is_texel_buffer_format());
        assert!(!ResourceFormat::BGRAUByteNormalizedsRGB.is_texel_buffer_format());
        assert_eq!(ResourceFormat::RUInt.bytes_per_element(), 4);
    }
}
