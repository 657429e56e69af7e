// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::pixel_formats::ResourceFormat;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the backend refused to create {what}")]
    CreationRefused { what: &'static str },
    #[error("format {0:?} has no native equivalent")]
    UnsupportedFormat(ResourceFormat),
}
