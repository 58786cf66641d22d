// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor file interchange.
//!
//! - `.npy` files hold exactly one tensor. Integer and `f64` arrays are
//!   widened to `f32` on read; writes are always `f32`.
//! - Raster images (PNG, TIFF) are read as `yx` (grayscale) or `cyx`
//!   (colour) tensors of raw sample values. Writing splits a multi-channel
//!   tensor into one 16-bit grayscale file per channel, named
//!   `<stem>_c<index>.<ext>`, and refuses values that would not survive.

use crate::{AxisId, Tensor, TensorError};
use ndarray::ArrayD;
use ndarray_npy::{read_npy, write_npy};
use std::path::{Path, PathBuf};

/// File extensions treated as raster images.
const IMAGE_EXTENSIONS: &[&str] = &["png", "tif", "tiff"];

/// Returns `true` if `path` has a raster image extension.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reads a `.npy` file and labels its dimensions with `axes`.
pub fn read_npy_tensor(path: &Path, axes: Vec<AxisId>) -> Result<Tensor, TensorError> {
    let data = read_npy_widened(path)?;
    Tensor::new(axes, data)
}

/// Writes the tensor's data to a `.npy` file as `f32`.
pub fn write_npy_tensor(path: &Path, tensor: &Tensor) -> Result<(), TensorError> {
    write_npy(path, tensor.data()).map_err(|e| TensorError::Npy {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

/// Reads a `.npy` array of any supported element type as `f32`.
fn read_npy_widened(path: &Path) -> Result<ArrayD<f32>, TensorError> {
    let npy_err = |detail: String| TensorError::Npy {
        path: path.display().to_string(),
        detail,
    };

    if let Ok(a) = read_npy::<_, ArrayD<f32>>(path) {
        return Ok(a);
    }
    if let Ok(a) = read_npy::<_, ArrayD<f64>>(path) {
        return Ok(a.mapv(|v| v as f32));
    }
    if let Ok(a) = read_npy::<_, ArrayD<u8>>(path) {
        return Ok(a.mapv(f32::from));
    }
    if let Ok(a) = read_npy::<_, ArrayD<u16>>(path) {
        return Ok(a.mapv(f32::from));
    }
    if let Ok(a) = read_npy::<_, ArrayD<i32>>(path) {
        return Ok(a.mapv(|v| v as f32));
    }
    // Last attempt reports the real error.
    read_npy::<_, ArrayD<i64>>(path)
        .map(|a| a.mapv(|v| v as f32))
        .map_err(|e| npy_err(format!("unsupported or unreadable array: {e}")))
}

/// Reads a raster image as a `yx` or `cyx` tensor with raw intensity values.
///
/// Grayscale images become `yx`. Every other colour type becomes `cyx` with
/// one channel per stored sample, alpha included, so an RGBA file has four
/// channels. No colour type is rescaled: an 8-bit 200 reads as 200.0.
pub fn read_image(path: &Path) -> Result<Tensor, TensorError> {
    let img = image::open(path).map_err(|e| TensorError::Image {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    let (w, h) = (img.width() as usize, img.height() as usize);

    use image::DynamicImage as D;
    match img {
        D::ImageLuma8(buf) => planar(&buf.into_raw(), 1, h, w),
        D::ImageLuma16(buf) => planar(&buf.into_raw(), 1, h, w),
        D::ImageLumaA8(buf) => planar(&buf.into_raw(), 2, h, w),
        D::ImageLumaA16(buf) => planar(&buf.into_raw(), 2, h, w),
        D::ImageRgb8(buf) => planar(&buf.into_raw(), 3, h, w),
        D::ImageRgb16(buf) => planar(&buf.into_raw(), 3, h, w),
        D::ImageRgb32F(buf) => planar(&buf.into_raw(), 3, h, w),
        D::ImageRgba8(buf) => planar(&buf.into_raw(), 4, h, w),
        D::ImageRgba16(buf) => planar(&buf.into_raw(), 4, h, w),
        D::ImageRgba32F(buf) => planar(&buf.into_raw(), 4, h, w),
        other => Err(TensorError::Image {
            path: path.display().to_string(),
            detail: format!("unsupported colour type {:?}", other.color()),
        }),
    }
}

/// Converts interleaved `yxc` samples to a planar `yx` or `cyx` tensor.
fn planar<T: Copy + Into<f32>>(
    raw: &[T],
    channels: usize,
    h: usize,
    w: usize,
) -> Result<Tensor, TensorError> {
    if channels == 1 {
        let values: Vec<f32> = raw.iter().map(|&v| v.into()).collect();
        return Tensor::from_f32(AxisId::parse_compact("yx"), vec![h, w].into(), &values);
    }
    Tensor::from_fn(AxisId::parse_compact("cyx"), &[channels, h, w], |i| {
        raw[(i[1] * w + i[2]) * channels + i[0]].into()
    })
}

/// Writes a tensor with `y`/`x` axes (and optionally `c` and singleton `b`)
/// as 16-bit grayscale images, one file per channel.
///
/// Every value must be an integer in `[0, 65535]`. Anything else is
/// rejected before a file is written; use `.npy` for floating-point data.
/// Returns the written paths.
pub fn write_image_channels(path: &Path, tensor: &Tensor) -> Result<Vec<PathBuf>, TensorError> {
    let has_channel = tensor.axis_index(&AxisId::from("c")).is_some();
    let layout = if has_channel {
        AxisId::parse_compact("cyx")
    } else {
        AxisId::parse_compact("yx")
    };
    let planar = tensor.conform_to(&layout)?;
    let dims = planar.dims().to_vec();
    let (channels, h, w) = if has_channel {
        (dims[0], dims[1], dims[2])
    } else {
        (1, dims[0], dims[1])
    };

    let flat = planar.to_vec();
    if let Some(&v) = flat
        .iter()
        .find(|v| !(v.fract() == 0.0 && (0.0..=u16::MAX as f32).contains(*v)))
    {
        return Err(TensorError::Image {
            path: path.display().to_string(),
            detail: format!(
                "value {v} cannot be stored in a 16-bit image without loss; write .npy instead"
            ),
        });
    }

    let mut written = Vec::with_capacity(channels);
    for c in 0..channels {
        let plane: Vec<u16> = flat[c * h * w..(c + 1) * h * w]
            .iter()
            .map(|&v| v as u16)
            .collect();
        let buf = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
            w as u32, h as u32, plane,
        )
        .ok_or_else(|| TensorError::Image {
            path: path.display().to_string(),
            detail: "buffer does not match image dimensions".into(),
        })?;

        let target = if channels == 1 {
            path.to_path_buf()
        } else {
            channel_path(path, c)
        };
        buf.save(&target).map_err(|e| TensorError::Image {
            path: target.display().to_string(),
            detail: e.to_string(),
        })?;
        tracing::debug!("wrote channel {c} to {}", target.display());
        written.push(target);
    }
    Ok(written)
}

/// Reads an image or `.npy` file into the layout `axes`.
///
/// A `.npy` array with fewer dimensions than `axes` is labelled with the
/// trailing axes (a 2-d array against `bcyx` becomes `yx`); the missing
/// leading axes are then inserted with size 1.
pub fn read_tensor_as(path: &Path, axes: &[AxisId]) -> Result<Tensor, TensorError> {
    let tensor = if is_image_path(path) {
        read_image(path)?
    } else {
        let data = read_npy_widened(path)?;
        if data.ndim() > axes.len() {
            return Err(TensorError::RankMismatch {
                rank: data.ndim(),
                axes: axes.len(),
            });
        }
        let labels = axes[axes.len() - data.ndim()..].to_vec();
        Tensor::new(labels, data)?
    };
    tensor.conform_to(axes)
}

/// Derives `<stem>_c<index>.<ext>` from `path`.
fn channel_path(path: &Path, channel: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("png");
    path.with_file_name(format!("{stem}_c{channel}.{ext}"))
}
