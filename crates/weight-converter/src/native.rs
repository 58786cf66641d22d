// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Native SafeTensors and NumPy-archive codecs.
//!
//! Both formats are name → n-dimensional array maps. Tensors are read into
//! a [`TensorMap`] of [`TypedArray`]s and written back out in name order, so
//! the output of a conversion depends only on the tensors themselves.

use crate::ConversionError;
use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};
use resource_descr::WeightFormat;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// An owned array of an element type both formats can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
}

/// Tensors keyed (and therefore ordered) by name.
pub type TensorMap = BTreeMap<String, TypedArray>;

macro_rules! with_array {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            TypedArray::F32($a) => $body,
            TypedArray::F64($a) => $body,
            TypedArray::I8($a) => $body,
            TypedArray::I16($a) => $body,
            TypedArray::I32($a) => $body,
            TypedArray::I64($a) => $body,
            TypedArray::U8($a) => $body,
            TypedArray::U16($a) => $body,
            TypedArray::U32($a) => $body,
            TypedArray::U64($a) => $body,
        }
    };
}

impl TypedArray {
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The SafeTensors element type tag.
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::F32(_) => Dtype::F32,
            Self::F64(_) => Dtype::F64,
            Self::I8(_) => Dtype::I8,
            Self::I16(_) => Dtype::I16,
            Self::I32(_) => Dtype::I32,
            Self::I64(_) => Dtype::I64,
            Self::U8(_) => Dtype::U8,
            Self::U16(_) => Dtype::U16,
            Self::U32(_) => Dtype::U32,
            Self::U64(_) => Dtype::U64,
        }
    }

    /// Little-endian element bytes in row-major order.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        with_array!(self, a => a.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    /// Decodes little-endian row-major bytes.
    pub fn from_le_bytes(
        name: &str,
        dtype: Dtype,
        shape: &[usize],
        bytes: &[u8],
    ) -> Result<Self, ConversionError> {
        Ok(match dtype {
            Dtype::F32 => Self::F32(shaped_as(shape, decode(bytes, f32::from_le_bytes), name)?),
            Dtype::F64 => Self::F64(shaped_as(shape, decode(bytes, f64::from_le_bytes), name)?),
            Dtype::I8 => Self::I8(shaped_as(shape, decode(bytes, i8::from_le_bytes), name)?),
            Dtype::I16 => Self::I16(shaped_as(shape, decode(bytes, i16::from_le_bytes), name)?),
            Dtype::I32 => Self::I32(shaped_as(shape, decode(bytes, i32::from_le_bytes), name)?),
            Dtype::I64 => Self::I64(shaped_as(shape, decode(bytes, i64::from_le_bytes), name)?),
            Dtype::U8 => Self::U8(shaped_as(shape, bytes.to_vec(), name)?),
            Dtype::U16 => Self::U16(shaped_as(shape, decode(bytes, u16::from_le_bytes), name)?),
            Dtype::U32 => Self::U32(shaped_as(shape, decode(bytes, u32::from_le_bytes), name)?),
            Dtype::U64 => Self::U64(shaped_as(shape, decode(bytes, u64::from_le_bytes), name)?),
            other => {
                return Err(ConversionError::UnsupportedDtype {
                    tensor: name.to_string(),
                    dtype: format!("{other:?}"),
                })
            }
        })
    }
}

fn decode<T, const N: usize>(bytes: &[u8], from_le: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from_le(buf)
        })
        .collect()
}

fn shaped_as<T>(shape: &[usize], data: Vec<T>, name: &str) -> Result<ArrayD<T>, ConversionError> {
    ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|e| ConversionError::SafeTensors {
        path: name.to_string(),
        detail: format!("tensor '{name}': {e}"),
    })
}

/// Reads every tensor of a SafeTensors file.
pub fn read_safetensors(path: &Path) -> Result<TensorMap, ConversionError> {
    let st_err = |detail: String| ConversionError::SafeTensors {
        path: path.display().to_string(),
        detail,
    };
    let file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| st_err(format!("mmap failed: {e}")))?;
    let st = SafeTensors::deserialize(&mmap).map_err(|e| st_err(format!("parse error: {e}")))?;

    let mut tensors = TensorMap::new();
    for (name, view) in st.tensors() {
        let array = TypedArray::from_le_bytes(&name, view.dtype(), view.shape(), view.data())?;
        tensors.insert(name, array);
    }
    Ok(tensors)
}

/// Writes tensors to a SafeTensors file.
pub fn write_safetensors(tensors: &TensorMap, path: &Path) -> Result<(), ConversionError> {
    let st_err = |detail: String| ConversionError::SafeTensors {
        path: path.display().to_string(),
        detail,
    };
    let buffers: Vec<(&String, &TypedArray, Vec<u8>)> = tensors
        .iter()
        .map(|(name, array)| (name, array, array.to_le_bytes()))
        .collect();
    let views = buffers
        .iter()
        .map(|(name, array, bytes)| {
            TensorView::new(array.dtype(), array.shape().to_vec(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| st_err(format!("tensor '{name}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let entries = views.iter().map(|(name, view)| (*name, view));
    safetensors::serialize_to_file(entries, &None, path).map_err(|e| st_err(e.to_string()))
}

/// Reads every array of a `.npz` archive; a trailing `.npy` is dropped from
/// entry names.
pub fn read_npz(path: &Path) -> Result<TensorMap, ConversionError> {
    let npz_err = |detail: String| ConversionError::Npz {
        path: path.display().to_string(),
        detail,
    };
    let file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
    let mut npz = NpzReader::new(file).map_err(|e| npz_err(e.to_string()))?;
    let entries = npz.names().map_err(|e| npz_err(e.to_string()))?;

    let mut tensors = TensorMap::new();
    for entry in entries {
        let name = entry.strip_suffix(".npy").unwrap_or(&entry).to_string();
        let array = read_npz_entry(&mut npz, &entry)
            .ok_or_else(|| npz_err(format!("entry '{entry}' has an unsupported element type")))?;
        tensors.insert(name, array);
    }
    Ok(tensors)
}

fn read_npz_entry<R>(npz: &mut NpzReader<R>, entry: &str) -> Option<TypedArray>
where
    R: std::io::Read + std::io::Seek,
{
    macro_rules! attempt {
        ($variant:ident, $t:ty) => {
            if let Ok(a) = npz.by_name::<OwnedRepr<$t>, IxDyn>(entry) {
                return Some(TypedArray::$variant(a));
            }
        };
    }
    attempt!(F32, f32);
    attempt!(F64, f64);
    attempt!(I8, i8);
    attempt!(I16, i16);
    attempt!(I32, i32);
    attempt!(I64, i64);
    attempt!(U8, u8);
    attempt!(U16, u16);
    attempt!(U32, u32);
    attempt!(U64, u64);
    None
}

/// Writes tensors to an uncompressed `.npz` archive in name order.
pub fn write_npz(tensors: &TensorMap, path: &Path) -> Result<(), ConversionError> {
    let npz_err = |detail: String| ConversionError::Npz {
        path: path.display().to_string(),
        detail,
    };
    let file = File::create(path).map_err(|e| ConversionError::io(path, e))?;
    let mut npz = NpzWriter::new(file);
    for (name, array) in tensors {
        let written = with_array!(array, a => npz.add_array(name.as_str(), a));
        written.map_err(|e| npz_err(format!("tensor '{name}': {e}")))?;
    }
    npz.finish().map_err(|e| npz_err(e.to_string()))?;
    Ok(())
}

/// Reads `source` as `from` and writes it to `dest` as `to`.
///
/// Returns the total number of elements converted.
pub fn convert(
    from: WeightFormat,
    to: WeightFormat,
    source: &Path,
    dest: &Path,
) -> Result<u64, ConversionError> {
    let tensors = match from {
        WeightFormat::SafeTensors => read_safetensors(source)?,
        WeightFormat::NumpyArchive => read_npz(source)?,
        _ => return Err(ConversionError::UnsupportedConversion { from, to }),
    };
    match to {
        WeightFormat::SafeTensors => write_safetensors(&tensors, dest)?,
        WeightFormat::NumpyArchive => write_npz(&tensors, dest)?,
        _ => return Err(ConversionError::UnsupportedConversion { from, to }),
    }
    Ok(tensors.values().map(|t| t.len() as u64).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TensorMap {
        let mut m = TensorMap::new();
        m.insert(
            "kernel".into(),
            TypedArray::F32(
                ArrayD::from_shape_vec(IxDyn(&[1, 1, 3, 3]), (0..9).map(|v| v as f32 * 0.5).collect())
                    .unwrap(),
            ),
        );
        m.insert(
            "bias".into(),
            TypedArray::F32(ArrayD::from_shape_vec(IxDyn(&[1]), vec![0.25]).unwrap()),
        );
        m.insert(
            "steps".into(),
            TypedArray::I64(ArrayD::from_shape_vec(IxDyn(&[2]), vec![-3, 1 << 40]).unwrap()),
        );
        m
    }

    #[test]
    fn test_le_bytes_round_trip() {
        let a = TypedArray::U16(ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1, 2, 300, 65535]).unwrap());
        let bytes = a.to_le_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..2], &[1, 0]);
        let back = TypedArray::from_le_bytes("a", Dtype::U16, &[2, 2], &bytes).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_wrong_byte_count_is_rejected() {
        assert!(TypedArray::from_le_bytes("a", Dtype::F32, &[3], &[0u8; 8]).is_err());
    }

    #[test]
    fn test_safetensors_to_npz_and_back_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let st = dir.path().join("w.safetensors");
        let npz = dir.path().join("w.npz");
        let st2 = dir.path().join("w2.safetensors");

        write_safetensors(&sample(), &st).unwrap();
        assert_eq!(read_safetensors(&st).unwrap(), sample());

        let count = convert(WeightFormat::SafeTensors, WeightFormat::NumpyArchive, &st, &npz).unwrap();
        assert_eq!(count, 9 + 1 + 2);
        assert_eq!(read_npz(&npz).unwrap(), sample());

        convert(WeightFormat::NumpyArchive, WeightFormat::SafeTensors, &npz, &st2).unwrap();
        assert_eq!(std::fs::read(&st).unwrap(), std::fs::read(&st2).unwrap());
    }

    #[test]
    fn test_npz_entries_written_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.npz");
        write_npz(&sample(), &path).unwrap();
        let mut npz = NpzReader::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = npz
            .names()
            .unwrap()
            .into_iter()
            .map(|n| n.trim_end_matches(".npy").to_string())
            .collect();
        assert_eq!(names, vec!["bias", "kernel", "steps"]);
    }

    #[test]
    fn test_non_native_formats_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert(
            WeightFormat::Onnx,
            WeightFormat::SafeTensors,
            &dir.path().join("x"),
            &dir.path().join("y"),
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedConversion { .. }));
    }
}
