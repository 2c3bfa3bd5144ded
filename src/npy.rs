//! Minimal NPY (format 1.0) writer for class masks
//!
//! Masks are stored as little-endian `f32`, C order, shape
//! `(channels, height, width)`: channel `c` holds 1.0 where the pixel label
//! is `c` and 0.0 elsewhere.

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::GeneratorResult;
use crate::mask::LabelMask;

const MAGIC: &[u8] = b"\x93NUMPY";
const VERSION: [u8; 2] = [1, 0];
/// Preamble plus header length is padded to a multiple of this
const HEADER_ALIGN: usize = 64;

/// Header bytes (magic, version, length, dict) for an `<f4` array of `shape`
pub fn header(shape: &[usize]) -> Vec<u8> {
    let dims = match shape {
        [single] => format!("{single},"),
        _ => shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", "),
    };
    let mut dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({dims}), }}");

    // magic + version + u16 length
    let preamble = MAGIC.len() + VERSION.len() + 2;
    let unpadded = preamble + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    dict.extend(std::iter::repeat(' ').take(padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(preamble + dict.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION);
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out
}

/// Stream the one-hot expansion of `mask` as an NPY array
pub fn write_mask<W: Write>(writer: &mut W, mask: &LabelMask) -> GeneratorResult<()> {
    let shape = [
        mask.classes() as usize,
        mask.height() as usize,
        mask.width() as usize,
    ];
    writer.write_all(&header(&shape))?;
    for channel in 0..mask.classes() {
        for value in mask.channel_values(channel) {
            writer.write_f32::<LittleEndian>(value)?;
        }
    }
    Ok(())
}

pub fn save_mask(path: &Path, mask: &LabelMask) -> GeneratorResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_mask(&mut writer, mask)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;

    #[test]
    fn test_header_is_aligned_and_terminated() {
        let h = header(&[3, 20, 30]);
        assert_eq!(&h[..6], MAGIC);
        assert_eq!(&h[6..8], &[1, 0]);
        assert_eq!(h.len() % HEADER_ALIGN, 0);
        let len = u16::from_le_bytes([h[8], h[9]]) as usize;
        assert_eq!(len + 10, h.len());
        let dict = std::str::from_utf8(&h[10..]).unwrap();
        assert!(dict.starts_with("{'descr': '<f4', 'fortran_order': False, 'shape': (3, 20, 30), }"));
        assert!(dict.ends_with('\n'));
    }

    #[test]
    fn test_one_dimensional_shape_keeps_trailing_comma() {
        let h = header(&[5]);
        let dict = std::str::from_utf8(&h[10..]).unwrap();
        assert!(dict.contains("'shape': (5,)"), "{dict}");
    }

    #[test]
    fn test_mask_body_is_one_hot_planes() {
        let mut mask = LabelMask::new(3, 2, 3);
        mask.fill_rect(Rect::new(0, 0, 1, 2), 1);
        mask.set(2, 1, 2);

        let mut buf = Vec::new();
        write_mask(&mut buf, &mask).unwrap();
        let body = &buf[header(&[3, 2, 3]).len()..];
        assert_eq!(body.len(), 3 * 2 * 3 * 4);

        let values: Vec<f32> = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let plane = |c: usize| &values[c * 6..(c + 1) * 6];
        assert_eq!(plane(0), &[0.0, 1.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(plane(1), &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(plane(2), &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
