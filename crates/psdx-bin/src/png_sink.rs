/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Writes assembled images as PNG files
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use psdx_decoder::assembler::{ColorModel, ImageSink, OutputImage};
use psdx_decoder::zune_core::colorspace::ColorSpace;

use crate::errors::CliErrors;

pub struct PngSink {
    dir:         PathBuf,
    make_dirs:   bool,
    /// Paths of the files written so far
    pub written: Vec<PathBuf>
}

impl PngSink {
    pub fn new(dir: &Path, make_dirs: bool) -> PngSink {
        PngSink {
            dir: dir.to_path_buf(),
            make_dirs,
            written: vec![]
        }
    }

    /// Output path of an image, creating parent directories when enabled
    fn image_path(&self, name: &str) -> Result<PathBuf, CliErrors> {
        let path = self.dir.join(file_name(name, self.make_dirs));

        if let Some(parent) = path.parent() {
            if self.make_dirs && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CliErrors::OutputPath(parent.to_path_buf(), e))?;
            }
        }
        Ok(path)
    }
}

impl ImageSink for PngSink {
    type Error = CliErrors;

    fn write_image(&mut self, image: &OutputImage<'_>) -> Result<(), Self::Error> {
        let Some((pixels, color, depth)) = to_png_samples(image) else {
            warn!(
                "Cannot write {} as PNG, unsupported depth {}",
                image.name, image.depth
            );
            return Ok(());
        };
        let path = self.image_path(&image.name)?;

        debug!(
            "Writing {:?} ({}x{}, {:?})",
            path, image.columns, image.rows, color
        );

        let file = File::create(&path).map_err(|e| CliErrors::OutputPath(path.clone(), e))?;
        let mut encoder = png::Encoder::new(
            BufWriter::new(file),
            image.columns as u32,
            image.rows as u32
        );
        encoder.set_color(color);
        encoder.set_depth(depth);
        encoder.write_header()?.write_image_data(&pixels)?;

        self.written.push(path);
        Ok(())
    }
}

/// Relative file name of an image.
///
/// A `/` in a layer name becomes a directory when `make_dirs` is set and
/// `_` otherwise. Components that would escape the output directory are
/// replaced.
pub fn file_name(name: &str, make_dirs: bool) -> PathBuf {
    let mut path = PathBuf::new();

    if make_dirs {
        for component in name.split('/') {
            path.push(sanitize_component(component));
        }
    } else {
        path.push(sanitize_component(&name.replace('/', "_")));
    }
    path.set_extension(extension_of(&path));
    path
}

fn extension_of(path: &Path) -> String {
    match path.extension() {
        // keep dots in names such as "layer.R", extension is appended
        Some(ext) => format!("{}.png", ext.to_string_lossy()),
        None => String::from("png")
    }
}

fn sanitize_component(component: &str) -> String {
    match component {
        "" => String::from("_"),
        "." | ".." => component.replace('.', "_"),
        _ => component.replace('\\', "_").replace('\0', "_")
    }
}

fn png_color(colorspace: ColorSpace) -> png::ColorType {
    match colorspace {
        ColorSpace::LumaA => png::ColorType::GrayscaleAlpha,
        ColorSpace::RGB => png::ColorType::Rgb,
        ColorSpace::RGBA => png::ColorType::Rgba,
        _ => png::ColorType::Grayscale
    }
}

/// Convert one plane to 8 or 16 bit samples
fn to_plane(data: &[u8], depth: u16, rows: usize, columns: usize) -> Option<(Vec<u8>, png::BitDepth)> {
    match depth {
        1 => Some((expand_bitmap(data, rows, columns), png::BitDepth::Eight)),
        8 => Some((data.to_vec(), png::BitDepth::Eight)),
        16 => Some((data.to_vec(), png::BitDepth::Sixteen)),
        32 => Some((float_to_u16(data), png::BitDepth::Sixteen)),
        _ => None
    }
}

/// Packed bitmap rows to one byte per pixel, a set bit is black
fn expand_bitmap(data: &[u8], rows: usize, columns: usize) -> Vec<u8> {
    let row_bytes = columns.div_ceil(8);
    let mut out = Vec::with_capacity(rows * columns);

    for row in 0..rows {
        for column in 0..columns {
            let byte = data.get(row * row_bytes + column / 8).copied().unwrap_or(0);
            let set = (byte >> (7 - (column % 8))) & 1 == 1;
            out.push(if set { 0 } else { 255 });
        }
    }
    out
}

/// Big endian floats in 0..1 to big endian 16 bit samples
fn float_to_u16(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);

    for sample in data.chunks_exact(4) {
        let value = f32::from_be_bytes([sample[0], sample[1], sample[2], sample[3]]);
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let scaled = (value * 65535.0).round() as u16;
        out.extend_from_slice(&scaled.to_be_bytes());
    }
    out
}

/// Pixel interleaved samples in a layout PNG can store
fn to_png_samples(image: &OutputImage<'_>) -> Option<(Vec<u8>, png::ColorType, png::BitDepth)> {
    if image.color_model == ColorModel::Indexed {
        if image.depth != 8 {
            return None;
        }
        return match image.expand_palette() {
            Some(rgb) => Some((rgb, png::ColorType::Rgb, png::BitDepth::Eight)),
            None => Some((image.interleave(), png::ColorType::Grayscale, png::BitDepth::Eight))
        };
    }
    let color = png_color(image.color_model.colorspace()?);

    let mut planes = Vec::with_capacity(image.channels.len());
    let mut bit_depth = png::BitDepth::Eight;

    for channel in &image.channels {
        let (plane, depth) = to_plane(channel, image.depth, image.rows, image.columns)?;
        planes.push(plane);
        bit_depth = depth;
    }
    if let [single] = planes.as_slice() {
        return Some((single.clone(), color, bit_depth));
    }

    let sample = if bit_depth == png::BitDepth::Sixteen { 2 } else { 1 };
    let length = planes.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(length * planes.len());

    for offset in (0..length).step_by(sample) {
        for plane in &planes {
            out.extend_from_slice(&plane[offset..(offset + sample).min(length)]);
        }
    }
    Some((out, color, bit_depth))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::path::PathBuf;

    use psdx_decoder::assembler::{ColorModel, OutputImage};

    use crate::png_sink::{expand_bitmap, file_name, float_to_u16, to_png_samples};

    fn image(depth: u16, model: ColorModel, channels: Vec<Vec<u8>>) -> OutputImage<'static> {
        OutputImage {
            name: String::from("img"),
            rows: 1,
            columns: 2,
            depth,
            color_model: model,
            channels: channels.into_iter().map(Cow::Owned).collect(),
            palette: None
        }
    }

    #[test]
    fn test_expand_bitmap_rows_are_padded() {
        // 10 columns take two bytes per row
        let data = [0b1000_0000, 0b0100_0000, 0b0000_0001, 0];
        let out = expand_bitmap(&data, 2, 10);

        assert_eq!(out.len(), 20);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 255);
        assert_eq!(out[9], 0);
        assert_eq!(out[17], 0);
    }

    #[test]
    fn test_float_samples_are_clamped() {
        let mut data = vec![];
        for value in [0.0_f32, 1.0, 2.0, -1.0, f32::NAN] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        let out = float_to_u16(&data);
        assert_eq!(out, [0, 0, 255, 255, 255, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(file_name("layer", false), PathBuf::from("layer.png"));
        assert_eq!(file_name("merged.R", false), PathBuf::from("merged.R.png"));
        assert_eq!(file_name("a/b", false), PathBuf::from("a_b.png"));
        assert_eq!(file_name("a/b", true), PathBuf::from("a/b.png"));
        assert_eq!(file_name("../x", true), PathBuf::from("__/x.png"));
        assert_eq!(file_name("", false), PathBuf::from("_.png"));
    }

    #[test]
    fn test_sixteen_bit_interleave() {
        let img = image(16, ColorModel::GrayAlpha, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        let (pixels, color, depth) = to_png_samples(&img).unwrap();

        assert_eq!(pixels, [1, 2, 5, 6, 3, 4, 7, 8]);
        assert_eq!(color, png::ColorType::GrayscaleAlpha);
        assert_eq!(depth, png::BitDepth::Sixteen);
    }

    #[test]
    fn test_unsupported_depth_is_skipped() {
        let img = image(4, ColorModel::Gray, vec![vec![0]]);
        assert!(to_png_samples(&img).is_none());
    }
}
