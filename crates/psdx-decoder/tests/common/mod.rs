/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Builds small PSD files in memory
#![allow(dead_code)]

use psdx_decoder::assembler::{ImageSink, OutputImage};
use psdx_decoder::errors::PSDDecodeErrors;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    Raw,
    Rle,
    /// Write this compression tag and raw data after it
    Tag(u16)
}

pub fn encode_packbits(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < input.len() {
        let mut run = 1;
        while i + run < input.len() && run < 128 && input[i + run] == input[i] {
            run += 1;
        }
        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(input[i]);
            i += run;
            continue;
        }
        let start = i;
        let mut length = 0;
        while i < input.len() && length < 128 {
            if i + 1 < input.len() && input[i] == input[i + 1] {
                break;
            }
            i += 1;
            length += 1;
        }
        out.push((length - 1) as u8);
        out.extend_from_slice(&input[start..start + length]);
    }
    out
}

/// Compression tag, row counts and rows of a channel group
pub fn encode_group(channels: &[Vec<u8>], row_bytes: usize, encoding: Encoding) -> Vec<u8> {
    let mut out = Vec::new();

    match encoding {
        Encoding::Raw => {
            out.extend_from_slice(&0_u16.to_be_bytes());
            for channel in channels {
                out.extend_from_slice(channel);
            }
        }
        Encoding::Tag(tag) => {
            out.extend_from_slice(&tag.to_be_bytes());
            for channel in channels {
                out.extend_from_slice(channel);
            }
        }
        Encoding::Rle => {
            out.extend_from_slice(&1_u16.to_be_bytes());
            let packed: Vec<Vec<u8>> = channels
                .iter()
                .flat_map(|c| c.chunks(row_bytes.max(1)).map(encode_packbits))
                .collect();
            for row in &packed {
                out.extend_from_slice(&(row.len() as u16).to_be_bytes());
            }
            for row in &packed {
                out.extend_from_slice(row);
            }
        }
    }
    out
}

#[derive(Clone, Debug)]
pub struct ChannelSpec {
    pub id:       i16,
    pub data:     Vec<u8>,
    pub encoding: Encoding,
    /// Replace the encoded bytes entirely
    pub raw:      Option<Vec<u8>>
}

#[derive(Clone, Debug)]
pub struct LayerSpec {
    pub rect:     [i32; 4],
    pub channels: Vec<ChannelSpec>,
    pub name:     String,
    pub mask:     Option<[i32; 4]>,
    pub blend:    [u8; 4]
}

impl LayerSpec {
    /// A layer at `top`,`left` holding the given `(id, bytes)` channels
    pub fn new(name: &str, rect: [i32; 4], channels: &[(i16, Vec<u8>)]) -> LayerSpec {
        LayerSpec {
            rect,
            channels: channels
                .iter()
                .map(|(id, data)| ChannelSpec {
                    id:       *id,
                    data:     data.clone(),
                    encoding: Encoding::Raw,
                    raw:      None
                })
                .collect(),
            name: name.to_string(),
            mask: None,
            blend: *b"8BIM"
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> LayerSpec {
        for channel in &mut self.channels {
            channel.encoding = encoding;
        }
        self
    }

    pub fn columns(&self) -> usize {
        (self.rect[3] - self.rect[1]).max(0) as usize
    }

    fn record(&self, lengths: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in self.rect {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&(self.channels.len() as u16).to_be_bytes());
        for (channel, length) in self.channels.iter().zip(lengths) {
            out.extend_from_slice(&channel.id.to_be_bytes());
            out.extend_from_slice(&length.to_be_bytes());
        }
        out.extend_from_slice(&self.blend);
        out.extend_from_slice(b"norm");
        out.extend_from_slice(&[255, 0, 0, 0]);

        let mut extra = Vec::new();
        match self.mask {
            Some(mask) => {
                extra.extend_from_slice(&20_u32.to_be_bytes());
                for v in mask {
                    extra.extend_from_slice(&v.to_be_bytes());
                }
                extra.extend_from_slice(&[255, 0, 0, 0]);
            }
            None => extra.extend_from_slice(&0_u32.to_be_bytes())
        }
        // blending ranges
        extra.extend_from_slice(&0_u32.to_be_bytes());

        let name = self.name.as_bytes();
        extra.push(name.len() as u8);
        extra.extend_from_slice(name);
        let padded = (1 + name.len()).div_ceil(4) * 4;
        let written = 1 + name.len();
        for _ in written..padded {
            extra.push(0);
        }

        out.extend_from_slice(&(extra.len() as u32).to_be_bytes());
        out.extend_from_slice(&extra);
        out
    }

    fn channel_bytes(&self, channel: &ChannelSpec, depth: u16) -> Vec<u8> {
        if let Some(raw) = &channel.raw {
            return raw.clone();
        }
        let columns = match (channel.id, self.mask) {
            (-2, Some(mask)) => (mask[3] - mask[1]).max(0) as usize,
            _ => self.columns()
        };
        let row_bytes = (columns * usize::from(depth)).div_ceil(8);
        encode_group(&[channel.data.clone()], row_bytes, channel.encoding)
    }
}

/// The 26 byte file header on its own
pub fn header_bytes(channels: u16, rows: u32, columns: u32, depth: u16, mode: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"8BPS");
    out.extend_from_slice(&1_u16.to_be_bytes());
    out.extend_from_slice(&[0; 6]);
    out.extend_from_slice(&channels.to_be_bytes());
    out.extend_from_slice(&rows.to_be_bytes());
    out.extend_from_slice(&columns.to_be_bytes());
    out.extend_from_slice(&depth.to_be_bytes());
    out.extend_from_slice(&mode.to_be_bytes());
    out
}

/// An in memory PSD file
#[derive(Clone, Debug)]
pub struct PsdBuilder {
    pub channels:        u16,
    pub rows:            u32,
    pub columns:         u32,
    pub depth:           u16,
    pub mode:            u16,
    pub color_mode_data: Vec<u8>,
    /// Image resources section, length included
    pub resources:       Vec<u8>,
    pub layers:          Vec<LayerSpec>,
    pub merged_alpha:    bool,
    /// Stored layer count, overriding the number of layers
    pub layer_count:     Option<i16>,
    pub merged:          Vec<Vec<u8>>,
    pub merged_encoding: Encoding
}

impl PsdBuilder {
    /// 8 bit RGB of the given size with zeroed merged channels
    pub fn rgb(rows: u32, columns: u32) -> PsdBuilder {
        PsdBuilder::new(3, rows, columns, 8, 3)
    }

    pub fn new(channels: u16, rows: u32, columns: u32, depth: u16, mode: u16) -> PsdBuilder {
        let size = (columns as usize * usize::from(depth)).div_ceil(8) * rows as usize;
        PsdBuilder {
            channels,
            rows,
            columns,
            depth,
            mode,
            color_mode_data: Vec::new(),
            resources: 0_u32.to_be_bytes().to_vec(),
            layers: Vec::new(),
            merged_alpha: false,
            layer_count: None,
            merged: vec![vec![0; size]; usize::from(channels)],
            merged_encoding: Encoding::Raw
        }
    }

    pub fn layer(mut self, layer: LayerSpec) -> PsdBuilder {
        self.layers.push(layer);
        self
    }

    pub fn header(&self) -> Vec<u8> {
        header_bytes(self.channels, self.rows, self.columns, self.depth, self.mode)
    }

    fn layer_and_mask_info(&self) -> Vec<u8> {
        if self.layers.is_empty() && self.layer_count.is_none() {
            return 0_u32.to_be_bytes().to_vec();
        }
        let mut layer_info = Vec::new();

        let count = self.layer_count.unwrap_or_else(|| {
            let n = self.layers.len() as i16;
            if self.merged_alpha {
                -n
            } else {
                n
            }
        });
        layer_info.extend_from_slice(&count.to_be_bytes());

        let encoded: Vec<Vec<Vec<u8>>> = self
            .layers
            .iter()
            .map(|layer| {
                layer
                    .channels
                    .iter()
                    .map(|c| layer.channel_bytes(c, self.depth))
                    .collect()
            })
            .collect();

        for (layer, channels) in self.layers.iter().zip(&encoded) {
            let lengths: Vec<u32> = channels.iter().map(|c| c.len() as u32).collect();
            layer_info.extend_from_slice(&layer.record(&lengths));
        }
        for channels in &encoded {
            for channel in channels {
                layer_info.extend_from_slice(channel);
            }
        }
        if layer_info.len() % 2 == 1 {
            layer_info.push(0);
        }

        let mut misc = Vec::new();
        misc.extend_from_slice(&(layer_info.len() as u32).to_be_bytes());
        misc.extend_from_slice(&layer_info);
        // global layer mask info
        misc.extend_from_slice(&0_u32.to_be_bytes());

        let mut out = (misc.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&misc);
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header();
        out.extend_from_slice(&(self.color_mode_data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.color_mode_data);
        out.extend_from_slice(&self.resources);
        out.extend_from_slice(&self.layer_and_mask_info());

        let row_bytes = (self.columns as usize * usize::from(self.depth)).div_ceil(8);
        out.extend_from_slice(&encode_group(&self.merged, row_bytes, self.merged_encoding));
        out
    }
}

/// Keeps every image it is handed
#[derive(Default)]
pub struct CollectSink {
    pub images: Vec<CollectedImage>
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectedImage {
    pub name:        String,
    pub rows:        usize,
    pub columns:     usize,
    pub components:  usize,
    pub pixels:      Vec<u8>
}

impl ImageSink for CollectSink {
    type Error = PSDDecodeErrors;

    fn write_image(&mut self, image: &OutputImage<'_>) -> Result<(), PSDDecodeErrors> {
        self.images.push(CollectedImage {
            name:       image.name.clone(),
            rows:       image.rows,
            columns:    image.columns,
            components: image.color_model.components(),
            pixels:     image.interleave()
        });
        Ok(())
    }
}

impl CollectSink {
    pub fn names(&self) -> Vec<&str> {
        self.images.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> &CollectedImage {
        self.images
            .iter()
            .find(|i| i.name == name)
            .unwrap_or_else(|| panic!("no image named {name}, have {:?}", self.names()))
    }
}
