/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A layered PSD decoder
//!
//! This crate walks every section of a Photoshop PSD file and decodes the
//! pixel data of each layer and of the merged composite into planar,
//! per channel byte streams.
//!
//! ## What it does and doesn't do
//! Photoshop files are frequently damaged in small ways, so the decoder
//! prefers to recover. Block lengths are used to get back on track after
//! anything unexpected, and every recovery is reported as a
//! [`DecodeWarning`](errors::DecodeWarning) instead of an error.
//!
//! It does not composite layers, apply blend modes or effects, interpret
//! color profiles or read vector and text data. Large document (PSB) files
//! and ZIP compressed channels are not supported.
//!
//! # Example
//! - Reading a psd file and listing its layers
//! ```no_run
//! use psdx_decoder::errors::PSDDecodeErrors;
//! use psdx_decoder::PSDDecoder;
//!
//! fn main() -> Result<(), PSDDecodeErrors> {
//!     use psdx_decoder::zune_core::bytestream::ZCursor;
//!     let data = std::fs::read("image.psd").unwrap();
//!     let mut decoder = PSDDecoder::new(ZCursor::new(&data));
//!     let image = decoder.decode()?;
//!
//!     for layer in &image.layers {
//!         let rect = layer.record.rect;
//!         println!("{} @ {},{}", layer.record.name, rect.left, rect.top);
//!     }
//!     for warning in &image.warnings {
//!         println!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! To turn the decoded channels into images, implement
//! [`ImageSink`](assembler::ImageSink) and hand it to
//! [`PSDDecoder::decode_into`], which writes each layer's images as soon
//! as the layer is decoded and keeps no pixels afterwards.
//! [`ImageAssembler::write_all`](assembler::ImageAssembler::write_all)
//! does the same for an already decoded [`PsdImage`].
#![cfg_attr(not(any(feature = "std", test)), no_std)]
extern crate alloc;
pub extern crate zune_core;

#[cfg(feature = "threads")]
pub use decoder::{decode_threaded, decode_threaded_into};
pub use decoder::{PSDDecoder, PsdImage, PsdOptions, PsdSummary};

pub mod assembler;
pub mod channel;
pub mod constants;
pub mod context;
pub mod cursor;
pub mod decoder;
pub mod errors;
pub mod layers;
pub mod resources;
pub mod rle;
pub mod tasks;
