/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image resources section
//!
//! The section is a list of tagged blocks, each one
//! - 4 byte signature, usually `8BIM`
//! - 2 byte id
//! - Pascal name, padded so its total size is even
//! - 4 byte payload length followed by the payload, padded to even length
//!
//! Only the block headers are kept, payloads are stepped over.
use alloc::string::String;
use alloc::vec::Vec;

use log::debug;
use zune_core::bytestream::ZByteReaderTrait;

use crate::constants::{describe_resource, IMAGEREADY_SIGNATURE, RESOURCE_SIGNATURE};
use crate::context::ParseContext;
use crate::cursor::{pad_to, ByteCursor, Section};
use crate::errors::{DecodeWarning, PSDDecodeErrors};

/// Fixed bytes of a block header, signature, id, smallest name and length
const MIN_BLOCK_HEADER: u64 = 4 + 2 + 2 + 4;

/// Header of a single image resource block
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageResourceBlock {
    pub signature:      [u8; 4],
    pub id:             u16,
    pub name:           String,
    /// Payload length as stored, without padding
    pub length:         u32,
    /// Absolute offset of the payload
    pub payload_offset: u64
}

impl ImageResourceBlock {
    /// A human readable description of the id, if known
    pub fn description(&self) -> Option<&'static str> {
        describe_resource(self.id)
    }

    /// Offset just past the padded payload
    pub fn end(&self) -> u64 {
        self.payload_offset + pad_to(u64::from(self.length), 2)
    }
}

/// Walk the image resources section, the cursor must be at its length field.
///
/// On return the cursor is at the end the section declared, even if
/// the blocks inside it disagree.
pub fn scan_image_resources<T: ZByteReaderTrait>(
    cursor: &mut ByteCursor<T>, ctx: &mut ParseContext
) -> Result<Vec<ImageResourceBlock>, PSDDecodeErrors> {
    let section = Section::read(cursor, "image resources")?;
    let mut blocks = Vec::new();

    debug!("Image resources ({} bytes)", section.length);

    let mut consumed = 0_u64;

    while consumed < section.length {
        let remaining = section.length - consumed;

        if remaining < MIN_BLOCK_HEADER {
            ctx.warn(DecodeWarning::ResourceOverrun {
                bytes: MIN_BLOCK_HEADER - remaining
            });
            break;
        }

        let start = cursor.position()?;
        let block = read_block(cursor)?;
        let size = block.end() - start;

        if size > remaining {
            ctx.warn(DecodeWarning::ResourceOverrun {
                bytes: size - remaining
            });
            break;
        }

        if block.signature != RESOURCE_SIGNATURE && block.signature != IMAGEREADY_SIGNATURE {
            ctx.warn(DecodeWarning::BadResourceSignature {
                signature: block.signature
            });
        }

        match block.description() {
            Some(desc) => debug!(
                "  resource {:5} \"{}\": {:5} bytes [{desc}]",
                block.id, block.name, block.length
            ),
            None => debug!(
                "  resource {:5} \"{}\": {:5} bytes",
                block.id, block.name, block.length
            )
        }

        cursor.seek_absolute(block.end())?;
        consumed += size;
        blocks.push(block);
    }

    section.resync(cursor, ctx)?;

    Ok(blocks)
}

fn read_block<T: ZByteReaderTrait>(
    cursor: &mut ByteCursor<T>
) -> Result<ImageResourceBlock, PSDDecodeErrors> {
    let signature = cursor.read_fixed::<4>()?;
    let id = cursor.read_u16_be()?;
    let name = cursor.read_pascal_string(2)?;
    let length = cursor.read_u32_be()?;
    let payload_offset = cursor.position()?;

    Ok(ImageResourceBlock {
        signature,
        id,
        name,
        length,
        payload_offset
    })
}
