/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Big endian reading over any zune byte source
//!
//! Every multi-byte value in a PSD file is big endian, and most
//! blocks are prefixed with a 4-byte length that tells us where the
//! next block starts. [`ByteCursor`] reads the values and [`Section`]
//! remembers those lengths so that a damaged block can be stepped over.
use alloc::string::String;
use alloc::vec;

use log::trace;
use zune_core::bytestream::{ZByteIoError, ZByteReaderTrait, ZReader, ZSeekFrom};

use crate::context::ParseContext;
use crate::errors::{DecodeWarning, PSDDecodeErrors};

/// Sequential reader over a random access byte source.
///
/// Seeking past the end is allowed, the error shows up on the next read.
pub struct ByteCursor<T: ZByteReaderTrait> {
    inner:  ZReader<T>,
    length: Option<u64>
}

impl<T: ZByteReaderTrait> ByteCursor<T> {
    pub fn new(source: T) -> ByteCursor<T> {
        ByteCursor {
            inner:  ZReader::new(source),
            length: None
        }
    }

    /// Destroy this cursor returning the underlying source
    pub fn into_inner(self) -> T {
        self.inner.consume()
    }

    /// Current absolute offset from the start of the source
    #[inline]
    pub fn position(&mut self) -> Result<u64, PSDDecodeErrors> {
        Ok(self.inner.position()?)
    }

    /// Size of the whole source in bytes
    pub fn source_len(&mut self) -> Result<u64, PSDDecodeErrors> {
        if let Some(length) = self.length {
            return Ok(length);
        }
        let position = self.position()?;
        let length = self.inner.seek(ZSeekFrom::End(0))?;
        self.seek_absolute(position)?;
        self.length = Some(length);
        Ok(length)
    }

    /// Bytes left between the current position and the end of the source
    pub fn remaining(&mut self) -> Result<u64, PSDDecodeErrors> {
        let position = self.position()?;
        Ok(self.source_len()?.saturating_sub(position))
    }

    /// Move `num` bytes forward without reading them, returning the new position
    #[inline]
    pub fn seek_forward(&mut self, num: u64) -> Result<u64, PSDDecodeErrors> {
        if num == 0 {
            return self.position();
        }
        let num = usize::try_from(num).map_err(ZByteIoError::from)?;
        Ok(self.inner.skip(num)?)
    }

    #[inline]
    pub fn seek_absolute(&mut self, position: u64) -> Result<(), PSDDecodeErrors> {
        self.inner.seek(ZSeekFrom::Start(position))?;
        Ok(())
    }

    /// Map running out of bytes to [`PSDDecodeErrors::TruncatedInput`]
    fn truncated(&mut self, err: ZByteIoError) -> PSDDecodeErrors {
        match err {
            ZByteIoError::NotEnoughBytes(_, _) => match self.position() {
                Ok(pos) => PSDDecodeErrors::TruncatedInput(pos),
                Err(e) => e
            },
            e => PSDDecodeErrors::IoErrors(e)
        }
    }

    /// Read exactly `N` bytes
    #[inline]
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], PSDDecodeErrors> {
        self.inner
            .read_fixed_bytes_or_error()
            .map_err(|e| self.truncated(e))
    }

    /// Fill `buf` completely or fail with [`PSDDecodeErrors::TruncatedInput`]
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), PSDDecodeErrors> {
        self.inner
            .read_exact_bytes(buf)
            .map_err(|e| self.truncated(e))
    }

    /// Read as many bytes as the source still holds, up to `buf.len()`.
    ///
    /// Returns how many bytes were placed at the start of `buf`.
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, PSDDecodeErrors> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.inner.read_bytes(&mut buf[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok(filled)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, PSDDecodeErrors> {
        self.inner.read_u8_err().map_err(|e| self.truncated(e))
    }

    #[inline]
    pub fn read_u16_be(&mut self) -> Result<u16, PSDDecodeErrors> {
        self.inner.get_u16_be_err().map_err(|e| self.truncated(e))
    }

    /// Read a two's complement 16 bit value, values from `0x8000` up are negative
    #[inline]
    pub fn read_i16_be(&mut self) -> Result<i16, PSDDecodeErrors> {
        Ok(self.read_u16_be()? as i16)
    }

    #[inline]
    pub fn read_u32_be(&mut self) -> Result<u32, PSDDecodeErrors> {
        self.inner.get_u32_be_err().map_err(|e| self.truncated(e))
    }

    #[inline]
    pub fn read_i32_be(&mut self) -> Result<i32, PSDDecodeErrors> {
        Ok(self.read_u32_be()? as i32)
    }

/// Read a length prefixed string whose total size, length byte
    /// included, is padded to a multiple of `padding`.
    pub fn read_pascal_string(&mut self, padding: u64) -> Result<String, PSDDecodeErrors> {
        let length = usize::from(self.read_u8()?);
        let total = pad_to(1 + length as u64, padding);

        let mut name = vec![0; length];
        self.read_exact(&mut name)?;
        self.seek_forward(total - 1 - length as u64)?;

        Ok(String::from_utf8_lossy(&name).into_owned())
    }
}

/// Round `value` up to the next multiple of `padding`
#[inline]
pub const fn pad_to(value: u64, padding: u64) -> u64 {
    if padding <= 1 {
        return value;
    }
    value.div_ceil(padding) * padding
}

/// A length prefixed block of the file.
///
/// Parsing a section may stop anywhere inside it, [`Section::resync`]
/// afterwards always leaves the cursor at its declared end.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Section {
    pub name:   &'static str,
    pub start:  u64,
    pub length: u64
}

impl Section {
    /// Read a 4-byte length, the section starts right after it
    pub fn read<T: ZByteReaderTrait>(
        cursor: &mut ByteCursor<T>, name: &'static str
    ) -> Result<Section, PSDDecodeErrors> {
        let length = u64::from(cursor.read_u32_be()?);
        let start = cursor.position()?;

        trace!("{name}: {length} bytes @ {start}");

        Ok(Section {
            name,
            start,
            length
        })
    }

    pub const fn new(name: &'static str, start: u64, length: u64) -> Section {
        Section {
            name,
            start,
            length
        }
    }

    pub const fn end(&self) -> u64 {
        self.start + self.length
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Seek to the declared end without checking where we were
    pub fn skip<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>
    ) -> Result<(), PSDDecodeErrors> {
        cursor.seek_absolute(self.end())
    }

    /// Make sure the cursor sits at the declared end of this section.
    ///
    /// If parsing left it anywhere else a warning is raised and the
    /// cursor is moved there.
    pub fn resync<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext
    ) -> Result<(), PSDDecodeErrors> {
        let position = cursor.position()?;

        if position != self.end() {
            ctx.warn(DecodeWarning::Resynchronized {
                section: self.name,
                position,
                expected: self.end()
            });
            cursor.seek_absolute(self.end())?;
        }
        Ok(())
    }
}

/// Read a length prefixed block we do not interpret and step over it
pub fn skip_block<T: ZByteReaderTrait>(
    cursor: &mut ByteCursor<T>, name: &'static str
) -> Result<u64, PSDDecodeErrors> {
    let section = Section::read(cursor, name)?;
    if section.is_empty() {
        trace!("  ({name} is empty)");
    } else {
        trace!("  ...skipped {name} ({} bytes)", section.length);
    }
    section.skip(cursor)?;
    Ok(section.length)
}
