/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

use psdx_decoder::errors::PSDDecodeErrors;

/// Errors that end processing of one input file
pub enum CliErrors {
    Decode(PSDDecodeErrors),
    Io(std::io::Error),
    Png(png::EncodingError),
    /// Could not create this output path
    OutputPath(PathBuf, std::io::Error)
}

impl Debug for CliErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CliErrors::Decode(err) => {
                write!(f, "{err:?}")
            }
            CliErrors::Io(err) => {
                write!(f, "I/O error: {err}")
            }
            CliErrors::Png(err) => {
                write!(f, "Could not encode PNG: {err}")
            }
            CliErrors::OutputPath(path, err) => {
                write!(f, "Could not create {path:?}: {err}")
            }
        }
    }
}

impl Display for CliErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for CliErrors {}

impl From<PSDDecodeErrors> for CliErrors {
    fn from(err: PSDDecodeErrors) -> Self {
        CliErrors::Decode(err)
    }
}

impl From<std::io::Error> for CliErrors {
    fn from(err: std::io::Error) -> Self {
        CliErrors::Io(err)
    }
}

impl From<png::EncodingError> for CliErrors {
    fn from(err: png::EncodingError) -> Self {
        CliErrors::Png(err)
    }
}
