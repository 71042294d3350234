/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use psdx_decoder::layers::LayerRecord;

use crate::errors::CliErrors;

/// Read a whole input file to memory
pub fn read_input(path: &Path) -> Result<Vec<u8>, CliErrors> {
    let mut fd = BufReader::new(File::open(path)?);
    let mut buf = Vec::with_capacity(1 << 20);
    fd.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Directory outputs of `input` go to when none is given, the
/// input path with its extension replaced by `_png`
pub fn default_output_dir(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.with_extension("").as_os_str());
    name.push("_png");
    PathBuf::from(name)
}

/// Name of the merged image, the input's file name
pub fn merged_name(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("merged"))
}

/// Write the asset list of every layer with pixels
pub fn write_list<W: Write>(out: &mut W, input: &Path, layers: &[LayerRecord]) -> std::io::Result<()> {
    writeln!(out, "-- PSD file: {}", input.display())?;
    writeln!(out, "assetlist = {{")?;

    for layer in layers {
        let rect = &layer.rect;
        let (width, height) = (rect.width(), rect.height());

        if width == 0 || height == 0 {
            continue;
        }
        writeln!(
            out,
            "\t\"{}\" = {{ pos={{{:4},{:4}}}, size={{{:4},{:4}}} }},",
            layer.name, rect.left, rect.top, width, height
        )?;
    }
    writeln!(out, "}}")
}

pub fn write_list_file(
    dir: &Path, input: &Path, layers: &[LayerRecord]
) -> Result<PathBuf, CliErrors> {
    let path = dir.join("list.txt");
    let file = File::create(&path).map_err(|e| CliErrors::OutputPath(path.clone(), e))?;
    let mut writer = BufWriter::new(file);

    write_list(&mut writer, input, layers)?;
    writer.flush()?;
    Ok(path)
}
