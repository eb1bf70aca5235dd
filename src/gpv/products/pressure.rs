/*
Copyright 2021 Jakub Lewandowski

This file is part of GPV Kit.

GPV Kit is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

GPV Kit is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with GPV Kit. If not, see https://www.gnu.org/licenses/.
*/

//! Stack of pressure level fields over lead times written to NetCDF,
//! one `(time, level, latitude, longitude)` variable per quantity.
//!
//! Relative humidity is distributed only up to 300 hPa, upper
//! levels of it are written as missing.

use super::{write_stack, ProductContext};
use crate::errors::{RunError, WriterError};
use crate::gpv::extractor::{read_field, FieldRequest};
use crate::gpv::reader::{GridFile, RecordSource};
use crate::gpv::resolver::ResolvedRecord;
use crate::gpv::writer::{AxisSpec, VariableSpec};
use crate::Float;
use ndarray::{stack, Array2, Array3, ArrayView2, Axis};
use std::path::PathBuf;

/// Pressure levels (hPa) from the bottom up.
const LEVELS: [u32; 16] = [
    1000, 975, 950, 925, 900, 850, 800, 700, 600, 500, 400, 300, 250, 200, 150, 100,
];

const HUMIDITY_LEVELS: usize = 12;

const LEVEL_DIMS: &[&str] = &["time", "level", "latitude", "longitude"];

struct LevelField {
    source: &'static str,
    levels: usize,
    spec: VariableSpec,
}

fn level_field(
    source: &'static str,
    name: &'static str,
    standard_name: &'static str,
    long_name: &'static str,
    units: &'static str,
) -> LevelField {
    LevelField {
        source,
        levels: LEVELS.len(),
        spec: VariableSpec {
            name,
            dimensions: LEVEL_DIMS,
            standard_name,
            long_name,
            units,
            ..VariableSpec::default()
        },
    }
}

fn level_fields() -> Vec<LevelField> {
    vec![
        level_field("TMP", "tmp", "air_temperature", "temperature", "K"),
        LevelField {
            levels: HUMIDITY_LEVELS,
            ..level_field("RH", "rh", "relative_humidity", "relative humidity", "%")
        },
        level_field("UGRD", "uwnd", "eastward_wind", "eastward wind", "m s-1"),
        level_field("VGRD", "vwnd", "northward_wind", "northward wind", "m s-1"),
        level_field(
            "VVEL",
            "omg",
            "lagrangian_tendency_of_air_pressure",
            "vertical velocity",
            "Pa s-1",
        ),
        level_field("HGT", "hgt", "geopotential_height", "geopotential height", "m"),
    ]
}

/// Source variable holding given quantity at given level, e.g. `TMP_850mb`.
fn level_name(source: &str, level: u32) -> String {
    format!("{}_{}mb", source, level)
}

/// `(level, latitude, longitude)` block of one quantity.
fn read_levels(
    grid: &GridFile,
    record: &ResolvedRecord,
    field: &LevelField,
) -> Result<Array3<Float>, RunError> {
    let mut levels = Vec::with_capacity(LEVELS.len());

    for (index, &level) in LEVELS.iter().enumerate() {
        if index < field.levels {
            let request = FieldRequest::new(&level_name(field.source, level));
            levels.push(read_field(grid, record, &request)?);
        } else {
            levels.push(Array2::from_elem(grid.shape(), Float::NAN));
        }
    }

    let views: Vec<ArrayView2<Float>> = levels.iter().map(|l| l.view()).collect();
    let block = stack(Axis(0), &views)
        .map_err(|_| WriterError::ShapeMismatch(field.spec.name.to_string()))?;

    Ok(block)
}

pub(super) fn write(ctx: &ProductContext) -> Result<PathBuf, RunError> {
    let fields = level_fields();
    let mut stacks: Vec<Vec<Array3<Float>>> =
        vec![Vec::with_capacity(ctx.lead_times.len()); fields.len()];

    let axes = ctx.visit(&ctx.lead_times, |grid, record| {
        for (field, stack) in fields.iter().zip(stacks.iter_mut()) {
            stack.push(read_levels(grid, record, field)?);
        }

        Ok(())
    })?;

    let mut writer = ctx.create_dataset(&axes, &ctx.lead_times)?;

    let levels: Vec<Float> = LEVELS.iter().map(|&l| Float::from(l)).collect();
    writer.create_axis(
        &AxisSpec {
            name: "level",
            axis: "Z",
            standard_name: "air_pressure",
            long_name: "pressure level",
            units: "hPa",
            positive: Some("down"),
            ..AxisSpec::default()
        },
        &levels,
    )?;

    for (field, stack) in fields.iter().zip(&stacks) {
        write_stack(&mut writer, &field.spec, stack)?;
    }

    Ok(writer.close())
}
