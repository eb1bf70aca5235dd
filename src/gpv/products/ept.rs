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

//! Equivalent potential temperature at 850 and 500 hPa
//! and the stability between them.

use super::{write_stack, ProductContext, GRID_DIMS};
use crate::errors::RunError;
use crate::gpv::extractor::{read_field, FieldRequest};
use crate::gpv::thermo::{stability, theta_e_fields_on_level};
use crate::gpv::writer::VariableSpec;
use crate::Float;
use ndarray::Array2;
use std::path::PathBuf;

const LOWER_LEVEL: Float = 85_000.0;
const UPPER_LEVEL: Float = 50_000.0;

fn theta_spec(
    name: &'static str,
    standard_name: &'static str,
    long_name: &'static str,
) -> VariableSpec {
    VariableSpec {
        name,
        dimensions: GRID_DIMS,
        standard_name,
        long_name,
        units: "K",
        valid_range: Some((200.0, 450.0)),
        ..VariableSpec::default()
    }
}

#[derive(Default)]
struct Stacks {
    ept_850: Vec<Array2<Float>>,
    sept_850: Vec<Array2<Float>>,
    ept_500: Vec<Array2<Float>>,
    sept_500: Vec<Array2<Float>>,
    hgt_500: Vec<Array2<Float>>,
    stability: Vec<Array2<Float>>,
}

pub(super) fn write(ctx: &ProductContext) -> Result<PathBuf, RunError> {
    let mut stacks = Stacks::default();

    let axes = ctx.visit(&ctx.lead_times, |grid, record| {
        let temp_850 = read_field(grid, record, &FieldRequest::new("TMP_850mb"))?;
        let temp_500 = read_field(grid, record, &FieldRequest::new("TMP_500mb"))?;
        let rh_850 = read_field(grid, record, &FieldRequest::new("RH_850mb"))?;
        let rh_500 = read_field(grid, record, &FieldRequest::new("RH_500mb"))?;
        let hgt_500 = read_field(grid, record, &FieldRequest::new("HGT_500mb"))?;

        let (ept_850, sept_850) = theta_e_fields_on_level(LOWER_LEVEL, &temp_850, &rh_850)?;
        let (ept_500, sept_500) = theta_e_fields_on_level(UPPER_LEVEL, &temp_500, &rh_500)?;

        stacks.stability.push(stability(&ept_500, &ept_850)?);
        stacks.ept_850.push(ept_850);
        stacks.sept_850.push(sept_850);
        stacks.ept_500.push(ept_500);
        stacks.sept_500.push(sept_500);
        stacks.hgt_500.push(hgt_500);

        Ok(())
    })?;

    let mut writer = ctx.create_dataset(&axes, &ctx.lead_times)?;

    write_stack(
        &mut writer,
        &theta_spec(
            "ept_850",
            "equivalent_potential_temperature",
            "equivalent potential temperature at 850 hPa",
        ),
        &stacks.ept_850,
    )?;
    write_stack(
        &mut writer,
        &theta_spec(
            "sept_850",
            "saturation_equivalent_potential_temperature",
            "saturated equivalent potential temperature at 850 hPa",
        ),
        &stacks.sept_850,
    )?;
    write_stack(
        &mut writer,
        &theta_spec(
            "ept_500",
            "equivalent_potential_temperature",
            "equivalent potential temperature at 500 hPa",
        ),
        &stacks.ept_500,
    )?;
    write_stack(
        &mut writer,
        &theta_spec(
            "sept_500",
            "saturation_equivalent_potential_temperature",
            "saturated equivalent potential temperature at 500 hPa",
        ),
        &stacks.sept_500,
    )?;
    write_stack(
        &mut writer,
        &VariableSpec {
            name: "hgt_500",
            dimensions: GRID_DIMS,
            standard_name: "geopotential_height",
            long_name: "geopotential height at 500 hPa",
            units: "m",
            ..VariableSpec::default()
        },
        &stacks.hgt_500,
    )?;
    write_stack(
        &mut writer,
        &VariableSpec {
            name: "stability",
            dimensions: GRID_DIMS,
            standard_name: "N/A",
            long_name: "500 hPa minus 850 hPa equivalent potential temperature",
            units: "K",
            ..VariableSpec::default()
        },
        &stacks.stability,
    )?;

    Ok(writer.close())
}
