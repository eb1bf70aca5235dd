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

//! Precipitation accumulated from the run start to the last
//! requested lead time, with sea level pressure at that time.
//!
//! MSM hourly records are summed over every hour up to the last lead
//! time. GSM records are already cumulative and read directly.

use super::{write_stack, ProductContext, GRID_DIMS};
use crate::constants::PRECIPITATION_VAR;
use crate::errors::RunError;
use crate::gpv::extractor::{read_field, FieldRequest};
use crate::gpv::forecast::ModelFamily;
use crate::gpv::writer::VariableSpec;
use crate::Float;
use log::debug;
use ndarray::Array2;
use std::path::PathBuf;

pub(super) fn write(ctx: &ProductContext) -> Result<PathBuf, RunError> {
    let end = *ctx
        .lead_times
        .last()
        .ok_or(RunError::FaultyOutput("No lead time to accumulate precipitation to"))?;

    let mslp_request = FieldRequest::new("PRMSL_meansealevel").scale(0.01);

    let mut total: Option<Array2<Float>> = None;
    let mut mslp: Option<Array2<Float>> = None;

    let axes = match ctx.spec.model {
        ModelFamily::Msm => {
            let hours = ctx.spec.source_kind().valid_lead_times(0, end);
            debug!("Summing {} hourly precipitation records", hours.len());

            ctx.visit(&hours, |grid, record| {
                let rain = read_field(grid, record, &FieldRequest::new(PRECIPITATION_VAR))?;

                total = Some(match total.take() {
                    Some(sum) => sum + rain,
                    None => rain,
                });

                if record.lead_time == end {
                    mslp = Some(read_field(grid, record, &mslp_request)?);
                }

                Ok(())
            })?
        }
        ModelFamily::Gsm => ctx.visit(&[end], |grid, record| {
            let request = FieldRequest::new(PRECIPITATION_VAR).cumulative(true);

            total = Some(read_field(grid, record, &request)?);
            mslp = Some(read_field(grid, record, &mslp_request)?);

            Ok(())
        })?,
    };

    let total = total.ok_or(RunError::FaultyOutput("Precipitation was not read"))?;
    let mslp = mslp.ok_or(RunError::FaultyOutput("Sea level pressure was not read"))?;

    let mut writer = ctx.create_dataset(&axes, &[end])?;

    write_stack(
        &mut writer,
        &VariableSpec {
            name: "rain_sum",
            dimensions: GRID_DIMS,
            standard_name: "precipitation_amount",
            long_name: "precipitation accumulated since the run start",
            units: "mm",
            valid_range: Some((0.0, 2000.0)),
            ..VariableSpec::default()
        },
        &[total],
    )?;

    write_stack(
        &mut writer,
        &VariableSpec {
            name: "mslp",
            dimensions: GRID_DIMS,
            standard_name: "air_pressure_at_mean_sea_level",
            long_name: "mean sea level pressure",
            units: "hPa",
            valid_range: Some((800.0, 1100.0)),
            ..VariableSpec::default()
        },
        &[mslp],
    )?;

    Ok(writer.close())
}
