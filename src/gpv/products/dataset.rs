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

//! Stack of surface fields over lead times written to NetCDF.

use super::{screen_level_names, write_stack, ProductContext, RainTracker, GRID_DIMS};
use crate::constants::ZERO_CELSIUS;
use crate::errors::RunError;
use crate::gpv::extractor::{read_field, FieldRequest};
use crate::gpv::forecast::ModelFamily;
use crate::gpv::thermo::wind_speed;
use crate::gpv::writer::VariableSpec;
use crate::Float;
use ndarray::Array2;
use std::path::PathBuf;

struct SurfaceField {
    request: FieldRequest,
    spec: VariableSpec,
}

fn surface_fields(model: ModelFamily) -> Vec<SurfaceField> {
    let (temperature, humidity) = screen_level_names(model);

    let cloud = |source: &str, name: &'static str, long_name: &'static str| SurfaceField {
        request: FieldRequest::new(source),
        spec: VariableSpec {
            name,
            dimensions: GRID_DIMS,
            standard_name: "cloud_area_fraction",
            long_name,
            units: "%",
            valid_range: Some((0.0, 100.0)),
            ..VariableSpec::default()
        },
    };

    vec![
        SurfaceField {
            request: FieldRequest::new("PRMSL_meansealevel").scale(0.01),
            spec: VariableSpec {
                name: "mslp",
                dimensions: GRID_DIMS,
                standard_name: "air_pressure_at_mean_sea_level",
                long_name: "mean sea level pressure",
                units: "hPa",
                valid_range: Some((800.0, 1100.0)),
                ..VariableSpec::default()
            },
        },
        SurfaceField {
            request: FieldRequest::new(temperature).offset(-ZERO_CELSIUS),
            spec: VariableSpec {
                name: "tmp",
                dimensions: GRID_DIMS,
                standard_name: "air_temperature",
                long_name: "near-surface air temperature",
                units: "degC",
                valid_range: Some((-90.0, 60.0)),
                ..VariableSpec::default()
            },
        },
        SurfaceField {
            request: FieldRequest::new(humidity),
            spec: VariableSpec {
                name: "rh",
                dimensions: GRID_DIMS,
                standard_name: "relative_humidity",
                long_name: "near-surface relative humidity",
                units: "%",
                valid_range: Some((0.0, 100.0)),
                ..VariableSpec::default()
            },
        },
        cloud("LCDC_surface", "cfrl", "low cloud cover"),
        cloud("MCDC_surface", "cfrm", "middle cloud cover"),
        cloud("HCDC_surface", "cfrh", "high cloud cover"),
        cloud("TCDC_surface", "cfrt", "total cloud cover"),
        SurfaceField {
            request: FieldRequest::new("DSWRF_surface"),
            spec: VariableSpec {
                name: "dsrf",
                dimensions: GRID_DIMS,
                standard_name: "surface_downwelling_shortwave_flux_in_air",
                long_name: "downward short-wave radiation flux",
                units: "W m-2",
                ..VariableSpec::default()
            },
        },
    ]
}

fn wind_spec(
    name: &'static str,
    standard_name: &'static str,
    long_name: &'static str,
) -> VariableSpec {
    VariableSpec {
        name,
        dimensions: GRID_DIMS,
        standard_name,
        long_name,
        units: "m s-1",
        ..VariableSpec::default()
    }
}

fn rain_spec() -> VariableSpec {
    VariableSpec {
        name: "rain",
        dimensions: GRID_DIMS,
        standard_name: "precipitation_amount",
        long_name: "precipitation since the previous lead time",
        units: "mm",
        valid_range: Some((0.0, 500.0)),
        ..VariableSpec::default()
    }
}

pub(super) fn write(ctx: &ProductContext) -> Result<PathBuf, RunError> {
    let fields = surface_fields(ctx.spec.model);
    let count = ctx.lead_times.len();

    let mut stacks: Vec<Vec<Array2<Float>>> = vec![Vec::with_capacity(count); fields.len()];
    let mut u_stack = Vec::with_capacity(count);
    let mut v_stack = Vec::with_capacity(count);
    let mut speed_stack = Vec::with_capacity(count);
    let mut rain_stack = Vec::with_capacity(count);
    let mut rain = RainTracker::default();

    let axes = ctx.visit(&ctx.lead_times, |grid, record| {
        for (field, stack) in fields.iter().zip(stacks.iter_mut()) {
            stack.push(read_field(grid, record, &field.request)?);
        }

        let u_wind = read_field(grid, record, &FieldRequest::new("UGRD_10maboveground"))?;
        let v_wind = read_field(grid, record, &FieldRequest::new("VGRD_10maboveground"))?;

        speed_stack.push(wind_speed(&u_wind, &v_wind)?);
        u_stack.push(u_wind);
        v_stack.push(v_wind);

        rain_stack.push(rain.next(ctx, grid, record)?);

        Ok(())
    })?;

    let mut writer = ctx.create_dataset(&axes, &ctx.lead_times)?;

    for (field, stack) in fields.iter().zip(&stacks) {
        write_stack(&mut writer, &field.spec, stack)?;
    }

    write_stack(
        &mut writer,
        &wind_spec("uwnd", "eastward_wind", "10 m eastward wind"),
        &u_stack,
    )?;
    write_stack(
        &mut writer,
        &wind_spec("vwnd", "northward_wind", "10 m northward wind"),
        &v_stack,
    )?;
    write_stack(
        &mut writer,
        &wind_spec("wspd", "wind_speed", "10 m wind speed"),
        &speed_stack,
    )?;
    write_stack(&mut writer, &rain_spec(), &rain_stack)?;

    Ok(writer.close())
}

#[cfg(test)]
mod tests {
    use super::surface_fields;
    use crate::gpv::forecast::ModelFamily;
    use rustc_hash::FxHashSet;

    #[test]
    fn field_sources_follow_model() {
        let msm = surface_fields(ModelFamily::Msm);
        let gsm = surface_fields(ModelFamily::Gsm);

        assert!(msm.iter().any(|f| f.request.name() == "TMP_1D5maboveground"));
        assert!(gsm.iter().any(|f| f.request.name() == "TMP_2maboveground"));
        assert!(gsm.iter().any(|f| f.request.name() == "RH_2maboveground"));

        let names: FxHashSet<&str> = msm.iter().map(|f| f.spec.name).collect();
        assert_eq!(names.len(), msm.len());
        assert!(!names.contains("rain"));
    }
}
