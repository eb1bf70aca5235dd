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

//! Time series of surface fields at the grid point
//! nearest to the configured station, written to CSV.

use super::{screen_level_names, ProductContext, RainTracker};
use crate::constants::ZERO_CELSIUS;
use crate::errors::{ConfigError, RunError, WriterError};
use crate::gpv::bisection::nearest_index;
use crate::gpv::extractor::{read_field, FieldRequest};
use crate::gpv::reader::{GridAxes, GridFile};
use crate::gpv::resolver::ResolvedRecord;
use crate::gpv::thermo::wind_speed;
use crate::Float;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

/// One lead time of the series.
#[derive(Clone, PartialEq, Debug, Serialize)]
struct SeriesRow {
    valid_time: String,
    lead_time: u32,
    mslp: Float,
    rain: Float,
    temperature: Float,
    relative_humidity: Float,
    u_wind: Float,
    v_wind: Float,
    wind_speed: Float,
    low_cloud: Float,
    middle_cloud: Float,
    high_cloud: Float,
    total_cloud: Float,
}

/// `(lat, lon)` indices of the grid point closest to the station.
fn station_point(axes: &GridAxes, lon: Float, lat: Float) -> Result<(usize, usize), RunError> {
    let lat_index = nearest_index(&axes.lats.to_vec(), lat)?;
    let lon_index = nearest_index(&axes.lons.to_vec(), lon)?;

    Ok((lat_index, lon_index))
}

fn point_value(
    grid: &GridFile,
    record: &ResolvedRecord,
    request: &FieldRequest,
    point: (usize, usize),
) -> Result<Float, RunError> {
    Ok(read_field(grid, record, request)?[point])
}

pub(super) fn write(ctx: &ProductContext) -> Result<PathBuf, RunError> {
    let station = ctx
        .config
        .station
        .as_ref()
        .ok_or(ConfigError::MissingParameter("station"))?;

    let path = ctx.output_path(Some(station.name.as_str()), "csv");

    if path.exists() && !ctx.config.output.overwrite {
        return Err(WriterError::AlreadyExists(path).into());
    }

    let (temperature, humidity) = screen_level_names(ctx.spec.model);

    let mut station_index: Option<(usize, usize)> = None;
    let mut rain = RainTracker::default();
    let mut rows = Vec::with_capacity(ctx.lead_times.len());

    ctx.visit(&ctx.lead_times, |grid, record| {
        let point = match station_index {
            Some(point) => point,
            None => {
                let found = station_point(grid.axes(), station.grid_lon(), station.lat)?;
                info!(
                    "Station {} is represented by grid point {:?}",
                    station.name, found
                );
                station_index = Some(found);
                found
            }
        };

        let value = |request: FieldRequest| point_value(grid, record, &request, point);

        let u_wind = read_field(grid, record, &FieldRequest::new("UGRD_10maboveground"))?;
        let v_wind = read_field(grid, record, &FieldRequest::new("VGRD_10maboveground"))?;
        let speed = wind_speed(&u_wind, &v_wind)?;

        rows.push(SeriesRow {
            valid_time: ctx
                .spec
                .run
                .valid_time(record.lead_time)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            lead_time: record.lead_time,
            mslp: value(FieldRequest::new("PRMSL_meansealevel").scale(0.01))?,
            rain: rain.next(ctx, grid, record)?[point],
            temperature: value(FieldRequest::new(temperature).offset(-ZERO_CELSIUS))?,
            relative_humidity: value(FieldRequest::new(humidity))?,
            u_wind: u_wind[point],
            v_wind: v_wind[point],
            wind_speed: speed[point],
            low_cloud: value(FieldRequest::new("LCDC_surface"))?,
            middle_cloud: value(FieldRequest::new("MCDC_surface"))?,
            high_cloud: value(FieldRequest::new("HCDC_surface"))?,
            total_cloud: value(FieldRequest::new("TCDC_surface"))?,
        });

        Ok(())
    })?;

    let mut out_file = csv::Writer::from_path(&path)?;

    for row in rows {
        out_file.serialize(row)?;
    }

    out_file.flush()?;

    Ok(path)
}
