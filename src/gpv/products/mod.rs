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

//! Analysis-ready outputs computed from the forecast records.
//!
//! Every product walks the requested lead times in order. For each
//! lead time the record is resolved, its source file made available
//! and opened, fields are read and the file is closed again before
//! the next lead time.

mod dataset;
mod ept;
mod pressure;
mod rain_sum;
mod series;

use super::configuration::{Config, ProductKind, RunSpec};
use super::extractor::{read_field, FieldRequest};
use super::forecast::ModelFamily;
use super::reader::{GridAxes, GridFile};
use super::resolver::{resolve_record, ResolvedRecord};
use super::retrieval::Retriever;
use super::writer::{AxisSpec, DatasetWriter, GlobalAttributes, VariableSpec};
use crate::constants::PRECIPITATION_VAR;
use crate::errors::{ConfigError, RunError, WriterError};
use crate::Float;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use ndarray::{stack, Array, Array2, ArrayView, Axis, Dimension, RemoveAxis};
use std::path::PathBuf;

/// Dimensions of gridded product variables.
const GRID_DIMS: &[&str] = &["time", "latitude", "longitude"];

/// Everything a product needs to visit lead times and write output.
pub(super) struct ProductContext<'a> {
    spec: &'a RunSpec,
    config: &'a Config,
    retriever: &'a Retriever,
    lead_times: Vec<u32>,
}

/// Computes the configured product and returns path of the written file.
pub fn run(spec: &RunSpec, config: &Config, retriever: &Retriever) -> Result<PathBuf, RunError> {
    let lead_times = spec.lead_times.expand(spec.source_kind())?;

    if lead_times.is_empty() {
        return Err(ConfigError::OutOfBounds("No requested lead time has a record").into());
    }

    info!(
        "Computing {} from {} {} run {} for {} lead time(s)",
        spec.product.name(),
        spec.model,
        spec.level,
        spec.run,
        lead_times.len()
    );

    let context = ProductContext {
        spec,
        config,
        retriever,
        lead_times,
    };

    match spec.product {
        ProductKind::SurfaceDataset => dataset::write(&context),
        ProductKind::PressureDataset => pressure::write(&context),
        ProductKind::RainSum => rain_sum::write(&context),
        ProductKind::Ept => ept::write(&context),
        ProductKind::PointSeries => series::write(&context),
    }
}

impl<'a> ProductContext<'a> {
    /// Visits given lead times, opening and closing the
    /// source file for each. Returns axes of the first file.
    fn visit<F>(&self, lead_times: &[u32], mut visitor: F) -> Result<GridAxes, RunError>
    where
        F: FnMut(&GridFile, &ResolvedRecord) -> Result<(), RunError>,
    {
        let bar = ProgressBar::new(lead_times.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .progress_chars("#>-"),
        );
        bar.set_prefix(format!("{} lead times", self.spec.product.name()));

        let mut first_axes: Option<GridAxes> = None;

        for &lead_time in lead_times {
            let (grid, record) = self.open(lead_time)?;

            if let Some(axes) = &first_axes {
                if axes != grid.axes() {
                    warn!("Grid axes of {} differ from the first file", grid.path().display());
                }
            } else {
                let (lon_mesh, lat_mesh) = grid.mesh()?;
                debug!("lon: {:?}, lat: {:?}", lon_mesh.dim(), lat_mesh.dim());

                first_axes = Some(grid.axes().clone());
            }

            let result = visitor(&grid, &record);
            grid.close();
            result?;

            bar.inc(1);
        }

        bar.finish_with_message("done");

        first_axes.ok_or(RunError::FaultyOutput("No source file was visited"))
    }

    /// Resolves given lead time and opens the source file holding it.
    fn open(&self, lead_time: u32) -> Result<(GridFile, ResolvedRecord), RunError> {
        let record = resolve_record(self.spec.run, self.spec.model, self.spec.level, lead_time)?;
        let path = self.retriever.locate(&record.file, &self.spec.source)?;

        Ok((GridFile::open(&path)?, record))
    }

    /// Reads a field at another lead time than the one being visited.
    /// The open file is reused when it holds that lead time.
    fn read_at(
        &self,
        grid: &GridFile,
        current: &ResolvedRecord,
        lead_time: u32,
        request: &FieldRequest,
    ) -> Result<Array2<Float>, RunError> {
        let record = resolve_record(self.spec.run, self.spec.model, self.spec.level, lead_time)?;

        if record.file == current.file {
            return Ok(read_field(grid, &record, request)?);
        }

        let (other, record) = self.open(lead_time)?;
        let field = read_field(&other, &record, request);
        other.close();

        Ok(field?)
    }

    /// `<output dir>/<product>_<MODEL>_<run>[_<suffix>].<extension>`
    fn output_path(&self, suffix: Option<&str>, extension: &str) -> PathBuf {
        let mut name = format!(
            "{}_{}_{}",
            self.spec.product.name(),
            self.spec.model,
            self.spec.run
        );

        if let Some(suffix) = suffix {
            name.push('_');
            name.push_str(suffix);
        }

        self.config
            .output
            .directory
            .join(format!("{}.{}", name, extension))
    }

    /// Seconds since 1970-01-01 of given lead times.
    fn time_values(&self, lead_times: &[u32]) -> Vec<Float> {
        lead_times
            .iter()
            .map(|&lead| self.spec.run.valid_time(lead).timestamp() as Float)
            .collect()
    }

    /// Creates output NetCDF with global attributes
    /// and `time`, `latitude`, `longitude` axes.
    fn create_dataset(
        &self,
        axes: &GridAxes,
        lead_times: &[u32],
    ) -> Result<DatasetWriter, RunError> {
        let path = self.output_path(None, "nc");
        let mut writer = DatasetWriter::create(&path, self.config.output.overwrite)?;

        writer.set_global_attributes(&GlobalAttributes {
            product: self.spec.product.name().to_string(),
            conventions: "CF-1.7".to_string(),
            dataset: format!("JMA {} GPV", self.spec.model),
            source: format!(
                "JMA {} {} forecast from {} run",
                self.spec.model, self.spec.level, self.spec.run
            ),
            history: format!("Created by gpvkit {}", env!("CARGO_PKG_VERSION")),
            ..GlobalAttributes::default()
        })?;

        writer.create_axis(
            &AxisSpec {
                name: "time",
                axis: "T",
                standard_name: "time",
                long_name: "time",
                units: "seconds since 1970-01-01 00:00:00",
                calendar: Some("standard"),
                ..AxisSpec::default()
            },
            &self.time_values(lead_times),
        )?;

        writer.create_axis(
            &AxisSpec {
                name: "latitude",
                axis: "Y",
                standard_name: "latitude",
                long_name: "latitude",
                units: "degrees_north",
                valid_range: Some((-90.0, 90.0)),
                ..AxisSpec::default()
            },
            &axes.lats.to_vec(),
        )?;

        writer.create_axis(
            &AxisSpec {
                name: "longitude",
                axis: "X",
                standard_name: "longitude",
                long_name: "longitude",
                units: "degrees_east",
                valid_range: Some((0.0, 360.0)),
                ..AxisSpec::default()
            },
            &axes.lons.to_vec(),
        )?;

        Ok(writer)
    }
}

/// Precipitation since the previously visited lead time.
///
/// The first visited lead time gets precipitation of the step before
/// it. MSM hourly records between visited lead times are summed. GSM
/// records are cumulative, so the previous cumulative field is kept
/// between lead times, which also works when consecutive lead times
/// are held by different files.
#[derive(Default)]
pub(super) struct RainTracker {
    previous_lead: Option<u32>,
    previous_total: Option<Array2<Float>>,
}

impl RainTracker {
    fn next(
        &mut self,
        ctx: &ProductContext,
        grid: &GridFile,
        record: &ResolvedRecord,
    ) -> Result<Array2<Float>, RunError> {
        let hourly = FieldRequest::new(PRECIPITATION_VAR);

        let rain = match record.file.model {
            ModelFamily::Msm => {
                let mut rain = read_field(grid, record, &hourly)?;

                if let Some(previous) = self.previous_lead {
                    for hour in previous + 1..record.lead_time {
                        rain += &ctx.read_at(grid, record, hour, &hourly)?;
                    }
                }

                rain
            }
            ModelFamily::Gsm => {
                let cumulative = hourly.clone().cumulative(true);
                let total = read_field(grid, record, &cumulative)?;

                let rain = match (&self.previous_total, record.index) {
                    (Some(previous), _) => &total - previous,
                    // first record of a chunk file, previous one is in another file
                    (None, 0) if record.lead_time > 0 => {
                        match ctx.spec.source_kind().previous_lead_time(record.lead_time) {
                            Some(previous) => {
                                &total - &ctx.read_at(grid, record, previous, &cumulative)?
                            }
                            None => read_field(grid, record, &hourly)?,
                        }
                    }
                    (None, _) => read_field(grid, record, &hourly)?,
                };

                self.previous_total = Some(total);

                rain
            }
        };

        self.previous_lead = Some(record.lead_time);

        Ok(rain)
    }
}

/// Stacks per lead time fields along the
/// time axis and writes them as one variable.
fn write_stack<D>(
    writer: &mut DatasetWriter,
    spec: &VariableSpec,
    fields: &[Array<Float, D>],
) -> Result<(), RunError>
where
    D: Dimension,
    D::Larger: RemoveAxis,
{
    let views: Vec<ArrayView<Float, D>> = fields.iter().map(|f| f.view()).collect();
    let data = stack(Axis(0), &views)
        .map_err(|_| WriterError::ShapeMismatch(spec.name.to_string()))?;

    writer.create_variable(spec, data.view())?;

    Ok(())
}

/// Source variable names of near-surface temperature and humidity.
fn screen_level_names(model: ModelFamily) -> (&'static str, &'static str) {
    match model {
        ModelFamily::Msm => ("TMP_1D5maboveground", "RH_1D5maboveground"),
        ModelFamily::Gsm => ("TMP_2maboveground", "RH_2maboveground"),
    }
}
