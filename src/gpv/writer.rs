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

//! Module responsible for writing analysis-ready NetCDF datasets.
//!
//! Datasets are built in order: global attributes, axes (each axis
//! defines a dimension of the same name), then variables over those
//! dimensions.

use crate::constants::UNDEFINED_THRESHOLD;
use crate::errors::WriterError;
use crate::Float;
use chrono::Utc;
use log::debug;
use ndarray::{ArrayView, Dimension};
use std::{
    fs,
    path::{Path, PathBuf},
};
use uuid::Uuid;

const MAX_RANK: usize = 4;

/// Global attributes of the dataset.
///
/// `tracking_id` and `creation_date` are generated on write.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct GlobalAttributes {
    pub product: String,
    pub conventions: String,
    pub dataset: String,
    pub source: String,
    pub history: String,
    pub comment: String,
    pub references: String,
}

/// Coordinate axis description.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AxisSpec {
    pub name: &'static str,
    pub axis: &'static str,
    pub standard_name: &'static str,
    pub long_name: &'static str,
    pub units: &'static str,
    pub valid_range: Option<(Float, Float)>,
    pub positive: Option<&'static str>,
    pub calendar: Option<&'static str>,
}

/// Data variable description.
#[derive(Clone, PartialEq, Debug)]
pub struct VariableSpec {
    pub name: &'static str,
    pub dimensions: &'static [&'static str],
    pub standard_name: &'static str,
    pub long_name: &'static str,
    pub units: &'static str,
    pub valid_range: Option<(Float, Float)>,
    pub scale_factor: Float,
    pub add_offset: Float,
    pub missing_value: Float,
}

impl Default for VariableSpec {
    fn default() -> Self {
        VariableSpec {
            name: "var",
            dimensions: &[],
            standard_name: "N/A",
            long_name: "N/A",
            units: "",
            valid_range: None,
            scale_factor: 1.0,
            add_offset: 0.0,
            missing_value: 1e20,
        }
    }
}

/// NetCDF file being written.
pub struct DatasetWriter {
    file: netcdf::FileMut,
    path: PathBuf,
}

impl DatasetWriter {
    /// Creates new file, an existing one is
    /// replaced only when `overwrite` is set.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self, WriterError> {
        if path.exists() {
            if !overwrite {
                return Err(WriterError::AlreadyExists(path.to_path_buf()));
            }

            fs::remove_file(path)?;
        }

        debug!("Creating {}", path.display());

        let file = netcdf::create(path)?;

        Ok(DatasetWriter {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn set_global_attributes(&mut self, attrs: &GlobalAttributes) -> Result<(), WriterError> {
        let creation_date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let tracking_id = Uuid::new_v4().to_string();

        self.file.add_attribute("product", attrs.product.as_str())?;
        self.file.add_attribute("Conventions", attrs.conventions.as_str())?;
        self.file.add_attribute("dataset", attrs.dataset.as_str())?;
        self.file.add_attribute("source", attrs.source.as_str())?;
        self.file.add_attribute("history", attrs.history.as_str())?;
        self.file.add_attribute("comment", attrs.comment.as_str())?;
        self.file.add_attribute("references", attrs.references.as_str())?;
        self.file.add_attribute("tracking_id", tracking_id.as_str())?;
        self.file.add_attribute("creation_date", creation_date.as_str())?;

        Ok(())
    }

    /// Defines a dimension and its coordinate variable.
    pub fn create_axis(&mut self, spec: &AxisSpec, values: &[Float]) -> Result<(), WriterError> {
        self.file.add_dimension(spec.name, values.len())?;

        let mut var = self.file.add_variable::<Float>(spec.name, &[spec.name])?;

        var.put_attribute("axis", spec.axis)?;
        var.put_attribute("standard_name", spec.standard_name)?;
        var.put_attribute("long_name", spec.long_name)?;
        var.put_attribute("units", spec.units)?;

        if let Some((min, max)) = spec.valid_range {
            var.put_attribute("valid_min", min)?;
            var.put_attribute("valid_max", max)?;
        }

        if let Some(positive) = spec.positive {
            var.put_attribute("positive", positive)?;
        }

        if let Some(calendar) = spec.calendar {
            var.put_attribute("calendar", calendar)?;
        }

        var.put_values(values, ..)?;

        debug!("Written axis {} ({})", spec.name, values.len());

        Ok(())
    }

    /// Writes a variable of 1 to 4 dimensions. Undefined input values
    /// (NaN or the converter's undefined marker) are stored as
    /// `missing_value`.
    pub fn create_variable<D: Dimension>(
        &mut self,
        spec: &VariableSpec,
        data: ArrayView<Float, D>,
    ) -> Result<(), WriterError> {
        let rank = spec.dimensions.len();

        if rank == 0 || rank > MAX_RANK {
            return Err(WriterError::UnsupportedRank(spec.name.to_string()));
        }

        let mut expected_shape = Vec::with_capacity(rank);

        for dim_name in spec.dimensions {
            let len = self
                .file
                .dimension(dim_name)
                .map(|dim| dim.len())
                .ok_or_else(|| WriterError::UndefinedDimension(dim_name.to_string()))?;
            expected_shape.push(len);
        }

        if data.shape() != expected_shape.as_slice() {
            return Err(WriterError::ShapeMismatch(spec.name.to_string()));
        }

        let values: Vec<Float> = data
            .iter()
            .map(|&v| {
                if v.is_nan() || v.abs() >= UNDEFINED_THRESHOLD {
                    spec.missing_value
                } else {
                    v
                }
            })
            .collect();

        let mut var = self.file.add_variable::<Float>(spec.name, spec.dimensions)?;

        var.put_attribute("_FillValue", spec.missing_value)?;
        var.put_attribute("missing_value", spec.missing_value)?;
        var.put_attribute("scale_factor", spec.scale_factor)?;
        var.put_attribute("add_offset", spec.add_offset)?;
        var.put_attribute("standard_name", spec.standard_name)?;
        var.put_attribute("long_name", spec.long_name)?;
        var.put_attribute("units", spec.units)?;

        if let Some((min, max)) = spec.valid_range {
            var.put_attribute("valid_min", min)?;
            var.put_attribute("valid_max", max)?;
        }

        var.put_values(&values, ..)?;

        debug!("Written variable {} {:?}", spec.name, data.shape());

        Ok(())
    }

    /// Flushes and closes the file, returning its path.
    pub fn close(self) -> PathBuf {
        debug!("Closing {}", self.path.display());
        drop(self.file);

        self.path
    }
}
