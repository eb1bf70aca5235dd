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

//! Module responsible for reading converted source files.
//!
//! A [`GridFile`] is opened for one resolved source file, read from
//! by the extractor, and closed explicitly before the next lead time.

use crate::errors::ReaderError;
use crate::Float;
use log::{debug, info};
use ndarray::{stack, Array1, Array2, Axis};
use std::path::{Path, PathBuf};

/// Anything that can serve 2D records of named variables.
///
/// Records are `(latitude, longitude)` slices of
/// `(time, latitude, longitude)` variables.
pub trait RecordSource {
    fn shape(&self) -> (usize, usize);
    fn record_count(&self) -> usize;
    fn record(&self, name: &str, index: usize) -> Result<Array2<Float>, ReaderError>;
}

/// One-dimensional coordinate axes of the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridAxes {
    pub lons: Array1<Float>,
    pub lats: Array1<Float>,
}

impl GridAxes {
    /// Expands axes into two `(lat, lon)` shaped arrays, every row of the
    /// longitude mesh is the longitude axis and every column of the
    /// latitude mesh is the latitude axis.
    pub fn mesh(&self) -> Result<(Array2<Float>, Array2<Float>), ReaderError> {
        let lon_rows = vec![self.lons.view(); self.lats.len()];
        let lat_cols = vec![self.lats.view(); self.lons.len()];

        let lon_mesh = stack(Axis(0), &lon_rows)?;
        let lat_mesh = stack(Axis(1), &lat_cols)?;

        Ok((lon_mesh, lat_mesh))
    }
}

/// Open converted (NetCDF) source file.
pub struct GridFile {
    file: netcdf::File,
    path: PathBuf,
    axes: GridAxes,
    record_count: usize,
}

impl GridFile {
    /// Opens the file and reads its coordinate axes.
    ///
    /// Fails when `longitude`, `latitude` or `time` dimension or
    /// coordinate variable is missing or inconsistent.
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        debug!("Opening {}", path.display());

        let file = netcdf::open(path)?;

        let lon_len = dimension_len(&file, "longitude")?;
        let lat_len = dimension_len(&file, "latitude")?;
        let record_count = dimension_len(&file, "time")?;

        let lons = read_axis(&file, "longitude", lon_len)?;
        let lats = read_axis(&file, "latitude", lat_len)?;

        info!(
            "Opened {}: num_lon = {}, num_lat = {}, num_time = {}",
            path.display(),
            lon_len,
            lat_len,
            record_count
        );

        Ok(GridFile {
            file,
            path: path.to_path_buf(),
            axes: GridAxes { lons, lats },
            record_count,
        })
    }

    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    pub fn mesh(&self) -> Result<(Array2<Float>, Array2<Float>), ReaderError> {
        self.axes.mesh()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the underlying file.
    pub fn close(self) {
        debug!("Closing {}", self.path.display());
        drop(self.file);
    }
}

impl RecordSource for GridFile {
    fn shape(&self) -> (usize, usize) {
        (self.axes.lats.len(), self.axes.lons.len())
    }

    fn record_count(&self) -> usize {
        self.record_count
    }

    fn record(&self, name: &str, index: usize) -> Result<Array2<Float>, ReaderError> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| ReaderError::MissingVariable(name.to_string()))?;

        if var.dimensions().len() != 3 {
            return Err(ReaderError::BadShape(name.to_string()));
        }

        if index >= self.record_count {
            return Err(ReaderError::RecordOutOfRange(index, self.record_count));
        }

        let values: Vec<Float> = var.get_values((index, .., ..))?;
        let record = Array2::from_shape_vec(self.shape(), values)?;

        Ok(record)
    }
}

fn dimension_len(file: &netcdf::File, name: &'static str) -> Result<usize, ReaderError> {
    file.dimension(name)
        .map(|dim| dim.len())
        .ok_or(ReaderError::MissingDimension(name))
}

fn read_axis(file: &netcdf::File, name: &str, len: usize) -> Result<Array1<Float>, ReaderError> {
    let var = file
        .variable(name)
        .ok_or_else(|| ReaderError::MissingVariable(name.to_string()))?;

    let values: Vec<Float> = var.get_values(..)?;

    if values.len() != len {
        return Err(ReaderError::BadShape(name.to_string()));
    }

    Ok(Array1::from(values))
}
