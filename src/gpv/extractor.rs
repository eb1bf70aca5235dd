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

//! Module responsible for extracting physical fields
//! from resolved records.
//!
//! Every field is `raw * scale + offset`, except precipitation
//! which depends on model family and lead time:
//!
//! - lead time 0 has no precipitation upstream so zeros are returned,
//! - MSM records are already hourly and are used directly,
//! - GSM records are cumulative, they are de-accumulated by subtracting
//!   the previous record unless cumulative values are requested.

use super::forecast::ModelFamily;
use super::reader::RecordSource;
use super::resolver::ResolvedRecord;
use crate::constants::PRECIPITATION_VAR;
use crate::errors::ReaderError;
use crate::Float;
use log::debug;
use ndarray::Array2;

/// Named field to extract with its unit conversion.
#[derive(Clone, PartialEq, Debug)]
pub struct FieldRequest {
    name: String,
    scale: Float,
    offset: Float,
    cumulative: bool,
}

impl FieldRequest {
    pub fn new(name: &str) -> Self {
        FieldRequest {
            name: name.to_string(),
            scale: 1.0,
            offset: 0.0,
            cumulative: false,
        }
    }

    pub fn scale(mut self, scale: Float) -> Self {
        self.scale = scale;
        self
    }

    pub fn offset(mut self, offset: Float) -> Self {
        self.offset = offset;
        self
    }

    /// Keep GSM precipitation cumulative since the run start.
    /// Has no effect on other fields or on MSM.
    pub fn cumulative(mut self, cumulative: bool) -> Self {
        self.cumulative = cumulative;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, raw: Array2<Float>) -> Array2<Float> {
        raw * self.scale + self.offset
    }
}

/// Reads requested field at the resolved record.
pub fn read_field<S: RecordSource>(
    source: &S,
    record: &ResolvedRecord,
    request: &FieldRequest,
) -> Result<Array2<Float>, ReaderError> {
    debug!(
        "Reading {} at +{}h (record {})",
        request.name, record.lead_time, record.index
    );

    if request.name != PRECIPITATION_VAR {
        let raw = source.record(&request.name, record.index)?;
        return Ok(request.apply(raw));
    }

    if record.lead_time == 0 {
        return Ok(Array2::zeros(source.shape()));
    }

    match record.file.model {
        ModelFamily::Msm => {
            let raw = source.record(&request.name, record.index)?;
            Ok(request.apply(raw))
        }
        ModelFamily::Gsm if record.lead_time == 1 || request.cumulative => {
            let raw = source.record(&request.name, record.index)?;
            Ok(request.apply(raw))
        }
        ModelFamily::Gsm => {
            if record.index == 0 {
                return Err(ReaderError::NoPreviousRecord(record.lead_time));
            }

            let current = source.record(&request.name, record.index)?;
            let previous = source.record(&request.name, record.index - 1)?;

            Ok(request.apply(current - previous))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{read_field, FieldRequest};
    use crate::errors::ReaderError;
    use crate::gpv::forecast::{ForecastRun, LevelType, ModelFamily};
    use crate::gpv::reader::RecordSource;
    use crate::gpv::resolver::{resolve_record, ResolvedRecord};
    use crate::Float;
    use float_cmp::approx_eq;
    use ndarray::Array2;
    use rustc_hash::FxHashMap;

    /// Source where every record is a constant field.
    struct MemorySource {
        shape: (usize, usize),
        variables: FxHashMap<String, Vec<Float>>,
    }

    impl MemorySource {
        fn new(shape: (usize, usize)) -> Self {
            MemorySource {
                shape,
                variables: FxHashMap::default(),
            }
        }

        fn with(mut self, name: &str, records: &[Float]) -> Self {
            self.variables.insert(name.to_string(), records.to_vec());
            self
        }
    }

    impl RecordSource for MemorySource {
        fn shape(&self) -> (usize, usize) {
            self.shape
        }

        fn record_count(&self) -> usize {
            self.variables.values().map(Vec::len).max().unwrap_or(0)
        }

        fn record(&self, name: &str, index: usize) -> Result<Array2<Float>, ReaderError> {
            let records = self
                .variables
                .get(name)
                .ok_or_else(|| ReaderError::MissingVariable(name.to_string()))?;

            let value = records
                .get(index)
                .ok_or(ReaderError::RecordOutOfRange(index, records.len()))?;

            Ok(Array2::from_elem(self.shape, *value))
        }
    }

    fn record(model: ModelFamily, lead_time: u32) -> ResolvedRecord {
        let run: ForecastRun = "20220623000000".parse().unwrap();
        resolve_record(run, model, LevelType::Surface, lead_time).unwrap()
    }

    fn all_close(field: &Array2<Float>, expected: Float) -> bool {
        field
            .iter()
            .all(|v| approx_eq!(Float, *v, expected, epsilon = 1e-12))
    }

    #[test]
    fn gsm_precipitation_is_deaccumulated() {
        let source = MemorySource::new((2, 3)).with("APCP_surface", &[0.0, 2.0, 5.0, 5.0]);

        let lead_2 = read_field(
            &source,
            &record(ModelFamily::Gsm, 2),
            &FieldRequest::new("APCP_surface"),
        )
        .unwrap();
        let lead_3 = read_field(
            &source,
            &record(ModelFamily::Gsm, 3),
            &FieldRequest::new("APCP_surface"),
        )
        .unwrap();

        assert!(all_close(&lead_2, 3.0));
        assert!(all_close(&lead_3, 0.0));
    }

    #[test]
    fn gsm_precipitation_first_hour_and_cumulative() {
        let source = MemorySource::new((2, 3)).with("APCP_surface", &[0.0, 2.0, 5.0, 5.0]);

        let first = read_field(
            &source,
            &record(ModelFamily::Gsm, 1),
            &FieldRequest::new("APCP_surface"),
        )
        .unwrap();
        let total = read_field(
            &source,
            &record(ModelFamily::Gsm, 3),
            &FieldRequest::new("APCP_surface").cumulative(true),
        )
        .unwrap();

        assert!(all_close(&first, 2.0));
        assert!(all_close(&total, 5.0));
    }

    #[test]
    fn precipitation_at_analysis_time_is_zero() {
        let source = MemorySource::new((4, 5)).with("APCP_surface", &[7.0, 2.0, 5.0]);
        let request = FieldRequest::new("APCP_surface").scale(10.0).offset(1.0);

        for model in [ModelFamily::Gsm, ModelFamily::Msm] {
            let field = read_field(&source, &record(model, 0), &request).unwrap();

            assert_eq!(field.dim(), (4, 5));
            assert!(all_close(&field, 0.0));
        }
    }

    #[test]
    fn msm_precipitation_is_not_deaccumulated() {
        let source = MemorySource::new((2, 2)).with("APCP_surface", &[0.0, 2.0, 5.0, 5.0]);

        let field = read_field(
            &source,
            &record(ModelFamily::Msm, 3),
            &FieldRequest::new("APCP_surface"),
        )
        .unwrap();

        assert!(all_close(&field, 5.0));
    }

    #[test]
    fn scale_and_offset_are_applied() {
        let source = MemorySource::new((2, 2))
            .with("PRMSL_meansealevel", &[101_000.0, 101_300.0])
            .with("TMP_1D5maboveground", &[293.15, 300.0]);

        let mslp = read_field(
            &source,
            &record(ModelFamily::Msm, 1),
            &FieldRequest::new("PRMSL_meansealevel").scale(0.01),
        )
        .unwrap();
        let temp = read_field(
            &source,
            &record(ModelFamily::Msm, 0),
            &FieldRequest::new("TMP_1D5maboveground").offset(-273.15),
        )
        .unwrap();

        assert!(all_close(&mslp, 1013.0));
        assert!(all_close(&temp, 20.0));
    }

    #[test]
    fn gsm_deaccumulation_across_files_is_rejected() {
        let source = MemorySource::new((1, 1)).with("APCP_surface", &[10.0, 11.0]);

        let result = read_field(
            &source,
            &record(ModelFamily::Gsm, 87),
            &FieldRequest::new("APCP_surface"),
        );

        assert!(matches!(result, Err(ReaderError::NoPreviousRecord(87))));
    }

    #[test]
    fn missing_variable_is_reported() {
        let source = MemorySource::new((1, 1));

        let result = read_field(
            &source,
            &record(ModelFamily::Msm, 5),
            &FieldRequest::new("UGRD_10maboveground"),
        );

        assert!(matches!(result, Err(ReaderError::MissingVariable(_))));
    }
}
