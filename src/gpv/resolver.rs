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

//! Module mapping a forecast lead time onto the archive file
//! (chunk) holding it and the record index inside that file.
//!
//! JMA distributes every model run in several files, each covering
//! a contiguous range of lead times with its own time step. The
//! ranges differ between model families and level types, so each
//! combination has its own table of chunks. A chunk is described by:
//!
//! - the last lead time it is selected for,
//! - the tag used in the file name,
//! - the lead time of its first record (`origin`),
//! - the time step between its records.
//!
//! The record index is then `(lead_time - origin) / step`.

use super::forecast::{ForecastRun, LevelType, ModelFamily};
use crate::constants::SOURCE_PREFIX;
use crate::errors::ResolveError;
use log::debug;

/// Contiguous range of lead times stored in one archive file.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Chunk {
    pub max_lead: u32,
    pub tag: &'static str,
    pub origin: u32,
    pub step: u32,
}

const fn chunk(max_lead: u32, tag: &'static str, origin: u32, step: u32) -> Chunk {
    Chunk {
        max_lead,
        tag,
        origin,
        step,
    }
}

const MSM_SURFACE: [Chunk; 3] = [
    chunk(15, "00-15", 0, 1),
    chunk(33, "16-33", 16, 1),
    chunk(39, "34-39", 34, 1),
];

const MSM_PRESSURE: [Chunk; 3] = [
    chunk(15, "00-15", 0, 3),
    chunk(33, "18-33", 18, 3),
    chunk(39, "36-39", 36, 3),
];

const GSM_SURFACE: [Chunk; 3] = [
    chunk(84, "0000-0312", 0, 1),
    chunk(132, "0315-0512", 87, 3),
    chunk(264, "0515-1100", 135, 3),
];

const GSM_PRESSURE: [Chunk; 3] = [
    chunk(84, "0000-0312", 0, 3),
    chunk(132, "0318-0512", 90, 3),
    chunk(264, "0518-1100", 138, 3),
];

/// Combination of model family and level type,
/// each with its own chunking scheme.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SourceKind {
    MsmSurface,
    MsmPressure,
    GsmSurface,
    GsmPressure,
}

impl SourceKind {
    pub fn new(model: ModelFamily, level: LevelType) -> Self {
        match (model, level) {
            (ModelFamily::Msm, LevelType::Surface) => SourceKind::MsmSurface,
            (ModelFamily::Msm, LevelType::Pressure) => SourceKind::MsmPressure,
            (ModelFamily::Gsm, LevelType::Surface) => SourceKind::GsmSurface,
            (ModelFamily::Gsm, LevelType::Pressure) => SourceKind::GsmPressure,
        }
    }

    pub fn model(self) -> ModelFamily {
        match self {
            SourceKind::MsmSurface | SourceKind::MsmPressure => ModelFamily::Msm,
            SourceKind::GsmSurface | SourceKind::GsmPressure => ModelFamily::Gsm,
        }
    }

    /// Chunks of this kind ordered by lead time.
    pub fn chunks(self) -> &'static [Chunk] {
        match self {
            SourceKind::MsmSurface => &MSM_SURFACE,
            SourceKind::MsmPressure => &MSM_PRESSURE,
            SourceKind::GsmSurface => &GSM_SURFACE,
            SourceKind::GsmPressure => &GSM_PRESSURE,
        }
    }

    /// Finds the chunk and record index holding given lead time.
    ///
    /// Lead times that do not fall on a record of the selected
    /// chunk are rejected instead of silently being mapped
    /// onto a neighbouring record.
    pub fn resolve(self, lead_time: u32) -> Result<(&'static str, usize), ResolveError> {
        let horizon = self.model().horizon();

        if lead_time > horizon {
            return Err(ResolveError::LeadTimeOutOfRange(lead_time, horizon));
        }

        // the last chunk always ends at the horizon
        let chunk = self
            .chunks()
            .iter()
            .find(|c| lead_time <= c.max_lead)
            .ok_or(ResolveError::LeadTimeOutOfRange(lead_time, horizon))?;

        if lead_time < chunk.origin || (lead_time - chunk.origin) % chunk.step != 0 {
            return Err(ResolveError::UnalignedLeadTime {
                lead: lead_time,
                tag: chunk.tag,
                first: chunk.origin,
                step: chunk.step,
            });
        }

        let index = ((lead_time - chunk.origin) / chunk.step) as usize;

        Ok((chunk.tag, index))
    }

    /// Lists all lead times in `start..=end` that have a record.
    pub fn valid_lead_times(self, start: u32, end: u32) -> Vec<u32> {
        let end = end.min(self.model().horizon());

        (start..=end)
            .filter(|&lead| self.resolve(lead).is_ok())
            .collect()
    }

    /// Latest lead time before the given one that has a record.
    pub fn previous_lead_time(self, lead_time: u32) -> Option<u32> {
        (0..lead_time).rev().find(|&lead| self.resolve(lead).is_ok())
    }
}

/// One archive file of a forecast run.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SourceFile {
    pub run: ForecastRun,
    pub model: ModelFamily,
    pub level: LevelType,
    pub tag: &'static str,
}

impl SourceFile {
    fn stem(&self) -> String {
        format!(
            "{}_{}_{}_GPV_Rjp_{}_F{}{}_grib2",
            SOURCE_PREFIX,
            self.run.canonical(),
            self.model.label(),
            self.level.label(),
            self.model.span_flag(),
            self.tag
        )
    }

    /// Name of the GRIB2 file as stored in the archive.
    pub fn packed_name(&self) -> String {
        format!("{}.bin", self.stem())
    }

    /// Name of the NetCDF file produced by conversion.
    pub fn converted_name(&self) -> String {
        format!("{}.nc", self.stem())
    }
}

/// Location of a single lead time inside the archive.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResolvedRecord {
    pub file: SourceFile,
    pub index: usize,
    pub lead_time: u32,
}

/// Resolves the file and record index holding
/// given lead time of a forecast run.
pub fn resolve_record(
    run: ForecastRun,
    model: ModelFamily,
    level: LevelType,
    lead_time: u32,
) -> Result<ResolvedRecord, ResolveError> {
    let (tag, index) = SourceKind::new(model, level).resolve(lead_time)?;

    debug!(
        "Lead time +{}h of {} {} run {} is record {} of chunk {}",
        lead_time, model, level, run, index, tag
    );

    Ok(ResolvedRecord {
        file: SourceFile {
            run,
            model,
            level,
            tag,
        },
        index,
        lead_time,
    })
}
