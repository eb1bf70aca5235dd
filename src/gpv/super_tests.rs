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

//! Tests running whole products on synthetic converted files.

use crate::gpv::configuration::Config;
use crate::gpv::forecast::{LevelType, ModelFamily};
use crate::gpv::products;
use crate::gpv::reader::{GridFile, RecordSource};
use crate::gpv::resolver::resolve_record;
use crate::gpv::retrieval::Retriever;
use crate::gpv::thermo::equivalent_potential_temperature;
use crate::gpv::writer::{AxisSpec, DatasetWriter, GlobalAttributes, VariableSpec};
use crate::Float;
use float_cmp::approx_eq;
use ndarray::{Array3, Array4};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RUN: &str = "20220623000000";
const DIMS: &[&str] = &["time", "latitude", "longitude"];
const SHAPE: (usize, usize) = (3, 4);

const SURFACE_VARS: &[&str] = &[
    "PRMSL_meansealevel",
    "APCP_surface",
    "TMP_1D5maboveground",
    "RH_1D5maboveground",
    "TMP_2maboveground",
    "RH_2maboveground",
    "UGRD_10maboveground",
    "VGRD_10maboveground",
    "LCDC_surface",
    "MCDC_surface",
    "HCDC_surface",
    "TCDC_surface",
    "DSWRF_surface",
];

const PRESSURE_LEVELS: &[u32] = &[
    1000, 975, 950, 925, 900, 850, 800, 700, 600, 500, 400, 300, 250, 200, 150, 100,
];

fn pressure_vars() -> Vec<String> {
    let mut names = Vec::new();

    for source in ["TMP", "RH", "UGRD", "VGRD", "VVEL", "HGT"] {
        // humidity only up to 300 hPa
        let count = if source == "RH" { 12 } else { PRESSURE_LEVELS.len() };

        for level in &PRESSURE_LEVELS[..count] {
            names.push(format!("{}_{}mb", source, level));
        }
    }

    names
}

/// Writes a converted surface source file holding records for given
/// lead times, values are computed from variable name and lead time.
fn write_source(
    dir: &Path,
    model: ModelFamily,
    lead_times: &[u32],
    value: impl Fn(&str, u32) -> Float,
) -> PathBuf {
    let names: Vec<String> = SURFACE_VARS.iter().map(|n| n.to_string()).collect();

    write_level_source(dir, model, LevelType::Surface, &names, lead_times, value)
}

fn write_level_source(
    dir: &Path,
    model: ModelFamily,
    level: LevelType,
    names: &[String],
    lead_times: &[u32],
    value: impl Fn(&str, u32) -> Float,
) -> PathBuf {
    let run = RUN.parse().unwrap();
    let file = resolve_record(run, model, level, lead_times[0])
        .unwrap()
        .file;
    let path = dir.join(file.converted_name());

    let mut writer = DatasetWriter::create(&path, false).unwrap();
    writer
        .set_global_attributes(&GlobalAttributes::default())
        .unwrap();

    let times: Vec<Float> = lead_times.iter().map(|&l| Float::from(l) * 3600.0).collect();
    writer
        .create_axis(
            &AxisSpec {
                name: "time",
                ..AxisSpec::default()
            },
            &times,
        )
        .unwrap();
    writer
        .create_axis(
            &AxisSpec {
                name: "latitude",
                ..AxisSpec::default()
            },
            &[35.1, 35.0, 34.9],
        )
        .unwrap();
    writer
        .create_axis(
            &AxisSpec {
                name: "longitude",
                ..AxisSpec::default()
            },
            &[135.0, 135.125, 135.25, 135.375],
        )
        .unwrap();

    for name in names {
        let data = Array3::from_shape_fn((lead_times.len(), SHAPE.0, SHAPE.1), |(t, _, _)| {
            value(name, lead_times[t])
        });

        // variable names of the writer are static
        let name: &'static str = Box::leak(name.clone().into_boxed_str());

        writer
            .create_variable(
                &VariableSpec {
                    name,
                    dimensions: DIMS,
                    ..VariableSpec::default()
                },
                data.view(),
            )
            .unwrap();
    }

    writer.close();

    path
}

fn msm_value(name: &str, lead_time: u32) -> Float {
    let lead = Float::from(lead_time);

    match name {
        "PRMSL_meansealevel" => 101_300.0 + 100.0 * lead,
        "APCP_surface" => lead,
        "TMP_1D5maboveground" => 293.15,
        "UGRD_10maboveground" => 3.0,
        "VGRD_10maboveground" => 4.0,
        _ => 50.0,
    }
}

fn config(source: &Path, output: &Path, model: &str, product: &str, lead_times: &str) -> Config {
    let yaml = format!(
        "run:\n  base_time: {}\n  model: {}\n  source: {}\n  lead_times: {}\nproduct: {}\nstation:\n  name: kobe\n  lon: 135.2\n  lat: 34.95\noutput:\n  directory: {}\n",
        RUN,
        model,
        source.display(),
        lead_times,
        product,
        output.display()
    );

    Config::new_from_slice(yaml.as_bytes()).unwrap()
}

fn run_product(config: &Config) -> PathBuf {
    let spec = config.run_spec().unwrap();
    let retriever = Retriever::from_archive(&config.archive);

    products::run(&spec, config, &retriever).unwrap()
}

#[test]
fn msm_surface_dataset() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_source(source.path(), ModelFamily::Msm, &(0..=15).collect::<Vec<u32>>(), msm_value);

    let config = config(
        source.path(),
        output.path(),
        "MSM",
        "surface_dataset",
        "{start: 0, end: 2}",
    );
    let path = run_product(&config);

    let dataset = GridFile::open(&path).unwrap();
    assert_eq!(dataset.record_count(), 3);
    assert_eq!(dataset.shape(), SHAPE);

    let rain = dataset.record("rain", 0).unwrap();
    assert!(rain.iter().all(|&v| approx_eq!(Float, v, 0.0, ulps = 2)));

    let rain = dataset.record("rain", 2).unwrap();
    assert!(rain.iter().all(|&v| approx_eq!(Float, v, 2.0, ulps = 2)));

    let mslp = dataset.record("mslp", 1).unwrap();
    assert!(mslp.iter().all(|&v| approx_eq!(Float, v, 1014.0, epsilon = 1e-9)));

    let tmp = dataset.record("tmp", 0).unwrap();
    assert!(tmp.iter().all(|&v| approx_eq!(Float, v, 20.0, epsilon = 1e-9)));

    let wspd = dataset.record("wspd", 0).unwrap();
    assert!(wspd.iter().all(|&v| approx_eq!(Float, v, 5.0, ulps = 2)));

    dataset.close();
}

#[test]
fn msm_rain_sum() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_source(source.path(), ModelFamily::Msm, &(0..=15).collect::<Vec<u32>>(), msm_value);

    let config = config(source.path(), output.path(), "MSM", "rain_sum", "3");
    let path = run_product(&config);

    let dataset = GridFile::open(&path).unwrap();
    assert_eq!(dataset.record_count(), 1);

    // 0 + 1 + 2 + 3
    let total = dataset.record("rain_sum", 0).unwrap();
    assert!(total.iter().all(|&v| approx_eq!(Float, v, 6.0, ulps = 2)));

    let mslp = dataset.record("mslp", 0).unwrap();
    assert!(mslp.iter().all(|&v| approx_eq!(Float, v, 1016.0, epsilon = 1e-9)));

    dataset.close();
}

#[test]
fn gsm_rain_across_source_files() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    // cumulative precipitation grows by 2 mm every hour
    let gsm_value = |name: &str, lead_time: u32| match name {
        "APCP_surface" => 2.0 * Float::from(lead_time),
        _ => msm_value(name, lead_time),
    };

    write_source(source.path(), ModelFamily::Gsm, &(0..=84).collect::<Vec<u32>>(), gsm_value);
    write_source(
        source.path(),
        ModelFamily::Gsm,
        &(87..=132).step_by(3).collect::<Vec<u32>>(),
        gsm_value,
    );

    let config = config(
        source.path(),
        output.path(),
        "GSM",
        "surface_dataset",
        "{start: 84, end: 90, step: 3}",
    );
    let path = run_product(&config);

    let dataset = GridFile::open(&path).unwrap();
    let expected = [2.0, 6.0, 6.0];

    for (index, expected) in expected.iter().enumerate() {
        let rain = dataset.record("rain", index).unwrap();
        assert!(rain.iter().all(|&v| approx_eq!(Float, v, *expected, ulps = 2)));
    }

    dataset.close();

    let config = config_with_product(&config, "rain_sum");
    let total = GridFile::open(&run_product(&config)).unwrap();
    let total_rain = total.record("rain_sum", 0).unwrap();
    assert!(total_rain.iter().all(|&v| approx_eq!(Float, v, 180.0, ulps = 2)));
    total.close();
}

fn config_with_product(config: &Config, product: &str) -> Config {
    let mut config = config.clone();
    config.product = product.to_string();
    config
}

#[test]
fn msm_point_series() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_source(source.path(), ModelFamily::Msm, &(0..=15).collect::<Vec<u32>>(), msm_value);

    let config = config(
        source.path(),
        output.path(),
        "MSM",
        "point_series",
        "{start: 0, end: 5}",
    );
    let path = run_product(&config);

    assert!(path.ends_with("point_series_MSM_20220623000000_kobe.csv"));

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

    assert_eq!(rows.len(), 6);
    assert_eq!(&rows[0][0], "2022-06-23T00:00:00Z");
    assert_eq!(&rows[5][1], "5");
    assert_eq!(rows[5][3].parse::<Float>().unwrap(), 5.0);
    assert_eq!(rows[5][8].parse::<Float>().unwrap(), 5.0);

    // existing output is kept unless overwrite is set
    let spec = config.run_spec().unwrap();
    let retriever = Retriever::from_archive(&config.archive);
    assert!(products::run(&spec, &config, &retriever).is_err());
}

fn with_pressure_level(config: Config) -> Config {
    let mut config = config;
    config.run.level = "pressure".to_string();
    config
}

#[test]
fn msm_rain_over_several_hours() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_source(source.path(), ModelFamily::Msm, &(0..=15).collect::<Vec<u32>>(), msm_value);
    write_source(source.path(), ModelFamily::Msm, &(16..=33).collect::<Vec<u32>>(), msm_value);

    let three_hourly = config(
        source.path(),
        output.path(),
        "MSM",
        "surface_dataset",
        "{start: 0, end: 6, step: 3}",
    );
    let dataset = GridFile::open(&run_product(&three_hourly)).unwrap();

    // 0, 1 + 2 + 3, 4 + 5 + 6
    for (index, expected) in [0.0, 6.0, 15.0].iter().enumerate() {
        let rain = dataset.record("rain", index).unwrap();
        assert!(rain.iter().all(|&v| approx_eq!(Float, v, *expected, ulps = 2)));
    }

    dataset.close();

    // hours 13 to 15 are held by another file than hour 18
    let output = TempDir::new().unwrap();
    let six_hourly = config(
        source.path(),
        output.path(),
        "MSM",
        "surface_dataset",
        "{start: 12, end: 18, step: 6}",
    );
    let dataset = GridFile::open(&run_product(&six_hourly)).unwrap();

    for (index, expected) in [12.0, 93.0].iter().enumerate() {
        let rain = dataset.record("rain", index).unwrap();
        assert!(rain.iter().all(|&v| approx_eq!(Float, v, *expected, ulps = 2)));
    }

    dataset.close();
}

#[test]
fn gsm_rain_from_chunk_origin() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let gsm_value = |name: &str, lead_time: u32| match name {
        "APCP_surface" => 2.0 * Float::from(lead_time),
        _ => msm_value(name, lead_time),
    };

    write_source(source.path(), ModelFamily::Gsm, &(0..=84).collect::<Vec<u32>>(), gsm_value);
    write_source(
        source.path(),
        ModelFamily::Gsm,
        &(87..=132).step_by(3).collect::<Vec<u32>>(),
        gsm_value,
    );

    let config = config(
        source.path(),
        output.path(),
        "GSM",
        "surface_dataset",
        "{start: 87, end: 93, step: 3}",
    );
    let dataset = GridFile::open(&run_product(&config)).unwrap();
    assert_eq!(dataset.record_count(), 3);

    for index in 0..3 {
        let rain = dataset.record("rain", index).unwrap();
        assert!(rain.iter().all(|&v| approx_eq!(Float, v, 6.0, ulps = 2)));
    }

    dataset.close();

    let config = config_with_product(&config, "point_series");
    let mut reader = csv::Reader::from_path(run_product(&config)).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][3].parse::<Float>().unwrap(), 6.0);
}

fn pressure_value(name: &str, lead_time: u32) -> Float {
    let lead = Float::from(lead_time);

    match name {
        "TMP_850mb" => 280.0,
        // colder than -41 degC
        "TMP_500mb" => 228.0,
        "RH_300mb" => 40.0,
        "HGT_500mb" => 5500.0 + lead,
        _ if name.starts_with("TMP_") => 250.0 + lead,
        _ if name.starts_with("RH_") => 50.0,
        _ => 1.0,
    }
}

#[test]
fn msm_ept_with_cold_upper_air() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_level_source(
        source.path(),
        ModelFamily::Msm,
        LevelType::Pressure,
        &pressure_vars(),
        &[0, 3, 6, 9, 12, 15],
        pressure_value,
    );

    let config = with_pressure_level(config(
        source.path(),
        output.path(),
        "MSM",
        "ept",
        "{start: 0, end: 6}",
    ));
    let dataset = GridFile::open(&run_product(&config)).unwrap();
    assert_eq!(dataset.record_count(), 3);

    let expected_850 = equivalent_potential_temperature(85_000.0, 280.0, 50.0).unwrap();
    let expected_500 = equivalent_potential_temperature(50_000.0, 228.0, 50.0).unwrap();

    let ept_850 = dataset.record("ept_850", 2).unwrap();
    let ept_500 = dataset.record("ept_500", 2).unwrap();
    let sept_500 = dataset.record("sept_500", 2).unwrap();
    let stability = dataset.record("stability", 2).unwrap();
    let hgt = dataset.record("hgt_500", 2).unwrap();

    assert!(ept_850.iter().all(|&v| approx_eq!(Float, v, expected_850, ulps = 4)));
    assert!(ept_500.iter().all(|&v| approx_eq!(Float, v, expected_500, ulps = 4)));
    assert!(sept_500.iter().zip(ept_500.iter()).all(|(s, e)| s > e));
    assert!(stability
        .iter()
        .all(|&v| approx_eq!(Float, v, expected_500 - expected_850, epsilon = 1e-9)));
    assert!(hgt.iter().all(|&v| approx_eq!(Float, v, 5506.0, ulps = 2)));

    dataset.close();
}

#[test]
fn msm_pressure_dataset() {
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_level_source(
        source.path(),
        ModelFamily::Msm,
        LevelType::Pressure,
        &pressure_vars(),
        &[0, 3, 6, 9, 12, 15],
        pressure_value,
    );

    let config = with_pressure_level(config(
        source.path(),
        output.path(),
        "MSM",
        "pressure_dataset",
        "{start: 0, end: 3}",
    ));
    let path = run_product(&config);

    let file = netcdf::open(&path).unwrap();
    let shape = (2, PRESSURE_LEVELS.len(), SHAPE.0, SHAPE.1);

    let level = file.variable("level").unwrap();
    let levels: Vec<Float> = level.get_values(..).unwrap();
    assert_eq!(levels.len(), PRESSURE_LEVELS.len());
    assert!(approx_eq!(Float, levels[0], 1000.0, ulps = 2));
    assert!(matches!(
        level.attribute("positive").unwrap().value().unwrap(),
        netcdf::AttributeValue::Str(positive) if positive == "down"
    ));

    let tmp = file.variable("tmp").unwrap();
    assert_eq!(tmp.dimensions().len(), 4);
    let tmp = Array4::from_shape_vec(shape, tmp.get_values::<Float, _>(..).unwrap()).unwrap();
    assert!(approx_eq!(Float, tmp[[1, 0, 0, 0]], 253.0, ulps = 2));
    assert!(approx_eq!(Float, tmp[[1, 9, 2, 3]], 228.0, ulps = 2));

    let rh = file.variable("rh").unwrap();
    let rh = Array4::from_shape_vec(shape, rh.get_values::<Float, _>(..).unwrap()).unwrap();
    assert!(approx_eq!(Float, rh[[0, 0, 1, 1]], 50.0, ulps = 2));
    assert!(approx_eq!(Float, rh[[0, 11, 1, 1]], 40.0, ulps = 2));
    // above 300 hPa humidity is missing
    assert!(approx_eq!(Float, rh[[0, 12, 1, 1]], 1e20, ulps = 2));
}
