use crate::accessor::DatasetAccessor;
use crate::axis;
use crate::cf::AxisRole;
use crate::classify::classify;
use crate::config::ConversionConfig;
use crate::error::{GridMetaError, Result};
use crate::grid;
use crate::projection;
use crate::prompt::PromptProvider;
use crate::schema::{Dataset, DatasetParts, ProjectionSpec};
use tracing::info;

/// Data variables left after skipping, in accessor order.
pub fn select_variables(
    accessor: &dyn DatasetAccessor,
    config: &ConversionConfig,
    prompts: &mut dyn PromptProvider,
) -> Result<Vec<String>> {
    let all = accessor.data_variable_names();

    let skipped = match &config.skip {
        Some(skip) => {
            if let Some(unknown) = skip.iter().find(|name| !all.contains(name)) {
                return Err(GridMetaError::Config(format!(
                    "cannot skip '{}': no such data variable",
                    unknown
                )));
            }
            skip.clone()
        }
        None => prompts.ask_checklist("Select variables to skip:", &all)?,
    };

    Ok(all.into_iter().filter(|name| !skipped.contains(name)).collect())
}

/// Infer, classify and validate. Nothing is written; on any error no
/// metadata exists.
pub fn convert(
    accessor: &dyn DatasetAccessor,
    prompts: &mut dyn PromptProvider,
    config: &ConversionConfig,
) -> Result<Dataset> {
    let nx = axis::axis_count(accessor, AxisRole::Longitude)?;
    let ny = axis::axis_count(accessor, AxisRole::Latitude)?;
    let times = axis::resolve_times(accessor)?;
    let levels = axis::resolve_levels(accessor)?;
    info!(nx, ny, times = times.len(), levels = levels.len(), "resolved axes");

    let projection = projection::resolve(accessor, prompts, config.lonlat)?;
    let xwrap = match &projection {
        ProjectionSpec::LonLat(p) => grid::is_periodic(p.start_lon, p.dlon, nx),
        _ => false,
    };

    let retained = select_variables(accessor, config, prompts)?;
    let classification = classify(accessor, &retained, config, prompts)?;
    info!(
        datavars = classification.datavars.len(),
        vectors = classification.vectors.len(),
        xwrap,
        "classified variables"
    );

    Dataset::build(DatasetParts {
        nx,
        ny,
        times,
        levels,
        datavars: classification.datavars,
        vectors: classification.vectors,
        xwrap,
        islonlat: None,
        projection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::MemoryDataset;
    use crate::config::{DescriptorOverride, VectorOverride};
    use crate::metadata::AttributeValue;
    use crate::prompt::{AcceptDefaults, ScriptedPrompt};

    fn global_grid() -> MemoryDataset {
        MemoryDataset::new()
            .with_axis(
                "lon",
                (0..36).map(|i| i as f64 * 10.0).collect(),
                &[("units", "degrees_east".into())],
            )
            .with_axis(
                "lat",
                (0..19).map(|i| -90.0 + i as f64 * 10.0).collect(),
                &[("units", "degrees_north".into())],
            )
            .with_axis(
                "time",
                vec![0.0, 6.0],
                &[("units", "hours since 2026-01-01".into()), ("calendar", "standard".into())],
            )
            .with_axis("level", vec![1000.0, 500.0], &[("units", "hPa".into())])
            .with_data_variable(
                "air",
                &["time", "level", "lat", "lon"],
                &[
                    ("units", "K".into()),
                    ("long_name", "Air temperature".into()),
                    ("standard_name", "air_temperature".into()),
                    ("description", "".into()),
                ],
            )
            .with_data_variable("uwnd", &["time", "level", "lat", "lon"], &[("units", "m s-1".into())])
            .with_data_variable("vwnd", &["time", "level", "lat", "lon"], &[("units", "m s-1".into())])
            .with_data_variable("mask", &["lat", "lon"], &[])
    }

    fn answers() -> ConversionConfig {
        ConversionConfig {
            skip: Some(vec!["mask".to_string()]),
            vectors: Some(vec![VectorOverride {
                name: Some("wind".into()),
                ..VectorOverride::pair("uwnd", "vwnd")
            }]),
            lonlat: Some(true),
            ..ConversionConfig::default()
        }
    }

    #[test]
    fn test_global_lonlat_conversion() {
        let ds = convert(&global_grid(), &mut AcceptDefaults, &answers()).unwrap();

        assert_eq!(ds.nx(), 36);
        assert_eq!(ds.ny(), 19);
        assert!(ds.islonlat());
        assert!(ds.xwrap());
        assert_eq!(ds.times()["time"], vec!["2026-01-01T00:00:00", "2026-01-01T06:00:00"]);
        assert_eq!(ds.levels()["level"], vec!["1000 hPa", "500 hPa"]);
        assert_eq!(
            ds.datavars().keys().collect::<Vec<_>>(),
            ["air", "uwnd", "vwnd"]
        );
        assert_eq!(ds.datavars()["air"].level, "level");
        assert_eq!(ds.vectors()["wind"].level, "level");
        assert_eq!(ds.vectors()["wind"].units, "m s-1");
    }

    #[test]
    fn test_saved_answers_reproduce_dataset() {
        let mut prompts = ScriptedPrompt::new([
            "y",                // regular grid
            "mask",             // skip
            "",                 // air: rename (description is blank, so asked below)
            "Kelvin at levels", // air: description
            "",                 // uwnd: rename
            "",                 // uwnd: long name
            "",                 // uwnd: standard name
            "",                 // uwnd: description
            "",                 // vwnd: rename
            "",                 // vwnd: long name
            "",                 // vwnd: standard name
            "",                 // vwnd: description
            "uwnd vwnd",        // vectors
            "wind",             // vector name
            "",                 // vector long name
            "",                 // vector standard name
            "",                 // vector description
        ]);
        let source = global_grid();
        let first = convert(&source, &mut prompts, &ConversionConfig::default()).unwrap();
        assert_eq!(first.datavars()["air"].description, "Kelvin at levels");

        let saved = ConversionConfig::from_dataset(&first, &source.data_variable_names());
        assert_eq!(saved.skip, Some(vec!["mask".to_string()]));

        let mut silent = ScriptedPrompt::new(Vec::<&str>::new());
        let second = convert(&source, &mut silent, &saved).unwrap();
        assert_eq!(first, second);
        assert!(silent.asked().is_empty());
    }

    #[test]
    fn test_regional_grid_does_not_wrap() {
        let ds = MemoryDataset::new()
            .with_axis("lon", vec![100.0, 101.0, 102.0], &[("units", "degrees_east".into())])
            .with_axis("lat", vec![0.0, 1.0], &[("units", "degrees_north".into())]);
        let result = convert(&ds, &mut AcceptDefaults, &ConversionConfig::default()).unwrap();
        assert!(!result.xwrap());
        assert!(result.datavars().is_empty());
    }

    #[test]
    fn test_oversized_lonlat_step_is_rejected() {
        let ds = MemoryDataset::new()
            .with_axis("lon", vec![0.0, 400.0], &[("units", "degrees_east".into())])
            .with_axis("lat", vec![-90.0, 90.0], &[("units", "degrees_north".into())]);
        let err = convert(&ds, &mut AcceptDefaults, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, GridMetaError::SchemaValidation(_)));
        assert!(err.to_string().contains("dlon"));
    }

    #[test]
    fn test_wrf_conversion() {
        let ds = MemoryDataset::new()
            .with_global_attribute("MAP_PROJ", AttributeValue::Integer(1))
            .with_global_attribute("TRUELAT1", 30.0)
            .with_global_attribute("TRUELAT2", 60.0)
            .with_global_attribute("CEN_LAT", 39.0)
            .with_global_attribute("CEN_LON", -98.0)
            .with_global_attribute("STAND_LON", -98.0)
            .with_coordinate(
                "XLONG",
                &["south_north", "west_east"],
                &[2, 3],
                vec![-110.0, -98.0, -86.0, -111.0, -98.0, -85.0],
                &[("units", "degrees_east".into())],
            )
            .with_coordinate(
                "XLAT",
                &["south_north", "west_east"],
                &[2, 3],
                vec![30.0, 31.0, 30.0, 45.0, 46.0, 45.0],
                &[("units", "degrees_north".into())],
            )
            .with_data_variable("T2", &["south_north", "west_east"], &[("units", "K".into())]);

        let result = convert(&ds, &mut AcceptDefaults, &ConversionConfig::default()).unwrap();
        assert_eq!((result.nx(), result.ny()), (3, 2));
        assert!(!result.islonlat());
        assert!(!result.xwrap());
        assert_eq!(result.datavars()["T2"].lon.as_deref(), Some("XLONG"));
        match result.projection() {
            ProjectionSpec::ConicConformal(p) => {
                assert_eq!(p.start_lon, -110.0);
                assert_eq!(p.end_lat, 45.0);
            }
            other => panic!("unexpected projection {other:?}"),
        }
    }

    #[test]
    fn test_missing_latitude_fails_before_prompting() {
        let ds = MemoryDataset::new().with_axis("lon", vec![0.0, 1.0], &[("units", "degrees_east".into())]);
        let mut prompts = ScriptedPrompt::new(Vec::<&str>::new());
        let err = convert(&ds, &mut prompts, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, GridMetaError::NotFound { .. }));
        assert!(prompts.asked().is_empty());
    }

    #[test]
    fn test_unknown_skip_is_config_error() {
        let config = ConversionConfig {
            skip: Some(vec!["sst".to_string()]),
            ..answers()
        };
        let err = convert(&global_grid(), &mut AcceptDefaults, &config).unwrap_err();
        assert!(matches!(err, GridMetaError::Config(_)));
    }

    #[test]
    fn test_interrupt_during_descriptors() {
        let mut config = answers();
        config.datavars.insert(
            "air".to_string(),
            DescriptorOverride {
                name: Some("t".into()),
                ..DescriptorOverride::default()
            },
        );
        // air's blank description is the first question; nothing answers it
        let mut prompts = ScriptedPrompt::new(Vec::<&str>::new());
        let err = convert(&global_grid(), &mut prompts, &config).unwrap_err();
        assert!(err.is_interrupted());
    }
}
