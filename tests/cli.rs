use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Write an uncompressed little-endian f64 array stored as a single chunk.
fn write_array(
    root: &Path,
    name: &str,
    dims: &[&str],
    shape: &[usize],
    values: Option<&[f64]>,
    attrs: serde_json::Value,
) -> std::io::Result<()> {
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;

    let zarray = serde_json::json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": shape,
        "dtype": "<f8",
        "compressor": null,
        "fill_value": "NaN",
        "order": "C",
        "filters": null
    });
    fs::write(dir.join(".zarray"), zarray.to_string())?;

    let mut attrs = attrs;
    attrs["_ARRAY_DIMENSIONS"] = serde_json::json!(dims);
    fs::write(dir.join(".zattrs"), attrs.to_string())?;

    if let Some(values) = values {
        let key = vec!["0"; shape.len().max(1)].join(".");
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        fs::write(dir.join(key), bytes)?;
    }
    Ok(())
}

/// Global 10-degree grid with two times, two pressure levels and a wind pair.
fn create_global_store(root: &Path) -> std::io::Result<()> {
    fs::write(root.join(".zgroup"), r#"{"zarr_format": 2}"#)?;
    fs::write(
        root.join(".zattrs"),
        r#"{"title": "Sample reanalysis", "history": "Created for testing"}"#,
    )?;

    let lon: Vec<f64> = (0..36).map(|i| i as f64 * 10.0).collect();
    let lat: Vec<f64> = (0..19).map(|i| -90.0 + i as f64 * 10.0).collect();
    write_array(
        root,
        "lon",
        &["lon"],
        &[36],
        Some(&lon),
        serde_json::json!({"units": "degrees_east", "standard_name": "longitude"}),
    )?;
    write_array(
        root,
        "lat",
        &["lat"],
        &[19],
        Some(&lat),
        serde_json::json!({"units": "degrees_north", "standard_name": "latitude"}),
    )?;
    write_array(
        root,
        "time",
        &["time"],
        &[2],
        Some(&[0.0, 6.0]),
        serde_json::json!({"units": "hours since 2026-01-01 00:00:00", "calendar": "standard"}),
    )?;
    write_array(
        root,
        "level",
        &["level"],
        &[2],
        Some(&[1000.0, 500.0]),
        serde_json::json!({"units": "hPa", "positive": "down"}),
    )?;

    let dims = ["time", "level", "lat", "lon"];
    let shape = [2, 2, 19, 36];
    write_array(
        root,
        "air",
        &dims,
        &shape,
        None,
        serde_json::json!({"units": "K", "long_name": "Air temperature", "standard_name": "air_temperature"}),
    )?;
    write_array(
        root,
        "uwnd",
        &dims,
        &shape,
        None,
        serde_json::json!({"units": "m s-1", "long_name": "Zonal wind"}),
    )?;
    write_array(
        root,
        "vwnd",
        &dims,
        &shape,
        None,
        serde_json::json!({"units": "m s-1", "long_name": "Meridional wind"}),
    )?;
    Ok(())
}

/// WRF-style curvilinear store declaring a Lambert conformal projection
/// without `TRUELAT2`.
fn create_wrf_store(root: &Path) -> std::io::Result<()> {
    fs::write(root.join(".zgroup"), r#"{"zarr_format": 2}"#)?;
    fs::write(
        root.join(".zattrs"),
        r#"{"MAP_PROJ": 1, "TRUELAT1": 30.0, "CEN_LAT": 39.0, "CEN_LON": -98.0, "STAND_LON": -98.0}"#,
    )?;

    let dims = ["south_north", "west_east"];
    write_array(
        root,
        "XLONG",
        &dims,
        &[2, 3],
        Some(&[-110.0, -98.0, -86.0, -111.0, -98.0, -85.0]),
        serde_json::json!({"units": "degrees_east"}),
    )?;
    write_array(
        root,
        "XLAT",
        &dims,
        &[2, 3],
        Some(&[30.0, 31.0, 30.0, 45.0, 46.0, 45.0]),
        serde_json::json!({"units": "degrees_north"}),
    )?;
    write_array(
        root,
        "T2",
        &dims,
        &[2, 3],
        None,
        serde_json::json!({"units": "K", "coordinates": "XLONG XLAT"}),
    )?;
    Ok(())
}

fn gridmeta(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gridmeta"))
        .args(args)
        .arg("--no-color")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute gridmeta")
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_help_flag() {
    let output = gridmeta(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("convert"));
    assert!(stdout.contains("inspect"));
}

#[test]
fn test_dry_run_prints_metadata() {
    let temp_dir = TempDir::new().unwrap();
    create_global_store(temp_dir.path()).unwrap();

    let answers = temp_dir.path().join("answers.json");
    fs::write(
        &answers,
        r#"{"vectors": [{"u": "uwnd", "v": "vwnd", "name": "wind", "long_name": "Wind"}]}"#,
    )
    .unwrap();

    let store = temp_dir.path().to_str().unwrap();
    let output = gridmeta(&[
        "convert",
        store,
        "--yes",
        "--dry-run",
        "--config",
        answers.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["nx"], 36);
    assert_eq!(json["ny"], 19);
    assert_eq!(json["xwrap"], true);
    assert_eq!(json["islonlat"], true);
    assert_eq!(json["projection"]["name"], "LonLat");
    assert_eq!(json["projection"]["dlon"], 10.0);
    assert_eq!(json["projection"]["startLat"], -90.0);
    assert_eq!(
        json["times"]["time"],
        serde_json::json!(["2026-01-01T00:00:00", "2026-01-01T06:00:00"])
    );
    assert_eq!(json["levels"]["level"], serde_json::json!(["1000 hPa", "500 hPa"]));
    assert_eq!(json["datavars"]["air"]["long_name"], "Air temperature");
    assert_eq!(json["datavars"]["air"]["level"], "level");
    assert_eq!(json["vectors"]["wind"]["uname"], "uwnd");
    assert_eq!(json["vectors"]["wind"]["long_name"], "Wind");

    // A dry run never touches the store
    let root = read_json(&temp_dir.path().join(".zattrs"));
    assert!(root.get("nx").is_none());
}

#[test]
fn test_convert_writes_root_attributes() {
    let temp_dir = TempDir::new().unwrap();
    create_global_store(temp_dir.path()).unwrap();
    let store = temp_dir.path().to_str().unwrap();
    let saved = temp_dir.path().join("saved.json");

    let output = gridmeta(&["convert", store, "--yes", "--save-answers", saved.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let root = read_json(&temp_dir.path().join(".zattrs"));
    assert_eq!(root["title"], "Sample reanalysis");
    assert_eq!(root["nx"], 36);
    assert_eq!(root["projection"]["name"], "LonLat");
    assert!(root["vectors"].as_object().unwrap().is_empty());

    let answers = read_json(&saved);
    assert_eq!(answers["skip"], serde_json::json!([]));
    assert_eq!(answers["lonlat"], true);
    assert_eq!(answers["datavars"]["uwnd"]["name"], "uwnd");

    // Replaying the saved answers reproduces the same metadata without prompting
    let replay = gridmeta(&["convert", store, "--dry-run", "--config", saved.to_str().unwrap()]);
    assert!(replay.status.success());
    let replayed: serde_json::Value = serde_json::from_slice(&replay.stdout).unwrap();
    assert_eq!(replayed["datavars"], root["datavars"]);
    assert_eq!(replayed["projection"], root["projection"]);
}

#[test]
fn test_end_of_input_interrupts_without_writing() {
    let temp_dir = TempDir::new().unwrap();
    create_global_store(temp_dir.path()).unwrap();
    let before = fs::read_to_string(temp_dir.path().join(".zattrs")).unwrap();

    let output = gridmeta(&["convert", temp_dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(130));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Conversion interrupted by user"));

    let after = fs::read_to_string(temp_dir.path().join(".zattrs")).unwrap();
    assert_eq!(before, after);
}

#[cfg(unix)]
#[test]
fn test_ctrl_c_at_prompt_interrupts_without_writing() {
    use std::io::Read;

    let temp_dir = TempDir::new().unwrap();
    create_global_store(temp_dir.path()).unwrap();
    let before = fs::read_to_string(temp_dir.path().join(".zattrs")).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_gridmeta"))
        .args(["convert", temp_dir.path().to_str().unwrap(), "--no-color"])
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .expect("Failed to execute gridmeta");

    // Wait for the first question, which has no trailing newline
    let mut stderr = child.stderr.take().unwrap();
    let mut seen = Vec::new();
    let mut buf = [0u8; 256];
    while !String::from_utf8_lossy(&seen).contains("longitude/latitude grid?") {
        let n = stderr.read(&mut buf).unwrap();
        assert!(n > 0, "gridmeta exited before prompting");
        seen.extend_from_slice(&buf[..n]);
    }

    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = child.wait().unwrap();
    stderr.read_to_end(&mut seen).unwrap();
    assert_eq!(status.code(), Some(130));
    assert!(String::from_utf8_lossy(&seen).contains("Conversion interrupted by user"));

    let after = fs::read_to_string(temp_dir.path().join(".zattrs")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_missing_projection_attribute_fails() {
    let temp_dir = TempDir::new().unwrap();
    create_wrf_store(temp_dir.path()).unwrap();

    let output = gridmeta(&["convert", temp_dir.path().to_str().unwrap(), "--yes"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("TRUELAT2"));

    let root = read_json(&temp_dir.path().join(".zattrs"));
    assert!(root.get("projection").is_none());
}

#[test]
fn test_inspect_summary() {
    let temp_dir = TempDir::new().unwrap();
    create_global_store(temp_dir.path()).unwrap();

    let output = gridmeta(&["inspect", temp_dir.path().to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("longitude = lon ; // 0 .. 350 (36 points)"));
    assert!(stdout.contains("level = 1000 hPa, 500 hPa ;"));
    assert!(stdout.contains("time = 2026-01-01T00:00:00, 2026-01-01T06:00:00 ;"));
    assert!(stdout.contains("family = not declared ;"));
    assert!(stdout.contains("air(time, level, lat, lon) ;"));
}

#[test]
fn test_inspect_wrf_projection_attributes() {
    let temp_dir = TempDir::new().unwrap();
    create_wrf_store(temp_dir.path()).unwrap();

    let output = gridmeta(&["inspect", temp_dir.path().to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("family = ConicConformal ;"));
    assert!(stdout.contains(":MAP_PROJ = 1 ;"));
    assert!(stdout.contains(":CEN_LON = -98 ;"));
    assert!(stdout.contains("longitude = XLONG ;"));
}

#[test]
fn test_nonexistent_store() {
    let output = gridmeta(&["inspect", "/nonexistent/path/to/store"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
}
