use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};
use waterscenario_rs::config::{CrossSectionSettings, ScenarioConfig};
use waterscenario_rs::{ScenarioError, pipeline};

/// Straight channel along y: 5 cells of 10 m across (x = 0..50) and three
/// transects of 100 m along (y = 0..300).
fn grid_text() -> String {
    let mut text = String::from(
        "* synthetic channel\nCoordinate System = Cartesian\nMissing Value = -999.0\n4 6\n0 0 0\n",
    );
    for i in 0..6 {
        let x = 10.0 * i as f64;
        text.push_str(&format!(" ETA= {} {} {} {} {}\n", i + 1, x, x, x, x));
    }
    for i in 0..6 {
        text.push_str(&format!(" ETA= {} 0.0 100.0 200.0 300.0\n", i + 1));
    }
    text
}

/// Depth 1, 2, 3, 2, 1 across every transect.
fn dep_text() -> String {
    let m = -999.0;
    let mut rows = vec![vec![m; 5]];
    for depth in [1.0, 2.0, 3.0, 2.0, 1.0] {
        rows.push(vec![m, depth, depth, depth, m]);
    }
    rows.push(vec![m; 5]);
    rows.iter()
        .map(|r| r.iter().map(|v| format!("{:.1}", v)).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

const NETWORK: &str = r#"{"data": {"Branch": [
    {"id": "Rhine", "fromNode": "A", "toNode": "B", "gridPointOffsets": "0.0 200.0"},
    {"id": "Canal", "fromNode": "B", "toNode": "C", "gridPointOffsets": "0.0 200.0"}
]}}"#;

const CONFIG: &str = r#"
season_id = 1
output_dir = "out"

[transport]
source = "csv"
arcs = "arcs.csv"
nodes = "nodes.csv"

[hydro]
network = "network.json"

[hydro.gridpoints]
locations = "gridpoints.csv"
series = { water_level = "gridpoints_water_level.csv" }

[hydro.reachsegments]
locations = "reachsegments.csv"
series = { water_discharge = "reachsegments_water_discharge.csv", water_velocity = "reachsegments_water_velocity.csv" }

[[reaches]]
name = "Main"
transport = [1, 5]
hydro = ["A", "C"]

[grids.channel]
grid = "channel.grd"
water_depth = "channel.dep"

[[sections]]
name = "Upper"
grid = "channel"
start = [25.0, 0.0]
end = [25.0, 300.0]
channel = { mode = "fixed", base_width = 30.0 }

[[manual_points]]
name = "Lock"
arc = 104
gridpoint = "Canal_2"
bed_level = 2.0
"#;

fn write_inputs(dir: &Path) {
    let files = [
        ("channel.grd", grid_text()),
        ("channel.dep", dep_text()),
        ("network.json", NETWORK.to_string()),
        (
            "arcs.csv",
            "ID,Name,Length__m,FromNodeID,ToNodeID\n\
             101,Km 1,100,1,2\n102,Km 2,100,2,3\n103,Km 3,100,3,4\n104,Lock,100,4,5\n"
                .to_string(),
        ),
        (
            "nodes.csv",
            "ID,XCoordinate,YCoordinate\n1,25,0\n2,25,100\n3,25,200\n4,25,300\n5,25,400\n"
                .to_string(),
        ),
        (
            "gridpoints.csv",
            "id,x,y\nRhine_1,30,50\nRhine_2,30,150\nCanal_1,30,300\nCanal_2,30,390\n".to_string(),
        ),
        (
            "reachsegments.csv",
            "id,x,y\nRhine_1,20,100\nCanal_1,20,350\n".to_string(),
        ),
        // the first row falls outside the trailing window
        (
            "gridpoints_water_level.csv",
            "time,Rhine_1,Rhine_2,Canal_1,Canal_2\n\
             2020-01-01 00:00:00,99.0,99.0,99.0,99.0\n\
             2020-01-04 00:00:00,10.0,10.5,8.0,5.0\n\
             2020-01-04 06:00:00,11.0,10.5,7.5,6.0\n"
                .to_string(),
        ),
        (
            "reachsegments_water_discharge.csv",
            "time,Rhine_1,Canal_1\n\
             2020-01-01 00:00:00,9999.0,9999.0\n\
             2020-01-04 00:00:00,1000.0,100.0\n\
             2020-01-04 06:00:00,1200.0,300.0\n"
                .to_string(),
        ),
        (
            "reachsegments_water_velocity.csv",
            "time,Rhine_1,Canal_1\n\
             2020-01-01 00:00:00,9.0,9.0\n\
             2020-01-04 00:00:00,1.0,0.25\n\
             2020-01-04 06:00:00,1.5,0.25\n"
                .to_string(),
        ),
        ("scenario.toml", CONFIG.to_string()),
    ];
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

fn setup() -> (TempDir, ScenarioConfig) {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let config = ScenarioConfig::load(&dir.path().join("scenario.toml")).unwrap();
    (dir, config)
}

type Row = HashMap<String, String>;

fn read_rows(path: &Path) -> HashMap<i64, Row> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    rdr.records()
        .map(|r| {
            let record = r.unwrap();
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect();
            (row["ArcID"].parse().unwrap(), row)
        })
        .collect()
}

fn number(row: &Row, column: &str) -> f64 {
    row[column].parse().unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_full_run() {
    let (dir, config) = setup();
    let summary = pipeline::run(&config).unwrap();
    assert_eq!(summary.arcs, 4);
    assert_eq!(summary.sections, 1);

    let out = dir.path().join("out");
    assert!(out.join("mapping.csv").exists());
    assert!(out.join("width_depth_channel.csv").exists());
    assert!(out.join("waterdepthgrid_Upper.nc").exists());

    let rows = read_rows(&summary.scenario_file);
    assert_eq!(rows.len(), 4);

    let arc101 = &rows[&101];
    assert_eq!(arc101["SeasonID"], "1");
    assert_close(number(arc101, "WaterLevel__m"), 11.0);
    assert_close(number(arc101, "RateOfFlow__m3_s"), 1100.0);
    assert_close(number(arc101, "WaterSpeed__m_s"), 1.25);
    assert_close(number(arc101, "WaterDepth__m"), 1.5);
    assert_close(number(arc101, "Width"), 30.0);
    assert_eq!(arc101["nrow_depth"], "0");
    assert_eq!(arc101["mapping_to_grid"], "LINESTRING (25 50, 25 50)");
    assert_eq!(arc101["geometry"], "LINESTRING (25 0, 25 100)");

    assert_close(number(&rows[&102], "WaterLevel__m"), 10.5);
    assert_eq!(rows[&102]["nrow_depth"], "1");
    assert_close(number(&rows[&103], "WaterLevel__m"), 8.0);
    assert_close(number(&rows[&103], "RateOfFlow__m3_s"), 200.0);
    assert_close(number(&rows[&103], "WaterDepth__m"), 1.5);

    // manual point replaces conflation values
    let arc104 = &rows[&104];
    assert_close(number(arc104, "WaterLevel__m"), 6.0);
    assert_close(number(arc104, "WaterDepth__m"), 4.0);
    assert_close(number(arc104, "WaterSpeed__m_s"), 0.0);
    assert_close(number(arc104, "RateOfFlow__m3_s"), 0.0);
}

#[test]
fn test_reused_mapping_gives_same_scenario() {
    let (dir, config) = setup();
    let mapping = pipeline::conflate(&config).unwrap();
    assert_eq!(mapping.len(), 4);
    assert_eq!(mapping[3].gridpoint.as_deref(), Some("Canal_2"));
    assert_eq!(mapping[0].reachsegment.as_deref(), Some("Rhine_1"));

    let first = pipeline::run(&config).unwrap();
    let expected = fs::read_to_string(&first.scenario_file).unwrap();

    let mut reuse = config.clone();
    let saved = dir.path().join("saved_mapping.csv");
    fs::copy(dir.path().join("out").join("mapping.csv"), &saved).unwrap();
    reuse.mapping = Some(saved);
    reuse.output_dir = dir.path().join("out2");
    let second = pipeline::run(&reuse).unwrap();
    assert_eq!(fs::read_to_string(&second.scenario_file).unwrap(), expected);
    assert!(!dir.path().join("out2").join("mapping.csv").exists());
}

#[test]
fn test_without_extra_columns() {
    let (_dir, mut config) = setup();
    config.add_extra_columns = false;
    config.write_section_netcdf = false;
    config.manual_points.clear();
    let summary = pipeline::run(&config).unwrap();

    let text = fs::read_to_string(&summary.scenario_file).unwrap();
    assert_eq!(
        text.lines().next(),
        Some("ArcID,SeasonID,WaterLevel__m,RateOfFlow__m3_s,WaterSpeed__m_s,WaterDepth__m")
    );
    let rows = read_rows(&summary.scenario_file);
    // outside the section, no depth
    assert_eq!(rows[&104]["WaterDepth__m"], "");
    assert!(!config.output_dir.join("waterdepthgrid_Upper.nc").exists());
}

#[test]
fn test_width_depth_only() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let settings = Default::default();
    let table = pipeline::width_depth(
        &dir.path().join("channel.grd"),
        &dir.path().join("channel.dep"),
        &settings,
    )
    .unwrap();
    assert_eq!(table.len(), 3);
    let curve = table.get(1).unwrap();
    assert_close(curve.centroid.y, 150.0);
    assert_close(curve.max_width().unwrap(), 50.0 - 0.1);
}

#[test]
fn test_width_depth_rejects_non_positive_step() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    for step in [0.0, -0.01] {
        let settings = CrossSectionSettings {
            depth_step: step,
            ..CrossSectionSettings::default()
        };
        let result = pipeline::width_depth(
            &dir.path().join("channel.grd"),
            &dir.path().join("channel.dep"),
            &settings,
        );
        assert!(matches!(result, Err(ScenarioError::Config(_))));
    }
}

#[test]
fn test_sqlite_transport_source() {
    let (dir, _) = setup();
    let db = dir.path().join("shipping.db");
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE arcs (ID INTEGER, Name TEXT, Length__m REAL, FromNodeID INTEGER, ToNodeID INTEGER, BranchSetID INTEGER);
         CREATE TABLE nodes (ID INTEGER, XCoordinate REAL, YCoordinate REAL);
         INSERT INTO arcs VALUES (101, 'Km 1', 100, 1, 2, 1), (102, 'Km 2', 100, 2, 3, 1),
                                 (103, 'Km 3', 100, 3, 4, 1), (104, 'Lock', 100, 4, 5, 1);
         INSERT INTO nodes VALUES (1, 25, 0), (2, 25, 100), (3, 25, 200), (4, 25, 300), (5, 25, 400);",
    )
    .unwrap();
    drop(conn);

    let toml = CONFIG.replace(
        "source = \"csv\"\narcs = \"arcs.csv\"\nnodes = \"nodes.csv\"",
        "source = \"sqlite\"\ndatabase = \"shipping.db\"",
    );
    let path = dir.path().join("sqlite.toml");
    fs::write(&path, toml).unwrap();
    let config = ScenarioConfig::load(&path).unwrap();

    let summary = pipeline::run(&config).unwrap();
    let rows = read_rows(&summary.scenario_file);
    assert_eq!(rows.len(), 4);
    assert_close(number(&rows[&102], "WaterDepth__m"), 1.5);
}

#[test]
fn test_unreachable_reach_fails() {
    let (_dir, mut config) = setup();
    config.reaches[0].hydro.1 = "Nowhere".to_string();
    assert!(pipeline::run(&config).is_err());
}
