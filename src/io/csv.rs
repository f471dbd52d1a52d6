use crate::conflation::ConflationRecord;
use crate::cross_section::CrossSectionTable;
use crate::error::{Result, ScenarioError};
use crate::geometry::Point;
use crate::hydro::{HydroSeries, Sample};
use crate::network::{NetworkEdge, NetworkGraph, NetworkNode, TransportNetwork};
use crate::scenario::WaterScenarioTable;
use chrono::NaiveDateTime;
use csv::{Reader, ReaderBuilder, StringRecord, Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn open_reader(path: &Path) -> Result<Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

#[derive(Debug, Deserialize)]
struct ArcRecord {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Length__m")]
    length: f64,
    #[serde(rename = "FromNodeID")]
    from: i64,
    #[serde(rename = "ToNodeID")]
    to: i64,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "XCoordinate")]
    x: Option<f64>,
    #[serde(rename = "YCoordinate")]
    y: Option<f64>,
}

// Function to build the transport network from exported arc and node tables
pub fn read_transport_network(arcs: &Path, nodes: &Path) -> Result<TransportNetwork> {
    let edges = open_reader(arcs)?
        .deserialize::<ArcRecord>()
        .map(|r| {
            r.map(|a| NetworkEdge {
                id: a.id,
                from: a.from,
                to: a.to,
                length: a.length,
                name: a.name.filter(|n| !n.is_empty()),
            })
        })
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    let nodes = open_reader(nodes)?
        .deserialize::<NodeRecord>()
        .map(|r| {
            r.map(|n| NetworkNode {
                id: n.id,
                location: n.x.zip(n.y).map(|(x, y)| Point::new(x, y)),
            })
        })
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;

    let network = NetworkGraph::build(edges, nodes);
    info!(
        "Transport network built with {} nodes and {} arcs",
        network.node_count(),
        network.edge_count()
    );
    Ok(network)
}

#[derive(Debug, Deserialize)]
struct LocationRecord {
    id: String,
    x: f64,
    y: f64,
}

/// Sample locations, columns `id,x,y`.
pub fn read_sample_locations(path: &Path) -> Result<Vec<Sample>> {
    let samples = open_reader(path)?
        .deserialize::<LocationRecord>()
        .map(|r| r.map(|l| Sample::new(l.id, Point::new(l.x, l.y))))
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    info!("Loaded {} sample locations from {}", samples.len(), path.display());
    Ok(samples)
}

fn parse_value(record: &StringRecord, column: usize) -> Result<f64> {
    let field = record.get(column).unwrap_or("");
    if field.is_empty() {
        return Ok(f64::NAN);
    }
    field
        .parse::<f64>()
        .map_err(|e| ScenarioError::Format(format!("invalid value '{}': {}", field, e)))
}

/// Time series of one quantity: a `time` column, then one column per sample.
/// Empty fields are read as NaN.
pub fn read_time_series(path: &Path, quantity: &str) -> Result<HydroSeries> {
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers()?.clone();
    if headers.get(0) != Some("time") {
        return Err(ScenarioError::Format(format!(
            "{}: first column must be 'time'",
            path.display()
        )));
    }

    let ids: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let mut times = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); ids.len()];
    for result in rdr.records() {
        let record = result?;
        times.push(NaiveDateTime::parse_from_str(&record[0], TIME_FORMAT)?);
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(parse_value(&record, i + 1)?);
        }
    }

    info!(
        "Loaded {} time steps of {} for {} samples",
        times.len(),
        quantity,
        ids.len()
    );
    HydroSeries::new(quantity, times, ids.into_iter().zip(columns).collect())
}

// Mapping table, one row per conflated arc
#[derive(Debug, Serialize, Deserialize)]
struct MappingRecord {
    #[serde(rename = "Reach")]
    reach: String,
    #[serde(rename = "ArcID")]
    arc_id: i64,
    #[serde(rename = "ArcName")]
    arc_name: Option<String>,
    #[serde(rename = "ArcX")]
    arc_x: f64,
    #[serde(rename = "ArcY")]
    arc_y: f64,
    #[serde(rename = "Gridpoint")]
    gridpoint: Option<String>,
    #[serde(rename = "GridpointX")]
    gridpoint_x: Option<f64>,
    #[serde(rename = "GridpointY")]
    gridpoint_y: Option<f64>,
    #[serde(rename = "Reachsegment")]
    reachsegment: Option<String>,
    #[serde(rename = "ReachsegmentX")]
    reachsegment_x: Option<f64>,
    #[serde(rename = "ReachsegmentY")]
    reachsegment_y: Option<f64>,
    #[serde(rename = "GridpointLink")]
    gridpoint_link: Option<String>,
    #[serde(rename = "ReachsegmentLink")]
    reachsegment_link: Option<String>,
}

impl From<&ConflationRecord> for MappingRecord {
    fn from(r: &ConflationRecord) -> Self {
        MappingRecord {
            reach: r.reach.clone(),
            arc_id: r.arc_id,
            arc_name: r.arc_name.clone(),
            arc_x: r.arc_centroid.x,
            arc_y: r.arc_centroid.y,
            gridpoint: r.gridpoint.clone(),
            gridpoint_x: r.gridpoint_location.map(|p| p.x),
            gridpoint_y: r.gridpoint_location.map(|p| p.y),
            reachsegment: r.reachsegment.clone(),
            reachsegment_x: r.reachsegment_location.map(|p| p.x),
            reachsegment_y: r.reachsegment_location.map(|p| p.y),
            gridpoint_link: r.gridpoint_link(),
            reachsegment_link: r.reachsegment_link(),
        }
    }
}

impl From<MappingRecord> for ConflationRecord {
    fn from(r: MappingRecord) -> Self {
        let point = |x: Option<f64>, y: Option<f64>| x.zip(y).map(|(x, y)| Point::new(x, y));
        ConflationRecord {
            reach: r.reach,
            arc_id: r.arc_id,
            arc_name: r.arc_name.filter(|n| !n.is_empty()),
            arc_centroid: Point::new(r.arc_x, r.arc_y),
            gridpoint: r.gridpoint.filter(|g| !g.is_empty()),
            gridpoint_location: point(r.gridpoint_x, r.gridpoint_y),
            reachsegment: r.reachsegment.filter(|s| !s.is_empty()),
            reachsegment_location: point(r.reachsegment_x, r.reachsegment_y),
        }
    }
}

pub fn write_mapping(path: &Path, mapping: &[ConflationRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    for record in mapping {
        wtr.serialize(MappingRecord::from(record))?;
    }
    wtr.flush()?;
    info!("Mapping saved to {}", path.display());
    Ok(())
}

/// Reads a mapping written by [`write_mapping`].
pub fn read_mapping(path: &Path) -> Result<Vec<ConflationRecord>> {
    let mapping = open_reader(path)?
        .deserialize::<MappingRecord>()
        .map(|r| r.map(ConflationRecord::from))
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    info!("Loaded mapping of {} arcs from {}", mapping.len(), path.display());
    Ok(mapping)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// Create CSV writer with the scenario header
fn create_scenario_writer(path: &Path, extra_columns: bool) -> Result<Writer<File>> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;

    let mut header = vec![
        "ArcID",
        "SeasonID",
        "WaterLevel__m",
        "RateOfFlow__m3_s",
        "WaterSpeed__m_s",
        "WaterDepth__m",
    ];
    if extra_columns {
        header.extend(["Width", "nrow_depth", "nrow_width", "mapping_to_grid", "geometry"]);
    }
    wtr.write_record(&header)?;

    Ok(wtr)
}

/// Writes the scenario table. Unknown values are left empty.
pub fn write_water_scenario(
    path: &Path,
    table: &WaterScenarioTable,
    extra_columns: bool,
) -> Result<()> {
    let mut wtr = create_scenario_writer(path, extra_columns)?;
    for row in table.rows() {
        let mut record = vec![
            row.arc_id.to_string(),
            row.season_id.to_string(),
            opt(row.water_level),
            opt(row.rate_of_flow),
            opt(row.water_speed),
            opt(row.water_depth),
        ];
        if extra_columns {
            record.extend([
                opt(row.width),
                opt(row.nrow_depth),
                opt(row.nrow_width),
                opt(row.mapping_to_grid.as_deref()),
                opt(row.geometry.as_deref()),
            ]);
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!("Water scenario of {} arcs saved to {}", table.len(), path.display());
    Ok(())
}

/// Width-depth curves in long format: `n_row,x,y,depth,width`.
pub fn write_width_depth(path: &Path, table: &CrossSectionTable) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    wtr.write_record(["n_row", "x", "y", "depth", "width"])?;
    for curve in table.curves() {
        for point in &curve.points {
            wtr.write_record(&[
                curve.n.to_string(),
                format!("{:.3}", curve.centroid.x),
                format!("{:.3}", curve.centroid.y),
                format!("{:.2}", point.depth),
                format!("{:.3}", point.width),
            ])?;
        }
    }
    wtr.flush()?;
    info!("Width-depth table saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydro::WATER_LEVEL;
    use crate::scenario::WaterScenarioRow;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_transport_network() {
        let dir = tempdir().unwrap();
        let arcs = dir.path().join("arcs.csv");
        let nodes = dir.path().join("nodes.csv");
        fs::write(
            &arcs,
            "ID,Name,Length__m,FromNodeID,ToNodeID\n1,Waal,100.0,1,2\n2,,250.5,2,3\n",
        )
        .unwrap();
        fs::write(
            &nodes,
            "ID,XCoordinate,YCoordinate\n1,0.0,0.0\n2,100.0,0.0\n3,,\n",
        )
        .unwrap();

        let network = read_transport_network(&arcs, &nodes).unwrap();
        assert_eq!(network.edge_count(), 2);
        assert_eq!(network.edge(&1).unwrap().name.as_deref(), Some("Waal"));
        assert_eq!(network.edge(&2).unwrap().name, None);
        assert_eq!(network.location(&3), None);
        assert_eq!(network.edge_centroid(&1), Some(Point::new(50.0, 0.0)));
    }

    #[test]
    fn test_read_time_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("level.csv");
        fs::write(
            &path,
            "time,Waal_1,Waal_2\n2020-01-01 00:00:00,1.5,\n2020-01-01 01:00:00,2.5,3.0\n",
        )
        .unwrap();
        let series = read_time_series(&path, WATER_LEVEL).unwrap();
        assert_eq!(series.times().len(), 2);
        assert_eq!(series.values("Waal_1").unwrap(), &[1.5, 2.5]);
        assert!(series.values("Waal_2").unwrap()[0].is_nan());

        fs::write(&path, "date,Waal_1\n2020-01-01 00:00:00,1.5\n").unwrap();
        assert!(matches!(
            read_time_series(&path, WATER_LEVEL),
            Err(ScenarioError::Format(_))
        ));
    }

    #[test]
    fn test_mapping_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        let mapping = vec![
            ConflationRecord {
                reach: "Waal".to_string(),
                arc_id: 7,
                arc_name: Some("Waal km 900".to_string()),
                arc_centroid: Point::new(10.0, 20.0),
                gridpoint: Some("Waal_3".to_string()),
                gridpoint_location: Some(Point::new(12.0, 21.0)),
                reachsegment: None,
                reachsegment_location: None,
            },
        ];
        write_mapping(&path, &mapping).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("LINESTRING (10 20, 12 21)"));
        assert_eq!(read_mapping(&path).unwrap(), mapping);
    }

    #[test]
    fn test_write_water_scenario() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("waterscenario.csv");
        let mut table = WaterScenarioTable::new(1);
        let mut row = WaterScenarioRow::new(42, 1);
        row.water_level = Some(8.25);
        row.water_depth = Some(3.5);
        table.upsert(row);

        write_water_scenario(&path, &table, false).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "ArcID,SeasonID,WaterLevel__m,RateOfFlow__m3_s,WaterSpeed__m_s,WaterDepth__m"
        );
        assert_eq!(lines[1], "42,1,8.25,,,3.5");

        write_water_scenario(&path, &table, true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.lines().next().unwrap().ends_with("mapping_to_grid,geometry"));
        assert_eq!(text.lines().nth(1), Some("42,1,8.25,,,3.5,,,,,"));
    }
}
