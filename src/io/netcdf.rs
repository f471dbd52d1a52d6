use crate::error::{Result, ScenarioError};
use crate::io::results::SectionResults;
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::info;

// Function to write the transect solutions of one section to NetCDF
pub fn write_section_netcdf(
    path: &Path,
    results: &SectionResults,
    created: &NaiveDateTime,
) -> Result<()> {
    // a zero-length dimension would be unlimited
    if results.is_empty() {
        return Err(ScenarioError::Precondition(format!(
            "section {} has no transects to write",
            results.name
        )));
    }

    let mut file = netcdf::create(path)?;
    file.add_dimension("transect", results.len())?;

    let mut n_row_var = file.add_variable::<i64>("n_row", &["transect"])?;
    n_row_var.put_attribute("long_name", "Grid n-row of the transect")?;
    n_row_var.put_values(&results.n_rows, ..)?;

    let mut x_var = file.add_variable::<f64>("x", &["transect"])?;
    x_var.put_attribute("long_name", "Transect centroid x")?;
    x_var.put_attribute("units", "m")?;
    x_var.put_values(&results.x, ..)?;

    let mut y_var = file.add_variable::<f64>("y", &["transect"])?;
    y_var.put_attribute("long_name", "Transect centroid y")?;
    y_var.put_attribute("units", "m")?;
    y_var.put_values(&results.y, ..)?;

    let mut depth_var = file.add_variable::<f64>("depth", &["transect"])?;
    depth_var.put_attribute("_FillValue", -9999.0)?;
    depth_var.put_attribute("long_name", "Channel depth")?;
    depth_var.put_attribute("units", "m")?;
    depth_var.put_values(&results.depth, ..)?;

    let mut width_var = file.add_variable::<f64>("width", &["transect"])?;
    width_var.put_attribute("_FillValue", -9999.0)?;
    width_var.put_attribute("long_name", "Channel width")?;
    width_var.put_attribute("units", "m")?;
    width_var.put_values(&results.width, ..)?;

    // Global attributes
    file.add_attribute("title", format!("Water depth grid {}", results.name))?;
    file.add_attribute("section", results.name.as_str())?;
    file.add_attribute("channel", results.channel.as_str())?;
    file.add_attribute(
        "date_created",
        created.format("%Y-%m-%d %H:%M:%S").to_string(),
    )?;

    info!("Section {} saved to {}", results.name, path.display());
    Ok(())
}
