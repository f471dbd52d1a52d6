pub mod csv;
pub mod delft3d;
pub mod netcdf;
pub mod network_def;
pub mod results;
