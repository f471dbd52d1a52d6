use crate::channel::ChannelSpec;
use crate::scenario::SectionReach;

// Structure to store the solved transects of one section for NetCDF output
#[derive(Debug, Clone)]
pub struct SectionResults {
    pub name: String,
    pub channel: String,
    pub n_rows: Vec<i64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub depth: Vec<f64>,
    pub width: Vec<f64>,
}

impl SectionResults {
    pub fn new(name: &str, channel: &ChannelSpec) -> Self {
        SectionResults {
            name: name.to_string(),
            channel: describe_channel(channel),
            n_rows: Vec::new(),
            x: Vec::new(),
            y: Vec::new(),
            depth: Vec::new(),
            width: Vec::new(),
        }
    }

    pub fn from_reach(reach: &SectionReach, channel: &ChannelSpec) -> Self {
        let mut results = SectionResults::new(&reach.name, channel);
        for transect in &reach.transects {
            results.n_rows.push(transect.n as i64);
            results.x.push(transect.centroid.x);
            results.y.push(transect.centroid.y);
            results.depth.push(transect.depth);
            results.width.push(transect.width);
        }
        results
    }

    pub fn len(&self) -> usize {
        self.n_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows.is_empty()
    }
}

fn describe_channel(channel: &ChannelSpec) -> String {
    match *channel {
        ChannelSpec::Fixed { base_width } => format!("fixed width {} m", base_width),
        ChannelSpec::Narrowing {
            base_width,
            min_width,
            min_depth,
        } => format!(
            "width {} m, narrowing to {} m to keep {} m depth",
            base_width, min_width, min_depth
        ),
        ChannelSpec::Trapezoid {
            base_width,
            side_slope,
            depth_at_full_width,
        } => format!(
            "trapezoid {} m wide at {} m depth, side slope 1:{}",
            base_width, depth_at_full_width, side_slope
        ),
    }
}
