pub mod influx;
pub mod solaredge;
pub mod traits;

pub use influx::InfluxSink;
pub use solaredge::SolarEdgeClient;
pub use traits::{EnergySource, PointSink};
