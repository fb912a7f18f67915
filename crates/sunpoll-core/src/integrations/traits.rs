use std::future::Future;

use crate::energy::{EnergyDetails, EnergyRequest};
use crate::error::{SinkError, UpstreamError};
use crate::point::Point;

/// Where energy readings come from.
///
/// Errors are treated as transient; the poll loop retries them.
pub trait EnergySource {
    fn energy_details(
        &self,
        request: &EnergyRequest,
    ) -> impl Future<Output = Result<EnergyDetails, UpstreamError>> + Send;
}

/// Where recorded points go.
///
/// A failed write is logged by the caller and the sample stays unrecorded.
pub trait PointSink {
    fn write_point(&self, point: &Point) -> impl Future<Output = Result<(), SinkError>> + Send;
}
