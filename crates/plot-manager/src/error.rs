use plot_region::{AccessError, BlockPos, Region, RegionError, WorldBounds};
use plot_schematic::CaptureError;
use thiserror::Error;

/// A request that cannot be turned into tasks. Nothing is enqueued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("region {region} lies outside world bounds {bounds}")]
    InvalidRegion { region: Region, bounds: WorldBounds },

    #[error("anchor {anchor} lies outside world bounds {bounds}")]
    AnchorOutOfBounds { anchor: BlockPos, bounds: WorldBounds },

    #[error("source {from} overlaps destination {to}")]
    OverlappingRegions { from: Region, to: Region },

    #[error("coordinates overflow: {0}")]
    CoordinateOverflow(#[from] RegionError),
}

pub type PlanningResult<T> = Result<T, PlanningError>;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

pub type ManagerResult<T> = Result<T, ManagerError>;
