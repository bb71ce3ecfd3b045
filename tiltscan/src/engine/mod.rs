//! Line classification, meshing and stage composition.

pub mod backward;
pub mod mesh;
pub mod pipeline;

pub use backward::{vote, BackwardOverlapFilter, BackwardStats, LineClass, Vote};
pub use mesh::{interleave, max_edge_length, strip_triangles, vehicle_marker, DEFAULT_MARKER_WIDTH, DEFAULT_MAX_EDGE};
pub use pipeline::{tilt_stage, PipelineStats, ScanPipeline};
