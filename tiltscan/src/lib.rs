//! TiltScan - tilting LIDAR + GPS log processing
//!
//! Decodes logs of a nodding 2D laser scanner and a GPS/INS receiver,
//! smooths the reported tilt, drops scan lines that sweep back over ground
//! already covered, and projects the remaining samples into a local
//! east/north/up frame.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      main                           │  ← CLI
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    config                           │  ← TOML settings
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │         (backward filter, pipeline, mesh)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   sensors/                          │  ← Sensor processing
//! │      (line source, tilt filters, gps, projection)   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │              (binary logs, export)                  │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tiltscan::config::PipelineConfig;
//! use tiltscan::engine::ScanPipeline;
//!
//! let config = PipelineConfig::from_file("tiltscan.toml")?;
//! let mut pipeline = ScanPipeline::from_config(&config)?;
//! while let Some(projected) = pipeline.next_projected()? {
//!     println!("{:.3} {} points", projected.line.timestamp, projected.vertices.len());
//! }
//! # Ok::<(), tiltscan::Error>(())
//! ```

// Layer 1: Core foundation (no internal deps)
pub mod core;

// Layer 2: Errors
pub mod error;

// Layer 3: Binary logs and export (depends on core)
pub mod io;

// Layer 4: Sensor processing (depends on core, io)
pub mod sensors;

// Layer 5: Orchestration (depends on all of the above)
pub mod engine;

pub mod config;

pub use config::PipelineConfig;
pub use crate::core::types::{ScanLine, Vec3, VehiclePose};
pub use engine::{BackwardOverlapFilter, ScanPipeline};
pub use error::{Error, Result};
pub use sensors::{PoseTrack, RayProjector, ScanLineSource, ScanLineStream};
