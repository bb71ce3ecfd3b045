//! Point and mesh export.
//!
//! - [`PointWriter`]: CSV rows `valid,x,y,z`, one per projected sample, with
//!   lines separated by a blank row
//! - [`ObjWriter`]: Wavefront OBJ with one object per scan strip and an
//!   optional `vehicle` object of track markers

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::types::Vec3;
use crate::engine::mesh::strip_triangles;
use crate::error::{Error, Result};
use crate::sensors::projection::LidarVertex;

/// CSV writer of projected samples.
pub struct PointWriter<W: Write> {
    writer: W,
    lines: u64,
}

impl PointWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::file_open(path, e))?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> PointWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "valid,x,y,z")?;
        Ok(Self { writer, lines: 0 })
    }

    pub fn write_line(&mut self, vertices: &[LidarVertex]) -> Result<()> {
        if self.lines > 0 {
            writeln!(self.writer)?;
        }
        for v in vertices {
            writeln!(
                self.writer,
                "{},{:.4},{:.4},{:.4}",
                v.valid as u8, v.point.x, v.point.y, v.point.z
            )?;
        }
        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Wavefront OBJ writer.
pub struct ObjWriter<W: Write> {
    writer: W,
    max_edge: f64,
    vertices: usize,
    faces: usize,
    strips: usize,
    markers: Vec<[Vec3; 3]>,
}

impl ObjWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, max_edge: f64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::file_open(path, e))?;
        Ok(Self::new(BufWriter::new(file), max_edge))
    }
}

impl<W: Write> ObjWriter<W> {
    pub fn new(writer: W, max_edge: f64) -> Self {
        Self {
            writer,
            max_edge,
            vertices: 0,
            faces: 0,
            strips: 0,
            markers: Vec::new(),
        }
    }

    /// Write every strip vertex and the faces that pass the edge filter.
    pub fn write_strip(&mut self, strip: &[LidarVertex]) -> Result<()> {
        let triangles = strip_triangles(strip, self.max_edge);
        if triangles.is_empty() {
            return Ok(());
        }

        writeln!(self.writer, "o strip_{}", self.strips)?;
        for v in strip {
            write_vertex(&mut self.writer, v.point)?;
        }
        // OBJ indices are 1-based and global
        let base = self.vertices + 1;
        for [a, b, c] in &triangles {
            writeln!(self.writer, "f {} {} {}", base + a, base + b, base + c)?;
        }

        self.vertices += strip.len();
        self.faces += triangles.len();
        self.strips += 1;
        Ok(())
    }

    /// Queue a vehicle marker; markers are written as one object on finish.
    pub fn add_marker(&mut self, marker: [Vec3; 3]) {
        self.markers.push(marker);
    }

    pub fn faces_written(&self) -> usize {
        self.faces
    }

    pub fn finish(mut self) -> Result<W> {
        if !self.markers.is_empty() {
            writeln!(self.writer, "o vehicle")?;
            for marker in &self.markers {
                for &p in marker {
                    write_vertex(&mut self.writer, p)?;
                }
            }
            let base = self.vertices + 1;
            for i in 0..self.markers.len() {
                let k = base + 3 * i;
                writeln!(self.writer, "f {} {} {}", k, k + 1, k + 2)?;
            }
            self.vertices += 3 * self.markers.len();
            self.faces += self.markers.len();
        }
        log::debug!("OBJ: {} vertices, {} faces, {} strips", self.vertices, self.faces, self.strips);
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn write_vertex<W: Write>(writer: &mut W, p: Vec3) -> std::io::Result<()> {
    writeln!(writer, "v {:.4} {:.4} {:.4}", p.x, p.y, p.z)
}
