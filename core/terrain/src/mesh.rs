use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use ultraviolet::{Vec2, Vec3};

// Vertex

#[repr(C)]
#[derive(Copy, Clone, PartialEq, Debug, Pod, Zeroable)]
pub struct Vertex {
  pub position: Vec3,
  pub uv: Vec2,
  pub normal: Vec3,
}

impl Vertex {
  #[inline]
  pub fn new(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
    Self { position, uv, normal }
  }
}

// Index overflow

/// Largest number of vertices a mesh can hold while every vertex stays addressable by a `u16` index.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

#[derive(Copy, Clone, Eq, PartialEq, Error, Debug)]
#[error("Mesh cannot grow from {vertex_count} to {requested} vertices; 16-bit indices address at most {max} vertices", max = MAX_VERTICES)]
pub struct IndexOverflowError {
  pub vertex_count: usize,
  pub requested: usize,
}

// Triangles

/// Triangle soup with a parallel 16-bit index list. Every triangle owns its three vertices, so indices simply count up.
#[derive(Clone, Default, Debug)]
pub struct Triangles {
  vertices: Vec<Vertex>,
  indices: Vec<u16>,
}

impl Triangles {
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn with_triangle_capacity(triangles: usize) -> Self {
    Self { vertices: Vec::with_capacity(triangles * 3), indices: Vec::with_capacity(triangles * 3) }
  }


  #[inline]
  pub fn is_empty(&self) -> bool { self.vertices.is_empty() && self.indices.is_empty() }

  #[inline]
  pub fn vertices(&self) -> &[Vertex] {
    &self.vertices
  }

  #[inline]
  pub fn indices(&self) -> &[u16] {
    &self.indices
  }

  #[inline]
  pub fn triangle_count(&self) -> usize { self.indices.len() / 3 }

  /// Iterates over the vertices of each triangle.
  #[inline]
  pub fn triangles(&self) -> impl Iterator<Item=&[Vertex]> + '_ {
    self.vertices.chunks_exact(3)
  }


  /// Appends a triangle as three new vertices and three new sequential indices.
  #[inline]
  pub fn push_triangle(&mut self, vertices: [Vertex; 3]) -> Result<(), IndexOverflowError> {
    let vertex_count = self.vertices.len();
    let requested = vertex_count + 3;
    if requested > MAX_VERTICES {
      return Err(IndexOverflowError { vertex_count, requested });
    }
    let first = vertex_count as u16;
    self.vertices.extend_from_slice(&vertices);
    self.indices.extend_from_slice(&[first, first + 1, first + 2]);
    Ok(())
  }

  #[inline]
  pub fn clear(&mut self) {
    self.vertices.clear();
    self.indices.clear();
  }
}


#[cfg(test)]
mod tests {
  use ultraviolet::{Vec2, Vec3};

  use crate::mesh::{IndexOverflowError, MAX_VERTICES, Triangles, Vertex};

  fn vertex(x: f32) -> Vertex {
    Vertex::new(Vec3::new(x, 0.0, 0.0), Vec2::new(x, 0.0), Vec3::unit_y())
  }

  #[test]
  fn indices_count_up_per_triangle() {
    let mut triangles = Triangles::new();
    assert!(triangles.is_empty());
    triangles.push_triangle([vertex(0.0), vertex(1.0), vertex(2.0)]).unwrap();
    triangles.push_triangle([vertex(0.0), vertex(1.0), vertex(2.0)]).unwrap();
    assert_eq!(triangles.indices(), &[0, 1, 2, 3, 4, 5]);
    assert_eq!(triangles.vertices().len(), 6);
    assert_eq!(triangles.triangle_count(), 2);
    assert_eq!(triangles.triangles().count(), 2);
    triangles.clear();
    assert!(triangles.is_empty());
  }

  #[test]
  fn refuses_triangles_beyond_u16_range() {
    let mut triangles = Triangles::new();
    // 21845 triangles fill 65535 vertices; the last addressable index is 65534.
    for _ in 0..(MAX_VERTICES / 3) {
      triangles.push_triangle([vertex(0.0), vertex(1.0), vertex(2.0)]).unwrap();
    }
    assert_eq!(*triangles.indices().last().unwrap(), 65534);
    let error = triangles.push_triangle([vertex(0.0), vertex(1.0), vertex(2.0)]).unwrap_err();
    assert_eq!(error, IndexOverflowError { vertex_count: 65535, requested: 65538 });
    assert_eq!(triangles.vertices().len(), 65535);
    assert_eq!(triangles.indices().len(), 65535);
  }
}
