///! Marching cubes implementation based on:
///!
///! * http://paulbourke.net/geometry/polygonise/
///! * https://people.eecs.berkeley.edu/~jrs/meshpapers/LorensenCline.pdf
///! * https://www.boristhebrave.com/2018/04/15/marching-cubes-tutorial/

use ultraviolet::{UVec3, Vec2, Vec3};

use crate::density::DensityField;
use crate::mesh::{IndexOverflowError, Triangles, Vertex};

pub mod tables;

// Settings

pub const DEFAULT_ISO_LEVEL: f32 = 0.5;
pub const DEFAULT_UV_SCALE: f32 = 1.0;

/// Absolute tolerance on densities below which an edge crossing snaps to a corner.
pub const EPSILON: f32 = 1e-6;

#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MarchingCubesSettings {
  pub iso_level: f32,
  pub uv_scale: f32,
}

impl Default for MarchingCubesSettings {
  #[inline]
  fn default() -> Self {
    Self { iso_level: DEFAULT_ISO_LEVEL, uv_scale: DEFAULT_UV_SCALE }
  }
}

// Marching cubes

/// Turns a [`DensityField`] into a flat-shaded triangle soup. Densities strictly below the iso level are outside of the
/// surface.
#[derive(Default, Copy, Clone, Debug)]
pub struct MarchingCubes {
  settings: MarchingCubesSettings,
}

impl MarchingCubes {
  #[inline]
  pub fn new(settings: MarchingCubesSettings) -> Self { Self { settings } }

  #[inline]
  pub fn settings(&self) -> &MarchingCubesSettings { &self.settings }

  #[inline]
  pub fn iso_level(&self) -> f32 { self.settings.iso_level }

  #[inline]
  pub fn uv_scale(&self) -> f32 { self.settings.uv_scale }


  /// Polygonizes the entire field into a new mesh.
  ///
  /// # Panics
  ///
  /// Panics when the surface needs more vertices than 16-bit indices can address. Use [`Self::try_polygonize`] to
  /// handle that case instead.
  pub fn polygonize(&self, field: &DensityField) -> Triangles {
    self.try_polygonize(field).unwrap_or_else(|e| panic!("Failed to polygonize density field: {}", e))
  }

  pub fn try_polygonize(&self, field: &DensityField) -> Result<Triangles, IndexOverflowError> {
    let mut triangles = Triangles::new();
    self.extract(field, &mut triangles)?;
    Ok(triangles)
  }

  /// Appends the triangles of every cell of `field` to `triangles`. On error, `triangles` holds the triangles of all
  /// cells extracted before the overflow.
  #[profiling::function]
  pub fn extract(&self, field: &DensityField, triangles: &mut Triangles) -> Result<(), IndexOverflowError> {
    let size = field.size();
    for x in 0..size.x - 1 {
      for y in 0..size.y - 1 {
        for z in 0..size.z - 1 {
          self.extract_cell(UVec3::new(x, y, z), field, triangles)?;
        }
      }
    }
    Ok(())
  }

  #[inline]
  fn extract_cell(&self, cell: UVec3, field: &DensityField, triangles: &mut Triangles) -> Result<(), IndexOverflowError> {
    let values = Self::sample(field, cell);
    let case = Self::case(&values, self.settings.iso_level) as usize;
    let crossed_edges = tables::EDGE_TABLE[case];
    if crossed_edges == 0 { // Entirely inside or outside.
      return Ok(());
    }

    let positions = Self::corner_positions(cell, field.voxel_scale());
    let mut edge_vertices = [Vec3::zero(); 12];
    for (edge, &(a, b)) in tables::EDGE_CORNERS.iter().enumerate() {
      if crossed_edges & (1 << edge) != 0 {
        edge_vertices[edge] = Self::interpolate(self.settings.iso_level, positions[a], positions[b], values[a], values[b]);
      }
    }

    for triangle in tables::TRI_TABLE[case].chunks_exact(3) {
      if triangle[0] == tables::END {
        break;
      }
      let p0 = edge_vertices[triangle[0] as usize];
      let p1 = edge_vertices[triangle[1] as usize];
      let p2 = edge_vertices[triangle[2] as usize];
      let normal = Self::face_normal(p0, p1, p2);
      triangles.push_triangle([self.vertex(p0, normal), self.vertex(p1, normal), self.vertex(p2, normal)])?;
    }
    Ok(())
  }

  #[inline]
  fn vertex(&self, position: Vec3, normal: Vec3) -> Vertex {
    Vertex::new(position, Self::planar_uv(position, self.settings.uv_scale), normal)
  }


  /// Offsets of the 8 cell corners, in the order that [`tables`] expects.
  pub const CORNERS: [UVec3; 8] = [
    UVec3::new(0, 0, 0),
    UVec3::new(1, 0, 0),
    UVec3::new(1, 0, 1),
    UVec3::new(0, 0, 1),
    UVec3::new(0, 1, 0),
    UVec3::new(1, 1, 0),
    UVec3::new(1, 1, 1),
    UVec3::new(0, 1, 1),
  ];

  #[inline]
  pub fn sample(field: &DensityField, cell: UVec3) -> [f32; 8] {
    Self::CORNERS.map(|offset| field.sample_position(cell + offset))
  }

  #[inline]
  pub fn corner_positions(cell: UVec3, voxel_scale: f32) -> [Vec3; 8] {
    let base = Vec3::from(cell) * voxel_scale;
    Self::CORNERS.map(|offset| base + Vec3::from(offset) * voxel_scale)
  }

  /// Packs one bit per corner; a bit is set when that corner's density is strictly below `iso_level`.
  #[inline]
  pub fn case(values: &[f32; 8], iso_level: f32) -> u8 {
    values.iter().enumerate().fold(0, |case, (i, value)| {
      if *value < iso_level { case | 1 << i } else { case }
    })
  }

  /// Position where the surface crosses the edge from `p1` (density `value1`) to `p2` (density `value2`).
  #[inline]
  pub fn interpolate(iso_level: f32, p1: Vec3, p2: Vec3, value1: f32, value2: f32) -> Vec3 {
    if (iso_level - value1).abs() < EPSILON {
      return p1;
    }
    if (iso_level - value2).abs() < EPSILON {
      return p2;
    }
    if (value1 - value2).abs() < EPSILON {
      return p1;
    }
    let t = (iso_level - value1) / (value2 - value1);
    p1 + t * (p2 - p1)
  }

  /// Unit normal of the triangle, or +Y when the triangle has no area.
  #[inline]
  pub fn face_normal(p0: Vec3, p1: Vec3, p2: Vec3) -> Vec3 {
    let normal = (p1 - p0).cross(p2 - p0);
    let mag_sq = normal.mag_sq();
    if mag_sq > f32::MIN_POSITIVE && mag_sq.is_finite() {
      normal / mag_sq.sqrt()
    } else {
      Vec3::unit_y()
    }
  }

  #[inline]
  pub fn planar_uv(position: Vec3, uv_scale: f32) -> Vec2 {
    Vec2::new(position.x, position.z) * uv_scale
  }
}


#[cfg(test)]
mod tests {
  use ultraviolet::{Vec2, Vec3};

  use crate::density::{DensityField, GridSize};
  use crate::marching_cubes::{MarchingCubes, MarchingCubesSettings};
  use crate::mesh::IndexOverflowError;

  fn assert_close(actual: Vec3, expected: Vec3) {
    assert!((actual - expected).mag() < 1e-5, "Expected {:?}, got {:?}", expected, actual);
  }

  #[test]
  fn case_bits_follow_corner_order() {
    let iso = 0.5;
    assert_eq!(MarchingCubes::case(&[1.0; 8], iso), 0);
    assert_eq!(MarchingCubes::case(&[0.0; 8], iso), 0xFF);
    assert_eq!(MarchingCubes::case(&[0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0], iso), 0b1000_0001);
    // Exactly at the iso level counts as not below it.
    assert_eq!(MarchingCubes::case(&[0.5; 8], iso), 0);
  }

  #[test]
  fn interpolate_degenerate_edge_returns_first() {
    let p1 = Vec3::new(1.0, 2.0, 3.0);
    let p2 = Vec3::new(4.0, 5.0, 6.0);
    assert_eq!(MarchingCubes::interpolate(0.5, p1, p2, 0.2, 0.2), p1);
    assert_eq!(MarchingCubes::interpolate(0.5, p1, p2, 0.9, 0.9 + 1e-7), p1);
  }

  #[test]
  fn interpolate_snaps_to_corner_at_iso_level() {
    let p1 = Vec3::new(1.0, 2.0, 3.0);
    let p2 = Vec3::new(4.0, 5.0, 6.0);
    assert_eq!(MarchingCubes::interpolate(0.5, p1, p2, 0.5, 7.0), p1);
    assert_eq!(MarchingCubes::interpolate(0.5, p1, p2, -3.0, 0.5), p2);
    // The first corner takes precedence when both are at the iso level.
    assert_eq!(MarchingCubes::interpolate(0.5, p1, p2, 0.5, 0.5), p1);
  }

  #[test]
  fn interpolate_is_linear_in_density() {
    let p1 = Vec3::zero();
    let p2 = Vec3::new(4.0, 0.0, 0.0);
    assert_close(MarchingCubes::interpolate(0.5, p1, p2, 0.0, 1.0), Vec3::new(2.0, 0.0, 0.0));
    assert_close(MarchingCubes::interpolate(0.25, p1, p2, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
    assert_close(MarchingCubes::interpolate(0.25, p1, p2, 1.0, 0.0), Vec3::new(3.0, 0.0, 0.0));
  }

  #[test]
  fn all_zero_field_has_no_surface() {
    let field = DensityField::default();
    let triangles = MarchingCubes::default().polygonize(&field);
    assert!(triangles.is_empty());
  }

  #[test]
  fn uniformly_solid_field_has_no_surface() {
    let mut field = DensityField::default();
    field.set_all_to(1.0);
    assert!(MarchingCubes::default().polygonize(&field).is_empty());
    field.set_all_to(0.5);
    assert!(MarchingCubes::default().polygonize(&field).is_empty());
  }

  #[test]
  fn single_corner_below_iso_level() {
    let mut field = DensityField::new(GridSize::new(2, 2, 2), 2.0);
    field.set_all_to(1.0);
    field.set(0, 0, 0, 0.0);
    let marching_cubes = MarchingCubes::new(MarchingCubesSettings { iso_level: 0.5, uv_scale: 0.5 });
    let triangles = marching_cubes.polygonize(&field);

    assert_eq!(triangles.indices(), &[0, 1, 2]);
    let vertices = triangles.vertices();
    assert_eq!(vertices.len(), 3);
    assert_close(vertices[0].position, Vec3::new(1.0, 0.0, 0.0));
    assert_close(vertices[1].position, Vec3::new(0.0, 1.0, 0.0));
    assert_close(vertices[2].position, Vec3::new(0.0, 0.0, 1.0));
    let normal = Vec3::one().normalized();
    for vertex in vertices {
      assert_close(vertex.normal, normal);
    }
    assert_eq!(vertices[0].uv, Vec2::new(0.5, 0.0));
    assert_eq!(vertices[1].uv, Vec2::new(0.0, 0.0));
    assert_eq!(vertices[2].uv, Vec2::new(0.0, 0.5));
  }

  #[test]
  fn degenerate_triangles_are_kept() {
    // Corner 0 sits exactly on the iso level while all others are below it, so every crossing snaps onto corner 0.
    let mut field = DensityField::new(GridSize::new(2, 2, 2), 1.0);
    field.set(0, 0, 0, 0.5);
    let triangles = MarchingCubes::default().polygonize(&field);
    assert_eq!(triangles.triangle_count(), 1);
    for vertex in triangles.vertices() {
      assert_eq!(vertex.position, Vec3::zero());
      assert_eq!(vertex.normal, Vec3::unit_y());
    }
  }

  #[test]
  fn sphere_end_to_end() {
    let radius = 6.0;
    let voxel_scale = 0.25;
    let mut field = DensityField::new(GridSize::new(64, 16, 64), voxel_scale);
    field.stamp_sphere(Vec3::zero(), radius, 1.0);
    let triangles = MarchingCubes::new(MarchingCubesSettings { iso_level: 0.5, uv_scale: 1.0 }).polygonize(&field);

    assert!(!triangles.is_empty());
    assert_eq!(triangles.indices().len() % 3, 0);
    assert_eq!(triangles.indices().len(), triangles.vertices().len());
    for (i, index) in triangles.indices().iter().enumerate() {
      assert_eq!(*index as usize, i);
    }
    for vertex in triangles.vertices() {
      assert!((vertex.normal.mag() - 1.0).abs() < 1e-4, "Normal {:?} is not unit length", vertex.normal);
      assert!(vertex.position.mag() <= radius + voxel_scale, "Vertex {:?} is outside of the sphere", vertex.position);
      assert_eq!(vertex.uv, Vec2::new(vertex.position.x, vertex.position.z));
    }
    for triangle in triangles.triangles() {
      assert_eq!(triangle[0].normal, triangle[1].normal);
      assert_eq!(triangle[1].normal, triangle[2].normal);
    }
  }

  #[test]
  fn output_only_depends_on_input() {
    let mut field = DensityField::new(GridSize::new(16, 16, 16), 0.5);
    field.stamp_sphere(Vec3::new(4.0, 4.0, 4.0), 3.0, 1.0);
    let marching_cubes = MarchingCubes::default();
    let first = marching_cubes.polygonize(&field);
    let second = marching_cubes.polygonize(&field);
    assert_eq!(first.vertices(), second.vertices());
    assert_eq!(first.indices(), second.indices());
  }

  fn checkerboard(size: u32) -> DensityField {
    let mut field = DensityField::new(GridSize::new(size, size, size), 1.0);
    for z in 0..size {
      for y in 0..size {
        for x in 0..size {
          field.set(x, y, z, ((x + y + z) % 2) as f32);
        }
      }
    }
    field
  }

  #[test]
  fn checkerboard_overflows_16_bit_indices() {
    // Every cell of a checkerboard yields 4 triangles: 18^3 cells * 12 vertices > 65536.
    let field = checkerboard(19);
    let error = MarchingCubes::default().try_polygonize(&field).unwrap_err();
    assert_eq!(error, IndexOverflowError { vertex_count: 65535, requested: 65538 });
  }

  #[test]
  fn small_checkerboard_fits() {
    let field = checkerboard(5);
    let triangles = MarchingCubes::default().try_polygonize(&field).unwrap();
    assert_eq!(triangles.triangle_count(), 4 * 4 * 4 * 4);
  }

  #[test]
  #[should_panic(expected = "16-bit indices")]
  fn polygonize_panics_on_overflow() {
    MarchingCubes::default().polygonize(&checkerboard(19));
  }
}
