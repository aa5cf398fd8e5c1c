use tracing::trace;
use ultraviolet::{UVec3, Vec3};

// Voxel

#[repr(transparent)]
#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub struct Voxel {
  pub density: f32,
}

impl Voxel {
  #[inline]
  pub const fn new(density: f32) -> Self { Self { density } }
}

// Sphere stamp

#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SphereStamp {
  pub center: Vec3,
  pub radius: f32,
  pub density: f32,
}

impl Default for SphereStamp {
  #[inline]
  fn default() -> Self {
    Self { center: Vec3::zero(), radius: 6.0, density: 1.0 }
  }
}

// Grid size

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GridSize {
  pub x: u32,
  pub y: u32,
  pub z: u32,
}

impl GridSize {
  #[inline]
  pub const fn new(x: u32, y: u32, z: u32) -> Self { Self { x, y, z } }

  #[inline]
  pub fn is_empty(&self) -> bool { self.x == 0 || self.y == 0 || self.z == 0 }

  /// Number of grid points.
  #[inline]
  pub fn len(&self) -> usize { self.x as usize * self.y as usize * self.z as usize }
}

impl Default for GridSize {
  #[inline]
  fn default() -> Self { DEFAULT_GRID_SIZE }
}

impl From<GridSize> for UVec3 {
  #[inline]
  fn from(size: GridSize) -> Self { UVec3::new(size.x, size.y, size.z) }
}

// Density field

pub const DEFAULT_GRID_SIZE: GridSize = GridSize::new(64, 16, 64);
pub const DEFAULT_VOXEL_SCALE: f32 = 0.25;

/// Dense grid of densities with fixed dimensions. Grid index `(x, y, z)` lies at world position
/// `(x, y, z) * voxel_scale`.
#[derive(Clone, Debug)]
pub struct DensityField {
  size: GridSize,
  voxel_scale: f32,
  voxels: Vec<Voxel>,
}

impl DensityField {
  pub fn new(size: GridSize, voxel_scale: f32) -> Self {
    assert_ne!(size.x, 0, "Grid width may not be 0");
    assert_ne!(size.y, 0, "Grid height may not be 0");
    assert_ne!(size.z, 0, "Grid depth may not be 0");
    Self { size, voxel_scale, voxels: vec![Voxel::default(); size.len()] }
  }


  #[inline]
  pub fn size(&self) -> GridSize { self.size }

  #[inline]
  pub fn voxel_scale(&self) -> f32 { self.voxel_scale }

  /// Changes the spacing between grid points. Densities are left as they are.
  #[inline]
  pub fn set_voxel_scale(&mut self, voxel_scale: f32) { self.voxel_scale = voxel_scale; }

  #[inline]
  pub fn len(&self) -> usize { self.voxels.len() }

  #[inline]
  pub fn voxels(&self) -> &[Voxel] { &self.voxels }


  #[inline]
  pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
    debug_assert!(x < self.size.x && y < self.size.y && z < self.size.z, "Position ({}, {}, {}) is outside of grid {:?}", x, y, z, self.size);
    x as usize + self.size.x as usize * (y as usize + self.size.y as usize * z as usize)
  }

  #[inline]
  pub fn sample(&self, x: u32, y: u32, z: u32) -> f32 {
    self.voxels[self.index(x, y, z)].density
  }

  #[inline]
  pub fn sample_position(&self, position: UVec3) -> f32 {
    self.sample(position.x, position.y, position.z)
  }

  #[inline]
  pub fn set(&mut self, x: u32, y: u32, z: u32, density: f32) {
    let index = self.index(x, y, z);
    self.voxels[index].density = density;
  }

  #[inline]
  pub fn set_all_to(&mut self, density: f32) {
    self.voxels.fill(Voxel::new(density));
  }

  #[inline]
  pub fn world_position(&self, x: u32, y: u32, z: u32) -> Vec3 {
    Vec3::new(x as f32, y as f32, z as f32) * self.voxel_scale
  }


  /// Writes a sphere with linear falloff into the field: every grid point strictly closer than `radius` to `center`
  /// gets `density * (1 - distance / radius)`, replacing its previous density. Points at or beyond `radius` are left
  /// untouched. Returns the number of grid points written.
  #[profiling::function]
  pub fn stamp_sphere(&mut self, center: Vec3, radius: f32, density: f32) -> u32 {
    let mut written = 0;
    let size = self.size;
    for z in 0..size.z {
      for y in 0..size.y {
        for x in 0..size.x {
          let distance = (center - self.world_position(x, y, z)).mag();
          if distance < radius {
            self.set(x, y, z, density * (1.0 - distance / radius));
            written += 1;
          }
        }
      }
    }
    trace!("Stamped sphere at {:?} with radius {} and density {} into {} voxels", center, radius, density, written);
    written
  }

  #[inline]
  pub fn stamp(&mut self, stamp: &SphereStamp) -> u32 {
    self.stamp_sphere(stamp.center, stamp.radius, stamp.density)
  }
}

impl Default for DensityField {
  #[inline]
  fn default() -> Self { Self::new(DEFAULT_GRID_SIZE, DEFAULT_VOXEL_SCALE) }
}
