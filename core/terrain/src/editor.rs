use std::ops::RangeInclusive;

use tracing::debug;

use crate::density::{DEFAULT_GRID_SIZE, DEFAULT_VOXEL_SCALE, DensityField, GridSize, SphereStamp};
use crate::marching_cubes::{MarchingCubes, MarchingCubesSettings};
use crate::mesh::Triangles;

// Settings

/// Voxel scales that an editing UI offers.
pub const VOXEL_SCALE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TerrainEditorSettings {
  pub grid_size: GridSize,
  pub voxel_scale: f32,
  pub marching_cubes: MarchingCubesSettings,
  pub initial_stamp: SphereStamp,
}

impl TerrainEditorSettings {
  #[inline]
  pub fn check(&self) {
    assert!(!self.grid_size.is_empty(), "Grid size {:?} may not have a 0 dimension", self.grid_size);
    assert!(VOXEL_SCALE_RANGE.contains(&self.voxel_scale), "Voxel scale {} must be in range {:?}", self.voxel_scale, VOXEL_SCALE_RANGE);
  }
}

impl Default for TerrainEditorSettings {
  fn default() -> Self {
    Self {
      grid_size: DEFAULT_GRID_SIZE,
      voxel_scale: DEFAULT_VOXEL_SCALE,
      marching_cubes: MarchingCubesSettings::default(),
      initial_stamp: SphereStamp::default(),
    }
  }
}

// Terrain editor

/// Owns a density field and the mesh last extracted from it.
///
/// Consumers learn about new meshes either through [`Self::is_edited`], which flips on every rebuild, or by comparing
/// [`Self::generation`] against the last generation they saw (see [`MeshPoll`]).
#[derive(Debug)]
pub struct TerrainEditor {
  field: DensityField,
  marching_cubes: MarchingCubes,
  mesh: Triangles,
  edited: bool,
  generation: u64,
  pending_voxel_scale: f32,
}

impl TerrainEditor {
  pub fn new(settings: TerrainEditorSettings) -> Self {
    settings.check();
    let mut field = DensityField::new(settings.grid_size, settings.voxel_scale);
    field.stamp(&settings.initial_stamp);
    let mut editor = Self {
      field,
      marching_cubes: MarchingCubes::new(settings.marching_cubes),
      mesh: Triangles::new(),
      edited: false,
      generation: 0,
      pending_voxel_scale: settings.voxel_scale,
    };
    editor.rebuild();
    editor
  }


  #[inline]
  pub fn field(&self) -> &DensityField { &self.field }

  #[inline]
  pub fn marching_cubes(&self) -> &MarchingCubes { &self.marching_cubes }

  #[inline]
  pub fn mesh(&self) -> &Triangles { &self.mesh }

  #[inline]
  pub fn is_edited(&self) -> bool { self.edited }

  #[inline]
  pub fn toggle_edited(&mut self) { self.edited = !self.edited; }

  /// Number of rebuilds so far, including the one done on construction.
  #[inline]
  pub fn generation(&self) -> u64 { self.generation }


  #[inline]
  pub fn pending_voxel_scale(&self) -> f32 { self.pending_voxel_scale }

  /// Mutable access for binding the pending voxel scale to a UI control. Values outside of [`VOXEL_SCALE_RANGE`] are
  /// applied as is.
  #[inline]
  pub fn pending_voxel_scale_mut(&mut self) -> &mut f32 { &mut self.pending_voxel_scale }

  #[inline]
  pub fn set_pending_voxel_scale(&mut self, voxel_scale: f32) {
    self.pending_voxel_scale = voxel_scale.clamp(*VOXEL_SCALE_RANGE.start(), *VOXEL_SCALE_RANGE.end());
  }


  /// Applies a pending voxel scale change. Returns whether the mesh was rebuilt.
  ///
  /// The rebuild happens *before* the new scale is stored on the field, so the mesh published by this call still uses
  /// the previous scale. The new scale only shows up in the mesh of the next rebuild.
  pub fn update(&mut self) -> bool {
    let current_voxel_scale = self.field.voxel_scale();
    if self.pending_voxel_scale != current_voxel_scale {
      debug!("Voxel scale changed from {} to {}", current_voxel_scale, self.pending_voxel_scale);
      self.rebuild();
      self.field.set_voxel_scale(self.pending_voxel_scale);
      true
    } else {
      false
    }
  }

  /// Stamps a sphere into the field and rebuilds the mesh.
  pub fn stamp(&mut self, stamp: SphereStamp) {
    self.field.stamp(&stamp);
    self.rebuild();
  }

  /// Replaces the mesh with a full extraction of the field, and flips the edited flag.
  ///
  /// # Panics
  ///
  /// Panics when the mesh needs more vertices than 16-bit indices can address.
  #[profiling::function]
  pub fn rebuild(&mut self) {
    self.mesh = self.marching_cubes.polygonize(&self.field);
    self.toggle_edited();
    self.generation += 1;
    debug!(
      "Rebuilt terrain mesh generation {} with {} vertices and {} triangles at voxel scale {}",
      self.generation,
      self.mesh.vertices().len(),
      self.mesh.triangle_count(),
      self.field.voxel_scale(),
    );
  }
}

impl Default for TerrainEditor {
  #[inline]
  fn default() -> Self { Self::new(TerrainEditorSettings::default()) }
}

// Mesh poll

/// Consumer-side record of the last mesh generation seen.
#[derive(Default, Copy, Clone, Debug)]
pub struct MeshPoll {
  last_seen_generation: u64,
}

impl MeshPoll {
  #[inline]
  pub fn new() -> Self { Self::default() }

  #[inline]
  pub fn last_seen_generation(&self) -> u64 { self.last_seen_generation }

  /// Returns the editor's mesh if it was rebuilt since the previous poll.
  #[inline]
  pub fn poll<'e>(&mut self, editor: &'e TerrainEditor) -> Option<&'e Triangles> {
    let generation = editor.generation();
    if generation != self.last_seen_generation {
      self.last_seen_generation = generation;
      Some(editor.mesh())
    } else {
      None
    }
  }
}


#[cfg(test)]
mod tests {
  use ultraviolet::Vec3;

  use crate::density::{GridSize, SphereStamp};
  use crate::editor::{MeshPoll, TerrainEditor, TerrainEditorSettings};

  fn small_settings() -> TerrainEditorSettings {
    TerrainEditorSettings {
      grid_size: GridSize::new(16, 8, 16),
      voxel_scale: 0.5,
      initial_stamp: SphereStamp { center: Vec3::zero(), radius: 4.0, density: 1.0 },
      ..TerrainEditorSettings::default()
    }
  }

  #[test]
  fn construction_stamps_and_rebuilds_once() {
    let editor = TerrainEditor::default();
    assert_eq!(editor.generation(), 1);
    assert!(editor.is_edited());
    assert!(!editor.mesh().is_empty());
    assert_eq!(editor.field().sample(0, 0, 0), 1.0);
    assert_eq!(editor.field().voxel_scale(), 0.25);
    assert_eq!(editor.pending_voxel_scale(), 0.25);
  }

  #[test]
  fn rebuild_toggles_edited() {
    let mut editor = TerrainEditor::new(small_settings());
    let before = editor.is_edited();
    editor.rebuild();
    assert_ne!(editor.is_edited(), before);
    editor.rebuild();
    assert_eq!(editor.is_edited(), before);
    assert_eq!(editor.generation(), 3);
  }

  #[test]
  fn update_without_change_does_nothing() {
    let mut editor = TerrainEditor::new(small_settings());
    assert!(!editor.update());
    assert!(!editor.update());
    assert_eq!(editor.generation(), 1);
    assert!(editor.is_edited());
  }

  #[test]
  fn scale_change_rebuilds_with_previous_scale() {
    let mut editor = TerrainEditor::new(small_settings());
    let initial_vertices = editor.mesh().vertices().to_vec();

    editor.set_pending_voxel_scale(1.0);
    assert!(editor.update());
    assert_eq!(editor.generation(), 2);
    assert!(!editor.is_edited());
    // The mesh rebuilt in response to the change is still extracted at the old scale.
    assert_eq!(editor.mesh().vertices(), initial_vertices.as_slice());
    assert_eq!(editor.field().voxel_scale(), 1.0);

    // The scale is now applied, so further updates do not rebuild.
    assert!(!editor.update());
    assert_eq!(editor.generation(), 2);

    // The next rebuild picks up the new scale.
    editor.rebuild();
    assert_eq!(editor.mesh().vertices().len(), initial_vertices.len());
    for (scaled, initial) in editor.mesh().vertices().iter().zip(&initial_vertices) {
      assert!((scaled.position - initial.position * 2.0).mag() < 1e-4);
    }
  }

  #[test]
  fn pending_scale_is_clamped() {
    let mut editor = TerrainEditor::new(small_settings());
    editor.set_pending_voxel_scale(5.0);
    assert_eq!(editor.pending_voxel_scale(), 2.0);
    editor.set_pending_voxel_scale(-1.0);
    assert_eq!(editor.pending_voxel_scale(), 0.0);
    *editor.pending_voxel_scale_mut() = 0.75;
    assert_eq!(editor.pending_voxel_scale(), 0.75);
  }

  #[test]
  fn stamp_rebuilds() {
    let mut editor = TerrainEditor::new(small_settings());
    let triangle_count = editor.mesh().triangle_count();
    editor.stamp(SphereStamp { center: Vec3::new(6.0, 0.0, 6.0), radius: 2.0, density: 1.0 });
    assert_eq!(editor.generation(), 2);
    assert!(!editor.is_edited());
    assert!(editor.mesh().triangle_count() > triangle_count);
  }

  #[test]
  fn mesh_poll_yields_each_generation_once() {
    let mut editor = TerrainEditor::new(small_settings());
    let mut poll = MeshPoll::new();
    assert!(poll.poll(&editor).is_some());
    assert!(poll.poll(&editor).is_none());
    // Two rebuilds between polls restore the edited flag, but still count as a new mesh.
    let edited = editor.is_edited();
    editor.rebuild();
    editor.rebuild();
    assert_eq!(editor.is_edited(), edited);
    assert!(poll.poll(&editor).is_some());
    assert_eq!(poll.last_seen_generation(), 3);
    assert!(poll.poll(&editor).is_none());
  }

  #[test]
  #[should_panic]
  fn out_of_range_voxel_scale_is_rejected() {
    TerrainEditor::new(TerrainEditorSettings { voxel_scale: 3.0, ..TerrainEditorSettings::default() });
  }
}
