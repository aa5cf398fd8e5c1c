use std::path::PathBuf;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use terrain::editor::{MeshPoll, TerrainEditor};
use terrain::mesh::Vertex;

use crate::config::{CONFIG_FILE_PATH, Config};

mod config;

fn main() {
  #[cfg(feature = "profile-with-tracy")]
  tracy_client::Client::start();
  profiling::register_thread!();
  dotenv::dotenv().ok();
  let filter_layer = EnvFilter::from_env("MAIN_LOG");
  tracing_subscriber::registry()
    .with(filter_layer)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(CONFIG_FILE_PATH));
  let config = Config::load_or_default(&config_path);
  debug!("Using config {:?}", config);

  let mut editor = TerrainEditor::new(config.editor);
  let mut mesh_poll = MeshPoll::new();
  for tick in 0..config.ticks {
    for scale_change in config.scale_changes.iter().filter(|c| c.tick == tick) {
      info!("Tick {}: requesting voxel scale {}", tick, scale_change.voxel_scale);
      editor.set_pending_voxel_scale(scale_change.voxel_scale);
    }
    editor.update();

    // Stand-in for a renderer: upload the mesh whenever a new one was built.
    if let Some(mesh) = mesh_poll.poll(&editor) {
      info!(
        "Tick {}: uploading mesh generation {} with {} vertices, {} indices ({} bytes of vertex data), edited flag {}",
        tick,
        mesh_poll.last_seen_generation(),
        mesh.vertices().len(),
        mesh.indices().len(),
        bytemuck::cast_slice::<Vertex, u8>(mesh.vertices()).len(),
        editor.is_edited(),
      );
    }
    profiling::finish_frame!();
  }
  info!("Done after {} ticks with {} triangles at voxel scale {}", config.ticks, editor.mesh().triangle_count(), editor.field().voxel_scale());
}
