use std::fs;
use std::io;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use stratum_shared::worldgen::WorldGenSettings;
use tracing::warn;

use crate::renderer::headless::HeadlessSettings;
use crate::world::chunk_manager::ChunkManagerConfig;

pub const DEFAULT_SETTINGS_PATH: &str = "stratum.toml";
const MIN_RENDER_DISTANCE: i32 = 1;
const MAX_RENDER_DISTANCE: i32 = 64;
const MAX_WORKER_THREADS: usize = 256;
const MIN_FRAME_TIME: f32 = 0.001;
const MAX_FRAME_TIME: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_render_distance")]
    pub render_distance: i32,
    #[serde(default = "default_dynamic_world")]
    pub dynamic_world: bool,
    #[serde(default = "default_start_position")]
    pub start_position: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    /// Frames to run; 0 runs until interrupted.
    #[serde(default = "default_frames")]
    pub frames: u64,
    #[serde(default = "default_viewer_velocity")]
    pub viewer_velocity: [f32; 3],
    #[serde(default = "default_frame_time")]
    pub frame_time: f32,
    #[serde(default)]
    pub worldgen: WorldGenSettings,
    #[serde(default)]
    pub backend: HeadlessSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            render_distance: default_render_distance(),
            dynamic_world: default_dynamic_world(),
            start_position: default_start_position(),
            worker_threads: None,
            frames: default_frames(),
            viewer_velocity: default_viewer_velocity(),
            frame_time: default_frame_time(),
            worldgen: WorldGenSettings::default(),
            backend: HeadlessSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn sanitize(mut self) -> Self {
        self.render_distance = self
            .render_distance
            .clamp(MIN_RENDER_DISTANCE, MAX_RENDER_DISTANCE);
        self.worker_threads = self
            .worker_threads
            .filter(|&count| count > 0)
            .map(|count| count.min(MAX_WORKER_THREADS));
        if !Vec3::from_array(self.start_position).is_finite() {
            self.start_position = default_start_position();
        }
        if !Vec3::from_array(self.viewer_velocity).is_finite() {
            self.viewer_velocity = default_viewer_velocity();
        }
        self.frame_time = if self.frame_time.is_finite() {
            self.frame_time.clamp(MIN_FRAME_TIME, MAX_FRAME_TIME)
        } else {
            default_frame_time()
        };
        self.worldgen = self.worldgen.sanitize();
        self.backend = self.backend.sanitize();
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }

    pub fn chunk_manager_config(&self) -> ChunkManagerConfig {
        ChunkManagerConfig {
            render_distance: self.render_distance,
            seed: self.seed,
            start_position: Vec3::from_array(self.start_position),
            worldgen: self.worldgen.clone(),
        }
    }
}

fn default_seed() -> u64 {
    12345678
}

fn default_render_distance() -> i32 {
    10
}

fn default_dynamic_world() -> bool {
    true
}

fn default_start_position() -> [f32; 3] {
    [8.0, 140.0, 8.0]
}

fn default_frames() -> u64 {
    240
}

fn default_viewer_velocity() -> [f32; 3] {
    [24.0, 0.0, 6.0]
}

fn default_frame_time() -> f32 {
    1.0 / 60.0
}

pub fn load_or_create_settings(path: &Path) -> EngineSettings {
    match EngineSettings::load(path) {
        Ok(settings) => settings,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let settings = EngineSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            EngineSettings::default()
        }
    }
}
