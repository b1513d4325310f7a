use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use rayon::ThreadPoolBuildError;
use stratum_core::jobs::JobSystem;
use stratum_shared::coords::ChunkPos;
use tracing::{debug, info};

use crate::renderer::headless::{HeadlessBackend, HeadlessStats};
use crate::settings::EngineSettings;
use crate::world::chunk_manager::ChunkManager;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Viewer {
    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub recentred: bool,
    pub remeshed: usize,
    pub renderable_changed: bool,
    pub ready_meshes: usize,
    pub built_chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub recenters: u64,
    pub final_center: ChunkPos,
    pub ready_meshes: usize,
    pub backend: HeadlessStats,
}

/// Everything one engine session owns. Built once and passed explicitly.
pub struct App {
    settings: EngineSettings,
    backend: Arc<HeadlessBackend>,
    chunks: ChunkManager<HeadlessBackend>,
    viewer: Viewer,
    frame: u64,
    recenters: u64,
}

impl App {
    pub fn new(settings: EngineSettings) -> Result<Self, ThreadPoolBuildError> {
        let settings = settings.sanitize();
        let jobs = Arc::new(JobSystem::new(settings.worker_threads)?);
        let backend = Arc::new(HeadlessBackend::new(settings.backend.clone()));

        info!(
            "Starting world: seed={}, render_distance={}, workers={}",
            settings.seed,
            settings.render_distance,
            jobs.num_threads()
        );
        let chunks = ChunkManager::new(
            settings.chunk_manager_config(),
            Arc::clone(&backend),
            jobs,
        );

        let viewer = Viewer {
            position: Vec3::from_array(settings.start_position),
            velocity: Vec3::from_array(settings.viewer_velocity),
        };

        Ok(Self {
            settings,
            backend,
            chunks,
            viewer,
            frame: 0,
            recenters: 0,
        })
    }

    pub fn step(&mut self) -> FrameReport {
        self.viewer.advance(self.settings.frame_time);

        let recentred =
            self.settings.dynamic_world && self.chunks.update_center(self.viewer.position);
        if recentred {
            self.recenters += 1;
        }
        let remeshed = self.chunks.remesh_invalidated();

        self.backend.end_frame();
        let ready_meshes = self.chunks.ready_handles().len();
        let built_chunks = self.chunks.built_chunks();
        let renderable_changed = self.chunks.take_renderable_changed();
        if renderable_changed {
            debug!(
                "Frame {}: renderable set changed, {ready_meshes} meshes ready, \
                 {built_chunks} chunks built",
                self.frame
            );
        }

        self.frame += 1;
        FrameReport {
            recentred,
            remeshed,
            renderable_changed,
            ready_meshes,
            built_chunks,
        }
    }

    /// Runs the configured number of frames, or until `running` is cleared.
    pub fn run(mut self, running: &AtomicBool) -> RunSummary {
        let started = Instant::now();
        let mut ready_meshes = 0;

        while running.load(Ordering::SeqCst)
            && (self.settings.frames == 0 || self.frame < self.settings.frames)
        {
            ready_meshes = self.step().ready_meshes;
        }

        self.backend.wait_idle();
        let summary = RunSummary {
            frames: self.frame,
            recenters: self.recenters,
            final_center: self.chunks.center(),
            ready_meshes,
            backend: self.backend.stats(),
        };

        info!(
            "Ran {} frames in {:.2} s: {} recenters, final chunk {:?}, {} meshes ready, \
             {} built, {} released",
            summary.frames,
            started.elapsed().as_secs_f64(),
            summary.recenters,
            summary.final_center,
            summary.ready_meshes,
            summary.backend.total_builds,
            summary.backend.releases
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use glam::Vec3;
    use stratum_shared::coords::ChunkPos;

    use super::{App, Viewer};
    use crate::renderer::headless::HeadlessSettings;
    use crate::settings::EngineSettings;

    fn small_settings() -> EngineSettings {
        EngineSettings {
            render_distance: 2,
            worker_threads: Some(2),
            frames: 30,
            start_position: [8.0, 140.0, 8.0],
            viewer_velocity: [60.0, 0.0, 0.0],
            frame_time: 0.1,
            backend: HeadlessSettings {
                build_latency_frames: 1,
                cleanup_threshold: 1000,
            },
            ..EngineSettings::default()
        }
    }

    #[test]
    fn viewer_moves_by_velocity() {
        let mut viewer = Viewer {
            position: Vec3::new(1.0, 2.0, 3.0),
            velocity: Vec3::new(10.0, 0.0, -5.0),
        };
        viewer.advance(0.5);
        assert_eq!(viewer.position, Vec3::new(6.0, 2.0, 0.5));
    }

    #[test]
    fn moving_viewer_recentres_the_world() {
        let app = App::new(small_settings()).expect("start app");
        let running = AtomicBool::new(true);
        let summary = app.run(&running);

        assert_eq!(summary.frames, 30);
        // 8 + 30 * 6 = 188 blocks along x
        assert_eq!(summary.final_center, ChunkPos::new(11, 0));
        assert_eq!(summary.recenters, 11);
        // the render square plus the column that slid into the generation ring,
        // which keeps its mesh until it is recycled
        assert_eq!(summary.backend.live_meshes, 30);
        assert_eq!(summary.backend.pending_cleanups, 0);
    }

    #[test]
    fn walking_keeps_the_render_square_meshed() {
        let mut app = App::new(small_settings()).expect("start app");
        for _ in 0..30 {
            app.step();
        }

        let center = app.chunks.center();
        assert_eq!(center, ChunkPos::new(11, 0));
        for rel_z in -2..=2 {
            for rel_x in -2..=2 {
                let pos = center + ChunkPos::new(rel_x, rel_z);
                let chunk = app.chunks.chunk_at(pos).expect("chunk inside window");
                assert_eq!(chunk.position(), pos);
                assert!(chunk.is_meshed(), "{pos:?} not meshed");
            }
        }

        let trailing_meshed = (-2..=2)
            .filter_map(|rel_z| app.chunks.chunk_at(center + ChunkPos::new(-3, rel_z)))
            .filter(|chunk| chunk.is_meshed())
            .count();
        assert_eq!(trailing_meshed, 5);
        assert_eq!(app.backend.stats().live_meshes, 30);
    }

    #[test]
    fn static_world_ignores_viewer_motion() {
        let settings = EngineSettings {
            dynamic_world: false,
            ..small_settings()
        };
        let mut app = App::new(settings).expect("start app");

        let first = app.step();
        assert!(!first.recentred);
        assert!(first.renderable_changed);
        let second = app.step();
        assert!(!second.renderable_changed);
        assert_eq!(second.ready_meshes, 25);
        assert_eq!(second.built_chunks, 25);
        assert_eq!(app.chunks.center(), ChunkPos::new(0, 0));
    }

    #[test]
    fn cleared_running_flag_stops_immediately() {
        let app = App::new(small_settings()).expect("start app");
        let running = AtomicBool::new(false);
        let summary = app.run(&running);
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.final_center, ChunkPos::new(0, 0));
    }
}
