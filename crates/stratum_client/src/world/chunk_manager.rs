use std::sync::Arc;
use std::time::Instant;

use bitvec::vec::BitVec;
use glam::{IVec3, Vec3};
use rayon::prelude::*;
use stratum_core::buffer_pool::BufferPool;
use stratum_core::jobs::JobSystem;
use stratum_shared::{
    block::{BlockCatalog, BlockType},
    coords::{
        is_within_world_height, world_to_chunk, ChunkPos, CHUNK_SIZE_X, CHUNK_SIZE_Y,
        CHUNK_SIZE_Z,
    },
    worldgen::{WorldGenSettings, WorldGenerator},
};
use tracing::{debug, info, warn};

use crate::renderer::mesh::MeshBuffers;
use crate::renderer::RenderBackend;
use crate::world::chunk::Chunk;
use crate::world::grid::ToroidalGrid;
use crate::world::BlockQuery;

#[derive(Debug, Clone)]
pub struct ChunkManagerConfig {
    pub render_distance: i32,
    pub seed: u64,
    pub start_position: Vec3,
    pub worldgen: WorldGenSettings,
}

impl Default for ChunkManagerConfig {
    fn default() -> Self {
        Self {
            render_distance: 10,
            seed: 12345678,
            start_position: Vec3::ZERO,
            worldgen: WorldGenSettings::default(),
        }
    }
}

/// Immutable view of the whole window, used while chunks mesh in parallel.
struct GridView<'a, H> {
    chunks: &'a [Chunk<H>],
    grid: &'a ToroidalGrid,
}

impl<H> BlockQuery for GridView<'_, H> {
    fn block_at(&self, world_pos: IVec3) -> BlockType {
        if world_pos.y >= CHUNK_SIZE_Y as i32 {
            return BlockType::Air;
        }
        if world_pos.y < 0 {
            return BlockType::Stone;
        }

        let (chunk_pos, local) = world_to_chunk(world_pos);
        let slot = self.grid.slot_of(chunk_pos).unwrap_or_else(|| {
            panic!(
                "block {world_pos} outside of the loaded window around chunk {:?}",
                self.grid.center()
            )
        });
        self.chunks[slot].data().get(local)
    }
}

/// Square window of chunks around the viewer.
///
/// Chunks within the generation distance hold block data; those within the render
/// distance also hold a mesh. The window slides with the viewer by recycling the chunks
/// that fall off one edge into the slots of the edge it enters.
pub struct ChunkManager<B: RenderBackend> {
    backend: Arc<B>,
    catalog: Arc<BlockCatalog>,
    generator: Arc<WorldGenerator>,
    jobs: Arc<JobSystem>,
    buffers: BufferPool<MeshBuffers>,
    chunks: Vec<Chunk<B::Handle>>,
    grid: ToroidalGrid,
    render_distance: i32,
    renderable_changed: bool,
}

impl<B: RenderBackend> ChunkManager<B> {
    pub fn new(config: ChunkManagerConfig, backend: Arc<B>, jobs: Arc<JobSystem>) -> Self {
        let render_distance = config.render_distance.max(1);
        let generation_distance = render_distance + 1;
        let center = ChunkPos::containing(config.start_position);
        let grid = ToroidalGrid::new(center, generation_distance);

        // Slot order with a zero offset: x fastest, then z.
        let mut chunks = Vec::with_capacity(grid.len());
        for rel_z in -generation_distance..=generation_distance {
            for rel_x in -generation_distance..=generation_distance {
                chunks.push(Chunk::new(center + ChunkPos::new(rel_x, rel_z)));
            }
        }

        let buffers = BufferPool::new(jobs.num_threads().max(1), MeshBuffers::default);

        let mut manager = Self {
            backend,
            catalog: Arc::new(BlockCatalog::new()),
            generator: Arc::new(WorldGenerator::with_settings(config.seed, config.worldgen)),
            jobs,
            buffers,
            chunks,
            grid,
            render_distance,
            renderable_changed: true,
        };

        let everything = BitVec::repeat(true, manager.grid.len());
        let started = Instant::now();
        let generated = manager.generate_slots(&everything);
        info!(
            "Generated {generated} chunks in {:.1} ms",
            started.elapsed().as_secs_f64() * 1000.0
        );

        let visible = manager.slots_within(render_distance);
        let started = Instant::now();
        let meshed = manager.mesh_slots(&visible);
        info!(
            "Meshed {meshed} chunks in {:.1} ms (host only)",
            started.elapsed().as_secs_f64() * 1000.0
        );

        manager
    }

    pub fn generation_distance(&self) -> i32 {
        self.grid.radius()
    }

    pub fn center(&self) -> ChunkPos {
        self.grid.center()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn chunk_at(&self, pos: ChunkPos) -> Option<&Chunk<B::Handle>> {
        self.grid.slot_of(pos).map(|slot| &self.chunks[slot])
    }

    /// Slides the window so that it is centred on the chunk holding `viewer_position`.
    /// Returns whether the centre moved.
    pub fn update_center(&mut self, viewer_position: Vec3) -> bool {
        let new_center = ChunkPos::containing(viewer_position);
        if new_center == self.grid.center() {
            return false;
        }

        let delta = self.grid.recenter(new_center);
        let generation_distance = self.grid.radius();

        let mut recycled = BitVec::repeat(false, self.grid.len());
        self.grid
            .mark_leading_rings(delta, generation_distance, &mut recycled);

        let started = Instant::now();
        for (rel_x, rel_z) in self.grid.cells_within(generation_distance) {
            let slot = self.grid.slot_index(rel_x, rel_z);
            if !recycled[slot] {
                continue;
            }
            let chunk = &mut self.chunks[slot];
            chunk.delete(&*self.backend);
            chunk.reuse(new_center + ChunkPos::new(rel_x, rel_z));
        }
        let generated = self.generate_slots(&recycled);
        let generation_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut entered = BitVec::repeat(false, self.grid.len());
        self.grid
            .mark_leading_rings(delta, self.render_distance, &mut entered);
        let to_mesh: Vec<usize> = entered
            .iter_ones()
            .filter(|&slot| !self.chunks[slot].is_meshed())
            .collect();

        let started = Instant::now();
        let meshed = self.mesh_slots(&to_mesh);
        self.renderable_changed = true;

        debug!(
            "Recentred on {:?} by {:?}: generated {generated} chunks in {generation_ms:.1} ms, \
             meshed {meshed} in {:.1} ms",
            new_center,
            delta,
            started.elapsed().as_secs_f64() * 1000.0
        );
        true
    }

    pub fn get_block(&self, world_pos: IVec3) -> BlockType {
        self.view().block_at(world_pos)
    }

    /// Writes a block. Writes above or below the world are dropped; writes outside the
    /// loaded window panic.
    pub fn set_block(&mut self, world_pos: IVec3, block: BlockType) {
        if !is_within_world_height(world_pos.y) {
            warn!("Ignoring block write outside of world height at {world_pos}");
            return;
        }

        let (chunk_pos, local) = world_to_chunk(world_pos);
        let slot = self.slot_for(chunk_pos, world_pos);
        self.chunks[slot].set_block(
            i32::from(local.x),
            i32::from(local.y),
            i32::from(local.z),
            block,
        );

        if local.is_on_horizontal_border() {
            let mut neighbors = Vec::with_capacity(2);
            if local.x == 0 {
                neighbors.push(ChunkPos::new(-1, 0));
            }
            if usize::from(local.x) == CHUNK_SIZE_X - 1 {
                neighbors.push(ChunkPos::new(1, 0));
            }
            if local.z == 0 {
                neighbors.push(ChunkPos::new(0, -1));
            }
            if usize::from(local.z) == CHUNK_SIZE_Z - 1 {
                neighbors.push(ChunkPos::new(0, 1));
            }

            for offset in neighbors {
                if let Some(neighbor) = self.grid.slot_of(chunk_pos + offset) {
                    self.chunks[neighbor].invalidate_mesh();
                }
            }
        }
        self.renderable_changed = true;
    }

    /// Whether the column holding `world_pos` is inside the loaded window.
    pub fn contains(&self, world_pos: IVec3) -> bool {
        self.grid.contains(ChunkPos::of_block(world_pos))
    }

    /// Rebuilds meshes within the render distance that edits have invalidated.
    pub fn remesh_invalidated(&mut self) -> usize {
        let stale: Vec<usize> = self
            .slots_within(self.render_distance)
            .into_iter()
            .filter(|&slot| {
                let chunk = &self.chunks[slot];
                chunk.is_generated() && !chunk.is_meshed()
            })
            .collect();
        if stale.is_empty() {
            return 0;
        }

        let meshed = self.mesh_slots(&stale);
        self.renderable_changed = true;
        meshed
    }

    /// Handles of meshed chunks whose device builds have completed.
    pub fn ready_handles(&self) -> Vec<B::Handle> {
        let mut meshed = self.chunks.iter().filter_map(|chunk| chunk.mesh_handle());
        self.backend.gather_ready(&mut meshed)
    }

    /// Polls every meshed chunk and returns how many have finished building.
    pub fn built_chunks(&mut self) -> usize {
        let backend = &*self.backend;
        self.chunks
            .iter_mut()
            .map(|chunk| chunk.is_built(backend))
            .filter(|&built| built)
            .count()
    }

    /// Reports whether the set of renderable meshes changed since the last call.
    pub fn take_renderable_changed(&mut self) -> bool {
        std::mem::take(&mut self.renderable_changed)
    }

    fn view(&self) -> GridView<'_, B::Handle> {
        GridView {
            chunks: &self.chunks,
            grid: &self.grid,
        }
    }

    fn slot_for(&self, chunk_pos: ChunkPos, world_pos: IVec3) -> usize {
        self.grid.slot_of(chunk_pos).unwrap_or_else(|| {
            panic!(
                "block {world_pos} outside of the loaded window around chunk {:?}",
                self.grid.center()
            )
        })
    }

    fn slots_within(&self, radius: i32) -> Vec<usize> {
        self.grid
            .cells_within(radius)
            .map(|(rel_x, rel_z)| self.grid.slot_index(rel_x, rel_z))
            .collect()
    }

    /// Generates the selected slots in parallel and returns once all are done.
    fn generate_slots(&mut self, selected: &BitVec) -> usize {
        let generator = &*self.generator;
        let chunks = &mut self.chunks;
        self.jobs.install(|| {
            chunks
                .par_iter_mut()
                .enumerate()
                .filter(|(slot, _)| selected[*slot])
                .for_each(|(_, chunk)| chunk.generate(generator));
        });
        selected.count_ones()
    }

    /// Meshes the given slots in parallel, then hands the results to their chunks.
    ///
    /// Workers only read the grid; handles are attached after every mesh is built.
    fn mesh_slots(&mut self, slots: &[usize]) -> usize {
        if slots.is_empty() {
            return 0;
        }

        let view = self.view();
        let backend = &*self.backend;
        let catalog = &*self.catalog;
        let buffers = &self.buffers;

        let built: Vec<(usize, B::Handle)> = self.jobs.install(|| {
            slots
                .par_iter()
                .map(|&slot| {
                    let chunk = &view.chunks[slot];
                    debug_assert!(
                        chunk.is_generated(),
                        "meshing ungenerated chunk {:?}",
                        chunk.position()
                    );
                    let mut scratch = buffers.acquire();
                    chunk.mesh_into(&view, catalog, &mut scratch);
                    let handle = backend.build_mesh(scratch.as_floats(), &scratch.indices);
                    (slot, handle)
                })
                .collect()
        });

        debug_assert_eq!(
            buffers.available(),
            buffers.capacity(),
            "mesh scratch buffer still checked out after the mesh phase"
        );

        let count = built.len();
        for (slot, handle) in built {
            self.chunks[slot].attach_mesh(handle, &*self.backend);
        }
        count
    }
}

impl<B: RenderBackend> Drop for ChunkManager<B> {
    fn drop(&mut self) {
        for chunk in &mut self.chunks {
            chunk.delete(&*self.backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::{IVec3, Vec3};
    use stratum_core::jobs::JobSystem;
    use stratum_shared::block::BlockType;
    use stratum_shared::coords::ChunkPos;
    use stratum_shared::worldgen::WorldGenerator;

    use super::{ChunkManager, ChunkManagerConfig};
    use crate::renderer::headless::{HeadlessBackend, HeadlessSettings};

    const RENDER_DISTANCE: i32 = 2;

    fn manager_at(start: Vec3) -> ChunkManager<HeadlessBackend> {
        let backend = Arc::new(HeadlessBackend::new(HeadlessSettings {
            build_latency_frames: 0,
            cleanup_threshold: 1000,
        }));
        let jobs = Arc::new(JobSystem::new(Some(2)).expect("build pool"));
        let config = ChunkManagerConfig {
            render_distance: RENDER_DISTANCE,
            start_position: start,
            ..ChunkManagerConfig::default()
        };
        ChunkManager::new(config, backend, jobs)
    }

    fn assert_window_consistent(manager: &ChunkManager<HeadlessBackend>) {
        let center = manager.center();
        let generation_distance = manager.generation_distance();
        for rel_z in -generation_distance..=generation_distance {
            for rel_x in -generation_distance..=generation_distance {
                let pos = center + ChunkPos::new(rel_x, rel_z);
                let chunk = manager.chunk_at(pos).expect("chunk inside window");
                assert_eq!(chunk.position(), pos);
                assert!(chunk.is_generated(), "{pos:?} not generated");
                if rel_x.abs() <= RENDER_DISTANCE && rel_z.abs() <= RENDER_DISTANCE {
                    assert!(chunk.is_meshed(), "{pos:?} not meshed");
                }
            }
        }
    }

    #[test]
    fn initial_window_is_generated_and_meshed() {
        let manager = manager_at(Vec3::new(8.0, 140.0, 8.0));
        assert_eq!(manager.generation_distance(), 3);
        assert_window_consistent(&manager);
        assert_eq!(manager.backend().stats().total_builds, 25);
    }

    #[test]
    fn single_step_recycles_one_edge() {
        let mut manager = manager_at(Vec3::ZERO);
        assert!(manager.update_center(Vec3::new(16.5, 100.0, 3.0)));
        assert_eq!(manager.center(), ChunkPos::new(1, 0));
        assert_window_consistent(&manager);

        // one new render column; the chunk that left was outside the render square
        let stats = manager.backend().stats();
        assert_eq!(stats.total_builds, 30);
        assert_eq!(stats.releases, 0);

        assert!(!manager.update_center(Vec3::new(20.0, 0.0, 15.0)));
    }

    #[test]
    fn negative_diagonal_moves_keep_the_window_consistent() {
        let mut manager = manager_at(Vec3::ZERO);
        manager.update_center(Vec3::new(-20.0, 0.0, -40.0));
        assert_eq!(manager.center(), ChunkPos::new(-2, -3));
        assert_window_consistent(&manager);

        manager.update_center(Vec3::new(-1.0, 0.0, 20.0));
        assert_eq!(manager.center(), ChunkPos::new(-1, 1));
        assert_window_consistent(&manager);
    }

    #[test]
    fn jumps_past_the_window_regenerate_everything() {
        let mut manager = manager_at(Vec3::ZERO);
        manager.update_center(Vec3::new(1600.0, 0.0, -800.0));
        assert_eq!(manager.center(), ChunkPos::new(100, -50));
        assert_window_consistent(&manager);

        let stats = manager.backend().stats();
        assert_eq!(stats.total_builds, 50);
        assert_eq!(stats.releases, 25);
        assert_eq!(stats.live_meshes, 25);
    }

    #[test]
    fn recycled_chunks_hold_the_generated_terrain() {
        let mut manager = manager_at(Vec3::ZERO);
        manager.update_center(Vec3::new(64.0, 0.0, -32.0));

        let generator = WorldGenerator::new(12345678);
        for (x, z) in [(100, -80), (31, 20), (16, -1)] {
            let sample = generator.generate_height(x, z);
            for y in [0, 90, sample.height, sample.height + 1, 255] {
                assert_eq!(
                    manager.get_block(IVec3::new(x, y, z)),
                    generator.classify_block(y, &sample),
                    "({x}, {y}, {z})"
                );
            }
        }
    }

    #[test]
    fn edits_cross_chunk_borders_and_invalidate_neighbours() {
        let mut manager = manager_at(Vec3::ZERO);
        assert!(manager.take_renderable_changed());
        assert!(!manager.take_renderable_changed());

        let edited = IVec3::new(-1, 200, 5);
        manager.set_block(edited, BlockType::Leaves);
        assert_eq!(manager.get_block(edited), BlockType::Leaves);
        assert!(manager.take_renderable_changed());

        assert!(!manager.chunk_at(ChunkPos::new(-1, 0)).unwrap().is_meshed());
        assert!(!manager.chunk_at(ChunkPos::new(0, 0)).unwrap().is_meshed());
        assert!(manager.chunk_at(ChunkPos::new(-1, 1)).unwrap().is_meshed());

        assert_eq!(manager.remesh_invalidated(), 2);
        assert_window_consistent(&manager);
        assert_eq!(manager.remesh_invalidated(), 0);
    }

    #[test]
    fn vertical_lookups_fall_back_outside_the_world() {
        let mut manager = manager_at(Vec3::ZERO);
        assert_eq!(manager.get_block(IVec3::new(3, 256, 3)), BlockType::Air);
        assert_eq!(manager.get_block(IVec3::new(3, -1, 3)), BlockType::Stone);

        manager.set_block(IVec3::new(3, 300, 3), BlockType::Dirt);
        manager.set_block(IVec3::new(3, -5, 3), BlockType::Dirt);
        assert!(manager.chunk_at(ChunkPos::new(0, 0)).unwrap().is_meshed());
    }

    #[test]
    fn contains_matches_the_generation_window() {
        let manager = manager_at(Vec3::ZERO);
        assert!(manager.contains(IVec3::new(63, 0, -48)));
        assert!(manager.contains(IVec3::new(-48, 999, 0)));
        assert!(!manager.contains(IVec3::new(64, 0, 0)));
        assert!(!manager.contains(IVec3::new(0, 0, -49)));
    }

    #[test]
    #[should_panic(expected = "outside of the loaded window")]
    fn horizontal_access_outside_the_window_panics() {
        let manager = manager_at(Vec3::ZERO);
        manager.get_block(IVec3::new(64, 10, 0));
    }

    #[test]
    fn ready_handles_follow_backend_completion() {
        let manager = manager_at(Vec3::ZERO);
        assert!(manager.ready_handles().is_empty());

        manager.backend().end_frame();
        assert_eq!(manager.ready_handles().len(), 25);
    }

    #[test]
    fn built_chunks_are_counted_once_ready() {
        let mut manager = manager_at(Vec3::ZERO);
        assert_eq!(manager.built_chunks(), 0);
        manager.backend().end_frame();
        assert_eq!(manager.built_chunks(), 25);
    }

    #[test]
    fn dropping_the_manager_releases_every_mesh() {
        let manager = manager_at(Vec3::ZERO);
        let backend = Arc::clone(manager.backend());
        assert_eq!(backend.stats().live_meshes, 25);

        drop(manager);
        assert_eq!(backend.stats().live_meshes, 0);
        assert_eq!(backend.stats().releases, 25);
    }
}
