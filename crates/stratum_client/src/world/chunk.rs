use glam::IVec3;
use stratum_shared::{
    block::{BlockCatalog, BlockType},
    chunk::ChunkData,
    coords::{ChunkPos, LocalPos},
    worldgen::WorldGenerator,
};

use crate::renderer::mesh::{build_chunk_mesh, MeshBuffers};
use crate::renderer::RenderBackend;
use crate::world::BlockQuery;

/// One column of the loaded world and the device mesh built from it.
///
/// Lifecycle: empty, generated, meshed, then built once the backend reports the mesh
/// ready. A chunk leaving the window is released and reused for a new position without
/// reallocating its block storage.
pub struct Chunk<H> {
    data: ChunkData,
    position: ChunkPos,
    generated: bool,
    meshed: bool,
    built: bool,
    mesh: Option<H>,
}

impl<H> Chunk<H> {
    pub fn new(position: ChunkPos) -> Self {
        Self {
            data: ChunkData::new_empty(),
            position,
            generated: false,
            meshed: false,
            built: false,
            mesh: None,
        }
    }

    pub fn position(&self) -> ChunkPos {
        self.position
    }

    pub fn data(&self) -> &ChunkData {
        &self.data
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn is_meshed(&self) -> bool {
        self.meshed
    }

    pub fn mesh_handle(&self) -> Option<&H> {
        if self.meshed {
            self.mesh.as_ref()
        } else {
            None
        }
    }

    pub fn generate(&mut self, generator: &WorldGenerator) {
        generator.fill_chunk(self.position, &mut self.data);
        self.generated = true;
    }

    /// Reads a block by chunk-local coordinates. Coordinates outside the chunk are
    /// resolved through `world`.
    pub fn get_block(&self, x: i32, y: i32, z: i32, world: &dyn BlockQuery) -> BlockType {
        match LocalPos::checked(x, y, z) {
            Some(local) => self.data.get(local),
            None => world.block_at(self.position.origin() + IVec3::new(x, y, z)),
        }
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockType) {
        let local = LocalPos::checked(x, y, z).unwrap_or_else(|| {
            panic!(
                "local block ({x}, {y}, {z}) outside of chunk {:?}",
                self.position
            )
        });
        self.data.set(local, block);
        self.invalidate_mesh();
    }

    pub fn invalidate_mesh(&mut self) {
        self.meshed = false;
        self.built = false;
    }

    pub fn mesh_into(&self, world: &dyn BlockQuery, catalog: &BlockCatalog, out: &mut MeshBuffers) {
        build_chunk_mesh(&self.data, self.position, world, catalog, out);
    }

    /// Stores a freshly built handle, releasing the one it replaces.
    pub fn attach_mesh<B>(&mut self, handle: H, backend: &B)
    where
        B: RenderBackend<Handle = H>,
    {
        if let Some(previous) = self.mesh.replace(handle) {
            backend.release(previous);
        }
        self.meshed = true;
        self.built = false;
    }

    pub fn build_mesh<B>(
        &mut self,
        world: &dyn BlockQuery,
        catalog: &BlockCatalog,
        backend: &B,
        scratch: &mut MeshBuffers,
    ) where
        B: RenderBackend<Handle = H>,
    {
        scratch.vertices.clear();
        scratch.indices.clear();
        self.mesh_into(world, catalog, scratch);
        let handle = backend.build_mesh(scratch.as_floats(), &scratch.indices);
        self.attach_mesh(handle, backend);
    }

    /// Whether the backend finished building the mesh. A positive answer is cached.
    pub fn is_built<B>(&mut self, backend: &B) -> bool
    where
        B: RenderBackend<Handle = H>,
    {
        if !self.meshed {
            return false;
        }
        if !self.built {
            self.built = self
                .mesh
                .as_ref()
                .is_some_and(|handle| backend.is_ready(handle));
        }
        self.built
    }

    pub fn delete<B>(&mut self, backend: &B)
    where
        B: RenderBackend<Handle = H>,
    {
        if let Some(handle) = self.mesh.take() {
            backend.release(handle);
        }
        self.meshed = false;
        self.built = false;
    }

    /// Rebinds the chunk to a new position. Block data is stale until the next `generate`.
    pub fn reuse(&mut self, position: ChunkPos) {
        debug_assert!(self.mesh.is_none(), "chunk reused while still holding a mesh");
        self.position = position;
        self.generated = false;
        self.meshed = false;
        self.built = false;
    }
}
