pub mod chunk;
pub mod chunk_manager;
pub mod grid;

use glam::IVec3;
use stratum_shared::block::BlockType;

/// Read access to blocks by world position, used for lookups that leave a chunk.
pub trait BlockQuery {
    fn block_at(&self, world_pos: IVec3) -> BlockType;
}

impl<F> BlockQuery for F
where
    F: Fn(IVec3) -> BlockType,
{
    fn block_at(&self, world_pos: IVec3) -> BlockType {
        self(world_pos)
    }
}
