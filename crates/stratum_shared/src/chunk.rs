use crate::block::BlockType;
use crate::coords::{local_to_index, LocalPos, CHUNK_VOLUME};

/// Block storage of one chunk column, laid out by [`local_to_index`].
#[derive(Clone, Debug)]
pub struct ChunkData {
    pub blocks: Box<[BlockType; CHUNK_VOLUME]>,
}

impl ChunkData {
    pub fn new_empty() -> Self {
        Self {
            blocks: Box::new([BlockType::Air; CHUNK_VOLUME]),
        }
    }

    pub fn get(&self, local: LocalPos) -> BlockType {
        self.blocks[local_to_index(local)]
    }

    pub fn set(&mut self, local: LocalPos, block: BlockType) {
        let index = local_to_index(local);
        self.blocks[index] = block;
    }

}

impl Default for ChunkData {
    fn default() -> Self {
        Self::new_empty()
    }
}
