use bytemuck::{Pod, Zeroable};
use glam::IVec3;
use stratum_core::buffer_pool::Recycle;
use stratum_shared::{
    block::{BlockCatalog, BlockType, Face},
    chunk::ChunkData,
    coords::{ChunkPos, LocalPos, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z},
};

use crate::world::BlockQuery;

const FACE_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Interleaved vertex handed to the render backend as six floats.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ChunkVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub light: f32,
}
const _: [(); 24] = [(); std::mem::size_of::<ChunkVertex>()];

impl ChunkVertex {
    pub const FLOATS: usize = 6;
}

/// Scratch geometry for one chunk, recycled through the mesh buffer pool.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub vertices: Vec<ChunkVertex>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    fn push_face(&mut self, face: Face, uv: &[[f32; 2]; 4], origin: [f32; 3]) {
        let base = self.vertices.len() as u32;
        let light = face.lighting();
        for (corner, tex_coord) in face.vertices().iter().zip(uv) {
            self.vertices.push(ChunkVertex {
                position: [
                    origin[0] + corner[0],
                    origin[1] + corner[1],
                    origin[2] + corner[2],
                ],
                tex_coord: *tex_coord,
                light,
            });
        }
        self.indices.extend(FACE_INDICES.iter().map(|index| base + index));
    }
}

impl Recycle for MeshBuffers {
    fn recycle(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

fn should_render_face(block: BlockType, neighbor: BlockType, catalog: &BlockCatalog) -> bool {
    neighbor != block && catalog.is_transparent(neighbor)
}

/// Emits every visible face of `chunk` into `out`, positioned in world space.
///
/// Neighbours inside the chunk are read directly; anything outside goes through `world`.
pub fn build_chunk_mesh(
    chunk: &ChunkData,
    chunk_pos: ChunkPos,
    world: &dyn BlockQuery,
    catalog: &BlockCatalog,
    out: &mut MeshBuffers,
) {
    let origin = chunk_pos.origin();

    for y in 0..CHUNK_SIZE_Y {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                let local = LocalPos {
                    x: x as u8,
                    y: y as u8,
                    z: z as u8,
                };
                let block = chunk.get(local);
                if block == BlockType::Air {
                    continue;
                }

                let properties = catalog.properties(block);
                let cell = IVec3::new(x as i32, y as i32, z as i32);
                let world_origin = [
                    (origin.x + cell.x) as f32,
                    cell.y as f32,
                    (origin.z + cell.z) as f32,
                ];

                for face in Face::ALL {
                    let [dx, dy, dz] = face.neighbor_offset();
                    let n = cell + IVec3::new(dx, dy, dz);
                    let neighbor = match LocalPos::checked(n.x, n.y, n.z) {
                        Some(inside) => chunk.get(inside),
                        None => world.block_at(origin + n),
                    };

                    if should_render_face(block, neighbor, catalog) {
                        out.push_face(face, properties.uv_for(face), world_origin);
                    }
                }
            }
        }
    }
}
