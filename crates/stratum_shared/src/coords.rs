use std::ops::{Add, AddAssign, Sub, SubAssign};

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE_X: usize = 16;
pub const CHUNK_SIZE_Y: usize = 256;
pub const CHUNK_SIZE_Z: usize = 16;
pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;

/// Horizontal position of a chunk on the chunk grid. Chunks span the full world height.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a continuous (viewer) position.
    pub fn containing(position: Vec3) -> Self {
        Self {
            x: (position.x / CHUNK_SIZE_X as f32).floor() as i32,
            z: (position.z / CHUNK_SIZE_Z as f32).floor() as i32,
        }
    }

    /// Chunk column holding a block, regardless of the block's height.
    pub fn of_block(world_pos: IVec3) -> Self {
        Self {
            x: world_pos.x.div_euclid(CHUNK_SIZE_X as i32),
            z: world_pos.z.div_euclid(CHUNK_SIZE_Z as i32),
        }
    }

    /// World position of the chunk's (0, 0, 0) cell.
    pub fn origin(self) -> IVec3 {
        IVec3::new(
            self.x * CHUNK_SIZE_X as i32,
            0,
            self.z * CHUNK_SIZE_Z as i32,
        )
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    /// Converts signed local coordinates, returning `None` outside the chunk.
    pub fn checked(x: i32, y: i32, z: i32) -> Option<Self> {
        let in_bounds = (0..CHUNK_SIZE_X as i32).contains(&x)
            && (0..CHUNK_SIZE_Y as i32).contains(&y)
            && (0..CHUNK_SIZE_Z as i32).contains(&z);
        in_bounds.then(|| Self {
            x: x as u8,
            y: y as u8,
            z: z as u8,
        })
    }

    pub fn is_on_horizontal_border(self) -> bool {
        self.x == 0
            || self.z == 0
            || usize::from(self.x) == CHUNK_SIZE_X - 1
            || usize::from(self.z) == CHUNK_SIZE_Z - 1
    }
}

impl Add for ChunkPos {
    type Output = ChunkPos;

    fn add(self, rhs: Self) -> Self::Output {
        ChunkPos {
            x: self.x + rhs.x,
            z: self.z + rhs.z,
        }
    }
}

impl AddAssign for ChunkPos {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.z += rhs.z;
    }
}

impl Sub for ChunkPos {
    type Output = ChunkPos;

    fn sub(self, rhs: Self) -> Self::Output {
        ChunkPos {
            x: self.x - rhs.x,
            z: self.z - rhs.z,
        }
    }
}

impl SubAssign for ChunkPos {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.z -= rhs.z;
    }
}

fn div_rem_floor(value: i32, divisor: i32) -> (i32, i32) {
    (value.div_euclid(divisor), value.rem_euclid(divisor))
}

pub fn is_within_world_height(y: i32) -> bool {
    (0..CHUNK_SIZE_Y as i32).contains(&y)
}

/// Splits a world position into its chunk and local cell.
///
/// `world_pos.y` must lie inside the world height.
pub fn world_to_chunk(world_pos: IVec3) -> (ChunkPos, LocalPos) {
    assert!(
        is_within_world_height(world_pos.y),
        "world y {} outside of 0..{CHUNK_SIZE_Y}",
        world_pos.y
    );

    let (chunk_x, local_x) = div_rem_floor(world_pos.x, CHUNK_SIZE_X as i32);
    let (chunk_z, local_z) = div_rem_floor(world_pos.z, CHUNK_SIZE_Z as i32);

    (
        ChunkPos {
            x: chunk_x,
            z: chunk_z,
        },
        LocalPos {
            x: local_x as u8,
            y: world_pos.y as u8,
            z: local_z as u8,
        },
    )
}

pub fn chunk_to_world(chunk_pos: ChunkPos, local: LocalPos) -> IVec3 {
    chunk_pos.origin() + IVec3::new(i32::from(local.x), i32::from(local.y), i32::from(local.z))
}

pub fn local_to_index(local: LocalPos) -> usize {
    usize::from(local.x)
        + usize::from(local.z) * CHUNK_SIZE_X
        + usize::from(local.y) * CHUNK_SIZE_X * CHUNK_SIZE_Z
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};

    use super::{
        chunk_to_world, local_to_index, world_to_chunk, ChunkPos, LocalPos, CHUNK_SIZE_X,
        CHUNK_SIZE_Z, CHUNK_VOLUME,
    };

    #[test]
    fn index_layout_is_x_then_z_then_y() {
        assert_eq!(local_to_index(LocalPos { x: 1, y: 0, z: 0 }), 1);
        assert_eq!(local_to_index(LocalPos { x: 0, y: 0, z: 1 }), 16);
        assert_eq!(local_to_index(LocalPos { x: 0, y: 1, z: 0 }), 256);
        assert_eq!(
            local_to_index(LocalPos { x: 15, y: 255, z: 15 }),
            CHUNK_VOLUME - 1
        );
    }

    #[test]
    fn chunk_pos_arithmetic_is_component_wise() {
        let a = ChunkPos::new(10, 4);
        let b = ChunkPos::new(-3, 1);

        assert_eq!(a + b, ChunkPos::new(7, 5));
        assert_eq!(a - b, ChunkPos::new(13, 3));

        let mut c = a;
        c += b;
        assert_eq!(c, ChunkPos::new(7, 5));
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn world_to_chunk_handles_negative_and_positive_coordinates() {
        let (chunk0, local0) = world_to_chunk(IVec3::new(-1, 7, -1));
        assert_eq!(chunk0, ChunkPos::new(-1, -1));
        assert_eq!(
            local0,
            LocalPos {
                x: (CHUNK_SIZE_X - 1) as u8,
                y: 7,
                z: (CHUNK_SIZE_Z - 1) as u8,
            }
        );

        let (chunk1, local1) = world_to_chunk(IVec3::new(32, 64, 0));
        assert_eq!(chunk1, ChunkPos::new(2, 0));
        assert_eq!(local1, LocalPos { x: 0, y: 64, z: 0 });

        let world = IVec3::new(-33, 95, 66);
        let (chunk2, local2) = world_to_chunk(world);
        assert_eq!(chunk_to_world(chunk2, local2), world);
    }

    #[test]
    fn viewer_positions_floor_into_chunks() {
        assert_eq!(ChunkPos::containing(Vec3::new(8.0, 140.0, 8.0)), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(Vec3::new(-0.5, 0.0, 16.0)), ChunkPos::new(-1, 1));
        assert_eq!(ChunkPos::of_block(IVec3::new(-17, 900, 15)), ChunkPos::new(-2, 0));
    }

    #[test]
    fn checked_local_rejects_out_of_range() {
        assert!(LocalPos::checked(0, 0, 0).is_some());
        assert!(LocalPos::checked(15, 255, 15).is_some());
        assert!(LocalPos::checked(-1, 0, 0).is_none());
        assert!(LocalPos::checked(0, 256, 0).is_none());
        assert!(LocalPos::checked(0, 0, 16).is_none());
    }

    #[test]
    #[should_panic(expected = "outside of")]
    fn world_to_chunk_rejects_heights_outside_the_world() {
        world_to_chunk(IVec3::new(0, 256, 0));
    }
}
