use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ATLAS_TILES_PER_ROW: u16 = 16;
const ATLAS_TILES_PER_COLUMN: u16 = 16;
const ATLAS_TILE_TEXELS: f32 = 16.0;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    #[default]
    Air = 0,
    Grass,
    Dirt,
    Stone,
    Sand,
    Water,
    Wood,
    Leaves,
}

impl BlockType {
    pub const COUNT: usize = 8;

    pub const ALL: [BlockType; Self::COUNT] = [
        BlockType::Air,
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Stone,
        BlockType::Sand,
        BlockType::Water,
        BlockType::Wood,
        BlockType::Leaves,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BlockFlags: u8 {
        const TRANSPARENT = 0b0000_0001;
        const COLLIDABLE  = 0b0000_0010;
    }
}

/// The six axis-aligned faces of a cell.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    /// +Z
    Front = 0,
    /// -Z
    Back,
    /// -X
    Left,
    /// +X
    Right,
    /// +Y
    Top,
    /// -Y
    Bottom,
}

const FACE_VERTICES: [[[f32; 3]; 4]; 6] = [
    // front: bottom-left, bottom-right, top-right, top-left
    [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    // back
    [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    // left
    [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    // right
    [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    // top
    [[0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    // bottom
    [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
];

// Stand-in for real lighting.
const FACE_LIGHTING: [f32; 6] = [0.84, 0.76, 0.68, 0.92, 1.0, 0.60];

const FACE_NEIGHBOR_OFFSETS: [[i32; 3]; 6] = [
    [0, 0, 1],
    [0, 0, -1],
    [-1, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
];

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Back,
        Face::Left,
        Face::Right,
        Face::Top,
        Face::Bottom,
    ];

    /// Corner offsets of the face quad relative to the cell's minimum corner.
    pub fn vertices(self) -> &'static [[f32; 3]; 4] {
        &FACE_VERTICES[self as usize]
    }

    pub fn lighting(self) -> f32 {
        FACE_LIGHTING[self as usize]
    }

    pub fn neighbor_offset(self) -> [i32; 3] {
        FACE_NEIGHBOR_OFFSETS[self as usize]
    }
}

pub type UvQuad = [[f32; 2]; 4];

/// UVs of one atlas tile, inset by a one-texel border, in the same corner order as
/// [`Face::vertices`]: bottom-left, bottom-right, top-right, top-left.
pub fn atlas_uvs(tile: u16) -> UvQuad {
    let tile_width = 1.0 / f32::from(ATLAS_TILES_PER_ROW);
    let tile_height = 1.0 / f32::from(ATLAS_TILES_PER_COLUMN);
    let border_width = tile_width / (ATLAS_TILE_TEXELS + 2.0);
    let border_height = tile_height / (ATLAS_TILE_TEXELS + 2.0);

    let row = f32::from(tile / ATLAS_TILES_PER_ROW);
    let col = f32::from(tile % ATLAS_TILES_PER_ROW);

    let u = col * tile_width + border_width;
    let v = 1.0 - row * tile_height - border_height;
    let u2 = u + tile_width - 2.0 * border_width;
    let v2 = v - tile_height + 2.0 * border_height;

    [[u, v2], [u2, v2], [u2, v], [u, v]]
}

#[derive(Clone, Debug)]
pub struct BlockProperties {
    pub block: BlockType,
    pub flags: BlockFlags,
    pub uv_top: UvQuad,
    pub uv_side: UvQuad,
    pub uv_bottom: UvQuad,
}

impl BlockProperties {
    pub fn is_transparent(&self) -> bool {
        self.flags.contains(BlockFlags::TRANSPARENT)
    }

    pub fn is_collidable(&self) -> bool {
        self.flags.contains(BlockFlags::COLLIDABLE)
    }

    pub fn uv_for(&self, face: Face) -> &UvQuad {
        match face {
            Face::Top => &self.uv_top,
            Face::Bottom => &self.uv_bottom,
            Face::Front | Face::Back | Face::Left | Face::Right => &self.uv_side,
        }
    }
}

/// Fixed table of block properties, indexed by [`BlockType`].
#[derive(Clone, Debug)]
pub struct BlockCatalog {
    properties: [BlockProperties; BlockType::COUNT],
}

impl BlockCatalog {
    pub fn new() -> Self {
        fn block(
            block: BlockType,
            flags: BlockFlags,
            top: u16,
            side: u16,
            bottom: u16,
        ) -> BlockProperties {
            BlockProperties {
                block,
                flags,
                uv_top: atlas_uvs(top),
                uv_side: atlas_uvs(side),
                uv_bottom: atlas_uvs(bottom),
            }
        }

        let solid = BlockFlags::COLLIDABLE;
        let air = BlockProperties {
            block: BlockType::Air,
            flags: BlockFlags::TRANSPARENT,
            uv_top: [[0.0; 2]; 4],
            uv_side: [[0.0; 2]; 4],
            uv_bottom: [[0.0; 2]; 4],
        };

        Self {
            properties: [
                air,
                block(BlockType::Grass, solid, 0, 1, 2),
                block(BlockType::Dirt, solid, 2, 2, 2),
                block(BlockType::Stone, solid, 3, 3, 3),
                block(BlockType::Sand, solid, 16, 16, 16),
                block(BlockType::Water, BlockFlags::TRANSPARENT, 32, 32, 32),
                block(BlockType::Wood, solid, 19, 18, 19),
                block(
                    BlockType::Leaves,
                    BlockFlags::TRANSPARENT | BlockFlags::COLLIDABLE,
                    20,
                    20,
                    20,
                ),
            ],
        }
    }

    pub fn properties(&self, block: BlockType) -> &BlockProperties {
        &self.properties[block.index()]
    }

    pub fn is_transparent(&self, block: BlockType) -> bool {
        self.properties(block).is_transparent()
    }
}

impl Default for BlockCatalog {
    fn default() -> Self {
        Self::new()
    }
}
