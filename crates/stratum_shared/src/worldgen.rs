use std::f64::consts::PI;

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::block::BlockType;
use crate::chunk::ChunkData;
use crate::coords::{
    chunk_to_world, ChunkPos, LocalPos, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z,
};

const MIN_OCTAVES: u32 = 1;
const MAX_OCTAVES: u32 = 8;
const MIN_PERSISTENCE: f64 = 0.05;
const MAX_PERSISTENCE: f64 = 0.95;
const MIN_TREE_GRID: i32 = 1;
const MAX_TREE_GRID: i32 = 64;

const EROSION_FREQUENCY_SCALE: f64 = 0.63721;
const EROSION_EXTRA_OCTAVES: u32 = 2;
const PEAKS_FREQUENCY_SCALE: f64 = 3.21;
const PEAKS_OCTAVE_FACTOR: u32 = 2;
const MOUNTAIN_STONE_FACTOR: f64 = 0.55;
const TRUNK_HEIGHT: i32 = 4;
const CANOPY_TOP: i32 = 8;

const CONTINENTALNESS_POINTS: [(f64, f64); 9] = [
    (-1.0, -68.0),
    (-0.6, -60.0),
    (-0.5, -36.0),
    (-0.2, -28.0),
    (-0.1, 0.0),
    (0.0, 3.0),
    (0.25, 24.0),
    (0.55, 48.0),
    (1.0, 80.0),
];

const EROSION_POINTS: [(f64, f64); 10] = [
    (-1.0, 1.0),
    (-0.6, 0.6),
    (-0.5, 0.7),
    (-0.4, 0.24),
    (-0.1, 0.22),
    (0.2, 0.14),
    (0.28, 0.28),
    (0.44, 0.28),
    (0.52, 0.1),
    (1.0, 0.0),
];

const PEAKS_AND_VALLEYS_POINTS: [(f64, f64); 6] = [
    (-1.0, -32.0),
    (-0.4, -24.0),
    (0.0, 0.0),
    (0.6, 32.0),
    (0.8, 38.0),
    (1.0, 46.0),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldGenSettings {
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default = "default_persistence")]
    pub persistence: f64,
    #[serde(default = "default_base_height")]
    pub base_height: i32,
    #[serde(default = "default_sea_level")]
    pub sea_level: i32,
    #[serde(default = "default_tree_chance")]
    pub tree_chance: f32,
    #[serde(default = "default_tree_grid_size")]
    pub tree_grid_size: i32,
    #[serde(default = "default_tree_jitter")]
    pub tree_jitter: f32,
}

impl Default for WorldGenSettings {
    fn default() -> Self {
        Self {
            octaves: default_octaves(),
            frequency: default_frequency(),
            amplitude: default_amplitude(),
            persistence: default_persistence(),
            base_height: default_base_height(),
            sea_level: default_sea_level(),
            tree_chance: default_tree_chance(),
            tree_grid_size: default_tree_grid_size(),
            tree_jitter: default_tree_jitter(),
        }
    }
}

impl WorldGenSettings {
    pub fn sanitize(mut self) -> Self {
        let max_y = CHUNK_SIZE_Y as i32 - 1;
        self.octaves = self.octaves.clamp(MIN_OCTAVES, MAX_OCTAVES);
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            self.frequency = default_frequency();
        }
        if !self.amplitude.is_finite() {
            self.amplitude = default_amplitude();
        }
        self.persistence = self.persistence.clamp(MIN_PERSISTENCE, MAX_PERSISTENCE);
        self.base_height = self.base_height.clamp(0, max_y);
        self.sea_level = self.sea_level.clamp(0, max_y);
        self.tree_chance = self.tree_chance.clamp(0.0, 1.0);
        self.tree_grid_size = self.tree_grid_size.clamp(MIN_TREE_GRID, MAX_TREE_GRID);
        self.tree_jitter = self.tree_jitter.clamp(0.0, self.tree_grid_size as f32);
        self
    }
}

fn default_octaves() -> u32 {
    4
}

fn default_frequency() -> f64 {
    0.00052137
}

fn default_amplitude() -> f64 {
    1.0
}

fn default_persistence() -> f64 {
    0.5
}

fn default_base_height() -> i32 {
    128
}

fn default_sea_level() -> i32 {
    128
}

fn default_tree_chance() -> f32 {
    0.20
}

fn default_tree_grid_size() -> i32 {
    4
}

fn default_tree_jitter() -> f32 {
    3.0
}

/// Per-column generator result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightSample {
    pub height: i32,
    pub continentalness: f64,
    pub erosion: f64,
    pub peaks_and_valleys: f64,
    pub should_place_tree: bool,
}

/// Piecewise curve over sorted control points, sampled with cosine easing.
#[derive(Debug, Clone)]
pub struct Spline {
    points: Vec<(f64, f64)>,
}

impl Spline {
    pub fn new(points: &[(f64, f64)]) -> Self {
        assert!(!points.is_empty(), "spline needs at least one control point");
        debug_assert!(points.windows(2).all(|pair| pair[0].0 < pair[1].0));
        Self {
            points: points.to_vec(),
        }
    }

    pub fn sample(&self, x: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if x < x1 {
                let t = (x - x0) / (x1 - x0);
                let eased = (1.0 - (t * PI).cos()) / 2.0;
                return y0 * (1.0 - eased) + y1 * eased;
            }
        }

        last.1
    }
}

/// Counter-based generator used to place trees; the same cell always yields the same draws.
struct CellRng {
    state: u64,
}

impl CellRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    fn next_unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    fn next_range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_unit()
    }
}

#[derive(Debug, Clone)]
pub struct WorldGenerator {
    pub seed: u64,
    settings: WorldGenSettings,
    noise: Perlin,
    continentalness: Spline,
    erosion: Spline,
    peaks_and_valleys: Spline,
}

impl WorldGenerator {
    pub fn new(seed: u64) -> Self {
        Self::with_settings(seed, WorldGenSettings::default())
    }

    pub fn with_settings(seed: u64, settings: WorldGenSettings) -> Self {
        Self {
            seed,
            settings: settings.sanitize(),
            noise: Perlin::new(seed as u32),
            continentalness: Spline::new(&CONTINENTALNESS_POINTS),
            erosion: Spline::new(&EROSION_POINTS),
            peaks_and_valleys: Spline::new(&PEAKS_AND_VALLEYS_POINTS),
        }
    }

    fn fractal(&self, x: f64, z: f64, frequency: f64, octaves: u32) -> f64 {
        let mut sum = 0.0;
        let mut frequency = frequency;
        let mut amplitude = self.settings.amplitude;
        for _ in 0..octaves {
            sum += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency /= self.settings.persistence;
            amplitude *= self.settings.persistence;
        }
        sum
    }

    pub fn generate_height(&self, world_x: i32, world_z: i32) -> HeightSample {
        let x = f64::from(world_x);
        let z = f64::from(world_z);
        let settings = &self.settings;

        let continentalness = self.fractal(x, z, settings.frequency, settings.octaves);
        let erosion = self.fractal(
            x,
            z,
            settings.frequency * EROSION_FREQUENCY_SCALE,
            settings.octaves + EROSION_EXTRA_OCTAVES,
        );
        let peaks = self.fractal(
            x,
            z,
            settings.frequency * PEAKS_FREQUENCY_SCALE,
            settings.octaves * PEAKS_OCTAVE_FACTOR,
        );
        // Fold into ridges: 1 at |v| = 2/3, falling off on both sides.
        let peaks_and_valleys = 1.0 - (3.0 * peaks.abs() - 2.0).abs();

        let continental_add = self.continentalness.sample(continentalness);
        let erosion_factor = self.erosion.sample(erosion);
        let peaks_add = self.peaks_and_valleys.sample(peaks_and_valleys);

        let mut height_add = if continental_add > 0.0 {
            0.6 * continental_add + 0.4 * continental_add * erosion_factor
        } else {
            continental_add
        };
        height_add += if peaks_add > 0.0 {
            0.3 * peaks_add + 0.7 * peaks_add * erosion_factor
        } else {
            peaks_add
        };

        let mut sample = HeightSample {
            height: height_add.round() as i32 + settings.base_height,
            continentalness,
            erosion,
            peaks_and_valleys,
            should_place_tree: false,
        };
        sample.should_place_tree = self.classify_block(sample.height, &sample) == BlockType::Grass
            && self.should_place_tree(world_x, world_z);
        sample
    }

    /// Block at height `y` of a column described by `sample`.
    pub fn classify_block(&self, y: i32, sample: &HeightSample) -> BlockType {
        let h = sample.height;
        let sea_level = self.settings.sea_level;

        if h >= sea_level {
            if sample.continentalness <= 0.0 {
                // beach
                return if y < h - 2 {
                    BlockType::Stone
                } else if y <= h {
                    BlockType::Sand
                } else {
                    BlockType::Air
                };
            }

            let base = f64::from(self.settings.base_height);
            if y < h - 2 {
                BlockType::Stone
            } else if y <= h && f64::from(h) > base + base * MOUNTAIN_STONE_FACTOR {
                BlockType::Stone
            } else if y <= h && h <= sea_level + 1 {
                BlockType::Sand
            } else if y < h {
                BlockType::Dirt
            } else if y == h {
                BlockType::Grass
            } else if sample.should_place_tree && y <= h + TRUNK_HEIGHT {
                BlockType::Wood
            } else if sample.should_place_tree && y <= h + CANOPY_TOP {
                BlockType::Leaves
            } else {
                BlockType::Air
            }
        } else if y < h - 2 {
            BlockType::Stone
        } else if y <= h {
            BlockType::Sand
        } else if y <= sea_level {
            BlockType::Water
        } else {
            BlockType::Air
        }
    }

    /// Jittered-grid anchor test: each grid cell proposes one point and the columns within
    /// one block of it on both axes may host a tree.
    pub fn should_place_tree(&self, world_x: i32, world_z: i32) -> bool {
        let grid = self.settings.tree_grid_size;
        let jitter = self.settings.tree_jitter;
        let cell_x = world_x.div_euclid(grid);
        let cell_z = world_z.div_euclid(grid);

        let cell_seed = self
            .seed
            .wrapping_add((cell_x as i64 as u64).wrapping_mul(374_761_393))
            .wrapping_add((cell_z as i64 as u64).wrapping_mul(668_265_263));
        let mut rng = CellRng::new(cell_seed);

        let jittered_x = (cell_x * grid) as f32 + rng.next_range(-jitter, jitter);
        let jittered_z = (cell_z * grid) as f32 + rng.next_range(-jitter, jitter);

        if (jittered_x - world_x as f32).abs() < 1.0 && (jittered_z - world_z as f32).abs() < 1.0 {
            rng.next_unit() < self.settings.tree_chance
        } else {
            false
        }
    }

    pub fn fill_chunk(&self, pos: ChunkPos, chunk: &mut ChunkData) {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                let column = chunk_to_world(
                    pos,
                    LocalPos {
                        x: x as u8,
                        y: 0,
                        z: z as u8,
                    },
                );
                let sample = self.generate_height(column.x, column.z);

                for y in 0..CHUNK_SIZE_Y {
                    let block = self.classify_block(y as i32, &sample);
                    chunk.set(
                        LocalPos {
                            x: x as u8,
                            y: y as u8,
                            z: z as u8,
                        },
                        block,
                    );
                }
            }
        }
    }
}
