use bitvec::vec::BitVec;
use stratum_shared::coords::ChunkPos;

/// Fixed square of `side × side` slots around a centre chunk.
///
/// Moving the centre rotates `offset` instead of moving chunks, so every chunk that stays
/// inside the window keeps its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToroidalGrid {
    radius: i32,
    side: i32,
    center: ChunkPos,
    offset: (i32, i32),
}

impl ToroidalGrid {
    pub fn new(center: ChunkPos, radius: i32) -> Self {
        assert!(radius >= 0, "grid radius must not be negative, got {radius}");
        Self {
            radius,
            side: 2 * radius + 1,
            center,
            offset: (0, 0),
        }
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        (self.side * self.side) as usize
    }

    pub fn center(&self) -> ChunkPos {
        self.center
    }

    /// Physical slot of the chunk `(rel_x, rel_z)` away from the centre.
    pub fn slot_index(&self, rel_x: i32, rel_z: i32) -> usize {
        assert!(
            rel_x.abs() <= self.radius && rel_z.abs() <= self.radius,
            "relative chunk ({rel_x}, {rel_z}) outside of grid radius {}",
            self.radius
        );

        let column = (rel_x + self.offset.0 + self.radius).rem_euclid(self.side);
        let row = (rel_z + self.offset.1 + self.radius).rem_euclid(self.side);
        (column + row * self.side) as usize
    }

    pub fn relative(&self, pos: ChunkPos) -> Option<(i32, i32)> {
        let rel = pos - self.center;
        (rel.x.abs() <= self.radius && rel.z.abs() <= self.radius).then_some((rel.x, rel.z))
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.relative(pos).is_some()
    }

    pub fn slot_of(&self, pos: ChunkPos) -> Option<usize> {
        self.relative(pos)
            .map(|(rel_x, rel_z)| self.slot_index(rel_x, rel_z))
    }

    /// Moves the centre, returning the chunk delta.
    pub fn recenter(&mut self, new_center: ChunkPos) -> (i32, i32) {
        let delta = new_center - self.center;
        self.offset = (
            (self.offset.0 + delta.x).rem_euclid(self.side),
            (self.offset.1 + delta.z).rem_euclid(self.side),
        );
        self.center = new_center;
        (delta.x, delta.z)
    }

    /// Iterates `(rel_x, rel_z)` over the square of `radius` around the centre.
    pub fn cells_within(&self, radius: i32) -> impl Iterator<Item = (i32, i32)> {
        let radius = radius.min(self.radius);
        (-radius..=radius)
            .flat_map(move |rel_z| (-radius..=radius).map(move |rel_x| (rel_x, rel_z)))
    }

    /// Marks in `mask` every slot within `radius` that lies in the outermost `|delta|`
    /// rings on the side the centre moved towards, for each axis that moved.
    pub fn mark_leading_rings(&self, delta: (i32, i32), radius: i32, mask: &mut BitVec) {
        let radius = radius.min(self.radius);
        let width = 2 * radius + 1;
        let (dx, dz) = delta;

        let leading = |rel: i32, moved: i32| {
            let rings = moved.abs().min(width);
            if moved > 0 {
                rel > radius - rings
            } else if moved < 0 {
                rel < -radius + rings
            } else {
                false
            }
        };

        for (rel_x, rel_z) in self.cells_within(radius) {
            if leading(rel_x, dx) || leading(rel_z, dz) {
                mask.set(self.slot_index(rel_x, rel_z), true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bitvec::vec::BitVec;
    use stratum_shared::coords::ChunkPos;

    use super::ToroidalGrid;

    #[test]
    fn slot_index_is_a_bijection_for_any_offset() {
        let mut grid = ToroidalGrid::new(ChunkPos::new(0, 0), 3);
        for step in [ChunkPos::new(0, 0), ChunkPos::new(2, -5), ChunkPos::new(-11, 4)] {
            grid.recenter(step);
            let mut seen = vec![false; grid.len()];
            for (rel_x, rel_z) in grid.cells_within(3) {
                let slot = grid.slot_index(rel_x, rel_z);
                assert!(!seen[slot], "slot {slot} mapped twice");
                seen[slot] = true;
            }
            assert!(seen.iter().all(|&hit| hit));
        }
    }

    #[test]
    fn chunks_keep_their_slot_across_recentering() {
        let mut grid = ToroidalGrid::new(ChunkPos::new(5, 5), 2);
        let kept = ChunkPos::new(6, 4);
        let before = grid.slot_of(kept);

        let delta = grid.recenter(ChunkPos::new(7, 3));
        assert_eq!(delta, (2, -2));
        assert_eq!(grid.slot_of(kept), before);
        assert!(!grid.contains(ChunkPos::new(4, 5)));
    }

    #[test]
    fn offset_wraps_with_euclidean_modulo() {
        let mut grid = ToroidalGrid::new(ChunkPos::new(0, 0), 1);
        grid.recenter(ChunkPos::new(-1, -4));
        // offset is (2, 2) after wrapping -1 and -4 into 0..3
        assert_eq!(grid.slot_index(0, 0), 0);
        assert_eq!(grid.slot_index(-1, -1), 8);
        assert_eq!(grid.slot_index(1, 1), 4);
    }

    #[test]
    fn leading_rings_cover_the_entered_edge() {
        let mut grid = ToroidalGrid::new(ChunkPos::new(0, 0), 2);
        let delta = grid.recenter(ChunkPos::new(1, 0));

        let mut mask = BitVec::repeat(false, grid.len());
        grid.mark_leading_rings(delta, 2, &mut mask);
        assert_eq!(mask.count_ones(), 5);
        for rel_z in -2..=2 {
            assert!(mask[grid.slot_index(2, rel_z)]);
        }
    }

    #[test]
    fn diagonal_moves_share_the_corner() {
        let mut grid = ToroidalGrid::new(ChunkPos::new(0, 0), 2);
        let delta = grid.recenter(ChunkPos::new(-1, 1));

        let mut mask = BitVec::repeat(false, grid.len());
        grid.mark_leading_rings(delta, 2, &mut mask);
        assert_eq!(mask.count_ones(), 9);
    }

    #[test]
    fn jumps_wider_than_the_grid_mark_everything() {
        let mut grid = ToroidalGrid::new(ChunkPos::new(0, 0), 2);
        let delta = grid.recenter(ChunkPos::new(40, 0));

        let mut mask = BitVec::repeat(false, grid.len());
        grid.mark_leading_rings(delta, 2, &mut mask);
        assert_eq!(mask.count_ones(), grid.len());

        let mut inner = BitVec::repeat(false, grid.len());
        grid.mark_leading_rings(delta, 1, &mut inner);
        assert_eq!(inner.count_ones(), 9);
    }

    #[test]
    #[should_panic(expected = "outside of grid radius")]
    fn lookups_past_the_radius_panic() {
        ToroidalGrid::new(ChunkPos::new(0, 0), 2).slot_index(3, 0);
    }
}
