//! Axis-aligned square region (C2), used by both the Barnes-Hut and FMM trees.

use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub origin: Vec2,
    pub side_length: f64,
}

impl Quad {
    pub const fn new(origin: Vec2, side_length: f64) -> Self {
        Self {
            origin,
            side_length,
        }
    }

    /// Closed-box containment test.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.origin.x
            && point.x <= self.origin.x + self.side_length
            && point.y >= self.origin.y
            && point.y <= self.origin.y + self.side_length
    }

    pub fn nw(&self) -> Self {
        Self::new(
            Vec2::new(self.origin.x, self.origin.y + self.side_length / 2.),
            self.side_length / 2.,
        )
    }

    pub fn ne(&self) -> Self {
        Self::new(
            Vec2::new(
                self.origin.x + self.side_length / 2.,
                self.origin.y + self.side_length / 2.,
            ),
            self.side_length / 2.,
        )
    }

    pub fn sw(&self) -> Self {
        Self::new(self.origin, self.side_length / 2.)
    }

    pub fn se(&self) -> Self {
        Self::new(
            Vec2::new(self.origin.x + self.side_length / 2., self.origin.y),
            self.side_length / 2.,
        )
    }

    /// The four sub-quadrants in the tie-break order NW, NE, SW, SE.
    pub fn children(&self) -> [Self; 4] {
        [self.nw(), self.ne(), self.sw(), self.se()]
    }

    /// Picks the sub-quadrant `point` belongs to, per the NW, NE, SW, SE
    /// tie-break: the first of the four whose `contains` returns true.
    pub fn child_index_for(&self, point: Vec2) -> usize {
        let children = self.children();
        children
            .iter()
            .position(|q| q.contains(point))
            .expect("point must lie within the parent quad")
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.origin.x + self.side_length / 2.,
            self.origin.y + self.side_length / 2.,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdivision_geometry() {
        let q = Quad::new(Vec2::new_zero(), 2.0);
        assert_eq!(q.sw(), Quad::new(Vec2::new(0., 0.), 1.0));
        assert_eq!(q.ne(), Quad::new(Vec2::new(1., 1.), 1.0));
        assert_eq!(q.nw(), Quad::new(Vec2::new(0., 1.), 1.0));
        assert_eq!(q.se(), Quad::new(Vec2::new(1., 0.), 1.0));
    }

    #[test]
    fn contains_closed_box() {
        let q = Quad::new(Vec2::new_zero(), 1.0);
        assert!(q.contains(Vec2::new(0., 0.)));
        assert!(q.contains(Vec2::new(1., 1.)));
        assert!(!q.contains(Vec2::new(1.0001, 0.5)));
    }

    #[test]
    fn boundary_tie_break_order() {
        // The shared center point belongs to NW, the first in tie-break order.
        let q = Quad::new(Vec2::new_zero(), 2.0);
        let center = q.center();
        assert_eq!(q.child_index_for(center), 0); // NW
    }
}
