//! Persistent per-node path-count history for radius-mode self-congestion.
//!
//! Each node remembers how much demand connections from nearby endpoints
//! have deposited on it, indexed in Manhattan-polar form relative to the
//! node's low corner: ring radius, position along the ring (a ring of
//! radius `r` has `4r` points), and the endpoint's class index. The
//! structure persists across jobs and is lazily allocated on a node's
//! first write.

use dashmap::DashMap;

use crate::graph::{NodeId, RrNode};

/// Polar rings of accumulated demand for one node.
#[derive(Clone, Debug, Default)]
pub(crate) struct PolarHistory {
    /// `rings[r][arc][class]`; ring 0 has a single point.
    rings: Vec<Vec<Vec<f32>>>,
}

impl PolarHistory {
    fn slot_mut(&mut self, radius: u32, arc: u32, class: u16) -> &mut f32 {
        let r = radius as usize;
        if self.rings.len() <= r {
            self.rings.resize(r + 1, Vec::new());
        }
        let ring = &mut self.rings[r];
        let points = if radius == 0 { 1 } else { 4 * r };
        if ring.len() < points {
            ring.resize(points, Vec::new());
        }
        let slot = &mut ring[arc as usize];
        if slot.len() <= usize::from(class) {
            slot.resize(usize::from(class) + 1, 0.0);
        }
        &mut slot[usize::from(class)]
    }

    fn get(&self, radius: u32, arc: u32, class: u16) -> f32 {
        self.rings
            .get(radius as usize)
            .and_then(|ring| ring.get(arc as usize))
            .and_then(|slot| slot.get(usize::from(class)))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Shared history store keyed by node id.
#[derive(Debug, Default)]
pub(crate) struct PathHistories {
    map: DashMap<NodeId, PolarHistory>,
    radius: u32,
}

impl PathHistories {
    pub(crate) fn new(radius: u32) -> Self {
        Self {
            map: DashMap::new(),
            radius,
        }
    }

    /// Adds `amount` to `node`'s history entry for `target`, when the
    /// endpoint lies within the radius.
    pub(crate) fn record(&self, node: NodeId, node_rec: &RrNode, target: &RrNode, amount: f64) {
        let Some((radius, arc)) = polar_offset(node_rec, target, self.radius) else {
            return;
        };
        let mut history = self.map.entry(node).or_default();
        *history.slot_mut(radius, arc, target.ptc()) += amount as f32;
    }

    /// History accumulated on `node` by connections ending at `target`.
    pub(crate) fn lookup(&self, node: NodeId, node_rec: &RrNode, target: &RrNode) -> f64 {
        let Some((radius, arc)) = polar_offset(node_rec, target, self.radius) else {
            return 0.0;
        };
        self.map
            .get(&node)
            .map_or(0.0, |history| f64::from(history.get(radius, arc, target.ptc())))
    }

    /// Drops all recorded history.
    pub(crate) fn clear(&self) {
        self.map.clear();
    }
}

/// Polar coordinates of `target` relative to `node`'s low corner, or
/// `None` outside `radius`. The arc count starts at the top of the ring
/// (cartesian `(0, r)`) and proceeds clockwise.
fn polar_offset(node: &RrNode, target: &RrNode, radius: u32) -> Option<(u32, u32)> {
    let dx = i32::from(target.xlow()) - i32::from(node.xlow());
    let dy = i32::from(target.ylow()) - i32::from(node.ylow());
    let r = dx.unsigned_abs() + dy.unsigned_abs();
    if r > radius {
        return None;
    }
    if r == 0 {
        return Some((0, 0));
    }
    let r_i = r as i32;
    let arc = if dx >= 0 && dy > 0 {
        dx
    } else if dx > 0 {
        r_i - dy
    } else if dy < 0 {
        2 * r_i - dx
    } else {
        3 * r_i + dy
    };
    Some((r, arc as u32))
}

#[cfg(test)]
mod tests {
    use super::polar_offset;
    use crate::graph::{NodeType, RrNode};

    fn node_at(x: u16, y: u16) -> RrNode {
        let mut node = RrNode::new(NodeType::Chanx, 0);
        node.set_coordinates(x, y, x, y);
        node
    }

    #[test]
    fn ring_positions_are_distinct_and_in_range() {
        let center = node_at(10, 10);
        let mut seen = std::collections::HashSet::new();
        // Every point on the radius-2 ring maps to a unique arc in 0..8.
        for (dx, dy) in [
            (0i32, 2i32),
            (1, 1),
            (2, 0),
            (1, -1),
            (0, -2),
            (-1, -1),
            (-2, 0),
            (-1, 1),
        ] {
            let target = node_at((10 + dx) as u16, (10 + dy) as u16);
            let (r, arc) = polar_offset(&center, &target, 4).expect("within radius");
            assert_eq!(r, 2);
            assert!(arc < 8, "arc {arc} out of range");
            assert!(seen.insert(arc), "arc {arc} repeated");
        }
    }

    #[test]
    fn outside_radius_is_none() {
        let center = node_at(0, 0);
        let target = node_at(5, 5);
        assert_eq!(polar_offset(&center, &target, 4), None);
    }
}
