//! Spatial lookup from `(type, x, y, side, ptc)` to node ids.
//!
//! The table is jagged: rows are sized per coordinate from the nodes that
//! actually exist there. By convention CHANX entries are stored with the x
//! and y axes swapped. SOURCE and SINK entries are replicated across every
//! tile of a multi-tile block so a lookup at any offset resolves to the
//! root's class list.

use super::{
    arch::GridTile,
    error::{GraphError, Result},
    node::{NodeId, NodeType, RrNode, Side},
};

type Table = Vec<Vec<Vec<Vec<Option<NodeId>>>>>;

/// Spatial node index.
#[derive(Clone, Debug, Default)]
pub struct NodeLookup {
    tables: Vec<Table>,
}

impl NodeLookup {
    /// Builds the lookup from the node table and grid.
    ///
    /// Wire rows are first sized by the maximum ptc observed per coordinate,
    /// then filled; pin, source, and sink rows grow as encountered. When
    /// `max_chan_width` is non-zero, wire ptc indices are checked against it.
    ///
    /// # Errors
    /// Returns [`GraphError::PinWithoutSide`] for a pin node lacking a side
    /// and [`GraphError::PtcOutOfRange`] for a wire ptc beyond the channel
    /// width.
    pub fn build(
        nodes: &[RrNode],
        grid_size: (u16, u16),
        grid: &[Vec<GridTile>],
        max_chan_width: usize,
    ) -> Result<Self> {
        let (width, height) = grid_size;
        let mut lookup = Self::allocate(width, height);

        // Wires are sized before filling; everything else fills directly.
        let mut max_ptc = vec![vec![[None::<u16>; 2]; usize::from(height)]; usize::from(width)];
        for (id, node) in nodes.iter().enumerate() {
            match node.node_type() {
                NodeType::Source | NodeType::Sink => lookup.fill_class(node, id),
                NodeType::Ipin | NodeType::Opin => lookup.fill_pin(node, id)?,
                NodeType::Chanx | NodeType::Chany => {
                    Self::check_chan_width(node, max_chan_width)?;
                    let slot = usize::from(node.node_type() == NodeType::Chany);
                    for x in node.xlow()..=node.xhigh() {
                        for y in node.ylow()..=node.yhigh() {
                            let cell =
                                &mut max_ptc[usize::from(x)][usize::from(y)][slot];
                            *cell = Some(cell.map_or(node.ptc(), |m| m.max(node.ptc())));
                        }
                    }
                }
            }
        }

        lookup.size_wire_rows(&max_ptc);
        for (id, node) in nodes.iter().enumerate() {
            if node.node_type().is_wire() {
                lookup.fill_wire(node, id)?;
            }
        }

        lookup.replicate_multi_tile_classes(grid);
        Ok(lookup)
    }

    /// Looks up the node at a fully qualified coordinate.
    ///
    /// Non-pin types store entries on [`Side::Top`] only; pass that side (or
    /// use [`NodeLookup::all_sides`]) for them.
    #[must_use]
    pub fn get(&self, node_type: NodeType, x: u16, y: u16, side: Side, ptc: u16) -> Option<NodeId> {
        let (a, b) = Self::slot_coords(node_type, x, y);
        self.tables
            .get(node_type.index())?
            .get(a)?
            .get(b)?
            .get(side.index())?
            .get(usize::from(ptc))
            .copied()
            .flatten()
    }

    /// Looks up a node on every side, deduplicated.
    #[must_use]
    pub fn all_sides(&self, node_type: NodeType, x: u16, y: u16, ptc: u16) -> Vec<NodeId> {
        let mut found = Vec::new();
        for side in Side::ALL {
            if let Some(id) = self.get(node_type, x, y, side, ptc) {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Cross-checks every entry against the node table.
    ///
    /// Verifies type, bounding-box containment (with the CHANX axis swap),
    /// ptc and side agreement, and per-node occurrence counts: classes
    /// appear once per covered tile, wires once per spanned tile, pins at
    /// least once.
    ///
    /// # Errors
    /// Returns [`GraphError::LookupMismatch`] on the first disagreement.
    pub fn verify(&self, nodes: &[RrNode]) -> Result<()> {
        let mut counts = vec![0usize; nodes.len()];
        for node_type in NodeType::ALL {
            self.verify_type(node_type, nodes, &mut counts)?;
        }
        for (id, node) in nodes.iter().enumerate() {
            if node.is_virtual_source() {
                continue;
            }
            let count = counts[id];
            let expected = match node.node_type() {
                NodeType::Source | NodeType::Sink => {
                    let w = usize::from(node.xhigh() - node.xlow()) + 1;
                    let h = usize::from(node.yhigh() - node.ylow()) + 1;
                    w * h
                }
                NodeType::Chanx | NodeType::Chany => usize::from(node.span()) + 1,
                NodeType::Ipin | NodeType::Opin => {
                    if count == 0 {
                        return Err(GraphError::LookupMismatch {
                            node: id,
                            detail: "pin missing from lookup".to_owned(),
                        });
                    }
                    continue;
                }
            };
            if count != expected {
                return Err(GraphError::LookupMismatch {
                    node: id,
                    detail: format!("indexed {count} times, expected {expected}"),
                });
            }
        }
        Ok(())
    }

    fn verify_type(
        &self,
        node_type: NodeType,
        nodes: &[RrNode],
        counts: &mut [usize],
    ) -> Result<()> {
        let Some(table) = self.tables.get(node_type.index()) else {
            return Ok(());
        };
        for (a, plane) in table.iter().enumerate() {
            for (b, sides) in plane.iter().enumerate() {
                // Reverse the storage convention to recover grid coordinates.
                let (x, y) = if node_type == NodeType::Chanx {
                    (b as u16, a as u16)
                } else {
                    (a as u16, b as u16)
                };
                for (side_index, row) in sides.iter().enumerate() {
                    for (ptc, entry) in row.iter().enumerate() {
                        let Some(id) = *entry else { continue };
                        let node = nodes.get(id).ok_or_else(|| GraphError::LookupMismatch {
                            node: id,
                            detail: "entry references a node outside the table".to_owned(),
                        })?;
                        Self::verify_entry(node_type, node, id, (x, y), side_index, ptc)?;
                        counts[id] += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn verify_entry(
        node_type: NodeType,
        node: &RrNode,
        id: NodeId,
        coords: (u16, u16),
        side_index: usize,
        ptc: usize,
    ) -> Result<()> {
        let (x, y) = coords;
        if node.node_type() != node_type {
            return Err(GraphError::LookupMismatch {
                node: id,
                detail: format!("indexed as {node_type}, node is {}", node.node_type()),
            });
        }
        if usize::from(node.ptc()) != ptc {
            return Err(GraphError::LookupMismatch {
                node: id,
                detail: format!("indexed at ptc {ptc}, node has ptc {}", node.ptc()),
            });
        }
        if !node.contains(x, y) {
            return Err(GraphError::LookupMismatch {
                node: id,
                detail: format!(
                    "indexed at ({x}, {y}), outside ({}, {})..({}, {})",
                    node.xlow(),
                    node.ylow(),
                    node.xhigh(),
                    node.yhigh()
                ),
            });
        }
        if node_type.is_pin() {
            if node.side().map(Side::index) != Some(side_index) {
                return Err(GraphError::LookupMismatch {
                    node: id,
                    detail: format!("pin indexed on side {side_index}, node disagrees"),
                });
            }
        } else if side_index != 0 {
            return Err(GraphError::LookupMismatch {
                node: id,
                detail: format!("non-pin indexed on side {side_index}"),
            });
        }
        Ok(())
    }

    fn allocate(width: u16, height: u16) -> Self {
        let tables = NodeType::ALL
            .iter()
            .map(|&node_type| {
                // CHANX stores with (y, x) swapped.
                let (outer, inner) = if node_type == NodeType::Chanx {
                    (usize::from(height), usize::from(width))
                } else {
                    (usize::from(width), usize::from(height))
                };
                vec![vec![vec![Vec::new(); Side::ALL.len()]; inner]; outer]
            })
            .collect();
        Self { tables }
    }

    const fn slot_coords(node_type: NodeType, x: u16, y: u16) -> (usize, usize) {
        if matches!(node_type, NodeType::Chanx) {
            (y as usize, x as usize)
        } else {
            (x as usize, y as usize)
        }
    }

    fn check_chan_width(node: &RrNode, max_chan_width: usize) -> Result<()> {
        if max_chan_width > 0 && usize::from(node.ptc()) >= max_chan_width {
            return Err(GraphError::PtcOutOfRange {
                node_type: node.node_type(),
                x: node.xlow(),
                y: node.ylow(),
                ptc: node.ptc(),
                row_len: max_chan_width,
            });
        }
        Ok(())
    }

    fn row_mut(
        &mut self,
        node_type: NodeType,
        x: u16,
        y: u16,
        side: usize,
    ) -> Option<&mut Vec<Option<NodeId>>> {
        let (a, b) = Self::slot_coords(node_type, x, y);
        self.tables
            .get_mut(node_type.index())?
            .get_mut(a)?
            .get_mut(b)?
            .get_mut(side)
    }

    fn fill_class(&mut self, node: &RrNode, id: NodeId) {
        let ptc = usize::from(node.ptc());
        for x in node.xlow()..=node.xhigh() {
            for y in node.ylow()..=node.yhigh() {
                // Source and sink rows grow together so class indices stay
                // aligned between the two tables.
                for table in [NodeType::Source, NodeType::Sink] {
                    if let Some(row) = self.row_mut(table, x, y, 0) {
                        if row.len() <= ptc {
                            row.resize(ptc + 1, None);
                        }
                    }
                }
                if let Some(row) = self.row_mut(node.node_type(), x, y, 0) {
                    row[ptc] = Some(id);
                }
            }
        }
    }

    fn fill_pin(&mut self, node: &RrNode, id: NodeId) -> Result<()> {
        let side = node.side().ok_or(GraphError::PinWithoutSide {
            node: id,
            node_type: node.node_type(),
        })?;
        let ptc = usize::from(node.ptc());
        for x in node.xlow()..=node.xhigh() {
            for y in node.ylow()..=node.yhigh() {
                for table in [NodeType::Ipin, NodeType::Opin] {
                    if let Some(row) = self.row_mut(table, x, y, side.index()) {
                        if row.len() <= ptc {
                            row.resize(ptc + 1, None);
                        }
                    }
                }
                if let Some(row) = self.row_mut(node.node_type(), x, y, side.index()) {
                    row[ptc] = Some(id);
                }
            }
        }
        Ok(())
    }

    fn size_wire_rows(&mut self, max_ptc: &[Vec<[Option<u16>; 2]>]) {
        for (x, column) in max_ptc.iter().enumerate() {
            for (y, cell) in column.iter().enumerate() {
                for (slot, node_type) in [NodeType::Chanx, NodeType::Chany].into_iter().enumerate()
                {
                    if let Some(max) = cell[slot] {
                        if let Some(row) = self.row_mut(node_type, x as u16, y as u16, 0) {
                            row.resize(usize::from(max) + 1, None);
                        }
                    }
                }
            }
        }
    }

    fn fill_wire(&mut self, node: &RrNode, id: NodeId) -> Result<()> {
        let ptc = usize::from(node.ptc());
        for x in node.xlow()..=node.xhigh() {
            for y in node.ylow()..=node.yhigh() {
                let row = self
                    .row_mut(node.node_type(), x, y, 0)
                    .filter(|row| ptc < row.len())
                    .ok_or(GraphError::PtcOutOfRange {
                        node_type: node.node_type(),
                        x,
                        y,
                        ptc: node.ptc(),
                        row_len: 0,
                    })?;
                row[ptc] = Some(id);
            }
        }
        Ok(())
    }

    /// Copies SOURCE/SINK rows from each block's root tile to its offset
    /// tiles, so lookups at any covered coordinate resolve.
    fn replicate_multi_tile_classes(&mut self, grid: &[Vec<GridTile>]) {
        for (x, column) in grid.iter().enumerate() {
            for (y, tile) in column.iter().enumerate() {
                if tile.is_root() {
                    continue;
                }
                let Some(root_x) = x.checked_sub(usize::from(tile.width_offset)) else {
                    continue;
                };
                let Some(root_y) = y.checked_sub(usize::from(tile.height_offset)) else {
                    continue;
                };
                for node_type in [NodeType::Source, NodeType::Sink] {
                    let table = &mut self.tables[node_type.index()];
                    let row = table[root_x][root_y][0].clone();
                    table[x][y][0] = row;
                }
            }
        }
    }
}
