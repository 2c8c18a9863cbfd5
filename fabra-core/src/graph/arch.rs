//! Physical architecture structures: block types, the placement grid, and
//! channel width limits.

use super::error::{GraphError, Result};

/// Connectivity role of a pin class.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PinType {
    /// Unconnected pins.
    #[default]
    Open,
    /// Pins that drive signals out of the block.
    Driver,
    /// Pins that receive signals into the block.
    Receiver,
}

/// A set of logically equivalent pins within a block type.
#[derive(Clone, Debug, Default)]
pub struct PinClass {
    /// Role shared by every pin in the class.
    pub pin_type: PinType,
    /// The pin numbers belonging to this class.
    pub pins: Vec<u16>,
}

/// Coarse category of a physical block type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlockCategory {
    /// Blocks without any pins.
    Empty,
    /// Single-tile blocks on the device perimeter.
    Io,
    /// The most frequent single-tile block; assumed to be the logic block.
    Logic,
    /// Blocks spanning more than one tile.
    Macro,
}

/// A physical block type (logic block, IO, memory, and so on).
#[derive(Clone, Debug, Default)]
pub struct BlockType {
    name: String,
    index: usize,
    width: u16,
    height: u16,
    classes: Vec<PinClass>,
    pin_class: Vec<Option<usize>>,
    is_global_pin: Vec<bool>,
    num_drivers: usize,
    num_receivers: usize,
}

impl BlockType {
    /// Creates a block type with no pin classes.
    #[must_use]
    pub fn new(name: String, index: usize, width: u16, height: u16) -> Self {
        Self {
            name,
            index,
            width,
            height,
            ..Self::default()
        }
    }

    /// Name of the block type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of this type within the architecture's block-type table.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Total number of pins.
    #[must_use]
    pub fn num_pins(&self) -> usize {
        self.pin_class.len()
    }

    /// Number of non-global driver pins.
    #[must_use]
    pub const fn num_drivers(&self) -> usize {
        self.num_drivers
    }

    /// Number of non-global receiver pins.
    #[must_use]
    pub const fn num_receivers(&self) -> usize {
        self.num_receivers
    }

    /// The pin classes of this block type.
    #[must_use]
    pub fn classes(&self) -> &[PinClass] {
        &self.classes
    }

    /// Role of the given pin, [`PinType::Open`] when unclassified.
    #[must_use]
    pub fn pin_type(&self, pin: u16) -> PinType {
        self.pin_class
            .get(usize::from(pin))
            .copied()
            .flatten()
            .and_then(|class| self.classes.get(class))
            .map_or(PinType::Open, |class| class.pin_type)
    }

    /// Returns `true` when the pin is a global (clock/reset style) pin.
    #[must_use]
    pub fn is_global_pin(&self, pin: u16) -> bool {
        self.is_global_pin
            .get(usize::from(pin))
            .copied()
            .unwrap_or(false)
    }

    /// Registers a pin class, recording class membership for each pin.
    ///
    /// # Errors
    /// Returns [`GraphError::PinOutOfRange`] when a pin number exceeds the
    /// block's declared pin count.
    pub fn push_class(&mut self, class: PinClass, globals: &[u16]) -> Result<()> {
        let class_index = self.classes.len();
        let num_pins = self.pin_class.len();
        for &pin in &class.pins {
            let slot = self.pin_class.get_mut(usize::from(pin)).ok_or(
                GraphError::PinOutOfRange {
                    block: self.index,
                    pin,
                    num_pins,
                },
            )?;
            *slot = Some(class_index);
            let global = globals.contains(&pin);
            self.is_global_pin[usize::from(pin)] = global;
            if !global {
                match class.pin_type {
                    PinType::Driver => self.num_drivers += 1,
                    PinType::Receiver => self.num_receivers += 1,
                    PinType::Open => {}
                }
            }
        }
        self.classes.push(class);
        Ok(())
    }

    pub(crate) fn reserve_pins(&mut self, num_pins: usize) {
        self.pin_class.resize(num_pins, None);
        self.is_global_pin.resize(num_pins, false);
    }
}

/// One grid position: which block type sits there and the offset from the
/// block's root tile.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridTile {
    /// Index into the block-type table.
    pub type_index: usize,
    /// Width offset from the block's root tile.
    pub width_offset: u16,
    /// Height offset from the block's root tile.
    pub height_offset: u16,
    /// Number of driver pins with non-zero usage probability at this tile.
    pub num_sources: usize,
    /// Number of receiver pins with non-zero usage probability at this tile.
    pub num_receivers: usize,
}

impl GridTile {
    /// Returns `true` when this tile is the root of the block occupying it.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.width_offset == 0 && self.height_offset == 0
    }
}

/// Channel width limits parsed from the graph file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelWidths {
    /// Maximum width over all channels.
    pub max: usize,
    /// Minimum width over x-directed channels.
    pub x_min: usize,
    /// Maximum width over x-directed channels.
    pub x_max: usize,
    /// Minimum width over y-directed channels.
    pub y_min: usize,
    /// Maximum width over y-directed channels.
    pub y_max: usize,
    /// Per-row x-channel widths.
    pub x_list: Vec<usize>,
    /// Per-column y-channel widths.
    pub y_list: Vec<usize>,
}

/// The device architecture: block types and their placement on the grid.
#[derive(Clone, Debug, Default)]
pub struct Architecture {
    block_types: Vec<BlockType>,
    grid: Vec<Vec<GridTile>>,
    chan_widths: ChannelWidths,
    fill_type_index: Option<usize>,
    perimeter_type_index: Option<usize>,
}

impl Architecture {
    /// Creates an architecture from its parsed pieces and derives the fill
    /// and perimeter block types.
    ///
    /// # Errors
    /// Returns [`GraphError::EmptyGrid`] when the grid has no tiles, or
    /// [`GraphError::UnknownBlockType`] when a tile references a type index
    /// outside the block-type table.
    pub fn new(
        block_types: Vec<BlockType>,
        grid: Vec<Vec<GridTile>>,
        chan_widths: ChannelWidths,
    ) -> Result<Self> {
        if grid.is_empty() || grid.iter().any(Vec::is_empty) {
            return Err(GraphError::EmptyGrid);
        }
        for column in &grid {
            for tile in column {
                if tile.type_index >= block_types.len() {
                    return Err(GraphError::UnknownBlockType {
                        type_index: tile.type_index,
                        num_types: block_types.len(),
                    });
                }
            }
        }
        let mut arch = Self {
            block_types,
            grid,
            chan_widths,
            fill_type_index: None,
            perimeter_type_index: None,
        };
        arch.fill_type_index = arch.most_frequent_type(false);
        arch.perimeter_type_index = arch.most_frequent_type(true);
        Ok(arch)
    }

    /// Grid width and height, in tiles.
    #[must_use]
    pub fn grid_size(&self) -> (u16, u16) {
        let width = self.grid.len() as u16;
        let height = self.grid.first().map_or(0, |col| col.len() as u16);
        (width, height)
    }

    /// The tile at `(x, y)`.
    #[must_use]
    pub fn tile(&self, x: u16, y: u16) -> Option<&GridTile> {
        self.grid.get(usize::from(x))?.get(usize::from(y))
    }

    pub(crate) fn tile_mut(&mut self, x: u16, y: u16) -> Option<&mut GridTile> {
        self.grid.get_mut(usize::from(x))?.get_mut(usize::from(y))
    }

    /// The block type table entry at `index`.
    #[must_use]
    pub fn block_type(&self, index: usize) -> Option<&BlockType> {
        self.block_types.get(index)
    }

    /// Number of distinct block types.
    #[must_use]
    pub fn num_block_types(&self) -> usize {
        self.block_types.len()
    }

    /// The most frequent interior block type, assumed to be the logic block.
    #[must_use]
    pub fn fill_type(&self) -> Option<&BlockType> {
        self.fill_type_index.and_then(|idx| self.block_types.get(idx))
    }

    /// The most frequent block type on the device perimeter.
    #[must_use]
    pub fn perimeter_type(&self) -> Option<&BlockType> {
        self.perimeter_type_index
            .and_then(|idx| self.block_types.get(idx))
    }

    /// Channel width limits.
    #[must_use]
    pub const fn channel_widths(&self) -> &ChannelWidths {
        &self.chan_widths
    }

    /// Coarse category of a block type, derived from its footprint, pin
    /// count, and placement.
    #[must_use]
    pub fn block_category(&self, index: usize) -> Option<BlockCategory> {
        let block = self.block_types.get(index)?;
        if block.num_pins() == 0 {
            return Some(BlockCategory::Empty);
        }
        if block.width() > 1 || block.height() > 1 {
            return Some(BlockCategory::Macro);
        }
        if self.perimeter_type_index == Some(index) && self.fill_type_index != Some(index) {
            return Some(BlockCategory::Io);
        }
        Some(BlockCategory::Logic)
    }

    /// Returns `true` when `(x, y)` lies on the outermost ring of the grid.
    #[must_use]
    pub fn on_perimeter(&self, x: u16, y: u16) -> bool {
        let (width, height) = self.grid_size();
        x == 0 || y == 0 || x + 1 == width || y + 1 == height
    }

    fn most_frequent_type(&self, perimeter: bool) -> Option<usize> {
        let mut counts = vec![0usize; self.block_types.len()];
        let (width, height) = self.grid_size();
        for x in 0..width {
            for y in 0..height {
                if self.on_perimeter(x, y) != perimeter {
                    continue;
                }
                let Some(tile) = self.tile(x, y) else { continue };
                if !tile.is_root() {
                    continue;
                }
                if let Some(count) = counts.get_mut(tile.type_index) {
                    *count += 1;
                }
            }
        }
        counts
            .iter()
            .enumerate()
            .filter(|&(idx, &count)| {
                count > 0 && self.block_types.get(idx).is_some_and(|b| b.num_pins() > 0)
            })
            .max_by_key(|&(_, &count)| count)
            .map(|(idx, _)| idx)
    }
}
