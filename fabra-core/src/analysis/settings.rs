//! Derived per-run analysis settings.
//!
//! Translates validated [`UserOptions`] and the loaded architecture into
//! the concrete quantities the worker pool consumes: per-pin usage
//! probabilities for the fill block type, connection-length probabilities
//! renormalized to what the test area can actually realize, the tiles
//! enumeration starts from, and the weight cap per connection length.

use tracing::debug;

use crate::{
    PROB_TOL,
    graph::{Architecture, PinClass, PinType},
    options::UserOptions,
};

use super::error::{AnalysisError, Result};

/// Extra weight allowed beyond a connection's Manhattan length, to admit
/// reasonable detours. The single knob behind
/// [`AnalysisSettings::max_path_weight`].
pub const PATH_WEIGHT_SLACK: u32 = 2;

/// Settings shared by every job of one run.
#[derive(Clone, Debug)]
pub struct AnalysisSettings {
    fill_type_index: usize,
    fill_classes: Vec<PinClass>,
    pin_probabilities: Vec<f64>,
    length_probabilities: Vec<f64>,
    test_tile_coords: Vec<(u16, u16)>,
    receiver_tile_coords: Vec<(u16, u16)>,
    max_connection_length: usize,
}

impl AnalysisSettings {
    /// Derives settings from options and the architecture, annotating each
    /// grid tile with its driver and receiver pin counts.
    ///
    /// # Errors
    /// Returns [`AnalysisError::NoFillType`] when the architecture has no
    /// interior block type, [`AnalysisError::NoTestTiles`] when the margins
    /// exclude every tile, and [`AnalysisError::NoRealizableLength`] when
    /// no configured length fits the test area.
    pub fn from_options(options: &UserOptions, arch: &mut Architecture) -> Result<Self> {
        let fill = arch.fill_type().ok_or(AnalysisError::NoFillType)?;
        let fill_type_index = fill.index();
        let fill_classes = fill.classes().to_vec();

        let pin_probabilities: Vec<f64> = (0..fill.num_pins())
            .map(|pin| {
                let pin = pin as u16;
                if fill.is_global_pin(pin) {
                    return 0.0;
                }
                match fill.pin_type(pin) {
                    PinType::Driver => options.opin_probability,
                    PinType::Receiver => options.ipin_probability,
                    PinType::Open => 0.0,
                }
            })
            .collect();

        annotate_grid(arch, fill_type_index, &pin_probabilities);

        let (width, height) = arch.grid_size();
        let margin = if options.analyze_core {
            options.max_connection_length.min(usize::from(width)) as u16
        } else {
            1
        };
        let test_tile_coords = collect_tiles(arch, fill_type_index, margin, |tile| {
            tile.num_sources > 0
        });
        if test_tile_coords.is_empty() {
            return Err(AnalysisError::NoTestTiles {
                margin,
                width,
                height,
            });
        }
        let receiver_tile_coords = collect_tiles(arch, fill_type_index, margin, |tile| {
            tile.num_receivers > 0
        });

        let length_probabilities = renormalize_lengths(
            &options.length_probabilities,
            &test_tile_coords,
            &receiver_tile_coords,
        )?;
        debug!(
            tiles = test_tile_coords.len(),
            lengths = length_probabilities.iter().filter(|&&p| p > 0.0).count(),
            "analysis settings derived"
        );

        Ok(Self {
            fill_type_index,
            fill_classes,
            pin_probabilities,
            length_probabilities,
            test_tile_coords,
            receiver_tile_coords,
            max_connection_length: options.max_connection_length,
        })
    }

    /// Index of the fill block type the run exercises.
    #[must_use]
    pub const fn fill_type_index(&self) -> usize {
        self.fill_type_index
    }

    /// Pin classes of the fill block type.
    #[must_use]
    pub fn classes(&self) -> &[PinClass] {
        &self.fill_classes
    }

    /// Usage probability of each fill-type pin.
    #[must_use]
    pub fn pin_probabilities(&self) -> &[f64] {
        &self.pin_probabilities
    }

    /// Renormalized occurrence probability per length; index 0 = length 1.
    #[must_use]
    pub fn length_probabilities(&self) -> &[f64] {
        &self.length_probabilities
    }

    /// Tiles enumeration starts from.
    #[must_use]
    pub fn test_tile_coords(&self) -> &[(u16, u16)] {
        &self.test_tile_coords
    }

    /// Tiles that can terminate a connection.
    #[must_use]
    pub fn receiver_tile_coords(&self) -> &[(u16, u16)] {
        &self.receiver_tile_coords
    }

    /// Longest connection length analysed.
    #[must_use]
    pub const fn max_connection_length(&self) -> usize {
        self.max_connection_length
    }

    /// Weight cap for a connection of the given Manhattan length.
    #[must_use]
    pub fn max_path_weight(&self, conn_length: usize) -> u32 {
        conn_length as u32 + PATH_WEIGHT_SLACK
    }
}

fn annotate_grid(arch: &mut Architecture, fill_type_index: usize, pin_probabilities: &[f64]) {
    let fill = arch.block_type(fill_type_index);
    let (num_sources, num_receivers) = fill.map_or((0, 0), |block| {
        let mut sources = 0;
        let mut receivers = 0;
        for (pin, &probability) in pin_probabilities.iter().enumerate() {
            if probability <= 0.0 {
                continue;
            }
            match block.pin_type(pin as u16) {
                PinType::Driver => sources += 1,
                PinType::Receiver => receivers += 1,
                PinType::Open => {}
            }
        }
        (sources, receivers)
    });

    let (width, height) = arch.grid_size();
    for x in 0..width {
        for y in 0..height {
            let is_fill = arch
                .tile(x, y)
                .is_some_and(|tile| tile.type_index == fill_type_index && tile.is_root());
            if let Some(tile) = arch.tile_mut(x, y) {
                if is_fill {
                    tile.num_sources = num_sources;
                    tile.num_receivers = num_receivers;
                } else {
                    tile.num_sources = 0;
                    tile.num_receivers = 0;
                }
            }
        }
    }
}

fn collect_tiles(
    arch: &Architecture,
    fill_type_index: usize,
    margin: u16,
    keep: impl Fn(&crate::graph::GridTile) -> bool,
) -> Vec<(u16, u16)> {
    let (width, height) = arch.grid_size();
    let mut tiles = Vec::new();
    for x in 0..width {
        for y in 0..height {
            if x < margin || y < margin || x + margin >= width || y + margin >= height {
                continue;
            }
            let Some(tile) = arch.tile(x, y) else { continue };
            if tile.type_index == fill_type_index && tile.is_root() && keep(tile) {
                tiles.push((x, y));
            }
        }
    }
    tiles
}

/// Retains the lengths realizable between the test and receiver tiles and
/// rescales the retained probabilities to sum to one.
fn renormalize_lengths(
    requested: &[f64],
    test_tiles: &[(u16, u16)],
    receiver_tiles: &[(u16, u16)],
) -> Result<Vec<f64>> {
    let mut retained = vec![0.0; requested.len()];
    for (index, &probability) in requested.iter().enumerate() {
        if probability <= 0.0 {
            continue;
        }
        let length = index + 1;
        if length_realizable(length, test_tiles, receiver_tiles) {
            retained[index] = probability;
        }
    }
    let sum: f64 = retained.iter().sum();
    if sum <= PROB_TOL {
        return Err(AnalysisError::NoRealizableLength);
    }
    for probability in &mut retained {
        *probability /= sum;
    }
    Ok(retained)
}

fn length_realizable(
    length: usize,
    test_tiles: &[(u16, u16)],
    receiver_tiles: &[(u16, u16)],
) -> bool {
    test_tiles.iter().any(|&(x1, y1)| {
        receiver_tiles.iter().any(|&(x2, y2)| {
            let dist = (i32::from(x1) - i32::from(x2)).unsigned_abs()
                + (i32::from(y1) - i32::from(y2)).unsigned_abs();
            dist as usize == length
        })
    })
}
