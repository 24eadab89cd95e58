//! Plain-text map loading.
//!
//! The format is line oriented:
//!
//! - lines starting with `#` and blank lines are comments
//! - the first non-comment line is the header `<width> <height> <resolution>`
//! - the remaining non-comment tokens are `width * height` cell values in
//!   row-major order; `-1` marks missing data, values `>= 1.0` are obstacles,
//!   other non-negative values are traversable with additive cost
//!
//! Reading stops once the expected number of cells has been consumed, so
//! trailing comments are allowed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::error::{MapError, Result};
use crate::grid::{Grid, Metadata};

/// Load a map from a file on disk.
pub fn load_map(path: &Path) -> Result<Grid> {
    let file = File::open(path)?;
    let grid = read_map(BufReader::new(file))?;
    debug!("[MapLoader] loaded {:?}: {}", path, grid.metadata().summary());
    Ok(grid)
}

/// Parse a map from any buffered reader.
pub fn read_map<R: BufRead>(reader: R) -> Result<Grid> {
    let mut lines = reader.lines();

    let metadata = parse_header(&mut lines)?;
    let cells = parse_cells(&mut lines, &metadata)?;

    Grid::new(metadata, cells)
}

fn parse_header<B: BufRead>(lines: &mut std::io::Lines<B>) -> Result<Metadata> {
    for line in lines.by_ref() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let width: usize = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or(MapError::MalformedHeader)?;
        let height: usize = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or(MapError::MalformedHeader)?;
        let resolution: f32 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or(MapError::MalformedHeader)?;

        if width == 0 || height == 0 {
            return Err(MapError::InvalidDimensions);
        }
        if resolution <= 0.0 {
            return Err(MapError::InvalidResolution);
        }

        return Ok(Metadata {
            width,
            height,
            resolution,
        });
    }

    Err(MapError::MissingHeader)
}

fn parse_cells<B: BufRead>(lines: &mut std::io::Lines<B>, metadata: &Metadata) -> Result<Vec<f32>> {
    let expected = metadata.cell_count();
    let mut cells = Vec::with_capacity(expected);

    for line in lines.by_ref() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        for token in trimmed.split_whitespace() {
            let value: f32 = token
                .parse()
                .map_err(|_| MapError::MalformedCell(token.to_string()))?;
            cells.push(value);
            if cells.len() == expected {
                return Ok(cells);
            }
        }
    }

    Err(MapError::TruncatedCells {
        got: cells.len(),
        expected,
    })
}
