/// Pattern library: immutable area-of-effect grids, built once per process.
///
/// Every shape is drawn as ASCII with the anchor in the exact middle cell:
///
///   `.`  empty
///   `x`  hit (always, regardless of direction)
///   `n` `e` `s` `w`  hit only when the sweep is resolved towards that side
///
/// Directional shapes (`Wave`) are drawn facing north and rotated to the
/// anchor's facing when counted. Each shape also has a *safe* variant, the
/// normal grid dilated by `SAFE_MARGIN` cells, which is only ever used to veto
/// an attack when a non-allied player stands nearby.
use crate::{
    error::PatternError,
    geometry::Direction,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra ring added around a shape to build its safe variant.
pub const SAFE_MARGIN: usize = 2;

/// Number of generated `Radius` squares (radius 1 through 8).
const RADIUS_COUNT: u8 = 8;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    /// Filled squares around the anchor; index `i` has radius `i + 1`.
    Radius,
    /// Symmetric area shapes.
    Blob,
    /// Shapes that extend in front of the caster.
    Wave,
    /// Four-direction marked shapes resolved by the rotation state machine.
    Sweep,
}

impl PatternCategory {
    /// Shapes whose orientation follows the anchor's facing.
    pub fn is_directional(self) -> bool {
        matches!(self, PatternCategory::Wave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternRef {
    pub category: PatternCategory,
    pub index:    u8,
}

impl PatternRef {
    pub const fn new(category: PatternCategory, index: u8) -> Self {
        Self { category, index }
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Hit,
    Marked(Direction),
}

impl Cell {
    fn from_char(c: char) -> Cell {
        match c {
            'x' => Cell::Hit,
            'n' => Cell::Marked(Direction::North),
            'e' => Cell::Marked(Direction::East),
            's' => Cell::Marked(Direction::South),
            'w' => Cell::Marked(Direction::West),
            _   => Cell::Empty,
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    name:        String,
    width:       usize,
    height:      usize,
    cells:       Vec<Cell>,
    directional: bool,
}

impl Pattern {
    /// Builds a pattern from equal-length ASCII rows. Short rows are padded
    /// with empty cells.
    pub fn parse(name: &str, rows: &[&str], directional: bool) -> Pattern {
        let height = rows.len();
        let width  = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut cells = vec![Cell::Empty; width * height];
        for (row, line) in rows.iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                cells[row * width + col] = Cell::from_char(c);
            }
        }
        Pattern { name: name.to_owned(), width, height, cells, directional }
    }

    /// A filled `(2r+1)²` square.
    pub fn square(radius: usize) -> Pattern {
        let side = radius * 2 + 1;
        Pattern {
            name:        format!("radius_{}", radius),
            width:       side,
            height:      side,
            cells:       vec![Cell::Hit; side * side],
            directional: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_directional(&self) -> bool {
        self.directional
    }

    /// Half extent of the grid; the Chebyshev bound of every covered offset.
    pub fn radius(&self) -> u32 {
        (self.width / 2).max(self.height / 2) as u32
    }

    fn center(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }

    fn cell_at(&self, col: i32, row: i32) -> Cell {
        if col < 0 || row < 0 || col >= self.width as i32 || row >= self.height as i32 {
            return Cell::Empty;
        }
        self.cells[row as usize * self.width + col as usize]
    }

    /// The cell at offset `(dx, dy)` from the anchor.
    pub fn cell(&self, dx: i32, dy: i32) -> Cell {
        let (cx, cy) = self.center();
        self.cell_at(cx + dx, cy + dy)
    }

    /// True when the offset lands on any non-empty cell.
    pub fn covers(&self, dx: i32, dy: i32) -> bool {
        !self.cell(dx, dy).is_empty()
    }

    /// Offsets of every non-empty cell, row-major.
    pub fn offsets(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (cx, cy) = self.center();
        self.cells.iter().enumerate().filter(|(_, c)| !c.is_empty()).map(move |(i, _)| {
            let col = (i % self.width) as i32;
            let row = (i / self.width) as i32;
            (col - cx, row - cy)
        })
    }

    pub fn area(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    /// Masks a sweep grid down to the cells that hit when resolved towards
    /// `dir`: untagged hits plus cells marked `dir`.
    pub fn select_direction(&self, dir: Direction) -> Pattern {
        let cells = self
            .cells
            .iter()
            .map(|c| match *c {
                Cell::Hit => Cell::Hit,
                Cell::Marked(d) if d == dir => Cell::Hit,
                _ => Cell::Empty,
            })
            .collect();
        Pattern {
            name:        format!("{}:{:?}", self.name, dir).to_lowercase(),
            width:       self.width,
            height:      self.height,
            cells,
            directional: false,
        }
    }

    /// Rotates a north-facing grid clockwise until it faces `dir`.
    pub fn rotated(&self, dir: Direction) -> Pattern {
        let mut out = self.clone();
        for _ in 0..dir.quarter_turns() {
            out = out.rotate_clockwise();
        }
        out
    }

    fn rotate_clockwise(&self) -> Pattern {
        // (dx, dy) -> (-dy, dx) with north at negative y.
        let (width, height) = (self.height, self.width);
        let mut cells = vec![Cell::Empty; width * height];
        for row in 0..self.height {
            for col in 0..self.width {
                let new_col = self.height - 1 - row;
                let new_row = col;
                cells[new_row * width + new_col] = match self.cells[row * self.width + col] {
                    Cell::Marked(d) => Cell::Marked(clockwise(d)),
                    other => other,
                };
            }
        }
        Pattern { name: self.name.clone(), width, height, cells, directional: self.directional }
    }

    /// Grows the grid by `margin` on every side; a cell is hit when any
    /// original cell lies within Chebyshev `margin` of it.
    pub fn dilated(&self, margin: usize) -> Pattern {
        let width  = self.width + margin * 2;
        let height = self.height + margin * 2;
        let m = margin as i32;
        let mut cells = vec![Cell::Empty; width * height];
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                let hit = (-m..=m).any(|dy| {
                    (-m..=m).any(|dx| !self.cell_at(col - m + dx, row - m + dy).is_empty())
                });
                if hit {
                    cells[row as usize * width + col as usize] = Cell::Hit;
                }
            }
        }
        Pattern {
            name: format!("{}:safe", self.name),
            width,
            height,
            cells,
            directional: self.directional,
        }
    }
}

fn clockwise(d: Direction) -> Direction {
    match d {
        Direction::North => Direction::East,
        Direction::East  => Direction::South,
        Direction::South => Direction::West,
        Direction::West  => Direction::North,
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

const BLOBS: &[(&str, &[&str])] = &[
    ("small_area", &[
        "xxx",
        "xxx",
        "xxx",
    ]),
    ("great_area", &[
        "..xxx..",
        ".xxxxx.",
        "xxxxxxx",
        "xxxxxxx",
        "xxxxxxx",
        ".xxxxx.",
        "..xxx..",
    ]),
    ("cross", &[
        "..x..",
        "..x..",
        "xxxxx",
        "..x..",
        "..x..",
    ]),
    ("explosion", &[
        ".x.",
        "xxx",
        ".x.",
    ]),
];

const WAVES: &[(&str, &[&str])] = &[
    ("beam", &[
        "x",
        "x",
        "x",
        "x",
        "x",
        ".",
        ".",
        ".",
        ".",
        ".",
        ".",
    ]),
    ("wave", &[
        "xxxxx",
        "xxxxx",
        ".xxx.",
        ".xxx.",
        "..x..",
        ".....",
        ".....",
        ".....",
        ".....",
        ".....",
        ".....",
    ]),
    ("front", &[
        "xxx",
        "...",
        "...",
    ]),
];

const SWEEPS: &[(&str, &[&str])] = &[
    ("sweep", &[
        ".nnnnn.",
        "w.nnn.e",
        "wwxnxee",
        "www.eee",
        "wwxsxee",
        "w.sss.e",
        ".sssss.",
    ]),
    ("narrow_sweep", &[
        ".nnn.",
        "w.n.e",
        "ww.ee",
        "w.s.e",
        ".sss.",
    ]),
];

struct Variants {
    normal: Pattern,
    safe:   Pattern,
}

impl Variants {
    fn new(normal: Pattern) -> Self {
        let safe = normal.dilated(SAFE_MARGIN);
        Self { normal, safe }
    }
}

pub struct PatternLibrary {
    entries: HashMap<PatternRef, Variants>,
}

impl PatternLibrary {
    fn build() -> Self {
        let mut entries = HashMap::new();

        for i in 0..RADIUS_COUNT {
            let key = PatternRef::new(PatternCategory::Radius, i);
            entries.insert(key, Variants::new(Pattern::square(i as usize + 1)));
        }

        let drawn = [
            (PatternCategory::Blob, BLOBS),
            (PatternCategory::Wave, WAVES),
            (PatternCategory::Sweep, SWEEPS),
        ];
        for (category, shapes) in drawn {
            for (i, (name, rows)) in shapes.iter().enumerate() {
                let pattern = Pattern::parse(name, rows, category.is_directional());
                entries.insert(PatternRef::new(category, i as u8), Variants::new(pattern));
            }
        }

        tracing::debug!("Pattern library built: {} shapes", entries.len());
        Self { entries }
    }

    pub fn get(&self, key: PatternRef, safe: bool) -> Result<&Pattern, PatternError> {
        let variants = self.entries.get(&key).ok_or(PatternError::UnknownPattern {
            category: key.category,
            index:    key.index,
        })?;
        Ok(if safe { &variants.safe } else { &variants.normal })
    }
}

static LIBRARY: Lazy<PatternLibrary> = Lazy::new(PatternLibrary::build);

/// Looks up a shape from the process-wide library.
pub fn get(category: PatternCategory, index: u8, safe: bool) -> Result<&'static Pattern, PatternError> {
    LIBRARY.get(PatternRef::new(category, index), safe)
}

pub fn resolve(key: PatternRef, safe: bool) -> Result<&'static Pattern, PatternError> {
    LIBRARY.get(key, safe)
}
