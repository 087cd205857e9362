//! Static catalog of train lines and their branches.
//!
//! The catalog is a JSON document shipped alongside the application:
//!
//! ```json
//! {
//!   "Lineas": [{
//!     "Nombre": "Tren de la Costa",
//!     "Prefijo": "",
//!     "Ramales": [{
//!       "RamalIda": 41, "RamalVuelta": 42, "Mostrar": true,
//!       "Estaciones": ["Maipú", "Borges", "Delta"]
//!     }]
//!   }]
//! }
//! ```
//!
//! Each branch becomes one [`TrainLine`], reachable through either of its
//! two line ids. The dispatcher never needs the catalog; it exists so a
//! caller can turn a line id into names and station lists.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Errors that can occur while loading a catalog.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read line catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog is not valid JSON or does not have the expected shape.
    #[error("failed to parse line catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Direction of travel on a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards the far end, the `RamalIda` id.
    Outbound,
    /// Back towards the origin, the `RamalVuelta` id.
    Inbound,
}

/// One branch of a train line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainLine {
    /// The line's name.
    pub name: String,
    /// Prefix shown before the name, often empty.
    pub prefix: String,
    /// Whether the branch should be listed to users.
    pub display: bool,
    /// Line id used for the inbound direction.
    pub inbound_line_id: i32,
    /// Line id used for the outbound direction.
    pub outbound_line_id: i32,
    /// Stations, in outbound order.
    pub stations: Vec<String>,
}

impl TrainLine {
    /// Returns which direction of this branch `line_id` refers to.
    pub fn direction_of(&self, line_id: i32) -> Option<Direction> {
        if line_id == self.outbound_line_id {
            Some(Direction::Outbound)
        } else if line_id == self.inbound_line_id {
            Some(Direction::Inbound)
        } else {
            None
        }
    }

    /// Name with its prefix, e.g. `"FFCC Sarmiento"`.
    pub fn display_name(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.prefix, self.name)
        }
    }
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(rename = "Lineas")]
    lines: Vec<RawLine>,
}

#[derive(Deserialize)]
struct RawLine {
    #[serde(rename = "Nombre")]
    name: String,
    #[serde(rename = "Prefijo")]
    prefix: String,
    #[serde(rename = "Ramales")]
    branches: Vec<RawBranch>,
}

#[derive(Deserialize)]
struct RawBranch {
    #[serde(rename = "RamalIda")]
    outbound: i32,
    #[serde(rename = "RamalVuelta")]
    inbound: i32,
    #[serde(rename = "Mostrar")]
    display: bool,
    #[serde(rename = "Estaciones")]
    stations: Vec<String>,
}

/// All known branches, indexed by line id.
#[derive(Debug, Clone, Default)]
pub struct LineCatalog {
    lines: Vec<TrainLine>,
    index: HashMap<i32, usize>,
}

impl LineCatalog {
    /// Parses a catalog document.
    ///
    /// # Examples
    ///
    /// ```
    /// use trenes::catalog::{Direction, LineCatalog};
    ///
    /// let catalog = LineCatalog::from_json_str(r#"{"Lineas": [{
    ///     "Nombre": "Tren de la Costa", "Prefijo": "",
    ///     "Ramales": [{"RamalIda": 41, "RamalVuelta": 42, "Mostrar": true,
    ///                  "Estaciones": ["Maipú", "Delta"]}]
    /// }]}"#).unwrap();
    ///
    /// let line = catalog.line(42).unwrap();
    /// assert_eq!(line.name, "Tren de la Costa");
    /// assert_eq!(line.direction_of(42), Some(Direction::Inbound));
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    /// Reads and parses a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), lines = catalog.lines.len(), "Loaded line catalog");
        Ok(catalog)
    }

    fn from_raw(raw: RawCatalog) -> Self {
        let lines: Vec<TrainLine> = raw
            .lines
            .into_iter()
            .flat_map(|line| {
                let RawLine {
                    name,
                    prefix,
                    branches,
                } = line;
                branches.into_iter().map(move |branch| TrainLine {
                    name: name.clone(),
                    prefix: prefix.clone(),
                    display: branch.display,
                    inbound_line_id: branch.inbound,
                    outbound_line_id: branch.outbound,
                    stations: branch.stations,
                })
            })
            .collect();

        // Later branches win when ids repeat.
        let mut index = HashMap::with_capacity(lines.len() * 2);
        for (position, line) in lines.iter().enumerate() {
            index.insert(line.outbound_line_id, position);
            index.insert(line.inbound_line_id, position);
        }

        Self { lines, index }
    }

    /// Looks up the branch serving `line_id` in either direction.
    pub fn line(&self, line_id: i32) -> Option<&TrainLine> {
        self.index.get(&line_id).map(|&position| &self.lines[position])
    }

    /// All branches, in document order.
    pub fn lines(&self) -> &[TrainLine] {
        &self.lines
    }

    /// Branches flagged for display, in document order.
    pub fn displayed(&self) -> impl Iterator<Item = &TrainLine> {
        self.lines.iter().filter(|line| line.display)
    }
}
