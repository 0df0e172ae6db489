use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ClientError;

/// Milepost category as sent by the server.
///
/// The four fixed kinds get dedicated drawing; every other name is a terrain
/// feature drawn from a glyph asset (the shipped maps use `DESERT`,
/// `MOUNTAIN`, `ALPINE`, `JUNGLE`, `FOREST` and `CHUNNEL`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MilepostKind {
    City,
    MajorCity,
    Normal,
    Blank,
    Terrain(String),
}

impl MilepostKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::City => "CITY",
            Self::MajorCity => "MAJORCITY",
            Self::Normal => "NORMAL",
            Self::Blank => "BLANK",
            Self::Terrain(name) => name,
        }
    }

    /// File stem of the glyph asset for terrain kinds.
    pub fn asset_name(&self) -> Option<String> {
        match self {
            Self::Terrain(name) => Some(name.to_ascii_lowercase()),
            _ => None,
        }
    }
}

impl From<String> for MilepostKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CITY" => Self::City,
            "MAJORCITY" => Self::MajorCity,
            "NORMAL" => Self::Normal,
            "BLANK" | "" => Self::Blank,
            _ => Self::Terrain(value),
        }
    }
}

impl From<MilepostKind> for String {
    fn from(kind: MilepostKind) -> Self {
        match kind {
            MilepostKind::Terrain(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub loads: Vec<String>,
}

/// Grid address of a milepost. Serialized as `{"x": column, "y": row}` to
/// match the server's milepost ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MilepostId {
    #[serde(rename = "x")]
    pub column: usize,
    #[serde(rename = "y")]
    pub row: usize,
}

impl MilepostId {
    pub const fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}

const ID_PREFIX: &str = "milepost";

impl fmt::Display for MilepostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{},{}", self.column, self.row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid milepost id '{0}'")]
pub struct ParseMilepostIdError(String);

impl FromStr for MilepostId {
    type Err = ParseMilepostIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMilepostIdError(s.to_string());
        let rest = s.strip_prefix(ID_PREFIX).ok_or_else(invalid)?;
        let (column, row) = rest.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            column: column.trim().parse().map_err(|_| invalid())?,
            row: row.trim().parse().map_err(|_| invalid())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milepost {
    pub kind: MilepostKind,
    pub x: usize,
    pub y: usize,
    pub city: Option<City>,
}

impl Milepost {
    pub fn new(kind: MilepostKind, x: usize, y: usize) -> Self {
        Self {
            kind,
            x,
            y,
            city: None,
        }
    }

    pub fn with_city(mut self, name: impl Into<String>) -> Self {
        self.city = Some(City {
            name: name.into(),
            loads: Vec::new(),
        });
        self
    }

    pub const fn id(&self) -> MilepostId {
        MilepostId::new(self.x, self.y)
    }
}

/// Board dimensions and whitespace offsets, in map (viewBox) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    pub width: f64,
    pub height: f64,
    pub column_count: usize,
    pub row_count: usize,
    pub left_offset: f64,
    pub top_offset: f64,
}

impl BoardLayout {
    pub fn validate(&self) -> Result<(), ClientError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if self.column_count == 0
            || self.row_count == 0
            || !positive(self.width)
            || !positive(self.height)
        {
            return Err(ClientError::InvalidBoardGeometry {
                width: self.width,
                height: self.height,
                columns: self.column_count,
                rows: self.row_count,
            });
        }
        Ok(())
    }

    pub const fn cell_count(&self) -> usize {
        self.column_count * self.row_count
    }

    /// Extent of the board including its offsets: `(min_x, min_y, max_x, max_y)`.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        (
            0.0,
            0.0,
            self.left_offset + self.width,
            self.top_offset + self.height,
        )
    }
}

/// An immutable, validated milepost grid stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    layout: BoardLayout,
    mileposts: Vec<Milepost>,
}

impl Board {
    pub fn new(layout: BoardLayout, mileposts: Vec<Milepost>) -> Result<Self, ClientError> {
        layout.validate()?;
        if mileposts.len() != layout.cell_count() {
            return Err(ClientError::malformed(format!(
                "expected {} mileposts for a {}x{} grid, got {}",
                layout.cell_count(),
                layout.column_count,
                layout.row_count,
                mileposts.len()
            )));
        }
        for (idx, mp) in mileposts.iter().enumerate() {
            let (column, row) = (idx % layout.column_count, idx / layout.column_count);
            if mp.x != column || mp.y != row {
                return Err(ClientError::malformed(format!(
                    "milepost at index {idx} claims ({}, {}) but sits at ({column}, {row})",
                    mp.x, mp.y
                )));
            }
        }
        Ok(Self { layout, mileposts })
    }

    /// Build a board from kinds listed in row-major order.
    pub fn from_kinds(
        layout: BoardLayout,
        kinds: impl IntoIterator<Item = MilepostKind>,
    ) -> Result<Self, ClientError> {
        layout.validate()?;
        let columns = layout.column_count;
        let mileposts = kinds
            .into_iter()
            .enumerate()
            .map(|(idx, kind)| Milepost::new(kind, idx % columns, idx / columns))
            .collect();
        Self::new(layout, mileposts)
    }

    pub fn from_wire(data: MapData) -> Result<Self, ClientError> {
        let layout = BoardLayout {
            width: data.map_width,
            height: data.map_height,
            column_count: data.mp_width,
            row_count: data.mp_height,
            left_offset: data.left_offset,
            top_offset: data.top_offset,
        };
        layout.validate()?;
        let mileposts = data
            .ordered_mileposts
            .into_iter()
            .map(WireMilepost::into_record)
            .map(|record| {
                record.map(|r| Milepost {
                    kind: r.kind,
                    x: r.x,
                    y: r.y,
                    city: r.city,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(layout, mileposts)
    }

    pub const fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn mileposts(&self) -> &[Milepost] {
        &self.mileposts
    }

    /// Row-major index of a grid address, `None` when outside the grid.
    pub fn index_of(&self, id: MilepostId) -> Option<usize> {
        if id.column >= self.layout.column_count || id.row >= self.layout.row_count {
            return None;
        }
        Some(id.row * self.layout.column_count + id.column)
    }

    pub fn milepost_at(&self, id: MilepostId) -> Option<&Milepost> {
        self.index_of(id).and_then(|idx| self.mileposts.get(idx))
    }

    /// Distinct terrain kind names, i.e. the glyph assets this board needs.
    pub fn terrain_kinds(&self) -> BTreeSet<String> {
        self.mileposts
            .iter()
            .filter_map(|mp| match &mp.kind {
                MilepostKind::Terrain(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// CRC32 over layout and milepost kinds. Equal boards hash equal.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        let l = &self.layout;
        for v in [l.width, l.height, l.left_offset, l.top_offset] {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(&(l.column_count as u64).to_le_bytes());
        hasher.update(&(l.row_count as u64).to_le_bytes());
        for mp in &self.mileposts {
            hasher.update(mp.kind.as_str().as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize()
    }
}

/// Board payload as serialized by the server (`mapData`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub ordered_mileposts: Vec<WireMilepost>,
    pub mp_width: usize,
    pub mp_height: usize,
    #[serde(default)]
    pub left_offset: f64,
    #[serde(default)]
    pub top_offset: f64,
    pub map_width: f64,
    pub map_height: f64,
}

/// The server writes each milepost through a string adapter, so entries may
/// arrive as JSON text instead of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMilepost {
    Record(MilepostRecord),
    Encoded(String),
}

impl WireMilepost {
    fn into_record(self) -> Result<MilepostRecord, ClientError> {
        match self {
            Self::Record(record) => Ok(record),
            Self::Encoded(text) => serde_json::from_str(&text).map_err(|e| {
                ClientError::malformed(format!("undecodable milepost '{text}': {e}"))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilepostRecord {
    pub x: usize,
    pub y: usize,
    #[serde(rename = "type")]
    pub kind: MilepostKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout(columns: usize, rows: usize) -> BoardLayout {
        BoardLayout {
            width: 100.0,
            height: 100.0,
            column_count: columns,
            row_count: rows,
            left_offset: 0.0,
            top_offset: 0.0,
        }
    }

    #[test]
    fn milepost_id_display_and_parse() {
        let id = MilepostId::new(12, 7);
        assert_eq!(id.to_string(), "milepost12,7");
        assert_eq!("milepost12,7".parse::<MilepostId>(), Ok(id));
        assert!("milepost12".parse::<MilepostId>().is_err());
        assert!("mp12,7".parse::<MilepostId>().is_err());
        assert!("milepost-1,7".parse::<MilepostId>().is_err());
    }

    #[test]
    fn kind_parsing_keeps_terrain_names() {
        assert_eq!(MilepostKind::from("CITY".to_string()), MilepostKind::City);
        assert_eq!(
            MilepostKind::from("MAJORCITY".to_string()),
            MilepostKind::MajorCity
        );
        let desert = MilepostKind::from("DESERT".to_string());
        assert_eq!(desert, MilepostKind::Terrain("DESERT".into()));
        assert_eq!(desert.asset_name().as_deref(), Some("desert"));
        assert_eq!(MilepostKind::Normal.asset_name(), None);
    }

    #[test]
    fn zero_dimension_is_invalid_geometry() {
        let err = Board::from_kinds(layout(0, 3), Vec::new()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBoardGeometry { .. }));

        let mut flat = layout(2, 2);
        flat.height = 0.0;
        let err = Board::from_kinds(flat, vec![MilepostKind::Normal; 4]).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBoardGeometry { .. }));
    }

    #[test]
    fn wrong_milepost_count_is_malformed() {
        let err = Board::from_kinds(layout(2, 2), vec![MilepostKind::Normal; 3]).unwrap_err();
        assert!(matches!(err, ClientError::MalformedServerPayload(_)));
    }

    #[test]
    fn out_of_order_milepost_is_malformed() {
        let mileposts = vec![
            Milepost::new(MilepostKind::Normal, 1, 0),
            Milepost::new(MilepostKind::Normal, 0, 0),
        ];
        let err = Board::new(layout(2, 1), mileposts).unwrap_err();
        assert!(matches!(err, ClientError::MalformedServerPayload(_)));
    }

    #[test]
    fn reverse_lookup_is_row_major() {
        // Non-square grid so swapping the multiplication order would be caught.
        let kinds = (0..12).map(|i| MilepostKind::Terrain(format!("T{i}")));
        let board = Board::from_kinds(layout(4, 3), kinds).unwrap();
        for mp in board.mileposts() {
            assert_eq!(board.milepost_at(mp.id()), Some(mp));
        }
        let mp = board.milepost_at(MilepostId::new(3, 1)).unwrap();
        assert_eq!(mp.kind, MilepostKind::Terrain("T7".into()));
        assert_eq!(board.milepost_at(MilepostId::new(4, 0)), None);
        assert_eq!(board.milepost_at(MilepostId::new(0, 3)), None);
    }

    #[test]
    fn wire_board_accepts_objects_and_encoded_strings() {
        let payload = json!({
            "orderedMileposts": [
                {"x": 0, "y": 0, "type": "NORMAL", "edges": [{"x": 1, "y": 0, "cost": 1}]},
                "{\"x\":1,\"y\":0,\"type\":\"CITY\",\"city\":{\"name\":\"Cairo\",\"loads\":[\"Cotton\"]},\"edges\":[]}",
                {"x": 0, "y": 1, "type": "BLANK"},
                {"x": 1, "y": 1, "type": "JUNGLE"}
            ],
            "mpWidth": 2,
            "mpHeight": 2,
            "leftOffset": 12,
            "topOffset": 8,
            "mapWidth": 200,
            "mapHeight": 150
        });
        let data: MapData = serde_json::from_value(payload).unwrap();
        let board = Board::from_wire(data).unwrap();
        assert_eq!(board.layout().column_count, 2);
        assert_eq!(board.layout().left_offset, 12.0);
        let cairo = board.milepost_at(MilepostId::new(1, 0)).unwrap();
        assert_eq!(cairo.kind, MilepostKind::City);
        assert_eq!(cairo.city.as_ref().map(|c| c.loads.clone()), Some(vec!["Cotton".to_string()]));
        assert_eq!(
            board.terrain_kinds().into_iter().collect::<Vec<_>>(),
            vec!["JUNGLE".to_string()]
        );
    }

    #[test]
    fn wire_board_rejects_garbage_milepost_string() {
        let payload = json!({
            "orderedMileposts": ["not json"],
            "mpWidth": 1,
            "mpHeight": 1,
            "mapWidth": 10,
            "mapHeight": 10
        });
        let data: MapData = serde_json::from_value(payload).unwrap();
        assert!(matches!(
            Board::from_wire(data),
            Err(ClientError::MalformedServerPayload(_))
        ));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Board::from_kinds(layout(2, 1), vec![MilepostKind::Normal, MilepostKind::City])
            .unwrap();
        let b = a.clone();
        let c = Board::from_kinds(layout(2, 1), vec![MilepostKind::City, MilepostKind::Normal])
            .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
