use std::collections::HashMap;

use tracing::warn;

use crate::board::{Board, Milepost, MilepostId, MilepostKind};
use crate::colors::{CITY_RED, MILEPOST_BLACK};
use crate::error::ClientError;
use crate::geometry::GridDelta;

pub const MILEPOST_RADIUS: f64 = 3.0;
pub const CITY_RADIUS: f64 = 9.0;
pub const MAJOR_CITY_OUTLINE_WIDTH: f64 = 4.0;
pub const GLYPH_SCALE: f64 = 0.035;
/// Small mileposts are hard to hit at low zoom; clicks inside this radius still count.
pub const MIN_HIT_RADIUS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: &'static str,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
        fill: &'static str,
        stroke: Option<Stroke>,
    },
    /// Closed polyline; the last point repeats the first.
    Outline { points: Vec<(f64, f64)>, stroke: Stroke },
    /// Terrain glyph placed by translate-then-scale of its intrinsic `width` x `height`.
    Glyph {
        kind: String,
        translate_x: f64,
        translate_y: f64,
        scale: f64,
        width: f64,
        height: f64,
    },
}

/// One drawing command, tagged with the milepost it was emitted for.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub id: MilepostId,
    pub shape: Shape,
}

impl Primitive {
    /// Cluster outlines sit under the mileposts and never take clicks.
    pub fn is_clickable(&self) -> bool {
        !matches!(self.shape, Shape::Outline { .. })
    }

    pub fn contains(&self, wx: f64, wy: f64) -> bool {
        match &self.shape {
            Shape::Circle { cx, cy, radius, .. } => {
                let r = radius.max(MIN_HIT_RADIUS);
                let (dx, dy) = (wx - cx, wy - cy);
                dx * dx + dy * dy <= r * r
            }
            Shape::Glyph {
                translate_x,
                translate_y,
                scale,
                width,
                height,
                ..
            } => {
                wx >= *translate_x
                    && wx <= translate_x + width * scale
                    && wy >= *translate_y
                    && wy <= translate_y + height * scale
            }
            Shape::Outline { .. } => false,
        }
    }
}

/// Intrinsic sizes of the terrain glyph assets that have been loaded.
pub trait GlyphCatalog {
    fn glyph_size(&self, kind: &str) -> Option<(f64, f64)>;
}

impl GlyphCatalog for HashMap<String, (f64, f64)> {
    fn glyph_size(&self, kind: &str) -> Option<(f64, f64)> {
        self.get(kind).copied()
    }
}

/// Decides which cell of a major-city cluster carries the cluster outline.
pub trait ClusterOracle {
    fn is_first_cell_of_cluster(&self, board: &Board, milepost: &Milepost) -> bool;
}

/// Clusters keyed by city name; the first row-major cell of a name wins.
/// Unnamed major-city cells fall back to adjacency: a cell is first when
/// nothing to its left or in the row above belongs to a major city.
#[derive(Debug, Clone, Copy, Default)]
pub struct CityClusterOracle;

impl ClusterOracle for CityClusterOracle {
    fn is_first_cell_of_cluster(&self, board: &Board, milepost: &Milepost) -> bool {
        if milepost.kind != MilepostKind::MajorCity {
            return false;
        }
        let Some(idx) = board.index_of(milepost.id()) else {
            return false;
        };
        match &milepost.city {
            Some(city) => !board.mileposts()[..idx].iter().any(|other| {
                other.kind == MilepostKind::MajorCity
                    && other.city.as_ref().is_some_and(|c| c.name == city.name)
            }),
            None => {
                let is_major = |column: usize, row: usize| {
                    board
                        .milepost_at(MilepostId::new(column, row))
                        .is_some_and(|mp| mp.kind == MilepostKind::MajorCity)
                };
                let (x, y) = (milepost.x, milepost.y);
                let left = x > 0 && is_major(x - 1, y);
                let above = y > 0
                    && (x.saturating_sub(1)..=x + 1).any(|column| is_major(column, y - 1));
                !left && !above
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMilepost {
    pub id: MilepostId,
    pub kind: String,
}

/// Primitives for one board, in row-major emission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    primitives: Vec<Primitive>,
    skipped: Vec<SkippedMilepost>,
    fingerprint: u32,
}

impl Scene {
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Terrain mileposts left out because their glyph was not available.
    pub fn skipped(&self) -> &[SkippedMilepost] {
        &self.skipped
    }

    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// First clickable primitive emitted for `id`.
    pub fn primitive(&self, id: MilepostId) -> Option<&Primitive> {
        self.primitives
            .iter()
            .find(|p| p.id == id && p.is_clickable())
    }

    /// Topmost clickable primitive under a board-space point.
    pub fn hit_test(&self, wx: f64, wy: f64) -> Option<MilepostId> {
        self.primitives
            .iter()
            .rev()
            .find(|p| p.is_clickable() && p.contains(wx, wy))
            .map(|p| p.id)
    }
}

fn milepost_dot(id: MilepostId, x: f64, y: f64) -> Primitive {
    Primitive {
        id,
        shape: Shape::Circle {
            cx: x,
            cy: y,
            radius: MILEPOST_RADIUS,
            fill: MILEPOST_BLACK,
            stroke: None,
        },
    }
}

fn city_dot(id: MilepostId, x: f64, y: f64) -> Primitive {
    Primitive {
        id,
        shape: Shape::Circle {
            cx: x,
            cy: y,
            radius: CITY_RADIUS,
            fill: CITY_RED,
            stroke: Some(Stroke {
                color: CITY_RED,
                width: 0.0,
            }),
        },
    }
}

/// Hexagon around a two-column, two-row cluster anchored at its top-left cell.
fn major_city_outline(id: MilepostId, x: f64, y: f64, delta: &GridDelta) -> Primitive {
    let (dx, dy) = (delta.x_delta, delta.y_delta);
    Primitive {
        id,
        shape: Shape::Outline {
            points: vec![
                (x, y),
                (x + dx, y),
                (x + dx * 1.5, y + dy),
                (x + dx, y + dy * 2.0),
                (x, y + dy * 2.0),
                (x - dx / 2.0, y + dy),
                (x, y),
            ],
            stroke: Stroke {
                color: CITY_RED,
                width: MAJOR_CITY_OUTLINE_WIDTH,
            },
        },
    }
}

fn terrain_glyph(id: MilepostId, kind: &str, x: f64, y: f64, size: (f64, f64)) -> Primitive {
    let (width, height) = size;
    Primitive {
        id,
        shape: Shape::Glyph {
            kind: kind.to_string(),
            translate_x: x - width / 2.0 * GLYPH_SCALE,
            translate_y: y - height / 2.0 * GLYPH_SCALE,
            scale: GLYPH_SCALE,
            width,
            height,
        },
    }
}

/// Build the milepost layer for `board`.
///
/// Only invalid geometry fails; terrain without a glyph is logged and skipped.
pub fn render(
    board: &Board,
    glyphs: &dyn GlyphCatalog,
    clusters: &dyn ClusterOracle,
) -> Result<Scene, ClientError> {
    let layout = board.layout();
    let delta = GridDelta::for_layout(layout)?;
    let mut primitives = Vec::with_capacity(board.mileposts().len());
    let mut skipped = Vec::new();

    for mp in board.mileposts() {
        let id = mp.id();
        let (x, y) = delta.position(layout, mp.x, mp.y);
        match &mp.kind {
            MilepostKind::Blank => {}
            MilepostKind::City => primitives.push(city_dot(id, x, y)),
            MilepostKind::MajorCity | MilepostKind::Normal => {
                // Outline goes first so its stroke lands under the cluster's dots.
                if mp.kind == MilepostKind::MajorCity
                    && clusters.is_first_cell_of_cluster(board, mp)
                {
                    primitives.push(major_city_outline(id, x, y, &delta));
                }
                primitives.push(milepost_dot(id, x, y));
            }
            MilepostKind::Terrain(name) => match glyphs.glyph_size(name) {
                Some(size) => primitives.push(terrain_glyph(id, name, x, y, size)),
                None => {
                    let err = ClientError::UnknownMilepostKind(name.clone());
                    warn!(milepost = %id, "{err}; skipping");
                    skipped.push(SkippedMilepost {
                        id,
                        kind: name.clone(),
                    });
                }
            },
        }
    }

    Ok(Scene {
        primitives,
        skipped,
        fingerprint: board.fingerprint(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardLayout;

    fn layout(columns: usize, rows: usize) -> BoardLayout {
        BoardLayout {
            width: columns as f64 * 10.0,
            height: rows as f64 * 10.0,
            column_count: columns,
            row_count: rows,
            left_offset: 0.0,
            top_offset: 0.0,
        }
    }

    fn glyphs() -> HashMap<String, (f64, f64)> {
        HashMap::from([("DESERT".to_string(), (200.0, 100.0))])
    }

    fn center(p: &Primitive) -> (f64, f64) {
        match &p.shape {
            Shape::Circle { cx, cy, .. } => (*cx, *cy),
            Shape::Glyph {
                translate_x,
                translate_y,
                scale,
                width,
                height,
                ..
            } => (
                translate_x + width * scale / 2.0,
                translate_y + height * scale / 2.0,
            ),
            Shape::Outline { points, .. } => points[0],
        }
    }

    fn mixed_board() -> Board {
        use MilepostKind::*;
        let kinds = vec![
            Normal,
            City,
            Blank,
            Terrain("DESERT".into()),
            Normal,
            Blank,
            Terrain("DESERT".into()),
            City,
            Normal,
            Normal,
            City,
            Normal,
        ];
        Board::from_kinds(layout(4, 3), kinds).unwrap()
    }

    #[test]
    fn normal_milepost_lands_on_grid_position() {
        let mut kinds = vec![MilepostKind::Blank; 100];
        kinds[12] = MilepostKind::Normal; // column 2, row 1
        let board = Board::from_kinds(layout(10, 10), kinds).unwrap();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        assert_eq!(scene.len(), 1);
        let p = &scene.primitives()[0];
        assert_eq!(p.id, MilepostId::new(2, 1));
        assert_eq!(
            p.shape,
            Shape::Circle {
                cx: 25.0,
                cy: 10.0,
                radius: MILEPOST_RADIUS,
                fill: MILEPOST_BLACK,
                stroke: None,
            }
        );
    }

    #[test]
    fn city_is_large_red_circle() {
        let board = Board::from_kinds(layout(1, 1), vec![MilepostKind::City]).unwrap();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        let Shape::Circle {
            radius,
            fill,
            stroke,
            ..
        } = &scene.primitives()[0].shape
        else {
            panic!("expected circle");
        };
        assert_eq!(*radius, CITY_RADIUS);
        assert_eq!(*fill, CITY_RED);
        assert_eq!(stroke.map(|s| s.color), Some(CITY_RED));
    }

    #[test]
    fn single_cell_board() {
        let board = Board::from_kinds(layout(1, 1), vec![MilepostKind::Normal]).unwrap();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(center(&scene.primitives()[0]), (0.0, 0.0));

        let blank = Board::from_kinds(layout(1, 1), vec![MilepostKind::Blank]).unwrap();
        assert!(render(&blank, &glyphs(), &CityClusterOracle).unwrap().is_empty());
    }

    #[test]
    fn glyph_is_centered_on_milepost() {
        let board =
            Board::from_kinds(layout(1, 1), vec![MilepostKind::Terrain("DESERT".into())]).unwrap();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        let Shape::Glyph {
            translate_x,
            translate_y,
            scale,
            ..
        } = &scene.primitives()[0].shape
        else {
            panic!("expected glyph");
        };
        assert_eq!(*scale, GLYPH_SCALE);
        assert!((translate_x - -3.5).abs() < 1e-9);
        assert!((translate_y - -1.75).abs() < 1e-9);
    }

    #[test]
    fn missing_glyph_skips_only_that_milepost() {
        use MilepostKind::*;
        let kinds = vec![Normal, Terrain("SWAMP".into()), City, Terrain("DESERT".into())];
        let board = Board::from_kinds(layout(2, 2), kinds).unwrap();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        assert_eq!(scene.len(), 3);
        assert_eq!(
            scene.skipped(),
            &[SkippedMilepost {
                id: MilepostId::new(1, 0),
                kind: "SWAMP".into(),
            }]
        );
    }

    #[test]
    fn major_city_block_gets_one_outline_and_four_dots() {
        use MilepostKind::*;
        let kinds = vec![
            Normal, Normal, Normal, Normal, //
            Normal, MajorCity, MajorCity, Normal, //
            Normal, MajorCity, MajorCity, Normal, //
            Normal, Normal, Normal, Normal,
        ];
        let board = Board::from_kinds(layout(4, 4), kinds).unwrap();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();

        let outlines: Vec<_> = scene
            .primitives()
            .iter()
            .filter(|p| matches!(p.shape, Shape::Outline { .. }))
            .collect();
        assert_eq!(outlines.len(), 1);
        assert_eq!(outlines[0].id, MilepostId::new(1, 1));
        let Shape::Outline { points, stroke } = &outlines[0].shape else {
            unreachable!();
        };
        // (1, 1) is on an odd row: x = 10 + 5.
        assert_eq!(points.len(), 7);
        assert_eq!(points[0], (15.0, 10.0));
        assert_eq!(points[2], (30.0, 20.0));
        assert_eq!(points[5], (10.0, 20.0));
        assert_eq!(points[0], points[6]);
        assert_eq!(stroke.color, CITY_RED);

        let cluster_dots = scene
            .primitives()
            .iter()
            .filter(|p| board.milepost_at(p.id).map(|m| &m.kind) == Some(&MajorCity))
            .filter(|p| matches!(p.shape, Shape::Circle { radius, .. } if radius == MILEPOST_RADIUS))
            .count();
        assert_eq!(cluster_dots, 4);

        // Outline precedes the dot of its own cell.
        let anchor: Vec<_> = scene
            .primitives()
            .iter()
            .filter(|p| p.id == MilepostId::new(1, 1))
            .collect();
        assert!(matches!(anchor[0].shape, Shape::Outline { .. }));
        assert!(matches!(anchor[1].shape, Shape::Circle { .. }));
    }

    #[test]
    fn named_clusters_use_city_identity() {
        use MilepostKind::*;
        let mut mileposts: Vec<Milepost> = [Normal, MajorCity, MajorCity, MajorCity]
            .into_iter()
            .enumerate()
            .map(|(i, k)| Milepost::new(k, i % 2, i / 2))
            .collect();
        // Two separate cities touching diagonally.
        mileposts[1] = mileposts[1].clone().with_city("Lagos");
        mileposts[2] = mileposts[2].clone().with_city("Accra");
        mileposts[3] = mileposts[3].clone().with_city("Lagos");
        let board = Board::new(layout(2, 2), mileposts).unwrap();
        let firsts: Vec<_> = board
            .mileposts()
            .iter()
            .filter(|mp| CityClusterOracle.is_first_cell_of_cluster(&board, mp))
            .map(|mp| mp.id())
            .collect();
        assert_eq!(firsts, vec![MilepostId::new(1, 0), MilepostId::new(0, 1)]);
    }

    #[test]
    fn every_clickable_primitive_resolves_to_its_milepost() {
        let board = mixed_board();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        for p in scene.primitives().iter().filter(|p| p.is_clickable()) {
            // Identifier survives the string form used by the canvas layer.
            let parsed: MilepostId = p.id.to_string().parse().unwrap();
            let (cx, cy) = center(p);
            let hit = scene.hit_test(cx, cy).unwrap();
            assert_eq!(hit, parsed);
            assert_eq!(scene.primitive(hit), Some(p));
            let mp = board.milepost_at(hit).unwrap();
            assert_eq!((mp.x, mp.y), (p.id.column, p.id.row));
            assert_ne!(mp.kind, MilepostKind::Blank);
        }
    }

    #[test]
    fn rendering_is_idempotent() {
        let board = mixed_board();
        let a = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        let b = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), board.fingerprint());
    }

    #[test]
    fn hit_test_misses_empty_space() {
        let board = mixed_board();
        let scene = render(&board, &glyphs(), &CityClusterOracle).unwrap();
        // (2, 0) is blank.
        assert_eq!(scene.hit_test(20.0, 0.0), None);
        assert_eq!(scene.hit_test(-50.0, -50.0), None);
    }
}
