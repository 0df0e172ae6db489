pub mod board;
pub mod colors;
pub mod error;
pub mod geometry;
pub mod protocol;
pub mod scene;
pub mod svg;

pub use board::{Board, BoardLayout, City, MapData, Milepost, MilepostId, MilepostKind};
pub use error::ClientError;
pub use geometry::{GridDelta, milepost_position};
pub use protocol::*;
pub use scene::{CityClusterOracle, ClusterOracle, GlyphCatalog, Primitive, Scene, Shape, render};
pub use svg::ViewBox;
