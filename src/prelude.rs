pub use crate::{Error, Result};

pub use crate::geometry::*;

pub use crate::builder::{BuildConfig, BuildOutcome, TileBuilder, TileFormat, TileKind};
pub use crate::cache::{Block, BlockCache};
pub use crate::elevation::ElevationSource;
pub use crate::index::SourceIndex;
pub use crate::pool::TaskPool;
