pub mod input;
pub mod normalize;
pub mod parse;
pub mod types;

pub use normalize::normalize_rows;
pub use parse::parse_frame;
pub use types::{ColumnMapping, DroppedRows, NormalizedLedger, RawGlRow, Transaction};
