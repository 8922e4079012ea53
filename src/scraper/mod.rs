mod extractor;
mod record;

pub use extractor::Extractor;
pub use record::{canonical_key, ItemRecord};
