pub mod names;

pub use names::{CacheStats, NameCache, NameKey, NameState, ResolvedName};
