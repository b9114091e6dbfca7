mod demo;
mod list;
mod reveal;

pub use demo::demo_source;
pub use list::list;
pub use reveal::reveal;
