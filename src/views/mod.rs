pub mod escape;
pub mod page;
pub mod posts;

pub use escape::escape_html;
