mod delete;
mod index;
mod r#move;
mod scan;
mod serve;

pub use delete::DeleteArgs;
pub use index::IndexArgs;
pub use r#move::MoveArgs;
pub use scan::ScanArgs;
pub use serve::ServeArgs;
