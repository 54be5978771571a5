pub mod editing;
pub mod error;
pub mod exchange;
pub mod ids;
pub mod io;
pub mod model;
pub mod node;
pub mod schema;

// Re-export key types for easier usage
pub use editing::{BlockEditor, EditorEvent, EditorOptions, IdStrategy, Patch, Placement};
pub use error::{EngineError, Result};
pub use model::{Block, InlineContent, PartialBlock, StyledText, Styles};
pub use schema::{BlockType, ChildrenType};
