//! Object stores holding dropped files

pub mod folder;
pub mod http;
pub mod traits;

pub use folder::FolderStore;
pub use http::HttpStore;
pub use traits::ObjectStore;
