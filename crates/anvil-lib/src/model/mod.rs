pub mod assets;
pub mod package;
pub mod version;
