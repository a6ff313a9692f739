pub mod assets;
pub mod storage;
pub mod template;
