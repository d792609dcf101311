pub mod app;
pub mod autosave;
pub mod block_editor;
pub mod blocks;
pub mod chart;
pub mod chart_editor;
pub mod markdown;
pub mod markdown_editor;
pub mod render;
pub mod store;
