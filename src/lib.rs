//! Parser and skeletal animation runtime for legacy `MD20` character models.
//!
//! Bytes go through [`model::parse_model`] once; the resulting [`Model`] and
//! an optional [`KeyframeStore`] form a shared [`ModelAsset`]. Each
//! [`ModelInstance`] advances its own clocks and recomputes bone matrices
//! every tick.

pub mod animation;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod geoset;
pub mod instance;
pub mod loader;
pub mod math;
pub mod mesh;
pub mod model;
pub mod reader;

pub use animation::{AnimationFile, AnimationState, KeyframeStore, Skeleton};
pub use config::LoaderConfig;
pub use error::{AnimationError, LoadError, ParseError};
pub use instance::{ModelAsset, ModelInstance};
pub use loader::{load_asset, load_model};
pub use model::{parse_model, Model};
