//! Async fetch-then-parse. Reading is async; decoding runs on the blocking
//! pool so a large model never stalls the runtime. Dropping the returned
//! future abandons the load.

use std::{path::Path, sync::Arc};

use log::debug;

use crate::{
    animation::KeyframeStore,
    broadcast::send_progress,
    config::LoaderConfig,
    error::LoadError,
    instance::ModelAsset,
    model::{parse_model, Model},
};

async fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub async fn load_model(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Model, LoadError> {
    let path = path.as_ref();
    let label = path.display().to_string();

    send_progress(&label, "reading", 1, 3);
    let buf = read_file(path).await?;
    debug!("read {} bytes from {}", buf.len(), label);

    send_progress(&label, "parsing", 2, 3);
    let config = config.clone();
    let model = tokio::task::spawn_blocking(move || parse_model(&buf, &config)).await??;

    send_progress(&label, "done", 3, 3);
    Ok(model)
}

pub async fn load_animation(path: impl AsRef<Path>) -> Result<KeyframeStore, LoadError> {
    let path = path.as_ref();
    let buf = read_file(path).await?;
    let store = tokio::task::spawn_blocking(move || KeyframeStore::from_bytes(&buf)).await??;
    Ok(store)
}

/// Load a model and, optionally, its converted animation file into a
/// shareable asset.
pub async fn load_asset(
    model_path: impl AsRef<Path>,
    animation_path: Option<&Path>,
    config: &LoaderConfig,
) -> Result<Arc<ModelAsset>, LoadError> {
    let model = load_model(model_path, config).await?;
    let animation = match animation_path {
        Some(path) => Some(load_animation(path).await?),
        None => None,
    };
    Ok(ModelAsset::new(model, animation)?)
}
