use std::sync::OnceLock;

use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastMessage {
    /// (asset path, stage, step, total steps)
    ModelLoadingUpdate(String, String, u32, u32),
}

static BROADCASTER: OnceLock<broadcast::Sender<BroadcastMessage>> = OnceLock::new();

pub fn get_broadcaster() -> broadcast::Sender<BroadcastMessage> {
    BROADCASTER
        .get_or_init(|| broadcast::channel(100).0)
        .clone()
}

/// Publish a loading step. Having no subscribers is not an error.
pub fn send_progress(path: &str, stage: &str, step: u32, total: u32) {
    let _ = get_broadcaster().send(BroadcastMessage::ModelLoadingUpdate(
        path.to_string(),
        stage.to_string(),
        step,
        total,
    ));
}
