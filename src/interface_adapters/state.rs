use crate::use_cases::GameHandle;

#[derive(Clone)]
pub struct AppState {
    // Channels into and out of the single game world.
    pub game: GameHandle,
    // Queue size for per-connection replies.
    pub direct_channel_capacity: usize,
}
