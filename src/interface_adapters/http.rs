// Shared HTTP response types.

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub player_count: usize,
    pub game_running: bool,
}
