#[tokio::main]
async fn main() -> std::io::Result<()> {
    snake_battle_server::run_with_config().await
}
