// Pure simulation rules; orchestration lives in the use-case layer.

pub mod bomb;
pub mod magnet;
pub mod movement;
pub mod projectiles;
