use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// 128 random bits as 32 lowercase hex chars. Identifies a player inside one lobby.
pub fn generate_session_id() -> String {
    let mut rng = ChaCha8Rng::from_os_rng();
    format!("{:032x}", rng.random::<u128>())
}
