//! Prints a bearer token for a user id, for manual testing against a running server.

use points_ledger_backend::{
    auth::AccessGate,
    config::{self, Config},
};
use uuid::Uuid;

fn main() {
    config::load_env();

    let Some(raw) = std::env::args().nth(1) else {
        eprintln!("Usage: issue-token <user_id>");
        eprintln!("Example: issue-token 550e8400-e29b-41d4-a716-446655440000");
        std::process::exit(1);
    };

    let user_id = match Uuid::parse_str(&raw) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: Invalid UUID format: {e}");
            std::process::exit(1);
        }
    };

    let ttl = match config::get_env_or("JWT_MAXAGE", Config::DEFAULT_JWT_MAXAGE_MINUTES) {
        Ok(ttl) => ttl,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let gate = AccessGate::new(config::jwt_secret_from_env().as_bytes(), ttl);

    match gate.issue(user_id) {
        Ok(token) => {
            println!("Generated token for user {user_id}:");
            println!("{token}");
        }
        Err(e) => {
            eprintln!("Error generating token: {e}");
            std::process::exit(1);
        }
    }
}
