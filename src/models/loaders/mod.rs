pub mod toml_loader;

pub use toml_loader::{load_bank_fixture, load_blueprint, load_replay_answers};
