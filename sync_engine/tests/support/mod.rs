pub mod fake_panel;
pub mod prepare_env;

pub use fake_panel::FakePanel;
pub use prepare_env::{prepare_test_env, random_db_path};
