//! Test utilities shared across test modules

use crate::paths::Paths;
use crate::store::Store;
use tempfile::TempDir;

/// Create a Paths struct rooted at a temporary home directory
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::from_home(temp_dir.path())
}

/// Build a store holding the given (name, url, token) triples in order
pub fn store_with(profiles: &[(&str, &str, &str)]) -> Store {
    let mut store = Store::default();
    for (name, url, token) in profiles {
        store.add_or_update(name, url, token);
    }
    store
}
