//! Nothing runs at load time unless the `inject` feature is on, so this binary starts with the
//! mod folder unresolved.

use csv_name_bank::logging;
use csv_name_bank::resources::{self, DIR_VAR};

#[cfg(not(feature = "inject"))]
#[test]
fn loading_the_library_does_not_start_the_mod() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(DIR_VAR, dir.path());

    assert_eq!(resources::find_mod_dir_path(), dir.path());
    assert!(!logging::is_running());
    assert!(!dir.path().join("csv_name_bank.log").exists());
}
