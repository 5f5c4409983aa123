//! Replaces the game's pawn name generator with one that draws names from a CSV file.
//!
//! When the library is loaded, the names are read from the database in the mod folder and the
//! game's generator is patched to jump to [`host::generate_pawn_name`].

pub mod error;
pub mod hook;
pub mod host;
pub mod logging;
pub mod names;
pub mod resources;
pub mod settings;

#[cfg(all(not(test), feature = "inject"))]
#[ctor::ctor]
fn load() {
    if let Err(err) = host::init() {
        logging::report_startup_failure(&err, &resources::get_mod_path("STARTUP_ERROR.txt"));
    }
}
