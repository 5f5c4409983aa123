//! Connects the mod to the game: loads the names, then redirects the game's name generator to
//! `generate_pawn_name`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

use eyre::Result;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use strum::IntoEnumIterator;

use crate::hook::resolve::{FunctionRef, LibraryResolver, SymbolTable};
use crate::hook::{InterceptRegistry, Interceptor};
use crate::logging;
use crate::names::bank::NameBank;
use crate::names::database;
use crate::names::generate::{self, Name, NameStyle, NameUseChecker};
use crate::names::random::Xorshift;
use crate::names::{Gender, NameRecord};
use crate::resources;
use crate::settings::Settings;

/// The name we publish our replacement function under.
pub const MOD_TYPE_NAME: &str = "CSVNameBank";
pub const REPLACEMENT_NAME: &str = "generate_pawn_name";

const KIND_TRIPLE: u8 = 0;
const KIND_SINGLE: u8 = 1;

/// A name handed back to the game. The strings are owned by the mod and stay valid for the rest
/// of the process.
#[repr(C)]
#[derive(Debug)]
pub struct RawName {
    /// `0` for a first/nick/last triple, `1` for a single name in `first`.
    pub kind: u8,
    pub numerical: bool,
    pub first: *const c_char,
    pub nick: *const c_char,
    pub last: *const c_char,
}

struct CNameRecord {
    first: CString,
    nick: CString,
    last: CString,
}

impl CNameRecord {
    fn new(record: &NameRecord) -> crate::error::Result<CNameRecord> {
        Ok(CNameRecord {
            first: CString::new(record.first())?,
            nick: CString::new(record.nick())?,
            last: CString::new(record.last())?,
        })
    }
}

/// Everything the replacement needs while the game is running.
pub struct ModState {
    bank: NameBank<Gender>,
    fallback_gender: Gender,
    interned: HashMap<NameRecord, CNameRecord>,
    singles: HashMap<String, CString>,
    redirections: InterceptRegistry,
}

impl ModState {
    pub fn new(bank: NameBank<Gender>, fallback_gender: Gender) -> ModState {
        ModState {
            bank,
            fallback_gender,
            interned: HashMap::new(),
            singles: HashMap::new(),
            redirections: InterceptRegistry::default(),
        }
    }

    /// The redirections that were installed at startup.
    pub fn redirections(&self) -> &InterceptRegistry {
        &self.redirections
    }

    /// Generates a name and converts it to the form the game reads.
    fn generate(
        &mut self,
        gender: u8,
        style: u8,
        kind_label: &str,
        checker: &impl NameUseChecker,
    ) -> crate::error::Result<RawName> {
        let gender = Gender::from_repr(gender).unwrap_or_else(|| {
            log::warn!("Unknown gender code {}, using {}", gender, self.fallback_gender);
            self.fallback_gender
        });

        let style = NameStyle::from_code(style)?;

        match generate::generate(&mut self.bank, gender, style, kind_label, checker)? {
            Name::Triple(record) => {
                if !self.interned.contains_key(&record) {
                    let strings = CNameRecord::new(&record)?;
                    self.interned.insert(record.clone(), strings);
                }

                let strings = &self.interned[&record];

                Ok(RawName {
                    kind: KIND_TRIPLE,
                    numerical: false,
                    first: strings.first.as_ptr(),
                    nick: strings.nick.as_ptr(),
                    last: strings.last.as_ptr(),
                })
            }

            Name::Single { name, numerical } => {
                // The game may keep the pointer, so the string is never freed.
                let name = match self.singles.entry(name) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let strings = CString::new(entry.key().as_str())?;
                        entry.insert(strings)
                    }
                };

                Ok(RawName {
                    kind: KIND_SINGLE,
                    numerical,
                    first: name.as_ptr(),
                    nick: std::ptr::null(),
                    last: std::ptr::null(),
                })
            }
        }
    }
}

static STATE: OnceCell<Mutex<ModState>> = OnceCell::new();

/// Asks the game whether a name is taken, through the callback it passed us.
struct HostChecker(Option<extern "C" fn(*const c_char) -> bool>);

impl NameUseChecker for HostChecker {
    fn is_used(&self, name: &str) -> bool {
        let callback = match self.0 {
            Some(callback) => callback,
            None => return false,
        };

        match CString::new(name) {
            Ok(name) => callback(name.as_ptr()),
            Err(_) => true,
        }
    }
}

/// The replacement for the game's name generator. Writes the name to `out` and returns `true`, or
/// logs the problem and returns `false`.
///
/// # Safety
///
/// `kind_label` must be null or a valid C string, and `out` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn generate_pawn_name(
    gender: u8,
    style: u8,
    kind_label: *const c_char,
    is_used: Option<extern "C" fn(*const c_char) -> bool>,
    out: *mut RawName,
) -> bool {
    if out.is_null() {
        log::error!("generate_pawn_name called without an output pointer");
        return false;
    }

    let state = match STATE.get() {
        Some(state) => state,
        None => {
            log::error!("generate_pawn_name called before the name bank was loaded");
            return false;
        }
    };

    let kind_label = if kind_label.is_null() {
        String::new()
    } else {
        CStr::from_ptr(kind_label).to_string_lossy().into_owned()
    };

    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    match state.generate(gender, style, &kind_label, &HostChecker(is_used)) {
        Ok(name) => {
            out.write(name);
            true
        }

        Err(err) => {
            log::error!("Unable to generate a name: {}", err);
            false
        }
    }
}

/// Loads the name database into a new bank.
pub fn load_bank(settings: &Settings) -> Result<NameBank<Gender>> {
    let rng = match settings.seed {
        Some(seed) => Xorshift::new(seed),
        None => Xorshift::from_clock(),
    };

    let mut bank = NameBank::with_categories(rng, Gender::iter());
    let path = settings.names_path();

    let rows = database::read_rows(&path)?;
    log::info!("Lines found in {:?}: {}", path, rows.len());

    let fallback = settings.fallback_gender;
    bank.load(rows, |row| Gender::from_tag(row.gender(), fallback));

    log::info!(
        "Names added: {}",
        bank.counts()
            .sorted_by_key(|(gender, _)| *gender as u8)
            .map(|(gender, count)| format!("{}: {}", gender, count))
            .join(", ")
    );

    bank.on_reset(|gender, count| {
        log::info!("{} name database reset with {} names", gender, count);
    });

    Ok(bank)
}

/// Sets up the mod. This should be called once, when the library is loaded.
pub fn init() -> Result<()> {
    let (settings, source) = Settings::load();

    logging::init(
        &settings.log_path(),
        resources::get_mod_path("PANIC.txt"),
        settings.log_level.into(),
    )?;

    log::info!("CSV Name Bank {}", env!("CARGO_PKG_VERSION"));
    resources::report_mod_dir();
    source.report();
    log::info!("Settings: {:#?}", settings);

    let mut state = ModState::new(load_bank(&settings)?, settings.fallback_gender);

    let mut table = SymbolTable::new();
    let replacement = FunctionRef::new(MOD_TYPE_NAME, REPLACEMENT_NAME);
    table.insert_native(replacement.clone(), generate_pawn_name as *const () as usize);

    let mut interceptor = Interceptor::new((table, LibraryResolver::new()));
    let target = FunctionRef::new(
        settings.target.library.clone().unwrap_or_default(),
        settings.target.symbol.clone(),
    );

    // Nothing else has called into the game's generator this early.
    if !unsafe { interceptor.install(&target, &replacement) } {
        return Err(eyre::eyre!("unable to redirect {} to {}", target, replacement));
    }

    state.redirections = interceptor.registry().clone();

    STATE
        .set(Mutex::new(state))
        .map_err(|_| eyre::eyre!("the name bank has already been loaded"))?;

    Ok(())
}
