//! Finding the entry points of functions by name.

use dlopen::symbor::Library;
use std::collections::HashMap;
use std::sync::Mutex;

use super::patch::{AddressWidth, RawFunctionAddress};

/// Names a function by the type (or library) that declares it and its own name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub type_name: String,
    pub method_name: String,
}

impl FunctionRef {
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> FunctionRef {
        FunctionRef {
            type_name: type_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Builds the identity string for this function at `address`. This is what the interceptor
    /// records and logs.
    pub fn identity(&self, address: RawFunctionAddress) -> String {
        format!(
            "{}.{} @ 0x{:0width$X}",
            self.type_name,
            self.method_name,
            address.address(),
            width = address.width().bytes() * 2
        )
    }
}

impl std::fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method_name)
    }
}

/// Resolves functions to their compiled entry points.
pub trait FunctionResolver {
    /// Returns the entry point of `type_name.method_name`, or `None` if it can't be found.
    fn resolve(&self, type_name: &str, method_name: &str) -> Option<RawFunctionAddress>;
}

/// Tries the first resolver, then the second.
impl<A, B> FunctionResolver for (A, B)
where
    A: FunctionResolver,
    B: FunctionResolver,
{
    fn resolve(&self, type_name: &str, method_name: &str) -> Option<RawFunctionAddress> {
        self.0
            .resolve(type_name, method_name)
            .or_else(|| self.1.resolve(type_name, method_name))
    }
}

/// A table of functions that were registered explicitly.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<FunctionRef, RawFunctionAddress>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Adds a function to the table, replacing any previous entry for the same name.
    pub fn insert(&mut self, function: FunctionRef, address: RawFunctionAddress) {
        self.entries.insert(function, address);
    }

    /// Adds a function from this process.
    pub fn insert_native(&mut self, function: FunctionRef, address: usize) {
        self.insert(function, RawFunctionAddress::native(address));
    }
}

impl FunctionResolver for SymbolTable {
    fn resolve(&self, type_name: &str, method_name: &str) -> Option<RawFunctionAddress> {
        self.entries
            .get(&FunctionRef::new(type_name, method_name))
            .copied()
    }
}

/// Looks up exported symbols in dynamic libraries. The type name is treated as the path of the
/// library, with an empty path meaning the executable itself.
#[derive(Default)]
pub struct LibraryResolver {
    // Libraries stay open so that anything we resolved stays mapped.
    libraries: Mutex<HashMap<String, Library>>,
}

impl LibraryResolver {
    pub fn new() -> LibraryResolver {
        LibraryResolver::default()
    }

    fn open(path: &str) -> Option<Library> {
        let library = if path.is_empty() {
            Library::open_self()
        } else {
            Library::open(path)
        };

        match library {
            Ok(library) => Some(library),
            Err(err) => {
                log::error!("Failed to open library '{}': {}", path, err);
                None
            }
        }
    }
}

impl FunctionResolver for LibraryResolver {
    fn resolve(&self, type_name: &str, method_name: &str) -> Option<RawFunctionAddress> {
        let mut libraries = self
            .libraries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !libraries.contains_key(type_name) {
            libraries.insert(type_name.to_string(), LibraryResolver::open(type_name)?);
        }

        let library = libraries.get(type_name)?;
        let symbol = unsafe { library.symbol::<*const ()>(method_name) };

        match symbol {
            Ok(symbol) if !symbol.is_null() => Some(RawFunctionAddress::new(
                *symbol as usize as u64,
                AddressWidth::native(),
            )),

            Ok(_) => None,

            Err(err) => {
                log::debug!("Symbol '{}' not found in '{}': {}", method_name, type_name, err);
                None
            }
        }
    }
}
