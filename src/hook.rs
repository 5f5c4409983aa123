//! Redirects functions by overwriting the start of their compiled code with a jump to a
//! replacement.
//!
//! Patches are destructive. The bytes at the source entry point are lost, so there is no way to
//! call the original implementation or remove a patch once it has been written.

pub mod patch;
pub mod resolve;

use patch::{AddressWidth, CodeWriter, JumpPatch, ProtectedWriter, RawFunctionAddress};
use resolve::{FunctionRef, FunctionResolver};

use crate::error::Error;

/// One completed redirection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptRecord {
    pub source: String,
    pub destination: String,
}

/// The redirections that have been made, in the order they were made.
#[derive(Clone, Debug, Default)]
pub struct InterceptRegistry {
    records: Vec<InterceptRecord>,
}

impl InterceptRegistry {
    /// Returns the destination that `source` was most recently redirected to, if any.
    pub fn destination_of(&self, source: &str) -> Option<&str> {
        self.records
            .iter()
            .rev()
            .find(|record| record.source == source)
            .map(|record| record.destination.as_str())
    }

    /// Adds a record. If the source had already been redirected, the previous destination is
    /// returned.
    pub fn push(&mut self, record: InterceptRecord) -> Option<String> {
        let previous = self.destination_of(&record.source).map(str::to_string);
        self.records.push(record);
        previous
    }

    pub fn records(&self) -> &[InterceptRecord] {
        &self.records
    }
}

/// Installs redirections between functions found through a resolver.
pub struct Interceptor<R, W = ProtectedWriter> {
    resolver: R,
    writer: W,
    width: AddressWidth,
    registry: InterceptRegistry,
}

impl<R: FunctionResolver> Interceptor<R> {
    /// Creates an interceptor that patches this process's code.
    pub fn new(resolver: R) -> Interceptor<R> {
        Interceptor::with_writer(resolver, ProtectedWriter, AddressWidth::native())
    }
}

impl<R, W> Interceptor<R, W>
where
    R: FunctionResolver,
    W: CodeWriter,
{
    pub fn with_writer(resolver: R, writer: W, width: AddressWidth) -> Interceptor<R, W> {
        Interceptor {
            resolver,
            writer,
            width,
            registry: InterceptRegistry::default(),
        }
    }

    pub fn registry(&self) -> &InterceptRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn resolve(&self, function: &FunctionRef) -> Option<RawFunctionAddress> {
        let resolved = self
            .resolver
            .resolve(&function.type_name, &function.method_name);

        if resolved.is_none() {
            log::error!("{}", Error::Unresolved(function.to_string()));
        }

        resolved
    }

    /// Redirects every future call to `source` to `destination`. Returns `false` if either
    /// function can't be resolved or the patch can't be written, in which case `source` is left
    /// untouched.
    ///
    /// Redirecting a function that was already redirected logs a warning and then replaces the
    /// earlier redirection.
    ///
    /// # Safety
    ///
    /// Both functions must be compiled functions with the same signature and calling convention.
    /// `source` must be at least as long as the patch for this interceptor's address width, and no
    /// thread may be executing it while it is patched.
    pub unsafe fn install(&mut self, source: &FunctionRef, destination: &FunctionRef) -> bool {
        let (source_addr, destination_addr) =
            match (self.resolve(source), self.resolve(destination)) {
                (Some(s), Some(d)) => (s, d),
                _ => return false,
            };

        let record = InterceptRecord {
            source: source.identity(source_addr),
            destination: destination.identity(destination_addr),
        };

        if let Some(previous) = self.registry.destination_of(&record.source) {
            log::warn!(
                "Source function '{}' was previously redirected to '{}'",
                record.source,
                previous
            );
        }

        let patch = JumpPatch::encode(
            self.width,
            source_addr.address(),
            destination_addr.address(),
        );

        if let Err(err) = self.writer.write(source_addr.address(), patch.bytes()) {
            log::error!("Unable to redirect '{}': {}", record.source, err);
            return false;
        }

        log::info!("Redirected '{}' to '{}'", record.source, record.destination);
        self.registry.push(record);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::logging::capture;
    use log::Level;
    use resolve::SymbolTable;
    use std::cell::RefCell;

    /// Remembers writes instead of touching memory.
    #[derive(Default)]
    struct RecordingWriter {
        writes: RefCell<Vec<(u64, Vec<u8>)>>,
    }

    impl CodeWriter for &RecordingWriter {
        unsafe fn write(&self, address: u64, bytes: &[u8]) -> Result<()> {
            self.writes.borrow_mut().push((address, bytes.to_vec()));
            Ok(())
        }
    }

    struct FailingWriter;

    impl CodeWriter for FailingWriter {
        unsafe fn write(&self, _: u64, _: &[u8]) -> Result<()> {
            Err(Error::UnsupportedArch)
        }
    }

    fn table(width: AddressWidth) -> SymbolTable {
        let mut table = SymbolTable::new();
        table.insert(
            FunctionRef::new("Game", "source"),
            RawFunctionAddress::new(0x1000, width),
        );
        table.insert(
            FunctionRef::new("Mod", "first"),
            RawFunctionAddress::new(0x2000, width),
        );
        table.insert(
            FunctionRef::new("Mod", "second"),
            RawFunctionAddress::new(0x3000, width),
        );
        table
    }

    #[test]
    fn narrow_install_writes_relative_jump() {
        let writer = RecordingWriter::default();
        let mut interceptor =
            Interceptor::with_writer(table(AddressWidth::Narrow), &writer, AddressWidth::Narrow);

        let installed = unsafe {
            interceptor.install(&FunctionRef::new("Game", "source"), &FunctionRef::new("Mod", "first"))
        };

        assert!(installed);
        assert_eq!(
            writer.writes.borrow().as_slice(),
            &[(0x1000, vec![0xe9, 0xfb, 0x0f, 0x00, 0x00])]
        );
        assert_eq!(
            interceptor.registry().records(),
            &[InterceptRecord {
                source: "Game.source @ 0x00001000".to_string(),
                destination: "Mod.first @ 0x00002000".to_string(),
            }]
        );
    }

    #[test]
    fn wide_install_writes_absolute_jump() {
        let writer = RecordingWriter::default();
        let mut interceptor =
            Interceptor::with_writer(table(AddressWidth::Wide), &writer, AddressWidth::Wide);

        assert!(unsafe {
            interceptor.install(&FunctionRef::new("Game", "source"), &FunctionRef::new("Mod", "second"))
        });

        let writes = writer.writes.borrow();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, 0x1000);
        assert_eq!(
            writes[0].1,
            vec![0x48, 0xb8, 0x00, 0x30, 0, 0, 0, 0, 0, 0, 0xff, 0xe0]
        );
    }

    #[test]
    fn unresolved_functions_are_not_patched() {
        let writer = RecordingWriter::default();
        let mut interceptor =
            Interceptor::with_writer(table(AddressWidth::Wide), &writer, AddressWidth::Wide);

        let missing_source = unsafe {
            interceptor.install(&FunctionRef::new("Game", "missing"), &FunctionRef::new("Mod", "first"))
        };
        let missing_destination = unsafe {
            interceptor.install(&FunctionRef::new("Game", "source"), &FunctionRef::new("Mod", "missing"))
        };

        assert!(!missing_source);
        assert!(!missing_destination);
        assert!(writer.writes.borrow().is_empty());
        assert!(interceptor.registry().records().is_empty());
    }

    #[test]
    fn failed_write_is_not_recorded() {
        let mut interceptor =
            Interceptor::with_writer(table(AddressWidth::Wide), FailingWriter, AddressWidth::Wide);

        let installed = unsafe {
            interceptor.install(&FunctionRef::new("Game", "source"), &FunctionRef::new("Mod", "first"))
        };

        assert!(!installed);
        assert!(interceptor.registry().records().is_empty());
    }

    #[test]
    fn repatching_replaces_destination() {
        let writer = RecordingWriter::default();
        let mut interceptor =
            Interceptor::with_writer(table(AddressWidth::Narrow), &writer, AddressWidth::Narrow);

        let source = FunctionRef::new("Game", "source");

        unsafe {
            assert!(interceptor.install(&source, &FunctionRef::new("Mod", "first")));
            assert!(interceptor.install(&source, &FunctionRef::new("Mod", "second")));
        }

        let writes = writer.writes.borrow();
        assert_eq!(writes.len(), 2);

        // 0x3000 - 0x1000 - 5
        assert_eq!(writes[1].1, vec![0xe9, 0xfb, 0x1f, 0x00, 0x00]);

        assert_eq!(
            interceptor.registry().destination_of("Game.source @ 0x00001000"),
            Some("Mod.second @ 0x00003000")
        );
    }

    #[test]
    fn each_repatch_warns_once_with_previous_destination() {
        let writer = RecordingWriter::default();
        let mut interceptor =
            Interceptor::with_writer(table(AddressWidth::Narrow), &writer, AddressWidth::Narrow);

        let source = FunctionRef::new("Game", "source");
        let first = FunctionRef::new("Mod", "first");
        let second = FunctionRef::new("Mod", "second");

        let warnings = |logged: Vec<(Level, String)>| -> Vec<String> {
            logged
                .into_iter()
                .filter(|(level, _)| *level == Level::Warn)
                .map(|(_, text)| text)
                .collect()
        };

        let (installed, logged) = capture::records(|| unsafe { interceptor.install(&source, &first) });
        assert!(installed);
        assert!(warnings(logged).is_empty());

        let (installed, logged) =
            capture::records(|| unsafe { interceptor.install(&source, &second) });
        assert!(installed);
        assert_eq!(
            warnings(logged),
            vec!["Source function 'Game.source @ 0x00001000' was previously redirected to \
                  'Mod.first @ 0x00002000'"
                .to_string()]
        );

        let (installed, logged) = capture::records(|| unsafe { interceptor.install(&source, &first) });
        assert!(installed);
        assert_eq!(
            warnings(logged),
            vec!["Source function 'Game.source @ 0x00001000' was previously redirected to \
                  'Mod.second @ 0x00003000'"
                .to_string()]
        );
    }

    #[test]
    fn registry_reports_previous_destination_once() {
        let mut registry = InterceptRegistry::default();

        let first = registry.push(InterceptRecord {
            source: "a".to_string(),
            destination: "b".to_string(),
        });
        let second = registry.push(InterceptRecord {
            source: "a".to_string(),
            destination: "c".to_string(),
        });
        let other = registry.push(InterceptRecord {
            source: "x".to_string(),
            destination: "b".to_string(),
        });

        assert_eq!(first, None);
        assert_eq!(second.as_deref(), Some("b"));
        assert_eq!(other, None);
        assert_eq!(registry.records().len(), 3);
    }
}
