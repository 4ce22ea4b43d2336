//! vintf-registry: the collaborators a verification run reads from.
//!
//! Traits for the document providers and the live service registry, a
//! deadline-bounded lookup wrapper, an in-memory registry and the JSON
//! device snapshot that implements every provider.

mod error;
mod lookup;
mod memory;
mod snapshot;
mod traits;

pub use error::RegistryError;
pub use lookup::{BoundedLookup, LookupConfig, LookupOutcome, DEFAULT_LOOKUP_TIMEOUT};
pub use memory::{InMemoryRegistry, StaticHandle};
pub use snapshot::{DeviceSnapshot, ServiceEntry};
pub use traits::{HalHandle, ManifestProvider, MatrixProvider, RuntimeInfoProvider, ServiceRegistry};
