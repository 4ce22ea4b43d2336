//! vintf-core: the VINTF data model.
//!
//! Versioned HAL names, declared instances, the manifest and compatibility
//! matrix documents, runtime facts and device properties consumed by the
//! reconciliation engine in `vintf-analyze`.
//!
//! # Public API
//!
//! - [`VersionedName`] / [`Version`] -- `package@major.minor` and its ordering
//! - [`FqName`] / [`FqInstance`] -- fully-qualified interface and instance names
//! - [`DeclaredInstance`] -- one declared (version, interface, instance) surface
//! - [`ManifestDocument`] / [`MatrixDocument`] -- the documents being reconciled
//! - [`RuntimeFacts`], [`DeviceProperties`], [`HashCatalog`]
//! - [`CoreError`] -- structural failures

pub mod error;
pub mod fqname;
pub mod hashes;
pub mod instance;
pub mod level;
pub mod manifest;
pub mod matrix;
pub mod properties;
pub mod runtime;
pub mod version;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::CoreError;
pub use fqname::{flat_instance_name, sanitize_case_name, FqInstance, FqName, IBASE_DESCRIPTOR};
pub use hashes::{is_empty_hash, FlatModuleMetadata, HashCatalog, NOT_FROZEN_HASH};
pub use instance::{
    DeclaredInstance, HalFormat, Partition, SchemaType, Transport, DEFAULT_FLAT_RPC_VERSION,
    FLAT_RPC_MAJOR,
};
pub use level::{
    check_target_fcm_version, hidl_package_limit, LevelError, FCM_LEVEL_R, FCM_LEVEL_T, FCM_LEVEL_U,
    FCM_LEVEL_V, VNDK_FIRST_API_LEVEL, VNDK_LAST_VERSION,
};
pub use manifest::{HalInterface, ManifestDocument, ManifestHal};
pub use matrix::{
    AvbRequirement, KernelRequirement, MatrixDocument, MatrixHal, SepolicyRequirement,
    VersionRange,
};
pub use properties::DeviceProperties;
pub use runtime::{KernelVersion, RuntimeFacts};
pub use version::{Version, VersionedName, MAX_MINOR_VERSION};

/// True iff the package is an Android platform package (`android.` prefix).
pub fn is_platform_package(package: &str) -> bool {
    package.starts_with("android.")
}
