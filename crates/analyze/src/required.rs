//! HALs a device must declare where a matrix cannot say so.
//!
//! Matrices cannot express "one of" between HALs, nor a version a device
//! must not declare. Each rule here reads the device manifest only and yields
//! one verdict per rule, or one per problem when a rule fails.

use std::fmt;

use vintf_core::{DeclaredInstance, HalFormat, Version, FCM_LEVEL_R, FCM_LEVEL_T, FCM_LEVEL_U, FCM_LEVEL_V};

use crate::catalog::{expand, Catalog};
use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const CHECK: &str = "required-hals";

const DEFAULT_INSTANCE: &str = "default";

/// A HAL surface a rule looks for in the device manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// `package@major.minor::Interface/default`, or a later minor.
    Versioned {
        package: &'static str,
        version: Version,
        interface: &'static str,
    },
    /// `package.Interface/default` at `min_version` or later.
    Flat {
        package: &'static str,
        min_version: u64,
        interface: &'static str,
    },
    /// A native library of `package` at `major.0`, under any instance.
    Native { package: &'static str, major: u64 },
}

const fn hidl(package: &'static str, major: u64, minor: u64, interface: &'static str) -> Surface {
    Surface::Versioned {
        package,
        version: Version::new(major, minor),
        interface,
    }
}

const fn aidl(package: &'static str, min_version: u64, interface: &'static str) -> Surface {
    Surface::Flat {
        package,
        min_version,
        interface,
    }
}

impl Surface {
    fn matches(&self, declared: &DeclaredInstance) -> bool {
        match *self {
            Surface::Versioned {
                package,
                version,
                interface,
            } => {
                declared.format == HalFormat::VersionedRpc
                    && declared.package() == package
                    && declared.interface == interface
                    && declared.instance == DEFAULT_INSTANCE
                    && declared.name.version.minor_at_least(&version)
            }
            Surface::Flat {
                package,
                min_version,
                interface,
            } => {
                declared.format == HalFormat::FlatRpc
                    && declared.package() == package
                    && declared.interface == interface
                    && declared.instance == DEFAULT_INSTANCE
                    && declared.flat_version() >= min_version
            }
            Surface::Native { package, major } => {
                declared.format == HalFormat::NativeLib
                    && declared.package() == package
                    && declared.name.version == Version::new(major, 0)
            }
        }
    }

    pub fn declared_in(&self, catalog: &Catalog) -> bool {
        catalog.instances.iter().any(|declared| self.matches(declared))
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Versioned {
                package,
                version,
                interface,
            } => write!(f, "{}@{}::{}/{}", package, version, interface, DEFAULT_INSTANCE),
            Surface::Flat {
                package,
                min_version,
                interface,
            } => write!(f, "{}.{}/{} (V{}+)", package, interface, DEFAULT_INSTANCE, min_version),
            Surface::Native { package, major } => write!(f, "native {}@{}.0", package, major),
        }
    }
}

const MAPPER_NATIVE: Surface = Surface::Native {
    package: "mapper",
    major: 5,
};
const MAPPER_4: Surface = hidl("android.hardware.graphics.mapper", 4, 0, "IMapper");
const MAPPER_RETIRED: &[Surface] = &[
    hidl("android.hardware.graphics.mapper", 2, 0, "IMapper"),
    hidl("android.hardware.graphics.mapper", 2, 1, "IMapper"),
];

const HEALTH: &[Surface] = &[
    hidl("android.hardware.health", 2, 0, "IHealth"),
    aidl("android.hardware.health", 1, "IHealth"),
];
const POWER: &[Surface] = &[aidl("android.hardware.power", 0, "IPower")];
const GATEKEEPER: &[Surface] = &[
    hidl("android.hardware.gatekeeper", 1, 0, "IGatekeeper"),
    aidl("android.hardware.gatekeeper", 0, "IGatekeeper"),
];
const COMPOSER: &[Surface] = &[
    hidl("android.hardware.graphics.composer", 2, 1, "IComposer"),
    aidl("android.hardware.graphics.composer3", 1, "IComposer"),
];
const ALLOCATOR: &[Surface] = &[
    hidl("android.hardware.graphics.allocator", 2, 0, "IAllocator"),
    hidl("android.hardware.graphics.allocator", 3, 0, "IAllocator"),
    hidl("android.hardware.graphics.allocator", 4, 0, "IAllocator"),
    aidl("android.hardware.graphics.allocator", 0, "IAllocator"),
];
const THERMAL: &[Surface] = &[
    hidl("android.hardware.thermal", 2, 0, "IThermal"),
    aidl("android.hardware.thermal", 0, "IThermal"),
];
const ALLOCATOR_CURRENT: &[Surface] = &[
    aidl("android.hardware.graphics.allocator", 1, "IAllocator"),
    hidl("android.hardware.graphics.allocator", 4, 0, "IAllocator"),
];
const ALLOCATOR_RETIRED: &[Surface] = &[
    hidl("android.hardware.graphics.allocator", 2, 0, "IAllocator"),
    hidl("android.hardware.graphics.allocator", 3, 0, "IAllocator"),
];

const AUDIO_HIDL_CORE: &[Surface] = &[
    hidl("android.hardware.audio", 5, 0, "IDevicesFactory"),
    hidl("android.hardware.audio", 6, 0, "IDevicesFactory"),
    hidl("android.hardware.audio", 7, 0, "IDevicesFactory"),
    hidl("android.hardware.audio", 7, 1, "IDevicesFactory"),
];
const AUDIO_HIDL_EFFECT: &[Surface] = &[
    hidl("android.hardware.audio.effect", 5, 0, "IEffectsFactory"),
    hidl("android.hardware.audio.effect", 6, 0, "IEffectsFactory"),
    hidl("android.hardware.audio.effect", 7, 0, "IEffectsFactory"),
];
const AUDIO_AIDL_CORE: Surface = aidl("android.hardware.audio.core", 0, "IConfig");
const AUDIO_AIDL_EFFECT: Surface = aidl("android.hardware.audio.effect", 0, "IFactory");

/// The device facts every rule is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Device<'a> {
    pub catalog: &'a Catalog,
    pub low_ram: bool,
}

impl Device<'_> {
    /// Declared target FCM level is `min` or later. Unspecified is never later.
    fn launched_at(&self, min: u64) -> bool {
        self.catalog.target_level.is_some_and(|level| level >= min)
    }

    fn any(&self, surfaces: &[Surface]) -> bool {
        surfaces.iter().any(|s| s.declared_in(self.catalog))
    }

    /// Go devices launching before V are exempt from the graphics rules.
    fn graphics_exempt(&self, min: u64) -> Option<String> {
        if !self.launched_at(min) {
            return Some(format!("required from target FCM level {}", min));
        }
        if self.low_ram && !self.launched_at(FCM_LEVEL_V) {
            return Some(format!("low-RAM devices are exempt before target FCM level {}", FCM_LEVEL_V));
        }
        None
    }
}

enum Outcome {
    Satisfied,
    Skipped(String),
    Failed(Vec<(VerdictKind, String)>),
}

impl Outcome {
    fn from_problems(problems: Vec<(VerdictKind, String)>) -> Self {
        if problems.is_empty() {
            Outcome::Satisfied
        } else {
            Outcome::Failed(problems)
        }
    }
}

fn one_of(surfaces: &[Surface]) -> String {
    let names: Vec<String> = surfaces.iter().map(Surface::to_string).collect();
    format!("one of {} must be declared", names.join(", "))
}

fn require_any(device: &Device<'_>, surfaces: &[Surface], problems: &mut Vec<(VerdictKind, String)>) {
    if !device.any(surfaces) {
        problems.push((VerdictKind::Missing, one_of(surfaces)));
    }
}

fn forbid(device: &Device<'_>, surfaces: &[Surface], problems: &mut Vec<(VerdictKind, String)>) {
    for surface in surfaces.iter().filter(|s| s.declared_in(device.catalog)) {
        problems.push((VerdictKind::VersionMismatch, format!("{} must not be declared", surface)));
    }
}

fn graphics_mapper(device: &Device<'_>) -> Outcome {
    if let Some(reason) = device.graphics_exempt(FCM_LEVEL_R) {
        return Outcome::Skipped(reason);
    }
    let mut problems = Vec::new();
    if device.launched_at(FCM_LEVEL_V) {
        require_any(device, &[MAPPER_NATIVE], &mut problems);
    } else if !MAPPER_NATIVE.declared_in(device.catalog) {
        require_any(device, &[MAPPER_4], &mut problems);
        forbid(device, MAPPER_RETIRED, &mut problems);
    }
    Outcome::from_problems(problems)
}

fn at_level(device: &Device<'_>, min: Option<u64>, surfaces: &[Surface]) -> Outcome {
    if let Some(min) = min.filter(|min| !device.launched_at(*min)) {
        return Outcome::Skipped(format!("required from target FCM level {}", min));
    }
    let mut problems = Vec::new();
    require_any(device, surfaces, &mut problems);
    Outcome::from_problems(problems)
}

fn gralloc_version(device: &Device<'_>) -> Outcome {
    if let Some(reason) = device.graphics_exempt(FCM_LEVEL_T) {
        return Outcome::Skipped(reason);
    }
    let mut problems = Vec::new();
    require_any(device, ALLOCATOR_CURRENT, &mut problems);
    forbid(device, ALLOCATOR_RETIRED, &mut problems);
    Outcome::from_problems(problems)
}

fn audio(device: &Device<'_>) -> Outcome {
    if !device.launched_at(FCM_LEVEL_U) {
        return Outcome::Skipped(format!("required from target FCM level {}", FCM_LEVEL_U));
    }
    let hidl_core = device.any(AUDIO_HIDL_CORE);
    let hidl_effect = device.any(AUDIO_HIDL_EFFECT);
    let aidl_core = AUDIO_AIDL_CORE.declared_in(device.catalog);
    let aidl_effect = AUDIO_AIDL_EFFECT.declared_in(device.catalog);

    let mut problems = Vec::new();
    if hidl_core != hidl_effect {
        problems.push((
            VerdictKind::Incompatible,
            "versioned-RPC audio core and effect HALs must be declared together".to_string(),
        ));
    }
    if aidl_core != aidl_effect {
        problems.push((
            VerdictKind::Incompatible,
            "flat-RPC audio core and effect HALs must be declared together".to_string(),
        ));
    }
    if !hidl_core && !aidl_core {
        problems.push((
            VerdictKind::Missing,
            format!("an audio core HAL must be declared ({} or {})", AUDIO_HIDL_CORE[0], AUDIO_AIDL_CORE),
        ));
    }
    Outcome::from_problems(problems)
}

/// Every rule, in evaluation order.
pub const RULES: &[&str] = &[
    "graphics-mapper",
    "health",
    "power",
    "gatekeeper",
    "composer",
    "gralloc",
    "thermal",
    "gralloc-version",
    "audio",
];

fn evaluate_rule(device: &Device<'_>, rule: &str) -> Outcome {
    match rule {
        "graphics-mapper" => graphics_mapper(device),
        "health" => at_level(device, None, HEALTH),
        "power" => at_level(device, Some(FCM_LEVEL_R), POWER),
        "gatekeeper" => at_level(device, None, GATEKEEPER),
        "composer" => at_level(device, None, COMPOSER),
        "gralloc" => at_level(device, None, ALLOCATOR),
        "thermal" => at_level(device, Some(FCM_LEVEL_T), THERMAL),
        "gralloc-version" => gralloc_version(device),
        "audio" => audio(device),
        other => Outcome::Failed(vec![(VerdictKind::Structural, format!("unknown rule '{}'", other))]),
    }
}

/// Evaluate every rule against one device manifest.
pub fn evaluate(device: &Device<'_>) -> Vec<Verdict> {
    let mut verdicts = Vec::new();
    for &rule in RULES {
        match evaluate_rule(device, rule) {
            Outcome::Satisfied => verdicts.push(Verdict::satisfied(CHECK, rule)),
            Outcome::Skipped(reason) => verdicts.push(Verdict::skipped(CHECK, rule, reason)),
            Outcome::Failed(problems) => {
                for (kind, message) in problems {
                    verdicts.push(Verdict::failure(CHECK, rule, kind, message));
                }
            }
        }
    }
    verdicts
}

pub async fn check_required_hals(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let manifest = ctx.manifests.device_manifest().await?;
    let catalog = expand(&manifest);
    let device = Device {
        catalog: &catalog,
        low_ram: ctx.properties.is_low_ram(),
    };
    tracing::debug!(target_level = ?catalog.target_level, low_ram = device.low_ram, "evaluating required HALs");
    Ok(evaluate(&device))
}
