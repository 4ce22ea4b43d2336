pub(crate) mod checks;
pub(crate) mod expand;
pub(crate) mod verify;

use std::path::Path;
use std::process;

use vintf_registry::DeviceSnapshot;

use crate::{report_error, OutputFormat};

/// Read and parse a snapshot, exiting with status 1 when it is unusable.
pub(crate) fn load_snapshot(path: &Path, output: OutputFormat, quiet: bool) -> DeviceSnapshot {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("cannot read snapshot {}: {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    match DeviceSnapshot::from_json_str(&source) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            report_error(&format!("{}: {}", path.display(), e), output, quiet);
            process::exit(1);
        }
    }
}
