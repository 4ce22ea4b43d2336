use vintf_analyze::CHECK_NAMES;

use crate::OutputFormat;

pub(crate) fn cmd_checks(output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(CHECK_NAMES)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for name in CHECK_NAMES {
                println!("{}", name);
            }
        }
    }
}
