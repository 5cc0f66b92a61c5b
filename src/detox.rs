use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostics::DiagnosticsSink;

/// SimaPro appends `/<GEO>[/I] <S|U>` to ecoinvent process names.
static SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?P<geo>[A-Z]{2,10})(/I)? [SU]$").unwrap());

/// Restores the ecoinvent name and geography from a SimaPro process name.
///
/// Returns the name with the suffix removed and the geography code. Names without the
/// suffix come back unchanged with `None`, and a warning is recorded; the caller picks
/// the default location.
pub fn detoxify(raw: &str, sink: &dyn DiagnosticsSink) -> (String, Option<String>) {
    match SUFFIX.captures(raw) {
        Some(caps) => {
            let geo = caps["geo"].to_string();
            let start = caps.get(0).map(|m| m.start()).unwrap_or(raw.len());
            (raw[..start].to_string(), Some(geo))
        }
        None => {
            sink.warn(&format!(
                "Name '{raw}' doesn't have SimaPro slashes - matched without slashes"
            ));
            (raw.to_string(), None)
        }
    }
}
