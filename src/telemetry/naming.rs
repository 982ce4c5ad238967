//! Display names for raw CIMC sensor identifiers.
//! "FAN1_TACH1" -> "Fan 1 Tach 1", "RISER2_OUTLETTMP" -> "Riser 2 Outlet Temperature".

use std::sync::OnceLock;

use regex::Regex;

static NUMBERED_TOKENS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn numbered_tokens() -> &'static [(Regex, &'static str)] {
    NUMBERED_TOKENS.get_or_init(|| {
        [
            (r"(?i)FAN(\d+)", "Fan ${1}"),
            (r"(?i)RISER(\d+)", "Riser ${1}"),
            (r"(?i)PSU(\d+)", "PSU ${1}"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Abbreviation expansions, applied in order. OUTLETTMP must run before TMP.
const EXPANSIONS: &[(&str, &str)] = &[
    ("OUTLETTMP", "Outlet Temperature"),
    ("OUTLET", "Outlet"),
    ("TACH", " Tach "),
    ("FP", "Front Panel"),
    ("TEMP", "Temperature"),
    ("TMP", "Temperature"),
    ("INLET", "Inlet"),
    ("PCH", "Chipset"),
    ("SENSOR", ""),
    ("SENS", ""),
];

/// Convert a raw Redfish sensor name into a display name. Empty or absent input yields "".
pub fn normalize_name(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return String::new(),
    };

    let mut name = raw.to_string();
    for (re, replacement) in numbered_tokens() {
        name = re.replace_all(&name, *replacement).into_owned();
    }

    name = name.replace('_', " ");
    for (token, expansion) in EXPANSIONS {
        name = name.replace(token, expansion);
    }

    name.split_whitespace().collect::<Vec<_>>().join(" ")
}
