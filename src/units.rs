use std::collections::BTreeMap;

/// Maps vendor unit spellings to canonical unit names.
pub trait UnitCanonicalizer {
    fn normalize(&self, unit: &str) -> String;
}

const UNIT_ALIASES: &[(&str, &str)] = &[
    ("a", "year"),
    ("Bq", "Becquerel"),
    ("d", "day"),
    ("g", "gram"),
    ("GJ", "gigajoule"),
    ("h", "hour"),
    ("ha", "hectare"),
    ("hr", "hour"),
    ("kBq", "kilo Becquerel"),
    ("kg", "kilogram"),
    ("kg sw", "kilogram separative work unit"),
    ("kgkm", "kilogram kilometer"),
    ("kJ", "kilojoule"),
    ("km", "kilometer"),
    ("km*year", "kilometer-year"),
    ("kWh", "kilowatt hour"),
    ("l", "litre"),
    ("lu", "livestock unit"),
    ("m", "meter"),
    ("m*year", "meter-year"),
    ("m2", "square meter"),
    ("m2*year", "square meter-year"),
    ("m2a", "square meter-year"),
    ("m3", "cubic meter"),
    ("m3*year", "cubic meter-year"),
    ("m3a", "cubic meter-year"),
    ("ma", "meter-year"),
    ("metric ton*km", "ton kilometer"),
    ("MJ", "megajoule"),
    ("my", "meter-year"),
    ("Nm3", "cubic meter"),
    ("p", "unit"),
    ("person*km", "person kilometer"),
    ("personkm", "person kilometer"),
    ("pkm", "person kilometer"),
    ("t", "ton"),
    ("tkm", "ton kilometer"),
    ("vkm", "vehicle kilometer"),
];

/// Built-in alias table plus optional user aliases, which win on conflict.
/// Unknown units pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct DefaultUnits {
    extra: BTreeMap<String, String>,
}

impl DefaultUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(extra: BTreeMap<String, String>) -> Self {
        Self { extra }
    }
}

impl UnitCanonicalizer for DefaultUnits {
    fn normalize(&self, unit: &str) -> String {
        let unit = unit.trim();
        if let Some(canonical) = self.extra.get(unit) {
            return canonical.clone();
        }
        UNIT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == unit)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or_else(|| unit.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_units() {
        let units = DefaultUnits::new();
        assert_eq!(units.normalize("kg"), "kilogram");
        assert_eq!(units.normalize("tkm"), "ton kilometer");
        assert_eq!(units.normalize("furlong"), "furlong");
    }

    #[test]
    fn user_aliases_take_precedence() {
        let mut extra = BTreeMap::new();
        extra.insert("kg".to_string(), "kg".to_string());
        let units = DefaultUnits::with_aliases(extra);
        assert_eq!(units.normalize("kg"), "kg");
        assert_eq!(units.normalize("MJ"), "megajoule");
    }
}
