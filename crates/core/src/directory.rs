use crate::domain::tracking::CourierEntry;

/// Display label of the auto-detect sentinel selection.
pub const AUTO_DETECT: &str = "Auto Detect";

/// Well-known couriers offered even when the provider list is unavailable.
/// The first entry is the auto-detect sentinel, not a real courier.
const WELL_KNOWN: [(&str, &str); 11] = [
    (AUTO_DETECT, "auto"),
    ("UPS", "ups"),
    ("USPS", "usps"),
    ("FedEx", "fedex"),
    ("DHL Express", "dhl"),
    ("DHL eCommerce", "dhl-ecommerce"),
    ("TNT", "tnt"),
    ("China Post", "china-post"),
    ("Royal Mail", "royal-mail"),
    ("Canada Post", "canada-post"),
    ("Australia Post", "australia-post"),
];

/// Outcome of resolving a user-facing courier selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CourierResolution {
    /// The auto-detect sentinel: defer to the gateway's detect-courier call.
    AutoDetect,
    /// A concrete provider courier code.
    Code(String),
    /// The selection matched nothing; callers fall back to auto-detect.
    Unknown,
}

impl CourierResolution {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            Self::AutoDetect | Self::Unknown => None,
        }
    }
}

/// Two-tier courier lookup: the static well-known table is consulted first,
/// provider-fetched entries extend it. Built once at startup; if the
/// provider fetch fails the directory simply runs on the static tier alone.
#[derive(Clone, Debug, Default)]
pub struct CourierDirectory {
    provider_entries: Vec<CourierEntry>,
}

impl CourierDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a provider courier list behind the static table. Entries whose
    /// code collides with a well-known code are dropped; among the remaining
    /// provider entries codes stay unique, last write wins.
    pub fn with_provider_entries(entries: Vec<CourierEntry>) -> Self {
        let mut provider_entries: Vec<CourierEntry> = Vec::new();
        for entry in entries {
            if WELL_KNOWN.iter().any(|(_, code)| *code == entry.courier_code) {
                continue;
            }
            match provider_entries
                .iter_mut()
                .find(|existing| existing.courier_code == entry.courier_code)
            {
                Some(existing) => *existing = entry,
                None => provider_entries.push(entry),
            }
        }
        Self { provider_entries }
    }

    /// Display options in stable order: well-known names first, then
    /// `"Name (code)"` for each provider-sourced extension.
    pub fn options(&self) -> Vec<String> {
        let mut options: Vec<String> =
            WELL_KNOWN.iter().map(|(name, _)| (*name).to_owned()).collect();
        options.extend(
            self.provider_entries
                .iter()
                .map(|entry| format!("{} ({})", entry.courier_name, entry.courier_code)),
        );
        options
    }

    /// Resolves a display selection to a courier code. Pure in-memory
    /// lookup: exact match against the well-known names first, then a
    /// trailing parenthesized code parsed from a combined entry. A selection
    /// matching nothing is `Unknown`, not an error.
    pub fn resolve(&self, selection: &str) -> CourierResolution {
        let selection = selection.trim();
        if selection == AUTO_DETECT {
            return CourierResolution::AutoDetect;
        }

        for (name, code) in WELL_KNOWN.iter().skip(1) {
            if selection == *name {
                return CourierResolution::Code((*code).to_owned());
            }
        }

        if let Some(code) = parse_trailing_code(selection) {
            return CourierResolution::Code(code);
        }

        CourierResolution::Unknown
    }

    pub fn provider_entries(&self) -> &[CourierEntry] {
        &self.provider_entries
    }
}

/// Pulls the code out of a `"Name (code)"` display string.
fn parse_trailing_code(selection: &str) -> Option<String> {
    let (_, tail) = selection.rsplit_once('(')?;
    let code = tail.strip_suffix(')')?.trim();
    if code.is_empty() {
        return None;
    }
    Some(code.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{CourierDirectory, CourierResolution, AUTO_DETECT};
    use crate::domain::tracking::CourierEntry;

    fn entry(name: &str, code: &str) -> CourierEntry {
        CourierEntry { courier_name: name.to_owned(), courier_code: code.to_owned() }
    }

    #[test]
    fn resolves_every_well_known_display_name() {
        let directory = CourierDirectory::new();
        for (name, code) in [
            ("UPS", "ups"),
            ("USPS", "usps"),
            ("FedEx", "fedex"),
            ("DHL Express", "dhl"),
            ("DHL eCommerce", "dhl-ecommerce"),
            ("TNT", "tnt"),
            ("China Post", "china-post"),
            ("Royal Mail", "royal-mail"),
            ("Canada Post", "canada-post"),
            ("Australia Post", "australia-post"),
        ] {
            assert_eq!(
                directory.resolve(name),
                CourierResolution::Code(code.to_owned()),
                "display name {name} should resolve"
            );
        }
    }

    #[test]
    fn auto_detect_sentinel_defers_resolution() {
        let directory = CourierDirectory::new();
        assert_eq!(directory.resolve(AUTO_DETECT), CourierResolution::AutoDetect);
    }

    #[test]
    fn unknown_selection_is_not_an_error() {
        let directory = CourierDirectory::new();
        assert_eq!(directory.resolve("Pigeon Post"), CourierResolution::Unknown);
        assert_eq!(directory.resolve(""), CourierResolution::Unknown);
    }

    #[test]
    fn resolves_combined_provider_entry_by_trailing_code() {
        let directory =
            CourierDirectory::with_provider_entries(vec![entry("Yamato Transport", "yamato")]);
        assert_eq!(
            directory.resolve("Yamato Transport (yamato)"),
            CourierResolution::Code("yamato".to_owned())
        );
    }

    #[test]
    fn trailing_code_parse_handles_parenthesized_names() {
        let directory = CourierDirectory::new();
        assert_eq!(
            directory.resolve("La Poste (Colissimo) (colissimo)"),
            CourierResolution::Code("colissimo".to_owned())
        );
        assert_eq!(directory.resolve("Broken ()"), CourierResolution::Unknown);
    }

    #[test]
    fn merge_drops_entries_shadowing_well_known_codes() {
        let directory = CourierDirectory::with_provider_entries(vec![
            entry("United Parcel Service", "ups"),
            entry("Yamato Transport", "yamato"),
        ]);
        assert_eq!(directory.provider_entries().len(), 1);
        assert_eq!(directory.provider_entries()[0].courier_code, "yamato");
    }

    #[test]
    fn merge_dedupes_by_code_last_write_wins() {
        let directory = CourierDirectory::with_provider_entries(vec![
            entry("Yamato", "yamato"),
            entry("Yamato Transport Co.", "yamato"),
        ]);
        assert_eq!(directory.provider_entries().len(), 1);
        assert_eq!(directory.provider_entries()[0].courier_name, "Yamato Transport Co.");
    }

    #[test]
    fn options_list_keeps_well_known_first() {
        let directory =
            CourierDirectory::with_provider_entries(vec![entry("Yamato Transport", "yamato")]);
        let options = directory.options();
        assert_eq!(options[0], AUTO_DETECT);
        assert_eq!(options[1], "UPS");
        assert_eq!(options.last().map(String::as_str), Some("Yamato Transport (yamato)"));
        assert_eq!(options.len(), 12);
    }
}
