use regex::Regex;

/// One tagged pattern in the priority table.
pub struct PatternRule {
    label: &'static str,
    pattern: Regex,
}

impl PatternRule {
    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Result of a successful extraction: the captured tracking number
/// (uppercased) and the label of the rule that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingNumberMatch {
    pub number: String,
    pub rule: &'static str,
}

/// Priority order is load-bearing: the patterns overlap, and the first rule
/// that matches anywhere in the text wins. Most specific first - the generic
/// 12-14 digit run must never pre-empt the 20-22 digit postal run, and the
/// UPS prefix pattern is tried before the looser alphanumeric one.
const RULE_TABLE: [(&str, &str); 5] = [
    ("international", r"\b([A-Z]{2}\d{9}[A-Z]{2})\b"),
    ("ups", r"\b(1Z[A-Z0-9]{16})\b"),
    ("postal-long", r"\b(\d{20,22})\b"),
    ("alpha-numeric", r"\b([A-Z]{2}\d{10})\b"),
    ("numeric", r"\b(\d{12,14})\b"),
];

/// Scans free-form text for a tracking-number substring.
pub struct TrackingNumberExtractor {
    rules: Vec<PatternRule>,
}

impl Default for TrackingNumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingNumberExtractor {
    pub fn new() -> Self {
        let rules = RULE_TABLE
            .iter()
            .map(|(label, pattern)| PatternRule {
                label,
                // Table entries are fixed literals; a failure here is a
                // programming error caught by the rule tests.
                pattern: Regex::new(pattern).expect("tracking pattern must compile"),
            })
            .collect();
        Self { rules }
    }

    /// Returns the first match in rule-priority order, or `None` when the
    /// text mentions no tracking number. `None` is the normal outcome for
    /// ordinary chat messages, not an error.
    ///
    /// Matching is case-insensitive (input is uppercased first) and
    /// substring-based: the number may sit anywhere inside a sentence.
    pub fn extract(&self, text: &str) -> Option<TrackingNumberMatch> {
        let upper = text.to_uppercase();
        for rule in &self.rules {
            if let Some(captures) = rule.pattern.captures(&upper) {
                if let Some(group) = captures.get(1) {
                    return Some(TrackingNumberMatch {
                        number: group.as_str().to_owned(),
                        rule: rule.label,
                    });
                }
            }
        }
        None
    }

    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::TrackingNumberExtractor;

    fn extractor() -> TrackingNumberExtractor {
        TrackingNumberExtractor::new()
    }

    #[test]
    fn rule_table_order_is_most_specific_first() {
        let labels: Vec<_> = extractor().rules().map(|rule| rule.label()).collect();
        assert_eq!(labels, ["international", "ups", "postal-long", "alpha-numeric", "numeric"]);
    }

    #[test]
    fn no_match_for_empty_and_plain_text() {
        assert_eq!(extractor().extract(""), None);
        assert_eq!(extractor().extract("hello world"), None);
    }

    #[test]
    fn matches_international_format() {
        let found = extractor().extract("customs gave me RB123456789CN yesterday").expect("match");
        assert_eq!(found.number, "RB123456789CN");
        assert_eq!(found.rule, "international");
    }

    #[test]
    fn matches_ups_format_embedded_in_sentence() {
        let found = extractor()
            .extract("my package 1Z999AA10123456784 seems stuck, order ref 12345678")
            .expect("match");
        assert_eq!(found.number, "1Z999AA10123456784");
        assert_eq!(found.rule, "ups");
    }

    #[test]
    fn ups_match_is_uppercased() {
        let found = extractor().extract("tracking 1z999aa10123456784 please").expect("match");
        assert_eq!(found.number, "1Z999AA10123456784");
    }

    #[test]
    fn ups_wins_over_shorter_numeric_elsewhere_in_text() {
        let found = extractor()
            .extract("invoice 123456789012 and parcel 1Z999AA10123456784")
            .expect("match");
        assert_eq!(found.rule, "ups");
        assert_eq!(found.number, "1Z999AA10123456784");
    }

    #[test]
    fn postal_long_wins_over_generic_numeric() {
        // Both a 20-digit run and a separate 12-digit run are present; the
        // postal rule sits earlier in the table and takes the match.
        let found = extractor()
            .extract("usps 92055901755477000000 or maybe 123456789012")
            .expect("match");
        assert_eq!(found.rule, "postal-long");
        assert_eq!(found.number, "92055901755477000000");
    }

    #[test]
    fn matches_alpha_numeric_format() {
        let found = extractor().extract("it said JD1234567890 on the label").expect("match");
        assert_eq!(found.number, "JD1234567890");
        assert_eq!(found.rule, "alpha-numeric");
    }

    #[test]
    fn matches_generic_numeric_as_last_resort() {
        let found = extractor().extract("fedex gave me 123456789012").expect("match");
        assert_eq!(found.number, "123456789012");
        assert_eq!(found.rule, "numeric");
    }

    #[test]
    fn digit_runs_outside_all_length_bands_do_not_match() {
        // 11 digits: below the numeric band. 25 digits: word boundaries keep
        // the postal and numeric rules from matching a partial run.
        assert_eq!(extractor().extract("order 12345678901"), None);
        assert_eq!(extractor().extract("ref 1234567890123456789012345"), None);
    }

    #[test]
    fn returns_at_most_one_candidate() {
        let found = extractor()
            .extract("RB123456789CN and also 1Z999AA10123456784 and 123456789012")
            .expect("match");
        assert_eq!(found.rule, "international");
    }
}
