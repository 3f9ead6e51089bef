use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::ExtractionError;
use crate::extraction::fields::{currency_code, FieldDefinition, FIELD_DEFINITIONS};
use crate::extraction::{ExtractedField, ExtractionMethod};

const MAX_CONFIDENCE: u32 = 99;
const POSITION_BONUS: u32 = 10;
const POSITION_STEP: u32 = 3;

/// A field definition with its patterns compiled.
#[derive(Debug)]
pub struct CompiledField {
    pub definition: &'static FieldDefinition,
    patterns: Vec<Regex>,
}

impl CompiledField {
    fn compile(definition: &'static FieldDefinition) -> Result<Self, ExtractionError> {
        let patterns = definition
            .patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .multi_line(true)
                    .build()
                    .map_err(|source| ExtractionError::InvalidPattern {
                        key: definition.key,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            definition,
            patterns,
        })
    }

    pub fn key(&self) -> &'static str {
        self.definition.key
    }

    pub fn label(&self) -> &'static str {
        self.definition.label
    }

    /// True when any pattern matches anywhere in `text`.
    pub fn detect(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    /// Best value across all patterns. A later pattern only wins with a
    /// strictly higher score.
    pub fn extract(&self, text: &str) -> ExtractedField {
        let mut best: Option<(String, u32)> = None;

        for (index, re) in self.patterns.iter().enumerate() {
            let Some(captured) = re
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
            else {
                continue;
            };

            let Some(value) = self.normalize(captured) else {
                continue;
            };

            let score = score_for(self.definition.base_confidence, index);
            if best.as_ref().map_or(true, |(_, current)| score > *current) {
                best = Some((value, score));
            }
        }

        let (value, confidence) = match best {
            Some((value, score)) => (Some(value), score),
            None => (None, 0),
        };

        ExtractedField {
            key: self.definition.key.to_string(),
            label: self.definition.label.to_string(),
            value,
            confidence,
            method: ExtractionMethod::Regex,
        }
    }

    fn normalize(&self, raw: &str) -> Option<String> {
        let mut value = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(max) = self.definition.max_length {
            if value.chars().count() > max {
                value = value.chars().take(max).collect();
            }
        }

        if self.definition.key == "currency" {
            if let Some(code) = currency_code(&value) {
                value = code.to_string();
            }
        }

        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

fn score_for(base: u32, pattern_index: usize) -> u32 {
    let step = u32::try_from(pattern_index)
        .unwrap_or(u32::MAX)
        .saturating_mul(POSITION_STEP);
    let bonus = POSITION_BONUS.saturating_sub(step);
    (base + bonus).min(MAX_CONFIDENCE)
}

/// Compiled pattern set, indexed by field key.
#[derive(Debug)]
pub struct PatternRegistry {
    fields: Vec<CompiledField>,
    index: HashMap<&'static str, usize>,
}

impl PatternRegistry {
    pub fn new(definitions: &'static [FieldDefinition]) -> Result<Self, ExtractionError> {
        let fields = definitions
            .iter()
            .map(CompiledField::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.key(), i))
            .collect();

        Ok(Self { fields, index })
    }

    pub fn builtin() -> Result<Self, ExtractionError> {
        Self::new(FIELD_DEFINITIONS)
    }

    pub fn get(&self, key: &str) -> Option<&CompiledField> {
        self.index.get(key).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> impl Iterator<Item = &CompiledField> {
        self.fields.iter()
    }

    /// `(key, label)` pairs in definition order.
    pub fn available_fields(&self) -> Vec<(&'static str, &'static str)> {
        self.fields.iter().map(|f| (f.key(), f.label())).collect()
    }

    /// Keys of every field with at least one matching pattern.
    pub fn detect_fields(&self, text: &str) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.detect(text))
            .map(|f| f.key())
            .collect()
    }

    /// Known fields among `keys`, in request order, without duplicates.
    pub fn resolve<'a, S: AsRef<str>>(&'a self, keys: &[S]) -> Vec<&'a CompiledField> {
        let mut seen = std::collections::HashSet::new();
        keys.iter()
            .filter_map(|k| {
                let key = k.as_ref();
                match self.get(key) {
                    Some(field) if seen.insert(field.key()) => Some(field),
                    Some(_) => None,
                    None => {
                        log::debug!("Ignoring unknown field key '{}'", key);
                        None
                    }
                }
            })
            .collect()
    }

    /// Pattern extraction for the requested keys. Unknown keys are skipped.
    pub fn extract<S: AsRef<str>>(&self, text: &str, keys: &[S]) -> Vec<ExtractedField> {
        self.resolve(keys)
            .into_iter()
            .map(|field| field.extract(text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PatternRegistry {
        PatternRegistry::builtin().unwrap()
    }

    fn extract_one(text: &str, key: &str) -> ExtractedField {
        registry().extract(text, &[key]).remove(0)
    }

    #[test]
    fn test_builtin_patterns_compile() {
        let registry = registry();
        assert_eq!(registry.fields().count(), FIELD_DEFINITIONS.len());
        assert!(registry.get("total_amount").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_score_for() {
        assert_eq!(score_for(85, 0), 95);
        assert_eq!(score_for(85, 1), 92);
        assert_eq!(score_for(85, 3), 86);
        assert_eq!(score_for(85, 4), 85);
        assert_eq!(score_for(95, 0), 99);
    }

    #[test]
    fn test_total_amount_first_pattern() {
        let field = extract_one("Total: $123.45", "total_amount");
        assert_eq!(field.value.as_deref(), Some("123.45"));
        assert_eq!(field.confidence, 95);
        assert_eq!(field.method, ExtractionMethod::Regex);
        assert_eq!(field.label, "Total Amount");
    }

    #[test]
    fn test_later_pattern_scores_lower() {
        let field = extract_one("Amount Due: 1,250.00", "total_amount");
        assert_eq!(field.value.as_deref(), Some("1,250.00"));
        assert_eq!(field.confidence, 92);
    }

    #[test]
    fn test_invoice_number() {
        let field = extract_one("INVOICE # INV-2024-001\nDate: 01/02/2024", "invoice_number");
        assert_eq!(field.value.as_deref(), Some("INV-2024-001"));
        assert_eq!(field.confidence, 98);
    }

    #[test]
    fn test_date_formats() {
        let field = extract_one("Invoice Date: 15/01/2024", "date");
        assert_eq!(field.value.as_deref(), Some("15/01/2024"));
        assert_eq!(field.confidence, 92);

        let field = extract_one("Date: 15 January 2024", "date");
        assert_eq!(field.value.as_deref(), Some("15 January 2024"));
        assert_eq!(field.confidence, 89);

        let field = extract_one("issued 2024-01-15", "date");
        assert_eq!(field.value.as_deref(), Some("2024-01-15"));
        assert_eq!(field.confidence, 83);
    }

    #[test]
    fn test_currency_symbol_maps_to_code() {
        let field = extract_one("Amount €40", "currency");
        assert_eq!(field.value.as_deref(), Some("EUR"));
        assert_eq!(field.confidence, 82);

        let field = extract_one("Currency: GBP", "currency");
        assert_eq!(field.value.as_deref(), Some("GBP"));
        assert_eq!(field.confidence, 88);
    }

    #[test]
    fn test_symbol_map_only_applies_to_currency() {
        let registry = registry();
        let customer = registry.get("customer_name").unwrap();
        assert_eq!(customer.normalize("$").as_deref(), Some("$"));
        let currency = registry.get("currency").unwrap();
        assert_eq!(currency.normalize("$").as_deref(), Some("USD"));
        assert_eq!(currency.normalize("  ").as_deref(), None);
    }

    #[test]
    fn test_whitespace_collapsed_and_truncated() {
        let long_name = "A".repeat(250);
        let text = format!("Address: 1  Main   St\n{}", long_name);
        let field = extract_one(&text, "address");
        let value = field.value.unwrap();
        assert!(value.starts_with("1 Main St A"));
        assert_eq!(value.chars().count(), 200);
        assert_eq!(field.confidence, 72);
    }

    #[test]
    fn test_absent_field_has_zero_confidence() {
        let field = extract_one("nothing to see here", "po_number");
        assert_eq!(field.key, "po_number");
        assert_eq!(field.value, None);
        assert_eq!(field.confidence, 0);
    }

    #[test]
    fn test_unknown_and_duplicate_keys_skipped() {
        let fields = registry().extract("Total: 10.00", &["bogus", "total_amount", "total_amount"]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].key, "total_amount");
    }

    #[test]
    fn test_results_follow_request_order() {
        let fields = registry().extract("", &["currency", "date", "subtotal"]);
        let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["currency", "date", "subtotal"]);
    }

    #[test]
    fn test_detect_fields() {
        let detected = registry().detect_fields("Invoice No: A123\nTotal: $10.00\nVAT: 2.00");
        assert!(detected.contains(&"invoice_number"));
        assert!(detected.contains(&"total_amount"));
        assert!(detected.contains(&"tax_amount"));
        assert!(detected.contains(&"currency"));
        assert!(!detected.contains(&"due_date"));
    }

    #[test]
    fn test_confidence_always_in_range() {
        let text = "Invoice #A1B2C3\nDate: 01/01/2024\nDue Date: 02/02/2024\nTotal: $10\n\
                    Subtotal: 9\nTax: 1\nFrom: Acme Corp\nBill To: Jane Doe\nCurrency: USD\n\
                    Payment method: card\nPO # PO-7788\nAddress: 1 Road";
        let keys: Vec<&str> = FIELD_DEFINITIONS.iter().map(|f| f.key).collect();
        for field in registry().extract(text, &keys) {
            assert!(field.confidence <= 99, "{} scored {}", field.key, field.confidence);
            assert_eq!(field.value.is_none(), field.confidence == 0);
        }
    }
}
