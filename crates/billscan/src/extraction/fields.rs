//! Built-in billing fields.
//!
//! Patterns are listed most specific first; an earlier pattern earns a
//! larger confidence bonus. All patterns are compiled case-insensitive
//! and multi-line, and the value is always capture group 1.

/// Static description of one extractable field.
#[derive(Debug)]
pub struct FieldDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub patterns: &'static [&'static str],
    pub base_confidence: u32,
    /// Values longer than this many characters are cut.
    pub max_length: Option<usize>,
}

pub static FIELD_DEFINITIONS: &[FieldDefinition] = &[
    FieldDefinition {
        key: "invoice_number",
        label: "Invoice Number",
        patterns: &[
            r"(?:invoice|inv|bill|receipt|ref(?:erence)?)\s*(?:#|no\.?|number|num|id)?[:\s-]*([A-Z0-9][\w/-]{2,20})",
        ],
        base_confidence: 88,
        max_length: None,
    },
    FieldDefinition {
        key: "date",
        label: "Date",
        patterns: &[
            r"(?:invoice\s*)?date\s*[:-]?\s*(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})",
            r"(?:invoice\s*)?date\s*[:-]?\s*(\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[\s,]*\d{2,4})",
            r"(?:invoice\s*)?date\s*[:-]?\s*((?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+\d{1,2}[\s,]*\d{2,4})",
            r"(\d{4}[/-]\d{1,2}[/-]\d{1,2})",
            r"(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})",
        ],
        base_confidence: 82,
        max_length: None,
    },
    FieldDefinition {
        key: "due_date",
        label: "Due Date",
        patterns: &[
            r"(?:due|payment)\s*date\s*[:-]?\s*(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})",
            r"(?:due|payment)\s*date\s*[:-]?\s*(\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[\s,]*\d{2,4})",
            r"due\s*[:-]?\s*(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})",
        ],
        base_confidence: 84,
        max_length: None,
    },
    FieldDefinition {
        key: "total_amount",
        label: "Total Amount",
        patterns: &[
            r"(?:grand\s*)?total\s*(?:amount|due|payable)?\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
            r"amount\s*(?:due|payable)\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
            r"balance\s*due\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
            r"total\s*[:-]?\s*[$£€₹]\s*([\d,]+\.?\d{0,2})",
        ],
        base_confidence: 85,
        max_length: None,
    },
    FieldDefinition {
        key: "subtotal",
        label: "Subtotal",
        patterns: &[
            r"sub\s*-?\s*total\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
            r"net\s*(?:amount|total)\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
        ],
        base_confidence: 80,
        max_length: None,
    },
    FieldDefinition {
        key: "tax_amount",
        label: "Tax Amount",
        patterns: &[
            r"(?:sales\s*)?tax\s*(?:amount)?\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
            r"(?:vat|gst|cgst|sgst|igst)\s*(?:amount)?\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
            r"tax\s*\(?\d*%?\)?\s*[:-]?\s*[$£€₹]?\s*([\d,]+\.?\d{0,2})",
        ],
        base_confidence: 80,
        max_length: None,
    },
    FieldDefinition {
        key: "vendor_name",
        label: "Vendor / Company",
        patterns: &[
            r"(?:from|vendor|seller|company|billed?\s*by|issued\s*by)\s*[:-]?\s*(.{3,80})",
            r"^([A-Z][A-Za-z\s&.,]+(?:Inc|LLC|Ltd|Corp|Co|Pvt|Limited|LLP)?\.?)$",
        ],
        base_confidence: 68,
        max_length: Some(100),
    },
    FieldDefinition {
        key: "customer_name",
        label: "Customer / Bill To",
        patterns: &[
            r"(?:bill\s*to|customer|client|sold\s*to|ship\s*to|buyer)\s*[:-]?\s*(.{3,80})",
            r"(?:attn|attention)\s*[:-]?\s*(.{3,60})",
        ],
        base_confidence: 72,
        max_length: Some(100),
    },
    FieldDefinition {
        key: "currency",
        label: "Currency",
        patterns: &[
            r"currency\s*[:-]?\s*([A-Z]{3})",
            r"\b(USD|EUR|GBP|INR|AUD|CAD|JPY|AED|SGD)\b",
            r"([$£€₹])",
        ],
        base_confidence: 78,
        max_length: None,
    },
    FieldDefinition {
        key: "payment_method",
        label: "Payment Method",
        patterns: &[
            r"payment\s*(?:method|mode|type|via|terms?)\s*[:-]?\s*(.{3,60})",
            r"(?:paid?\s*(?:by|via|through))\s*[:-]?\s*(.{3,40})",
        ],
        base_confidence: 72,
        max_length: Some(60),
    },
    FieldDefinition {
        key: "po_number",
        label: "PO Number",
        patterns: &[
            r"(?:purchase\s*order|p\.?o\.?)\s*(?:#|no\.?|number)?\s*[:-]?\s*([A-Z0-9][\w/-]{2,20})",
        ],
        base_confidence: 82,
        max_length: None,
    },
    FieldDefinition {
        key: "address",
        label: "Address",
        patterns: &[r"address\s*[:-]?\s*(.+(?:\n.+){0,3})"],
        base_confidence: 62,
        max_length: Some(200),
    },
];

/// ISO code for a single-character currency symbol.
pub fn currency_code(symbol: &str) -> Option<&'static str> {
    match symbol {
        "$" => Some("USD"),
        "£" => Some("GBP"),
        "€" => Some("EUR"),
        "₹" => Some("INR"),
        _ => None,
    }
}
