use crate::models::{LabelValuePair, WideRecord};
use deunicode::deunicode;

use super::error::NormalizationError;

// ── Cleaners ──────────────────────────────────────────────────────────────────

/// "Div. Yield" → "Div Yield" | "Cotação" → "Cotacao"
pub fn clean_label(s: &str) -> String {
    deunicode(s).replace('.', "")
}

/// Strips `\n` and transliterates. Periods are kept: "12.34" stays "12.34".
pub fn clean_value(s: &str) -> String {
    deunicode(&s.replace('\n', ""))
}

// ── Pivot ─────────────────────────────────────────────────────────────────────

/// Clean the pairs and pivot them into one row for `ticker`.
///
/// Pairs with a missing or empty label are dropped before cleaning. When a
/// label repeats, the last value in document order wins.
pub fn pivot_pairs(
    ticker: &str,
    pairs: Vec<LabelValuePair>,
) -> Result<WideRecord, NormalizationError> {
    let mut record = WideRecord::new(ticker);

    for pair in pairs {
        let Some(label) = pair.label.filter(|l| !l.is_empty()) else {
            continue;
        };
        record.fields.insert(clean_label(&label), clean_value(&pair.value));
    }

    if record.is_empty() {
        return Err(NormalizationError::Empty);
    }
    Ok(record)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
