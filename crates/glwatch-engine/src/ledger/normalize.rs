use tracing::debug;

use crate::ledger::types::{DroppedRows, NormalizedLedger, RawGlRow, Transaction};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell<T> {
    Missing,
    Invalid,
    Value(T),
}

/// Coerces raw rows into transactions, in input order.
///
/// Rows whose GL code or amount cannot be coerced are dropped and counted;
/// they are never defaulted to zero.
pub fn normalize_rows(rows: &[RawGlRow]) -> NormalizedLedger {
    let mut transactions = Vec::with_capacity(rows.len());
    let mut dropped = DroppedRows::default();

    for raw in rows {
        let gl_code = coerce_gl_code(raw.gl_code.as_deref());
        let amount = coerce_amount(raw.amount.as_deref());

        match gl_code {
            Cell::Missing => dropped.missing_gl_code += 1,
            Cell::Invalid => dropped.invalid_gl_code += 1,
            Cell::Value(_) => {}
        }
        match amount {
            Cell::Missing => dropped.missing_amount += 1,
            Cell::Invalid => dropped.invalid_amount += 1,
            Cell::Value(_) => {}
        }

        if let (Cell::Value(gl_code), Cell::Value(amount)) = (gl_code, amount) {
            transactions.push(Transaction {
                gl_code,
                amount,
                source_row: raw.row,
            });
        } else {
            dropped.total += 1;
        }
    }

    debug!(
        rows_read = rows.len(),
        transactions = transactions.len(),
        dropped = dropped.total,
        "normalized ledger rows"
    );

    NormalizedLedger {
        rows_read: rows.len() as i64,
        transactions,
        dropped,
    }
}

fn coerce_gl_code(value: Option<&str>) -> Cell<i64> {
    let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return Cell::Missing;
    };

    if let Ok(parsed) = text.parse::<i64>() {
        return Cell::Value(parsed);
    }

    // Spreadsheet exports often render integer codes as `11000000.0`.
    match text.parse::<f64>() {
        Ok(parsed)
            if parsed.is_finite()
                && parsed.fract() == 0.0
                && parsed >= i64::MIN as f64
                && parsed < i64::MAX as f64 =>
        {
            Cell::Value(parsed as i64)
        }
        _ => Cell::Invalid,
    }
}

fn coerce_amount(value: Option<&str>) -> Cell<f64> {
    let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return Cell::Missing;
    };

    match text.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Cell::Value(parsed),
        _ => Cell::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::types::{RawGlRow, Transaction};

    use super::normalize_rows;

    #[test]
    fn keeps_surviving_rows_in_input_order() {
        let rows = vec![
            RawGlRow::new(1, Some("21000000"), Some("-200")),
            RawGlRow::new(2, Some("abc"), Some("10")),
            RawGlRow::new(3, Some(" 11000000.0 "), Some(" 500.25 ")),
        ];

        let normalized = normalize_rows(&rows);
        assert_eq!(
            normalized.transactions,
            vec![
                Transaction {
                    gl_code: 21000000,
                    amount: -200.0,
                    source_row: 1,
                },
                Transaction {
                    gl_code: 11000000,
                    amount: 500.25,
                    source_row: 3,
                },
            ]
        );
        assert_eq!(normalized.rows_read, 3);
        assert_eq!(normalized.dropped.total, 1);
        assert_eq!(normalized.dropped.invalid_gl_code, 1);
    }

    #[test]
    fn counts_each_failing_field_but_each_row_once() {
        let rows = vec![
            RawGlRow::new(1, None, Some("")),
            RawGlRow::new(2, Some("1100.5"), Some("NaN")),
            RawGlRow::new(3, Some("11000000"), Some("inf")),
            RawGlRow::new(4, Some("11000000"), Some("1,000")),
        ];

        let normalized = normalize_rows(&rows);
        assert!(normalized.transactions.is_empty());
        assert_eq!(normalized.dropped.total, 4);
        assert_eq!(normalized.dropped.missing_gl_code, 1);
        assert_eq!(normalized.dropped.invalid_gl_code, 1);
        assert_eq!(normalized.dropped.missing_amount, 1);
        assert_eq!(normalized.dropped.invalid_amount, 3);
    }

    #[test]
    fn zero_amount_is_a_value_not_a_drop() {
        let normalized = normalize_rows(&[RawGlRow::new(1, Some("5"), Some("0"))]);
        assert_eq!(normalized.transactions.len(), 1);
        assert_eq!(normalized.dropped.total, 0);
    }
}
