//! Installment generator
//!
//! Expands one transaction intent carrying `installments_total = N` into N
//! dated records. Every slice gets the same rounded amount; the rounding
//! remainder is not redistributed, so the slices may differ from the total
//! by a few cents.

use crate::error::AssistantError;
use crate::models::{InstallmentRecord, TransactionIntent};
use crate::Result;
use chrono::{Months, NaiveDate};
use uuid::Uuid;

/// Round to cents, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Installment `n` (1-based) falls `n - 1` calendar months after `start`,
/// clamped to the last day of shorter months.
pub fn due_date(start: NaiveDate, installment_number: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(installment_number.saturating_sub(1)))
}

pub fn generate(intent: &TransactionIntent, start_date: NaiveDate) -> Result<Vec<InstallmentRecord>> {
    let total = match intent.installments_total {
        Some(n) if n >= 2 => n,
        other => {
            return Err(AssistantError::InvalidInput(format!(
                "installment expansion needs at least 2 installments, got {:?}",
                other
            )))
        }
    };

    let amount = intent.amount.ok_or_else(|| {
        AssistantError::InvalidInput("installment expansion needs a resolved amount".to_string())
    })?;

    let per_installment = round_cents(amount / f64::from(total));

    (1..=total)
        .map(|number| {
            let due = due_date(start_date, number).ok_or_else(|| {
                AssistantError::InvalidInput(format!(
                    "due date out of range for installment {} from {}",
                    number, start_date
                ))
            })?;

            Ok(InstallmentRecord {
                id: Uuid::new_v4(),
                description: intent.description.clone(),
                amount: per_installment,
                transaction_type: intent.transaction_type,
                category: intent.category.clone(),
                payment_method: intent.payment_method,
                account: intent.account.clone(),
                installment_number: number,
                installments_total: total,
                due_date: due,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, TransactionType};
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn intent(amount: f64, installments: Option<u32>) -> TransactionIntent {
        TransactionIntent {
            description: "Notebook".to_string(),
            amount: Some(amount),
            transaction_type: TransactionType::Expense,
            category: "Eletrônicos".to_string(),
            payment_method: Some(PaymentMethod::Credit),
            account: Some("Nubank".to_string()),
            installments_total: installments,
            date: date(2025, 12, 20),
            needs_review: false,
        }
    }

    #[test]
    fn test_notebook_in_six() {
        let records = generate(&intent(3000.0, Some(6)), date(2025, 12, 20)).unwrap();

        assert_eq!(records.len(), 6);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.installment_number, i as u32 + 1);
            assert_eq!(record.installments_total, 6);
            assert_eq!(record.amount, 500.0);
            assert_eq!(record.description, "Notebook");
            assert_eq!(record.account.as_deref(), Some("Nubank"));
        }
        assert_eq!(records[0].due_date, date(2025, 12, 20));
        assert_eq!(records[1].due_date, date(2026, 1, 20));
        assert_eq!(records[5].due_date, date(2026, 5, 20));
    }

    #[test]
    fn test_count_numbers_and_ids_are_distinct() {
        for n in 2..=24 {
            let records = generate(&intent(999.99, Some(n)), date(2025, 1, 31)).unwrap();
            assert_eq!(records.len(), n as usize);

            let numbers: HashSet<u32> = records.iter().map(|r| r.installment_number).collect();
            assert_eq!(numbers, (1..=n).collect());

            let ids: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
            assert_eq!(ids.len(), n as usize);

            for pair in records.windows(2) {
                assert!(pair[0].due_date < pair[1].due_date);
            }
        }
    }

    #[test]
    fn test_month_end_clamping() {
        let records = generate(&intent(400.0, Some(4)), date(2024, 1, 31)).unwrap();
        let dues: Vec<NaiveDate> = records.iter().map(|r| r.due_date).collect();

        assert_eq!(
            dues,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }

    #[test]
    fn test_rounding_drift_is_not_redistributed() {
        let records = generate(&intent(100.0, Some(3)), date(2025, 3, 1)).unwrap();

        assert!(records.iter().all(|r| r.amount == 33.33));
        let sum: f64 = records.iter().map(|r| r.amount).sum();
        assert!((round_cents(sum) - 99.99).abs() < 1e-9);
    }

    #[test]
    fn test_precondition_violations() {
        assert!(generate(&intent(100.0, None), date(2025, 3, 1)).is_err());
        assert!(generate(&intent(100.0, Some(1)), date(2025, 3, 1)).is_err());

        let mut missing_amount = intent(100.0, Some(3));
        missing_amount.amount = None;
        assert!(generate(&missing_amount, date(2025, 3, 1)).is_err());
    }
}
