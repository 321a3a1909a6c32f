//! # Pricing
//!
//! The one function that turns cart lines and a discount into totals. The
//! cart calls it after every mutation; the finalizer calls it again when it
//! builds the sale, so what the operator saw is what gets recorded.
//!
//! ## Rounding Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  S = Σ line_i                     (exact, integer minor units)          │
//! │  D = min(amount, S)               fixed discount                        │
//! │    = round(S × pct / 10000)       percentage discount                   │
//! │                                                                         │
//! │  Discount is shared by line value, so line i is taxed on                │
//! │  line_i × (S − D) / S. Summing the exact line taxes:                    │
//! │                                                                         │
//! │  T = round( (S − D) × Σ(line_i × bps_i) / (S × 10000) )                 │
//! │                                                                         │
//! │  grand = S − D + T                one rounding per total, never per line│
//! │                                                                         │
//! │  Per-line discount and tax are allocations of D and T by largest       │
//! │  remainder, so lines always add up to the totals exactly.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! `round` is half-up. All intermediates are `i128`; the unit price and
//! quantity caps keep them well inside range.

use crate::money::{div_round_half_up, Money};
use crate::types::{Discount, TaxRate, Totals};
use crate::validation::FULL_BPS;

/// What pricing needs to know about one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    /// unit price × quantity
    pub line_total: Money,
    pub tax_rate: TaxRate,
}

/// One line's share of the sale-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineShare {
    pub discount: Money,
    pub tax: Money,
}

/// Totals plus the per-line allocation that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Priced {
    pub totals: Totals,
    /// Same order as the input lines.
    pub lines: Vec<LineShare>,
}

/// Discount in minor units for a given subtotal.
///
/// Fixed amounts are clamped to the subtotal; percentages above 100% are
/// treated as 100%. Callers reject both earlier; the clamp covers a cart
/// that shrank after the discount was applied.
pub fn discount_amount(subtotal: Money, discount: Option<&Discount>) -> Money {
    let subtotal = subtotal.minor().max(0);
    let minor = match discount {
        None => 0,
        Some(Discount::Amount(amount)) => amount.minor().clamp(0, subtotal),
        Some(Discount::Percent(bps)) => {
            let bps = (*bps).min(FULL_BPS);
            div_round_half_up(i128::from(subtotal) * i128::from(bps), i128::from(FULL_BPS)) as i64
        }
    };
    Money::from_minor(minor)
}

/// Computes totals and per-line shares.
///
/// Deterministic and side-effect free: the same lines and discount always
/// produce the same result.
pub fn price(lines: &[LineAmount], discount: Option<&Discount>) -> Priced {
    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    if lines.is_empty() || !subtotal.is_positive() {
        return Priced {
            totals: Totals {
                subtotal,
                grand_total: subtotal,
                ..Totals::zero()
            },
            lines: vec![LineShare::default(); lines.len()],
        };
    }

    let discount_total = discount_amount(subtotal, discount);

    let s = i128::from(subtotal.minor());
    let d = i128::from(discount_total.minor());
    let tax_weights: Vec<i128> = lines
        .iter()
        .map(|l| i128::from(l.line_total.minor()) * i128::from(l.tax_rate.bps()))
        .collect();
    let weighted: i128 = tax_weights.iter().sum();
    let tax = div_round_half_up((s - d) * weighted, s * i128::from(FULL_BPS));
    let tax_total = Money::from_minor(tax as i64);

    let value_weights: Vec<i128> = lines
        .iter()
        .map(|l| i128::from(l.line_total.minor()))
        .collect();
    let discounts = allocate(d, &value_weights);
    let taxes = allocate(tax, &tax_weights);

    let shares = discounts
        .into_iter()
        .zip(taxes)
        .map(|(discount, tax)| LineShare {
            discount: Money::from_minor(discount as i64),
            tax: Money::from_minor(tax as i64),
        })
        .collect();

    Priced {
        totals: Totals {
            subtotal,
            discount_total,
            tax_total,
            grand_total: subtotal - discount_total + tax_total,
        },
        lines: shares,
    }
}

/// Splits `total` across `weights` by the largest remainder method.
///
/// Each share is floored, then the leftover units go to the largest
/// fractional remainders (earlier index wins ties). The shares always sum
/// to `total`. With no weight at all everything is zero.
pub(crate) fn allocate(total: i128, weights: &[i128]) -> Vec<i128> {
    let sum: i128 = weights.iter().sum();
    if sum <= 0 || total == 0 {
        return vec![0; weights.len()];
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (index, weight) in weights.iter().enumerate() {
        let exact = total * weight;
        shares.push(exact / sum);
        remainders.push((exact % sum, index));
    }

    let leftover = total - shares.iter().sum::<i128>();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, index) in remainders.iter().take(leftover.max(0) as usize) {
        shares[index] += 1;
    }

    shares
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(total: i64, bps: u32) -> LineAmount {
        LineAmount {
            line_total: Money::from_minor(total),
            tax_rate: TaxRate::from_bps(bps),
        }
    }

    #[test]
    fn test_two_products_no_discount() {
        // 2 × 10.00 @ 10% and 1 × 5.00 @ 0%
        let priced = price(&[line(2000, 1000), line(500, 0)], None);
        assert_eq!(priced.totals.subtotal.minor(), 2500);
        assert_eq!(priced.totals.discount_total.minor(), 0);
        assert_eq!(priced.totals.tax_total.minor(), 200);
        assert_eq!(priced.totals.grand_total.minor(), 2700);
        assert_eq!(priced.lines[0].tax.minor(), 200);
        assert_eq!(priced.lines[1].tax.minor(), 0);
    }

    #[test]
    fn test_ten_percent_discount_taxes_discounted_amount() {
        let priced = price(&[line(2000, 1000), line(500, 0)], Some(&Discount::Percent(1000)));
        assert_eq!(priced.totals.discount_total.minor(), 250);
        assert_eq!(priced.totals.tax_total.minor(), 180);
        assert_eq!(priced.totals.grand_total.minor(), 2430);
        assert_eq!(priced.lines[0].discount.minor(), 200);
        assert_eq!(priced.lines[1].discount.minor(), 50);
        assert_eq!(priced.lines[0].tax.minor(), 180);
    }

    #[test]
    fn test_tax_rounded_once_not_per_line() {
        // Three lines of 0.05 at 10%: per-line rounding would give 3 × 0.01,
        // the exact sum 0.015 rounds to 0.02.
        let priced = price(&[line(5, 1000), line(5, 1000), line(5, 1000)], None);
        assert_eq!(priced.totals.tax_total.minor(), 2);
        let line_tax: i64 = priced.lines.iter().map(|l| l.tax.minor()).sum();
        assert_eq!(line_tax, 2);
    }

    #[test]
    fn test_empty_lines_are_all_zero() {
        let priced = price(&[], Some(&Discount::Amount(Money::from_minor(500))));
        assert_eq!(priced.totals, Totals::zero());
        assert!(priced.lines.is_empty());
    }

    #[test]
    fn test_free_items_have_zero_totals() {
        let priced = price(&[line(0, 1000)], Some(&Discount::Percent(5000)));
        assert_eq!(priced.totals, Totals::zero());
        assert_eq!(priced.lines.len(), 1);
    }

    #[test]
    fn test_amount_discount_clamped_to_subtotal() {
        let priced = price(&[line(300, 1000)], Some(&Discount::Amount(Money::from_minor(1000))));
        assert_eq!(priced.totals.discount_total.minor(), 300);
        assert_eq!(priced.totals.tax_total.minor(), 0);
        assert_eq!(priced.totals.grand_total.minor(), 0);
    }

    #[test]
    fn test_full_discount_zeroes_grand_total() {
        let priced = price(&[line(999, 825), line(1, 2500)], Some(&Discount::Percent(10_000)));
        assert_eq!(priced.totals.grand_total.minor(), 0);
    }

    #[test]
    fn test_balance_and_line_sums_across_inputs() {
        let carts: Vec<Vec<LineAmount>> = vec![
            vec![line(333, 825), line(667, 700), line(1, 10_000)],
            vec![line(1999, 1300), line(7, 0), line(12345, 875), line(50, 2000)],
            vec![line(1, 1), line(1, 1), line(1, 1), line(1, 1)],
            vec![line(999_000_000_000_000, 10_000), line(1, 825)],
        ];
        let discounts = [
            None,
            Some(Discount::Percent(1)),
            Some(Discount::Percent(3333)),
            Some(Discount::Percent(10_000)),
            Some(Discount::Amount(Money::from_minor(7))),
            Some(Discount::Amount(Money::from_minor(1_000))),
        ];
        for lines in &carts {
            for discount in &discounts {
                let priced = price(lines, discount.as_ref());
                let t = priced.totals;
                assert!(t.is_balanced(), "unbalanced: {:?}", t);
                assert!(!t.grand_total.is_negative());
                let d: Money = priced.lines.iter().map(|l| l.discount).sum();
                let x: Money = priced.lines.iter().map(|l| l.tax).sum();
                assert_eq!(d, t.discount_total);
                assert_eq!(x, t.tax_total);
            }
        }
    }

    #[test]
    fn test_allocate_largest_remainder() {
        assert_eq!(allocate(10, &[1, 1, 1]), vec![4, 3, 3]);
        // remainders tie between index 0 and 2; index 0 wins
        assert_eq!(allocate(2, &[1, 2, 1]), vec![1, 1, 0]);
        assert_eq!(allocate(0, &[5, 5]), vec![0, 0]);
        assert_eq!(allocate(7, &[0, 0]), vec![0, 0]);
        assert_eq!(allocate(100, &[3, 0, 1]), vec![75, 0, 25]);
    }
}
