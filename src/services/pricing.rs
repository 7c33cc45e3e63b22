use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::{CandidateRange, Listing};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightlyLine {
    pub date: NaiveDate,
    pub weekend: bool,
    pub rate: Decimal,
}

/// Price of a stay. Amounts are rounded to cents; nothing here is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingBreakdown {
    pub currency: String,
    pub nights: i64,
    pub nightly_rate: Decimal,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub service_fee: Decimal,
    pub cleaning_fee: Decimal,
    pub taxes: Decimal,
    pub total: Decimal,
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nightly_lines: Vec<NightlyLine>,
}

/// Price `range` against the live `listing` snapshot.
///
/// Assumes the range already passed the availability check. When weekday or
/// weekend overrides exist every night is priced on its own; otherwise the
/// base rate is multiplied out. Rounding happens once, on the presented
/// amounts, never per night.
pub fn compute_pricing(listing: &Listing, range: &CandidateRange) -> PricingBreakdown {
    let nights = range.dates.nights().max(0);

    let (gross, nightly_lines) = if listing.has_rate_overrides() {
        let lines = nightly_lines(listing, range.dates.check_in, nights);
        let gross = lines.iter().map(|line| line.rate).sum::<Decimal>();
        (gross, lines)
    } else {
        (listing.base_rate * Decimal::from(nights), Vec::new())
    };

    let discount = match listing
        .monthly_discount_percent
        .filter(|percent| *percent > Decimal::ZERO)
    {
        Some(percent) if nights >= listing.monthly_discount_threshold() => {
            gross * percent / Decimal::ONE_HUNDRED
        }
        _ => Decimal::ZERO,
    };

    let subtotal = to_cents(gross - discount);
    let service_fee = to_cents(listing.service_fee);
    let cleaning_fee = to_cents(listing.cleaning_fee);
    let taxes = to_cents(subtotal * listing.tax_percent / Decimal::ONE_HUNDRED);
    let total = to_cents(subtotal + service_fee + cleaning_fee + taxes);

    let nightly_rate = if nights > 0 {
        to_cents(subtotal / Decimal::from(nights))
    } else {
        to_cents(Decimal::ZERO)
    };

    PricingBreakdown {
        currency: listing.currency.clone(),
        nights,
        label: breakdown_label(&listing.currency, nightly_rate, nights),
        nightly_rate,
        subtotal,
        discount: to_cents(discount),
        service_fee,
        cleaning_fee,
        taxes,
        total,
        nightly_lines,
    }
}

fn nightly_lines(listing: &Listing, check_in: NaiveDate, nights: i64) -> Vec<NightlyLine> {
    let count = usize::try_from(nights).unwrap_or(0);
    check_in
        .iter_days()
        .take(count)
        .map(|date| {
            let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            let rate = if weekend {
                listing.weekend_rate
            } else {
                listing.weekday_rate
            }
            .unwrap_or(listing.base_rate);
            NightlyLine {
                date,
                weekend,
                rate,
            }
        })
        .collect()
}

/// Round half away from zero to two places and pin the scale so "360" renders as "360.00".
pub fn to_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

fn breakdown_label(currency: &str, rate: Decimal, nights: i64) -> String {
    let unit = if nights == 1 { "night" } else { "nights" };
    format!(
        "{}{} x {nights} {unit}",
        currency_symbol(currency),
        display_amount(rate)
    )
}

fn display_amount(amount: Decimal) -> String {
    if amount.fract().is_zero() {
        amount.trunc().normalize().to_string()
    } else {
        to_cents(amount).to_string()
    }
}

fn currency_symbol(currency: &str) -> String {
    match currency.trim().to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" | "MXN" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "¥".to_string(),
        other => format!("{other} "),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{compute_pricing, to_cents};
    use crate::services::availability::tests::{range, sample_listing};

    #[test]
    fn flat_rate_three_nights() {
        let listing = sample_listing();
        let pricing = compute_pricing(&listing, &range("2024-06-10", "2024-06-13", 2));

        assert_eq!(pricing.nights, 3);
        assert_eq!(pricing.subtotal, Decimal::from(300));
        assert_eq!(pricing.taxes, Decimal::from(30));
        assert_eq!(pricing.service_fee, Decimal::from(10));
        assert_eq!(pricing.cleaning_fee, Decimal::from(20));
        assert_eq!(pricing.total, Decimal::from(360));
        assert_eq!(pricing.total.to_string(), "360.00");
        assert_eq!(pricing.label, "$100 x 3 nights");
        assert!(pricing.nightly_lines.is_empty());
    }

    #[test]
    fn monthly_discount_applies_past_threshold() {
        let mut listing = sample_listing();
        listing.base_rate = Decimal::from(50);
        listing.monthly_discount_percent = Some(Decimal::from(10));
        listing.monthly_discount_threshold_nights = Some(28);

        let pricing = compute_pricing(&listing, &range("2024-06-01", "2024-07-01", 2));
        assert_eq!(pricing.nights, 30);
        assert_eq!(pricing.subtotal, Decimal::from(1350));
        assert_eq!(pricing.discount, Decimal::from(150));
        assert_eq!(pricing.label, "$45 x 30 nights");

        let short = compute_pricing(&listing, &range("2024-06-01", "2024-06-28", 2));
        assert_eq!(short.nights, 27);
        assert_eq!(short.discount, Decimal::ZERO);
        assert_eq!(short.subtotal, Decimal::from(1350));
    }

    #[test]
    fn weekend_overrides_price_each_night() {
        let mut listing = sample_listing();
        listing.weekday_rate = Some(Decimal::from(90));
        listing.weekend_rate = Some(Decimal::from(150));

        // 2024-06-07 is a Friday: Fri, Sat, Sun, Mon nights.
        let pricing = compute_pricing(&listing, &range("2024-06-07", "2024-06-11", 2));
        assert_eq!(pricing.nights, 4);
        assert_eq!(pricing.nightly_lines.len(), 4);
        assert_eq!(
            pricing.nightly_lines.iter().filter(|line| line.weekend).count(),
            2
        );
        assert_eq!(pricing.subtotal, Decimal::from(480));
        assert_eq!(pricing.nightly_rate, Decimal::from(120));
        assert_eq!(pricing.label, "$120 x 4 nights");
    }

    #[test]
    fn missing_override_falls_back_to_base_rate() {
        let mut listing = sample_listing();
        listing.weekend_rate = Some(Decimal::from(130));

        let pricing = compute_pricing(&listing, &range("2024-06-07", "2024-06-10", 2));
        // Fri at base, Sat and Sun at weekend rate.
        assert_eq!(pricing.subtotal, Decimal::from(360));
    }

    #[test]
    fn uneven_average_rate_keeps_cents_in_label() {
        let mut listing = sample_listing();
        listing.weekday_rate = Some(Decimal::new(9999, 2));
        listing.weekend_rate = Some(Decimal::new(12000, 2));

        // Fri 99.99 + Sat 120.00 + Sun 120.00 = 339.99 over 3 nights.
        let pricing = compute_pricing(&listing, &range("2024-06-07", "2024-06-10", 1));
        assert_eq!(pricing.subtotal, Decimal::new(33999, 2));
        assert_eq!(pricing.nightly_rate, Decimal::new(11333, 2));
        assert_eq!(pricing.label, "$113.33 x 3 nights");
    }

    #[test]
    fn single_night_label_and_foreign_currency() {
        let mut listing = sample_listing();
        listing.currency = "PYG".to_string();
        listing.min_stay_nights = 1;
        let pricing = compute_pricing(&listing, &range("2024-06-10", "2024-06-11", 1));
        assert_eq!(pricing.label, "PYG 100 x 1 night");
    }

    #[test]
    fn taxes_round_half_up_once() {
        let mut listing = sample_listing();
        listing.base_rate = Decimal::new(3333, 2);
        listing.tax_percent = Decimal::new(75, 1);

        // 3 x 33.33 = 99.99; 7.5% = 7.49925 -> 7.50
        let pricing = compute_pricing(&listing, &range("2024-06-10", "2024-06-13", 1));
        assert_eq!(pricing.subtotal, Decimal::new(9999, 2));
        assert_eq!(pricing.taxes, Decimal::new(750, 2));
        assert_eq!(
            pricing.total,
            pricing.subtotal + pricing.service_fee + pricing.cleaning_fee + pricing.taxes
        );
    }

    #[test]
    fn pricing_is_deterministic() {
        let listing = sample_listing();
        let candidate = range("2024-06-10", "2024-06-15", 2);
        let first =
            serde_json::to_string(&compute_pricing(&listing, &candidate)).expect("serialize");
        let second =
            serde_json::to_string(&compute_pricing(&listing, &candidate)).expect("serialize");
        assert_eq!(first, second);
    }

    #[test]
    fn longer_stays_cost_more() {
        let listing = sample_listing();
        let mut previous = Decimal::ZERO;
        for check_out in ["2024-06-12", "2024-06-13", "2024-06-14", "2024-06-20"] {
            let pricing = compute_pricing(&listing, &range("2024-06-10", check_out, 2));
            assert!(pricing.subtotal > previous);
            previous = pricing.subtotal;
        }
    }

    #[test]
    fn to_cents_rounds_midpoint_away_from_zero() {
        assert_eq!(to_cents(Decimal::new(1005, 3)).to_string(), "1.01");
        assert_eq!(to_cents(Decimal::new(1004, 3)).to_string(), "1.00");
        assert_eq!(to_cents(Decimal::from(7)).to_string(), "7.00");
    }
}
