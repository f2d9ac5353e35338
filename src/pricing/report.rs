//! Chat-ready rendering of a computation result.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::{ComputationResult, ItemCalcInput};

/// Render the final report message sent to the seller.
pub fn format_report(input: &ItemCalcInput, result: &ComputationResult) -> String {
    format!(
        "🔎 Товар: {name}\n\
         💰 Цена после скидки: {price} ₽\n\
         📉 Комиссия WB: {commission} ₽\n\
         🔁 Возвраты (на единицу): {returns} ₽\n\
         \n\
         📦 На 1 проданную:\n\
         • Прибыль: {profit} ₽\n\
         • ROI: {roi}\n\
         \n\
         📊 На 1 отгруженную:\n\
         • Ожидаемая прибыль: {expected_profit} ₽\n\
         • ROI (ожидаемо): {expected_roi}",
        name = input.name,
        price = money(result.price_after_discount),
        commission = money(result.commission_rub_sold),
        returns = money(result.expected_return_cost),
        profit = money(result.profit_per_sold),
        roi = percent(result.roi_per_sold),
        expected_profit = money(result.expected_profit_per_unit),
        expected_roi = percent(result.roi_expected),
    )
}

/// Two decimals, half away from zero.
fn money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    // Avoid printing "-0.00" for tiny negative values.
    let rounded = if rounded.is_zero() { Decimal::ZERO } else { rounded };
    format!("{:.2}", rounded)
}

fn percent(ratio: Decimal) -> String {
    format!("{}%", money(ratio * dec!(100)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pricing::engine::tests::sample_input;

    #[test]
    fn test_report_layout() {
        let input = sample_input();
        let report = format_report(&input, &input.compute());

        let expected = "🔎 Товар: Термокружка\n\
                        💰 Цена после скидки: 375.00 ₽\n\
                        📉 Комиссия WB: 56.25 ₽\n\
                        🔁 Возвраты (на единицу): 10.00 ₽\n\
                        \n\
                        📦 На 1 проданную:\n\
                        • Прибыль: 116.25 ₽\n\
                        • ROI: 116.25%\n\
                        \n\
                        📊 На 1 отгруженную:\n\
                        • Ожидаемая прибыль: 55.00 ₽\n\
                        • ROI (ожидаемо): 55.00%";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_money_rounding() {
        assert_eq!(money(dec!(1.005)), "1.01");
        assert_eq!(money(dec!(-1.005)), "-1.01");
        assert_eq!(money(dec!(7)), "7.00");
        assert_eq!(money(dec!(-0.001)), "0.00");
        assert_eq!(money(dec!(12.3456)), "12.35");
    }

    #[test]
    fn test_percent_scales_ratio() {
        assert_eq!(percent(dec!(0.5)), "50.00%");
        assert_eq!(percent(dec!(-0.123456)), "-12.35%");
        assert_eq!(percent(dec!(2)), "200.00%");
    }
}
