//! Per-unit profitability formula.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fully populated parameters of one product listing.
///
/// Monetary fields are rubles per unit. Percent fields hold plain percentages
/// (`80` means 80 %), `discount_coeff` is the price multiplier after discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCalcInput {
    pub name: String,
    pub cost: Decimal,
    pub delivery_to_wb: Decimal,
    pub packaging: Decimal,
    pub fulfillment: Decimal,
    pub mp_price_before_discount: Decimal,
    pub discount_coeff: Decimal,
    pub buyout_percent: Decimal,
    pub wb_commission_percent: Decimal,
    pub mp_logistics_to_pvz: Decimal,
    pub return_cost_per_unit: Decimal,
    pub marketing_internal: Decimal,
    pub marketing_external: Decimal,
    pub photos: Decimal,
}

impl ItemCalcInput {
    /// Run the pricing engine on this input.
    pub fn compute(&self) -> ComputationResult {
        PricingEngine::compute(self)
    }

    /// Costs paid for every unit regardless of whether it is bought out.
    fn direct_costs(&self) -> Decimal {
        self.cost
            + self.delivery_to_wb
            + self.packaging
            + self.fulfillment
            + self.marketing_internal
            + self.marketing_external
            + self.photos
            + self.mp_logistics_to_pvz
    }

    /// Divisor for ROI figures. Zero cost falls back to 1.
    fn roi_base(&self) -> Decimal {
        if self.cost.is_zero() {
            Decimal::ONE
        } else {
            self.cost
        }
    }
}

/// Profitability breakdown for one listing.
///
/// "Per sold" figures assume the unit was bought out. "Expected" figures are
/// per shipped unit, weighted by the buyout probability. ROI values are
/// fractions of `cost` (`0.55` means 55 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub price_after_discount: Decimal,
    pub commission_rub_sold: Decimal,
    /// Return cost per shipped unit, weighted by the share of units returned.
    pub expected_return_cost: Decimal,
    /// `expected_return_cost` spread over bought-out units only.
    pub redistributed_return_cost_per_sold: Decimal,
    pub base_costs_per_unit: Decimal,
    pub costs_per_sold: Decimal,
    pub profit_per_sold: Decimal,
    pub roi_per_sold: Decimal,
    pub expected_revenue_per_unit: Decimal,
    pub expected_profit_per_unit: Decimal,
    pub roi_expected: Decimal,
}

/// Stateless profitability calculator.
pub struct PricingEngine;

impl PricingEngine {
    /// Compute the full breakdown.
    ///
    /// Never fails: zero buyout yields a zero redistributed return cost and
    /// zero cost makes ROI equal to the raw profit.
    pub fn compute(input: &ItemCalcInput) -> ComputationResult {
        let buyout = input.buyout_percent / dec!(100);
        let price_after_discount = input.mp_price_before_discount * input.discount_coeff;
        let commission_rub_sold = price_after_discount * (input.wb_commission_percent / dec!(100));
        let expected_return_cost = (Decimal::ONE - buyout) * input.return_cost_per_unit;

        let direct = input.direct_costs();
        let base_costs_per_unit = direct + expected_return_cost;

        let redistributed_return_cost_per_sold = if buyout > Decimal::ZERO {
            expected_return_cost / buyout
        } else {
            Decimal::ZERO
        };

        let costs_per_sold = direct + redistributed_return_cost_per_sold + commission_rub_sold;
        let profit_per_sold = price_after_discount - costs_per_sold;
        let roi_per_sold = profit_per_sold / input.roi_base();

        let expected_revenue_per_unit = price_after_discount * buyout;
        let expected_commission_per_unit = commission_rub_sold * buyout;
        let expected_profit_per_unit =
            expected_revenue_per_unit - (base_costs_per_unit + expected_commission_per_unit);
        let roi_expected = expected_profit_per_unit / input.roi_base();

        ComputationResult {
            price_after_discount,
            commission_rub_sold,
            expected_return_cost,
            redistributed_return_cost_per_sold,
            base_costs_per_unit,
            costs_per_sold,
            profit_per_sold,
            roi_per_sold,
            expected_revenue_per_unit,
            expected_profit_per_unit,
            roi_expected,
        }
    }
}
