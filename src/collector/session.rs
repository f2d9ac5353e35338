//! Per-user progress through the questionnaire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collector::fields::{FIELDS, FieldKey, FieldSpec, FieldValue, field_at};
use crate::error::CalcError;
use crate::pricing::ItemCalcInput;

/// One user's in-flight calculation.
///
/// `values` always holds exactly the fields at indices `[0, cursor)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcSession {
    cursor: usize,
    values: BTreeMap<FieldKey, FieldValue>,
    /// When `start` created this session.
    pub started_at: DateTime<Utc>,
    /// Last time an answer was accepted or rejected.
    pub last_active_at: DateTime<Utc>,
}

impl CalcSession {
    /// Fresh session positioned at the first field.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            cursor: 0,
            values: BTreeMap::new(),
            started_at: now,
            last_active_at: now,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn values(&self) -> &BTreeMap<FieldKey, FieldValue> {
        &self.values
    }

    /// Field awaiting an answer, or `None` once every field is filled.
    pub fn current_field(&self) -> Option<&'static FieldSpec> {
        field_at(self.cursor)
    }

    /// Store the answer for the current field and move to the next one.
    ///
    /// Returns the next field, or `None` when the questionnaire is finished.
    pub fn accept(&mut self, value: FieldValue) -> Option<&'static FieldSpec> {
        if let Some(field) = self.current_field() {
            self.values.insert(field.key, value);
            self.cursor += 1;
        }
        self.touch();
        self.current_field()
    }

    /// Mark the session as active now.
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Build the engine input. Only succeeds once every field is filled.
    pub fn finish(&self) -> Result<ItemCalcInput, CalcError> {
        if let Some(field) = self.current_field() {
            return Err(CalcError::IncompleteInput { field: field.key });
        }
        ItemCalcBuilder::new(&self.values).build()
    }
}

impl Default for CalcSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed view over collected answers that produces an [`ItemCalcInput`].
pub struct ItemCalcBuilder<'a> {
    values: &'a BTreeMap<FieldKey, FieldValue>,
}

impl<'a> ItemCalcBuilder<'a> {
    pub fn new(values: &'a BTreeMap<FieldKey, FieldValue>) -> Self {
        Self { values }
    }

    /// Assemble the record, failing on the first missing or mistyped field.
    pub fn build(&self) -> Result<ItemCalcInput, CalcError> {
        Ok(ItemCalcInput {
            name: self.text(FieldKey::Name)?,
            cost: self.number(FieldKey::Cost)?,
            delivery_to_wb: self.number(FieldKey::DeliveryToWb)?,
            packaging: self.number(FieldKey::Packaging)?,
            fulfillment: self.number(FieldKey::Fulfillment)?,
            mp_price_before_discount: self.number(FieldKey::MpPriceBeforeDiscount)?,
            discount_coeff: self.number(FieldKey::DiscountCoeff)?,
            buyout_percent: self.number(FieldKey::BuyoutPercent)?,
            wb_commission_percent: self.number(FieldKey::WbCommissionPercent)?,
            mp_logistics_to_pvz: self.number(FieldKey::MpLogisticsToPvz)?,
            return_cost_per_unit: self.number(FieldKey::ReturnCostPerUnit)?,
            marketing_internal: self.number(FieldKey::MarketingInternal)?,
            marketing_external: self.number(FieldKey::MarketingExternal)?,
            photos: self.number(FieldKey::Photos)?,
        })
    }

    fn text(&self, field: FieldKey) -> Result<String, CalcError> {
        self.values
            .get(&field)
            .and_then(FieldValue::as_text)
            .map(str::to_string)
            .ok_or(CalcError::IncompleteInput { field })
    }

    fn number(&self, field: FieldKey) -> Result<Decimal, CalcError> {
        self.values
            .get(&field)
            .and_then(FieldValue::as_number)
            .ok_or(CalcError::IncompleteInput { field })
    }
}
