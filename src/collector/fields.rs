//! Ordered catalog of the answers a calculation needs.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Longest accepted product name, in characters.
const MAX_NAME_CHARS: usize = 256;

/// Upper bound for any amount. Keeps every intermediate value of the formula
/// well inside `Decimal` range.
const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// Most decimal places accepted in a numeric answer.
const MAX_SCALE: u32 = 6;

/// Identifier of a collected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Name,
    Cost,
    DeliveryToWb,
    Packaging,
    Fulfillment,
    MpPriceBeforeDiscount,
    DiscountCoeff,
    BuyoutPercent,
    WbCommissionPercent,
    MpLogisticsToPvz,
    ReturnCostPerUnit,
    MarketingInternal,
    MarketingExternal,
    Photos,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::Cost => "cost",
            FieldKey::DeliveryToWb => "delivery_to_wb",
            FieldKey::Packaging => "packaging",
            FieldKey::Fulfillment => "fulfillment",
            FieldKey::MpPriceBeforeDiscount => "mp_price_before_discount",
            FieldKey::DiscountCoeff => "discount_coeff",
            FieldKey::BuyoutPercent => "buyout_percent",
            FieldKey::WbCommissionPercent => "wb_commission_percent",
            FieldKey::MpLogisticsToPvz => "mp_logistics_to_pvz",
            FieldKey::ReturnCostPerUnit => "return_cost_per_unit",
            FieldKey::MarketingInternal => "marketing_internal",
            FieldKey::MarketingExternal => "marketing_external",
            FieldKey::Photos => "photos",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an answer is parsed and which values it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, trimmed, non-empty.
    Text,
    /// Rubles, `0..=MAX_AMOUNT`.
    Amount,
    /// Price multiplier, `(0, 1]`.
    Coefficient,
    /// Plain percentage, `0..=100`.
    Percent,
}

/// A parsed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

/// Why an answer was rejected. The message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Пустой ответ.")]
    Empty,

    #[error("Слишком длинное название, максимум {max} символов.")]
    TooLong { max: usize },

    #[error("Не удалось распознать число «{input}».")]
    NotANumber { input: String },

    #[error("Слишком много знаков после запятой, максимум {max}.")]
    TooPrecise { max: u32 },

    #[error("Значение вне допустимого диапазона: {expected}.")]
    OutOfRange { expected: &'static str },
}

/// One step of the questionnaire.
#[derive(Debug)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub prompt: &'static str,
    pub kind: FieldKind,
}

/// Every field in the order it is asked.
pub static FIELDS: [FieldSpec; 14] = [
    FieldSpec::new(FieldKey::Name, "1) Название товара:", FieldKind::Text),
    FieldSpec::new(FieldKey::Cost, "2) Себестоимость:", FieldKind::Amount),
    FieldSpec::new(FieldKey::DeliveryToWb, "3) Доставка до WB:", FieldKind::Amount),
    FieldSpec::new(FieldKey::Packaging, "4) Упаковка:", FieldKind::Amount),
    FieldSpec::new(FieldKey::Fulfillment, "5) Фулфилмент:", FieldKind::Amount),
    FieldSpec::new(
        FieldKey::MpPriceBeforeDiscount,
        "6) Цена до скидки:",
        FieldKind::Amount,
    ),
    FieldSpec::new(
        FieldKey::DiscountCoeff,
        "7) Скидка (например 0.75):",
        FieldKind::Coefficient,
    ),
    FieldSpec::new(FieldKey::BuyoutPercent, "8) Процент выкупа:", FieldKind::Percent),
    FieldSpec::new(
        FieldKey::WbCommissionPercent,
        "9) Комиссия WB (%):",
        FieldKind::Percent,
    ),
    FieldSpec::new(
        FieldKey::MpLogisticsToPvz,
        "10) Логистика до ПВЗ:",
        FieldKind::Amount,
    ),
    FieldSpec::new(
        FieldKey::ReturnCostPerUnit,
        "11) Стоимость возврата:",
        FieldKind::Amount,
    ),
    FieldSpec::new(
        FieldKey::MarketingInternal,
        "12) Внутренний маркетинг:",
        FieldKind::Amount,
    ),
    FieldSpec::new(
        FieldKey::MarketingExternal,
        "13) Внешний маркетинг:",
        FieldKind::Amount,
    ),
    FieldSpec::new(FieldKey::Photos, "14) Фотосессия:", FieldKind::Amount),
];

/// Field expected at `cursor`, if the questionnaire is not finished.
pub fn field_at(cursor: usize) -> Option<&'static FieldSpec> {
    FIELDS.get(cursor)
}

impl FieldSpec {
    const fn new(key: FieldKey, prompt: &'static str, kind: FieldKind) -> Self {
        Self { key, prompt, kind }
    }

    /// Parse and range-check a raw answer.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, ValidationError> {
        if self.kind == FieldKind::Text {
            return parse_text(raw);
        }

        let value = parse_number(raw).map_err(|e| match e {
            NumberError::Rejected(e) => e,
            NumberError::Overflow => self.out_of_range(),
        })?;
        if !self.in_range(value) {
            return Err(self.out_of_range());
        }
        Ok(FieldValue::Number(value))
    }

    fn in_range(&self, value: Decimal) -> bool {
        match self.kind {
            FieldKind::Text => true,
            FieldKind::Amount => value >= Decimal::ZERO && value <= MAX_AMOUNT,
            FieldKind::Coefficient => value > Decimal::ZERO && value <= Decimal::ONE,
            FieldKind::Percent => value >= Decimal::ZERO && value <= dec!(100),
        }
    }

    fn out_of_range(&self) -> ValidationError {
        let expected = match self.kind {
            FieldKind::Text | FieldKind::Amount => "число от 0 до 1 000 000 000 000",
            FieldKind::Coefficient => "больше 0 и не больше 1",
            FieldKind::Percent => "от 0 до 100",
        };
        ValidationError::OutOfRange { expected }
    }
}

fn parse_text(raw: &str) -> Result<FieldValue, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    if text.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::TooLong {
            max: MAX_NAME_CHARS,
        });
    }
    Ok(FieldValue::Text(text.to_string()))
}

/// Canonical numeric form: no whitespace, no trailing unit sign, `.` as the
/// decimal separator.
fn normalize_number(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let stripped = compact
        .strip_suffix('%')
        .or_else(|| compact.strip_suffix('₽'))
        .unwrap_or(&compact);
    stripped.replace(',', ".")
}

enum NumberError {
    Rejected(ValidationError),
    /// Well-formed, but too large for `Decimal`.
    Overflow,
}

fn parse_number(raw: &str) -> Result<Decimal, NumberError> {
    let normalized = normalize_number(raw);
    if normalized.is_empty() {
        return Err(NumberError::Rejected(ValidationError::Empty));
    }

    let value = match Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
    {
        Ok(value) => value.normalize(),
        Err(_) => return Err(classify_unparsed(raw, &normalized)),
    };

    if value.scale() > MAX_SCALE {
        return Err(NumberError::Rejected(ValidationError::TooPrecise {
            max: MAX_SCALE,
        }));
    }
    if value.is_zero() {
        return Ok(Decimal::ZERO);
    }
    Ok(value)
}

/// Tell a malformed answer from a real number `Decimal` cannot hold,
/// such as `1e30` or `1e-30`.
fn classify_unparsed(raw: &str, normalized: &str) -> NumberError {
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() >= 1.0 => NumberError::Overflow,
        Ok(v) if v.is_finite() => NumberError::Rejected(ValidationError::TooPrecise {
            max: MAX_SCALE,
        }),
        _ => NumberError::Rejected(ValidationError::NotANumber {
            input: raw.trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: FieldKey) -> &'static FieldSpec {
        FIELDS.iter().find(|f| f.key == key).unwrap()
    }

    #[test]
    fn test_catalog_order() {
        let keys: Vec<&str> = FIELDS.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "name",
                "cost",
                "delivery_to_wb",
                "packaging",
                "fulfillment",
                "mp_price_before_discount",
                "discount_coeff",
                "buyout_percent",
                "wb_commission_percent",
                "mp_logistics_to_pvz",
                "return_cost_per_unit",
                "marketing_internal",
                "marketing_external",
                "photos",
            ]
        );
        assert_eq!(FIELDS[0].kind, FieldKind::Text);
        assert!(FIELDS[1..].iter().all(|f| f.kind != FieldKind::Text));
        assert!(field_at(FIELDS.len()).is_none());
    }

    #[test]
    fn test_prompts_are_numbered() {
        for (i, field) in FIELDS.iter().enumerate() {
            assert!(
                field.prompt.starts_with(&format!("{})", i + 1)),
                "prompt for {} is not numbered",
                field.key
            );
        }
    }

    #[test]
    fn test_comma_is_decimal_separator() {
        let cost = field(FieldKey::Cost);
        assert_eq!(cost.parse("12,5"), cost.parse("12.5"));
        assert_eq!(cost.parse("12,5"), Ok(FieldValue::Number(dec!(12.5))));
    }

    #[test]
    fn test_number_normalization() {
        let cost = field(FieldKey::Cost);
        assert_eq!(cost.parse("  1 000,50 "), Ok(FieldValue::Number(dec!(1000.5))));
        assert_eq!(cost.parse("250₽"), Ok(FieldValue::Number(dec!(250))));
        assert_eq!(
            field(FieldKey::WbCommissionPercent).parse("15 %"),
            Ok(FieldValue::Number(dec!(15)))
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let cost = field(FieldKey::Cost);
        assert_eq!(
            cost.parse("сто рублей"),
            Err(ValidationError::NotANumber {
                input: "сто рублей".to_string()
            })
        );
        assert!(matches!(
            cost.parse("12,5,3"),
            Err(ValidationError::NotANumber { .. })
        ));
        assert_eq!(cost.parse("   "), Err(ValidationError::Empty));
        assert_eq!(
            cost.parse("1.0000001"),
            Err(ValidationError::TooPrecise { max: MAX_SCALE })
        );
        for word in ["inf", "NaN", "-infinity"] {
            assert!(matches!(
                cost.parse(word),
                Err(ValidationError::NotANumber { .. })
            ));
        }
    }

    #[test]
    fn test_huge_numbers_are_out_of_range() {
        let cost = field(FieldKey::Cost);
        assert_eq!(
            cost.parse("1e30"),
            Err(ValidationError::OutOfRange {
                expected: "число от 0 до 1 000 000 000 000"
            })
        );
        assert!(matches!(
            cost.parse("99999999999999999999999999999999999"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(cost.parse("1e13"), Err(ValidationError::OutOfRange { .. })));
        assert_eq!(
            field(FieldKey::BuyoutPercent).parse("1e30"),
            Err(ValidationError::OutOfRange {
                expected: "от 0 до 100"
            })
        );
        assert_eq!(
            cost.parse("1e-30"),
            Err(ValidationError::TooPrecise { max: MAX_SCALE })
        );
    }

    #[test]
    fn test_ranges() {
        let cost = field(FieldKey::Cost);
        assert!(matches!(
            cost.parse("-5"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(cost.parse("0"), Ok(FieldValue::Number(Decimal::ZERO)));

        let discount = field(FieldKey::DiscountCoeff);
        assert!(discount.parse("0").is_err());
        assert!(discount.parse("1.2").is_err());
        assert_eq!(discount.parse("1"), Ok(FieldValue::Number(Decimal::ONE)));
        assert_eq!(discount.parse("0,75"), Ok(FieldValue::Number(dec!(0.75))));

        let buyout = field(FieldKey::BuyoutPercent);
        assert!(buyout.parse("0").is_ok());
        assert!(buyout.parse("100").is_ok());
        assert!(buyout.parse("100.5").is_err());
    }

    #[test]
    fn test_name_is_trimmed_text() {
        let name = field(FieldKey::Name);
        assert_eq!(
            name.parse("  Кружка 300 мл \n"),
            Ok(FieldValue::Text("Кружка 300 мл".to_string()))
        );
        assert_eq!(name.parse(" \t "), Err(ValidationError::Empty));
        assert_eq!(
            name.parse(&"я".repeat(MAX_NAME_CHARS + 1)),
            Err(ValidationError::TooLong {
                max: MAX_NAME_CHARS
            })
        );
        // Numbers are valid product names.
        assert_eq!(name.parse("42"), Ok(FieldValue::Text("42".to_string())));
    }
}
