//! Pricing calculator.
//!
//! All amounts are `rust_decimal::Decimal`. Intermediate values keep their
//! full scale; only `total_with_tax` is rounded, and only when it is stored
//! or displayed (see [`OfferTotals::for_storage`]).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use quotedesk_core::{DomainError, DomainResult};

/// Decimal places accepted on quantities, prices and percentages.
pub const INPUT_SCALE: u32 = 2;

/// Decimal places of persisted/displayed money.
pub const MONEY_SCALE: u32 = 2;

/// Largest quantity a line accepts; matches the `NUMERIC(10,2)` column.
/// (= 99_999_999.99; `Decimal::new` is not `const`.)
pub const MAX_QUANTITY: Decimal =
    Decimal::from_parts(0x540be3ff, 0x2, 0, false, 2);

/// Largest unit price a line accepts; matches the `NUMERIC(10,2)` column.
pub const MAX_UNIT_PRICE: Decimal =
    Decimal::from_parts(0x540be3ff, 0x2, 0, false, 2);

/// Largest storable `total_with_tax`; matches the `NUMERIC(14,2)` column.
pub const MAX_TOTAL: Decimal =
    Decimal::from_parts(0x107a3fff, 0x5af3, 0, false, 2);

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Validated pricing inputs of one line.
///
/// Construction enforces `0 < quantity <= MAX_QUANTITY`,
/// `0 <= unit_price <= MAX_UNIT_PRICE` and `0 <= discount_percent <= 100`,
/// so the calculator never sees bad input. Deserialization goes through the
/// same checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LinePricingFields")]
pub struct LinePricing {
    quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
}

impl LinePricing {
    pub fn new(
        quantity: Decimal,
        unit_price: Decimal,
        discount_percent: Decimal,
    ) -> DomainResult<Self> {
        ensure_scale("quantity", quantity)?;
        ensure_scale("unit_price", unit_price)?;
        ensure_scale("discount_percent", discount_percent)?;

        if quantity <= Decimal::ZERO {
            return Err(DomainError::invalid_input("quantity must be positive"));
        }
        if quantity > MAX_QUANTITY {
            return Err(DomainError::invalid_input(format!(
                "quantity must not exceed {MAX_QUANTITY}"
            )));
        }
        if unit_price < Decimal::ZERO {
            return Err(DomainError::invalid_input("unit_price must not be negative"));
        }
        if unit_price > MAX_UNIT_PRICE {
            return Err(DomainError::invalid_input(format!(
                "unit_price must not exceed {MAX_UNIT_PRICE}"
            )));
        }
        if discount_percent < Decimal::ZERO || discount_percent > HUNDRED {
            return Err(DomainError::invalid_input(
                "discount_percent must be between 0 and 100",
            ));
        }
        line_total(quantity, unit_price, discount_percent)?;

        Ok(Self {
            quantity,
            unit_price,
            discount_percent,
        })
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }

    /// `quantity * unit_price * (1 - discount_percent / 100)`
    ///
    /// The construction bounds keep this far below `Decimal::MAX`.
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price * (Decimal::ONE - self.discount_percent / HUNDRED)
    }

    /// Amount taken off by the discount: `quantity * unit_price * discount_percent / 100`.
    pub fn line_discount(&self) -> Decimal {
        self.quantity * self.unit_price * self.discount_percent / HUNDRED
    }
}

#[derive(Deserialize)]
struct LinePricingFields {
    quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
}

impl TryFrom<LinePricingFields> for LinePricing {
    type Error = DomainError;

    fn try_from(fields: LinePricingFields) -> Result<Self, Self::Error> {
        LinePricing::new(fields.quantity, fields.unit_price, fields.discount_percent)
    }
}

/// Checked line total for arbitrary inputs.
pub fn line_total(quantity: Decimal, unit_price: Decimal, discount_percent: Decimal) -> DomainResult<Decimal> {
    let discount = discount_percent
        .checked_div(HUNDRED)
        .and_then(|fraction| Decimal::ONE.checked_sub(fraction));
    quantity
        .checked_mul(unit_price)
        .zip(discount)
        .and_then(|(gross, keep)| gross.checked_mul(keep))
        .ok_or_else(|| DomainError::invalid_input("line amount out of range"))
}

/// Validate a tax rate percentage (0–100, at most two decimals).
pub fn validate_tax_rate(tax_rate: Decimal) -> DomainResult<Decimal> {
    ensure_scale("tax_rate", tax_rate)?;
    if tax_rate < Decimal::ZERO || tax_rate > HUNDRED {
        return Err(DomainError::invalid_input("tax_rate must be between 0 and 100"));
    }
    Ok(tax_rate)
}

/// Round a money amount to [`MONEY_SCALE`] places, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn ensure_scale(field: &str, value: Decimal) -> DomainResult<()> {
    if value.normalize().scale() > INPUT_SCALE {
        return Err(DomainError::invalid_input(format!(
            "{field} accepts at most {INPUT_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Derived aggregate amounts of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfferTotals {
    pub total_amount: Decimal,
    pub total_discount: Decimal,
    pub total_with_tax: Decimal,
}

impl OfferTotals {
    /// Recompute totals from the current lines. No lines yields all zeros.
    ///
    /// Fails with `InvalidInput` when a sum overflows or the taxed total
    /// would not fit [`MAX_TOTAL`] once rounded.
    pub fn recalculate<'a, I>(lines: I, tax_rate: Decimal) -> DomainResult<Self>
    where
        I: IntoIterator<Item = &'a LinePricing>,
    {
        let overflow = || DomainError::invalid_input("offer total out of range");

        let mut total_amount = Decimal::ZERO;
        let mut total_discount = Decimal::ZERO;
        for line in lines {
            total_amount = total_amount.checked_add(line.line_total()).ok_or_else(overflow)?;
            total_discount = total_discount.checked_add(line.line_discount()).ok_or_else(overflow)?;
        }

        let total_with_tax = tax_rate
            .checked_div(HUNDRED)
            .and_then(|rate| Decimal::ONE.checked_add(rate))
            .and_then(|factor| total_amount.checked_mul(factor))
            .ok_or_else(overflow)?;
        if round_money(total_with_tax) > MAX_TOTAL {
            return Err(DomainError::invalid_input(format!(
                "offer total must not exceed {MAX_TOTAL}"
            )));
        }

        Ok(Self {
            total_amount,
            total_discount,
            total_with_tax,
        })
    }

    /// The persisted form: `total_with_tax` rounded to money scale.
    pub fn for_storage(self) -> Self {
        Self {
            total_with_tax: round_money(self.total_with_tax),
            ..self
        }
    }

    /// Tax portion of the stored totals.
    pub fn tax_amount(&self) -> Decimal {
        self.total_with_tax - self.total_amount
    }
}
