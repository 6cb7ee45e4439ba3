//! Shopping basket arithmetic.
//!
//! The basket is a list of `(product, quantity)` lines with at most one line
//! per product. Quantities never go negative: a line whose quantity reaches
//! zero is removed.

use serde::{Deserialize, Serialize};

use crate::catalog::{Product, find_product};
use crate::types::{Price, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    lines: Vec<BasketLine>,
}

impl Basket {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a basket from raw lines, merging duplicates and dropping empty lines.
    pub fn from_lines(lines: impl IntoIterator<Item = BasketLine>) -> Self {
        let mut basket = Self::new();
        for line in lines {
            basket.add(line.product_id, line.quantity);
        }
        basket
    }

    #[must_use]
    pub fn lines(&self) -> &[BasketLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.line(product_id).map_or(0, |line| line.quantity)
    }

    fn line(&self, product_id: ProductId) -> Option<&BasketLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    /// Add `quantity` units, merging into an existing line.
    ///
    /// Adding zero units is a no-op.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(BasketLine {
                product_id,
                quantity,
            }),
        }
    }

    /// Change a line's quantity by `delta`, clamping at zero.
    ///
    /// A line that reaches zero is removed. Returns `false` when the product
    /// has no line in the basket.
    pub fn adjust(&mut self, product_id: ProductId, delta: i64) -> bool {
        let Some(index) = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id)
        else {
            return false;
        };

        let current = self.lines.get(index).map_or(0, |line| i64::from(line.quantity));
        let next = u32::try_from((current + delta).max(0)).unwrap_or(u32::MAX);
        if next == 0 {
            self.lines.remove(index);
        } else if let Some(line) = self.lines.get_mut(index) {
            line.quantity = next;
        }
        true
    }

    /// Remove a product's line entirely. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Product ids in line order, one entry per line.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    /// Sum of `unit price × quantity` over lines whose product is in the catalog.
    #[must_use]
    pub fn subtotal(&self, catalog: &[Product]) -> Price {
        self.lines
            .iter()
            .filter_map(|line| {
                find_product(catalog, line.product_id).map(|product| product.price * line.quantity)
            })
            .sum()
    }

    /// Subtotal, shipping and total for the basket.
    #[must_use]
    pub fn totals(
        &self,
        catalog: &[Product],
        policy: &ShippingPolicy,
        free_shipping_achieved: bool,
    ) -> BasketTotals {
        let subtotal = self.subtotal(catalog);
        let reaches_threshold = policy.reaches_threshold(subtotal);
        let shipping = if reaches_threshold || free_shipping_achieved {
            Price::ZERO
        } else {
            policy.flat_fee
        };
        BasketTotals {
            subtotal,
            shipping,
            total: subtotal + shipping,
            reaches_threshold,
        }
    }
}

/// Flat-rate shipping waived above a subtotal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub free_threshold: Price,
    pub flat_fee: Price,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_threshold: Price::from_cents(2000),
            flat_fee: Price::from_cents(500),
        }
    }
}

impl ShippingPolicy {
    #[must_use]
    pub fn reaches_threshold(&self, subtotal: Price) -> bool {
        subtotal >= self.free_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasketTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
    /// The subtotal alone qualifies for free shipping.
    pub reaches_threshold: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::product;

    fn id(n: i64) -> ProductId {
        ProductId::new(n)
    }

    fn line(product: i64, quantity: u32) -> BasketLine {
        BasketLine {
            product_id: id(product),
            quantity,
        }
    }

    #[test]
    fn test_add_merges_existing_line() {
        let mut basket = Basket::new();
        basket.add(id(1), 2);
        basket.add(id(2), 1);
        basket.add(id(1), 3);
        assert_eq!(basket.lines().len(), 2);
        assert_eq!(basket.quantity_of(id(1)), 5);
        assert_eq!(basket.item_count(), 6);
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut basket = Basket::new();
        basket.add(id(1), 0);
        assert!(basket.is_empty());
    }

    #[test]
    fn test_decrementing_last_unit_removes_line() {
        let mut basket = Basket::new();
        basket.add(id(1), 1);
        assert!(basket.adjust(id(1), -1));
        assert!(basket.is_empty());
    }

    #[test]
    fn test_adjust_clamps_at_zero() {
        let mut basket = Basket::new();
        basket.add(id(1), 2);
        basket.add(id(2), 1);
        assert!(basket.adjust(id(1), -5));
        assert_eq!(basket.quantity_of(id(1)), 0);
        assert_eq!(basket.product_ids(), vec![id(2)]);
    }

    #[test]
    fn test_adjust_increments() {
        let mut basket = Basket::new();
        basket.add(id(1), 1);
        assert!(basket.adjust(id(1), 1));
        assert_eq!(basket.quantity_of(id(1)), 2);
    }

    #[test]
    fn test_adjust_unknown_line() {
        let mut basket = Basket::new();
        assert!(!basket.adjust(id(9), 1));
        assert!(basket.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut basket = Basket::from_lines([
            line(1, 1),
            line(2, 4),
        ]);
        assert!(basket.remove(id(1)));
        assert!(!basket.remove(id(1)));
        assert_eq!(basket.item_count(), 4);
        basket.clear();
        assert!(basket.is_empty());
    }

    #[test]
    fn test_from_lines_merges_and_drops_empty() {
        let basket = Basket::from_lines([
            line(1, 1),
            line(2, 0),
            line(1, 2),
        ]);
        assert_eq!(basket.lines(), &[line(1, 3)]);
    }

    #[test]
    fn test_subtotal_ignores_unknown_products() {
        let catalog = vec![product(1, "Tea", "Drinks", 350), product(2, "Jam", "Pantry", 425)];
        let basket = Basket::from_lines([
            line(1, 2),
            line(2, 1),
            line(99, 7),
        ]);
        assert_eq!(basket.subtotal(&catalog), Price::from_cents(1125));
    }

    #[test]
    fn test_shipping_charged_just_below_threshold() {
        let catalog = vec![product(1, "Cheese", "Deli", 1999)];
        let basket = Basket::from_lines([line(1, 1)]);
        let totals = basket.totals(&catalog, &ShippingPolicy::default(), false);
        assert_eq!(totals.shipping, Price::from_cents(500));
        assert_eq!(totals.total, Price::from_cents(2499));
        assert!(!totals.reaches_threshold);
    }

    #[test]
    fn test_shipping_free_at_threshold() {
        let catalog = vec![product(1, "Cheese", "Deli", 2000)];
        let basket = Basket::from_lines([line(1, 1)]);
        let totals = basket.totals(&catalog, &ShippingPolicy::default(), false);
        assert_eq!(totals.shipping, Price::ZERO);
        assert_eq!(totals.total, Price::from_cents(2000));
        assert!(totals.reaches_threshold);
    }

    #[test]
    fn test_shipping_stays_free_once_achieved() {
        let catalog = vec![product(1, "Cheese", "Deli", 500)];
        let basket = Basket::from_lines([line(1, 1)]);
        let totals = basket.totals(&catalog, &ShippingPolicy::default(), true);
        assert_eq!(totals.shipping, Price::ZERO);
        assert_eq!(totals.total.to_string(), "5.00€");
    }
}
