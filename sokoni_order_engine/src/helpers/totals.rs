use sok_common::Cents;

use crate::db_types::OrderItem;

/// Recomputes the billable total of an order from its line items.
///
/// Missing items contribute nothing. Reviewed items are billed for their fulfilled quantity,
/// unreviewed items for the ordered quantity, always at the price captured at purchase time.
/// The result depends only on the line items passed in, so recalculating twice in a row gives
/// the same answer.
pub fn calculate_order_total(items: &[OrderItem]) -> Cents {
    items.iter().map(OrderItem::line_total).sum()
}
