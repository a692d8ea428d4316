//! Read-only order history queries

use common::types::order::Order;
use external_api::http::order::OrderHistoryQuery;
use itertools::Itertools;

use crate::{State, StateError};

impl State {
    /// Fetch one page of order history, newest first
    ///
    /// Returns the page along with the number of orders matching the query
    /// across all pages. A page past the end is empty
    pub fn order_history(
        &self,
        query: &OrderHistoryQuery,
    ) -> Result<(Vec<Order>, usize), StateError> {
        if query.page == 0 {
            return Err(StateError::InvalidQuery("pages are 1-indexed".to_string()));
        }
        if query.page_size == 0 {
            return Err(StateError::InvalidQuery("page size must be positive".to_string()));
        }

        let search = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let inner = self.read_inner()?;
        let matching: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| query.owner.as_ref().is_none_or(|owner| &o.owner == owner))
            .filter(|o| query.status.is_none_or(|status| o.status == status))
            .filter(|o| search.as_deref().is_none_or(|needle| matches_search(o, needle)))
            .sorted_by(|a, b| b.selection_key().cmp(&a.selection_key()))
            .collect();

        let total = matching.len();
        let skip = (query.page - 1).saturating_mul(query.page_size);
        let page = matching.into_iter().skip(skip).take(query.page_size).cloned().collect();
        Ok((page, total))
    }
}

/// Whether an order's id, side, status, or commitment contains the lowercase
/// search text
fn matches_search(order: &Order, needle: &str) -> bool {
    [
        order.id.to_string(),
        order.side().to_string(),
        order.status.to_string(),
        order.commitment.to_string(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod test {
    use circuit_types::{OrderSide, VolumeTier};
    use common::types::{
        mocks::{MOCK_OWNER, mock_order_at, mock_order_with},
        order::OrderStatus,
    };

    use crate::mock::mock_state;

    use super::*;

    /// Tests paging through an owner's history
    #[test]
    fn test_history_pagination() {
        let state = mock_state();
        let ids: Vec<_> =
            (1..=5).map(|t| state.add_order(mock_order_at(t)).unwrap()).collect();
        let other = mock_order_with("0xbb".to_string(), OrderSide::Sell, VolumeTier::Large, 6);
        state.add_order(other).unwrap();

        let query = OrderHistoryQuery {
            owner: Some(MOCK_OWNER.to_string()),
            page: 1,
            page_size: 2,
            ..Default::default()
        };
        let (page, total) = state.order_history(&query).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.iter().map(|o| o.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let (last, _) = state.order_history(&OrderHistoryQuery { page: 3, ..query.clone() }).unwrap();
        assert_eq!(last.iter().map(|o| o.id).collect::<Vec<_>>(), vec![ids[0]]);

        let (past_end, total) =
            state.order_history(&OrderHistoryQuery { page: 9, ..query }).unwrap();
        assert!(past_end.is_empty());
        assert_eq!(total, 5);
    }

    /// Tests filtering by status
    #[test]
    fn test_history_status_filter() {
        let state = mock_state();
        let order = mock_order_at(1);
        state.add_order(order.clone()).unwrap();
        state.add_order(mock_order_at(2)).unwrap();
        state.cancel_order(&order.owner, &order.id).unwrap();

        let query =
            OrderHistoryQuery { status: Some(OrderStatus::Cancelled), ..Default::default() };
        let (page, total) = state.order_history(&query).unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, order.id);
    }

    /// Tests that malformed queries are rejected
    #[test]
    fn test_history_invalid_query() {
        let state = mock_state();
        let zero_page = OrderHistoryQuery { page: 0, ..Default::default() };
        assert!(matches!(state.order_history(&zero_page), Err(StateError::InvalidQuery(_))));

        let zero_size = OrderHistoryQuery { page_size: 0, ..Default::default() };
        assert!(matches!(state.order_history(&zero_size), Err(StateError::InvalidQuery(_))));
    }

    /// Tests free text search over ids, sides, and commitments
    #[test]
    fn test_history_search() {
        let state = mock_state();
        let owner = MOCK_OWNER.to_string();
        let buy = mock_order_with(owner.clone(), OrderSide::Buy, VolumeTier::Small, 1);
        let sell = mock_order_with(owner, OrderSide::Sell, VolumeTier::Small, 2);
        let buy_id = state.add_order(buy.clone()).unwrap();
        state.add_order(sell).unwrap();

        let search = |text: &str| {
            let query = OrderHistoryQuery { search: Some(text.to_string()), ..Default::default() };
            state.order_history(&query).unwrap()
        };

        let (orders, total) = search("SELL");
        assert_eq!(total, 1);
        assert_eq!(orders[0].side(), OrderSide::Sell);

        let id_prefix = &buy_id.to_string()[..8];
        let (orders, _) = search(id_prefix);
        assert!(orders.iter().any(|o| o.id == buy_id));

        let commitment_hex = buy.commitment.to_string().to_uppercase();
        let (orders, total) = search(&commitment_hex);
        assert_eq!(total, 1);
        assert_eq!(orders[0].id, buy_id);

        // Blank search text does not filter
        assert_eq!(search("  ").1, 2);
    }
}
