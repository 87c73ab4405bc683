//! Folding flat joined rows back into nested listings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{Address, OrderId, OrderStatus};

use crate::dto::{OrderFlatDto, OrderItemQueryDto, OrderQueryDto};

#[derive(PartialEq, Eq, Hash)]
struct GroupKey {
    order_id: OrderId,
    name: String,
    order_date: DateTime<Utc>,
    order_status: OrderStatus,
    address: Address,
}

/// Groups flat rows by their root columns.
///
/// Groups appear in the order their first row was seen and each group keeps
/// its lines in row order, so the same input always yields the same output.
pub fn regroup_flat(rows: Vec<OrderFlatDto>) -> Vec<OrderQueryDto> {
    let mut groups: Vec<OrderQueryDto> = Vec::new();
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();

    for row in rows {
        let key = GroupKey {
            order_id: row.order_id,
            name: row.name,
            order_date: row.order_date,
            order_status: row.order_status,
            address: row.address,
        };
        let line = OrderItemQueryDto {
            order_id: row.order_id,
            item_name: row.item_name,
            order_price: row.order_price,
            count: row.count,
        };

        match positions.get(&key) {
            Some(&position) => groups[position].order_items.push(line),
            None => {
                groups.push(OrderQueryDto {
                    order_id: key.order_id,
                    name: key.name.clone(),
                    order_date: key.order_date,
                    order_status: key.order_status,
                    address: key.address.clone(),
                    order_items: vec![line],
                });
                positions.insert(key, groups.len() - 1);
            }
        }
    }
    groups
}

/// Stable-sorts every listing's lines by item name.
pub fn sort_lines_by_item_name(orders: &mut [OrderQueryDto]) {
    for order in orders {
        order
            .order_items
            .sort_by(|a, b| a.item_name.cmp(&b.item_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn row(order_id: i64, item_name: &str, count: u32) -> OrderFlatDto {
        OrderFlatDto {
            order_id: OrderId::new(order_id),
            name: "Alice".to_string(),
            order_date: DateTime::from_timestamp(1_700_000_000 + order_id, 0).unwrap(),
            order_status: OrderStatus::Order,
            address: Address::new("Seoul", "1 Main St", "00001"),
            item_name: item_name.to_string(),
            order_price: Money::from_cents(1000),
            count,
        }
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let rows = vec![
            row(2, "Widget", 1),
            row(1, "Gadget", 2),
            row(2, "Gizmo", 3),
            row(1, "Widget", 4),
        ];

        let grouped = regroup_flat(rows);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].order_id, OrderId::new(2));
        assert_eq!(grouped[1].order_id, OrderId::new(1));
        let names: Vec<_> = grouped[0]
            .order_items
            .iter()
            .map(|l| l.item_name.as_str())
            .collect();
        assert_eq!(names, vec!["Widget", "Gizmo"]);
        assert!(grouped[1].order_items.iter().all(|l| l.order_id == OrderId::new(1)));
    }

    #[test]
    fn empty_input_gives_empty_listing() {
        assert!(regroup_flat(Vec::new()).is_empty());
    }

    #[test]
    fn regrouping_is_deterministic() {
        let rows = vec![row(1, "Widget", 1), row(2, "Gadget", 1), row(1, "Gizmo", 1)];
        assert_eq!(regroup_flat(rows.clone()), regroup_flat(rows));
    }

    #[test]
    fn sort_lines_is_stable_by_name() {
        let mut grouped = regroup_flat(vec![
            row(1, "Widget", 1),
            row(1, "Gadget", 2),
            row(1, "Widget", 3),
        ]);
        sort_lines_by_item_name(&mut grouped);

        let lines: Vec<_> = grouped[0]
            .order_items
            .iter()
            .map(|l| (l.item_name.as_str(), l.count))
            .collect();
        assert_eq!(lines, vec![("Gadget", 2), ("Widget", 1), ("Widget", 3)]);
    }
}
