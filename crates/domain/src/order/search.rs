use common::OrderStatus;
use order_store::OrderFilter;

/// Transient search criteria for order listings.
///
/// Blank member names are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSearch {
    pub member_name: Option<String>,
    pub order_status: Option<OrderStatus>,
}

impl OrderSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_name(mut self, name: impl Into<String>) -> Self {
        self.member_name = Some(name.into());
        self
    }

    pub fn order_status(mut self, status: OrderStatus) -> Self {
        self.order_status = Some(status);
        self
    }

    pub(crate) fn to_filter(&self) -> OrderFilter {
        let mut filter = OrderFilter::new();
        if let Some(name) = self.member_name.as_deref().map(str::trim)
            && !name.is_empty()
        {
            filter = filter.member_name(name);
        }
        if let Some(status) = self.order_status {
            filter = filter.status(status);
        }
        filter
    }
}
