use common::OrderStatus;

/// Root filter applied by [`OrderStore::search_orders`](crate::OrderStore::search_orders).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    /// Substring the member name must contain.
    pub member_name: Option<String>,

    /// Exact status the order must have.
    pub status: Option<OrderStatus>,

    /// Maximum number of roots to return.
    pub max_results: usize,
}

impl OrderFilter {
    /// Cap applied when a caller does not choose one.
    pub const DEFAULT_MAX_RESULTS: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_name(mut self, name: impl Into<String>) -> Self {
        self.member_name = Some(name.into());
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Returns true if the filter accepts a row with these column values.
    pub fn matches(&self, member_name: &str, status: OrderStatus) -> bool {
        if let Some(ref name) = self.member_name
            && !member_name.contains(name.as_str())
        {
            return false;
        }
        if let Some(expected) = self.status
            && status != expected
        {
            return false;
        }
        true
    }
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            member_name: None,
            status: None,
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }
}

/// Offset/limit window applied at the query level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

/// Identifier sequences maintained by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sequence {
    Member,
    Item,
    Delivery,
    Order,
    OrderItem,
}

impl Sequence {
    /// Name of the backing database sequence.
    pub fn name(&self) -> &'static str {
        match self {
            Sequence::Member => "member_seq",
            Sequence::Item => "item_seq",
            Sequence::Delivery => "delivery_seq",
            Sequence::Order => "order_seq",
            Sequence::OrderItem => "order_item_seq",
        }
    }
}
