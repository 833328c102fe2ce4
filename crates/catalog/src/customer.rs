//! Customers and customer groups (pricing tiers).

use serde::{Deserialize, Serialize};

use merx_core::{CustomerGroupId, CustomerId, PriceListId, Rate};

/// A pricing tier shared by a set of customers.
///
/// Carries a flat fallback discount and, optionally, the group's price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub id: CustomerGroupId,
    pub name: String,
    pub discount: Rate,
    pub price_list_id: Option<PriceListId>,
}

/// A customer account. References at most one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub group_id: Option<CustomerGroupId>,
}
