//! Domain models for ordering-service.

mod barrel;
mod line_item;
mod order;
mod quote;

pub use barrel::{Barrel, BarrelCondition, PreviousContent, WoodType};
pub use line_item::{LineItemInput, OrderItem, QuoteItem};
pub use order::{
    CreateOrder, ListOrdersFilter, Order, OrderStatus, PaymentStatus, UpdateOrder,
};
pub use quote::{CreateQuote, ListQuotesFilter, Quote, QuoteStatus, UpdateQuote};
