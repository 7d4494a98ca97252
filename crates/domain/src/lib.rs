//! Business core of the storefront.
//!
//! Checkout converts a cart into a durable order, payment record and
//! ledger mutations in one atomic unit; cancellation is its compensating
//! operation. The cart and credit services cover the surrounding flows,
//! and the collaborator traits ([`AddressBook`], [`AuditSink`]) stand in
//! for the externally-owned address book and audit trail.

mod address;
mod audit;
mod cart;
mod checkout;
mod credit;
mod error;

pub use address::{Address, AddressBook, InMemoryAddressBook};
pub use audit::{AuditError, AuditSink, InMemoryAuditSink, PaymentAuditRecord};
pub use cart::CartService;
pub use checkout::{CheckoutRequest, CheckoutService};
pub use credit::{CreditService, INITIAL_BONUS};
pub use error::{CartError, CheckoutError, CreditError};
