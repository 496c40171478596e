pub use crate::bootstrap::{BootstrapContext, BootstrapData, BootstrapRequest, SyncPlanner};
pub use crate::currencies::{active_currencies, DocQuoteStore, ExchangeRates};
pub use crate::customers::{CustomerReader, OutstandingSummary, OUTSTANDING_STATUSES};
pub use crate::delta::{canonical_entity_type, DeltaContext, DeltaData, DeltaRequest};
pub use crate::errors::SyncError;
pub use crate::inventory::InventoryReader;
pub use crate::invoices::{InvoiceReader, OPEN_STATUSES};
pub use crate::pagination::{PageInfo, Paginated};
pub use crate::payments::PaymentReader;
pub use crate::profiles::{
    OpeningShift, ProfileDetail, ProfilePayment, ProfileReader, ProfileSummary,
};
pub use crate::rows::*;
