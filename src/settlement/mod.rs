// Payment settlement: submits completed-ride fares to the external
// gateway and reconciles lost responses against the ride ledger.
pub mod gateway;
pub mod ledger;

pub use gateway::{PaymentGatewayClient, RetryPolicy};
pub use ledger::{CompletedRideLedger, SettledRideSource};
