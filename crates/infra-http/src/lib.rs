// Carrier Infrastructure - Outbound Adapters
// Implements: PaymentProvider (HTTP), EmailSender (SMTP)

mod payment_provider;
mod smtp;

pub use payment_provider::{HttpPaymentProvider, PaymentProviderConfig};
pub use smtp::{SmtpConfig, SmtpEmailSender};
