//! Billing module: plan catalog, subscriptions and entitlements.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Every
//! time-dependent operation takes `now` explicitly.

pub mod entitlement;
pub mod plan;
pub mod subscription;
pub mod usage;
pub mod webhook;

pub use entitlement::{AccessReason, FeatureAccess, LimitStatus, check_feature, check_limit};
pub use plan::{FeatureKey, Features, LimitKey, Limits, Plan, PlanCatalog, PREMIUM, STARTER};
pub use subscription::{
    Ciclo, MetodoPagamento, Pagamento, PaymentInfo, PaymentRecord, PaymentStatus, Subscription,
    SubscriptionStatus, SubscriptionSummary, Uso, add_months,
};
pub use usage::{UsageCounts, count_since};
pub use webhook::{
    PaymentEvent, SIGNATURE_HEADER, SignatureError, WebhookDados, WebhookEvent, WebhookOutcome,
    sign_payload, verify_signature,
};
