//! Payment gateway webhooks: event model and HMAC-SHA256 signatures.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::{Ciclo, MetodoPagamento, PaymentRecord, PaymentStatus, PlanCatalog, Subscription};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex digest of the raw body>`.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing webhook signature")]
    Missing,

    #[error("malformed webhook signature")]
    Malformed,

    #[error("webhook signature mismatch")]
    Mismatch,

    #[error("invalid webhook key")]
    Key,
}

pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Key)?;
    mac.update(body);
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify `header` against the raw request body. Comparison is constant-time.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?.trim();
    let digest = header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::Malformed)?;
    let provided = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Key)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Body posted by the gateway: `{"evento": "...", "dados": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub evento: String,
    #[serde(default)]
    pub dados: WebhookDados,
}

/// `valor` is in centavos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookDados {
    pub cliente_id: Option<String>,
    pub valor: Option<u64>,
    pub transacao_id: Option<String>,
    pub metodo: Option<MetodoPagamento>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Approved,
    Declined,
    Unsupported,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Activated,
    MarkedPending,
    Ignored,
}

impl WebhookEvent {
    pub fn kind(&self) -> PaymentEvent {
        match self.evento.as_str() {
            "pagamento_aprovado" => PaymentEvent::Approved,
            "pagamento_recusado" => PaymentEvent::Declined,
            _ => PaymentEvent::Unsupported,
        }
    }

    pub fn cliente_id(&self) -> Option<&str> {
        self.dados.cliente_id.as_deref().filter(|c| !c.is_empty())
    }
}

impl Subscription {
    /// Apply a (trusted) gateway event to the matched subscription.
    ///
    /// A missing `valor` falls back to the plan price for the current cycle.
    pub fn apply_payment_webhook(
        &mut self,
        event: &WebhookEvent,
        catalog: &PlanCatalog,
        now: DateTime<Utc>,
    ) -> WebhookOutcome {
        match event.kind() {
            PaymentEvent::Approved => {
                let fallback = catalog.get(&self.plano).map_or(0, |p| match self.ciclo {
                    Ciclo::Anual => p.preco_anual_centavos,
                    Ciclo::Mensal => p.preco_centavos,
                });
                let record = PaymentRecord {
                    data: now,
                    valor_centavos: event.dados.valor.unwrap_or(fallback),
                    status: PaymentStatus::Aprovado,
                    transacao_id: event.dados.transacao_id.clone(),
                    metodo: event.dados.metodo.unwrap_or(self.pagamento.metodo),
                };
                self.approve_payment(record, now);
                WebhookOutcome::Activated
            }
            PaymentEvent::Declined => {
                self.decline_payment(now);
                WebhookOutcome::MarkedPending
            }
            PaymentEvent::Unsupported => WebhookOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PaymentInfo, STARTER, SubscriptionStatus, add_months};
    use identyflow_core::UserId;

    fn event(evento: &str, valor: Option<u64>) -> WebhookEvent {
        WebhookEvent {
            evento: evento.to_string(),
            dados: WebhookDados {
                cliente_id: Some("cus_1".into()),
                valor,
                transacao_id: Some("tx_9".into()),
                metodo: None,
            },
        }
    }

    fn subscribed(now: DateTime<Utc>) -> Subscription {
        Subscription::create_or_renew(
            None,
            UserId::new(),
            &PlanCatalog::builtin(),
            STARTER,
            Ciclo::Mensal,
            Some(PaymentInfo {
                gateway_id: Some("cus_1".into()),
                ..Default::default()
            }),
            now,
        )
        .unwrap()
    }

    #[test]
    fn signature_roundtrip_and_tamper_detection() {
        let body = br#"{"evento":"pagamento_aprovado","dados":{}}"#;
        let sig = sign_payload(b"whsec", body).unwrap();
        assert!(sig.starts_with("sha256="));
        assert_eq!(verify_signature(b"whsec", body, Some(&sig)), Ok(()));

        let tampered = br#"{"evento":"pagamento_aprovado","dados":{"valor":1}}"#;
        assert_eq!(
            verify_signature(b"whsec", tampered, Some(&sig)),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(b"other", body, Some(&sig)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn signature_header_shape_is_checked() {
        let body = b"{}";
        assert_eq!(verify_signature(b"k", body, None), Err(SignatureError::Missing));
        assert_eq!(
            verify_signature(b"k", body, Some("md5=abcd")),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(b"k", body, Some("sha256=zz")),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn approved_payment_reactivates_and_extends() {
        let t = Utc::now();
        let mut sub = subscribed(t);
        sub.status = SubscriptionStatus::Pendente;
        let later = t + chrono::Duration::days(20);

        let outcome = sub.apply_payment_webhook(
            &event("pagamento_aprovado", Some(7_990)),
            &PlanCatalog::builtin(),
            later,
        );
        assert_eq!(outcome, WebhookOutcome::Activated);
        assert_eq!(sub.status, SubscriptionStatus::Ativa);
        assert_eq!(sub.data_expiracao, add_months(later, 1));
        assert_eq!(sub.data_proxima_cobranca, Some(sub.data_expiracao));
        let last = sub.historico_pagamentos.last().unwrap();
        assert_eq!(last.transacao_id.as_deref(), Some("tx_9"));
        assert_eq!(last.valor_centavos, 7_990);
    }

    #[test]
    fn declined_payment_marks_pending_and_unknown_events_are_ignored() {
        let t = Utc::now();
        let mut sub = subscribed(t);
        let history = sub.historico_pagamentos.len();

        let catalog = PlanCatalog::builtin();
        assert_eq!(
            sub.apply_payment_webhook(&event("pagamento_recusado", None), &catalog, t),
            WebhookOutcome::MarkedPending
        );
        assert_eq!(sub.status, SubscriptionStatus::Pendente);

        assert_eq!(
            sub.apply_payment_webhook(&event("assinatura_criada", None), &catalog, t),
            WebhookOutcome::Ignored
        );
        assert_eq!(sub.historico_pagamentos.len(), history);
    }

    #[test]
    fn event_parses_from_gateway_json() {
        let raw = r#"{"evento":"pagamento_aprovado","dados":{"clienteId":"cus_1","valor":14990,"metodo":"pix"}}"#;
        let ev: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev.kind(), PaymentEvent::Approved);
        assert_eq!(ev.cliente_id(), Some("cus_1"));
        assert_eq!(ev.dados.metodo, Some(MetodoPagamento::Pix));
    }
}
