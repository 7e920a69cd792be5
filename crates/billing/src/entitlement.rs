//! Entitlement answers: may this principal use a feature, is it within a limit.

use chrono::{DateTime, Utc};
use serde::Serialize;

use identyflow_auth::Role;

use crate::{FeatureKey, LimitKey, PlanCatalog, Subscription};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    SemAssinatura,
    Autorizado,
    PlanoInsuficiente,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    pub tem_acesso: bool,
    pub motivo: AccessReason,
    pub plano_atual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    pub dentro_do_limite: bool,
    pub valor_atual: u32,
    pub limite: u32,
    pub restante: i64,
    pub plano_atual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo: Option<AccessReason>,
}

fn active<'a>(
    sub: Option<&'a Subscription>,
    role: Role,
    now: DateTime<Utc>,
) -> Option<&'a Subscription> {
    sub.filter(|s| s.is_active(role, now))
}

/// `feature` is `None` when the caller named a key the catalog does not know.
pub fn check_feature(
    sub: Option<&Subscription>,
    role: Role,
    catalog: &PlanCatalog,
    feature: Option<FeatureKey>,
    now: DateTime<Utc>,
) -> FeatureAccess {
    let Some(sub) = active(sub, role, now) else {
        return FeatureAccess {
            tem_acesso: false,
            motivo: AccessReason::SemAssinatura,
            plano_atual: None,
        };
    };
    let granted = feature.is_some_and(|f| sub.has_feature(catalog, f));
    FeatureAccess {
        tem_acesso: granted,
        motivo: if granted {
            AccessReason::Autorizado
        } else {
            AccessReason::PlanoInsuficiente
        },
        plano_atual: Some(sub.plano.clone()),
    }
}

pub fn check_limit(
    sub: Option<&Subscription>,
    role: Role,
    catalog: &PlanCatalog,
    key: LimitKey,
    current: u32,
    now: DateTime<Utc>,
) -> LimitStatus {
    let Some(sub) = active(sub, role, now) else {
        return LimitStatus {
            dentro_do_limite: false,
            valor_atual: current,
            limite: 0,
            restante: 0,
            plano_atual: None,
            motivo: Some(AccessReason::SemAssinatura),
        };
    };
    let limite = catalog
        .get(&sub.plano)
        .map_or(0, |p| p.limites.get(key));
    LimitStatus {
        dentro_do_limite: sub.within_limit(catalog, key, current),
        valor_atual: current,
        limite,
        restante: i64::from(limite) - i64::from(current),
        plano_atual: Some(sub.plano.clone()),
        motivo: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ciclo, PREMIUM, STARTER};
    use chrono::Duration;
    use identyflow_core::UserId;

    fn starter(now: DateTime<Utc>) -> Subscription {
        Subscription::auto_provision(UserId::new(), Role::Admin, now)
    }

    #[test]
    fn missing_subscription_means_sem_assinatura() {
        let access = check_feature(
            None,
            Role::Admin,
            &PlanCatalog::builtin(),
            Some(FeatureKey::Backup),
            Utc::now(),
        );
        assert!(!access.tem_acesso);
        assert_eq!(access.motivo, AccessReason::SemAssinatura);
    }

    #[test]
    fn starter_is_told_plan_is_insufficient() {
        let t = Utc::now();
        let sub = starter(t);
        let catalog = PlanCatalog::builtin();

        let denied = check_feature(Some(&sub), Role::Admin, &catalog, Some(FeatureKey::Backup), t);
        assert_eq!(denied.motivo, AccessReason::PlanoInsuficiente);
        assert_eq!(denied.plano_atual.as_deref(), Some(STARTER));

        let ok = check_feature(Some(&sub), Role::Admin, &catalog, Some(FeatureKey::TurmasAuto), t);
        assert!(ok.tem_acesso);

        let unknown = check_feature(Some(&sub), Role::Admin, &catalog, None, t);
        assert!(!unknown.tem_acesso);
    }

    #[test]
    fn expired_subscription_has_no_access() {
        let t = Utc::now();
        let sub = Subscription::create_or_renew(
            None,
            UserId::new(),
            &PlanCatalog::builtin(),
            PREMIUM,
            Ciclo::Mensal,
            None,
            t,
        )
        .unwrap();
        let later = t + Duration::days(60);
        let access = check_feature(
            Some(&sub),
            Role::Admin,
            &PlanCatalog::builtin(),
            Some(FeatureKey::Backup),
            later,
        );
        assert_eq!(access.motivo, AccessReason::SemAssinatura);
    }

    #[test]
    fn limit_status_reports_remaining() {
        let t = Utc::now();
        let sub = starter(t);
        let catalog = PlanCatalog::builtin().with_limit(STARTER, LimitKey::Instrutores, 3);

        let under = check_limit(Some(&sub), Role::Admin, &catalog, LimitKey::Instrutores, 2, t);
        assert!(under.dentro_do_limite);
        assert_eq!((under.limite, under.restante), (3, 1));

        let at = check_limit(Some(&sub), Role::Admin, &catalog, LimitKey::Instrutores, 3, t);
        assert!(!at.dentro_do_limite);
        assert_eq!(at.restante, 0);

        let none = check_limit(None, Role::Admin, &catalog, LimitKey::Instrutores, 0, t);
        assert!(!none.dentro_do_limite);
        assert_eq!(none.motivo, Some(AccessReason::SemAssinatura));
    }
}
