//! Read-only aggregations behind the dashboard endpoints.
//!
//! Callers pass already scoped slices; nothing here filters by principal.
//! Amounts are in centavos.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use identyflow_auth::{Role, User};
use identyflow_billing::{Ciclo, PREMIUM, PlanCatalog, STARTER, Subscription, SubscriptionStatus};
use identyflow_core::{AlunoId, CursoId, UserId};

use crate::{Aluno, Curso, Turma, TurmaStatus};

/// Instructor share of course revenue.
pub const COMISSAO_INSTRUTOR_PERCENT: u64 = 30;

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountBy {
    pub chave: Option<String>,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlunoResumo {
    pub id: AlunoId,
    pub nome: String,
    pub cursos: Vec<String>,
    pub criado_em: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_alunos: u32,
    pub total_cursos: u32,
    pub total_usuarios: u32,
    pub alunos_recentes: u32,
    pub alunos_hoje: u32,
    pub ultimos_alunos: Vec<AlunoResumo>,
    pub cursos_por_aluno: Vec<CountBy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub ano: i32,
    pub mes: u32,
    pub count: u32,
}

/// `dia`: 1 = Sunday .. 7 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub dia: u32,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub cadastros_por_mes: Vec<MonthCount>,
    pub por_escolaridade: Vec<CountBy>,
    pub todos_cursos: Vec<CountBy>,
    pub por_dia_semana: Vec<WeekdayCount>,
    pub taxa_crescimento: f64,
    pub alunos_mes_atual: u32,
    pub alunos_mes_anterior: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximoAluno {
    pub nome: String,
    pub curso: String,
    pub data_inicio: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurmaResumo {
    pub curso_nome: String,
    pub data_inicio: Option<NaiveDate>,
    pub horario: Option<String>,
    pub capacidade: u32,
    pub alunos_inscritos: u32,
    pub status: TurmaStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricoAluno {
    pub aluno_nome: String,
    pub curso: String,
    pub data_conclusao: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrutorStats {
    pub proximos_alunos: Vec<ProximoAluno>,
    pub minhas_turmas: Vec<TurmaResumo>,
    pub historico_alunos: Vec<HistoricoAluno>,
    pub ganhos_mes_centavos: u64,
    pub ganhos_total_centavos: u64,
    pub turmas_ativas: u32,
    pub alunos_atendidos: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsuariosMetrics {
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribuicao {
    pub god: u32,
    pub admin: u32,
    pub instrutor: u32,
    pub god_percent: f64,
    pub admin_percent: f64,
    pub instrutor_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssinaturasMetrics {
    pub starter: u32,
    pub premium: u32,
    pub cancelados: u32,
    pub vencem_em30_dias: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceitaMetrics {
    pub mensal_centavos: u64,
    pub anual_centavos: u64,
    pub ticket_medio_centavos: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SistemaMetrics {
    pub total_alunos: u32,
    pub alunos_este_mes: u32,
    pub crescimento_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GodMetrics {
    pub usuarios: UsuariosMetrics,
    pub distribuicao: Distribuicao,
    pub assinaturas: AssinaturasMetrics,
    pub receita: ReceitaMetrics,
    pub sistema: SistemaMetrics,
}

fn count<I: IntoIterator>(items: I) -> u32 {
    u32::try_from(items.into_iter().count()).unwrap_or(u32::MAX)
}

fn midnight(day: NaiveDate, fallback: DateTime<Utc>) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map_or(fallback, |n| Utc.from_utc_datetime(&n))
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.date_naive(), now)
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    midnight(first, now)
}

fn enrolled<'a>(alunos: &'a [Aluno], turma: &Turma) -> Vec<&'a Aluno> {
    alunos.iter().filter(|a| a.turma_id == Some(turma.id)).collect()
}

fn first_course(aluno: &Aluno, turma: &Turma, cursos: &HashMap<CursoId, &Curso>) -> String {
    aluno
        .cursos
        .first()
        .cloned()
        .or_else(|| cursos.get(&turma.curso_id).map(|c| c.nome.clone()))
        .unwrap_or_else(|| "N/A".to_string())
}

fn months_ago(now: DateTime<Utc>, n: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(n)).unwrap_or(now)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn growth_percent(current: u32, previous: u32) -> f64 {
    match (current, previous) {
        (0, 0) => 0.0,
        (_, 0) => 100.0,
        (c, p) => round1((f64::from(c) - f64::from(p)) / f64::from(p) * 100.0),
    }
}

fn percent(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(f64::from(part) / f64::from(total) * 100.0)
    }
}

/// Group by key, most frequent first, ties by key.
fn grouped<I>(keys: I) -> Vec<CountBy>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut counts: BTreeMap<Option<String>, u32> = BTreeMap::new();
    for k in keys {
        *counts.entry(k).or_default() += 1;
    }
    let mut out: Vec<CountBy> = counts
        .into_iter()
        .map(|(chave, count)| CountBy { chave, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.chave.cmp(&b.chave)));
    out
}

fn course_counts(alunos: &[Aluno]) -> Vec<CountBy> {
    grouped(alunos.iter().flat_map(|a| a.cursos.iter().cloned().map(Some)))
}

impl Dashboard {
    pub fn compute(
        alunos: &[Aluno],
        total_cursos: u32,
        total_usuarios: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let week_ago = now - Duration::days(7);
        let today = start_of_day(now);

        let mut recent: Vec<&Aluno> = alunos.iter().collect();
        recent.sort_by(|a, b| b.criado_em.cmp(&a.criado_em));

        let mut cursos_por_aluno = course_counts(alunos);
        cursos_por_aluno.truncate(TOP_N);

        Self {
            total_alunos: count(alunos),
            total_cursos,
            total_usuarios,
            alunos_recentes: count(alunos.iter().filter(|a| a.criado_em >= week_ago)),
            alunos_hoje: count(alunos.iter().filter(|a| a.criado_em >= today)),
            ultimos_alunos: recent
                .into_iter()
                .take(TOP_N)
                .map(|a| AlunoResumo {
                    id: a.id,
                    nome: a.nome.clone(),
                    cursos: a.cursos.clone(),
                    criado_em: a.criado_em,
                })
                .collect(),
            cursos_por_aluno,
        }
    }
}

impl Analytics {
    pub fn compute(alunos: &[Aluno], now: DateTime<Utc>) -> Self {
        let six_months_ago = months_ago(now, 6);
        let mut per_month: BTreeMap<(i32, u32), u32> = BTreeMap::new();
        for a in alunos.iter().filter(|a| a.criado_em >= six_months_ago) {
            *per_month
                .entry((a.criado_em.year(), a.criado_em.month()))
                .or_default() += 1;
        }

        let mut per_weekday: BTreeMap<u32, u32> = BTreeMap::new();
        for a in alunos {
            *per_weekday
                .entry(a.criado_em.weekday().number_from_sunday())
                .or_default() += 1;
        }

        let one_month_ago = months_ago(now, 1);
        let two_months_ago = months_ago(now, 2);
        let atual = count(alunos.iter().filter(|a| a.criado_em >= one_month_ago));
        let anterior = count(
            alunos
                .iter()
                .filter(|a| a.criado_em >= two_months_ago && a.criado_em < one_month_ago),
        );

        Self {
            cadastros_por_mes: per_month
                .into_iter()
                .map(|((ano, mes), count)| MonthCount { ano, mes, count })
                .collect(),
            por_escolaridade: grouped(alunos.iter().map(|a| a.escolaridade.clone())),
            todos_cursos: course_counts(alunos),
            por_dia_semana: per_weekday
                .into_iter()
                .map(|(dia, count)| WeekdayCount { dia, count })
                .collect(),
            taxa_crescimento: growth_percent(atual, anterior),
            alunos_mes_atual: atual,
            alunos_mes_anterior: anterior,
        }
    }
}

impl InstrutorStats {
    /// `turmas` are the instrutor's turmas; `alunos` those enrolled in them.
    pub fn compute(turmas: &[Turma], cursos: &[Curso], alunos: &[Aluno], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let month_start = start_of_month(now).date_naive();
        let cursos: HashMap<CursoId, &Curso> = cursos.iter().map(|c| (c.id, c)).collect();

        let mut ordered: Vec<&Turma> = turmas.iter().collect();
        ordered.sort_by(|a, b| b.data_inicio.cmp(&a.data_inicio));

        let mut upcoming: Vec<&Turma> = turmas
            .iter()
            .filter(|t| t.status == TurmaStatus::Ativa && t.data_inicio.is_some_and(|d| d >= today))
            .collect();
        upcoming.sort_by_key(|t| t.data_inicio);
        let proximos_alunos = upcoming
            .iter()
            .flat_map(|t| {
                let cursos = &cursos;
                enrolled(alunos, t).into_iter().map(move |a| ProximoAluno {
                    nome: a.nome.clone(),
                    curso: first_course(a, t, cursos),
                    data_inicio: t.data_inicio,
                })
            })
            .take(10)
            .collect();

        let mut finished: Vec<&Turma> = turmas
            .iter()
            .filter(|t| t.status == TurmaStatus::Concluida)
            .collect();
        finished.sort_by(|a, b| b.data_fim.cmp(&a.data_fim));
        let historico_alunos = finished
            .iter()
            .flat_map(|t| {
                let cursos = &cursos;
                enrolled(alunos, t).into_iter().map(move |a| HistoricoAluno {
                    aluno_nome: a.nome.clone(),
                    curso: first_course(a, t, cursos),
                    data_conclusao: t.data_fim,
                })
            })
            .take(20)
            .collect();

        let mut ganhos_total = 0u64;
        let mut ganhos_mes = 0u64;
        for t in turmas
            .iter()
            .filter(|t| matches!(t.status, TurmaStatus::Ativa | TurmaStatus::Concluida))
        {
            let valor = cursos.get(&t.curso_id).map_or(0, |c| c.valor_total_centavos);
            let n = enrolled(alunos, t).len() as u64;
            let ganho = valor * n * COMISSAO_INSTRUTOR_PERCENT / 100;
            ganhos_total += ganho;
            if t.data_inicio.is_some_and(|d| d >= month_start) {
                ganhos_mes += ganho;
            }
        }

        let minhas_turmas = ordered
            .iter()
            .take(10)
            .map(|t| TurmaResumo {
                curso_nome: cursos
                    .get(&t.curso_id)
                    .map_or_else(|| t.nome.clone(), |c| c.nome.clone()),
                data_inicio: t.data_inicio,
                horario: t.horario.clone(),
                capacidade: t.capacidade,
                alunos_inscritos: count(enrolled(alunos, t)),
                status: t.status,
            })
            .collect();

        Self {
            proximos_alunos,
            minhas_turmas,
            historico_alunos,
            ganhos_mes_centavos: ganhos_mes,
            ganhos_total_centavos: ganhos_total,
            turmas_ativas: count(turmas.iter().filter(|t| t.status == TurmaStatus::Ativa)),
            alunos_atendidos: count(
                alunos
                    .iter()
                    .filter(|a| a.turma_id.is_some_and(|id| turmas.iter().any(|t| t.id == id))),
            ),
        }
    }
}

impl GodMetrics {
    /// Platform-wide view. God-owned subscriptions are excluded from
    /// subscription and revenue figures; automatic rows earn no revenue.
    pub fn compute(
        users: &[User],
        subs: &[Subscription],
        alunos: &[Aluno],
        catalog: &PlanCatalog,
        now: DateTime<Utc>,
    ) -> Self {
        let roles: HashMap<UserId, Role> = users.iter().map(|u| (u.id, u.role)).collect();
        let total = count(users);
        let by_role = |r: Role| count(users.iter().filter(|u| u.role == r));
        let (god, admin, instrutor) = (by_role(Role::God), by_role(Role::Admin), by_role(Role::Instrutor));

        let tenant_subs: Vec<&Subscription> = subs
            .iter()
            .filter(|s| roles.get(&s.user_id) != Some(&Role::God))
            .collect();
        let live: Vec<&Subscription> = tenant_subs
            .iter()
            .copied()
            .filter(|s| {
                matches!(s.status, SubscriptionStatus::Ativa | SubscriptionStatus::Trial)
                    && now <= s.data_expiracao
            })
            .collect();
        let horizon = now + Duration::days(30);

        let paying: Vec<&Subscription> = live
            .iter()
            .copied()
            .filter(|s| s.status == SubscriptionStatus::Ativa && !s.automatico)
            .collect();
        let mensal: u64 = paying
            .iter()
            .filter_map(|s| {
                catalog.get(&s.plano).map(|p| match s.ciclo {
                    Ciclo::Mensal => p.preco_centavos,
                    Ciclo::Anual => p.preco_anual_centavos / 12,
                })
            })
            .sum();
        let ticket_medio = match paying.len() as u64 {
            0 => 0,
            n => mensal / n,
        };

        let month_start = start_of_month(now);
        let prev_month_start = months_ago(month_start, 1);
        let este_mes = count(alunos.iter().filter(|a| a.criado_em >= month_start));
        let mes_anterior = count(
            alunos
                .iter()
                .filter(|a| a.criado_em >= prev_month_start && a.criado_em < month_start),
        );

        Self {
            usuarios: UsuariosMetrics { total },
            distribuicao: Distribuicao {
                god,
                admin,
                instrutor,
                god_percent: percent(god, total),
                admin_percent: percent(admin, total),
                instrutor_percent: percent(instrutor, total),
            },
            assinaturas: AssinaturasMetrics {
                starter: count(live.iter().filter(|s| s.plano == STARTER)),
                premium: count(live.iter().filter(|s| s.plano == PREMIUM)),
                cancelados: count(
                    tenant_subs
                        .iter()
                        .filter(|s| s.status == SubscriptionStatus::Cancelada),
                ),
                vencem_em30_dias: count(live.iter().filter(|s| s.data_expiracao <= horizon)),
            },
            receita: ReceitaMetrics {
                mensal_centavos: mensal,
                anual_centavos: mensal * 12,
                ticket_medio_centavos: ticket_medio,
            },
            sistema: SistemaMetrics {
                total_alunos: count(alunos),
                alunos_este_mes: este_mes,
                crescimento_percent: growth_percent(este_mes, mes_anterior),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewAluno, NewCurso, NewTurma};
    use identyflow_auth::{NewUser, Principal};
    use identyflow_billing::PaymentInfo;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn aluno(nome: &str, cursos: &[&str], criado_em: DateTime<Utc>) -> Aluno {
        let p = Principal::new(UserId::new(), Role::Admin);
        let mut a = Aluno::create(
            NewAluno {
                nome: nome.into(),
                cpf: "1".into(),
                cursos: cursos.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            },
            &p,
            criado_em,
        )
        .unwrap();
        a.escolaridade = Some("medio".into());
        a
    }

    fn user(role: Role) -> User {
        User::create(NewUser {
            nome: "u".into(),
            email: format!("{}@x.com", UserId::new()),
            senha_hash: "h".into(),
            telefone: None,
            role,
            admin_pai: None,
            nome_empresa: None,
            criado_em: now(),
        })
    }

    #[test]
    fn dashboard_counts_windows_and_top_courses() {
        let t = now();
        let alunos = vec![
            aluno("A", &["Corte", "Escova"], t - Duration::hours(1)),
            aluno("B", &["Corte"], t - Duration::days(3)),
            aluno("C", &["Corte"], t - Duration::days(30)),
            aluno("D", &["Unhas"], t - Duration::days(60)),
        ];
        let d = Dashboard::compute(&alunos, 4, 9, t);
        assert_eq!(d.total_alunos, 4);
        assert_eq!(d.alunos_recentes, 2);
        assert_eq!(d.alunos_hoje, 1);
        assert_eq!(d.ultimos_alunos[0].nome, "A");
        assert_eq!(d.cursos_por_aluno[0].chave.as_deref(), Some("Corte"));
        assert_eq!(d.cursos_por_aluno[0].count, 3);
    }

    #[test]
    fn analytics_growth_and_buckets() {
        let t = now();
        let alunos = vec![
            aluno("A", &[], t - Duration::days(2)),
            aluno("B", &[], t - Duration::days(5)),
            aluno("C", &[], t - Duration::days(40)),
            aluno("D", &[], t - Duration::days(400)),
        ];
        let a = Analytics::compute(&alunos, t);
        assert_eq!(a.alunos_mes_atual, 2);
        assert_eq!(a.alunos_mes_anterior, 1);
        assert_eq!(a.taxa_crescimento, 100.0);
        assert_eq!(a.cadastros_por_mes.iter().map(|m| m.count).sum::<u32>(), 3);
        assert_eq!(a.por_escolaridade[0].count, 4);
        assert_eq!(a.por_dia_semana.iter().map(|w| w.count).sum::<u32>(), 4);
    }

    #[test]
    fn growth_handles_empty_previous_period() {
        assert_eq!(growth_percent(0, 0), 0.0);
        assert_eq!(growth_percent(5, 0), 100.0);
        assert_eq!(growth_percent(3, 4), -25.0);
    }

    #[test]
    fn instrutor_earnings_take_thirty_percent() {
        let t = now();
        let instrutor = Principal::new(UserId::new(), Role::Instrutor);
        let curso = Curso::create(
            NewCurso {
                nome: "Corte".into(),
                carga_horaria: 10,
                dias: 5,
                valor_total_centavos: 100_000,
                min_vagas: 1,
                max_vagas: 10,
            },
            t,
        )
        .unwrap();
        let turma = Turma::create(
            NewTurma {
                nome: "T1".into(),
                curso_id: curso.id,
                data_inicio: Some(t.date_naive() + Duration::days(3)),
                data_fim: None,
                horario: Some("manhã".into()),
                capacidade: Some(10),
                status: None,
                instrutor_id: None,
            },
            &instrutor,
            t,
        )
        .unwrap();
        let mut alunos = vec![aluno("A", &[], t), aluno("B", &["Corte"], t)];
        for a in &mut alunos {
            a.turma_id = Some(turma.id);
        }

        let s = InstrutorStats::compute(&[turma], &[curso], &alunos, t);
        assert_eq!(s.ganhos_total_centavos, 60_000);
        assert_eq!(s.ganhos_mes_centavos, 60_000);
        assert_eq!(s.turmas_ativas, 1);
        assert_eq!(s.alunos_atendidos, 2);
        assert_eq!(s.proximos_alunos.len(), 2);
        assert_eq!(s.minhas_turmas[0].alunos_inscritos, 2);
        assert_eq!(s.minhas_turmas[0].curso_nome, "Corte");
    }

    #[test]
    fn god_metrics_exclude_god_rows_and_courtesy_revenue() {
        let t = now();
        let god = user(Role::God);
        let a1 = user(Role::Admin);
        let a2 = user(Role::Admin);
        let i1 = user(Role::Instrutor);
        let catalog = PlanCatalog::builtin();

        let subs = vec![
            Subscription::auto_provision(god.id, Role::God, t),
            Subscription::auto_provision(a1.id, Role::Admin, t),
            Subscription::create_or_renew(
                None,
                a2.id,
                &catalog,
                PREMIUM,
                Ciclo::Mensal,
                Some(PaymentInfo::default()),
                t,
            )
            .unwrap(),
        ];
        let users = vec![god, a1, a2, i1];
        let m = GodMetrics::compute(&users, &subs, &[], &catalog, t);

        assert_eq!(m.usuarios.total, 4);
        assert_eq!(m.distribuicao.admin, 2);
        assert_eq!(m.distribuicao.admin_percent, 50.0);
        assert_eq!(m.assinaturas.premium, 1);
        assert_eq!(m.assinaturas.starter, 1);
        assert_eq!(m.assinaturas.vencem_em30_dias, 1);
        assert_eq!(m.receita.mensal_centavos, 14_990);
        assert_eq!(m.receita.anual_centavos, 14_990 * 12);
        assert_eq!(m.receita.ticket_medio_centavos, 14_990);
    }
}
