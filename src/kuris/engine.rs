//! Kuri lifecycle engine: every state transition on a [`Kuri`] document goes
//! through here. Functions are pure over the in-memory document; callers
//! read the current document, apply one transition and write the whole
//! document back.

use time::{util::days_in_year_month, Date, Month, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::kuris::dto::{CreateKuri, UpdateKuri};
use crate::kuris::model::{
    Kuri, KuriKind, KuriStatus, Nomination, NominationStatus, Payment, PaymentStatus, Winner,
};
use crate::users::repo::{Role, User};

/// The calendar date at which month `m`'s rotation becomes eligible:
/// the start date advanced by `m - 1` calendar months, day clamped to the
/// target month's length (Jan 31 + 1 month = Feb 28/29).
pub fn taken_date(start: Date, month: u32) -> Date {
    let offset = month.saturating_sub(1) as i32;
    let months0 = start.year() * 12 + i32::from(u8::from(start.month())) - 1 + offset;
    let year = months0.div_euclid(12);
    let month = Month::try_from((months0.rem_euclid(12) + 1) as u8).unwrap_or(Month::January);
    let day = start.day().min(days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(start)
}

fn require_month(month: u32) -> Result<(), ApiError> {
    if month == 0 {
        return Err(ApiError::Validation("Month must be at least 1".into()));
    }
    Ok(())
}

/// Deduplicate a member list while keeping insertion order.
fn dedup_members(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Build a new kuri from a create command. Status is derived from the
/// creator's role: admins start schemes active, members need approval.
pub fn create(cmd: CreateKuri, creator: &User, now: OffsetDateTime) -> Result<Kuri, ApiError> {
    let name = cmd.name.trim().to_string();
    if name.is_empty() || cmd.monthly_amount <= 0 {
        return Err(ApiError::Validation(
            "Name and monthly amount are required".into(),
        ));
    }

    let member_ids = match cmd.member_ids {
        Some(ids) if !ids.is_empty() => dedup_members(ids),
        _ => vec![creator.id],
    };

    Ok(Kuri {
        id: Uuid::new_v4(),
        name,
        description: cmd.description.unwrap_or_default(),
        monthly_amount: cmd.monthly_amount,
        status: if creator.role == Role::Admin {
            KuriStatus::Active
        } else {
            KuriStatus::Pending
        },
        kind: cmd.kind.unwrap_or(KuriKind::New),
        duration_months: cmd.duration.map(|d| d.months()).unwrap_or(0),
        start_date: cmd.start_date,
        admin_id: Some(cmd.admin_id.unwrap_or(creator.id)),
        created_by: Some(creator.id),
        member_ids,
        payments: Vec::new(),
        winners: Vec::new(),
        nominations: Vec::new(),
        created_at: now,
    })
}

/// Apply a typed partial update. Present fields replace the stored value
/// wholesale; `created_by` has no command field and is preserved by
/// construction.
pub fn apply_update(kuri: &mut Kuri, cmd: UpdateKuri) -> Result<(), ApiError> {
    if let Some(name) = cmd.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::Validation("Name cannot be empty".into()));
        }
        kuri.name = name;
    }
    if let Some(amount) = cmd.monthly_amount {
        if amount <= 0 {
            return Err(ApiError::Validation(
                "Monthly amount must be positive".into(),
            ));
        }
        kuri.monthly_amount = amount;
    }
    if let Some(description) = cmd.description {
        kuri.description = description;
    }
    if let Some(status) = cmd.status {
        kuri.status = status;
    }
    if let Some(kind) = cmd.kind {
        kuri.kind = kind;
    }
    if let Some(duration) = cmd.duration {
        kuri.duration_months = duration.months();
    }
    if let Some(start_date) = cmd.start_date {
        kuri.start_date = Some(start_date);
    }
    if let Some(member_ids) = cmd.member_ids {
        kuri.member_ids = dedup_members(member_ids);
    }
    if let Some(admin_id) = cmd.admin_id {
        kuri.admin_id = Some(admin_id);
    }
    Ok(())
}

/// Policy A: directly set or clear the winner for a month. Setting is
/// gated on the month's taken date having arrived.
pub fn assign_winner(
    kuri: &mut Kuri,
    month: u32,
    member_id: Option<Uuid>,
    now: OffsetDateTime,
) -> Result<(), ApiError> {
    require_month(month)?;

    if let Some(member_id) = member_id {
        if !kuri.is_member(member_id) {
            return Err(ApiError::InvalidMember);
        }
        let start = kuri.start_date.ok_or_else(|| {
            ApiError::Validation("Kuri has no start date; set one before assigning winners".into())
        })?;
        let eligible_on = taken_date(start, month);
        if now.date() < eligible_on {
            return Err(ApiError::TooEarly { month, eligible_on });
        }
    }

    kuri.winners.retain(|w| w.month != month);
    if let Some(member_id) = member_id {
        kuri.winners.push(Winner { month, member_id });
    }
    Ok(())
}

/// Policy B step 1: the incumbent winner proposes a replacement. Replaces
/// any pending nomination for the month; resolved history is kept.
pub fn nominate(
    kuri: &mut Kuri,
    month: u32,
    nominator_id: Uuid,
    nominated_member_id: Uuid,
    now: OffsetDateTime,
) -> Result<Nomination, ApiError> {
    require_month(month)?;

    match kuri.winner_for(month) {
        Some(w) if w.member_id == nominator_id => {}
        _ => {
            return Err(ApiError::Forbidden(
                "Only the current winner can nominate a replacement",
            ))
        }
    }
    if !kuri.is_member(nominated_member_id) {
        return Err(ApiError::InvalidMember);
    }

    let nomination = Nomination {
        month,
        original_winner_id: nominator_id,
        nominated_member_id,
        status: NominationStatus::Pending,
        nominated_at: now,
        approved_at: None,
        rejected_at: None,
    };
    kuri.nominations
        .retain(|n| !(n.month == month && n.status == NominationStatus::Pending));
    kuri.nominations.push(nomination.clone());
    Ok(nomination)
}

/// Policy B step 2: resolve the pending nomination for a month. Only the
/// kuri's own admin may decide; resolution is terminal.
pub fn decide_nomination(
    kuri: &mut Kuri,
    month: u32,
    actor_id: Uuid,
    approve: bool,
    now: OffsetDateTime,
) -> Result<(), ApiError> {
    require_month(month)?;

    if kuri.admin_id != Some(actor_id) {
        return Err(ApiError::Forbidden(
            "Only kuri admin can approve nominations",
        ));
    }

    let has_history = kuri.nominations.iter().any(|n| n.month == month);
    let Some(nomination) = kuri
        .nominations
        .iter_mut()
        .find(|n| n.month == month && n.status == NominationStatus::Pending)
    else {
        return Err(if has_history {
            ApiError::Conflict("Nomination for this month is already resolved")
        } else {
            ApiError::NotFound("Pending nomination")
        });
    };

    if approve {
        let member_id = nomination.nominated_member_id;
        nomination.status = NominationStatus::Approved;
        nomination.approved_at = Some(now);
        kuri.winners.retain(|w| w.month != month);
        kuri.winners.push(Winner { month, member_id });
    } else {
        nomination.status = NominationStatus::Rejected;
        nomination.rejected_at = Some(now);
    }
    Ok(())
}

/// Record a member's payment status for a month, replacing any previous
/// row for the same (member, month) pair. `paid_date` is stamped only when
/// the status becomes `paid`.
pub fn set_payment(
    kuri: &mut Kuri,
    member_id: Uuid,
    month: u32,
    status: PaymentStatus,
    now: OffsetDateTime,
) -> Result<Payment, ApiError> {
    require_month(month)?;
    if !kuri.is_member(member_id) {
        return Err(ApiError::InvalidMember);
    }

    let payment = Payment {
        member_id,
        month,
        status,
        paid_date: (status == PaymentStatus::Paid).then_some(now),
    };
    kuri.payments
        .retain(|p| !(p.member_id == member_id && p.month == month));
    kuri.payments.push(payment.clone());
    Ok(payment)
}

pub fn has_paid(kuri: &Kuri, member_id: Uuid, month: u32) -> bool {
    kuri.payments
        .iter()
        .any(|p| p.member_id == member_id && p.month == month && p.status == PaymentStatus::Paid)
}

/// Derived collection figures for one month; recomputed on read, never
/// stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub paid_count: usize,
    pub total_expected: i64,
    pub total_collected: i64,
    pub progress_percent: f64,
}

pub fn month_analytics(kuri: &Kuri, month: u32) -> CollectionStats {
    let paid_count = kuri
        .payments
        .iter()
        .filter(|p| p.month == month && p.status == PaymentStatus::Paid)
        .count();
    let total_expected = kuri.monthly_amount * kuri.member_ids.len() as i64;
    let total_collected = kuri.monthly_amount * paid_count as i64;
    let progress_percent = if total_expected > 0 {
        total_collected as f64 / total_expected as f64 * 100.0
    } else {
        0.0
    };
    CollectionStats {
        paid_count,
        total_expected,
        total_collected,
        progress_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::{Status, User};
    use time::macros::{date, datetime};

    fn member(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            email: "test@example.com".into(),
            password_hash: None,
            role,
            status: Status::Active,
            unique_code: "#TEST01".into(),
            avatar: String::new(),
            is_dummy: false,
            last_login: None,
            created_at: datetime!(2025-01-01 0:00 UTC),
        }
    }

    fn kuri_with_members(ids: &[Uuid]) -> Kuri {
        Kuri {
            id: Uuid::new_v4(),
            name: "Office Kuri".into(),
            description: String::new(),
            monthly_amount: 1000,
            status: KuriStatus::Active,
            kind: KuriKind::New,
            duration_months: 12,
            start_date: Some(date!(2025 - 10 - 01)),
            admin_id: Some(ids[0]),
            created_by: Some(ids[0]),
            member_ids: ids.to_vec(),
            payments: Vec::new(),
            winners: Vec::new(),
            nominations: Vec::new(),
            created_at: datetime!(2025-09-15 12:00 UTC),
        }
    }

    const NOW: OffsetDateTime = datetime!(2025-12-01 10:00 UTC);

    #[test]
    fn taken_date_advances_whole_months() {
        assert_eq!(taken_date(date!(2025 - 10 - 01), 1), date!(2025 - 10 - 01));
        assert_eq!(taken_date(date!(2025 - 10 - 01), 2), date!(2025 - 11 - 01));
        assert_eq!(taken_date(date!(2025 - 10 - 01), 4), date!(2026 - 01 - 01));
    }

    #[test]
    fn taken_date_clamps_the_day() {
        assert_eq!(taken_date(date!(2025 - 01 - 31), 2), date!(2025 - 02 - 28));
        assert_eq!(taken_date(date!(2024 - 01 - 31), 2), date!(2024 - 02 - 29));
        assert_eq!(taken_date(date!(2025 - 10 - 31), 3), date!(2025 - 12 - 31));
    }

    #[test]
    fn create_requires_name_and_positive_amount() {
        let creator = member(Role::Member);
        let cmd = CreateKuri {
            name: "  ".into(),
            monthly_amount: 1000,
            ..CreateKuri::default()
        };
        assert!(matches!(
            create(cmd, &creator, NOW),
            Err(ApiError::Validation(_))
        ));

        let cmd = CreateKuri {
            name: "Kuri".into(),
            monthly_amount: 0,
            ..CreateKuri::default()
        };
        assert!(matches!(
            create(cmd, &creator, NOW),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn create_defaults_follow_the_creator() {
        let creator = member(Role::Member);
        let cmd = CreateKuri {
            name: "Kuri".into(),
            monthly_amount: 500,
            ..CreateKuri::default()
        };
        let kuri = create(cmd, &creator, NOW).unwrap();
        assert_eq!(kuri.status, KuriStatus::Pending);
        assert_eq!(kuri.member_ids, vec![creator.id]);
        assert_eq!(kuri.admin_id, Some(creator.id));
        assert_eq!(kuri.created_by, Some(creator.id));

        let admin = member(Role::Admin);
        let cmd = CreateKuri {
            name: "Kuri".into(),
            monthly_amount: 500,
            ..CreateKuri::default()
        };
        assert_eq!(
            create(cmd, &admin, NOW).unwrap().status,
            KuriStatus::Active
        );
    }

    #[test]
    fn create_dedups_member_ids_preserving_order() {
        let creator = member(Role::Admin);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let cmd = CreateKuri {
            name: "Kuri".into(),
            monthly_amount: 500,
            member_ids: Some(vec![a, b, a, b, a]),
            ..CreateKuri::default()
        };
        assert_eq!(create(cmd, &creator, NOW).unwrap().member_ids, vec![a, b]);
    }

    #[test]
    fn update_preserves_created_by() {
        let creator = member(Role::Member);
        let cmd = CreateKuri {
            name: "Kuri".into(),
            monthly_amount: 500,
            ..CreateKuri::default()
        };
        let mut kuri = create(cmd, &creator, NOW).unwrap();
        let update = UpdateKuri {
            name: Some("Renamed".into()),
            admin_id: Some(Uuid::new_v4()),
            ..UpdateKuri::default()
        };
        apply_update(&mut kuri, update).unwrap();
        assert_eq!(kuri.name, "Renamed");
        assert_eq!(kuri.created_by, Some(creator.id));
    }

    #[test]
    fn payment_rows_are_unique_per_member_month() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[a, b]);

        set_payment(&mut kuri, a, 1, PaymentStatus::Pending, NOW).unwrap();
        set_payment(&mut kuri, a, 1, PaymentStatus::Paid, NOW).unwrap();

        let rows: Vec<_> = kuri
            .payments
            .iter()
            .filter(|p| p.member_id == a && p.month == 1)
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, PaymentStatus::Paid);
        assert!(rows[0].paid_date.is_some());
    }

    #[test]
    fn paid_date_is_only_stamped_on_paid() {
        let a = Uuid::new_v4();
        let mut kuri = kuri_with_members(&[a]);
        let payment = set_payment(&mut kuri, a, 3, PaymentStatus::Late, NOW).unwrap();
        assert_eq!(payment.paid_date, None);
    }

    #[test]
    fn payment_rejects_non_members() {
        let a = Uuid::new_v4();
        let mut kuri = kuri_with_members(&[a]);
        let outsider = Uuid::new_v4();
        assert!(matches!(
            set_payment(&mut kuri, outsider, 1, PaymentStatus::Paid, NOW),
            Err(ApiError::InvalidMember)
        ));
    }

    #[test]
    fn one_winner_per_month_assignment_replaces() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[a, b]);

        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        assign_winner(&mut kuri, 1, Some(b), NOW).unwrap();

        assert_eq!(kuri.winners.len(), 1);
        assert_eq!(kuri.winner_for(1).unwrap().member_id, b);
    }

    #[test]
    fn assigning_none_clears_the_winner() {
        let a = Uuid::new_v4();
        let mut kuri = kuri_with_members(&[a]);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        assign_winner(&mut kuri, 1, None, NOW).unwrap();
        assert!(kuri.winner_for(1).is_none());
    }

    #[test]
    fn winner_assignment_is_time_gated() {
        let a = Uuid::new_v4();
        let mut kuri = kuri_with_members(&[a]);

        let too_soon = datetime!(2025-10-15 0:00 UTC);
        let err = assign_winner(&mut kuri, 2, Some(a), too_soon).unwrap_err();
        match err {
            ApiError::TooEarly { month, eligible_on } => {
                assert_eq!(month, 2);
                assert_eq!(eligible_on, date!(2025 - 11 - 01));
            }
            other => panic!("expected TooEarly, got {other:?}"),
        }

        let late_enough = datetime!(2025-11-02 0:00 UTC);
        assign_winner(&mut kuri, 2, Some(a), late_enough).unwrap();
        assert_eq!(kuri.winner_for(2).unwrap().member_id, a);
    }

    #[test]
    fn nominate_requires_the_incumbent() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[a, b, c]);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();

        assert!(matches!(
            nominate(&mut kuri, 1, b, c, NOW),
            Err(ApiError::Forbidden(_))
        ));
        // No winner at all for month 2 either.
        assert!(matches!(
            nominate(&mut kuri, 2, a, c, NOW),
            Err(ApiError::Forbidden(_))
        ));

        let nomination = nominate(&mut kuri, 1, a, c, NOW).unwrap();
        assert_eq!(nomination.status, NominationStatus::Pending);
        assert_eq!(nomination.original_winner_id, a);
    }

    #[test]
    fn nominate_rejects_outsiders() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[a, b]);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        assert!(matches!(
            nominate(&mut kuri, 1, a, Uuid::new_v4(), NOW),
            Err(ApiError::InvalidMember)
        ));
    }

    #[test]
    fn renomination_replaces_the_pending_entry() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[a, b, c]);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();

        nominate(&mut kuri, 1, a, b, NOW).unwrap();
        nominate(&mut kuri, 1, a, c, NOW).unwrap();

        let pending: Vec<_> = kuri
            .nominations
            .iter()
            .filter(|n| n.month == 1 && n.status == NominationStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].nominated_member_id, c);
    }

    #[test]
    fn approval_rotates_the_winner_and_keeps_history() {
        let (admin, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[admin, a, b]);
        kuri.admin_id = Some(admin);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        nominate(&mut kuri, 1, a, b, NOW).unwrap();

        decide_nomination(&mut kuri, 1, admin, true, NOW).unwrap();

        assert_eq!(kuri.winner_for(1).unwrap().member_id, b);
        let nomination = &kuri.nominations[0];
        assert_eq!(nomination.status, NominationStatus::Approved);
        assert!(nomination.approved_at.is_some());
    }

    #[test]
    fn rejection_leaves_the_winner_unchanged() {
        let (admin, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[admin, a, b]);
        kuri.admin_id = Some(admin);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        nominate(&mut kuri, 1, a, b, NOW).unwrap();

        decide_nomination(&mut kuri, 1, admin, false, NOW).unwrap();

        assert_eq!(kuri.winner_for(1).unwrap().member_id, a);
        let nomination = &kuri.nominations[0];
        assert_eq!(nomination.status, NominationStatus::Rejected);
        assert!(nomination.rejected_at.is_some());
    }

    #[test]
    fn resolution_is_terminal() {
        let (admin, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[admin, a, b]);
        kuri.admin_id = Some(admin);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        nominate(&mut kuri, 1, a, b, NOW).unwrap();
        decide_nomination(&mut kuri, 1, admin, true, NOW).unwrap();

        assert!(matches!(
            decide_nomination(&mut kuri, 1, admin, false, NOW),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn deciding_without_any_nomination_is_not_found() {
        let (admin, a) = (Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[admin, a]);
        kuri.admin_id = Some(admin);
        assert!(matches!(
            decide_nomination(&mut kuri, 1, admin, true, NOW),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn only_the_kuri_admin_decides() {
        let (admin, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut kuri = kuri_with_members(&[admin, a, b]);
        kuri.admin_id = Some(admin);
        assign_winner(&mut kuri, 1, Some(a), NOW).unwrap();
        nominate(&mut kuri, 1, a, b, NOW).unwrap();

        assert!(matches!(
            decide_nomination(&mut kuri, 1, b, true, NOW),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn analytics_match_the_ledger() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut kuri = kuri_with_members(&ids);
        for id in &ids[..3] {
            set_payment(&mut kuri, *id, 2, PaymentStatus::Paid, NOW).unwrap();
        }
        set_payment(&mut kuri, ids[3], 2, PaymentStatus::Late, NOW).unwrap();

        let stats = month_analytics(&kuri, 2);
        assert_eq!(stats.paid_count, 3);
        assert_eq!(stats.total_expected, 4000);
        assert_eq!(stats.total_collected, 3000);
        assert_eq!(stats.progress_percent, 75.0);
    }

    #[test]
    fn analytics_guard_empty_rosters() {
        let mut kuri = kuri_with_members(&[Uuid::new_v4()]);
        kuri.member_ids.clear();
        let stats = month_analytics(&kuri, 1);
        assert_eq!(stats.total_expected, 0);
        assert_eq!(stats.progress_percent, 0.0);
    }

    #[test]
    fn has_paid_tracks_the_selected_month() {
        let a = Uuid::new_v4();
        let mut kuri = kuri_with_members(&[a]);
        set_payment(&mut kuri, a, 2, PaymentStatus::Paid, NOW).unwrap();
        assert!(has_paid(&kuri, a, 2));
        assert!(!has_paid(&kuri, a, 1));
    }
}
