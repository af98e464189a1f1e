use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::kuris::engine::CollectionStats;
use crate::kuris::model::{
    iso_date, Kuri, KuriKind, KuriStatus, Nomination, Payment, PaymentStatus, Winner,
};
use crate::kuris::policy;
use crate::users::dto::PublicUser;
use crate::users::repo::User;

/// Duration as clients send it: either a plain month count or the legacy
/// free-text form ("12 months").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Months(u32),
    Text(String),
}

impl DurationInput {
    /// Normalize to whole months; unparseable text becomes 0 (unknown).
    pub fn months(&self) -> u32 {
        match self {
            Self::Months(n) => *n,
            Self::Text(s) => s
                .trim()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateKuri {
    pub name: String,
    pub monthly_amount: i64,
    pub description: Option<String>,
    pub duration: Option<DurationInput>,
    #[serde(with = "iso_date::option")]
    pub start_date: Option<Date>,
    #[serde(rename = "type")]
    pub kind: Option<KuriKind>,
    pub member_ids: Option<Vec<Uuid>>,
    pub admin_id: Option<Uuid>,
}

/// Typed partial update: only these fields can be rewritten, and only when
/// present. There is intentionally no `createdBy` here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateKuri {
    pub name: Option<String>,
    pub description: Option<String>,
    pub monthly_amount: Option<i64>,
    pub status: Option<KuriStatus>,
    #[serde(rename = "type")]
    pub kind: Option<KuriKind>,
    pub duration: Option<DurationInput>,
    #[serde(with = "iso_date::option")]
    pub start_date: Option<Date>,
    pub member_ids: Option<Vec<Uuid>>,
    pub admin_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignWinnerRequest {
    pub month: u32,
    /// `null` (or absent) clears the month's winner.
    pub member_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominateRequest {
    pub month: u32,
    pub nominated_member_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideNominationRequest {
    pub month: u32,
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPaymentRequest {
    pub member_id: Uuid,
    pub month: u32,
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub month: u32,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: &'static str,
}

/// A kuri as one viewer is allowed to see it: the full payment ledger is
/// owner/admin-only, plain members get their own rows instead. Winners and
/// nominations stay visible to everyone in the scheme since the hand-off
/// workflow needs them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KuriView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub monthly_amount: i64,
    pub status: KuriStatus,
    #[serde(rename = "type")]
    pub kind: KuriKind,
    pub duration_months: u32,
    #[serde(with = "iso_date::option", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Date>,
    pub admin_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub member_ids: Vec<Uuid>,
    pub winners: Vec<Winner>,
    pub nominations: Vec<Nomination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<PublicUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<Payment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_payments: Option<Vec<Payment>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

impl KuriView {
    pub fn for_viewer(kuri: Kuri, actor: &User, members: Option<Vec<PublicUser>>) -> Self {
        let manages = policy::can_manage(actor, &kuri);
        let (payments, my_payments) = if manages {
            (Some(kuri.payments), None)
        } else {
            let mine = kuri
                .payments
                .iter()
                .filter(|p| p.member_id == actor.id)
                .cloned()
                .collect();
            (None, Some(mine))
        };
        Self {
            id: kuri.id,
            name: kuri.name,
            description: kuri.description,
            monthly_amount: kuri.monthly_amount,
            status: kuri.status,
            kind: kuri.kind,
            duration_months: kuri.duration_months,
            start_date: kuri.start_date,
            admin_id: kuri.admin_id,
            created_by: kuri.created_by,
            member_ids: kuri.member_ids,
            winners: kuri.winners,
            nominations: kuri.nominations,
            members,
            payments,
            my_payments,
            created_at: kuri.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPaid {
    pub member_id: Uuid,
    pub paid: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub month: u32,
    #[serde(flatten)]
    pub stats: CollectionStats,
    pub members: Vec<MemberPaid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCollectionView {
    pub month: u32,
    pub has_paid: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyticsResponse {
    Full(CollectionReport),
    Mine(MemberCollectionView),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_accepts_numbers_and_text() {
        let n: DurationInput = serde_json::from_value(serde_json::json!(12)).unwrap();
        assert_eq!(n.months(), 12);
        let t: DurationInput = serde_json::from_value(serde_json::json!("18 months")).unwrap();
        assert_eq!(t.months(), 18);
        let junk: DurationInput = serde_json::from_value(serde_json::json!("one year")).unwrap();
        assert_eq!(junk.months(), 0);
    }

    #[test]
    fn update_command_has_no_created_by_field() {
        // A client trying to rewrite createdBy is silently ignored by the
        // typed command, so the stored value survives any update.
        let cmd: UpdateKuri = serde_json::from_value(serde_json::json!({
            "name": "Renamed",
            "createdBy": uuid::Uuid::new_v4(),
        }))
        .unwrap();
        assert_eq!(cmd.name.as_deref(), Some("Renamed"));
    }

    #[test]
    fn assign_winner_member_can_be_null() {
        let req: AssignWinnerRequest =
            serde_json::from_value(serde_json::json!({"month": 3, "memberId": null})).unwrap();
        assert_eq!(req.month, 3);
        assert!(req.member_id.is_none());
    }
}
