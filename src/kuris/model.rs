use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Serde helper for calendar dates as `yyyy-mm-dd` strings.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::FormatItem;
    use time::macros::format_description;
    use time::Date;

    const FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let s = date.format(FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        Date::parse(&s, FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use time::Date;

        #[derive(Serialize, Deserialize)]
        struct Wrapper(#[serde(with = "super")] Date);

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            date.map(Wrapper).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KuriStatus {
    Pending,
    Active,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KuriKind {
    New,
    Existing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Late,
}

/// One member's contribution record for one month. At most one row exists
/// per (member, month) pair; a new status replaces the old row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub member_id: Uuid,
    pub month: u32,
    pub status: PaymentStatus,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub paid_date: Option<OffsetDateTime>,
}

/// The prize recipient for one month. At most one per month.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub month: u32,
    pub member_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NominationStatus {
    Pending,
    Approved,
    Rejected,
}

/// A hand-off proposal raised by the current winner of a month. Resolved
/// entries stay in the history; only the pending one is replaceable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nomination {
    pub month: u32,
    pub original_winner_id: Uuid,
    pub nominated_member_id: Uuid,
    pub status: NominationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub nominated_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub approved_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub rejected_at: Option<OffsetDateTime>,
}

/// The aggregate root. Persisted and rewritten as one document; array
/// fields are replaced wholesale on update, never merged element-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kuri {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub monthly_amount: i64,
    pub status: KuriStatus,
    #[serde(rename = "type")]
    pub kind: KuriKind,
    #[serde(default)]
    pub duration_months: u32,
    #[serde(default, with = "iso_date::option", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Date>,
    #[serde(default)]
    pub admin_id: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub winners: Vec<Winner>,
    #[serde(default)]
    pub nominations: Vec<Nomination>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Kuri {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }

    pub fn winner_for(&self, month: u32) -> Option<&Winner> {
        self.winners.iter().find(|w| w.month == month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn sample() -> Kuri {
        Kuri {
            id: Uuid::new_v4(),
            name: "Office Kuri".into(),
            description: String::new(),
            monthly_amount: 1000,
            status: KuriStatus::Active,
            kind: KuriKind::New,
            duration_months: 12,
            start_date: Some(date!(2025 - 10 - 01)),
            admin_id: Some(Uuid::new_v4()),
            created_by: None,
            member_ids: vec![Uuid::new_v4()],
            payments: Vec::new(),
            winners: Vec::new(),
            nominations: Vec::new(),
            created_at: datetime!(2025-09-15 12:00 UTC),
        }
    }

    #[test]
    fn document_round_trips_through_json() {
        let kuri = sample();
        let json = serde_json::to_string(&kuri).unwrap();
        let back: Kuri = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, kuri.id);
        assert_eq!(back.start_date, kuri.start_date);
        assert_eq!(back.member_ids, kuri.member_ids);
    }

    #[test]
    fn wire_format_uses_camel_case_and_iso_dates() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["startDate"], "2025-10-01");
        assert_eq!(json["type"], "new");
        assert!(json["monthlyAmount"].is_i64());
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        // Documents written before a feature shipped lack its array.
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Old kuri",
            "monthlyAmount": 500,
            "status": "pending",
            "type": "existing",
            "adminId": null,
            "createdBy": null,
            "createdAt": "2025-01-01T00:00:00Z",
        });
        let kuri: Kuri = serde_json::from_value(raw).unwrap();
        assert!(kuri.payments.is_empty());
        assert!(kuri.winners.is_empty());
        assert!(kuri.nominations.is_empty());
        assert!(kuri.member_ids.is_empty());
        assert_eq!(kuri.start_date, None);
    }
}
