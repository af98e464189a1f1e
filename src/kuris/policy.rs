//! Authorization relations between a user and a kuri. Listing uses the
//! broad relation (admin of, member of, or creator); mutation and payment
//! detail use the narrow owner/admin relation.

use uuid::Uuid;

use crate::kuris::model::Kuri;
use crate::users::repo::{Role, User};

/// May this actor mutate the kuri (edit, delete, record payments, assign
/// winners)? Platform admins may act on any scheme; everyone else needs to
/// be its admin or its creator.
pub fn can_manage(actor: &User, kuri: &Kuri) -> bool {
    actor.role == Role::Admin
        || kuri.admin_id == Some(actor.id)
        || kuri.created_by == Some(actor.id)
}

/// Does the kuri show up in this user's listing? Any of the three
/// relationships counts.
pub fn is_visible_to(kuri: &Kuri, user_id: Uuid) -> bool {
    kuri.admin_id == Some(user_id)
        || kuri.created_by == Some(user_id)
        || kuri.is_member(user_id)
}
