//! Access decisions for trips and the bookings and todos inside them.
//!
//! Owners (user or guest session) get full access. Signed-in users whose
//! email has a share grant get read-only access. Everyone else sees nothing:
//! a trip they cannot view is reported as not found, never as forbidden.

use crate::api::ApiError;
use crate::auth::Identity;
use crate::db::{Booking, Database, Owner, Todo, Trip};

/// What the caller wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Share,
}

/// A resource the caller may access, and whether they may change it.
#[derive(Debug, Clone)]
pub struct Scope<T> {
    pub resource: T,
    pub can_edit: bool,
}

#[derive(Debug, Clone)]
pub enum Decision<T> {
    Allow(Scope<T>),
    /// Visible to the caller, but the action is not permitted
    Deny,
    NotFound,
}

impl<T> Decision<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decision<U> {
        match self {
            Decision::Allow(scope) => Decision::Allow(Scope {
                resource: f(scope.resource),
                can_edit: scope.can_edit,
            }),
            Decision::Deny => Decision::Deny,
            Decision::NotFound => Decision::NotFound,
        }
    }

    /// Convert to a handler result: `Deny` is 403, `NotFound` is 404.
    pub fn require(self, kind: &str) -> Result<Scope<T>, ApiError> {
        match self {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny => Err(ApiError::forbidden(format!(
                "You do not have permission to modify this {}",
                kind.to_lowercase()
            ))),
            Decision::NotFound => Err(ApiError::not_found(format!("{} not found", kind))),
        }
    }
}

/// Decide access to a trip with the given owner.
/// `shared_with_caller` is whether a grant exists for the caller's email.
pub fn evaluate(
    identity: &Identity,
    owner: &Owner,
    shared_with_caller: bool,
    action: Action,
) -> Decision<()> {
    let can_edit = match (identity, owner) {
        (Identity::User(user), Owner::User(owner_id)) if user.id == *owner_id => true,
        (Identity::Guest(session_id), Owner::Guest(owner_session)) if session_id == owner_session => {
            // Only a signed-in owner can invite others
            if action == Action::Share {
                return Decision::Deny;
            }
            true
        }
        (Identity::User(_), _) if shared_with_caller => false,
        _ => return Decision::NotFound,
    };

    if !can_edit && action != Action::View {
        return Decision::Deny;
    }

    Decision::Allow(Scope {
        resource: (),
        can_edit,
    })
}

/// Whether the caller is a signed-in non-owner with a grant for this trip.
async fn is_shared_with(db: &Database, identity: &Identity, trip: &Trip) -> Result<bool, sqlx::Error> {
    match identity.user() {
        Some(user) if trip.owner != Owner::User(user.id) => {
            db.shares().exists(trip.id, &user.email).await
        }
        _ => Ok(false),
    }
}

/// Authorize an action on an already loaded trip.
pub async fn authorize_loaded_trip(
    db: &Database,
    identity: &Identity,
    trip: Trip,
    action: Action,
) -> Result<Decision<Trip>, sqlx::Error> {
    if matches!(identity, Identity::Anonymous) {
        return Ok(Decision::NotFound);
    }
    let shared = is_shared_with(db, identity, &trip).await?;
    Ok(evaluate(identity, &trip.owner, shared, action).map(|()| trip))
}

/// Authorize an action on a trip by its public id.
pub async fn authorize_trip(
    db: &Database,
    identity: &Identity,
    trip_uuid: &str,
    action: Action,
) -> Result<Decision<Trip>, sqlx::Error> {
    if matches!(identity, Identity::Anonymous) {
        return Ok(Decision::NotFound);
    }
    match db.trips().get_by_uuid(trip_uuid).await? {
        Some(trip) => authorize_loaded_trip(db, identity, trip, action).await,
        None => Ok(Decision::NotFound),
    }
}

/// Authorize an action on a booking through its parent trip.
pub async fn authorize_booking(
    db: &Database,
    identity: &Identity,
    booking_uuid: &str,
    action: Action,
) -> Result<Decision<Booking>, sqlx::Error> {
    if matches!(identity, Identity::Anonymous) {
        return Ok(Decision::NotFound);
    }
    let Some(booking) = db.bookings().get_by_uuid(booking_uuid).await? else {
        return Ok(Decision::NotFound);
    };
    let Some(trip) = db.trips().get_by_id(booking.trip_id).await? else {
        return Ok(Decision::NotFound);
    };
    Ok(authorize_loaded_trip(db, identity, trip, action)
        .await?
        .map(|_| booking))
}

/// Authorize an action on a todo through its parent trip.
pub async fn authorize_todo(
    db: &Database,
    identity: &Identity,
    todo_uuid: &str,
    action: Action,
) -> Result<Decision<Todo>, sqlx::Error> {
    if matches!(identity, Identity::Anonymous) {
        return Ok(Decision::NotFound);
    }
    let Some(todo) = db.todos().get_by_uuid(todo_uuid).await? else {
        return Ok(Decision::NotFound);
    };
    let Some(trip) = db.trips().get_by_id(todo.trip_id).await? else {
        return Ok(Decision::NotFound);
    };
    Ok(authorize_loaded_trip(db, identity, trip, action)
        .await?
        .map(|_| todo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, TripFields, User};

    fn user(id: i64, email: &str) -> Identity {
        Identity::User(User {
            id,
            uuid: format!("uuid-{id}"),
            google_id: format!("g-{id}"),
            email: email.to_string(),
            name: "Test".to_string(),
            given_name: None,
            family_name: None,
            picture: None,
            preferred_language: "en".to_string(),
            preferred_currency: "USD".to_string(),
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
            last_login: None,
        })
    }

    fn guest(session: &str) -> Identity {
        Identity::Guest(session.to_string())
    }

    fn can_edit(decision: Decision<()>) -> Option<bool> {
        match decision {
            Decision::Allow(scope) => Some(scope.can_edit),
            _ => None,
        }
    }

    #[test]
    fn test_owner_user_has_full_access() {
        let owner = Owner::User(1);
        for action in [Action::View, Action::Edit, Action::Share] {
            assert_eq!(can_edit(evaluate(&user(1, "a@x.com"), &owner, false, action)), Some(true));
        }
    }

    #[test]
    fn test_owner_guest_cannot_share() {
        let owner = Owner::Guest("s1".to_string());
        assert_eq!(can_edit(evaluate(&guest("s1"), &owner, false, Action::View)), Some(true));
        assert_eq!(can_edit(evaluate(&guest("s1"), &owner, false, Action::Edit)), Some(true));
        assert!(matches!(
            evaluate(&guest("s1"), &owner, false, Action::Share),
            Decision::Deny
        ));
    }

    #[test]
    fn test_shared_user_is_read_only() {
        let owner = Owner::User(1);
        let reader = user(2, "b@x.com");
        assert_eq!(can_edit(evaluate(&reader, &owner, true, Action::View)), Some(false));
        assert!(matches!(evaluate(&reader, &owner, true, Action::Edit), Decision::Deny));
        assert!(matches!(evaluate(&reader, &owner, true, Action::Share), Decision::Deny));
    }

    #[test]
    fn test_strangers_get_not_found_for_every_action() {
        let user_owner = Owner::User(1);
        let guest_owner = Owner::Guest("s1".to_string());
        for action in [Action::View, Action::Edit, Action::Share] {
            assert!(matches!(evaluate(&guest("s2"), &guest_owner, false, action), Decision::NotFound));
            assert!(matches!(evaluate(&guest("s2"), &user_owner, false, action), Decision::NotFound));
            assert!(matches!(evaluate(&user(2, "b@x.com"), &user_owner, false, action), Decision::NotFound));
            assert!(matches!(evaluate(&user(2, "b@x.com"), &guest_owner, false, action), Decision::NotFound));
            assert!(matches!(evaluate(&Identity::Anonymous, &guest_owner, false, action), Decision::NotFound));
            // A grant is meaningless without a signed-in user
            assert!(matches!(evaluate(&guest("s2"), &user_owner, true, action), Decision::NotFound));
        }
    }

    #[test]
    fn test_require_maps_to_errors() {
        let denied: Decision<()> = Decision::Deny;
        assert!(matches!(denied.require("Trip"), Err(ApiError::Forbidden(_))));
        let missing: Decision<()> = Decision::NotFound;
        assert!(matches!(missing.require("Trip"), Err(ApiError::NotFound(_))));
    }

    async fn user_trip(db: &Database) -> (User, User, Trip) {
        let owner = db
            .users()
            .upsert(&NewUser::new("g-owner", "owner@example.com", "Owner"))
            .await
            .unwrap();
        let reader = db
            .users()
            .upsert(&NewUser::new("g-reader", "Reader@Example.com", "Reader"))
            .await
            .unwrap();
        let fields: TripFields = serde_json::from_value(serde_json::json!({
            "name": "Paris",
            "start_date": "2024-06-01T00:00:00",
        }))
        .unwrap();
        let trip = db
            .trips()
            .create(&Owner::User(owner.id), &fields)
            .await
            .unwrap();
        (owner, reader, trip)
    }

    #[tokio::test]
    async fn test_authorize_trip_via_grant() {
        let db = Database::open(":memory:").await.unwrap();
        let (owner, reader, trip) = user_trip(&db).await;
        let reader = Identity::User(reader);

        let before = authorize_trip(&db, &reader, &trip.uuid, Action::View).await.unwrap();
        assert!(matches!(before, Decision::NotFound));

        db.shares()
            .create(trip.id, "  reader@example.COM ", &owner.email)
            .await
            .unwrap();

        match authorize_trip(&db, &reader, &trip.uuid, Action::View).await.unwrap() {
            Decision::Allow(scope) => {
                assert!(!scope.can_edit);
                assert_eq!(scope.resource.id, trip.id);
            }
            other => panic!("expected allow, got {other:?}"),
        }
        assert!(matches!(
            authorize_trip(&db, &reader, &trip.uuid, Action::Edit).await.unwrap(),
            Decision::Deny
        ));
    }

    #[tokio::test]
    async fn test_authorize_children_follow_trip() {
        let db = Database::open(":memory:").await.unwrap();
        let (owner, reader, trip) = user_trip(&db).await;
        db.shares()
            .create(trip.id, &reader.email, &owner.email)
            .await
            .unwrap();

        let todo = db
            .todos()
            .create(
                trip.id,
                &serde_json::from_value(serde_json::json!({ "title": "Passport" })).unwrap(),
            )
            .await
            .unwrap();
        let booking = db
            .bookings()
            .create(
                trip.id,
                &serde_json::from_value(serde_json::json!({
                    "title": "Hotel",
                    "booking_type": "accommodation",
                    "start_date": "2024-06-01T15:00:00",
                }))
                .unwrap(),
            )
            .await
            .unwrap();

        let reader = Identity::User(reader);
        let owner = Identity::User(owner);

        assert!(matches!(
            authorize_todo(&db, &reader, &todo.uuid, Action::View).await.unwrap(),
            Decision::Allow(Scope { can_edit: false, .. })
        ));
        assert!(matches!(
            authorize_todo(&db, &reader, &todo.uuid, Action::Edit).await.unwrap(),
            Decision::Deny
        ));
        assert!(matches!(
            authorize_booking(&db, &owner, &booking.uuid, Action::Edit).await.unwrap(),
            Decision::Allow(Scope { can_edit: true, .. })
        ));
        assert!(matches!(
            authorize_booking(&db, &guest("s1"), &booking.uuid, Action::View).await.unwrap(),
            Decision::NotFound
        ));
        assert!(matches!(
            authorize_booking(&db, &owner, "missing", Action::View).await.unwrap(),
            Decision::NotFound
        ));
    }
}
