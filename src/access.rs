// 🧭 Resource Access - ownership-scoped lookups and construction
//
// Every entry point takes the acting principal first. Lookups go through the
// principal's own groups (path scoping); the ability rules are checked again
// before anything is returned or mutated. A group or movement outside the
// principal's scope is NotFound, exactly like one that does not exist.

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use crate::ability::{Ability, Action, ResourceKind};
use crate::db;
use crate::entities::{
    new_id, Group, GroupDetail, GroupParams, GroupSummary, Movement, MovementParams, Principal,
    User,
};
use crate::error::{AppError, FormState, GroupChoice, Result};
use crate::validation::{self, ValidationError};

// ============================================================================
// PATH PARAMETERS
// ============================================================================

/// A `user_id` path segment must name the acting principal
pub fn check_user_param<'a>(principal: &'a Principal, user_id: &str) -> Result<&'a User> {
    let user = principal.require_user()?;
    if user.id != user_id {
        return Err(AppError::NotFound("user"));
    }
    Ok(user)
}

// ============================================================================
// GROUPS
// ============================================================================

/// Look up a group among the principal's own groups
pub fn find_owned_group(principal: &Principal, conn: &Connection, group_id: &str) -> Result<Group> {
    let user = principal.require_user()?;
    let group = db::select_group(conn, &user.id, group_id)?.ok_or(AppError::NotFound("group"))?;

    Ability::for_principal(principal)

        .authorize(Action::Read, ResourceKind::Group, &group.user_id)?;
    Ok(group)
}

/// Construct (not persist) a group owned by the principal.
///
/// Only `name` and `icon` are read from the input; the owner is always the
/// principal.
pub fn build_group(principal: &Principal, params: &GroupParams) -> Result<Group> {
    let user = principal.require_user()?;
    let name = params.name.as_deref().map(str::trim);
    let icon = params.icon.as_deref();

    validation::validate_group(name, icon)
        .map_err(|errors| AppError::invalid(errors, FormState::from_input(params)))?;

    Ok(Group {
        id: new_id(),
        name: name.unwrap_or_default().to_string(),
        icon: icon.unwrap_or_default().to_string(),
        user_id: user.id.clone(),
        created_at: Utc::now(),
    })
}

pub fn create_group(
    principal: &Principal,
    conn: &Connection,
    params: &GroupParams,
) -> Result<Group> {
    let group = build_group(principal, params)?;
    Ability::for_principal(principal)
        .authorize(Action::Create, ResourceKind::Group, &group.user_id)?;

    db::insert_group(conn, &group)?;
    info!(group_id = %group.id, owner = %group.user_id, "group created");
    Ok(group)
}

/// Rename and/or change the icon. Owner and id never change.
pub fn update_group(
    principal: &Principal,
    conn: &Connection,
    group_id: &str,
    params: &GroupParams,
) -> Result<Group> {
    let mut group = find_owned_group(principal, conn, group_id)?;
    Ability::for_principal(principal)
        .authorize(Action::Update, ResourceKind::Group, &group.user_id)?;

    if let Some(name) = &params.name {
        group.name = name.trim().to_string();
    }
    if let Some(icon) = &params.icon {
        group.icon = icon.clone();
    }
    validation::validate_group(Some(&group.name), Some(&group.icon))
        .map_err(|errors| AppError::invalid(errors, FormState::from_input(params)))?;

    if !db::update_group_row(conn, &group)? {
        return Err(AppError::NotFound("group"));
    }
    info!(group_id = %group.id, "group updated");
    Ok(group)
}

/// Destroy a group and all of its movements (one transaction).
/// Returns how many movements went with it.
pub fn destroy_group(principal: &Principal, conn: &Connection, group_id: &str) -> Result<usize> {
    let group = find_owned_group(principal, conn, group_id)?;
    Ability::for_principal(principal)
        .authorize(Action::Destroy, ResourceKind::Group, &group.user_id)?;

    // A concurrent destroy may have won since the lookup
    let removed = db::delete_group_cascade(conn, &group.user_id, &group.id)?
        .ok_or(AppError::NotFound("group"))?;

    info!(group_id = %group.id, movements = removed, "group destroyed");
    Ok(removed)
}

/// The principal's groups with derived totals, newest first
pub fn list_groups(principal: &Principal, conn: &Connection) -> Result<Vec<GroupSummary>> {
    let user = principal.require_user()?;
    let ability = Ability::for_principal(principal);

    let summaries = db::select_group_summaries(conn, &user.id)?
        .into_iter()
        .filter(|s| ability.can(Action::Read, ResourceKind::Group, Some(&s.group.user_id)))
        .collect();
    Ok(summaries)
}

/// One owned group with its movements, newest first
pub fn show_group(principal: &Principal, conn: &Connection, group_id: &str) -> Result<GroupDetail> {
    let group = find_owned_group(principal, conn, group_id)?;
    let movements = db::select_movements(conn, &group.id)?;
    Ok(GroupDetail::new(group, movements))
}

/// Groups offered when a movement is created without a pre-selected group
pub fn group_choices(principal: &Principal, conn: &Connection) -> Result<Vec<GroupChoice>> {
    let user = principal.require_user()?;
    let choices = db::select_groups(conn, &user.id)?
        .into_iter()
        .map(|g| GroupChoice {
            id: g.id,
            name: g.name,
            icon: g.icon,
        })
        .collect();
    Ok(choices)
}

/// Blank movement form with the principal's groups to pick from
pub fn movement_form(principal: &Principal, conn: &Connection) -> Result<FormState> {
    let empty = MovementParams::default();
    Ok(FormState::from_input(&empty).with_group_choices(group_choices(principal, conn)?))
}

// ============================================================================
// MOVEMENTS
// ============================================================================

fn resolve_movement(
    principal: &Principal,
    conn: &Connection,
    group_id: &str,
    movement_id: &str,
) -> Result<(Group, Movement)> {
    let group = find_owned_group(principal, conn, group_id)?;
    let movement =
        db::select_movement(conn, &group.id, movement_id)?.ok_or(AppError::NotFound("movement"))?;

    Ability::for_principal(principal)

        .authorize(Action::Read, ResourceKind::Movement, &group.user_id)?;
    Ok((group, movement))
}

/// Look up a movement inside one of the principal's groups
pub fn find_owned_movement(
    principal: &Principal,
    conn: &Connection,
    group_id: &str,
    movement_id: &str,
) -> Result<Movement> {
    resolve_movement(principal, conn, group_id, movement_id).map(|(_, movement)| movement)
}

/// Construct (not persist) a movement in an already resolved group.
///
/// `group_id` comes from `group`, `author_id` from the principal. Only
/// `name` and `amount` are read from the input.
pub fn build_movement(
    principal: &Principal,
    group: &Group,
    params: &MovementParams,
) -> Result<Movement> {
    let user = principal.require_user()?;
    if !group.is_owned_by(&user.id) {
        return Err(AppError::NotFound("group"));
    }

    let name = params.name.as_deref().map(str::trim);
    let amount = validation::validate_movement(name, params.amount.as_ref())
        .map_err(|errors| AppError::invalid(errors, FormState::from_input(params)))?;

    Ok(Movement {
        id: new_id(),
        name: name.unwrap_or_default().to_string(),
        amount,
        group_id: group.id.clone(),
        author_id: user.id.clone(),
        created_at: Utc::now(),
    })
}

fn insert_authorized(
    principal: &Principal,
    conn: &Connection,
    group: &Group,
    movement: &Movement,
) -> Result<()> {
    Ability::for_principal(principal)
        .authorize(Action::Create, ResourceKind::Movement, &group.user_id)?;
    db::insert_movement(conn, movement)?;
    info!(movement_id = %movement.id, group_id = %group.id, "movement created");
    Ok(())
}

/// Create a movement in the group named by the path. Any `group_id` in the
/// input is ignored.
pub fn create_movement(
    principal: &Principal,
    conn: &Connection,
    group_id: &str,
    params: &MovementParams,
) -> Result<Movement> {
    let group = find_owned_group(principal, conn, group_id)?;
    let movement = build_movement(principal, &group, params)?;
    insert_authorized(principal, conn, &group, &movement)?;
    Ok(movement)
}

/// Create a movement from the top-level form, where the group is picked
/// from the principal's own list.
///
/// The chosen `group_id` is re-resolved through ownership. An id that is
/// missing, foreign or unknown is a field error; every failure carries the
/// group list back for re-rendering.
pub fn create_movement_in_selected_group(
    principal: &Principal,
    conn: &Connection,
    params: &MovementParams,
) -> Result<Movement> {
    let user = principal.require_user()?;

    let mut errors = Vec::new();
    let group = match params.group_id.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(ValidationError::new("group_id", "can't be blank", "Movement"));
            None
        }
        Some(id) => {
            let group = db::select_group(conn, &user.id, id)?;
            if group.is_none() {
                errors.push(ValidationError::new(
                    "group_id",
                    "is not included in the list",
                    "Movement",
                ));
            }
            group
        }
    };

    let name = params.name.as_deref().map(str::trim);
    if let Err(mut field_errors) = validation::validate_movement(name, params.amount.as_ref()) {
        errors.append(&mut field_errors);
    }

    match group {
        Some(group) if errors.is_empty() => {
            let movement = build_movement(principal, &group, params)?;
            insert_authorized(principal, conn, &group, &movement)?;
            Ok(movement)
        }
        _ => {
            let choices = group_choices(principal, conn)?;
            let form = FormState::from_input(params).with_group_choices(choices);
            Err(AppError::invalid(errors, form))
        }
    }
}

/// Change name and/or amount. Group and author never change.
pub fn update_movement(
    principal: &Principal,
    conn: &Connection,
    group_id: &str,
    movement_id: &str,
    params: &MovementParams,
) -> Result<Movement> {
    let (group, mut movement) = resolve_movement(principal, conn, group_id, movement_id)?;
    Ability::for_principal(principal)
        .authorize(Action::Update, ResourceKind::Movement, &group.user_id)?;

    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&movement.name)
        .to_string();
    let amount_input = params
        .amount
        .clone()
        .unwrap_or_else(|| serde_json::Value::String(movement.amount.to_string()));

    movement.amount = validation::validate_movement(Some(&name), Some(&amount_input))
        .map_err(|errors| AppError::invalid(errors, FormState::from_input(params)))?;
    movement.name = name;

    if !db::update_movement_row(conn, &movement)? {
        return Err(AppError::NotFound("movement"));
    }
    info!(movement_id = %movement.id, "movement updated");
    Ok(movement)
}

pub fn destroy_movement(
    principal: &Principal,
    conn: &Connection,
    group_id: &str,
    movement_id: &str,
) -> Result<()> {
    let (group, movement) = resolve_movement(principal, conn, group_id, movement_id)?;
    Ability::for_principal(principal)
        .authorize(Action::Destroy, ResourceKind::Movement, &group.user_id)?;

    if !db::delete_movement(conn, &group.id, &movement.id)? {
        return Err(AppError::NotFound("movement"));
    }
    info!(movement_id = %movement.id, group_id = %group.id, "movement destroyed");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Amount;
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn create_principal(conn: &Connection, name: &str) -> Principal {
        let user = User {
            id: new_id(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            profile_image: "avatar-1.png".to_string(),
            confirmed_at: Some(Utc::now()),
            created_at: Utc::now(),
        };
        db::insert_user(conn, &user, "not-a-real-hash", None).unwrap();
        Principal::User(user)
    }

    fn group_params(name: &str, icon: &str) -> GroupParams {
        GroupParams {
            name: Some(name.to_string()),
            icon: Some(icon.to_string()),
        }
    }

    fn movement_params(name: &str, amount: serde_json::Value) -> MovementParams {
        MovementParams {
            name: Some(name.to_string()),
            amount: Some(amount),
            group_id: None,
        }
    }

    #[test]
    fn test_trip_scenario() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");

        let trip = create_group(&alice, &conn, &group_params("Trip", "plane.svg")).unwrap();
        assert_eq!(Some(trip.user_id.as_str()), alice.id());

        assert!(matches!(
            find_owned_group(&bob, &conn, &trip.id),
            Err(AppError::NotFound(_))
        ));

        let lunch = create_movement(&alice, &conn, &trip.id, &movement_params("Lunch", json!(42)))
            .unwrap();
        assert_eq!(Some(lunch.author_id.as_str()), alice.id());
        assert_eq!(lunch.group_id, trip.id);
        assert_eq!(lunch.amount, Amount::from_cents(4200));

        let err = create_movement(&alice, &conn, &trip.id, &movement_params("Bad", json!(-5)))
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed { .. }));
        assert_eq!(db::count_movements(&conn, &trip.id).unwrap(), 1);
    }

    #[test]
    fn test_foreign_and_missing_groups_fail_identically() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let group = create_group(&alice, &conn, &group_params("Rent", "home.svg")).unwrap();

        let foreign = find_owned_group(&bob, &conn, &group.id).unwrap_err();
        let missing = find_owned_group(&bob, &conn, "does-not-exist").unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[test]
    fn test_build_group_forces_owner() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");

        let params: GroupParams = serde_json::from_value(json!({
            "name": "Trip",
            "icon": "plane.svg",
            "user_id": bob.id(),
            "id": "chosen-by-client"
        }))
        .unwrap();

        let group = build_group(&alice, &params).unwrap();
        assert_eq!(Some(group.user_id.as_str()), alice.id());
        assert_ne!(group.id, "chosen-by-client");
    }

    #[test]
    fn test_group_validation_preserves_input() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");

        match create_group(&alice, &conn, &group_params("Tr", "rocket.svg")).unwrap_err() {
            AppError::ValidationFailed { errors, form } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(form.input["name"], "Tr");
                assert_eq!(form.input["icon"], "rocket.svg");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(list_groups(&alice, &conn).unwrap().is_empty());
    }

    #[test]
    fn test_anonymous_is_unauthenticated() {
        let conn = setup();
        let anonymous = Principal::Anonymous;

        assert!(matches!(
            create_group(&anonymous, &conn, &group_params("Trip", "plane.svg")),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(list_groups(&anonymous, &conn), Err(AppError::Unauthenticated)));
        assert!(matches!(
            find_owned_group(&anonymous, &conn, "any"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_non_positive_and_non_numeric_amounts() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let group = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();

        for amount in [json!(0), json!(-0.01), json!("abc"), json!(null), json!("")] {
            let err = create_movement(&alice, &conn, &group.id, &movement_params("Snack", amount))
                .unwrap_err();
            assert!(err.validation_errors().unwrap().iter().any(|e| e.field == "amount"));
        }
        assert_eq!(db::count_movements(&conn, &group.id).unwrap(), 0);
    }

    #[test]
    fn test_movement_lookup_is_nested() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let food = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();
        let rent = create_group(&alice, &conn, &group_params("Rent", "home.svg")).unwrap();
        let lunch = create_movement(&alice, &conn, &food.id, &movement_params("Lunch", json!(12)))
            .unwrap();

        assert_eq!(find_owned_movement(&alice, &conn, &food.id, &lunch.id).unwrap(), lunch);

        // Right movement, wrong group
        assert!(matches!(
            find_owned_movement(&alice, &conn, &rent.id, &lunch.id),
            Err(AppError::NotFound("movement"))
        ));
        // Right ids, wrong principal
        assert!(matches!(
            find_owned_movement(&bob, &conn, &food.id, &lunch.id),
            Err(AppError::NotFound("group"))
        ));
    }

    #[test]
    fn test_build_movement_rejects_foreign_group() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let group = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();

        assert!(matches!(
            build_movement(&bob, &group, &movement_params("Steal", json!(1))),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_movement_ignores_group_id_in_input() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let mine = create_group(&bob, &conn, &group_params("Mine", "food.svg")).unwrap();
        let theirs = create_group(&alice, &conn, &group_params("Theirs", "food.svg")).unwrap();

        let mut params = movement_params("Sneaky", json!(5));
        params.group_id = Some(theirs.id.clone());

        let movement = create_movement(&bob, &conn, &mine.id, &params).unwrap();
        assert_eq!(movement.group_id, mine.id);
        assert_eq!(db::count_movements(&conn, &theirs.id).unwrap(), 0);
    }

    #[test]
    fn test_selected_group_form() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let food = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();
        let foreign = create_group(&bob, &conn, &group_params("Foreign", "car.svg")).unwrap();

        let mut params = movement_params("Groceries", json!("19.99"));
        params.group_id = Some(food.id.clone());
        let movement = create_movement_in_selected_group(&alice, &conn, &params).unwrap();
        assert_eq!(movement.group_id, food.id);
        assert_eq!(movement.amount, Amount::from_cents(1999));

        // A foreign group id is a field error, and the form gets the choices back
        params.group_id = Some(foreign.id.clone());
        match create_movement_in_selected_group(&alice, &conn, &params).unwrap_err() {
            AppError::ValidationFailed { errors, form } => {
                assert_eq!(errors[0].field, "group_id");
                let choices = form.group_choices.unwrap();
                assert_eq!(choices.len(), 1);
                assert_eq!(choices[0].id, food.id);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db::count_movements(&conn, &foreign.id).unwrap(), 0);
    }

    #[test]
    fn test_selected_group_form_reports_all_fields() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();

        let params = MovementParams {
            name: Some("".to_string()),
            amount: None,
            group_id: None,
        };
        match create_movement_in_selected_group(&alice, &conn, &params).unwrap_err() {
            AppError::ValidationFailed { errors, form } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["group_id", "name", "amount"]);
                assert_eq!(form.group_choices.map(|c| c.len()), Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_movement_form_offers_only_own_groups() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();
        create_group(&bob, &conn, &group_params("Rent", "home.svg")).unwrap();

        let form = movement_form(&alice, &conn).unwrap();
        let names: Vec<String> = form.group_choices.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Food".to_string()]);

        assert!(matches!(
            movement_form(&Principal::Anonymous, &conn),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_destroy_group_cascades_and_is_idempotent() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let group = create_group(&alice, &conn, &group_params("Trip", "plane.svg")).unwrap();
        for i in 0..5 {
            let params = movement_params(&format!("Item {}", i), json!(i + 1));
            create_movement(&alice, &conn, &group.id, &params).unwrap();
        }

        assert_eq!(destroy_group(&alice, &conn, &group.id).unwrap(), 5);
        assert_eq!(db::count_movements(&conn, &group.id).unwrap(), 0);

        assert!(matches!(destroy_group(&alice, &conn, &group.id), Err(AppError::NotFound(_))));
        assert!(matches!(destroy_group(&alice, &conn, &group.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_destroy_foreign_group_is_not_found() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let group = create_group(&alice, &conn, &group_params("Trip", "plane.svg")).unwrap();
        create_movement(&alice, &conn, &group.id, &movement_params("Lunch", json!(42))).unwrap();

        assert!(matches!(destroy_group(&bob, &conn, &group.id), Err(AppError::NotFound(_))));
        assert_eq!(db::count_movements(&conn, &group.id).unwrap(), 1);
    }

    #[test]
    fn test_destroy_group_rolls_back_mid_cascade() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let group = create_group(&alice, &conn, &group_params("Trip", "plane.svg")).unwrap();
        for i in 0..3 {
            let params = movement_params(&format!("Item {}", i), json!(10));
            create_movement(&alice, &conn, &group.id, &params).unwrap();
        }
        conn.execute_batch(
            "CREATE TRIGGER fail_group_delete BEFORE DELETE ON groups
             BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
        )
        .unwrap();

        assert!(matches!(destroy_group(&alice, &conn, &group.id), Err(AppError::Storage(_))));
        assert_eq!(show_group(&alice, &conn, &group.id).unwrap().movements.len(), 3);
    }

    #[test]
    fn test_update_group_keeps_owner() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let group = create_group(&alice, &conn, &group_params("Trip", "plane.svg")).unwrap();

        let updated = update_group(
            &alice,
            &conn,
            &group.id,
            &GroupParams {
                name: Some("Road trip".to_string()),
                icon: None,
            },
        )
        .unwrap();
        assert_eq!(updated.name, "Road trip");
        assert_eq!(updated.icon, "plane.svg");
        assert_eq!(updated.user_id, group.user_id);

        assert!(matches!(
            update_group(&bob, &conn, &group.id, &group_params("Mine now", "car.svg")),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            update_group(&alice, &conn, &group.id, &group_params("Trip", "rocket.svg")),
            Err(AppError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_update_and_destroy_movement() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let group = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();
        let lunch = create_movement(&alice, &conn, &group.id, &movement_params("Lunch", json!(12)))
            .unwrap();

        let updated = update_movement(
            &alice,
            &conn,
            &group.id,
            &lunch.id,
            &MovementParams {
                name: None,
                amount: Some(json!("15.5")),
                group_id: None,
            },
        )
        .unwrap();
        assert_eq!(updated.name, "Lunch");
        assert_eq!(updated.amount, Amount::from_cents(1550));

        assert!(matches!(
            update_movement(
                &alice,
                &conn,
                &group.id,
                &lunch.id,
                &movement_params("Lunch", json!(0)),
            ),
            Err(AppError::ValidationFailed { .. })
        ));
        assert!(matches!(
            destroy_movement(&bob, &conn, &group.id, &lunch.id),
            Err(AppError::NotFound(_))
        ));

        destroy_movement(&alice, &conn, &group.id, &lunch.id).unwrap();
        assert!(matches!(
            destroy_movement(&alice, &conn, &group.id, &lunch.id),
            Err(AppError::NotFound("movement"))
        ));
    }

    #[test]
    fn test_list_and_show_groups() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");
        let food = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();
        create_group(&bob, &conn, &group_params("Other", "car.svg")).unwrap();
        create_movement(&alice, &conn, &food.id, &movement_params("Lunch", json!(12))).unwrap();
        create_movement(&alice, &conn, &food.id, &movement_params("Dinner", json!(30))).unwrap();

        let groups = list_groups(&alice, &conn).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].movements_total, Amount::from_cents(4200));
        assert_eq!(groups[0].movements_count, 2);

        let detail = show_group(&alice, &conn, &food.id).unwrap();
        assert_eq!(detail.movements_total, Amount::from_cents(4200));
        assert_eq!(detail.movements[0].name, "Dinner");
    }

    #[test]
    fn test_group_total_is_exact() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let food = create_group(&alice, &conn, &group_params("Food", "food.svg")).unwrap();
        create_movement(&alice, &conn, &food.id, &movement_params("Gum", json!("0.1"))).unwrap();
        create_movement(&alice, &conn, &food.id, &movement_params("Mint", json!(0.2))).unwrap();

        let groups = list_groups(&alice, &conn).unwrap();
        assert_eq!(groups[0].movements_total, "0.3".parse::<Amount>().unwrap());
        let detail = show_group(&alice, &conn, &food.id).unwrap();
        assert_eq!(detail.movements_total.to_string(), "0.30");
    }

    #[test]
    fn test_user_param_must_match_principal() {
        let conn = setup();
        let alice = create_principal(&conn, "Alice");
        let bob = create_principal(&conn, "Bob");

        assert!(check_user_param(&alice, alice.id().unwrap()).is_ok());
        assert!(matches!(
            check_user_param(&alice, bob.id().unwrap()),
            Err(AppError::NotFound("user"))
        ));
        assert!(matches!(
            check_user_param(&Principal::Anonymous, "anything"),
            Err(AppError::Unauthenticated)
        ));
    }
}
