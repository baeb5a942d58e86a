// 🔐 Ability Rules - Authorization as Data
// Ordered (actions, resource, ownership) rules, first match wins, default deny

use serde::Serialize;
use tracing::debug;

use crate::entities::Principal;
use crate::error::{AppError, Result};

// ============================================================================
// ACTIONS & RESOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }
}

/// Every action: `manage`
pub const MANAGE: &[Action] = &[Action::Read, Action::Create, Action::Update, Action::Destroy];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    Group,
    Movement,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Group => "group",
            ResourceKind::Movement => "movement",
        }
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// Condition on the resource's owning user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Owner id must equal this id
    OwnedBy(String),
    /// Matches regardless of owner
    Any,
}

impl Ownership {
    fn holds(&self, owner_id: Option<&str>) -> bool {
        match self {
            Ownership::Any => true,
            Ownership::OwnedBy(id) => owner_id == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub effect: Effect,
    pub actions: Vec<Action>,
    pub resource: ResourceKind,
    pub ownership: Ownership,
}

impl Rule {
    pub fn can(actions: &[Action], resource: ResourceKind, ownership: Ownership) -> Self {
        Rule {
            effect: Effect::Allow,
            actions: actions.to_vec(),
            resource,
            ownership,
        }
    }

    pub fn cannot(actions: &[Action], resource: ResourceKind, ownership: Ownership) -> Self {
        Rule {
            effect: Effect::Deny,
            actions: actions.to_vec(),
            resource,
            ownership,
        }
    }

    /// Check if this rule applies to the request
    pub fn matches(&self, action: Action, resource: ResourceKind, owner_id: Option<&str>) -> bool {
        self.resource == resource
            && self.actions.contains(&action)
            && self.ownership.holds(owner_id)
    }
}

// ============================================================================
// ABILITY
// ============================================================================

/// The evaluated rule list for one principal
#[derive(Debug, Clone)]
pub struct Ability {
    principal_id: Option<String>,
    rules: Vec<Rule>,
}

impl Ability {
    /// Empty rule list: denies everything
    pub fn none() -> Self {
        Ability {
            principal_id: None,
            rules: Vec::new(),
        }
    }

    /// Create ability from an ordered list of rules
    pub fn from_rules(principal_id: Option<String>, rules: Vec<Rule>) -> Self {
        Ability { principal_id, rules }
    }

    /// The standard rule set.
    ///
    /// Anonymous principals get no rules. A persisted user manages the groups
    /// they own, the movements inside those groups, and their own account
    /// (but cannot create another account through it).
    pub fn for_principal(principal: &Principal) -> Self {
        let Some(id) = principal.id() else {
            return Ability::none();
        };

        let own = || Ownership::OwnedBy(id.to_string());
        let rules = vec![
            Rule::can(MANAGE, ResourceKind::Group, own()),
            Rule::can(MANAGE, ResourceKind::Movement, own()),
            Rule::cannot(&[Action::Create], ResourceKind::User, Ownership::Any),
            Rule::can(MANAGE, ResourceKind::User, own()),
        ];

        Ability::from_rules(Some(id.to_string()), rules)
    }

    /// Add a rule at the end of the list (lowest precedence)
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Is the action permitted?
    ///
    /// `owner_id` is the resource's owning user: the group's owner for both
    /// groups and movements, the user itself for accounts.
    pub fn can(&self, action: Action, resource: ResourceKind, owner_id: Option<&str>) -> bool {
        let decision = self
            .rules
            .iter()
            .find(|rule| rule.matches(action, resource, owner_id))
            .map(|rule| rule.effect)
            .unwrap_or(Effect::Deny);

        debug!(
            principal = self.principal_id.as_deref().unwrap_or("anonymous"),
            action = action.as_str(),
            resource = resource.as_str(),
            allowed = decision == Effect::Allow,
            "ability check"
        );

        decision == Effect::Allow
    }

    /// Like `can`, but as a `Forbidden` error
    pub fn authorize(&self, action: Action, resource: ResourceKind, owner_id: &str) -> Result<()> {
        if self.can(action, resource, Some(owner_id)) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                action: action.as_str(),
                resource: resource.as_str(),
            })
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// One-shot decision: `is_allowed(principal, action, resource, owner)`
pub fn is_allowed(
    principal: &Principal,
    action: Action,
    resource: ResourceKind,
    owner_id: Option<&str>,
) -> bool {
    Ability::for_principal(principal).can(action, resource, owner_id)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::User;
    use chrono::Utc;

    fn principal(id: &str) -> Principal {
        Principal::User(User {
            id: id.to_string(),
            name: "Tester".to_string(),
            email: format!("{}@example.com", id),
            profile_image: "avatar-1.png".to_string(),
            confirmed_at: Some(Utc::now()),
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_owner_manages_groups_and_movements() {
        let alice = principal("alice");
        for action in MANAGE {
            assert!(is_allowed(&alice, *action, ResourceKind::Group, Some("alice")));
            assert!(is_allowed(&alice, *action, ResourceKind::Movement, Some("alice")));
        }
    }

    #[test]
    fn test_other_owner_denied_even_for_read() {
        let bob = principal("bob");
        for action in MANAGE {
            assert!(!is_allowed(&bob, *action, ResourceKind::Group, Some("alice")));
            assert!(!is_allowed(&bob, *action, ResourceKind::Movement, Some("alice")));
        }
    }

    #[test]
    fn test_anonymous_denied_everything() {
        let anonymous = Principal::Anonymous;
        let ability = Ability::for_principal(&anonymous);
        assert_eq!(ability.rule_count(), 0);

        for resource in [ResourceKind::User, ResourceKind::Group, ResourceKind::Movement] {
            for action in MANAGE {
                assert!(!ability.can(*action, resource, Some("alice")));
                assert!(!ability.can(*action, resource, None));
            }
        }
    }

    #[test]
    fn test_missing_owner_is_denied() {
        let alice = principal("alice");
        assert!(!is_allowed(&alice, Action::Read, ResourceKind::Group, None));
    }

    #[test]
    fn test_account_rules() {
        let alice = principal("alice");
        assert!(is_allowed(&alice, Action::Update, ResourceKind::User, Some("alice")));
        assert!(is_allowed(&alice, Action::Destroy, ResourceKind::User, Some("alice")));
        assert!(!is_allowed(&alice, Action::Destroy, ResourceKind::User, Some("bob")));
        // The deny rule sits ahead of the broader allow
        assert!(!is_allowed(&alice, Action::Create, ResourceKind::User, Some("alice")));
    }

    #[test]
    fn test_first_match_wins() {
        let mut ability = Ability::from_rules(
            Some("alice".to_string()),
            vec![Rule::cannot(&[Action::Destroy], ResourceKind::Group, Ownership::Any)],
        );
        ability.push(Rule::can(MANAGE, ResourceKind::Group, Ownership::OwnedBy("alice".into())));

        assert!(!ability.can(Action::Destroy, ResourceKind::Group, Some("alice")));
        assert!(ability.can(Action::Read, ResourceKind::Group, Some("alice")));
    }

    #[test]
    fn test_unlisted_resource_defaults_to_deny() {
        let ability = Ability::from_rules(
            Some("alice".to_string()),
            vec![Rule::can(MANAGE, ResourceKind::Group, Ownership::Any)],
        );
        assert!(ability.can(Action::Read, ResourceKind::Group, Some("anyone")));
        assert!(!ability.can(Action::Read, ResourceKind::Movement, Some("alice")));
    }

    #[test]
    fn test_authorize_returns_forbidden() {
        let bob = principal("bob");
        let err = Ability::for_principal(&bob)
            .authorize(Action::Destroy, ResourceKind::Group, "alice")
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Forbidden {
                action: "destroy",
                resource: "group"
            }
        ));
    }
}
