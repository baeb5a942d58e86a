// Group Budget - Core Library
// Exposes all modules for use in the admin CLI, the API server, and tests

pub mod ability;     // Authorization rules, first match wins
pub mod access;      // Ownership-scoped lookups and record builders
pub mod assets;      // Group icons & profile images
pub mod config;      // Flags, env, logging
pub mod db;          // SQLite persistence
pub mod entities;    // User, Group, Movement
pub mod error;
pub mod identity;    // Registration, confirmation, sessions
pub mod validation;  // Field rules

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use ability::{Ability, Action, Effect, Ownership, ResourceKind, Rule, is_allowed};
pub use access::{
    build_group, build_movement, check_user_param, create_group, create_movement,
    create_movement_in_selected_group, destroy_group, destroy_movement, find_owned_group,
    find_owned_movement, group_choices, list_groups, movement_form, show_group, update_group,
    update_movement,
};
pub use db::{open_database, setup_database};
pub use entities::{
    Group, GroupDetail, GroupParams, GroupSummary,
    Amount, Movement, MovementParams,
    Principal, User,
};
pub use error::{AppError, FormState, GroupChoice, Result};
pub use identity::{AccountParams, Registration, RegistrationParams, Session};
pub use validation::{ValidationError, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
