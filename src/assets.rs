// 🎨 Bundled Assets - the fixed icon and profile image sets
//
// Groups and users reference these by file name. Anything outside the
// lists is rejected at validation time.

use serde::Serialize;

/// Icons a group may use
pub const GROUP_ICONS: &[&str] = &[
    "bank.svg",
    "bus.svg",
    "car.svg",
    "coffee.svg",
    "education.svg",
    "food.svg",
    "gift.svg",
    "health.svg",
    "home.svg",
    "party.svg",
    "pets.svg",
    "plane.svg",
    "shopping.svg",
    "sports.svg",
    "utilities.svg",
];

/// Profile images a user may pick at registration
pub const PROFILE_IMAGES: &[&str] = &[
    "avatar-1.png",
    "avatar-2.png",
    "avatar-3.png",
    "avatar-4.png",
    "avatar-5.png",
    "avatar-6.png",
];

pub fn is_group_icon(name: &str) -> bool {
    GROUP_ICONS.contains(&name)
}

pub fn is_profile_image(name: &str) -> bool {
    PROFILE_IMAGES.contains(&name)
}

#[derive(Debug, Serialize)]
pub struct AssetCatalog {
    pub icons: Vec<&'static str>,
    pub profile_images: Vec<&'static str>,
}

pub fn catalog() -> AssetCatalog {
    AssetCatalog {
        icons: GROUP_ICONS.to_vec(),
        profile_images: PROFILE_IMAGES.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_membership_is_exact() {
        assert!(is_group_icon("food.svg"));
        assert!(!is_group_icon("FOOD.svg"));
        assert!(!is_group_icon("../food.svg"));
        assert!(!is_group_icon(""));
    }

    #[test]
    fn test_profile_images_are_separate_from_icons() {
        assert!(is_profile_image("avatar-1.png"));
        assert!(!is_profile_image("food.svg"));
        assert!(!is_group_icon("avatar-1.png"));
    }
}
