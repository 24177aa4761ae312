//! Environment variables recognized by multiship.
//!
//! Any config key can be overridden with the `MULTISHIP_` prefix and `__`
//! separator for nested paths (e.g. `MULTISHIP_FEATURES__DELIVERY_DATES_ENABLED`).

/// An environment variable definition
#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
}

pub const ENV_VARS: &[EnvVar] = &[
    EnvVar {
        name: "MULTISHIP_GATEWAY__BASE_URL",
        description: "Storefront base URL",
        default: Some("http://localhost:3000"),
    },
    EnvVar {
        name: "MULTISHIP_CHECKOUT_ID",
        description: "Checkout to operate on when --checkout is not given",
        default: None,
    },
    EnvVar {
        name: "MULTISHIP_GATEWAY__TIMEOUT_SECS",
        description: "Transport timeout for each gateway call",
        default: Some("30"),
    },
    EnvVar {
        name: "MULTISHIP_FEATURES__DELIVERY_DATES_ENABLED",
        description: "Require a delivery date per item",
        default: Some("false"),
    },
    EnvVar {
        name: "MULTISHIP_FEATURES__GIFT_MESSAGES_ENABLED",
        description: "Offer a gift message per item",
        default: Some("false"),
    },
    EnvVar {
        name: "MULTISHIP_FEATURES__AUTO_RECOMMEND_OPTION",
        description: "Select the recommended shipping option automatically",
        default: Some("false"),
    },
    EnvVar {
        name: "MULTISHIP_PATHS__STATE",
        description: "Directory for the consignment cache and logs",
        default: Some(".multiship"),
    },
    EnvVar {
        name: "MULTISHIP_LOGGING__LEVEL",
        description: "Log level filter",
        default: Some("info"),
    },
    EnvVar {
        name: "RUST_LOG",
        description: "Overrides the configured log filter",
        default: None,
    },
];

/// Look up a variable definition by name
pub fn find(name: &str) -> Option<&'static EnvVar> {
    ENV_VARS.iter().find(|v| v.name == name)
}
