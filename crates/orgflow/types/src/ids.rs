use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of an organization tree node.
    NodeId
);
string_id!(
    /// Identifier of a person in the external directory.
    PersonId
);
string_id!(
    /// Identifier of an approval policy.
    PolicyId
);
string_id!(
    /// Identifier of a decider delegation.
    DelegationId
);
string_id!(
    /// Identifier of an approval request.
    RequestId
);
string_id!(
    /// Identifier of a single approval decision.
    DecisionId
);
string_id!(
    /// Identifier of a person-to-node membership record.
    MembershipId
);
