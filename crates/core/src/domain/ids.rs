use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
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
    /// Remote agent (assistant) created for one session.
    AgentId
);
string_id!(
    /// Remote conversation thread; the service owns its history.
    ThreadId
);
string_id!(MessageId);
string_id!(RunId);
string_id!(
    /// Project connection that points the SharePoint tool at a site.
    ConnectionId
);

#[cfg(test)]
mod tests {
    use super::{RunId, ThreadId};

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ThreadId::new("thread_abc")).expect("serialize");
        assert_eq!(json, "\"thread_abc\"");

        let parsed: RunId = serde_json::from_str("\"run_1\"").expect("deserialize");
        assert_eq!(parsed.as_str(), "run_1");
        assert_eq!(parsed.to_string(), "run_1");
    }
}
