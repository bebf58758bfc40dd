use std::collections::BTreeMap;
use std::fmt;

/// Values collected while a user walks through a scenario.
pub type Context = BTreeMap<String, String>;

/// Opaque identifier of a user on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        UserId(value.to_string())
    }
}

/// Position of a user inside a scenario. Only exists while the user is
/// mid-scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub user_id: UserId,
    pub scenario_name: String,
    pub step_name: String,
    pub context: Context,
}

impl UserState {
    pub fn new(user_id: UserId, scenario_name: &str, step_name: &str) -> Self {
        UserState {
            user_id,
            scenario_name: scenario_name.to_string(),
            step_name: step_name.to_string(),
            context: Context::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    MessageNew,
    Other(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::MessageNew => f.write_str("message_new"),
            EventKind::Other(kind) => f.write_str(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub user_id: UserId,
    pub text: String,
}

impl InboundEvent {
    pub fn message(user_id: impl Into<UserId>, text: &str) -> Self {
        InboundEvent {
            kind: EventKind::MessageNew,
            user_id: user_id.into(),
            text: text.to_string(),
        }
    }
}
