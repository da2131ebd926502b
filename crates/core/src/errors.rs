use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("dialogue invariant violation: {0}")]
    InvariantViolation(String),
}

/// Who is missing the Manage Roles permission: the person driving the
/// dialogue, or the bot account itself. The two get different replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionActor {
    Invoker,
    Bot,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReactionRoleError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("binding store unavailable: {0}")]
    StorageUnavailable(String),
    #[error("role not found: {0}")]
    RoleNotFound(String),
    #[error("emoji not found: {0}")]
    EmojiNotFound(String),
    #[error("manage-roles permission missing for {actor:?}")]
    PermissionDenied { actor: PermissionActor },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("gateway request failed: {0}")]
    Gateway(String),
}

impl ReactionRoleError {
    /// Chat-safe reply text. Internal detail stays in the logs; the user
    /// only ever sees these.
    pub fn user_message(&self) -> String {
        match self {
            Self::StorageUnavailable(_) => {
                "Something went wrong on my side. Please try that step again.".to_owned()
            }
            Self::RoleNotFound(raw) => {
                format!("I can't find a role matching `{raw}`.")
            }
            Self::EmojiNotFound(_) => {
                "I can't find that emoji. It has to be from this server.".to_owned()
            }
            Self::PermissionDenied { actor: PermissionActor::Invoker } => {
                "You need the Manage Roles permission to set this up.".to_owned()
            }
            Self::PermissionDenied { actor: PermissionActor::Bot } => {
                "It seems like I don't have the correct permissions to assign this role. \
                 I need Manage Roles, and that role has to be above the one I am assigning."
                    .to_owned()
            }
            Self::NotFound(_) => {
                "I couldn't find that message or dialogue any more.".to_owned()
            }
            Self::Gateway(_) => {
                "I couldn't reach the chat platform to finish that step. Please try again."
                    .to_owned()
            }
            Self::Domain(_) => {
                "That step is no longer valid for this dialogue. Start over with the command."
                    .to_owned()
            }
        }
    }

    /// Terminal failures should not be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Gateway(_))
    }
}
