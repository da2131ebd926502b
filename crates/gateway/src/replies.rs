use rolecall_core::domain::ids::RoleId;

/// An ephemeral reply to the invoker, optionally carrying one interactive
/// control. The dialogue walks the invoker through its steps by editing
/// this reply in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionReply {
    pub content: String,
    pub control: Option<ReplyControl>,
    pub ephemeral: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyControl {
    /// Role picker; selections come back as component interactions carrying
    /// the same token in their custom id.
    RoleSelect { token: String },
    /// The Done button shown during emoji capture and confirmation.
    ConfirmButton { token: String, label: String, enabled: bool },
}

pub fn role_select_prompt(token: &str) -> InteractionReply {
    InteractionReply {
        content: "Which role should I hand out? Pick one below.".to_string(),
        control: Some(ReplyControl::RoleSelect { token: token.to_string() }),
        ephemeral: true,
    }
}

pub fn emoji_prompt(token: &str) -> InteractionReply {
    InteractionReply {
        content: "Now react to that message with the emoji you want to use, then press Done."
            .to_string(),
        control: Some(confirm_button(token, false)),
        ephemeral: true,
    }
}

pub fn emoji_staged(token: &str, emoji: &str) -> InteractionReply {
    InteractionReply {
        content: format!("Got it, I'll use {emoji}. Press Done to confirm."),
        control: Some(confirm_button(token, true)),
        ephemeral: true,
    }
}

pub fn emoji_invalid(token: &str) -> InteractionReply {
    InteractionReply {
        content: "I can't find that emoji. It has to be from this server. Try another reaction."
            .to_string(),
        control: Some(confirm_button(token, false)),
        ephemeral: true,
    }
}

pub fn emoji_retry(token: &str) -> InteractionReply {
    InteractionReply {
        content: "I haven't seen a reaction from you yet. React to the message first, then press Done."
            .to_string(),
        control: Some(confirm_button(token, false)),
        ephemeral: true,
    }
}

pub fn bound_confirmation(emoji: &str, role_id: &RoleId) -> InteractionReply {
    InteractionReply {
        content: format!("All set. Reacting with {emoji} now grants <@&{}>.", role_id.0),
        control: None,
        ephemeral: true,
    }
}

pub fn failure(message: &str) -> InteractionReply {
    InteractionReply { content: message.to_string(), control: None, ephemeral: true }
}

fn confirm_button(token: &str, enabled: bool) -> ReplyControl {
    ReplyControl::ConfirmButton { token: token.to_string(), label: "Done".to_string(), enabled }
}
