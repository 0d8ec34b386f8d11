use crate::domain::action::Action;
use crate::domain::session::SessionId;

/// One tappable option: a label for the user and the payload the transport
/// must echo back when it is tapped. Payloads are always produced by
/// [`Action::encode`], so everything the core emits parses back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            payload: action.encode(),
        }
    }
}

/// A transport-agnostic render instruction: what to display, not how. The
/// chat collaborator maps this onto its own message/media/keyboard calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub text: String,
    pub image: Option<String>,
    pub buttons: Vec<Button>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        let image_ref = image_ref.into();
        if !image_ref.is_empty() {
            self.image = Some(image_ref);
        }
        self
    }

    pub fn with_button(mut self, label: impl Into<String>, action: Action) -> Self {
        self.buttons.push(Button::new(label, action));
        self
    }
}

/// A reply addressed to the session it belongs to, as handed to the
/// transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub session: SessionId,
    pub reply: Reply,
}
