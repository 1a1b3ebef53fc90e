use log::debug;

use crate::quiz::QuizAction;

/// Maps a panel token to a quiz action. Total and side-effect-free: unknown
/// tokens are dropped, never errors. All consequences happen when the
/// action is applied to the session.
pub fn token_to_action(token: &str) -> Option<QuizAction> {
    match token {
        "blue" => Some(QuizAction::SelectOption(0)),
        "green" => Some(QuizAction::SelectOption(1)),
        "yellow" => Some(QuizAction::SelectOption(2)),
        // Reserved 4th slot on the panel; the session treats the index as a
        // no-op while questions carry 3 options.
        "white" => Some(QuizAction::SelectOption(3)),
        "submit" | "enter" | "ok" => Some(QuizAction::Submit),
        "next" => Some(QuizAction::Advance),
        "reconnect" => Some(QuizAction::RequestReconnect),
        other => {
            debug!("ignoring unknown serial token '{other}'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_color_tokens_to_option_indices() {
        assert_eq!(token_to_action("blue"), Some(QuizAction::SelectOption(0)));
        assert_eq!(token_to_action("green"), Some(QuizAction::SelectOption(1)));
        assert_eq!(token_to_action("yellow"), Some(QuizAction::SelectOption(2)));
        assert_eq!(token_to_action("white"), Some(QuizAction::SelectOption(3)));
    }

    #[test]
    fn maps_submit_aliases() {
        for token in ["submit", "enter", "ok"] {
            assert_eq!(token_to_action(token), Some(QuizAction::Submit));
        }
    }

    #[test]
    fn maps_control_tokens() {
        assert_eq!(token_to_action("next"), Some(QuizAction::Advance));
        assert_eq!(
            token_to_action("reconnect"),
            Some(QuizAction::RequestReconnect)
        );
    }

    #[test]
    fn drops_unknown_tokens() {
        assert_eq!(token_to_action("purple"), None);
        assert_eq!(token_to_action(""), None);
        assert_eq!(token_to_action("button pressed: 1"), None);
    }
}
