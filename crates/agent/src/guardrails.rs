use marketer_core::dialogue::{Keyboard, OutgoingMessage};
use marketer_core::entitlement::{AccessDecision, DenialReason};

/// What a handler does after an entitlement check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

impl GateDecision {
    /// Denials point at the tariff picker and always show the current tariff status.
    pub fn evaluate(decision: &AccessDecision, status_label: &str) -> Self {
        match decision {
            AccessDecision::Allowed => Self::Allow,
            AccessDecision::Denied(reason) => Self::Deny {
                reason_code: reason.reason_code(),
                user_message: format!("{}\n\nCurrent status: {status_label}", reason.user_message()),
                fallback_path: fallback_path(reason),
            },
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn reply(&self) -> Option<OutgoingMessage> {
        match self {
            Self::Allow => None,
            Self::Deny { user_message, .. } => {
                Some(OutgoingMessage::with_keyboard(user_message.clone(), Keyboard::Tariffs))
            }
        }
    }
}

fn fallback_path(reason: &DenialReason) -> &'static str {
    match reason {
        DenialReason::NoActiveSubscription => "tariff_purchase",
        DenialReason::QuotaExhausted { .. } => "tariff_renewal",
    }
}

#[cfg(test)]
mod tests {
    use marketer_core::dialogue::Keyboard;
    use marketer_core::domain::entitlement::UsageCategory;
    use marketer_core::entitlement::{AccessDecision, DenialReason};

    use super::GateDecision;

    #[test]
    fn allowed_access_passes_without_reply() {
        let gate = GateDecision::evaluate(&AccessDecision::Allowed, "Agency 360 (days left: 3)");
        assert!(gate.is_allowed());
        assert_eq!(gate.reply(), None);
    }

    #[test]
    fn missing_subscription_denial_points_to_tariffs() {
        let gate = GateDecision::evaluate(
            &AccessDecision::Denied(DenialReason::NoActiveSubscription),
            "Free mode",
        );

        let (reason_code, user_message, fallback_path) = match &gate {
            GateDecision::Deny { reason_code, user_message, fallback_path } => {
                (*reason_code, user_message.clone(), *fallback_path)
            }
            GateDecision::Allow => ("", String::new(), ""),
        };
        assert_eq!(reason_code, "no_active_subscription");
        assert!(user_message.ends_with("Current status: Free mode"));
        assert_eq!(fallback_path, "tariff_purchase");
        assert_eq!(gate.reply().and_then(|reply| reply.keyboard().cloned()), Some(Keyboard::Tariffs));
    }

    #[test]
    fn exhausted_quota_denial_suggests_renewal() {
        let gate = GateDecision::evaluate(
            &AccessDecision::Denied(DenialReason::QuotaExhausted {
                category: UsageCategory::Video,
                limit: 15,
                used: 15,
            }),
            "Content Studio (days left: 12)",
        );

        assert!(matches!(
            gate,
            GateDecision::Deny { reason_code: "quota_exhausted", fallback_path: "tariff_renewal", .. }
        ));
    }
}
