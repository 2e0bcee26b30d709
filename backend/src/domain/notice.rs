//! User-facing notifications emitted by ledger operations.
//!
//! Delivery is best-effort: the ledger mutation that produced a notice is
//! already committed when the notice is sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ComplaintId, ExternalUserId, LinkId, LinkUrl, UnbanRequestId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Notice {
    /// Sent to the owner when their link is fully served.
    LinkCompleted { link_id: LinkId, url: LinkUrl },
    /// Sent to a referrer when someone registers with their code.
    RegistrationBonus {
        referred: Option<String>,
        amount: i64,
    },
    /// Sent to the accused after a confirmed violation.
    Warning {
        warnings: u32,
        remaining: u32,
        category: String,
    },
    /// Sent to a user who has just been banned.
    Banned {
        reason: String,
        expires_at: Option<DateTime<Utc>>,
    },
    /// Sent when an administrator lifts a ban.
    Unbanned,
    /// Sent when an unban request is declined.
    UnbanDeclined,
    /// Sent to the complainant once their complaint is decided.
    ComplaintDecided {
        complaint_id: ComplaintId,
        upheld: bool,
    },
    /// Sent to the administrator when a complaint is filed.
    ComplaintFiled {
        complaint_id: ComplaintId,
        link_id: LinkId,
        category: String,
    },
    /// Sent to the administrator when a banned user asks for an unban.
    UnbanRequested {
        request_id: UnbanRequestId,
        user: ExternalUserId,
    },
    /// Free text from an administrator.
    Broadcast { text: String },
}

impl Notice {
    /// Plain-text rendering used by text-only notifiers.
    pub fn text(&self) -> String {
        match self {
            Self::LinkCompleted { url, .. } => format!("Your link {url} has been fully served."),
            Self::RegistrationBonus { referred, amount } => match referred {
                Some(name) => format!("{name} joined with your referral code: +{amount} credits."),
                None => format!("A new user joined with your referral code: +{amount} credits."),
            },
            Self::Warning {
                warnings,
                remaining,
                category,
            } => match remaining {
                1 => format!(
                    "Warning {warnings} for \"{category}\". The next confirmed violation is a ban."
                ),
                _ => format!(
                    "Warning {warnings} for \"{category}\". {remaining} more confirmed violations lead to a ban."
                ),
            },
            Self::Banned { reason, expires_at } => match expires_at {
                Some(until) => format!("You are banned until {until}: {reason}."),
                None => format!("You are banned permanently: {reason}."),
            },
            Self::Unbanned => "Your ban has been lifted.".to_owned(),
            Self::UnbanDeclined => "Your unban request was declined.".to_owned(),
            Self::ComplaintDecided {
                complaint_id,
                upheld: true,
            } => format!("Complaint #{complaint_id} was upheld."),
            Self::ComplaintDecided { complaint_id, .. } => {
                format!("Complaint #{complaint_id} was reviewed and found not to be a violation.")
            }
            Self::ComplaintFiled {
                complaint_id,
                link_id,
                category,
            } => format!("New complaint #{complaint_id} on link #{link_id}: {category}."),
            Self::UnbanRequested { request_id, user } => {
                format!("Unban request #{request_id} from user {user}.")
            }
            Self::Broadcast { text } => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn last_warning_mentions_ban() {
        let notice = Notice::Warning {
            warnings: 2,
            remaining: 1,
            category: "fake like".to_owned(),
        };
        assert!(notice.text().contains("next confirmed violation is a ban"));
    }

    #[rstest]
    fn broadcast_text_is_verbatim() {
        let notice = Notice::Broadcast {
            text: "maintenance at 10:00".to_owned(),
        };
        assert_eq!(notice.text(), "maintenance at 10:00");
    }
}
