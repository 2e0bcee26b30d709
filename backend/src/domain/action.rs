//! Reciprocal action types and the per-link shopping cart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four reciprocal actions a participant can perform on a link.
///
/// The declaration order is also the order in which requirement rows are
/// created for a new link, so the cheapest pending action is offered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Open and look at the work.
    View,
    /// Like ("appreciate") the work.
    Like,
    /// Leave a comment.
    Comment,
    /// Follow the author.
    Follow,
}

impl ActionType {
    /// Every action type in requirement-row order.
    pub const ALL: [Self; 4] = [Self::View, Self::Like, Self::Comment, Self::Follow];

    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action type: {0}")]
pub struct UnknownActionType(pub String);

impl FromStr for ActionType {
    type Err = UnknownActionType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "view" => Ok(Self::View),
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "follow" => Ok(Self::Follow),
            other => Err(UnknownActionType(other.to_owned())),
        }
    }
}

/// Units of each action type an owner wants to buy for a new link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Requested views.
    pub views: u32,
    /// Requested likes.
    pub likes: u32,
    /// Requested comments.
    pub comments: u32,
    /// Requested follows.
    pub follows: u32,
}

impl Cart {
    /// Units requested for `action`.
    pub const fn units(&self, action: ActionType) -> u32 {
        match action {
            ActionType::View => self.views,
            ActionType::Like => self.likes,
            ActionType::Comment => self.comments,
            ActionType::Follow => self.follows,
        }
    }

    /// Set the units for `action`, returning the updated cart.
    #[must_use]
    pub const fn with(mut self, action: ActionType, units: u32) -> Self {
        match action {
            ActionType::View => self.views = units,
            ActionType::Like => self.likes = units,
            ActionType::Comment => self.comments = units,
            ActionType::Follow => self.follows = units,
        }
        self
    }

    /// True when no units are requested at all.
    pub const fn is_empty(&self) -> bool {
        self.views == 0 && self.likes == 0 && self.comments == 0 && self.follows == 0
    }

    /// Non-zero lines of the cart in requirement-row order.
    pub fn lines(&self) -> impl Iterator<Item = (ActionType, u32)> + '_ {
        ActionType::ALL
            .into_iter()
            .map(|action| (action, self.units(action)))
            .filter(|(_, units)| *units > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("view", ActionType::View)]
    #[case("like", ActionType::Like)]
    #[case("comment", ActionType::Comment)]
    #[case("follow", ActionType::Follow)]
    fn parses_storage_representation(#[case] raw: &str, #[case] expected: ActionType) {
        assert_eq!(raw.parse::<ActionType>(), Ok(expected));
        assert_eq!(expected.as_str(), raw);
    }

    #[rstest]
    fn rejects_unknown_action() {
        assert_eq!(
            "share".parse::<ActionType>(),
            Err(UnknownActionType("share".to_owned()))
        );
    }

    #[rstest]
    fn cart_lines_skip_zero_units_and_keep_row_order() {
        let cart = Cart::default()
            .with(ActionType::Follow, 1)
            .with(ActionType::View, 3);
        let lines: Vec<_> = cart.lines().collect();
        assert_eq!(lines, vec![(ActionType::View, 3), (ActionType::Follow, 1)]);
        assert!(!cart.is_empty());
        assert!(Cart::default().is_empty());
    }
}
