//! Link submission, inspection, and deletion with refunds.

use std::sync::Arc;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ports::{
    AddLinkOutcome, DeleteLinkOutcome, LinkRepository, NewLink, Notifier, UserRepository,
};
use super::service_support::{complete_and_notify, map_store_error};
use super::{
    Cart, DomainResult, EconomyConfig, Error, Link, LinkDetails, LinkId, LinkUrl, Performer,
    Platform, UserId, drafts_total, price_cart,
};

/// Credits returned by a deletion and the owner's resulting balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRefund {
    pub refund: i64,
    pub balance: i64,
}

/// Normalise a submitted URL and detect the platform serving it.
pub fn detect_platform(raw: &str) -> DomainResult<(LinkUrl, Platform)> {
    let url = LinkUrl::parse(raw).map_err(|err| Error::invalid_request(err.to_string()))?;
    let platform = Platform::detect(&url).ok_or_else(|| {
        Error::invalid_request(format!("unsupported platform host: {}", url.host()))
    })?;
    Ok((url, platform))
}

#[derive(Clone)]
pub struct LinkService<L, U, N> {
    links: Arc<L>,
    users: Arc<U>,
    notifier: Arc<N>,
    economy: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
}

impl<L, U, N> LinkService<L, U, N> {
    pub fn new(
        links: Arc<L>,
        users: Arc<U>,
        notifier: Arc<N>,
        economy: Arc<EconomyConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            links,
            users,
            notifier,
            economy,
            clock,
        }
    }
}

impl<L, U, N> LinkService<L, U, N>
where
    L: LinkRepository,
    U: UserRepository,
    N: Notifier,
{
    /// Submit a link and pay for the requested actions.
    pub async fn add_link(
        &self,
        owner: UserId,
        raw_url: &str,
        cart: Cart,
    ) -> DomainResult<AddLinkOutcome> {
        if cart.is_empty() {
            return Err(Error::invalid_request("cart must request at least one action"));
        }
        let (url, platform) = detect_platform(raw_url)?;
        let requirements = price_cart(&cart, &self.economy);
        let total = drafts_total(&requirements);

        let outcome = self
            .links
            .create_link(NewLink {
                owner,
                url,
                platform,
                requirements,
                created_at: self.clock.utc(),
            })
            .await
            .map_err(map_store_error)?;

        match &outcome {
            AddLinkOutcome::Created { details, balance } => info!(
                user_id = %owner,
                link_id = %details.link.id,
                amount = total,
                balance,
                "link created"
            ),
            AddLinkOutcome::InsufficientFunds { balance, required } => info!(
                user_id = %owner,
                balance,
                required,
                "link rejected for insufficient funds"
            ),
        }
        Ok(outcome)
    }

    /// Delete an owned link and refund its unserved credit.
    pub async fn delete_link(&self, owner: UserId, link: LinkId) -> DomainResult<LinkRefund> {
        let outcome = self
            .links
            .delete_link(owner, link, self.economy.refund_percent)
            .await
            .map_err(map_store_error)?;
        match outcome {
            DeleteLinkOutcome::Deleted { refund, balance } => {
                info!(user_id = %owner, link_id = %link, amount = refund, balance, "link deleted");
                Ok(LinkRefund { refund, balance })
            }
            DeleteLinkOutcome::NotFound => Err(Error::not_found(format!("link {link} not found"))),
            DeleteLinkOutcome::NotOwner => Err(Error::forbidden(format!(
                "link {link} belongs to another user"
            ))),
        }
    }

    pub async fn list_links(&self, owner: UserId) -> DomainResult<Vec<LinkDetails>> {
        self.links
            .links_by_owner(owner)
            .await
            .map_err(map_store_error)
    }

    pub async fn link_details(&self, link: LinkId) -> DomainResult<LinkDetails> {
        self.links
            .find_link(link)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("link {link} not found")))
    }

    /// Completions recorded on an owned link.
    pub async fn performers(&self, owner: UserId, link: LinkId) -> DomainResult<Vec<Performer>> {
        let details = self.link_details(link).await?;
        if details.link.owner_id != owner {
            return Err(Error::forbidden(format!(
                "link {link} belongs to another user"
            )));
        }
        self.links.performers(link).await.map_err(map_store_error)
    }

    /// Re-run the completion check, notifying the owner on transition.
    pub async fn recheck_completion(&self, link: LinkId) -> DomainResult<Option<Link>> {
        complete_and_notify(
            self.links.as_ref(),
            self.users.as_ref(),
            self.notifier.as_ref(),
            link,
            self.economy.completion_policy,
        )
        .await
    }
}

#[cfg(test)]
#[path = "link_service_tests.rs"]
mod tests;
