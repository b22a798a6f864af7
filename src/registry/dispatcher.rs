//! Post composition: maps a reconstructed state transition to the text
//! of exactly one social update. Pure, so the state machine is testable
//! without any collaborator.

use alloy::primitives::U256;

use crate::chain::ItemStatus;
use crate::registry::snapshot::{format_amount, EntitySnapshot};

/// A planned publish action. `attach_symbol` asks the pipeline to fetch
/// the item's symbol image and attach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub attach_symbol: bool,
}

impl Notice {
    fn plain(text: String) -> Self {
        Self {
            text,
            attach_symbol: false,
        }
    }
}

/// Compose the notice for a status transition.
///
/// `explorer_link` is only consulted for undisputed registration
/// requests, the one notice that points at the item's own address.
pub fn status_notice(
    snap: &EntitySnapshot,
    listing_link: &str,
    explorer_link: Option<&str>,
) -> Notice {
    let name = &snap.name;
    let ticker = &snap.ticker;
    match snap.status {
        ItemStatus::Absent => {
            // A later request means this was a removal of a listed item,
            // not a first-time rejection.
            let verb = if snap.request_count > 1 {
                "removed"
            } else {
                "rejected"
            };
            let mut text = format!("{name} ${ticker} has been {verb} from the list.");
            if snap.disputed {
                text.push_str(&format!(
                    " The challenger has won the deposit of {} ETH",
                    format_amount(snap.deposits.requester_winnable)
                ));
            }
            Notice::plain(text)
        }
        ItemStatus::Registered => {
            let mut text = format!("{name} ${ticker} has been accepted into the list.");
            if snap.disputed {
                text.push_str(&format!(
                    " The submitter has taken the challenger's deposit of {} ETH",
                    format_amount(snap.deposits.challenger_winnable)
                ));
            }
            Notice::plain(text)
        }
        ItemStatus::RegistrationRequested | ItemStatus::ClearingRequested => {
            if snap.disputed && !snap.appealed {
                return Notice::plain(format!(
                    "Listing challenged! {name} ${ticker} is headed to arbitration {listing_link}"
                ));
            }
            if snap.disputed && snap.appealed {
                return Notice::plain(format!(
                    "The ruling on {name} ${ticker} has been appealed {listing_link}"
                ));
            }
            if snap.status == ItemStatus::RegistrationRequested {
                let deposit = format_amount(snap.deposits.requester_winnable);
                let explorer = explorer_link.unwrap_or_default();
                Notice {
                    text: format!(
                        "{name} ${ticker} has requested to be added to the list. \
                         Verify that the listing is correct. If you challenge and win \
                         you will take the deposit of {deposit} ETH\n\
                         Item address: {explorer}\n\
                         See the listing here: {listing_link}"
                    ),
                    attach_symbol: true,
                }
            } else {
                let deposit = format_amount(snap.deposits.requester_winnable);
                Notice::plain(format!(
                    "Someone requested to remove {name} ${ticker} from the list with a \
                     deposit of {deposit} ETH. If you challenge the removal and win you \
                     will take the deposit\n\
                     See the listing here: {listing_link}"
                ))
            }
        }
    }
}

/// Compose the reply announcing new evidence. Title and description are
/// expected to be pre-truncated by the payload module.
pub fn evidence_notice(
    item_name: &str,
    title: &str,
    description: &str,
    file_link: Option<&str>,
    listing_link: &str,
) -> String {
    let mut text = format!("New evidence for {item_name}: {title}");
    if !description.is_empty() {
        text.push_str(&format!("\n{description}"));
    }
    if let Some(link) = file_link {
        text.push_str(&format!("\nLink: {link}"));
    }
    text.push_str(&format!("\n\nSee full evidence: {listing_link}"));
    text
}

/// Compose the appeal-window notice once a ruling exists.
pub fn ruling_notice(item_name: &str, ruling: U256, max_fee: U256, listing_link: &str) -> String {
    let direction = if ruling == U256::from(1) { "for" } else { "against" };
    format!(
        "Jurors have ruled {direction} listing {item_name}. Think they are wrong? \
         Fund an appeal for the chance to win up to {} ETH.\n\
         See the listing here: {listing_link}",
        format_amount(max_fee)
    )
}
