pub mod api_client;
pub mod dispatch;
pub mod service;
pub mod smtp_client;

use crate::domain::subscriber_email::SubscriberEmail;

/// The two outbound delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Api,
    Smtp,
}

/// Outcome of a transport call that made it onto the wire.
#[derive(Debug, Clone, Copy)]
pub struct Delivery {
    pub channel: Channel,
    pub recipients: usize,
}

/// Channel failures are returned as values, never thrown past the caller;
/// the route decides whether to record a failed campaign or answer 5xx.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("no recipients were provided")]
    NoRecipients,
    #[error("transactional API call failed")]
    Api(#[from] reqwest::Error),
    #[error("SMTP relay rejected the message")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("could not build the outbound message")]
    Message(#[from] lettre::error::Error),
    #[error("{0} is not a valid mailbox address")]
    Address(String),
}

/// Splits a recipient list into the primary "To" address and the remainder
/// as blind carbon copy. Recipients must never see each other's addresses,
/// so everything past the first address travels as BCC on both channels.
pub(crate) fn split_primary_bcc(
    recipients: &[SubscriberEmail],
) -> Result<(&SubscriberEmail, &[SubscriberEmail]), ChannelError> {
    match recipients.split_first() {
        Some((primary, rest)) => Ok((primary, rest)),
        None => Err(ChannelError::NoRecipients),
    }
}
