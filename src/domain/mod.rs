pub mod campaign;
pub mod email_event;
pub mod new_subscriber;
pub mod preferences;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscriber_name;
pub mod subscription_source;
