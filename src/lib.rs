pub mod auth;
pub mod campaigns;
pub mod config;
pub mod domain;
pub mod email;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod token;
