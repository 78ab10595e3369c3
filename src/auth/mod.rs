pub mod admin;
pub mod lockout;
