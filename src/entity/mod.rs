pub mod registrations;
pub mod user_states;
