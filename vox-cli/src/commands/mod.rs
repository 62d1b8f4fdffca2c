pub mod deploy;
pub mod publish;
pub mod pull;
