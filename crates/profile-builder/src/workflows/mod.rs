//! Profile wizards: step sequencing, extraction pre-fill, and the compensating submission saga.

pub mod extraction;
pub mod profiles;
pub mod sessions;
pub mod submission;
pub mod wizard;
