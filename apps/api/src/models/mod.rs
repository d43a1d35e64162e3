pub mod ad;
pub mod profile;
pub mod worker;
