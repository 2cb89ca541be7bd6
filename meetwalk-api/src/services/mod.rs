pub mod geo;
pub mod ledger;
pub mod matching;
pub mod messaging;
pub mod quota;
pub mod users;
