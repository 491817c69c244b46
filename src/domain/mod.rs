pub mod companionship;
pub mod district;
pub mod history;
pub mod member;
