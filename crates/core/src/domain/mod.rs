pub mod entitlement;
pub mod promo;
pub mod report;
pub mod session;
pub mod tariff;
