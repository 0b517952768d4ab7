pub mod balance;
pub mod manual_command;
pub mod price_point;
pub mod trade;
pub mod trading_state;
