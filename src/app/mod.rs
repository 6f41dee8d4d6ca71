pub mod dispatch;
pub mod run;
pub mod status;
