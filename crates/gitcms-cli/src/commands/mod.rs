pub mod commit;
pub mod serve;
pub mod show;
