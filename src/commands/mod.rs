pub mod discover;
pub mod pairs;
pub mod run;
pub mod sync;
