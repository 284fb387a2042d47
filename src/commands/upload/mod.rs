mod admission;
mod dedup;
mod dispatch;
mod events;
mod pipeline;
mod run;
mod table;
#[cfg(test)]
mod tests;

pub use run::run;
