mod common;
mod policy;
mod rewards;
