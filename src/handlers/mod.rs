pub mod votes;
