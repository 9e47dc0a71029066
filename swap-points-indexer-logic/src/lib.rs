pub mod handlers;
pub mod indexer;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_utils;
