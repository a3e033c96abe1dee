mod orders;
mod products;
mod stats;
