pub mod idex;

pub use idex::IdexConnector;
