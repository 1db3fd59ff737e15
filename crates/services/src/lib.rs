pub mod dao;
pub mod generator;
pub mod store;

pub use dao::BaseDao;
pub use generator::OpenAiGenerator;
pub use store::MongoEventStore;
