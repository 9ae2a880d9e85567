mod bson;
mod collection;
mod errors;
mod unit_of_work;

pub use bson::{hex_id, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{is_duplicate_key_error, is_write_conflict};
pub use unit_of_work::UnitOfWork;
