pub mod connection;
pub mod schema;

pub use connection::{make_pool, make_pool_with_size, test_connection, MySqlSession};
pub use schema::{check_person_table, find_person, get_person_count};
