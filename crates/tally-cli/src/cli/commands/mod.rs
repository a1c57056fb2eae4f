//! Command implementations.

pub mod helpers;
pub mod init;
pub mod records;
pub mod reviews;
pub mod sellers;

pub use init::run_init;
pub use records::{run_bookings_add, run_orders_add};
pub use reviews::{
    run_reviews_check, run_reviews_create, run_reviews_delete, run_reviews_list_by_reviewer,
    run_reviews_list_for_seller, run_reviews_show, run_reviews_update,
};
pub use sellers::{run_sellers_add, run_sellers_show, run_sellers_verify};
